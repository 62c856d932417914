// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Call records and rating.
//!
//! Rating prices a call against the line's active tariff and stores the
//! result. It never moves money.

use crate::base::{CallId, LineId, TariffId};
use crate::store::{Sequence, Transaction};
use crate::{LedgerError, Line, Tariff, TariffCatalog};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A rated call. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub id: CallId,
    pub line_id: LineId,
    pub started_at: DateTime<Utc>,
    pub call_type: String,
    pub tariff_id: TariffId,
    /// Price captured at rating time.
    pub price_per_minute: Decimal,
    pub currency: String,
    pub duration_minutes: u32,
    pub cost: Decimal,
}

/// Prices calls from the tariff catalog.
#[derive(Debug, Clone)]
pub struct CallRater {
    catalog: Arc<TariffCatalog>,
}

impl CallRater {
    pub fn new(catalog: Arc<TariffCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &TariffCatalog {
        &self.catalog
    }

    /// Resolves the tariff currently assigned to `line`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NoActiveTariff`] - The line has no tariff.
    /// - [`LedgerError::TariffNotFound`] - The assigned tariff is not in the catalog.
    pub fn active_tariff(&self, line: &Line) -> Result<Arc<Tariff>, LedgerError> {
        let tariff_id = line.tariff_id.ok_or(LedgerError::NoActiveTariff(line.id))?;
        self.catalog
            .get(tariff_id)
            .ok_or(LedgerError::TariffNotFound(tariff_id))
    }

    /// Cost of a call of `minutes` on `line`, without storing anything.
    pub fn quote(&self, line: &Line, minutes: u32) -> Result<Decimal, LedgerError> {
        self.active_tariff(line)?.cost_of(minutes)
    }

    /// Rates a call and stores it inside `tx`.
    pub fn rate(
        &self,
        tx: &mut dyn Transaction,
        line_id: LineId,
        started_at: DateTime<Utc>,
        duration_minutes: u32,
        call_type: &str,
    ) -> Result<Call, LedgerError> {
        let line = tx.line(line_id)?.ok_or(LedgerError::LineNotFound(line_id))?;
        let tariff = self.active_tariff(&line)?;
        let cost = tariff.cost_of(duration_minutes)?;

        let call = Call {
            id: CallId(tx.next_id(Sequence::Call)?),
            line_id,
            started_at,
            call_type: call_type.to_string(),
            tariff_id: tariff.id,
            price_per_minute: tariff.price_per_minute,
            currency: tariff.currency.clone(),
            duration_minutes,
            cost,
        };
        debug_assert!(call.cost >= Decimal::ZERO);

        tx.insert_call(call.clone())?;
        tracing::debug!(call_id = %call.id, line_id = %line_id, cost = %call.cost, "call rated");
        Ok(call)
    }
}
