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

//! Tariff price list.
//!
//! Tariffs are published once and never edited; a call captures the price it
//! was rated at, so later catalog versions never rewrite history.

use crate::LedgerError;
use crate::base::TariffId;
use chrono::NaiveDate;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tariff {
    pub id: TariffId,
    pub name: String,
    /// Free-form type tag, e.g. `"local"` or `"international"`.
    pub kind: String,
    pub price_per_minute: Decimal,
    /// ISO 4217 code. Amounts are never converted between currencies.
    pub currency: String,
    pub valid_from: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
}

impl Tariff {
    pub fn new(id: TariffId, name: impl Into<String>, price_per_minute: Decimal) -> Self {
        Self {
            id,
            name: name.into(),
            kind: "standard".to_string(),
            price_per_minute,
            currency: "USD".to_string(),
            valid_from: None,
            valid_until: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_validity(mut self, from: Option<NaiveDate>, until: Option<NaiveDate>) -> Self {
        self.valid_from = from;
        self.valid_until = until;
        self
    }

    /// Whether `date` falls inside the validity window. Open ends are unbounded.
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.valid_from.is_none_or(|from| from <= date)
            && self.valid_until.is_none_or(|until| date <= until)
    }

    /// Exact cost of a call of `minutes` at this tariff.
    pub fn cost_of(&self, minutes: u32) -> Result<Decimal, LedgerError> {
        self.price_per_minute
            .checked_mul(Decimal::from(minutes))
            .ok_or(LedgerError::AmountOverflow)
    }

    fn validate(&self) -> Result<(), LedgerError> {
        if self.price_per_minute < Decimal::ZERO {
            return Err(LedgerError::NegativePrice(self.id));
        }
        match (self.valid_from, self.valid_until) {
            (Some(from), Some(until)) if until < from => Err(LedgerError::InvalidValidity(self.id)),
            _ => Ok(()),
        }
    }
}

/// A thread-safe, insert-only tariff catalog.
///
/// Readers never block on the ledger store, so call rating can resolve prices
/// from any worker.
#[derive(Debug, Default)]
pub struct TariffCatalog {
    tariffs: DashMap<TariffId, Arc<Tariff>>,
}

impl TariffCatalog {
    pub fn new() -> Self {
        Self {
            tariffs: DashMap::new(),
        }
    }

    /// Publishes a tariff.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NegativePrice`] - Price per minute is below zero.
    /// - [`LedgerError::InvalidValidity`] - Validity ends before it starts.
    /// - [`LedgerError::DuplicateTariff`] - A tariff with the same ID exists.
    pub fn publish(&self, tariff: Tariff) -> Result<Arc<Tariff>, LedgerError> {
        tariff.validate()?;
        let tariff_id = tariff.id;

        // Entry API keeps check-and-insert atomic across publishers.
        match self.tariffs.entry(tariff_id) {
            Entry::Occupied(_) => Err(LedgerError::DuplicateTariff(tariff_id)),
            Entry::Vacant(entry) => {
                let tariff = Arc::new(tariff);
                entry.insert(Arc::clone(&tariff));
                tracing::debug!(tariff_id = %tariff_id, price = %tariff.price_per_minute, "tariff published");
                Ok(tariff)
            }
        }
    }

    pub fn get(&self, tariff_id: TariffId) -> Option<Arc<Tariff>> {
        self.tariffs.get(&tariff_id).map(|entry| Arc::clone(entry.value()))
    }

    /// All published tariffs ordered by ID.
    pub fn list(&self) -> Vec<Arc<Tariff>> {
        let mut tariffs: Vec<_> = self
            .tariffs
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        tariffs.sort_by_key(|tariff| tariff.id);
        tariffs
    }

    pub fn len(&self) -> usize {
        self.tariffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tariffs.is_empty()
    }
}
