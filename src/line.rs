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

//! Phone lines and their balances.

use crate::base::{AccountId, LineId, TariffId};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A phone line owned by exactly one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub id: LineId,
    pub account_id: AccountId,
    pub label: String,
    /// Globally unique.
    pub phone: String,
    pub activated_at: DateTime<Utc>,
    pub primary: bool,
    pub balance: Decimal,
    pub tariff_id: Option<TariffId>,
}

impl Line {
    pub fn new(
        id: LineId,
        account_id: AccountId,
        phone: impl Into<String>,
        label: impl Into<String>,
        primary: bool,
    ) -> Self {
        Self {
            id,
            account_id,
            label: label.into(),
            phone: phone.into(),
            activated_at: Utc::now(),
            primary,
            balance: Decimal::ZERO,
            tariff_id: None,
        }
    }

    /// Adds a payment amount to the line balance.
    pub fn credit(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        debug_assert!(
            amount > Decimal::ZERO,
            "Invariant violated: line credited with non-positive amount: {amount}"
        );
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::AmountOverflow)?;
        Ok(())
    }

    /// Takes over the residual balance of a retiring sibling.
    ///
    /// Only a positive residual moves; retirement never carries debt. Returns
    /// the amount transferred. On [`LedgerError::AmountOverflow`] the
    /// receiver is left untouched.
    pub fn absorb(&mut self, retiring: &Line) -> Result<Decimal, LedgerError> {
        debug_assert_eq!(self.account_id, retiring.account_id);
        debug_assert_ne!(self.id, retiring.id);

        let carried = retiring.balance.max(Decimal::ZERO);
        self.balance = self
            .balance
            .checked_add(carried)
            .ok_or(LedgerError::AmountOverflow)?;
        if retiring.primary {
            self.primary = true;
        }
        Ok(carried)
    }
}
