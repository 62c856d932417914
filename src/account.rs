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

//! Subscriber accounts.
//!
//! An account's balance is the running sum of every payment credited to it.
//! Calls never debit it directly, so a negative balance only appears when a
//! store is seeded or migrated with debt.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use calltrack_ledger::{Account, AccountId, NewAccount};
//!
//! let mut account = Account::open(AccountId(1), NewAccount::new("Ada", "ada@example.com"));
//! account.credit(dec!(12.50)).unwrap();
//! assert_eq!(account.balance, dec!(12.50));
//! assert!(!account.is_in_debt());
//! ```

use crate::base::AccountId;
use crate::error::LedgerError;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    #[default]
    User,
    Admin,
}

/// Registration request for a new account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub full_name: String,
    pub email: String,
    pub birth_date: Option<NaiveDate>,
    /// Opaque to the ledger; hashed and checked by the auth layer.
    pub credentials: String,
}

impl NewAccount {
    pub fn new(full_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            email: email.into(),
            birth_date: None,
            credentials: String::new(),
        }
    }

    pub fn with_birth_date(mut self, birth_date: NaiveDate) -> Self {
        self.birth_date = Some(birth_date);
        self
    }

    pub fn with_credentials(mut self, credentials: impl Into<String>) -> Self {
        self.credentials = credentials.into();
        self
    }
}

/// Subscriber account record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub full_name: String,
    pub email: String,
    pub birth_date: Option<NaiveDate>,
    pub credentials: String,
    /// Signed; negative means debt.
    pub balance: Decimal,
    pub status: AccountStatus,
    /// Credit threshold kept for the billing layer. Not used by [`Account::is_in_debt`].
    pub allowed_credit_minutes: u32,
    pub created_at: DateTime<Utc>,
}

impl Account {
    const DECIMAL_PRECISION: u32 = 4;

    /// Builds a freshly registered account with a zero balance.
    pub fn open(id: AccountId, request: NewAccount) -> Self {
        Self {
            id,
            full_name: request.full_name,
            email: request.email,
            birth_date: request.birth_date,
            credentials: request.credentials,
            balance: Decimal::ZERO,
            status: AccountStatus::User,
            allowed_credit_minutes: 0,
            created_at: Utc::now(),
        }
    }

    /// Adds a payment amount to the balance.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AmountOverflow`] - The new balance is out of range. The
    ///   balance is left unchanged.
    pub fn credit(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        debug_assert!(
            amount > Decimal::ZERO,
            "Invariant violated: account credited with non-positive amount: {amount}"
        );
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::AmountOverflow)?;
        Ok(())
    }

    /// An account is in debt iff its balance is below zero.
    pub fn is_in_debt(&self) -> bool {
        self.balance < Decimal::ZERO
    }
}

impl Serialize for Account {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Credentials never leave the ledger.
        let mut state = serializer.serialize_struct("Account", 8)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("full_name", &self.full_name)?;
        state.serialize_field("email", &self.email)?;
        state.serialize_field("birth_date", &self.birth_date)?;
        state.serialize_field(
            "balance",
            &self.balance.round_dp(Account::DECIMAL_PRECISION),
        )?;
        state.serialize_field("status", &self.status)?;
        state.serialize_field("allowed_credit_minutes", &self.allowed_credit_minutes)?;
        state.serialize_field("created_at", &self.created_at)?;
        state.end()
    }
}
