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

//! Error types for ledger operations.
//!
//! Every failure is scoped to a single request. [`LedgerError::kind`] sorts
//! errors into the classes callers act on: missing records, conflicts, bad
//! input, and transient store collisions (the only class worth retrying).

use crate::base::{AccountId, LineId, TariffId};
use thiserror::Error;

/// Caller-facing classification of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A referenced account, line, or tariff does not exist.
    NotFound,
    /// The request collides with existing state (duplicate phone, email, ...).
    Conflict,
    /// The request itself is malformed.
    InvalidInput,
    /// Concurrent transaction collision in the backing store.
    TransientStoreConflict,
}

/// Errors raised by a backing [`Store`](crate::Store).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Another transaction won a write race; the work may be retried.
    #[error("transaction conflict")]
    Conflict,

    /// A unique key or append-only constraint was violated.
    #[error("duplicate {table} key {key}")]
    Duplicate { table: &'static str, key: String },
}

/// Ledger operation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    #[error("line {0} not found")]
    LineNotFound(LineId),

    #[error("no line with phone number {0}")]
    PhoneNotFound(String),

    #[error("tariff {0} not found")]
    TariffNotFound(TariffId),

    /// The line has no tariff assigned, so calls on it cannot be rated.
    #[error("line {0} has no active tariff")]
    NoActiveTariff(LineId),

    #[error("phone number {0} is already registered")]
    PhoneNumberTaken(String),

    #[error("email {0} is already registered")]
    EmailTaken(String),

    #[error("tariff {0} is already published")]
    DuplicateTariff(TariffId),

    /// Retiring the only line of an account under a policy that forbids it.
    #[error("line {0} is the last line of its account")]
    LastLine(LineId),

    /// Payment amount is zero or negative.
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// A balance or call cost would exceed the representable range.
    #[error("amount overflow")]
    AmountOverflow,

    #[error("line {line} does not belong to account {account}")]
    LineAccountMismatch { line: LineId, account: AccountId },

    #[error("tariff {0} has a negative price per minute")]
    NegativePrice(TariffId),

    #[error("tariff {0} validity ends before it starts")]
    InvalidValidity(TariffId),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AccountNotFound(_)
            | Self::LineNotFound(_)
            | Self::PhoneNotFound(_)
            | Self::TariffNotFound(_)
            | Self::NoActiveTariff(_) => ErrorKind::NotFound,
            Self::PhoneNumberTaken(_)
            | Self::EmailTaken(_)
            | Self::DuplicateTariff(_)
            | Self::LastLine(_)
            | Self::Store(StoreError::Duplicate { .. }) => ErrorKind::Conflict,
            Self::InvalidAmount
            | Self::AmountOverflow
            | Self::LineAccountMismatch { .. }
            | Self::NegativePrice(_)
            | Self::InvalidValidity(_) => ErrorKind::InvalidInput,
            Self::Store(StoreError::Conflict) => ErrorKind::TransientStoreConflict,
        }
    }

    /// True only for store conflicts that a fresh attempt may clear.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::TransientStoreConflict
    }
}
