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

//! Persistence boundary.
//!
//! The ledger never touches storage directly. It runs each operation as a
//! closure against a [`Transaction`] handed out by a [`Store`]; the store
//! commits the staged writes only when the closure returns `Ok`.

use crate::base::{AccountId, LineId};
use crate::{Account, Call, LedgerError, Line, Payment, StoreError};

/// Identifier sequences allocated by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sequence {
    Account,
    Line,
    Call,
    Payment,
}

/// Reads and staged writes inside one store transaction.
///
/// Reads observe the transaction's own staged writes.
pub trait Transaction {
    /// Allocates the next identifier of a sequence. Identifiers start at 1
    /// and may skip values consumed by rolled-back transactions.
    fn next_id(&mut self, sequence: Sequence) -> Result<u64, StoreError>;

    fn account(&self, account_id: AccountId) -> Result<Option<Account>, StoreError>;

    fn account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    /// All accounts ordered by ID.
    fn accounts(&self) -> Result<Vec<Account>, StoreError>;

    /// Inserts or replaces an account. Fails on a duplicate email.
    fn save_account(&mut self, account: Account) -> Result<(), StoreError>;

    fn line(&self, line_id: LineId) -> Result<Option<Line>, StoreError>;

    fn line_by_phone(&self, phone: &str) -> Result<Option<Line>, StoreError>;

    /// Lines owned by an account, ordered by ID.
    fn lines_of(&self, account_id: AccountId) -> Result<Vec<Line>, StoreError>;

    /// Inserts or replaces a line. Fails on a duplicate phone number.
    fn save_line(&mut self, line: Line) -> Result<(), StoreError>;

    /// Removes a line, returning whether it existed.
    fn delete_line(&mut self, line_id: LineId) -> Result<bool, StoreError>;

    fn insert_call(&mut self, call: Call) -> Result<(), StoreError>;

    fn calls(&self) -> Result<Vec<Call>, StoreError>;

    fn calls_of(&self, line_id: LineId) -> Result<Vec<Call>, StoreError>;

    /// Appends a journal entry. Fails if the payment ID was already used.
    fn append_payment(&mut self, payment: Payment) -> Result<(), StoreError>;

    /// The whole journal, in append order.
    fn payments(&self) -> Result<Vec<Payment>, StoreError>;

    fn payments_of(&self, account_id: AccountId) -> Result<Vec<Payment>, StoreError>;
}

/// A backing store offering serializable multi-record transactions.
pub trait Store: Send + Sync {
    /// Runs `work` in a fresh transaction.
    ///
    /// Staged writes are committed iff `work` returns `Ok`; on `Err` nothing
    /// is written. Store-level failures surface as [`LedgerError::Store`].
    fn transaction<T, F>(&self, work: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T, LedgerError>;
}
