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

//! In-memory [`Store`] implementation.
//!
//! Transactions run one at a time under a single [`Mutex`], which makes every
//! transaction serializable and rules out lost updates. Writes are staged in a
//! per-transaction overlay and folded into the tables only on commit, so a
//! failed transaction leaves no trace.

use crate::base::{AccountId, LineId, PaymentId};
use crate::store::{Sequence, Store, Transaction};
use crate::{Account, Call, LedgerError, Line, Payment, StoreError};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    emails: HashMap<String, AccountId>,
    lines: BTreeMap<LineId, Line>,
    phones: HashMap<String, LineId>,
    account_lines: HashMap<AccountId, BTreeSet<LineId>>,
    calls: Vec<Call>,
    payments: Vec<Payment>,
    payment_ids: HashSet<PaymentId>,
}

impl Tables {
    fn apply(&mut self, overlay: Overlay) {
        for (account_id, account) in overlay.accounts {
            if let Some(previous) = self.accounts.get(&account_id) {
                if previous.email != account.email {
                    self.emails.remove(&previous.email);
                }
            }
            self.emails.insert(account.email.clone(), account_id);
            self.accounts.insert(account_id, account);
        }

        for (line_id, change) in overlay.lines {
            if let Some(previous) = self.lines.remove(&line_id) {
                self.phones.remove(&previous.phone);
                if let Some(ids) = self.account_lines.get_mut(&previous.account_id) {
                    ids.remove(&line_id);
                }
            }
            if let Some(line) = change {
                self.phones.insert(line.phone.clone(), line_id);
                self.account_lines
                    .entry(line.account_id)
                    .or_default()
                    .insert(line_id);
                self.lines.insert(line_id, line);
            }
        }

        self.calls.extend(overlay.calls);
        for payment in overlay.payments {
            self.payment_ids.insert(payment.id);
            self.payments.push(payment);
        }
    }
}

/// Writes staged by an open transaction.
#[derive(Debug, Default)]
struct Overlay {
    accounts: BTreeMap<AccountId, Account>,
    /// `None` marks a deleted line.
    lines: BTreeMap<LineId, Option<Line>>,
    calls: Vec<Call>,
    payments: Vec<Payment>,
}

/// Thread-safe in-memory ledger store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    sequences: [AtomicU64; 4],
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed payment journal entries.
    pub fn journal_len(&self) -> usize {
        self.tables.lock().payments.len()
    }
}

impl Store for MemoryStore {
    fn transaction<T, F>(&self, work: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T, LedgerError>,
    {
        let mut tables = self.tables.lock();
        let mut tx = MemoryTransaction {
            tables: &*tables,
            sequences: &self.sequences,
            overlay: Overlay::default(),
        };

        let result = work(&mut tx);
        let MemoryTransaction { overlay, .. } = tx;

        match result {
            Ok(value) => {
                tables.apply(overlay);
                Ok(value)
            }
            Err(e) => {
                tracing::trace!(error = %e, "transaction rolled back");
                Err(e)
            }
        }
    }
}

struct MemoryTransaction<'a> {
    tables: &'a Tables,
    sequences: &'a [AtomicU64; 4],
    overlay: Overlay,
}

impl MemoryTransaction<'_> {
    fn sequence(&self, sequence: Sequence) -> &AtomicU64 {
        let index = match sequence {
            Sequence::Account => 0,
            Sequence::Line => 1,
            Sequence::Call => 2,
            Sequence::Payment => 3,
        };
        &self.sequences[index]
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn next_id(&mut self, sequence: Sequence) -> Result<u64, StoreError> {
        Ok(self.sequence(sequence).fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn account(&self, account_id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self
            .overlay
            .accounts
            .get(&account_id)
            .or_else(|| self.tables.accounts.get(&account_id))
            .cloned())
    }

    fn account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        if let Some(account) = self.overlay.accounts.values().find(|a| a.email == email) {
            return Ok(Some(account.clone()));
        }
        // The committed index may be stale for accounts rewritten in this transaction.
        match self.tables.emails.get(email) {
            Some(&account_id) => Ok(self.account(account_id)?.filter(|a| a.email == email)),
            None => Ok(None),
        }
    }

    fn accounts(&self) -> Result<Vec<Account>, StoreError> {
        let mut accounts = self.tables.accounts.clone();
        accounts.extend(self.overlay.accounts.clone());
        Ok(accounts.into_values().collect())
    }

    fn save_account(&mut self, account: Account) -> Result<(), StoreError> {
        if let Some(existing) = self.account_by_email(&account.email)? {
            if existing.id != account.id {
                return Err(StoreError::Duplicate {
                    table: "accounts",
                    key: account.email,
                });
            }
        }
        self.overlay.accounts.insert(account.id, account);
        Ok(())
    }

    fn line(&self, line_id: LineId) -> Result<Option<Line>, StoreError> {
        Ok(match self.overlay.lines.get(&line_id) {
            Some(staged) => staged.clone(),
            None => self.tables.lines.get(&line_id).cloned(),
        })
    }

    fn line_by_phone(&self, phone: &str) -> Result<Option<Line>, StoreError> {
        let staged = self
            .overlay
            .lines
            .values()
            .flatten()
            .find(|line| line.phone == phone);
        if let Some(line) = staged {
            return Ok(Some(line.clone()));
        }
        match self.tables.phones.get(phone) {
            Some(&line_id) => Ok(self.line(line_id)?.filter(|line| line.phone == phone)),
            None => Ok(None),
        }
    }

    fn lines_of(&self, account_id: AccountId) -> Result<Vec<Line>, StoreError> {
        let mut lines: BTreeMap<LineId, Line> = self
            .tables
            .account_lines
            .get(&account_id)
            .into_iter()
            .flatten()
            .filter_map(|line_id| self.tables.lines.get(line_id))
            .map(|line| (line.id, line.clone()))
            .collect();

        for (line_id, staged) in &self.overlay.lines {
            match staged {
                Some(line) if line.account_id == account_id => {
                    lines.insert(*line_id, line.clone());
                }
                _ => {
                    lines.remove(line_id);
                }
            }
        }
        Ok(lines.into_values().collect())
    }

    fn save_line(&mut self, line: Line) -> Result<(), StoreError> {
        if let Some(existing) = self.line_by_phone(&line.phone)? {
            if existing.id != line.id {
                return Err(StoreError::Duplicate {
                    table: "lines",
                    key: line.phone,
                });
            }
        }
        self.overlay.lines.insert(line.id, Some(line));
        Ok(())
    }

    fn delete_line(&mut self, line_id: LineId) -> Result<bool, StoreError> {
        let existed = self.line(line_id)?.is_some();
        self.overlay.lines.insert(line_id, None);
        Ok(existed)
    }

    fn insert_call(&mut self, call: Call) -> Result<(), StoreError> {
        self.overlay.calls.push(call);
        Ok(())
    }

    fn calls(&self) -> Result<Vec<Call>, StoreError> {
        Ok(self
            .tables
            .calls
            .iter()
            .chain(&self.overlay.calls)
            .cloned()
            .collect())
    }

    fn calls_of(&self, line_id: LineId) -> Result<Vec<Call>, StoreError> {
        Ok(self
            .tables
            .calls
            .iter()
            .chain(&self.overlay.calls)
            .filter(|call| call.line_id == line_id)
            .cloned()
            .collect())
    }

    fn append_payment(&mut self, payment: Payment) -> Result<(), StoreError> {
        let duplicate = self.tables.payment_ids.contains(&payment.id)
            || self.overlay.payments.iter().any(|p| p.id == payment.id);
        if duplicate {
            return Err(StoreError::Duplicate {
                table: "payments",
                key: payment.id.to_string(),
            });
        }
        self.overlay.payments.push(payment);
        Ok(())
    }

    fn payments(&self) -> Result<Vec<Payment>, StoreError> {
        Ok(self
            .tables
            .payments
            .iter()
            .chain(&self.overlay.payments)
            .cloned()
            .collect())
    }

    fn payments_of(&self, account_id: AccountId) -> Result<Vec<Payment>, StoreError> {
        Ok(self
            .tables
            .payments
            .iter()
            .chain(&self.overlay.payments)
            .filter(|payment| payment.account_id == account_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NewAccount;
    use rust_decimal_macros::dec;

    fn seed_account(store: &MemoryStore, email: &str) -> AccountId {
        store
            .transaction(|tx| {
                let id = AccountId(tx.next_id(Sequence::Account)?);
                tx.save_account(Account::open(id, NewAccount::new("Test", email)))?;
                Ok(id)
            })
            .unwrap()
    }

    #[test]
    fn committed_writes_are_visible() {
        let store = MemoryStore::new();
        let account_id = seed_account(&store, "a@example.com");

        let found = store
            .transaction(|tx| Ok(tx.account_by_email("a@example.com")?))
            .unwrap();
        assert_eq!(found.map(|a| a.id), Some(account_id));
    }

    #[test]
    fn failed_transaction_leaves_no_writes() {
        let store = MemoryStore::new();
        let account_id = seed_account(&store, "a@example.com");

        let result: Result<(), _> = store.transaction(|tx| {
            let mut account = tx.account(account_id)?.unwrap();
            account.credit(dec!(10.00))?;
            tx.save_account(account)?;
            tx.save_line(Line::new(LineId(1), account_id, "+1555", "home", true))?;
            Err(LedgerError::InvalidAmount)
        });
        assert_eq!(result, Err(LedgerError::InvalidAmount));

        store
            .transaction(|tx| {
                assert_eq!(tx.account(account_id)?.unwrap().balance, dec!(0));
                assert!(tx.line(LineId(1))?.is_none());
                assert!(tx.line_by_phone("+1555")?.is_none());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn reads_see_staged_writes() {
        let store = MemoryStore::new();
        let account_id = seed_account(&store, "a@example.com");

        store
            .transaction(|tx| {
                tx.save_line(Line::new(LineId(7), account_id, "+1555", "home", true))?;
                assert_eq!(tx.lines_of(account_id)?.len(), 1);
                assert_eq!(tx.line_by_phone("+1555")?.map(|l| l.id), Some(LineId(7)));

                tx.delete_line(LineId(7))?;
                assert!(tx.lines_of(account_id)?.is_empty());
                assert!(tx.line_by_phone("+1555")?.is_none());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn delete_frees_phone_number() {
        let store = MemoryStore::new();
        let account_id = seed_account(&store, "a@example.com");

        store
            .transaction(|tx| {
                tx.save_line(Line::new(LineId(1), account_id, "+1555", "home", true))?;
                Ok(())
            })
            .unwrap();
        let existed = store.transaction(|tx| Ok(tx.delete_line(LineId(1))?)).unwrap();
        assert!(existed);

        store
            .transaction(|tx| {
                tx.save_line(Line::new(LineId(2), account_id, "+1555", "work", true))?;
                Ok(())
            })
            .unwrap();
        let lines = store.transaction(|tx| Ok(tx.lines_of(account_id)?)).unwrap();
        assert_eq!(lines.iter().map(|l| l.id).collect::<Vec<_>>(), vec![LineId(2)]);
    }

    #[test]
    fn duplicate_phone_is_rejected() {
        let store = MemoryStore::new();
        let account_id = seed_account(&store, "a@example.com");

        let result = store.transaction(|tx| {
            tx.save_line(Line::new(LineId(1), account_id, "+1555", "home", true))?;
            tx.save_line(Line::new(LineId(2), account_id, "+1555", "work", false))?;
            Ok(())
        });
        assert!(matches!(
            result,
            Err(LedgerError::Store(StoreError::Duplicate { table: "lines", .. }))
        ));
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let store = MemoryStore::new();
        seed_account(&store, "a@example.com");

        let result = store.transaction(|tx| {
            tx.save_account(Account::open(AccountId(99), NewAccount::new("Other", "a@example.com")))?;
            Ok(())
        });
        assert!(matches!(
            result,
            Err(LedgerError::Store(StoreError::Duplicate { table: "accounts", .. }))
        ));
    }

    #[test]
    fn sequences_start_at_one_and_increase() {
        let store = MemoryStore::new();
        let ids = store
            .transaction(|tx| {
                Ok((
                    tx.next_id(Sequence::Line)?,
                    tx.next_id(Sequence::Line)?,
                    tx.next_id(Sequence::Payment)?,
                ))
            })
            .unwrap();
        assert_eq!(ids, (1, 2, 1));
    }
}
