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

//! Atomicity and retry behavior against a fault-injecting store.
//!
//! [`FlakyStore`] runs each transaction's work against a real [`MemoryStore`]
//! and then reports a conflict instead of committing, for a configurable
//! number of transactions. The staged writes are rolled back exactly as a
//! real commit-time collision would.

use calltrack_ledger::{
    AccountId, ErrorKind, Ledger, LedgerConfig, LedgerError, LineId, MemoryStore, NewAccount,
    Store, StoreError, Tariff, TariffCatalog, TariffId, Transaction,
};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

struct FlakyStore {
    inner: MemoryStore,
    failures_left: AtomicU32,
    attempts: AtomicU32,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            failures_left: AtomicU32::new(0),
            attempts: AtomicU32::new(0),
        }
    }

    /// Makes the next `n` transactions fail after running their work.
    fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
        self.attempts.store(0, Ordering::SeqCst);
    }

    fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Store for FlakyStore {
    fn transaction<T, F>(&self, work: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T, LedgerError>,
    {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        self.inner.transaction(|tx| {
            let value = work(tx)?;
            if fail {
                return Err(StoreError::Conflict.into());
            }
            Ok(value)
        })
    }
}

struct Fixture {
    ledger: Ledger<FlakyStore>,
    account: AccountId,
    line: LineId,
}

fn fixture(max_attempts: u32) -> Fixture {
    let catalog = TariffCatalog::new();
    catalog
        .publish(Tariff::new(TariffId(1), "Basic", dec!(2.50)))
        .unwrap();
    let config = LedgerConfig::default().with_max_attempts(max_attempts);
    let ledger = Ledger::with_config(FlakyStore::new(), Arc::new(catalog), config);

    let account = ledger
        .register_account(NewAccount::new("Ada", "ada@example.com"))
        .unwrap();
    let line = ledger.register_line(account.id, "+15550100", "home").unwrap();
    ledger.assign_tariff(line.id, TariffId(1)).unwrap();

    Fixture {
        ledger,
        account: account.id,
        line: line.id,
    }
}

#[test]
fn transient_conflict_is_retried_once_applied() {
    let f = fixture(3);
    f.ledger.store().fail_next(2);

    let payment = f
        .ledger
        .apply_payment(f.line, f.account, dec!(10.00), "CARD")
        .unwrap();

    assert_eq!(f.ledger.store().attempts(), 3);
    assert_eq!(payment.balance_after, dec!(10.00));
    assert_eq!(f.ledger.account(f.account).unwrap().balance, dec!(10.00));
    assert_eq!(f.ledger.line(f.line).unwrap().balance, dec!(10.00));
    assert_eq!(f.ledger.payments_of(f.account).unwrap().len(), 1);
}

#[test]
fn retries_are_bounded() {
    let f = fixture(3);
    f.ledger.store().fail_next(10);

    let error = f
        .ledger
        .apply_payment(f.line, f.account, dec!(10.00), "CARD")
        .unwrap_err();

    assert_eq!(error, LedgerError::Store(StoreError::Conflict));
    assert_eq!(error.kind(), ErrorKind::TransientStoreConflict);
    assert_eq!(f.ledger.store().attempts(), 3);

    f.ledger.store().fail_next(0);
    assert_eq!(f.ledger.account(f.account).unwrap().balance, Decimal::ZERO);
    assert_eq!(f.ledger.line(f.line).unwrap().balance, Decimal::ZERO);
    assert!(f.ledger.payments_of(f.account).unwrap().is_empty());
}

#[test]
fn validation_failures_are_not_retried() {
    let f = fixture(5);
    f.ledger.store().fail_next(0);

    let error = f
        .ledger
        .apply_payment(f.line, AccountId(99), dec!(1.00), "CARD")
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::NotFound);
    assert_eq!(f.ledger.store().attempts(), 1);
}

#[test]
fn failed_retirement_keeps_both_lines() {
    let f = fixture(1);
    let second = f
        .ledger
        .register_line(f.account, "+15550101", "work")
        .unwrap();
    f.ledger
        .apply_payment(second.id, f.account, dec!(4.00), "CARD")
        .unwrap();

    f.ledger.store().fail_next(1);
    assert!(f.ledger.retire_line(second.id).unwrap_err().is_transient());

    assert_eq!(f.ledger.line(f.line).unwrap().balance, Decimal::ZERO);
    assert_eq!(f.ledger.line(second.id).unwrap().balance, dec!(4.00));

    f.ledger.retire_line(second.id).unwrap();
    assert_eq!(f.ledger.line(f.line).unwrap().balance, dec!(4.00));
}

#[test]
fn failed_rating_stores_no_call() {
    let f = fixture(1);
    f.ledger.store().fail_next(1);

    assert!(
        f.ledger
            .rate_call(f.line, Utc::now(), 45, "local")
            .unwrap_err()
            .is_transient()
    );
    assert!(f.ledger.calls().unwrap().is_empty());

    let call = f.ledger.rate_call(f.line, Utc::now(), 45, "local").unwrap();
    assert_eq!(call.cost, dec!(112.50));
    assert_eq!(f.ledger.calls().unwrap().len(), 1);
}

#[test]
fn failed_registration_leaves_no_line() {
    let f = fixture(1);
    f.ledger.store().fail_next(1);

    assert!(
        f.ledger
            .register_line(f.account, "+15550199", "spare")
            .is_err()
    );
    assert_eq!(
        f.ledger.line_by_phone("+15550199"),
        Err(LedgerError::PhoneNotFound("+15550199".to_string()))
    );
    assert_eq!(f.ledger.lines_of(f.account).unwrap().len(), 1);
}
