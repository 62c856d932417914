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

//! Billing ledger engine.
//!
//! The [`Ledger`] is the only component that moves money. Each operation
//! runs as one store transaction, so a payment's line credit, account credit,
//! and journal entry land together or not at all.
//!
//! # Operations
//!
//! - **Payments**: Credit a line and its owning account, and journal the payment.
//! - **Line registration**: The first line of an account becomes its primary line.
//! - **Line retirement**: Move the residual balance to the oldest sibling line.
//! - **Call rating**: Price a call against the line's tariff and record it.
//!
//! # Concurrency
//!
//! Concurrent callers share one `Ledger` (typically behind an `Arc`). The
//! store serializes transactions; transient store conflicts are retried up to
//! [`LedgerConfig::max_attempts`] times, validation failures never are.

use crate::base::{AccountId, LineId, PaymentId, TariffId};
use crate::store::{Sequence, Store, Transaction};
use crate::{
    Account, Call, CallRater, LedgerConfig, LedgerError, Line, MemoryStore, NewAccount, Payment,
    RetirementPolicy, TariffCatalog,
};
use chrono::{DateTime, Utc};
use crossbeam::utils::Backoff;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Billing ledger over a backing [`Store`].
///
/// # Invariants
///
/// - An account balance equals the sum of the payments journaled against it.
/// - Every journal entry records the account balance right after it applied.
/// - Retiring a line never creates or destroys money while a sibling line exists.
/// - Each account has at most one primary line.
pub struct Ledger<S = MemoryStore> {
    store: S,
    rater: CallRater,
    config: LedgerConfig,
}

impl Ledger<MemoryStore> {
    /// Creates a ledger over a fresh in-memory store.
    pub fn in_memory(catalog: Arc<TariffCatalog>) -> Self {
        Self::new(MemoryStore::new(), catalog)
    }
}

impl<S: Store> Ledger<S> {
    pub fn new(store: S, catalog: Arc<TariffCatalog>) -> Self {
        Self::with_config(store, catalog, LedgerConfig::default())
    }

    pub fn with_config(store: S, catalog: Arc<TariffCatalog>, config: LedgerConfig) -> Self {
        Ledger {
            store,
            rater: CallRater::new(catalog),
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn catalog(&self) -> &TariffCatalog {
        self.rater.catalog()
    }

    pub fn rater(&self) -> &CallRater {
        &self.rater
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Runs `work` in a store transaction, retrying transient conflicts.
    fn atomically<T>(
        &self,
        operation: &'static str,
        mut work: impl FnMut(&mut dyn Transaction) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let backoff = Backoff::new();
        let mut attempt = 1;
        loop {
            match self.store.transaction(&mut work) {
                Err(e) if e.is_transient() && attempt < self.config.max_attempts => {
                    warn!(operation, attempt, "transient store conflict, retrying");
                    attempt += 1;
                    backoff.snooze();
                }
                result => return result,
            }
        }
    }

    /// Registers a new account with a zero balance.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::EmailTaken`] - Another account uses the same email.
    #[instrument(name = "calltrack.ledger.register_account", skip(self, request), fields(email = %request.email), err)]
    pub fn register_account(&self, request: NewAccount) -> Result<Account, LedgerError> {
        self.atomically("register_account", |tx| {
            if tx.account_by_email(&request.email)?.is_some() {
                return Err(LedgerError::EmailTaken(request.email.clone()));
            }
            let account_id = AccountId(tx.next_id(Sequence::Account)?);
            let account = Account::open(account_id, request.clone());
            tx.save_account(account.clone())?;
            debug!(account_id = %account_id, "account registered");
            Ok(account)
        })
    }

    /// Registers a phone line for an account.
    ///
    /// The line is primary iff the account had no lines. Later registrations
    /// never move the primary flag.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AccountNotFound`] - Account does not exist.
    /// - [`LedgerError::PhoneNumberTaken`] - Phone number is already registered.
    #[instrument(name = "calltrack.ledger.register_line", skip(self), err)]
    pub fn register_line(
        &self,
        account_id: AccountId,
        phone: &str,
        label: &str,
    ) -> Result<Line, LedgerError> {
        self.atomically("register_line", |tx| {
            if tx.account(account_id)?.is_none() {
                return Err(LedgerError::AccountNotFound(account_id));
            }
            if tx.line_by_phone(phone)?.is_some() {
                return Err(LedgerError::PhoneNumberTaken(phone.to_string()));
            }

            let primary = tx.lines_of(account_id)?.is_empty();
            let line_id = LineId(tx.next_id(Sequence::Line)?);
            let line = Line::new(line_id, account_id, phone, label, primary);
            tx.save_line(line.clone())?;
            debug!(line_id = %line_id, primary, "line registered");
            Ok(line)
        })
    }

    /// Makes `tariff_id` the active tariff of a line.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::TariffNotFound`] - Tariff is not in the catalog.
    /// - [`LedgerError::LineNotFound`] - Line does not exist.
    #[instrument(name = "calltrack.ledger.assign_tariff", skip(self), err)]
    pub fn assign_tariff(&self, line_id: LineId, tariff_id: TariffId) -> Result<Line, LedgerError> {
        if self.catalog().get(tariff_id).is_none() {
            return Err(LedgerError::TariffNotFound(tariff_id));
        }
        self.atomically("assign_tariff", |tx| {
            let mut line = tx.line(line_id)?.ok_or(LedgerError::LineNotFound(line_id))?;
            line.tariff_id = Some(tariff_id);
            tx.save_line(line.clone())?;
            Ok(line)
        })
    }

    /// Credits a payment to a line and its owning account, and journals it.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - Amount is zero or negative.
    /// - [`LedgerError::AccountNotFound`] - Account does not exist.
    /// - [`LedgerError::LineNotFound`] - Line does not exist.
    /// - [`LedgerError::LineAccountMismatch`] - Line belongs to another account.
    #[instrument(name = "calltrack.ledger.apply_payment", skip(self), err)]
    pub fn apply_payment(
        &self,
        line_id: LineId,
        account_id: AccountId,
        amount: Decimal,
        method: &str,
    ) -> Result<Payment, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        self.atomically("apply_payment", |tx| {
            let mut account = tx
                .account(account_id)?
                .ok_or(LedgerError::AccountNotFound(account_id))?;
            let mut line = tx.line(line_id)?.ok_or(LedgerError::LineNotFound(line_id))?;
            if line.account_id != account_id {
                return Err(LedgerError::LineAccountMismatch {
                    line: line_id,
                    account: account_id,
                });
            }

            line.credit(amount)?;
            account.credit(amount)?;

            let payment = Payment {
                id: PaymentId(tx.next_id(Sequence::Payment)?),
                account_id,
                line_id,
                amount,
                method: method.to_string(),
                balance_after: account.balance,
                created_at: Utc::now(),
            };

            tx.save_line(line)?;
            tx.save_account(account)?;
            tx.append_payment(payment.clone())?;
            debug!(payment_id = %payment.id, balance_after = %payment.balance_after, "payment applied");
            Ok(payment)
        })
    }

    /// Retires a line, handing its residual balance to a surviving sibling.
    ///
    /// The receiver is the sibling with the lowest line ID. If the retired
    /// line was primary, the receiver becomes primary. The account balance is
    /// untouched. Without siblings the outcome follows
    /// [`LedgerConfig::retirement`].
    ///
    /// # Errors
    ///
    /// - [`LedgerError::LineNotFound`] - Line does not exist.
    /// - [`LedgerError::LastLine`] - Last line under [`RetirementPolicy::RejectLastLine`].
    #[instrument(name = "calltrack.ledger.retire_line", skip(self), err)]
    pub fn retire_line(&self, line_id: LineId) -> Result<(), LedgerError> {
        self.atomically("retire_line", |tx| {
            let line = tx.line(line_id)?.ok_or(LedgerError::LineNotFound(line_id))?;
            let receiver = tx
                .lines_of(line.account_id)?
                .into_iter()
                .filter(|sibling| sibling.id != line_id)
                .min_by_key(|sibling| sibling.id);

            match receiver {
                Some(mut receiver) => {
                    let carried = receiver.absorb(&line)?;
                    debug!(receiver = %receiver.id, carried = %carried, "balance transferred");
                    tx.save_line(receiver)?;
                }
                None => match self.config.retirement {
                    RetirementPolicy::RejectLastLine => return Err(LedgerError::LastLine(line_id)),
                    RetirementPolicy::Forfeit => {
                        if line.balance != Decimal::ZERO {
                            warn!(line_id = %line_id, forfeited = %line.balance, "last line retired, balance forfeited");
                        }
                    }
                },
            }

            tx.delete_line(line_id)?;
            Ok(())
        })
    }

    /// Rates a call on a line and records it. No money moves.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::LineNotFound`] - Line does not exist.
    /// - [`LedgerError::NoActiveTariff`] - Line has no tariff assigned.
    /// - [`LedgerError::TariffNotFound`] - Assigned tariff is missing from the catalog.
    #[instrument(name = "calltrack.ledger.rate_call", skip(self), err)]
    pub fn rate_call(
        &self,
        line_id: LineId,
        started_at: DateTime<Utc>,
        duration_minutes: u32,
        call_type: &str,
    ) -> Result<Call, LedgerError> {
        self.atomically("rate_call", |tx| {
            self.rater
                .rate(tx, line_id, started_at, duration_minutes, call_type)
        })
    }

    /// Like [`Ledger::rate_call`], addressing the line by phone number.
    #[instrument(name = "calltrack.ledger.rate_call_by_phone", skip(self), err)]
    pub fn rate_call_by_phone(
        &self,
        phone: &str,
        started_at: DateTime<Utc>,
        duration_minutes: u32,
        call_type: &str,
    ) -> Result<Call, LedgerError> {
        self.atomically("rate_call_by_phone", |tx| {
            let line = tx
                .line_by_phone(phone)?
                .ok_or_else(|| LedgerError::PhoneNotFound(phone.to_string()))?;
            self.rater
                .rate(tx, line.id, started_at, duration_minutes, call_type)
        })
    }

    /// Whether the account balance is negative.
    ///
    /// `allowed_credit_minutes` does not factor in.
    #[instrument(name = "calltrack.ledger.is_in_debt", skip(self), err)]
    pub fn is_in_debt(&self, account_id: AccountId) -> Result<bool, LedgerError> {
        Ok(self.account(account_id)?.is_in_debt())
    }

    pub fn account(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        self.atomically("account", |tx| {
            tx.account(account_id)?
                .ok_or(LedgerError::AccountNotFound(account_id))
        })
    }

    /// Looks up an account by email. Returns `None` if no account matches.
    pub fn account_by_email(&self, email: &str) -> Result<Option<Account>, LedgerError> {
        self.atomically("account_by_email", |tx| Ok(tx.account_by_email(email)?))
    }

    /// Looks up the account owning a phone number.
    pub fn account_by_phone(&self, phone: &str) -> Result<Account, LedgerError> {
        self.atomically("account_by_phone", |tx| {
            let line = tx
                .line_by_phone(phone)?
                .ok_or_else(|| LedgerError::PhoneNotFound(phone.to_string()))?;
            tx.account(line.account_id)?
                .ok_or(LedgerError::AccountNotFound(line.account_id))
        })
    }

    /// All accounts ordered by ID.
    pub fn accounts(&self) -> Result<Vec<Account>, LedgerError> {
        self.atomically("accounts", |tx| Ok(tx.accounts()?))
    }

    /// Accounts currently in debt, ordered by ID.
    #[instrument(name = "calltrack.ledger.debtors", skip(self), err)]
    pub fn debtors(&self) -> Result<Vec<Account>, LedgerError> {
        let mut accounts = self.accounts()?;
        accounts.retain(Account::is_in_debt);
        Ok(accounts)
    }

    pub fn line(&self, line_id: LineId) -> Result<Line, LedgerError> {
        self.atomically("line", |tx| {
            tx.line(line_id)?.ok_or(LedgerError::LineNotFound(line_id))
        })
    }

    pub fn line_by_phone(&self, phone: &str) -> Result<Line, LedgerError> {
        self.atomically("line_by_phone", |tx| {
            tx.line_by_phone(phone)?
                .ok_or_else(|| LedgerError::PhoneNotFound(phone.to_string()))
        })
    }

    /// Lines of an account ordered by ID.
    pub fn lines_of(&self, account_id: AccountId) -> Result<Vec<Line>, LedgerError> {
        self.atomically("lines_of", |tx| {
            if tx.account(account_id)?.is_none() {
                return Err(LedgerError::AccountNotFound(account_id));
            }
            Ok(tx.lines_of(account_id)?)
        })
    }

    /// Every rated call, newest first.
    pub fn calls(&self) -> Result<Vec<Call>, LedgerError> {
        let mut calls = self.atomically("calls", |tx| Ok(tx.calls()?))?;
        sort_newest_first(&mut calls, |call| (call.started_at, call.id));
        Ok(calls)
    }

    /// Calls placed on a line, newest first.
    ///
    /// Calls outlive their line, so a retired line still lists its history.
    /// An ID that never named a line yields an empty list.
    pub fn calls_of(&self, line_id: LineId) -> Result<Vec<Call>, LedgerError> {
        let mut calls = self.atomically("calls_of", |tx| Ok(tx.calls_of(line_id)?))?;
        sort_newest_first(&mut calls, |call| (call.started_at, call.id));
        Ok(calls)
    }

    /// Every journal entry, newest first.
    pub fn payments(&self) -> Result<Vec<Payment>, LedgerError> {
        let mut payments = self.atomically("payments", |tx| Ok(tx.payments()?))?;
        sort_newest_first(&mut payments, |payment| (payment.created_at, payment.id));
        Ok(payments)
    }

    /// Journal entries of an account, newest first.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AccountNotFound`] - Account does not exist.
    pub fn payments_of(&self, account_id: AccountId) -> Result<Vec<Payment>, LedgerError> {
        let mut payments = self.atomically("payments_of", |tx| {
            if tx.account(account_id)?.is_none() {
                return Err(LedgerError::AccountNotFound(account_id));
            }
            Ok(tx.payments_of(account_id)?)
        })?;
        sort_newest_first(&mut payments, |payment| (payment.created_at, payment.id));
        Ok(payments)
    }
}

fn sort_newest_first<T, K: Ord>(records: &mut [T], key: impl Fn(&T) -> K) {
    records.sort_by(|a, b| key(b).cmp(&key(a)));
}
