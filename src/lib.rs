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

//! # CallTrack Ledger
//!
//! Billing ledger for metered phone lines: it rates calls against tariffs,
//! applies payments to line and account balances, and consolidates balances
//! when a line is retired.
//!
//! ## Core Components
//!
//! - [`Ledger`]: Transactional engine; the only component that moves money
//! - [`TariffCatalog`]: Insert-only price list
//! - [`CallRater`]: Prices calls against a line's active tariff
//! - [`Store`] / [`Transaction`]: Persistence boundary, with [`MemoryStore`] bundled
//! - [`LedgerError`]: Error types, classified by [`ErrorKind`]
//!
//! ## Example
//!
//! ```
//! use calltrack_ledger::{Ledger, NewAccount, Tariff, TariffCatalog, TariffId};
//! use chrono::Utc;
//! use rust_decimal_macros::dec;
//! use std::sync::Arc;
//!
//! let catalog = TariffCatalog::new();
//! catalog.publish(Tariff::new(TariffId(1), "Basic", dec!(2.50))).unwrap();
//! let ledger = Ledger::in_memory(Arc::new(catalog));
//!
//! let account = ledger.register_account(NewAccount::new("Ada", "ada@example.com")).unwrap();
//! let line = ledger.register_line(account.id, "+15550100", "home").unwrap();
//! assert!(line.primary);
//!
//! let payment = ledger.apply_payment(line.id, account.id, dec!(20.00), "CARD").unwrap();
//! assert_eq!(payment.balance_after, dec!(20.00));
//!
//! ledger.assign_tariff(line.id, TariffId(1)).unwrap();
//! let call = ledger.rate_call(line.id, Utc::now(), 45, "local").unwrap();
//! assert_eq!(call.cost, dec!(112.50));
//! ```
//!
//! ## Thread Safety
//!
//! [`Ledger`] is `Sync` for any [`Store`]; share it behind an `Arc` across
//! request workers. Each operation is one serializable store transaction.

pub mod account;
mod base;
mod call;
mod config;
mod engine;
pub mod error;
mod line;
mod memory;
mod payment;
pub mod store;
mod tariff;

pub use account::{Account, AccountStatus, NewAccount};
pub use base::{AccountId, CallId, LineId, PaymentId, TariffId};
pub use call::{Call, CallRater};
pub use config::{LedgerConfig, RetirementPolicy};
pub use engine::Ledger;
pub use error::{ErrorKind, LedgerError, StoreError};
pub use line::Line;
pub use memory::MemoryStore;
pub use payment::Payment;
pub use store::{Sequence, Store, Transaction};
pub use tariff::{Tariff, TariffCatalog};
