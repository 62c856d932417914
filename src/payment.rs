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

//! Payment journal entries.
//!
//! A [`Payment`] is written in the same transaction that credits its line and
//! account, and is never edited or removed afterwards.

use crate::base::{AccountId, LineId, PaymentId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub account_id: AccountId,
    pub line_id: LineId,
    /// Always positive.
    pub amount: Decimal,
    /// Payment method tag as supplied by the caller, e.g. `"CARD"`.
    pub method: String,
    /// Account balance right after this payment was applied.
    pub balance_after: Decimal,
    pub created_at: DateTime<Utc>,
}
