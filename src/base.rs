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

//! Identifier types for ledger records.
//!
//! Records reference each other by identifier only; loading the referenced
//! record is always an explicit store lookup.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! ledger_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

ledger_id!(
    /// Unique identifier for a subscriber account.
    AccountId
);

ledger_id!(
    /// Unique identifier for a phone line.
    ///
    /// Line identifiers are allocated in increasing order, so the lowest
    /// identifier among an account's lines is also its oldest line.
    LineId
);

ledger_id!(
    /// Unique identifier for a published tariff.
    TariffId
);

ledger_id!(
    /// Unique identifier for a rated call.
    CallId
);

ledger_id!(
    /// Unique identifier for a payment journal entry.
    PaymentId
);
