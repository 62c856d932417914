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

//! Ledger configuration.

/// What happens when an account's last remaining line is retired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetirementPolicy {
    /// Retire the line and discard its residual balance.
    #[default]
    Forfeit,
    /// Refuse with [`LedgerError::LastLine`](crate::LedgerError::LastLine).
    RejectLastLine,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Attempts per operation when the store reports a transient conflict.
    pub max_attempts: u32,
    pub retirement: RetirementPolicy,
}

impl LedgerConfig {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_retirement(mut self, retirement: RetirementPolicy) -> Self {
        self.retirement = retirement;
        self
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            retirement: RetirementPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.retirement, RetirementPolicy::Forfeit);
    }

    #[test]
    fn at_least_one_attempt() {
        assert_eq!(LedgerConfig::default().with_max_attempts(0).max_attempts, 1);
    }
}
