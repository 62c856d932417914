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

use calltrack_ledger::{
    AccountId, Ledger, LedgerConfig, LedgerError, LineId, NewAccount, RetirementPolicy, Tariff,
    TariffCatalog, TariffId,
};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// CallTrack Ledger - Replay ledger command CSV files
///
/// Reads ledger commands from a CSV file, applies them in order, and writes
/// the resulting balances to stdout.
#[derive(Parser, Debug)]
#[command(name = "calltrack-ledger")]
#[command(about = "Replays billing ledger commands and reports balances", long_about = None)]
struct Args {
    /// Path to CSV file with ledger commands
    ///
    /// Expected format: type,account,line,tariff,amount,minutes,text
    /// Example: cargo run -- commands.csv > accounts.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Which records to report
    #[arg(long, value_enum, default_value_t = Report::Accounts)]
    report: Report,

    /// Attempts per command on transient store conflicts
    #[arg(long, default_value_t = LedgerConfig::DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Refuse to retire an account's last line instead of forfeiting its balance
    #[arg(long)]
    reject_last_line: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Report {
    Accounts,
    Lines,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let retirement = if args.reject_last_line {
        RetirementPolicy::RejectLastLine
    } else {
        RetirementPolicy::Forfeit
    };
    let config = LedgerConfig::default()
        .with_max_attempts(args.max_attempts)
        .with_retirement(retirement);

    let ledger = match process_commands(BufReader::new(file), config) {
        Ok(ledger) => ledger,
        Err(e) => {
            eprintln!("Error processing commands: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = write_report(&ledger, args.report, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `type, account, line, tariff, amount, minutes, text`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(rename = "type")]
    kind: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    account: Option<u64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    line: Option<u64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    tariff: Option<u64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
    #[serde(deserialize_with = "csv::invalid_option")]
    minutes: Option<u32>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    /// `text` is the email; it doubles as the display name.
    OpenAccount { email: String },
    /// `amount` is the price per minute, `text` the tariff name.
    PublishTariff {
        tariff: TariffId,
        price: Decimal,
        name: String,
    },
    /// `text` is the phone number.
    RegisterLine { account: AccountId, phone: String },
    AssignTariff { line: LineId, tariff: TariffId },
    /// `text` is the payment method.
    Payment {
        line: LineId,
        account: AccountId,
        amount: Decimal,
        method: String,
    },
    /// `text` is the call type.
    Call {
        line: LineId,
        minutes: u32,
        call_type: String,
    },
    Retire { line: LineId },
}

impl CsvRecord {
    /// Converts a CSV record to a command.
    ///
    /// Returns `None` for unknown types or missing required fields.
    fn into_command(self) -> Option<Command> {
        let account = self.account.map(AccountId);
        let line = self.line.map(LineId);
        let tariff = self.tariff.map(TariffId);
        let text = self.text.filter(|t| !t.is_empty());

        match self.kind.to_lowercase().as_str() {
            "account" => Some(Command::OpenAccount { email: text? }),
            "tariff" => Some(Command::PublishTariff {
                tariff: tariff?,
                price: self.amount?,
                name: text.unwrap_or_default(),
            }),
            "line" => Some(Command::RegisterLine {
                account: account?,
                phone: text?,
            }),
            "assign" => Some(Command::AssignTariff {
                line: line?,
                tariff: tariff?,
            }),
            "payment" => Some(Command::Payment {
                line: line?,
                account: account?,
                amount: self.amount?,
                method: text.unwrap_or_else(|| "UNSPECIFIED".to_string()),
            }),
            "call" => Some(Command::Call {
                line: line?,
                minutes: self.minutes?,
                call_type: text.unwrap_or_else(|| "local".to_string()),
            }),
            "retire" => Some(Command::Retire { line: line? }),
            _ => None,
        }
    }
}

fn apply(ledger: &Ledger, command: Command) -> Result<(), LedgerError> {
    match command {
        Command::OpenAccount { email } => {
            ledger.register_account(NewAccount::new(email.clone(), email))?;
        }
        Command::PublishTariff {
            tariff,
            price,
            name,
        } => {
            ledger.catalog().publish(Tariff::new(tariff, name, price))?;
        }
        Command::RegisterLine { account, phone } => {
            ledger.register_line(account, &phone, &phone)?;
        }
        Command::AssignTariff { line, tariff } => {
            ledger.assign_tariff(line, tariff)?;
        }
        Command::Payment {
            line,
            account,
            amount,
            method,
        } => {
            ledger.apply_payment(line, account, amount, &method)?;
        }
        Command::Call {
            line,
            minutes,
            call_type,
        } => {
            ledger.rate_call(line, Utc::now(), minutes, &call_type)?;
        }
        Command::Retire { line } => ledger.retire_line(line)?,
    }
    Ok(())
}

/// Replays ledger commands from a CSV reader.
///
/// Rows are streamed, so arbitrarily large files are fine. Malformed rows
/// and failed commands are logged and skipped.
///
/// # CSV Format
///
/// Expected columns: `type, account, line, tariff, amount, minutes, text`
///
/// ```csv
/// type,account,line,tariff,amount,minutes,text
/// tariff,,,1,2.50,,Basic
/// account,,,,,,ada@example.com
/// line,1,,,,,+15550100
/// assign,,1,1,,,
/// payment,1,1,,20.00,,CARD
/// call,,1,,,45,local
/// ```
///
/// Account and line IDs are assigned from 1 in registration order.
///
/// # Errors
///
/// Returns a CSV error if the reader fails.
pub fn process_commands<R: Read>(reader: R, config: LedgerConfig) -> Result<Ledger, csv::Error> {
    let ledger = Ledger::with_config(
        calltrack_ledger::MemoryStore::new(),
        Arc::new(TariffCatalog::new()),
        config,
    );

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for (row, result) in rdr.deserialize::<CsvRecord>().enumerate() {
        match result {
            Ok(record) => {
                let Some(command) = record.into_command() else {
                    tracing::warn!(row, "skipping invalid command record");
                    continue;
                };
                if let Err(e) = apply(&ledger, command) {
                    tracing::warn!(row, error = %e, "skipping failed command");
                }
            }
            Err(e) => {
                tracing::warn!(row, error = %e, "skipping malformed row");
            }
        }
    }

    Ok(ledger)
}

const DECIMAL_PRECISION: u32 = 4;

#[derive(Debug, Serialize)]
struct AccountRow {
    account: AccountId,
    email: String,
    balance: Decimal,
    in_debt: bool,
    lines: usize,
}

#[derive(Debug, Serialize)]
struct LineRow {
    line: LineId,
    account: AccountId,
    phone: String,
    primary: bool,
    balance: Decimal,
    tariff: Option<TariffId>,
}

/// Writes the requested report as CSV with 4 decimal precision.
///
/// # CSV Format
///
/// Accounts: `account, email, balance, in_debt, lines`
/// Lines: `line, account, phone, primary, balance, tariff`
fn write_report<W: Write>(ledger: &Ledger, report: Report, writer: W) -> Result<(), CliError> {
    let mut wtr = Writer::from_writer(writer);

    for account in ledger.accounts()? {
        let lines = ledger.lines_of(account.id)?;
        match report {
            Report::Accounts => wtr.serialize(AccountRow {
                account: account.id,
                email: account.email.clone(),
                balance: account.balance.round_dp(DECIMAL_PRECISION),
                in_debt: account.is_in_debt(),
                lines: lines.len(),
            })?,
            Report::Lines => {
                for line in lines {
                    wtr.serialize(LineRow {
                        line: line.id,
                        account: line.account_id,
                        phone: line.phone,
                        primary: line.primary,
                        balance: line.balance.round_dp(DECIMAL_PRECISION),
                        tariff: line.tariff_id,
                    })?;
                }
            }
        }
    }

    wtr.flush()?;
    Ok(())
}
