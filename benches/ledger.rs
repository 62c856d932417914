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

//! Benchmarks for the billing ledger.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - Single-threaded payment application and call rating
//! - Multi-threaded payments against one account and across many accounts
//! - Line retirement with balance consolidation

use calltrack_ledger::{
    AccountId, Ledger, LineId, NewAccount, Tariff, TariffCatalog, TariffId,
};
use chrono::Utc;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rayon::prelude::*;
use rust_decimal::Decimal;
use std::hint::black_box;
use std::sync::Arc;

// =============================================================================
// Helper Functions
// =============================================================================

fn make_ledger() -> Ledger {
    let catalog = TariffCatalog::new();
    catalog
        .publish(Tariff::new(TariffId(1), "Basic", Decimal::new(250, 2)))
        .unwrap();
    Ledger::in_memory(Arc::new(catalog))
}

fn open_account(ledger: &Ledger, n: usize, lines: usize) -> (AccountId, Vec<LineId>) {
    let account = ledger
        .register_account(NewAccount::new("Bench", format!("bench{n}@example.com")))
        .unwrap();
    let line_ids = (0..lines)
        .map(|i| {
            let line = ledger
                .register_line(account.id, &format!("+1{n:05}{i:04}"), "bench")
                .unwrap();
            ledger.assign_tariff(line.id, TariffId(1)).unwrap();
            line.id
        })
        .collect();
    (account.id, line_ids)
}

// =============================================================================
// Single-Threaded Benchmarks
// =============================================================================

fn bench_single_payment(c: &mut Criterion) {
    let ledger = make_ledger();
    let (account_id, lines) = open_account(&ledger, 0, 1);

    c.bench_function("single_payment", |b| {
        b.iter(|| {
            ledger
                .apply_payment(lines[0], account_id, black_box(Decimal::ONE), "CARD")
                .unwrap();
        })
    });
}

fn bench_rate_call(c: &mut Criterion) {
    let ledger = make_ledger();
    let (_, lines) = open_account(&ledger, 0, 1);

    c.bench_function("rate_call", |b| {
        b.iter(|| {
            ledger
                .rate_call(lines[0], Utc::now(), black_box(45), "local")
                .unwrap();
        })
    });
}

fn bench_payment_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("payment_throughput");

    for count in [100, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let ledger = make_ledger();
                let (account_id, lines) = open_account(&ledger, 0, 1);
                for _ in 0..count {
                    ledger
                        .apply_payment(lines[0], account_id, Decimal::ONE, "CARD")
                        .unwrap();
                }
                black_box(&ledger);
            })
        });
    }
    group.finish();
}

fn bench_retire_line(c: &mut Criterion) {
    c.bench_function("retire_line", |b| {
        b.iter(|| {
            let ledger = make_ledger();
            let (account_id, lines) = open_account(&ledger, 0, 4);
            for line_id in &lines {
                ledger
                    .apply_payment(*line_id, account_id, Decimal::TEN, "CARD")
                    .unwrap();
            }
            ledger.retire_line(black_box(lines[3])).unwrap();
        })
    });
}

// =============================================================================
// Multi-Threaded Benchmarks
// =============================================================================

fn bench_parallel_payments_same_account(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_payments_same_account");

    for count in [1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let ledger = make_ledger();
                let (account_id, lines) = open_account(&ledger, 0, 4);
                (0..count).into_par_iter().for_each(|i| {
                    ledger
                        .apply_payment(lines[i % lines.len()], account_id, Decimal::ONE, "CARD")
                        .unwrap();
                });
                black_box(&ledger);
            })
        });
    }
    group.finish();
}

fn bench_parallel_payments_many_accounts(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_payments_many_accounts");

    for accounts in [10, 100].iter() {
        group.throughput(Throughput::Elements((*accounts * 100) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(accounts),
            accounts,
            |b, &accounts| {
                b.iter(|| {
                    let ledger = make_ledger();
                    let opened: Vec<_> = (0..accounts)
                        .map(|n| open_account(&ledger, n, 1))
                        .collect();
                    opened.par_iter().for_each(|(account_id, lines)| {
                        for _ in 0..100 {
                            ledger
                                .apply_payment(lines[0], *account_id, Decimal::ONE, "CARD")
                                .unwrap();
                        }
                    });
                    black_box(&ledger);
                })
            },
        );
    }
    group.finish();
}

criterion_group!(
    single_threaded,
    bench_single_payment,
    bench_rate_call,
    bench_payment_throughput,
    bench_retire_line,
);

criterion_group!(
    multi_threaded,
    bench_parallel_payments_same_account,
    bench_parallel_payments_many_accounts,
);

criterion_main!(single_threaded, multi_threaded);
