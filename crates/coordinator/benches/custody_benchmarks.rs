use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use std::sync::Arc;

use custodia_audit::{AuditEventLog, AuditLogConfig};
use custodia_coordinator::{InMemoryPledgeStore, PledgeStore, TransferCoordinator};
use custodia_core::{Currency, OperationId};
use custodia_ledger::{AccountCategory, CustodyLedger, LedgerConfig};
use custodia_treasury::{TreasuryConfig, TreasuryLedger};

fn usd() -> Currency {
    Currency::new("USD").unwrap()
}

fn setup(treasury_usd: i64) -> (Arc<CustodyLedger>, TransferCoordinator) {
    let audit = Arc::new(AuditEventLog::new(AuditLogConfig::default()));
    let treasury = Arc::new(TreasuryLedger::new(TreasuryConfig::default(), audit.clone()));
    treasury.deposit(&usd(), treasury_usd).unwrap();
    let ledger = Arc::new(CustodyLedger::new(
        LedgerConfig::default(),
        treasury,
        audit.clone(),
    ));
    let pledges = Arc::new(InMemoryPledgeStore::new()) as Arc<dyn PledgeStore>;
    let coordinator = TransferCoordinator::new(ledger.clone(), audit, vec![pledges]);
    (ledger, coordinator)
}

fn bench_account_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("account_creation");
    group.throughput(Throughput::Elements(1));
    group.bench_function("create_funded_account", |b| {
        let (ledger, _) = setup(i64::MAX / 2);
        b.iter(|| {
            ledger
                .create_account(black_box(&usd()), black_box(1_000), AccountCategory::Blockchain)
                .unwrap()
        });
    });
    group.finish();
}

fn bench_transfer_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("transfer");
    group.throughput(Throughput::Elements(1));

    for accounts in [2usize, 16, 128] {
        group.bench_with_input(
            BenchmarkId::new("coordinated_transfer", accounts),
            &accounts,
            |b, &accounts| {
                let (ledger, coordinator) = setup(i64::MAX / 2);
                let ids: Vec<_> = (0..accounts)
                    .map(|_| {
                        ledger
                            .create_account(&usd(), 1_000_000_000, AccountCategory::Blockchain)
                            .unwrap()
                            .id
                    })
                    .collect();
                let mut i = 0usize;
                b.iter(|| {
                    let source = ids[i % ids.len()];
                    let destination = ids[(i + 1) % ids.len()];
                    i += 1;
                    coordinator
                        .transfer(OperationId::new(), source, destination, black_box(1))
                        .unwrap()
                });
            },
        );
    }
    group.finish();
}

fn bench_statement_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("statement");
    group.throughput(Throughput::Elements(1));
    group.bench_function("add_funds_with_capped_statement", |b| {
        let (ledger, _) = setup(i64::MAX / 2);
        let account = ledger
            .create_account(&usd(), 1_000, AccountCategory::Banking)
            .unwrap();
        b.iter(|| {
            ledger
                .add_funds(account.id, black_box(1), "bench credit", None)
                .unwrap()
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_account_creation,
    bench_transfer_latency,
    bench_statement_append
);
criterion_main!(benches);
