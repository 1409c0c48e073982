//! End-to-end flows through the coordinator: treasury, ledger, pledges, and
//! audit wired together the way the application assembles them.

use std::sync::Arc;

use custodia_audit::{AuditEventLog, AuditEventType, AuditLogConfig, AuditStatus};
use custodia_coordinator::{InMemoryPledgeStore, Pledge, PledgeStore, TransferCoordinator};
use custodia_core::{AccountId, Currency, LedgerError, LedgerResult, OperationId};
use custodia_ledger::{AccountCategory, CustodyLedger, LedgerConfig, ReservationTarget};
use custodia_treasury::{TreasuryConfig, TreasuryLedger};

struct Harness {
    audit: Arc<AuditEventLog>,
    treasury: Arc<TreasuryLedger>,
    ledger: Arc<CustodyLedger>,
    pledges: Arc<InMemoryPledgeStore>,
    coordinator: TransferCoordinator,
}

fn usd() -> Currency {
    Currency::new("USD").unwrap()
}

fn harness(treasury_usd: i64) -> Harness {
    custodia_observability::init();
    let audit = Arc::new(AuditEventLog::new(AuditLogConfig::default()));
    let treasury = Arc::new(TreasuryLedger::new(TreasuryConfig::default(), audit.clone()));
    treasury.deposit(&usd(), treasury_usd).unwrap();
    let ledger = Arc::new(CustodyLedger::new(
        LedgerConfig::default(),
        treasury.clone(),
        audit.clone(),
    ));
    let pledges = Arc::new(InMemoryPledgeStore::new());
    let coordinator = TransferCoordinator::new(
        ledger.clone(),
        audit.clone(),
        vec![pledges.clone() as Arc<dyn PledgeStore>],
    );
    Harness {
        audit,
        treasury,
        ledger,
        pledges,
        coordinator,
    }
}

#[test]
fn open_account_is_idempotent_per_operation_id() {
    let h = harness(10_000);
    let operation = OperationId::new();

    let first = h
        .coordinator
        .open_account(operation, &usd(), 1_000, AccountCategory::Blockchain)
        .unwrap();
    let second = h
        .coordinator
        .open_account(operation, &usd(), 1_000, AccountCategory::Blockchain)
        .unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(h.ledger.accounts().len(), 1);
    // Treasury debited exactly once.
    assert_eq!(h.treasury.balance(&usd()), 9_000);
}

#[test]
fn successful_transfer_writes_two_correlated_events() {
    let h = harness(10_000);
    let source = h
        .ledger
        .create_account(&usd(), 2_000, AccountCategory::Blockchain)
        .unwrap();
    let destination = h
        .ledger
        .create_account(&usd(), 500, AccountCategory::Banking)
        .unwrap();

    let receipt = h
        .coordinator
        .transfer(OperationId::new(), source.id, destination.id, 800)
        .unwrap();
    assert!(!receipt.replayed);
    assert_eq!(receipt.source_balance_after, 1_200);
    assert_eq!(receipt.destination_balance_after, 1_300);

    let correlated = h.audit.events_by_reference(&receipt.reference);
    assert_eq!(correlated.len(), 2);
    assert_eq!(correlated[0].event_type, AuditEventType::TransferCreated);
    assert_eq!(correlated[1].event_type, AuditEventType::TransferCompleted);
    assert!(correlated.iter().all(|e| e.status == AuditStatus::Completed));
}

#[test]
fn replayed_operation_does_not_move_funds_twice() {
    let h = harness(10_000);
    let source = h
        .ledger
        .create_account(&usd(), 2_000, AccountCategory::Blockchain)
        .unwrap();
    let destination = h
        .ledger
        .create_account(&usd(), 500, AccountCategory::Banking)
        .unwrap();

    let operation = OperationId::new();
    let first = h
        .coordinator
        .transfer(operation, source.id, destination.id, 300)
        .unwrap();
    let second = h
        .coordinator
        .transfer(operation, source.id, destination.id, 300)
        .unwrap();

    assert!(second.replayed);
    assert_eq!(second.reference, first.reference);
    assert_eq!(h.ledger.account(source.id).unwrap().total_balance, 1_700);
    assert_eq!(h.ledger.account(destination.id).unwrap().total_balance, 800);
    assert_eq!(h.audit.events_by_reference(&first.reference).len(), 2);
}

#[test]
fn rejected_transfer_leaves_one_failed_event_and_no_mutation() {
    // Insufficient available funds on the source side.
    let h = harness(10_000);
    let source = h
        .ledger
        .create_account(&usd(), 200, AccountCategory::Blockchain)
        .unwrap();
    let destination = h
        .ledger
        .create_account(&usd(), 500, AccountCategory::Banking)
        .unwrap();

    let err = h
        .coordinator
        .transfer(OperationId::new(), source.id, destination.id, 900)
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::InsufficientAvailableFunds {
            requested: 900,
            available: 200,
        }
    );

    assert_eq!(h.ledger.account(source.id).unwrap().total_balance, 200);
    assert_eq!(h.ledger.account(destination.id).unwrap().total_balance, 500);

    let failed: Vec<_> = h
        .audit
        .events_by_type(AuditEventType::TransferCreated)
        .into_iter()
        .filter(|e| e.status == AuditStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert!(h.audit.events_by_type(AuditEventType::TransferCompleted).is_empty());
}

#[test]
fn decommission_refunds_treasury_and_clears_pledges() {
    let h = harness(10_000);
    let account = h
        .ledger
        .create_account(&usd(), 1_500, AccountCategory::Blockchain)
        .unwrap();
    assert_eq!(h.treasury.balance(&usd()), 8_500);

    let reservation = h
        .ledger
        .reserve_funds(
            account.id,
            600,
            ReservationTarget::Tokenization {
                network: "Ethereum".to_string(),
                contract_address: Some("0xfeed".to_string()),
                token_amount: Some(600),
            },
        )
        .unwrap();
    h.pledges.register(Pledge::new(
        account.id,
        reservation.id,
        "Ethereum",
        "0xfeed",
        600,
    ));

    let report = h
        .coordinator
        .decommission_account(OperationId::new(), account.id)
        .unwrap();
    assert_eq!(report.refund.amount, 1_500);
    assert_eq!(report.cleared_pledges.len(), 1);
    assert!(h.pledges.is_empty());
    assert_eq!(h.treasury.balance(&usd()), 10_000);

    assert_eq!(h.audit.events_by_type(AuditEventType::PledgeCleanup).len(), 1);
    assert_eq!(h.audit.events_by_type(AuditEventType::AccountDeleted).len(), 1);
}

/// A registry whose cleanup sweep always fails, for exercising the
/// best-effort path.
struct UnreachablePledgeStore;

impl PledgeStore for UnreachablePledgeStore {
    fn name(&self) -> &str {
        "chain-registry"
    }

    fn register(&self, _pledge: Pledge) {}

    fn for_account(&self, _account: AccountId) -> Vec<Pledge> {
        Vec::new()
    }

    fn clear_for_account(&self, _account: AccountId) -> LedgerResult<Vec<Pledge>> {
        Err(LedgerError::timeout("chain-registry connection"))
    }

    fn len(&self) -> usize {
        0
    }
}

#[test]
fn failing_pledge_store_is_reported_without_aborting_deletion() {
    let audit = Arc::new(AuditEventLog::new(AuditLogConfig::default()));
    let treasury = Arc::new(TreasuryLedger::new(TreasuryConfig::default(), audit.clone()));
    treasury.deposit(&usd(), 10_000).unwrap();
    let ledger = Arc::new(CustodyLedger::new(
        LedgerConfig::default(),
        treasury.clone(),
        audit.clone(),
    ));
    let healthy = Arc::new(InMemoryPledgeStore::named("local-registry"));
    let coordinator = TransferCoordinator::new(
        ledger.clone(),
        audit.clone(),
        vec![
            healthy.clone() as Arc<dyn PledgeStore>,
            Arc::new(UnreachablePledgeStore),
        ],
    );

    let account = ledger
        .create_account(&usd(), 1_000, AccountCategory::Blockchain)
        .unwrap();
    let reservation = ledger
        .reserve_funds(
            account.id,
            400,
            ReservationTarget::Tokenization {
                network: "Ethereum".to_string(),
                contract_address: None,
                token_amount: None,
            },
        )
        .unwrap();
    healthy.register(Pledge::new(account.id, reservation.id, "Ethereum", "0xbeef", 400));

    let report = coordinator
        .decommission_account(OperationId::new(), account.id)
        .unwrap();

    // Deletion and refund succeeded despite the broken store.
    assert_eq!(report.refund.amount, 1_000);
    assert_eq!(treasury.balance(&usd()), 10_000);
    assert_eq!(report.cleared_pledges.len(), 1);
    assert_eq!(report.cleanup_errors.len(), 1);
    assert_eq!(report.cleanup_errors[0].store, "chain-registry");

    let cleanup = audit.events_by_type(AuditEventType::PledgeCleanup);
    assert_eq!(cleanup.len(), 1);
    assert_eq!(cleanup[0].status, AuditStatus::Failed);
    assert_eq!(cleanup[0].metadata["cleanup_errors"][0]["store"], "chain-registry");
}

#[test]
fn repeated_decommission_replays_instead_of_failing() {
    let h = harness(10_000);
    let account = h
        .ledger
        .create_account(&usd(), 700, AccountCategory::Banking)
        .unwrap();

    let operation = OperationId::new();
    let first = h
        .coordinator
        .decommission_account(operation, account.id)
        .unwrap();
    let second = h
        .coordinator
        .decommission_account(operation, account.id)
        .unwrap();

    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(second.refund, first.refund);
    // The refund happened exactly once.
    assert_eq!(h.treasury.balance(&usd()), 10_000);

    // A fresh operation id on the gone account is a real failure.
    let err = h
        .coordinator
        .decommission_account(OperationId::new(), account.id)
        .unwrap_err();
    assert_eq!(err, LedgerError::AccountNotFound(account.id));
}

#[test]
fn operation_id_is_bound_to_its_operation_kind() {
    let h = harness(10_000);
    let a = h
        .ledger
        .create_account(&usd(), 1_000, AccountCategory::Blockchain)
        .unwrap();
    let b = h
        .ledger
        .create_account(&usd(), 1_000, AccountCategory::Blockchain)
        .unwrap();

    let operation = OperationId::new();
    h.coordinator.transfer(operation, a.id, b.id, 100).unwrap();

    let err = h
        .coordinator
        .decommission_account(operation, a.id)
        .unwrap_err();
    assert!(matches!(err, LedgerError::Internal(_)));
    assert!(h.ledger.account(a.id).is_ok());
}
