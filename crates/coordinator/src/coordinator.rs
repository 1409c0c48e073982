use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use custodia_audit::{AuditDraft, AuditEventLog, AuditEventType, AuditModule, AuditStatus};
use custodia_core::{AccountId, Currency, LedgerError, LedgerResult, OperationId};
use custodia_ledger::{AccountCategory, CustodyAccount, CustodyLedger, Refund};

use crate::pledges::{Pledge, PledgeStore};

/// Outcome of a completed transfer, returned to the caller and replayed on
/// retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub operation: OperationId,
    /// Correlation reference shared by both audit events of the transfer.
    pub reference: String,
    pub source: AccountId,
    pub destination: AccountId,
    pub currency: Currency,
    pub amount: i64,
    pub source_balance_after: i64,
    pub destination_balance_after: i64,
    /// True when this receipt was served from the outcome cache rather than
    /// by executing the transfer again.
    pub replayed: bool,
}

/// A pledge store that failed its cleanup sweep. The deletion itself still
/// succeeds; these surface in the report and the audit trail for followup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PledgeCleanupError {
    pub store: String,
    pub error: String,
}

/// Outcome of a completed decommissioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionReport {
    pub operation: OperationId,
    pub refund: Refund,
    pub cleared_pledges: Vec<Pledge>,
    pub cleanup_errors: Vec<PledgeCleanupError>,
    pub replayed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationOutcome {
    Creation(CustodyAccount),
    Transfer(TransferReceipt),
    Deletion(DeletionReport),
}

/// Orchestrates operations that span the custody ledger, the pledge registry,
/// and the audit log.
///
/// Only successful outcomes enter the replay cache; a failed attempt may be
/// retried with the same `OperationId`. A completed operation replayed with
/// the same id returns its stored outcome without moving funds again.
pub struct TransferCoordinator {
    ledger: Arc<CustodyLedger>,
    audit: Arc<AuditEventLog>,
    pledges: Vec<Arc<dyn PledgeStore>>,
    outcomes: Mutex<HashMap<OperationId, OperationOutcome>>,
}

impl TransferCoordinator {
    pub fn new(
        ledger: Arc<CustodyLedger>,
        audit: Arc<AuditEventLog>,
        pledges: Vec<Arc<dyn PledgeStore>>,
    ) -> Self {
        Self {
            ledger,
            audit,
            pledges,
            outcomes: Mutex::new(HashMap::new()),
        }
    }

    /// Open a new custody account funded from the treasury.
    ///
    /// Thin idempotent wrapper over the ledger: the treasury debit, the
    /// compensating credit on a failed insert, and the `ACCOUNT_CREATED`
    /// audit event all happen inside `CustodyLedger::create_account`.
    pub fn open_account(
        &self,
        operation: OperationId,
        currency: &Currency,
        amount: i64,
        category: AccountCategory,
    ) -> LedgerResult<CustodyAccount> {
        if let Some(outcome) = self.cached(operation) {
            return match outcome {
                OperationOutcome::Creation(account) => Ok(account),
                _ => Err(LedgerError::internal(format!(
                    "operation {operation} was already used for a different operation"
                ))),
            };
        }

        let account = self.ledger.create_account(currency, amount, category)?;
        tracing::info!(%operation, account = %account.id, %currency, amount, "account opened");
        self.store(operation, OperationOutcome::Creation(account.clone()));
        Ok(account)
    }

    /// Same-currency movement between two custody accounts.
    ///
    /// On success the audit log gains exactly two events — `TRANSFER_CREATED`
    /// on the source side, `TRANSFER_COMPLETED` on the destination side —
    /// sharing one correlation reference. A rejected transfer gains exactly
    /// one failed `TRANSFER_CREATED` event and leaves both accounts untouched.
    pub fn transfer(
        &self,
        operation: OperationId,
        source: AccountId,
        destination: AccountId,
        amount: i64,
    ) -> LedgerResult<TransferReceipt> {
        if let Some(outcome) = self.cached(operation) {
            return match outcome {
                OperationOutcome::Transfer(receipt) => Ok(TransferReceipt {
                    replayed: true,
                    ..receipt
                }),
                _ => Err(LedgerError::internal(format!(
                    "operation {operation} was already used for a different operation"
                ))),
            };
        }

        let reference = format!("TRF-{operation}");
        match self.ledger.transfer_between(source, destination, amount, &reference) {
            Ok(applied) => {
                self.audit.record(
                    AuditDraft::new(
                        AuditEventType::TransferCreated,
                        AuditModule::TransferCoordinator,
                        format!(
                            "Transfer of {} {} from {} to {}",
                            applied.currency, amount, applied.source_number,
                            applied.destination_number
                        ),
                    )
                    .amount(amount, &applied.currency)
                    .account(source)
                    .reference(reference.clone())
                    .meta("from_balance", applied.source_total_before)
                    .meta("to_balance", applied.source_total_after)
                    .meta("counterparty", applied.destination_number.clone()),
                );
                self.audit.record(
                    AuditDraft::new(
                        AuditEventType::TransferCompleted,
                        AuditModule::TransferCoordinator,
                        format!(
                            "Transfer {} settled into {}",
                            reference, applied.destination_number
                        ),
                    )
                    .amount(amount, &applied.currency)
                    .account(destination)
                    .reference(reference.clone())
                    .meta("from_balance", applied.destination_total_before)
                    .meta("to_balance", applied.destination_total_after)
                    .meta("counterparty", applied.source_number.clone()),
                );
                tracing::info!(%operation, %source, %destination, amount, "transfer settled");

                let receipt = TransferReceipt {
                    operation,
                    reference,
                    source,
                    destination,
                    currency: applied.currency,
                    amount,
                    source_balance_after: applied.source_total_after,
                    destination_balance_after: applied.destination_total_after,
                    replayed: false,
                };
                self.store(operation, OperationOutcome::Transfer(receipt.clone()));
                Ok(receipt)
            }
            Err(err) => {
                self.audit.record(
                    AuditDraft::new(
                        AuditEventType::TransferCreated,
                        AuditModule::TransferCoordinator,
                        format!("Transfer {reference} rejected: {err}"),
                    )
                    .account(source)
                    .reference(reference)
                    .status(AuditStatus::Failed),
                );
                tracing::warn!(%operation, %source, %destination, amount, error = %err, "transfer rejected");
                Err(err)
            }
        }
    }

    /// Delete an account, refund its full balance to the treasury, and sweep
    /// every registered pledge store for pledges against it.
    ///
    /// The sweep is best-effort: a store that fails its cleanup does not
    /// abort the deletion; its error lands in the report and the audit
    /// trail. The ledger writes the `ACCOUNT_DELETED` event; the sweep adds
    /// a `PLEDGE_CLEANUP` event when anything was cleared or any store
    /// failed.
    pub fn decommission_account(
        &self,
        operation: OperationId,
        account_id: AccountId,
    ) -> LedgerResult<DeletionReport> {
        if let Some(outcome) = self.cached(operation) {
            return match outcome {
                OperationOutcome::Deletion(report) => Ok(DeletionReport {
                    replayed: true,
                    ..report
                }),
                _ => Err(LedgerError::internal(format!(
                    "operation {operation} was already used for a different operation"
                ))),
            };
        }

        let refund = self.ledger.delete_account(account_id)?;

        let mut cleared = Vec::new();
        let mut cleanup_errors = Vec::new();
        for store in &self.pledges {
            match store.clear_for_account(account_id) {
                Ok(mut batch) => cleared.append(&mut batch),
                Err(err) => {
                    tracing::warn!(
                        store = store.name(),
                        %account_id,
                        error = %err,
                        "pledge cleanup failed for deleted account"
                    );
                    cleanup_errors.push(PledgeCleanupError {
                        store: store.name().to_string(),
                        error: err.to_string(),
                    });
                }
            }
        }

        if !cleared.is_empty() || !cleanup_errors.is_empty() {
            let total: i64 = cleared.iter().map(|p| p.amount).sum();
            let mut draft = AuditDraft::new(
                AuditEventType::PledgeCleanup,
                AuditModule::TransferCoordinator,
                format!(
                    "{} pledge(s) cleared, {} store(s) failed for deleted account {}",
                    cleared.len(),
                    cleanup_errors.len(),
                    refund.account_number
                ),
            )
            .amount(total, &refund.currency)
            .account(account_id)
            .reference(refund.account_number.clone())
            .meta("pledge_count", cleared.len() as i64);
            if !cleanup_errors.is_empty() {
                let errors: Vec<serde_json::Value> = cleanup_errors
                    .iter()
                    .map(|e| {
                        serde_json::json!({ "store": e.store, "error": e.error })
                    })
                    .collect();
                draft = draft
                    .meta("cleanup_errors", serde_json::Value::Array(errors))
                    .status(AuditStatus::Failed);
            }
            self.audit.record(draft);
        }
        tracing::info!(
            %operation,
            %account_id,
            refund = refund.amount,
            pledges_cleared = cleared.len(),
            cleanup_failures = cleanup_errors.len(),
            "account decommissioned"
        );

        let report = DeletionReport {
            operation,
            refund,
            cleared_pledges: cleared,
            cleanup_errors,
            replayed: false,
        };
        self.store(operation, OperationOutcome::Deletion(report.clone()));
        Ok(report)
    }

    /// Stored outcome for an operation id, if it completed.
    pub fn outcome(&self, operation: OperationId) -> Option<OperationOutcome> {
        self.cached(operation)
    }

    fn cached(&self, operation: OperationId) -> Option<OperationOutcome> {
        let outcomes = self.outcomes.lock().unwrap_or_else(|e| e.into_inner());
        outcomes.get(&operation).cloned()
    }

    fn store(&self, operation: OperationId, outcome: OperationOutcome) {
        let mut outcomes = self.outcomes.lock().unwrap_or_else(|e| e.into_inner());
        outcomes.insert(operation, outcome);
    }
}
