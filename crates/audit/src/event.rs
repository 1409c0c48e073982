use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use custodia_core::{AccountId, AuditEventId, Currency};

/// Terminal/progress status of the audited operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

/// Which store originated the event.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditModule {
    CustodyAccounts,
    Treasury,
    TransferCoordinator,
    System,
}

impl core::fmt::Display for AuditModule {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            AuditModule::CustodyAccounts => "CUSTODY_ACCOUNTS",
            AuditModule::Treasury => "TREASURY",
            AuditModule::TransferCoordinator => "TRANSFER_COORDINATOR",
            AuditModule::System => "SYSTEM",
        };
        f.write_str(s)
    }
}

/// Operation type, one per balance-affecting operation in the system.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    AccountCreated,
    AccountDeleted,
    FundsAdded,
    FundsWithdrawn,
    FundsReserved,
    ReservationConfirmed,
    ReservationReleased,
    ReservationCompleted,
    ReservationOverride,
    TransferCreated,
    TransferCompleted,
    TreasuryDeposit,
    TreasuryWithdrawal,
    PledgeCleanup,
}

impl core::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            AuditEventType::AccountCreated => "ACCOUNT_CREATED",
            AuditEventType::AccountDeleted => "ACCOUNT_DELETED",
            AuditEventType::FundsAdded => "FUNDS_ADDED",
            AuditEventType::FundsWithdrawn => "FUNDS_WITHDRAWN",
            AuditEventType::FundsReserved => "FUNDS_RESERVED",
            AuditEventType::ReservationConfirmed => "RESERVATION_CONFIRMED",
            AuditEventType::ReservationReleased => "RESERVATION_RELEASED",
            AuditEventType::ReservationCompleted => "RESERVATION_COMPLETED",
            AuditEventType::ReservationOverride => "RESERVATION_OVERRIDE",
            AuditEventType::TransferCreated => "TRANSFER_CREATED",
            AuditEventType::TransferCompleted => "TRANSFER_COMPLETED",
            AuditEventType::TreasuryDeposit => "TREASURY_DEPOSIT",
            AuditEventType::TreasuryWithdrawal => "TREASURY_WITHDRAWAL",
            AuditEventType::PledgeCleanup => "PLEDGE_CLEANUP",
        };
        f.write_str(s)
    }
}

/// Immutable audit record. Never mutated after creation; eligible for
/// archival once the log exceeds its capacity (oldest first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: AuditEventId,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub module: AuditModule,
    pub description: String,
    pub amount: Option<i64>,
    pub currency: Option<Currency>,
    pub account_id: Option<AccountId>,
    /// Free-form correlating reference (transfer id, reservation id, ...).
    pub reference: Option<String>,
    pub status: AuditStatus,
    /// Before/after balances and other operation context.
    pub metadata: Map<String, Value>,
}

/// Builder for a not-yet-recorded audit event.
#[derive(Debug, Clone)]
pub struct AuditDraft {
    pub event_type: AuditEventType,
    pub module: AuditModule,
    pub description: String,
    pub amount: Option<i64>,
    pub currency: Option<Currency>,
    pub account_id: Option<AccountId>,
    pub reference: Option<String>,
    pub status: AuditStatus,
    pub metadata: Map<String, Value>,
}

impl AuditDraft {
    pub fn new(
        event_type: AuditEventType,
        module: AuditModule,
        description: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            module,
            description: description.into(),
            amount: None,
            currency: None,
            account_id: None,
            reference: None,
            status: AuditStatus::Completed,
            metadata: Map::new(),
        }
    }

    pub fn amount(mut self, amount: i64, currency: &Currency) -> Self {
        self.amount = Some(amount);
        self.currency = Some(currency.clone());
        self
    }

    pub fn account(mut self, account_id: AccountId) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn status(mut self, status: AuditStatus) -> Self {
        self.status = status;
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub(crate) fn into_event(self) -> AuditEvent {
        AuditEvent {
            id: AuditEventId::new(),
            timestamp: Utc::now(),
            event_type: self.event_type,
            module: self.module,
            description: self.description,
            amount: self.amount,
            currency: self.currency,
            account_id: self.account_id,
            reference: self.reference,
            status: self.status,
            metadata: self.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_defaults_to_completed() {
        let event = AuditDraft::new(
            AuditEventType::FundsAdded,
            AuditModule::CustodyAccounts,
            "capital added",
        )
        .into_event();
        assert_eq!(event.status, AuditStatus::Completed);
        assert!(event.metadata.is_empty());
    }

    #[test]
    fn metadata_captures_before_after_balances() {
        let usd = Currency::new("USD").unwrap();
        let event = AuditDraft::new(
            AuditEventType::FundsWithdrawn,
            AuditModule::CustodyAccounts,
            "capital withdrawn",
        )
        .amount(250, &usd)
        .meta("from_balance", 1000)
        .meta("to_balance", 750)
        .into_event();

        assert_eq!(event.metadata["from_balance"], 1000);
        assert_eq!(event.metadata["to_balance"], 750);
        assert_eq!(event.amount, Some(250));
    }

    #[test]
    fn serde_round_trip() {
        let event = AuditDraft::new(
            AuditEventType::TransferCreated,
            AuditModule::TransferCoordinator,
            "transfer",
        )
        .reference("TRF-1")
        .into_event();

        let json = serde_json::to_string(&event).unwrap();
        let back: AuditEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
