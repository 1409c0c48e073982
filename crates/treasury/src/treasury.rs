use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use custodia_audit::{AuditDraft, AuditEvent, AuditEventLog, AuditEventType, AuditModule, AuditStatus};
use custodia_core::{
    Currency, LedgerError, LedgerResult, checked_balance_add, ensure_positive, lock_with_timeout,
};
use custodia_events::{ChangeBus, InMemoryChangeBus, Subscription};

/// One pooled balance per currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryBalance {
    pub currency: Currency,
    /// Unallocated funds, minor units.
    pub total_amount: i64,
    pub transaction_count: u64,
    pub last_update: DateTime<Utc>,
}

/// Applied movement with the before/after observations callers put in their
/// audit metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreasuryMovement {
    pub currency: Currency,
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
}

#[derive(Debug, Clone)]
pub struct TreasuryConfig {
    /// Bound on per-currency lock acquisition.
    pub lock_timeout: Duration,
}

impl Default for TreasuryConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreasurySnapshot {
    pub balances: Vec<TreasuryBalance>,
}

/// Pooled treasury balances, serialized per currency.
///
/// Debits and credits on the same currency contend on one mutex, so two
/// concurrent account creations can never both observe a stale balance and
/// over-allocate. The pool map only grows; a currency with a zero balance
/// keeps its record (and its `transaction_count`).
pub struct TreasuryLedger {
    pools: RwLock<HashMap<Currency, Arc<Mutex<TreasuryBalance>>>>,
    audit: Arc<AuditEventLog>,
    bus: InMemoryChangeBus<Vec<TreasuryBalance>>,
    lock_timeout: Duration,
}

impl TreasuryLedger {
    pub fn new(config: TreasuryConfig, audit: Arc<AuditEventLog>) -> Self {
        Self {
            pools: RwLock::new(HashMap::new()),
            audit,
            bus: InMemoryChangeBus::new(),
            lock_timeout: config.lock_timeout,
        }
    }

    /// External deposit at the treasury boundary. The only operation (with
    /// [`TreasuryLedger::withdraw`]) that changes the per-currency
    /// conservation sum.
    pub fn deposit(&self, currency: &Currency, amount: i64) -> LedgerResult<TreasuryBalance> {
        let outcome = self.apply(currency, amount, MovementKind::Credit);
        self.record_boundary_event(AuditEventType::TreasuryDeposit, currency, amount, &outcome);
        let movement = outcome?;
        self.broadcast();
        Ok(self.balance_record(currency).unwrap_or_else(|| {
            unreachable_balance(currency, movement.balance_after)
        }))
    }

    /// External withdrawal at the treasury boundary.
    pub fn withdraw(&self, currency: &Currency, amount: i64) -> LedgerResult<TreasuryBalance> {
        let outcome = self.apply(currency, amount, MovementKind::Debit);
        self.record_boundary_event(AuditEventType::TreasuryWithdrawal, currency, amount, &outcome);
        let movement = outcome?;
        self.broadcast();
        Ok(self.balance_record(currency).unwrap_or_else(|| {
            unreachable_balance(currency, movement.balance_after)
        }))
    }

    /// Internal funding path: check sufficiency and debit atomically.
    /// Audit trail is the caller's responsibility (correlation reference).
    pub fn debit(&self, currency: &Currency, amount: i64) -> LedgerResult<TreasuryMovement> {
        let movement = self.apply(currency, amount, MovementKind::Debit)?;
        self.broadcast();
        Ok(movement)
    }

    /// Internal return path: credit unconditionally, creating the pool record
    /// if the currency has never been seen.
    pub fn credit(&self, currency: &Currency, amount: i64) -> LedgerResult<TreasuryMovement> {
        let movement = self.apply(currency, amount, MovementKind::Credit)?;
        self.broadcast();
        Ok(movement)
    }

    /// Pooled amount for `currency`; zero when the currency has no record.
    pub fn balance(&self, currency: &Currency) -> i64 {
        self.balance_record(currency)
            .map(|b| b.total_amount)
            .unwrap_or(0)
    }

    /// All pool records, sorted by currency code.
    pub fn balances(&self) -> Vec<TreasuryBalance> {
        let pools = self.pools.read().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<TreasuryBalance> = pools
            .values()
            .filter_map(|pool| pool.lock().ok().map(|b| b.clone()))
            .collect();
        all.sort_by(|a, b| a.currency.as_str().cmp(b.currency.as_str()));
        all
    }

    pub fn subscribe(&self) -> Subscription<Vec<TreasuryBalance>> {
        self.bus.subscribe()
    }

    pub fn snapshot(&self) -> TreasurySnapshot {
        TreasurySnapshot {
            balances: self.balances(),
        }
    }

    pub fn restore(
        config: TreasuryConfig,
        audit: Arc<AuditEventLog>,
        snapshot: TreasurySnapshot,
    ) -> Self {
        let ledger = Self::new(config, audit);
        {
            let mut pools = ledger.pools.write().unwrap_or_else(|e| e.into_inner());
            for balance in snapshot.balances {
                pools.insert(balance.currency.clone(), Arc::new(Mutex::new(balance)));
            }
        }
        ledger
    }

    fn apply(
        &self,
        currency: &Currency,
        amount: i64,
        kind: MovementKind,
    ) -> LedgerResult<TreasuryMovement> {
        ensure_positive(amount)?;

        // Debiting a currency that has no pool is an insufficiency, not an
        // implicit pool creation.
        if kind == MovementKind::Debit && !self.pool_exists(currency) {
            return Err(LedgerError::InsufficientTreasuryFunds {
                currency: currency.clone(),
                requested: amount,
                available: 0,
            });
        }

        let pool = self.pool_or_create(currency);
        let mut balance = lock_with_timeout(
            &pool,
            self.lock_timeout,
            &format!("treasury pool {currency}"),
        )?;

        let before = balance.total_amount;
        let after = match kind {
            MovementKind::Credit => checked_balance_add(before, amount)?,
            MovementKind::Debit => {
                if before < amount {
                    return Err(LedgerError::InsufficientTreasuryFunds {
                        currency: currency.clone(),
                        requested: amount,
                        available: before,
                    });
                }
                before - amount
            }
        };

        balance.total_amount = after;
        balance.transaction_count += 1;
        balance.last_update = Utc::now();

        Ok(TreasuryMovement {
            currency: currency.clone(),
            amount,
            balance_before: before,
            balance_after: after,
        })
    }

    fn pool_exists(&self, currency: &Currency) -> bool {
        let pools = self.pools.read().unwrap_or_else(|e| e.into_inner());
        pools.contains_key(currency)
    }

    fn pool_or_create(&self, currency: &Currency) -> Arc<Mutex<TreasuryBalance>> {
        {
            let pools = self.pools.read().unwrap_or_else(|e| e.into_inner());
            if let Some(pool) = pools.get(currency) {
                return pool.clone();
            }
        }
        let mut pools = self.pools.write().unwrap_or_else(|e| e.into_inner());
        pools
            .entry(currency.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(TreasuryBalance {
                    currency: currency.clone(),
                    total_amount: 0,
                    transaction_count: 0,
                    last_update: Utc::now(),
                }))
            })
            .clone()
    }

    fn balance_record(&self, currency: &Currency) -> Option<TreasuryBalance> {
        let pools = self.pools.read().unwrap_or_else(|e| e.into_inner());
        let pool = pools.get(currency)?;
        pool.lock().ok().map(|b| b.clone())
    }

    fn broadcast(&self) {
        let _ = self.bus.publish(self.balances());
    }

    fn record_boundary_event(
        &self,
        event_type: AuditEventType,
        currency: &Currency,
        amount: i64,
        outcome: &LedgerResult<TreasuryMovement>,
    ) -> AuditEvent {
        let verb = match event_type {
            AuditEventType::TreasuryDeposit => "deposit to",
            _ => "withdrawal from",
        };
        let draft = match outcome {
            Ok(movement) => AuditDraft::new(
                event_type,
                AuditModule::Treasury,
                format!("External {verb} {currency} pool"),
            )
            .amount(amount, currency)
            .meta("from_balance", movement.balance_before)
            .meta("to_balance", movement.balance_after),
            Err(err) => AuditDraft::new(
                event_type,
                AuditModule::Treasury,
                format!("External {verb} {currency} pool rejected: {err}"),
            )
            .amount(amount, currency)
            .status(AuditStatus::Failed),
        };
        self.audit.record(draft)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum MovementKind {
    Credit,
    Debit,
}

// The pool record was just mutated under its own lock; it cannot be absent.
fn unreachable_balance(currency: &Currency, amount: i64) -> TreasuryBalance {
    TreasuryBalance {
        currency: currency.clone(),
        total_amount: amount,
        transaction_count: 0,
        last_update: Utc::now(),
    }
}
