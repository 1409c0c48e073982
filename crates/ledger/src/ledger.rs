use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use custodia_audit::{
    AuditDraft, AuditEventLog, AuditEventType, AuditModule, AuditStatus,
};
use custodia_core::{
    AccountId, Currency, LedgerError, LedgerResult, ReservationId, TransactionId,
    checked_balance_add, ensure_positive, lock_with_timeout,
};
use custodia_events::{ChangeBus, InMemoryChangeBus, Subscription};
use custodia_treasury::TreasuryLedger;

use crate::account::{
    AccountCategory, AccountStatus, AccountTransaction, CustodyAccount, EntryKind,
};
use crate::reservation::{Reservation, ReservationStatus, ReservationTarget};

/// Per-account statement cap carried over from the original system.
const DEFAULT_STATEMENT_CAP: usize = 1_000;

/// Sequential account numbers start at the 7-digit banking floor.
const ACCOUNT_NUMBER_FLOOR: u64 = 1_000_001;

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Bound on per-account lock acquisition.
    pub lock_timeout: Duration,
    /// Most recent statement entries kept per account.
    pub statement_cap: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            statement_cap: DEFAULT_STATEMENT_CAP,
        }
    }
}

/// Result of deleting an account: the full balance returned to the treasury.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    pub account_id: AccountId,
    pub account_number: String,
    pub currency: Currency,
    pub amount: i64,
}

/// Applied two-account movement, with the before/after observations the
/// coordinator needs for its correlated audit events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferApplied {
    pub source: AccountId,
    pub destination: AccountId,
    pub source_number: String,
    pub destination_number: String,
    pub currency: Currency,
    pub amount: i64,
    pub source_total_before: i64,
    pub source_total_after: i64,
    pub destination_total_before: i64,
    pub destination_total_after: i64,
}

/// Aggregate view across all accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub total_accounts: usize,
    pub total_balance: i64,
    pub total_reserved: i64,
    pub total_available: i64,
    pub active_reservations: usize,
    pub confirmed_reservations: usize,
    pub currencies: Vec<Currency>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CounterState {
    category: AccountCategory,
    currency: Currency,
    next: u64,
}

/// Serialized form of the account store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub accounts: Vec<CustodyAccount>,
    counters: Vec<CounterState>,
}

/// The custody account store and business-rule enforcer.
///
/// Per-account mutation is serialized through a per-account mutex, so the
/// reservation-conflict check is race-free. The account map's `RwLock` is
/// held (read) for the duration of every balance operation and (write) for
/// create/delete, so deletion can never interleave with an in-flight
/// mutation of the same account.
pub struct CustodyLedger {
    accounts: RwLock<HashMap<AccountId, Arc<Mutex<CustodyAccount>>>>,
    counters: Mutex<HashMap<(AccountCategory, Currency), u64>>,
    treasury: Arc<TreasuryLedger>,
    audit: Arc<AuditEventLog>,
    bus: InMemoryChangeBus<Vec<CustodyAccount>>,
    lock_timeout: Duration,
    statement_cap: usize,
}

impl CustodyLedger {
    pub fn new(
        config: LedgerConfig,
        treasury: Arc<TreasuryLedger>,
        audit: Arc<AuditEventLog>,
    ) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            counters: Mutex::new(HashMap::new()),
            treasury,
            audit,
            bus: InMemoryChangeBus::new(),
            lock_timeout: config.lock_timeout,
            statement_cap: config.statement_cap.max(1),
        }
    }

    // ------------------------------------------------------------------
    // Account lifecycle
    // ------------------------------------------------------------------

    /// Fund a new account from the treasury pool.
    ///
    /// Debits the treasury first; if anything after the debit fails, a
    /// compensating credit restores the pool before the error surfaces.
    pub fn create_account(
        &self,
        currency: &Currency,
        amount: i64,
        category: AccountCategory,
    ) -> LedgerResult<CustodyAccount> {
        let result = self.create_account_inner(currency, amount, category);
        match &result {
            Ok((account, treasury_before, treasury_after)) => {
                self.audit.record(
                    AuditDraft::new(
                        AuditEventType::AccountCreated,
                        AuditModule::CustodyAccounts,
                        format!("Custody account {} created", account.account_number),
                    )
                    .amount(amount, currency)
                    .account(account.id)
                    .reference(account.account_number.clone())
                    .meta("treasury_before", *treasury_before)
                    .meta("treasury_after", *treasury_after),
                );
                self.broadcast();
            }
            Err(err) => {
                self.audit.record(
                    AuditDraft::new(
                        AuditEventType::AccountCreated,
                        AuditModule::CustodyAccounts,
                        format!("Account creation in {currency} rejected: {err}"),
                    )
                    .amount(amount, currency)
                    .status(AuditStatus::Failed),
                );
            }
        }
        result.map(|(account, _, _)| account)
    }

    fn create_account_inner(
        &self,
        currency: &Currency,
        amount: i64,
        category: AccountCategory,
    ) -> LedgerResult<(CustodyAccount, i64, i64)> {
        ensure_positive(amount)?;
        let account_number = self.next_account_number(category, currency);
        let movement = self.treasury.debit(currency, amount)?;

        let account = CustodyAccount::new(account_number, category, currency.clone(), amount);
        if let Err(err) = self.insert_account(account.clone()) {
            // Compensating credit: the debit must not outlive a failed insert.
            if let Err(credit_err) = self.treasury.credit(currency, amount) {
                tracing::error!(
                    %currency,
                    amount,
                    error = %credit_err,
                    "compensating treasury credit failed after account insert error"
                );
            }
            return Err(err);
        }

        Ok((account, movement.balance_before, movement.balance_after))
    }

    /// Remove the account and return its full balance to the treasury pool.
    ///
    /// A second call on the same id fails with `AccountNotFound` and does not
    /// refund again.
    pub fn delete_account(&self, account_id: AccountId) -> LedgerResult<Refund> {
        let removed = {
            let mut accounts = self.accounts.write().unwrap_or_else(|e| e.into_inner());
            accounts.remove(&account_id)
        };

        let Some(cell) = removed else {
            self.record_not_found(AuditEventType::AccountDeleted, account_id);
            return Err(LedgerError::AccountNotFound(account_id));
        };

        // The write-locked removal above waited out every in-flight
        // per-account operation, and nothing new can reach the cell now.
        let account = cell.lock().unwrap_or_else(|e| e.into_inner()).clone();

        let (treasury_before, treasury_after) = if account.total_balance > 0 {
            match self.treasury.credit(&account.currency, account.total_balance) {
                Ok(movement) => (movement.balance_before, movement.balance_after),
                Err(err) => {
                    // Refund did not happen; reinstate the account.
                    let mut accounts =
                        self.accounts.write().unwrap_or_else(|e| e.into_inner());
                    accounts.insert(account_id, cell);
                    self.audit.record(
                        AuditDraft::new(
                            AuditEventType::AccountDeleted,
                            AuditModule::CustodyAccounts,
                            format!(
                                "Deletion of account {} rolled back, refund failed: {err}",
                                account.account_number
                            ),
                        )
                        .account(account_id)
                        .reference(account.account_number.clone())
                        .status(AuditStatus::Failed),
                    );
                    return Err(err);
                }
            }
        } else {
            let balance = self.treasury.balance(&account.currency);
            (balance, balance)
        };

        self.audit.record(
            AuditDraft::new(
                AuditEventType::AccountDeleted,
                AuditModule::CustodyAccounts,
                format!(
                    "Custody account {} deleted, {} {} refunded to treasury",
                    account.account_number, account.currency, account.total_balance
                ),
            )
            .amount(account.total_balance, &account.currency)
            .account(account_id)
            .reference(account.account_number.clone())
            .meta("treasury_before", treasury_before)
            .meta("treasury_after", treasury_after),
        );
        self.broadcast();

        Ok(Refund {
            account_id,
            account_number: account.account_number,
            currency: account.currency,
            amount: account.total_balance,
        })
    }

    // ------------------------------------------------------------------
    // Funds in / out
    // ------------------------------------------------------------------

    /// Credit `amount` to total and available in lockstep.
    pub fn add_funds(
        &self,
        account_id: AccountId,
        amount: i64,
        description: impl Into<String>,
        reference: Option<String>,
    ) -> LedgerResult<AccountTransaction> {
        let description = description.into();
        let reference_for_audit = reference.clone();
        let result = self.with_account(account_id, |account| {
            ensure_positive(amount)?;
            let before = account.total_balance;
            account.total_balance = checked_balance_add(before, amount)?;
            // Bounded by the total, which was just checked.
            account.available_balance += amount;
            let entry = statement_entry(
                EntryKind::Credit,
                &description,
                reference.clone(),
                amount,
                account.total_balance,
            );
            account.push_transaction(entry.clone(), self.statement_cap);
            account.touch();
            Ok((entry, before, account.total_balance, account.currency.clone()))
        });

        self.record_funds_event(
            AuditEventType::FundsAdded,
            account_id,
            amount,
            reference_for_audit,
            &result,
        );
        result.map(|(entry, _, _, _)| {
            self.broadcast();
            entry
        })
    }

    /// Debit `amount` from total and available in lockstep.
    ///
    /// Withdrawals never eat into reserved funds: the check is against the
    /// available balance only.
    pub fn withdraw_funds(
        &self,
        account_id: AccountId,
        amount: i64,
        description: impl Into<String>,
        reference: Option<String>,
    ) -> LedgerResult<AccountTransaction> {
        let description = description.into();
        let reference_for_audit = reference.clone();
        let result = self.with_account(account_id, |account| {
            ensure_positive(amount)?;
            if amount > account.available_balance {
                return Err(LedgerError::InsufficientAvailableFunds {
                    requested: amount,
                    available: account.available_balance,
                });
            }
            let before = account.total_balance;
            account.total_balance -= amount;
            account.available_balance -= amount;
            let entry = statement_entry(
                EntryKind::Debit,
                &description,
                reference.clone(),
                amount,
                account.total_balance,
            );
            account.push_transaction(entry.clone(), self.statement_cap);
            account.touch();
            Ok((entry, before, account.total_balance, account.currency.clone()))
        });

        self.record_funds_event(
            AuditEventType::FundsWithdrawn,
            account_id,
            amount,
            reference_for_audit,
            &result,
        );
        result.map(|(entry, _, _, _)| {
            self.broadcast();
            entry
        })
    }

    // ------------------------------------------------------------------
    // Reservation lifecycle
    // ------------------------------------------------------------------

    /// Hold part of the available balance for a tokenization or transfer.
    ///
    /// Refuses with `ReservationConflict` while the account holds any active
    /// reservation. Banking accounts auto-confirm inside the state machine.
    pub fn reserve_funds(
        &self,
        account_id: AccountId,
        amount: i64,
        target: ReservationTarget,
    ) -> LedgerResult<Reservation> {
        let result = self.reserve_inner(account_id, amount, target, None);
        self.record_reserve_event(AuditEventType::FundsReserved, account_id, amount, &result, None);
        result.map(|(r, _)| {
            self.broadcast();
            r
        })
    }

    /// Administrative bypass of the reservation-conflict rule.
    ///
    /// Separately audited with the requesting actor and reason; normal
    /// callers cannot reach this path by accident.
    pub fn force_reserve_funds(
        &self,
        account_id: AccountId,
        amount: i64,
        target: ReservationTarget,
        actor: &str,
        reason: &str,
    ) -> LedgerResult<Reservation> {
        let override_ctx = Some((actor.to_string(), reason.to_string()));
        let result = self.reserve_inner(account_id, amount, target, override_ctx.clone());
        self.record_reserve_event(
            AuditEventType::ReservationOverride,
            account_id,
            amount,
            &result,
            override_ctx,
        );
        result.map(|(r, _)| {
            self.broadcast();
            r
        })
    }

    fn reserve_inner(
        &self,
        account_id: AccountId,
        amount: i64,
        target: ReservationTarget,
        override_ctx: Option<(String, String)>,
    ) -> LedgerResult<(Reservation, Currency)> {
        self.with_account(account_id, |account| {
            ensure_positive(amount)?;
            if override_ctx.is_none() {
                if let Some(active) = account.active_reservation() {
                    return Err(LedgerError::ReservationConflict {
                        account: account_id,
                        existing: active.id,
                    });
                }
            }
            if amount > account.available_balance {
                return Err(LedgerError::InsufficientAvailableFunds {
                    requested: amount,
                    available: account.available_balance,
                });
            }

            // Cannot overflow: amount <= available, so
            // reserved + amount <= reserved + available = total.
            account.available_balance -= amount;
            account.reserved_balance += amount;

            let reservation = Reservation::new(amount, target.clone(), account.category);
            if reservation.status == ReservationStatus::Confirmed {
                account.status = AccountStatus::Active;
            }
            account.reservations.push(reservation.clone());
            account.touch();

            Ok((reservation, account.currency.clone()))
        })
    }

    /// `Reserved -> Confirmed`. No balance change; activates a pending
    /// account.
    pub fn confirm_reservation(
        &self,
        account_id: AccountId,
        reservation_id: ReservationId,
    ) -> LedgerResult<Reservation> {
        let result = self.with_account(account_id, |account| {
            let currency = account.currency.clone();
            let reservation = account
                .reservation_mut(reservation_id)
                .ok_or(LedgerError::ReservationNotFound(reservation_id))?;
            reservation.transition(ReservationStatus::Confirmed)?;
            let reservation = reservation.clone();
            account.status = AccountStatus::Active;
            account.touch();
            Ok((reservation, currency))
        });

        self.record_reservation_event(
            AuditEventType::ReservationConfirmed,
            account_id,
            reservation_id,
            &result,
        );
        result.map(|(r, _)| {
            self.broadcast();
            r
        })
    }

    /// Any non-terminal state `-> Released`; the held amount returns to the
    /// available balance. Terminal: a released reservation cannot come back.
    pub fn release_reservation(
        &self,
        account_id: AccountId,
        reservation_id: ReservationId,
    ) -> LedgerResult<Reservation> {
        let result = self.with_account(account_id, |account| {
            let currency = account.currency.clone();
            let reservation = account
                .reservation_mut(reservation_id)
                .ok_or(LedgerError::ReservationNotFound(reservation_id))?;
            reservation.transition(ReservationStatus::Released)?;
            let amount = reservation.amount;
            let reservation = reservation.clone();
            account.reserved_balance -= amount;
            account.available_balance += amount;
            account.touch();
            Ok((reservation, currency))
        });

        self.record_reservation_event(
            AuditEventType::ReservationReleased,
            account_id,
            reservation_id,
            &result,
        );
        result.map(|(r, _)| {
            self.broadcast();
            r
        })
    }

    /// `Confirmed -> Completed`, terminal. The funds stay in the reserved
    /// balance, permanently consumed by the reservation's purpose; no balance
    /// movement happens here.
    pub fn complete_reservation(
        &self,
        account_id: AccountId,
        reservation_id: ReservationId,
    ) -> LedgerResult<Reservation> {
        let result = self.with_account(account_id, |account| {
            let currency = account.currency.clone();
            let reservation = account
                .reservation_mut(reservation_id)
                .ok_or(LedgerError::ReservationNotFound(reservation_id))?;
            reservation.transition(ReservationStatus::Completed)?;
            let reservation = reservation.clone();
            account.touch();
            Ok((reservation, currency))
        });

        self.record_reservation_event(
            AuditEventType::ReservationCompleted,
            account_id,
            reservation_id,
            &result,
        );
        result.map(|(r, _)| {
            self.broadcast();
            r
        })
    }

    // ------------------------------------------------------------------
    // Two-account movement (coordinator-serving)
    // ------------------------------------------------------------------

    /// Atomic same-currency movement between two accounts.
    ///
    /// Both account locks are taken in id order, so two concurrent transfers
    /// over the same pair in opposite directions cannot deadlock. All checks
    /// run before either side mutates; the audit trail (one event per side,
    /// correlated) is written by the coordinator.
    pub fn transfer_between(
        &self,
        source_id: AccountId,
        destination_id: AccountId,
        amount: i64,
        reference: &str,
    ) -> LedgerResult<TransferApplied> {
        if source_id == destination_id {
            return Err(LedgerError::internal(
                "transfer source and destination are the same account",
            ));
        }
        ensure_positive(amount)?;

        // Held for the whole movement; delete_account needs the write half.
        let accounts = self.accounts.read().unwrap_or_else(|e| e.into_inner());
        let source_cell = accounts
            .get(&source_id)
            .ok_or(LedgerError::AccountNotFound(source_id))?
            .clone();
        let destination_cell = accounts
            .get(&destination_id)
            .ok_or(LedgerError::AccountNotFound(destination_id))?
            .clone();

        // Fixed lock order: lower account id first.
        let (first, second) = if source_id < destination_id {
            (&source_cell, &destination_cell)
        } else {
            (&destination_cell, &source_cell)
        };
        let first_guard = lock_with_timeout(first, self.lock_timeout, "transfer first account")?;
        let second_guard = lock_with_timeout(second, self.lock_timeout, "transfer second account")?;
        let (mut source, mut destination) = if source_id < destination_id {
            (first_guard, second_guard)
        } else {
            (second_guard, first_guard)
        };

        if source.currency != destination.currency {
            return Err(LedgerError::CurrencyMismatch {
                expected: source.currency.clone(),
                actual: destination.currency.clone(),
            });
        }
        if amount > source.available_balance {
            return Err(LedgerError::InsufficientAvailableFunds {
                requested: amount,
                available: source.available_balance,
            });
        }

        let source_total_before = source.total_balance;
        let destination_total_before = destination.total_balance;
        // Checked before either side mutates.
        let destination_total_after = checked_balance_add(destination_total_before, amount)?;

        source.total_balance -= amount;
        source.available_balance -= amount;
        let debit = statement_entry(
            EntryKind::Debit,
            &format!("Transfer to {}", destination.account_number),
            Some(reference.to_string()),
            amount,
            source.total_balance,
        );
        source.push_transaction(debit, self.statement_cap);
        source.touch();

        destination.total_balance = destination_total_after;
        destination.available_balance += amount;
        let credit = statement_entry(
            EntryKind::Credit,
            &format!("Transfer from {}", source.account_number),
            Some(reference.to_string()),
            amount,
            destination.total_balance,
        );
        destination.push_transaction(credit, self.statement_cap);
        destination.touch();

        debug_assert!(source.invariant_holds());
        debug_assert!(destination.invariant_holds());

        let applied = TransferApplied {
            source: source_id,
            destination: destination_id,
            source_number: source.account_number.clone(),
            destination_number: destination.account_number.clone(),
            currency: source.currency.clone(),
            amount,
            source_total_before,
            source_total_after: source.total_balance,
            destination_total_before,
            destination_total_after: destination.total_balance,
        };

        drop(source);
        drop(destination);
        drop(accounts);
        self.broadcast();
        Ok(applied)
    }

    // ------------------------------------------------------------------
    // Queries and snapshots
    // ------------------------------------------------------------------

    pub fn account(&self, account_id: AccountId) -> LedgerResult<CustodyAccount> {
        self.with_account(account_id, |account| Ok(account.clone()))
    }

    /// All accounts, sorted by account number.
    pub fn accounts(&self) -> Vec<CustodyAccount> {
        let accounts = self.accounts.read().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<CustodyAccount> = accounts
            .values()
            .map(|cell| cell.lock().unwrap_or_else(|e| e.into_inner()).clone())
            .collect();
        all.sort_by(|a, b| a.account_number.cmp(&b.account_number));
        all
    }

    /// Statement entries for account-level statements, oldest first.
    pub fn transactions(&self, account_id: AccountId) -> LedgerResult<Vec<AccountTransaction>> {
        self.with_account(account_id, |account| Ok(account.transactions.clone()))
    }

    pub fn stats(&self) -> LedgerStats {
        let accounts = self.accounts();
        let mut currencies: Vec<Currency> = Vec::new();
        let mut stats = LedgerStats {
            total_accounts: accounts.len(),
            total_balance: 0,
            total_reserved: 0,
            total_available: 0,
            active_reservations: 0,
            confirmed_reservations: 0,
            currencies: Vec::new(),
        };
        for account in &accounts {
            stats.total_balance += account.total_balance;
            stats.total_reserved += account.reserved_balance;
            stats.total_available += account.available_balance;
            for r in &account.reservations {
                match r.status {
                    ReservationStatus::Reserved => stats.active_reservations += 1,
                    ReservationStatus::Confirmed => stats.confirmed_reservations += 1,
                    _ => {}
                }
            }
            if !currencies.contains(&account.currency) {
                currencies.push(account.currency.clone());
            }
        }
        currencies.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        stats.currencies = currencies;
        stats
    }

    pub fn subscribe(&self) -> Subscription<Vec<CustodyAccount>> {
        self.bus.subscribe()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        LedgerSnapshot {
            accounts: self.accounts(),
            counters: counters
                .iter()
                .map(|((category, currency), next)| CounterState {
                    category: *category,
                    currency: currency.clone(),
                    next: *next,
                })
                .collect(),
        }
    }

    pub fn restore(
        config: LedgerConfig,
        treasury: Arc<TreasuryLedger>,
        audit: Arc<AuditEventLog>,
        snapshot: LedgerSnapshot,
    ) -> Self {
        let ledger = Self::new(config, treasury, audit);
        {
            let mut accounts = ledger.accounts.write().unwrap_or_else(|e| e.into_inner());
            for account in snapshot.accounts {
                accounts.insert(account.id, Arc::new(Mutex::new(account)));
            }
        }
        {
            let mut counters = ledger.counters.lock().unwrap_or_else(|e| e.into_inner());
            for state in snapshot.counters {
                counters.insert((state.category, state.currency), state.next);
            }
        }
        ledger
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn with_account<R>(
        &self,
        account_id: AccountId,
        f: impl FnOnce(&mut CustodyAccount) -> LedgerResult<R>,
    ) -> LedgerResult<R> {
        // The read guard stays alive until return so deletion cannot remove
        // the account out from under the mutation.
        let accounts = self.accounts.read().unwrap_or_else(|e| e.into_inner());
        let cell = accounts
            .get(&account_id)
            .ok_or(LedgerError::AccountNotFound(account_id))?
            .clone();
        let mut account =
            lock_with_timeout(&cell, self.lock_timeout, &format!("account {account_id}"))?;
        let result = f(&mut account);
        debug_assert!(account.invariant_holds());
        result
    }

    fn insert_account(&self, account: CustodyAccount) -> LedgerResult<()> {
        let mut accounts = self.accounts.write().unwrap_or_else(|e| e.into_inner());
        if accounts.contains_key(&account.id) {
            return Err(LedgerError::internal(format!(
                "duplicate account id {}",
                account.id
            )));
        }
        accounts.insert(account.id, Arc::new(Mutex::new(account)));
        Ok(())
    }

    /// Sequential per (category, currency): `CST-BC-USD-1000001`.
    fn next_account_number(&self, category: AccountCategory, currency: &Currency) -> String {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        let next = counters
            .entry((category, currency.clone()))
            .or_insert(ACCOUNT_NUMBER_FLOOR);
        let number = *next;
        *next += 1;
        format!("CST-{}-{}-{:07}", category.prefix(), currency, number)
    }

    fn broadcast(&self) {
        let _ = self.bus.publish(self.accounts());
    }

    fn record_not_found(&self, event_type: AuditEventType, account_id: AccountId) {
        self.audit.record(
            AuditDraft::new(
                event_type,
                AuditModule::CustodyAccounts,
                format!("Operation on unknown account {account_id} rejected"),
            )
            .account(account_id)
            .status(AuditStatus::Failed),
        );
    }

    fn record_funds_event<T>(
        &self,
        event_type: AuditEventType,
        account_id: AccountId,
        amount: i64,
        reference: Option<String>,
        result: &LedgerResult<(T, i64, i64, Currency)>,
    ) {
        let draft = match result {
            Ok((_, before, after, currency)) => {
                let verb = match event_type {
                    AuditEventType::FundsAdded => "added to",
                    _ => "withdrawn from",
                };
                let mut draft = AuditDraft::new(
                    event_type,
                    AuditModule::CustodyAccounts,
                    format!("{currency} {amount} {verb} account {account_id}"),
                )
                .amount(amount, currency)
                .account(account_id)
                .meta("from_balance", *before)
                .meta("to_balance", *after);
                if let Some(reference) = reference {
                    draft = draft.reference(reference);
                }
                draft
            }
            Err(err) => AuditDraft::new(
                event_type,
                AuditModule::CustodyAccounts,
                format!("Funds movement on account {account_id} rejected: {err}"),
            )
            .account(account_id)
            .status(AuditStatus::Failed),
        };
        self.audit.record(draft);
    }

    fn record_reserve_event(
        &self,
        event_type: AuditEventType,
        account_id: AccountId,
        amount: i64,
        result: &LedgerResult<(Reservation, Currency)>,
        override_ctx: Option<(String, String)>,
    ) {
        let draft = match result {
            Ok((reservation, currency)) => {
                let mut draft = AuditDraft::new(
                    event_type,
                    AuditModule::CustodyAccounts,
                    format!(
                        "{currency} {amount} reserved on account {account_id} for {}",
                        reservation.target.summary()
                    ),
                )
                .amount(amount, currency)
                .account(account_id)
                .reference(reservation.id.to_string())
                .meta(
                    "auto_confirmed",
                    reservation.status == ReservationStatus::Confirmed,
                );
                if let Some((actor, reason)) = override_ctx {
                    draft = draft.meta("actor", actor).meta("reason", reason);
                }
                draft
            }
            Err(err) => {
                let mut draft = AuditDraft::new(
                    event_type,
                    AuditModule::CustodyAccounts,
                    format!("Reservation on account {account_id} rejected: {err}"),
                )
                .account(account_id)
                .status(AuditStatus::Failed);
                if let Some((actor, reason)) = override_ctx {
                    draft = draft.meta("actor", actor).meta("reason", reason);
                }
                draft
            }
        };
        self.audit.record(draft);
    }

    fn record_reservation_event(
        &self,
        event_type: AuditEventType,
        account_id: AccountId,
        reservation_id: ReservationId,
        result: &LedgerResult<(Reservation, Currency)>,
    ) {
        let draft = match result {
            Ok((reservation, currency)) => AuditDraft::new(
                event_type,
                AuditModule::CustodyAccounts,
                format!(
                    "Reservation {reservation_id} on account {account_id} is now {}",
                    reservation.status
                ),
            )
            .amount(reservation.amount, currency)
            .account(account_id)
            .reference(reservation_id.to_string()),
            Err(err) => AuditDraft::new(
                event_type,
                AuditModule::CustodyAccounts,
                format!(
                    "Reservation {reservation_id} transition on account {account_id} rejected: {err}"
                ),
            )
            .account(account_id)
            .reference(reservation_id.to_string())
            .status(AuditStatus::Failed),
        };
        self.audit.record(draft);
    }
}

fn statement_entry(
    entry: EntryKind,
    description: &str,
    reference: Option<String>,
    amount: i64,
    balance_after: i64,
) -> AccountTransaction {
    AccountTransaction {
        id: TransactionId::new(),
        timestamp: Utc::now(),
        entry,
        description: description.to_string(),
        reference,
        amount,
        balance_after,
    }
}
