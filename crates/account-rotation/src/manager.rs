//! Rotation state machine and account selection
//!
//! The manager owns the live account list and the active index. Account status
//! is never stored: each check compares the rate-limit and cooldown timestamps
//! against the injected clock, so windows expire without any background task.
//!
//! Every mutation runs as one critical section under the state write lock:
//! read, decide, mutate, bump the generation. Persistence happens after the
//! lock is released, through a single-writer gate that snapshots the state as
//! it is when the gate is acquired. A writer that finds its generation already
//! on disk skips the save, and a failed save never lets older state land later.

use std::sync::Arc;
use std::time::Duration;

use account_store::{
    Account, AccountDocument, AccountStore, CooldownReason, SwitchReason, clamp_index, dedupe,
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::credential::FallbackCredential;
use crate::error::{Error, Result};
use crate::outcome::Outcome;
use crate::persist::Persistence;

/// Derived status of one account at a point in time.
///
/// When both windows are open the rate limit is reported, since it is the
/// upstream's own signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountStatus {
    Available,
    RateLimited {
        until: u64,
    },
    CoolingDown {
        until: u64,
        reason: Option<CooldownReason>,
    },
}

impl AccountStatus {
    pub fn of(account: &Account, now: u64) -> Self {
        if let Some(until) = account.rate_limit_reset_time.filter(|&t| now < t) {
            AccountStatus::RateLimited { until }
        } else if let Some(until) = account.cooling_down_until.filter(|&t| now < t) {
            AccountStatus::CoolingDown {
                until,
                reason: account.cooldown_reason,
            }
        } else {
            AccountStatus::Available
        }
    }

    /// Status label for summaries and logging.
    pub fn label(&self) -> &'static str {
        match self {
            AccountStatus::Available => "available",
            AccountStatus::RateLimited { .. } => "rate_limited",
            AccountStatus::CoolingDown { .. } => "cooling_down",
        }
    }
}

/// Windows applied by `report` when the upstream gives no explicit reset time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationConfig {
    pub rate_limit: Duration,
    pub auth_failure_cooldown: Duration,
    pub network_error_cooldown: Duration,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            rate_limit: Duration::from_secs(60),
            auth_failure_cooldown: Duration::from_secs(300),
            network_error_cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Default)]
struct RotationState {
    accounts: Vec<Account>,
    active_index: usize,
    /// Bumped on every mutation; compared against the last generation on disk.
    generation: u64,
}

impl RotationState {
    fn current(&self) -> Option<&Account> {
        self.accounts.get(self.active_index)
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.accounts
            .iter()
            .position(|a| a.account_id.as_deref() == Some(key) || a.refresh_token == key)
    }

    fn active_key(&self) -> Option<String> {
        self.current()
            .and_then(Account::identity_key)
            .map(str::to_string)
    }

    /// Dedupe, then point at `keep_active` if it survived, else clamp.
    fn normalize(&mut self, keep_active: Option<String>) {
        self.accounts = dedupe(std::mem::take(&mut self.accounts));
        self.active_index = keep_active
            .and_then(|key| self.position(&key))
            .unwrap_or_else(|| clamp_index(self.active_index, self.accounts.len()));
    }

    fn touch(&mut self) {
        self.generation += 1;
    }

    fn snapshot(&self) -> (u64, AccountDocument) {
        (
            self.generation,
            AccountDocument::new(self.accounts.clone(), self.active_index),
        )
    }
}

/// Credential rotation manager.
///
/// Construct one per process and share it by `Arc`. Read operations take the
/// state read lock and may run concurrently; mutations take the write lock.
pub struct RotationManager {
    state: RwLock<RotationState>,
    persisted_generation: Mutex<u64>,
    persistence: Arc<dyn Persistence>,
    clock: Arc<dyn Clock>,
    config: RotationConfig,
}

impl RotationManager {
    /// Create a manager from a loaded document and/or a fallback credential.
    ///
    /// A document with at least one account is adopted as-is. Otherwise a
    /// fallback credential seeds a single account. Otherwise the manager
    /// starts empty. Nothing is persisted until the first mutation.
    pub fn new(
        document: Option<AccountDocument>,
        fallback: Option<&FallbackCredential>,
        persistence: Arc<dyn Persistence>,
        clock: Arc<dyn Clock>,
        config: RotationConfig,
    ) -> Self {
        let state = match document {
            Some(document) if !document.is_empty() => {
                let active_index = clamp_index(document.active_index, document.accounts.len());
                info!(
                    accounts = document.accounts.len(),
                    active_index, "rotation manager restored from store"
                );
                RotationState {
                    accounts: document.accounts,
                    active_index,
                    generation: 0,
                }
            }
            _ => match fallback {
                Some(credential) if !credential.refresh.expose().is_empty() => {
                    let now = clock.now_millis();
                    let mut account = Account::new(credential.refresh.expose().clone(), None, now);
                    account.last_switch_reason = Some(SwitchReason::Initial);
                    info!(
                        account = %credential.refresh.fingerprint(),
                        "rotation manager seeded from fallback credential"
                    );
                    RotationState {
                        accounts: vec![account],
                        active_index: 0,
                        generation: 0,
                    }
                }
                Some(_) => {
                    warn!("fallback credential has empty refresh token, starting with no accounts");
                    RotationState::default()
                }
                None => {
                    info!("rotation manager started with no accounts");
                    RotationState::default()
                }
            },
        };

        Self {
            state: RwLock::new(state),
            persisted_generation: Mutex::new(0),
            persistence,
            clock,
            config,
        }
    }

    /// Load the document from `store` and build a manager persisting back to it.
    pub async fn from_store(
        store: Arc<AccountStore>,
        fallback: Option<&FallbackCredential>,
        clock: Arc<dyn Clock>,
        config: RotationConfig,
    ) -> Self {
        let document = store.load().await;
        Self::new(document, fallback, store, clock, config)
    }

    pub async fn account_count(&self) -> usize {
        self.state.read().await.accounts.len()
    }

    /// The active account, or `None` when there are no accounts. No side effects.
    pub async fn current_account(&self) -> Option<Account> {
        self.state.read().await.current().cloned()
    }

    /// Snapshot of every account in insertion order.
    pub async fn accounts(&self) -> Vec<Account> {
        self.state.read().await.accounts.clone()
    }

    /// Return the current account if usable, else rotate to the next usable one.
    ///
    /// Scans forward from the active index, wrapping around. On a switch the
    /// new account's `last_used` and `last_switch_reason` are updated and the
    /// state is persisted. If no account is usable the current one is returned
    /// unchanged; callers should consult `min_wait_time()` before using it.
    pub async fn current_or_next(&self) -> Result<Option<Account>> {
        {
            let state = self.state.read().await;
            let now = self.clock.now_millis();
            match state.current() {
                None => return Ok(None),
                Some(account) if account.is_available(now) => return Ok(Some(account.clone())),
                Some(_) => {}
            }
        }

        let selected = {
            let mut state = self.state.write().await;
            let now = self.clock.now_millis();

            // Re-check: another caller may have rotated while we waited for the lock.
            let Some(current) = state.current() else {
                return Ok(None);
            };
            if current.is_available(now) {
                return Ok(Some(current.clone()));
            }

            let reason = if current.is_rate_limited(now) {
                SwitchReason::RateLimit
            } else {
                SwitchReason::Rotation
            };

            let n = state.accounts.len();
            let next = (1..n)
                .map(|offset| (state.active_index + offset) % n)
                .find(|&idx| state.accounts[idx].is_available(now));

            let Some(next) = next else {
                debug!(
                    account = %current.log_label(),
                    "no available account, keeping current"
                );
                return Ok(Some(current.clone()));
            };

            let from = current.log_label();
            state.active_index = next;
            let account = &mut state.accounts[next];
            account.last_used = now;
            account.last_switch_reason = Some(reason);
            let selected = account.clone();

            info!(
                from = %from,
                to = %selected.log_label(),
                reason = reason.as_str(),
                "rotated active account"
            );
            metrics::counter!("account_rotations_total", "reason" => reason.as_str()).increment(1);

            state.touch();
            selected
        };

        self.persist().await?;
        Ok(Some(selected))
    }

    /// How long until some account becomes usable.
    ///
    /// Zero if any account is available now, or if there are no accounts.
    pub async fn min_wait_time(&self) -> Duration {
        let state = self.state.read().await;
        let now = self.clock.now_millis();
        if state.accounts.iter().any(|a| a.is_available(now)) {
            return Duration::ZERO;
        }
        let millis = state
            .accounts
            .iter()
            .map(|a| a.remaining_wait(now))
            .min()
            .unwrap_or(0);
        Duration::from_millis(millis)
    }

    /// Mark the account identified by `key` as rate limited until `reset_time`.
    pub async fn record_rate_limit(&self, key: &str, reset_time: u64) -> Result<()> {
        let now = self.clock.now_millis();
        self.update_account(key, |account| {
            account.rate_limit_reset_time = Some(reset_time);
            info!(
                account = %account.log_label(),
                reset_in_ms = reset_time.saturating_sub(now),
                "account rate limited"
            );
        })
        .await?;
        metrics::counter!("account_rate_limits_total").increment(1);
        Ok(())
    }

    /// Put the account identified by `key` into cooldown until `until`.
    pub async fn record_cooldown(
        &self,
        key: &str,
        reason: CooldownReason,
        until: u64,
    ) -> Result<()> {
        let now = self.clock.now_millis();
        self.update_account(key, |account| {
            account.cooling_down_until = Some(until);
            account.cooldown_reason = Some(reason);
            info!(
                account = %account.log_label(),
                reason = reason.as_str(),
                cooldown_ms = until.saturating_sub(now),
                "account cooling down"
            );
        })
        .await?;
        metrics::counter!("account_cooldowns_total", "reason" => reason.as_str()).increment(1);
        Ok(())
    }

    /// Apply an upstream outcome for the account identified by `key`.
    ///
    /// `retry_after` overrides the configured rate-limit window when the
    /// upstream supplied one. `Outcome::Success` changes nothing.
    pub async fn report(
        &self,
        key: &str,
        outcome: Outcome,
        retry_after: Option<Duration>,
    ) -> Result<()> {
        let now = self.clock.now_millis();
        let after = |window: Duration| now.saturating_add(window.as_millis() as u64);
        match outcome {
            Outcome::Success => {
                debug!("successful outcome, no rotation action");
                Ok(())
            }
            Outcome::RateLimited => {
                let window = retry_after.unwrap_or(self.config.rate_limit);
                self.record_rate_limit(key, after(window)).await
            }
            Outcome::AuthFailure => {
                self.record_cooldown(
                    key,
                    CooldownReason::AuthFailure,
                    after(self.config.auth_failure_cooldown),
                )
                .await
            }
            Outcome::NetworkError => {
                self.record_cooldown(
                    key,
                    CooldownReason::NetworkError,
                    after(self.config.network_error_cooldown),
                )
                .await
            }
        }
    }

    /// Register an account. Duplicates resolve to the newest record, and the
    /// active account stays selected if it survives.
    pub async fn add_account(&self, account: Account) -> Result<()> {
        if account.refresh_token.is_empty() {
            return Err(Error::InvalidAccount("refresh token must not be empty".into()));
        }

        {
            let mut state = self.state.write().await;
            let label = account.log_label();
            let keep_active = state.active_key();
            state.accounts.push(account);
            state.normalize(keep_active);
            info!(
                account = %label,
                accounts = state.accounts.len(),
                "account added"
            );
            state.touch();
        }

        self.persist().await
    }

    /// Remove the account identified by `key`. Returns whether one was removed.
    ///
    /// If the active account is removed, the account that takes its position
    /// (or the last account) becomes active.
    pub async fn remove_account(&self, key: &str) -> Result<bool> {
        {
            let mut state = self.state.write().await;
            let Some(idx) = state.position(key) else {
                debug!(account = %common::fingerprint(key), "remove requested for unknown account");
                return Ok(false);
            };
            let keep_active = if idx == state.active_index {
                None
            } else {
                state.active_key()
            };
            let removed = state.accounts.remove(idx);
            state.normalize(keep_active);
            info!(
                account = %removed.log_label(),
                accounts = state.accounts.len(),
                "account removed"
            );
            state.touch();
        }

        self.persist().await?;
        Ok(true)
    }

    /// Forget every account and delete the persisted document.
    ///
    /// Deletion is best effort. Returns whether a persisted document was removed.
    pub async fn clear_all(&self) -> bool {
        let generation = {
            let mut state = self.state.write().await;
            state.accounts.clear();
            state.active_index = 0;
            state.touch();
            state.generation
        };

        let mut persisted = self.persisted_generation.lock().await;
        *persisted = generation;
        let removed = self.persistence.clear().await;
        info!(removed, "cleared all accounts");
        removed
    }

    /// Pool summary for status reporting.
    ///
    /// Status mapping: all available → healthy, some available → degraded,
    /// none available (or no accounts) → unhealthy.
    pub async fn summary(&self) -> serde_json::Value {
        let state = self.state.read().await;
        let now = self.clock.now_millis();

        let mut accounts = Vec::with_capacity(state.accounts.len());
        let mut available_count = 0usize;
        let mut rate_limited_count = 0usize;
        let mut cooling_count = 0usize;
        let mut min_wait = u64::MAX;

        for (idx, account) in state.accounts.iter().enumerate() {
            let status = AccountStatus::of(account, now);
            let mut entry = serde_json::json!({
                "account": account.log_label(),
                "status": status.label(),
                "active": idx == state.active_index,
            });
            match status {
                AccountStatus::Available => available_count += 1,
                AccountStatus::RateLimited { .. } => rate_limited_count += 1,
                AccountStatus::CoolingDown { reason, .. } => {
                    cooling_count += 1;
                    if let Some(reason) = reason {
                        entry["cooldown_reason"] = reason.as_str().into();
                    }
                }
            }
            if status != AccountStatus::Available {
                let remaining = account.remaining_wait(now);
                min_wait = min_wait.min(remaining);
                entry["remaining_ms"] = remaining.into();
            }
            accounts.push(entry);
        }

        let total = state.accounts.len();
        let pool_status = if available_count == total && total > 0 {
            "healthy"
        } else if available_count > 0 {
            "degraded"
        } else {
            "unhealthy"
        };
        let min_wait_ms = if available_count > 0 || total == 0 {
            0
        } else {
            min_wait
        };

        serde_json::json!({
            "status": pool_status,
            "accounts_total": total,
            "accounts_available": available_count,
            "accounts_rate_limited": rate_limited_count,
            "accounts_cooling_down": cooling_count,
            "active_index": state.active_index,
            "min_wait_ms": min_wait_ms,
            "accounts": accounts
        })
    }

    /// Apply `f` to the account matching `key` and persist.
    async fn update_account<F>(&self, key: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut Account),
    {
        {
            let mut state = self.state.write().await;
            let idx = state
                .position(key)
                .ok_or_else(|| Error::NotFound(format!("key {}", common::fingerprint(key))))?;
            f(&mut state.accounts[idx]);
            state.touch();
        }

        self.persist().await
    }

    /// Write the current state unless it is already on disk.
    ///
    /// The snapshot is taken while holding the gate, so a writer that waited
    /// behind a failed save still writes the newest state.
    async fn persist(&self) -> Result<()> {
        let mut persisted = self.persisted_generation.lock().await;
        let (generation, document) = self.state.read().await.snapshot();
        if *persisted >= generation {
            debug!(
                generation,
                persisted = *persisted,
                "account state already persisted"
            );
            return Ok(());
        }
        if let Err(e) = self.persistence.save(&document).await {
            error!(error = %e, "failed to persist account store");
            return Err(e.into());
        }
        *persisted = generation;
        Ok(())
    }
}
