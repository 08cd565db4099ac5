//! Account record and persisted document shape
//!
//! Timestamps are unix epoch milliseconds. Availability is never stored: it is
//! derived from `rate_limit_reset_time` and `cooling_down_until` against the
//! caller's notion of "now" on every check.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// The only document version this store reads or writes.
pub const DOCUMENT_VERSION: u32 = 1;

/// Why an account most recently became the active one. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SwitchReason {
    RateLimit,
    Initial,
    Rotation,
}

impl SwitchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwitchReason::RateLimit => "rate-limit",
            SwitchReason::Initial => "initial",
            SwitchReason::Rotation => "rotation",
        }
    }
}

/// Why an account was put into cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CooldownReason {
    AuthFailure,
    NetworkError,
}

impl CooldownReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CooldownReason::AuthFailure => "auth-failure",
            CooldownReason::NetworkError => "network-error",
        }
    }
}

impl std::str::FromStr for CooldownReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auth-failure" => Ok(CooldownReason::AuthFailure),
            "network-error" => Ok(CooldownReason::NetworkError),
            other => Err(format!("unknown cooldown reason: {other}")),
        }
    }
}

/// One known credential set plus its rotation bookkeeping.
///
/// Optional fields that hold an unrecognized value on disk are read as unset
/// rather than rejecting the whole record.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient"
    )]
    pub account_id: Option<String>,
    pub refresh_token: String,
    #[serde(default, deserialize_with = "millis_or_zero")]
    pub added_at: u64,
    #[serde(default, deserialize_with = "millis_or_zero")]
    pub last_used: u64,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient"
    )]
    pub last_switch_reason: Option<SwitchReason>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_millis"
    )]
    pub rate_limit_reset_time: Option<u64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_millis"
    )]
    pub cooling_down_until: Option<u64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient"
    )]
    pub cooldown_reason: Option<CooldownReason>,
}

impl Account {
    /// A freshly registered account with no rate-limit or cooldown history.
    pub fn new(refresh_token: impl Into<String>, account_id: Option<String>, now: u64) -> Self {
        Self {
            account_id,
            refresh_token: refresh_token.into(),
            added_at: now,
            last_used: now,
            last_switch_reason: None,
            rate_limit_reset_time: None,
            cooling_down_until: None,
            cooldown_reason: None,
        }
    }

    /// Value used to detect duplicates: the account id when present, else the
    /// refresh token. `None` when neither is usable.
    pub fn identity_key(&self) -> Option<&str> {
        match self.account_id.as_deref() {
            Some(id) if !id.is_empty() => Some(id),
            _ if !self.refresh_token.is_empty() => Some(self.refresh_token.as_str()),
            _ => None,
        }
    }

    /// Name to use in log fields. Never the refresh token itself.
    pub fn log_label(&self) -> String {
        match self.account_id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => common::fingerprint(&self.refresh_token),
        }
    }

    pub fn is_rate_limited(&self, now: u64) -> bool {
        self.rate_limit_reset_time.is_some_and(|reset| now < reset)
    }

    pub fn is_cooling_down(&self, now: u64) -> bool {
        self.cooling_down_until.is_some_and(|until| now < until)
    }

    /// Usable right now: outside both the rate-limit and cooldown windows.
    pub fn is_available(&self, now: u64) -> bool {
        !self.is_rate_limited(now) && !self.is_cooling_down(now)
    }

    /// Milliseconds until both windows have closed, clamped at zero.
    pub fn remaining_wait(&self, now: u64) -> u64 {
        let blocked_until = self
            .rate_limit_reset_time
            .unwrap_or(0)
            .max(self.cooling_down_until.unwrap_or(0));
        blocked_until.saturating_sub(now)
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("account_id", &self.account_id)
            .field("refresh_token", &"[REDACTED]")
            .field("added_at", &self.added_at)
            .field("last_used", &self.last_used)
            .field("last_switch_reason", &self.last_switch_reason)
            .field("rate_limit_reset_time", &self.rate_limit_reset_time)
            .field("cooling_down_until", &self.cooling_down_until)
            .field("cooldown_reason", &self.cooldown_reason)
            .finish()
    }
}

/// The persisted aggregate: every account plus the active position.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDocument {
    pub version: u32,
    pub accounts: Vec<Account>,
    pub active_index: usize,
}

impl AccountDocument {
    /// Build a document, clamping `active_index` into range.
    pub fn new(accounts: Vec<Account>, active_index: usize) -> Self {
        let active_index = crate::dedup::clamp_index(active_index, accounts.len());
        Self {
            version: DOCUMENT_VERSION,
            accounts,
            active_index,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// Interpret a JSON number as a non-negative integer. Negative or non-finite values are unset.
pub(crate) fn non_negative_u64(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f as u64)
    })
}

fn lenient_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(non_negative_u64))
}

fn millis_or_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    lenient_millis(deserializer).map(Option::unwrap_or_default)
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}
