//! Command parsing and execution
//!
//! Every command prints a JSON document. Refresh tokens are never printed;
//! accounts are shown by id or by token fingerprint.

use std::time::Duration;

use account_rotation::{AccountStatus, Clock, RotationManager};
use account_store::{Account, CooldownReason};
use serde_json::{Value, json};

use crate::error::{Error, Result};

pub const USAGE: &str = "usage: account-rotation-admin [--config PATH] <command>

commands:
  status                               pool summary
  list                                 all accounts
  next                                 select the current or next usable account
  add <refresh-token> [account-id]     register an account
  remove <key>                         remove an account by id or refresh token
  rate-limit <key> <secs>              mark an account rate limited
  cooldown <key> <reason> <secs>       cool an account down (auth-failure | network-error)
  clear                                delete every account and the store file";

/// A parsed subcommand.
#[derive(Debug, PartialEq)]
pub enum Command {
    Status,
    List,
    Next,
    Add {
        refresh_token: String,
        account_id: Option<String>,
    },
    Remove {
        key: String,
    },
    RateLimit {
        key: String,
        window: Duration,
    },
    Cooldown {
        key: String,
        reason: CooldownReason,
        window: Duration,
    },
    Clear,
}

impl Command {
    /// Command name for logging. The `Debug` form would include the refresh token.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Status => "status",
            Command::List => "list",
            Command::Next => "next",
            Command::Add { .. } => "add",
            Command::Remove { .. } => "remove",
            Command::RateLimit { .. } => "rate-limit",
            Command::Cooldown { .. } => "cooldown",
            Command::Clear => "clear",
        }
    }
}

/// Parsed command line.
#[derive(Debug, PartialEq)]
pub struct Invocation {
    pub config_path: Option<String>,
    pub command: Command,
}

/// Parse arguments (without the program name).
pub fn parse(args: &[String]) -> Result<Invocation> {
    let mut config_path = None;
    let mut rest = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let path = iter.next().ok_or(Error::MissingArgument {
                command: "--config",
                argument: "path",
            })?;
            config_path = Some(path.clone());
        } else {
            rest.push(arg.as_str());
        }
    }

    let (&name, operands) = rest.split_first().ok_or(Error::MissingCommand)?;
    let operand = |idx: usize, argument: &'static str, command: &'static str| {
        operands
            .get(idx)
            .map(|s| s.to_string())
            .ok_or(Error::MissingArgument { command, argument })
    };

    let command = match name {
        "status" => Command::Status,
        "list" => Command::List,
        "next" => Command::Next,
        "clear" => Command::Clear,
        "add" => Command::Add {
            refresh_token: operand(0, "refresh-token", "add")?,
            account_id: operands.get(1).map(|s| s.to_string()),
        },
        "remove" => Command::Remove {
            key: operand(0, "key", "remove")?,
        },
        "rate-limit" => Command::RateLimit {
            key: operand(0, "key", "rate-limit")?,
            window: parse_secs(&operand(1, "secs", "rate-limit")?)?,
        },
        "cooldown" => {
            let reason = operand(1, "reason", "cooldown")?;
            Command::Cooldown {
                key: operand(0, "key", "cooldown")?,
                reason: reason.parse().map_err(|_| Error::InvalidArgument {
                    argument: "reason",
                    value: reason.clone(),
                })?,
                window: parse_secs(&operand(2, "secs", "cooldown")?)?,
            }
        }
        other => return Err(Error::UnknownCommand(other.to_string())),
    };

    Ok(Invocation {
        config_path,
        command,
    })
}

fn parse_secs(value: &str) -> Result<Duration> {
    value
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| Error::InvalidArgument {
            argument: "secs",
            value: value.to_string(),
        })
}

/// Execute a command against the manager and return its JSON output.
pub async fn run(
    manager: &RotationManager,
    clock: &dyn Clock,
    command: Command,
) -> account_rotation::Result<Value> {
    let now = clock.now_millis();
    let until = |window: Duration| now.saturating_add(window.as_millis() as u64);

    let output = match command {
        Command::Status => manager.summary().await,
        Command::List => {
            let accounts: Vec<Value> = manager
                .accounts()
                .await
                .iter()
                .map(|account| account_view(account, now))
                .collect();
            json!({ "accounts": accounts })
        }
        Command::Next => {
            let selected = manager.current_or_next().await?;
            let wait = manager.min_wait_time().await;
            json!({
                "account": selected.as_ref().map(|a| account_view(a, now)),
                "wait_ms": wait.as_millis() as u64,
            })
        }
        Command::Add {
            refresh_token,
            account_id,
        } => {
            let account = Account::new(refresh_token, account_id, now);
            let view = account_view(&account, now);
            manager.add_account(account).await?;
            json!({ "added": view, "accounts_total": manager.account_count().await })
        }
        Command::Remove { key } => {
            let removed = manager.remove_account(&key).await?;
            json!({ "removed": removed, "accounts_total": manager.account_count().await })
        }
        Command::RateLimit { key, window } => {
            let reset = until(window);
            manager.record_rate_limit(&key, reset).await?;
            json!({ "rate_limit_reset_time": reset })
        }
        Command::Cooldown {
            key,
            reason,
            window,
        } => {
            let cooling_until = until(window);
            manager.record_cooldown(&key, reason, cooling_until).await?;
            json!({ "cooling_down_until": cooling_until, "cooldown_reason": reason.as_str() })
        }
        Command::Clear => {
            let removed = manager.clear_all().await;
            json!({ "cleared": true, "file_removed": removed })
        }
    };

    Ok(output)
}

/// Log-safe view of an account.
fn account_view(account: &Account, now: u64) -> Value {
    json!({
        "account": account.log_label(),
        "account_id": account.account_id,
        "token_fingerprint": common::fingerprint(&account.refresh_token),
        "status": AccountStatus::of(account, now).label(),
        "added_at": account.added_at,
        "last_used": account.last_used,
        "last_switch_reason": account.last_switch_reason.map(|r| r.as_str()),
        "rate_limit_reset_time": account.rate_limit_reset_time,
        "cooling_down_until": account.cooling_down_until,
        "cooldown_reason": account.cooldown_reason.map(|r| r.as_str()),
    })
}
