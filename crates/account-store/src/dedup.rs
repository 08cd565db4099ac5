//! Deduplication by identity key and active-index clamping
//!
//! `active_index` is positional, so dedup must be deterministic and must keep
//! the surviving records in their original relative order.

use std::collections::HashMap;

use crate::account::Account;

/// Keep one record per identity key, preserving input order of the survivors.
///
/// Among records sharing a key the newest wins: greater `last_used`, then
/// greater `added_at`, then the later record in the input. Records with no
/// usable identity key are dropped.
pub fn dedupe(accounts: Vec<Account>) -> Vec<Account> {
    let mut winner_by_key: HashMap<&str, usize> = HashMap::new();

    for (idx, account) in accounts.iter().enumerate() {
        let Some(key) = account.identity_key() else {
            continue;
        };
        match winner_by_key.get(key) {
            Some(&kept) => {
                let current = &accounts[kept];
                if (account.last_used, account.added_at) >= (current.last_used, current.added_at) {
                    winner_by_key.insert(key, idx);
                }
            }
            None => {
                winner_by_key.insert(key, idx);
            }
        }
    }

    let mut keep = vec![false; accounts.len()];
    for idx in winner_by_key.into_values() {
        keep[idx] = true;
    }

    accounts
        .into_iter()
        .zip(keep)
        .filter_map(|(account, kept)| kept.then_some(account))
        .collect()
}

/// Clamp `index` into `[0, len - 1]`, or `0` for an empty list.
pub fn clamp_index(index: usize, len: usize) -> usize {
    if len == 0 { 0 } else { index.min(len - 1) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(token: &str, id: Option<&str>, added_at: u64, last_used: u64) -> Account {
        let mut a = Account::new(token, id.map(str::to_string), added_at);
        a.last_used = last_used;
        a
    }

    fn tokens(accounts: &[Account]) -> Vec<&str> {
        accounts.iter().map(|a| a.refresh_token.as_str()).collect()
    }

    #[test]
    fn distinct_keys_pass_through_unchanged() {
        let input = vec![
            record("a", None, 1, 1),
            record("b", None, 1, 1),
            record("c", None, 1, 1),
        ];
        assert_eq!(dedupe(input.clone()), input);
    }

    #[test]
    fn greater_last_used_wins() {
        let input = vec![
            record("rt_new", Some("acct"), 1, 500),
            record("rt_old", Some("acct"), 1, 100),
        ];
        assert_eq!(tokens(&dedupe(input)), vec!["rt_new"]);
    }

    #[test]
    fn equal_last_used_falls_back_to_added_at() {
        let input = vec![
            record("rt_later_added", Some("acct"), 900, 500),
            record("rt_earlier_added", Some("acct"), 100, 500),
        ];
        assert_eq!(tokens(&dedupe(input)), vec!["rt_later_added"]);
    }

    #[test]
    fn full_tie_keeps_later_record() {
        let input = vec![
            record("rt_first", Some("acct"), 100, 500),
            record("rt_second", Some("acct"), 100, 500),
        ];
        assert_eq!(tokens(&dedupe(input)), vec!["rt_second"]);
    }

    #[test]
    fn survivors_keep_original_relative_order() {
        // "x" is newest at position 3, so it should appear after "y" and "z".
        let input = vec![
            record("x1", Some("x"), 1, 10),
            record("y", Some("y"), 1, 10),
            record("z", Some("z"), 1, 10),
            record("x2", Some("x"), 1, 20),
        ];
        assert_eq!(tokens(&dedupe(input)), vec!["y", "z", "x2"]);
    }

    #[test]
    fn token_is_identity_when_account_id_missing() {
        let input = vec![record("rt_same", None, 1, 1), record("rt_same", None, 2, 1)];
        let out = dedupe(input);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].added_at, 2);
    }

    #[test]
    fn records_without_any_key_are_dropped() {
        let input = vec![record("", None, 1, 1), record("rt_ok", None, 1, 1)];
        assert_eq!(tokens(&dedupe(input)), vec!["rt_ok"]);
    }

    #[test]
    fn exactly_one_survivor_per_key() {
        let input = vec![
            record("a1", Some("a"), 1, 1),
            record("b1", Some("b"), 1, 1),
            record("a2", Some("a"), 1, 3),
            record("b2", Some("b"), 1, 0),
            record("a3", Some("a"), 1, 2),
        ];
        let out = dedupe(input);
        assert_eq!(tokens(&out), vec!["b1", "a2"]);
    }

    #[test]
    fn clamp_index_bounds() {
        assert_eq!(clamp_index(0, 0), 0);
        assert_eq!(clamp_index(7, 0), 0);
        assert_eq!(clamp_index(2, 3), 2);
        assert_eq!(clamp_index(3, 3), 2);
        assert_eq!(clamp_index(usize::MAX, 1), 0);
    }
}
