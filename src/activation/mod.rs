//! Activation keys.
//!
//! Each package ships with a batch of single-use tokens. They are recorded
//! in the activation datastore and published next to the artifact.

mod store;
mod token;

pub use store::{ActivationRecord, ActivationStore, RedeemOutcome, SqliteStore};
pub use token::{generate_token, is_valid_token, TOKEN_PREFIX};

use anyhow::{bail, Result};
use std::collections::HashSet;

/// Generate `count` tokens and record them, skipping collisions.
///
/// A token the store already holds is logged and replaced with a fresh one,
/// so the store always gains exactly `count` new records.
pub fn issue_tokens(store: &dyn ActivationStore, count: u32) -> Result<Vec<String>> {
    let wanted = count as usize;
    let budget = wanted.saturating_mul(10).max(10);
    let mut issued = Vec::with_capacity(wanted);
    let mut seen = HashSet::new();

    for _ in 0..budget {
        if issued.len() == wanted {
            break;
        }
        let token = generate_token();
        if !seen.insert(token.clone()) {
            continue;
        }
        if store.insert_if_absent(&token)? {
            issued.push(token);
        } else {
            tracing::warn!(%token, "token already registered; generating another");
        }
    }

    if issued.len() < wanted {
        bail!(
            "could only register {} of {} activation tokens",
            issued.len(),
            wanted
        );
    }
    Ok(issued)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_tokens_adds_exactly_count() {
        let store = SqliteStore::open_in_memory().unwrap();
        let tokens = issue_tokens(&store, 5).unwrap();
        assert_eq!(tokens.len(), 5);
        assert_eq!(store.count().unwrap(), 5);
        let unique: HashSet<_> = tokens.iter().collect();
        assert_eq!(unique.len(), 5);
        assert!(tokens.iter().all(|t| is_valid_token(t)));
    }

    /// Store that rejects the first insert as a duplicate.
    struct FirstCollides(std::cell::Cell<bool>);

    impl ActivationStore for FirstCollides {
        fn insert_if_absent(&self, _token: &str) -> Result<bool> {
            Ok(self.0.replace(true))
        }
    }

    #[test]
    fn test_duplicate_is_skipped_not_fatal() {
        let store = FirstCollides(std::cell::Cell::new(false));
        let tokens = issue_tokens(&store, 3).unwrap();
        assert_eq!(tokens.len(), 3);
    }
}
