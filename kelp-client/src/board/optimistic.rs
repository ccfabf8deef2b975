//! Generic optimistic mutation guard
//!
//! Orders, items and tables all want the same "mutate now, maybe
//! revert later" contract. Deriving it once keeps the rollback rules
//! identical for every entity type: capture the prior value when the
//! local mutation is applied, restore it exactly once if the governing
//! persistence call fails, and do nothing on success (the incoming
//! authoritative event confirms the value via idempotent overwrite).

use std::collections::HashMap;
use std::hash::Hash;

/// Prior state of one entry, captured at apply time
///
/// `prior = None` means the key did not exist before the mutation
/// (an optimistic insert); reverting removes it again.
#[derive(Debug)]
pub struct OptimisticGuard<K, V> {
    key: K,
    prior: Option<V>,
}

impl<K: Eq + Hash, V> OptimisticGuard<K, V> {
    /// Prior value captured at apply time
    pub fn prior(&self) -> Option<&V> {
        self.prior.as_ref()
    }

    /// Restore the captured state
    ///
    /// Consumes the guard; a rollback can only happen once.
    pub fn revert(self, map: &mut HashMap<K, V>) {
        match self.prior {
            Some(value) => {
                map.insert(self.key, value);
            }
            None => {
                map.remove(&self.key);
            }
        }
    }
}

/// Mutate `map[key]` in place, returning a guard for rollback
///
/// Returns `None` (and leaves the map untouched) when the key is
/// absent: an optimistic update of an unknown entity is a caller
/// error, not an insert.
pub fn apply_update<K, V, F>(
    map: &mut HashMap<K, V>,
    key: &K,
    mutate: F,
) -> Option<OptimisticGuard<K, V>>
where
    K: Eq + Hash + Clone,
    V: Clone,
    F: FnOnce(&mut V),
{
    let entry = map.get_mut(key)?;
    let prior = entry.clone();
    mutate(entry);
    Some(OptimisticGuard {
        key: key.clone(),
        prior: Some(prior),
    })
}

/// Remove `map[key]`, returning a guard that reinserts it on revert
pub fn apply_remove<K, V>(map: &mut HashMap<K, V>, key: &K) -> Option<OptimisticGuard<K, V>>
where
    K: Eq + Hash + Clone,
{
    let prior = map.remove(key)?;
    Some(OptimisticGuard {
        key: key.clone(),
        prior: Some(prior),
    })
}

/// Insert `value` at `key`, returning a guard that undoes the insert
/// (or restores the displaced value) on revert
pub fn apply_insert<K, V>(map: &mut HashMap<K, V>, key: K, value: V) -> OptimisticGuard<K, V>
where
    K: Eq + Hash + Clone,
{
    let prior = map.insert(key.clone(), value);
    OptimisticGuard { key, prior }
}
