//! Per-resource lock table -- the mutual-exclusion core.
//!
//! Tracks which transaction holds which mode on which resource.  At most
//! one mode is stored per (transaction, resource) pair; an upgrade replaces
//! the stored mode in place.  A resource entry is removed entirely once its
//! last holder releases.

use std::collections::{BTreeMap, HashMap};

use crate::mode::LockMode;

// ---------------------------------------------------------------------------
//  Lock table
// ---------------------------------------------------------------------------

/// Granted locks, keyed by resource then by transaction.
///
/// The per-resource map is ordered by transaction id so holder and blocker
/// sets come out deterministic.
#[derive(Debug, Default)]
pub struct LockTable {
    grants: HashMap<String, BTreeMap<u64, LockMode>>,
}

impl LockTable {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The mode `tx` currently holds on `resource`, if any.
    pub fn mode_of(&self, tx: u64, resource: &str) -> Option<LockMode> {
        self.grants.get(resource).and_then(|holders| holders.get(&tx)).copied()
    }

    /// All holders of `resource` in ascending transaction order.
    pub fn holders(&self, resource: &str) -> Vec<(u64, LockMode)> {
        self.grants
            .get(resource)
            .map(|holders| holders.iter().map(|(&tx, &mode)| (tx, mode)).collect())
            .unwrap_or_default()
    }

    /// Holders of `resource` other than `tx`, in ascending transaction order.
    pub fn other_holders(&self, resource: &str, tx: u64) -> Vec<(u64, LockMode)> {
        self.holders(resource)
            .into_iter()
            .filter(|&(holder, _)| holder != tx)
            .collect()
    }

    /// Whether `mode` is compatible with every mode held on `resource` by
    /// transactions other than `tx`.
    pub fn is_compatible(&self, tx: u64, resource: &str, mode: LockMode) -> bool {
        mode.compatible_with_all(self.other_holders(resource, tx).into_iter().map(|(_, m)| m))
    }

    /// Insert a grant, replacing any mode `tx` already holds on `resource`.
    pub fn grant(&mut self, tx: u64, resource: &str, mode: LockMode) {
        self.grants.entry(resource.to_string()).or_default().insert(tx, mode);
    }

    /// Release the lock `tx` holds on `resource`, returning its mode.
    ///
    /// The resource entry is dropped once the last holder is gone.
    pub fn release(&mut self, tx: u64, resource: &str) -> Option<LockMode> {
        let holders = self.grants.get_mut(resource)?;
        let released = holders.remove(&tx);
        if holders.is_empty() {
            self.grants.remove(resource);
        }
        released
    }

    /// Every (resource, mode) pair held by `tx`, in unspecified order.
    pub fn locks_held_by(&self, tx: u64) -> Vec<(String, LockMode)> {
        self.grants
            .iter()
            .filter_map(|(resource, holders)| {
                holders.get(&tx).map(|&mode| (resource.clone(), mode))
            })
            .collect()
    }

    /// Total number of grants across all resources.
    pub fn lock_count(&self) -> usize {
        self.grants.values().map(BTreeMap::len).sum()
    }

    /// Number of resources with at least one holder.
    pub fn locked_resource_count(&self) -> usize {
        self.grants.len()
    }

    /// Iterate over every locked resource and its holders.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeMap<u64, LockMode>)> {
        self.grants.iter().map(|(resource, holders)| (resource.as_str(), holders))
    }
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::LockMode::{Exclusive, IntentShare, Share, Update};

    #[test]
    fn grant_and_lookup() {
        let mut table = LockTable::new();
        table.grant(1, "DB", IntentShare);
        table.grant(2, "DB", IntentShare);
        assert_eq!(table.mode_of(1, "DB"), Some(IntentShare));
        assert_eq!(table.holders("DB"), vec![(1, IntentShare), (2, IntentShare)]);
        assert_eq!(table.lock_count(), 2);
    }

    #[test]
    fn grant_replaces_in_place() {
        let mut table = LockTable::new();
        table.grant(1, "A", Share);
        table.grant(1, "A", Exclusive);
        assert_eq!(table.mode_of(1, "A"), Some(Exclusive));
        assert_eq!(table.lock_count(), 1);
    }

    #[test]
    fn release_drops_empty_entries() {
        let mut table = LockTable::new();
        table.grant(1, "A", Share);
        table.grant(2, "A", Share);
        assert_eq!(table.release(1, "A"), Some(Share));
        assert_eq!(table.locked_resource_count(), 1);
        assert_eq!(table.release(2, "A"), Some(Share));
        assert_eq!(table.locked_resource_count(), 0);
        assert_eq!(table.release(2, "A"), None);
    }

    #[test]
    fn other_holders_excludes_self() {
        let mut table = LockTable::new();
        table.grant(1, "A", Share);
        table.grant(2, "A", Share);
        assert_eq!(table.other_holders("A", 1), vec![(2, Share)]);
        assert!(table.other_holders("B", 1).is_empty());
    }

    #[test]
    fn compatibility_ignores_own_grant() {
        let mut table = LockTable::new();
        table.grant(1, "A", Share);
        // Upgrading own S to X conflicts with nobody else.
        assert!(table.is_compatible(1, "A", Exclusive));
        table.grant(2, "A", Share);
        assert!(!table.is_compatible(1, "A", Exclusive));
        assert!(table.is_compatible(1, "A", Update));
    }

    #[test]
    fn locks_held_by_transaction() {
        let mut table = LockTable::new();
        table.grant(1, "DB", IntentShare);
        table.grant(1, "DB.T1", Share);
        table.grant(2, "DB", IntentShare);
        let mut held = table.locks_held_by(1);
        held.sort();
        assert_eq!(
            held,
            vec![("DB".to_string(), IntentShare), ("DB.T1".to_string(), Share)]
        );
    }
}
