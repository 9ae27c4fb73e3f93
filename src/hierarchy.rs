//! Static resource hierarchy with ancestor lookup.
//!
//! Resources form a tree injected at construction (for example
//! database -> table -> page -> row).  The locking core only ever needs the
//! root-first ancestor walk and the depth of a resource; children are
//! implicit.

use std::collections::HashMap;

// ---------------------------------------------------------------------------
//  Resource hierarchy
// ---------------------------------------------------------------------------

/// A static tree of lockable resources, backed by a child -> parent map.
///
/// The tree is built root-down with [`add_root`](Self::add_root) and
/// [`add_child`](Self::add_child), which guarantees every registered
/// resource has a registered parent chain and that no cycles can form.
#[derive(Debug, Clone, Default)]
pub struct ResourceHierarchy {
    /// Resource -> parent resource.  Roots map to `None`.
    parents: HashMap<String, Option<String>>,
}

impl ResourceHierarchy {
    /// Create an empty hierarchy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a root resource (no parent).
    pub fn add_root(&mut self, id: &str) -> Result<(), HierarchyError> {
        if self.parents.contains_key(id) {
            return Err(HierarchyError::DuplicateResource {
                resource: id.to_string(),
            });
        }
        self.parents.insert(id.to_string(), None);
        Ok(())
    }

    /// Register `child` under an already-registered `parent`.
    pub fn add_child(&mut self, parent: &str, child: &str) -> Result<(), HierarchyError> {
        if !self.parents.contains_key(parent) {
            return Err(HierarchyError::UnknownParent {
                parent: parent.to_string(),
                child: child.to_string(),
            });
        }
        if self.parents.contains_key(child) {
            return Err(HierarchyError::DuplicateResource {
                resource: child.to_string(),
            });
        }
        self.parents
            .insert(child.to_string(), Some(parent.to_string()));
        Ok(())
    }

    /// Whether `id` is a registered resource.
    pub fn contains(&self, id: &str) -> bool {
        self.parents.contains_key(id)
    }

    /// Parent of `id`, if it has one.
    pub fn parent_of(&self, id: &str) -> Option<&str> {
        self.parents.get(id).and_then(|p| p.as_deref())
    }

    /// Ancestors of `id`, root first, excluding `id` itself.
    ///
    /// Unknown resources have no ancestors.
    pub fn ancestors_of(&self, id: &str) -> Vec<String> {
        let mut ancestors = Vec::new();
        let mut current = self.parent_of(id);
        while let Some(parent) = current {
            ancestors.insert(0, parent.to_string());
            current = self.parent_of(parent);
        }
        ancestors
    }

    /// Depth of `id`: the number of ancestors above it.  Roots (and unknown
    /// resources) are depth 0.
    pub fn depth(&self, id: &str) -> usize {
        let mut depth = 0;
        let mut current = self.parent_of(id);
        while let Some(parent) = current {
            depth += 1;
            current = self.parent_of(parent);
        }
        depth
    }

    /// Number of registered resources.
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// Whether the hierarchy is empty.
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

// ---------------------------------------------------------------------------
//  Errors
// ---------------------------------------------------------------------------

/// Errors from building a resource hierarchy.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum HierarchyError {
    /// A child was registered under a parent that does not exist.
    #[error("unknown parent '{parent}' for resource '{child}'")]
    UnknownParent { parent: String, child: String },
    /// The same resource id was registered twice.
    #[error("resource '{resource}' registered twice")]
    DuplicateResource { resource: String },
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResourceHierarchy {
        let mut h = ResourceHierarchy::new();
        h.add_root("DB").unwrap();
        h.add_child("DB", "TB1").unwrap();
        h.add_child("TB1", "TB1.P1").unwrap();
        h.add_child("TB1.P1", "TB1.P1.TU1").unwrap();
        h
    }

    #[test]
    fn ancestors_root_first() {
        let h = sample();
        assert_eq!(
            h.ancestors_of("TB1.P1.TU1"),
            vec!["DB".to_string(), "TB1".to_string(), "TB1.P1".to_string()]
        );
        assert_eq!(h.ancestors_of("TB1"), vec!["DB".to_string()]);
        assert!(h.ancestors_of("DB").is_empty());
    }

    #[test]
    fn unknown_resource_has_no_ancestors() {
        let h = sample();
        assert!(h.ancestors_of("NOPE").is_empty());
        assert!(!h.contains("NOPE"));
    }

    #[test]
    fn depth_counts_ancestors() {
        let h = sample();
        assert_eq!(h.depth("DB"), 0);
        assert_eq!(h.depth("TB1"), 1);
        assert_eq!(h.depth("TB1.P1.TU1"), 3);
    }

    #[test]
    fn child_requires_known_parent() {
        let mut h = ResourceHierarchy::new();
        let err = h.add_child("DB", "TB1").unwrap_err();
        assert!(matches!(err, HierarchyError::UnknownParent { .. }));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut h = sample();
        assert!(matches!(
            h.add_root("DB").unwrap_err(),
            HierarchyError::DuplicateResource { .. }
        ));
        assert!(matches!(
            h.add_child("DB", "TB1").unwrap_err(),
            HierarchyError::DuplicateResource { .. }
        ));
    }

    #[test]
    fn arbitrary_depth() {
        let mut h = ResourceHierarchy::new();
        h.add_root("L0").unwrap();
        for i in 1..40 {
            h.add_child(&format!("L{}", i - 1), &format!("L{i}")).unwrap();
        }
        assert_eq!(h.depth("L39"), 39);
        assert_eq!(h.ancestors_of("L39").len(), 39);
        assert_eq!(h.ancestors_of("L39")[0], "L0");
    }
}
