//! Host hierarchy
//!
//! Hosts live in a slotmap arena keyed by [`HostId`]. Parent links are plain
//! ids, and the arena holds hosts weakly: the UI layer owns each host's
//! lifetime, the tree only records who cascades into whom.

use crate::host::{HostInner, SequenceHost};
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

new_key_type! {
    /// Unique identifier for a host within its tree
    pub struct HostId;
}

struct HostNode {
    host: Weak<HostInner>,
    parent: Option<HostId>,
    children: SmallVec<[HostId; 4]>,
}

/// Arena of hosts and their parent/child links
#[derive(Default)]
pub struct HostTree {
    nodes: Mutex<SlotMap<HostId, HostNode>>,
}

impl HostTree {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn nodes(&self) -> MutexGuard<'_, SlotMap<HostId, HostNode>> {
        self.nodes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn insert(&self, host: Weak<HostInner>) -> HostId {
        self.nodes().insert(HostNode {
            host,
            parent: None,
            children: SmallVec::new(),
        })
    }

    /// Drop a host's node, unlinking it from its parent and orphaning its children
    pub(crate) fn remove(&self, id: HostId) {
        let mut nodes = self.nodes();
        let Some(node) = nodes.remove(id) else {
            return;
        };
        if let Some(parent) = node.parent.and_then(|p| nodes.get_mut(p)) {
            parent.children.retain(|c| *c != id);
        }
        for child in node.children {
            if let Some(child) = nodes.get_mut(child) {
                child.parent = None;
            }
        }
    }

    /// Make `child` a child of `parent`
    ///
    /// A child already attached elsewhere is moved. Returns false when either
    /// id is unknown or the link would create a cycle.
    pub(crate) fn link(&self, parent: HostId, child: HostId) -> bool {
        let mut nodes = self.nodes();
        if !nodes.contains_key(parent) || !nodes.contains_key(child) {
            return false;
        }

        // Refuse if `child` is `parent` or one of its ancestors
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return false;
            }
            cursor = nodes.get(id).and_then(|n| n.parent);
        }

        let previous = nodes[child].parent.replace(parent);
        if let Some(old) = previous.and_then(|p| nodes.get_mut(p)) {
            old.children.retain(|c| *c != child);
        }
        let children = &mut nodes[parent].children;
        if !children.contains(&child) {
            children.push(child);
        }
        true
    }

    /// Remove the link between `parent` and `child`; returns whether one existed
    pub(crate) fn unlink(&self, parent: HostId, child: HostId) -> bool {
        let mut nodes = self.nodes();
        let Some(parent_node) = nodes.get_mut(parent) else {
            return false;
        };
        let before = parent_node.children.len();
        parent_node.children.retain(|c| *c != child);
        let removed = parent_node.children.len() != before;

        if let Some(child_node) = nodes.get_mut(child) {
            if child_node.parent == Some(parent) {
                child_node.parent = None;
            }
        }
        removed
    }

    /// Live child hosts of `id`, in attach order
    pub(crate) fn child_hosts(&self, id: HostId) -> Vec<SequenceHost> {
        let nodes = self.nodes();
        let Some(node) = nodes.get(id) else {
            return Vec::new();
        };
        node.children
            .iter()
            .filter_map(|c| nodes.get(*c))
            .filter_map(|n| n.host.upgrade())
            .map(SequenceHost::from_inner)
            .collect()
    }

    pub fn parent_of(&self, id: HostId) -> Option<HostId> {
        self.nodes().get(id).and_then(|n| n.parent)
    }

    pub fn children_of(&self, id: HostId) -> SmallVec<[HostId; 4]> {
        self.nodes()
            .get(id)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, id: HostId) -> bool {
        self.nodes().contains_key(id)
    }

    /// Number of hosts in the tree
    pub fn len(&self) -> usize {
        self.nodes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SequenceConfig;

    fn host(tree: &Arc<HostTree>) -> SequenceHost {
        SequenceHost::new(tree, SequenceConfig::default())
    }

    #[test]
    fn test_link_and_unlink_are_bidirectional() {
        let tree = HostTree::new();
        let parent = host(&tree);
        let child = host(&tree);

        assert!(tree.link(parent.id(), child.id()));
        assert_eq!(tree.parent_of(child.id()), Some(parent.id()));
        assert_eq!(tree.children_of(parent.id()).as_slice(), &[child.id()]);

        assert!(tree.unlink(parent.id(), child.id()));
        assert_eq!(tree.parent_of(child.id()), None);
        assert!(tree.children_of(parent.id()).is_empty());
        assert!(!tree.unlink(parent.id(), child.id()));
    }

    #[test]
    fn test_link_refuses_cycles() {
        let tree = HostTree::new();
        let a = host(&tree);
        let b = host(&tree);
        let c = host(&tree);

        assert!(tree.link(a.id(), b.id()));
        assert!(tree.link(b.id(), c.id()));
        assert!(!tree.link(c.id(), a.id()));
        assert!(!tree.link(a.id(), a.id()));
        assert_eq!(tree.parent_of(a.id()), None);
    }

    #[test]
    fn test_relink_moves_child() {
        let tree = HostTree::new();
        let a = host(&tree);
        let b = host(&tree);
        let child = host(&tree);

        tree.link(a.id(), child.id());
        tree.link(b.id(), child.id());
        assert!(tree.children_of(a.id()).is_empty());
        assert_eq!(tree.children_of(b.id()).as_slice(), &[child.id()]);
    }

    #[test]
    fn test_dropping_host_removes_node() {
        let tree = HostTree::new();
        let parent = host(&tree);
        let child = host(&tree);
        let grandchild = host(&tree);
        tree.link(parent.id(), child.id());
        tree.link(child.id(), grandchild.id());

        let child_id = child.id();
        drop(child);

        assert_eq!(tree.len(), 2);
        assert!(!tree.contains(child_id));
        assert!(tree.children_of(parent.id()).is_empty());
        assert_eq!(tree.parent_of(grandchild.id()), None);
    }

    #[test]
    fn test_child_hosts_skips_dead_weak_refs() {
        let tree = HostTree::new();
        let parent = host(&tree);
        let child = host(&tree);
        tree.link(parent.id(), child.id());

        let hosts = tree.child_hosts(parent.id());
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].id(), child.id());
    }
}
