//! Item registry
//!
//! Maps item indices to their scheduling metadata. Registration and removal
//! come from the UI layer at any time, including while a sequence is running;
//! sequencing loops work on sorted snapshots and never hold the lock across
//! a wait.

use crate::error::{Result, SequenceError};
use crate::transition::{Transition, TransitionKind};
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Target visibility of one item
///
/// Cloning yields another handle to the same cell. The rendering layer reads
/// the target or subscribes to changes; only hosts write it.
#[derive(Clone, Debug)]
pub struct VisibilityState {
    cell: Arc<watch::Sender<bool>>,
}

impl VisibilityState {
    pub(crate) fn hidden() -> Self {
        let (tx, _) = watch::channel(false);
        Self { cell: Arc::new(tx) }
    }

    /// Current target visibility
    pub fn target(&self) -> bool {
        *self.cell.borrow()
    }

    /// Receiver notified whenever the target changes
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.cell.subscribe()
    }

    /// Whether both handles point at the same cell
    pub fn same_cell(&self, other: &VisibilityState) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    /// Update the target, notifying subscribers only on change
    pub(crate) fn set_target(&self, visible: bool) {
        self.cell.send_if_modified(|current| {
            if *current == visible {
                false
            } else {
                *current = visible;
                true
            }
        });
    }
}

/// Scheduling metadata for one registered item
#[derive(Debug)]
pub struct ItemRecord {
    pub index: i32,
    pub visibility: VisibilityState,
    pub enter: Transition,
    pub exit: Transition,
    /// Wait after this item's step before the next item starts
    pub delay_ms: u64,
    /// Derived once at registration
    pub enter_duration_ms: u64,
    /// Derived once at registration
    pub exit_duration_ms: u64,
}

impl ItemRecord {
    fn matches(&self, enter: &Transition, exit: &Transition, delay_ms: u64) -> bool {
        self.enter == *enter && self.exit == *exit && self.delay_ms == delay_ms
    }
}

/// Index-keyed table of items owned by one host
pub struct ItemRegistry {
    items: Mutex<FxHashMap<i32, Arc<ItemRecord>>>,
    default_duration_ms: u64,
}

impl ItemRegistry {
    /// Create an empty registry; descriptors without a duration use `default_duration_ms`
    pub fn new(default_duration_ms: u64) -> Self {
        Self {
            items: Mutex::new(FxHashMap::default()),
            default_duration_ms,
        }
    }

    fn items(&self) -> MutexGuard<'_, FxHashMap<i32, Arc<ItemRecord>>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an item, or return the existing handle if registered identically
    ///
    /// Fails without touching the registry when the index is taken by an item
    /// with different parameters, or when a descriptor sits in the wrong slot.
    pub fn register(
        &self,
        index: i32,
        enter: Transition,
        exit: Transition,
        delay_ms: u64,
    ) -> Result<VisibilityState> {
        check_kind(index, TransitionKind::Enter, &enter)?;
        check_kind(index, TransitionKind::Exit, &exit)?;

        let mut items = self.items();
        if let Some(existing) = items.get(&index) {
            if existing.matches(&enter, &exit, delay_ms) {
                return Ok(existing.visibility.clone());
            }
            return Err(SequenceError::IndexConflict { index });
        }

        let visibility = VisibilityState::hidden();
        let record = ItemRecord {
            index,
            visibility: visibility.clone(),
            enter_duration_ms: enter.resolve_duration(self.default_duration_ms),
            exit_duration_ms: exit.resolve_duration(self.default_duration_ms),
            enter,
            exit,
            delay_ms,
        };
        tracing::trace!(
            index,
            delay_ms,
            enter_ms = record.enter_duration_ms,
            exit_ms = record.exit_duration_ms,
            "registered item"
        );
        items.insert(index, Arc::new(record));
        Ok(visibility)
    }

    /// Remove an item; absent indices are ignored
    pub fn unregister(&self, index: i32) {
        if self.items().remove(&index).is_some() {
            tracing::trace!(index, "unregistered item");
        }
    }

    /// Remove every item
    pub fn clear(&self) {
        self.items().clear();
    }

    pub fn get(&self, index: i32) -> Option<Arc<ItemRecord>> {
        self.items().get(&index).cloned()
    }

    pub fn contains(&self, index: i32) -> bool {
        self.items().contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Registered indices in ascending order
    pub fn indices(&self) -> Vec<i32> {
        let mut indices: Vec<i32> = self.items().keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    /// Point-in-time copy of all records sorted by index
    pub fn snapshot(&self, ascending: bool) -> Vec<Arc<ItemRecord>> {
        let mut records: Vec<Arc<ItemRecord>> = self.items().values().cloned().collect();
        if ascending {
            records.sort_unstable_by_key(|r| r.index);
        } else {
            records.sort_unstable_by_key(|r| std::cmp::Reverse(r.index));
        }
        records
    }

    /// Longest exit duration among registered items, 0 when empty
    pub fn max_exit_duration(&self) -> u64 {
        self.items()
            .values()
            .map(|r| r.exit_duration_ms)
            .max()
            .unwrap_or(0)
    }

    /// Set every item's target to hidden
    pub fn hide_all(&self) {
        for record in self.items().values() {
            record.visibility.set_target(false);
        }
    }
}

fn check_kind(index: i32, slot: TransitionKind, transition: &Transition) -> Result<()> {
    if transition.kind == slot {
        Ok(())
    } else {
        Err(SequenceError::TransitionKind {
            index,
            slot,
            found: transition.kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::{Effect, DEFAULT_DURATION_MS};

    fn registry() -> ItemRegistry {
        ItemRegistry::new(DEFAULT_DURATION_MS)
    }

    #[test]
    fn test_register_starts_hidden() {
        let reg = registry();
        let vis = reg
            .register(0, Transition::fade_in(200), Transition::fade_out(150), 50)
            .unwrap();
        assert!(!vis.target());

        let record = reg.get(0).unwrap();
        assert_eq!(record.enter_duration_ms, 200);
        assert_eq!(record.exit_duration_ms, 150);
        assert_eq!(record.delay_ms, 50);
    }

    #[test]
    fn test_identical_registration_is_idempotent() {
        let reg = registry();
        let first = reg
            .register(3, Transition::fade_in(200), Transition::fade_out(200), 100)
            .unwrap();
        let second = reg
            .register(3, Transition::fade_in(200), Transition::fade_out(200), 100)
            .unwrap();
        assert!(first.same_cell(&second));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_conflicting_registration_fails_without_mutation() {
        let reg = registry();
        reg.register(1, Transition::fade_in(200), Transition::fade_out(200), 100)
            .unwrap();

        let err = reg
            .register(1, Transition::fade_in(200), Transition::fade_out(200), 999)
            .unwrap_err();
        assert!(matches!(err, SequenceError::IndexConflict { index: 1 }));

        let err = reg
            .register(1, Transition::scale_in(200), Transition::fade_out(200), 100)
            .unwrap_err();
        assert!(matches!(err, SequenceError::IndexConflict { index: 1 }));

        let record = reg.get(1).unwrap();
        assert_eq!(record.delay_ms, 100);
        assert_eq!(record.enter, Transition::fade_in(200));
    }

    #[test]
    fn test_wrong_slot_rejected() {
        let reg = registry();
        let err = reg
            .register(0, Transition::fade_out(200), Transition::fade_out(200), 0)
            .unwrap_err();
        assert!(matches!(
            err,
            SequenceError::TransitionKind {
                index: 0,
                slot: TransitionKind::Enter,
                found: TransitionKind::Exit,
            }
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_missing_duration_uses_registry_default() {
        let reg = ItemRegistry::new(777);
        reg.register(
            0,
            Transition::enter(Effect::Custom("flip".into())),
            Transition::fade_out(100).and(Transition::scale_out(100)),
            0,
        )
        .unwrap();
        let record = reg.get(0).unwrap();
        assert_eq!(record.enter_duration_ms, 777);
        assert_eq!(record.exit_duration_ms, 777);
    }

    #[test]
    fn test_unregister_and_clear() {
        let reg = registry();
        for i in 0..3 {
            reg.register(i, Transition::default_enter(), Transition::default_exit(), 0)
                .unwrap();
        }
        reg.unregister(1);
        reg.unregister(42);
        assert_eq!(reg.indices(), vec![0, 2]);

        reg.clear();
        assert!(reg.is_empty());
    }

    #[test]
    fn test_snapshot_ordering_and_max_exit() {
        let reg = registry();
        reg.register(5, Transition::default_enter(), Transition::fade_out(100), 0)
            .unwrap();
        reg.register(-2, Transition::default_enter(), Transition::fade_out(450), 0)
            .unwrap();
        reg.register(1, Transition::default_enter(), Transition::fade_out(200), 0)
            .unwrap();

        let asc: Vec<i32> = reg.snapshot(true).iter().map(|r| r.index).collect();
        assert_eq!(asc, vec![-2, 1, 5]);
        let desc: Vec<i32> = reg.snapshot(false).iter().map(|r| r.index).collect();
        assert_eq!(desc, vec![5, 1, -2]);
        assert_eq!(reg.max_exit_duration(), 450);
        assert_eq!(registry().max_exit_duration(), 0);
    }

    #[test]
    fn test_set_target_notifies_only_on_change() {
        let vis = VisibilityState::hidden();
        let mut rx = vis.subscribe();
        vis.set_target(false);
        assert!(!rx.has_changed().unwrap());
        vis.set_target(true);
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());
    }
}
