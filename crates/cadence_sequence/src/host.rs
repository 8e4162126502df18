//! Sequence host
//!
//! A [`SequenceHost`] owns a registry of items and runs one whole-sequence
//! enter or exit at a time. Exits cascade depth-first into child hosts before
//! touching the host's own items.
//!
//! # States
//!
//! ```text
//!   Idle --enter()--> Entering --done/cancelled--> Idle
//!   Idle --exit()---> Exiting  --done/cancelled--> Idle
//! ```
//!
//! Calls arriving while the host is `Entering` or `Exiting` are dropped and
//! report [`RunOutcome::Busy`]. The single-item operations
//! ([`SequenceHost::enter_one`], [`SequenceHost::exit_one`]) never look at the
//! state and may overlap a running sequence.
//!
//! # Cancellation
//!
//! Every wait races against the host's cancellation epoch. Bumping it with
//! [`SequenceHost::cancel`] or closing the host makes the pending wait return
//! [`SequenceError::Cancelled`]. Dropping the future works too; the state is
//! restored to `Idle` by a drop guard either way.

use crate::config::SequenceConfig;
use crate::error::{Result, SequenceError, StepError};
use crate::registry::{ItemRecord, ItemRegistry, VisibilityState};
use crate::transition::Transition;
use crate::tree::{HostId, HostTree};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;

/// Boxed future returned by recursive host operations
pub type SequenceFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Callback run after each sequenced step; an `Err` is reported and skipped
pub type StepHook = Arc<dyn Fn(&StepEvent) -> std::result::Result<(), StepError> + Send + Sync>;

/// Epoch value marking a closed host
const CLOSED: u64 = u64::MAX;

/// Sequencing state of a host
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum HostState {
    Idle = 0,
    Entering = 1,
    Exiting = 2,
}

impl HostState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => HostState::Entering,
            2 => HostState::Exiting,
            _ => HostState::Idle,
        }
    }
}

/// How a whole-sequence call ended when it was not cancelled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The sequence ran to the end
    Completed,
    /// Another sequence was running; nothing was done
    Busy,
}

/// Which loop produced a step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepPhase {
    Enter,
    Exit,
}

/// One item's visibility change inside a sequence loop
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepEvent {
    pub host: HostId,
    pub index: i32,
    pub phase: StepPhase,
    pub visible: bool,
}

pub(crate) struct HostInner {
    id: HostId,
    tree: Arc<HostTree>,
    registry: ItemRegistry,
    config: SequenceConfig,
    state: AtomicU8,
    epoch: watch::Sender<u64>,
    step_hook: Mutex<Option<StepHook>>,
}

impl Drop for HostInner {
    fn drop(&mut self) {
        self.tree.remove(self.id);
    }
}

/// Resets the host to `Idle` on every exit path
struct RunGuard<'a> {
    state: &'a AtomicU8,
}

impl<'a> RunGuard<'a> {
    fn admit(state: &'a AtomicU8, to: HostState) -> Option<Self> {
        state
            .compare_exchange(
                HostState::Idle as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()
            .map(|_| Self { state })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.state.store(HostState::Idle as u8, Ordering::Release);
    }
}

/// Coordinator for one sequencing scope
///
/// Cloning is cheap and yields another handle to the same host. The host is
/// removed from its tree when the last handle is dropped.
#[derive(Clone)]
pub struct SequenceHost {
    inner: Arc<HostInner>,
}

impl std::fmt::Debug for SequenceHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceHost")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("items", &self.inner.registry.len())
            .finish()
    }
}

impl SequenceHost {
    /// Create a detached host in `tree`
    pub fn new(tree: &Arc<HostTree>, config: SequenceConfig) -> Self {
        let inner = Arc::new_cyclic(|weak| {
            let (epoch, _) = watch::channel(0);
            HostInner {
                id: tree.insert(weak.clone()),
                tree: Arc::clone(tree),
                registry: ItemRegistry::new(config.default_duration_ms),
                config,
                state: AtomicU8::new(HostState::Idle as u8),
                epoch,
                step_hook: Mutex::new(None),
            }
        });
        tracing::debug!(host = ?inner.id, "created sequence host");
        Self { inner }
    }

    pub(crate) fn from_inner(inner: Arc<HostInner>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> HostId {
        self.inner.id
    }

    pub fn tree(&self) -> &Arc<HostTree> {
        &self.inner.tree
    }

    pub fn config(&self) -> &SequenceConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &ItemRegistry {
        &self.inner.registry
    }

    pub fn state(&self) -> HostState {
        HostState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Whether a whole-sequence enter or exit is running
    pub fn is_animating(&self) -> bool {
        self.state() != HostState::Idle
    }

    /// Whether the host has been torn down
    pub fn is_closed(&self) -> bool {
        self.current_epoch() == CLOSED
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register an item; see [`ItemRegistry::register`]
    pub fn register(
        &self,
        index: i32,
        enter: Transition,
        exit: Transition,
        delay_ms: u64,
    ) -> Result<VisibilityState> {
        self.inner.registry.register(index, enter, exit, delay_ms)
    }

    pub fn unregister(&self, index: i32) {
        self.inner.registry.unregister(index);
    }

    pub fn clear(&self) {
        self.inner.registry.clear();
    }

    /// Visibility handle of a registered item
    pub fn visibility(&self, index: i32) -> Option<VisibilityState> {
        self.inner.registry.get(index).map(|r| r.visibility.clone())
    }

    /// Install the hook run after every sequenced step
    pub fn set_step_hook(&self, hook: StepHook) {
        *self
            .inner
            .step_hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(hook);
    }

    pub fn clear_step_hook(&self) {
        *self
            .inner
            .step_hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    // ========================================================================
    // Hierarchy
    // ========================================================================

    /// Attach `child` so exits cascade into it
    ///
    /// Returns false if the hosts belong to different trees, the child is
    /// closed or the link would form a cycle.
    pub fn attach(&self, child: &SequenceHost) -> bool {
        if !Arc::ptr_eq(&self.inner.tree, &child.inner.tree) {
            tracing::warn!(parent = ?self.id(), child = ?child.id(), "cannot attach a host from another tree");
            return false;
        }
        if child.is_closed() {
            tracing::warn!(parent = ?self.id(), child = ?child.id(), "cannot attach a closed host");
            return false;
        }
        let linked = self.inner.tree.link(self.id(), child.id());
        if linked {
            tracing::debug!(parent = ?self.id(), child = ?child.id(), "attached child host");
        } else {
            tracing::warn!(parent = ?self.id(), child = ?child.id(), "refused to attach child host");
        }
        linked
    }

    /// Detach `child`; returns whether it was attached here
    pub fn detach(&self, child: &SequenceHost) -> bool {
        let unlinked = self.inner.tree.unlink(self.id(), child.id());
        if unlinked {
            tracing::debug!(parent = ?self.id(), child = ?child.id(), "detached child host");
        }
        unlinked
    }

    pub fn parent_id(&self) -> Option<HostId> {
        self.inner.tree.parent_of(self.id())
    }

    /// Live child hosts in attach order
    pub fn children(&self) -> Vec<SequenceHost> {
        self.inner.tree.child_hosts(self.id())
    }

    // ========================================================================
    // Cancellation
    // ========================================================================

    /// Abort every wait currently pending on this host
    pub fn cancel(&self) {
        self.inner.epoch.send_modify(|epoch| {
            if *epoch != CLOSED {
                *epoch = (*epoch + 1) % CLOSED;
            }
        });
        tracing::debug!(host = ?self.id(), "cancelled pending waits");
    }

    /// Cancel pending waits, refuse future sequences and leave the parent
    pub fn close(&self) {
        self.inner.epoch.send_replace(CLOSED);
        if let Some(parent) = self.parent_id() {
            self.inner.tree.unlink(parent, self.id());
        }
        tracing::debug!(host = ?self.id(), "closed sequence host");
    }

    fn current_epoch(&self) -> u64 {
        *self.inner.epoch.borrow()
    }

    fn open_epoch(&self) -> Result<u64> {
        match self.current_epoch() {
            CLOSED => Err(SequenceError::Cancelled),
            epoch => Ok(epoch),
        }
    }

    /// Run `fut` unless the epoch moves on first
    async fn cancellable<F: Future>(&self, epoch: u64, fut: F) -> Result<F::Output> {
        let mut rx = self.inner.epoch.subscribe();
        tokio::select! {
            biased;
            _ = epoch_changed(&mut rx, epoch) => Err(SequenceError::Cancelled),
            out = fut => Ok(out),
        }
    }

    async fn suspend(&self, epoch: u64, ms: u64) -> Result<()> {
        if ms == 0 {
            return if self.current_epoch() == epoch {
                Ok(())
            } else {
                Err(SequenceError::Cancelled)
            };
        }
        self.cancellable(epoch, tokio::time::sleep(Duration::from_millis(ms)))
            .await
    }

    // ========================================================================
    // Sequencing
    // ========================================================================

    fn step(
        &self,
        item: &ItemRecord,
        phase: StepPhase,
        visible: bool,
    ) -> std::result::Result<(), StepError> {
        item.visibility.set_target(visible);
        tracing::trace!(host = ?self.id(), index = item.index, visible, "item step");

        let hook = self
            .inner
            .step_hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match hook {
            Some(hook) => hook(&StepEvent {
                host: self.id(),
                index: item.index,
                phase,
                visible,
            }),
            None => Ok(()),
        }
    }

    /// Show every item in ascending index order
    ///
    /// Hides everything first and waits for the longest exit to finish, then
    /// shows items one by one, waiting each item's delay before the next.
    pub async fn enter(&self) -> Result<RunOutcome> {
        let epoch = self.open_epoch()?;
        let Some(_guard) = RunGuard::admit(&self.inner.state, HostState::Entering) else {
            tracing::debug!(host = ?self.id(), state = ?self.state(), "enter ignored, host busy");
            return Ok(RunOutcome::Busy);
        };
        let registry = &self.inner.registry;

        let settle_ms = registry.max_exit_duration();
        tracing::debug!(host = ?self.id(), items = registry.len(), settle_ms, "enter sequence started");
        registry.hide_all();
        self.suspend(epoch, settle_ms).await?;

        for item in registry.snapshot(true) {
            if let Err(err) = self.step(&item, StepPhase::Enter, true) {
                tracing::warn!(host = ?self.id(), index = item.index, error = %err, "enter step failed");
                continue;
            }
            self.suspend(epoch, item.delay_ms).await?;
        }

        tracing::debug!(host = ?self.id(), "enter sequence completed");
        Ok(RunOutcome::Completed)
    }

    /// Hide every item, cascading into child hosts first
    ///
    /// With `all` set, own items are hidden at once. Otherwise they are hidden
    /// in descending index order with their delays, then all are hidden again
    /// in case a step failed.
    pub fn exit(&self, all: bool) -> SequenceFuture<'_, Result<RunOutcome>> {
        Box::pin(async move {
            let epoch = self.open_epoch()?;
            let Some(_guard) = RunGuard::admit(&self.inner.state, HostState::Exiting) else {
                tracing::debug!(host = ?self.id(), state = ?self.state(), "exit ignored, host busy");
                return Ok(RunOutcome::Busy);
            };
            let registry = &self.inner.registry;
            tracing::debug!(host = ?self.id(), all, items = registry.len(), "exit sequence started");

            for child in self.children() {
                if child.is_closed() {
                    tracing::debug!(host = ?self.id(), child = ?child.id(), "skipped closed child");
                    continue;
                }
                match self.cancellable(epoch, child.exit(all)).await? {
                    Err(err) if err.is_cancelled() && child.is_closed() => {
                        tracing::debug!(host = ?self.id(), child = ?child.id(), "child closed during exit");
                    }
                    outcome => {
                        outcome?;
                    }
                }
            }

            if all {
                registry.hide_all();
                tracing::debug!(host = ?self.id(), "exit sequence completed");
                return Ok(RunOutcome::Completed);
            }

            for item in registry.snapshot(false) {
                if let Err(err) = self.step(&item, StepPhase::Exit, false) {
                    tracing::warn!(host = ?self.id(), index = item.index, error = %err, "exit step failed");
                    continue;
                }
                self.suspend(epoch, item.delay_ms).await?;
            }
            registry.hide_all();

            tracing::debug!(host = ?self.id(), "exit sequence completed");
            Ok(RunOutcome::Completed)
        })
    }

    /// Replay one item's enter: hide it, wait its exit duration, show it
    ///
    /// Returns `Ok(false)` if no item has `index`. Runs regardless of any
    /// whole-sequence operation in progress.
    pub async fn enter_one(&self, index: i32) -> Result<bool> {
        let Some(item) = self.inner.registry.get(index) else {
            return Ok(false);
        };
        let epoch = self.open_epoch()?;

        item.visibility.set_target(false);
        self.suspend(epoch, item.exit_duration_ms).await?;
        item.visibility.set_target(true);
        tracing::trace!(host = ?self.id(), index, "entered single item");
        Ok(true)
    }

    /// Hide one item immediately; returns false if no item has `index`
    pub fn exit_one(&self, index: i32) -> bool {
        let Some(item) = self.inner.registry.get(index) else {
            return false;
        };
        item.visibility.set_target(false);
        tracing::trace!(host = ?self.id(), index, "exited single item");
        true
    }
}

async fn epoch_changed(rx: &mut watch::Receiver<u64>, epoch: u64) {
    let _ = rx.wait_for(|current| *current != epoch).await;
}
