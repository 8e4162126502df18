//! Sequencing scopes and items
//!
//! The UI layer creates one [`SequenceScope`] per independent sequence and one
//! [`SequenceItem`] per participant. Nesting is explicit: a scope hands out a
//! [`SequenceContext`] whose parent is its own host, and scopes built from that
//! context attach to it.
//!
//! ```ignore
//! let root = SequenceScope::new(&SequenceContext::default());
//! let title = root.item(0).enter(Transition::fade_in(200)).register()?;
//! let list = SequenceScope::new(&root.context());
//! let row = list.item(0).delay_ms(80).register()?;
//!
//! // Later: hide the nested list first, then the title
//! root.host().exit(false).await?;
//! ```

use crate::config::SequenceConfig;
use crate::error::Result;
use crate::host::SequenceHost;
use crate::registry::VisibilityState;
use crate::transition::Transition;
use crate::tree::HostTree;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Construction context passed down to nested scopes
#[derive(Clone)]
pub struct SequenceContext {
    tree: Arc<HostTree>,
    config: SequenceConfig,
    parent: Option<SequenceHost>,
}

impl SequenceContext {
    /// Context for top-level scopes backed by a fresh host tree
    pub fn root(config: SequenceConfig) -> Self {
        Self {
            tree: HostTree::new(),
            config,
            parent: None,
        }
    }

    pub fn tree(&self) -> &Arc<HostTree> {
        &self.tree
    }

    pub fn config(&self) -> &SequenceConfig {
        &self.config
    }

    /// Host that scopes built from this context attach to
    pub fn parent(&self) -> Option<&SequenceHost> {
        self.parent.as_ref()
    }
}

impl Default for SequenceContext {
    fn default() -> Self {
        Self::root(SequenceConfig::default())
    }
}

/// Per-scope overrides of the context configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScopeOptions {
    /// Run the enter sequence once the creating task yields
    pub start_by_default: bool,
}

/// Owner of one host for the lifetime of a UI subtree
///
/// Dropping the scope aborts its autostart, detaches the host from its parent,
/// clears the registry and closes the host.
pub struct SequenceScope {
    host: SequenceHost,
    parent: Option<SequenceHost>,
    autostart: Option<JoinHandle<()>>,
}

impl SequenceScope {
    pub fn new(ctx: &SequenceContext) -> Self {
        Self::with_options(
            ctx,
            ScopeOptions {
                start_by_default: ctx.config.start_by_default,
            },
        )
    }

    pub fn with_options(ctx: &SequenceContext, options: ScopeOptions) -> Self {
        let host = SequenceHost::new(&ctx.tree, ctx.config.clone());
        if let Some(parent) = &ctx.parent {
            parent.attach(&host);
        }

        let autostart = if options.start_by_default {
            spawn_enter(&host)
        } else {
            None
        };

        Self {
            host,
            parent: ctx.parent.clone(),
            autostart,
        }
    }

    pub fn host(&self) -> &SequenceHost {
        &self.host
    }

    /// Context for scopes nested inside this one
    pub fn context(&self) -> SequenceContext {
        SequenceContext {
            tree: Arc::clone(self.host.tree()),
            config: self.host.config().clone(),
            parent: Some(self.host.clone()),
        }
    }

    /// Start building an item for this scope's host
    pub fn item(&self, index: i32) -> ItemBuilder<'_> {
        ItemBuilder::new(&self.host, index)
    }
}

impl Drop for SequenceScope {
    fn drop(&mut self) {
        if let Some(task) = self.autostart.take() {
            task.abort();
        }
        if let Some(parent) = &self.parent {
            parent.detach(&self.host);
        }
        self.host.clear();
        self.host.close();
    }
}

fn spawn_enter(host: &SequenceHost) -> Option<JoinHandle<()>> {
    let Ok(runtime) = Handle::try_current() else {
        tracing::warn!(host = ?host.id(), "no tokio runtime, sequence not started");
        return None;
    };
    let host = host.clone();
    Some(runtime.spawn(async move {
        match host.enter().await {
            Ok(outcome) => tracing::debug!(host = ?host.id(), ?outcome, "autostart finished"),
            Err(err) if err.is_cancelled() => {
                tracing::debug!(host = ?host.id(), "autostart cancelled")
            }
            Err(err) => tracing::warn!(host = ?host.id(), error = %err, "autostart failed"),
        }
    }))
}

/// Builder for a [`SequenceItem`]; unset fields come from the host's config
pub struct ItemBuilder<'a> {
    host: &'a SequenceHost,
    index: i32,
    delay_ms: u64,
    enter: Transition,
    exit: Transition,
}

impl<'a> ItemBuilder<'a> {
    pub fn new(host: &'a SequenceHost, index: i32) -> Self {
        let config = host.config();
        Self {
            host,
            index,
            delay_ms: config.default_delay_ms,
            enter: Transition::fade_in(config.default_duration_ms),
            exit: Transition::fade_out(config.default_duration_ms),
        }
    }

    /// Wait after this item's step before the next item starts
    pub fn delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn enter(mut self, transition: Transition) -> Self {
        self.enter = transition;
        self
    }

    pub fn exit(mut self, transition: Transition) -> Self {
        self.exit = transition;
        self
    }

    pub fn register(self) -> Result<SequenceItem> {
        let visibility = self
            .host
            .register(self.index, self.enter, self.exit, self.delay_ms)?;
        Ok(SequenceItem {
            host: self.host.clone(),
            index: self.index,
            visibility,
        })
    }
}

/// A registered participant; unregisters its index when dropped
pub struct SequenceItem {
    host: SequenceHost,
    index: i32,
    visibility: VisibilityState,
}

impl SequenceItem {
    pub fn index(&self) -> i32 {
        self.index
    }

    /// Handle the rendering layer drives its transition from
    pub fn visibility(&self) -> &VisibilityState {
        &self.visibility
    }

    pub fn is_visible(&self) -> bool {
        self.visibility.target()
    }

    /// Re-register after the participant's parameters changed
    ///
    /// Identical parameters are a no-op. Different parameters conflict with the
    /// existing record; the conflict is logged and the old record kept. Returns
    /// whether the registry accepted the parameters.
    pub fn update(&mut self, enter: Transition, exit: Transition, delay_ms: u64) -> bool {
        match self.host.register(self.index, enter, exit, delay_ms) {
            Ok(visibility) => {
                self.visibility = visibility;
                true
            }
            Err(err) => {
                tracing::debug!(index = self.index, error = %err, "ignoring item update");
                false
            }
        }
    }
}

impl Drop for SequenceItem {
    fn drop(&mut self) {
        self.host.unregister(self.index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostState, RunOutcome};
    use std::time::Duration;

    fn manual() -> SequenceContext {
        SequenceContext::root(SequenceConfig::default().start_by_default(false))
    }

    #[test]
    fn test_scope_without_runtime_does_not_start() {
        let scope = SequenceScope::new(&SequenceContext::default());
        assert!(scope.autostart.is_none());
        assert_eq!(scope.host().state(), HostState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_autostart_runs_enter() {
        let scope = SequenceScope::new(&SequenceContext::default());
        let a = scope.item(0).delay_ms(100).register().unwrap();
        let b = scope.item(1).delay_ms(100).register().unwrap();
        assert!(!a.is_visible());

        // settle 300ms, then two 100ms delays
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(a.is_visible());
        assert!(b.is_visible());
        assert!(!scope.host().is_animating());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_scope_stays_hidden() {
        let scope = SequenceScope::new(&manual());
        let item = scope.item(0).register().unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!item.is_visible());
        assert!(!scope.host().is_animating());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_autostart() {
        let scope = SequenceScope::new(&SequenceContext::default());
        let host = scope.host().clone();
        let _item = scope.item(0).register().unwrap();
        tokio::task::yield_now().await;
        assert!(host.is_animating());

        drop(scope);
        tokio::task::yield_now().await;
        assert!(!host.is_animating());
        assert!(host.is_closed());
        assert!(host.registry().is_empty());
    }

    #[test]
    fn test_nested_scope_attaches_and_detaches() {
        let root = SequenceScope::new(&manual());
        let child = SequenceScope::new(&root.context());
        let child_id = child.host().id();

        assert_eq!(child.host().parent_id(), Some(root.host().id()));
        assert_eq!(root.host().children().len(), 1);

        drop(child);
        assert!(root.host().children().is_empty());
        assert!(!root.host().tree().contains(child_id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_manually_attached_scope_unlinks_it() {
        let ctx = manual();
        let parent = SequenceScope::new(&ctx);
        let child = SequenceScope::new(&ctx);
        assert!(parent.host().attach(child.host()));
        let item = parent.item(0).delay_ms(20).register().unwrap();

        let kept = child.host().clone();
        drop(child);
        assert!(kept.is_closed());
        assert!(parent.host().children().is_empty());

        parent.host().enter().await.unwrap();
        assert!(item.is_visible());
        assert_eq!(parent.host().exit(true).await.unwrap(), RunOutcome::Completed);
        assert!(!item.is_visible());
    }

    #[test]
    fn test_builder_defaults_from_config() {
        let ctx = SequenceContext::root(SequenceConfig {
            default_duration_ms: 120,
            default_delay_ms: 60,
            start_by_default: false,
        });
        let scope = SequenceScope::new(&ctx);
        let _item = scope.item(4).register().unwrap();

        let record = scope.host().registry().get(4).unwrap();
        assert_eq!(record.delay_ms, 60);
        assert_eq!(record.enter, Transition::fade_in(120));
        assert_eq!(record.exit_duration_ms, 120);
    }

    #[test]
    fn test_item_drop_unregisters() {
        let scope = SequenceScope::new(&manual());
        let item = scope.item(2).register().unwrap();
        assert!(scope.host().registry().contains(2));
        drop(item);
        assert!(!scope.host().registry().contains(2));
    }

    #[test]
    fn test_item_update() {
        let scope = SequenceScope::new(&manual());
        let mut item = scope
            .item(0)
            .enter(Transition::scale_in(200))
            .exit(Transition::scale_out(200))
            .delay_ms(50)
            .register()
            .unwrap();

        assert!(item.update(Transition::scale_in(200), Transition::scale_out(200), 50));
        assert!(!item.update(Transition::scale_in(200), Transition::scale_out(200), 75));
        assert_eq!(scope.host().registry().get(0).unwrap().delay_ms, 50);
    }

    #[test]
    fn test_duplicate_index_conflicts() {
        let scope = SequenceScope::new(&manual());
        let _first = scope.item(0).delay_ms(10).register().unwrap();
        assert!(scope.item(0).delay_ms(20).register().is_err());
    }
}
