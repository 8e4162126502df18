//! Cadence Sequencing Engine
//!
//! Ordered enter/exit visibility transitions across registered items, with
//! nested hosts that cascade exits depth-first.
//!
//! # Features
//!
//! - **Registry**: items keyed by index, safe to mutate mid-sequence
//! - **Single-run guard**: one whole-sequence enter or exit per host at a time
//! - **Ordered steps**: ascending on enter, descending on exit, with per-item delays
//! - **Cascade**: exits run through child hosts before the host's own items
//! - **Cancellation**: every wait is cancellable and never leaves a host busy
//!
//! The engine does not paint anything. Each item exposes a
//! [`VisibilityState`] the rendering layer subscribes to.
//!
//! # Example
//!
//! ```rust
//! use cadence_sequence::{HostTree, SequenceConfig, SequenceHost, Transition};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
//! let tree = HostTree::new();
//! let host = SequenceHost::new(&tree, SequenceConfig::default());
//!
//! let title = host
//!     .register(0, Transition::fade_in(0), Transition::fade_out(0), 0)
//!     .unwrap();
//! let body = host
//!     .register(1, Transition::fade_in(0), Transition::fade_out(0), 0)
//!     .unwrap();
//!
//! host.enter().await.unwrap();
//! assert!(title.target() && body.target());
//!
//! host.exit(true).await.unwrap();
//! assert!(!title.target() && !body.target());
//! # });
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod registry;
pub mod scope;
pub mod transition;
pub mod tree;

pub use config::SequenceConfig;
pub use error::{Result, SequenceError, StepError};
pub use host::{HostState, RunOutcome, SequenceFuture, SequenceHost, StepEvent, StepHook, StepPhase};
pub use registry::{ItemRecord, ItemRegistry, VisibilityState};
pub use scope::{ItemBuilder, ScopeOptions, SequenceContext, SequenceItem, SequenceScope};
pub use transition::{
    Effect, SlideDirection, Transition, TransitionKind, DEFAULT_DELAY_MS, DEFAULT_DURATION_MS,
};
pub use tree::{HostId, HostTree};
