//! Transition descriptors for entry/exit effects
//!
//! The sequencing engine never paints anything. A descriptor only names the
//! effect the rendering layer should play and how long it takes, so hosts can
//! schedule the next step. Presets mirror the common fade/scale/slide pairs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Duration used when a descriptor carries no explicit duration
pub const DEFAULT_DURATION_MS: u64 = 300;

/// Delay inserted after an item's step when none is configured
pub const DEFAULT_DELAY_MS: u64 = 400;

/// Whether a descriptor shows or hides its item
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Enter,
    Exit,
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionKind::Enter => f.write_str("enter"),
            TransitionKind::Exit => f.write_str("exit"),
        }
    }
}

/// Direction for slide transitions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlideDirection {
    Left,
    Right,
    Up,
    Down,
}

/// Visual effect requested from the rendering layer
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Fade,
    Scale,
    SlideLeft,
    SlideRight,
    SlideUp,
    SlideDown,
    Expand,
    Shrink,
    /// Several effects played together
    Composite(Vec<Effect>),
    /// Effect known only to the rendering layer
    Custom(String),
}

impl Effect {
    fn slide(direction: SlideDirection) -> Self {
        match direction {
            SlideDirection::Left => Effect::SlideLeft,
            SlideDirection::Right => Effect::SlideRight,
            SlideDirection::Up => Effect::SlideUp,
            SlideDirection::Down => Effect::SlideDown,
        }
    }
}

/// An enter or exit descriptor with an optional explicit duration
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transition {
    pub kind: TransitionKind,
    pub effect: Effect,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

impl Transition {
    /// Create an enter descriptor without a known duration
    pub fn enter(effect: Effect) -> Self {
        Self {
            kind: TransitionKind::Enter,
            effect,
            duration_ms: None,
        }
    }

    /// Create an exit descriptor without a known duration
    pub fn exit(effect: Effect) -> Self {
        Self {
            kind: TransitionKind::Exit,
            effect,
            duration_ms: None,
        }
    }

    /// Set the explicit duration
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Play `other` alongside this transition
    ///
    /// The combined descriptor has no duration of its own; set one with
    /// [`Transition::with_duration`] or it falls back to the default.
    ///
    /// Both descriptors must have the same kind.
    pub fn and(self, other: Transition) -> Self {
        debug_assert_eq!(
            self.kind, other.kind,
            "cannot combine an {} transition with an {} transition",
            self.kind, other.kind
        );
        let mut effects = match self.effect {
            Effect::Composite(effects) => effects,
            effect => vec![effect],
        };
        match other.effect {
            Effect::Composite(more) => effects.extend(more),
            effect => effects.push(effect),
        }
        Self {
            kind: self.kind,
            effect: Effect::Composite(effects),
            duration_ms: None,
        }
    }

    /// Duration in milliseconds, or `default_ms` when the descriptor has none
    pub fn resolve_duration(&self, default_ms: u64) -> u64 {
        self.duration_ms.unwrap_or(default_ms)
    }

    // ========================================================================
    // Presets
    // ========================================================================

    /// Fade in from transparent
    pub fn fade_in(duration_ms: u64) -> Self {
        Self::enter(Effect::Fade).with_duration(duration_ms)
    }

    /// Fade out to transparent
    pub fn fade_out(duration_ms: u64) -> Self {
        Self::exit(Effect::Fade).with_duration(duration_ms)
    }

    /// Scale up from nothing
    pub fn scale_in(duration_ms: u64) -> Self {
        Self::enter(Effect::Scale).with_duration(duration_ms)
    }

    /// Scale down to nothing
    pub fn scale_out(duration_ms: u64) -> Self {
        Self::exit(Effect::Scale).with_duration(duration_ms)
    }

    /// Slide in from the given side
    pub fn slide_in(direction: SlideDirection, duration_ms: u64) -> Self {
        Self::enter(Effect::slide(direction)).with_duration(duration_ms)
    }

    /// Slide out towards the given side
    pub fn slide_out(direction: SlideDirection, duration_ms: u64) -> Self {
        Self::exit(Effect::slide(direction)).with_duration(duration_ms)
    }

    /// Expand from zero size
    pub fn expand_in(duration_ms: u64) -> Self {
        Self::enter(Effect::Expand).with_duration(duration_ms)
    }

    /// Shrink to zero size
    pub fn shrink_out(duration_ms: u64) -> Self {
        Self::exit(Effect::Shrink).with_duration(duration_ms)
    }

    /// Default enter transition: fade in over [`DEFAULT_DURATION_MS`]
    pub fn default_enter() -> Self {
        Self::fade_in(DEFAULT_DURATION_MS)
    }

    /// Default exit transition: fade out over [`DEFAULT_DURATION_MS`]
    pub fn default_exit() -> Self {
        Self::fade_out(DEFAULT_DURATION_MS)
    }
}
