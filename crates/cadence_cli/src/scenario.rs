//! Scenario files (scenario.toml)
//!
//! A scenario describes a tree of scopes and the items registered in each:
//!
//! ```toml
//! [config]
//! default_delay_ms = 150
//!
//! [[scope]]
//! name = "page"
//!
//! [[scope.item]]
//! index = 0
//! label = "title"
//! enter = { effect = "fade", duration_ms = 200 }
//!
//! [[scope.scope]]
//! name = "list"
//! ```

use anyhow::{Context, Result};
use cadence_sequence::{
    Effect, SequenceConfig, SequenceContext, SequenceItem, SequenceScope, Transition,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level scenario document
#[derive(Debug, Deserialize, Serialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: SequenceConfig,
    #[serde(default, rename = "scope")]
    pub scopes: Vec<ScopeSpec>,
}

/// One sequencing scope and its nested scopes
#[derive(Debug, Deserialize, Serialize)]
pub struct ScopeSpec {
    pub name: String,
    #[serde(default, rename = "item")]
    pub items: Vec<ItemSpec>,
    #[serde(default, rename = "scope")]
    pub scopes: Vec<ScopeSpec>,
}

/// One participant; unset fields use the scenario config
#[derive(Debug, Deserialize, Serialize)]
pub struct ItemSpec {
    pub index: i32,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub delay_ms: Option<u64>,
    #[serde(default)]
    pub enter: Option<TransitionSpec>,
    #[serde(default)]
    pub exit: Option<TransitionSpec>,
}

/// Effect plus optional duration; the kind comes from the slot
#[derive(Debug, Deserialize, Serialize)]
pub struct TransitionSpec {
    pub effect: Effect,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

impl TransitionSpec {
    fn to_enter(&self) -> Transition {
        with_duration(Transition::enter(self.effect.clone()), self.duration_ms)
    }

    fn to_exit(&self) -> Transition {
        with_duration(Transition::exit(self.effect.clone()), self.duration_ms)
    }
}

fn with_duration(transition: Transition, duration_ms: Option<u64>) -> Transition {
    match duration_ms {
        Some(ms) => transition.with_duration(ms),
        None => transition,
    }
}

impl Scenario {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let scenario: Scenario = toml::from_str(content)?;
        scenario.config.validate()?;
        Ok(scenario)
    }

    /// Load a scenario file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Create scopes and register every item
    ///
    /// Autostart is always off; the caller decides when sequences run.
    pub fn build(&self) -> Result<Vec<BuiltScope>> {
        let ctx = SequenceContext::root(self.config.clone().start_by_default(false));
        self.scopes
            .iter()
            .map(|spec| BuiltScope::build(spec, &ctx, &spec.name))
            .collect()
    }
}

/// A live item plus the label used in output
pub struct BuiltItem {
    pub label: String,
    pub item: SequenceItem,
}

/// A live scope with its items and nested scopes
///
/// Field order matters: items and children drop before the scope itself.
pub struct BuiltScope {
    pub path: String,
    pub items: Vec<BuiltItem>,
    pub children: Vec<BuiltScope>,
    pub scope: SequenceScope,
}

impl BuiltScope {
    fn build(spec: &ScopeSpec, ctx: &SequenceContext, path: &str) -> Result<Self> {
        let scope = SequenceScope::new(ctx);

        let mut items = Vec::with_capacity(spec.items.len());
        for item in &spec.items {
            let mut builder = scope.item(item.index);
            if let Some(delay) = item.delay_ms {
                builder = builder.delay_ms(delay);
            }
            if let Some(enter) = &item.enter {
                builder = builder.enter(enter.to_enter());
            }
            if let Some(exit) = &item.exit {
                builder = builder.exit(exit.to_exit());
            }
            let registered = builder
                .register()
                .with_context(|| format!("scope `{}`, item {}", path, item.index))?;
            items.push(BuiltItem {
                label: item
                    .label
                    .clone()
                    .unwrap_or_else(|| format!("#{}", item.index)),
                item: registered,
            });
        }

        let child_ctx = scope.context();
        let children = spec
            .scopes
            .iter()
            .map(|child| BuiltScope::build(child, &child_ctx, &format!("{}/{}", path, child.name)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            path: path.to_string(),
            items,
            children,
            scope,
        })
    }

    /// This scope followed by all descendants, depth-first
    pub fn walk(&self) -> Vec<&BuiltScope> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }

    /// Time a whole-sequence enter would take: longest exit plus every delay
    pub fn estimated_enter_ms(&self) -> u64 {
        let registry = self.scope.host().registry();
        let delays: u64 = registry.snapshot(true).iter().map(|r| r.delay_ms).sum();
        registry.max_exit_duration() + delays
    }
}
