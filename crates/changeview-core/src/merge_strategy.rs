//! Per-path side selection for three-way comparisons.
//!
//! A strategy only decides which side's content a path should end up with.
//! Writing the merged tree is left to the caller.

use std::collections::BTreeMap;

use changeview_types::ObjectId;
use serde::Serialize;

use crate::models::Direction;
use crate::three_way::{ThreeWayChange, ThreeWayDiff};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "resolution", rename_all = "camelCase")]
pub enum Resolution {
    /// Use this id for the path; `None` removes it.
    Take { id: Option<ObjectId> },
    /// Both sides changed the path and the strategy does not pick one.
    Conflict,
}

pub trait MergeStrategy {
    fn name(&self) -> &str;

    fn pick(&self, change: &ThreeWayChange) -> Resolution;
}

/// Always the local side.
pub struct Ours;

impl MergeStrategy for Ours {
    fn name(&self) -> &str {
        "ours"
    }

    fn pick(&self, change: &ThreeWayChange) -> Resolution {
        Resolution::Take { id: change.local }
    }
}

/// Always the remote side.
pub struct Theirs;

impl MergeStrategy for Theirs {
    fn name(&self) -> &str {
        "theirs"
    }

    fn pick(&self, change: &ThreeWayChange) -> Resolution {
        Resolution::Take { id: change.remote }
    }
}

/// Takes whichever side changed; leaves real conflicts unresolved.
pub struct Resolve;

impl MergeStrategy for Resolve {
    fn name(&self) -> &str {
        "resolve"
    }

    fn pick(&self, change: &ThreeWayChange) -> Resolution {
        match change.direction {
            Direction::Outgoing | Direction::Left => Resolution::Take { id: change.local },
            Direction::Incoming | Direction::Right => Resolution::Take { id: change.remote },
            Direction::Conflicting => Resolution::Conflict,
        }
    }
}

/// Strategies by name, filled once at startup.
pub struct StrategyRegistry {
    strategies: BTreeMap<String, Box<dyn MergeStrategy>>,
}

impl StrategyRegistry {
    pub fn empty() -> Self {
        Self {
            strategies: BTreeMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(Ours));
        registry.register(Box::new(Theirs));
        registry.register(Box::new(Resolve));
        registry
    }

    /// Adds a strategy, replacing any previous one with the same name.
    pub fn register(&mut self, strategy: Box<dyn MergeStrategy>) {
        let name = strategy.name().to_string();
        if self.strategies.insert(name.clone(), strategy).is_some() {
            log::warn!("merge strategy {name} registered twice, keeping the last one");
        }
    }

    pub fn get(&self, name: &str) -> Result<&dyn MergeStrategy> {
        self.strategies
            .get(name)
            .map(|s| s.as_ref())
            .ok_or_else(|| {
                Error::invalid_argument(format!(
                    "unknown merge strategy {name}, known: {}",
                    self.names().join(", ")
                ))
            })
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.keys().map(String::as_str).collect()
    }
}

/// Resolution for every changed path, in path order.
pub fn resolve_all(
    strategy: &dyn MergeStrategy,
    diff: &ThreeWayDiff,
) -> Vec<(String, Resolution)> {
    diff.entries()
        .iter()
        .map(|change| (change.path.clone(), strategy.pick(change)))
        .collect()
}
