//! Entry points for embedders: resolve names, consult the caches, build on miss.

use std::sync::Arc;

use crate::Result;
use crate::cache::{CacheRegistry, ModelCache, RangeKey};
use crate::models::{ChangeMap, Commit};
use crate::store::ObjectStore;
use crate::three_way::{ThreeWayChange, ThreeWayDiff};

/// Where a flat change map comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlatSource {
    /// Index against HEAD.
    Staged,
    /// Working tree against the index.
    WorkingTree,
    /// Every file changed between two revisions.
    Range { from: String, to: String },
}

pub fn build_history_range(
    registry: &CacheRegistry,
    store: &dyn ObjectStore,
    from: &str,
    to: &str,
) -> Result<Arc<Vec<Commit>>> {
    let key = RangeKey::resolve(store, from, to)?;
    registry.history().get_or_build(store, &key)
}

pub fn build_flat_changes(
    registry: &CacheRegistry,
    store: &dyn ObjectStore,
    source: FlatSource,
) -> Result<Arc<ChangeMap>> {
    match source {
        FlatSource::Staged => registry.staged().get_or_build(store, &store.identity()),
        FlatSource::WorkingTree => registry.working_tree().get_or_build(store, &store.identity()),
        FlatSource::Range { from, to } => {
            let key = RangeKey::resolve(store, &from, &to)?;
            registry.commit_range().get_or_build(store, &key)
        }
    }
}

/// Compare `local` and `remote` against `base`; every revision must resolve.
pub fn classify_three_way(
    store: &dyn ObjectStore,
    base: &str,
    local: &str,
    remote: &str,
) -> Result<Vec<ThreeWayChange>> {
    let base = store.resolve(base)?;
    let local = store.resolve(local)?;
    let remote = store.resolve(remote)?;
    Ok(ThreeWayDiff::run(store, Some(base), local, remote)?.into_entries())
}
