//! Memoized change models.
//!
//! Every cache hands out `Arc`s: asking twice for the same key returns the same
//! allocation without touching the store again. Builds that fail leave nothing
//! behind. Entries live until their repository is invalidated.

mod commit_range;
mod history;
mod staged;
mod working_tree;

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use changeview_types::ObjectId;

pub use commit_range::CommitRangeCache;
pub use history::HistoryRangeCache;
pub use staged::StagedChangeCache;
pub use working_tree::WorkingTreeChangeCache;

use crate::Result;
use crate::config::ModelConfig;
use crate::store::{ObjectStore, RepositoryId};

pub trait ModelCache {
    type Key: CacheKey;
    type Output;

    fn get_or_build(&self, store: &dyn ObjectStore, key: &Self::Key) -> Result<Arc<Self::Output>>;

    /// Drop every entry that belongs to `repository`.
    fn invalidate(&self, repository: &RepositoryId);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait CacheKey: Clone + Eq + Hash {
    fn repository(&self) -> &RepositoryId;
}

impl CacheKey for RepositoryId {
    fn repository(&self) -> &RepositoryId {
        self
    }
}

/// Key of the range caches: a repository and two resolved commits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeKey {
    pub repository: RepositoryId,
    pub from: ObjectId,
    pub to: ObjectId,
}

impl RangeKey {
    pub fn resolve(store: &dyn ObjectStore, from: &str, to: &str) -> Result<RangeKey> {
        Ok(RangeKey {
            repository: store.identity(),
            from: store.resolve(from)?,
            to: store.resolve(to)?,
        })
    }
}

impl CacheKey for RangeKey {
    fn repository(&self) -> &RepositoryId {
        &self.repository
    }
}

struct Entries<K, V> {
    map: Mutex<HashMap<K, Arc<V>>>,
}

impl<K: CacheKey, V> Entries<K, V> {
    fn new() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Arc<V>>> {
        self.map.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The lock is not held while building, so `build` may use other caches.
    fn get_or_try_insert(&self, key: &K, build: impl FnOnce() -> Result<V>) -> Result<Arc<V>> {
        if let Some(value) = self.lock().get(key) {
            return Ok(Arc::clone(value));
        }
        let value = Arc::new(build()?);
        Ok(Arc::clone(self.lock().entry(key.clone()).or_insert(value)))
    }

    fn invalidate(&self, repository: &RepositoryId) -> usize {
        let mut map = self.lock();
        let before = map.len();
        map.retain(|key, _| key.repository() != repository);
        before - map.len()
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Emitted by [`RefMonitor`] when a repository's refs moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefsChanged {
    pub repository: RepositoryId,
}

/// Detects ref movement by comparing fingerprints between polls.
#[derive(Debug, Default)]
pub struct RefMonitor {
    seen: HashMap<RepositoryId, u64>,
}

impl RefMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` on the first poll of a repository and whenever nothing moved.
    pub fn poll(&mut self, store: &dyn ObjectStore) -> Result<Option<RefsChanged>> {
        let repository = store.identity();
        let fingerprint = store.refs_fingerprint()?;
        match self.seen.insert(repository.clone(), fingerprint) {
            Some(previous) if previous != fingerprint => {
                log::debug!("refs of {repository} moved");
                Ok(Some(RefsChanged { repository }))
            }
            _ => Ok(None),
        }
    }
}

/// The four model caches of a session, sharing one configuration.
pub struct CacheRegistry {
    config: ModelConfig,
    history: HistoryRangeCache,
    staged: StagedChangeCache,
    working_tree: WorkingTreeChangeCache,
    commit_range: CommitRangeCache,
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new(ModelConfig::default())
    }
}

impl CacheRegistry {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            history: HistoryRangeCache::new(&config),
            staged: StagedChangeCache::new(&config),
            working_tree: WorkingTreeChangeCache::new(&config),
            commit_range: CommitRangeCache::new(&config),
            config,
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn history(&self) -> &HistoryRangeCache {
        &self.history
    }

    pub fn staged(&self) -> &StagedChangeCache {
        &self.staged
    }

    pub fn working_tree(&self) -> &WorkingTreeChangeCache {
        &self.working_tree
    }

    pub fn commit_range(&self) -> &CommitRangeCache {
        &self.commit_range
    }

    pub fn invalidate(&self, repository: &RepositoryId) {
        self.history.invalidate(repository);
        self.staged.invalidate(repository);
        self.working_tree.invalidate(repository);
        self.commit_range.invalidate(repository);
        log::info!("invalidated change models of {repository}");
    }

    pub fn on_refs_changed(&self, event: &RefsChanged) {
        self.invalidate(&event.repository);
    }
}
