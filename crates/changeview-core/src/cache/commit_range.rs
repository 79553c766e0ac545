use std::sync::Arc;

use super::history::{orientation, parent_tree};
use super::{Entries, ModelCache, RangeKey};
use crate::Result;
use crate::change_tree::ChangeTreeBuilder;
use crate::config::ModelConfig;
use crate::models::ChangeMap;
use crate::path_filter::PathFilter;
use crate::rev_walk::RevisionWalker;
use crate::store::{ObjectStore, RepositoryId};
use crate::tree_diff::changed_paths;

/// Every file touched anywhere in a range, one entry per path.
///
/// Commits are folded oldest first, so when several commits touch a path the
/// newest one decides its entry.
pub struct CommitRangeCache {
    filter: PathFilter,
    entries: Entries<RangeKey, ChangeMap>,
}

impl CommitRangeCache {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            filter: config.filter(),
            entries: Entries::new(),
        }
    }

    fn build(&self, store: &dyn ObjectStore, key: &RangeKey) -> Result<ChangeMap> {
        let walked = RevisionWalker::new(store).walk_ids(key.from, key.to)?;
        let mut changes = ChangeMap::new();
        for commit in walked.iter().rev() {
            let (direction, mirror) = orientation(commit.side);
            let raw = changed_paths(
                store,
                parent_tree(store, commit)?,
                Some(commit.tree_id),
                &self.filter,
            )?;
            let flat = ChangeTreeBuilder::new(commit.id, commit.first_parent, direction)
                .mirror(mirror)
                .build_flat(raw)?;
            changes.extend(flat.into_iter().flatten());
        }
        log::info!(
            "built flat range {}..{}: {} paths from {} commits",
            key.from,
            key.to,
            changes.len(),
            walked.len()
        );
        Ok(changes)
    }
}

impl ModelCache for CommitRangeCache {
    type Key = RangeKey;
    type Output = ChangeMap;

    fn get_or_build(&self, store: &dyn ObjectStore, key: &RangeKey) -> Result<Arc<ChangeMap>> {
        self.entries.get_or_try_insert(key, || self.build(store, key))
    }

    fn invalidate(&self, repository: &RepositoryId) {
        self.entries.invalidate(repository);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Kind, ModelNode};
    use crate::store::GitObjectStore;
    use test_repo::TestRepo;

    type Result<T = ()> = std::result::Result<T, Box<dyn std::error::Error>>;

    #[test]
    fn newest_commit_wins_per_path() -> Result {
        let t = TestRepo::new()?;
        t.write_file("base.txt", "base")?;
        let c0 = t.commit("c0")?;
        t.write_file("a.txt", "1")?;
        t.write_file("b.txt", "1")?;
        t.commit("c1")?;
        t.write_file("a.txt", "2")?;
        let c2 = t.commit("c2")?;
        let store = GitObjectStore::open(t.path())?;
        let cache = CommitRangeCache::new(&ModelConfig::default());

        let key = RangeKey::resolve(&store, &c0.to_string(), &c2.to_string())?;
        let changes = cache.get_or_build(&store, &key)?;
        let paths: Vec<_> = changes.keys().map(String::as_str).collect();
        assert_eq!(paths, vec!["a.txt", "b.txt"]);

        let a = &changes["a.txt"];
        assert_eq!(a.kind(), Kind::LEFT | Kind::CHANGE);
        assert_eq!(a.commit_id().object_id(), c2.object_id());
        assert_eq!(a.object_id().map(|i| i.object_id()), Some(t.blob_id("2")?));
        assert_eq!(changes["b.txt"].kind(), Kind::LEFT | Kind::ADDITION);
        Ok(())
    }

    #[test]
    fn reversed_range_is_mirrored() -> Result {
        let t = TestRepo::new()?;
        t.write_file("base.txt", "base")?;
        let c0 = t.commit("c0")?;
        t.write_file("a.txt", "1")?;
        let c1 = t.commit("c1")?;
        let store = GitObjectStore::open(t.path())?;
        let cache = CommitRangeCache::new(&ModelConfig::default());

        let key = RangeKey::resolve(&store, &c1.to_string(), &c0.to_string())?;
        let changes = cache.get_or_build(&store, &key)?;
        assert_eq!(changes["a.txt"].kind(), Kind::RIGHT | Kind::DELETION);
        assert_eq!(changes["a.txt"].object_id(), None);
        Ok(())
    }
}
