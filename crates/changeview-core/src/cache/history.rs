use std::sync::Arc;

use changeview_types::ObjectId;

use super::{Entries, ModelCache, RangeKey};
use crate::Result;
use crate::change_tree::ChangeTreeBuilder;
use crate::config::ModelConfig;
use crate::models::{Commit, Direction, ModelNode};
use crate::path_filter::PathFilter;
use crate::rev_walk::{RevisionWalker, Side, WalkedCommit};
use crate::store::{ObjectStore, RepositoryId};
use crate::tree_diff::changed_paths;

/// Commits on both sides of a range, each with its changes as a folder tree.
///
/// Commits only reachable from `to` are `LEFT` and show the commit's own tree
/// as local. Commits only reachable from `from` are `RIGHT` and mirrored, so
/// their parent's tree is local.
pub struct HistoryRangeCache {
    filter: PathFilter,
    skip_empty_commits: bool,
    entries: Entries<RangeKey, Vec<Commit>>,
}

impl HistoryRangeCache {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            filter: config.filter(),
            skip_empty_commits: config.skip_empty_commits,
            entries: Entries::new(),
        }
    }

    fn build(&self, store: &dyn ObjectStore, key: &RangeKey) -> Result<Vec<Commit>> {
        let walked = RevisionWalker::new(store).walk_ids(key.from, key.to)?;
        let mut commits = Vec::with_capacity(walked.len());
        for commit in &walked {
            let model = commit_model(store, commit, &self.filter)?;
            if model.children().is_none() && self.skip_empty_commits {
                continue;
            }
            commits.push(model);
        }
        log::info!(
            "built history {}..{} with {} commits",
            key.from,
            key.to,
            commits.len()
        );
        Ok(commits)
    }
}

/// Direction and mirroring of a commit from the given side of a range.
pub(super) fn orientation(side: Side) -> (Direction, bool) {
    match side {
        Side::To => (Direction::Left, false),
        Side::From => (Direction::Right, true),
    }
}

pub(super) fn parent_tree(
    store: &dyn ObjectStore,
    commit: &WalkedCommit,
) -> Result<Option<ObjectId>> {
    match commit.first_parent {
        Some(parent) => Ok(Some(store.commit(parent)?.tree_id)),
        None => Ok(None),
    }
}

fn commit_model(
    store: &dyn ObjectStore,
    commit: &WalkedCommit,
    filter: &PathFilter,
) -> Result<Commit> {
    let (direction, mirror) = orientation(commit.side);
    let raw = changed_paths(
        store,
        parent_tree(store, commit)?,
        Some(commit.tree_id),
        filter,
    )?;
    let children = ChangeTreeBuilder::new(commit.id, commit.first_parent, direction)
        .mirror(mirror)
        .build_tree(raw)?;
    Ok(Commit::new(&commit.commit, direction.bits(), children))
}

impl ModelCache for HistoryRangeCache {
    type Key = RangeKey;
    type Output = Vec<Commit>;

    fn get_or_build(&self, store: &dyn ObjectStore, key: &RangeKey) -> Result<Arc<Vec<Commit>>> {
        self.entries.get_or_try_insert(key, || self.build(store, key))
    }

    fn invalidate(&self, repository: &RepositoryId) {
        let dropped = self.entries.invalidate(repository);
        log::debug!("dropped {dropped} history ranges of {repository}");
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Kind, find_in};
    use crate::store::GitObjectStore;
    use crate::testing::CountingStore;
    use test_repo::TestRepo;

    type Result<T = ()> = std::result::Result<T, Box<dyn std::error::Error>>;

    fn key(store: &dyn ObjectStore, from: &str, to: &str) -> crate::Result<RangeKey> {
        RangeKey::resolve(store, from, to)
    }

    #[test]
    fn added_file_is_left_addition_and_mirrors_to_right_deletion() -> Result {
        let t = TestRepo::new()?;
        t.write_file("base.txt", "base")?;
        let c0 = t.commit("c0")?;
        t.write_file("a.txt", "x")?;
        let c1 = t.commit("c1")?;
        let store = GitObjectStore::open(t.path())?;
        let cache = HistoryRangeCache::new(&ModelConfig::default());

        let forward = cache.get_or_build(&store, &key(&store, &c0.to_string(), &c1.to_string())?)?;
        assert_eq!(forward.len(), 1);
        assert_eq!(forward[0].id().object_id(), c1.object_id());
        assert_eq!(forward[0].kind(), Kind::LEFT);
        let children = forward[0].children().ok_or("no changes")?;
        let added = find_in(children, "a.txt").ok_or("missing a.txt")?;
        assert_eq!(added.kind(), Kind::LEFT | Kind::ADDITION);
        assert_eq!(
            added.object_id().map(|id| id.object_id()),
            Some(t.blob_id("x")?)
        );
        assert_eq!(added.remote_object_id(), None);

        let backward = cache.get_or_build(&store, &key(&store, &c1.to_string(), &c0.to_string())?)?;
        assert_eq!(backward.len(), 1);
        assert_eq!(backward[0].id().object_id(), c1.object_id());
        assert_eq!(backward[0].kind(), Kind::RIGHT);
        let children = backward[0].children().ok_or("no changes")?;
        let deleted = find_in(children, "a.txt").ok_or("missing a.txt")?;
        assert_eq!(deleted.kind(), Kind::RIGHT | Kind::DELETION);
        assert_eq!(deleted.object_id(), None);
        assert_eq!(
            deleted.remote_object_id().map(|id| id.object_id()),
            Some(t.blob_id("x")?)
        );
        Ok(())
    }

    #[test]
    fn repeated_requests_share_one_model() -> Result {
        let t = TestRepo::new()?;
        t.write_file("a.txt", "0")?;
        let c0 = t.commit("c0")?;
        t.write_file("a.txt", "1")?;
        t.write_file("dir/b.txt", "1")?;
        let c1 = t.commit("c1")?;
        let store = CountingStore::new(GitObjectStore::open(t.path())?);
        let cache = HistoryRangeCache::new(&ModelConfig::default());
        let range = key(&store, &c0.to_string(), &c1.to_string())?;

        let first = cache.get_or_build(&store, &range)?;
        let reads = (store.commit_reads(), store.tree_reads());
        let second = cache.get_or_build(&store, &range)?;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!((store.commit_reads(), store.tree_reads()), reads);
        Ok(())
    }

    #[test]
    fn empty_range_has_no_commits() -> Result {
        let t = TestRepo::new()?;
        t.write_file("a.txt", "0")?;
        let c0 = t.commit("c0")?;
        let store = GitObjectStore::open(t.path())?;
        let cache = HistoryRangeCache::new(&ModelConfig::default());

        let commits = cache.get_or_build(&store, &key(&store, &c0.to_string(), &c0.to_string())?)?;
        assert!(commits.is_empty());
        Ok(())
    }

    #[test]
    fn empty_commit_has_no_children() -> Result {
        let t = TestRepo::new()?;
        t.write_file("a.txt", "0")?;
        let c0 = t.commit("c0")?;
        let empty = t.commit("nothing changed")?;
        let store = GitObjectStore::open(t.path())?;

        let cache = HistoryRangeCache::new(&ModelConfig::default());
        let range = key(&store, &c0.to_string(), &empty.to_string())?;
        let commits = cache.get_or_build(&store, &range)?;
        assert_eq!(commits.len(), 1);
        assert!(commits[0].children().is_none());

        let skipping = HistoryRangeCache::new(&ModelConfig {
            skip_empty_commits: true,
            ..ModelConfig::default()
        });
        let commits = skipping.get_or_build(&store, &range)?;
        assert!(commits.is_empty());
        Ok(())
    }

    #[test]
    fn root_commit_is_compared_with_the_empty_tree() -> Result {
        let t = TestRepo::new()?;
        t.write_file("a.txt", "first")?;
        let root = t.commit("root")?;
        t.write_file("b.txt", "second")?;
        let other_root = t.merge_commit("other root", &[])?;
        let store = GitObjectStore::open(t.path())?;
        let cache = HistoryRangeCache::new(&ModelConfig::default());

        let commits = cache.get_or_build(
            &store,
            &key(&store, &root.to_string(), &other_root.to_string())?,
        )?;
        assert_eq!(commits.len(), 2);
        let left = commits[0].children().ok_or("no changes")?;
        let names: Vec<_> = left.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
        assert!(left.iter().all(|c| c.kind() == Kind::LEFT | Kind::ADDITION));
        Ok(())
    }

    #[test]
    fn failed_builds_are_not_cached() -> Result {
        let t = TestRepo::new()?;
        t.write_file("a.txt", "0")?;
        let c0 = t.commit("c0")?;
        t.write_file("a.txt", "1")?;
        let c1 = t.commit("c1")?;
        let store = CountingStore::new(GitObjectStore::open(t.path())?);
        let cache = HistoryRangeCache::new(&ModelConfig::default());
        let range = key(&store, &c0.to_string(), &c1.to_string())?;

        store.fail_trees(true);
        assert!(cache.get_or_build(&store, &range).is_err());
        assert!(cache.is_empty());

        store.fail_trees(false);
        let built = cache.get_or_build(&store, &range)?;
        assert_eq!(built.len(), 1);
        assert!(Arc::ptr_eq(&built, &cache.get_or_build(&store, &range)?));
        Ok(())
    }

    #[test]
    fn path_filter_hides_other_paths() -> Result {
        let t = TestRepo::new()?;
        t.write_file("src/a.rs", "a")?;
        let c0 = t.commit("c0")?;
        t.write_file("docs/readme.md", "docs")?;
        let docs_only = t.commit("docs only")?;
        t.write_file("src/a.rs", "b")?;
        let c2 = t.commit("src change")?;
        let store = GitObjectStore::open(t.path())?;
        let config = ModelConfig {
            path_filter: vec!["src".to_string()],
            ..ModelConfig::default()
        };
        let cache = HistoryRangeCache::new(&config);

        let commits = cache.get_or_build(&store, &key(&store, &c0.to_string(), &c2.to_string())?)?;
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[1].id().object_id(), docs_only.object_id());
        assert!(commits[1].children().is_none());
        let src = commits[0].children().ok_or("no changes")?;
        assert!(find_in(src, "src/a.rs").is_some());
        Ok(())
    }
}
