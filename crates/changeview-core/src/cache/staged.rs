use std::collections::BTreeMap;
use std::sync::Arc;

use changeview_types::ObjectId;

use super::{Entries, ModelCache};
use crate::Result;
use crate::change_tree::ChangeTreeBuilder;
use crate::config::ModelConfig;
use crate::models::{Change, ChangeMap, CommitPair, Direction, Kind};
use crate::path_filter::PathFilter;
use crate::store::{IndexRecord, ObjectStore, RepositoryId};
use crate::tree_diff::{FlatEntry, diff_sorted, flatten_tree};

/// What `git commit` would record: the index compared with HEAD.
///
/// Unmerged paths are reported as conflicting changes with the "ours" stage
/// as local and the "theirs" stage as remote.
pub struct StagedChangeCache {
    filter: PathFilter,
    entries: Entries<RepositoryId, ChangeMap>,
}

#[derive(Default)]
struct Stages {
    ours: Option<ObjectId>,
    theirs: Option<ObjectId>,
}

impl StagedChangeCache {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            filter: config.filter(),
            entries: Entries::new(),
        }
    }

    fn build(&self, store: &dyn ObjectStore) -> Result<ChangeMap> {
        let head = store.head()?;
        let head_tree = match head {
            Some(head) => Some(store.commit(head)?.tree_id),
            None => None,
        };

        let mut merged: Vec<FlatEntry> = Vec::new();
        let mut unmerged: BTreeMap<String, Stages> = BTreeMap::new();
        for IndexRecord {
            path,
            id,
            mode,
            stage,
        } in store.index_entries()?
        {
            if !self.filter.matches(&path) {
                continue;
            }
            match stage {
                0 => merged.push(FlatEntry { path, id, mode }),
                2 => unmerged.entry(path).or_default().ours = Some(id),
                3 => unmerged.entry(path).or_default().theirs = Some(id),
                _ => {
                    unmerged.entry(path).or_default();
                }
            }
        }
        merged.sort_by(|a, b| a.path.as_bytes().cmp(b.path.as_bytes()));

        let committed: Vec<FlatEntry> = flatten_tree(store, head_tree)?
            .into_iter()
            .filter(|e| self.filter.matches(&e.path) && !unmerged.contains_key(&e.path))
            .collect();

        let local_commit = head.unwrap_or_else(ObjectId::zero);
        let raw = diff_sorted(&committed, &merged);
        let mut changes = ChangeTreeBuilder::new(local_commit, head, Direction::Left)
            .build_flat(raw)?
            .unwrap_or_default();

        let commits = CommitPair::new(local_commit, head);
        for (path, stages) in unmerged {
            let change = Change::file(
                path.clone(),
                Kind::CONFLICTING | Kind::CHANGE,
                commits,
                stages.ours,
                stages.theirs,
            );
            changes.insert(path, change);
        }

        log::info!("built staged changes: {} paths", changes.len());
        Ok(changes)
    }
}

impl ModelCache for StagedChangeCache {
    type Key = RepositoryId;
    type Output = ChangeMap;

    fn get_or_build(&self, store: &dyn ObjectStore, key: &RepositoryId) -> Result<Arc<ChangeMap>> {
        self.entries.get_or_try_insert(key, || self.build(store))
    }

    fn invalidate(&self, repository: &RepositoryId) {
        self.entries.invalidate(repository);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
