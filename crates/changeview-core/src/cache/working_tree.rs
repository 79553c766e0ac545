use std::collections::HashMap;
use std::sync::Arc;

use changeview_types::ObjectId;

use super::{Entries, ModelCache};
use crate::change_tree::ChangeTreeBuilder;
use crate::config::ModelConfig;
use crate::models::{Change, ChangeMap, CommitPair, Direction, Kind, RawChange};
use crate::store::{ObjectStore, RepositoryId, StatusKind, StatusQuery};
use crate::{Error, Result};

/// Unstaged work: the working tree compared with the index.
///
/// Files are hashed only when the status says they differ from the index. A
/// modified file whose content still hashes to the indexed id changed its mode
/// and is reported as a modification.
pub struct WorkingTreeChangeCache {
    query: StatusQuery,
    entries: Entries<RepositoryId, ChangeMap>,
}

impl WorkingTreeChangeCache {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            query: config.status_query(),
            entries: Entries::new(),
        }
    }

    fn build(&self, store: &dyn ObjectStore) -> Result<ChangeMap> {
        let head = store.head()?;
        let local_commit = head.unwrap_or_else(ObjectId::zero);

        let mut merged: HashMap<String, ObjectId> = HashMap::new();
        let mut theirs: HashMap<String, ObjectId> = HashMap::new();
        for record in store.index_entries()? {
            match record.stage {
                0 => {
                    merged.insert(record.path, record.id);
                }
                3 => {
                    theirs.insert(record.path, record.id);
                }
                _ => {}
            }
        }

        let mut raw = Vec::new();
        let mut conflicts = Vec::new();
        for status in store.working_tree_status(&self.query)? {
            let path = status.path;
            if path.ends_with('/') {
                log::debug!("skipping untracked directory {path}");
                continue;
            }
            match status.kind {
                StatusKind::Modified | StatusKind::TypeChange => {
                    let current = store.hash_working_file(&path)?;
                    let indexed = merged.get(&path).copied();
                    // Equal ids here mean only the file mode changed.
                    let change = RawChange::new(path.clone(), indexed, Some(current)).or_else(|| {
                        indexed.map(|id| RawChange::modified(path.clone(), id, current))
                    });
                    raw.extend(change);
                }
                StatusKind::Deleted => {
                    let indexed = merged.get(&path).copied();
                    raw.extend(RawChange::new(path, indexed, None));
                }
                StatusKind::Untracked | StatusKind::Ignored => {
                    let current = store.hash_working_file(&path)?;
                    raw.extend(RawChange::new(path, None, Some(current)));
                }
                StatusKind::Conflicted => {
                    let current = match store.hash_working_file(&path) {
                        Ok(id) => Some(id),
                        Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => None,
                        Err(e) => return Err(e),
                    };
                    let remote = theirs.get(&path).copied();
                    conflicts.push((path, current, remote));
                }
            }
        }
        raw.sort_by(|a, b| a.path.as_bytes().cmp(b.path.as_bytes()));

        let mut changes = ChangeTreeBuilder::new(local_commit, head, Direction::Left)
            .build_flat(raw)?
            .unwrap_or_default();
        let commits = CommitPair::new(local_commit, head);
        for (path, current, remote) in conflicts {
            let change = Change::file(
                path.clone(),
                Kind::CONFLICTING | Kind::CHANGE,
                commits,
                current,
                remote,
            );
            changes.insert(path, change);
        }

        log::info!("built working tree changes: {} paths", changes.len());
        Ok(changes)
    }
}

impl ModelCache for WorkingTreeChangeCache {
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
