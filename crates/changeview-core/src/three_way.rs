use changeview_types::ObjectId;
use serde::Serialize;

use crate::Result;
use crate::models::{Change, ChangeMap, ChangeType, CommitPair, Direction, Kind};
use crate::path_filter::PathFilter;
use crate::store::ObjectStore;
use crate::tree_diff::{TreeCursor, TreeDiff};

/// Classify one path from its ids in the common ancestor and on both sides.
///
/// Returns `None` when nothing needs to be shown: the path is unchanged, or
/// both sides made the same edit (including both deleting it).
pub fn classify(
    base: Option<ObjectId>,
    local: Option<ObjectId>,
    remote: Option<ObjectId>,
) -> Option<(Direction, ChangeType)> {
    use ChangeType::*;
    use Direction::*;

    match (base, local, remote) {
        (None, None, None) => None,
        (None, Some(_), None) => Some((Outgoing, Add)),
        (None, None, Some(_)) => Some((Incoming, Add)),
        // Added on both sides, even with the same content.
        (None, Some(_), Some(_)) => Some((Conflicting, Modify)),
        (Some(_), None, None) => None,
        (Some(b), None, Some(r)) if r == b => Some((Outgoing, Delete)),
        (Some(b), Some(l), None) if l == b => Some((Incoming, Delete)),
        // Deleted on one side, modified on the other.
        (Some(_), None, Some(_)) | (Some(_), Some(_), None) => Some((Conflicting, Modify)),
        (Some(b), Some(l), Some(r)) => {
            if l == b && r == b {
                None
            } else if r == b {
                Some((Outgoing, Modify))
            } else if l == b {
                Some((Incoming, Modify))
            } else if l == r {
                None
            } else {
                Some((Conflicting, Modify))
            }
        }
    }
}

/// A path that differs between the common ancestor and at least one side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreeWayChange {
    pub path: String,
    pub base: Option<ObjectId>,
    pub local: Option<ObjectId>,
    pub remote: Option<ObjectId>,
    pub direction: Direction,
    pub change_type: ChangeType,
}

impl ThreeWayChange {
    pub fn kind(&self) -> Kind {
        Kind::new(self.direction, self.change_type)
    }

    pub fn is_conflict(&self) -> bool {
        self.direction == Direction::Conflicting
    }
}

/// Result of comparing two commits against their common ancestor.
#[derive(Debug, Clone)]
pub struct ThreeWayDiff {
    local_commit: ObjectId,
    remote_commit: ObjectId,
    entries: Vec<ThreeWayChange>,
}

impl ThreeWayDiff {
    /// `base` is `None` when the two histories share no ancestor.
    pub fn run(
        store: &dyn ObjectStore,
        base: Option<ObjectId>,
        local: ObjectId,
        remote: ObjectId,
    ) -> Result<ThreeWayDiff> {
        ThreeWayDiff::run_filtered(store, base, local, remote, &PathFilter::all())
    }

    pub fn run_filtered(
        store: &dyn ObjectStore,
        base: Option<ObjectId>,
        local: ObjectId,
        remote: ObjectId,
        filter: &PathFilter,
    ) -> Result<ThreeWayDiff> {
        let base_cursor = match base {
            Some(base) => TreeCursor::of_commit(store, base)?,
            None => TreeCursor::empty(),
        };
        let cursors = vec![
            base_cursor,
            TreeCursor::of_commit(store, local)?,
            TreeCursor::of_commit(store, remote)?,
        ];

        let mut entries = Vec::new();
        for row in TreeDiff::new(store, cursors)?.with_filter(filter.clone()) {
            let row = row?;
            let (base_id, local_id, remote_id) = (row.id(0), row.id(1), row.id(2));
            if let Some((direction, change_type)) = classify(base_id, local_id, remote_id) {
                entries.push(ThreeWayChange {
                    path: row.path,
                    base: base_id,
                    local: local_id,
                    remote: remote_id,
                    direction,
                    change_type,
                });
            }
        }
        log::debug!(
            "three-way diff {} / {} found {} changes",
            local,
            remote,
            entries.len()
        );
        Ok(ThreeWayDiff {
            local_commit: local,
            remote_commit: remote,
            entries,
        })
    }

    pub fn entries(&self) -> &[ThreeWayChange] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<ThreeWayChange> {
        self.entries
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &ThreeWayChange> {
        self.entries.iter().filter(|e| e.is_conflict())
    }

    /// Flat model keyed by path, local ids as `object_id`.
    pub fn changes(&self) -> ChangeMap {
        let commits = CommitPair::new(self.local_commit, Some(self.remote_commit));
        self.entries
            .iter()
            .map(|entry| {
                let change = Change::file(
                    entry.path.clone(),
                    entry.kind(),
                    commits,
                    entry.local,
                    entry.remote,
                );
                (entry.path.clone(), change)
            })
            .collect()
    }
}
