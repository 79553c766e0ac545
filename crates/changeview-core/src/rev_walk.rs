//! Commits on either side of a revision range.
//!
//! Both ends are painted with their own flag and the flags flow to parents in
//! commit-time order. A commit reached from both ends is common history; the
//! walk stops as soon as everything still queued is common, so history below
//! the merge base is never read.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use bitflags::bitflags;
use changeview_types::ObjectId;
use serde::Serialize;

use crate::Result;
use crate::store::{CommitData, ObjectStore};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct Paint: u8 {
        const FROM = 0b01;
        const TO = 0b10;
        const BOTH = Self::FROM.bits() | Self::TO.bits();
    }
}

/// Which end of the range a commit is reachable from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    From,
    To,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedCommit {
    pub id: ObjectId,
    pub side: Side,
    /// `None` for root commits, which are compared against the empty tree.
    pub first_parent: Option<ObjectId>,
    pub tree_id: ObjectId,
    pub commit: CommitData,
}

pub struct RevisionWalker<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> RevisionWalker<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    /// Commits reachable from exactly one of `from` and `to`, newest first.
    pub fn walk(&self, from: &str, to: &str) -> Result<Vec<WalkedCommit>> {
        let from_id = self.store.resolve(from)?;
        let to_id = self.store.resolve(to)?;
        self.walk_ids(from_id, to_id)
    }

    /// Only the commits reachable from `from` and not from `to`.
    pub fn walk_only_from(&self, from: &str, to: &str) -> Result<Vec<WalkedCommit>> {
        let mut commits = self.walk(from, to)?;
        commits.retain(|c| c.side == Side::From);
        Ok(commits)
    }

    pub fn walk_ids(&self, from: ObjectId, to: ObjectId) -> Result<Vec<WalkedCommit>> {
        if from == to {
            return Ok(Vec::new());
        }

        let mut loaded: HashMap<ObjectId, CommitData> = HashMap::new();
        let mut paint: HashMap<ObjectId, Paint> = HashMap::new();
        let mut queue: BinaryHeap<(i64, ObjectId)> = BinaryHeap::new();
        let mut queued: HashSet<ObjectId> = HashSet::new();
        // Queued commits that are not yet known to be common.
        let mut lonely = 0usize;

        for (id, flag) in [(from, Paint::FROM), (to, Paint::TO)] {
            let time = self.load(&mut loaded, id)?.commit_time;
            let flags = *paint.entry(id).or_insert(Paint::empty()) | flag;
            paint.insert(id, flags);
            if queued.insert(id) {
                queue.push((time, id));
                lonely += 1;
            }
        }

        while lonely > 0 {
            let Some((_, id)) = queue.pop() else {
                break;
            };
            queued.remove(&id);
            let flags = paint.get(&id).copied().unwrap_or(Paint::empty());
            if flags != Paint::BOTH {
                lonely -= 1;
            }

            let parents = self.load(&mut loaded, id)?.parents.clone();
            for parent in parents {
                let old = paint.get(&parent).copied().unwrap_or(Paint::empty());
                let new = old | flags;
                if new == old {
                    continue;
                }
                paint.insert(parent, new);
                if queued.contains(&parent) {
                    if new == Paint::BOTH {
                        lonely -= 1;
                    }
                } else {
                    let time = self.load(&mut loaded, parent)?.commit_time;
                    queue.push((time, parent));
                    queued.insert(parent);
                    if new != Paint::BOTH {
                        lonely += 1;
                    }
                }
            }
        }

        let sides: HashMap<ObjectId, Side> = paint
            .into_iter()
            .filter_map(|(id, flags)| {
                if flags == Paint::FROM {
                    Some((id, Side::From))
                } else if flags == Paint::TO {
                    Some((id, Side::To))
                } else {
                    None
                }
            })
            .collect();

        let ordered = topo_order(&sides, &loaded);
        log::debug!(
            "walked {}..{}: {} commits, {} loaded",
            from,
            to,
            ordered.len(),
            loaded.len()
        );

        Ok(ordered
            .into_iter()
            .filter_map(|id| {
                let commit = loaded.remove(&id)?;
                Some(WalkedCommit {
                    id,
                    side: sides[&id],
                    first_parent: commit.first_parent(),
                    tree_id: commit.tree_id,
                    commit,
                })
            })
            .collect())
    }

    fn load<'m>(
        &self,
        loaded: &'m mut HashMap<ObjectId, CommitData>,
        id: ObjectId,
    ) -> Result<&'m CommitData> {
        if !loaded.contains_key(&id) {
            let data = self.store.commit(id)?;
            loaded.insert(id, data);
        }
        loaded
            .get(&id)
            .ok_or_else(|| crate::Error::MissingObject(format!("commit {id}")))
    }
}

/// Newest first, but never a parent before one of its children.
fn topo_order(
    selected: &HashMap<ObjectId, Side>,
    loaded: &HashMap<ObjectId, CommitData>,
) -> Vec<ObjectId> {
    let parents_of = |id: &ObjectId| -> Vec<ObjectId> {
        loaded
            .get(id)
            .map(|c| {
                c.parents
                    .iter()
                    .filter(|p| selected.contains_key(p))
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    };
    let time_of = |id: &ObjectId| loaded.get(id).map_or(0, |c| c.commit_time);

    let mut children_left: HashMap<ObjectId, usize> = selected.keys().map(|id| (*id, 0)).collect();
    for id in selected.keys() {
        for parent in parents_of(id) {
            *children_left.entry(parent).or_default() += 1;
        }
    }

    let mut ready: BinaryHeap<(i64, Reverse<ObjectId>)> = children_left
        .iter()
        .filter(|&(_, &count)| count == 0)
        .map(|(id, _)| (time_of(id), Reverse(*id)))
        .collect();

    let mut ordered = Vec::with_capacity(selected.len());
    while let Some((_, Reverse(id))) = ready.pop() {
        ordered.push(id);
        for parent in parents_of(&id) {
            if let Some(count) = children_left.get_mut(&parent) {
                *count -= 1;
                if *count == 0 {
                    ready.push((time_of(&parent), Reverse(parent)));
                }
            }
        }
    }
    ordered
}
