use changeview_types::ObjectId;

use crate::models::{Change, ChangeMap, CommitPair, Direction, Kind, ModelNode, RawChange};
use crate::{Error, Result};

/// Folds the raw changes of one comparison into the change model.
///
/// Input must be in [`crate::tree_diff::TreeDiff`] order with folder rows
/// included. Without mirroring the after side of each raw change is local;
/// with mirroring the before side is.
#[derive(Debug, Clone)]
pub struct ChangeTreeBuilder {
    commits: CommitPair,
    direction: Kind,
    mirror: bool,
}

struct OpenFolder {
    path: String,
    local: Option<ObjectId>,
    remote: Option<ObjectId>,
    children: Vec<Change>,
}

impl ChangeTreeBuilder {
    pub fn new(
        commit_id: ObjectId,
        remote_commit_id: Option<ObjectId>,
        direction: Direction,
    ) -> Self {
        Self {
            commits: CommitPair::new(commit_id, remote_commit_id),
            direction: direction.bits(),
            mirror: false,
        }
    }

    pub fn mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    fn orient(&self, change: RawChange) -> RawChange {
        if self.mirror { change.mirrored() } else { change }
    }

    fn file(&self, change: &RawChange) -> Change {
        Change::file(
            change.path.clone(),
            self.direction | change.kind.bits(),
            self.commits,
            change.after_id,
            change.before_id,
        )
    }

    fn close(&self, folder: OpenFolder) -> Option<Change> {
        if folder.children.is_empty() {
            return None;
        }
        let change_bits = folder
            .children
            .iter()
            .fold(Kind::empty(), |acc, child| acc | child.kind().change_type_bits());
        Some(Change::folder(
            folder.path,
            self.direction | change_bits,
            self.commits,
            folder.local,
            folder.remote,
            folder.children,
        ))
    }

    /// Hierarchical model; `None` when there is nothing to show.
    pub fn build_tree<I>(&self, changes: I) -> Result<Option<Vec<Change>>>
    where
        I: IntoIterator<Item = RawChange>,
    {
        let mut roots: Vec<Change> = Vec::new();
        let mut stack: Vec<OpenFolder> = Vec::new();

        for change in changes {
            let change = self.orient(change);
            let parent = change.parent();

            while let Some(top) = stack.last() {
                let inside = parent == top.path
                    || parent
                        .strip_prefix(top.path.as_str())
                        .is_some_and(|rest| rest.starts_with('/'));
                if inside {
                    break;
                }
                if let Some(folder) = stack.pop().and_then(|f| self.close(f)) {
                    push_child(&mut stack, &mut roots, folder);
                }
            }

            let parent_open = match stack.last() {
                Some(top) => top.path == parent,
                None => parent.is_empty(),
            };
            if !parent_open {
                return Err(Error::invalid_argument(format!(
                    "no folder row for {parent} before {}",
                    change.path
                )));
            }

            if change.is_tree {
                stack.push(OpenFolder {
                    path: change.path,
                    local: change.after_id,
                    remote: change.before_id,
                    children: Vec::new(),
                });
            } else {
                let file = self.file(&change);
                push_child(&mut stack, &mut roots, file);
            }
        }

        while let Some(folder) = stack.pop() {
            if let Some(folder) = self.close(folder) {
                push_child(&mut stack, &mut roots, folder);
            }
        }

        Ok(if roots.is_empty() { None } else { Some(roots) })
    }

    /// Files only, keyed by full path; `None` when there is nothing to show.
    pub fn build_flat<I>(&self, changes: I) -> Result<Option<ChangeMap>>
    where
        I: IntoIterator<Item = RawChange>,
    {
        let mut map = ChangeMap::new();
        for change in changes {
            if change.is_tree {
                continue;
            }
            let change = self.orient(change);
            map.insert(change.path.clone(), self.file(&change));
        }
        Ok(if map.is_empty() { None } else { Some(map) })
    }
}

fn push_child(stack: &mut [OpenFolder], roots: &mut Vec<Change>, change: Change) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(change),
        None => roots.push(change),
    }
}
