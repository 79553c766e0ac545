use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use changeview_types::{AbbreviatedObjectId, ObjectId};
use serde::Serialize;

use super::{Kind, ModelNode};

/// Flat change model keyed by full path.
pub type ChangeMap = BTreeMap<String, Change>;

/// Commits a change was computed between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitPair {
    pub local: AbbreviatedObjectId,
    pub remote: Option<AbbreviatedObjectId>,
}

impl CommitPair {
    pub fn new(local: ObjectId, remote: Option<ObjectId>) -> Self {
        Self {
            local: local.into(),
            remote: remote.and_then(ObjectId::non_zero).map(Into::into),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Entry {
    File,
    Folder { children: Vec<Change> },
}

/// A changed path as shown to consumers.
///
/// `object_id` is the id on the local side and is `None` when the path does
/// not exist there; `remote_object_id` likewise for the remote side. Two
/// changes are equal when both ids match, whatever their paths.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    name: String,
    full_path: String,
    kind: Kind,
    commit_id: AbbreviatedObjectId,
    remote_commit_id: Option<AbbreviatedObjectId>,
    object_id: Option<AbbreviatedObjectId>,
    remote_object_id: Option<AbbreviatedObjectId>,
    #[serde(flatten)]
    entry: Entry,
}

impl Change {
    pub fn file(
        full_path: impl Into<String>,
        kind: Kind,
        commits: CommitPair,
        object_id: Option<ObjectId>,
        remote_object_id: Option<ObjectId>,
    ) -> Change {
        Change::with_entry(
            full_path.into(),
            kind,
            commits,
            object_id,
            remote_object_id,
            Entry::File,
        )
    }

    pub fn folder(
        full_path: impl Into<String>,
        kind: Kind,
        commits: CommitPair,
        object_id: Option<ObjectId>,
        remote_object_id: Option<ObjectId>,
        children: Vec<Change>,
    ) -> Change {
        Change::with_entry(
            full_path.into(),
            kind,
            commits,
            object_id,
            remote_object_id,
            Entry::Folder { children },
        )
    }

    fn with_entry(
        full_path: String,
        kind: Kind,
        commits: CommitPair,
        object_id: Option<ObjectId>,
        remote_object_id: Option<ObjectId>,
        entry: Entry,
    ) -> Change {
        let name = full_path
            .rsplit('/')
            .next()
            .unwrap_or(&full_path)
            .to_string();
        Change {
            name,
            full_path,
            kind,
            commit_id: commits.local,
            remote_commit_id: commits.remote,
            object_id: object_id.and_then(ObjectId::non_zero).map(Into::into),
            remote_object_id: remote_object_id.and_then(ObjectId::non_zero).map(Into::into),
            entry,
        }
    }

    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    pub fn commit_id(&self) -> AbbreviatedObjectId {
        self.commit_id
    }

    pub fn remote_commit_id(&self) -> Option<AbbreviatedObjectId> {
        self.remote_commit_id
    }

    pub fn object_id(&self) -> Option<AbbreviatedObjectId> {
        self.object_id
    }

    pub fn remote_object_id(&self) -> Option<AbbreviatedObjectId> {
        self.remote_object_id
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn is_tree(&self) -> bool {
        matches!(self.entry, Entry::Folder { .. })
    }

    /// Look up a descendant by path relative to this node.
    pub fn find(&self, relative: &str) -> Option<&Change> {
        let (head, rest) = match relative.split_once('/') {
            Some((head, rest)) => (head, Some(rest)),
            None => (relative, None),
        };
        let child = self.children()?.iter().find(|c| c.name == head)?;
        match rest {
            Some(rest) => child.find(rest),
            None => Some(child),
        }
    }

    /// Every file below (or at) this node, depth first.
    pub fn files(&self) -> Vec<&Change> {
        let mut out = Vec::new();
        collect_files(self, &mut out);
        out
    }
}

fn collect_files<'a>(change: &'a Change, out: &mut Vec<&'a Change>) {
    match &change.entry {
        Entry::File => out.push(change),
        Entry::Folder { children } => {
            for child in children {
                collect_files(child, out);
            }
        }
    }
}

impl ModelNode for Change {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> Kind {
        self.kind
    }

    fn children(&self) -> Option<&[Change]> {
        match &self.entry {
            Entry::File => None,
            Entry::Folder { children } => Some(children),
        }
    }
}

impl PartialEq for Change {
    fn eq(&self, other: &Self) -> bool {
        self.object_id == other.object_id && self.remote_object_id == other.remote_object_id
    }
}

impl Eq for Change {}

impl Hash for Change {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.object_id.hash(state);
        self.remote_object_id.hash(state);
    }
}

/// Look up a path in a forest of top-level changes.
pub fn find_in<'a>(changes: &'a [Change], path: &str) -> Option<&'a Change> {
    let (head, rest) = match path.split_once('/') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    let top = changes.iter().find(|c| c.name() == head)?;
    match rest {
        Some(rest) => top.find(rest),
        None => Some(top),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::models::{ChangeType, Direction};

    fn id(n: u8) -> ObjectId {
        ObjectId::from(git2::Oid::from_bytes(&[n; 20]).unwrap())
    }

    fn commits() -> CommitPair {
        CommitPair::new(id(100), Some(id(101)))
    }

    #[test]
    fn equality_ignores_path_and_commit() {
        let kind = Kind::new(Direction::Left, ChangeType::Modify);
        let a = Change::file("a.txt", kind, commits(), Some(id(1)), Some(id(2)));
        let b = Change::file(
            "other/b.txt",
            kind,
            CommitPair::new(id(7), None),
            Some(id(1)),
            Some(id(2)),
        );
        let c = Change::file("a.txt", kind, commits(), Some(id(1)), Some(id(3)));
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<Change> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn zero_ids_become_absent() {
        let kind = Kind::new(Direction::Left, ChangeType::Add);
        let change = Change::file("a.txt", kind, commits(), Some(id(1)), Some(ObjectId::zero()));
        assert!(change.object_id().is_some());
        assert_eq!(change.remote_object_id(), None);
    }

    #[test]
    fn file_has_no_children_folder_does() {
        let kind = Kind::new(Direction::Left, ChangeType::Add);
        let file = Change::file("dir/a.txt", kind, commits(), Some(id(1)), None);
        assert_eq!(file.name(), "a.txt");
        assert!(file.children().is_none());
        assert!(!file.is_tree());

        let folder = Change::folder("dir", kind, commits(), Some(id(9)), None, vec![file]);
        assert!(folder.is_tree());
        assert_eq!(folder.children().map(<[Change]>::len), Some(1));
        assert_eq!(folder.find("a.txt").map(Change::full_path), Some("dir/a.txt"));
        assert_eq!(folder.files().len(), 1);
    }

    #[test]
    fn find_in_walks_nested_folders() {
        let kind = Kind::new(Direction::Left, ChangeType::Add);
        let file = Change::file("a/b/c.txt", kind, commits(), Some(id(1)), None);
        let b = Change::folder("a/b", kind, commits(), Some(id(2)), None, vec![file]);
        let a = Change::folder("a", kind, commits(), Some(id(3)), None, vec![b]);
        let forest = vec![a];
        assert!(find_in(&forest, "a/b/c.txt").is_some());
        assert!(find_in(&forest, "a/b").is_some_and(Change::is_tree));
        assert!(find_in(&forest, "a/x").is_none());
    }

    #[test]
    fn serializes_entry_type_inline() {
        let kind = Kind::new(Direction::Right, ChangeType::Delete);
        let change = Change::file("a.txt", kind, commits(), None, Some(id(1)));
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["type"], "file");
        assert_eq!(json["fullPath"], "a.txt");
        assert_eq!(json["kind"], 10);
        assert!(json["objectId"].is_null());
    }
}
