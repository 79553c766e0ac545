//! Parallel walk over two or three trees.
//!
//! [`TreeDiff`] yields one [`DiffEntry`] per path that differs between its
//! inputs. Siblings come in plain byte order of their names, not in git's
//! tree order (which compares a folder `a` as `a/` and so puts `a.txt` first).
//! A subtree's rows directly follow the subtree's own row, so a consumer can
//! rebuild the hierarchy in one forward pass. Subtrees with the same id in every input are
//! never loaded.

use std::collections::VecDeque;

use changeview_types::ObjectId;

use crate::models::{DiffEntry, EntryMode, RawChange};
use crate::path_filter::PathFilter;
use crate::store::{ObjectStore, TreeEntry};
use crate::{Error, Result};

/// One input of a [`TreeDiff`], positioned at a tree root.
#[derive(Debug, Clone)]
pub struct TreeCursor {
    id: Option<ObjectId>,
    entries: Vec<TreeEntry>,
}

impl TreeCursor {
    /// `None` or the zero id opens the empty tree.
    pub fn open(store: &dyn ObjectStore, id: Option<ObjectId>) -> Result<TreeCursor> {
        let id = id.and_then(ObjectId::non_zero);
        let entries = match id {
            Some(id) => store.tree(id)?,
            None => Vec::new(),
        };
        Ok(TreeCursor { id, entries })
    }

    /// Cursor over the root tree of a commit.
    pub fn of_commit(store: &dyn ObjectStore, commit: ObjectId) -> Result<TreeCursor> {
        let data = store.commit(commit)?;
        TreeCursor::open(store, Some(data.tree_id))
    }

    pub fn empty() -> TreeCursor {
        TreeCursor {
            id: None,
            entries: Vec::new(),
        }
    }

    pub fn id(&self) -> Option<ObjectId> {
        self.id
    }
}

struct Frame {
    prefix: String,
    levels: Vec<Vec<TreeEntry>>,
    positions: Vec<usize>,
}

impl Frame {
    fn new(prefix: String, mut levels: Vec<Vec<TreeEntry>>) -> Frame {
        for level in &mut levels {
            level.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
        }
        let positions = vec![0; levels.len()];
        Frame {
            prefix,
            levels,
            positions,
        }
    }

    /// Take the smallest pending name from every input that has it.
    fn advance(&mut self) -> Option<(String, Vec<Option<TreeEntry>>)> {
        let name = self
            .levels
            .iter()
            .zip(&self.positions)
            .filter_map(|(level, &pos)| level.get(pos))
            .map(|entry| entry.name.as_str())
            .min_by(|a, b| a.as_bytes().cmp(b.as_bytes()))?
            .to_string();

        let slots = self
            .levels
            .iter()
            .zip(self.positions.iter_mut())
            .map(|(level, pos)| match level.get(*pos) {
                Some(entry) if entry.name == name => {
                    *pos += 1;
                    Some(entry.clone())
                }
                _ => None,
            })
            .collect();

        let path = if self.prefix.is_empty() {
            name
        } else {
            format!("{}/{}", self.prefix, name)
        };
        Some((path, slots))
    }
}

/// Lazy iterator over the differing paths of 2 or 3 trees.
pub struct TreeDiff<'a> {
    store: &'a dyn ObjectStore,
    stack: Vec<Frame>,
    pending: VecDeque<DiffEntry>,
    include_trees: bool,
    filter: PathFilter,
}

impl<'a> TreeDiff<'a> {
    /// Two cursors compare old against new; three compare base, ours and theirs.
    pub fn new(store: &'a dyn ObjectStore, cursors: Vec<TreeCursor>) -> Result<TreeDiff<'a>> {
        if !(2..=3).contains(&cursors.len()) {
            return Err(Error::invalid_argument(format!(
                "a tree diff takes 2 or 3 trees, got {}",
                cursors.len()
            )));
        }
        let levels = cursors.into_iter().map(|c| c.entries).collect();
        Ok(TreeDiff {
            store,
            stack: vec![Frame::new(String::new(), levels)],
            pending: VecDeque::new(),
            include_trees: false,
            filter: PathFilter::all(),
        })
    }

    /// Also emit a row for every differing subtree, before its contents.
    pub fn include_trees(mut self, include: bool) -> Self {
        self.include_trees = include;
        self
    }

    pub fn with_filter(mut self, filter: PathFilter) -> Self {
        self.filter = filter;
        self
    }

    fn visit(&mut self, path: String, slots: Vec<Option<TreeEntry>>) -> Result<()> {
        let unchanged = slots.windows(2).all(|pair| match (&pair[0], &pair[1]) {
            (Some(a), Some(b)) => a.id == b.id && a.mode == b.mode,
            _ => false,
        }) && slots.iter().all(Option::is_some);
        if unchanged {
            return Ok(());
        }

        let is_tree = |slot: &Option<TreeEntry>| slot.as_ref().is_some_and(|e| e.mode.is_tree());
        let is_leaf = |slot: &Option<TreeEntry>| slot.as_ref().is_some_and(|e| !e.mode.is_tree());

        if slots.iter().any(is_leaf) && self.filter.matches(&path) {
            let side: Vec<Option<&TreeEntry>> = slots
                .iter()
                .map(|s| s.as_ref().filter(|e| !e.mode.is_tree()))
                .collect();
            self.pending.push_back(row(path.clone(), &side, false));
        }

        if slots.iter().any(is_tree) && self.filter.enters(&path) {
            let side: Vec<Option<&TreeEntry>> = slots
                .iter()
                .map(|s| s.as_ref().filter(|e| e.mode.is_tree()))
                .collect();
            let levels = side
                .iter()
                .map(|entry| match entry {
                    Some(entry) => self.store.tree(entry.id),
                    None => Ok(Vec::new()),
                })
                .collect::<Result<Vec<_>>>()?;
            if self.include_trees {
                self.pending.push_back(row(path.clone(), &side, true));
            }
            self.stack.push(Frame::new(path, levels));
        }
        Ok(())
    }
}

fn row(path: String, side: &[Option<&TreeEntry>], is_tree: bool) -> DiffEntry {
    DiffEntry {
        path,
        ids: side.iter().map(|e| e.map(|e| e.id)).collect(),
        modes: side.iter().map(|e| e.map(|e| e.mode)).collect(),
        is_tree,
    }
}

impl Iterator for TreeDiff<'_> {
    type Item = Result<DiffEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.pending.pop_front() {
                return Some(Ok(entry));
            }
            let frame = self.stack.last_mut()?;
            let Some((path, slots)) = frame.advance() else {
                self.stack.pop();
                continue;
            };
            if let Err(err) = self.visit(path, slots) {
                self.stack.clear();
                return Some(Err(err));
            }
        }
    }
}

/// Changed paths between two trees, folders included, in walk order.
pub fn changed_paths(
    store: &dyn ObjectStore,
    old: Option<ObjectId>,
    new: Option<ObjectId>,
    filter: &PathFilter,
) -> Result<Vec<RawChange>> {
    let cursors = vec![
        TreeCursor::open(store, old)?,
        TreeCursor::open(store, new)?,
    ];
    let mut changes = Vec::new();
    for entry in TreeDiff::new(store, cursors)?
        .include_trees(true)
        .with_filter(filter.clone())
    {
        if let Some(change) = entry?.into_raw_change()? {
            changes.push(change);
        }
    }
    log::debug!("{} changed paths between {:?} and {:?}", changes.len(), old, new);
    Ok(changes)
}

/// A file in a flattened listing such as the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatEntry {
    pub path: String,
    pub id: ObjectId,
    pub mode: Option<EntryMode>,
}

/// Every file below `tree`, sorted by path bytes.
pub fn flatten_tree(store: &dyn ObjectStore, tree: Option<ObjectId>) -> Result<Vec<FlatEntry>> {
    let mut out = Vec::new();
    let mut pending: Vec<(String, ObjectId)> = tree
        .and_then(ObjectId::non_zero)
        .map(|id| (String::new(), id))
        .into_iter()
        .collect();
    while let Some((prefix, id)) = pending.pop() {
        for entry in store.tree(id)? {
            let path = if prefix.is_empty() {
                entry.name
            } else {
                format!("{prefix}/{}", entry.name)
            };
            if entry.mode.is_tree() {
                pending.push((path, entry.id));
            } else {
                out.push(FlatEntry {
                    path,
                    id: entry.id,
                    mode: Some(entry.mode),
                });
            }
        }
    }
    out.sort_by(|a, b| a.path.as_bytes().cmp(b.path.as_bytes()));
    Ok(out)
}

/// Merge-join two path-sorted listings into file changes.
pub fn diff_sorted(old: &[FlatEntry], new: &[FlatEntry]) -> Vec<RawChange> {
    let mut changes = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < old.len() || j < new.len() {
        let order = match (old.get(i), new.get(j)) {
            (Some(a), Some(b)) => a.path.as_bytes().cmp(b.path.as_bytes()),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, _) => std::cmp::Ordering::Greater,
        };
        match order {
            std::cmp::Ordering::Less => {
                changes.extend(RawChange::new(old[i].path.clone(), Some(old[i].id), None));
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                changes.extend(RawChange::new(new[j].path.clone(), None, Some(new[j].id)));
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                let (a, b) = (&old[i], &new[j]);
                if a.id != b.id || a.mode != b.mode {
                    let entry = DiffEntry {
                        path: a.path.clone(),
                        ids: vec![Some(a.id), Some(b.id)],
                        modes: vec![a.mode, b.mode],
                        is_tree: false,
                    };
                    if let Ok(Some(change)) = entry.into_raw_change() {
                        changes.push(change);
                    }
                }
                i += 1;
                j += 1;
            }
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::models::ChangeType;
    use crate::store::GitObjectStore;
    use crate::testing::CountingStore;
    use test_repo::TestRepo;

    type Result<T = ()> = std::result::Result<T, Box<dyn std::error::Error>>;

    fn rows(diff: TreeDiff<'_>) -> Result<Vec<DiffEntry>> {
        Ok(diff.collect::<crate::Result<Vec<_>>>()?)
    }

    fn paths(entries: &[DiffEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.path.as_str()).collect()
    }

    #[test]
    fn siblings_follow_name_bytes_not_git_tree_order() -> Result {
        let t = TestRepo::new()?;
        t.write_file("a.txt", "file")?;
        t.write_file("a/x.txt", "nested")?;
        let c1 = t.commit("first")?;
        let store = GitObjectStore::open(t.path())?;

        let cursors = vec![TreeCursor::empty(), TreeCursor::of_commit(&store, c1.object_id())?];
        let entries = rows(TreeDiff::new(&store, cursors)?.include_trees(true))?;
        assert_eq!(paths(&entries), vec!["a", "a/x.txt", "a.txt"]);
        Ok(())
    }

    #[test]
    fn reports_added_deleted_and_modified_files() -> Result {
        let t = TestRepo::new()?;
        t.write_file("keep.txt", "keep")?;
        t.write_file("edit.txt", "v1")?;
        t.write_file("gone.txt", "bye")?;
        let c1 = t.commit("first")?;
        t.write_file("edit.txt", "v2")?;
        t.delete_file("gone.txt")?;
        t.write_file("new.txt", "hi")?;
        let c2 = t.commit("second")?;
        let store = GitObjectStore::open(t.path())?;

        let changes = changed_paths(
            &store,
            Some(t.tree_id(c1)?),
            Some(t.tree_id(c2)?),
            &PathFilter::all(),
        )?;
        let summary: Vec<_> = changes.iter().map(|c| (c.path.as_str(), c.kind)).collect();
        assert_eq!(
            summary,
            vec![
                ("edit.txt", ChangeType::Modify),
                ("gone.txt", ChangeType::Delete),
                ("new.txt", ChangeType::Add),
            ]
        );
        assert_eq!(changes[2].after_id, Some(t.blob_id("hi")?));
        assert_eq!(changes[2].before_id, None);
        Ok(())
    }

    #[test]
    fn subtree_rows_follow_their_folder_row() -> Result {
        let t = TestRepo::new()?;
        t.write_file("a.txt", "a")?;
        let c1 = t.commit("first")?;
        t.write_file("dir/x.txt", "x")?;
        t.write_file("dir/sub/y.txt", "y")?;
        t.write_file("b.txt", "b")?;
        let c2 = t.commit("second")?;
        let store = GitObjectStore::open(t.path())?;

        let cursors = vec![
            TreeCursor::of_commit(&store, c1.object_id())?,
            TreeCursor::of_commit(&store, c2.object_id())?,
        ];
        let entries = rows(TreeDiff::new(&store, cursors)?.include_trees(true))?;
        assert_eq!(
            paths(&entries),
            vec!["b.txt", "dir", "dir/sub", "dir/sub/y.txt", "dir/x.txt"]
        );
        assert!(entries[1].is_tree);
        assert_eq!(entries[1].id(1), Some(t.entry_id(c2, "dir")?));
        assert!(!entries[4].is_tree);
        Ok(())
    }

    #[test]
    fn identical_subtrees_are_not_loaded() -> Result {
        let t = TestRepo::new()?;
        t.write_file("big/one.txt", "1")?;
        t.write_file("big/deep/two.txt", "2")?;
        t.write_file("top.txt", "a")?;
        let c1 = t.commit("first")?;
        t.write_file("top.txt", "b")?;
        let c2 = t.commit("second")?;
        let store = CountingStore::new(GitObjectStore::open(t.path())?);

        let cursors = vec![
            TreeCursor::open(&store, Some(t.tree_id(c1)?))?,
            TreeCursor::open(&store, Some(t.tree_id(c2)?))?,
        ];
        let entries = rows(TreeDiff::new(&store, cursors)?)?;
        assert_eq!(paths(&entries), vec!["top.txt"]);
        // Only the two roots were read.
        assert_eq!(store.tree_reads(), 2);
        Ok(())
    }

    #[test]
    fn file_replaced_by_folder_yields_both_rows() -> Result {
        let t = TestRepo::new()?;
        t.write_file("thing", "file")?;
        let c1 = t.commit("first")?;
        t.delete_file("thing")?;
        t.write_file("thing/inner.txt", "inner")?;
        let c2 = t.commit("second")?;
        let store = GitObjectStore::open(t.path())?;

        let changes = changed_paths(
            &store,
            Some(t.tree_id(c1)?),
            Some(t.tree_id(c2)?),
            &PathFilter::all(),
        )?;
        let summary: Vec<_> = changes
            .iter()
            .map(|c| (c.path.as_str(), c.kind, c.is_tree))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("thing", ChangeType::Delete, false),
                ("thing", ChangeType::Add, true),
                ("thing/inner.txt", ChangeType::Add, false),
            ]
        );
        Ok(())
    }

    #[test]
    fn filter_limits_the_walk() -> Result {
        let t = TestRepo::new()?;
        t.write_file("src/a.rs", "a")?;
        t.write_file("docs/a.md", "a")?;
        let c1 = t.commit("first")?;
        t.write_file("src/a.rs", "b")?;
        t.write_file("src/b.rs", "b")?;
        t.write_file("docs/a.md", "b")?;
        let c2 = t.commit("second")?;
        let store = GitObjectStore::open(t.path())?;

        let changes = changed_paths(
            &store,
            Some(t.tree_id(c1)?),
            Some(t.tree_id(c2)?),
            &PathFilter::new(["src/a.rs"]),
        )?;
        let changed: Vec<_> = changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(changed, vec!["src", "src/a.rs"]);
        Ok(())
    }

    #[test]
    fn empty_cursor_makes_everything_added() -> Result {
        let t = TestRepo::new()?;
        t.write_file("a.txt", "a")?;
        t.write_file("d/b.txt", "b")?;
        let c1 = t.commit("first")?;
        let store = GitObjectStore::open(t.path())?;

        let changes = changed_paths(&store, None, Some(t.tree_id(c1)?), &PathFilter::all())?;
        assert!(changes.iter().all(|c| c.kind == ChangeType::Add));
        assert_eq!(changes.len(), 3);

        let same = changed_paths(
            &store,
            Some(ObjectId::zero()),
            Some(ObjectId::zero()),
            &PathFilter::all(),
        )?;
        assert!(same.is_empty());
        Ok(())
    }

    #[test]
    fn three_way_rows_carry_every_side() -> Result {
        let t = TestRepo::new()?;
        t.write_file("a.txt", "base")?;
        let base = t.commit("base")?;
        t.write_file("a.txt", "ours")?;
        let ours = t.commit("ours")?;
        t.checkout(base)?;
        t.write_file("b.txt", "theirs")?;
        let theirs = t.commit("theirs")?;
        let store = GitObjectStore::open(t.path())?;

        let cursors = vec![
            TreeCursor::of_commit(&store, base.object_id())?,
            TreeCursor::of_commit(&store, ours.object_id())?,
            TreeCursor::of_commit(&store, theirs.object_id())?,
        ];
        let entries = rows(TreeDiff::new(&store, cursors)?)?;
        assert_eq!(paths(&entries), vec!["a.txt", "b.txt"]);
        assert_eq!(entries[0].arity(), 3);
        assert_eq!(entries[0].id(0), entries[0].id(2));
        assert_eq!(entries[1].id(0), None);
        assert_eq!(entries[1].id(1), None);
        assert!(entries[1].id(2).is_some());
        Ok(())
    }

    #[test]
    fn wrong_number_of_cursors_is_rejected() {
        let t = TestRepo::new().unwrap();
        let store = GitObjectStore::open(t.path()).unwrap();
        let err = TreeDiff::new(&store, vec![TreeCursor::empty()]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let four = vec![TreeCursor::empty(); 4];
        assert!(TreeDiff::new(&store, four).is_err());
    }

    #[test]
    fn missing_tree_is_reported() -> Result {
        let t = TestRepo::new()?;
        let store = GitObjectStore::open(t.path())?;
        let err = TreeCursor::open(&store, Some(t.blob_id("never written")?)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingObject);
        Ok(())
    }

    #[test]
    fn diff_sorted_merges_listings() -> Result {
        let t = TestRepo::new()?;
        let entry = |path: &str, content: &str| -> Result<FlatEntry> {
            Ok(FlatEntry {
                path: path.to_string(),
                id: t.blob_id(content)?,
                mode: Some(EntryMode::Blob),
            })
        };
        let old = vec![entry("a", "1")?, entry("b", "1")?, entry("d/x", "1")?];
        let new = vec![entry("a", "1")?, entry("b", "2")?, entry("c", "1")?];

        let changes = diff_sorted(&old, &new);
        let summary: Vec<_> = changes.iter().map(|c| (c.path.as_str(), c.kind)).collect();
        assert_eq!(
            summary,
            vec![
                ("b", ChangeType::Modify),
                ("c", ChangeType::Add),
                ("d/x", ChangeType::Delete),
            ]
        );
        Ok(())
    }

    #[test]
    fn flatten_tree_lists_nested_files() -> Result {
        let t = TestRepo::new()?;
        t.write_file("z.txt", "z")?;
        t.write_file("a/b/c.txt", "c")?;
        t.write_file("a.txt", "a")?;
        let c1 = t.commit("first")?;
        let store = GitObjectStore::open(t.path())?;

        let flat = flatten_tree(&store, Some(t.tree_id(c1)?))?;
        let listed: Vec<_> = flat.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(listed, vec!["a.txt", "a/b/c.txt", "z.txt"]);
        Ok(())
    }
}
