use changeview_types::ObjectId;

use super::ChangeType;
use crate::{Error, Result};

/// File mode of a tree entry, reduced to what the change model cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryMode {
    Tree,
    Blob,
    Executable,
    Link,
    Commit,
}

impl EntryMode {
    pub fn from_raw(mode: i32) -> Option<EntryMode> {
        match mode {
            0o040000 => Some(EntryMode::Tree),
            0o100644 | 0o100664 => Some(EntryMode::Blob),
            0o100755 => Some(EntryMode::Executable),
            0o120000 => Some(EntryMode::Link),
            0o160000 => Some(EntryMode::Commit),
            _ => None,
        }
    }

    pub fn from_index_mode(mode: u32) -> Option<EntryMode> {
        i32::try_from(mode).ok().and_then(EntryMode::from_raw)
    }

    pub fn is_tree(self) -> bool {
        self == EntryMode::Tree
    }
}

/// One row of an N-way comparison: the same path looked up in every input.
///
/// `ids[i]` is `None` when the path is absent from input `i` (or present
/// there with a different entry type, see [`crate::tree_diff`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    pub path: String,
    pub ids: Vec<Option<ObjectId>>,
    pub modes: Vec<Option<EntryMode>>,
    pub is_tree: bool,
}

impl DiffEntry {
    pub fn arity(&self) -> usize {
        self.ids.len()
    }

    pub fn id(&self, input: usize) -> Option<ObjectId> {
        self.ids.get(input).copied().flatten()
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Collapse a 2-way row into a [`RawChange`]; `None` if both sides agree.
    pub fn into_raw_change(self) -> Result<Option<RawChange>> {
        if self.arity() != 2 {
            return Err(Error::invalid_argument(format!(
                "expected a 2-way entry for {}, got {} inputs",
                self.path,
                self.arity()
            )));
        }
        let before_id = self.id(0);
        let after_id = self.id(1);
        let mode_changed = self.modes[0] != self.modes[1];
        let kind = match ChangeType::between(before_id, after_id) {
            Some(kind) => kind,
            None if mode_changed && before_id.is_some() => ChangeType::Modify,
            None => return Ok(None),
        };
        Ok(Some(RawChange {
            path: self.path,
            before_id,
            after_id,
            kind,
            is_tree: self.is_tree,
        }))
    }
}

/// A single path changed between two states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChange {
    pub path: String,
    pub before_id: Option<ObjectId>,
    pub after_id: Option<ObjectId>,
    pub kind: ChangeType,
    pub is_tree: bool,
}

impl RawChange {
    pub fn new(
        path: impl Into<String>,
        before_id: Option<ObjectId>,
        after_id: Option<ObjectId>,
    ) -> Option<RawChange> {
        let before_id = before_id.and_then(ObjectId::non_zero);
        let after_id = after_id.and_then(ObjectId::non_zero);
        let kind = ChangeType::between(before_id, after_id)?;
        Some(RawChange {
            path: path.into(),
            before_id,
            after_id,
            kind,
            is_tree: false,
        })
    }

    /// A path present on both sides whose content or mode changed, even when
    /// the ids agree.
    pub fn modified(path: impl Into<String>, before_id: ObjectId, after_id: ObjectId) -> RawChange {
        RawChange {
            path: path.into(),
            before_id: Some(before_id),
            after_id: Some(after_id),
            kind: ChangeType::Modify,
            is_tree: false,
        }
    }

    pub fn tree(
        path: impl Into<String>,
        before_id: Option<ObjectId>,
        after_id: Option<ObjectId>,
    ) -> Option<RawChange> {
        RawChange::new(path, before_id, after_id).map(|mut change| {
            change.is_tree = true;
            change
        })
    }

    /// The same change read in the opposite direction.
    pub fn mirrored(&self) -> RawChange {
        RawChange {
            path: self.path.clone(),
            before_id: self.after_id,
            after_id: self.before_id,
            kind: self.kind.mirrored(),
            is_tree: self.is_tree,
        }
    }

    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Parent folder path, `""` for top-level entries.
    pub fn parent(&self) -> &str {
        self.path.rsplit_once('/').map_or("", |(parent, _)| parent)
    }
}
