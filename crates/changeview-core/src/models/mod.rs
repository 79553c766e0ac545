mod change;
mod commit;
mod kind;
mod raw_change;

pub use change::{Change, ChangeMap, CommitPair, Entry, find_in};
pub use commit::Commit;
pub use kind::{ChangeType, Direction, Kind};
pub use raw_change::{DiffEntry, EntryMode, RawChange};

/// Read-only view shared by every node of the change model.
pub trait ModelNode {
    fn name(&self) -> &str;

    fn kind(&self) -> Kind;

    /// `None` for leaves and for commits without changes.
    fn children(&self) -> Option<&[Change]>;
}
