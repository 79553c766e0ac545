mod commit_id;
mod object_id;

pub use commit_id::CommitId;
pub use object_id::{AbbreviatedObjectId, OBJECT_ID_HEX_LENGTH, ObjectId};
