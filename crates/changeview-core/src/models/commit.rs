use changeview_types::AbbreviatedObjectId;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Change, Kind, ModelNode};
use crate::store::CommitData;

/// One entry of a history range with the changes it introduced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    id: AbbreviatedObjectId,
    short_message: String,
    author_name: String,
    committer_name: String,
    commit_date: DateTime<Utc>,
    commit_time: i64,
    direction: Kind,
    children: Option<Vec<Change>>,
}

impl Commit {
    /// `children` is `None` when the commit changed nothing against its parent.
    pub fn new(data: &CommitData, direction: Kind, children: Option<Vec<Change>>) -> Self {
        Self {
            id: data.id.into(),
            short_message: data.summary().to_string(),
            author_name: data.author_name.clone(),
            committer_name: data.committer_name.clone(),
            commit_date: DateTime::from_timestamp(data.commit_time, 0).unwrap_or_default(),
            commit_time: data.commit_time,
            direction: direction.direction_bits(),
            children,
        }
    }

    pub fn id(&self) -> AbbreviatedObjectId {
        self.id
    }

    pub fn short_message(&self) -> &str {
        &self.short_message
    }

    pub fn author_name(&self) -> &str {
        &self.author_name
    }

    pub fn committer_name(&self) -> &str {
        &self.committer_name
    }

    pub fn commit_date(&self) -> DateTime<Utc> {
        self.commit_date
    }

    pub fn commit_time(&self) -> i64 {
        self.commit_time
    }

    pub fn direction(&self) -> Kind {
        self.direction
    }
}

impl ModelNode for Commit {
    fn name(&self) -> &str {
        &self.short_message
    }

    fn kind(&self) -> Kind {
        self.direction
    }

    fn children(&self) -> Option<&[Change]> {
        self.children.as_deref()
    }
}
