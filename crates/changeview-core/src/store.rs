//! Access to the object database, refs, index and working tree.
//!
//! Everything the change model needs from a repository goes through
//! [`ObjectStore`]. [`GitObjectStore`] implements it on top of `git2`; tests and
//! embedders may wrap it to inject failures or count reads.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use changeview_types::ObjectId;
use git2::{ObjectType, Oid, Repository, Status};
use serde::Serialize;

use crate::models::EntryMode;
use crate::path_filter::PathFilter;
use crate::{Error, Result};

/// Identity of a repository, used as part of cache keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RepositoryId(PathBuf);

impl RepositoryId {
    pub fn new(git_dir: impl Into<PathBuf>) -> Self {
        Self(git_dir.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl std::fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Commit metadata read from the object database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitData {
    pub id: ObjectId,
    pub tree_id: ObjectId,
    pub parents: Vec<ObjectId>,
    pub author_name: String,
    pub author_email: String,
    pub committer_name: String,
    pub message: String,
    /// Committer time, seconds since the epoch.
    pub commit_time: i64,
}

impl CommitData {
    /// First line of the message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("").trim()
    }

    pub fn first_parent(&self) -> Option<ObjectId> {
        self.parents.first().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub name: String,
    pub id: ObjectId,
    pub mode: EntryMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    pub path: String,
    pub id: ObjectId,
    pub mode: Option<EntryMode>,
    /// 0 for merged entries, 1..=3 for the base/ours/theirs stages of a conflict.
    pub stage: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Modified,
    Deleted,
    Untracked,
    TypeChange,
    Conflicted,
    Ignored,
}

/// A path whose working-tree state differs from the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    pub path: String,
    pub kind: StatusKind,
}

/// Options for [`ObjectStore::working_tree_status`].
#[derive(Debug, Clone, Default)]
pub struct StatusQuery {
    pub include_untracked: bool,
    pub recurse_untracked_dirs: bool,
    pub include_ignored: bool,
    pub filter: Option<PathFilter>,
}

pub trait ObjectStore {
    fn identity(&self) -> RepositoryId;

    /// Directory holding the repository metadata (`.git`).
    fn git_dir(&self) -> &Path;

    /// Resolve a revision expression to a commit id.
    fn resolve(&self, revision: &str) -> Result<ObjectId>;

    fn commit(&self, id: ObjectId) -> Result<CommitData>;

    /// Entries of one tree level, in the store's canonical order.
    fn tree(&self, id: ObjectId) -> Result<Vec<TreeEntry>>;

    /// Commit HEAD points to, `None` on an unborn branch.
    fn head(&self) -> Result<Option<ObjectId>>;

    fn index_entries(&self) -> Result<Vec<IndexRecord>>;

    /// Paths whose working-tree content differs from the index. Ignore rules
    /// are applied by the store.
    fn working_tree_status(&self, query: &StatusQuery) -> Result<Vec<StatusRecord>>;

    /// Blob id the file at `path` would get if it were added.
    fn hash_working_file(&self, path: &str) -> Result<ObjectId>;

    /// A value that changes whenever any ref or HEAD moves.
    fn refs_fingerprint(&self) -> Result<u64>;
}

/// [`ObjectStore`] over a `git2` repository.
pub struct GitObjectStore {
    repo: Repository,
}

impl GitObjectStore {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Repository::open(path)
            .map(Self::new)
            .map_err(|e| missing_or(e, || format!("repository not found: {}", path.display())))
    }

    /// Open the repository containing `path`, searching parent directories.
    pub fn discover(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Repository::discover(path)
            .map(Self::new)
            .map_err(|e| missing_or(e, || format!("repository not found: {}", path.display())))
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// A plain name that is both a branch and a tag for different objects is
    /// ambiguous; git would warn and pick one, we refuse.
    fn check_ambiguous_name(&self, revision: &str) -> Result<()> {
        if revision.contains(['^', '~', ':', '@', '{']) || revision.starts_with("refs/") {
            return Ok(());
        }
        let candidates = [
            format!("refs/heads/{revision}"),
            format!("refs/tags/{revision}"),
        ];
        let mut found: Vec<(String, Oid)> = Vec::new();
        for name in candidates {
            match self.repo.find_reference(&name) {
                Ok(reference) => {
                    let target = reference.peel_to_commit()?.id();
                    found.push((name, target));
                }
                Err(e) if e.code() == git2::ErrorCode::NotFound => {}
                Err(e) if e.code() == git2::ErrorCode::InvalidSpec => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }
        match found.as_slice() {
            [(first, a), (second, b)] if a != b => Err(Error::AmbiguousRef {
                name: revision.to_string(),
                candidates: vec![first.clone(), second.clone()],
            }),
            _ => Ok(()),
        }
    }
}

/// `NotFound` becomes [`Error::MissingObject`] with `what` as its message; any
/// other failure keeps its own classification.
fn missing_or(err: git2::Error, what: impl FnOnce() -> String) -> Error {
    if err.code() == git2::ErrorCode::NotFound {
        Error::MissingObject(what())
    } else {
        Error::from(err)
    }
}

fn path_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

impl ObjectStore for GitObjectStore {
    fn identity(&self) -> RepositoryId {
        RepositoryId::new(self.repo.path())
    }

    fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    fn resolve(&self, revision: &str) -> Result<ObjectId> {
        self.check_ambiguous_name(revision)?;
        let object = self.repo.revparse_single(revision).map_err(|e| match e.code() {
            git2::ErrorCode::NotFound => {
                Error::MissingObject(format!("{revision}: {}", e.message()))
            }
            git2::ErrorCode::Ambiguous => Error::AmbiguousRef {
                name: revision.to_string(),
                candidates: Vec::new(),
            },
            git2::ErrorCode::InvalidSpec => {
                Error::MissingObject(format!("{revision}: {}", e.message()))
            }
            _ => Error::from(e),
        })?;
        let commit = object.peel_to_commit().map_err(|e| match e.code() {
            git2::ErrorCode::NotFound | git2::ErrorCode::InvalidSpec | git2::ErrorCode::Peel => {
                Error::MissingObject(format!("{revision} does not name a commit"))
            }
            _ => Error::from(e),
        })?;
        log::debug!("resolved {} to {}", revision, commit.id());
        Ok(ObjectId::from(commit.id()))
    }

    fn commit(&self, id: ObjectId) -> Result<CommitData> {
        let commit = self
            .repo
            .find_commit(id.oid())
            .map_err(|e| missing_or(e, || format!("commit {id}")))?;
        let author = commit.author();
        let committer = commit.committer();
        Ok(CommitData {
            id,
            tree_id: ObjectId::from(commit.tree_id()),
            parents: commit.parent_ids().map(ObjectId::from).collect(),
            author_name: path_string(author.name_bytes()),
            author_email: path_string(author.email_bytes()),
            committer_name: path_string(committer.name_bytes()),
            message: path_string(commit.message_bytes()),
            commit_time: commit.time().seconds(),
        })
    }

    fn tree(&self, id: ObjectId) -> Result<Vec<TreeEntry>> {
        let tree = self
            .repo
            .find_tree(id.oid())
            .map_err(|e| missing_or(e, || format!("tree {id}")))?;
        Ok(tree
            .iter()
            .map(|entry| {
                let mode = EntryMode::from_raw(entry.filemode()).unwrap_or_else(|| {
                    if entry.kind() == Some(ObjectType::Tree) {
                        EntryMode::Tree
                    } else {
                        EntryMode::Blob
                    }
                });
                TreeEntry {
                    name: path_string(entry.name_bytes()),
                    id: ObjectId::from(entry.id()),
                    mode,
                }
            })
            .collect())
    }

    fn head(&self) -> Result<Option<ObjectId>> {
        match self.repo.head() {
            Ok(head) => Ok(Some(ObjectId::from(head.peel_to_commit()?.id()))),
            Err(e)
                if e.code() == git2::ErrorCode::UnbornBranch
                    || e.code() == git2::ErrorCode::NotFound =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn index_entries(&self) -> Result<Vec<IndexRecord>> {
        let mut index = self.repo.index()?;
        index.read(true)?;
        Ok(index
            .iter()
            .map(|entry| IndexRecord {
                path: path_string(&entry.path),
                id: ObjectId::from(entry.id),
                mode: EntryMode::from_index_mode(entry.mode),
                stage: ((entry.flags >> 12) & 0x3) as u8,
            })
            .collect())
    }

    fn working_tree_status(&self, query: &StatusQuery) -> Result<Vec<StatusRecord>> {
        let mut opts = git2::StatusOptions::new();
        opts.show(git2::StatusShow::Workdir)
            .include_untracked(query.include_untracked)
            .recurse_untracked_dirs(query.recurse_untracked_dirs)
            .include_ignored(query.include_ignored)
            .exclude_submodules(true);
        if let Some(filter) = &query.filter {
            for path in filter.paths() {
                opts.pathspec(path);
            }
        }

        let statuses = self.repo.statuses(Some(&mut opts))?;
        let mut records = Vec::with_capacity(statuses.len());
        for entry in statuses.iter() {
            let status = entry.status();
            let kind = if status.contains(Status::CONFLICTED) {
                StatusKind::Conflicted
            } else if status.contains(Status::WT_NEW) {
                StatusKind::Untracked
            } else if status.contains(Status::WT_DELETED) {
                StatusKind::Deleted
            } else if status.contains(Status::WT_TYPECHANGE) {
                StatusKind::TypeChange
            } else if status.intersects(Status::WT_MODIFIED | Status::WT_RENAMED) {
                StatusKind::Modified
            } else if status.contains(Status::IGNORED) {
                StatusKind::Ignored
            } else {
                continue;
            };
            records.push(StatusRecord {
                path: path_string(entry.path_bytes()),
                kind,
            });
        }
        records.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(records)
    }

    fn hash_working_file(&self, path: &str) -> Result<ObjectId> {
        let workdir = self
            .repo
            .workdir()
            .ok_or_else(|| Error::invalid_argument("repository has no working tree"))?;
        let full_path = workdir.join(path);
        let metadata = std::fs::symlink_metadata(&full_path)?;
        let oid = if metadata.file_type().is_symlink() {
            let target = std::fs::read_link(&full_path)?;
            Oid::hash_object(ObjectType::Blob, target.to_string_lossy().as_bytes())?
        } else {
            Oid::hash_file(ObjectType::Blob, &full_path)?
        };
        Ok(ObjectId::from(oid))
    }

    fn refs_fingerprint(&self) -> Result<u64> {
        let mut refs: Vec<(String, String)> = Vec::new();
        for reference in self.repo.references()? {
            let reference = reference?;
            let name = path_string(reference.name_bytes());
            let target = match reference.target() {
                Some(oid) => oid.to_string(),
                None => reference
                    .symbolic_target()
                    .map(str::to_string)
                    .unwrap_or_default(),
            };
            refs.push((name, target));
        }
        if let Ok(head) = self.repo.find_reference("HEAD") {
            let target = head
                .symbolic_target()
                .map(str::to_string)
                .or_else(|| head.target().map(|oid| oid.to_string()))
                .unwrap_or_default();
            refs.push(("HEAD".to_string(), target));
        }
        refs.sort();

        let mut hasher = DefaultHasher::new();
        refs.hash(&mut hasher);
        Ok(hasher.finish())
    }
}
