use std::cell::Cell;
use std::path::Path;

use changeview_types::{CommitId, ObjectId};
use git2::{IndexAddOption, Oid, Repository, Signature, Time};
use tempfile::TempDir;

/// Seconds since the epoch of the first commit made by a [`TestRepo`].
pub const START_TIME: i64 = 1_700_000_000;

/// Gap between two consecutive commits, so walk order is deterministic.
const TICK: i64 = 60;

pub struct TestRepo {
    pub repo: Repository,
    clock: Cell<i64>,
    _dir: TempDir,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

type Result<T> = std::result::Result<T, Error>;

impl TestRepo {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let repo = Repository::init(dir.path())?;
        {
            let mut config = repo.config()?;
            config.set_str("user.name", "Test User")?;
            config.set_str("user.email", "test@test.com")?;
        }

        Ok(Self {
            repo,
            clock: Cell::new(START_TIME),
            _dir: dir,
        })
    }

    pub fn path(&self) -> &Path {
        self._dir.path()
    }

    pub fn write_file(&self, path: &str, content: &str) -> Result<()> {
        let file_path = self._dir.path().join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&file_path, content)?;
        Ok(())
    }

    pub fn delete_file(&self, path: &str) -> Result<()> {
        let file_path = self._dir.path().join(path);
        std::fs::remove_file(&file_path)?;
        Ok(())
    }

    pub fn rename_file(&self, old_path: &str, new_path: &str) -> Result<()> {
        let old_file_path = self._dir.path().join(old_path);
        let new_file_path = self._dir.path().join(new_path);
        if let Some(parent) = new_file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(&old_file_path, &new_file_path)?;
        Ok(())
    }

    /// Stage a single path, including its deletion.
    pub fn stage(&self, path: &str) -> Result<()> {
        let mut index = self.repo.index()?;
        if self._dir.path().join(path).exists() {
            index.add_path(Path::new(path))?;
        } else {
            index.remove_path(Path::new(path))?;
        }
        index.write()?;
        Ok(())
    }

    /// Stage every change in the working tree, deletions included.
    pub fn stage_all(&self) -> Result<()> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        Ok(())
    }

    /// Stage everything and commit on top of HEAD.
    pub fn commit(&self, message: &str) -> Result<CommitId> {
        self.stage_all()?;
        let parents: Vec<CommitId> = self.head()?.into_iter().collect();
        self.commit_index(message, &parents)
    }

    /// Commit the current index with explicit parents and move HEAD to it.
    pub fn merge_commit(&self, message: &str, parents: &[CommitId]) -> Result<CommitId> {
        self.stage_all()?;
        self.commit_index(message, parents)
    }

    /// Commit the index as it currently is, without staging the working tree.
    pub fn commit_staged(&self, message: &str) -> Result<CommitId> {
        let parents: Vec<CommitId> = self.head()?.into_iter().collect();
        self.commit_index(message, &parents)
    }

    fn commit_index(&self, message: &str, parents: &[CommitId]) -> Result<CommitId> {
        let mut index = self.repo.index()?;
        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;

        let sig = self.next_signature()?;
        let parent_commits = parents
            .iter()
            .map(|p| self.repo.find_commit(p.oid()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let parent_refs: Vec<&git2::Commit> = parent_commits.iter().collect();

        let oid = self
            .repo
            .commit(None, &sig, &sig, message, &tree, &parent_refs)?;
        self.repo.set_head_detached(oid)?;
        Ok(CommitId::from(oid))
    }

    fn next_signature(&self) -> Result<Signature<'static>> {
        let time = self.clock.get();
        self.clock.set(time + TICK);
        Ok(Signature::new(
            "Test User",
            "test@test.com",
            &Time::new(time, 0),
        )?)
    }

    pub fn head(&self) -> Result<Option<CommitId>> {
        match self.repo.head() {
            Ok(head) => Ok(Some(CommitId::from(head.peel_to_commit()?.id()))),
            Err(e)
                if e.code() == git2::ErrorCode::UnbornBranch
                    || e.code() == git2::ErrorCode::NotFound =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Point HEAD at `commit` and force the index and working tree to match it.
    pub fn checkout(&self, commit: CommitId) -> Result<()> {
        let target = self.repo.find_commit(commit.oid())?;
        let mut opts = git2::build::CheckoutBuilder::new();
        opts.force().remove_untracked(true);
        self.repo
            .checkout_tree(target.as_object(), Some(&mut opts))?;
        self.repo.set_head_detached(commit.oid())?;
        Ok(())
    }

    pub fn branch(&self, name: &str, commit: CommitId) -> Result<()> {
        let target = self.repo.find_commit(commit.oid())?;
        self.repo.branch(name, &target, true)?;
        Ok(())
    }

    pub fn tag(&self, name: &str, commit: CommitId) -> Result<()> {
        self.repo
            .reference(&format!("refs/tags/{name}"), commit.oid(), true, "tag")?;
        Ok(())
    }

    pub fn blob_id(&self, content: &str) -> Result<ObjectId> {
        Ok(ObjectId::from(Oid::hash_object(
            git2::ObjectType::Blob,
            content.as_bytes(),
        )?))
    }

    /// Id of the tree (or blob) at `path` in `commit`.
    pub fn entry_id(&self, commit: CommitId, path: &str) -> Result<ObjectId> {
        let tree = self.repo.find_commit(commit.oid())?.tree()?;
        Ok(ObjectId::from(tree.get_path(Path::new(path))?.id()))
    }

    pub fn tree_id(&self, commit: CommitId) -> Result<ObjectId> {
        Ok(ObjectId::from(
            self.repo.find_commit(commit.oid())?.tree_id(),
        ))
    }
}
