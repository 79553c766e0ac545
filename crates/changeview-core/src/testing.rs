//! Store wrappers for tests: count reads, or fail on demand.

use std::cell::Cell;
use std::path::Path;

use changeview_types::ObjectId;

use crate::store::{
    CommitData, IndexRecord, ObjectStore, RepositoryId, StatusQuery, StatusRecord, TreeEntry,
};
use crate::{Error, Result};

pub struct CountingStore<S> {
    inner: S,
    tree_reads: Cell<usize>,
    commit_reads: Cell<usize>,
    index_reads: Cell<usize>,
    status_reads: Cell<usize>,
    fail_trees: Cell<bool>,
}

impl<S: ObjectStore> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            tree_reads: Cell::new(0),
            commit_reads: Cell::new(0),
            index_reads: Cell::new(0),
            status_reads: Cell::new(0),
            fail_trees: Cell::new(false),
        }
    }

    pub fn tree_reads(&self) -> usize {
        self.tree_reads.get()
    }

    pub fn commit_reads(&self) -> usize {
        self.commit_reads.get()
    }

    pub fn index_reads(&self) -> usize {
        self.index_reads.get()
    }

    pub fn status_reads(&self) -> usize {
        self.status_reads.get()
    }

    /// Make every tree read fail with an IO error until switched back.
    pub fn fail_trees(&self, fail: bool) {
        self.fail_trees.set(fail);
    }
}

impl<S: ObjectStore> ObjectStore for CountingStore<S> {
    fn identity(&self) -> RepositoryId {
        self.inner.identity()
    }

    fn git_dir(&self) -> &Path {
        self.inner.git_dir()
    }

    fn resolve(&self, revision: &str) -> Result<ObjectId> {
        self.inner.resolve(revision)
    }

    fn commit(&self, id: ObjectId) -> Result<CommitData> {
        self.commit_reads.set(self.commit_reads.get() + 1);
        self.inner.commit(id)
    }

    fn tree(&self, id: ObjectId) -> Result<Vec<TreeEntry>> {
        self.tree_reads.set(self.tree_reads.get() + 1);
        if self.fail_trees.get() {
            return Err(Error::Io(std::io::Error::other("injected tree read failure")));
        }
        self.inner.tree(id)
    }

    fn head(&self) -> Result<Option<ObjectId>> {
        self.inner.head()
    }

    fn index_entries(&self) -> Result<Vec<IndexRecord>> {
        self.index_reads.set(self.index_reads.get() + 1);
        self.inner.index_entries()
    }

    fn working_tree_status(&self, query: &StatusQuery) -> Result<Vec<StatusRecord>> {
        self.status_reads.set(self.status_reads.get() + 1);
        self.inner.working_tree_status(query)
    }

    fn hash_working_file(&self, path: &str) -> Result<ObjectId> {
        self.inner.hash_working_file(path)
    }

    fn refs_fingerprint(&self) -> Result<u64> {
        self.inner.refs_fingerprint()
    }
}
