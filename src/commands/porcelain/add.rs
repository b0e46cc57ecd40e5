//! Staging files
//!
//! Hashing and storing blobs is the CPU-bound part of `add`, so it fans
//! out across a bounded worker pool: one task per file, limited by a
//! semaphore sized to the machine's parallelism, FIFO submission, and
//! fail-fast cancellation: the first worker error cancels the rest and
//! the operation reports it. The index is only touched after every worker
//! has finished.

use crate::areas::database::Database;
use crate::areas::repository::Repository;
use crate::artifacts::core::error::SourceError;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object_id::ObjectId;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

impl Repository {
    /// Stage files: write their blobs and install stage-0 entries.
    pub async fn add(&self, paths: &[String]) -> anyhow::Result<()> {
        let mut files = Vec::new();
        for path in paths {
            files.extend(self.workspace().list_files(Some(Path::new(path)))?);
        }
        files.sort();
        files.dedup();

        let staged = self.hash_files(files).await?;

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        for (path, oid, stat) in staged {
            index.add(IndexEntry::new(path, oid, stat))?;
        }

        index.write_updates()
    }

    /// Hash and store blobs for the given files on the worker pool,
    /// returning results in completion order.
    async fn hash_files(
        &self,
        files: Vec<PathBuf>,
    ) -> anyhow::Result<Vec<(PathBuf, ObjectId, EntryMetadata)>> {
        let parallelism = std::thread::available_parallelism()
            .map(usize::from)
            .unwrap_or(1);
        let semaphore = Arc::new(Semaphore::new(parallelism));
        let cancel = CancellationToken::new();

        let objects_path = self.database().objects_path().to_path_buf();
        let workspace_root = self.workspace().path().to_path_buf();

        let mut workers = JoinSet::new();
        for path in files {
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let objects_path = objects_path.clone();
            let workspace_root = workspace_root.clone();

            workers.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore never closes");

                if cancel.is_cancelled() {
                    return Err(SourceError::Cancelled.into());
                }

                hash_one(&workspace_root, &objects_path, path)
            });
        }

        let mut staged = Vec::new();
        let mut first_error: Option<anyhow::Error> = None;

        while let Some(joined) = workers.join_next().await {
            match joined? {
                Ok(result) => staged.push(result),
                Err(err) => {
                    // fail fast: cancel the remaining workers, keep
                    // draining so none outlive the operation
                    if first_error.is_none() {
                        cancel.cancel();
                        first_error = Some(err);
                    }
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => {
                staged.sort_by(|a, b| a.0.cmp(&b.0));
                Ok(staged)
            }
        }
    }
}

fn hash_one(
    workspace_root: &Path,
    objects_path: &Path,
    path: PathBuf,
) -> anyhow::Result<(PathBuf, ObjectId, EntryMetadata)> {
    let full_path = workspace_root.join(&path);

    let content = std::fs::read(&full_path)?;
    let metadata = std::fs::metadata(&full_path)?;
    let stat: EntryMetadata = (full_path.as_path(), metadata).try_into()?;

    let database = Database::new(objects_path.to_path_buf().into_boxed_path());
    let oid = database.store(&Blob::new(content))?;

    Ok((path, oid, stat))
}
