//! Remote repository loader.
//!
//! The first fetch makes a shallow single-branch clone into a scratch
//! directory; later fetches update just that branch. The dictionary file is
//! read from the object database (branch tip -> tree -> blob), so no working
//! tree file is ever written or read.

use super::{DictLoader, GitCredentials};
use crate::{DictError, Result};
use git2::build::RepoBuilder;
use git2::{Direction, FetchOptions, Remote, Repository};
use log::{debug, info, warn};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tempfile::TempDir;

const SCRATCH_PREFIX: &str = "dict-mcp-repo-";
const REMOTE_NAME: &str = "origin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepoSpec {
    pub url: String,
    pub branch: String,
    /// Slash-separated path of the dictionary file inside the repository
    pub file_path: String,
    /// History depth for clone/fetch; 0 fetches full history
    pub depth: i32,
}

struct ScratchClone {
    repo: Repository,
    dir: TempDir,
}

impl Drop for ScratchClone {
    fn drop(&mut self) {
        info!("Releasing scratch clone {}", self.dir.path().display());
    }
}

pub struct RemoteRepoLoader {
    spec: RemoteRepoSpec,
    credentials: GitCredentials,
    scratch: Mutex<Option<ScratchClone>>,
}

impl RemoteRepoLoader {
    pub fn new(spec: RemoteRepoSpec, credentials: GitCredentials) -> Self {
        Self {
            spec,
            credentials,
            scratch: Mutex::new(None),
        }
    }

    pub fn spec(&self) -> &RemoteRepoSpec {
        &self.spec
    }

    /// Drop the scratch clone (and its directory) now.
    pub fn release(&self) {
        if let Ok(mut guard) = self.scratch.lock() {
            guard.take();
        }
    }

    fn lock_scratch(&self) -> Result<MutexGuard<'_, Option<ScratchClone>>> {
        self.scratch
            .lock()
            .map_err(|_| DictError::Repository("scratch clone lock poisoned".into()))
    }

    fn fetch_options(&self) -> FetchOptions<'static> {
        let mut options = FetchOptions::new();
        options.remote_callbacks(self.credentials.callbacks());
        if self.spec.depth > 0 {
            options.depth(self.spec.depth);
        }
        options
    }

    fn clone_scratch(&self) -> Result<ScratchClone> {
        let dir = tempfile::Builder::new().prefix(SCRATCH_PREFIX).tempdir()?;
        info!(
            "Cloning {} (branch {}) into {}",
            self.spec.url,
            self.spec.branch,
            dir.path().display()
        );
        let repo = RepoBuilder::new()
            .branch(&self.spec.branch)
            .fetch_options(self.fetch_options())
            .clone(&self.spec.url, dir.path())?;
        info!("Clone of {} complete", self.spec.url);
        Ok(ScratchClone { repo, dir })
    }

    fn fetch_latest(&self, repo: &Repository) -> Result<()> {
        debug!("Fetching {} branch {}", self.spec.url, self.spec.branch);
        let refspec = format!(
            "+refs/heads/{branch}:refs/remotes/{REMOTE_NAME}/{branch}",
            branch = self.spec.branch
        );
        let mut remote = repo.find_remote(REMOTE_NAME)?;
        remote.fetch(&[refspec.as_str()], Some(&mut self.fetch_options()), None)?;
        Ok(())
    }

    fn read_blob(&self, repo: &Repository) -> Result<Vec<u8>> {
        let tracking = format!("refs/remotes/{REMOTE_NAME}/{}", self.spec.branch);
        let local = format!("refs/heads/{}", self.spec.branch);
        let reference = repo
            .find_reference(&tracking)
            .or_else(|_| repo.find_reference(&local))
            .map_err(|_| {
                DictError::SourceNotFound(format!("branch {} not found", self.spec.branch))
            })?;
        let commit = reference.peel_to_commit()?;
        let tree = commit.tree()?;

        let entry = tree
            .get_path(Path::new(&self.spec.file_path))
            .map_err(|err| match err.code() {
                git2::ErrorCode::NotFound => DictError::SourceNotFound(format!(
                    "{} not present at {}",
                    self.spec.file_path,
                    short_id(&commit.id())
                )),
                _ => DictError::from(err),
            })?;
        let blob = repo.find_blob(entry.id()).map_err(|_| {
            DictError::SourceNotFound(format!("{} is not a file", self.spec.file_path))
        })?;
        let content = blob.content().to_vec();

        info!(
            "Read {} ({} bytes) at commit {}",
            self.spec.file_path,
            content.len(),
            short_id(&commit.id())
        );
        Ok(content)
    }
}

impl DictLoader for RemoteRepoLoader {
    fn fetch_raw(&self) -> Result<Vec<u8>> {
        let mut guard = self.lock_scratch()?;
        match guard.as_ref() {
            Some(scratch) => self.fetch_latest(&scratch.repo)?,
            None => {
                let scratch = self.clone_scratch()?;
                *guard = Some(scratch);
            }
        }
        let scratch = guard
            .as_ref()
            .ok_or_else(|| DictError::Repository("scratch clone unavailable".into()))?;
        self.read_blob(&scratch.repo)
    }

    fn describe(&self) -> String {
        "GitLab / git".to_string()
    }

    fn probe(&self) -> bool {
        let result = (|| -> Result<usize> {
            let mut remote = Remote::create_detached(self.spec.url.as_str())?;
            let connection =
                remote.connect_auth(Direction::Fetch, Some(self.credentials.callbacks()), None)?;
            Ok(connection.list()?.len())
        })();
        match result {
            Ok(refs) => {
                debug!("Remote {} reachable ({refs} refs)", self.spec.url);
                true
            }
            Err(err) => {
                warn!("Remote {} unreachable [{}]: {err}", self.spec.url, err.kind());
                false
            }
        }
    }
}

fn short_id(oid: &git2::Oid) -> String {
    oid.to_string().chars().take(8).collect()
}
