//! Source loaders: where raw dictionary bytes come from.
//!
//! A loader is selected once at startup from configuration and shared behind
//! `Arc<dyn DictLoader>`. All methods are blocking; async callers run them on
//! the blocking pool.

mod credentials;
mod local_archive;
mod remote_repo;

pub use credentials::GitCredentials;
pub use local_archive::{ArtifactCoordinate, LocalArchiveLoader};
pub use remote_repo::{RemoteRepoLoader, RemoteRepoSpec};

use crate::config::{DictConfig, LoaderKind};
use crate::{DictError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub trait DictLoader: Send + Sync {
    /// Fetch the current raw dictionary bytes.
    fn fetch_raw(&self) -> Result<Vec<u8>>;

    /// Human-readable loader type label.
    fn describe(&self) -> String;

    /// Side-effect-free availability check. Never fails; `false` on any error.
    fn probe(&self) -> bool;

    /// Point the loader at a different local repository root.
    fn set_repository_root(&self, root: &Path) -> Result<()> {
        Err(DictError::Unsupported(format!(
            "{} has no local repository root (requested {})",
            self.describe(),
            root.display()
        )))
    }

    /// Active local repository root, for loaders that have one.
    fn repository_root(&self) -> Option<PathBuf> {
        None
    }

    /// Whether the loader reads from a local repository root.
    fn uses_repository_root(&self) -> bool {
        false
    }
}

/// Build the configured loader.
pub fn build_loader(config: &DictConfig) -> Result<Arc<dyn DictLoader>> {
    config.validate()?;
    match config.loader.kind {
        LoaderKind::Maven => {
            let maven = &config.maven;
            let loader = LocalArchiveLoader::new(
                ArtifactCoordinate {
                    group_id: maven.group_id.clone(),
                    artifact_id: maven.artifact_id.clone(),
                    version: maven.version.clone(),
                },
                maven.xml_path.clone(),
            );
            if let Some(root) = maven.repo.as_deref() {
                loader.set_repository_root(root)?;
            }
            Ok(Arc::new(loader))
        }
        LoaderKind::Gitlab => {
            let gitlab = &config.gitlab;
            let spec = RemoteRepoSpec {
                url: gitlab.git_url.clone(),
                branch: gitlab.branch.clone(),
                file_path: gitlab.file_path.clone(),
                depth: gitlab.depth,
            };
            let credentials = GitCredentials {
                token: gitlab.token.clone(),
                username: gitlab.username.clone(),
                password: gitlab.password.clone(),
            };
            Ok(Arc::new(RemoteRepoLoader::new(spec, credentials)))
        }
    }
}
