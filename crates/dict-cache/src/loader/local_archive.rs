use super::DictLoader;
use crate::{DictError, Result};
use log::{debug, info, warn};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

const ARCHIVE_EXTENSION: &str = ".jar";
const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

/// Maven-style `group:artifact:version` coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactCoordinate {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
}

impl ArtifactCoordinate {
    /// `<root>/<group as path>/<artifact>/<version>`
    pub fn directory_in(&self, root: &Path) -> PathBuf {
        let mut dir = root.to_path_buf();
        for segment in self.group_id.split('.').filter(|s| !s.is_empty()) {
            dir.push(segment);
        }
        dir.push(&self.artifact_id);
        dir.push(&self.version);
        dir
    }

    /// File-name prefix shared by every build of this version. Timestamped
    /// snapshot builds replace `-SNAPSHOT`, so the suffix is dropped.
    pub fn file_stem(&self) -> String {
        let version = self
            .version
            .strip_suffix(SNAPSHOT_SUFFIX)
            .unwrap_or(&self.version);
        format!("{}-{}", self.artifact_id, version)
    }
}

impl std::fmt::Display for ArtifactCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)
    }
}

/// Reads the dictionary from the newest packaged artifact in a local package
/// repository.
pub struct LocalArchiveLoader {
    coordinate: ArtifactCoordinate,
    entry_path: String,
    // Resolved artifact directory; recomputed whenever the root changes.
    location: RwLock<Option<RepoLocation>>,
}

#[derive(Debug, Clone)]
struct RepoLocation {
    root: PathBuf,
    artifact_dir: PathBuf,
}

impl LocalArchiveLoader {
    pub fn new(coordinate: ArtifactCoordinate, entry_path: impl Into<String>) -> Self {
        Self {
            coordinate,
            entry_path: entry_path.into(),
            location: RwLock::new(None),
        }
    }

    pub fn coordinate(&self) -> &ArtifactCoordinate {
        &self.coordinate
    }

    fn current_location(&self) -> Result<RepoLocation> {
        let guard = self
            .location
            .read()
            .map_err(|_| DictError::Config("repository location lock poisoned".into()))?;
        guard
            .clone()
            .ok_or_else(|| DictError::Config("local repository root is not configured".into()))
    }

    /// Newest archive in the artifact directory by modification time.
    pub fn find_latest_archive(&self) -> Result<PathBuf> {
        let location = self.current_location()?;
        let dir = &location.artifact_dir;
        debug!("Scanning {} for {}", dir.display(), self.coordinate);

        if !dir.is_dir() {
            return Err(DictError::SourceNotFound(format!(
                "artifact directory {} does not exist",
                dir.display()
            )));
        }

        let stem = self.coordinate.file_stem();
        let mut latest: Option<(SystemTime, PathBuf)> = None;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !name.starts_with(&stem) || !name.ends_with(ARCHIVE_EXTENSION) {
                continue;
            }
            let metadata = match entry.metadata() {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(err) => {
                    warn!("Skipping {}: {err}", entry.path().display());
                    continue;
                }
            };
            let modified = metadata.modified()?;
            // Strictly newer wins; ties keep directory order.
            if latest.as_ref().map_or(true, |(best, _)| modified > *best) {
                latest = Some((modified, entry.path()));
            }
        }

        let (_, path) = latest.ok_or_else(|| {
            DictError::SourceNotFound(format!(
                "no {stem}*{ARCHIVE_EXTENSION} archive in {}",
                dir.display()
            ))
        })?;
        info!("Selected dictionary archive {}", path.display());
        Ok(path)
    }

    fn read_entry(&self, archive_path: &Path) -> Result<Vec<u8>> {
        let file = File::open(archive_path)?;
        let mut archive = zip::ZipArchive::new(file)?;
        let mut entry = archive.by_name(&self.entry_path).map_err(|err| match err {
            zip::result::ZipError::FileNotFound => DictError::SourceNotFound(format!(
                "{} not present in {}",
                self.entry_path,
                archive_path.display()
            )),
            other => DictError::from(other),
        })?;
        let mut content = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        entry.read_to_end(&mut content)?;
        debug!(
            "Read {} ({} bytes) from {}",
            self.entry_path,
            content.len(),
            archive_path.display()
        );
        Ok(content)
    }
}

impl DictLoader for LocalArchiveLoader {
    fn fetch_raw(&self) -> Result<Vec<u8>> {
        let archive = self.find_latest_archive()?;
        self.read_entry(&archive)
    }

    fn describe(&self) -> String {
        "Maven Local Repository".to_string()
    }

    fn probe(&self) -> bool {
        match self.current_location() {
            Ok(location) => {
                let ok = location.artifact_dir.is_dir();
                if !ok {
                    debug!(
                        "Artifact directory {} is missing",
                        location.artifact_dir.display()
                    );
                }
                ok
            }
            Err(err) => {
                debug!("Local repository probe failed: {err}");
                false
            }
        }
    }

    fn set_repository_root(&self, root: &Path) -> Result<()> {
        let artifact_dir = self.coordinate.directory_in(root);
        let mut guard = self
            .location
            .write()
            .map_err(|_| DictError::Config("repository location lock poisoned".into()))?;
        info!("Local repository root set to {}", root.display());
        *guard = Some(RepoLocation {
            root: root.to_path_buf(),
            artifact_dir,
        });
        Ok(())
    }

    fn repository_root(&self) -> Option<PathBuf> {
        self.location
            .read()
            .ok()
            .and_then(|guard| guard.as_ref().map(|location| location.root.clone()))
    }

    fn uses_repository_root(&self) -> bool {
        true
    }
}
