//! Local repository root discovery and persistence.
//!
//! Priority: `<working_dir>/.mvn/maven.config` > `<localRepository>` from the
//! Maven `settings.xml` > `~/.m2/repository`.

use crate::{DictError, Result};
use log::{debug, info, warn};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const REPO_CONFIG_FILE: &str = ".mvn/maven.config";

pub trait RepoPathResolver: Send + Sync {
    fn resolve_local_repo_path(&self) -> Option<PathBuf>;
}

/// Where a resolved path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoPathSource {
    ConfigFile,
    Settings,
    Default,
}

#[derive(Debug, Clone)]
pub struct MavenRepoResolver {
    working_dir: Option<PathBuf>,
    home_dir: Option<PathBuf>,
    maven_home: Option<PathBuf>,
}

impl Default for MavenRepoResolver {
    fn default() -> Self {
        Self::new(None)
    }
}

impl MavenRepoResolver {
    pub fn new(working_dir: Option<PathBuf>) -> Self {
        let maven_home = ["M2_HOME", "MAVEN_HOME"]
            .into_iter()
            .filter_map(|key| env::var(key).ok())
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
            .map(PathBuf::from);
        Self {
            working_dir,
            home_dir: dirs::home_dir(),
            maven_home,
        }
    }

    /// Resolver with explicit home directories, used by tests.
    pub fn with_homes(
        working_dir: Option<PathBuf>,
        home_dir: Option<PathBuf>,
        maven_home: Option<PathBuf>,
    ) -> Self {
        Self {
            working_dir,
            home_dir,
            maven_home,
        }
    }

    pub fn config_file_path(&self) -> PathBuf {
        match &self.working_dir {
            Some(dir) => dir.join(REPO_CONFIG_FILE),
            None => PathBuf::from(REPO_CONFIG_FILE),
        }
    }

    pub fn has_config_file(&self) -> bool {
        self.config_file_path().is_file()
    }

    /// Resolve the repository path and report where it came from.
    pub fn resolve_with_source(&self) -> Option<(PathBuf, RepoPathSource)> {
        if let Some(path) = self.read_config_file() {
            info!("Repository path from {}: {}", self.config_file_path().display(), path.display());
            return Some((path, RepoPathSource::ConfigFile));
        }
        if let Some(path) = self.read_settings() {
            info!("Repository path from settings.xml: {}", path.display());
            return Some((path, RepoPathSource::Settings));
        }
        let home = self.home_dir.as_ref()?;
        let path = home.join(".m2").join("repository");
        info!("Using default repository path {}", path.display());
        Some((path, RepoPathSource::Default))
    }

    /// Persist `repo_path` to the working directory's config file.
    pub fn save(&self, repo_path: &Path) -> Result<PathBuf> {
        let file = self.config_file_path();
        if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let text = repo_path.to_str().ok_or_else(|| {
            DictError::Config(format!("repository path is not UTF-8: {}", repo_path.display()))
        })?;
        fs::write(&file, text)?;
        info!("Saved repository path {text} to {}", file.display());
        Ok(file)
    }

    fn read_config_file(&self) -> Option<PathBuf> {
        let file = self.config_file_path();
        let content = match fs::read_to_string(&file) {
            Ok(content) => content,
            Err(err) => {
                debug!("{} not readable: {err}", file.display());
                return None;
            }
        };
        let trimmed = content.trim();
        (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
    }

    fn settings_file(&self) -> Option<PathBuf> {
        let user = self
            .home_dir
            .as_ref()
            .map(|home| home.join(".m2").join("settings.xml"));
        let global = self
            .maven_home
            .as_ref()
            .map(|home| home.join("conf").join("settings.xml"));
        user.into_iter().chain(global).find(|path| path.is_file())
    }

    fn read_settings(&self) -> Option<PathBuf> {
        let file = self.settings_file()?;
        let text = match fs::read_to_string(&file) {
            Ok(text) => text,
            Err(err) => {
                warn!("Failed to read {}: {err}", file.display());
                return None;
            }
        };
        let document = match roxmltree::Document::parse(&text) {
            Ok(document) => document,
            Err(err) => {
                warn!("Failed to parse {}: {err}", file.display());
                return None;
            }
        };
        let raw = document
            .descendants()
            .find(|node| node.has_tag_name("localRepository"))
            .and_then(|node| node.text())
            .map(str::trim)
            .filter(|text| !text.is_empty())?;
        Some(PathBuf::from(self.expand_placeholders(raw)))
    }

    fn expand_placeholders(&self, raw: &str) -> String {
        let mut path = raw.to_string();
        if let Some(home) = self.home_dir.as_ref().and_then(|h| h.to_str()) {
            path = path.replace("${user.home}", home);
        }
        for key in ["M2_HOME", "MAVEN_HOME"] {
            let placeholder = format!("${{env.{key}}}");
            if path.contains(&placeholder) {
                if let Ok(value) = env::var(key) {
                    path = path.replace(&placeholder, &value);
                }
            }
        }
        path
    }
}

impl RepoPathResolver for MavenRepoResolver {
    fn resolve_local_repo_path(&self) -> Option<PathBuf> {
        self.resolve_with_source().map(|(path, _)| path)
    }
}
