//! Configuration: optional TOML file plus `DICT_*` environment overrides.
//!
//! ```toml
//! [loader]
//! type = "gitlab"
//!
//! [gitlab]
//! git_url = "https://gitlab.example.com/dict/dict-schema.git"
//! branch = "master"
//! token = "glpat-..."
//!
//! [refresh]
//! interval_ms = 20000
//! ```

use crate::{DictError, Result};
use log::{debug, info};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "DICT_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "dict-mcp.toml";

const DEFAULT_BRANCH: &str = "master";
const DEFAULT_GIT_FILE_PATH: &str = "src/main/resources/dict/MDict.d_schema.xml";
const DEFAULT_REFRESH_INTERVAL_MS: u64 = 20_000;
const DEFAULT_FETCH_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_DEGRADED_THRESHOLD: u32 = 5;
const DEFAULT_SUSPEND_THRESHOLD: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaderKind {
    /// Local package repository, newest packaged archive
    #[default]
    Maven,
    /// Remote version-controlled repository
    Gitlab,
}

impl LoaderKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "maven" | "local" => Some(Self::Maven),
            "gitlab" | "git" | "remote" => Some(Self::Gitlab),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoaderSection {
    #[serde(rename = "type")]
    pub kind: LoaderKind,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MavenSection {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub xml_path: String,
    pub repo: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitlabSection {
    pub git_url: String,
    pub branch: String,
    pub file_path: String,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub depth: i32,
}

impl Default for GitlabSection {
    fn default() -> Self {
        Self {
            git_url: String::new(),
            branch: DEFAULT_BRANCH.to_string(),
            file_path: DEFAULT_GIT_FILE_PATH.to_string(),
            token: None,
            username: None,
            password: None,
            depth: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefreshSection {
    pub interval_ms: u64,
    pub initial_delay_ms: Option<u64>,
    /// Timer refresh; unset means "only for the remote loader"
    pub enabled: Option<bool>,
    pub fetch_timeout_ms: u64,
    pub degraded_threshold: u32,
    pub suspend_threshold: u32,
}

impl Default for RefreshSection {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            initial_delay_ms: None,
            enabled: None,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            degraded_threshold: DEFAULT_DEGRADED_THRESHOLD,
            suspend_threshold: DEFAULT_SUSPEND_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DictConfig {
    pub loader: LoaderSection,
    pub maven: MavenSection,
    pub gitlab: GitlabSection,
    pub refresh: RefreshSection,
}

impl DictConfig {
    /// Load from `$DICT_CONFIG`, else `./dict-mcp.toml` when present, else
    /// defaults; then apply environment overrides.
    pub fn load() -> Result<Self> {
        let explicit = env_value(CONFIG_PATH_ENV).map(PathBuf::from);
        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::from_file(fallback)?
                } else {
                    debug!("No {DEFAULT_CONFIG_FILE}; using defaults");
                    Self::default()
                }
            }
        };
        config.apply_env_overrides(env_value);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            DictError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml(&text)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Overlay values from `lookup` (normally the process environment).
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(kind) = lookup("DICT_LOADER_TYPE").and_then(|v| LoaderKind::parse(&v)) {
            self.loader.kind = kind;
        }

        override_string(&lookup, "DICT_GROUP_ID", &mut self.maven.group_id);
        override_string(&lookup, "DICT_ARTIFACT_ID", &mut self.maven.artifact_id);
        override_string(&lookup, "DICT_VERSION", &mut self.maven.version);
        override_string(&lookup, "DICT_XML_PATH", &mut self.maven.xml_path);
        if let Some(repo) = lookup("DICT_MAVEN_REPO") {
            self.maven.repo = Some(PathBuf::from(repo));
        }

        override_string(&lookup, "DICT_GIT_URL", &mut self.gitlab.git_url);
        override_string(&lookup, "DICT_GIT_BRANCH", &mut self.gitlab.branch);
        override_string(&lookup, "DICT_GIT_FILE_PATH", &mut self.gitlab.file_path);
        if let Some(token) = lookup("DICT_GIT_TOKEN") {
            self.gitlab.token = Some(token);
        }
        if let Some(username) = lookup("DICT_GIT_USERNAME") {
            self.gitlab.username = Some(username);
        }
        if let Some(password) = lookup("DICT_GIT_PASSWORD") {
            self.gitlab.password = Some(password);
        }

        if let Some(ms) = lookup("DICT_REFRESH_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.refresh.interval_ms = ms;
        }
        if let Some(enabled) = lookup("DICT_REFRESH_ENABLED").and_then(|v| parse_bool(&v)) {
            self.refresh.enabled = Some(enabled);
        }
    }

    /// Reject a selected loader whose required keys are missing.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = match self.loader.kind {
            LoaderKind::Maven => [
                ("maven.group_id", &self.maven.group_id),
                ("maven.artifact_id", &self.maven.artifact_id),
                ("maven.version", &self.maven.version),
                ("maven.xml_path", &self.maven.xml_path),
            ]
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(key, _)| key)
            .collect(),
            LoaderKind::Gitlab => [
                ("gitlab.git_url", &self.gitlab.git_url),
                ("gitlab.branch", &self.gitlab.branch),
                ("gitlab.file_path", &self.gitlab.file_path),
            ]
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(key, _)| key)
            .collect(),
        };
        if !missing.is_empty() {
            return Err(DictError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }
        let refresh = &self.refresh;
        if refresh.interval_ms == 0 {
            return Err(DictError::Config(
                "refresh.interval_ms must be greater than zero".into(),
            ));
        }
        if refresh.fetch_timeout_ms == 0 {
            return Err(DictError::Config(
                "refresh.fetch_timeout_ms must be greater than zero".into(),
            ));
        }
        if refresh.suspend_threshold == 0 || refresh.degraded_threshold == 0 {
            return Err(DictError::Config(
                "refresh.degraded_threshold and refresh.suspend_threshold must be greater than zero"
                    .into(),
            ));
        }
        if refresh.degraded_threshold > refresh.suspend_threshold {
            return Err(DictError::Config(format!(
                "refresh.degraded_threshold ({}) exceeds refresh.suspend_threshold ({})",
                refresh.degraded_threshold, refresh.suspend_threshold
            )));
        }
        Ok(())
    }

    pub fn refresh_enabled(&self) -> bool {
        self.refresh
            .enabled
            .unwrap_or(self.loader.kind == LoaderKind::Gitlab)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh.interval_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(
            self.refresh
                .initial_delay_ms
                .unwrap_or(self.refresh.interval_ms),
        )
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh.fetch_timeout_ms)
    }
}

fn override_string<F>(lookup: &F, key: &str, target: &mut String)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(key) {
        *target = value;
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_value(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_cover_every_section() {
        let config = DictConfig::default();
        assert_eq!(config.loader.kind, LoaderKind::Maven);
        assert_eq!(config.gitlab.branch, "master");
        assert_eq!(config.gitlab.file_path, DEFAULT_GIT_FILE_PATH);
        assert_eq!(config.refresh_interval(), Duration::from_secs(20));
        assert_eq!(config.initial_delay(), Duration::from_secs(20));
        assert_eq!(config.refresh.degraded_threshold, 5);
        assert_eq!(config.refresh.suspend_threshold, 10);
        assert!(!config.refresh_enabled());
    }

    #[test]
    fn parses_toml_sections() {
        let config = DictConfig::from_toml(
            r#"
[loader]
type = "gitlab"

[gitlab]
git_url = "https://git.example.com/dict.git"
token = "tok"

[refresh]
interval_ms = 5000
"#,
        )
        .unwrap();
        assert_eq!(config.loader.kind, LoaderKind::Gitlab);
        assert_eq!(config.gitlab.git_url, "https://git.example.com/dict.git");
        assert_eq!(config.gitlab.branch, "master");
        assert_eq!(config.gitlab.token.as_deref(), Some("tok"));
        assert_eq!(config.refresh.interval_ms, 5000);
        assert!(config.refresh_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_take_precedence() {
        let mut config = DictConfig::default();
        let vars: HashMap<&str, &str> = [
            ("DICT_LOADER_TYPE", "maven"),
            ("DICT_GROUP_ID", "com.example"),
            ("DICT_ARTIFACT_ID", "dict"),
            ("DICT_VERSION", "1.0-SNAPSHOT"),
            ("DICT_XML_PATH", "dict/MDict.xml"),
            ("DICT_MAVEN_REPO", "/opt/m2"),
            ("DICT_REFRESH_ENABLED", "yes"),
            ("DICT_REFRESH_INTERVAL_MS", "not-a-number"),
        ]
        .into_iter()
        .collect();
        config.apply_env_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.maven.group_id, "com.example");
        assert_eq!(config.maven.repo.as_deref(), Some(Path::new("/opt/m2")));
        assert!(config.refresh_enabled());
        assert_eq!(config.refresh.interval_ms, DEFAULT_REFRESH_INTERVAL_MS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_lists_missing_keys() {
        let err = DictConfig::default().validate().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("maven.group_id"));
        assert!(message.contains("maven.xml_path"));
    }

    #[test]
    fn validate_rejects_unusable_refresh_settings() {
        let valid = DictConfig::from_toml(
            r#"
[loader]
type = "gitlab"

[gitlab]
git_url = "https://git.example.com/dict.git"
"#,
        )
        .unwrap();
        assert!(valid.validate().is_ok());

        let mut zero_timeout = valid.clone();
        zero_timeout.refresh.fetch_timeout_ms = 0;
        let err = zero_timeout.validate().unwrap_err();
        assert!(err.to_string().contains("fetch_timeout_ms"), "{err}");

        let mut zero_suspend = valid.clone();
        zero_suspend.refresh.suspend_threshold = 0;
        assert!(matches!(zero_suspend.validate(), Err(DictError::Config(_))));

        let mut inverted = valid.clone();
        inverted.refresh.degraded_threshold = 11;
        inverted.refresh.suspend_threshold = 10;
        let err = inverted.validate().unwrap_err();
        assert!(err.to_string().contains("exceeds"), "{err}");

        let mut equal = valid;
        equal.refresh.degraded_threshold = 3;
        equal.refresh.suspend_threshold = 3;
        assert!(equal.validate().is_ok());
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = DictConfig::from_toml("[loader\ntype=").unwrap_err();
        assert!(matches!(err, DictError::Config(_)));
    }
}
