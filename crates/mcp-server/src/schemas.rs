//! Request and response shapes for the dictionary tools.

use dict_cache::{ErrorKind, FieldRecord, RefreshStatus};
use rmcp::schemars;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
    /// Field display names to resolve
    #[schemars(description = "Field display names (longname) to look up")]
    pub long_name_list: Vec<String>,

    /// Optional local repository root; switching it reloads the dictionary
    #[schemars(description = "Local repository path to load the dictionary from (optional)")]
    #[serde(default)]
    pub maven_repo_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RepoAction {
    Get,
    Save,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RepoConfigRequest {
    #[schemars(description = "`get` to show the resolved repository path, `save` to persist and load from one")]
    pub action: RepoAction,

    #[schemars(description = "Repository path to save (required for `save`)")]
    #[serde(default)]
    pub maven_repo_path: Option<String>,

    #[schemars(description = "Directory whose .mvn/maven.config is read or written (defaults to the server's working directory)")]
    #[serde(default)]
    pub working_directory: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResult {
    pub success: bool,
    pub message: String,
    pub total: usize,
    pub found: usize,
    pub unstandardized_count: usize,
    pub unstandardized_fields: Vec<String>,
    pub definitions: BTreeMap<String, Option<FieldRecord>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadResult {
    pub success: bool,
    pub message: String,
    /// `refreshed`, `skipped` or `failed`
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsResult {
    pub success: bool,
    pub total_count: usize,
    pub duplicates: usize,
    pub keys: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderInfoResult {
    pub success: bool,
    pub loader_type: String,
    pub available: bool,
    pub cache_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_root: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoConfigResult {
    pub success: bool,
    pub message: String,
    pub maven_repo_path: Option<String>,
    /// `config_file`, `settings` or `default`
    pub source: Option<&'static str>,
    pub config_file: String,
    pub has_config_file: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded_fields: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshStatusResult {
    pub success: bool,
    pub message: String,
    pub refresh: RefreshStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Kind of the underlying failure, e.g. `authentication` behind `cache_uninitialized`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause_kind: Option<ErrorKind>,
}
