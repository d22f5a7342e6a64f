//! MCP tools for the field dictionary.
//!
//! Every tool answers with a JSON text block carrying `success` and
//! `message`. Failures come back as tool errors, never protocol errors.

use crate::schemas::{
    CacheStatsResult, ErrorResult, LoaderInfoResult, LookupRequest, LookupResult, RefreshStatusResult,
    ReloadResult, RepoAction, RepoConfigRequest, RepoConfigResult,
};
use dict_cache::{
    DictError, DictService, MavenRepoResolver, RefreshOutcome, RefreshPhase, RepoPathSource,
    SkipReason,
};
use log::{info, warn};
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone)]
pub struct DictMcpService {
    dict: Arc<DictService>,
    tool_router: ToolRouter<Self>,
}

impl DictMcpService {
    pub fn new(dict: Arc<DictService>) -> Self {
        Self {
            dict,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_handler]
impl ServerHandler for DictMcpService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("Field dictionary lookup. Use 'getDictDefByLongNameList' to resolve field display names to their dictionary definitions; names without an entry are reported as unstandardized. 'reloadDict' forces a refresh, 'getRefreshStatus' and 'enableRefresh' manage background refresh.".into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }
}

fn json_text<T: Serialize>(value: &T) -> Content {
    Content::text(serde_json::to_string_pretty(value).unwrap_or_default())
}

fn success<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![json_text(value)]))
}

fn failure(message: String, err: Option<&DictError>) -> Result<CallToolResult, McpError> {
    let body = ErrorResult {
        success: false,
        message,
        error_kind: err.map(DictError::kind),
        cause_kind: err.and_then(DictError::cause_kind),
    };
    Ok(CallToolResult::error(vec![json_text(&body)]))
}

fn source_label(source: RepoPathSource) -> &'static str {
    match source {
        RepoPathSource::ConfigFile => "config_file",
        RepoPathSource::Settings => "settings",
        RepoPathSource::Default => "default",
    }
}

#[tool_router]
impl DictMcpService {
    /// Batch lookup of field definitions by display name
    #[tool(
        name = "getDictDefByLongNameList",
        description = "Look up dictionary definitions (id, type, dbname, ref) for a list of field display names. Names without an entry are returned as unstandardized fields."
    )]
    pub async fn lookup(
        &self,
        Parameters(request): Parameters<LookupRequest>,
    ) -> Result<CallToolResult, McpError> {
        if request.long_name_list.is_empty() {
            return failure("longNameList must not be empty".into(), None);
        }
        let repo = request
            .maven_repo_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        let query = match self
            .dict
            .lookup_many(&request.long_name_list, repo.as_deref())
            .await
        {
            Ok(query) => query,
            Err(err) => return failure(format!("Dictionary lookup failed: {err}"), Some(&err)),
        };

        let message = if query.missing.is_empty() {
            format!("Found definitions for all {} fields", query.found_count())
        } else {
            format!(
                "Found {} of {} fields; {} unstandardized",
                query.found_count(),
                request.long_name_list.len(),
                query.missing_count()
            )
        };
        success(&LookupResult {
            success: true,
            message,
            total: request.long_name_list.len(),
            found: query.found_count(),
            unstandardized_count: query.missing_count(),
            unstandardized_fields: query.missing,
            definitions: query.results,
        })
    }

    /// Manual refresh
    #[tool(
        name = "reloadDict",
        description = "Force a dictionary refresh now. Skipped when a refresh is already running or background refresh is suspended."
    )]
    pub async fn reload(&self) -> Result<CallToolResult, McpError> {
        let result = match self.dict.force_reload().await {
            RefreshOutcome::Refreshed {
                previous,
                current,
                duration_ms,
            } => ReloadResult {
                success: true,
                message: format!("Dictionary reloaded: {previous} -> {current} fields"),
                status: "refreshed",
                reason: None,
                error_kind: None,
                previous_size: Some(previous),
                current_size: Some(current),
                duration_ms: Some(duration_ms),
            },
            RefreshOutcome::Skipped(reason) => {
                let (reason, message) = match reason {
                    SkipReason::InFlight => ("in_flight", "A refresh is already running"),
                    SkipReason::Suspended => (
                        "suspended",
                        "Refresh is suspended after repeated failures; call enableRefresh once the source is fixed",
                    ),
                    SkipReason::Uninitialized => ("uninitialized", "Dictionary is not loaded yet"),
                };
                ReloadResult {
                    success: true,
                    message: message.into(),
                    status: "skipped",
                    reason: Some(reason),
                    error_kind: None,
                    previous_size: None,
                    current_size: None,
                    duration_ms: None,
                }
            }
            RefreshOutcome::Failed {
                kind,
                message,
                consecutive_failures,
            } => {
                let body = ReloadResult {
                    success: false,
                    message: format!(
                        "Dictionary reload failed ({consecutive_failures} consecutive): {message}"
                    ),
                    status: "failed",
                    reason: None,
                    error_kind: Some(kind),
                    previous_size: None,
                    current_size: Some(self.dict.cache_stats().total),
                    duration_ms: None,
                };
                return Ok(CallToolResult::error(vec![json_text(&body)]));
            }
        };
        success(&result)
    }

    #[tool(
        name = "getCacheStats",
        description = "Number of cached dictionary fields and their display names."
    )]
    pub async fn cache_stats(&self) -> Result<CallToolResult, McpError> {
        let stats = self.dict.cache_stats();
        success(&CacheStatsResult {
            success: true,
            total_count: stats.total,
            duplicates: stats.duplicates,
            keys: stats.keys,
        })
    }

    #[tool(
        name = "getLoaderInfo",
        description = "Active loader type, whether its source is reachable, and the current cache size."
    )]
    pub async fn loader_info(&self) -> Result<CallToolResult, McpError> {
        let health = self.dict.loader_health().await;
        success(&LoaderInfoResult {
            success: true,
            loader_type: health.loader_type,
            available: health.reachable,
            cache_size: health.cache_size,
            repository_root: self
                .dict
                .repository_root()
                .map(|p| p.display().to_string()),
        })
    }

    /// Read or persist the local repository root
    #[tool(
        name = "configureMavenRepo",
        description = "Show the resolved local repository path (action=get) or save one to .mvn/maven.config and load the dictionary from it (action=save)."
    )]
    pub async fn configure_repo(
        &self,
        Parameters(request): Parameters<RepoConfigRequest>,
    ) -> Result<CallToolResult, McpError> {
        let working_dir = request
            .working_directory
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok());
        let resolver = MavenRepoResolver::new(working_dir);

        match request.action {
            RepoAction::Get => {
                let resolved = resolver.resolve_with_source();
                let message = match &resolved {
                    Some((path, _)) => format!("Repository path: {}", path.display()),
                    None => "No repository path could be resolved".into(),
                };
                success(&RepoConfigResult {
                    success: true,
                    message,
                    maven_repo_path: resolved.as_ref().map(|(p, _)| p.display().to_string()),
                    source: resolved.map(|(_, source)| source_label(source)),
                    config_file: resolver.config_file_path().display().to_string(),
                    has_config_file: resolver.has_config_file(),
                    loaded_fields: None,
                })
            }
            RepoAction::Save => {
                let Some(path) = request
                    .maven_repo_path
                    .as_deref()
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                else {
                    return failure("mavenRepoPath is required for action=save".into(), None);
                };
                if !self.dict.uses_repository_root() {
                    let err = DictError::Unsupported(format!(
                        "{} does not read from a local repository",
                        self.dict.loader_type()
                    ));
                    return failure(err.to_string(), Some(&err));
                }
                let path = Path::new(path);
                if !path.is_dir() {
                    let err = DictError::SourceNotFound(format!(
                        "{} is not a directory",
                        path.display()
                    ));
                    return failure(err.to_string(), Some(&err));
                }
                if let Err(err) = resolver.save(path) {
                    return failure(format!("Failed to save repository path: {err}"), Some(&err));
                }
                match self.dict.switch_repository(path).await {
                    Ok(report) => {
                        info!("Repository path saved and dictionary reloaded from {}", path.display());
                        success(&RepoConfigResult {
                            success: true,
                            message: format!(
                                "Saved repository path and loaded {} fields",
                                report.current
                            ),
                            maven_repo_path: Some(path.display().to_string()),
                            source: Some(source_label(RepoPathSource::ConfigFile)),
                            config_file: resolver.config_file_path().display().to_string(),
                            has_config_file: true,
                            loaded_fields: Some(report.current),
                        })
                    }
                    Err(err) => {
                        warn!("Saved repository path but reload failed: {err}");
                        failure(
                            format!("Saved repository path but loading failed: {err}"),
                            Some(&err),
                        )
                    }
                }
            }
        }
    }

    #[tool(
        name = "getRefreshStatus",
        description = "Background refresh state (idle, refreshing, suspended), consecutive failures, degraded flag and last error."
    )]
    pub async fn refresh_status(&self) -> Result<CallToolResult, McpError> {
        let status = self.dict.refresh_status();
        let message = match status.phase {
            RefreshPhase::Suspended => format!(
                "Refresh suspended after {} consecutive failures",
                status.consecutive_failures
            ),
            _ if status.degraded => format!(
                "Refresh degraded: {} consecutive failures",
                status.consecutive_failures
            ),
            RefreshPhase::Refreshing => "Refresh in progress".into(),
            RefreshPhase::Idle => "Refresh healthy".into(),
        };
        success(&RefreshStatusResult {
            success: true,
            message,
            refresh: status,
        })
    }

    #[tool(
        name = "enableRefresh",
        description = "Re-enable background refresh after it was suspended and reset the failure count."
    )]
    pub async fn enable_refresh(&self) -> Result<CallToolResult, McpError> {
        let status = self.dict.enable_refresh();
        success(&RefreshStatusResult {
            success: true,
            message: "Refresh re-enabled".into(),
            refresh: status,
        })
    }
}
