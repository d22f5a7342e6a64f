//! Field dictionary MCP server
//!
//! Serves dictionary lookups over MCP stdio. The dictionary is loaded from a
//! local repository archive or a remote git repository and refreshed in the
//! background.
//!
//! ## Tools
//!
//! - `getDictDefByLongNameList` - Resolve field display names to definitions
//! - `reloadDict` - Force a refresh
//! - `getCacheStats` / `getLoaderInfo` - Cache and source health
//! - `configureMavenRepo` - Show or persist the local repository path
//! - `getRefreshStatus` / `enableRefresh` - Background refresh control
//!
//! ## Usage
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "dict": {
//!       "command": "dict-mcp",
//!       "env": { "DICT_CONFIG": "/etc/dict-mcp.toml" }
//!     }
//!   }
//! }
//! ```

use anyhow::{Context, Result};
use dict_cache::{DictConfig, DictService, LoaderKind, MavenRepoResolver};
use rmcp::transport::stdio;
use rmcp::ServiceExt;
use std::sync::Arc;

mod schemas;
mod tools;

use tools::DictMcpService;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the MCP protocol
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    log::info!("Starting dictionary MCP server");

    let config = DictConfig::load().context("failed to load configuration")?;
    let resolver = MavenRepoResolver::new(std::env::current_dir().ok());
    let dict = Arc::new(
        DictService::from_config(&config, &resolver).context("invalid loader configuration")?,
    );

    match config.loader.kind {
        LoaderKind::Gitlab => {
            dict.initialize()
                .await
                .context("initial dictionary load failed")?;
        }
        LoaderKind::Maven => match dict.repository_root() {
            Some(root) => log::info!(
                "Local repository {}; dictionary loads on first query",
                root.display()
            ),
            None => log::warn!("No local repository configured; use configureMavenRepo"),
        },
    }
    if !config.refresh_enabled() {
        log::info!("Background refresh disabled");
    }

    let server = DictMcpService::new(Arc::clone(&dict)).serve(stdio()).await?;
    server.waiting().await?;

    dict.shutdown().await;
    log::info!("Dictionary MCP server stopped");
    Ok(())
}
