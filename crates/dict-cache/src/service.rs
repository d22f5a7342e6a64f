//! Dictionary service facade used by the MCP surface.

use crate::config::DictConfig;
use crate::loader::{build_loader, DictLoader};
use crate::resolver::RepoPathResolver;
use crate::scheduler::{
    LoadReport, RefreshOutcome, RefreshPolicy, RefreshScheduler, RefreshStatus, RefreshTimer,
    RefreshTrigger,
};
use crate::{CacheStats, CacheStore, DictError, FieldRecord, Result};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Result of a batch lookup against one pinned table snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct DictQuery {
    pub results: BTreeMap<String, Option<FieldRecord>>,
    pub found: Vec<String>,
    /// Names with no dictionary entry ("unstandardized" fields)
    pub missing: Vec<String>,
}

impl DictQuery {
    pub fn found_count(&self) -> usize {
        self.found.len()
    }

    pub fn missing_count(&self) -> usize {
        self.missing.len()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoaderHealth {
    pub loader_type: String,
    pub reachable: bool,
    pub cache_size: usize,
}

pub struct DictService {
    loader: Arc<dyn DictLoader>,
    store: Arc<CacheStore>,
    scheduler: RefreshScheduler,
    timer_enabled: bool,
    timer: Mutex<Option<RefreshTimer>>,
    // Serializes first loads and source switches
    load_gate: tokio::sync::Mutex<()>,
}

impl DictService {
    pub fn new(loader: Arc<dyn DictLoader>, policy: RefreshPolicy, timer_enabled: bool) -> Self {
        let store = Arc::new(CacheStore::new());
        let scheduler = RefreshScheduler::new(Arc::clone(&loader), Arc::clone(&store), policy);
        Self {
            loader,
            store,
            scheduler,
            timer_enabled,
            timer: Mutex::new(None),
            load_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Build the configured loader. A local loader without an explicit root
    /// gets one from `resolver`.
    pub fn from_config(config: &DictConfig, resolver: &dyn RepoPathResolver) -> Result<Self> {
        let loader = build_loader(config)?;
        if loader.uses_repository_root() && loader.repository_root().is_none() {
            match resolver.resolve_local_repo_path() {
                Some(root) => loader.set_repository_root(&root)?,
                None => warn!("No local repository path could be resolved; configure one before querying"),
            }
        }
        let policy = RefreshPolicy {
            interval: config.refresh_interval(),
            initial_delay: config.initial_delay(),
            fetch_timeout: config.fetch_timeout(),
            degraded_threshold: config.refresh.degraded_threshold,
            suspend_threshold: config.refresh.suspend_threshold,
        };
        Ok(Self::new(loader, policy, config.refresh_enabled()))
    }

    pub fn loader_type(&self) -> String {
        self.loader.describe()
    }

    pub fn uses_repository_root(&self) -> bool {
        self.loader.uses_repository_root()
    }

    pub fn repository_root(&self) -> Option<PathBuf> {
        self.loader.repository_root()
    }

    pub fn is_initialized(&self) -> bool {
        self.store.is_initialized()
    }

    /// Mandatory first load. Returns `None` when the cache was already
    /// loaded by someone else.
    pub async fn initialize(&self) -> Result<Option<LoadReport>> {
        let _gate = self.load_gate.lock().await;
        if self.store.is_initialized() {
            return Ok(None);
        }
        let report = self.scheduler.load_now().await?;
        self.ensure_timer();
        Ok(Some(report))
    }

    /// Look up every name against one snapshot. Unknown names are reported
    /// as missing, never as errors.
    pub async fn lookup_many(
        &self,
        names: &[String],
        repo_override: Option<&Path>,
    ) -> Result<DictQuery> {
        match repo_override {
            Some(path) if !self.loader.uses_repository_root() => debug!(
                "{} has no local repository; ignoring {}",
                self.loader.describe(),
                path.display()
            ),
            Some(path) if self.loader.repository_root().as_deref() != Some(path) => {
                self.switch_repository(path).await?;
            }
            _ => {}
        }
        self.ensure_loaded().await?;

        let snapshot = self
            .store
            .snapshot()
            .ok_or_else(|| DictError::CacheUninitialized {
                message: "dictionary table is not loaded".into(),
                cause: None,
            })?;
        let mut query = DictQuery {
            results: BTreeMap::new(),
            found: Vec::new(),
            missing: Vec::new(),
        };
        for name in names {
            let record = snapshot.get(name).cloned();
            if record.is_some() {
                query.found.push(name.clone());
            } else {
                query.missing.push(name.clone());
            }
            query.results.insert(name.clone(), record);
        }
        if !query.missing.is_empty() {
            info!(
                "{} of {} fields have no dictionary entry",
                query.missing.len(),
                names.len()
            );
        }
        Ok(query)
    }

    /// Point a local loader at `root` and reload now, propagating failure.
    pub async fn switch_repository(&self, root: &Path) -> Result<LoadReport> {
        let _gate = self.load_gate.lock().await;
        self.loader.set_repository_root(root)?;
        info!("Switched repository root to {}", root.display());
        let report = self.scheduler.load_now().await?;
        self.ensure_timer();
        Ok(report)
    }

    pub async fn force_reload(&self) -> RefreshOutcome {
        let outcome = self.scheduler.refresh(RefreshTrigger::Manual).await;
        if matches!(outcome, RefreshOutcome::Refreshed { .. }) {
            self.ensure_timer();
        }
        outcome
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.store.stats()
    }

    pub async fn loader_health(&self) -> LoaderHealth {
        let loader = Arc::clone(&self.loader);
        let reachable = match tokio::task::spawn_blocking(move || loader.probe()).await {
            Ok(reachable) => reachable,
            Err(err) => {
                warn!("Loader probe task failed: {err}");
                false
            }
        };
        LoaderHealth {
            loader_type: self.loader.describe(),
            reachable,
            cache_size: self.store.len(),
        }
    }

    pub fn refresh_status(&self) -> RefreshStatus {
        self.scheduler.status()
    }

    pub fn enable_refresh(&self) -> RefreshStatus {
        self.scheduler.enable();
        self.scheduler.status()
    }

    /// Stop the timer loop, waiting for an in-flight cycle.
    pub async fn shutdown(&self) {
        let timer = match self.timer.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(timer) = timer {
            timer.shutdown().await;
        }
    }

    async fn ensure_loaded(&self) -> Result<()> {
        if self.store.is_initialized() {
            return Ok(());
        }
        if self.loader.uses_repository_root() && self.loader.repository_root().is_none() {
            return Err(DictError::Config(
                "local repository path is not configured".into(),
            ));
        }
        self.initialize()
            .await
            .map(|_| ())
            .map_err(|err| DictError::uninitialized_by(&err))
    }

    fn ensure_timer(&self) {
        if !self.timer_enabled {
            return;
        }
        let Ok(mut guard) = self.timer.lock() else {
            return;
        };
        if guard.is_none() {
            *guard = Some(self.scheduler.spawn_timer());
        }
    }
}
