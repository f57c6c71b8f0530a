use std::sync::Arc;

use docrelay_core::error::CoreError;
use docrelay_core::registry::ScriptRegistry;
use docrelay_core::scripting::ExecutionEngine;
use docrelay_core::staging::StagingStore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; nothing in here is mutated after startup. Requests
/// share only the filesystem.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Staging root for uploads and artifacts.
    pub staging: Arc<StagingStore>,
    /// Processor discovery.
    pub registry: Arc<ScriptRegistry>,
    /// Processor runner.
    pub engine: Arc<ExecutionEngine>,
}

impl AppState {
    /// Open the staging store and script registry named by `config`.
    ///
    /// Fails if the scripts directory is missing or unreadable, or if the
    /// uploads directory cannot be created.
    pub async fn from_config(config: ServerConfig) -> Result<Self, CoreError> {
        let staging = StagingStore::open(&config.uploads_dir).await?;
        let registry = ScriptRegistry::open(&config.scripts_dir, &config.script_extension)?;
        let engine = ExecutionEngine::new(config.engine_config(), registry.clone());

        Ok(Self {
            config: Arc::new(config),
            staging: Arc::new(staging),
            registry: Arc::new(registry),
            engine: Arc::new(engine),
        })
    }
}
