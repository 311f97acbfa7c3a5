//! Assembles the process-wide shared state: the collection registry, the
//! auth adjudicator, and the storage backend, wired from the persisted
//! layout and loaded configuration (spec.md §5 "Shared resources" — the
//! script cache, plugin cache, and token signer are process-wide and
//! immutable after configuration load).

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;

use deployd_collections::CollectionService;
use deployd_core::EngineError;
use deployd_pipeline::Pipeline;
use deployd_plugin::PluginManager;
use deployd_script::ScriptCache;
use deployd_security::AuthAdjudicator;
use deployd_storage::backends::{MongoStore, PostgresStore, SqliteStore};
use deployd_storage::Store;

use crate::config::{AppConfig, DbType};
use crate::persisted::load_all_collections;
use crate::security_config::SecurityConfig;

/// Looked up by the dispatcher's first path segment.
pub type CollectionRegistry = DashMap<String, Arc<CollectionService>>;

pub struct AppState {
    pub collections: CollectionRegistry,
    pub adjudicator: Arc<AuthAdjudicator>,
    pub dev_mode: bool,
}

async fn build_store(config: &AppConfig, collection: &str) -> Result<Arc<dyn Store>, EngineError> {
    match config.db_type {
        DbType::EmbeddedSql => {
            let url = config
                .db_name
                .as_deref()
                .map(|name| format!("sqlite://{name}?mode=rwc"))
                .unwrap_or_else(|| "sqlite::memory:".to_string());
            let pool = sqlx::SqlitePool::connect(&url)
                .await
                .map_err(|e| EngineError::Store(e.to_string()))?;
            let store = SqliteStore::new(pool, collection);
            store.ensure_table().await?;
            Ok(Arc::new(store))
        }
        DbType::NetworkedSql => {
            let url = format!(
                "postgres://{}:{}@{}:{}/{}",
                config.db_user.as_deref().unwrap_or(""),
                config.db_pass.as_deref().unwrap_or(""),
                config.db_host.as_deref().unwrap_or("localhost"),
                config.db_port.unwrap_or(5432),
                config.db_name.as_deref().unwrap_or("deployd"),
            );
            let pool = sqlx::PgPool::connect(&url)
                .await
                .map_err(|e| EngineError::Store(e.to_string()))?;
            let store = PostgresStore::new(pool, collection);
            store.ensure_table().await?;
            Ok(Arc::new(store))
        }
        DbType::DocumentStore => {
            let host = config.db_host.as_deref().unwrap_or("localhost");
            let port = config.db_port.unwrap_or(27017);
            let url = format!("mongodb://{host}:{port}");
            let client = mongodb::Client::with_uri_str(&url)
                .await
                .map_err(|e| EngineError::Store(e.to_string()))?;
            let db = client.database(config.db_name.as_deref().unwrap_or("deployd"));
            Ok(Arc::new(MongoStore::new(db.collection(collection))))
        }
    }
}

impl AppState {
    pub async fn bootstrap(config: &AppConfig) -> Result<AppState, EngineError> {
        let resources_dir = Path::new(&config.resources_dir);
        let security_path = resources_dir.join("security.json");
        std::fs::create_dir_all(resources_dir).map_err(|e| EngineError::Internal(e.to_string()))?;

        let security = SecurityConfig::load_or_create(
            &security_path,
            config.master_key.clone(),
            config.jwt_expiration.as_secs() as i64,
            config.allow_registration,
        )
        .map_err(|e| EngineError::Internal(e.to_string()))?;

        let adjudicator = Arc::new(AuthAdjudicator::new(security.signer("deployd"), security.master_key.clone()));

        let script_cache = Arc::new(ScriptCache::new());
        let plugin_manager = Arc::new(PluginManager::new(
            resources_dir.join(".plugins"),
            std::env::current_dir()
                .unwrap_or_default()
                .join("crates")
                .join("deployd-plugin"),
        ));
        let pipeline = Arc::new(Pipeline::new(script_cache, plugin_manager));

        let collections = DashMap::new();
        for loaded in load_all_collections(resources_dir).map_err(|e| EngineError::Internal(e.to_string()))? {
            let name = loaded.config.name.clone();
            let store = build_store(config, &name).await?;
            let service = CollectionService::new(loaded.config, store, pipeline.clone(), loaded.hook_sources);
            collections.insert(name, Arc::new(service));
        }

        Ok(AppState {
            collections,
            adjudicator,
            dev_mode: config.dev,
        })
    }
}
