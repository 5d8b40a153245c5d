pub mod config;
pub mod logging;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

use std::sync::Arc;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::services::selector::{ConceptCatalog, StaticCatalog};
use crate::state::AppState;
use crate::store::{KvStore, MemoryStore, RedisStore};

/// Redis when `REDIS_URL` is set and reachable, otherwise the in-memory
/// store (dev and test runs).
pub async fn build_store(redis_url: Option<&str>) -> Arc<dyn KvStore> {
    if let Some(url) = redis_url {
        match RedisStore::connect(url).await {
            Ok(store) => return Arc::new(store),
            Err(err) => {
                tracing::warn!(error = %err, "redis unavailable, using in-memory store");
            }
        }
    }
    Arc::new(MemoryStore::new())
}

pub async fn create_app() -> axum::Router {
    let config = config::Config::from_env();
    let store = build_store(config.redis_url.as_deref()).await;
    let catalog: Arc<dyn ConceptCatalog> = Arc::new(StaticCatalog::empty());
    let state = AppState::new(store, catalog);

    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
