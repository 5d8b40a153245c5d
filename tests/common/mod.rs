#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;

use tutor_backend_rust::routes;
use tutor_backend_rust::services::mastery::MasteryService;
use tutor_backend_rust::services::selector::{ConceptCatalog, StaticCatalog};
use tutor_backend_rust::services::sessions::SessionService;
use tutor_backend_rust::state::AppState;
use tutor_backend_rust::store::{KvStore, MemoryStore};

pub fn memory_store() -> Arc<dyn KvStore> {
    Arc::new(MemoryStore::new())
}

pub fn mastery_service(store: &Arc<dyn KvStore>) -> MasteryService {
    MasteryService::new(Arc::clone(store))
}

pub fn session_service(store: &Arc<dyn KvStore>) -> SessionService {
    SessionService::new(Arc::clone(store))
}

pub fn create_test_app() -> Router {
    let store = memory_store();
    let catalog: Arc<dyn ConceptCatalog> = Arc::new(StaticCatalog::empty());
    routes::router(AppState::new(store, catalog))
}
