use std::sync::Arc;
use std::time::Instant;

use crate::services::mastery::MasteryService;
use crate::services::selector::{AdaptiveSelector, ConceptCatalog};
use crate::services::sessions::SessionService;
use crate::store::KvStore;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    mastery: Arc<MasteryService>,
    sessions: Arc<SessionService>,
    selector: Arc<AdaptiveSelector>,
}

impl AppState {
    pub fn new(store: Arc<dyn KvStore>, catalog: Arc<dyn ConceptCatalog>) -> Self {
        let mastery = Arc::new(MasteryService::new(Arc::clone(&store)));
        let sessions = Arc::new(SessionService::new(Arc::clone(&store)));
        let selector = Arc::new(AdaptiveSelector::new(Arc::clone(&mastery), catalog));

        Self {
            started_at: Instant::now(),
            mastery,
            sessions,
            selector,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn mastery(&self) -> Arc<MasteryService> {
        Arc::clone(&self.mastery)
    }

    pub fn sessions(&self) -> Arc<SessionService> {
        Arc::clone(&self.sessions)
    }

    pub fn selector(&self) -> Arc<AdaptiveSelector> {
        Arc::clone(&self.selector)
    }
}
