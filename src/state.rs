use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::db::LearningStore;
use crate::services::notifier::GuardianNotifier;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    config: Arc<Config>,
    store: Arc<dyn LearningStore>,
    notifier: Arc<dyn GuardianNotifier>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn LearningStore>,
        notifier: Arc<dyn GuardianNotifier>,
    ) -> Self {
        Self {
            started_at: Instant::now(),
            config: Arc::new(config),
            store,
            notifier,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn LearningStore> {
        Arc::clone(&self.store)
    }

    pub fn notifier(&self) -> Arc<dyn GuardianNotifier> {
        Arc::clone(&self.notifier)
    }
}
