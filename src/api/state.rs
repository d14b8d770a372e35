use std::sync::Arc;

use crate::config::Config;
use crate::ledger::FjallStore;
use crate::observability::Metrics;
use crate::queue::TaskBroker;
use crate::storage::StorageClient;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<FjallStore>,
    pub storage: Arc<StorageClient>,
    pub broker: Arc<TaskBroker>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<FjallStore>,
        storage: StorageClient,
        broker: Arc<TaskBroker>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            storage: Arc::new(storage),
            broker,
            metrics,
        }
    }
}
