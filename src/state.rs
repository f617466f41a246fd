use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::config::AppConfig;

pub struct AppState {
    pub limiter: Arc<Semaphore>,
    pub config: Arc<AppConfig>,
}
