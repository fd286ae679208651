use crate::config::AppConfig;
use crate::services::session::SessionRegistry;

pub struct AppState {
    pub config: AppConfig,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            sessions: SessionRegistry::new(),
        }
    }
}
