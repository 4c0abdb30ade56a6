use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::TokenService;
use crate::config::AppConfig;
use crate::services::{DatasetRepository, IdentityRegistry, ModerationEngine};
use crate::storage::FileStore;

/// Everything a handler needs, built once at startup and cloned per request
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pool: PgPool,
    pub tokens: TokenService,
    pub identities: IdentityRegistry,
    pub datasets: DatasetRepository,
    pub moderation: ModerationEngine,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        pool: PgPool,
        dataset_files: Arc<dyn FileStore>,
        pictures: Arc<dyn FileStore>,
    ) -> Self {
        let tokens = TokenService::from_config(&config.security);
        let identities = IdentityRegistry::new(
            pool.clone(),
            tokens.clone(),
            pictures,
            config.storage.max_picture_bytes,
        );
        let datasets = DatasetRepository::new(pool.clone(), dataset_files);
        let moderation = ModerationEngine::new(pool.clone());

        Self {
            config: Arc::new(config),
            pool,
            tokens,
            identities,
            datasets,
            moderation,
        }
    }
}
