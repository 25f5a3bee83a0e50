use std::sync::Arc;
use tokio::sync::RwLock;

use crate::clients::storage::{ObjectStorage, S3Client};
use crate::config::Config;
use crate::db::Store;
use crate::security::abuse::AbuseFilter;
use crate::security::rate_limit::RateLimiter;
use crate::security::tokens::TokenIssuer;

/// Everything the request path needs, wired once at startup and handed to
/// each component explicitly. No process-wide singletons.
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub tokens: TokenIssuer,

    pub limiter: Arc<RateLimiter>,

    pub sentinel: Arc<AbuseFilter>,

    pub storage: Arc<dyn ObjectStorage>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let storage: Arc<dyn ObjectStorage> = Arc::new(S3Client::new(&config.storage)?);
        Self::with_storage(config, storage).await
    }

    /// Same wiring with a caller-supplied storage backend. Tests use this
    /// to substitute a double for the S3 client.
    pub async fn with_storage(
        config: Config,
        storage: Arc<dyn ObjectStorage>,
    ) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_url,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let tokens = TokenIssuer::new(&config.auth.jwt_secret, config.auth.token_ttl_seconds);
        let limiter = Arc::new(RateLimiter::new(config.security.rate_limits.clone()));
        let sentinel = Arc::new(AbuseFilter::new(config.security.abuse.clone()));

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            tokens,
            limiter,
            sentinel,
            storage,
        })
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }
}
