pub mod config;

pub use self::config::{MAX_TOKEN_EXPIRY_MINUTES, MIN_SECRET_LEN, load_config, parse_config};

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::types::server_config::AppConfig;

/// A cheaply-cloneable config handle.
///
/// All clones share the same underlying `RwLock<AppConfig>`. The signing
/// secret is not read through this handle after start-up; it lives in the
/// `TokenService` built from the initial config.
#[derive(Clone, Debug)]
pub struct LiveConfig(Arc<RwLock<AppConfig>>);

impl LiveConfig {
    pub fn new(config: AppConfig) -> Self {
        Self(Arc::new(RwLock::new(config)))
    }

    /// Acquire a read guard. Keep it short-lived; never hold across `.await`.
    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, AppConfig> {
        self.0.read().await
    }

    /// Swap in a new config. Existing clones see it on their next `.read()`.
    pub async fn reload(&self, new: AppConfig) {
        *self.0.write().await = new;
    }
}
