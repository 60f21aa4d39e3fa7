use std::sync::Arc;

use config::Config;
use redis::Client as RedisClient;
use sqlx::PgPool;

use error::{AppError, AppResult};
use storage::ObjectStorage;

pub mod config;
pub mod error;
pub mod membership;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod stats;
pub mod storage;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub redis: Arc<RedisClient>,
    pub storage: Option<ObjectStorage>,
}

impl AppState {
    pub fn storage(&self) -> AppResult<&ObjectStorage> {
        self.storage
            .as_ref()
            .ok_or_else(|| AppError::Internal("object storage is not configured".into()))
    }
}
