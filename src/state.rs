// src/state.rs
use std::sync::Arc;
use sqlx::PgPool;

use crate::config::AppConfig;
use crate::pos::register::Register;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub register: Register,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(db_pool: PgPool, config: AppConfig) -> Self {
        Self {
            db_pool,
            register: Register::new(),
            config: Arc::new(config),
        }
    }
}
