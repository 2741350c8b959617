use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::{
    config::Config,
    services::store::{PgSubmissionStore, SubmissionStore},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    /// Storage handle used by the submission scorer.
    pub store: Arc<dyn SubmissionStore>,
}

impl AppState {
    /// Builds the production state, backing the scorer with the same pool.
    pub fn new(pool: PgPool, config: Config) -> Self {
        let store = Arc::new(PgSubmissionStore::new(pool.clone()));
        Self {
            pool,
            config,
            store,
        }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<dyn SubmissionStore> {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}
