pub mod auth;
pub mod db;
pub mod error;
pub mod tracking;

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::SqlitePool;

use auth::TokenVerifier;
use tracking::Hub;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub hub: Arc<Hub>,
    pub verifier: TokenVerifier,
}
