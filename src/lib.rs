pub mod access;
pub mod audit;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod documents;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod models;
pub mod routes;
pub mod schema;
pub mod seed;
pub mod validation;

use auth::TokenSigner;
use config::Config;

pub use db::DbPool;

/// Read-only state shared by every worker.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub tokens: TokenSigner,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let tokens = TokenSigner::new(&config.jwt_secret, config.jwt_ttl_hours);
        Self { config, tokens }
    }
}
