pub mod config;
pub mod controllers;
pub mod database;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub db: database::Database,
    pub config: config::Config,
}

impl AppState {
    pub async fn new(config: config::Config) -> Result<Arc<Self>, Box<dyn std::error::Error>> {
        let db = database::Database::new(&config.database.url, config.database.pool_size).await?;

        db.run_migrations().await?;

        Ok(Arc::new(Self { db, config }))
    }
}
