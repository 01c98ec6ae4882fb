pub mod defaults;
pub mod gear;
pub mod schedule;
pub mod sessions;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(sessions::routes())
        .merge(gear::routes())
        .merge(defaults::routes())
        .merge(schedule::routes())
}
