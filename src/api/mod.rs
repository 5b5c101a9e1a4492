/// API routes and handlers
pub mod health;
pub mod metrics;
pub mod waitlist;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(metrics::routes())
        .merge(waitlist::routes())
}
