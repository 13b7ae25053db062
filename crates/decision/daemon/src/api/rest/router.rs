//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

/// Create the API router. Middleware is applied by the server.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health_check))
        // Submission
        .route("/decisions", post(handlers::submit_decision))
        // Observers
        .route("/witness", get(handlers::get_witness))
        .route("/ledger", get(handlers::read_ledger))
        // Operator
        .route("/admin/halt", post(handlers::halt))
        .route("/admin/reset", post(handlers::reset))
        .route("/admin/checkpoint", post(handlers::create_checkpoint))
        .route("/admin/verify", post(handlers::verify_ledger))
        .route("/admin/transitions", get(handlers::list_transitions));

    Router::new().nest("/api/v1", api_routes).with_state(state)
}
