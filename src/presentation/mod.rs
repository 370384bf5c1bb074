// Presentation layer - HTTP routes and handlers
pub mod app_state;
pub mod handlers;

use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    delete_chart, delete_export, export_excel, export_pdf, get_chart, health_check, list_charts, log_export,
    recent_exports, register_chart,
};
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

// Compression is applied per document in the response builder, so no
// CompressionLayer here.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/api/grc/:dashboard/export-pdf", get(export_pdf))
        .route("/api/grc/:dashboard/export-excel", get(export_excel))
        .route("/api/charts", get(list_charts).post(register_chart))
        .route("/api/charts/:id", get(get_chart).delete(delete_chart))
        .route("/api/exports/log", post(log_export))
        .route("/api/exports/recent", get(recent_exports))
        .route("/api/exports/:id", delete(delete_export))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
