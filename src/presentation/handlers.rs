// HTTP request handlers
use crate::application::chart_registry::RegistryError;
use crate::application::export_history::{HistoryQuery, NewExport};
use crate::domain::chart::ChartDefinition;
use crate::domain::error::{ErrorKind, ExportError, ExportFailure};
use crate::domain::request::{ExportParams, OutputFormat};
use crate::infrastructure::http_response::{accepts_brotli, document_response};
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidRequest | ErrorKind::UnsupportedChartType => StatusCode::BAD_REQUEST,
        ErrorKind::EmptyChartData => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::DataUnavailable => StatusCode::BAD_GATEWAY,
        ErrorKind::RenderFailure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// JSON error body: `{ "error": kind, "message": text }`.
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    message: String,
}

impl ApiError {
    fn not_found(message: String) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: "not_found",
            message,
        }
    }
}

impl From<ExportFailure> for ApiError {
    fn from(failure: ExportFailure) -> Self {
        let kind = failure.kind();
        Self {
            status: status_for(kind),
            error: kind.as_str(),
            message: failure.source.to_string(),
        }
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        let kind = err.kind();
        Self {
            status: status_for(kind),
            error: kind.as_str(),
            message: err.to_string(),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Invalid(e) => e.into(),
            other => {
                tracing::error!(error = %other, "chart registry write failed");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    error: "registry_failure",
                    message: other.to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.error, "message": self.message }));
        (self.status, body).into_response()
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

async fn export(
    state: &AppState,
    dashboard: &str,
    format: OutputFormat,
    params: &ExportParams,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    let document = state.export_service.export_params(dashboard, format, params).await?;
    let response = document_response(document, accepts_brotli(headers), state.chunk_size).await;
    Ok(response.unwrap_or_else(|status| status.into_response()))
}

/// Export a dashboard as PDF
pub async fn export_pdf(
    Path(dashboard): Path<String>,
    Query(params): Query<ExportParams>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    export(&state, &dashboard, OutputFormat::Pdf, &params, &headers).await
}

/// Export a dashboard as an Excel workbook
pub async fn export_excel(
    Path(dashboard): Path<String>,
    Query(params): Query<ExportParams>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    export(&state, &dashboard, OutputFormat::Excel, &params, &headers).await
}

pub async fn list_charts(State(state): State<Arc<AppState>>) -> Response {
    let charts = state.export_service.registry().list();
    Json(charts.iter().map(|c| c.as_ref()).collect::<Vec<&ChartDefinition>>()).into_response()
}

pub async fn get_chart(Path(id): Path<String>, State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    match state.export_service.registry().get(&id) {
        Some(chart) => Ok(Json(chart.as_ref()).into_response()),
        None => Err(ApiError::not_found(format!("chart '{}' is not registered", id))),
    }
}

/// Register or replace a chart definition. `201` for a new id, `200` for a replacement.
pub async fn register_chart(
    State(state): State<Arc<AppState>>,
    Json(definition): Json<ChartDefinition>,
) -> Result<Response, ApiError> {
    let registry = state.export_service.registry();
    let id = definition.id.clone();
    let previous = registry.register(definition).await?;
    let status = if previous.is_some() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    tracing::info!(chart = %id, replaced = previous.is_some(), "registered chart");
    match registry.get(&id) {
        Some(chart) => Ok((status, Json(chart.as_ref())).into_response()),
        None => Ok(status.into_response()),
    }
}

pub async fn delete_chart(Path(id): Path<String>, State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    match state.export_service.registry().remove(&id).await? {
        Some(_) => {
            tracing::info!(chart = %id, "removed chart");
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(ApiError::not_found(format!("chart '{}' is not registered", id))),
    }
}

/// Record a report download for the recent-exports listing.
pub async fn log_export(
    State(state): State<Arc<AppState>>,
    Json(entry): Json<NewExport>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let record = state.history.record(entry)?;
    tracing::debug!(stored = state.history.stored(), "export history updated");
    Ok(Json(json!({ "success": true, "id": record.id })))
}

pub async fn recent_exports(
    Query(query): Query<HistoryQuery>,
    State(state): State<Arc<AppState>>,
) -> Json<serde_json::Value> {
    let page = state.history.recent(&query);
    Json(json!({
        "success": true,
        "exports": page.exports,
        "pagination": page.pagination,
    }))
}

pub async fn delete_export(
    Path(id): Path<u64>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match state.history.remove(id) {
        Some(_) => {
            tracing::info!(id, "removed export record");
            Ok(Json(json!({ "success": true })))
        }
        None => Err(ApiError::not_found(format!("export {} is not recorded", id))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_map_to_statuses() {
        assert_eq!(status_for(ErrorKind::InvalidRequest), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::UnsupportedChartType), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::EmptyChartData), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(ErrorKind::DataUnavailable), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(ErrorKind::RenderFailure), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
