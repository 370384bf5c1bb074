// Application state for HTTP handlers
use crate::application::export_history::ExportHistory;
use crate::application::export_service::ExportService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub export_service: ExportService,
    pub history: Arc<ExportHistory>,
    /// Response bodies above this many bytes are streamed in chunks.
    pub chunk_size: usize,
}
