// Export error taxonomy
use super::dashboard::DashboardId;
use super::request::OutputFormat;
use std::fmt;
use thiserror::Error;

/// Coarse error class used by the HTTP layer to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidRequest,
    DataUnavailable,
    EmptyChartData,
    UnsupportedChartType,
    RenderFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::DataUnavailable => "data_unavailable",
            ErrorKind::EmptyChartData => "empty_chart_data",
            ErrorKind::UnsupportedChartType => "unsupported_chart_type",
            ErrorKind::RenderFailure => "render_failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    #[error("chart '{chart}' has no renderable rows ({dropped} rows dropped)")]
    EmptyChartData { chart: String, dropped: usize },

    #[error("unsupported chart type: {0}")]
    UnsupportedChartType(String),

    #[error("render failure: {0}")]
    RenderFailure(String),
}

impl ExportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExportError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ExportError::DataUnavailable(_) => ErrorKind::DataUnavailable,
            ExportError::EmptyChartData { .. } => ErrorKind::EmptyChartData,
            ExportError::UnsupportedChartType(_) => ErrorKind::UnsupportedChartType,
            ExportError::RenderFailure(_) => ErrorKind::RenderFailure,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ExportError::InvalidRequest(message.into())
    }

    pub fn render(message: impl fmt::Display) -> Self {
        ExportError::RenderFailure(message.to_string())
    }
}

/// An export error annotated with the request it belongs to.
#[derive(Debug, Error)]
#[error("export of '{dashboard}' as {format} failed: {source}")]
pub struct ExportFailure {
    pub dashboard: String,
    pub format: OutputFormat,
    #[source]
    pub source: ExportError,
}

impl ExportFailure {
    pub fn new(dashboard: impl Into<String>, format: OutputFormat, source: ExportError) -> Self {
        Self {
            dashboard: dashboard.into(),
            format,
            source,
        }
    }

    pub fn for_dashboard(dashboard: DashboardId, format: OutputFormat, source: ExportError) -> Self {
        Self::new(dashboard.as_str(), format, source)
    }

    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_preserves_kind() {
        let failure = ExportFailure::for_dashboard(
            DashboardId::Risks,
            OutputFormat::Pdf,
            ExportError::DataUnavailable("timeout".to_string()),
        );
        assert_eq!(failure.kind(), ErrorKind::DataUnavailable);
        assert!(failure.to_string().contains("risks"));
        assert!(failure.to_string().contains("timeout"));
    }
}
