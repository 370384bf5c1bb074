// Repository trait for GRC report data access
use crate::domain::dashboard::DashboardDefinition;
use crate::domain::error::ExportError;
use crate::domain::request::DateRange;
use crate::domain::table::ResultTable;
use async_trait::async_trait;

#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Fetch the full record set of a dashboard, filtered by date range.
    /// Failures surface as `DataUnavailable`; partial tables are never returned.
    async fn dashboard_records(
        &self,
        dashboard: &DashboardDefinition,
        range: &DateRange,
    ) -> Result<ResultTable, ExportError>;

    /// Execute an already-expanded query through the upstream query gateway.
    async fn run_query(&self, query: &str) -> Result<ResultTable, ExportError>;
}
