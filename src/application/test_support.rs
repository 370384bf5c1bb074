// In-memory repository, catalog and service wiring used by tests
use crate::application::chart_registry::ChartRegistry;
use crate::application::data_fetcher::DataFetcher;
use crate::application::export_service::{ExportOptions, ExportService};
use crate::application::report_repository::ReportRepository;
use crate::domain::chart::ChartDefinition;
use crate::domain::dashboard::{CardDefinition, CardFilter, ColumnSpec, DashboardCatalog, DashboardDefinition, DashboardId};
use crate::domain::error::ExportError;
use crate::domain::request::{DateRange, HeaderDefaults};
use crate::domain::table::ResultTable;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use crate::infrastructure::chart_renderer::PlottersChartRenderer;
use crate::infrastructure::pdf::{PdfComposer, PdfSettings};
use crate::infrastructure::xlsx::XlsxComposer;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
pub struct StubRepository {
    records: Vec<Value>,
    query_rows: Vec<Value>,
    failure: Option<String>,
    record_calls: AtomicUsize,
    query_calls: AtomicUsize,
    last_query: Mutex<Option<String>>,
}

impl StubRepository {
    pub fn with_records(records: Vec<Value>) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    pub fn with_query_rows(query_rows: Vec<Value>) -> Self {
        Self {
            query_rows,
            ..Default::default()
        }
    }

    pub fn with_data(records: Vec<Value>, query_rows: Vec<Value>) -> Self {
        Self {
            records,
            query_rows,
            ..Default::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn record_calls(&self) -> usize {
        self.record_calls.load(Ordering::SeqCst)
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.record_calls() + self.query_calls()
    }

    pub fn last_query(&self) -> Option<String> {
        self.last_query.lock().clone()
    }
}

#[async_trait]
impl ReportRepository for StubRepository {
    async fn dashboard_records(
        &self,
        _dashboard: &DashboardDefinition,
        _range: &DateRange,
    ) -> Result<ResultTable, ExportError> {
        self.record_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            return Err(ExportError::DataUnavailable(message.clone()));
        }
        ResultTable::from_json_objects(&self.records)
            .ok_or_else(|| ExportError::DataUnavailable("records are not objects".to_string()))
    }

    async fn run_query(&self, query: &str) -> Result<ResultTable, ExportError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock() = Some(query.to_string());
        if let Some(message) = &self.failure {
            return Err(ExportError::DataUnavailable(message.clone()));
        }
        ResultTable::from_json_objects(&self.query_rows)
            .ok_or_else(|| ExportError::DataUnavailable("rows are not objects".to_string()))
    }
}

/// Risks dashboard with a `highRisk` card (alias `high`, score >= 5) and a
/// `lowRisk` card (alias `low`, score <= 2).
pub fn risks_catalog(charts: Vec<String>) -> DashboardCatalog {
    DashboardCatalog::new(vec![DashboardDefinition {
        id: DashboardId::Risks,
        title: "Risks Dashboard Report".to_string(),
        subtitle: Some("Risk Management & Assessment Monitoring".to_string()),
        records_key: Some("allRisks".to_string()),
        date_field: "created_at".to_string(),
        columns: vec![
            ColumnSpec {
                key: "code".to_string(),
                label: "Code".to_string(),
            },
            ColumnSpec {
                key: "inherent_value".to_string(),
                label: "Inherent Score".to_string(),
            },
        ],
        cards: vec![CardDefinition {
            id: "highRisk".to_string(),
            title: "High Risk".to_string(),
            aliases: vec!["high".to_string()],
            filter: Some(CardFilter {
                fields: vec!["inherent_value".to_string()],
                contains: vec![],
                min: Some(5.0),
                max: None,
            }),
            charts: charts.clone(),
        },
        CardDefinition {
            id: "lowRisk".to_string(),
            title: "Low Risk".to_string(),
            aliases: vec!["low".to_string()],
            filter: Some(CardFilter {
                fields: vec!["inherent_value".to_string()],
                contains: vec![],
                min: None,
                max: Some(2.0),
            }),
            charts: vec![],
        }],
        charts,
    }])
}

/// Export service over the risks catalog, with every chart in `charts`
/// registered and attached to the dashboard and its card.
pub fn export_service(repository: Arc<StubRepository>, charts: Vec<ChartDefinition>) -> ExportService {
    let chart_ids = charts.iter().map(|c| c.id.clone()).collect();
    let catalog = Arc::new(risks_catalog(chart_ids));
    let registry = Arc::new(ChartRegistry::new(charts).unwrap());
    ExportService::new(
        DataFetcher::new(repository, catalog.clone()),
        catalog,
        registry,
        Arc::new(PlottersChartRenderer::new()),
        vec![
            Arc::new(PdfComposer::new(PdfSettings::default())),
            Arc::new(XlsxComposer::new(1000)),
        ],
        ExportOptions {
            chart_dpi: 40,
            chart_figsize: (4.0, 3.0),
            header_defaults: HeaderDefaults::default(),
        },
    )
}
