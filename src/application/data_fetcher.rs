// Data fetcher - Dashboard records, card slices and chart queries
use crate::application::report_repository::ReportRepository;
use crate::domain::chart::ChartDefinition;
use crate::domain::dashboard::{DashboardCatalog, DashboardDefinition, DashboardId};
use crate::domain::error::ExportError;
use crate::domain::request::DateRange;
use crate::domain::table::{ResultTable, Row, Scalar};
use crate::infrastructure::config::prepare_query;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryMetric {
    pub label: String,
    pub count: usize,
}

/// Aggregate records of one dashboard plus per-card counts.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardData {
    pub records: ResultTable,
    pub summary: Vec<SummaryMetric>,
}

impl DashboardData {
    pub fn summary_table(&self) -> ResultTable {
        let rows = self
            .summary
            .iter()
            .map(|metric| {
                let mut row = Row::with_capacity(2);
                row.insert("metric".to_string(), Scalar::Text(metric.label.clone()));
                row.insert("count".to_string(), Scalar::Number(metric.count as f64));
                row
            })
            .collect();
        ResultTable::new(vec!["metric".to_string(), "count".to_string()], rows)
    }
}

#[derive(Clone)]
pub struct DataFetcher {
    repository: Arc<dyn ReportRepository>,
    catalog: Arc<DashboardCatalog>,
}

impl DataFetcher {
    pub fn new(repository: Arc<dyn ReportRepository>, catalog: Arc<DashboardCatalog>) -> Self {
        Self { repository, catalog }
    }

    fn definition(&self, dashboard: DashboardId) -> Result<&DashboardDefinition, ExportError> {
        self.catalog
            .get(dashboard)
            .ok_or_else(|| ExportError::invalid(format!("dashboard '{}' is not configured", dashboard)))
    }

    /// Records of a dashboard, optionally restricted to one card.
    pub async fn fetch(
        &self,
        dashboard: DashboardId,
        card: Option<&str>,
        range: &DateRange,
    ) -> Result<ResultTable, ExportError> {
        let definition = self.definition(dashboard)?;
        let card = match card {
            Some(name) => Some(definition.card(name).ok_or_else(|| {
                ExportError::invalid(format!("unknown card '{}' for dashboard '{}'", name, dashboard))
            })?),
            None => None,
        };

        let records = self.repository.dashboard_records(definition, range).await?;
        Ok(match card {
            Some(card) => records.filtered(|row| card.includes(row)),
            None => records,
        })
    }

    /// Aggregate records plus the total and per-card counts, fetched once.
    pub async fn fetch_dashboard(&self, dashboard: DashboardId, range: &DateRange) -> Result<DashboardData, ExportError> {
        let definition = self.definition(dashboard)?;
        let records = self.repository.dashboard_records(definition, range).await?;
        if records.is_empty() {
            tracing::info!(dashboard = %dashboard, period = %range.label(), "no records in the requested period");
        }

        let mut summary = Vec::with_capacity(definition.cards.len() + 1);
        summary.push(SummaryMetric {
            label: format!("Total {}", dashboard.display_name()),
            count: records.len(),
        });
        for card in &definition.cards {
            summary.push(SummaryMetric {
                label: card.title.clone(),
                count: records.rows.iter().filter(|row| card.includes(row)).count(),
            });
        }

        tracing::debug!(
            dashboard = %dashboard,
            rows = records.len(),
            cards = definition.cards.len(),
            "fetched dashboard records"
        );
        Ok(DashboardData { records, summary })
    }

    /// Run a chart's query template for the given range and alias its
    /// configured fields to `name`/`value`.
    pub async fn fetch_chart(
        &self,
        chart: &ChartDefinition,
        dashboard: &DashboardDefinition,
        range: &DateRange,
    ) -> Result<ResultTable, ExportError> {
        let mut vars = HashMap::new();
        vars.insert("dateFilter".to_string(), range.sql_filter(&dashboard.date_field));
        vars.insert(
            "startDate".to_string(),
            range.start.map(|d| d.to_string()).unwrap_or_default(),
        );
        vars.insert(
            "endDate".to_string(),
            range.end.map(|d| d.to_string()).unwrap_or_default(),
        );
        vars.insert("dashboard".to_string(), dashboard.id.to_string());

        let query = prepare_query(&chart.query, &vars);
        tracing::debug!(chart = %chart.id, query = %query, "executing chart query");

        let table = self.repository.run_query(&query).await?;
        Ok(table.aliased(&chart.x_field, &chart.y_field))
    }
}

/// A card's slice of already-fetched aggregate records.
pub fn card_slice(definition: &DashboardDefinition, card_id: &str, records: &ResultTable) -> Option<ResultTable> {
    definition
        .card(card_id)
        .map(|card| records.filtered(|row| card.includes(row)))
}
