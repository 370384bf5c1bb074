// Export service - Validates requests, plans sections and drives composition
use crate::application::chart_registry::{ChartRegistry, RegistrySnapshot};
use crate::application::data_fetcher::{card_slice, DataFetcher};
use crate::application::export_history::{ExportHistory, NewExport};
use crate::application::rendering::{ChartOptions, ChartRenderer, DocumentComposer};
use crate::domain::chart::ChartDefinition;
use crate::domain::dashboard::{CardDefinition, ColumnSpec, DashboardCatalog, DashboardDefinition, DashboardId};
use crate::domain::document::{ChartBlock, ComposedDocument, HeaderBlock, Section, TableBlock, TableColumn, TextBlock};
use crate::domain::error::{ExportError, ExportFailure};
use crate::domain::request::{DashboardRequest, ExportParams, HeaderDefaults, OutputFormat};
use crate::domain::table::{ResultTable, Scalar};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub chart_dpi: u32,
    pub chart_figsize: (f32, f32),
    pub header_defaults: HeaderDefaults,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            chart_dpi: 150,
            chart_figsize: (8.0, 4.0),
            header_defaults: HeaderDefaults::default(),
        }
    }
}

/// A chart to render and the title of the table it belongs to, if that
/// table is part of the output.
struct PlannedChart {
    definition: Arc<ChartDefinition>,
    anchor: Option<String>,
}

/// What a request turns into before anything is fetched.
struct SectionPlan<'a> {
    definition: &'a DashboardDefinition,
    /// Set in `onlyCard` mode: everything is restricted to this card.
    card: Option<&'a CardDefinition>,
    /// Cards whose detail tables appear in a full report.
    detail_cards: Vec<&'a CardDefinition>,
    tables: bool,
    charts: Vec<PlannedChart>,
}

#[derive(Clone)]
pub struct ExportService {
    fetcher: DataFetcher,
    catalog: Arc<DashboardCatalog>,
    registry: Arc<ChartRegistry>,
    renderer: Arc<dyn ChartRenderer>,
    composers: Vec<Arc<dyn DocumentComposer>>,
    options: ExportOptions,
    history: Option<Arc<ExportHistory>>,
}

impl ExportService {
    pub fn new(
        fetcher: DataFetcher,
        catalog: Arc<DashboardCatalog>,
        registry: Arc<ChartRegistry>,
        renderer: Arc<dyn ChartRenderer>,
        composers: Vec<Arc<dyn DocumentComposer>>,
        options: ExportOptions,
    ) -> Self {
        Self {
            fetcher,
            catalog,
            registry,
            renderer,
            composers,
            options,
            history: None,
        }
    }

    /// Record every successful export in `history`.
    pub fn with_history(mut self, history: Arc<ExportHistory>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn registry(&self) -> &Arc<ChartRegistry> {
        &self.registry
    }

    /// Parse raw parameters and export. Validation failures are returned
    /// before the data source is touched.
    pub async fn export_params(
        &self,
        dashboard: &str,
        format: OutputFormat,
        params: &ExportParams,
    ) -> Result<ComposedDocument, ExportFailure> {
        let request = DashboardRequest::parse(dashboard, format, params, &self.catalog, &self.options.header_defaults)
            .map_err(|e| {
                tracing::warn!(dashboard, %format, error = %e, "rejected export request");
                ExportFailure::new(dashboard, format, e)
            })?;
        self.export(&request).await
    }

    pub async fn export(&self, request: &DashboardRequest) -> Result<ComposedDocument, ExportFailure> {
        let started = Instant::now();
        match self.export_document(request).await {
            Ok(document) => {
                tracing::info!(
                    dashboard = %request.dashboard,
                    format = %request.format,
                    card = request.card.as_deref().unwrap_or("-"),
                    bytes = document.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "export complete"
                );
                self.record(request, &document);
                Ok(document)
            }
            Err(e) => {
                tracing::warn!(
                    dashboard = %request.dashboard,
                    format = %request.format,
                    kind = %e.kind(),
                    error = %e,
                    "export failed"
                );
                Err(ExportFailure::for_dashboard(request.dashboard, request.format, e))
            }
        }
    }

    /// History is best effort: a record that cannot be stored never fails
    /// the export.
    fn record(&self, request: &DashboardRequest, document: &ComposedDocument) {
        let Some(history) = &self.history else {
            return;
        };
        let entry = NewExport {
            title: Some(request.header.title.clone()),
            src: Some(document.filename.clone()),
            format: Some(request.format.to_string()),
            dashboard: Some(request.dashboard.to_string()),
        };
        if let Err(e) = history.record(entry) {
            tracing::warn!(dashboard = %request.dashboard, error = %e, "export not added to history");
        }
    }

    async fn export_document(&self, request: &DashboardRequest) -> Result<ComposedDocument, ExportError> {
        let composer = self
            .composers
            .iter()
            .find(|c| c.format() == request.format)
            .ok_or_else(|| ExportError::render(format!("no composer registered for {}", request.format)))?;

        let sections = self.sections(request).await?;
        let document = composer.compose(&sections, &request.header)?;
        if document.bytes.is_empty() {
            return Err(ExportError::render("composer produced an empty document"));
        }
        Ok(document.with_filename(export_filename(request, Utc::now().date_naive())))
    }

    fn plan<'a>(&'a self, request: &DashboardRequest, snapshot: &RegistrySnapshot) -> Result<SectionPlan<'a>, ExportError> {
        let definition = self
            .catalog
            .get(request.dashboard)
            .ok_or_else(|| ExportError::invalid(format!("dashboard '{}' is not configured", request.dashboard)))?;

        let selected = match request.card.as_deref() {
            Some(name) => Some(definition.card(name).ok_or_else(|| {
                ExportError::invalid(format!("unknown card '{}' for dashboard '{}'", name, request.dashboard))
            })?),
            None => None,
        };
        if request.mode.only_card && selected.is_none() {
            return Err(ExportError::invalid("onlyCard requires cardType"));
        }
        let card = selected.filter(|_| request.mode.only_card);
        let detail_cards: Vec<&CardDefinition> = match selected {
            Some(card) => vec![card],
            None => definition.cards.iter().collect(),
        };

        let tables = !request.mode.only_chart;
        let anchored = |title: &str| tables.then(|| title.to_string());
        let mut wanted: Vec<(&String, Option<String>)> = Vec::new();
        if !request.mode.only_overall_table {
            match card {
                Some(card) => wanted.extend(card.charts.iter().map(|id| (id, anchored(&card.title)))),
                None => {
                    let all = all_records_title(request.dashboard);
                    wanted.extend(definition.charts.iter().map(|id| (id, anchored(&all))));
                    for detail in &detail_cards {
                        wanted.extend(detail.charts.iter().map(|id| (id, anchored(&detail.title))));
                    }
                }
            }
        }

        let mut charts: Vec<PlannedChart> = Vec::with_capacity(wanted.len());
        for (id, anchor) in wanted {
            if charts.iter().any(|c| &c.definition.id == id) {
                continue;
            }
            match snapshot.get(id.as_str()) {
                Some(chart) => charts.push(PlannedChart {
                    definition: chart.clone(),
                    anchor,
                }),
                None => tracing::warn!(dashboard = %request.dashboard, chart = %id, "chart is not registered, skipping"),
            }
        }

        if request.mode.only_chart && charts.is_empty() {
            return Err(ExportError::invalid(format!(
                "no registered charts for dashboard '{}'",
                request.dashboard
            )));
        }

        Ok(SectionPlan {
            definition,
            card,
            detail_cards,
            tables,
            charts,
        })
    }

    /// Ordered sections for a request: header, tables, then charts.
    pub async fn sections(&self, request: &DashboardRequest) -> Result<Vec<Section>, ExportError> {
        let snapshot = self.registry.snapshot();
        let plan = self.plan(request, &snapshot)?;
        let definition = plan.definition;
        let mut sections = Vec::new();

        if request.header.include_header {
            let title = match plan.card {
                Some(card) => format!("{} - {}", request.header.title, card.title),
                None => request.header.title.clone(),
            };
            sections.push(Section::Header(HeaderBlock {
                title,
                subtitle: request.header.subtitle.clone(),
                info_lines: request.header.info_lines.clone(),
                period: request.range.label(),
                logo_png: request.header.logo_png.clone(),
            }));
        }

        if plan.tables {
            let data = self.fetcher.fetch_dashboard(request.dashboard, &request.range).await?;
            if let Some(card) = plan.card {
                let slice = data.records.filtered(|row| card.includes(row));
                sections.push(Section::Table(table_block(&card.title, &slice, &definition.columns)));
            } else if request.mode.only_overall_table {
                sections.push(Section::Table(table_block(
                    &all_records_title(request.dashboard),
                    &data.records,
                    &definition.columns,
                )));
            } else {
                sections.push(Section::Table(table_block("Summary", &data.summary_table(), &summary_columns())));
                sections.push(Section::Table(table_block(
                    &all_records_title(request.dashboard),
                    &data.records,
                    &definition.columns,
                )));
                for card in &plan.detail_cards {
                    if let Some(slice) = card_slice(definition, &card.id, &data.records) {
                        sections.push(Section::Table(table_block(&card.title, &slice, &definition.columns)));
                    }
                }
            }
        }

        let has_tables = sections.iter().any(|s| matches!(s, Section::Table(_)));
        let chart_tables = futures::future::try_join_all(
            plan.charts
                .iter()
                .map(|planned| self.fetcher.fetch_chart(&planned.definition, definition, &request.range)),
        )
        .await?;

        for (planned, table) in plan.charts.iter().zip(chart_tables) {
            let chart = &planned.definition;
            let chart_type = request.chart_type.unwrap_or(chart.chart_type);
            let options = ChartOptions {
                dpi: self.options.chart_dpi,
                figsize: self.options.chart_figsize,
                title: Some(chart.name.clone()),
                locale: request.header.locale,
            };
            match self.renderer.render(chart_type, &table, &options) {
                Ok(rendered) => sections.push(Section::Chart(ChartBlock {
                    title: chart.name.clone(),
                    chart: rendered,
                    anchor: planned.anchor.clone(),
                })),
                Err(ExportError::EmptyChartData { dropped, .. }) if has_tables => {
                    tracing::warn!(chart = %chart.id, dropped, "chart has no renderable rows, replaced by notice");
                    sections.push(Section::Text(TextBlock {
                        text: format!("{}: No data available", chart.name),
                        anchor: planned.anchor.clone(),
                    }));
                }
                Err(ExportError::EmptyChartData { dropped, .. }) => {
                    return Err(ExportError::EmptyChartData {
                        chart: chart.id.clone(),
                        dropped,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Ok(sections)
    }
}

fn all_records_title(dashboard: DashboardId) -> String {
    format!("All {}", dashboard.display_name())
}

fn summary_columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec {
            key: "metric".to_string(),
            label: "Metric".to_string(),
        },
        ColumnSpec {
            key: "count".to_string(),
            label: "Count".to_string(),
        },
    ]
}

/// `created_at` -> `Created At`
fn humanize(key: &str) -> String {
    key.split(['_', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn table_block(title: &str, table: &ResultTable, columns: &[ColumnSpec]) -> TableBlock {
    let columns: Vec<TableColumn> = if columns.is_empty() {
        table
            .columns
            .iter()
            .map(|key| TableColumn {
                key: key.clone(),
                label: humanize(key),
                kind: table.column_kind(key),
            })
            .collect()
    } else {
        columns
            .iter()
            .map(|spec| TableColumn {
                key: spec.key.clone(),
                label: spec.label.clone(),
                kind: table.column_kind(&spec.key),
            })
            .collect()
    };

    let rows = table
        .rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| row.get(&c.key).cloned().unwrap_or(Scalar::Null))
                .collect()
        })
        .collect();

    TableBlock {
        title: title.to_string(),
        columns,
        rows,
    }
}

/// `{dashboard}_{card|report}_{YYYYMMDD}.{ext}`
pub fn export_filename(request: &DashboardRequest, date: NaiveDate) -> String {
    let scope = request.card.as_deref().unwrap_or("report");
    format!(
        "{}_{}_{}.{}",
        request.dashboard,
        scope,
        date.format("%Y%m%d"),
        request.format.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{export_service as service, risks_catalog, StubRepository};
    use crate::domain::chart::ChartType;
    use crate::domain::error::ErrorKind;
    use serde_json::{json, Value};

    fn status_chart() -> ChartDefinition {
        ChartDefinition::new(
            "by_status",
            "Risks by Status",
            ChartType::Bar,
            "SELECT status AS name, COUNT(*) AS value FROM dbo.Risks WHERE 1=1${dateFilter} GROUP BY status",
        )
    }

    fn records() -> Vec<Value> {
        vec![
            json!({"code": "R-1", "inherent_value": 5, "created_at": "2024-01-10"}),
            json!({"code": "R-2", "inherent_value": 2, "created_at": "2024-01-12"}),
        ]
    }

    fn params(pairs: &[(&str, &str)]) -> ExportParams {
        let mut params = ExportParams::default();
        for (key, value) in pairs {
            let value = Some(value.to_string());
            match *key {
                "startDate" => params.start_date = value,
                "endDate" => params.end_date = value,
                "cardType" => params.card_type = value,
                "onlyCard" => params.only_card = value,
                "onlyChart" => params.only_chart = value,
                "onlyOverallTable" => params.only_overall_table = value,
                "chartType" => params.chart_type = value,
                "headerConfig" => params.header_config = value,
                other => panic!("unknown parameter {}", other),
            }
        }
        params
    }

    fn kinds(sections: &[Section]) -> Vec<&'static str> {
        sections.iter().map(|s| s.kind()).collect()
    }

    #[tokio::test]
    async fn test_only_chart_pie_yields_single_image() {
        let repository = Arc::new(StubRepository::with_data(
            records(),
            vec![
                json!({"name": "A", "value": 10}),
                json!({"name": "B", "value": 5}),
                json!({"name": "C", "value": 2}),
            ],
        ));
        let service = service(repository.clone(), vec![status_chart()]);
        let request = DashboardRequest::parse(
            "risks",
            OutputFormat::Pdf,
            &params(&[("onlyChart", "true"), ("chartType", "pie")]),
            &service.catalog,
            &HeaderDefaults::default(),
        )
        .unwrap();

        let sections = service.sections(&request).await.unwrap();
        assert_eq!(kinds(&sections), vec!["header", "chart"]);
        let Section::Chart(block) = &sections[1] else {
            panic!("expected chart section");
        };
        let labels: Vec<&str> = block.chart.legend.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(labels, vec!["A", "B", "C"]);
        assert_eq!(repository.record_calls(), 0);

        let document = service.export(&request).await.unwrap();
        assert!(document.bytes.starts_with(b"%PDF-"));
        assert_eq!(document.content_type, "application/pdf");
    }

    #[tokio::test]
    async fn test_inverted_range_never_reaches_data_source() {
        let repository = Arc::new(StubRepository::with_records(records()));
        let service = service(repository.clone(), vec![status_chart()]);

        let failure = service
            .export_params(
                "risks",
                OutputFormat::Excel,
                &params(&[("startDate", "2024-02-01"), ("endDate", "2024-01-01")]),
            )
            .await
            .unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::InvalidRequest);
        assert_eq!(repository.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_chart_without_values_keeps_tables() {
        let repository = Arc::new(StubRepository::with_data(
            records(),
            vec![json!({"name": "A"}), json!({"name": "B"})],
        ));
        let service = service(repository, vec![status_chart()]);

        let request = DashboardRequest::parse(
            "risks",
            OutputFormat::Pdf,
            &ExportParams::default(),
            &service.catalog,
            &HeaderDefaults::default(),
        )
        .unwrap();
        let sections = service.sections(&request).await.unwrap();
        assert_eq!(kinds(&sections), vec!["header", "table", "table", "table", "table", "text"]);
        let Section::Table(all) = &sections[2] else {
            panic!("expected record table");
        };
        assert_eq!(all.rows.len(), 2);
        assert!(service.export(&request).await.is_ok());

        let chart_only = service
            .export_params("risks", OutputFormat::Pdf, &params(&[("onlyChart", "1")]))
            .await
            .unwrap_err();
        assert_eq!(chart_only.kind(), ErrorKind::EmptyChartData);
        assert!(matches!(
            chart_only.source,
            ExportError::EmptyChartData { ref chart, dropped: 2 } if chart == "by_status"
        ));
    }

    #[tokio::test]
    async fn test_mode_selection() {
        let repository = Arc::new(StubRepository::with_data(
            records(),
            vec![json!({"name": "Open", "value": 3})],
        ));
        let service = service(repository.clone(), vec![status_chart()]);
        let parse = |pairs: &[(&str, &str)]| {
            DashboardRequest::parse(
                "risks",
                OutputFormat::Excel,
                &params(pairs),
                &service.catalog,
                &HeaderDefaults::default(),
            )
            .unwrap()
        };

        let overall = service.sections(&parse(&[("onlyOverallTable", "true")])).await.unwrap();
        assert_eq!(kinds(&overall), vec!["header", "table"]);
        assert_eq!(repository.query_calls(), 0);

        let card = service
            .sections(&parse(&[("onlyCard", "true"), ("cardType", "high")]))
            .await
            .unwrap();
        assert_eq!(kinds(&card), vec!["header", "table", "chart"]);
        let Section::Table(table) = &card[1] else {
            panic!("expected card table");
        };
        assert_eq!(table.title, "High Risk");
        assert_eq!(table.rows.len(), 1);

        let full = service.sections(&parse(&[])).await.unwrap();
        assert_eq!(kinds(&full), vec!["header", "table", "table", "table", "table", "chart"]);

        let no_header = service
            .sections(&parse(&[("headerConfig", r#"{"includeHeader":false}"#)]))
            .await
            .unwrap();
        assert_eq!(kinds(&no_header)[0], "table");
    }

    #[tokio::test]
    async fn test_charts_are_anchored_to_their_tables() {
        let repository = Arc::new(StubRepository::with_data(
            records(),
            vec![json!({"name": "Open", "value": 3})],
        ));
        let service = service(repository, vec![status_chart()]);
        let parse = |pairs: &[(&str, &str)]| {
            DashboardRequest::parse(
                "risks",
                OutputFormat::Excel,
                &params(pairs),
                &service.catalog,
                &HeaderDefaults::default(),
            )
            .unwrap()
        };
        let anchor = |sections: &[Section]| {
            sections.iter().find_map(|s| match s {
                Section::Chart(block) => Some(block.anchor.clone()),
                _ => None,
            })
        };

        let full = service.sections(&parse(&[])).await.unwrap();
        assert_eq!(anchor(&full), Some(Some("All Risks".to_string())));

        let card = service
            .sections(&parse(&[("onlyCard", "true"), ("cardType", "high")]))
            .await
            .unwrap();
        assert_eq!(anchor(&card), Some(Some("High Risk".to_string())));

        let chart_only = service.sections(&parse(&[("onlyChart", "true")])).await.unwrap();
        assert_eq!(anchor(&chart_only), Some(None));
    }

    #[tokio::test]
    async fn test_full_workbook_places_chart_on_its_table_sheet() {
        use std::io::{Cursor, Read};

        let repository = Arc::new(StubRepository::with_data(
            records(),
            vec![json!({"name": "Open", "value": 3})],
        ));
        let service = service(repository, vec![status_chart()]);
        let document = service
            .export_params("risks", OutputFormat::Excel, &ExportParams::default())
            .await
            .unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(document.bytes.to_vec())).unwrap();
        let mut workbook = String::new();
        archive.by_name("xl/workbook.xml").unwrap().read_to_string(&mut workbook).unwrap();
        let names: Vec<&str> = workbook
            .split("<sheet name=\"")
            .skip(1)
            .filter_map(|s| s.split('"').next())
            .collect();
        assert_eq!(names, vec!["Summary", "All Risks", "High Risk", "Low Risk"]);

        let mut rels = String::new();
        archive
            .by_name("xl/worksheets/_rels/sheet2.xml.rels")
            .unwrap()
            .read_to_string(&mut rels)
            .unwrap();
        assert!(rels.contains("drawing"));
        for sheet in [1, 3, 4] {
            assert!(archive.by_name(&format!("xl/worksheets/_rels/sheet{}.xml.rels", sheet)).is_err());
        }
    }

    #[tokio::test]
    async fn test_successful_exports_are_recorded_in_history() {
        let repository = Arc::new(StubRepository::with_records(records()));
        let history = Arc::new(ExportHistory::new(10));
        let service = service(repository, vec![]).with_history(history.clone());

        let document = service
            .export_params("risks", OutputFormat::Excel, &params(&[("onlyOverallTable", "true")]))
            .await
            .unwrap();
        let rejected = service
            .export_params("risks", OutputFormat::Pdf, &params(&[("onlyCard", "true")]))
            .await;
        assert!(rejected.is_err());

        let page = history.recent(&Default::default());
        assert_eq!(page.pagination.total, 1);
        let record = &page.exports[0];
        assert_eq!(record.title, "Risks Dashboard Report");
        assert_eq!(record.src, document.filename);
        assert_eq!(record.format, "excel");
        assert_eq!(record.dashboard, "risks");
    }

    #[tokio::test]
    async fn test_card_type_without_only_card_narrows_card_detail() {
        let repository = Arc::new(StubRepository::with_data(
            records(),
            vec![json!({"name": "Open", "value": 3})],
        ));
        let service = service(repository, vec![status_chart()]);

        let request = DashboardRequest::parse(
            "risks",
            OutputFormat::Pdf,
            &params(&[("cardType", "high")]),
            &service.catalog,
            &HeaderDefaults::default(),
        )
        .unwrap();
        let sections = service.sections(&request).await.unwrap();
        let titles: Vec<&str> = sections
            .iter()
            .filter_map(|s| match s {
                Section::Table(t) => Some(t.title.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(titles, vec!["Summary", "All Risks", "High Risk"]);

        let date = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        assert_eq!(export_filename(&request, date), "risks_highRisk_20240502.pdf");
    }

    #[tokio::test]
    async fn test_export_is_deterministic() {
        let repository = Arc::new(StubRepository::with_data(
            records(),
            vec![json!({"name": "Open", "value": 3}), json!({"name": "Closed", "value": 7})],
        ));
        let service = service(repository, vec![status_chart()]);

        for format in [OutputFormat::Pdf, OutputFormat::Excel] {
            let first = service.export_params("risks", format, &ExportParams::default()).await.unwrap();
            let second = service.export_params("risks", format, &ExportParams::default()).await.unwrap();
            assert_eq!(first.bytes, second.bytes);
            assert_eq!(first.content_type, format.content_type());
        }
    }

    #[tokio::test]
    async fn test_data_unavailable_keeps_its_kind() {
        let repository = Arc::new(StubRepository::failing("connection refused"));
        let service = service(repository, vec![status_chart()]);

        let failure = service
            .export_params("risks", OutputFormat::Pdf, &ExportParams::default())
            .await
            .unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::DataUnavailable);
        assert_eq!(failure.dashboard, "risks");
    }

    #[test]
    fn test_export_filename() {
        let catalog = risks_catalog(vec![]);
        let request = DashboardRequest::parse(
            "risks",
            OutputFormat::Excel,
            &params(&[("onlyCard", "yes"), ("cardType", "high")]),
            &catalog,
            &HeaderDefaults::default(),
        )
        .unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        assert_eq!(export_filename(&request, date), "risks_highRisk_20240502.xlsx");
        assert_eq!(humanize("created_at"), "Created At");
    }
}
