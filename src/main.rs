// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use tracing_subscriber::EnvFilter;

use crate::application::chart_registry::ChartRegistry;
use crate::application::data_fetcher::DataFetcher;
use crate::application::export_history::ExportHistory;
use crate::application::export_service::{ExportOptions, ExportService};
use crate::application::rendering::DocumentComposer;
use crate::infrastructure::chart_renderer::PlottersChartRenderer;
use crate::infrastructure::config::{load_dashboards_config, load_service_config};
use crate::infrastructure::grc_api_repository::GrcApiRepository;
use crate::infrastructure::pdf::{PdfComposer, PdfSettings};
use crate::infrastructure::xlsx::XlsxComposer;
use crate::presentation::app_state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let service_config = load_service_config()?;
    let dashboards_config = load_dashboards_config()?;
    let catalog = Arc::new(dashboards_config.catalog());

    // Create repository and registry (infrastructure layer)
    let repository = Arc::new(GrcApiRepository::new(&service_config.upstream)?);
    let registry = Arc::new(match &service_config.registry.storage_file {
        Some(path) => ChartRegistry::load(path, dashboards_config.charts.clone())?,
        None => ChartRegistry::new(dashboards_config.charts.clone())?,
    });

    let export = &service_config.export;
    let composers: Vec<Arc<dyn DocumentComposer>> = vec![
        Arc::new(PdfComposer::new(PdfSettings {
            margin: export.page_margin,
            font_candidates: service_config.fonts.rtl_candidates.clone(),
        })),
        Arc::new(XlsxComposer::new(export.max_rows_per_sheet)),
    ];

    // Create services (application layer)
    let history = Arc::new(ExportHistory::new(service_config.history.capacity));
    let export_service = ExportService::new(
        DataFetcher::new(repository, catalog.clone()),
        catalog,
        registry,
        Arc::new(PlottersChartRenderer::new()),
        composers,
        ExportOptions {
            chart_dpi: export.chart_dpi,
            chart_figsize: export.chart_figsize,
            header_defaults: service_config.branding.clone(),
        },
    )
    .with_history(history.clone());

    let state = Arc::new(AppState {
        export_service,
        history,
        chunk_size: service_config.server.chunk_size,
    });

    // Build router (presentation layer)
    let router = presentation::router(state);

    // Start server
    let addr: SocketAddr = service_config.server.bind.parse()?;
    tracing::info!(%addr, "starting grc-report-export service");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
