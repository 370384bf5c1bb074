use crate::domain::chart::ChartDefinition;
use crate::domain::dashboard::{DashboardCatalog, DashboardDefinition};
use crate::domain::request::HeaderDefaults;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerSettings,
    pub upstream: UpstreamSettings,
    #[serde(default)]
    pub export: ExportSettings,
    #[serde(default)]
    pub fonts: FontSettings,
    #[serde(default)]
    pub registry: RegistrySettings,
    #[serde(default)]
    pub history: HistorySettings,
    #[serde(default)]
    pub branding: HeaderDefaults,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    /// Response bodies larger than this are streamed in chunks of this size.
    pub chunk_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            chunk_size: 64 * 1024,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamSettings {
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    /// Path template for dashboard records, `${dashboard}` is substituted.
    #[serde(default = "default_records_path")]
    pub records_path: String,
    #[serde(default = "default_query_path")]
    pub query_path: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_records_path() -> String {
    "/api/grc/${dashboard}".to_string()
}

fn default_query_path() -> String {
    "/api/query".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExportSettings {
    pub max_rows_per_sheet: usize,
    pub chart_dpi: u32,
    pub chart_figsize: (f32, f32),
    /// Page margin in points.
    pub page_margin: f32,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            max_rows_per_sheet: 10_000,
            chart_dpi: 150,
            chart_figsize: (8.0, 4.0),
            page_margin: 40.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FontSettings {
    /// TrueType fonts tried in order for scripts Helvetica cannot show.
    /// The bundled DejaVu Sans is used when none loads.
    pub rtl_candidates: Vec<PathBuf>,
}

impl Default for FontSettings {
    fn default() -> Self {
        Self {
            rtl_candidates: vec![PathBuf::from("/usr/share/fonts/truetype/noto/NotoNaskhArabic-Regular.ttf")],
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct RegistrySettings {
    /// JSON file the chart registry persists to; in-memory only when unset.
    pub storage_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HistorySettings {
    /// Export records kept before the oldest is dropped.
    pub capacity: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self { capacity: 1000 }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DashboardsConfig {
    #[serde(default)]
    pub dashboards: Vec<DashboardDefinition>,
    /// Chart definitions seeded into the registry at startup.
    #[serde(default)]
    pub charts: Vec<ChartDefinition>,
}

impl DashboardsConfig {
    pub fn catalog(&self) -> DashboardCatalog {
        DashboardCatalog::new(self.dashboards.clone())
    }
}

/// `config/service.*`, overridable with `REPORT__SECTION__KEY` variables.
pub fn load_service_config() -> anyhow::Result<ServiceConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/service"))
        .add_source(config::Environment::with_prefix("REPORT").separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

pub fn load_dashboards_config() -> anyhow::Result<DashboardsConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/dashboards"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Replace template variables in a query string
pub fn prepare_query(query: &str, vars: &HashMap<String, String>) -> String {
    let mut result = query.to_string();
    for (key, value) in vars {
        let placeholder = format!("${{{}}}", key);
        result = result.replace(&placeholder, value);
    }
    result
}
