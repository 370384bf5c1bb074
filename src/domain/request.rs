// Export request parsing and validation
use super::chart::ChartType;
use super::dashboard::{DashboardCatalog, DashboardId};
use super::document::Rgb;
use super::error::ExportError;
use super::locale::Locale;
use base64::Engine;
use chrono::{Days, NaiveDate};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Pdf,
    Excel,
}

impl OutputFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "application/pdf",
            OutputFormat::Excel => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Excel => "xlsx",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Excel => "excel",
        })
    }
}

/// Inclusive calendar range; either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self, ExportError> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(ExportError::invalid(format!(
                    "startDate {} is after endDate {}",
                    s, e
                )));
            }
        }
        Ok(Self { start, end })
    }

    /// Exclusive upper bound: the day after `end`.
    pub fn end_exclusive(&self) -> Option<NaiveDate> {
        self.end.and_then(|e| e.checked_add_days(Days::new(1)))
    }

    /// SQL fragment appended to `WHERE 1=1` style templates. The upper bound
    /// is half-open so records late on the end day are included.
    pub fn sql_filter(&self, date_field: &str) -> String {
        let mut parts = Vec::new();
        if let Some(start) = self.start {
            parts.push(format!("{} >= '{}'", date_field, start.format("%Y-%m-%d")));
        }
        if let Some(end) = self.end_exclusive() {
            parts.push(format!("{} < '{}'", date_field, end.format("%Y-%m-%d")));
        }
        if parts.is_empty() {
            String::new()
        } else {
            format!(" AND {}", parts.join(" AND "))
        }
    }

    pub fn label(&self) -> String {
        match (self.start, self.end) {
            (Some(s), Some(e)) => format!("Period: {} to {}", s, e),
            (Some(s), None) => format!("Period: from {}", s),
            (None, Some(e)) => format!("Period: up to {}", e),
            (None, None) => "Period: all dates".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportMode {
    pub only_card: bool,
    pub only_chart: bool,
    pub only_overall_table: bool,
}

/// Raw query parameters as received from the HTTP layer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub card_type: Option<String>,
    pub only_card: Option<String>,
    pub only_chart: Option<String>,
    pub only_overall_table: Option<String>,
    pub chart_type: Option<String>,
    pub header_config: Option<String>,
}

/// Wire schema of `headerConfig`. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HeaderConfig {
    pub include_header: Option<bool>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    #[serde(alias = "bankName")]
    pub company_name: Option<String>,
    #[serde(alias = "bankAddress")]
    pub company_address: Option<String>,
    #[serde(alias = "bankPhone")]
    pub company_phone: Option<String>,
    #[serde(alias = "bankWebsite", alias = "bankUrl")]
    pub company_website: Option<String>,
    pub show_logo: Option<bool>,
    pub logo_base64: Option<String>,
    pub watermark_enabled: Option<bool>,
    pub watermark_text: Option<String>,
    pub watermark_opacity: Option<u8>,
    pub font_color: Option<String>,
    pub table_header_bg_color: Option<String>,
    pub table_body_bg_color: Option<String>,
    pub zebra_stripes: Option<bool>,
    pub show_page_numbers: Option<bool>,
    pub footer_confidentiality_text: Option<String>,
    pub locale: Option<String>,
}

/// Deployment-wide branding used when a request leaves a field unset.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HeaderDefaults {
    pub company_name: Option<String>,
    pub company_address: Option<String>,
    pub company_phone: Option<String>,
    pub company_website: Option<String>,
    pub watermark_enabled: bool,
    pub watermark_text: String,
    pub watermark_opacity: u8,
    pub font_color: String,
    pub table_header_bg_color: String,
    pub table_body_bg_color: String,
    pub footer_confidentiality_text: Option<String>,
    pub locale: String,
}

impl Default for HeaderDefaults {
    fn default() -> Self {
        Self {
            company_name: None,
            company_address: None,
            company_phone: None,
            company_website: None,
            watermark_enabled: false,
            watermark_text: "CONFIDENTIAL".to_string(),
            watermark_opacity: 10,
            font_color: "#1F4E79".to_string(),
            table_header_bg_color: "#1F4E79".to_string(),
            table_body_bg_color: "#FFFFFF".to_string(),
            footer_confidentiality_text: Some("Confidential Report - Internal Use Only".to_string()),
            locale: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Watermark {
    pub text: String,
    /// 0.0..=1.0
    pub opacity: f32,
}

/// Header settings after merging request overrides onto defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedHeader {
    pub include_header: bool,
    pub title: String,
    pub subtitle: Option<String>,
    pub info_lines: Vec<String>,
    pub logo_png: Option<Arc<Vec<u8>>>,
    pub watermark: Option<Watermark>,
    pub font_color: Rgb,
    pub table_header_bg: Rgb,
    pub table_body_bg: Rgb,
    pub zebra_stripes: bool,
    pub show_page_numbers: bool,
    pub footer_text: Option<String>,
    pub locale: Locale,
}

impl ResolvedHeader {
    pub fn resolve(
        config: HeaderConfig,
        defaults: &HeaderDefaults,
        title: &str,
        subtitle: Option<&str>,
    ) -> Result<Self, ExportError> {
        let color = |value: Option<String>, fallback: &str, field: &str| -> Result<Rgb, ExportError> {
            let raw = value.unwrap_or_else(|| fallback.to_string());
            Rgb::parse_hex(&raw)
                .ok_or_else(|| ExportError::invalid(format!("headerConfig.{} '{}' is not #RRGGBB", field, raw)))
        };

        let locale_tag = config.locale.unwrap_or_else(|| defaults.locale.clone());
        let locale = Locale::parse(&locale_tag)
            .ok_or_else(|| ExportError::invalid(format!("unsupported locale '{}'", locale_tag)))?;

        let opacity = config.watermark_opacity.unwrap_or(defaults.watermark_opacity);
        if !(1..=100).contains(&opacity) {
            return Err(ExportError::invalid(format!(
                "headerConfig.watermarkOpacity must be 1..=100, got {}",
                opacity
            )));
        }
        let watermark = if config.watermark_enabled.unwrap_or(defaults.watermark_enabled) {
            let text = config.watermark_text.unwrap_or_else(|| defaults.watermark_text.clone());
            (!text.trim().is_empty()).then(|| Watermark {
                text,
                opacity: opacity as f32 / 100.0,
            })
        } else {
            None
        };

        let logo_png = match (config.show_logo.unwrap_or(true), config.logo_base64) {
            (true, Some(encoded)) if !encoded.trim().is_empty() => Some(Arc::new(decode_png_logo(&encoded)?)),
            _ => None,
        };

        let company_name = config.company_name.or_else(|| defaults.company_name.clone());
        let company_address = config.company_address.or_else(|| defaults.company_address.clone());
        let phone = config.company_phone.or_else(|| defaults.company_phone.clone());
        let website = config.company_website.or_else(|| defaults.company_website.clone());
        let contact = match (phone, website) {
            (Some(p), Some(w)) => Some(format!("Tel: {} | Web: {}", p, w)),
            (Some(p), None) => Some(format!("Tel: {}", p)),
            (None, Some(w)) => Some(format!("Web: {}", w)),
            (None, None) => None,
        };
        let info_lines = [company_name, company_address, contact]
            .into_iter()
            .flatten()
            .filter(|l| !l.trim().is_empty())
            .collect();

        Ok(Self {
            include_header: config.include_header.unwrap_or(true),
            title: config.title.unwrap_or_else(|| title.to_string()),
            subtitle: config.subtitle.or_else(|| subtitle.map(str::to_string)),
            info_lines,
            logo_png,
            watermark,
            font_color: color(config.font_color, &defaults.font_color, "fontColor")?,
            table_header_bg: color(
                config.table_header_bg_color,
                &defaults.table_header_bg_color,
                "tableHeaderBgColor",
            )?,
            table_body_bg: color(
                config.table_body_bg_color,
                &defaults.table_body_bg_color,
                "tableBodyBgColor",
            )?,
            zebra_stripes: config.zebra_stripes.unwrap_or(true),
            show_page_numbers: config.show_page_numbers.unwrap_or(true),
            footer_text: config
                .footer_confidentiality_text
                .or_else(|| defaults.footer_confidentiality_text.clone()),
            locale,
        })
    }
}

fn decode_png_logo(encoded: &str) -> Result<Vec<u8>, ExportError> {
    let payload = match encoded.split_once(',') {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| ExportError::invalid(format!("headerConfig.logoBase64 is not valid base64: {}", e)))?;
    if !bytes.starts_with(&PNG_SIGNATURE) {
        return Err(ExportError::invalid("headerConfig.logoBase64 must be a PNG image"));
    }
    Ok(bytes)
}

fn parse_flag(value: Option<&str>, name: &str) -> Result<bool, ExportError> {
    match value.map(|v| v.trim().to_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "" | "false" | "0" | "no" | "off" => Ok(false),
            "true" | "1" | "yes" | "on" => Ok(true),
            _ => Err(ExportError::invalid(format!("{} must be a boolean, got '{}'", name, v))),
        },
    }
}

fn parse_date(value: Option<&str>, name: &str) -> Result<Option<NaiveDate>, ExportError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => {
            let day = v.get(..10).unwrap_or(v);
            NaiveDate::parse_from_str(day, "%Y-%m-%d")
                .map(Some)
                .map_err(|_| ExportError::invalid(format!("{} '{}' is not an ISO 8601 date", name, v)))
        }
    }
}

/// A validated export request. Only constructible through [`DashboardRequest::parse`].
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardRequest {
    pub dashboard: DashboardId,
    pub format: OutputFormat,
    pub range: DateRange,
    /// Canonical card id. Without `onlyCard` it narrows the card detail of
    /// a full report to this card.
    pub card: Option<String>,
    pub mode: ExportMode,
    pub chart_type: Option<ChartType>,
    pub header: ResolvedHeader,
}

impl DashboardRequest {
    pub fn parse(
        dashboard: &str,
        format: OutputFormat,
        params: &ExportParams,
        catalog: &DashboardCatalog,
        defaults: &HeaderDefaults,
    ) -> Result<Self, ExportError> {
        let dashboard: DashboardId = dashboard.parse()?;
        let definition = catalog
            .get(dashboard)
            .ok_or_else(|| ExportError::invalid(format!("dashboard '{}' is not configured", dashboard)))?;

        let range = DateRange::new(
            parse_date(params.start_date.as_deref(), "startDate")?,
            parse_date(params.end_date.as_deref(), "endDate")?,
        )?;

        let mode = ExportMode {
            only_card: parse_flag(params.only_card.as_deref(), "onlyCard")?,
            only_chart: parse_flag(params.only_chart.as_deref(), "onlyChart")?,
            only_overall_table: parse_flag(params.only_overall_table.as_deref(), "onlyOverallTable")?,
        };

        let card_type = params
            .card_type
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("none") && !c.eq_ignore_ascii_case("null"));
        let card = match card_type {
            Some(name) => {
                let card = definition.card(name).ok_or_else(|| {
                    ExportError::invalid(format!("unknown card '{}' for dashboard '{}'", name, dashboard))
                })?;
                Some(card.id.clone())
            }
            None => None,
        };

        if mode.only_card && card.is_none() {
            return Err(ExportError::invalid("onlyCard requires cardType"));
        }
        if mode.only_chart && mode.only_overall_table {
            return Err(ExportError::invalid("onlyChart and onlyOverallTable are mutually exclusive"));
        }
        if mode.only_card && mode.only_overall_table {
            return Err(ExportError::invalid("onlyCard and onlyOverallTable are mutually exclusive"));
        }

        let chart_type = match params.chart_type.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(name) => Some(name.parse::<ChartType>()?),
            None => None,
        };

        let header_config = match params.header_config.as_deref().map(str::trim).filter(|h| !h.is_empty()) {
            Some(raw) => serde_json::from_str::<HeaderConfig>(raw)
                .map_err(|e| ExportError::invalid(format!("headerConfig: {}", e)))?,
            None => HeaderConfig::default(),
        };
        let header = ResolvedHeader::resolve(
            header_config,
            defaults,
            &definition.title,
            definition.subtitle.as_deref(),
        )?;

        Ok(Self {
            dashboard,
            format,
            range,
            card,
            mode,
            chart_type,
            header,
        })
    }
}
