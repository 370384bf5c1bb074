// Rendering seams - Chart rasterisation and document composition
use crate::domain::chart::ChartType;
use crate::domain::document::{ComposedDocument, RenderedChart, Section};
use crate::domain::error::ExportError;
use crate::domain::locale::Locale;
use crate::domain::request::{OutputFormat, ResolvedHeader};
use crate::domain::table::ResultTable;

#[derive(Debug, Clone, PartialEq)]
pub struct ChartOptions {
    pub dpi: u32,
    /// Width and height in inches.
    pub figsize: (f32, f32),
    pub title: Option<String>,
    pub locale: Locale,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            dpi: 100,
            figsize: (8.0, 4.0),
            title: None,
            locale: Locale::EN,
        }
    }
}

impl ChartOptions {
    pub fn pixel_size(&self) -> (u32, u32) {
        let px = |inches: f32| ((inches.max(1.0) * self.dpi.max(10) as f32).round() as u32).max(64);
        (px(self.figsize.0), px(self.figsize.1))
    }
}

pub trait ChartRenderer: Send + Sync {
    /// Rasterise an aliased (`name`/`value`) table. Rows without both fields
    /// are dropped; if none remain the result is `EmptyChartData`.
    fn render(&self, chart_type: ChartType, table: &ResultTable, options: &ChartOptions)
        -> Result<RenderedChart, ExportError>;
}

pub trait DocumentComposer: Send + Sync {
    fn format(&self) -> OutputFormat;

    /// All-or-nothing: either a complete document or an error.
    fn compose(&self, sections: &[Section], header: &ResolvedHeader) -> Result<ComposedDocument, ExportError>;
}

/// File-name friendly form of a title, used as the composers' default name.
pub fn slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('_') && !slug.is_empty() {
            slug.push('_');
        }
    }
    let trimmed = slug.trim_end_matches('_');
    if trimmed.is_empty() {
        "report".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_size() {
        let options = ChartOptions {
            dpi: 150,
            ..Default::default()
        };
        assert_eq!(options.pixel_size(), (1200, 600));
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Risks Dashboard Report"), "risks_dashboard_report");
        assert_eq!(slug("تقرير"), "report");
    }
}
