// Document sections and composed artifacts
use super::table::{ColumnKind, Scalar};
use bytes::Bytes;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    pub const WHITE: Rgb = Rgb(255, 255, 255);

    /// Parse `#RRGGBB` (the leading `#` is optional).
    pub fn parse_hex(s: &str) -> Option<Rgb> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_hex(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }

    /// White on dark fills, black on light ones.
    pub fn contrasting_text(self) -> Rgb {
        let luma = 0.299 * self.0 as f32 + 0.587 * self.1 as f32 + 0.114 * self.2 as f32;
        if luma > 160.0 { Rgb::BLACK } else { Rgb::WHITE }
    }

    /// Components scaled to 0..=1 for PDF colour operators.
    pub fn unit(self) -> (f64, f64, f64) {
        (self.0 as f64 / 255.0, self.1 as f64 / 255.0, self.2 as f64 / 255.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub label: String,
    pub value: f64,
    pub color: Rgb,
}

/// A rasterised chart. `rgb` holds the raw pixels (row-major, 3 bytes per
/// pixel) and `png` the same image encoded for spreadsheet embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedChart {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub png: Arc<Vec<u8>>,
    pub rgb: Arc<Vec<u8>>,
    pub title: Option<String>,
    pub legend: Vec<LegendEntry>,
    /// Intended display size in inches.
    pub display_size: (f32, f32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderBlock {
    pub title: String,
    pub subtitle: Option<String>,
    /// Company name, address, contact lines.
    pub info_lines: Vec<String>,
    pub period: String,
    pub logo_png: Option<Arc<Vec<u8>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableColumn {
    pub key: String,
    pub label: String,
    pub kind: ColumnKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableBlock {
    pub title: String,
    pub columns: Vec<TableColumn>,
    pub rows: Vec<Vec<Scalar>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartBlock {
    pub title: String,
    pub chart: RenderedChart,
    /// Title of the table this chart belongs to.
    pub anchor: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub text: String,
    pub anchor: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    Header(HeaderBlock),
    Table(TableBlock),
    Chart(ChartBlock),
    Text(TextBlock),
}

impl Section {
    pub fn kind(&self) -> &'static str {
        match self {
            Section::Header(_) => "header",
            Section::Table(_) => "table",
            Section::Chart(_) => "chart",
            Section::Text(_) => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComposedDocument {
    pub bytes: Bytes,
    pub content_type: &'static str,
    pub filename: String,
}

impl ComposedDocument {
    pub fn new(bytes: Vec<u8>, content_type: &'static str, filename: impl Into<String>) -> Self {
        Self {
            bytes: Bytes::from(bytes),
            content_type,
            filename: filename.into(),
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(Rgb::parse_hex("#1F4E79"), Some(Rgb(0x1F, 0x4E, 0x79)));
        assert_eq!(Rgb::parse_hex("ffffff"), Some(Rgb::WHITE));
        assert_eq!(Rgb::parse_hex("#12345"), None);
        assert_eq!(Rgb::parse_hex("#GG0000"), None);
        assert_eq!(Rgb(0x1F, 0x4E, 0x79).to_hex(), "1F4E79");
        assert_eq!(Rgb(0x1F, 0x4E, 0x79).contrasting_text(), Rgb::WHITE);
        assert_eq!(Rgb(0xEE, 0xEE, 0xEE).contrasting_text(), Rgb::BLACK);
    }
}
