// Worksheet cell plan, laid out before anything is written to the workbook
use chrono::NaiveDate;
use std::sync::Arc;

pub const MAX_COLUMN_WIDTH: usize = 50;
const MIN_BANNER_SPAN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Title,
    Banner,
    Section,
    Header,
    Text,
    Integer,
    Decimal,
    Date,
    Notice,
}

/// Cell formatting: a role plus whether the row is a zebra stripe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Style {
    pub role: Role,
    pub zebra: bool,
}

impl Style {
    pub const TITLE: Style = Style::plain(Role::Title);
    pub const BANNER: Style = Style::plain(Role::Banner);
    pub const SECTION: Style = Style::plain(Role::Section);
    pub const HEADER: Style = Style::plain(Role::Header);
    pub const TEXT: Style = Style::plain(Role::Text);
    pub const INTEGER: Style = Style::plain(Role::Integer);
    pub const DECIMAL: Style = Style::plain(Role::Decimal);
    pub const DATE: Style = Style::plain(Role::Date);
    pub const NOTICE: Style = Style::plain(Role::Notice);

    const fn plain(role: Role) -> Self {
        Self { role, zebra: false }
    }

    pub const fn striped(self, zebra: bool) -> Self {
        Self { role: self.role, zebra }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String, Style),
    Number(f64, Style),
    Date(NaiveDate, Style),
}

/// A PNG placed with its top-left corner on a cell.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAnchor {
    pub row: usize,
    pub col: usize,
    pub png: Arc<Vec<u8>>,
    pub width_px: u32,
    pub height_px: u32,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct SheetBuilder {
    pub name: String,
    rows: Vec<Vec<Cell>>,
    banners: Vec<usize>,
    widths: Vec<usize>,
    pub images: Vec<ImageAnchor>,
    /// Titles of the tables (or table parts) laid out on this sheet.
    pub tables: Vec<String>,
}

impl SheetBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
            banners: Vec::new(),
            widths: Vec::new(),
            images: Vec::new(),
            tables: Vec::new(),
        }
    }

    pub fn has_table(&self) -> bool {
        !self.tables.is_empty()
    }

    pub fn next_row(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.images.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.widths.len()
    }

    pub fn push_row(&mut self, cells: Vec<Cell>) {
        self.rows.push(cells);
    }

    pub fn blank_rows(&mut self, count: usize) {
        self.rows.extend(std::iter::repeat_with(Vec::new).take(count));
    }

    /// Single text cell merged across the sheet's width.
    pub fn banner(&mut self, text: &str, style: Style) {
        self.banners.push(self.rows.len());
        self.rows.push(vec![Cell::Text(text.to_string(), style)]);
    }

    /// Grow column `col` to fit `chars` characters plus padding.
    pub fn measure(&mut self, col: usize, chars: usize) {
        if self.widths.len() <= col {
            self.widths.resize(col + 1, 0);
        }
        let width = (chars + 2).min(MAX_COLUMN_WIDTH);
        self.widths[col] = self.widths[col].max(width);
    }

    pub fn width(&self, col: usize) -> Option<usize> {
        self.widths.get(col).copied()
    }

    pub fn widths(&self) -> &[usize] {
        &self.widths
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Non-empty rows with their indices.
    pub fn rows(&self) -> impl Iterator<Item = (usize, &[Cell])> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.iter().any(|c| *c != Cell::Empty))
            .map(|(i, row)| (i, row.as_slice()))
    }

    pub fn is_banner(&self, row: usize) -> bool {
        self.banners.contains(&row)
    }

    /// Last column a banner merges across.
    pub fn banner_end(&self) -> usize {
        self.widths.len().max(MIN_BANNER_SPAN) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widths_are_padded_and_capped() {
        let mut sheet = SheetBuilder::new("Risks");
        sheet.measure(0, 4);
        sheet.measure(0, 2);
        sheet.measure(2, 500);
        assert_eq!(sheet.width(0), Some(6));
        assert_eq!(sheet.width(1), Some(0));
        assert_eq!(sheet.width(2), Some(MAX_COLUMN_WIDTH));
        assert_eq!(sheet.banner_end(), 5);
    }

    #[test]
    fn test_rows_skip_blank_spacers() {
        let mut sheet = SheetBuilder::new("Risks");
        sheet.banner("Risks Dashboard", Style::TITLE);
        sheet.blank_rows(2);
        sheet.push_row(vec![Cell::Text("R-1".to_string(), Style::TEXT.striped(true))]);

        let indices: Vec<usize> = sheet.rows().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![0, 3]);
        assert!(sheet.is_banner(0));
        assert!(!sheet.is_banner(3));
        assert_eq!(
            sheet.cell(3, 0),
            Some(&Cell::Text("R-1".to_string(), Style { role: Role::Text, zebra: true }))
        );
    }
}
