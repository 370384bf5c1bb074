// Excel workbook composer
mod render;
mod sheet;

use crate::application::rendering::{slug, DocumentComposer};
use crate::domain::document::{ChartBlock, ComposedDocument, HeaderBlock, Section, TableBlock, TextBlock};
use crate::domain::error::ExportError;
use crate::domain::request::{OutputFormat, ResolvedHeader};
use crate::domain::table::Scalar;
use sheet::{Cell, ImageAnchor, SheetBuilder, Style};

const DEFAULT_SHEET: &str = "Report";
const MAX_SHEET_NAME: usize = 31;
const PIXELS_PER_INCH: f32 = 96.0;
const ROW_HEIGHT_PX: u32 = 20;
const LOGO_BOX_PX: u32 = 80;

pub struct XlsxComposer {
    max_rows_per_sheet: usize,
}

impl XlsxComposer {
    pub fn new(max_rows_per_sheet: usize) -> Self {
        Self {
            max_rows_per_sheet: max_rows_per_sheet.max(1),
        }
    }
}

/// Width and height from a PNG IHDR chunk.
fn png_dimensions(png: &[u8]) -> Option<(u32, u32)> {
    if png.len() < 24 || &png[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes(png[16..20].try_into().ok()?);
    let height = u32::from_be_bytes(png[20..24].try_into().ok()?);
    (width > 0 && height > 0).then_some((width, height))
}

/// Strip characters Excel forbids in tab names and cap the length.
fn sheet_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .collect();
    let trimmed = cleaned.trim().trim_matches('\'');
    let name: String = trimmed.chars().take(MAX_SHEET_NAME).collect();
    if name.trim().is_empty() {
        DEFAULT_SHEET.to_string()
    } else {
        name.trim_end().to_string()
    }
}

/// Sheets planned so far. Sections flow onto the current sheet, except
/// anchored charts and notices, which follow their table.
struct WorkbookPlan<'a> {
    header: &'a ResolvedHeader,
    max_rows: usize,
    sheets: Vec<SheetBuilder>,
}

impl<'a> WorkbookPlan<'a> {
    fn new(header: &'a ResolvedHeader, max_rows: usize) -> Self {
        Self {
            header,
            max_rows,
            sheets: Vec::new(),
        }
    }

    fn unique_name(&self, base: &str) -> String {
        let base = sheet_name(base);
        let taken = |name: &str| self.sheets.iter().any(|s| s.name.eq_ignore_ascii_case(name));
        if !taken(&base) {
            return base;
        }
        (2..)
            .map(|n| {
                let suffix = format!(" ({})", n);
                let stem: String = base.chars().take(MAX_SHEET_NAME - suffix.len()).collect();
                format!("{}{}", stem.trim_end(), suffix)
            })
            .find(|candidate| !taken(candidate))
            .unwrap_or(base)
    }

    fn add_sheet(&mut self, name: &str) -> usize {
        let name = self.unique_name(name);
        self.sheets.push(SheetBuilder::new(name));
        self.sheets.len() - 1
    }

    fn current(&mut self) -> usize {
        if self.sheets.is_empty() {
            self.add_sheet(DEFAULT_SHEET)
        } else {
            self.sheets.len() - 1
        }
    }

    /// Blank spacer row unless the sheet is still empty.
    fn gap(&mut self, index: usize) {
        if !self.sheets[index].is_empty() {
            self.sheets[index].blank_rows(1);
        }
    }

    fn header(&mut self, block: &HeaderBlock) {
        let index = self.current();
        let sheet = &mut self.sheets[index];
        let top = sheet.next_row();
        sheet.banner(&block.title, Style::TITLE);
        if let Some(subtitle) = block.subtitle.as_deref().filter(|s| !s.trim().is_empty()) {
            sheet.banner(subtitle, Style::BANNER);
        }
        for line in &block.info_lines {
            sheet.banner(line, Style::BANNER);
        }
        sheet.banner(&block.period, Style::BANNER);

        if let Some(png) = &block.logo_png {
            match png_dimensions(png) {
                Some((w, h)) => {
                    let scale = (LOGO_BOX_PX as f32 / w as f32).min(LOGO_BOX_PX as f32 / h as f32);
                    let col = sheet.column_count().max(6);
                    sheet.images.push(ImageAnchor {
                        row: top,
                        col,
                        png: png.clone(),
                        width_px: ((w as f32 * scale).round() as u32).max(1),
                        height_px: ((h as f32 * scale).round() as u32).max(1),
                        description: "Logo".to_string(),
                    });
                }
                None => tracing::warn!("skipping logo without a readable PNG header"),
            }
        }
    }

    fn cell(&self, value: &Scalar, zebra: bool) -> (Cell, usize) {
        match value {
            Scalar::Null => (Cell::Text(String::new(), Style::TEXT.striped(zebra)), 0),
            Scalar::Text(text) => (Cell::Text(text.clone(), Style::TEXT.striped(zebra)), text.chars().count()),
            Scalar::Number(n) => {
                let style = if n.fract() == 0.0 { Style::INTEGER } else { Style::DECIMAL };
                let shown = self.header.locale.format_number(*n).chars().count();
                (Cell::Number(*n, style.striped(zebra)), shown)
            }
            Scalar::Date(d) => (Cell::Date(*d, Style::DATE.striped(zebra)), 10),
        }
    }

    /// Last sheet holding a table titled `anchor`, else the current sheet.
    fn target(&mut self, anchor: Option<&str>) -> usize {
        anchor
            .and_then(|title| self.sheets.iter().rposition(|s| s.tables.iter().any(|t| t == title)))
            .unwrap_or_else(|| self.current())
    }

    fn table_heading(&mut self, index: usize, title: &str, block: &TableBlock) {
        let sheet = &mut self.sheets[index];
        sheet.banner(title, Style::SECTION);
        let labels: Vec<Cell> = block
            .columns
            .iter()
            .map(|c| Cell::Text(c.label.clone(), Style::HEADER))
            .collect();
        for (i, column) in block.columns.iter().enumerate() {
            sheet.measure(i, column.label.chars().count());
        }
        sheet.push_row(labels);
    }

    /// Tables longer than the row limit continue on numbered sheets, each
    /// with its own header row.
    fn table(&mut self, block: &TableBlock) {
        let reuse = self.sheets.last().is_some_and(|sheet| !sheet.has_table());
        let mut index = if reuse {
            self.sheets.len() - 1
        } else {
            self.add_sheet(&block.title)
        };
        if self.sheets[index].name == DEFAULT_SHEET {
            let renamed = self.unique_name(&block.title);
            self.sheets[index].name = renamed;
        }
        self.gap(index);
        self.sheets[index].tables.push(block.title.clone());

        if block.rows.is_empty() {
            self.table_heading(index, &block.title, block);
            self.sheets[index].push_row(vec![Cell::Text("No records".to_string(), Style::NOTICE)]);
            return;
        }

        for (part, chunk) in block.rows.chunks(self.max_rows).enumerate() {
            let title = if part == 0 {
                block.title.clone()
            } else {
                index = self.add_sheet(&format!("{} {}", sheet_name(&block.title), part + 1));
                self.sheets[index].tables.push(block.title.clone());
                format!("{} (continued)", block.title)
            };
            self.table_heading(index, &title, block);
            for (i, row) in chunk.iter().enumerate() {
                let zebra = self.header.zebra_stripes && i % 2 == 1;
                let cells: Vec<(Cell, usize)> = row.iter().map(|v| self.cell(v, zebra)).collect();
                let sheet = &mut self.sheets[index];
                for (col, (_, chars)) in cells.iter().enumerate() {
                    sheet.measure(col, *chars);
                }
                sheet.push_row(cells.into_iter().map(|(cell, _)| cell).collect());
            }
        }
    }

    /// Chart image placed below its table (or the current sheet's content),
    /// followed by its legend as label/value rows.
    fn chart(&mut self, block: &ChartBlock) {
        let index = self.target(block.anchor.as_deref());
        self.gap(index);
        let chart = &block.chart;
        let aspect = chart.height as f32 / chart.width.max(1) as f32;
        let width_px = ((chart.display_size.0 * PIXELS_PER_INCH).round() as u32).max(1);
        let height_px = ((width_px as f32 * aspect).round() as u32).max(1);

        let legend: Vec<(Cell, Cell, usize, usize)> = chart
            .legend
            .iter()
            .map(|entry| {
                let (value, chars) = self.cell(&Scalar::Number(entry.value), false);
                (
                    Cell::Text(entry.label.clone(), Style::TEXT),
                    value,
                    entry.label.chars().count(),
                    chars,
                )
            })
            .collect();

        let sheet = &mut self.sheets[index];
        sheet.banner(&block.title, Style::SECTION);
        let row = sheet.next_row();
        sheet.images.push(ImageAnchor {
            row,
            col: 0,
            png: chart.png.clone(),
            width_px,
            height_px,
            description: block.title.clone(),
        });
        sheet.blank_rows(height_px.div_ceil(ROW_HEIGHT_PX) as usize + 1);
        for (label, value, label_chars, value_chars) in legend {
            sheet.measure(0, label_chars);
            sheet.measure(1, value_chars);
            sheet.push_row(vec![label, value]);
        }
    }

    fn text(&mut self, block: &TextBlock) {
        let index = self.target(block.anchor.as_deref());
        self.gap(index);
        self.sheets[index].banner(&block.text, Style::NOTICE);
    }
}

impl DocumentComposer for XlsxComposer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Excel
    }

    fn compose(&self, sections: &[Section], header: &ResolvedHeader) -> Result<ComposedDocument, ExportError> {
        let mut workbook = WorkbookPlan::new(header, self.max_rows_per_sheet);
        for section in sections {
            match section {
                Section::Header(block) => workbook.header(block),
                Section::Table(block) => workbook.table(block),
                Section::Chart(block) => workbook.chart(block),
                Section::Text(block) => workbook.text(block),
            }
        }
        if workbook.sheets.is_empty() {
            workbook.add_sheet(DEFAULT_SHEET);
        }

        let bytes = render::write_workbook(&workbook.sheets, header)?;
        tracing::debug!(sheets = workbook.sheets.len(), bytes = bytes.len(), "composed workbook");
        Ok(ComposedDocument::new(
            bytes,
            OutputFormat::Excel.content_type(),
            format!("{}.xlsx", slug(&header.title)),
        ))
    }
}
