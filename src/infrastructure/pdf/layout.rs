// Page flow: places header, table, chart and text blocks onto A4 pages
use super::fonts::{FontSet, FontStyle};
use super::image::RgbImage;
use super::text::{GlyphUsage, RunFont, TextLine};
use crate::domain::document::{ChartBlock, HeaderBlock, Rgb, TableBlock, TextBlock};
use crate::domain::error::ExportError;
use crate::domain::request::ResolvedHeader;
use crate::domain::table::Scalar;

pub const PAGE_WIDTH: f32 = 595.28;
pub const PAGE_HEIGHT: f32 = 841.89;

const FOOTER_HEIGHT: f32 = 22.0;
const ROW_HEIGHT: f32 = 16.0;
const CELL_PADDING: f32 = 4.0;
const CELL_FONT: f32 = 8.0;
const MIN_COLUMN: f32 = 30.0;
const BLOCK_GAP: f32 = 12.0;
const LOGO_BOX: f32 = 60.0;
const LEGEND_COLUMN: f32 = 160.0;
const LEGEND_LINE: f32 = 12.0;
const BORDER: Rgb = Rgb(210, 210, 210);
const ZEBRA: Rgb = Rgb(242, 242, 242);
const MUTED: Rgb = Rgb(90, 90, 90);
const WATERMARK: Rgb = Rgb(150, 150, 150);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
    Center,
}

#[derive(Debug, Default)]
pub struct Page {
    pub ops: String,
    /// Indices into the canvas image list.
    pub images: Vec<usize>,
}

pub struct Canvas<'a> {
    fonts: &'a FontSet,
    header: &'a ResolvedHeader,
    margin: f32,
    rtl: bool,
    pages: Vec<Page>,
    current: Page,
    y: f32,
    images: Vec<RgbImage>,
    usage: GlyphUsage,
}

/// Everything the object writer needs once layout is done.
pub struct LaidOut {
    pub pages: Vec<Page>,
    pub images: Vec<RgbImage>,
    pub usage: GlyphUsage,
}

fn color_op(c: Rgb, op: &str) -> String {
    let (r, g, b) = c.unit();
    format!("{:.3} {:.3} {:.3} {}\n", r, g, b, op)
}

fn font_name(font: RunFont) -> &'static str {
    match font {
        RunFont::Standard(FontStyle::Regular) => "/F1",
        RunFont::Standard(FontStyle::Bold) => "/F2",
        RunFont::Script => "/F3",
    }
}

impl<'a> Canvas<'a> {
    pub fn new(fonts: &'a FontSet, header: &'a ResolvedHeader, margin: f32) -> Self {
        let mut canvas = Self {
            fonts,
            header,
            margin,
            rtl: header.locale.is_rtl(),
            pages: Vec::new(),
            current: Page::default(),
            y: 0.0,
            images: Vec::new(),
            usage: GlyphUsage::default(),
        };
        canvas.start_page();
        canvas
    }

    fn top(&self) -> f32 {
        PAGE_HEIGHT - self.margin
    }

    fn bottom(&self) -> f32 {
        self.margin + FOOTER_HEIGHT
    }

    fn left(&self) -> f32 {
        self.margin
    }

    fn content_width(&self) -> f32 {
        PAGE_WIDTH - 2.0 * self.margin
    }

    fn start_align(&self) -> Align {
        if self.rtl { Align::Right } else { Align::Left }
    }

    fn end_align(&self) -> Align {
        if self.rtl { Align::Left } else { Align::Right }
    }

    fn start_page(&mut self) {
        self.y = self.top();
        let ops = self.watermark_ops();
        self.current = Page { ops, images: Vec::new() };
    }

    fn new_page(&mut self) {
        let finished = std::mem::take(&mut self.current);
        self.pages.push(finished);
        self.start_page();
    }

    /// Move to a fresh page unless `height` fits below the cursor.
    fn ensure(&mut self, height: f32, what: &str) -> Result<(), ExportError> {
        let usable = self.top() - self.bottom();
        if height > usable {
            return Err(ExportError::render(format!(
                "{} needs {:.0}pt but a page only has {:.0}pt",
                what, height, usable
            )));
        }
        if self.y - height < self.bottom() {
            self.new_page();
        }
        Ok(())
    }

    fn line(&mut self, text: &str, style: FontStyle) -> TextLine {
        TextLine::layout(text, style, self.rtl, self.fonts, &mut self.usage)
    }

    /// Lay out `text`, cutting it with an ellipsis until it fits `max_width`.
    fn fitted(&mut self, text: &str, size: f32, style: FontStyle, max_width: f32) -> TextLine {
        let line = self.line(text, style);
        if line.width_at(size) <= max_width {
            return line;
        }
        let mut chars: Vec<char> = text.chars().collect();
        while !chars.is_empty() {
            chars.pop();
            let candidate = format!("{}...", chars.iter().collect::<String>().trim_end());
            let line = self.line(&candidate, style);
            if line.width_at(size) <= max_width {
                return line;
            }
        }
        self.line("", style)
    }

    /// Greedy word wrap into lines no wider than `max_width`.
    fn wrapped(&mut self, text: &str, size: f32, style: FontStyle, max_width: f32) -> Vec<TextLine> {
        let mut lines = Vec::new();
        let mut current = String::new();
        for word in text.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };
            if !current.is_empty() && self.line(&candidate, style).width_at(size) > max_width {
                let full = std::mem::replace(&mut current, word.to_string());
                lines.push(self.fitted(&full, size, style, max_width));
            } else {
                current = candidate;
            }
        }
        if !current.is_empty() {
            lines.push(self.fitted(&current, size, style, max_width));
        }
        lines
    }

    fn text_ops(line: &TextLine, x: f32, baseline: f32, size: f32, color: Rgb) -> String {
        if line.runs.is_empty() {
            return String::new();
        }
        let mut ops = String::from("BT\n");
        ops.push_str(&color_op(color, "rg"));
        ops.push_str(&format!("1 0 0 1 {:.2} {:.2} Tm\n", x, baseline));
        for run in &line.runs {
            ops.push_str(&format!("{} {:.1} Tf\n", font_name(run.font), size));
            match run.font {
                RunFont::Script => ops.push_str(&format!("<{}> Tj\n", run.operand)),
                RunFont::Standard(_) => ops.push_str(&format!("({}) Tj\n", run.operand)),
            }
        }
        ops.push_str("ET\n");
        ops
    }

    fn aligned_ops(line: &TextLine, x: f32, width: f32, baseline: f32, size: f32, color: Rgb, align: Align) -> String {
        let w = line.width_at(size);
        let start = match align {
            Align::Left => x,
            Align::Right => x + width - w,
            Align::Center => x + (width - w) / 2.0,
        };
        Self::text_ops(line, start, baseline, size, color)
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgb) {
        self.current.ops.push_str(&color_op(color, "rg"));
        self.current
            .ops
            .push_str(&format!("{:.2} {:.2} {:.2} {:.2} re f\n", x, y, w, h));
    }

    fn rule(x1: f32, y1: f32, x2: f32, y2: f32, color: Rgb, width: f32) -> String {
        format!(
            "{}{:.2} w\n{:.2} {:.2} m {:.2} {:.2} l S\n",
            color_op(color, "RG"),
            width,
            x1,
            y1,
            x2,
            y2
        )
    }

    fn place_image(&mut self, image: RgbImage, x: f32, y: f32, w: f32, h: f32) {
        let index = self.images.len();
        self.images.push(image);
        self.current.images.push(index);
        self.current.ops.push_str(&format!(
            "q\n{:.2} 0 0 {:.2} {:.2} {:.2} cm\n/Im{} Do\nQ\n",
            w,
            h,
            x,
            y,
            index + 1
        ));
    }

    fn watermark_ops(&mut self) -> String {
        let Some(watermark) = self.header.watermark.clone() else {
            return String::new();
        };
        let line = self.line(&watermark.text, FontStyle::Bold);
        if line.width <= 0.0 {
            return String::new();
        }
        let diagonal = (PAGE_WIDTH * PAGE_WIDTH + PAGE_HEIGHT * PAGE_HEIGHT).sqrt();
        let size = 60.0_f32.min(0.75 * diagonal * 1000.0 / line.width);
        let angle = std::f32::consts::FRAC_PI_4;
        let (sin, cos) = angle.sin_cos();
        format!(
            "q\n/GS1 gs\n1 0 0 1 {:.2} {:.2} cm\n{:.4} {:.4} {:.4} {:.4} 0 0 cm\n{}Q\n",
            PAGE_WIDTH / 2.0,
            PAGE_HEIGHT / 2.0,
            cos,
            sin,
            -sin,
            cos,
            Self::text_ops(&line, -line.width_at(size) / 2.0, -size / 3.0, size, WATERMARK)
        )
    }

    pub fn header(&mut self, block: &HeaderBlock) -> Result<(), ExportError> {
        let logo = block.logo_png.as_ref().and_then(|png| match RgbImage::from_png(png) {
            Ok(image) => Some(image),
            Err(e) => {
                tracing::warn!(error = %e, "skipping logo that could not be decoded");
                None
            }
        });
        let (logo_w, logo_h) = logo.as_ref().map(|l| l.fit(LOGO_BOX, LOGO_BOX)).unwrap_or((0.0, 0.0));
        let text_width = self.content_width() - if logo.is_some() { logo_w + 10.0 } else { 0.0 };
        let text_x = if self.rtl && logo.is_some() {
            self.left() + logo_w + 10.0
        } else {
            self.left()
        };

        let mut lines: Vec<(TextLine, f32, f32, Rgb)> = Vec::new();
        let title = self.fitted(&block.title, 18.0, FontStyle::Bold, text_width);
        lines.push((title, 18.0, 24.0, self.header.font_color));
        if let Some(subtitle) = block.subtitle.as_deref().filter(|s| !s.trim().is_empty()) {
            let line = self.fitted(subtitle, 12.0, FontStyle::Regular, text_width);
            lines.push((line, 12.0, 18.0, self.header.font_color));
        }
        for info in &block.info_lines {
            let line = self.fitted(info, 9.0, FontStyle::Regular, text_width);
            lines.push((line, 9.0, 12.0, MUTED));
        }
        let period = self.fitted(&block.period, 10.0, FontStyle::Regular, text_width);
        lines.push((period, 10.0, 14.0, Rgb::BLACK));

        let text_height: f32 = lines.iter().map(|(_, _, advance, _)| advance).sum();
        let height = text_height.max(logo_h) + 10.0;
        self.ensure(height, "report header")?;

        let top = self.y;
        if let Some(image) = logo {
            let x = if self.rtl {
                self.left()
            } else {
                self.left() + self.content_width() - logo_w
            };
            self.place_image(image, x, top - logo_h, logo_w, logo_h);
        }

        let align = self.start_align();
        let mut cursor = top;
        for (line, size, advance, color) in &lines {
            cursor -= advance;
            let ops = Self::aligned_ops(line, text_x, text_width, cursor + (advance - size) / 2.0, *size, *color, align);
            self.current.ops.push_str(&ops);
        }

        let rule_y = top - height + 4.0;
        let ops = Self::rule(
            self.left(),
            rule_y,
            self.left() + self.content_width(),
            rule_y,
            self.header.font_color,
            1.0,
        );
        self.current.ops.push_str(&ops);
        self.y = top - height - BLOCK_GAP;
        Ok(())
    }

    fn cell_text(&self, value: &Scalar) -> String {
        match value {
            Scalar::Number(n) => self.header.locale.format_number(*n),
            other => other.display(),
        }
    }

    /// Natural column widths, scaled to exactly fill the content width.
    fn column_widths(&mut self, block: &TableBlock, cells: &[Vec<String>]) -> Vec<f32> {
        let mut widths: Vec<f32> = block
            .columns
            .iter()
            .map(|c| self.line(&c.label, FontStyle::Bold).width_at(CELL_FONT))
            .collect();
        for row in cells.iter().take(200) {
            for (i, text) in row.iter().enumerate() {
                let w = self.line(text, FontStyle::Regular).width_at(CELL_FONT);
                if let Some(slot) = widths.get_mut(i) {
                    *slot = slot.max(w);
                }
            }
        }
        let natural: Vec<f32> = widths.iter().map(|w| (w + 2.0 * CELL_PADDING).max(MIN_COLUMN)).collect();
        let total: f32 = natural.iter().sum();
        let scale = if total > 0.0 { self.content_width() / total } else { 1.0 };
        natural.into_iter().map(|w| w * scale).collect()
    }

    /// Cell x positions in drawing order; mirrored for right-to-left.
    fn column_offsets(&self, widths: &[f32]) -> Vec<f32> {
        let mut offsets = Vec::with_capacity(widths.len());
        let mut x = if self.rtl {
            self.left() + self.content_width()
        } else {
            self.left()
        };
        for w in widths {
            if self.rtl {
                x -= w;
                offsets.push(x);
            } else {
                offsets.push(x);
                x += w;
            }
        }
        offsets
    }

    fn header_row(&mut self, block: &TableBlock, widths: &[f32], offsets: &[f32]) {
        let bg = self.header.table_header_bg;
        let fg = bg.contrasting_text();
        let y = self.y - ROW_HEIGHT;
        self.fill_rect(self.left(), y, self.content_width(), ROW_HEIGHT, bg);
        let align = self.start_align();
        for (i, column) in block.columns.iter().enumerate() {
            let inner = widths[i] - 2.0 * CELL_PADDING;
            let line = self.fitted(&column.label, CELL_FONT, FontStyle::Bold, inner);
            let ops = Self::aligned_ops(&line, offsets[i] + CELL_PADDING, inner, y + 5.0, CELL_FONT, fg, align);
            self.current.ops.push_str(&ops);
        }
        self.y = y;
    }

    fn body_row(&mut self, index: usize, row: &[String], block: &TableBlock, widths: &[f32], offsets: &[f32]) {
        let y = self.y - ROW_HEIGHT;
        let bg = if self.header.zebra_stripes && index % 2 == 1 {
            ZEBRA
        } else {
            self.header.table_body_bg
        };
        if bg != Rgb::WHITE {
            self.fill_rect(self.left(), y, self.content_width(), ROW_HEIGHT, bg);
        }
        for (i, text) in row.iter().enumerate().take(widths.len()) {
            let inner = widths[i] - 2.0 * CELL_PADDING;
            let align = match block.rows[index].get(i) {
                Some(Scalar::Number(_)) => self.end_align(),
                _ => self.start_align(),
            };
            let line = self.fitted(text, CELL_FONT, FontStyle::Regular, inner);
            let ops = Self::aligned_ops(&line, offsets[i] + CELL_PADDING, inner, y + 5.0, CELL_FONT, Rgb::BLACK, align);
            self.current.ops.push_str(&ops);
        }
        let ops = Self::rule(self.left(), y, self.left() + self.content_width(), y, BORDER, 0.5);
        self.current.ops.push_str(&ops);
        self.y = y;
    }

    /// Tables split across pages, repeating the column header on each.
    pub fn table(&mut self, block: &TableBlock) -> Result<(), ExportError> {
        let title_height = 20.0;
        self.ensure(title_height + 2.0 * ROW_HEIGHT, "table heading")?;

        let title = self.fitted(&block.title, 12.0, FontStyle::Bold, self.content_width());
        let ops = Self::aligned_ops(
            &title,
            self.left(),
            self.content_width(),
            self.y - 14.0,
            12.0,
            self.header.font_color,
            self.start_align(),
        );
        self.current.ops.push_str(&ops);
        self.y -= title_height;

        if block.columns.is_empty() || block.rows.is_empty() {
            let line = self.line("No records", FontStyle::Regular);
            let ops = Self::aligned_ops(
                &line,
                self.left() + CELL_PADDING,
                self.content_width() - 2.0 * CELL_PADDING,
                self.y - 11.0,
                CELL_FONT + 1.0,
                MUTED,
                self.start_align(),
            );
            self.current.ops.push_str(&ops);
            self.y -= ROW_HEIGHT + BLOCK_GAP;
            return Ok(());
        }

        let cells: Vec<Vec<String>> = block
            .rows
            .iter()
            .map(|row| row.iter().map(|v| self.cell_text(v)).collect())
            .collect();
        let widths = self.column_widths(block, &cells);
        let offsets = self.column_offsets(&widths);

        self.header_row(block, &widths, &offsets);
        for (index, row) in cells.iter().enumerate() {
            if self.y - ROW_HEIGHT < self.bottom() {
                self.new_page();
                self.header_row(block, &widths, &offsets);
            }
            self.body_row(index, row, block, &widths, &offsets);
        }
        self.y -= BLOCK_GAP;
        Ok(())
    }

    pub fn chart(&mut self, block: &ChartBlock) -> Result<(), ExportError> {
        let chart = &block.chart;
        let image = RgbImage::new(chart.width, chart.height, chart.rgb.clone())?;
        let caption_height = 18.0;
        let per_row = ((self.content_width() / LEGEND_COLUMN).floor() as usize).max(1);
        let legend_rows = chart.legend.len().div_ceil(per_row);
        let legend_height = legend_rows as f32 * LEGEND_LINE;

        let (mut img_w, mut img_h) = image.fit(
            (chart.display_size.0 * 72.0).min(self.content_width()),
            chart.display_size.1 * 72.0,
        );
        let chrome = caption_height + 6.0 + legend_height;
        let usable = self.top() - self.bottom();
        if img_h + chrome > usable {
            let shrunk = usable - chrome;
            if shrunk < 40.0 {
                return Err(ExportError::render(format!(
                    "chart '{}' with {} legend entries does not fit on a page",
                    block.title,
                    chart.legend.len()
                )));
            }
            img_w *= shrunk / img_h;
            img_h = shrunk;
        }
        let height = img_h + chrome;
        self.ensure(height, "chart")?;

        let caption = self.fitted(&block.title, 11.0, FontStyle::Bold, self.content_width());
        let ops = Self::aligned_ops(
            &caption,
            self.left(),
            self.content_width(),
            self.y - 13.0,
            11.0,
            self.header.font_color,
            Align::Center,
        );
        self.current.ops.push_str(&ops);

        let top = self.y - caption_height;
        let x = self.left() + (self.content_width() - img_w) / 2.0;
        self.place_image(image, x, top - img_h, img_w, img_h);

        let legend_top = top - img_h - 6.0;
        let column_width = self.content_width() / per_row as f32;
        for (i, entry) in chart.legend.iter().enumerate() {
            let row = (i / per_row) as f32;
            let col = (i % per_row) as f32;
            let baseline = legend_top - (row + 1.0) * LEGEND_LINE + 3.0;
            let label = format!("{}: {}", entry.label, self.header.locale.format_number(entry.value));
            let text_width = column_width - 14.0;
            let line = self.fitted(&label, CELL_FONT, FontStyle::Regular, text_width);
            let (swatch_x, text_x, align) = if self.rtl {
                let cell_right = self.left() + self.content_width() - col * column_width;
                (cell_right - 8.0, cell_right - 12.0 - text_width, Align::Right)
            } else {
                let cell_left = self.left() + col * column_width;
                (cell_left, cell_left + 12.0, Align::Left)
            };
            self.fill_rect(swatch_x, baseline - 1.0, 8.0, 8.0, entry.color);
            let ops = Self::aligned_ops(&line, text_x, text_width, baseline, CELL_FONT, Rgb::BLACK, align);
            self.current.ops.push_str(&ops);
        }

        self.y -= height + BLOCK_GAP;
        Ok(())
    }

    pub fn paragraph(&mut self, block: &TextBlock) -> Result<(), ExportError> {
        let width = self.content_width();
        let lines = self.wrapped(&block.text, 10.0, FontStyle::Regular, width);
        let height = lines.len() as f32 * 14.0;
        self.ensure(height, "text block")?;
        let align = self.start_align();
        for line in &lines {
            self.y -= 14.0;
            let ops = Self::aligned_ops(line, self.left(), width, self.y + 3.0, 10.0, MUTED, align);
            self.current.ops.push_str(&ops);
        }
        self.y -= BLOCK_GAP;
        Ok(())
    }

    /// Close the last page and stamp footers now that the page count is known.
    pub fn finish(mut self) -> LaidOut {
        let last = std::mem::take(&mut self.current);
        self.pages.push(last);
        let mut pages = std::mem::take(&mut self.pages);
        let total = pages.len();

        let rule_y = self.margin + FOOTER_HEIGHT - 6.0;
        let baseline = self.margin + 4.0;
        let half = self.content_width() / 2.0;
        let footer = self.header.footer_text.clone().filter(|t| !t.trim().is_empty());
        for (i, page) in pages.iter_mut().enumerate() {
            page.ops.push_str(&Self::rule(
                self.left(),
                rule_y,
                self.left() + self.content_width(),
                rule_y,
                BORDER,
                0.5,
            ));
            let (start_x, end_x) = if self.rtl {
                (self.left() + half, self.left())
            } else {
                (self.left(), self.left() + half)
            };
            if let Some(text) = &footer {
                let line = self.fitted(text, 8.0, FontStyle::Regular, half - 10.0);
                page.ops
                    .push_str(&Self::aligned_ops(&line, start_x, half, baseline, 8.0, MUTED, self.start_align()));
            }
            if self.header.show_page_numbers {
                let line = self.line(&format!("Page {} of {}", i + 1, total), FontStyle::Regular);
                page.ops
                    .push_str(&Self::aligned_ops(&line, end_x, half, baseline, 8.0, MUTED, self.end_align()));
            }
        }

        LaidOut {
            pages,
            images: self.images,
            usage: self.usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::TableColumn;
    use crate::domain::request::{HeaderConfig, HeaderDefaults};
    use crate::domain::table::ColumnKind;

    fn header() -> ResolvedHeader {
        ResolvedHeader::resolve(HeaderConfig::default(), &HeaderDefaults::default(), "Risks", None).unwrap()
    }

    fn table(rows: usize) -> TableBlock {
        TableBlock {
            title: "All Risks".to_string(),
            columns: vec![
                TableColumn {
                    key: "code".to_string(),
                    label: "Code".to_string(),
                    kind: ColumnKind::Text,
                },
                TableColumn {
                    key: "score".to_string(),
                    label: "Score".to_string(),
                    kind: ColumnKind::Number,
                },
            ],
            rows: (0..rows)
                .map(|i| vec![Scalar::Text(format!("R-{}", i)), Scalar::Number(i as f64 * 1000.0)])
                .collect(),
        }
    }

    #[test]
    fn test_long_table_repeats_header_on_every_page() {
        let fonts = FontSet::default();
        let header = header();
        let mut canvas = Canvas::new(&fonts, &header, 40.0);
        canvas.table(&table(120)).unwrap();
        let laid = canvas.finish();

        assert!(laid.pages.len() >= 3);
        for page in &laid.pages {
            assert!(page.ops.contains("(Code) Tj"), "every page carries the column header");
        }
        assert!(laid.pages[0].ops.contains("(All Risks) Tj"));
        assert!(!laid.pages[1].ops.contains("(All Risks) Tj"));
        let last = laid.pages.len();
        assert!(laid.pages[last - 1].ops.contains(&format!("(Page {} of {}) Tj", last, last)));
    }

    #[test]
    fn test_watermark_sits_beneath_content_on_every_page() {
        let fonts = FontSet::default();
        let config = HeaderConfig {
            watermark_enabled: Some(true),
            watermark_text: Some("DRAFT".to_string()),
            ..HeaderConfig::default()
        };
        let header = ResolvedHeader::resolve(config, &HeaderDefaults::default(), "Risks", None).unwrap();
        let mut canvas = Canvas::new(&fonts, &header, 40.0);
        canvas.table(&table(120)).unwrap();
        let laid = canvas.finish();

        assert!(laid.pages.len() >= 3);
        for (i, page) in laid.pages.iter().enumerate() {
            assert!(page.ops.starts_with("q\n/GS1 gs\n"), "page {} does not open with the watermark", i + 1);
            let watermark_end = page.ops.find("Q\n").unwrap();
            assert!(page.ops[..watermark_end].contains("(DRAFT) Tj"));
            let header_at = page.ops.find("(Code) Tj").unwrap();
            assert!(watermark_end < header_at, "page {} draws the table before the watermark", i + 1);
            assert_eq!(page.ops.matches("/GS1 gs").count(), 1);
        }
    }

    #[test]
    fn test_numbers_use_locale_grouping() {
        let fonts = FontSet::default();
        let header = header();
        let mut canvas = Canvas::new(&fonts, &header, 40.0);
        canvas.table(&table(3)).unwrap();
        let laid = canvas.finish();
        assert!(laid.pages[0].ops.contains("(2,000) Tj"));
    }

    #[test]
    fn test_huge_margin_is_render_failure() {
        let fonts = FontSet::default();
        let header = header();
        let mut canvas = Canvas::new(&fonts, &header, 405.0);
        let err = canvas.table(&table(1)).unwrap_err();
        assert_eq!(err.kind(), crate::domain::error::ErrorKind::RenderFailure);
    }

    #[test]
    fn test_truncates_wide_cells() {
        let fonts = FontSet::default();
        let header = header();
        let mut canvas = Canvas::new(&fonts, &header, 40.0);
        let line = canvas.fitted("a very long label that will never fit", 8.0, FontStyle::Regular, 40.0);
        assert!(line.width_at(8.0) <= 40.0);
        assert!(line.runs[0].operand.ends_with("..."));
    }
}
