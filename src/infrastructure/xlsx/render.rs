// Writes planned sheets into an xlsx workbook
use super::sheet::{Cell, Role, SheetBuilder, Style};
use crate::domain::document::Rgb;
use crate::domain::error::ExportError;
use crate::domain::request::ResolvedHeader;
use chrono::{Datelike, NaiveDate};
use rust_xlsxwriter::{
    Color, DocProperties, ExcelDateTime, Format, FormatAlign, FormatBorder, Image, Workbook, Worksheet,
};
use std::collections::HashMap;

const ZEBRA: Rgb = Rgb(242, 242, 242);
const BORDER: Rgb = Rgb(210, 210, 210);
const NOTICE: Rgb = Rgb(90, 90, 90);
const MIN_COLUMN_WIDTH: usize = 8;

fn color(rgb: Rgb) -> Color {
    Color::RGB((u32::from(rgb.0) << 16) | (u32::from(rgb.1) << 8) | u32::from(rgb.2))
}

fn format_for(style: Style, header: &ResolvedHeader) -> Format {
    let base = Format::new().set_font_name("Calibri").set_font_size(11);
    let body = |format: Format| {
        let fill = if style.zebra { ZEBRA } else { header.table_body_bg };
        format
            .set_background_color(color(fill))
            .set_border(FormatBorder::Thin)
            .set_border_color(color(BORDER))
            .set_align(FormatAlign::VerticalCenter)
    };
    match style.role {
        Role::Title => base.set_bold().set_font_size(16).set_font_color(color(header.font_color)),
        Role::Banner => base,
        Role::Section => base.set_bold().set_font_size(12).set_font_color(color(header.font_color)),
        Role::Header => base
            .set_bold()
            .set_font_color(color(header.table_header_bg.contrasting_text()))
            .set_background_color(color(header.table_header_bg))
            .set_border(FormatBorder::Thin)
            .set_border_color(color(BORDER))
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter),
        Role::Text => body(base),
        Role::Integer => body(base.set_num_format("#,##0").set_align(FormatAlign::Right)),
        Role::Decimal => body(base.set_num_format("#,##0.00").set_align(FormatAlign::Right)),
        Role::Date => body(base.set_num_format("yyyy-mm-dd").set_align(FormatAlign::Center)),
        Role::Notice => base.set_italic().set_font_size(10).set_font_color(color(NOTICE)),
    }
}

/// Formats built on first use, shared by every sheet in the workbook.
struct Formats<'a> {
    header: &'a ResolvedHeader,
    cache: HashMap<Style, Format>,
}

impl<'a> Formats<'a> {
    fn new(header: &'a ResolvedHeader) -> Self {
        Self {
            header,
            cache: HashMap::new(),
        }
    }

    fn get(&mut self, style: Style) -> &Format {
        let header = self.header;
        self.cache.entry(style).or_insert_with(|| format_for(style, header))
    }
}

fn row_num(row: usize) -> Result<u32, ExportError> {
    u32::try_from(row).map_err(|_| ExportError::render(format!("row {} is out of range", row)))
}

fn col_num(col: usize) -> Result<u16, ExportError> {
    u16::try_from(col).map_err(|_| ExportError::render(format!("column {} is out of range", col)))
}

fn excel_date(date: NaiveDate) -> Option<ExcelDateTime> {
    let year = u16::try_from(date.year()).ok()?;
    ExcelDateTime::from_ymd(year, date.month() as u8, date.day() as u8).ok()
}

/// Print header carries the watermark; print footer the confidentiality
/// text and page numbers.
pub fn header_footer(header: &ResolvedHeader) -> (Option<String>, Option<String>) {
    let print_header = header
        .watermark
        .as_ref()
        .map(|w| format!("&C&\"-,Bold\"&20&KA0A0A0{}", w.text.replace('&', "&&")));
    let mut footer = String::new();
    if let Some(text) = &header.footer_text {
        footer.push_str(&format!("&L{}", text.replace('&', "&&")));
    }
    if header.show_page_numbers {
        footer.push_str("&RPage &P of &N");
    }
    (print_header, (!footer.is_empty()).then_some(footer))
}

fn write_cell(
    worksheet: &mut Worksheet,
    formats: &mut Formats,
    row: u32,
    col: u16,
    cell: &Cell,
) -> Result<(), ExportError> {
    match cell {
        Cell::Empty => return Ok(()),
        Cell::Text(text, style) => {
            worksheet.write_string_with_format(row, col, text, formats.get(*style))
        }
        Cell::Number(value, style) if value.is_finite() => {
            worksheet.write_number_with_format(row, col, *value, formats.get(*style))
        }
        Cell::Number(value, style) => {
            worksheet.write_string_with_format(row, col, value.to_string(), formats.get(*style))
        }
        Cell::Date(date, style) => match excel_date(*date) {
            Some(datetime) => worksheet.write_datetime_with_format(row, col, &datetime, formats.get(*style)),
            None => worksheet.write_string_with_format(row, col, date.to_string(), formats.get(*style)),
        },
    }
    .map_err(ExportError::render)?;
    Ok(())
}

fn write_sheet(
    worksheet: &mut Worksheet,
    sheet: &SheetBuilder,
    header: &ResolvedHeader,
    formats: &mut Formats,
) -> Result<(), ExportError> {
    worksheet.set_name(&sheet.name).map_err(ExportError::render)?;
    worksheet
        .set_right_to_left(header.locale.is_rtl())
        .set_landscape()
        .set_margins(0.5, 0.5, 0.75, 0.75, 0.3, 0.3)
        .set_print_fit_to_pages(1, 0);

    let (print_header, print_footer) = header_footer(header);
    if let Some(text) = print_header {
        worksheet.set_header(&text);
    }
    if let Some(text) = print_footer {
        worksheet.set_footer(&text);
    }

    for (col, width) in sheet.widths().iter().enumerate() {
        worksheet
            .set_column_width(col_num(col)?, (*width).max(MIN_COLUMN_WIDTH) as f64)
            .map_err(ExportError::render)?;
    }

    let banner_end = col_num(sheet.banner_end())?;
    for (index, cells) in sheet.rows() {
        let row = row_num(index)?;
        if sheet.is_banner(index) {
            if let Some(Cell::Text(text, style)) = cells.first() {
                worksheet
                    .merge_range(row, 0, row, banner_end, text, formats.get(*style))
                    .map_err(ExportError::render)?;
                continue;
            }
        }
        for (col, cell) in cells.iter().enumerate() {
            write_cell(worksheet, formats, row, col_num(col)?, cell)?;
        }
    }

    for anchor in &sheet.images {
        let image = Image::new_from_buffer(&anchor.png).map_err(ExportError::render)?;
        let (width, height) = (image.width(), image.height());
        let image = image
            .set_scale_width(f64::from(anchor.width_px) / width)
            .set_scale_height(f64::from(anchor.height_px) / height)
            .set_alt_text(&anchor.description);
        worksheet
            .insert_image(row_num(anchor.row)?, col_num(anchor.col)?, &image)
            .map_err(ExportError::render)?;
    }
    Ok(())
}

/// Render every sheet and serialize the workbook. The creation timestamp
/// is pinned so identical inputs produce identical bytes.
pub fn write_workbook(sheets: &[SheetBuilder], header: &ResolvedHeader) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let created = ExcelDateTime::from_ymd(2000, 1, 1).map_err(ExportError::render)?;
    let properties = DocProperties::new()
        .set_title(&header.title)
        .set_creation_datetime(&created);
    workbook.set_properties(&properties);

    let mut formats = Formats::new(header);
    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        write_sheet(worksheet, sheet, header, &mut formats)?;
    }
    workbook.save_to_buffer().map_err(ExportError::render)
}
