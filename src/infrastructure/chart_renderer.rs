// Chart rasterisation with plotters onto an in-memory RGB buffer
use crate::application::rendering::{ChartOptions, ChartRenderer};
use crate::domain::chart::{ChartPoint, ChartSeries, ChartType};
use crate::domain::document::{ImageFormat, LegendEntry, RenderedChart, Rgb};
use crate::domain::error::ExportError;
use crate::domain::locale::Locale;
use crate::domain::table::ResultTable;
use crate::infrastructure::assets::DEFAULT_FONT;
use crate::infrastructure::pdf::visual_order;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{register_font, FontStyle};
use std::f64::consts::PI;
use std::sync::{Arc, OnceLock};

const PALETTE: [Rgb; 10] = [
    Rgb(0x1F, 0x77, 0xB4),
    Rgb(0xFF, 0x7F, 0x0E),
    Rgb(0x2C, 0xA0, 0x2C),
    Rgb(0xD6, 0x27, 0x28),
    Rgb(0x94, 0x67, 0xBD),
    Rgb(0x8C, 0x56, 0x4B),
    Rgb(0xE3, 0x77, 0xC2),
    Rgb(0x7F, 0x7F, 0x7F),
    Rgb(0xBC, 0xBD, 0x22),
    Rgb(0x17, 0xBE, 0xCF),
];

const AXIS: RGBColor = RGBColor(0x59, 0x59, 0x59);
const GRID: RGBColor = RGBColor(0xE0, 0xE0, 0xE0);
const INK: RGBColor = RGBColor(0x26, 0x26, 0x26);

const FONT_FAMILY: &str = "sans-serif";
const TICKS: usize = 4;

static FONT_READY: OnceLock<bool> = OnceLock::new();

/// Register the bundled font with plotters once per process. Charts are
/// drawn without text when registration fails.
fn font_ready() -> bool {
    *FONT_READY.get_or_init(|| match register_font(FONT_FAMILY, FontStyle::Normal, DEFAULT_FONT) {
        Ok(()) => true,
        Err(_) => {
            tracing::warn!("chart font failed to load, rendering charts without text");
            false
        }
    })
}

fn color(rgb: Rgb) -> RGBColor {
    RGBColor(rgb.0, rgb.1, rgb.2)
}

fn palette(index: usize) -> Rgb {
    PALETTE[index % PALETTE.len()]
}

/// Pixel rectangle available for plotting plus the value scale.
struct Frame {
    left: i32,
    right: i32,
    top: i32,
    bottom: i32,
    min: f64,
    max: f64,
}

/// Text settings for one chart; `None` when no font is available.
struct Labels {
    size: f64,
    locale: Locale,
}

impl Labels {
    fn new(height: u32, locale: Locale) -> Option<Self> {
        font_ready().then(|| Self {
            size: (height as f64 * 0.055).max(9.0),
            locale,
        })
    }

    fn style(&self, scale: f64, pos: Pos) -> TextStyle<'static> {
        (FONT_FAMILY, self.size * scale).into_font().color(&INK).pos(pos)
    }

    /// Shape and reorder for drawing, clipped to roughly `max_width` pixels.
    fn prepare(&self, text: &str, max_width: f64) -> String {
        let fits = ((max_width / (self.size * 0.55)).floor() as usize).max(3);
        let clipped: String = if text.chars().count() > fits {
            let mut short: String = text.chars().take(fits - 1).collect();
            short.push('\u{2026}');
            short
        } else {
            text.to_string()
        };
        visual_order(&clipped, self.locale.is_rtl())
    }

    fn draw(&self, root: &Area<'_>, text: &str, at: (i32, i32), style: &TextStyle<'_>) -> Result<(), ExportError> {
        if text.trim().is_empty() {
            return Ok(());
        }
        root.draw(&Text::new(text, at, style.clone())).map_err(ExportError::render)
    }
}

impl Frame {
    fn new(width: u32, height: u32, points: &[(usize, ChartPoint)], titled: bool) -> Self {
        let (w, h) = (width as f64, height as f64);
        let lowest = points.iter().map(|(_, p)| p.value).fold(0.0_f64, f64::min);
        let highest = points.iter().map(|(_, p)| p.value).fold(0.0_f64, f64::max);
        let span = highest - lowest;
        let (min, max) = if span <= f64::EPSILON {
            (lowest, lowest + 1.0)
        } else {
            (
                if lowest < 0.0 { lowest - span * 0.05 } else { lowest },
                highest + span * 0.08,
            )
        };
        Self {
            left: (w * 0.13).round() as i32,
            right: (w * 0.97).round() as i32,
            top: (h * if titled { 0.15 } else { 0.06 }).round() as i32,
            bottom: (h * 0.84).round() as i32,
            min,
            max,
        }
    }

    /// Gridline values from just above the minimum to the maximum.
    fn ticks(&self) -> impl Iterator<Item = f64> + '_ {
        (1..=TICKS).map(|step| self.min + (self.max - self.min) * step as f64 / TICKS as f64)
    }

    fn y(&self, value: f64) -> i32 {
        let ratio = (value - self.min) / (self.max - self.min);
        (self.bottom as f64 - ratio * (self.bottom - self.top) as f64).round() as i32
    }

    fn slot(&self, count: usize) -> f64 {
        (self.right - self.left) as f64 / count.max(1) as f64
    }

    /// Horizontal centre of category `i` of `count`.
    fn x(&self, i: usize, count: usize) -> i32 {
        (self.left as f64 + self.slot(count) * (i as f64 + 0.5)).round() as i32
    }
}

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// Value axis labels in the chart's locale, with their pixel rows.
fn tick_labels(frame: &Frame, locale: Locale) -> Vec<(i32, String)> {
    frame
        .ticks()
        .map(|value| {
            let rounded = if (value - value.round()).abs() < 1e-9 { value.round() } else { value };
            (frame.y(value), locale.format_number(rounded))
        })
        .collect()
}

fn draw_title(root: &Area<'_>, width: u32, labels: Option<&Labels>, title: Option<&str>) -> Result<(), ExportError> {
    let (Some(labels), Some(title)) = (labels, title) else {
        return Ok(());
    };
    let style = labels.style(1.25, Pos::new(HPos::Center, VPos::Top));
    let text = labels.prepare(title, width as f64 * 0.9);
    labels.draw(root, &text, ((width / 2) as i32, (labels.size * 0.3).round() as i32), &style)
}

/// Tick values beside the value axis and category names under the plot.
fn draw_axis_labels(
    root: &Area<'_>,
    frame: &Frame,
    labels: Option<&Labels>,
    points: &[(usize, ChartPoint)],
) -> Result<(), ExportError> {
    let Some(labels) = labels else {
        return Ok(());
    };
    let tick_style = labels.style(0.9, Pos::new(HPos::Right, VPos::Center));
    for (y, text) in tick_labels(frame, labels.locale) {
        labels.draw(root, &text, (frame.left - 4, y), &tick_style)?;
    }

    let category_style = labels.style(1.0, Pos::new(HPos::Center, VPos::Top));
    let slot = frame.slot(points.len());
    for (i, (_, point)) in points.iter().enumerate() {
        let text = labels.prepare(&point.name, slot * 0.95);
        labels.draw(root, &text, (frame.x(i, points.len()), frame.bottom + 4), &category_style)?;
    }
    Ok(())
}

fn draw_axes(root: &Area<'_>, frame: &Frame) -> Result<(), ExportError> {
    for value in frame.ticks() {
        let y = frame.y(value);
        root.draw(&PathElement::new(vec![(frame.left, y), (frame.right, y)], GRID.stroke_width(1)))
            .map_err(ExportError::render)?;
    }
    let zero = frame.y(0.0_f64.clamp(frame.min, frame.max));
    root.draw(&PathElement::new(vec![(frame.left, zero), (frame.right, zero)], AXIS.stroke_width(2)))
        .map_err(ExportError::render)?;
    root.draw(&PathElement::new(
        vec![(frame.left, frame.top), (frame.left, frame.bottom)],
        AXIS.stroke_width(2),
    ))
    .map_err(ExportError::render)?;
    Ok(())
}

fn draw_bars(root: &Area<'_>, frame: &Frame, points: &[(usize, ChartPoint)]) -> Result<(), ExportError> {
    draw_axes(root, frame)?;
    let slot = frame.slot(points.len());
    let base = frame.y(0.0_f64.clamp(frame.min, frame.max));
    for (i, (index, point)) in points.iter().enumerate() {
        let x0 = (frame.left as f64 + slot * i as f64 + slot * 0.15).round() as i32;
        let x1 = (frame.left as f64 + slot * (i + 1) as f64 - slot * 0.15).round() as i32;
        let y = frame.y(point.value);
        let (top, bottom) = if y <= base { (y, base) } else { (base, y) };
        root.draw(&Rectangle::new([(x0, top), (x1.max(x0 + 1), bottom)], color(palette(*index)).filled()))
            .map_err(ExportError::render)?;
    }
    Ok(())
}

fn polyline(frame: &Frame, points: &[(usize, ChartPoint)]) -> Vec<(i32, i32)> {
    points
        .iter()
        .enumerate()
        .map(|(i, (_, p))| (frame.x(i, points.len()), frame.y(p.value)))
        .collect()
}

fn draw_markers(root: &Area<'_>, path: &[(i32, i32)], points: &[(usize, ChartPoint)], radius: i32) -> Result<(), ExportError> {
    for (coord, (index, _)) in path.iter().zip(points) {
        root.draw(&Circle::new(*coord, radius, color(palette(*index)).filled()))
            .map_err(ExportError::render)?;
    }
    Ok(())
}

fn draw_line(root: &Area<'_>, frame: &Frame, points: &[(usize, ChartPoint)], filled: bool) -> Result<(), ExportError> {
    draw_axes(root, frame)?;
    let path = polyline(frame, points);
    let primary = color(PALETTE[0]);
    if filled {
        let base = frame.y(0.0_f64.clamp(frame.min, frame.max));
        let mut outline = Vec::with_capacity(path.len() + 2);
        outline.push((path[0].0, base));
        outline.extend(path.iter().copied());
        outline.push((path[path.len() - 1].0, base));
        root.draw(&Polygon::new(outline, primary.mix(0.35).filled()))
            .map_err(ExportError::render)?;
    }
    root.draw(&PathElement::new(path.clone(), primary.stroke_width(3)))
        .map_err(ExportError::render)?;
    draw_markers(root, &path, points, 5)
}

fn draw_scatter(root: &Area<'_>, frame: &Frame, points: &[(usize, ChartPoint)]) -> Result<(), ExportError> {
    draw_axes(root, frame)?;
    let path = polyline(frame, points);
    draw_markers(root, &path, points, 7)
}

fn draw_pie(root: &Area<'_>, width: u32, height: u32, top: i32, points: &[(usize, ChartPoint)]) -> Result<(), ExportError> {
    let total: f64 = points.iter().map(|(_, p)| p.value).sum();
    let plot_height = (height as f64 - top as f64).max(1.0);
    let (cx, cy) = (width as f64 / 2.0, top as f64 + plot_height / 2.0);
    let radius = (width as f64).min(plot_height) * 0.42;

    let mut start = -PI / 2.0;
    for (index, point) in points {
        let sweep = 2.0 * PI * point.value / total;
        let steps = ((sweep / (PI / 90.0)).ceil() as usize).max(2);
        let mut outline = Vec::with_capacity(steps + 2);
        outline.push((cx.round() as i32, cy.round() as i32));
        for step in 0..=steps {
            let angle = start + sweep * step as f64 / steps as f64;
            outline.push((
                (cx + radius * angle.cos()).round() as i32,
                (cy + radius * angle.sin()).round() as i32,
            ));
        }
        root.draw(&Polygon::new(outline.clone(), color(palette(*index)).filled()))
            .map_err(ExportError::render)?;
        if points.len() > 1 {
            outline.push(outline[0]);
            root.draw(&PathElement::new(outline, WHITE.stroke_width(2)))
                .map_err(ExportError::render)?;
        }
        start += sweep;
    }
    Ok(())
}

pub fn encode_png(rgb: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ExportError> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().map_err(ExportError::render)?;
        writer.write_image_data(rgb).map_err(ExportError::render)?;
        writer.finish().map_err(ExportError::render)?;
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlottersChartRenderer;

impl PlottersChartRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl ChartRenderer for PlottersChartRenderer {
    fn render(
        &self,
        chart_type: ChartType,
        table: &ResultTable,
        options: &ChartOptions,
    ) -> Result<RenderedChart, ExportError> {
        let label = options.title.clone().unwrap_or_else(|| chart_type.to_string());
        let ChartSeries { points, mut dropped } = ChartSeries::from_table(table);

        let mut points: Vec<(usize, ChartPoint)> = points.into_iter().enumerate().collect();
        if chart_type == ChartType::Pie {
            let before = points.len();
            points.retain(|(_, p)| p.value > 0.0);
            dropped += before - points.len();
        }
        if dropped > 0 {
            tracing::warn!(chart = %label, dropped, kept = points.len(), "dropped chart rows without usable name/value");
        }
        if points.is_empty() {
            return Err(ExportError::EmptyChartData { chart: label, dropped });
        }

        let legend = points
            .iter()
            .map(|(index, p)| LegendEntry {
                label: p.name.clone(),
                value: p.value,
                color: palette(*index),
            })
            .collect();

        if options.locale.is_rtl() && chart_type != ChartType::Pie {
            points.reverse();
        }

        let (width, height) = options.pixel_size();
        let mut buffer = vec![0u8; width as usize * height as usize * 3];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
            root.fill(&WHITE).map_err(ExportError::render)?;
            let labels = Labels::new(height, options.locale);
            let title = options.title.as_deref().filter(|t| !t.trim().is_empty());
            let frame = Frame::new(width, height, &points, title.is_some() && labels.is_some());
            match chart_type {
                ChartType::Bar => draw_bars(&root, &frame, &points)?,
                ChartType::Line => draw_line(&root, &frame, &points, false)?,
                ChartType::Area => draw_line(&root, &frame, &points, true)?,
                ChartType::Scatter => draw_scatter(&root, &frame, &points)?,
                ChartType::Pie => draw_pie(&root, width, height, frame.top, &points)?,
            }
            if chart_type != ChartType::Pie {
                draw_axis_labels(&root, &frame, labels.as_ref(), &points)?;
            }
            draw_title(&root, width, labels.as_ref(), title)?;
            root.present().map_err(ExportError::render)?;
        }

        let png = encode_png(&buffer, width, height)?;
        Ok(RenderedChart {
            width,
            height,
            format: ImageFormat::Png,
            png: Arc::new(png),
            rgb: Arc::new(buffer),
            title: options.title.clone(),
            legend,
            display_size: options.figsize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(rows: Vec<serde_json::Value>) -> ResultTable {
        ResultTable::from_json_objects(&rows).unwrap()
    }

    fn options() -> ChartOptions {
        ChartOptions {
            dpi: 50,
            figsize: (4.0, 3.0),
            title: Some("Risks by Status".to_string()),
            locale: Locale::EN,
        }
    }

    fn categories() -> ResultTable {
        table(vec![
            json!({"name": "A", "value": 10}),
            json!({"name": "B", "value": 5}),
            json!({"name": "C", "value": 2}),
        ])
    }

    #[test]
    fn test_every_chart_type_renders_deterministically() {
        let renderer = PlottersChartRenderer::new();
        for chart_type in [ChartType::Bar, ChartType::Pie, ChartType::Line, ChartType::Area, ChartType::Scatter] {
            let first = renderer.render(chart_type, &categories(), &options()).unwrap();
            let second = renderer.render(chart_type, &categories(), &options()).unwrap();
            assert_eq!(first.png, second.png, "{} output differs", chart_type);
            assert_eq!((first.width, first.height), (200, 150));
            assert_eq!(first.rgb.len(), 200 * 150 * 3);
            assert!(first.png.starts_with(&[137, 80, 78, 71, 13, 10, 26, 10]));
            assert!(first.rgb.chunks(3).any(|px| px != [255, 255, 255]));
        }
    }

    #[test]
    fn test_empty_chart_data() {
        let renderer = PlottersChartRenderer::new();
        let rows = table(vec![json!({"name": "A"}), json!({"name": "B", "value": null})]);
        let err = renderer.render(ChartType::Bar, &rows, &options()).unwrap_err();
        assert!(matches!(err, ExportError::EmptyChartData { dropped: 2, .. }));
    }

    #[test]
    fn test_pie_skips_non_positive_slices() {
        let renderer = PlottersChartRenderer::new();
        let rows = table(vec![
            json!({"name": "A", "value": 3}),
            json!({"name": "B", "value": 0}),
            json!({"name": "C", "value": -1}),
        ]);
        let chart = renderer.render(ChartType::Pie, &rows, &options()).unwrap();
        assert_eq!(chart.legend.len(), 1);
        assert_eq!(chart.legend[0].label, "A");

        let none = table(vec![json!({"name": "B", "value": 0})]);
        assert!(matches!(
            renderer.render(ChartType::Pie, &none, &options()),
            Err(ExportError::EmptyChartData { dropped: 1, .. })
        ));
    }

    #[test]
    fn test_rtl_mirrors_categories_but_not_legend() {
        let renderer = PlottersChartRenderer::new();
        let ltr = renderer.render(ChartType::Bar, &categories(), &options()).unwrap();
        let rtl = renderer
            .render(
                ChartType::Bar,
                &categories(),
                &ChartOptions {
                    locale: Locale::AR,
                    ..options()
                },
            )
            .unwrap();
        assert_ne!(ltr.rgb, rtl.rgb);
        assert_eq!(ltr.legend, rtl.legend);
        assert_eq!(ltr.legend[0].color, PALETTE[0]);
    }

    fn totals() -> ResultTable {
        table(vec![json!({"name": "Open", "value": 1500}), json!({"name": "Closed", "value": 3000})])
    }

    #[test]
    fn test_bundled_font_registers() {
        assert!(font_ready());
    }

    #[test]
    fn test_tick_labels_use_locale_grouping() {
        let points: Vec<(usize, ChartPoint)> = ChartSeries::from_table(&totals()).points.into_iter().enumerate().collect();
        let frame = Frame::new(200, 150, &points, true);
        let en: Vec<String> = tick_labels(&frame, Locale::EN).into_iter().map(|(_, t)| t).collect();
        let de: Vec<String> = tick_labels(&frame, Locale::DE).into_iter().map(|(_, t)| t).collect();
        assert_eq!(en, vec!["810", "1,620", "2,430", "3,240"]);
        assert_eq!(de, vec!["810", "1.620", "2.430", "3.240"]);
        assert!(tick_labels(&frame, Locale::EN).windows(2).all(|w| w[0].0 > w[1].0));
    }

    #[test]
    fn test_tick_text_changes_with_locale() {
        let renderer = PlottersChartRenderer::new();
        let en = renderer.render(ChartType::Bar, &totals(), &options()).unwrap();
        let de = renderer
            .render(
                ChartType::Bar,
                &totals(),
                &ChartOptions {
                    locale: Locale::DE,
                    ..options()
                },
            )
            .unwrap();
        assert_ne!(en.rgb, de.rgb);
    }

    #[test]
    fn test_title_is_drawn() {
        let renderer = PlottersChartRenderer::new();
        let titled = renderer.render(ChartType::Pie, &categories(), &options()).unwrap();
        let other = renderer
            .render(
                ChartType::Pie,
                &categories(),
                &ChartOptions {
                    title: Some("Risks by Owner".to_string()),
                    ..options()
                },
            )
            .unwrap();
        assert_ne!(titled.rgb, other.rgb);

        let top_rows = &titled.rgb[..titled.width as usize * 3 * 12];
        assert!(top_rows.chunks(3).any(|px| px != [255, 255, 255]));
    }

    #[test]
    fn test_arabic_categories_are_drawn_under_the_axis() {
        let renderer = PlottersChartRenderer::new();
        let rows = table(vec![
            json!({"name": "مفتوح", "value": 4}),
            json!({"name": "مغلق", "value": 2}),
        ]);
        let ar = ChartOptions {
            locale: Locale::AR,
            title: Some("المخاطر حسب الحالة".to_string()),
            ..options()
        };
        let chart = renderer.render(ChartType::Bar, &rows, &ar).unwrap();
        let en = renderer.render(ChartType::Bar, &rows, &options()).unwrap();
        assert_ne!(chart.rgb, en.rgb);

        let row_bytes = chart.width as usize * 3;
        let below_axis = (150.0_f64 * 0.84).round() as usize + 3;
        let band = &chart.rgb[below_axis * row_bytes..];
        assert!(band.chunks(3).any(|px| px != [255, 255, 255]));
    }
}
