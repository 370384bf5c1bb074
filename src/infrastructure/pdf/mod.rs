// PDF document composer
mod fonts;
mod image;
mod layout;
mod text;
mod writer;

use crate::application::rendering::{slug, DocumentComposer};
use crate::domain::document::{ComposedDocument, Section};
use crate::domain::error::ExportError;
use crate::domain::request::{OutputFormat, ResolvedHeader};
use fonts::{EmbeddedFont, FontSet};
use layout::{Canvas, LaidOut, PAGE_HEIGHT, PAGE_WIDTH};
use std::path::PathBuf;
use text::GlyphUsage;
use writer::{literal, ObjId, PdfWriter};

pub(crate) use text::visual_order;

#[derive(Debug, Clone)]
pub struct PdfSettings {
    /// Page margin in points.
    pub margin: f32,
    /// TrueType files tried in order for text outside WinAnsi.
    pub font_candidates: Vec<PathBuf>,
}

impl Default for PdfSettings {
    fn default() -> Self {
        Self {
            margin: 40.0,
            font_candidates: Vec::new(),
        }
    }
}

pub struct PdfComposer {
    settings: PdfSettings,
    fonts: FontSet,
}

impl PdfComposer {
    pub fn new(settings: PdfSettings) -> Self {
        let fonts = FontSet::load(&settings.font_candidates);
        Self { settings, fonts }
    }

    fn layout(&self, sections: &[Section], header: &ResolvedHeader) -> Result<LaidOut, ExportError> {
        let mut canvas = Canvas::new(&self.fonts, header, self.settings.margin);
        for section in sections {
            match section {
                Section::Header(block) => canvas.header(block)?,
                Section::Table(block) => canvas.table(block)?,
                Section::Chart(block) => canvas.chart(block)?,
                Section::Text(block) => canvas.paragraph(block)?,
            }
        }
        Ok(canvas.finish())
    }

    fn write(&self, laid: LaidOut, header: &ResolvedHeader) -> Result<Vec<u8>, ExportError> {
        let mut w = PdfWriter::new();
        let catalog = w.reserve();
        let pages_id = w.reserve();
        let info = w.reserve();
        let regular = w.reserve();
        let bold = w.reserve();
        w.object(
            regular,
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
        );
        w.object(
            bold,
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>",
        );

        let script = match &self.fonts.script {
            Some(font) if !laid.usage.glyphs.is_empty() => Some(write_cid_font(&mut w, font, &laid.usage)?),
            _ => None,
        };
        if laid.usage.substituted > 0 {
            tracing::warn!(
                substituted = laid.usage.substituted,
                "characters without a usable font were replaced with '?'"
            );
        }

        let gstate = match &header.watermark {
            Some(watermark) => {
                let id = w.reserve();
                w.object(
                    id,
                    &format!(
                        "<< /Type /ExtGState /ca {:.2} /CA {:.2} >>",
                        watermark.opacity, watermark.opacity
                    ),
                );
                Some(id)
            }
            None => None,
        };

        let mut image_ids = Vec::with_capacity(laid.images.len());
        for image in &laid.images {
            let id = w.reserve();
            w.stream(
                id,
                &format!(
                    "/Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceRGB /BitsPerComponent 8",
                    image.width, image.height
                ),
                &image.pixels,
            )?;
            image_ids.push(id);
        }

        let mut font_resources = format!("/F1 {} /F2 {}", regular, bold);
        if let Some(id) = script {
            font_resources.push_str(&format!(" /F3 {}", id));
        }

        let mut kids = Vec::with_capacity(laid.pages.len());
        for page in &laid.pages {
            let content = w.reserve();
            w.stream(content, "", page.ops.as_bytes())?;

            let mut resources = format!("/Font << {} >>", font_resources);
            if !page.images.is_empty() {
                let xobjects: Vec<String> = page
                    .images
                    .iter()
                    .map(|&i| format!("/Im{} {}", i + 1, image_ids[i]))
                    .collect();
                resources.push_str(&format!(" /XObject << {} >>", xobjects.join(" ")));
            }
            if let Some(gs) = gstate {
                resources.push_str(&format!(" /ExtGState << /GS1 {} >>", gs));
            }

            let page_id = w.reserve();
            w.object(
                page_id,
                &format!(
                    "<< /Type /Page /Parent {} /MediaBox [0 0 {:.2} {:.2}] /Resources << {} >> /Contents {} >>",
                    pages_id, PAGE_WIDTH, PAGE_HEIGHT, resources, content
                ),
            );
            kids.push(page_id);
        }

        let kids: Vec<String> = kids.iter().map(ObjId::to_string).collect();
        w.object(
            pages_id,
            &format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), kids.len()),
        );
        w.object(
            info,
            &format!("<< /Title {} /Producer (grc-report-export) >>", literal(&header.title)),
        );
        w.object(catalog, &format!("<< /Type /Catalog /Pages {} >>", pages_id));
        w.finish(catalog, Some(info))
    }
}

/// Type0 font over a CIDFontType2 descendant with Identity-H encoding, so
/// content streams address glyph ids directly.
fn write_cid_font(w: &mut PdfWriter, font: &EmbeddedFont, usage: &GlyphUsage) -> Result<ObjId, ExportError> {
    let type0 = w.reserve();
    let descendant = w.reserve();
    let descriptor = w.reserve();
    let file = w.reserve();
    let to_unicode = w.reserve();

    w.stream(file, &format!("/Length1 {}", font.data.len()), &font.data)?;

    let [x_min, y_min, x_max, y_max] = font.bbox;
    w.object(
        descriptor,
        &format!(
            "<< /Type /FontDescriptor /FontName /{} /Flags 4 /FontBBox [{} {} {} {}] /ItalicAngle 0 /Ascent {} /Descent {} /CapHeight {} /StemV 80 /FontFile2 {} >>",
            font.name,
            font.to_thousandths(x_min as i32),
            font.to_thousandths(y_min as i32),
            font.to_thousandths(x_max as i32),
            font.to_thousandths(y_max as i32),
            font.to_thousandths(font.ascent as i32),
            font.to_thousandths(font.descent as i32),
            font.to_thousandths(font.ascent as i32),
            file
        ),
    );

    let widths: Vec<String> = usage
        .glyphs
        .iter()
        .map(|(gid, (width, _))| format!("{} [{}]", gid, width))
        .collect();
    w.object(
        descendant,
        &format!(
            "<< /Type /Font /Subtype /CIDFontType2 /BaseFont /{} /CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >> /FontDescriptor {} /DW 1000 /W [{}] /CIDToGIDMap /Identity >>",
            font.name,
            descriptor,
            widths.join(" ")
        ),
    );

    w.stream(to_unicode, "", to_unicode_cmap(usage).as_bytes())?;
    w.object(
        type0,
        &format!(
            "<< /Type /Font /Subtype /Type0 /BaseFont /{} /Encoding /Identity-H /DescendantFonts [{}] /ToUnicode {} >>",
            font.name, descendant, to_unicode
        ),
    );
    Ok(type0)
}

/// Glyph id to Unicode map so text stays searchable and copyable.
fn to_unicode_cmap(usage: &GlyphUsage) -> String {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n/CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );
    let entries: Vec<(u16, char)> = usage.glyphs.iter().map(|(gid, (_, ch))| (*gid, *ch)).collect();
    for chunk in entries.chunks(100) {
        cmap.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (gid, ch) in chunk {
            let mut units = [0u16; 2];
            let hex: String = ch.encode_utf16(&mut units).iter().map(|u| format!("{:04X}", u)).collect();
            cmap.push_str(&format!("<{:04X}> <{}>\n", gid, hex));
        }
        cmap.push_str("endbfchar\n");
    }
    cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    cmap
}

impl DocumentComposer for PdfComposer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Pdf
    }

    fn compose(&self, sections: &[Section], header: &ResolvedHeader) -> Result<ComposedDocument, ExportError> {
        let laid = self.layout(sections, header)?;
        let pages = laid.pages.len();
        let bytes = self.write(laid, header)?;
        tracing::debug!(pages, bytes = bytes.len(), "composed PDF");
        Ok(ComposedDocument::new(
            bytes,
            OutputFormat::Pdf.content_type(),
            format!("{}.pdf", slug(&header.title)),
        ))
    }
}
