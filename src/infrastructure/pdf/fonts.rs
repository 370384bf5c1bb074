// Font metrics for the standard Helvetica faces and an embedded TrueType fallback
use crate::infrastructure::assets::{DEFAULT_FONT, DEFAULT_FONT_NAME};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Regular,
    Bold,
}

/// Advance widths (1/1000 em) of printable ASCII, 0x20..=0x7E.
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // digits
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667,
    944, 667, 667, 611, // 'A'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, 556, 556, 333, 500, 278, 556, 500,
    722, 500, 500, 500, // 'a'..'z'
    334, 260, 334, 584, // '{'..'~'
];

const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // digits
    333, 333, 584, 584, 584, 611, 975, // ':'..'@'
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667,
    944, 667, 667, 611, // 'A'..'Z'
    333, 278, 333, 584, 556, 333, // '['..'`'
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, 611, 611, 389, 556, 333, 611, 556,
    778, 556, 556, 500, // 'a'..'z'
    389, 280, 389, 584, // '{'..'~'
];

/// WinAnsiEncoding byte for `ch`, if the standard fonts can show it.
pub fn win_ansi(ch: char) -> Option<u8> {
    let code = ch as u32;
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as u8),
        _ => match ch {
            '€' => Some(0x80),
            '‚' => Some(0x82),
            '„' => Some(0x84),
            '…' => Some(0x85),
            '‰' => Some(0x89),
            '‘' => Some(0x91),
            '’' => Some(0x92),
            '“' => Some(0x93),
            '”' => Some(0x94),
            '•' => Some(0x95),
            '–' => Some(0x96),
            '—' => Some(0x97),
            '™' => Some(0x99),
            _ => None,
        },
    }
}

/// Width in 1/1000 em of a WinAnsi byte.
pub fn standard_width(byte: u8, style: FontStyle) -> u16 {
    let table = match style {
        FontStyle::Regular => &HELVETICA,
        FontStyle::Bold => &HELVETICA_BOLD,
    };
    match byte {
        0x20..=0x7E => table[(byte - 0x20) as usize],
        0x95 => 350,
        0x96 => 556,
        0x97 | 0x85 | 0x89 => 1000,
        0x80..=0x9F => 556,
        0xA0 => 278,
        _ => match style {
            FontStyle::Regular => 556,
            FontStyle::Bold => 611,
        },
    }
}

/// A TrueType program embedded as a CID font for scripts outside WinAnsi.
#[derive(Debug, Clone)]
pub struct EmbeddedFont {
    pub name: String,
    pub data: Arc<Vec<u8>>,
    pub units_per_em: u16,
    pub ascent: i16,
    pub descent: i16,
    pub bbox: [i16; 4],
}

impl EmbeddedFont {
    pub fn from_bytes(name: &str, data: Vec<u8>) -> Result<Self, ttf_parser::FaceParsingError> {
        let (units_per_em, ascent, descent, bbox) = {
            let face = ttf_parser::Face::parse(&data, 0)?;
            let b = face.global_bounding_box();
            (
                face.units_per_em().max(1),
                face.ascender(),
                face.descender(),
                [b.x_min, b.y_min, b.x_max, b.y_max],
            )
        };
        Ok(Self {
            name: name.to_string(),
            data: Arc::new(data),
            units_per_em,
            ascent,
            descent,
            bbox,
        })
    }

    pub fn load(path: &Path) -> Option<Self> {
        let data = std::fs::read(path).ok()?;
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("Embedded");
        let name: String = stem.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '-').collect();
        match Self::from_bytes(if name.is_empty() { "Embedded" } else { &name }, data) {
            Ok(font) => Some(font),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "font file is not a usable TrueType font");
                None
            }
        }
    }

    pub fn face(&self) -> Option<ttf_parser::Face<'_>> {
        ttf_parser::Face::parse(&self.data, 0).ok()
    }

    /// Scale a font-unit value to 1/1000 em.
    pub fn to_thousandths(&self, units: i32) -> i32 {
        (units as f64 * 1000.0 / self.units_per_em as f64).round() as i32
    }
}

/// Helvetica for WinAnsi text plus a script font for everything else.
#[derive(Debug, Clone)]
pub struct FontSet {
    pub script: Option<EmbeddedFont>,
}

impl Default for FontSet {
    fn default() -> Self {
        Self::load(&[])
    }
}

impl FontSet {
    /// Use the first candidate that exists and parses, else the bundled font.
    pub fn load(candidates: &[PathBuf]) -> Self {
        let configured = candidates.iter().find_map(|path| {
            if !path.exists() {
                return None;
            }
            EmbeddedFont::load(path).inspect(|font| {
                tracing::info!(path = %path.display(), font = %font.name, "loaded script font for PDF output");
            })
        });
        if let Some(font) = configured {
            return Self { script: Some(font) };
        }

        if !candidates.is_empty() {
            tracing::info!(
                candidates = candidates.len(),
                font = DEFAULT_FONT_NAME,
                "no configured script font loaded, using bundled font"
            );
        }
        match EmbeddedFont::from_bytes(DEFAULT_FONT_NAME, DEFAULT_FONT.to_vec()) {
            Ok(font) => Self { script: Some(font) },
            Err(e) => {
                tracing::warn!(error = %e, "bundled font is unusable; characters outside WinAnsi will be substituted");
                Self { script: None }
            }
        }
    }

    /// Helvetica only. Every character outside WinAnsi is substituted.
    pub fn standard_only() -> Self {
        Self { script: None }
    }
}
