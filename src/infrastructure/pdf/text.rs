// Arabic contextual shaping, bidi reordering and font run splitting
use super::fonts::{standard_width, win_ansi, FontSet, FontStyle};
use std::collections::BTreeMap;
use unicode_bidi::{BidiInfo, Level};

const LAM: char = '\u{0644}';
const TATWEEL: char = '\u{0640}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Joining {
    /// Joins on both sides: isolated, final, initial, medial.
    Dual,
    /// Joins only to the preceding letter: isolated, final.
    Right,
    /// Never joins.
    None,
    /// Joins both sides without changing shape (tatweel).
    Causing,
}

/// Isolated presentation form and joining class for U+0621..=U+064A.
fn arabic_form(ch: char) -> Option<(u32, Joining)> {
    use Joining::*;
    let entry = match ch {
        '\u{0621}' => (0xFE80, None),
        '\u{0622}' => (0xFE81, Right),
        '\u{0623}' => (0xFE83, Right),
        '\u{0624}' => (0xFE85, Right),
        '\u{0625}' => (0xFE87, Right),
        '\u{0626}' => (0xFE89, Dual),
        '\u{0627}' => (0xFE8D, Right),
        '\u{0628}' => (0xFE8F, Dual),
        '\u{0629}' => (0xFE93, Right),
        '\u{062A}' => (0xFE95, Dual),
        '\u{062B}' => (0xFE99, Dual),
        '\u{062C}' => (0xFE9D, Dual),
        '\u{062D}' => (0xFEA1, Dual),
        '\u{062E}' => (0xFEA5, Dual),
        '\u{062F}' => (0xFEA9, Right),
        '\u{0630}' => (0xFEAB, Right),
        '\u{0631}' => (0xFEAD, Right),
        '\u{0632}' => (0xFEAF, Right),
        '\u{0633}' => (0xFEB1, Dual),
        '\u{0634}' => (0xFEB5, Dual),
        '\u{0635}' => (0xFEB9, Dual),
        '\u{0636}' => (0xFEBD, Dual),
        '\u{0637}' => (0xFEC1, Dual),
        '\u{0638}' => (0xFEC5, Dual),
        '\u{0639}' => (0xFEC9, Dual),
        '\u{063A}' => (0xFECD, Dual),
        TATWEEL => (TATWEEL as u32, Causing),
        '\u{0641}' => (0xFED1, Dual),
        '\u{0642}' => (0xFED5, Dual),
        '\u{0643}' => (0xFED9, Dual),
        '\u{0644}' => (0xFEDD, Dual),
        '\u{0645}' => (0xFEE1, Dual),
        '\u{0646}' => (0xFEE5, Dual),
        '\u{0647}' => (0xFEE9, Dual),
        '\u{0648}' => (0xFEED, Right),
        '\u{0649}' => (0xFEEF, Right),
        '\u{064A}' => (0xFEF1, Dual),
        _ => return Option::None,
    };
    Some(entry)
}

/// Isolated lam-alef ligature for the alef variant following a lam.
fn lam_alef(alef: char) -> Option<u32> {
    match alef {
        '\u{0622}' => Some(0xFEF5),
        '\u{0623}' => Some(0xFEF7),
        '\u{0625}' => Some(0xFEF9),
        '\u{0627}' => Some(0xFEFB),
        _ => None,
    }
}

/// Harakat and other marks that do not break a join.
fn is_transparent(ch: char) -> bool {
    matches!(ch, '\u{0610}'..='\u{061A}' | '\u{064B}'..='\u{065F}' | '\u{0670}' | '\u{06D6}'..='\u{06DC}')
}

fn is_rtl_char(ch: char) -> bool {
    matches!(ch, '\u{0590}'..='\u{08FF}' | '\u{FB1D}'..='\u{FDFF}' | '\u{FE70}'..='\u{FEFF}')
}

fn joins_forward(ch: char) -> bool {
    matches!(arabic_form(ch), Some((_, Joining::Dual | Joining::Causing)))
}

fn joins_backward(ch: char) -> bool {
    matches!(
        arabic_form(ch),
        Some((_, Joining::Dual | Joining::Right | Joining::Causing))
    )
}

/// Replace Arabic letters with their contextual presentation forms.
/// Input and output are in logical order.
pub fn shape_arabic(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let prev_letter = |i: usize| chars[..i].iter().rev().copied().find(|c| !is_transparent(*c));
    let next_letter = |i: usize| {
        chars[i + 1..]
            .iter()
            .enumerate()
            .find(|(_, c)| !is_transparent(**c))
            .map(|(offset, c)| (i + 1 + offset, *c))
    };

    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        let Some((isolated, joining)) = arabic_form(ch) else {
            out.push(ch);
            i += 1;
            continue;
        };
        let joined_before = prev_letter(i).is_some_and(joins_forward);

        if ch == LAM {
            if let Some((j, alef)) = next_letter(i) {
                if let Some(ligature) = lam_alef(alef) {
                    push_code(&mut out, ligature + joined_before as u32);
                    out.extend(chars[i + 1..j].iter());
                    i = j + 1;
                    continue;
                }
            }
        }

        let joined_after = next_letter(i).is_some_and(|(_, c)| joins_backward(c));
        let offset = match joining {
            Joining::Dual => match (joined_before, joined_after) {
                (true, true) => 3,
                (false, true) => 2,
                (true, false) => 1,
                (false, false) => 0,
            },
            Joining::Right => joined_before as u32,
            Joining::None | Joining::Causing => 0,
        };
        push_code(&mut out, isolated + offset);
        i += 1;
    }
    out
}

fn push_code(out: &mut String, code: u32) {
    if let Some(c) = char::from_u32(code) {
        out.push(c);
    }
}

/// Convert logical text to the left-to-right visual order a PDF text
/// operator expects. Pure LTR text is returned unchanged.
pub fn visual_order(text: &str, rtl_base: bool) -> String {
    let flattened: String = text.chars().map(|c| if c.is_control() { ' ' } else { c }).collect();
    if !flattened.chars().any(is_rtl_char) {
        return flattened;
    }
    let shaped = shape_arabic(&flattened);
    let level = if rtl_base { Some(Level::rtl()) } else { None };
    let bidi = BidiInfo::new(&shaped, level);
    bidi.paragraphs
        .iter()
        .map(|para| bidi.reorder_line(para, para.range.clone()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunFont {
    Standard(FontStyle),
    Script,
}

/// A stretch of text drawn with one font, already encoded for `Tj`.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub font: RunFont,
    pub operand: String,
    /// Advance in 1/1000 em.
    pub width: f32,
}

/// Glyphs of the script font used so far, keyed by glyph id.
#[derive(Debug, Default)]
pub struct GlyphUsage {
    pub glyphs: BTreeMap<u16, (i32, char)>,
    pub substituted: usize,
}

/// Shaped, reordered and font-split single line of text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub runs: Vec<Run>,
    pub width: f32,
}

impl TextLine {
    pub fn layout(text: &str, style: FontStyle, rtl_base: bool, fonts: &FontSet, usage: &mut GlyphUsage) -> Self {
        let visual = visual_order(text, rtl_base);
        let face = fonts.script.as_ref().and_then(|f| f.face().map(|face| (f, face)));

        let mut runs: Vec<Run> = Vec::new();
        let mut push = |font: RunFont, piece: &str, width: f32| match runs.last_mut() {
            Some(last) if last.font == font => {
                last.operand.push_str(piece);
                last.width += width;
            }
            _ => runs.push(Run {
                font,
                operand: piece.to_string(),
                width,
            }),
        };

        for ch in visual.chars() {
            if let Some(byte) = win_ansi(ch) {
                push(RunFont::Standard(style), &escape_byte(byte), standard_width(byte, style) as f32);
                continue;
            }
            let glyph = face.as_ref().and_then(|(font, face)| {
                let gid = face.glyph_index(ch)?;
                let advance = face.glyph_hor_advance(gid).unwrap_or(0);
                Some((gid.0, font.to_thousandths(advance as i32)))
            });
            match glyph {
                Some((gid, width)) => {
                    usage.glyphs.entry(gid).or_insert((width, ch));
                    push(RunFont::Script, &format!("{:04X}", gid), width as f32);
                }
                None => {
                    usage.substituted += 1;
                    push(RunFont::Standard(style), "?", standard_width(b'?', style) as f32);
                }
            }
        }

        let width = runs.iter().map(|r| r.width).sum();
        Self { runs, width }
    }

    /// Rendered width in points at `size`.
    pub fn width_at(&self, size: f32) -> f32 {
        self.width * size / 1000.0
    }
}

fn escape_byte(byte: u8) -> String {
    match byte {
        b'(' | b')' | b'\\' => format!("\\{}", byte as char),
        0x20..=0x7E => (byte as char).to_string(),
        _ => format!("\\{:03o}", byte),
    }
}
