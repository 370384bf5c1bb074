// Resources compiled into the binary

/// DejaVu Sans: Latin plus Arabic and Arabic Presentation Forms-B.
/// Used when no configured font loads, and for chart text.
pub static DEFAULT_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

pub const DEFAULT_FONT_NAME: &str = "DejaVuSans";
