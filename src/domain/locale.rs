// Locale-dependent number formatting and text direction

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    LeftToRight,
    RightToLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locale {
    pub tag: &'static str,
    pub thousands: char,
    pub decimal: char,
    pub direction: Direction,
}

impl Default for Locale {
    fn default() -> Self {
        Self::EN
    }
}

impl Locale {
    pub const EN: Locale = Locale {
        tag: "en",
        thousands: ',',
        decimal: '.',
        direction: Direction::LeftToRight,
    };
    pub const AR: Locale = Locale {
        tag: "ar",
        thousands: ',',
        decimal: '.',
        direction: Direction::RightToLeft,
    };
    pub const FR: Locale = Locale {
        tag: "fr",
        thousands: ' ',
        decimal: ',',
        direction: Direction::LeftToRight,
    };
    pub const DE: Locale = Locale {
        tag: "de",
        thousands: '.',
        decimal: ',',
        direction: Direction::LeftToRight,
    };

    /// Resolve a language tag such as `ar-SA`; `None` for unknown languages.
    pub fn parse(tag: &str) -> Option<Locale> {
        let language = tag.split(['-', '_']).next().unwrap_or("").to_lowercase();
        match language.as_str() {
            "en" => Some(Self::EN),
            "ar" => Some(Self::AR),
            "fr" => Some(Self::FR),
            "de" => Some(Self::DE),
            _ => None,
        }
    }

    pub fn is_rtl(&self) -> bool {
        self.direction == Direction::RightToLeft
    }

    /// Whole numbers print without decimals, everything else with two.
    pub fn format_number(&self, value: f64) -> String {
        if !value.is_finite() {
            return value.to_string();
        }
        let decimals = if value.fract() == 0.0 { 0 } else { 2 };
        let formatted = format!("{:.*}", decimals, value.abs());
        let (int_part, frac_part) = match formatted.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (formatted.as_str(), None),
        };

        let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3 + 4);
        for (i, ch) in int_part.chars().enumerate() {
            if i > 0 && (int_part.len() - i) % 3 == 0 {
                grouped.push(self.thousands);
            }
            grouped.push(ch);
        }
        if let Some(frac) = frac_part {
            grouped.push(self.decimal);
            grouped.push_str(frac);
        }
        if value < 0.0 && grouped.chars().any(|c| c != '0' && c.is_ascii_digit()) {
            grouped.insert(0, '-');
        }
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(Locale::EN.format_number(1234567.0), "1,234,567");
        assert_eq!(Locale::EN.format_number(1234.5), "1,234.50");
        assert_eq!(Locale::EN.format_number(-950.0), "-950");
        assert_eq!(Locale::DE.format_number(1234.5), "1.234,50");
        assert_eq!(Locale::EN.format_number(0.0), "0");
    }

    #[test]
    fn test_parse() {
        assert_eq!(Locale::parse("ar-SA"), Some(Locale::AR));
        assert!(Locale::parse("ar").unwrap().is_rtl());
        assert_eq!(Locale::parse("xx"), None);
    }
}
