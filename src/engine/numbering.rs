use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::EngineError;

/// Highest ordinal the roman and letter styles can render. Arabic numbering is unbounded.
pub const MAX_STYLED_ORDINAL: u32 = 20;

const ROMAN_STEPS: [(u32, &str); 6] = [
    (40, "XL"),
    (10, "X"),
    (9, "IX"),
    (5, "V"),
    (4, "IV"),
    (1, "I"),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberStyle {
    #[default]
    #[serde(alias = "1")]
    Arabic,
    #[serde(alias = "2")]
    Roman,
    #[serde(alias = "3")]
    Lower,
    #[serde(alias = "4")]
    Upper,
}

impl NumberStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Arabic => "arabic",
            Self::Roman => "roman",
            Self::Lower => "lower",
            Self::Upper => "upper",
        }
    }

    pub fn max_ordinal(self) -> Option<u32> {
        match self {
            Self::Arabic => None,
            Self::Roman | Self::Lower | Self::Upper => Some(MAX_STYLED_ORDINAL),
        }
    }
}

impl fmt::Display for NumberStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the style names as well as the numeric codes `1`..`4` of the legacy command line.
impl FromStr for NumberStyle {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "arabic" | "1" => Ok(Self::Arabic),
            "roman" | "2" => Ok(Self::Roman),
            "lower" | "3" => Ok(Self::Lower),
            "upper" | "4" => Ok(Self::Upper),
            other => Err(format!(
                "unknown numbering style `{other}` (expected arabic, roman, lower or upper)"
            )),
        }
    }
}

pub fn format_ordinal(ordinal: u32, style: NumberStyle) -> Result<String, EngineError> {
    let in_range = ordinal >= 1 && style.max_ordinal().is_none_or(|max| ordinal <= max);
    if !in_range {
        return Err(EngineError::FormatRange { ordinal, style });
    }

    let rendered = match style {
        NumberStyle::Arabic => ordinal.to_string(),
        NumberStyle::Roman => to_roman(ordinal),
        NumberStyle::Lower => letter(ordinal, b'a'),
        NumberStyle::Upper => letter(ordinal, b'A'),
    };

    Ok(rendered)
}

fn to_roman(mut value: u32) -> String {
    let mut out = String::new();
    for (step, numeral) in ROMAN_STEPS {
        while value >= step {
            out.push_str(numeral);
            value -= step;
        }
    }
    out
}

// Callers guarantee 1..=MAX_STYLED_ORDINAL, so the offset always fits in a u8.
fn letter(ordinal: u32, base: u8) -> String {
    char::from(base + (ordinal - 1) as u8).to_string()
}
