use serde::{Deserialize, Serialize};

use crate::feed::Rating;

/// How a rating is written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StarStyle {
    /// `3.5 stars`
    Count,
    /// `★★★½`
    #[default]
    Filled,
    /// `⭐⭐⭐½`
    Emoji,
}

impl StarStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Filled => "filled",
            Self::Emoji => "emoji",
        }
    }

    pub fn render(self, rating: Rating) -> String {
        let glyph = match self {
            Self::Count => {
                let plural = if rating.half_stars() == 2 { "" } else { "s" };
                return format!("{rating} star{plural}");
            }
            Self::Filled => "★",
            Self::Emoji => "⭐",
        };

        let mut out = glyph.repeat(usize::from(rating.whole_stars()));
        if rating.has_half() {
            out.push('½');
        }
        out
    }
}

impl std::fmt::Display for StarStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StarStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "count" => Ok(Self::Count),
            "filled" => Ok(Self::Filled),
            "emoji" => Ok(Self::Emoji),
            other => Err(format!(
                "unknown star style '{other}' (expected count, filled or emoji)"
            )),
        }
    }
}
