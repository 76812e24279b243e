use chrono::{DateTime, FixedOffset, NaiveDate};
use sha2::{Digest, Sha256};

/// A member rating in half-star steps, 0.5 to 5 stars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Rating {
    half_stars: u8,
}

impl Rating {
    pub const MAX_HALF_STARS: u8 = 10;

    /// Build from a count of half stars (`7` is three and a half stars).
    pub fn from_half_stars(half_stars: u8) -> Option<Self> {
        (1..=Self::MAX_HALF_STARS)
            .contains(&half_stars)
            .then_some(Self { half_stars })
    }

    /// Parse the feed's decimal form (`"3.5"`, `"4.0"`).
    ///
    /// Values are rounded to the nearest half star. Anything outside 0.5..=5
    /// or unparsable yields `None` and the entry is treated as unrated.
    pub fn parse(raw: &str) -> Option<Self> {
        let value: f32 = raw.trim().parse().ok()?;
        if !value.is_finite() {
            return None;
        }
        let halves = (value * 2.0).round();
        if !(1.0..=f32::from(Self::MAX_HALF_STARS)).contains(&halves) {
            return None;
        }
        Self::from_half_stars(halves as u8)
    }

    pub fn whole_stars(self) -> u8 {
        self.half_stars / 2
    }

    pub fn has_half(self) -> bool {
        self.half_stars % 2 == 1
    }

    pub fn half_stars(self) -> u8 {
        self.half_stars
    }
}

impl std::fmt::Display for Rating {
    /// `3.5`, or `4` for whole ratings.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.has_half() {
            write!(f, "{}.5", self.whole_stars())
        } else {
            write!(f, "{}", self.whole_stars())
        }
    }
}

/// One item of a member's diary feed.
///
/// Entries are built fresh from the feed on every run and only ever
/// persisted in their rendered form.
#[derive(Debug, Clone, PartialEq)]
pub struct DiaryEntry {
    /// Item title as published (`"Past Lives, 2023 - ★★★★½"`).
    pub title: String,
    pub link: String,
    pub guid: String,
    pub published: Option<DateTime<FixedOffset>>,
    /// `letterboxd:watchedDate` exactly as it appeared in the feed.
    pub watched_date: Option<String>,
    pub film_title: String,
    pub film_year: Option<u16>,
    pub rating: Option<Rating>,
    pub rewatch: bool,
    /// HTML body of the item.
    pub description: Option<String>,
}

impl DiaryEntry {
    /// Watched date as a calendar date, when it is in `YYYY-MM-DD` form.
    pub fn watched_on(&self) -> Option<NaiveDate> {
        self.watched_date
            .as_deref()
            .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok())
    }

    /// Short stable tag for block references.
    ///
    /// The final hyphen-delimited segment of the guid
    /// (`letterboxd-review-568742046` gives `568742046`). Entries without a
    /// usable guid get the first 12 hex chars of a SHA-256 over link, film
    /// title and watched date.
    pub fn reference_tag(&self) -> String {
        let tail = self
            .guid
            .trim()
            .rsplit('-')
            .next()
            .unwrap_or_default()
            .trim();
        if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_alphanumeric()) {
            return tail.to_string();
        }

        let input = format!(
            "{}|{}|{}",
            self.link,
            self.film_title,
            self.watched_date.as_deref().unwrap_or("")
        );
        let hash = Sha256::digest(input.as_bytes());
        format!("{:x}", hash)[..12].to_string()
    }

    /// Sort key: watched date, then publication time.
    pub(crate) fn chronological_key(&self) -> (Option<NaiveDate>, Option<i64>) {
        (self.watched_on(), self.published.map(|p| p.timestamp()))
    }
}

#[cfg(test)]
pub(crate) fn sample_entry() -> DiaryEntry {
    DiaryEntry {
        title: "Past Lives, 2023 - ★★★★½".to_string(),
        link: "https://letterboxd.com/someone/film/past-lives/".to_string(),
        guid: "letterboxd-review-568742046".to_string(),
        published: DateTime::parse_from_rfc2822("Sat, 6 Jan 2024 10:15:00 +1300").ok(),
        watched_date: Some("2024-01-05".to_string()),
        film_title: "Past Lives".to_string(),
        film_year: Some(2023),
        rating: Rating::parse("4.5"),
        rewatch: false,
        description: None,
    }
}
