use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDate;
use std::fmt::Write;

use crate::feed::DiaryEntry;

/// Whether `pattern` is a strftime pattern chrono can render for a date.
pub fn is_valid_pattern(pattern: &str) -> bool {
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return false;
    }
    // Offset or time-only specifiers fail at render time on a bare date
    let probe = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap_or_default();
    let mut out = String::new();
    write!(out, "{}", probe.format_with_items(items.into_iter())).is_ok()
}

/// The date shown for an entry.
///
/// With no pattern, the feed's watched date passes through untouched. With a
/// pattern, the watched date is rendered with it; if the date or the pattern
/// is unusable the raw value is kept. Entries with no watched date fall back
/// to the publication date.
pub fn display_date(entry: &DiaryEntry, pattern: Option<&str>) -> Option<String> {
    let raw = entry
        .watched_date
        .clone()
        .or_else(|| entry.published.map(|p| p.date_naive().to_string()))?;

    let Some(pattern) = pattern.filter(|p| !p.trim().is_empty()) else {
        return Some(raw);
    };
    let date = match &entry.watched_date {
        Some(_) => entry.watched_on(),
        None => entry.published.map(|p| p.date_naive()),
    };
    let Some(date) = date else {
        return Some(raw);
    };

    match format_date(date, pattern) {
        Some(formatted) => Some(formatted),
        None => {
            tracing::warn!(pattern = %pattern, "Invalid date format, using the raw date");
            Some(raw)
        }
    }
}

fn format_date(date: NaiveDate, pattern: &str) -> Option<String> {
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return None;
    }
    let mut out = String::new();
    write!(out, "{}", date.format_with_items(items.into_iter())).ok()?;
    Some(out)
}
