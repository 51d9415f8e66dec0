use chrono::{Duration, NaiveDateTime};

/// Formats a duration as `H:MM`. Negative durations show as `0:00`.
pub fn format_duration(duration: &Duration) -> String {
    let minutes = duration.num_minutes().max(0);
    format!("{}:{:02}", minutes / 60, minutes % 60)
}

/// Like [`format_duration`] but blank for zero, for sparse tables.
pub fn format_cell(duration: &Duration) -> String {
    if duration.num_minutes() <= 0 {
        String::new()
    } else {
        format_duration(duration)
    }
}

pub fn format_datetime(at: &NaiveDateTime) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

/// Parses `YYYY-MM-DD HH:MM`, with or without seconds.
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
        .ok()
}
