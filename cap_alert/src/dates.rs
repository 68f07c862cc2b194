//! ABOUTME: CAP dateTime handling: constrained lexical form plus a real calendar check
//! ABOUTME: Offsets are mandatory; "Z" is not a legal CAP timezone designator

use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use regex::Regex;

fn cap_date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^[0-9]{4}-[01][0-9]-[0-3][0-9]T[0-2][0-9]:[0-5][0-9]:[0-5][0-9](\.[0-9]{2}([0-9])?)?([+-])([01][0-9]:[0-5][0-9])$",
        )
        .expect("CAP date pattern must compile")
    })
}

/// Parse a CAP timestamp such as `2002-05-24T16:49:00-07:00`
pub fn parse_cap_date(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if !cap_date_pattern().is_match(text) {
        return None;
    }
    DateTime::parse_from_rfc3339(text).ok()
}

pub fn is_valid_cap_date(text: &str) -> bool {
    parse_cap_date(text).is_some()
}

/// Render a timestamp in CAP form, keeping the original offset
pub fn format_cap_date(date: &DateTime<FixedOffset>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, false)
}
