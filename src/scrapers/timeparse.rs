//! Relative-time label parsing.
//!
//! The forum renders activity times as labels like `"5 minutes ago #3"`
//! (the `#n` suffix is the post ordinal). Historical datasets were built
//! from these labels, so the parse must stay bit-for-bit compatible:
//! magnitude is the first digit run, the unit word is matched by
//! containment, months approximate to 30 days and years to 365.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

static FIRST_DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Parse a relative-time label against an explicit "now".
pub fn parse_relative_label_at(label: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let head = label.split("ago #").next().unwrap_or(label).trim();

    let value: i64 = FIRST_DIGIT_RUN.find(head)?.as_str().parse().ok()?;
    let unit: String = head.chars().filter(|c| !c.is_ascii_digit()).collect();
    let unit = unit.trim();

    let delta = if "seconds".contains(unit) {
        Duration::seconds(value)
    } else if "minutes".contains(unit) {
        Duration::minutes(value)
    } else if "hours".contains(unit) {
        Duration::hours(value)
    } else if "days".contains(unit) {
        Duration::days(value)
    } else if "weeks".contains(unit) {
        Duration::weeks(value)
    } else if "months".contains(unit) {
        Duration::days(value * 30)
    } else if "years".contains(unit) {
        Duration::days(value * 365)
    } else {
        return None;
    };

    Some(now - delta)
}

/// Parse a relative-time label against the current time.
pub fn parse_relative_label(label: &str) -> Option<DateTime<Utc>> {
    parse_relative_label_at(label, Utc::now())
}
