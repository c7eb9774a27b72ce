//! Display formatting shared by the planner's scope text and the synthesizer.

use chrono::NaiveDate;

use crate::models::DateRange;

/// `mm:ss`, with minutes allowed past 59: 1_965_000 ms -> "32:45".
pub fn duration(ms: u64) -> String {
    let total_secs = (ms + 500) / 1000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

/// "Dec 31, 1995".
pub fn date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

/// "in 2023", "since Jan 1, 2019", "between Jul 1, 1997 and Dec 31, 1997".
pub fn date_range(range: &DateRange) -> String {
    use chrono::Datelike;

    match (range.start, range.end) {
        (Some(start), Some(end))
            if start.year() == end.year()
                && start.ordinal() == 1
                && end.month() == 12
                && end.day() == 31 =>
        {
            format!("in {}", start.year())
        }
        (Some(start), Some(end)) if start == end => format!("on {}", date(start)),
        (Some(start), Some(end)) => format!("between {} and {}", date(start), date(end)),
        (Some(start), None) => format!("since {}", date(start)),
        (None, Some(end)) => format!("through {}", date(end)),
        (None, None) => "ever".to_string(),
    }
}

/// Comma-joined list; "none" when empty.
pub fn list(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

/// "1st", "2nd", "13th", "90th".
pub fn ordinal(n: u64) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

/// "2.4x", "0.8x".
pub fn ratio(value: f64) -> String {
    format!("{value:.1}x")
}
