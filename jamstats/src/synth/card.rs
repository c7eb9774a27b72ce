use crate::format;
use crate::models::{AggregationResult, Card, Intent, IntentKind, Operation};

use super::render_value;

fn text(result: &AggregationResult, name: &str) -> Option<String> {
    result.field(name).map(render_value)
}

fn or_blank(value: Option<String>) -> String {
    value.unwrap_or_default()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// "Dec 6, 1997 at Hara Arena", or whichever half is known.
fn when_where(result: &AggregationResult, date: &str, venue: &str) -> String {
    match (text(result, date), text(result, venue)) {
        (Some(d), Some(v)) => format!("{d} at {v}"),
        (Some(d), None) => d,
        (None, Some(v)) => v,
        (None, None) => String::new(),
    }
}

/// Field carrying the answer's headline number or value.
pub(super) fn headline_field(intent: &Intent, result: &AggregationResult) -> &'static str {
    match (intent.kind, &result.operation) {
        (IntentKind::ShowSetlist, _) => "date",
        (_, Operation::ValueAt) => "songs",
        (_, Operation::Percentile { .. }) => "value",
        (IntentKind::SuperlativePerformance | IntentKind::VenueSuperlative, _) => "duration",
        (IntentKind::SongRanking, _) => "top",
        (IntentKind::GapLookup, _) => "gap",
        (IntentKind::Comparison, _) => "leader",
        (IntentKind::AverageDuration, _) => "average",
        (IntentKind::FirstPlayed | IntentKind::LastPlayed, _) => "date",
        _ => "count",
    }
}

pub(super) fn build(intent: &Intent, result: &AggregationResult, context: Option<String>) -> Card {
    let song = or_blank(text(result, "song"));
    let stat = or_blank(text(result, headline_field(intent, result)));

    let (title, subtitle) = match (intent.kind, &result.operation) {
        (IntentKind::SuperlativePerformance, _) => (
            capitalize(&format!("{} {song}", or_blank(text(result, "superlative")))),
            when_where(result, "date", "venue"),
        ),
        (IntentKind::VenueSuperlative, _) => (
            capitalize(&format!(
                "{} at {}",
                or_blank(text(result, "superlative")),
                or_blank(text(result, "venue"))
            )),
            match text(result, "date") {
                Some(date) => format!("{song}, {date}"),
                None => song.clone(),
            },
        ),
        (IntentKind::CountOccurrences, _) => {
            let title = match text(result, "threshold") {
                Some(threshold) => format!("{song} at {threshold}+"),
                None => format!("{song} plays"),
            };
            (title, capitalize(&or_blank(text(result, "scope"))))
        }
        (IntentKind::GapLookup, _) => (
            format!("{song} gap"),
            format!("Last played {}", when_where(result, "last_date", "last_venue")),
        ),
        (IntentKind::NeverPlayed, _) => (
            format!("Never played at {}", or_blank(text(result, "venue"))),
            "songs in the catalog".to_string(),
        ),
        (IntentKind::PositionalLookup, Operation::ValueAt) => (
            capitalize(&format!(
                "{} on {}",
                or_blank(text(result, "position")),
                or_blank(text(result, "date"))
            )),
            or_blank(text(result, "venue")),
        ),
        (IntentKind::PositionalLookup, _) => (
            format!("{song} as {}", or_blank(text(result, "position"))),
            capitalize(&or_blank(text(result, "scope"))),
        ),
        (IntentKind::Comparison, _) => (
            format!("{song} vs {}", or_blank(text(result, "second_song"))),
            format!(
                "By {}: {} vs {}",
                or_blank(text(result, "metric")),
                or_blank(text(result, "song_value")),
                or_blank(text(result, "second_value"))
            ),
        ),
        (IntentKind::AverageDuration, Operation::Percentile { .. }) => (
            format!("{} percentile {song}", or_blank(text(result, "percentile"))),
            format!("{} performances", or_blank(text(result, "performances"))),
        ),
        (IntentKind::AverageDuration, _) => (
            format!("Average {song}"),
            format!(
                "{} performances, median {}",
                or_blank(text(result, "performances")),
                or_blank(text(result, "median"))
            ),
        ),
        (IntentKind::FirstPlayed | IntentKind::LastPlayed, _)
            if result.field("position").is_some() =>
        {
            let which = if intent.kind == IntentKind::FirstPlayed {
                "First"
            } else {
                "Last"
            };
            (
                format!("{which} {song} {}", or_blank(text(result, "position"))),
                or_blank(text(result, "venue")),
            )
        }
        (IntentKind::FirstPlayed, _) => (format!("{song} debut"), or_blank(text(result, "venue"))),
        (IntentKind::LastPlayed, _) => (
            format!("Last {song}"),
            or_blank(text(result, "venue")),
        ),
        (IntentKind::ShowSetlist, _) => (
            "Setlist".to_string(),
            or_blank(text(result, "venue")),
        ),
        (IntentKind::SongRanking, _) => (
            or_blank(text(result, "label")),
            format!("Out of {} songs", or_blank(text(result, "count"))),
        ),
        (IntentKind::ShowCount, _) => (
            "Shows played".to_string(),
            capitalize(&or_blank(text(result, "scope"))),
        ),
        (IntentKind::JamHighlights, _) => (
            format!("{song} jam charts"),
            text(result, "latest_date")
                .map(|d| format!("Latest {d}"))
                .unwrap_or_default(),
        ),
        (IntentKind::Compound, _) => (String::new(), String::new()),
    };

    Card {
        title,
        stat,
        subtitle,
        context,
    }
}

/// Comparison to the baseline when there is one, followed by the join
/// warning when rows went unmatched.
pub(super) fn context_line(result: &AggregationResult) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(baseline) = &result.baseline {
        if let Some(ratio) = baseline.ratio() {
            parts.push(format!(
                "{} the {} ({})",
                format::ratio(ratio),
                baseline.label,
                format::duration(baseline.baseline.round() as u64)
            ));
        }
    }
    for warning in &result.warnings {
        if warning.code() == "low_confidence_join" {
            parts.push(warning.message());
        }
    }
    (!parts.is_empty()).then(|| parts.join(" "))
}
