use crate::format;
use crate::models::{Direction, Intent, IntentKind, Metric, Position};

const MAX_RELATED: usize = 3;

/// Follow-up questions suggested next to an answer.
pub(super) fn related_queries(intent: &Intent) -> Vec<String> {
    let entities = &intent.entities;
    let song = entities.song.as_ref().map(|s| s.name.as_str());
    let venue = entities.venue.as_ref().map(|v| v.name.as_str());

    let mut out: Vec<String> = match (intent.kind, song) {
        (IntentKind::SuperlativePerformance, Some(song)) => vec![
            format!("What's the average {song} length?"),
            format!("What are the top {song} jams?"),
            format!("When was {song} last played?"),
        ],
        (IntentKind::AverageDuration, Some(song)) => vec![
            format!("What's the longest {song} ever?"),
            format!("What's the shortest {song}?"),
            format!("How many times has {song} been played?"),
        ],
        (IntentKind::CountOccurrences, Some(song)) => vec![
            format!("When was {song} first played?"),
            format!("What's the gap on {song}?"),
            format!("What's the longest {song} ever?"),
        ],
        (IntentKind::GapLookup, Some(song)) => vec![
            format!("When was {song} last played?"),
            format!("How many times has {song} been played?"),
            format!("What are the top {song} jams?"),
        ],
        (IntentKind::FirstPlayed, Some(song)) => vec![
            format!("When was {song} last played?"),
            format!("How many times has {song} been played?"),
            format!("What's the longest {song} ever?"),
        ],
        (IntentKind::LastPlayed, Some(song)) => vec![
            format!("What's the gap on {song}?"),
            format!("When was {song} first played?"),
            format!("What are the top {song} jams?"),
        ],
        (IntentKind::JamHighlights, Some(song)) => vec![
            format!("What's the longest {song} ever?"),
            format!("What's the average {song} length?"),
            format!("When was {song} last played?"),
        ],
        (IntentKind::Comparison, Some(song)) => {
            let mut v = vec![format!("What's the longest {song} ever?")];
            if let Some(second) = &entities.second_song {
                v.push(format!("What's the longest {} ever?", second.name));
                v.push(format!(
                    "How many times has {} been played?",
                    second.name
                ));
            }
            v
        }
        (IntentKind::PositionalLookup, Some(song)) if !entities.names_a_show() => vec![
            format!("How many times has {song} been played?"),
            format!("When was {song} last played?"),
        ],
        (IntentKind::PositionalLookup, _) if entities.names_a_show() => {
            match entities.show_date {
                Some(date) => {
                    let other = match entities.position {
                        Some(Position::Encore) => Position::Opener,
                        _ => Position::Encore,
                    };
                    vec![
                        format!("What was the {} on {}?", other.label(), format::date(date)),
                        format!("What was the setlist on {}?", format::date(date)),
                    ]
                }
                None => Vec::new(),
            }
        }
        (IntentKind::ShowSetlist, _) => match entities.show_date {
            Some(date) => vec![
                format!("What was the opener on {}?", format::date(date)),
                format!("What was the encore on {}?", format::date(date)),
            ],
            None => Vec::new(),
        },
        (IntentKind::SongRanking, _) => [
            (Metric::PlayCount, Direction::Max, "What are the most played songs?"),
            (Metric::PlayCount, Direction::Min, "What are the rarest songs?"),
            (Metric::Gap, Direction::Max, "Which songs have the biggest gaps?"),
        ]
        .into_iter()
        .filter(|(metric, direction, _)| {
            (entities.metric.unwrap_or(Metric::PlayCount), entities.direction.unwrap_or(Direction::Max))
                != (*metric, *direction)
        })
        .map(|(_, _, question)| question.to_string())
        .collect(),
        _ => Vec::new(),
    };

    if let Some(venue) = venue {
        match intent.kind {
            IntentKind::NeverPlayed => {
                out.push(format!("How many shows have been played at {venue}?"))
            }
            IntentKind::VenueSuperlative => {
                out.push(format!("What songs have never been played at {venue}?"));
                out.push(format!("How many shows have been played at {venue}?"));
            }
            IntentKind::ShowCount => {
                out.push(format!("What songs have never been played at {venue}?"))
            }
            _ => {}
        }
    }

    out.dedup();
    out.truncate(MAX_RELATED);
    out
}
