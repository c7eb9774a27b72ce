//! The dispatch table: which calls answer which intent, given the entities present.

use crate::models::{
    CallLabel, Direction, Endpoint, Entities, EntityRole, IntentKind, JoinMode, Metric, Operation,
};

use EntityRole::{Position, SecondSong, ShowDate, Song, Venue};

pub(super) struct CallTemplate {
    pub label: CallLabel,
    pub endpoint: Endpoint,
    /// Role whose song supplies the slug parameter.
    pub song_role: EntityRole,
    pub required: bool,
}

pub(super) struct PlanRule {
    pub kind: IntentKind,
    pub requires: &'static [EntityRole],
    pub applies: fn(&Entities) -> bool,
    pub calls: &'static [CallTemplate],
    pub join: Option<(CallLabel, CallLabel, JoinMode)>,
    pub operation: fn(&Entities) -> Operation,
}

const fn call(label: CallLabel, endpoint: Endpoint) -> CallTemplate {
    CallTemplate {
        label,
        endpoint,
        song_role: Song,
        required: true,
    }
}

const TRACKS: CallTemplate = call(CallLabel::Primary, Endpoint::SongTracks);
const SETLISTS: CallTemplate = call(CallLabel::Primary, Endpoint::SongSetlists);
const VENUE_DETAIL: CallTemplate = call(CallLabel::Secondary, Endpoint::SongSetlists);
const JAM_NOTES: CallTemplate = CallTemplate {
    required: false,
    ..call(CallLabel::Annotation, Endpoint::JamCharts)
};
const ONE_SHOW: CallTemplate = call(CallLabel::Primary, Endpoint::ShowSetlist);
const TRACKS_WITH_VENUE: &[CallTemplate] = &[TRACKS, VENUE_DETAIL];
const VENUE_JOIN: Option<(CallLabel, CallLabel, JoinMode)> =
    Some((CallLabel::Primary, CallLabel::Secondary, JoinMode::Inner));

fn always(_: &Entities) -> bool {
    true
}

/// Venue and country live only in the setlist source.
fn located(e: &Entities) -> bool {
    e.venue.is_some() || e.country.is_some()
}

fn thresholded(e: &Entities) -> bool {
    e.threshold_ms.is_some()
}

fn thresholded_and_located(e: &Entities) -> bool {
    thresholded(e) && located(e)
}

fn by_play_count(e: &Entities) -> bool {
    e.metric == Some(Metric::PlayCount)
}

/// A song's history rather than one show's setlist.
fn across_shows(e: &Entities) -> bool {
    !e.names_a_show()
}

fn superlative(e: &Entities) -> Operation {
    Operation::Superlative {
        direction: e.direction.unwrap_or(Direction::Max),
    }
}

fn count(_: &Entities) -> Operation {
    Operation::Count
}

fn gap(_: &Entities) -> Operation {
    Operation::Gap
}

fn set_difference(_: &Entities) -> Operation {
    Operation::SetDifference
}

fn value_at(_: &Entities) -> Operation {
    Operation::ValueAt
}

fn average(e: &Entities) -> Operation {
    match e.percentile {
        Some(p) => Operation::Percentile { p },
        None => Operation::Average,
    }
}

fn earliest(_: &Entities) -> Operation {
    Operation::Earliest
}

fn most_recent(_: &Entities) -> Operation {
    Operation::MostRecent
}

fn compare(e: &Entities) -> Operation {
    Operation::Compare {
        metric: e.metric.unwrap_or(Metric::Duration),
    }
}

fn list(e: &Entities) -> Operation {
    Operation::List {
        limit: e.limit.unwrap_or(super::DEFAULT_LIST_LIMIT),
    }
}

fn rank(e: &Entities) -> Operation {
    Operation::Rank {
        metric: e.metric.unwrap_or(Metric::PlayCount),
        direction: e.direction.unwrap_or(Direction::Max),
        limit: e.limit.unwrap_or(super::DEFAULT_LIST_LIMIT),
    }
}

pub(super) const RULES: &[PlanRule] = &[
    PlanRule {
        kind: IntentKind::SuperlativePerformance,
        requires: &[Song],
        applies: located,
        calls: TRACKS_WITH_VENUE,
        join: VENUE_JOIN,
        operation: superlative,
    },
    PlanRule {
        kind: IntentKind::SuperlativePerformance,
        requires: &[Song],
        applies: always,
        calls: &[TRACKS, JAM_NOTES],
        join: Some((CallLabel::Primary, CallLabel::Annotation, JoinMode::Enrich)),
        operation: superlative,
    },
    PlanRule {
        kind: IntentKind::CountOccurrences,
        requires: &[Song],
        applies: thresholded_and_located,
        calls: TRACKS_WITH_VENUE,
        join: VENUE_JOIN,
        operation: count,
    },
    PlanRule {
        kind: IntentKind::CountOccurrences,
        requires: &[Song],
        applies: thresholded,
        calls: &[TRACKS],
        join: None,
        operation: count,
    },
    PlanRule {
        kind: IntentKind::CountOccurrences,
        requires: &[Song],
        applies: always,
        calls: &[SETLISTS],
        join: None,
        operation: count,
    },
    PlanRule {
        kind: IntentKind::GapLookup,
        requires: &[Song],
        applies: always,
        calls: &[SETLISTS, call(CallLabel::Shows, Endpoint::Shows)],
        join: None,
        operation: gap,
    },
    PlanRule {
        kind: IntentKind::NeverPlayed,
        requires: &[Venue],
        applies: always,
        calls: &[
            call(CallLabel::Universe, Endpoint::Songs),
            call(CallLabel::Exclusion, Endpoint::VenueSetlists),
        ],
        join: None,
        operation: set_difference,
    },
    // A show date wins over a song: the question is about that show's slot.
    PlanRule {
        kind: IntentKind::PositionalLookup,
        requires: &[ShowDate, Position],
        applies: always,
        calls: &[ONE_SHOW],
        join: None,
        operation: value_at,
    },
    PlanRule {
        kind: IntentKind::PositionalLookup,
        requires: &[Song, Position],
        applies: across_shows,
        calls: &[SETLISTS],
        join: None,
        operation: count,
    },
    PlanRule {
        kind: IntentKind::ShowSetlist,
        requires: &[ShowDate],
        applies: always,
        calls: &[ONE_SHOW],
        join: None,
        operation: value_at,
    },
    PlanRule {
        kind: IntentKind::VenueSuperlative,
        requires: &[Venue],
        applies: always,
        calls: &[call(CallLabel::Primary, Endpoint::VenueTracks)],
        join: None,
        operation: superlative,
    },
    PlanRule {
        kind: IntentKind::SongRanking,
        requires: &[],
        applies: always,
        calls: &[call(CallLabel::Primary, Endpoint::SongStats)],
        join: None,
        operation: rank,
    },
    PlanRule {
        kind: IntentKind::Comparison,
        requires: &[Song, SecondSong],
        applies: by_play_count,
        calls: &[
            call(CallLabel::CompareLeft, Endpoint::SongSetlists),
            CallTemplate {
                song_role: SecondSong,
                ..call(CallLabel::CompareRight, Endpoint::SongSetlists)
            },
        ],
        join: None,
        operation: compare,
    },
    PlanRule {
        kind: IntentKind::Comparison,
        requires: &[Song, SecondSong],
        applies: always,
        calls: &[
            call(CallLabel::CompareLeft, Endpoint::SongTracks),
            CallTemplate {
                song_role: SecondSong,
                ..call(CallLabel::CompareRight, Endpoint::SongTracks)
            },
        ],
        join: None,
        operation: compare,
    },
    PlanRule {
        kind: IntentKind::AverageDuration,
        requires: &[Song],
        applies: located,
        calls: TRACKS_WITH_VENUE,
        join: VENUE_JOIN,
        operation: average,
    },
    PlanRule {
        kind: IntentKind::AverageDuration,
        requires: &[Song],
        applies: always,
        calls: &[TRACKS],
        join: None,
        operation: average,
    },
    PlanRule {
        kind: IntentKind::FirstPlayed,
        requires: &[Song],
        applies: always,
        calls: &[SETLISTS],
        join: None,
        operation: earliest,
    },
    PlanRule {
        kind: IntentKind::LastPlayed,
        requires: &[Song],
        applies: always,
        calls: &[SETLISTS],
        join: None,
        operation: most_recent,
    },
    PlanRule {
        kind: IntentKind::ShowCount,
        requires: &[],
        applies: always,
        calls: &[call(CallLabel::Primary, Endpoint::Shows)],
        join: None,
        operation: count,
    },
    PlanRule {
        kind: IntentKind::JamHighlights,
        requires: &[Song],
        applies: always,
        calls: &[call(CallLabel::Primary, Endpoint::JamCharts)],
        join: None,
        operation: list,
    },
];
