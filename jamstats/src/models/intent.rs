use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// What a question is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntentKind {
    SuperlativePerformance,
    CountOccurrences,
    GapLookup,
    NeverPlayed,
    PositionalLookup,
    Comparison,
    Compound,
    AverageDuration,
    FirstPlayed,
    LastPlayed,
    ShowCount,
    JamHighlights,
    ShowSetlist,
    VenueSuperlative,
    SongRanking,
}

impl IntentKind {
    pub const ALL: &'static [IntentKind] = &[
        Self::SuperlativePerformance,
        Self::CountOccurrences,
        Self::GapLookup,
        Self::NeverPlayed,
        Self::PositionalLookup,
        Self::Comparison,
        Self::Compound,
        Self::AverageDuration,
        Self::FirstPlayed,
        Self::LastPlayed,
        Self::ShowCount,
        Self::JamHighlights,
        Self::ShowSetlist,
        Self::VenueSuperlative,
        Self::SongRanking,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperlativePerformance => "superlative-performance",
            Self::CountOccurrences => "count-occurrences",
            Self::GapLookup => "gap-lookup",
            Self::NeverPlayed => "never-played",
            Self::PositionalLookup => "positional-lookup",
            Self::Comparison => "comparison",
            Self::Compound => "compound",
            Self::AverageDuration => "average-duration",
            Self::FirstPlayed => "first-played",
            Self::LastPlayed => "last-played",
            Self::ShowCount => "show-count",
            Self::JamHighlights => "jam-highlights",
            Self::ShowSetlist => "show-setlist",
            Self::VenueSuperlative => "venue-superlative",
            Self::SongRanking => "song-ranking",
        }
    }

    /// One-line description handed to the understanding service.
    pub fn description(&self) -> &'static str {
        match self {
            Self::SuperlativePerformance => "longest or shortest performance of a song",
            Self::CountOccurrences => {
                "how many times a song was played, optionally at a venue, in a date range, in a set position or above a duration threshold"
            }
            Self::GapLookup => "how many shows since a song was last played",
            Self::NeverPlayed => "songs that have never been played at a venue",
            Self::PositionalLookup => {
                "how often a song filled a set position (opener, encore, first set, second set), or which song(s) filled a position on a given show date"
            }
            Self::Comparison => "compare two songs by average length or play count",
            Self::Compound => "two or three independent questions asked together",
            Self::AverageDuration => {
                "average length of a song, or a percentile of its length (median is the 50th)"
            }
            Self::FirstPlayed => {
                "debut performance of a song, optionally its first time in a set position (first opener, first encore)"
            }
            Self::LastPlayed => {
                "most recent performance of a song, optionally its last time in a set position (last opener, last encore)"
            }
            Self::ShowCount => "number of shows, optionally at a venue, in a country or in a date range",
            Self::JamHighlights => "curated jam chart highlights for a song",
            Self::ShowSetlist => "the full setlist of the show on a given date, set by set",
            Self::VenueSuperlative => {
                "longest or shortest performance of any song at a venue"
            }
            Self::SongRanking => {
                "songs ranked by times played (most played, rarest) or by current gap in shows (biggest gaps)"
            }
        }
    }

    /// Entity roles a follow-up may carry over from an earlier turn when the
    /// question leaves them unstated.
    pub fn anchor_roles(&self) -> &'static [EntityRole] {
        match self {
            Self::SuperlativePerformance
            | Self::CountOccurrences
            | Self::GapLookup
            | Self::AverageDuration
            | Self::FirstPlayed
            | Self::LastPlayed
            | Self::JamHighlights => &[EntityRole::Song],
            Self::NeverPlayed | Self::VenueSuperlative => &[EntityRole::Venue],
            Self::ShowSetlist => &[EntityRole::ShowDate],
            Self::Comparison => &[EntityRole::Song, EntityRole::SecondSong],
            Self::PositionalLookup => &[EntityRole::Position],
            Self::ShowCount | Self::SongRanking | Self::Compound => &[],
        }
    }

    /// Answers to these kinds change whenever the band plays another show.
    pub fn is_recency_sensitive(&self) -> bool {
        matches!(self, Self::LastPlayed | Self::GapLookup | Self::SongRanking)
    }
}

impl std::fmt::Display for IntentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IntentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', ' '], "-");
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("Unknown intent kind: {s}"))
    }
}

/// Role an entity plays in an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityRole {
    Song,
    SecondSong,
    Venue,
    DateRange,
    ShowDate,
    Country,
    Position,
    Threshold,
    Metric,
    Direction,
    Limit,
    Percentile,
}

impl EntityRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Song => "song",
            Self::SecondSong => "second_song",
            Self::Venue => "venue",
            Self::DateRange => "date_range",
            Self::ShowDate => "show_date",
            Self::Country => "country",
            Self::Position => "position",
            Self::Threshold => "threshold",
            Self::Metric => "metric",
            Self::Direction => "direction",
            Self::Limit => "limit",
            Self::Percentile => "percentile",
        }
    }
}

impl std::fmt::Display for EntityRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Human-facing: used in clarification prompts.
        let text = match self {
            Self::SecondSong => "second song",
            Self::DateRange => "date range",
            Self::ShowDate => "show date",
            other => other.as_str(),
        };
        f.write_str(text)
    }
}

impl std::str::FromStr for EntityRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "song" => Ok(Self::Song),
            "second_song" => Ok(Self::SecondSong),
            "venue" => Ok(Self::Venue),
            "date_range" | "year" | "start_date" | "end_date" => Ok(Self::DateRange),
            "show_date" => Ok(Self::ShowDate),
            "country" => Ok(Self::Country),
            "position" => Ok(Self::Position),
            "threshold" | "threshold_minutes" => Ok(Self::Threshold),
            "metric" => Ok(Self::Metric),
            "direction" => Ok(Self::Direction),
            "limit" => Ok(Self::Limit),
            "percentile" => Ok(Self::Percentile),
            _ => Err(format!("Unknown entity role: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Duration,
    PlayCount,
    /// Shows since the most recent performance.
    Gap,
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "duration" | "length" => Ok(Self::Duration),
            "play_count" | "plays" | "count" => Ok(Self::PlayCount),
            "gap" | "shows_since" => Ok(Self::Gap),
            _ => Err(format!("Unknown metric: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Max,
    Min,
}

impl Direction {
    pub fn superlative(&self) -> &'static str {
        match self {
            Self::Max => "longest",
            Self::Min => "shortest",
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "max" | "longest" | "most" => Ok(Self::Max),
            "min" | "shortest" | "least" => Ok(Self::Min),
            _ => Err(format!("Unknown direction: {s}")),
        }
    }
}

/// Place in a show's running order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    /// First song of the show.
    Opener,
    Encore,
    FirstSet,
    SecondSet,
}

impl Position {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Opener => "opener",
            Self::Encore => "encore",
            Self::FirstSet => "first-set song",
            Self::SecondSet => "second-set song",
        }
    }

    /// Whether a setlist slot (`set` code and show-wide position) fills this role.
    pub fn matches(&self, set: &str, position: Option<u32>) -> bool {
        let set = set.trim().to_lowercase();
        match self {
            Self::Opener => set == "1" && position == Some(1),
            Self::Encore => set.starts_with('e'),
            Self::FirstSet => set == "1",
            Self::SecondSet => set == "2",
        }
    }
}

impl std::str::FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "opener" | "show_opener" | "set1_opener" => Ok(Self::Opener),
            "encore" | "closer_encore" => Ok(Self::Encore),
            "first_set" | "set1" | "set_1" => Ok(Self::FirstSet),
            "second_set" | "set2" | "set_2" => Ok(Self::SecondSet),
            _ => Err(format!("Unknown position: {s}")),
        }
    }
}

/// Inclusive date bounds; either side may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn year(year: i32) -> Option<Self> {
        Some(Self {
            start: NaiveDate::from_ymd_opt(year, 1, 1),
            end: Some(NaiveDate::from_ymd_opt(year, 12, 31)?),
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |start| date >= start) && self.end.map_or(true, |end| date <= end)
    }

    pub fn is_open_ended(&self) -> bool {
        self.end.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SongRef {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VenueRef {
    /// Setlist-source venue id; unknown for seeded venues until the catalog is refreshed.
    pub id: Option<u64>,
    pub name: String,
}

/// Catalog-resolved entities, one slot per role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song: Option<SongRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second_song: Option<SongRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<VenueRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Duration threshold, milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<Metric>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Nearest-rank percentile, 0 to 100.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentile: Option<u8>,
}

impl Entities {
    pub fn has(&self, role: EntityRole) -> bool {
        match role {
            EntityRole::Song => self.song.is_some(),
            EntityRole::SecondSong => self.second_song.is_some(),
            EntityRole::Venue => self.venue.is_some(),
            EntityRole::DateRange => self.date_range.is_some(),
            EntityRole::ShowDate => self.show_date.is_some(),
            EntityRole::Country => self.country.is_some(),
            EntityRole::Position => self.position.is_some(),
            EntityRole::Threshold => self.threshold_ms.is_some(),
            EntityRole::Metric => self.metric.is_some(),
            EntityRole::Direction => self.direction.is_some(),
            EntityRole::Limit => self.limit.is_some(),
            EntityRole::Percentile => self.percentile.is_some(),
        }
    }

    /// A show date pins a question to one show's setlist rather than a
    /// song's history. Planner and templates both branch on this.
    pub fn names_a_show(&self) -> bool {
        self.show_date.is_some()
    }

    pub fn present_roles(&self) -> Vec<EntityRole> {
        const ROLES: [EntityRole; 12] = [
            EntityRole::Song,
            EntityRole::SecondSong,
            EntityRole::Venue,
            EntityRole::DateRange,
            EntityRole::ShowDate,
            EntityRole::Country,
            EntityRole::Position,
            EntityRole::Threshold,
            EntityRole::Metric,
            EntityRole::Direction,
            EntityRole::Limit,
            EntityRole::Percentile,
        ];
        ROLES.into_iter().filter(|role| self.has(*role)).collect()
    }

    /// Copy `role` from `other` when it is set there. Returns whether anything was copied.
    pub fn inherit(&mut self, role: EntityRole, other: &Entities) -> bool {
        if !other.has(role) {
            return false;
        }
        match role {
            EntityRole::Song => self.song = other.song.clone(),
            EntityRole::SecondSong => self.second_song = other.second_song.clone(),
            EntityRole::Venue => self.venue = other.venue.clone(),
            EntityRole::DateRange => self.date_range = other.date_range,
            EntityRole::ShowDate => self.show_date = other.show_date,
            EntityRole::Country => self.country = other.country.clone(),
            EntityRole::Position => self.position = other.position,
            EntityRole::Threshold => self.threshold_ms = other.threshold_ms,
            EntityRole::Metric => self.metric = other.metric,
            EntityRole::Direction => self.direction = other.direction,
            EntityRole::Limit => self.limit = other.limit,
            EntityRole::Percentile => self.percentile = other.percentile,
        }
        true
    }
}

/// A validated, catalog-grounded reading of a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub kind: IntentKind,
    pub entities: Entities,
    pub confidence: f32,
    pub response_template: String,
    /// Sub-intents of a `compound` intent; empty otherwise.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<Intent>,
    /// Roles filled from conversation context rather than the question.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inherited: Vec<EntityRole>,
}

impl Intent {
    /// Fields the aggregator produces for this intent; the only names a
    /// response template may reference.
    pub fn producible_fields(&self) -> &'static [&'static str] {
        match self.kind {
            IntentKind::SuperlativePerformance => &[
                "song",
                "superlative",
                "duration",
                "date",
                "venue",
                "performances",
            ],
            IntentKind::CountOccurrences if self.entities.threshold_ms.is_some() => &[
                "song",
                "count",
                "total",
                "scope",
                "threshold",
                "first_date",
                "last_date",
            ],
            IntentKind::CountOccurrences => {
                &["song", "count", "total", "scope", "first_date", "last_date"]
            }
            IntentKind::VenueSuperlative => &[
                "venue",
                "song",
                "superlative",
                "duration",
                "date",
                "performances",
            ],
            IntentKind::GapLookup => &["song", "gap", "last_date", "last_venue", "total"],
            IntentKind::NeverPlayed => &["venue", "songs", "count"],
            IntentKind::PositionalLookup if self.entities.names_a_show() => {
                &["date", "venue", "position", "songs"]
            }
            IntentKind::PositionalLookup => &[
                "song",
                "position",
                "count",
                "scope",
                "last_date",
                "last_venue",
            ],
            IntentKind::Comparison => &[
                "song",
                "second_song",
                "metric",
                "song_value",
                "second_value",
                "leader",
                "difference",
            ],
            IntentKind::AverageDuration if self.entities.percentile.is_some() => {
                &["song", "percentile", "value", "performances"]
            }
            IntentKind::AverageDuration => &[
                "song",
                "average",
                "median",
                "shortest",
                "longest",
                "performances",
            ],
            IntentKind::FirstPlayed | IntentKind::LastPlayed
                if self.entities.position.is_some() =>
            {
                &["song", "position", "date", "venue", "performances"]
            }
            IntentKind::FirstPlayed | IntentKind::LastPlayed => {
                &["song", "date", "venue", "performances"]
            }
            IntentKind::ShowCount => &["count", "scope", "first_date", "last_date"],
            IntentKind::JamHighlights => &["song", "count", "highlights", "latest_date"],
            IntentKind::ShowSetlist => &["date", "venue", "sets", "songs", "count"],
            IntentKind::SongRanking => &["label", "ranking", "top", "top_value", "count"],
            IntentKind::Compound => &[],
        }
    }

    /// Union of the fields every variant of `kind` can produce.
    pub fn fields_for_kind(kind: IntentKind) -> Vec<&'static str> {
        let variants = [
            Entities::default(),
            Entities {
                threshold_ms: Some(0),
                ..Default::default()
            },
            Entities {
                show_date: NaiveDate::from_ymd_opt(2000, 1, 1),
                ..Default::default()
            },
            Entities {
                position: Some(Position::Opener),
                ..Default::default()
            },
            Entities {
                percentile: Some(50),
                ..Default::default()
            },
        ];
        let mut fields: Vec<&'static str> = Vec::new();
        for entities in variants {
            let variant = Intent {
                kind,
                entities,
                confidence: 1.0,
                response_template: String::new(),
                parts: Vec::new(),
                inherited: Vec::new(),
            };
            for field in variant.producible_fields() {
                if !fields.contains(field) {
                    fields.push(field);
                }
            }
        }
        fields
    }

    /// Template used when the understanding service does not propose one.
    pub fn default_template(&self) -> &'static str {
        match self.kind {
            IntentKind::SuperlativePerformance => {
                "The {superlative} {song} was {duration}, played at {venue} on {date}."
            }
            IntentKind::CountOccurrences if self.entities.threshold_ms.is_some() => {
                "{song} has run {threshold} or longer {count} times {scope}."
            }
            IntentKind::CountOccurrences => "{song} has been played {count} times {scope}.",
            IntentKind::GapLookup => {
                "{song} has a gap of {gap} shows. It was last played on {last_date} at {last_venue}."
            }
            IntentKind::VenueSuperlative => {
                "The {superlative} performance at {venue} was {song} at {duration} on {date}."
            }
            IntentKind::NeverPlayed => "Songs never played at {venue}: {songs}.",
            IntentKind::PositionalLookup if self.entities.names_a_show() => {
                "The {position} on {date} at {venue}: {songs}."
            }
            IntentKind::PositionalLookup => {
                "{song} has been played as the {position} {count} times {scope}."
            }
            IntentKind::Comparison => {
                "By {metric}, {song} comes in at {song_value} and {second_song} at {second_value}. {leader} leads by {difference}."
            }
            IntentKind::AverageDuration if self.entities.percentile.is_some() => {
                "The {percentile} percentile {song} runs {value} across {performances} performances."
            }
            IntentKind::AverageDuration => {
                "The average {song} is {average} across {performances} performances (median {median}, shortest {shortest}, longest {longest})."
            }
            IntentKind::FirstPlayed if self.entities.position.is_some() => {
                "{song} was first played as the {position} on {date} at {venue}."
            }
            IntentKind::FirstPlayed => "{song} debuted on {date} at {venue}.",
            IntentKind::LastPlayed if self.entities.position.is_some() => {
                "{song} was last played as the {position} on {date} at {venue}."
            }
            IntentKind::LastPlayed => "{song} was last played on {date} at {venue}.",
            IntentKind::ShowCount => "The band has played {count} shows {scope}.",
            IntentKind::JamHighlights => {
                "{song} has {count} jam chart versions. Most recent first: {highlights}."
            }
            IntentKind::ShowSetlist => "Setlist for {date} at {venue}: {sets}.",
            IntentKind::SongRanking => "{label}: {ranking}.",
            IntentKind::Compound => "",
        }
    }

    /// Canonical form used in cache keys: everything but confidence.
    pub fn normalized(&self) -> serde_json::Value {
        serde_json::json!({
            "kind": self.kind,
            "entities": self.entities,
            "template": self.response_template,
            "parts": self.parts.iter().map(Intent::normalized).collect::<Vec<_>>(),
        })
    }
}
