use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::intent::{DateRange, Direction, IntentKind, Metric, Position};

/// Identifier of an external statistics source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    /// Setlists, gaps, venue history, jam charts.
    PhishNet,
    /// Per-track durations from audience and soundboard recordings.
    PhishIn,
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PhishNet => "phishnet",
            Self::PhishIn => "phishin",
        }
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['.', '-', '_'], "").as_str() {
            "phishnet" => Ok(Self::PhishNet),
            "phishin" => Ok(Self::PhishIn),
            _ => Err(format!("Unknown source: {s}")),
        }
    }
}

/// Query parameter slot on an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    SongSlug,
    VenueId,
    /// Duration-source venue slug, derived from the venue name.
    VenueSlug,
    ShowDate,
}

/// Endpoint families the planner can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    SongSetlists,
    VenueSetlists,
    ShowSetlist,
    Shows,
    Songs,
    /// Same list as `Songs`, read for its play counts and gaps.
    SongStats,
    Venues,
    JamCharts,
    SongTracks,
    /// Every track of every show at one venue.
    VenueTracks,
}

impl Endpoint {
    pub fn source(&self) -> SourceId {
        match self {
            Self::SongTracks | Self::VenueTracks => SourceId::PhishIn,
            _ => SourceId::PhishNet,
        }
    }

    pub fn required_params(&self) -> &'static [ParamKind] {
        match self {
            Self::SongSetlists | Self::JamCharts | Self::SongTracks => &[ParamKind::SongSlug],
            Self::VenueSetlists => &[ParamKind::VenueId],
            Self::VenueTracks => &[ParamKind::VenueSlug],
            Self::ShowSetlist => &[ParamKind::ShowDate],
            Self::Shows | Self::Songs | Self::SongStats | Self::Venues => &[],
        }
    }

    /// Reference lists that change rarely.
    pub fn is_static(&self) -> bool {
        matches!(self, Self::Songs | Self::Venues)
    }
}

/// Role a call's records play in the aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallLabel {
    Primary,
    Secondary,
    Universe,
    Exclusion,
    Annotation,
    Shows,
    CompareLeft,
    CompareRight,
}

impl std::fmt::Display for CallLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Universe => "universe",
            Self::Exclusion => "exclusion",
            Self::Annotation => "annotation",
            Self::Shows => "shows",
            Self::CompareLeft => "compare_left",
            Self::CompareRight => "compare_right",
        };
        f.write_str(text)
    }
}

/// Cache lifetime class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlClass {
    Static,
    Historical,
    Recency,
}

impl TtlClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Historical => "historical",
            Self::Recency => "recency",
        }
    }
}

impl std::fmt::Display for TtlClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TtlClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "historical" => Ok(Self::Historical),
            "recency" => Ok(Self::Recency),
            _ => Err(format!("Unknown TTL class: {s}")),
        }
    }
}

/// One request to one source endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceCall {
    pub label: CallLabel,
    pub source: SourceId,
    pub endpoint: Endpoint,
    pub params: BTreeMap<ParamKind, String>,
    /// A failed required call fails the query; an optional one only drops its fields.
    pub required: bool,
}

impl SourceCall {
    pub fn new(label: CallLabel, endpoint: Endpoint) -> Self {
        Self {
            label,
            source: endpoint.source(),
            endpoint,
            params: BTreeMap::new(),
            required: true,
        }
    }

    pub fn param(mut self, kind: ParamKind, value: impl Into<String>) -> Self {
        self.params.insert(kind, value.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn get(&self, kind: ParamKind) -> Option<&str> {
        self.params.get(&kind).map(String::as_str)
    }

    pub fn ttl_class(&self) -> TtlClass {
        if self.endpoint.is_static() {
            TtlClass::Static
        } else {
            TtlClass::Historical
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinMode {
    /// Keep only rows present on both sides.
    Inner,
    /// Keep every left row, enrich the ones that match.
    Enrich,
}

/// Join of two calls' records on (show date, song slug).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinSpec {
    pub left: CallLabel,
    pub right: CallLabel,
    pub mode: JoinMode,
}

/// Row filter applied after joining.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue_id: Option<u64>,
    /// Matched against the record's venue name when either side lacks an id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_ms: Option<u64>,
    /// Human description of the scope, e.g. "at Madison Square Garden in 2023".
    pub scope: String,
}

impl RecordFilter {
    pub fn is_empty(&self) -> bool {
        self.venue_id.is_none()
            && self.venue_name.is_none()
            && self.date_range.is_none()
            && self.show_date.is_none()
            && self.country.is_none()
            && self.position.is_none()
            && self.threshold_ms.is_none()
    }
}

/// Aggregation applied to the filtered records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Superlative { direction: Direction },
    Count,
    Average,
    SetDifference,
    MostRecent,
    Earliest,
    Gap,
    Compare { metric: Metric },
    List { limit: usize },
    ValueAt,
    /// Nearest-rank percentile of durations.
    Percentile { p: u8 },
    /// Songs ordered by a catalog-wide stat.
    Rank {
        metric: Metric,
        direction: Direction,
        limit: usize,
    },
    Compound,
}

/// Everything the aggregator needs to answer one intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchPlan {
    pub kind: IntentKind,
    pub calls: Vec<SourceCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join: Option<JoinSpec>,
    pub filter: RecordFilter,
    pub operation: Operation,
    /// Sub-plans of a compound plan, in question order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<DispatchPlan>,
    pub ttl_class: TtlClass,
}

impl DispatchPlan {
    pub fn call(&self, label: CallLabel) -> Option<&SourceCall> {
        self.calls.iter().find(|c| c.label == label)
    }

    /// Stable digest of the plan, used as part of answer cache keys.
    pub fn signature(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        let digest = Sha256::digest(&canonical);
        digest.iter().take(16).map(|b| format!("{b:02x}")).collect()
    }
}
