use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::plan::SourceId;

/// A value tagged with the source that reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sourced<T> {
    pub value: T,
    pub source: SourceId,
}

impl<T> Sourced<T> {
    pub fn new(source: SourceId, value: T) -> Self {
        Self { value, source }
    }
}

/// Two sources disagreed on a field; the kept value stays on the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConflict {
    pub field: String,
    pub kept: String,
    pub kept_source: SourceId,
    pub discarded: String,
    pub discarded_source: SourceId,
}

/// Normalized performance row. Every field carries its provenance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_id: Option<Sourced<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<Sourced<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<Sourced<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue_id: Option<Sourced<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<Sourced<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<Sourced<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song: Option<Sourced<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song_slug: Option<Sourced<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<Sourced<u64>>,
    /// Set code as reported by the setlist source: "1", "2", "3", "e", "e2".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set: Option<Sourced<String>>,
    /// Position within the show.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Sourced<u32>>,
    /// Shows since the previous performance, as reported by the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap: Option<Sourced<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub times_played: Option<Sourced<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jam_note: Option<Sourced<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<FieldConflict>,
}

macro_rules! merge_field {
    ($self:ident, $other:ident, $field:ident) => {
        match (&$self.$field, &$other.$field) {
            (None, Some(theirs)) => $self.$field = Some(theirs.clone()),
            (Some(ours), Some(theirs)) if ours.value != theirs.value => {
                $self.conflicts.push(FieldConflict {
                    field: stringify!($field).to_string(),
                    kept: ours.value.to_string(),
                    kept_source: ours.source,
                    discarded: theirs.value.to_string(),
                    discarded_source: theirs.source,
                });
            }
            _ => {}
        }
    };
}

impl Record {
    pub fn date(&self) -> Option<NaiveDate> {
        self.date.as_ref().map(|d| d.value)
    }

    pub fn song_name(&self) -> Option<&str> {
        self.song.as_ref().map(|s| s.value.as_str())
    }

    pub fn slug(&self) -> Option<&str> {
        self.song_slug.as_ref().map(|s| s.value.as_str())
    }

    pub fn venue_name(&self) -> Option<&str> {
        self.venue.as_ref().map(|v| v.value.as_str())
    }

    pub fn venue_id(&self) -> Option<u64> {
        self.venue_id.as_ref().map(|v| v.value)
    }

    pub fn show_id(&self) -> Option<u64> {
        self.show_id.as_ref().map(|v| v.value)
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms.as_ref().map(|v| v.value)
    }

    pub fn set_code(&self) -> Option<&str> {
        self.set.as_ref().map(|s| s.value.as_str())
    }

    pub fn position(&self) -> Option<u32> {
        self.position.as_ref().map(|p| p.value)
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_ref().map(|c| c.value.as_str())
    }

    /// Fill fields missing here from `other`. Where both carry a value and
    /// they differ, this record's value is kept and the disagreement is
    /// recorded in `conflicts`.
    pub fn merge(&mut self, other: &Record) {
        merge_field!(self, other, show_id);
        merge_field!(self, other, date);
        merge_field!(self, other, venue);
        merge_field!(self, other, venue_id);
        merge_field!(self, other, city);
        merge_field!(self, other, country);
        merge_field!(self, other, song);
        merge_field!(self, other, song_slug);
        merge_field!(self, other, duration_ms);
        merge_field!(self, other, set);
        merge_field!(self, other, position);
        merge_field!(self, other, gap);
        merge_field!(self, other, times_played);
        merge_field!(self, other, jam_note);
        self.conflicts.extend(other.conflicts.iter().cloned());
    }
}
