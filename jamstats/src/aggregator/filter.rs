use crate::catalog::normalize;
use crate::models::{Record, RecordFilter};

fn venue_matches(record: &Record, filter: &RecordFilter) -> bool {
    if let (Some(wanted), Some(id)) = (filter.venue_id, record.venue_id()) {
        return wanted == id;
    }
    let Some(wanted) = filter.venue_name.as_deref().map(normalize) else {
        return filter.venue_id.is_none();
    };
    // A joined row may carry the other source's spelling as a conflict.
    let discarded = record
        .conflicts
        .iter()
        .filter(|c| c.field == "venue")
        .map(|c| c.discarded.as_str());
    record
        .venue_name()
        .into_iter()
        .chain(discarded)
        .map(normalize)
        .any(|name| name == wanted || name.contains(&wanted) || wanted.contains(&name))
}

fn country_matches(record: &Record, wanted: &str) -> bool {
    record
        .country()
        .map_or(false, |country| country.eq_ignore_ascii_case(wanted))
}

/// Whether `record` falls inside every bound `filter` sets.
pub(super) fn matches(record: &Record, filter: &RecordFilter) -> bool {
    if (filter.venue_id.is_some() || filter.venue_name.is_some()) && !venue_matches(record, filter)
    {
        return false;
    }
    if let Some(range) = &filter.date_range {
        if !record.date().map_or(false, |d| range.contains(d)) {
            return false;
        }
    }
    if let Some(show_date) = filter.show_date {
        if record.date() != Some(show_date) {
            return false;
        }
    }
    if let Some(country) = &filter.country {
        if !country_matches(record, country) {
            return false;
        }
    }
    if let Some(position) = filter.position {
        let Some(set) = record.set_code() else {
            return false;
        };
        if !position.matches(set, record.position()) {
            return false;
        }
    }
    if let Some(threshold) = filter.threshold_ms {
        if !record.duration_ms().map_or(false, |ms| ms >= threshold) {
            return false;
        }
    }
    true
}

pub(super) fn apply(records: &[Record], filter: &RecordFilter) -> Vec<Record> {
    if filter.is_empty() {
        return records.to_vec();
    }
    records
        .iter()
        .filter(|record| matches(record, filter))
        .cloned()
        .collect()
}
