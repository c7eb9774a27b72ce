use std::collections::{HashMap, VecDeque};

use chrono::NaiveDate;

use crate::catalog::slugify;
use crate::models::{JoinMode, Record};

#[derive(Debug, Clone, PartialEq)]
pub(super) struct Joined {
    pub records: Vec<Record>,
    /// Rows discarded for lack of a partner.
    pub dropped: usize,
    /// Rows considered on both sides.
    pub total: usize,
}

impl Joined {
    pub fn drop_fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.dropped as f64 / self.total as f64
        }
    }
}

type JoinKey = (NaiveDate, String);

/// Show date plus song slug. Rows lacking either cannot be joined.
fn key(record: &Record) -> Option<JoinKey> {
    let date = record.date()?;
    let slug = record
        .slug()
        .map(str::to_string)
        .or_else(|| record.song_name().map(slugify))?;
    Some((date, slug))
}

/// Match `left` rows to `right` rows on (date, slug). A song played twice
/// in one show pairs up in order of appearance.
pub(super) fn join(left: &[Record], right: &[Record], mode: JoinMode) -> Joined {
    let mut partners: HashMap<JoinKey, VecDeque<&Record>> = HashMap::new();
    let mut unkeyed_right = 0;
    for record in right {
        match key(record) {
            Some(k) => partners.entry(k).or_default().push_back(record),
            None => unkeyed_right += 1,
        }
    }

    let mut records = Vec::with_capacity(left.len());
    let mut unmatched_left = 0;
    for record in left {
        let partner = key(record).and_then(|k| partners.get_mut(&k)?.pop_front());
        match (partner, mode) {
            (Some(partner), _) => {
                let mut merged = record.clone();
                merged.merge(partner);
                records.push(merged);
            }
            (None, JoinMode::Enrich) => records.push(record.clone()),
            (None, JoinMode::Inner) => unmatched_left += 1,
        }
    }

    let (dropped, total) = match mode {
        JoinMode::Inner => {
            let unmatched_right: usize = partners.values().map(VecDeque::len).sum();
            (
                unmatched_left + unmatched_right + unkeyed_right,
                left.len() + right.len(),
            )
        }
        // Annotations cover a subset of performances by nature.
        JoinMode::Enrich => (0, left.len()),
    };

    Joined {
        records,
        dropped,
        total,
    }
}
