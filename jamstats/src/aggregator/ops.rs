//! Aggregation operators over normalized, filtered records.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use crate::catalog::slugify;
use crate::error::AggregationFailure;
use crate::format;
use crate::models::{
    AggregationResult, Baseline, CallLabel, Direction, DispatchPlan, FieldValue, Intent,
    IntentKind, Metric, Operation, Record,
};

/// Supporting rows kept on a result.
const SUPPORTING_ROWS: usize = 5;

/// Records per call label, before and after the plan's filter.
#[derive(Debug, Default)]
pub(super) struct CallData {
    /// Primary rows are already joined here.
    pub raw: BTreeMap<CallLabel, Vec<Record>>,
    pub filtered: BTreeMap<CallLabel, Vec<Record>>,
}

impl CallData {
    pub fn raw(&self, label: CallLabel) -> &[Record] {
        self.raw.get(&label).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn filtered(&self, label: CallLabel) -> &[Record] {
        self.filtered
            .get(&label)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

type OpResult = Result<(), AggregationFailure>;

pub(super) fn apply(
    intent: &Intent,
    plan: &DispatchPlan,
    data: &CallData,
    result: &mut AggregationResult,
) -> OpResult {
    match &plan.operation {
        Operation::Superlative { direction } => superlative(*direction, intent, data, result),
        Operation::Count => count(intent, plan, data, result),
        Operation::Average => average(intent, data, result),
        Operation::SetDifference => set_difference(intent, data, result),
        Operation::MostRecent => endpoint_performance(true, intent, data, result),
        Operation::Earliest => endpoint_performance(false, intent, data, result),
        Operation::Gap => gap(intent, data, result),
        Operation::Compare { metric } => compare(*metric, intent, data, result),
        Operation::List { limit } => list(*limit, intent, data, result),
        Operation::ValueAt => value_at(intent, data, result),
        Operation::Percentile { p } => percentile(*p, intent, data, result),
        Operation::Rank {
            metric,
            direction,
            limit,
        } => rank(*metric, *direction, *limit, data, result),
        // Compound plans are fanned out by the caller.
        Operation::Compound => Ok(()),
    }
}

fn song_name(intent: &Intent, records: &[Record]) -> String {
    intent
        .entities
        .song
        .as_ref()
        .map(|s| s.name.clone())
        .or_else(|| records.iter().find_map(Record::song_name).map(str::to_string))
        .unwrap_or_else(|| "That song".to_string())
}

/// `None` sorts after any value.
fn cmp_present<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Earlier date first, then lower show id.
fn earliest_first(a: &Record, b: &Record) -> Ordering {
    cmp_present(a.date(), b.date()).then_with(|| cmp_present(a.show_id(), b.show_id()))
}

fn latest_first(a: &Record, b: &Record) -> Ordering {
    match (a.date(), b.date()) {
        (Some(x), Some(y)) if x != y => y.cmp(&x),
        _ => earliest_first(a, b),
    }
}

fn set_date_venue(result: &mut AggregationResult, record: &Record, date: &str, venue: &str) {
    if let Some(d) = record.date() {
        result.set(date, d);
    }
    if let Some(v) = record.venue_name() {
        result.set(venue, v);
    }
}

fn with_durations(records: &[Record]) -> Vec<Record> {
    records
        .iter()
        .filter(|r| r.duration_ms().is_some())
        .cloned()
        .collect()
}

fn mean_ms(records: &[Record]) -> Option<u64> {
    let durations: Vec<u64> = records.iter().filter_map(Record::duration_ms).collect();
    if durations.is_empty() {
        return None;
    }
    let sum: u64 = durations.iter().sum();
    Some((sum as f64 / durations.len() as f64).round() as u64)
}

fn superlative(
    direction: Direction,
    intent: &Intent,
    data: &CallData,
    result: &mut AggregationResult,
) -> OpResult {
    let mut rows = with_durations(data.filtered(CallLabel::Primary));
    if rows.is_empty() {
        return Err(AggregationFailure::NoMatchingRecords);
    }
    rows.sort_by(|a, b| {
        let (x, y) = (a.duration_ms(), b.duration_ms());
        let by_length = match direction {
            Direction::Max => y.cmp(&x),
            Direction::Min => x.cmp(&y),
        };
        by_length.then_with(|| earliest_first(a, b))
    });

    let best = &rows[0];
    let best_ms = best.duration_ms().unwrap_or_default();
    result.set("song", song_name(intent, &rows));
    result.set("superlative", direction.superlative());
    result.fields.insert("duration".into(), FieldValue::DurationMs(best_ms));
    result.fields.insert("performances".into(), FieldValue::Count(rows.len() as u64));
    set_date_venue(result, best, "date", "venue");
    if intent.kind == IntentKind::VenueSuperlative {
        if let Some(venue) = &intent.entities.venue {
            result.set("venue", venue.name.clone());
        }
    }

    if let Some(average) = mean_ms(&rows) {
        result.baseline = Some(Baseline {
            label: "average".to_string(),
            measured: best_ms as f64,
            baseline: average as f64,
        });
    }
    result.sample_size = rows.len();
    rows.truncate(SUPPORTING_ROWS);
    result.records = rows;
    Ok(())
}

fn count(
    intent: &Intent,
    plan: &DispatchPlan,
    data: &CallData,
    result: &mut AggregationResult,
) -> OpResult {
    let matched = data.filtered(CallLabel::Primary);
    let total = data.raw(CallLabel::Primary).len();

    result.fields.insert("count".into(), FieldValue::Count(matched.len() as u64));
    result.set("scope", plan.filter.scope.clone());
    if intent.kind != IntentKind::ShowCount {
        result.set("song", song_name(intent, matched));
    }

    let first = matched.iter().filter(|r| r.date().is_some()).min_by(|a, b| earliest_first(a, b));
    let last = matched.iter().filter(|r| r.date().is_some()).min_by(|a, b| latest_first(a, b));

    match intent.kind {
        IntentKind::PositionalLookup => {
            if let Some(position) = intent.entities.position {
                result.set("position", position.label());
            }
            if let Some(last) = last {
                set_date_venue(result, last, "last_date", "last_venue");
            }
        }
        _ => {
            result.fields.insert("total".into(), FieldValue::Count(total as u64));
            if let Some(threshold) = plan.filter.threshold_ms {
                result.fields.insert("threshold".into(), FieldValue::DurationMs(threshold));
            }
            if let Some(d) = first.and_then(Record::date) {
                result.set("first_date", d);
            }
            if let Some(d) = last.and_then(Record::date) {
                result.set("last_date", d);
            }
        }
    }

    result.sample_size = total;
    let mut rows = matched.to_vec();
    rows.sort_by(latest_first);
    rows.truncate(SUPPORTING_ROWS);
    result.records = rows;
    Ok(())
}

fn average(intent: &Intent, data: &CallData, result: &mut AggregationResult) -> OpResult {
    let rows = with_durations(data.filtered(CallLabel::Primary));
    let mut durations: Vec<u64> = rows.iter().filter_map(Record::duration_ms).collect();
    let Some(mean) = mean_ms(&rows) else {
        return Err(AggregationFailure::NoMatchingRecords);
    };
    durations.sort_unstable();

    let mid = durations.len() / 2;
    let median = if durations.len() % 2 == 0 {
        (durations[mid - 1] + durations[mid]) / 2
    } else {
        durations[mid]
    };

    result.set("song", song_name(intent, &rows));
    for (name, ms) in [
        ("average", mean),
        ("median", median),
        ("shortest", durations[0]),
        ("longest", durations[durations.len() - 1]),
    ] {
        result.fields.insert(name.into(), FieldValue::DurationMs(ms));
    }
    result
        .fields
        .insert("performances".into(), FieldValue::Count(durations.len() as u64));

    result.sample_size = rows.len();
    let mut supporting = rows;
    supporting.sort_by(|a, b| b.duration_ms().cmp(&a.duration_ms()).then_with(|| earliest_first(a, b)));
    supporting.truncate(SUPPORTING_ROWS);
    result.records = supporting;
    Ok(())
}

fn song_key(record: &Record) -> Option<String> {
    record
        .slug()
        .map(str::to_string)
        .or_else(|| record.song_name().map(slugify))
}

fn set_difference(intent: &Intent, data: &CallData, result: &mut AggregationResult) -> OpResult {
    let universe = data.raw(CallLabel::Universe);
    if universe.is_empty() {
        return Err(AggregationFailure::NoMatchingRecords);
    }
    let played: HashSet<String> = data
        .filtered(CallLabel::Exclusion)
        .iter()
        .filter_map(song_key)
        .collect();

    let mut never: Vec<String> = universe
        .iter()
        .filter(|r| song_key(r).map_or(false, |key| !played.contains(&key)))
        .filter_map(|r| r.song_name().map(str::to_string))
        .collect();
    never.sort_by_key(|name| name.to_lowercase());
    never.dedup();

    let venue = intent
        .entities
        .venue
        .as_ref()
        .map(|v| v.name.clone())
        .or_else(|| {
            data.raw(CallLabel::Exclusion)
                .iter()
                .find_map(Record::venue_name)
                .map(str::to_string)
        })
        .unwrap_or_else(|| "that venue".to_string());

    result.set("venue", venue);
    result.fields.insert("count".into(), FieldValue::Count(never.len() as u64));
    result.fields.insert("songs".into(), FieldValue::List(never));
    result.sample_size = universe.len();
    Ok(())
}

/// First or most recent performance.
fn endpoint_performance(
    latest: bool,
    intent: &Intent,
    data: &CallData,
    result: &mut AggregationResult,
) -> OpResult {
    let mut rows: Vec<Record> = data
        .filtered(CallLabel::Primary)
        .iter()
        .filter(|r| r.date().is_some())
        .cloned()
        .collect();
    if rows.is_empty() {
        return Err(AggregationFailure::NoMatchingRecords);
    }
    if latest {
        rows.sort_by(latest_first);
    } else {
        rows.sort_by(earliest_first);
    }

    result.set("song", song_name(intent, &rows));
    if let Some(position) = intent.entities.position {
        result.set("position", position.label());
    }
    set_date_venue(result, &rows[0], "date", "venue");
    result.fields.insert("performances".into(), FieldValue::Count(rows.len() as u64));
    result.sample_size = rows.len();
    rows.truncate(SUPPORTING_ROWS);
    result.records = rows;
    Ok(())
}

fn gap(intent: &Intent, data: &CallData, result: &mut AggregationResult) -> OpResult {
    let plays = data.filtered(CallLabel::Primary);
    let Some(last) = plays
        .iter()
        .filter(|r| r.date().is_some())
        .min_by(|a, b| latest_first(a, b))
    else {
        return Err(AggregationFailure::NoMatchingRecords);
    };
    let last_date = last.date();

    let shows_since: HashSet<_> = data
        .raw(CallLabel::Shows)
        .iter()
        .filter_map(Record::date)
        .filter(|d| Some(*d) > last_date)
        .collect();

    result.set("song", song_name(intent, plays));
    result.fields.insert("gap".into(), FieldValue::Count(shows_since.len() as u64));
    result.fields.insert("total".into(), FieldValue::Count(plays.len() as u64));
    set_date_venue(result, last, "last_date", "last_venue");
    result.sample_size = plays.len();
    result.records = vec![last.clone()];
    Ok(())
}

fn compare(metric: Metric, intent: &Intent, data: &CallData, result: &mut AggregationResult) -> OpResult {
    let left = data.filtered(CallLabel::CompareLeft);
    let right = data.filtered(CallLabel::CompareRight);

    let (left_value, right_value) = match metric {
        Metric::Duration => match (mean_ms(left), mean_ms(right)) {
            (Some(l), Some(r)) => (l, r),
            _ => return Err(AggregationFailure::NoMatchingRecords),
        },
        Metric::PlayCount => (left.len() as u64, right.len() as u64),
        // Rejected at planning; setlist rows carry historical gaps, not current ones.
        Metric::Gap => return Err(AggregationFailure::NoMatchingRecords),
    };
    let wrap = |value: u64| match metric {
        Metric::Duration => FieldValue::DurationMs(value),
        Metric::PlayCount | Metric::Gap => FieldValue::Count(value),
    };

    let first = song_name(intent, left);
    let second = intent
        .entities
        .second_song
        .as_ref()
        .map(|s| s.name.clone())
        .or_else(|| right.iter().find_map(Record::song_name).map(str::to_string))
        .unwrap_or_else(|| "the other song".to_string());
    let leader = match left_value.cmp(&right_value) {
        Ordering::Greater => first.clone(),
        Ordering::Less => second.clone(),
        Ordering::Equal => "neither (tied)".to_string(),
    };

    result.set("song", first);
    result.set("second_song", second);
    result.set(
        "metric",
        match metric {
            Metric::Duration => "average length",
            Metric::PlayCount => "times played",
            Metric::Gap => "current gap",
        },
    );
    result.fields.insert("song_value".into(), wrap(left_value));
    result.fields.insert("second_value".into(), wrap(right_value));
    result
        .fields
        .insert("difference".into(), wrap(left_value.abs_diff(right_value)));
    result.set("leader", leader);
    result.sample_size = left.len() + right.len();
    Ok(())
}

fn list(limit: usize, intent: &Intent, data: &CallData, result: &mut AggregationResult) -> OpResult {
    let mut rows = data.filtered(CallLabel::Primary).to_vec();
    if rows.is_empty() {
        return Err(AggregationFailure::NoMatchingRecords);
    }
    rows.sort_by(latest_first);

    let highlights: Vec<String> = rows
        .iter()
        .take(limit)
        .map(|r| match (r.date(), r.venue_name()) {
            (Some(d), Some(v)) => format!("{} at {v}", format::date(d)),
            (Some(d), None) => format::date(d),
            (None, Some(v)) => v.to_string(),
            (None, None) => "undated version".to_string(),
        })
        .collect();

    result.set("song", song_name(intent, &rows));
    result.fields.insert("count".into(), FieldValue::Count(rows.len() as u64));
    result.fields.insert("highlights".into(), FieldValue::List(highlights));
    if let Some(d) = rows[0].date() {
        result.set("latest_date", d);
    }
    result.sample_size = rows.len();
    rows.truncate(limit);
    result.records = rows;
    Ok(())
}

/// "1" -> "Set 1", "e" -> "Encore", "e2" -> "Encore 2".
fn set_label(code: &str) -> String {
    match code.strip_prefix('e') {
        Some("") => "Encore".to_string(),
        Some(n) => format!("Encore {n}"),
        None => format!("Set {code}"),
    }
}

/// "Set 1: Llama, Horn; Set 2: Tweezer; Encore: Loving Cup". Rows must be in
/// running order.
fn group_by_set(rows: &[Record]) -> String {
    let mut sets: Vec<(String, Vec<&str>)> = Vec::new();
    for row in rows {
        let Some(song) = row.song_name() else {
            continue;
        };
        let code = row.set_code().unwrap_or("1");
        match sets.last_mut() {
            Some((current, songs)) if current == code => songs.push(song),
            _ => sets.push((code.to_string(), vec![song])),
        }
    }
    sets.iter()
        .map(|(code, songs)| format!("{}: {}", set_label(code), songs.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Songs filling a slot on one show's setlist, or the whole setlist, in
/// running order.
fn value_at(intent: &Intent, data: &CallData, result: &mut AggregationResult) -> OpResult {
    let mut rows = data.filtered(CallLabel::Primary).to_vec();
    if rows.is_empty() {
        return Err(AggregationFailure::NoMatchingRecords);
    }
    rows.sort_by(|a, b| cmp_present(a.position(), b.position()));

    let songs: Vec<String> = rows
        .iter()
        .filter_map(Record::song_name)
        .map(str::to_string)
        .collect();
    result.set("sets", group_by_set(&rows));
    result.fields.insert("count".into(), FieldValue::Count(songs.len() as u64));
    let position = intent
        .entities
        .position
        .map_or("setlist", |p| p.label());

    result.set("position", position);
    if let Some(date) = intent.entities.show_date.or_else(|| rows[0].date()) {
        result.set("date", date);
    }
    if let Some(venue) = rows.iter().find_map(Record::venue_name) {
        result.set("venue", venue);
    }
    result.fields.insert("songs".into(), FieldValue::List(songs));
    result.sample_size = rows.len();
    result.records = rows;
    Ok(())
}

/// Nearest-rank percentile: the smallest duration with at least `p` percent
/// of performances at or below it. `p == 0` is the shortest.
fn percentile(p: u8, intent: &Intent, data: &CallData, result: &mut AggregationResult) -> OpResult {
    let rows = with_durations(data.filtered(CallLabel::Primary));
    let mut durations: Vec<u64> = rows.iter().filter_map(Record::duration_ms).collect();
    if durations.is_empty() {
        return Err(AggregationFailure::NoMatchingRecords);
    }
    durations.sort_unstable();

    let n = durations.len();
    let rank = (usize::from(p.min(100)) * n).div_ceil(100).max(1);
    let value = durations[rank - 1];

    result.set("song", song_name(intent, &rows));
    result.set("percentile", format::ordinal(u64::from(p)));
    result.fields.insert("value".into(), FieldValue::DurationMs(value));
    result.fields.insert("performances".into(), FieldValue::Count(n as u64));
    if let Some(average) = mean_ms(&rows) {
        result.baseline = Some(Baseline {
            label: "average".to_string(),
            measured: value as f64,
            baseline: average as f64,
        });
    }

    result.sample_size = n;
    let mut supporting = rows;
    supporting.sort_by_key(|r| r.duration_ms().map(|ms| ms.abs_diff(value)));
    supporting.truncate(SUPPORTING_ROWS);
    result.records = supporting;
    Ok(())
}

fn rank_label(metric: Metric, direction: Direction) -> &'static str {
    match (metric, direction) {
        (Metric::Gap, Direction::Max) => "Biggest current gaps",
        (Metric::Gap, Direction::Min) => "Smallest current gaps",
        (_, Direction::Max) => "Most played songs",
        (_, Direction::Min) => "Rarest songs",
    }
}

/// Songs ordered by career play count or current gap; ties alphabetical.
fn rank(
    metric: Metric,
    direction: Direction,
    limit: usize,
    data: &CallData,
    result: &mut AggregationResult,
) -> OpResult {
    let value_of = |r: &Record| -> Option<u64> {
        match metric {
            Metric::PlayCount => r.times_played.as_ref().map(|t| u64::from(t.value)),
            Metric::Gap => r.gap.as_ref().map(|g| u64::from(g.value)),
            Metric::Duration => None,
        }
    };
    let mut ranked: Vec<(String, u64)> = data
        .filtered(CallLabel::Primary)
        .iter()
        .filter_map(|r| Some((r.song_name()?.to_string(), value_of(r)?)))
        .collect();
    if ranked.is_empty() {
        return Err(AggregationFailure::NoMatchingRecords);
    }
    ranked.sort_by(|(a_name, a), (b_name, b)| {
        let by_value = match direction {
            Direction::Max => b.cmp(a),
            Direction::Min => a.cmp(b),
        };
        by_value.then_with(|| a_name.to_lowercase().cmp(&b_name.to_lowercase()))
    });

    let unit = match metric {
        Metric::Gap => " shows",
        _ => "",
    };
    let ranking: Vec<String> = ranked
        .iter()
        .take(limit)
        .map(|(name, value)| format!("{name} ({value}{unit})"))
        .collect();

    result.set("label", rank_label(metric, direction));
    result.set("top", ranked[0].0.clone());
    result.fields.insert("top_value".into(), FieldValue::Count(ranked[0].1));
    result.fields.insert("count".into(), FieldValue::Count(ranked.len() as u64));
    result.fields.insert("ranking".into(), FieldValue::List(ranking));
    result.sample_size = ranked.len();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Entities, Position, RecordFilter, SongRef, SourceId, Sourced, TtlClass, VenueRef,
    };
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn net<T>(value: T) -> Option<Sourced<T>> {
        Some(Sourced::new(SourceId::PhishNet, value))
    }

    fn play(date: NaiveDate, show_id: u64, venue: &str, ms: Option<u64>) -> Record {
        Record {
            show_id: net(show_id),
            date: net(date),
            venue: net(venue.to_string()),
            song: net("Tweezer".to_string()),
            song_slug: net("tweezer".to_string()),
            duration_ms: ms.map(|ms| Sourced::new(SourceId::PhishIn, ms)),
            ..Default::default()
        }
    }

    fn song_intent(kind: IntentKind) -> Intent {
        Intent {
            kind,
            entities: Entities {
                song: Some(SongRef {
                    name: "Tweezer".into(),
                    slug: "tweezer".into(),
                }),
                ..Default::default()
            },
            confidence: 0.9,
            response_template: String::new(),
            parts: vec![],
            inherited: vec![],
        }
    }

    fn plan(kind: IntentKind, operation: Operation) -> DispatchPlan {
        DispatchPlan {
            kind,
            calls: vec![],
            join: None,
            filter: RecordFilter {
                scope: "in total".into(),
                ..Default::default()
            },
            operation,
            parts: vec![],
            ttl_class: TtlClass::Historical,
        }
    }

    fn primary(rows: Vec<Record>) -> CallData {
        let mut data = CallData::default();
        data.raw.insert(CallLabel::Primary, rows.clone());
        data.filtered.insert(CallLabel::Primary, rows);
        data
    }

    fn run(intent: &Intent, plan: &DispatchPlan, data: &CallData) -> Result<AggregationResult, AggregationFailure> {
        let mut result = AggregationResult::new(plan.kind, plan.operation.clone());
        apply(intent, plan, data, &mut result)?;
        Ok(result)
    }

    #[test]
    fn superlative_tie_goes_to_the_earlier_date() {
        let data = primary(vec![
            play(day(1999, 7, 4), 30, "Oswego", Some(1_800_000)),
            play(day(1997, 12, 6), 20, "Dayton", Some(1_800_000)),
            play(day(1994, 6, 22), 10, "Memphis", Some(600_000)),
        ]);
        let intent = song_intent(IntentKind::SuperlativePerformance);
        let plan = plan(
            IntentKind::SuperlativePerformance,
            Operation::Superlative {
                direction: Direction::Max,
            },
        );

        let result = run(&intent, &plan, &data).unwrap();
        assert_eq!(result.field("date"), Some(&FieldValue::Date(day(1997, 12, 6))));
        assert_eq!(result.field("venue"), Some(&FieldValue::Text("Dayton".into())));
        assert_eq!(result.field("duration"), Some(&FieldValue::DurationMs(1_800_000)));
        assert_eq!(result.field("performances"), Some(&FieldValue::Count(3)));
        assert_eq!(result.baseline.as_ref().map(|b| b.baseline), Some(1_400_000.0));
    }

    #[test]
    fn superlative_tie_on_same_date_goes_to_lower_show_id() {
        let date = day(1995, 12, 31);
        let data = primary(vec![
            play(date, 9, "Late", Some(700_000)),
            play(date, 4, "Early", Some(700_000)),
        ]);
        let intent = song_intent(IntentKind::SuperlativePerformance);
        let plan = plan(
            IntentKind::SuperlativePerformance,
            Operation::Superlative {
                direction: Direction::Min,
            },
        );
        let result = run(&intent, &plan, &data).unwrap();
        assert_eq!(result.field("venue"), Some(&FieldValue::Text("Early".into())));
    }

    #[test]
    fn superlative_without_durations_has_no_match() {
        let data = primary(vec![play(day(1995, 12, 31), 1, "MSG", None)]);
        let intent = song_intent(IntentKind::SuperlativePerformance);
        let plan = plan(
            IntentKind::SuperlativePerformance,
            Operation::Superlative {
                direction: Direction::Max,
            },
        );
        assert_eq!(run(&intent, &plan, &data).unwrap_err(), AggregationFailure::NoMatchingRecords);
    }

    #[test]
    fn count_may_be_zero() {
        let mut data = primary(vec![play(day(1995, 12, 31), 1, "MSG", None)]);
        data.filtered.insert(CallLabel::Primary, vec![]);
        let intent = song_intent(IntentKind::CountOccurrences);
        let result = run(&intent, &plan(IntentKind::CountOccurrences, Operation::Count), &data).unwrap();
        assert_eq!(result.field("count"), Some(&FieldValue::Count(0)));
        assert_eq!(result.field("total"), Some(&FieldValue::Count(1)));
        assert!(result.field("first_date").is_none());
    }

    #[test]
    fn positional_count_reports_latest_slot() {
        let data = primary(vec![
            play(day(1995, 12, 31), 1, "MSG", None),
            play(day(2019, 12, 30), 2, "MSG", None),
        ]);
        let mut intent = song_intent(IntentKind::PositionalLookup);
        intent.entities.position = Some(Position::Opener);
        let result = run(&intent, &plan(IntentKind::PositionalLookup, Operation::Count), &data).unwrap();
        assert_eq!(result.field("position"), Some(&FieldValue::Text("opener".into())));
        assert_eq!(result.field("last_date"), Some(&FieldValue::Date(day(2019, 12, 30))));
        assert!(result.field("total").is_none());
    }

    #[test]
    fn average_reports_median_and_extremes() {
        let data = primary(vec![
            play(day(1994, 1, 1), 1, "a", Some(600_000)),
            play(day(1995, 1, 1), 2, "b", Some(900_000)),
            play(day(1996, 1, 1), 3, "c", Some(1_200_000)),
            play(day(1997, 1, 1), 4, "d", Some(2_100_000)),
        ]);
        let intent = song_intent(IntentKind::AverageDuration);
        let result = run(&intent, &plan(IntentKind::AverageDuration, Operation::Average), &data).unwrap();
        assert_eq!(result.field("average"), Some(&FieldValue::DurationMs(1_200_000)));
        assert_eq!(result.field("median"), Some(&FieldValue::DurationMs(1_050_000)));
        assert_eq!(result.field("shortest"), Some(&FieldValue::DurationMs(600_000)));
        assert_eq!(result.field("longest"), Some(&FieldValue::DurationMs(2_100_000)));
    }

    #[test]
    fn set_difference_lists_songs_never_played_at_venue() {
        let song = |name: &str| Record {
            song: net(name.to_string()),
            song_slug: net(slugify(name)),
            ..Default::default()
        };
        let mut data = CallData::default();
        data.raw.insert(
            CallLabel::Universe,
            vec![song("Tweezer"), song("Harry Hood"), song("Fluffhead")],
        );
        data.filtered
            .insert(CallLabel::Exclusion, vec![song("Tweezer"), song("Fluffhead")]);
        let intent = Intent {
            entities: Entities {
                venue: Some(VenueRef {
                    id: Some(157),
                    name: "Madison Square Garden".into(),
                }),
                ..Default::default()
            },
            ..song_intent(IntentKind::NeverPlayed)
        };

        let result = run(&intent, &plan(IntentKind::NeverPlayed, Operation::SetDifference), &data).unwrap();
        assert_eq!(
            result.field("songs"),
            Some(&FieldValue::List(vec!["Harry Hood".into()]))
        );
        assert_eq!(result.field("count"), Some(&FieldValue::Count(1)));
    }

    #[test]
    fn set_difference_can_be_empty() {
        let song = Record {
            song: net("Tweezer".to_string()),
            song_slug: net("tweezer".to_string()),
            ..Default::default()
        };
        let mut data = CallData::default();
        data.raw.insert(CallLabel::Universe, vec![song.clone()]);
        data.filtered.insert(CallLabel::Exclusion, vec![song]);
        let intent = song_intent(IntentKind::NeverPlayed);
        let result = run(&intent, &plan(IntentKind::NeverPlayed, Operation::SetDifference), &data).unwrap();
        assert_eq!(result.field("songs"), Some(&FieldValue::List(vec![])));
    }

    #[test]
    fn gap_counts_distinct_shows_after_last_play() {
        let mut data = primary(vec![
            play(day(2019, 7, 14), 1, "Alpine Valley", None),
            play(day(2021, 8, 1), 2, "Bethel", None),
        ]);
        let show = |d: NaiveDate| Record {
            date: net(d),
            ..Default::default()
        };
        data.raw.insert(
            CallLabel::Shows,
            vec![
                show(day(2021, 7, 31)),
                show(day(2021, 8, 1)),
                show(day(2021, 8, 3)),
                show(day(2021, 8, 4)),
            ],
        );
        let intent = song_intent(IntentKind::GapLookup);
        let result = run(&intent, &plan(IntentKind::GapLookup, Operation::Gap), &data).unwrap();
        assert_eq!(result.field("gap"), Some(&FieldValue::Count(2)));
        assert_eq!(result.field("last_venue"), Some(&FieldValue::Text("Bethel".into())));
    }

    #[test]
    fn first_and_last_played() {
        let data = primary(vec![
            play(day(2019, 7, 14), 2, "Alpine Valley", None),
            play(day(1990, 12, 1), 1, "Ruggles", None),
        ]);
        let intent = song_intent(IntentKind::FirstPlayed);
        let first = run(&intent, &plan(IntentKind::FirstPlayed, Operation::Earliest), &data).unwrap();
        assert_eq!(first.field("date"), Some(&FieldValue::Date(day(1990, 12, 1))));
        let last = run(&intent, &plan(IntentKind::LastPlayed, Operation::MostRecent), &data).unwrap();
        assert_eq!(last.field("venue"), Some(&FieldValue::Text("Alpine Valley".into())));
    }

    #[test]
    fn comparison_reports_leader_and_ties() {
        let mut data = CallData::default();
        data.filtered.insert(
            CallLabel::CompareLeft,
            vec![play(day(1997, 1, 1), 1, "a", Some(1_000_000))],
        );
        data.filtered.insert(
            CallLabel::CompareRight,
            vec![play(day(1998, 1, 1), 2, "b", Some(1_600_000))],
        );
        let mut intent = song_intent(IntentKind::Comparison);
        intent.entities.second_song = Some(SongRef {
            name: "Ghost".into(),
            slug: "ghost".into(),
        });

        let by_length = run(
            &intent,
            &plan(IntentKind::Comparison, Operation::Compare { metric: Metric::Duration }),
            &data,
        )
        .unwrap();
        assert_eq!(by_length.field("leader"), Some(&FieldValue::Text("Ghost".into())));
        assert_eq!(by_length.field("difference"), Some(&FieldValue::DurationMs(600_000)));

        let by_plays = run(
            &intent,
            &plan(IntentKind::Comparison, Operation::Compare { metric: Metric::PlayCount }),
            &data,
        )
        .unwrap();
        assert_eq!(by_plays.field("leader"), Some(&FieldValue::Text("neither (tied)".into())));
        assert_eq!(by_plays.field("difference"), Some(&FieldValue::Count(0)));
    }

    #[test]
    fn highlights_are_most_recent_first_and_limited() {
        let data = primary(vec![
            play(day(1995, 12, 31), 1, "Madison Square Garden", None),
            play(day(2023, 8, 31), 3, "Dick's", None),
            play(day(2013, 10, 31), 2, "Boardwalk Hall", None),
        ]);
        let intent = song_intent(IntentKind::JamHighlights);
        let result = run(&intent, &plan(IntentKind::JamHighlights, Operation::List { limit: 2 }), &data).unwrap();
        assert_eq!(
            result.field("highlights"),
            Some(&FieldValue::List(vec![
                "Aug 31, 2023 at Dick's".into(),
                "Oct 31, 2013 at Boardwalk Hall".into(),
            ]))
        );
        assert_eq!(result.field("count"), Some(&FieldValue::Count(3)));
        assert_eq!(result.records.len(), 2);
    }

    fn lengths(ms: &[u64]) -> CallData {
        primary(
            ms.iter()
                .enumerate()
                .map(|(i, ms)| play(day(1990 + i as i32, 1, 1), i as u64, "v", Some(*ms)))
                .collect(),
        )
    }

    fn percentile_of(p: u8, data: &CallData) -> Option<FieldValue> {
        let intent = song_intent(IntentKind::AverageDuration);
        let result = run(&intent, &plan(IntentKind::AverageDuration, Operation::Percentile { p }), data).unwrap();
        result.field("value").cloned()
    }

    #[test]
    fn percentile_uses_nearest_rank() {
        let data = lengths(&[900_000, 600_000, 1_500_000, 1_200_000, 2_100_000]);
        assert_eq!(percentile_of(0, &data), Some(FieldValue::DurationMs(600_000)));
        assert_eq!(percentile_of(100, &data), Some(FieldValue::DurationMs(2_100_000)));
        // ceil(0.5 * 5) = 3rd shortest
        assert_eq!(percentile_of(50, &data), Some(FieldValue::DurationMs(1_200_000)));
        // ceil(0.9 * 5) = 5th
        assert_eq!(percentile_of(90, &data), Some(FieldValue::DurationMs(2_100_000)));
        assert_eq!(percentile_of(20, &data), Some(FieldValue::DurationMs(600_000)));
    }

    #[test]
    fn percentile_of_one_performance_is_that_performance() {
        let data = lengths(&[1_234_000]);
        for p in [0, 1, 50, 99, 100] {
            assert_eq!(percentile_of(p, &data), Some(FieldValue::DurationMs(1_234_000)));
        }
        let intent = song_intent(IntentKind::AverageDuration);
        let result = run(&intent, &plan(IntentKind::AverageDuration, Operation::Percentile { p: 75 }), &data).unwrap();
        assert_eq!(result.field("percentile"), Some(&FieldValue::Text("75th".into())));
        assert_eq!(result.field("performances"), Some(&FieldValue::Count(1)));
    }

    #[test]
    fn percentile_without_durations_has_no_match() {
        let data = primary(vec![play(day(1995, 12, 31), 1, "MSG", None)]);
        let intent = song_intent(IntentKind::AverageDuration);
        let err = run(&intent, &plan(IntentKind::AverageDuration, Operation::Percentile { p: 50 }), &data)
            .unwrap_err();
        assert_eq!(err, AggregationFailure::NoMatchingRecords);
    }

    #[test]
    fn venue_superlative_names_the_song_and_the_catalog_venue() {
        let ghost = Record {
            song: net("Ghost".to_string()),
            song_slug: net("ghost".to_string()),
            ..play(day(1997, 12, 29), 2, "MSG", Some(1_500_000))
        };
        let data = primary(vec![play(day(1995, 12, 31), 1, "MSG", Some(900_000)), ghost]);
        let intent = Intent {
            entities: Entities {
                venue: Some(VenueRef {
                    id: Some(157),
                    name: "Madison Square Garden".into(),
                }),
                ..Default::default()
            },
            ..song_intent(IntentKind::VenueSuperlative)
        };
        let plan = plan(
            IntentKind::VenueSuperlative,
            Operation::Superlative {
                direction: Direction::Max,
            },
        );
        let result = run(&intent, &plan, &data).unwrap();
        assert_eq!(result.field("song"), Some(&FieldValue::Text("Ghost".into())));
        assert_eq!(
            result.field("venue"),
            Some(&FieldValue::Text("Madison Square Garden".into()))
        );
    }

    #[test]
    fn last_play_in_a_slot_reports_the_slot() {
        let data = primary(vec![
            play(day(1994, 6, 22), 1, "Memphis", None),
            play(day(2003, 2, 28), 2, "Nassau", None),
        ]);
        let mut intent = song_intent(IntentKind::LastPlayed);
        intent.entities.position = Some(Position::Opener);
        let result = run(&intent, &plan(IntentKind::LastPlayed, Operation::MostRecent), &data).unwrap();
        assert_eq!(result.field("position"), Some(&FieldValue::Text("opener".into())));
        assert_eq!(result.field("date"), Some(&FieldValue::Date(day(2003, 2, 28))));
        assert_eq!(result.field("performances"), Some(&FieldValue::Count(2)));
    }

    fn catalog_song(name: &str, times_played: u32, gap: u32) -> Record {
        Record {
            song: net(name.to_string()),
            song_slug: net(slugify(name)),
            times_played: net(times_played),
            gap: net(gap),
            ..Default::default()
        }
    }

    #[test]
    fn ranking_orders_by_stat_then_name() {
        let data = primary(vec![
            catalog_song("Harry Hood", 450, 4),
            catalog_song("You Enjoy Myself", 600, 12),
            catalog_song("Fluffhead", 300, 30),
            catalog_song("Destiny Unbound", 1, 352),
            catalog_song("Ass Handed", 1, 9),
        ]);
        let intent = song_intent(IntentKind::SongRanking);
        let most = run(
            &intent,
            &plan(
                IntentKind::SongRanking,
                Operation::Rank {
                    metric: Metric::PlayCount,
                    direction: Direction::Max,
                    limit: 2,
                },
            ),
            &data,
        )
        .unwrap();
        assert_eq!(
            most.field("ranking"),
            Some(&FieldValue::List(vec![
                "You Enjoy Myself (600)".into(),
                "Harry Hood (450)".into()
            ]))
        );
        assert_eq!(most.field("label"), Some(&FieldValue::Text("Most played songs".into())));
        assert_eq!(most.field("count"), Some(&FieldValue::Count(5)));

        let rarest = run(
            &intent,
            &plan(
                IntentKind::SongRanking,
                Operation::Rank {
                    metric: Metric::PlayCount,
                    direction: Direction::Min,
                    limit: 5,
                },
            ),
            &data,
        )
        .unwrap();
        assert_eq!(rarest.field("top"), Some(&FieldValue::Text("Ass Handed".into())));

        let gaps = run(
            &intent,
            &plan(
                IntentKind::SongRanking,
                Operation::Rank {
                    metric: Metric::Gap,
                    direction: Direction::Max,
                    limit: 1,
                },
            ),
            &data,
        )
        .unwrap();
        assert_eq!(
            gaps.field("ranking"),
            Some(&FieldValue::List(vec!["Destiny Unbound (352 shows)".into()]))
        );
        assert_eq!(gaps.field("top_value"), Some(&FieldValue::Count(352)));
    }

    #[test]
    fn whole_setlist_groups_songs_by_set() {
        let slot = |song: &str, set: &str, position: u32| Record {
            date: net(day(1997, 11, 22)),
            venue: net("Hampton Coliseum".to_string()),
            song: net(song.to_string()),
            set: net(set.to_string()),
            position: net(position),
            ..Default::default()
        };
        let data = primary(vec![
            slot("Halley's Comet", "2", 3),
            slot("Emotional Rescue", "1", 1),
            slot("Tweezer Reprise", "e", 5),
            slot("Tweezer", "2", 4),
            slot("Ghost", "1", 2),
        ]);
        let mut intent = song_intent(IntentKind::ShowSetlist);
        intent.entities.song = None;
        intent.entities.show_date = Some(day(1997, 11, 22));

        let result = run(&intent, &plan(IntentKind::ShowSetlist, Operation::ValueAt), &data).unwrap();
        assert_eq!(
            result.field("sets"),
            Some(&FieldValue::Text(
                "Set 1: Emotional Rescue, Ghost; Set 2: Halley's Comet, Tweezer; Encore: Tweezer Reprise"
                    .into()
            ))
        );
        assert_eq!(result.field("count"), Some(&FieldValue::Count(5)));
        assert_eq!(result.field("position"), Some(&FieldValue::Text("setlist".into())));
        assert_eq!(result.field("venue"), Some(&FieldValue::Text("Hampton Coliseum".into())));
    }

    #[test]
    fn value_at_lists_slot_in_running_order() {
        let slot = |song: &str, position: u32| Record {
            date: net(day(1995, 12, 31)),
            venue: net("Madison Square Garden".to_string()),
            song: net(song.to_string()),
            set: net("e".to_string()),
            position: net(position),
            ..Default::default()
        };
        let data = primary(vec![slot("Tweezer Reprise", 24), slot("Johnny B. Goode", 23)]);
        let mut intent = song_intent(IntentKind::PositionalLookup);
        intent.entities.song = None;
        intent.entities.position = Some(Position::Encore);

        let result = run(&intent, &plan(IntentKind::PositionalLookup, Operation::ValueAt), &data).unwrap();
        assert_eq!(
            result.field("songs"),
            Some(&FieldValue::List(vec!["Johnny B. Goode".into(), "Tweezer Reprise".into()]))
        );
        assert_eq!(result.field("position"), Some(&FieldValue::Text("encore".into())));
    }
}
