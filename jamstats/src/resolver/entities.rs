//! Ground raw entity strings against the catalog.

use chrono::NaiveDate;

use crate::catalog::{Match, SourceCatalog};
use crate::error::ResolutionFailure;
use crate::models::{DateRange, Direction, Entities, EntityRole, Metric, Position, SongRef, VenueRef};

use super::raw::{loose_number, RawEntities};

const MAX_LIST_LIMIT: usize = 25;
const FIRST_SHOW_YEAR: i32 = 1983;

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn unresolvable(role: EntityRole, value: &str, detail: impl Into<String>) -> ResolutionFailure {
    ResolutionFailure::UnresolvableEntity {
        role,
        value: value.to_string(),
        detail: detail.into(),
    }
}

pub(super) fn resolve_entities(
    raw: &RawEntities,
    catalog: &SourceCatalog,
    floor: f64,
) -> Result<Entities, ResolutionFailure> {
    let mut entities = Entities::default();

    if let Some(song) = present(&raw.song) {
        entities.song = Some(resolve_song(EntityRole::Song, song, catalog, floor)?);
    }
    if let Some(song) = present(&raw.second_song) {
        entities.second_song = Some(resolve_song(EntityRole::SecondSong, song, catalog, floor)?);
    }
    if let Some(venue) = present(&raw.venue) {
        entities.venue = Some(resolve_venue(venue, catalog, floor)?);
    }

    entities.date_range = resolve_date_range(raw)?;

    if let Some(date) = present(&raw.show_date) {
        entities.show_date = Some(parse_date(EntityRole::ShowDate, date)?);
    }
    if let Some(country) = present(&raw.country) {
        entities.country = Some(normalize_country(country));
    }
    if let Some(position) = present(&raw.position) {
        entities.position = Some(
            position
                .parse::<Position>()
                .map_err(|e| unresolvable(EntityRole::Position, position, e))?,
        );
    }
    if let Some(threshold) = &raw.threshold_minutes {
        let minutes = loose_number(threshold)
            .filter(|m| m.is_finite() && *m > 0.0)
            .ok_or_else(|| {
                unresolvable(
                    EntityRole::Threshold,
                    &threshold.to_string(),
                    "expected a positive number of minutes",
                )
            })?;
        // Minutes at the boundary, milliseconds everywhere else.
        entities.threshold_ms = Some((minutes * 60_000.0).round() as u64);
    }
    if let Some(metric) = present(&raw.metric) {
        entities.metric = Some(
            metric
                .parse::<Metric>()
                .map_err(|e| unresolvable(EntityRole::Metric, metric, e))?,
        );
    }
    if let Some(direction) = present(&raw.direction) {
        entities.direction = Some(
            direction
                .parse::<Direction>()
                .map_err(|e| unresolvable(EntityRole::Direction, direction, e))?,
        );
    }
    if let Some(limit) = &raw.limit {
        let n = loose_number(limit)
            .filter(|n| n.is_finite() && *n >= 1.0)
            .ok_or_else(|| {
                unresolvable(EntityRole::Limit, &limit.to_string(), "expected a positive count")
            })?;
        entities.limit = Some((n as usize).min(MAX_LIST_LIMIT));
    }
    if let Some(percentile) = &raw.percentile {
        let p = loose_number(percentile)
            .filter(|p| p.is_finite() && (0.0..=100.0).contains(p))
            .ok_or_else(|| {
                unresolvable(
                    EntityRole::Percentile,
                    &percentile.to_string(),
                    "expected a percentile from 0 to 100",
                )
            })?;
        entities.percentile = Some(p.round() as u8);
    }

    Ok(entities)
}

fn resolve_song(
    role: EntityRole,
    name: &str,
    catalog: &SourceCatalog,
    floor: f64,
) -> Result<SongRef, ResolutionFailure> {
    match catalog.find_song(name, floor) {
        Match::Exact(entry) => Ok(entry.to_ref()),
        Match::Fuzzy { entry, similarity } => {
            tracing::debug!(query = name, matched = %entry.name, similarity, "Fuzzy matched song");
            Ok(entry.to_ref())
        }
        Match::Ambiguous(entries) => Err(unresolvable(
            role,
            name,
            format!(
                "matches several songs: {}",
                entries.iter().map(|e| e.name.as_str()).collect::<Vec<_>>().join(", ")
            ),
        )),
        Match::None => Err(unresolvable(role, name, "not in the song catalog")),
    }
}

fn resolve_venue(
    name: &str,
    catalog: &SourceCatalog,
    floor: f64,
) -> Result<VenueRef, ResolutionFailure> {
    match catalog.find_venue(name, floor) {
        Match::Exact(entry) => Ok(entry.to_ref()),
        Match::Fuzzy { entry, similarity } => {
            tracing::debug!(query = name, matched = %entry.name, similarity, "Fuzzy matched venue");
            Ok(entry.to_ref())
        }
        Match::Ambiguous(entries) => Err(unresolvable(
            EntityRole::Venue,
            name,
            format!(
                "matches several venues: {}",
                entries.iter().map(|e| e.name.as_str()).collect::<Vec<_>>().join(", ")
            ),
        )),
        Match::None => Err(unresolvable(EntityRole::Venue, name, "not in the venue catalog")),
    }
}

fn parse_date(role: EntityRole, value: &str) -> Result<NaiveDate, ResolutionFailure> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| unresolvable(role, value, "expected a YYYY-MM-DD date"))
}

fn resolve_date_range(raw: &RawEntities) -> Result<Option<DateRange>, ResolutionFailure> {
    let mut range = match &raw.year {
        Some(year) => {
            let value = loose_number(year)
                .filter(|y| y.fract() == 0.0)
                .map(|y| y as i32)
                .filter(|y| (FIRST_SHOW_YEAR..=2100).contains(y))
                .ok_or_else(|| {
                    unresolvable(EntityRole::DateRange, &year.to_string(), "not a plausible year")
                })?;
            DateRange::year(value)
        }
        None => None,
    };

    let start = present(&raw.start_date)
        .map(|d| parse_date(EntityRole::DateRange, d))
        .transpose()?;
    let end = present(&raw.end_date)
        .map(|d| parse_date(EntityRole::DateRange, d))
        .transpose()?;

    if start.is_some() || end.is_some() {
        let base = range.unwrap_or(DateRange {
            start: None,
            end: None,
        });
        range = Some(DateRange {
            start: start.or(base.start),
            end: end.or(base.end),
        });
    }

    if let Some(DateRange {
        start: Some(start),
        end: Some(end),
    }) = range
    {
        if start > end {
            return Err(unresolvable(
                EntityRole::DateRange,
                &format!("{start} to {end}"),
                "range starts after it ends",
            ));
        }
    }

    Ok(range)
}

fn normalize_country(country: &str) -> String {
    match country.trim().to_lowercase().replace('.', "").as_str() {
        "us" | "usa" | "united states" | "united states of america" | "america" => {
            "USA".to_string()
        }
        "uk" | "united kingdom" | "england" | "great britain" => "England".to_string(),
        _ => country.trim().to_string(),
    }
}
