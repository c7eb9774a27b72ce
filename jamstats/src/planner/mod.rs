//! Deterministic mapping from a validated intent to data-source calls.

mod rules;

use crate::catalog::slugify;
use crate::error::PlanningFailure;
use crate::format;
use crate::models::{
    DispatchPlan, Entities, EntityRole, Intent, IntentKind, JoinSpec, Metric, Operation, ParamKind,
    RecordFilter, SongRef, SourceCall, TtlClass,
};

use rules::{CallTemplate, PlanRule, RULES};

/// Jam highlights and ranked songs returned when the question names no count.
pub const DEFAULT_LIST_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchPlanner;

impl DispatchPlanner {
    pub fn new() -> Self {
        Self
    }

    pub fn plan(&self, intent: &Intent) -> Result<DispatchPlan, PlanningFailure> {
        let plan = if intent.kind == IntentKind::Compound {
            let parts = intent
                .parts
                .iter()
                .map(|part| self.plan(part))
                .collect::<Result<Vec<_>, _>>()?;
            let ttl_class = if parts.iter().any(|p| p.ttl_class == TtlClass::Recency) {
                TtlClass::Recency
            } else {
                TtlClass::Historical
            };
            DispatchPlan {
                kind: IntentKind::Compound,
                calls: Vec::new(),
                join: None,
                filter: RecordFilter::default(),
                operation: Operation::Compound,
                parts,
                ttl_class,
            }
        } else {
            plan_single(intent)?
        };

        tracing::debug!(
            kind = %plan.kind,
            calls = plan.calls.len(),
            parts = plan.parts.len(),
            join = ?plan.join.as_ref().map(|j| j.mode),
            ttl = %plan.ttl_class,
            "Planned dispatch"
        );
        Ok(plan)
    }
}

fn plan_single(intent: &Intent) -> Result<DispatchPlan, PlanningFailure> {
    let entities = &intent.entities;
    if let Some(uncovered) = uncovered(intent.kind, entities) {
        return Err(PlanningFailure::NoSourceCoversIntent(uncovered.to_string()));
    }

    let candidates: Vec<&PlanRule> = RULES.iter().filter(|r| r.kind == intent.kind).collect();
    let rule = candidates
        .iter()
        .find(|r| r.requires.iter().all(|role| entities.has(*role)) && (r.applies)(entities))
        .ok_or_else(|| missing_entity(&candidates, entities, intent.kind))?;

    let calls = rule
        .calls
        .iter()
        .map(|template| build_call(template, entities))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DispatchPlan {
        kind: intent.kind,
        filter: build_filter(entities, &calls),
        calls,
        join: rule.join.map(|(left, right, mode)| JoinSpec { left, right, mode }),
        operation: (rule.operation)(entities),
        parts: Vec::new(),
        ttl_class: ttl_class(intent.kind, entities),
    })
}

/// Entity combinations no source can answer, whatever the rules say.
fn uncovered(kind: IntentKind, entities: &Entities) -> Option<&'static str> {
    match (kind, entities.metric) {
        (IntentKind::SuperlativePerformance, Some(Metric::PlayCount | Metric::Gap)) => {
            Some("superlatives by play count or gap")
        }
        (IntentKind::Comparison, Some(Metric::Gap)) => Some("comparisons by gap"),
        (IntentKind::SongRanking, Some(Metric::Duration)) => Some("song rankings by length"),
        // Play counts and gaps are career totals; they cannot be narrowed.
        (IntentKind::SongRanking, _)
            if entities.date_range.is_some()
                || entities.venue.is_some()
                || entities.country.is_some() =>
        {
            Some("song rankings within a date range or place")
        }
        _ => None,
    }
}

/// The role to ask for: the first gap in the rule that is closest to matching.
fn missing_entity(
    candidates: &[&PlanRule],
    entities: &Entities,
    kind: IntentKind,
) -> PlanningFailure {
    candidates
        .iter()
        .filter_map(|rule| {
            let missing: Vec<EntityRole> = rule
                .requires
                .iter()
                .copied()
                .filter(|role| !entities.has(*role))
                .collect();
            (!missing.is_empty()).then_some(missing)
        })
        .min_by_key(Vec::len)
        .and_then(|missing| missing.first().copied())
        .map(PlanningFailure::MissingEntity)
        .unwrap_or_else(|| PlanningFailure::NoSourceCoversIntent(kind.to_string()))
}

fn song_for(role: EntityRole, entities: &Entities) -> Option<&SongRef> {
    match role {
        EntityRole::SecondSong => entities.second_song.as_ref(),
        _ => entities.song.as_ref(),
    }
}

fn build_call(template: &CallTemplate, entities: &Entities) -> Result<SourceCall, PlanningFailure> {
    let mut call = SourceCall::new(template.label, template.endpoint);
    if !template.required {
        call = call.optional();
    }

    for param in template.endpoint.required_params() {
        let value = match param {
            ParamKind::SongSlug => song_for(template.song_role, entities)
                .map(|song| song.slug.clone())
                .ok_or(PlanningFailure::MissingEntity(template.song_role))?,
            ParamKind::VenueId => {
                let venue = entities
                    .venue
                    .as_ref()
                    .ok_or(PlanningFailure::MissingEntity(EntityRole::Venue))?;
                venue.id.map(|id| id.to_string()).ok_or_else(|| {
                    PlanningFailure::NoSourceCoversIntent(format!(
                        "setlists at {} (venue id unknown)",
                        venue.name
                    ))
                })?
            }
            ParamKind::VenueSlug => entities
                .venue
                .as_ref()
                .map(|venue| slugify(&venue.name))
                .ok_or(PlanningFailure::MissingEntity(EntityRole::Venue))?,
            ParamKind::ShowDate => entities
                .show_date
                .map(|date| date.to_string())
                .ok_or(PlanningFailure::MissingEntity(EntityRole::ShowDate))?,
        };
        call = call.param(*param, value);
    }
    Ok(call)
}

fn build_filter(entities: &Entities, calls: &[SourceCall]) -> RecordFilter {
    // A venue that is already a call parameter must not also narrow the other calls.
    let venue_in_params = calls
        .iter()
        .any(|c| c.get(ParamKind::VenueId).is_some() || c.get(ParamKind::VenueSlug).is_some());
    let venue = entities.venue.as_ref().filter(|_| !venue_in_params);

    RecordFilter {
        venue_id: venue.and_then(|v| v.id),
        venue_name: venue.map(|v| v.name.clone()),
        date_range: entities.date_range,
        show_date: entities.show_date,
        country: entities.country.clone(),
        position: entities.position,
        threshold_ms: entities.threshold_ms,
        scope: describe_scope(entities),
    }
}

fn describe_scope(entities: &Entities) -> String {
    let mut parts = Vec::new();
    if let Some(venue) = &entities.venue {
        parts.push(format!("at {}", venue.name));
    }
    if let Some(country) = &entities.country {
        parts.push(format!("in {country}"));
    }
    if let Some(range) = &entities.date_range {
        parts.push(format::date_range(range));
    }
    if let Some(date) = entities.show_date {
        parts.push(format!("on {}", format::date(date)));
    }
    if parts.is_empty() {
        "in total".to_string()
    } else {
        parts.join(" ")
    }
}

fn ttl_class(kind: IntentKind, entities: &Entities) -> TtlClass {
    let open_ended = entities.date_range.map_or(true, |r| r.is_open_ended());
    if kind.is_recency_sensitive() || (kind == IntentKind::ShowCount && open_ended) {
        TtlClass::Recency
    } else {
        TtlClass::Historical
    }
}
