//! Turns a question into a validated [`Intent`].
//!
//! The understanding service proposes structure; everything it returns is
//! re-checked here against the catalog and the intent schema before the
//! planner sees it.

mod entities;
mod raw;
mod understanding;

pub use understanding::{UnderstandingRequest, UnderstandingService};

use std::sync::Arc;
use std::time::Duration;

use crate::catalog::SourceCatalog;
use crate::config::PipelineConfig;
use crate::error::{JamError, ResolutionFailure};
use crate::llm::prompts;
use crate::models::{
    validate_template, ContextSummary, Entities, EntityRole, Intent, IntentKind, Query,
};

use raw::RawIntent;

/// One normal attempt plus one strict retry.
const MAX_ATTEMPTS: usize = 2;
const MAX_COMPOUND_PARTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverSettings {
    pub timeout: Duration,
    pub confidence_threshold: f32,
    pub similarity_floor: f64,
}

impl From<&PipelineConfig> for ResolverSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.resolver_timeout_secs),
            confidence_threshold: config.confidence_threshold,
            similarity_floor: config.similarity_floor,
        }
    }
}

/// Why a reply was rejected: retryable shape problems versus final verdicts.
enum Rejection {
    Malformed(String),
    Final(ResolutionFailure),
}

impl From<ResolutionFailure> for Rejection {
    fn from(failure: ResolutionFailure) -> Self {
        Rejection::Final(failure)
    }
}

pub struct IntentResolver {
    service: Arc<dyn UnderstandingService>,
    catalog: Arc<SourceCatalog>,
    settings: ResolverSettings,
}

impl IntentResolver {
    pub fn new(
        service: Arc<dyn UnderstandingService>,
        catalog: Arc<SourceCatalog>,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            service,
            catalog,
            settings,
        }
    }

    pub fn catalog(&self) -> &SourceCatalog {
        &self.catalog
    }

    pub fn is_available(&self) -> bool {
        self.service.is_available()
    }

    pub async fn resolve(
        &self,
        query: &Query,
        context: &ContextSummary,
    ) -> Result<Intent, ResolutionFailure> {
        if !self.service.is_available() {
            return Err(ResolutionFailure::ServiceUnavailable(
                "understanding service is not configured".to_string(),
            ));
        }

        let summary = render_context(context);
        let capabilities = self.catalog.capabilities();
        let mut problem = String::from("no reply");

        for attempt in 0..MAX_ATTEMPTS {
            let request = UnderstandingRequest {
                query: query.text.clone(),
                recent_context_summary: summary.clone(),
                catalog_capabilities: capabilities.clone(),
                strict: attempt > 0,
            };

            let reply =
                match tokio::time::timeout(self.settings.timeout, self.service.understand(&request))
                    .await
                {
                    Err(_) => {
                        tracing::warn!(
                            session_id = %query.session_id,
                            timeout_secs = self.settings.timeout.as_secs_f32(),
                            "Understanding service timed out"
                        );
                        return Err(ResolutionFailure::Timeout);
                    }
                    Ok(Err(JamError::LlmMalformed(detail))) => {
                        tracing::warn!(attempt, %detail, "Understanding service reply was not JSON");
                        problem = detail;
                        continue;
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(error = %e, "Understanding service call failed");
                        return Err(ResolutionFailure::ServiceUnavailable(e.to_string()));
                    }
                    Ok(Ok(reply)) => reply,
                };

            let outcome = raw::decode(reply)
                .map_err(Rejection::Malformed)
                .and_then(|raw| self.interpret(raw, context));

            match outcome {
                Ok(intent) => {
                    tracing::debug!(
                        kind = %intent.kind,
                        confidence = intent.confidence,
                        inherited = ?intent.inherited,
                        attempt,
                        "Resolved intent"
                    );
                    return Ok(intent);
                }
                Err(Rejection::Malformed(detail)) => {
                    tracing::warn!(attempt, %detail, "Rejected malformed intent");
                    problem = detail;
                }
                Err(Rejection::Final(failure)) => return Err(failure),
            }
        }

        Err(ResolutionFailure::MalformedOutput(problem))
    }

    fn interpret(&self, raw: RawIntent, context: &ContextSummary) -> Result<Intent, Rejection> {
        let confidence = raw.confidence.unwrap_or(0.0) as f32;
        let intent = self.interpret_one(&raw, confidence, context)?;
        if intent.kind != IntentKind::Compound {
            return Ok(intent);
        }

        if raw.parts.is_empty() || raw.parts.len() > MAX_COMPOUND_PARTS {
            return Err(Rejection::Malformed(format!(
                "compound intent needs 1 to {MAX_COMPOUND_PARTS} parts, got {}",
                raw.parts.len()
            )));
        }
        let mut parts = Vec::with_capacity(raw.parts.len());
        for part in &raw.parts {
            let part_confidence = part.confidence.map_or(confidence, |c| c as f32);
            let resolved = self.interpret_one(part, part_confidence, context)?;
            if resolved.kind == IntentKind::Compound {
                return Err(Rejection::Malformed(
                    "compound intents cannot be nested".to_string(),
                ));
            }
            parts.push(resolved);
        }

        Ok(Intent {
            parts,
            response_template: String::new(),
            ..intent
        })
    }

    fn interpret_one(
        &self,
        raw: &RawIntent,
        confidence: f32,
        context: &ContextSummary,
    ) -> Result<Intent, Rejection> {
        let kind_text = raw.kind.as_deref().unwrap_or_default();
        let kind: IntentKind = kind_text
            .parse()
            .map_err(|_| ResolutionFailure::UnknownIntent(kind_text.trim().to_string()))?;

        if confidence < self.settings.confidence_threshold {
            return Err(ResolutionFailure::LowConfidence {
                confidence,
                threshold: self.settings.confidence_threshold,
            }
            .into());
        }

        let mut entities = entities::resolve_entities(
            &raw.entities,
            &self.catalog,
            self.settings.similarity_floor,
        )?;
        let inherited = inherit_from_context(kind, &mut entities, &raw.inherit, context);

        let mut intent = Intent {
            kind,
            entities,
            confidence,
            response_template: String::new(),
            parts: Vec::new(),
            inherited,
        };
        if kind == IntentKind::Compound {
            return Ok(intent);
        }

        intent.response_template = match raw.response_template.as_deref().map(str::trim) {
            Some(template) if !template.is_empty() => {
                validate_template(template, intent.producible_fields())
                    .map_err(Rejection::Malformed)?;
                template.to_string()
            }
            _ => intent.default_template().to_string(),
        };
        Ok(intent)
    }
}

/// Fill unstated roles from the newest earlier turn that carries them: roles
/// the reply asked to inherit, plus anchor roles the kind needs.
fn inherit_from_context(
    kind: IntentKind,
    entities: &mut Entities,
    requested: &[String],
    context: &ContextSummary,
) -> Vec<EntityRole> {
    let mut roles: Vec<EntityRole> = requested
        .iter()
        .filter_map(|name| match name.parse::<EntityRole>() {
            Ok(role) => Some(role),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring unknown inherited role");
                None
            }
        })
        .collect();
    roles.extend(kind.anchor_roles().iter().copied());

    let mut inherited = Vec::new();
    for role in roles {
        if entities.has(role) || inherited.contains(&role) {
            continue;
        }
        if let Some(previous) = context.latest_with(role) {
            if entities.inherit(role, previous) {
                inherited.push(role);
            }
        }
    }
    inherited
}

fn render_context(context: &ContextSummary) -> String {
    context
        .turns
        .iter()
        .enumerate()
        .map(|(i, turn)| {
            let values = describe_entities(&turn.entities);
            let pairs: Vec<(&str, &str)> = values.iter().map(|(r, v)| (*r, v.as_str())).collect();
            prompts::context_summary_line(i + 1, &turn.question, turn.kind.as_str(), &pairs)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe_entities(entities: &Entities) -> Vec<(&'static str, String)> {
    let mut out = Vec::new();
    if let Some(song) = &entities.song {
        out.push(("song", song.name.clone()));
    }
    if let Some(song) = &entities.second_song {
        out.push(("second_song", song.name.clone()));
    }
    if let Some(venue) = &entities.venue {
        out.push(("venue", venue.name.clone()));
    }
    if let Some(range) = &entities.date_range {
        let side = |d: Option<chrono::NaiveDate>| d.map_or_else(|| "open".to_string(), |d| d.to_string());
        out.push(("date_range", format!("{} to {}", side(range.start), side(range.end))));
    }
    if let Some(date) = entities.show_date {
        out.push(("show_date", date.to_string()));
    }
    if let Some(country) = &entities.country {
        out.push(("country", country.clone()));
    }
    if let Some(position) = entities.position {
        out.push(("position", position.label().to_string()));
    }
    if let Some(ms) = entities.threshold_ms {
        out.push(("threshold_minutes", format!("{}", ms / 60_000)));
    }
    if let Some(p) = entities.percentile {
        out.push(("percentile", p.to_string()));
    }
    out
}
