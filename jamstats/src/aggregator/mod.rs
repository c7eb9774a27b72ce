//! Executes a [`DispatchPlan`]: concurrent source calls, cache intercept,
//! key joins, filtering and the plan's aggregation operator.

mod filter;
mod join;
mod ops;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;

use crate::cache::{call_key, CacheValue, QueryCache};
use crate::config::Config;
use crate::error::AggregationFailure;
use crate::models::{
    AggregationResult, CallLabel, DispatchPlan, Intent, IntentKind, Operation, Record, SourceCall,
    TtlClass, Warning,
};
use crate::sources::SourceRegistry;

use ops::CallData;

/// Labels whose rows are narrowed by the plan's filter. Reference lists
/// (all songs, all shows) and annotations are taken whole.
const FILTERED_LABELS: [CallLabel; 4] = [
    CallLabel::Primary,
    CallLabel::CompareLeft,
    CallLabel::CompareRight,
    CallLabel::Exclusion,
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregatorSettings {
    pub call_timeout: Duration,
    pub join_drop_threshold: f64,
}

impl From<&Config> for AggregatorSettings {
    fn from(config: &Config) -> Self {
        Self {
            call_timeout: Duration::from_secs(config.sources.call_timeout_secs),
            join_drop_threshold: config.pipeline.join_drop_threshold,
        }
    }
}

#[derive(Clone)]
pub struct ResultAggregator {
    registry: SourceRegistry,
    cache: QueryCache,
    settings: AggregatorSettings,
}

impl ResultAggregator {
    pub fn new(registry: SourceRegistry, cache: QueryCache, settings: AggregatorSettings) -> Self {
        Self {
            registry,
            cache,
            settings,
        }
    }

    /// Run `plan` for `intent`. Compound plans run their parts concurrently
    /// and fail as a whole if any part fails.
    pub async fn execute(
        &self,
        intent: &Intent,
        plan: &DispatchPlan,
    ) -> Result<AggregationResult, AggregationFailure> {
        if plan.kind != IntentKind::Compound {
            return self.execute_single(intent, plan).await;
        }

        let outcomes = join_all(
            intent
                .parts
                .iter()
                .zip(&plan.parts)
                .map(|(part, part_plan)| self.execute_single(part, part_plan)),
        )
        .await;

        let mut result = AggregationResult::new(IntentKind::Compound, Operation::Compound);
        for outcome in outcomes {
            let part = outcome?;
            result.sample_size += part.sample_size;
            result.parts.push(part);
        }
        Ok(result)
    }

    async fn execute_single(
        &self,
        intent: &Intent,
        plan: &DispatchPlan,
    ) -> Result<AggregationResult, AggregationFailure> {
        let started = Instant::now();
        let outcomes = join_all(
            plan.calls
                .iter()
                .map(|call| self.run_call(call, plan.ttl_class)),
        )
        .await;

        let mut raw: BTreeMap<CallLabel, Vec<Record>> = BTreeMap::new();
        let mut failed_required: Vec<(CallLabel, String)> = Vec::new();
        let mut missing_optional = Vec::new();
        for (call, outcome) in plan.calls.iter().zip(outcomes) {
            match outcome {
                Ok(records) => {
                    raw.insert(call.label, records.as_ref().clone());
                }
                Err(detail) if call.required => failed_required.push((call.label, detail)),
                Err(_) => missing_optional.push(call.label),
            }
        }

        if let Some((label, detail)) = failed_required.first() {
            let required = plan.calls.iter().filter(|c| c.required).count();
            return Err(if failed_required.len() == required {
                AggregationFailure::AllRequiredCallsFailed(
                    failed_required
                        .iter()
                        .map(|(label, detail)| format!("{label}: {detail}"))
                        .collect::<Vec<_>>()
                        .join("; "),
                )
            } else {
                AggregationFailure::RequiredCallFailed {
                    label: label.to_string(),
                    detail: detail.clone(),
                }
            });
        }

        let mut warnings = Vec::new();
        if let Some(spec) = &plan.join {
            let left = raw.remove(&spec.left).unwrap_or_default();
            let merged = match raw.get(&spec.right) {
                Some(right) => {
                    let joined = join::join(&left, right, spec.mode);
                    if joined.drop_fraction() > self.settings.join_drop_threshold {
                        tracing::warn!(
                            kind = %plan.kind,
                            dropped = joined.dropped,
                            total = joined.total,
                            "Low confidence join"
                        );
                        warnings.push(Warning::LowConfidenceJoin {
                            dropped: joined.dropped,
                            total: joined.total,
                        });
                    }
                    joined.records
                }
                // Optional right side unavailable; the left rows stand alone.
                None => left,
            };
            raw.insert(spec.left, merged);
        }

        let filtered = FILTERED_LABELS
            .iter()
            .filter_map(|label| {
                raw.get(label)
                    .map(|rows| (*label, filter::apply(rows, &plan.filter)))
            })
            .collect();
        let data = CallData { raw, filtered };

        let mut result = AggregationResult::new(plan.kind, plan.operation.clone());
        result.warnings = warnings;
        for label in &missing_optional {
            result
                .warnings
                .push(Warning::OptionalDataMissing { label: *label });
        }
        result.missing_optional = missing_optional;

        ops::apply(intent, plan, &data, &mut result)?;

        tracing::debug!(
            kind = %plan.kind,
            sample_size = result.sample_size,
            fields = result.fields.len(),
            warnings = result.warnings.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Aggregated"
        );
        Ok(result)
    }

    /// One call through the cache. Failures come back as a description;
    /// the caller decides whether they are fatal.
    async fn run_call(
        &self,
        call: &SourceCall,
        plan_class: TtlClass,
    ) -> Result<Arc<Vec<Record>>, String> {
        let key = call_key(call);
        if let Some(records) = self.cache.get_records(&key) {
            return Ok(records);
        }

        let ttl_class = match call.ttl_class() {
            TtlClass::Static => TtlClass::Static,
            _ => plan_class,
        };

        match tokio::time::timeout(self.settings.call_timeout, self.registry.fetch(call)).await {
            Ok(Ok(records)) => {
                let records = Arc::new(records);
                self.cache
                    .put(key, CacheValue::Records(records.clone()), ttl_class);
                Ok(records)
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    label = %call.label,
                    source = %call.source,
                    required = call.required,
                    error = %e,
                    "Source call failed"
                );
                Err(e.to_string())
            }
            Err(_) => {
                tracing::warn!(
                    label = %call.label,
                    source = %call.source,
                    required = call.required,
                    timeout_ms = self.settings.call_timeout.as_millis() as u64,
                    "Source call timed out"
                );
                Err(format!(
                    "timed out after {}ms",
                    self.settings.call_timeout.as_millis()
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::error::{JamError, Result};
    use crate::models::{
        Direction, Endpoint, Entities, FieldValue, JoinMode, JoinSpec, ParamKind, RecordFilter,
        SongRef, SourceId, Sourced,
    };
    use crate::sources::DataSource;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves fixed rows per endpoint after a delay, counting calls.
    struct FakeSource {
        id: SourceId,
        delay: Duration,
        rows: Vec<(Endpoint, Vec<Record>)>,
        failing: Vec<Endpoint>,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn new(id: SourceId) -> Self {
            Self {
                id,
                delay: Duration::ZERO,
                rows: Vec::new(),
                failing: Vec::new(),
                calls: AtomicUsize::new(0),
            }
        }

        fn serving(mut self, endpoint: Endpoint, rows: Vec<Record>) -> Self {
            self.rows.push((endpoint, rows));
            self
        }

        fn failing(mut self, endpoint: Endpoint) -> Self {
            self.failing.push(endpoint);
            self
        }

        fn delayed(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl DataSource for FakeSource {
        fn id(&self) -> SourceId {
            self.id
        }

        async fn fetch(&self, call: &SourceCall) -> Result<Vec<Record>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.failing.contains(&call.endpoint) {
                return Err(JamError::Source {
                    source_id: self.id,
                    message: "upstream 503".into(),
                });
            }
            Ok(self
                .rows
                .iter()
                .find(|(endpoint, _)| *endpoint == call.endpoint)
                .map(|(_, rows)| rows.clone())
                .unwrap_or_default())
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn track(date: NaiveDate, ms: u64) -> Record {
        Record {
            date: Some(Sourced::new(SourceId::PhishIn, date)),
            song: Some(Sourced::new(SourceId::PhishIn, "Tweezer".into())),
            song_slug: Some(Sourced::new(SourceId::PhishIn, "tweezer".into())),
            duration_ms: Some(Sourced::new(SourceId::PhishIn, ms)),
            ..Default::default()
        }
    }

    fn setlist(date: NaiveDate, venue_id: u64) -> Record {
        Record {
            date: Some(Sourced::new(SourceId::PhishNet, date)),
            song_slug: Some(Sourced::new(SourceId::PhishNet, "tweezer".into())),
            venue_id: Some(Sourced::new(SourceId::PhishNet, venue_id)),
            venue: Some(Sourced::new(SourceId::PhishNet, format!("Venue {venue_id}"))),
            ..Default::default()
        }
    }

    fn cache() -> QueryCache {
        QueryCache::new(&CacheConfig {
            static_capacity: 16,
            historical_capacity: 16,
            recency_capacity: 16,
            static_ttl_secs: 60,
            historical_ttl_secs: 60,
            recency_ttl_secs: 60,
        })
    }

    fn settings(timeout: Duration) -> AggregatorSettings {
        AggregatorSettings {
            call_timeout: timeout,
            join_drop_threshold: 0.5,
        }
    }

    fn tweezer_intent() -> Intent {
        Intent {
            kind: IntentKind::SuperlativePerformance,
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

    /// Tracks joined with setlists, optionally narrowed to a venue id.
    fn located_plan(venue_id: Option<u64>, annotation: bool) -> DispatchPlan {
        let mut calls = vec![
            SourceCall::new(CallLabel::Primary, Endpoint::SongTracks)
                .param(ParamKind::SongSlug, "tweezer"),
            SourceCall::new(CallLabel::Secondary, Endpoint::SongSetlists)
                .param(ParamKind::SongSlug, "tweezer"),
        ];
        if annotation {
            calls.push(
                SourceCall::new(CallLabel::Annotation, Endpoint::JamCharts)
                    .param(ParamKind::SongSlug, "tweezer")
                    .optional(),
            );
        }
        DispatchPlan {
            kind: IntentKind::SuperlativePerformance,
            calls,
            join: Some(JoinSpec {
                left: CallLabel::Primary,
                right: CallLabel::Secondary,
                mode: JoinMode::Inner,
            }),
            filter: RecordFilter {
                venue_id,
                scope: "in total".into(),
                ..Default::default()
            },
            operation: Operation::Superlative {
                direction: Direction::Max,
            },
            parts: vec![],
            ttl_class: TtlClass::Historical,
        }
    }

    fn sources(phishin: FakeSource, phishnet: FakeSource) -> (Arc<FakeSource>, Arc<FakeSource>, SourceRegistry) {
        let phishin = Arc::new(phishin);
        let phishnet = Arc::new(phishnet);
        let registry = SourceRegistry::new()
            .with(phishin.clone())
            .with(phishnet.clone());
        (phishin, phishnet, registry)
    }

    #[tokio::test]
    async fn joins_across_sources_and_filters_by_venue() {
        let (_, _, registry) = sources(
            FakeSource::new(SourceId::PhishIn).serving(
                Endpoint::SongTracks,
                vec![track(day(1995, 12, 31), 900_000), track(day(1997, 12, 6), 1_965_000)],
            ),
            FakeSource::new(SourceId::PhishNet).serving(
                Endpoint::SongSetlists,
                vec![setlist(day(1995, 12, 31), 157), setlist(day(1997, 12, 6), 30)],
            ),
        );
        let aggregator = ResultAggregator::new(registry, cache(), settings(Duration::from_secs(5)));

        let result = aggregator
            .execute(&tweezer_intent(), &located_plan(Some(157), false))
            .await
            .unwrap();
        assert_eq!(result.field("duration"), Some(&FieldValue::DurationMs(900_000)));
        assert_eq!(result.field("venue"), Some(&FieldValue::Text("Venue 157".into())));
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn independent_calls_run_concurrently() {
        let delay = Duration::from_millis(200);
        let (_, _, registry) = sources(
            FakeSource::new(SourceId::PhishIn)
                .delayed(delay)
                .serving(Endpoint::SongTracks, vec![track(day(1997, 12, 6), 1_965_000)]),
            FakeSource::new(SourceId::PhishNet)
                .delayed(delay)
                .serving(Endpoint::SongSetlists, vec![setlist(day(1997, 12, 6), 30)]),
        );
        let aggregator = ResultAggregator::new(registry, cache(), settings(Duration::from_secs(5)));

        let started = Instant::now();
        aggregator
            .execute(&tweezer_intent(), &located_plan(None, false))
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_millis(380));
    }

    #[tokio::test]
    async fn cached_calls_skip_the_source() {
        let (phishin, phishnet, registry) = sources(
            FakeSource::new(SourceId::PhishIn)
                .serving(Endpoint::SongTracks, vec![track(day(1997, 12, 6), 1_965_000)]),
            FakeSource::new(SourceId::PhishNet)
                .serving(Endpoint::SongSetlists, vec![setlist(day(1997, 12, 6), 30)]),
        );
        let aggregator = ResultAggregator::new(registry, cache(), settings(Duration::from_secs(5)));
        let plan = located_plan(None, false);

        let first = aggregator.execute(&tweezer_intent(), &plan).await.unwrap();
        let second = aggregator.execute(&tweezer_intent(), &plan).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(phishin.calls.load(Ordering::SeqCst), 1);
        assert_eq!(phishnet.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn optional_failure_is_annotated_not_fatal() {
        let (_, _, registry) = sources(
            FakeSource::new(SourceId::PhishIn)
                .serving(Endpoint::SongTracks, vec![track(day(1997, 12, 6), 1_965_000)]),
            FakeSource::new(SourceId::PhishNet)
                .serving(Endpoint::SongSetlists, vec![setlist(day(1997, 12, 6), 30)])
                .failing(Endpoint::JamCharts),
        );
        let aggregator = ResultAggregator::new(registry, cache(), settings(Duration::from_secs(5)));

        let result = aggregator
            .execute(&tweezer_intent(), &located_plan(None, true))
            .await
            .unwrap();
        assert_eq!(result.missing_optional, vec![CallLabel::Annotation]);
        assert_eq!(
            result.warnings,
            vec![Warning::OptionalDataMissing {
                label: CallLabel::Annotation
            }]
        );
    }

    #[tokio::test]
    async fn required_failures_fail_the_query() {
        let (_, _, registry) = sources(
            FakeSource::new(SourceId::PhishIn)
                .serving(Endpoint::SongTracks, vec![track(day(1997, 12, 6), 1_965_000)]),
            FakeSource::new(SourceId::PhishNet).failing(Endpoint::SongSetlists),
        );
        let aggregator = ResultAggregator::new(registry, cache(), settings(Duration::from_secs(5)));
        let err = aggregator
            .execute(&tweezer_intent(), &located_plan(None, false))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "required_call_failed");

        let (_, _, registry) = sources(
            FakeSource::new(SourceId::PhishIn).failing(Endpoint::SongTracks),
            FakeSource::new(SourceId::PhishNet).failing(Endpoint::SongSetlists),
        );
        let aggregator = ResultAggregator::new(registry, cache(), settings(Duration::from_secs(5)));
        let err = aggregator
            .execute(&tweezer_intent(), &located_plan(None, false))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "all_required_calls_failed");
    }

    #[tokio::test]
    async fn slow_required_call_times_out() {
        let (_, _, registry) = sources(
            FakeSource::new(SourceId::PhishIn)
                .delayed(Duration::from_millis(500))
                .serving(Endpoint::SongTracks, vec![track(day(1997, 12, 6), 1_965_000)]),
            FakeSource::new(SourceId::PhishNet)
                .serving(Endpoint::SongSetlists, vec![setlist(day(1997, 12, 6), 30)]),
        );
        let aggregator =
            ResultAggregator::new(registry, cache(), settings(Duration::from_millis(50)));
        let err = aggregator
            .execute(&tweezer_intent(), &located_plan(None, false))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AggregationFailure::RequiredCallFailed {
                label: "primary".into(),
                detail: "timed out after 50ms".into()
            }
        );
    }

    #[tokio::test]
    async fn mostly_unmatched_join_carries_a_warning() {
        let (_, _, registry) = sources(
            FakeSource::new(SourceId::PhishIn).serving(
                Endpoint::SongTracks,
                vec![
                    track(day(1997, 12, 6), 1_965_000),
                    track(day(1998, 1, 1), 600_000),
                    track(day(1998, 1, 2), 600_000),
                ],
            ),
            FakeSource::new(SourceId::PhishNet).serving(
                Endpoint::SongSetlists,
                vec![
                    setlist(day(1997, 12, 6), 30),
                    setlist(day(1990, 1, 1), 1),
                    setlist(day(1990, 1, 2), 1),
                ],
            ),
        );
        let aggregator = ResultAggregator::new(registry, cache(), settings(Duration::from_secs(5)));

        let result = aggregator
            .execute(&tweezer_intent(), &located_plan(None, false))
            .await
            .unwrap();
        assert!(result.has_low_confidence_join());
        assert_eq!(result.sample_size, 1);
    }
}
