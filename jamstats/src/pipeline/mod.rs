//! Question in, answer out: context → resolve → plan → aggregate → synthesize.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::aggregator::ResultAggregator;
use crate::cache::{answer_key, raw_query_key, CacheValue, CachedAnswer, QueryCache};
use crate::context::ConversationStore;
use crate::error::QueryFailure;
use crate::models::{Answer, ConversationTurn, Query, TtlClass};
use crate::planner::DispatchPlanner;
use crate::resolver::IntentResolver;
use crate::synth::AnswerSynthesizer;

pub struct QueryPipeline {
    resolver: IntentResolver,
    planner: DispatchPlanner,
    aggregator: ResultAggregator,
    synthesizer: AnswerSynthesizer,
    cache: QueryCache,
    context: ConversationStore,
    context_turns: usize,
}

impl QueryPipeline {
    pub fn new(
        resolver: IntentResolver,
        aggregator: ResultAggregator,
        cache: QueryCache,
        context: ConversationStore,
        context_turns: usize,
    ) -> Self {
        Self {
            resolver,
            planner: DispatchPlanner::new(),
            aggregator,
            synthesizer: AnswerSynthesizer::new(),
            cache,
            context,
            context_turns,
        }
    }

    pub fn resolver(&self) -> &IntentResolver {
        &self.resolver
    }

    pub fn context(&self) -> &ConversationStore {
        &self.context
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Answer one question. Every failure is terminal for the query.
    pub async fn answer(&self, query: &Query) -> Result<Answer, QueryFailure> {
        let started = Instant::now();
        match self.run(query, started).await {
            Ok(answer) => Ok(answer),
            Err(QueryFailure::Cancelled) => {
                tracing::info!(session_id = %query.session_id, "Session ended mid-query; answer dropped");
                Err(QueryFailure::Cancelled)
            }
            Err(failure) => {
                tracing::error!(
                    session_id = %query.session_id,
                    stage = failure.stage(),
                    code = failure.code(),
                    error = %failure,
                    latency_ms = started.elapsed().as_millis() as u64,
                    "Query failed"
                );
                Err(failure)
            }
        }
    }

    async fn run(&self, query: &Query, started: Instant) -> Result<Answer, QueryFailure> {
        let session = query.session_id.as_str();
        let cancel = self.context.session_token(session);

        let raw_key = raw_query_key(session, &query.normalized_text());
        if let Some(cached) = self.cache.get_answer(&raw_key) {
            self.remember(query, &cached);
            tracing::info!(
                session_id = session,
                kind = %cached.intent.kind,
                latency_ms = started.elapsed().as_millis() as u64,
                cache = "raw",
                "Answered query"
            );
            return Ok(cached.answer.clone());
        }

        let summary = self.context.summary(session, self.context_turns);
        let intent = self.resolver.resolve(query, &summary).await?;
        if cancel.is_cancelled() {
            return Err(QueryFailure::Cancelled);
        }

        let plan = self.planner.plan(&intent)?;
        let key = answer_key(&intent, &plan);

        let cached = match self.cache.get_answer(&key) {
            Some(hit) => {
                tracing::debug!(session_id = session, kind = %intent.kind, "Answer cache hit");
                hit
            }
            None => {
                // Source calls run to completion and fill the cache even if
                // the session ends meanwhile.
                let result = self.aggregator.execute(&intent, &plan).await?;
                if cancel.is_cancelled() {
                    return Err(QueryFailure::Cancelled);
                }
                let answer = self.synthesizer.synthesize(&intent, &result)?;
                let entry = Arc::new(CachedAnswer {
                    intent: intent.clone(),
                    result,
                    answer,
                });
                self.cache
                    .put(key, CacheValue::Answer(entry.clone()), plan.ttl_class);
                entry
            }
        };

        // Text that leaned on earlier turns means something else in a new context.
        if intent.inherited.is_empty() {
            self.cache
                .put(raw_key, CacheValue::Answer(cached.clone()), TtlClass::Recency);
        }

        self.remember(query, &cached);
        tracing::info!(
            session_id = session,
            kind = %intent.kind,
            latency_ms = started.elapsed().as_millis() as u64,
            warnings = cached.answer.warnings.len(),
            "Answered query"
        );
        Ok(cached.answer.clone())
    }

    fn remember(&self, query: &Query, cached: &CachedAnswer) {
        self.context.append(ConversationTurn {
            query: query.clone(),
            intent: cached.intent.clone(),
            result: cached.result.clone(),
            answered_at: Utc::now(),
        });
    }
}
