use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jamstats::aggregator::{AggregatorSettings, ResultAggregator};
use jamstats::api::{create_router, AppState};
use jamstats::cache::QueryCache;
use jamstats::catalog::SourceCatalog;
use jamstats::config::{Config, LogFormat};
use jamstats::context::ConversationStore;
use jamstats::llm::LlmProvider;
use jamstats::models::Query;
use jamstats::pipeline::QueryPipeline;
use jamstats::resolver::{IntentResolver, ResolverSettings};
use jamstats::sources::{self, SourceRegistry};

const STATS_INTERVAL_SECS: u64 = 300;

#[derive(Parser)]
#[command(name = "jamstats")]
#[command(about = "Answers plain-English questions about setlists, song lengths and jams")]
struct Args {
    /// Answer one question, print the result and exit instead of serving HTTP
    #[arg(long)]
    query: Option<String>,

    /// Skip refreshing the song and venue catalog from the setlist source
    #[arg(long)]
    no_refresh: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    let logs = tracing_subscriber::registry().with(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "jamstats=info,tower_http=debug".into()),
    );
    match LogFormat::from_env() {
        LogFormat::Json => logs.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => logs.with(tracing_subscriber::fmt::layer()).init(),
    }

    let config = Config::from_env();

    if config.server.api_keys.is_empty() {
        tracing::warn!(
            "JAMSTATS_API_KEYS is not set; admin endpoints are locked. Set JAMSTATS_API_KEYS to enable /admin/* routes."
        );
    }

    if let Some(llm_config) = &config.llm {
        tracing::info!("Initializing understanding service: {}...", llm_config.model);
    }
    let llm = LlmProvider::new(config.llm.as_ref());
    if !llm.is_available() {
        tracing::warn!("LLM unavailable - every question will fail at resolution until LLM_MODEL is set");
    }

    let registry = SourceRegistry::from_config(&config.sources)?;

    let mut catalog = SourceCatalog::builtin();
    let refresh = config.sources.refresh_catalog && !args.no_refresh;
    if refresh && config.sources.phishnet.api_key.is_some() {
        tracing::info!("Refreshing song and venue catalog...");
        if let Err(e) = sources::refresh_catalog(&registry, &mut catalog).await {
            tracing::warn!(error = %e, "Catalog refresh failed - continuing with the built-in catalog");
        }
    } else if refresh {
        tracing::warn!("PHISHNET_API_KEY is not set - using the built-in catalog");
    }

    let cache = QueryCache::new(&config.cache);
    let resolver = IntentResolver::new(
        Arc::new(llm),
        Arc::new(catalog),
        ResolverSettings::from(&config.pipeline),
    );
    let aggregator = ResultAggregator::new(
        registry,
        cache.clone(),
        AggregatorSettings::from(&config),
    );
    let context = ConversationStore::new(
        config.pipeline.context_window,
        config.pipeline.max_sessions,
    );
    let pipeline = QueryPipeline::new(
        resolver,
        aggregator,
        cache,
        context,
        config.pipeline.context_turns,
    );

    if let Some(question) = args.query {
        return answer_once(&pipeline, &question).await;
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, pipeline);
    let cancel_token = CancellationToken::new();

    let stats_state = state.clone();
    let token = cancel_token.child_token();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("Cache reporter shutting down...");
                    break;
                }
                _ = tokio::time::sleep(tokio::time::Duration::from_secs(STATS_INTERVAL_SECS)) => {
                    let stats = stats_state.pipeline.cache().stats();
                    tracing::info!(
                        static_entries = stats.static_entries,
                        historical_entries = stats.historical_entries,
                        recency_entries = stats.recency_entries,
                        sessions = stats_state.pipeline.context().session_count(),
                        "Cache stats"
                    );
                }
            }
        }
    });

    let app = create_router(state);

    tracing::info!("Jamstats starting on http://{}", addr);
    tracing::info!("  Health check: http://{}/api/v1/health", addr);
    tracing::info!("  API docs:     http://{}/api/v1/docs", addr);
    tracing::info!("  OpenAPI spec: http://{}/api/v1/openapi.json", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token))
        .await?;

    Ok(())
}

/// One-shot mode: the answer (or the clarification) goes to stdout.
async fn answer_once(pipeline: &QueryPipeline, question: &str) -> anyhow::Result<()> {
    let query = Query::new(question, nanoid::nanoid!());
    match pipeline.answer(&query).await {
        Ok(answer) => {
            println!("{}", answer.answer);
            println!();
            println!("  {}  {}", answer.card.title, answer.card.stat);
            if !answer.card.subtitle.is_empty() {
                println!("  {}", answer.card.subtitle);
            }
            if let Some(context) = &answer.card.context {
                println!("  {context}");
            }
            for warning in &answer.warnings {
                println!("  ! {warning}");
            }
            if !answer.related.is_empty() {
                println!();
                println!("Related:");
                for related in &answer.related {
                    println!("  - {related}");
                }
            }
            Ok(())
        }
        Err(failure) => {
            println!("{}", failure.user_message());
            Err(anyhow::anyhow!("{} ({})", failure, failure.code()))
        }
    }
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, cancelling background tasks...");
    cancel_token.cancel();
}
