//! Clients for the two statistics sources and the registry the aggregator
//! dispatches through.

mod http;
mod lenient;
mod phishin;
mod phishnet;

pub use phishin::PhishInClient;
pub use phishnet::PhishNetClient;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::SourceCatalog;
use crate::config::SourcesConfig;
use crate::error::{JamError, Result};
use crate::models::{CallLabel, Endpoint, Record, SourceCall, SourceId};

/// A read-only statistics source that answers [`SourceCall`]s with
/// normalized [`Record`]s.
#[async_trait]
pub trait DataSource: Send + Sync {
    fn id(&self) -> SourceId;

    async fn fetch(&self, call: &SourceCall) -> Result<Vec<Record>>;
}

#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<SourceId, Arc<dyn DataSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SourcesConfig) -> Result<Self> {
        Ok(Self::new()
            .with(Arc::new(PhishNetClient::new(&config.phishnet)?))
            .with(Arc::new(PhishInClient::new(&config.phishin)?)))
    }

    pub fn with(mut self, source: Arc<dyn DataSource>) -> Self {
        self.register(source);
        self
    }

    pub fn register(&mut self, source: Arc<dyn DataSource>) {
        self.sources.insert(source.id(), source);
    }

    pub fn get(&self, id: SourceId) -> Option<&Arc<dyn DataSource>> {
        self.sources.get(&id)
    }

    pub async fn fetch(&self, call: &SourceCall) -> Result<Vec<Record>> {
        let source = self.get(call.source).ok_or_else(|| JamError::Source {
            source_id: call.source,
            message: "source is not configured".to_string(),
        })?;
        source.fetch(call).await
    }
}

/// Pull the setlist source's song and venue lists into `catalog`.
/// Returns (songs added, venues added).
pub async fn refresh_catalog(
    registry: &SourceRegistry,
    catalog: &mut SourceCatalog,
) -> Result<(usize, usize)> {
    let songs_call = SourceCall::new(CallLabel::Universe, Endpoint::Songs);
    let venues_call = SourceCall::new(CallLabel::Primary, Endpoint::Venues);
    let (songs, venues) =
        futures::future::try_join(registry.fetch(&songs_call), registry.fetch(&venues_call))
            .await?;

    let songs_added = catalog.merge_songs(&songs);
    let venues_added = catalog.merge_venues(&venues);
    catalog.bump_version();

    tracing::info!(
        songs = catalog.songs.len(),
        venues = catalog.venues.len(),
        songs_added,
        venues_added,
        version = catalog.version,
        "Refreshed source catalog"
    );
    Ok((songs_added, venues_added))
}
