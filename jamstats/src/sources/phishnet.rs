//! Setlist source: phish.net API v5.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::http::SourceHttp;
use super::{lenient, DataSource};
use crate::config::SourceApiConfig;
use crate::error::{JamError, Result};
use crate::models::{Endpoint, ParamKind, Record, SourceCall, SourceId, Sourced};

/// phish.net serves side projects too; the band itself is artist 1.
const PHISH_ARTIST_ID: u64 = 1;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default, deserialize_with = "lenient::flag")]
    error: bool,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Default, Deserialize)]
struct Row {
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    showid: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_date")]
    showdate: Option<NaiveDate>,
    #[serde(default, alias = "venuename", deserialize_with = "lenient::opt_string")]
    venue: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    venueid: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    city: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    country: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    song: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    slug: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    set: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    position: Option<u32>,
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    gap: Option<u32>,
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    times_played: Option<u32>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    artistid: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    jamchart_description: Option<String>,
}

impl Row {
    fn is_band(&self) -> bool {
        self.artistid.map_or(true, |id| id == PHISH_ARTIST_ID)
    }

    fn into_record(self) -> Record {
        Record {
            show_id: self.showid.map(net),
            date: self.showdate.map(net),
            venue: self.venue.map(net),
            venue_id: self.venueid.map(net),
            city: self.city.map(net),
            country: self.country.map(net),
            song: self.song.map(net),
            song_slug: self.slug.map(net),
            duration_ms: None,
            set: self.set.map(|set| net(set.to_lowercase())),
            position: self.position.map(net),
            gap: self.gap.map(net),
            times_played: self.times_played.map(net),
            jam_note: self.jamchart_description.map(net),
            conflicts: Vec::new(),
        }
    }
}

fn net<T>(value: T) -> Sourced<T> {
    Sourced::new(SourceId::PhishNet, value)
}

pub struct PhishNetClient {
    http: SourceHttp,
    api_key: Option<String>,
}

impl PhishNetClient {
    pub fn new(config: &SourceApiConfig) -> Result<Self> {
        if config.api_key.is_none() {
            tracing::warn!("PHISHNET_API_KEY is not set; setlist source calls will fail");
        }
        Ok(Self {
            http: SourceHttp::new(SourceId::PhishNet, config)?,
            api_key: config.api_key.clone(),
        })
    }

    fn path(call: &SourceCall) -> Result<String> {
        let param = |kind: ParamKind| {
            call.get(kind).ok_or_else(|| {
                JamError::Validation(format!("{:?} call is missing its {kind:?} parameter", call.endpoint))
            })
        };
        Ok(match call.endpoint {
            Endpoint::SongSetlists => format!("setlists/slug/{}.json", param(ParamKind::SongSlug)?),
            Endpoint::VenueSetlists => {
                format!("setlists/venueid/{}.json", param(ParamKind::VenueId)?)
            }
            Endpoint::ShowSetlist => {
                format!("setlists/showdate/{}.json", param(ParamKind::ShowDate)?)
            }
            Endpoint::Shows => "shows/artist/phish.json".to_string(),
            Endpoint::Songs | Endpoint::SongStats => "songs.json".to_string(),
            Endpoint::Venues => "venues.json".to_string(),
            Endpoint::JamCharts => format!("jamcharts/slug/{}.json", param(ParamKind::SongSlug)?),
            Endpoint::SongTracks | Endpoint::VenueTracks => {
                return Err(JamError::Source {
                    source_id: SourceId::PhishNet,
                    message: "track durations are not served by this source".to_string(),
                })
            }
        })
    }

    async fn rows(&self, path: &str, endpoint: Endpoint) -> Result<Vec<Row>> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            JamError::ApiAuth("phishnet: PHISHNET_API_KEY is not set".to_string())
        })?;
        let mut query = vec![("apikey", api_key)];
        if endpoint == Endpoint::Shows {
            query.push(("order_by", "showdate"));
        }

        let envelope: Envelope = self.http.get_json(path, &query).await?;
        if envelope.error {
            return Err(JamError::Source {
                source_id: SourceId::PhishNet,
                message: envelope
                    .error_message
                    .unwrap_or_else(|| "request rejected".to_string()),
            });
        }

        // Empty result sets come back as `[]`, `{}` or `""`.
        match envelope.data {
            Value::Array(items) => Ok(items
                .into_iter()
                .filter_map(|item| match serde_json::from_value::<Row>(item) {
                    Ok(row) => Some(row),
                    Err(e) => {
                        tracing::debug!(error = %e, path, "Skipping unreadable row");
                        None
                    }
                })
                .collect()),
            _ => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl DataSource for PhishNetClient {
    fn id(&self) -> SourceId {
        SourceId::PhishNet
    }

    async fn fetch(&self, call: &SourceCall) -> Result<Vec<Record>> {
        let path = Self::path(call)?;
        let rows = self.rows(&path, call.endpoint).await?;
        let total = rows.len();
        let today = Utc::now().date_naive();

        let records: Vec<Record> = rows
            .into_iter()
            .filter(Row::is_band)
            .filter(|row| match call.endpoint {
                Endpoint::Songs | Endpoint::SongStats => row.times_played.unwrap_or(0) > 0,
                // Announced shows that have not happened yet.
                Endpoint::Shows => row.showdate.map_or(false, |d| d <= today),
                _ => true,
            })
            .map(Row::into_record)
            .collect();

        tracing::debug!(%path, rows = total, records = records.len(), "Fetched from phish.net");
        Ok(records)
    }
}
