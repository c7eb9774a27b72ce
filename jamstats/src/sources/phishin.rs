//! Duration source: phish.in API v2. Read endpoints need no key.

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::{StreamExt, TryStreamExt};
use serde::Deserialize;

use super::http::SourceHttp;
use super::{lenient, DataSource};
use crate::catalog::slugify;
use crate::config::SourceApiConfig;
use crate::error::{JamError, Result};
use crate::models::{Endpoint, ParamKind, Record, SourceCall, SourceId, Sourced};

const PER_PAGE: &str = "1000";
const MAX_PAGES: u32 = 10;
/// Most recent shows read for a venue-wide question.
const MAX_VENUE_SHOWS: usize = 200;
const SHOW_FETCH_CONCURRENCY: usize = 6;

#[derive(Debug, Deserialize)]
struct TracksPage {
    #[serde(default)]
    tracks: Vec<Track>,
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    total_pages: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct Track {
    #[serde(default, deserialize_with = "lenient::opt_date")]
    show_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    venue_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    title: Option<String>,
    /// Milliseconds.
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    duration: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    set_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    position: Option<u32>,
    #[serde(default)]
    songs: Vec<TrackSong>,
}

#[derive(Debug, Deserialize)]
struct VenueDetail {
    #[serde(default)]
    shows: Vec<ShowStub>,
    #[serde(default)]
    show_dates: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ShowStub {
    #[serde(default, deserialize_with = "lenient::opt_date")]
    date: Option<NaiveDate>,
}

impl VenueDetail {
    /// Newest first, without duplicates.
    fn dates(self) -> Vec<NaiveDate> {
        let listed = self
            .show_dates
            .iter()
            .filter_map(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok());
        let mut dates: Vec<NaiveDate> = self.shows.iter().filter_map(|s| s.date).chain(listed).collect();
        dates.sort_unstable_by(|a, b| b.cmp(a));
        dates.dedup();
        dates
    }
}

#[derive(Debug, Deserialize)]
struct Show {
    #[serde(default, deserialize_with = "lenient::opt_date")]
    date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    venue_name: Option<String>,
    #[serde(default)]
    tracks: Vec<Track>,
}

#[derive(Debug, Deserialize)]
struct TrackSong {
    #[serde(default)]
    slug: String,
    #[serde(default)]
    title: String,
}

/// "Set 2" -> "2", "Encore" -> "e", "Encore 2" -> "e2". Soundchecks have no code.
fn set_code(set_name: &str) -> Option<String> {
    let lower = set_name.trim().to_lowercase();
    if let Some(n) = lower.strip_prefix("set ") {
        return Some(n.trim().to_string());
    }
    if let Some(rest) = lower.strip_prefix("encore") {
        return Some(format!("e{}", rest.trim()));
    }
    None
}

fn fin<T>(value: T) -> Sourced<T> {
    Sourced::new(SourceId::PhishIn, value)
}

impl Track {
    /// `None` for soundchecks and tracks that belong to another song.
    fn into_record(self, slug: &str) -> Option<Record> {
        let song_title = if self.songs.is_empty() {
            self.title.clone()
        } else {
            let song = self.songs.iter().find(|s| s.slug == slug)?;
            Some(song.title.clone()).filter(|t| !t.is_empty()).or(self.title.clone())
        };
        self.record(song_title, slug.to_string())
    }

    /// A track read from a show listing: credited to its first song.
    fn into_show_record(mut self, date: Option<NaiveDate>, venue: Option<&str>) -> Option<Record> {
        self.show_date = self.show_date.or(date);
        if self.venue_name.is_none() {
            self.venue_name = venue.map(str::to_string);
        }
        let (title, slug) = match self.songs.first() {
            Some(song) if !song.slug.is_empty() => {
                let title = Some(song.title.clone()).filter(|t| !t.is_empty()).or(self.title.clone());
                (title, song.slug.clone())
            }
            _ => {
                let title = self.title.clone()?;
                let slug = slugify(&title);
                (Some(title), slug)
            }
        };
        self.record(title, slug)
    }

    fn record(self, song_title: Option<String>, slug: String) -> Option<Record> {
        let set = self.set_name.as_deref().and_then(set_code)?;
        Some(Record {
            date: self.show_date.map(fin),
            venue: self.venue_name.map(fin),
            song: song_title.map(fin),
            song_slug: Some(fin(slug)),
            duration_ms: self.duration.filter(|ms| *ms > 0).map(fin),
            set: Some(fin(set)),
            position: self.position.map(fin),
            ..Default::default()
        })
    }
}

pub struct PhishInClient {
    http: SourceHttp,
}

impl PhishInClient {
    pub fn new(config: &SourceApiConfig) -> Result<Self> {
        Ok(Self {
            http: SourceHttp::new(SourceId::PhishIn, config)?,
        })
    }

    async fn song_tracks(&self, slug: &str) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        let mut page = 1;
        loop {
            let page_param = page.to_string();
            let query = [
                ("song_slug", slug),
                ("per_page", PER_PAGE),
                ("page", page_param.as_str()),
            ];
            let body: TracksPage = match self.http.get_json("tracks", &query).await {
                Ok(body) => body,
                // Unknown slugs 404 rather than returning an empty page.
                Err(JamError::NotFound(_)) => break,
                Err(e) => return Err(e),
            };

            records.extend(body.tracks.into_iter().filter_map(|t| t.into_record(slug)));

            let total_pages = body.total_pages.unwrap_or(1);
            if page >= total_pages || page >= MAX_PAGES {
                break;
            }
            page += 1;
        }
        Ok(records)
    }

    async fn show_tracks(&self, date: NaiveDate) -> Result<Vec<Record>> {
        let path = format!("shows/{date}");
        let show: Show = match self.http.get_json(&path, &[]).await {
            Ok(show) => show,
            Err(JamError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let (show_date, venue) = (show.date.or(Some(date)), show.venue_name);
        Ok(show
            .tracks
            .into_iter()
            .filter_map(|t| t.into_show_record(show_date, venue.as_deref()))
            .collect())
    }

    async fn venue_tracks(&self, venue_slug: &str) -> Result<Vec<Record>> {
        let detail: VenueDetail = match self.http.get_json(&format!("venues/{venue_slug}"), &[]).await {
            Ok(detail) => detail,
            Err(JamError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut dates = detail.dates();
        if dates.len() > MAX_VENUE_SHOWS {
            tracing::debug!(venue_slug, shows = dates.len(), "Reading only the most recent venue shows");
            dates.truncate(MAX_VENUE_SHOWS);
        }

        let shows: Vec<Vec<Record>> = futures::stream::iter(dates)
            .map(|date| self.show_tracks(date))
            .buffer_unordered(SHOW_FETCH_CONCURRENCY)
            .try_collect()
            .await?;
        Ok(shows.into_iter().flatten().collect())
    }
}

#[async_trait]
impl DataSource for PhishInClient {
    fn id(&self) -> SourceId {
        SourceId::PhishIn
    }

    async fn fetch(&self, call: &SourceCall) -> Result<Vec<Record>> {
        match call.endpoint {
            Endpoint::SongTracks => {
                let slug = call.get(ParamKind::SongSlug).ok_or_else(|| {
                    JamError::Validation("track call is missing its song slug".to_string())
                })?;
                let records = self.song_tracks(slug).await?;
                tracing::debug!(slug, records = records.len(), "Fetched from phish.in");
                Ok(records)
            }
            Endpoint::VenueTracks => {
                let venue_slug = call.get(ParamKind::VenueSlug).ok_or_else(|| {
                    JamError::Validation("venue track call is missing its venue slug".to_string())
                })?;
                let records = self.venue_tracks(venue_slug).await?;
                tracing::debug!(venue_slug, records = records.len(), "Fetched venue tracks from phish.in");
                Ok(records)
            }
            other => Err(JamError::Source {
                source_id: SourceId::PhishIn,
                message: format!("{other:?} is not served by this source"),
            }),
        }
    }
}
