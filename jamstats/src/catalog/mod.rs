//! Versioned description of what the two data sources can answer, plus the
//! song and venue identifiers the resolver grounds entities against.

mod matching;
mod seed;

pub use matching::{best_match, normalize, slugify, Match};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::{Intent, IntentKind, Record, SongRef, SourceId, VenueRef};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongEntry {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl SongEntry {
    pub fn new(name: &str, aliases: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            slug: slugify(name),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn keys(&self) -> Vec<&str> {
        let mut keys = vec![self.name.as_str(), self.slug.as_str()];
        keys.extend(self.aliases.iter().map(String::as_str));
        keys
    }

    pub fn to_ref(&self) -> SongRef {
        SongRef {
            name: self.name.clone(),
            slug: self.slug.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueEntry {
    /// Setlist-source venue id, filled in by a catalog refresh.
    pub id: Option<u64>,
    pub name: String,
    pub city: String,
    pub country: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl VenueEntry {
    fn keys(&self) -> Vec<&str> {
        let mut keys = vec![self.name.as_str()];
        keys.extend(self.aliases.iter().map(String::as_str));
        keys
    }

    pub fn to_ref(&self) -> VenueRef {
        VenueRef {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCatalog {
    /// Bumped on every refresh.
    pub version: u32,
    pub songs: Vec<SongEntry>,
    pub venues: Vec<VenueEntry>,
}

impl Default for SourceCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SourceCatalog {
    pub fn builtin() -> Self {
        Self {
            version: 1,
            songs: seed::SONGS
                .iter()
                .map(|(name, aliases)| SongEntry::new(name, aliases))
                .collect(),
            venues: seed::VENUES
                .iter()
                .map(|(name, city, country, aliases)| VenueEntry {
                    id: None,
                    name: name.to_string(),
                    city: city.to_string(),
                    country: country.to_string(),
                    aliases: aliases.iter().map(|a| a.to_string()).collect(),
                })
                .collect(),
        }
    }

    pub fn find_song(&self, query: &str, floor: f64) -> Match<'_, SongEntry> {
        best_match(query, &self.songs, SongEntry::keys, floor)
    }

    pub fn find_venue(&self, query: &str, floor: f64) -> Match<'_, VenueEntry> {
        best_match(query, &self.venues, VenueEntry::keys, floor)
    }

    pub fn song_by_slug(&self, slug: &str) -> Option<&SongEntry> {
        self.songs.iter().find(|s| s.slug == slug)
    }

    /// Countries the catalog knows venues in, for country entity validation.
    pub fn countries(&self) -> Vec<&str> {
        let mut countries: Vec<&str> = self.venues.iter().map(|v| v.country.as_str()).collect();
        countries.sort_unstable();
        countries.dedup();
        countries
    }

    /// Merge the setlist source's song list. Known songs keep their aliases;
    /// new songs are added. Returns the number added.
    pub fn merge_songs(&mut self, records: &[Record]) -> usize {
        let mut added = 0;
        for record in records {
            let (Some(name), Some(slug)) = (record.song_name(), record.slug()) else {
                continue;
            };
            if let Some(existing) = self.songs.iter_mut().find(|s| s.slug == slug) {
                if existing.name != name {
                    existing.name = name.to_string();
                }
                continue;
            }
            self.songs.push(SongEntry {
                name: name.to_string(),
                slug: slug.to_string(),
                aliases: Vec::new(),
            });
            added += 1;
        }
        added
    }

    /// Merge the setlist source's venue list, adopting its ids for seeded venues
    /// with the same normalized name. Returns the number added.
    pub fn merge_venues(&mut self, records: &[Record]) -> usize {
        let mut added = 0;
        for record in records {
            let (Some(name), Some(id)) = (record.venue_name(), record.venue_id()) else {
                continue;
            };
            let key = normalize(name);
            if let Some(existing) = self
                .venues
                .iter_mut()
                .find(|v| v.id == Some(id) || (v.id.is_none() && normalize(&v.name) == key))
            {
                existing.id = Some(id);
                continue;
            }
            self.venues.push(VenueEntry {
                id: Some(id),
                name: name.to_string(),
                city: record
                    .city
                    .as_ref()
                    .map(|c| c.value.clone())
                    .unwrap_or_default(),
                country: record.country().unwrap_or_default().to_string(),
                aliases: Vec::new(),
            });
            added += 1;
        }
        added
    }

    pub fn bump_version(&mut self) {
        self.version += 1;
    }

    /// Grounding context for the understanding service: supported intent
    /// kinds with the template fields each can fill, entity roles, sources,
    /// and the alias tables.
    pub fn capabilities(&self) -> Value {
        let kinds: Vec<Value> = IntentKind::ALL
            .iter()
            .map(|kind| {
                json!({
                    "kind": kind.as_str(),
                    "description": kind.description(),
                    "template_fields": Intent::fields_for_kind(*kind),
                })
            })
            .collect();

        let song_aliases: serde_json::Map<String, Value> = self
            .songs
            .iter()
            .flat_map(|s| s.aliases.iter().map(move |a| (a.clone(), json!(s.name))))
            .collect();
        let venue_aliases: serde_json::Map<String, Value> = self
            .venues
            .iter()
            .flat_map(|v| v.aliases.iter().map(move |a| (a.clone(), json!(v.name))))
            .collect();

        json!({
            "catalog_version": self.version,
            "intent_kinds": kinds,
            "entity_roles": {
                "song": "song title as written by the user",
                "second_song": "second song, comparison only",
                "venue": "venue name or nickname",
                "start_date": "YYYY-MM-DD, inclusive",
                "end_date": "YYYY-MM-DD, inclusive",
                "year": "four-digit year, shorthand for a whole-year date range",
                "show_date": "YYYY-MM-DD of a single show",
                "country": "country name",
                "position": "opener | encore | first_set | second_set",
                "threshold_minutes": "minimum duration in minutes",
                "metric": "duration | play_count | gap",
                "direction": "max | min",
                "limit": "number of items to list",
                "percentile": "0 to 100, a percentile of song length",
            },
            "sources": [
                {
                    "id": SourceId::PhishNet.as_str(),
                    "provides": ["setlists", "shows", "songs", "venues", "gaps", "set positions", "jam charts"],
                },
                {
                    "id": SourceId::PhishIn.as_str(),
                    "provides": ["track durations", "show dates", "venue names"],
                },
            ],
            "known_songs": self.songs.len(),
            "known_venues": self.venues.len(),
            "song_aliases": song_aliases,
            "venue_aliases": venue_aliases,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sourced;

    #[test]
    fn builtin_resolves_community_aliases() {
        let catalog = SourceCatalog::builtin();
        assert_eq!(
            catalog.find_song("YEM", 0.82).entry().unwrap().name,
            "You Enjoy Myself"
        );
        assert_eq!(
            catalog.find_venue("MSG", 0.82).entry().unwrap().name,
            "Madison Square Garden"
        );
        assert_eq!(
            catalog.find_venue("the Garden", 0.82).entry().unwrap().name,
            "Madison Square Garden"
        );
        assert_eq!(catalog.find_song("mikes-song", 0.82).entry().unwrap().slug, "mikes-song");
    }

    #[test]
    fn unknown_song_is_no_match() {
        let catalog = SourceCatalog::builtin();
        assert!(matches!(
            catalog.find_song("Stairway to Heaven", 0.82),
            Match::None
        ));
    }

    #[test]
    fn merge_venues_adopts_source_ids() {
        let mut catalog = SourceCatalog::builtin();
        let records = vec![
            Record {
                venue: Some(Sourced::new(
                    SourceId::PhishNet,
                    "Madison Square Garden".to_string(),
                )),
                venue_id: Some(Sourced::new(SourceId::PhishNet, 157)),
                ..Default::default()
            },
            Record {
                venue: Some(Sourced::new(SourceId::PhishNet, "Nectar's".to_string())),
                venue_id: Some(Sourced::new(SourceId::PhishNet, 9)),
                country: Some(Sourced::new(SourceId::PhishNet, "USA".to_string())),
                ..Default::default()
            },
        ];
        let before = catalog.venues.len();
        assert_eq!(catalog.merge_venues(&records), 1);
        assert_eq!(catalog.venues.len(), before + 1);
        let msg = catalog.find_venue("msg", 0.82).entry().unwrap();
        assert_eq!(msg.id, Some(157));
    }

    #[test]
    fn capabilities_list_every_kind() {
        let caps = SourceCatalog::builtin().capabilities();
        let kinds = caps["intent_kinds"].as_array().unwrap();
        assert_eq!(kinds.len(), IntentKind::ALL.len());
        assert_eq!(caps["song_aliases"]["yem"], "You Enjoy Myself");
    }
}
