use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use jamstats::catalog::SourceCatalog;
use jamstats::config::SourceApiConfig;
use jamstats::error::JamError;
use jamstats::models::{CallLabel, Endpoint, ParamKind, SourceCall, SourceId};
use jamstats::sources::{refresh_catalog, DataSource, PhishInClient, PhishNetClient, SourceRegistry};

fn api_config(base_url: String, api_key: Option<&str>, max_retries: u32) -> SourceApiConfig {
    SourceApiConfig {
        base_url,
        api_key: api_key.map(str::to_string),
        attempt_timeout_ms: 5_000,
        max_retries,
    }
}

fn song_setlists(slug: &str) -> SourceCall {
    SourceCall::new(CallLabel::Primary, Endpoint::SongSetlists).param(ParamKind::SongSlug, slug)
}

fn song_tracks(slug: &str) -> SourceCall {
    SourceCall::new(CallLabel::Primary, Endpoint::SongTracks).param(ParamKind::SongSlug, slug)
}

#[tokio::test]
async fn phishnet_setlists_are_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/setlists/slug/tweezer.json"))
        .and(query_param("apikey", "net-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": false,
            "error_message": "",
            "data": [
                {
                    "showid": "1252698446", "showdate": "1995-12-31",
                    "venue": "Madison Square Garden", "venueid": "157",
                    "city": "New York", "country": "USA",
                    "song": "Tweezer", "slug": "tweezer", "set": "2", "position": "3",
                    "artistid": "1"
                },
                {
                    "showid": "99", "showdate": "2001-05-01",
                    "song": "Tweezer", "slug": "tweezer", "set": "1", "artistid": "7"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = PhishNetClient::new(&api_config(server.uri(), Some("net-key"), 0)).unwrap();
    let records = client.fetch(&song_setlists("tweezer")).await.unwrap();

    assert_eq!(records.len(), 1, "side-project rows are dropped");
    let record = &records[0];
    assert_eq!(record.show_id(), Some(1_252_698_446));
    assert_eq!(record.venue_name(), Some("Madison Square Garden"));
    assert_eq!(record.venue_id(), Some(157));
    assert_eq!(record.set_code(), Some("2"));
    assert_eq!(record.slug(), Some("tweezer"));
    assert_eq!(record.date.as_ref().unwrap().source, SourceId::PhishNet);
}

#[tokio::test]
async fn phishnet_empty_data_object_is_no_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/setlists/slug/harpua.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": false, "error_message": "", "data": {}
        })))
        .mount(&server)
        .await;

    let client = PhishNetClient::new(&api_config(server.uri(), Some("net-key"), 0)).unwrap();
    let records = client.fetch(&song_setlists("harpua")).await.unwrap();

    assert!(records.is_empty());
}

#[tokio::test]
async fn phishnet_error_envelope_is_a_source_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/setlists/slug/tweezer.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": true, "error_message": "Invalid API key", "data": []
        })))
        .mount(&server)
        .await;

    let client = PhishNetClient::new(&api_config(server.uri(), Some("bad-key"), 0)).unwrap();
    let result = client.fetch(&song_setlists("tweezer")).await;

    match result {
        Err(JamError::Source { source_id, message }) => {
            assert_eq!(source_id, SourceId::PhishNet);
            assert_eq!(message, "Invalid API key");
        }
        other => panic!("Expected source error, got: {other:?}"),
    }
}

#[tokio::test]
async fn phishnet_without_key_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = PhishNetClient::new(&api_config(server.uri(), None, 0)).unwrap();
    let result = client.fetch(&song_setlists("tweezer")).await;

    assert!(matches!(result, Err(JamError::ApiAuth(_))));
}

#[tokio::test]
async fn phishnet_retries_once_on_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/setlists/slug/tweezer.json"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/setlists/slug/tweezer.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": false,
            "data": [{"showdate": "1997-12-06", "song": "Tweezer", "slug": "tweezer", "set": "2"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = PhishNetClient::new(&api_config(server.uri(), Some("net-key"), 1)).unwrap();
    let records = client.fetch(&song_setlists("tweezer")).await.unwrap();

    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn phishnet_retries_a_slow_attempt_within_the_call_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/setlists/slug/tweezer.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"error": false, "data": []}))
                .set_delay(Duration::from_secs(2)),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/setlists/slug/tweezer.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": false,
            "data": [{"showdate": "1997-12-06", "song": "Tweezer", "slug": "tweezer", "set": "2"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = SourceApiConfig {
        attempt_timeout_ms: 200,
        ..api_config(server.uri(), Some("net-key"), 1)
    };
    let client = PhishNetClient::new(&config).unwrap();
    let records = tokio::time::timeout(Duration::from_secs(1), client.fetch(&song_setlists("tweezer")))
        .await
        .expect("the retry should land inside the call budget")
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].date().map(|d| d.to_string()).as_deref(), Some("1997-12-06"));
}

#[tokio::test]
async fn phishnet_song_stats_keep_played_songs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/songs.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": false,
            "data": [
                {"song": "Tweezer", "slug": "tweezer", "times_played": "412", "gap": "3", "artistid": "1"},
                {"song": "Unplayed Cover", "slug": "unplayed-cover", "times_played": "0", "artistid": "1"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = PhishNetClient::new(&api_config(server.uri(), Some("net-key"), 0)).unwrap();
    let records = client
        .fetch(&SourceCall::new(CallLabel::Primary, Endpoint::SongStats))
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].song_name(), Some("Tweezer"));
    assert_eq!(records[0].times_played.as_ref().map(|t| t.value), Some(412));
    assert_eq!(records[0].gap.as_ref().map(|g| g.value), Some(3));
}

#[tokio::test]
async fn phishnet_gives_up_after_retry_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/setlists/slug/tweezer.json"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(2)
        .mount(&server)
        .await;

    let client = PhishNetClient::new(&api_config(server.uri(), Some("net-key"), 1)).unwrap();
    let result = client.fetch(&song_setlists("tweezer")).await;

    assert!(matches!(result, Err(JamError::Source { .. })));
}

#[tokio::test]
async fn phishnet_rate_limit_is_reported_with_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/setlists/slug/tweezer.json"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "12"))
        .mount(&server)
        .await;

    let client = PhishNetClient::new(&api_config(server.uri(), Some("net-key"), 0)).unwrap();
    let result = client.fetch(&song_setlists("tweezer")).await;

    assert!(matches!(
        result,
        Err(JamError::SourceRateLimit {
            source_id: SourceId::PhishNet,
            retry_after: Some(12)
        })
    ));
}

#[tokio::test]
async fn phishin_tracks_follow_pages_and_skip_soundchecks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tracks"))
        .and(query_param("song_slug", "tweezer"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_pages": 2,
            "tracks": [
                {
                    "show_date": "1997-12-06", "venue_name": "Hara Arena", "title": "Tweezer",
                    "duration": 2_223_000, "set_name": "Set 2", "position": 1,
                    "songs": [{"slug": "tweezer", "title": "Tweezer"}]
                },
                {
                    "show_date": "1997-12-06", "venue_name": "Hara Arena", "title": "Tweezer",
                    "duration": 240_000, "set_name": "Soundcheck",
                    "songs": [{"slug": "tweezer", "title": "Tweezer"}]
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tracks"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_pages": 2,
            "tracks": [
                {
                    "show_date": "2019-06-23", "venue_name": "Merriweather Post Pavilion",
                    "title": "Tweezer", "duration": 1_200_000, "set_name": "Encore",
                    "songs": [{"slug": "tweezer", "title": "Tweezer"}]
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = PhishInClient::new(&api_config(server.uri(), None, 0)).unwrap();
    let records = client.fetch(&song_tracks("tweezer")).await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].duration_ms(), Some(2_223_000));
    assert_eq!(records[0].venue_name(), Some("Hara Arena"));
    assert_eq!(records[1].set_code(), Some("e"));
    assert!(records
        .iter()
        .all(|r| r.duration_ms.as_ref().unwrap().source == SourceId::PhishIn));
}

#[tokio::test]
async fn phishin_unknown_slug_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tracks"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = PhishInClient::new(&api_config(server.uri(), None, 0)).unwrap();
    let records = client.fetch(&song_tracks("not-a-song")).await.unwrap();

    assert!(records.is_empty());
}

#[tokio::test]
async fn phishin_venue_tracks_read_every_show_at_the_venue() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/venues/madison-square-garden"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Madison Square Garden",
            "show_dates": ["1995-12-31", "1997-12-30"]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/shows/1995-12-31"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "date": "1995-12-31",
            "venue_name": "Madison Square Garden",
            "tracks": [
                {
                    "title": "Mike's Song", "duration": 1_050_000, "set_name": "Set 2", "position": 9,
                    "songs": [{"slug": "mikes-song", "title": "Mike's Song"}]
                },
                {"title": "Soundcheck Jam", "duration": 300_000, "set_name": "Soundcheck"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/shows/1997-12-30"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "date": "1997-12-30",
            "venue_name": "Madison Square Garden",
            "tracks": [
                {"title": "Tweezer", "duration": 1_260_000, "set_name": "Set 2", "position": 8}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = PhishInClient::new(&api_config(server.uri(), None, 0)).unwrap();
    let call = SourceCall::new(CallLabel::Primary, Endpoint::VenueTracks)
        .param(ParamKind::VenueSlug, "madison-square-garden");
    let mut records = client.fetch(&call).await.unwrap();
    records.sort_by_key(|r| r.date());

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].slug(), Some("mikes-song"));
    assert_eq!(records[0].venue_name(), Some("Madison Square Garden"));
    assert_eq!(records[1].slug(), Some("tweezer"));
    assert_eq!(records[1].duration_ms(), Some(1_260_000));
}

#[tokio::test]
async fn phishin_unknown_venue_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/venues/nowhere"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = PhishInClient::new(&api_config(server.uri(), None, 0)).unwrap();
    let call = SourceCall::new(CallLabel::Primary, Endpoint::VenueTracks).param(ParamKind::VenueSlug, "nowhere");

    assert!(client.fetch(&call).await.unwrap().is_empty());
}

#[tokio::test]
async fn phishin_rejects_setlist_endpoints() {
    let client = PhishInClient::new(&api_config("http://127.0.0.1:9".to_string(), None, 0)).unwrap();
    let result = client.fetch(&song_setlists("tweezer")).await;

    assert!(matches!(
        result,
        Err(JamError::Source {
            source_id: SourceId::PhishIn,
            ..
        })
    ));
}

#[tokio::test]
async fn catalog_refresh_adds_songs_and_venues() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/songs.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": false,
            "data": [
                {"song": "Tweezer", "slug": "tweezer", "times_played": "412", "artistid": "1"},
                {"song": "Kill Devil Falls", "slug": "kill-devil-falls", "times_played": "160", "artistid": "1"},
                {"song": "Unplayed Cover", "slug": "unplayed-cover", "times_played": "0", "artistid": "1"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/venues.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": false,
            "data": [
                {"venueid": "157", "venuename": "Madison Square Garden", "city": "New York", "country": "USA"},
                {"venueid": "1201", "venuename": "Lemon Grove Pavilion", "city": "Lemon Grove", "country": "USA"}
            ]
        })))
        .mount(&server)
        .await;

    let net = PhishNetClient::new(&api_config(server.uri(), Some("net-key"), 0)).unwrap();
    let registry = SourceRegistry::new().with(std::sync::Arc::new(net));
    let mut catalog = SourceCatalog::builtin();
    let version_before = catalog.version;

    let (songs_added, venues_added) = refresh_catalog(&registry, &mut catalog).await.unwrap();

    assert_eq!(songs_added, 1, "Tweezer is already seeded");
    assert_eq!(venues_added, 1, "MSG is seeded and only adopts the id");
    assert!(catalog.song_by_slug("kill-devil-falls").is_some());
    assert!(catalog.song_by_slug("unplayed-cover").is_none());
    assert_eq!(catalog.version, version_before + 1);
    let msg = catalog.find_venue("MSG", 0.82);
    assert_eq!(msg.entry().and_then(|v| v.id), Some(157));
}
