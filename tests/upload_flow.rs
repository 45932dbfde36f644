use base64::{engine::general_purpose, Engine as _};
use csv_to_playlist as lib;
use lib::api::spotify::SpotifyProvider;
use lib::api::Provider;
use lib::config::{Credentials, Endpoints};
use lib::models::CoverOutcome;
use lib::uploader::{PlaylistUploader, PLAYLIST_DESCRIPTION};
use lib::Error;
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;

fn provider(base: &str) -> SpotifyProvider {
    let credentials = Credentials {
        client_id: "cid".into(),
        client_secret: "csecret".into(),
        user_id: "mock_user".into(),
        access_token: Some("valid".into()),
        refresh_token: "refresh".into(),
    };
    SpotifyProvider::new(credentials, Endpoints::single(base))
}

fn write_file(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let p = dir.path().join(name);
    let mut f = std::fs::File::create(&p).unwrap();
    f.write_all(bytes).unwrap();
    p
}

fn mock_search(server: &mut ServerGuard, query: &str, items: serde_json::Value) -> mockito::Mock {
    server
        .mock("GET", "/search")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("query".into(), query.into()),
            Matcher::UrlEncoded("type".into(), "track".into()),
            Matcher::UrlEncoded("limit".into(), "1".into()),
            Matcher::UrlEncoded("offset".into(), "0".into()),
        ]))
        .match_header("authorization", "Bearer valid")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "tracks": { "items": items } }).to_string())
        .create()
}

#[test]
fn unresolved_rows_are_skipped_and_the_rest_added() {
    let mut server = Server::new();
    let base = server.url();

    let m_hit = mock_search(
        &mut server,
        "track:Yesterday artist:The Beatles",
        json!([{ "uri": "spotify:track:yesterday" }]),
    );
    let m_miss = mock_search(&mut server, "track:Unknown Song artist:Nobody", json!([]));
    let m_create = server
        .mock("POST", "/users/mock_user/playlists")
        .match_body(Matcher::Json(json!({
            "name": "Road Trip",
            "description": PLAYLIST_DESCRIPTION,
            "public": true
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(json!({ "id": "pl1" }).to_string())
        .create();
    let m_add = server
        .mock("POST", "/playlists/pl1/tracks")
        .match_body(Matcher::Json(json!({ "uris": ["spotify:track:yesterday"] })))
        .with_status(201)
        .with_body(json!({ "snapshot_id": "s1" }).to_string())
        .expect(1)
        .create();
    let m_image = server
        .mock("PUT", "/playlists/pl1/images")
        .expect(0)
        .create();

    let td = tempfile::tempdir().unwrap();
    let csv = write_file(
        &td,
        "Road Trip.csv",
        b"track,artist\nYesterday,The Beatles\nUnknown Song,Nobody\n",
    );

    let uploader = PlaylistUploader::new(provider(&base));
    let rt = tokio::runtime::Runtime::new().unwrap();
    let summary = rt.block_on(uploader.run(&csv, None)).expect("run");

    assert_eq!(summary.playlist_id, "pl1");
    assert_eq!(summary.resolved, vec!["spotify:track:yesterday"]);
    assert_eq!(summary.unresolved.len(), 1);
    assert_eq!(summary.unresolved[0].title, "Unknown Song");
    assert_eq!((summary.batches_added, summary.batches_failed), (1, 0));
    assert!(summary.cover.is_none());

    m_hit.assert();
    m_miss.assert();
    m_create.assert();
    m_add.assert();
    m_image.assert();
}

#[test]
fn forbidden_playlist_creation_halts_the_run() {
    let mut server = Server::new();
    let base = server.url();

    let _m_hit = mock_search(
        &mut server,
        "track:Yesterday artist:The Beatles",
        json!([{ "uri": "spotify:track:yesterday" }]),
    );
    let m_create = server
        .mock("POST", "/users/mock_user/playlists")
        .with_status(403)
        .with_body(r#"{"error":{"status":403,"message":"Insufficient client scope"}}"#)
        .expect(1)
        .create();
    let m_add = server
        .mock("POST", Matcher::Regex(r"^/playlists/.*/tracks$".into()))
        .expect(0)
        .create();
    let m_image = server
        .mock("PUT", Matcher::Regex(r"^/playlists/.*/images$".into()))
        .expect(0)
        .create();

    let td = tempfile::tempdir().unwrap();
    let csv = write_file(&td, "mix.csv", b"track,artist\nYesterday,The Beatles\n");
    let image = write_file(&td, "cover.jpg", b"\xff\xd8\xff\xe0");

    let uploader = PlaylistUploader::new(provider(&base));
    let rt = tokio::runtime::Runtime::new().unwrap();
    let res = rt.block_on(uploader.run(&csv, Some(&image)));
    match res {
        Err(Error::Api { status, body }) => {
            assert_eq!(status, 403);
            assert!(body.contains("Insufficient client scope"));
        }
        other => panic!("expected api error, got {:?}", other),
    }

    m_create.assert();
    m_add.assert();
    m_image.assert();
}

#[test]
fn cover_image_is_sent_base64_as_jpeg() {
    let mut server = Server::new();
    let base = server.url();

    let jpeg: &[u8] = b"\xff\xd8\xff\xe0fake-jpeg-payload";
    let expected = general_purpose::STANDARD.encode(jpeg);

    let _m_hit = mock_search(
        &mut server,
        "track:Yesterday artist:The Beatles",
        json!([{ "uri": "spotify:track:yesterday" }]),
    );
    let _m_create = server
        .mock("POST", "/users/mock_user/playlists")
        .with_status(201)
        .with_body(json!({ "id": "pl9" }).to_string())
        .create();
    let _m_add = server
        .mock("POST", "/playlists/pl9/tracks")
        .with_status(201)
        .create();
    let m_image = server
        .mock("PUT", "/playlists/pl9/images")
        .match_header("content-type", "image/jpeg")
        .match_header("authorization", "Bearer valid")
        .match_body(expected.as_str())
        .with_status(202)
        .expect(1)
        .create();

    let td = tempfile::tempdir().unwrap();
    let csv = write_file(&td, "covered.csv", b"track,artist\nYesterday,The Beatles\n");
    let image = write_file(&td, "cover.jpg", jpeg);

    let uploader = PlaylistUploader::new(provider(&base));
    let rt = tokio::runtime::Runtime::new().unwrap();
    let summary = rt.block_on(uploader.run(&csv, Some(&image))).expect("run");
    assert_eq!(summary.cover, Some(CoverOutcome::Accepted));

    m_image.assert();
}

#[test]
fn cover_status_codes() {
    let mut server = Server::new();
    let base = server.url();

    let _m_ok = server
        .mock("PUT", "/playlists/ok/images")
        .with_status(200)
        .create();
    let _m_odd = server
        .mock("PUT", "/playlists/odd/images")
        .with_status(204)
        .create();
    let _m_big = server
        .mock("PUT", "/playlists/big/images")
        .with_status(413)
        .with_body("too large")
        .create();

    let p = provider(&base);
    let rt = tokio::runtime::Runtime::new().unwrap();
    assert_eq!(rt.block_on(p.upload_cover("ok", "AAAA")).unwrap(), CoverOutcome::Accepted);
    assert_eq!(
        rt.block_on(p.upload_cover("odd", "AAAA")).unwrap(),
        CoverOutcome::Unexpected(204)
    );
    match rt.block_on(p.upload_cover("big", "AAAA")) {
        Err(Error::Api { status, .. }) => assert_eq!(status, 413),
        other => panic!("expected api error, got {:?}", other),
    }
}

#[test]
fn token_failure_aborts_before_playlist_creation() {
    let mut server = Server::new();
    let base = server.url();

    let m_search = server
        .mock("GET", "/search")
        .match_query(Matcher::Any)
        .match_header("authorization", Matcher::Missing)
        .with_status(401)
        .expect(1)
        .create();
    let m_token = server
        .mock("POST", "/api/token")
        .with_status(400)
        .with_body(json!({"error": "invalid_client", "error_description": "Invalid client"}).to_string())
        .expect(2)
        .create();
    let m_create = server
        .mock("POST", "/users/mock_user/playlists")
        .expect(0)
        .create();

    let credentials = Credentials {
        client_id: "cid".into(),
        client_secret: "wrong".into(),
        user_id: "mock_user".into(),
        access_token: None,
        refresh_token: "refresh".into(),
    };
    let uploader = PlaylistUploader::new(SpotifyProvider::new(credentials, Endpoints::single(&base)));

    let td = tempfile::tempdir().unwrap();
    let csv = write_file(&td, "mix.csv", b"track,artist\nYesterday,The Beatles\n");

    let rt = tokio::runtime::Runtime::new().unwrap();
    let res = rt.block_on(uploader.run(&csv, None));
    assert!(matches!(res, Err(Error::Auth(_))), "got {:?}", res);

    m_search.assert();
    m_token.assert();
    m_create.assert();
}

#[test]
fn missing_input_file_makes_no_requests() {
    let mut server = Server::new();
    let base = server.url();
    let m_any = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create();

    let uploader = PlaylistUploader::new(provider(&base));
    let rt = tokio::runtime::Runtime::new().unwrap();
    let res = rt.block_on(uploader.run(std::path::Path::new("/no/such/list.csv"), None));
    assert!(matches!(res, Err(Error::Input(_))));
    m_any.assert();
}
