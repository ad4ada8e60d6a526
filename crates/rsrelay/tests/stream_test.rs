//! Integration tests for the download relay.

use std::time::Duration;

use axum::http::{StatusCode, header};
use futures::StreamExt;
use http_body_util::BodyExt;

mod common;

use common::{
    CHUNKS, FILE_BYTES, MockRemote, RENEWED_COOKIE, UNREACHABLE_ENDPOINT, expired_session,
    live_session,
};
use rsrelay::gateway::{RelayError, StreamRelay};
use rsrelay::service::RelayService;

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn download_streams_bytes_with_attachment_headers() {
    let remote = MockRemote::start().await;
    let service = remote.service();
    let mut session = live_session("tok");

    let response = service
        .stream_download(&mut session, "paths/a/report.csv")
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "text/csv");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"report.csv\""
    );
    assert_eq!(
        headers[header::CONTENT_LENGTH],
        FILE_BYTES.len().to_string().as_str()
    );
    assert_eq!(
        headers[header::CACHE_CONTROL],
        "no-store, no-cache, must-revalidate, max-age=0"
    );
    assert_eq!(headers[header::PRAGMA], "no-cache");
    assert_eq!(headers[header::EXPIRES], "0");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], FILE_BYTES);

    let query = &remote.queries().await[0];
    assert_eq!(query, "download=true");
    assert_eq!(remote.cookies().await, vec!["Authorization=tok"]);
}

#[tokio::test]
async fn download_renews_the_session() {
    let remote = MockRemote::start().await;
    let service = remote.service();
    let mut session = live_session("tok");

    let response = service.stream_download(&mut session, "paths/a/x.bin").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(session.auth_cookie.as_deref(), Some(RENEWED_COOKIE));
}

#[tokio::test]
async fn open_reports_upstream_metadata() {
    let remote = MockRemote::start().await;
    let relay = StreamRelay::new(&remote.config().remote).unwrap();
    let mut session = live_session("tok");

    let download = relay.open(&mut session, "paths/a/x.bin").await.unwrap();

    assert_eq!(download.filename, "x.bin");
    assert_eq!(download.content_type(), "text/csv");
    assert_eq!(download.content_length(), Some(FILE_BYTES.len() as u64));
}

#[tokio::test]
async fn download_body_is_forwarded_chunk_by_chunk() {
    let remote = MockRemote::start().await;
    let service = remote.service();
    let mut session = live_session("tok");

    let response = service
        .stream_download(&mut session, "paths/chunked/x.csv")
        .await;
    let mut stream = response.into_body().into_data_stream();

    let mut frames = 0;
    let mut received = Vec::new();
    while let Some(chunk) = stream.next().await {
        frames += 1;
        received.extend_from_slice(&chunk.unwrap());
    }
    assert!(frames > 1, "expected several frames, got {frames}");
    assert_eq!(received, CHUNKS.concat());
}

#[tokio::test]
async fn dropping_the_download_ends_the_upstream_transfer() {
    let remote = MockRemote::start().await;
    let service = remote.service();
    let mut session = live_session("tok");

    let response = service
        .stream_download(&mut session, "paths/endless/huge.bin")
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut stream = response.into_body().into_data_stream();
    let first = stream.next().await.unwrap().unwrap();
    assert!(!first.is_empty());
    drop(stream);

    tokio::time::timeout(Duration::from_secs(5), remote.wait_for_stream_drop())
        .await
        .expect("upstream body was not dropped");
}

#[tokio::test]
async fn unreachable_host_yields_one_error_response() {
    let service = RelayService::new(&common::config_for(UNREACHABLE_ENDPOINT)).unwrap();
    let mut session = live_session("tok");

    let response = service.stream_download(&mut session, "paths/a/x.bin").await;

    assert!(!response.status().is_success());
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    assert!(body_text(response).await.starts_with("Error downloading file: "));
}

#[tokio::test]
async fn expired_session_downloads_nothing() {
    let remote = MockRemote::start().await;
    let service = remote.service();
    let mut session = expired_session();

    let response = service.stream_download(&mut session, "paths/a/x.bin").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_text(response).await.contains("expired"));
    assert_eq!(remote.hits(), 0);
}

#[tokio::test]
async fn upstream_error_status_is_reported() {
    let remote = MockRemote::start().await;
    let service = remote.service();
    let mut session = live_session("tok");

    let response = service
        .stream_download(&mut session, "paths/missing/x.bin")
        .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(body_text(response).await.contains("404"));
}

#[tokio::test]
async fn foreign_absolute_urls_are_refused_before_connecting() {
    let remote = MockRemote::start().await;
    let relay = StreamRelay::new(&remote.config().remote).unwrap();
    let mut session = live_session("tok");

    let err = relay
        .open(&mut session, "https://elsewhere.example.com/file.bin")
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::InvalidUrl(_)));
    assert_eq!(remote.hits(), 0);
}

#[tokio::test]
async fn absolute_urls_on_the_remote_are_followed() {
    let remote = MockRemote::start().await;
    let relay = StreamRelay::new(&remote.config().remote).unwrap();
    let mut session = live_session("tok");

    let url = format!("{}/paths/deep/data.csv", remote.endpoint);
    let download = relay.open(&mut session, &url).await.unwrap();

    assert_eq!(download.filename, "data.csv");
}
