//! Common test utilities: a mock remote API and a wired-up relay app.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::connect_info::MockConnectInfo;
use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Json;
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use tokio::sync::{Mutex, Notify};

use rsrelay::config::Config;
use rsrelay::server::{self, AppState};
use rsrelay::service::RelayService;
use rsrelay::session::{InMemorySessionStore, Session, SessionStore};

/// Cookie value the mock hands out on renewing endpoints.
pub const RENEWED_COOKIE: &str = "renewed-token";
/// Expiry attached to [`RENEWED_COOKIE`].
pub const RENEWED_EXPIRES: &str = "Wed, 21 Oct 2099 07:28:00 GMT";
/// Bytes served for every download.
pub const FILE_BYTES: &[u8] = b"id,name\n1,cat\n2,dog\n";

/// Remote endpoint nothing listens on.
pub const UNREACHABLE_ENDPOINT: &str = "http://127.0.0.1:1/api/v1";

// ============================================================================
// Mock Remote API
// ============================================================================

#[derive(Clone, Default)]
struct MockState {
    base_url: Arc<String>,
    hits: Arc<AtomicUsize>,
    cookies: Arc<Mutex<Vec<String>>>,
    user_agents: Arc<Mutex<Vec<String>>>,
    queries: Arc<Mutex<Vec<String>>>,
    stream_dropped: Arc<Notify>,
}

/// A running mock of the remote API on an ephemeral port.
pub struct MockRemote {
    /// Remote API base URL, e.g. `http://127.0.0.1:PORT/api/v1`.
    pub endpoint: String,
    state: MockState,
}

impl MockRemote {
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let endpoint = format!("http://{addr}/api/v1");

        let state = MockState {
            base_url: Arc::new(endpoint.clone()),
            ..MockState::default()
        };

        let api = Router::new()
            .route("/ping", get(|| async { Json(json!({"pong": true})) }))
            .route("/renew", get(renew))
            .route("/fail", get(fail))
            .route("/partners", get(|| async { Json(json!([{"id": "p1"}, {"id": "p2"}])) }))
            .route("/partners/{id}", get(partner))
            .route("/partners/{id}/colls", get(partner_collections))
            .route("/colls/{id}", get(collection))
            .route("/users", axum::routing::patch(update_user))
            .route("/search", get(search))
            .route("/paths/{*rest}", get(paths))
            .with_state(state.clone());

        let app = Router::new()
            .nest("/api/v1", api)
            .layer(middleware::from_fn_with_state(state.clone(), record));

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { endpoint, state }
    }

    /// Requests the mock has received so far.
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub async fn cookies(&self) -> Vec<String> {
        self.state.cookies.lock().await.clone()
    }

    pub async fn user_agents(&self) -> Vec<String> {
        self.state.user_agents.lock().await.clone()
    }

    pub async fn queries(&self) -> Vec<String> {
        self.state.queries.lock().await.clone()
    }

    /// Wait until an endless download body has been dropped by the mock server.
    pub async fn wait_for_stream_drop(&self) {
        self.state.stream_dropped.notified().await;
    }

    pub fn config(&self) -> Config {
        config_for(&self.endpoint)
    }

    pub fn service(&self) -> RelayService {
        RelayService::new(&self.config()).unwrap()
    }
}

async fn record(State(state): State<MockState>, request: Request, next: Next) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let cookie = header_text(request.headers(), header::COOKIE);
    let user_agent = header_text(request.headers(), header::USER_AGENT);
    let query = request.uri().query().unwrap_or_default().to_string();

    state.cookies.lock().await.push(cookie);
    state.user_agents.lock().await.push(user_agent);
    state.queries.lock().await.push(query);
    next.run(request).await
}

fn header_text(headers: &HeaderMap, name: header::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn renewal_headers() -> [(header::HeaderName, String); 1] {
    [(
        header::SET_COOKIE,
        format!("Authorization={RENEWED_COOKIE}; Expires={RENEWED_EXPIRES}; Path=/; HttpOnly"),
    )]
}

async fn renew() -> impl IntoResponse {
    (renewal_headers(), Json(json!({"renewed": true})))
}

async fn fail() -> impl IntoResponse {
    (StatusCode::SERVICE_UNAVAILABLE, renewal_headers(), "down for maintenance")
}

async fn partner(Path(id): Path<String>) -> Response {
    if id == "missing" {
        return (StatusCode::NOT_FOUND, "no such partner").into_response();
    }
    Json(json!({"id": id, "name": format!("Partner {id}")})).into_response()
}

async fn partner_collections(Path(id): Path<String>) -> Json<Value> {
    Json(json!([{"id": format!("{id}-c1")}, {"id": format!("{id}-c2")}]))
}

async fn collection(State(state): State<MockState>, Path(id): Path<String>) -> Json<Value> {
    if id == "orphan" {
        return Json(json!({"id": id}));
    }
    Json(json!({
        "id": id,
        "partner_id": "p1",
        "storage_url": format!("{}/paths/{id}", state.base_url),
    }))
}

async fn update_user(Json(body): Json<Value>) -> Json<Value> {
    if body["current_password"] == "wrong" {
        return Json(json!({"error": "The provided password does not match your current password."}));
    }
    Json(json!({"updated": body}))
}

async fn search(
    State(state): State<MockState>,
    Query(params): Query<std::collections::HashMap<String, String>>,
) -> Response {
    let term = params.get("term").cloned().unwrap_or_default();
    let start: u64 = params
        .get("start")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    match term.as_str() {
        "none" => Json(json!({"response": {"numFound": 0}})).into_response(),
        "blank" => StatusCode::OK.into_response(),
        "broken" => "<html>oops</html>".into_response(),
        "wrongshape" => Json(json!({"response": {"numFound": "many"}})).into_response(),
        _ => Json(json!({
            "response": {
                "numFound": 25,
                "start": start,
                "docs": [{
                    "package_search_response": {
                        "id": "pkg-1",
                        "package_path_url": format!("{}/paths/pkg-1", state.base_url),
                        "match_path_url": format!("{}/paths/pkg-1/notes.txt", state.base_url),
                        "match_context": "The Cat sat"
                    }
                }]
            }
        }))
        .into_response(),
    }
}

async fn paths(
    State(state): State<MockState>,
    Path(rest): Path<String>,
    Query(params): Query<std::collections::HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if rest.starts_with("missing") {
        return (StatusCode::NOT_FOUND, "not here").into_response();
    }
    let download = params.get("download").map(String::as_str) == Some("true");
    if download && rest.starts_with("endless") {
        return (renewal_headers(), endless_body(Arc::clone(&state.stream_dropped))).into_response();
    }
    if download && rest.starts_with("chunked") {
        return (renewal_headers(), chunked_body()).into_response();
    }
    if download {
        let accept = headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        return (
            renewal_headers(),
            [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (header::CONTENT_LENGTH, FILE_BYTES.len().to_string()),
                (header::HeaderName::from_static("x-seen-accept"), accept),
            ],
            Body::from(FILE_BYTES),
        )
            .into_response();
    }
    let base = &state.base_url;
    Json(json!({
        "name": rest,
        "children": [
            {
                "name": "b.csv",
                "url": format!("{base}/paths/{rest}/b.csv"),
                "download_url": format!("{base}/paths/{rest}/b.csv")
            },
            {"name": "sub", "url": format!("{base}/paths/{rest}/sub")}
        ]
    }))
    .into_response()
}

/// Chunks served by `paths/chunked*` downloads, flushed one at a time.
pub const CHUNKS: [&[u8]; 3] = [b"id,name\n", b"1,cat\n", b"2,dog\n"];

const CHUNK_DELAY: std::time::Duration = std::time::Duration::from_millis(50);

fn chunked_body() -> Body {
    let stream = futures::stream::unfold(0usize, |i| async move {
        let chunk = CHUNKS.get(i)?;
        if i > 0 {
            tokio::time::sleep(CHUNK_DELAY).await;
        }
        Some((Ok::<_, std::convert::Infallible>(Bytes::from_static(*chunk)), i + 1))
    });
    Body::from_stream(stream)
}

/// Notifies once the stream holding it is dropped.
struct DropSignal(Arc<Notify>);

impl Drop for DropSignal {
    fn drop(&mut self) {
        self.0.notify_one();
    }
}

static FILLER: [u8; 1024] = [b'x'; 1024];

fn endless_body(dropped: Arc<Notify>) -> Body {
    let stream = futures::stream::unfold(DropSignal(dropped), |signal| async move {
        tokio::time::sleep(CHUNK_DELAY).await;
        Some((
            Ok::<_, std::convert::Infallible>(Bytes::from_static(&FILLER)),
            signal,
        ))
    });
    Body::from_stream(stream)
}

// ============================================================================
// Relay Fixtures
// ============================================================================

pub fn config_for(endpoint: &str) -> Config {
    let mut config = Config::default();
    config.remote.endpoint = endpoint.to_string();
    config
}

/// A session valid for another hour.
pub fn live_session(cookie: &str) -> Session {
    Session::established("rss_test", cookie, Utc::now() + Duration::hours(1))
}

/// A session whose cookie expired a minute ago.
pub fn expired_session() -> Session {
    Session::established("rss_test", "stale", Utc::now() - Duration::minutes(1))
}

/// Build the relay app against `endpoint`, seen from a loopback peer.
pub fn test_app_with(endpoint: &str, api_token: Option<&str>) -> (Router, AppState) {
    let relay = RelayService::new(&config_for(endpoint)).unwrap();
    let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let state = AppState::new(relay, sessions).with_api_token(api_token.map(str::to_owned));
    let app = server::build_app(state.clone(), 30)
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));
    (app, state)
}

pub fn test_app(endpoint: &str) -> (Router, AppState) {
    test_app_with(endpoint, None)
}

/// Store `session` under its id so HTTP requests can name it.
pub async fn store_session(state: &AppState, session: Session) {
    state.sessions.set(session).await;
}
