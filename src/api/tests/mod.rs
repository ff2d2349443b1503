use super::*;
use crate::engine::{FileBehavior, MemoryEngine, MemoryTorrent};
use crate::link::InfoHash;
use axum::body::Body;
use axum::http::Request;
use axum::http::StatusCode;
use axum::response::Response;
use base64::Engine as _;
use std::io::{Cursor, Read};
use std::time::Duration;
use tower::ServiceExt;


const HEX: &str = "c9e15763f722f23e98a29decdfae341b98d53056";
const OTHER_HEX: &str = "0123456789abcdef0123456789abcdef01234567";

fn hash(hex: &str) -> InfoHash {
    hex.parse().unwrap()
}

/// Engine plus router over it, with the given config tweaks
fn create_test_app(config: Config) -> (Arc<MemoryEngine>, Router) {
    let engine = Arc::new(MemoryEngine::new());
    let router = create_router(engine.clone(), Arc::new(config));
    (engine, router)
}

async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

/// Entries of a ZIP archive, in archive order
fn read_archive(bytes: Vec<u8>) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut entry = archive.by_index(i).unwrap();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            (entry.name().to_string(), data)
        })
        .collect()
}

/// Wait until the background export released every reader it opened
async fn wait_for_release(torrent: &MemoryTorrent) {
    for _ in 0..200 {
        if torrent.open_readers() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("readers still open: {}", torrent.open_readers());
}

#[tokio::test]
async fn test_api_server_serves_and_shuts_down() {
    let mut config = Config::default();
    config.api.bind_address = "127.0.0.1:0".parse().unwrap(); // Port 0 = OS assigns a free port

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(start_api_server_with_shutdown(
        Arc::new(MemoryEngine::new()),
        Arc::new(config),
        async move {
            rx.await.ok();
        },
    ));

    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should stop after shutdown signal")
        .unwrap();
    assert!(result.is_ok(), "server returned {result:?}");
}

#[tokio::test]
async fn test_api_server_rejects_invalid_config() {
    let mut config = Config::default();
    config.export.sink_buffer = 0;

    let result = start_api_server_with_shutdown(
        Arc::new(MemoryEngine::new()),
        Arc::new(config),
        async {},
    )
    .await;
    assert!(matches!(result, Err(crate::Error::Config { .. })));
}

#[tokio::test]
async fn test_cors_enabled() {
    let (_engine, app) = create_test_app(Config::default());

    let request = Request::builder()
        .uri("/api/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let mut config = Config::default();
    config.api.cors_enabled = false;
    let (_engine, app) = create_test_app(config);

    let request = Request::builder()
        .uri("/api/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be absent when CORS is disabled"
    );
}

#[tokio::test]
async fn test_basic_auth_guards_only_downloadzip() {
    let mut config = Config::default();
    config
        .api
        .accounts
        .insert("admin".to_string(), "hunter2".to_string());
    let (engine, app) = create_test_app(config);
    engine
        .add(MemoryTorrent::new(hash(HEX)).with_file("a.txt", b"a".to_vec()))
        .await;

    // Without credentials the export is refused
    let response = get(app.clone(), &format!("/api/downloadzip?hash={HEX}")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get("www-authenticate").unwrap(),
        auth::BASIC_REALM
    );

    // Health stays public
    let response = get(app.clone(), "/api/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    // With credentials the archive streams
    let credentials = base64::engine::general_purpose::STANDARD.encode("admin:hunter2");
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/downloadzip?hash={HEX}"))
                .header("Authorization", format!("Basic {credentials}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_archive(body_bytes(response).await).len(), 1);
}

#[tokio::test]
async fn test_failing_file_does_not_fail_response() {
    let (engine, app) = create_test_app(Config::default());
    let torrent = engine
        .add(
            MemoryTorrent::new(hash(HEX))
                .with_piece_size(2)
                .with_file_behavior("Pack/a.bin", b"abcdef".to_vec(), FileBehavior::FailAfter(2))
                .with_file("Pack/b.bin", b"bb".to_vec()),
        )
        .await;

    let response = get(app, &format!("/api/downloadzip?hash={HEX}")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let entries = read_archive(body_bytes(response).await);
    assert_eq!(
        entries,
        vec![
            ("Pack/a.bin".to_string(), b"ab".to_vec()),
            ("Pack/b.bin".to_string(), b"bb".to_vec()),
        ]
    );
    wait_for_release(&torrent).await;
}
