//! REST API server over an in-memory engine
//!
//! Serves two fake torrents whose pieces trickle in slowly, so the archive can be
//! watched streaming in a browser or with curl.
//!
//! After starting, you can:
//! - Download a ZIP via GET http://localhost:8090/api/downloadzip?hash=c9e15763f722f23e98a29decdfae341b98d53056
//! - Try a magnet link via GET http://localhost:8090/api/downloadzip?hash=magnet%3A%3Fxt%3Durn%3Abtih%3A0123456789abcdef0123456789abcdef01234567
//! - Read the API description via GET http://localhost:8090/api/openapi.json
//!
//! Set `RUST_LOG=torrent_export=debug` to see per-entry logging.

use std::sync::Arc;
use std::time::Duration;
use torrent_export::{Config, FileBehavior, MemoryEngine, MemoryTorrent, run_with_shutdown};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let engine = Arc::new(MemoryEngine::new());

    engine
        .add(
            MemoryTorrent::new("c9e15763f722f23e98a29decdfae341b98d53056".parse()?)
                .with_title("Big Buck Bunny: Extras")
                .with_piece_delay(Duration::from_millis(20))
                .with_file("Big Buck Bunny/trailer.mp4", vec![0x42; 2 * 1024 * 1024])
                .with_file("Big Buck Bunny/poster.jpg", vec![0xFF; 300 * 1024])
                .with_file("Big Buck Bunny/readme.txt", b"Blender Foundation".to_vec()),
        )
        .await;

    engine
        .add(
            MemoryTorrent::new("0123456789abcdef0123456789abcdef01234567".parse()?)
                .with_name("flaky-pack")
                .with_file("flaky-pack/ok.txt", b"fine".to_vec())
                .with_file_behavior(
                    "flaky-pack/broken.bin",
                    vec![1u8; 64 * 1024],
                    FileBehavior::FailAfter(20 * 1024),
                )
                .with_file("flaky-pack/also-ok.txt", b"still fine".to_vec()),
        )
        .await;

    let mut config = Config::default();
    config.export.read_timeout = Some(Duration::from_secs(30));

    // Serves until Ctrl+C or SIGTERM
    run_with_shutdown(engine, Arc::new(config)).await?;

    Ok(())
}
