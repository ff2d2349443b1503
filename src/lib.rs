//! # torrent-export
//!
//! HTTP export path for a torrent streaming server: every file of a torrent,
//! streamed to the client as one ZIP archive while pieces arrive from the swarm.
//!
//! ## Design Philosophy
//!
//! torrent-export is designed to be:
//! - **Engine-agnostic** - The torrent engine is reached through [`TorrentEngine`]
//! - **Streaming** - No temporary files; the archive is written as it is read
//! - **Best-effort** - One unreadable file never fails the whole archive
//! - **Library-first** - Embed the router in an existing server or run it standalone
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use torrent_export::{Config, MemoryEngine, MemoryTorrent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Arc::new(MemoryEngine::new());
//!     engine
//!         .add(
//!             MemoryTorrent::new("c9e15763f722f23e98a29decdfae341b98d53056".parse()?)
//!                 .with_title("Example")
//!                 .with_file("Example/readme.txt", b"hello".to_vec()),
//!         )
//!         .await;
//!
//!     // GET /api/downloadzip?hash=c9e15763f722f23e98a29decdfae341b98d53056
//!     torrent_export::run_with_shutdown(engine, Arc::new(Config::default())).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

use std::sync::Arc;

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Torrent engine boundary
pub mod engine;
/// Error types
pub mod error;
/// Streaming archive export
pub mod export;
/// Torrent reference parsing
pub mod link;

// Re-export commonly used types
pub use config::{ApiConfig, Config, ExportConfig};
pub use engine::{
    FileBehavior, FileRef, FileStat, MemoryEngine, MemoryTorrent, ReaderGuard, SequentialReader,
    TorrentEngine, TorrentHandle,
};
pub use error::{ApiError, EntryError, Error, ErrorDetail, Result, ToHttpStatus};
pub use export::{ArchiveExporter, ExportSummary, PreparedExport};
pub use link::{InfoHash, parse_link};

/// Helper function to run the API server with graceful signal handling.
///
/// Serves until a termination signal arrives, then drains open connections.
///
/// - **Unix:** listens for SIGTERM and SIGINT.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(engine: Arc<dyn TorrentEngine>, config: Arc<Config>) -> Result<()> {
    api::start_api_server_with_shutdown(engine, config, wait_for_signal()).await
}

/// Resolves once the process is asked to stop.
///
/// On unix that is SIGTERM or SIGINT. A signal whose handler cannot be
/// installed never fires, so the other one still ends the wait.
#[cfg(unix)]
pub(crate) async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    async fn delivered(kind: SignalKind, name: &'static str) -> &'static str {
        match signal(kind) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(signal = name, error = %e, "cannot install signal handler");
                std::future::pending::<()>().await;
            }
        }
        name
    }

    let name = tokio::select! {
        name = delivered(SignalKind::terminate(), "SIGTERM") => name,
        name = delivered(SignalKind::interrupt(), "SIGINT") => name,
    };
    tracing::info!(signal = name, "shutdown requested");
}

/// Resolves on Ctrl+C; if that cannot be observed the server runs until killed.
#[cfg(not(unix))]
pub(crate) async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!(signal = "ctrl-c", "shutdown requested");
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    #[tokio::test]
    async fn sigterm_ends_the_wait() {
        let waiting = tokio::spawn(super::wait_for_signal());
        // Let the handlers install before the signal is raised
        tokio::time::sleep(Duration::from_millis(100)).await;

        let sent = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status();
        if !sent.is_ok_and(|status| status.success()) {
            waiting.abort();
            return;
        }

        tokio::time::timeout(Duration::from_secs(5), waiting)
            .await
            .expect("SIGTERM should end the wait")
            .unwrap();
    }
}
