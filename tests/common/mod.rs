//! Common test utilities for torrent-export end-to-end tests

use std::io::{Cursor, Read};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use torrent_export::{Config, MemoryEngine, MemoryTorrent, api::create_router};

/// A server bound to an ephemeral port, aborted on drop
pub struct TestServer {
    pub addr: SocketAddr,
    pub engine: Arc<MemoryEngine>,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Serve a fresh [`MemoryEngine`] with `config`
    pub async fn start(config: Config) -> Self {
        let engine = Arc::new(MemoryEngine::new());
        let app = create_router(engine.clone(), Arc::new(config));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, engine, task }
    }

    /// Absolute URL of the export route for `hash`
    pub fn downloadzip_url(&self, hash: &str) -> String {
        format!("http://{}/api/downloadzip?hash={hash}", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Entries of a ZIP archive, in archive order
#[allow(dead_code)]
pub fn read_archive(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
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

/// Poll until every reader of `torrent` has been released
#[allow(dead_code)]
pub async fn wait_for_release(torrent: &MemoryTorrent) {
    for _ in 0..400 {
        if torrent.open_readers() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("readers still open: {}", torrent.open_readers());
}

/// Deterministic file contents that differ per file
#[allow(dead_code)]
pub fn payload(seed: u8, len: usize) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add((i % 251) as u8)).collect()
}
