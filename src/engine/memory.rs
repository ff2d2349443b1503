//! In-process torrent engine.
//!
//! Serves file contents from memory in piece-sized chunks, optionally pausing between
//! pieces the way a swarm download would. Individual files can be made unavailable,
//! fail part way through, or stall forever, which is what the exporter's best-effort
//! handling needs to be exercised against.

use super::{FileRef, FileStat, SequentialReader, TorrentEngine, TorrentHandle};
use crate::link::InfoHash;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::io::StreamReader;

const DEFAULT_PIECE_SIZE: usize = 16 * 1024;

/// How a file responds once a reader is requested
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FileBehavior {
    /// All bytes are delivered
    #[default]
    Available,
    /// The engine refuses to open a reader
    Unavailable,
    /// The first `n` bytes arrive, then the reader errors
    FailAfter(usize),
    /// No byte ever arrives
    Stall,
}

#[derive(Debug)]
struct MemoryFile {
    path: String,
    data: Bytes,
    behavior: FileBehavior,
    addressable: bool,
}

#[derive(Debug, Default)]
struct ReaderCounters {
    opened: AtomicUsize,
    released: AtomicUsize,
    open: AtomicUsize,
    peak: AtomicUsize,
}

/// A torrent whose contents live in memory
#[derive(Debug)]
pub struct MemoryTorrent {
    hash: InfoHash,
    title: String,
    name: String,
    info_name: Option<String>,
    ready: bool,
    files: Vec<MemoryFile>,
    piece_size: usize,
    piece_delay: Option<Duration>,
    counters: ReaderCounters,
}

impl MemoryTorrent {
    /// Ready torrent with no files and no names
    pub fn new(hash: InfoHash) -> Self {
        Self {
            hash,
            title: String::new(),
            name: String::new(),
            info_name: None,
            ready: true,
            files: Vec::new(),
            piece_size: DEFAULT_PIECE_SIZE,
            piece_delay: None,
            counters: ReaderCounters::default(),
        }
    }

    /// Set the user-assigned title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the info-dictionary name
    pub fn with_info_name(mut self, name: impl Into<String>) -> Self {
        self.info_name = Some(name.into());
        self
    }

    /// Metadata never resolves
    pub fn not_ready(mut self) -> Self {
        self.ready = false;
        self
    }

    /// Add a fully available file
    pub fn with_file(self, path: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.with_file_behavior(path, data, FileBehavior::Available)
    }

    /// Add a file with a specific reader behaviour
    pub fn with_file_behavior(
        mut self,
        path: impl Into<String>,
        data: impl Into<Bytes>,
        behavior: FileBehavior,
    ) -> Self {
        self.files.push(MemoryFile {
            path: path.into(),
            data: data.into(),
            behavior,
            addressable: true,
        });
        self
    }

    /// Add a file that shows up in the status list but has no addressable handle
    pub fn with_status_only(mut self, path: impl Into<String>, length: usize) -> Self {
        self.files.push(MemoryFile {
            path: path.into(),
            data: Bytes::from(vec![0u8; length]),
            behavior: FileBehavior::Available,
            addressable: false,
        });
        self
    }

    /// Bytes delivered per piece (default 16 KiB)
    pub fn with_piece_size(mut self, piece_size: usize) -> Self {
        self.piece_size = piece_size.max(1);
        self
    }

    /// Wait this long before each piece is delivered
    pub fn with_piece_delay(mut self, delay: Duration) -> Self {
        self.piece_delay = Some(delay);
        self
    }

    /// Readers currently open
    pub fn open_readers(&self) -> usize {
        self.counters.open.load(Ordering::SeqCst)
    }

    /// Readers opened over this torrent's lifetime
    pub fn readers_opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    /// Readers released over this torrent's lifetime
    pub fn readers_released(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }

    /// Highest number of readers that were open at the same time
    pub fn peak_open_readers(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }

    fn pieces(&self, data: &Bytes) -> Vec<std::io::Result<Bytes>> {
        (0..data.len())
            .step_by(self.piece_size)
            .map(|start| Ok(data.slice(start..(start + self.piece_size).min(data.len()))))
            .collect()
    }

    fn piece_stream(&self, file: &MemoryFile) -> BoxStream<'static, std::io::Result<Bytes>> {
        let pieces = match file.behavior {
            FileBehavior::Stall => return stream::pending().boxed(),
            FileBehavior::FailAfter(n) => {
                let mut pieces = self.pieces(&file.data.slice(..n.min(file.data.len())));
                pieces.push(Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "peer connection reset while fetching piece",
                )));
                pieces
            }
            FileBehavior::Available | FileBehavior::Unavailable => self.pieces(&file.data),
        };

        match self.piece_delay {
            Some(delay) => stream::iter(pieces)
                .then(move |piece| async move {
                    tokio::time::sleep(delay).await;
                    piece
                })
                .boxed(),
            None => stream::iter(pieces).boxed(),
        }
    }
}

#[async_trait]
impl TorrentHandle for MemoryTorrent {
    fn info_hash(&self) -> InfoHash {
        self.hash
    }

    async fn is_ready(&self) -> bool {
        self.ready
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn info_name(&self) -> Option<String> {
        if self.ready {
            self.info_name.clone()
        } else {
            None
        }
    }

    fn file_stats(&self) -> Vec<FileStat> {
        if !self.ready {
            return Vec::new();
        }
        self.files
            .iter()
            .enumerate()
            .map(|(index, file)| FileStat {
                id: index + 1,
                path: file.path.clone(),
                length: file.data.len() as i64,
            })
            .collect()
    }

    fn files(&self) -> Vec<FileRef> {
        self.files
            .iter()
            .enumerate()
            .filter(|(_, file)| file.addressable)
            .map(|(index, file)| FileRef {
                index,
                path: file.path.clone(),
                length: file.data.len() as u64,
            })
            .collect()
    }

    fn open_reader(&self, file: &FileRef) -> Option<SequentialReader> {
        let entry = self.files.get(file.index).filter(|f| f.addressable)?;
        if entry.behavior == FileBehavior::Unavailable {
            return None;
        }

        let reader: SequentialReader = Box::pin(StreamReader::new(self.piece_stream(entry)));

        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        let open = self.counters.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(open, Ordering::SeqCst);
        tracing::trace!(info_hash = %self.hash, path = %file.path, "reader opened");

        Some(reader)
    }

    fn release(&self, reader: SequentialReader) {
        drop(reader);
        self.counters.released.fetch_add(1, Ordering::SeqCst);
        self.counters.open.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(info_hash = %self.hash, "reader released");
    }
}

/// Engine holding [`MemoryTorrent`]s keyed by info hash
#[derive(Default)]
pub struct MemoryEngine {
    torrents: RwLock<HashMap<InfoHash, Arc<MemoryTorrent>>>,
}

impl MemoryEngine {
    /// Empty engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a torrent, replacing any torrent with the same hash.
    ///
    /// The returned handle shares state with the engine's copy, so reader counters
    /// can be inspected after an export.
    pub async fn add(&self, torrent: MemoryTorrent) -> Arc<MemoryTorrent> {
        let torrent = Arc::new(torrent);
        self.torrents
            .write()
            .await
            .insert(torrent.hash, torrent.clone());
        torrent
    }

    /// Stop tracking a torrent
    pub async fn remove(&self, hash: &InfoHash) -> Option<Arc<MemoryTorrent>> {
        self.torrents.write().await.remove(hash)
    }
}

#[async_trait]
impl TorrentEngine for MemoryEngine {
    async fn get_torrent(&self, hash: &InfoHash) -> Option<Arc<dyn TorrentHandle>> {
        let torrent: Arc<dyn TorrentHandle> = self.torrents.read().await.get(hash).cloned()?;
        Some(torrent)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn hash() -> InfoHash {
        "c9e15763f722f23e98a29decdfae341b98d53056".parse().unwrap()
    }

    async fn read_all(torrent: &MemoryTorrent, path: &str) -> std::io::Result<Vec<u8>> {
        let file = torrent.find_file(path).unwrap();
        let mut reader = torrent.open_reader(&file).unwrap();
        let mut out = Vec::new();
        let result = reader.read_to_end(&mut out).await.map(|_| out);
        torrent.release(reader);
        result
    }

    #[tokio::test]
    async fn delivers_bytes_across_pieces() {
        let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let torrent = MemoryTorrent::new(hash())
            .with_piece_size(1000)
            .with_file("big.bin", data.clone());

        assert_eq!(read_all(&torrent, "big.bin").await.unwrap(), data);
    }

    #[tokio::test]
    async fn fail_after_delivers_prefix_then_errors() {
        let torrent = MemoryTorrent::new(hash())
            .with_piece_size(4)
            .with_file_behavior("f", b"0123456789".to_vec(), FileBehavior::FailAfter(6));

        let file = torrent.find_file("f").unwrap();
        let mut reader = torrent.open_reader(&file).unwrap();
        let mut buf = [0u8; 16];
        let mut got = Vec::new();
        let err = loop {
            match reader.read(&mut buf).await {
                Ok(0) => panic!("reader should fail before EOF"),
                Ok(n) => got.extend_from_slice(&buf[..n]),
                Err(e) => break e,
            }
        };
        torrent.release(reader);

        assert_eq!(got, b"012345");
        assert_eq!(err.kind(), std::io::ErrorKind::ConnectionReset);
    }

    #[tokio::test]
    async fn unavailable_files_do_not_open_readers() {
        let torrent = MemoryTorrent::new(hash()).with_file_behavior(
            "f",
            b"x".to_vec(),
            FileBehavior::Unavailable,
        );
        let file = torrent.find_file("f").unwrap();
        assert!(torrent.open_reader(&file).is_none());
        assert_eq!(torrent.readers_opened(), 0);
    }

    #[tokio::test]
    async fn status_only_files_are_listed_but_not_addressable() {
        let torrent = MemoryTorrent::new(hash())
            .with_file("a", b"a".to_vec())
            .with_status_only("ghost", 42);

        let stats = torrent.file_stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[1].path, "ghost");
        assert_eq!(stats[1].length, 42);
        assert_eq!(stats[1].id, 2);
        assert!(torrent.find_file("ghost").is_none());
        assert_eq!(torrent.files().len(), 1);
    }

    #[tokio::test]
    async fn unready_torrent_reports_no_metadata() {
        let torrent = MemoryTorrent::new(hash())
            .with_info_name("Named")
            .with_file("a", b"a".to_vec())
            .not_ready();

        assert!(!torrent.is_ready().await);
        assert!(torrent.file_stats().is_empty());
        assert!(torrent.info_name().is_none());
    }

    #[tokio::test]
    async fn stalled_reader_never_yields() {
        let torrent =
            MemoryTorrent::new(hash()).with_file_behavior("s", b"x".to_vec(), FileBehavior::Stall);
        let file = torrent.find_file("s").unwrap();
        let mut reader = torrent.open_reader(&file).unwrap();
        let mut buf = [0u8; 1];

        let result =
            tokio::time::timeout(Duration::from_millis(20), reader.read(&mut buf)).await;
        assert!(result.is_err(), "stalled reader must not complete");
        torrent.release(reader);
    }

    #[tokio::test]
    async fn counters_track_open_and_peak() {
        let torrent = MemoryTorrent::new(hash())
            .with_file("a", b"a".to_vec())
            .with_file("b", b"b".to_vec());
        let a = torrent.find_file("a").unwrap();
        let b = torrent.find_file("b").unwrap();

        let ra = torrent.open_reader(&a).unwrap();
        let rb = torrent.open_reader(&b).unwrap();
        assert_eq!(torrent.open_readers(), 2);
        torrent.release(ra);
        torrent.release(rb);

        assert_eq!(torrent.open_readers(), 0);
        assert_eq!(torrent.peak_open_readers(), 2);
        assert_eq!(torrent.readers_opened(), 2);
        assert_eq!(torrent.readers_released(), 2);
    }

    #[tokio::test]
    async fn engine_lookup_by_hash() {
        let engine = MemoryEngine::new();
        engine.add(MemoryTorrent::new(hash()).with_title("T")).await;

        let handle = engine.get_torrent(&hash()).await.unwrap();
        assert_eq!(handle.title(), "T");
        assert_eq!(handle.info_hash(), hash());

        let other: InfoHash = "0000000000000000000000000000000000000000".parse().unwrap();
        assert!(engine.get_torrent(&other).await.is_none());

        engine.remove(&hash()).await;
        assert!(engine.get_torrent(&hash()).await.is_none());
    }
}
