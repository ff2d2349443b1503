//! Boundary to the torrent engine.
//!
//! The engine owns swarm state; this crate only borrows it through the traits below:
//! - [`TorrentEngine`] looks a live torrent up by info hash
//! - [`TorrentHandle`] exposes readiness, file listings and sequential readers
//! - [`ReaderGuard`] releases a reader back to its handle when dropped
//!
//! [`memory::MemoryEngine`] is an in-process implementation that simulates pieces
//! trickling in from peers.

use crate::link::InfoHash;
use async_trait::async_trait;
use serde::Serialize;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::AsyncRead;
use utoipa::ToSchema;

pub mod memory;

pub use memory::{FileBehavior, MemoryEngine, MemoryTorrent};

/// In-order byte source for one torrent file.
///
/// Reads may wait while the engine fetches missing pieces from the swarm.
pub type SequentialReader = Pin<Box<dyn AsyncRead + Send>>;

/// One file of a torrent as the engine currently reports it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct FileStat {
    /// 1-based position in the torrent's file list
    pub id: usize,
    /// Path inside the torrent, including the torrent's root folder
    pub path: String,
    /// File size in bytes
    pub length: i64,
}

/// Addressable handle to one file inside a torrent
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRef {
    /// Engine-specific index into the torrent's file table
    pub index: usize,
    /// Path inside the torrent
    pub path: String,
    /// File size in bytes
    pub length: u64,
}

/// Lookup of live torrent sessions
#[async_trait]
pub trait TorrentEngine: Send + Sync {
    /// Torrent currently tracked for `hash`, or None if the engine does not know it
    async fn get_torrent(&self, hash: &InfoHash) -> Option<Arc<dyn TorrentHandle>>;
}

/// A live torrent session owned by the engine
#[async_trait]
pub trait TorrentHandle: Send + Sync {
    /// Info hash of this torrent
    fn info_hash(&self) -> InfoHash;

    /// Wait for torrent metadata.
    ///
    /// Returns false when the engine gave up; the engine owns the timeout policy.
    async fn is_ready(&self) -> bool;

    /// User-assigned title, empty if none
    fn title(&self) -> String;

    /// Display name, empty if none
    fn name(&self) -> String;

    /// Name from the torrent's info dictionary, if metadata is present
    fn info_name(&self) -> Option<String>;

    /// Current file list, in engine order
    fn file_stats(&self) -> Vec<FileStat>;

    /// Authoritative list of addressable files
    fn files(&self) -> Vec<FileRef>;

    /// Find an addressable file by exact path
    fn find_file(&self, path: &str) -> Option<FileRef> {
        self.files().into_iter().find(|file| file.path == path)
    }

    /// Open a sequential reader for `file`, or None if the engine cannot serve it
    fn open_reader(&self, file: &FileRef) -> Option<SequentialReader>;

    /// Return a reader to the engine. Every opened reader is released exactly once.
    fn release(&self, reader: SequentialReader);
}

/// Scoped reader: released back to its handle on drop, whatever path the caller takes.
pub struct ReaderGuard<'a> {
    handle: &'a dyn TorrentHandle,
    reader: Option<SequentialReader>,
}

impl<'a> ReaderGuard<'a> {
    /// Open a reader for `file`; None if the engine cannot serve it
    pub fn open(handle: &'a dyn TorrentHandle, file: &FileRef) -> Option<Self> {
        let reader = handle.open_reader(file)?;
        Some(Self {
            handle,
            reader: Some(reader),
        })
    }

    /// Borrow the underlying reader
    pub fn reader(&mut self) -> &mut SequentialReader {
        // Only Drop takes the reader out
        self.reader
            .as_mut()
            .unwrap_or_else(|| unreachable!("reader taken before drop"))
    }
}

impl Drop for ReaderGuard<'_> {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            self.handle.release(reader);
        }
    }
}
