//! Streaming archive export
//!
//! An export runs in two phases:
//! 1. [`ArchiveExporter::prepare`] resolves the reference, waits for metadata and
//!    checks there is something to export. Failures here are still [`Error`]s and
//!    can become a status code.
//! 2. [`PreparedExport::write_to`] streams every file into a ZIP archive on the sink,
//!    one file at a time and in file-status order. Nothing here can fail the request
//!    any more: files that cannot be read are skipped or truncated, and a dead sink
//!    ends the export early.
//!
//! Entries are stored uncompressed and use data descriptors, so the sink only ever
//! sees sequential writes and the archive can be piped straight into a response.

pub mod matcher;
pub mod naming;

use crate::config::ExportConfig;
use crate::engine::{FileRef, FileStat, ReaderGuard, TorrentEngine, TorrentHandle};
use crate::error::{EntryError, Error, Result};
use crate::link::{InfoHash, parse_link};
use async_zip::base::write::EntryStreamWriter;
use async_zip::tokio::write::ZipFileWriter;
use async_zip::{Compression, ZipEntryBuilder};
use matcher::{FileMatcher, Matched};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;
use tokio_util::compat::Compat;
use tokio_util::io::ReaderStream;

/// What happened to one export, logged when it finishes
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    /// Entries written to the archive, including truncated ones
    pub entries: usize,
    /// Entries cut short by a read failure or read timeout
    pub truncated: usize,
    /// Files that got no entry at all
    pub skipped: usize,
    /// File bytes copied into entries
    pub bytes: u64,
    /// The sink stopped accepting writes before the archive was complete
    pub abandoned: bool,
}

/// Runs preflight for archive exports
#[derive(Clone, Debug, Default)]
pub struct ArchiveExporter {
    config: ExportConfig,
}

impl ArchiveExporter {
    /// Exporter using `config` for every export it prepares
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    /// Resolve `reference` and check the torrent can be exported.
    ///
    /// Waits for torrent metadata through [`TorrentHandle::is_ready`]; the engine
    /// decides how long that may take.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidReference`] if `reference` is not a hash or magnet link
    /// - [`Error::NotFound`] if the engine does not track the torrent
    /// - [`Error::MetadataTimeout`] if metadata never resolved
    /// - [`Error::NoFiles`] if the torrent lists no files
    pub async fn prepare(
        &self,
        engine: &dyn TorrentEngine,
        reference: &str,
    ) -> Result<PreparedExport> {
        let info_hash = parse_link(reference).inspect_err(|e| {
            tracing::warn!(reference = %reference, error = %e, "error parse link");
        })?;

        let handle = engine.get_torrent(&info_hash).await.ok_or_else(|| {
            tracing::warn!(%info_hash, "torrent not found");
            Error::NotFound(info_hash.to_string())
        })?;

        if !handle.is_ready().await {
            tracing::warn!(%info_hash, "torrent metadata did not resolve");
            return Err(Error::MetadataTimeout(info_hash.to_string()));
        }

        let stats = handle.file_stats();
        if stats.is_empty() {
            tracing::warn!(%info_hash, "no files in torrent");
            return Err(Error::NoFiles(info_hash.to_string()));
        }

        let archive_name = naming::archive_name_for(handle.as_ref());

        Ok(PreparedExport {
            info_hash,
            handle,
            stats,
            archive_name,
            config: self.config.clone(),
        })
    }
}

/// A torrent that passed preflight, ready to be streamed
pub struct PreparedExport {
    info_hash: InfoHash,
    handle: Arc<dyn TorrentHandle>,
    stats: Vec<FileStat>,
    archive_name: String,
    config: ExportConfig,
}

impl std::fmt::Debug for PreparedExport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedExport")
            .field("info_hash", &self.info_hash)
            .field("archive_name", &self.archive_name)
            .field("files", &self.stats.len())
            .finish_non_exhaustive()
    }
}

impl PreparedExport {
    /// Sanitized file name offered to the client
    pub fn archive_name(&self) -> &str {
        &self.archive_name
    }

    /// Info hash of the exported torrent
    pub fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    /// File-status entries the export will walk, in archive order
    pub fn files(&self) -> &[FileStat] {
        &self.stats
    }

    /// Stream the archive through an in-memory pipe.
    ///
    /// The export runs on its own task and writes into a pipe of `sink_buffer`
    /// bytes. The returned stream yields the archive as it is produced. Dropping the
    /// stream makes the task's next write fail, which abandons the export.
    pub fn into_stream(self) -> (ReaderStream<DuplexStream>, JoinHandle<ExportSummary>) {
        let (sink, source) = tokio::io::duplex(self.config.sink_buffer.max(1));
        let task = tokio::spawn(self.write_to(sink));
        (ReaderStream::new(source), task)
    }

    /// Write the whole archive into `sink` and shut it down.
    ///
    /// Never fails: per-file problems are logged and counted in the summary.
    pub async fn write_to<W>(self, sink: W) -> ExportSummary
    where
        W: AsyncWrite + Unpin + Send,
    {
        let info_hash = self.info_hash;
        tracing::info!(
            %info_hash,
            archive = %self.archive_name,
            files = self.stats.len(),
            "export started"
        );

        let mut writer = ZipFileWriter::with_tokio(sink);
        let mut buf = vec![0u8; self.config.effective_chunk_size()];
        let mut summary = ExportSummary::default();
        let matcher = FileMatcher::new(self.handle.as_ref());

        for matched in matcher.resolve_all(&self.stats) {
            let stat = matched.stat();
            let file = match matched {
                Matched::Found(_, file) => Some(file),
                Matched::Missing(_) => None,
            };

            match self.write_entry(&mut writer, stat, file, &mut buf).await {
                Ok(written) => {
                    summary.entries += 1;
                    summary.bytes += written;
                    tracing::debug!(%info_hash, path = %stat.path, bytes = written, "entry written");
                }
                Err(EntryError::Write(e)) => {
                    tracing::debug!(
                        %info_hash,
                        path = %stat.path,
                        error = %e,
                        "client went away, abandoning export"
                    );
                    summary.abandoned = true;
                    break;
                }
                Err(e) => {
                    match e.partial_bytes() {
                        Some(written) => {
                            summary.entries += 1;
                            summary.truncated += 1;
                            summary.bytes += written;
                        }
                        None => summary.skipped += 1,
                    }
                    tracing::warn!(%info_hash, path = %stat.path, error = %e, "file not fully exported");
                }
            }
        }

        if !summary.abandoned {
            if let Err(e) = finish(writer).await {
                tracing::debug!(%info_hash, error = %e, "archive trailer not delivered");
                summary.abandoned = true;
            }
        }

        tracing::info!(
            %info_hash,
            entries = summary.entries,
            truncated = summary.truncated,
            skipped = summary.skipped,
            bytes = summary.bytes,
            abandoned = summary.abandoned,
            "export finished"
        );
        summary
    }

    /// Copy one file into a new entry and return the bytes copied.
    ///
    /// The reader is released before this returns, whatever the outcome.
    async fn write_entry<W>(
        &self,
        writer: &mut ZipFileWriter<W>,
        stat: &FileStat,
        file: Option<FileRef>,
        buf: &mut [u8],
    ) -> std::result::Result<u64, EntryError>
    where
        W: AsyncWrite + Unpin,
    {
        let file = file.ok_or(EntryError::NotMatched)?;
        let mut guard =
            ReaderGuard::open(self.handle.as_ref(), &file).ok_or(EntryError::ReaderUnavailable)?;

        let builder = ZipEntryBuilder::new(naming::entry_path(&stat.path).into(), Compression::Stored);
        let mut entry = writer
            .write_entry_stream(builder)
            .await
            .map_err(classify_zip_error)?;

        let copied = copy_chunks(guard.reader(), &mut entry, buf, self.config.read_timeout).await;
        if let Err(EntryError::Write(_)) = copied {
            return copied;
        }

        // A failed read still closes the entry so the archive stays well-formed
        entry
            .close()
            .await
            .map_err(|e| EntryError::Write(std::io::Error::other(e)))?;
        copied
    }
}

/// Pump `reader` into `entry` until EOF, one chunk at a time
async fn copy_chunks<R, W>(
    reader: &mut R,
    entry: &mut EntryStreamWriter<'_, Compat<W>>,
    buf: &mut [u8],
    read_timeout: Option<Duration>,
) -> std::result::Result<u64, EntryError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;
    loop {
        let read = reader.read(buf);
        let read = match read_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| EntryError::ReadTimeout { written })?,
            None => read.await,
        };
        let n = read.map_err(|source| EntryError::Read { written, source })?;
        if n == 0 {
            return Ok(written);
        }

        futures::AsyncWriteExt::write_all(&mut *entry, &buf[..n])
            .await
            .map_err(EntryError::Write)?;
        written += n as u64;
    }
}

/// Write the central directory and shut the sink down
async fn finish<W>(writer: ZipFileWriter<W>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut sink = writer
        .close()
        .await
        .map_err(std::io::Error::other)?
        .into_inner();
    sink.shutdown().await
}

/// An entry header the sink could not take is a dead sink; anything else is the entry's fault
fn classify_zip_error(e: async_zip::error::ZipError) -> EntryError {
    let sink_failed = std::error::Error::source(&e)
        .is_some_and(|source| source.downcast_ref::<std::io::Error>().is_some());
    if sink_failed {
        EntryError::Write(std::io::Error::other(e))
    } else {
        EntryError::CreateEntry(e)
    }
}
