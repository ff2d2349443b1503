//! Application state for the API server

use crate::Config;
use crate::engine::TorrentEngine;
use crate::export::ArchiveExporter;
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// This struct is cloned for each request (cheap Arc clone) and provides
/// access to the torrent engine, the exporter and configuration.
#[derive(Clone)]
pub struct AppState {
    /// Engine that owns the torrents being exported
    pub engine: Arc<dyn TorrentEngine>,

    /// Exporter configured from `config.export`
    pub exporter: Arc<ArchiveExporter>,

    /// Configuration (read-only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(engine: Arc<dyn TorrentEngine>, config: Arc<Config>) -> Self {
        let exporter = Arc::new(ArchiveExporter::new(config.export.clone()));
        Self {
            engine,
            exporter,
            config,
        }
    }
}
