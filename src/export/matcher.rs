//! Reconciles the engine's file-status list with its addressable files.
//!
//! The two lists can disagree for a while after metadata arrives. A status entry
//! without a matching file is reported as [`Matched::Missing`] and the caller skips it.

use crate::engine::{FileRef, FileStat, TorrentHandle};

/// Outcome of looking one status entry up
#[derive(Debug)]
pub enum Matched<'s> {
    /// An addressable file with the same path exists
    Found(&'s FileStat, FileRef),
    /// No addressable file has this path
    Missing(&'s FileStat),
}

impl<'s> Matched<'s> {
    /// The status entry that was looked up
    pub fn stat(&self) -> &'s FileStat {
        match self {
            Matched::Found(stat, _) | Matched::Missing(stat) => *stat,
        }
    }
}

/// Looks status entries up against a borrowed handle
pub struct FileMatcher<'h> {
    handle: &'h dyn TorrentHandle,
}

impl<'h> FileMatcher<'h> {
    /// Matcher over `handle`'s file listing
    pub fn new(handle: &'h dyn TorrentHandle) -> Self {
        Self { handle }
    }

    /// Match a single status entry by exact path
    pub fn resolve<'s>(&self, stat: &'s FileStat) -> Matched<'s> {
        match self.handle.find_file(&stat.path) {
            Some(file) => Matched::Found(stat, file),
            None => Matched::Missing(stat),
        }
    }

    /// Match every status entry, lazily and in the given order
    pub fn resolve_all<'s>(
        &'s self,
        stats: &'s [FileStat],
    ) -> impl Iterator<Item = Matched<'s>> + 's {
        stats.iter().map(move |stat| self.resolve(stat))
    }
}
