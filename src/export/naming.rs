//! Names for the archive and for entries inside it.

use crate::engine::TorrentHandle;

/// Characters that break file names or the quoted `Content-Disposition` filename
const ILLEGAL_NAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Extension of every exported archive; the body is always a ZIP stream
pub const ZIP_EXTENSION: &str = ".zip";

/// Pick the first non-empty of title, display name, info name and the hash, then sanitize it.
///
/// # Examples
///
/// ```
/// use torrent_export::export::naming::archive_name;
///
/// assert_eq!(archive_name("My:Movie", "", None, "deadbeef", ".zip"), "My_Movie.zip");
/// assert_eq!(archive_name("", "", None, "deadbeef", ".zip"), "deadbeef.zip");
/// ```
pub fn archive_name(
    title: &str,
    name: &str,
    info_name: Option<&str>,
    hash: &str,
    extension: &str,
) -> String {
    let chosen = [title, name, info_name.unwrap_or_default()]
        .into_iter()
        .find(|candidate| !candidate.is_empty())
        .unwrap_or(hash);
    sanitize_archive_name(chosen, extension)
}

/// [`archive_name`] fed from a torrent handle, always ending in [`ZIP_EXTENSION`]
pub fn archive_name_for(handle: &dyn TorrentHandle) -> String {
    let info_name = handle.info_name();
    archive_name(
        &handle.title(),
        &handle.name(),
        info_name.as_deref(),
        &handle.info_hash().to_hex_string(),
        ZIP_EXTENSION,
    )
}

/// Replace characters that are illegal in file names or header values with `_`
/// and append `extension` unless the name already ends with it (any case).
///
/// Applying this twice gives the same result as applying it once.
pub fn sanitize_archive_name(raw: &str, extension: &str) -> String {
    let mut name: String = raw
        .chars()
        .map(|c| {
            if ILLEGAL_NAME_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let extension = normalize_extension(extension);
    if !name.to_lowercase().ends_with(&extension.to_lowercase()) {
        name.push_str(&extension);
    }
    name
}

fn normalize_extension(extension: &str) -> String {
    format!(".{}", extension.trim_start_matches('.'))
}

/// Entry name for a torrent path: forward slashes, at most one leading slash removed.
pub fn entry_path(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    match normalized.strip_prefix('/') {
        Some(stripped) => stripped.to_string(),
        None => normalized,
    }
}
