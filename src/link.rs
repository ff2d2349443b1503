//! Torrent reference parsing
//!
//! Turns whatever the client sent as `hash` into an [`InfoHash`]. Accepted forms:
//! - 40 hex characters (`c9e15763f722f23e98a29decdfae341b98d53056`)
//! - 32 base32 characters (`ZHQVOY7XELZD5GFCTXWN7LRUDOMNKMCW`)
//! - a magnet URI whose `xt=urn:btih:` carries either of the above
//!
//! Parsing is pure: no `.torrent` file is fetched or read.

use crate::error::{Error, Result};
use data_encoding::BASE32;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Length of a v1 info hash in bytes
pub const INFO_HASH_BYTES_LEN: usize = 20;

const HEX_LEN: usize = INFO_HASH_BYTES_LEN * 2;
const BASE32_LEN: usize = 32;
const BTIH_PREFIX: &str = "urn:btih:";

/// BitTorrent v1 info hash identifying a torrent's content
#[derive(PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub struct InfoHash(pub [u8; INFO_HASH_BYTES_LEN]);

impl InfoHash {
    /// Returns the internal byte array
    #[must_use]
    pub fn bytes(&self) -> [u8; INFO_HASH_BYTES_LEN] {
        self.0
    }

    /// Lowercase hex form, the canonical string used by the engine
    #[must_use]
    pub fn to_hex_string(&self) -> String {
        hex::encode(self.0)
    }

    fn from_hex(s: &str) -> Result<Self> {
        let mut bytes = [0u8; INFO_HASH_BYTES_LEN];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| Error::invalid_reference(format!("invalid hex info hash: {e}")))?;
        Ok(Self(bytes))
    }

    fn from_base32(s: &str) -> Result<Self> {
        let decoded = BASE32
            .decode(s.to_ascii_uppercase().as_bytes())
            .map_err(|e| Error::invalid_reference(format!("invalid base32 info hash: {e}")))?;
        let bytes: [u8; INFO_HASH_BYTES_LEN] = decoded.try_into().map_err(|v: Vec<u8>| {
            Error::invalid_reference(format!(
                "base32 info hash decoded to {} bytes, expected {INFO_HASH_BYTES_LEN}",
                v.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Parse a bare hash in hex or base32 form
    fn from_encoded(s: &str) -> Result<Self> {
        match s.len() {
            HEX_LEN => Self::from_hex(s),
            BASE32_LEN => Self::from_base32(s),
            len => Err(Error::invalid_reference(format!(
                "info hash has {len} characters, expected {HEX_LEN} (hex) or {BASE32_LEN} (base32)"
            ))),
        }
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex_string())
    }
}

impl fmt::Debug for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InfoHash({self})")
    }
}

impl FromStr for InfoHash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_link(s)
    }
}

impl From<[u8; INFO_HASH_BYTES_LEN]> for InfoHash {
    fn from(val: [u8; INFO_HASH_BYTES_LEN]) -> Self {
        InfoHash(val)
    }
}

impl Serialize for InfoHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex_string())
    }
}

/// Resolve a torrent reference into its info hash.
///
/// # Errors
///
/// Returns [`Error::InvalidReference`] when the token is neither a bare hash nor a
/// magnet URI carrying a `btih` exact topic.
///
/// # Examples
///
/// ```
/// use torrent_export::link::parse_link;
///
/// let hash = parse_link("magnet:?xt=urn:btih:C9E15763F722F23E98A29DECDFAE341B98D53056&dn=x").unwrap();
/// assert_eq!(hash.to_string(), "c9e15763f722f23e98a29decdfae341b98d53056");
/// ```
pub fn parse_link(token: &str) -> Result<InfoHash> {
    let token = token.trim();
    if token.is_empty() {
        return Err(Error::invalid_reference("empty reference"));
    }

    if token
        .get(..7)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("magnet:"))
    {
        return parse_magnet(token);
    }

    InfoHash::from_encoded(token)
}

fn parse_magnet(uri: &str) -> Result<InfoHash> {
    let url = url::Url::parse(uri)
        .map_err(|e| Error::invalid_reference(format!("invalid magnet link: {e}")))?;

    let mut saw_topic = false;
    for (key, value) in url.query_pairs() {
        // multi-topic magnets number their parameters: xt.1, xt.2, ...
        if key != "xt" && !key.starts_with("xt.") {
            continue;
        }
        saw_topic = true;
        if let Some(encoded) = value
            .get(..BTIH_PREFIX.len())
            .filter(|prefix| prefix.eq_ignore_ascii_case(BTIH_PREFIX))
            .and_then(|_| value.get(BTIH_PREFIX.len()..))
        {
            return InfoHash::from_encoded(encoded);
        }
    }

    if saw_topic {
        Err(Error::invalid_reference(
            "magnet link has no urn:btih exact topic",
        ))
    } else {
        Err(Error::invalid_reference("magnet link has no exact topic"))
    }
}
