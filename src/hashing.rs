//! Content normalization and cache keys.
//!
//! Every logical image gets a 32-bit key derived from its normalized light-1x
//! source plus its file name. The key is fast (BLAKE3, truncated) and
//! therefore collision-prone by construction, so it is paired with an
//! independent SHA-256 checksum that decides whether a repeated key is the
//! same icon seen twice or a real collision.
//!
//! ## Normalization
//!
//! - `\r\n` and `\r` become `\n`
//! - each line is trimmed, empty lines dropped, lines concatenated
//! - a line not ending in `>` is followed by one space, so attributes split
//!   across lines do not run together
//! - `<!-- ... -->` comments are removed
//!
//! Files that differ only in formatting or comments therefore share a key.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::LazyLock;
use thiserror::Error;

static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment pattern is valid"));

#[derive(Error, Debug, PartialEq, Eq)]
pub enum HashError {
    #[error("Cache key {0:#010x} was already assigned in this run")]
    DuplicateKey(u32),
}

/// Normalize SVG/XML text for hashing.
pub fn normalize(content: &[u8]) -> Vec<u8> {
    let text = String::from_utf8_lossy(content);
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(unified.len());
    for line in unified.lines().map(str::trim).filter(|l| !l.is_empty()) {
        out.push_str(line);
        if !line.ends_with('>') {
            out.push(' ');
        }
    }
    COMMENT.replace_all(&out, "").into_owned().into_bytes()
}

/// Fast 32-bit key: the first four bytes of BLAKE3(content ‖ file name).
pub fn fast_key(normalized: &[u8], file_name: &str) -> u32 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(normalized);
    hasher.update(file_name.as_bytes());
    let digest = hasher.finalize();
    let bytes = digest.as_bytes();
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// SHA-256 of normalized content, as a hex string.
pub fn checksum(normalized: &[u8]) -> String {
    format!("{:x}", Sha256::digest(normalized))
}

pub type HashFn = fn(&[u8], &str) -> u32;

/// Run-scoped key generator that reports every repeated key.
///
/// It cannot tell a benign duplicate from a collision; callers decide with
/// [`checksum`].
pub struct KeyHasher {
    hash_fn: HashFn,
    seen: HashSet<u32>,
}

impl Default for KeyHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyHasher {
    pub fn new() -> Self {
        Self::with_hash_fn(fast_key)
    }

    pub fn with_hash_fn(hash_fn: HashFn) -> Self {
        Self {
            hash_fn,
            seen: HashSet::new(),
        }
    }

    /// Key for normalized content, registered in the guard set.
    pub fn hash(&mut self, normalized: &[u8], file_name: &str) -> Result<u32, HashError> {
        let key = (self.hash_fn)(normalized, file_name);
        if self.seen.insert(key) {
            Ok(key)
        } else {
            Err(HashError::DuplicateKey(key))
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ICON: &str = "<svg width=\"16\"\n     height=\"16\">\n  <path d=\"M0 0\"/>\n</svg>\n";

    #[test]
    fn normalize_joins_lines_and_separates_open_tags() {
        assert_eq!(
            normalize(ICON.as_bytes()),
            b"<svg width=\"16\" height=\"16\"><path d=\"M0 0\"/></svg>".to_vec()
        );
    }

    #[test]
    fn normalize_unifies_line_endings() {
        let crlf = ICON.replace('\n', "\r\n");
        let cr = ICON.replace('\n', "\r");
        assert_eq!(normalize(crlf.as_bytes()), normalize(ICON.as_bytes()));
        assert_eq!(normalize(cr.as_bytes()), normalize(ICON.as_bytes()));
    }

    #[test]
    fn normalize_strips_comments_across_lines() {
        let commented = "<svg>\n<!-- generated\n by tool -->\n<g/><!-- x -->\n</svg>";
        assert_eq!(normalize(commented.as_bytes()), b"<svg><g/></svg>".to_vec());
    }

    #[test]
    fn key_is_deterministic() {
        let n = normalize(ICON.as_bytes());
        assert_eq!(fast_key(&n, "close.svg"), fast_key(&n, "close.svg"));
    }

    #[test]
    fn key_mixes_in_file_name() {
        let n = normalize(ICON.as_bytes());
        assert_ne!(fast_key(&n, "close.svg"), fast_key(&n, "open.svg"));
    }

    #[test]
    fn checksum_is_sha256_hex() {
        let sum = checksum(b"<svg/>");
        assert_eq!(sum.len(), 64);
        assert_eq!(sum, checksum(b"<svg/>"));
        assert_ne!(sum, checksum(b"<svg></svg>"));
    }

    #[test]
    fn hasher_rejects_repeated_key() {
        let mut hasher = KeyHasher::new();
        let n = normalize(ICON.as_bytes());
        let key = hasher.hash(&n, "close.svg").unwrap();
        assert_eq!(hasher.hash(&n, "close.svg"), Err(HashError::DuplicateKey(key)));
        assert!(hasher.hash(&n, "open.svg").is_ok());
        assert_eq!(hasher.len(), 2);
    }

    #[test]
    fn stub_hash_fn_collides_everything() {
        let mut hasher = KeyHasher::with_hash_fn(|_, _| 7);
        assert_eq!(hasher.hash(b"a", "a.svg"), Ok(7));
        assert_eq!(hasher.hash(b"b", "b.svg"), Err(HashError::DuplicateKey(7)));
    }
}
