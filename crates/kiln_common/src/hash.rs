//! Content hashing for content-addressed cache keys.

use std::fmt;
use std::io::{self, Read};

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::{xxh3_128, Xxh3};

/// A 128-bit XXH3 hash of an artifact's bytes.
///
/// Displays as 32 lowercase hex digits, most significant first, which is
/// also the form it takes as a [`CacheKey`](crate::CacheKey).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// Hashes a byte slice.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(xxh3_128(data).to_be_bytes())
    }

    /// Hashes everything `reader` yields, without buffering it whole.
    pub fn from_reader<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut hasher = Xxh3::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buf[..n]);
        }
        Ok(Self(hasher.digest128().to_be_bytes()))
    }

    /// Returns the raw hash bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = ContentHash::from_bytes(b"libfoo.a");
        let b = ContentHash::from_bytes(b"libfoo.a");
        assert_eq!(a, b);
    }

    #[test]
    fn different_inputs_differ() {
        let a = ContentHash::from_bytes(b"libfoo.a");
        let b = ContentHash::from_bytes(b"libbar.a");
        assert_ne!(a, b);
    }

    #[test]
    fn display_is_big_endian_hex() {
        let h = ContentHash::from_bytes(b"test");
        let s = h.to_string();
        assert_eq!(s.len(), 32);
        assert_eq!(s, format!("{:032x}", xxh3_128(b"test")));
    }

    #[test]
    fn reader_matches_slice() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let streamed = ContentHash::from_reader(data.as_slice()).unwrap();
        assert_eq!(streamed, ContentHash::from_bytes(&data));
    }

    #[test]
    fn empty_reader() {
        let h = ContentHash::from_reader(io::empty()).unwrap();
        assert_eq!(h, ContentHash::from_bytes(b""));
    }

    #[test]
    fn debug_abbreviated() {
        let h = ContentHash::from_bytes(b"test");
        let s = format!("{h:?}");
        assert!(s.starts_with("ContentHash("));
        assert!(s.ends_with("..)"));
    }

    #[test]
    fn serde_roundtrip() {
        let h = ContentHash::from_bytes(b"serde test");
        let json = serde_json::to_string(&h).unwrap();
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(h, back);
    }
}
