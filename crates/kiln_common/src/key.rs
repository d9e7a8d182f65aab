//! Cache keys naming stored build artifacts.

use std::fmt;
use std::str::FromStr;

use crate::hash::ContentHash;

/// File name suffix reserved for the metadata half of a cache entry.
pub const METADATA_SUFFIX: &str = ".metadata";

/// File name suffix reserved for in-flight temporary files.
pub const TEMP_SUFFIX: &str = ".tmp";

/// An opaque, content-derived identifier for one build artifact.
///
/// A key doubles as a file name inside the cache root, so construction
/// rejects anything that could escape the directory or collide with the
/// names the cache reserves for metadata and temporary files. Beyond that
/// the string is treated as opaque.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the file name of the metadata file paired with this key.
    pub fn metadata_file_name(&self) -> String {
        format!("{}{METADATA_SUFFIX}", self.0)
    }

    fn validate(s: &str) -> Result<(), &'static str> {
        if s.is_empty() {
            return Err("key is empty");
        }
        if s == "." || s == ".." {
            return Err("key is a relative path component");
        }
        if s.contains(['/', '\\', '\0']) {
            return Err("key contains a path separator or NUL byte");
        }
        if s.ends_with(METADATA_SUFFIX) {
            return Err("key ends with the reserved `.metadata` suffix");
        }
        if s.ends_with(TEMP_SUFFIX) {
            return Err("key ends with the reserved `.tmp` suffix");
        }
        Ok(())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", self.0)
    }
}

impl From<ContentHash> for CacheKey {
    fn from(hash: ContentHash) -> Self {
        // Hex digits never trip key validation.
        Self(hash.to_string())
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Error returned when a string cannot be used as a [`CacheKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCacheKeyError {
    /// The rejected input.
    pub input: String,
    /// Why the input was rejected.
    pub reason: &'static str,
}

impl fmt::Display for ParseCacheKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid cache key '{}': {}", self.input, self.reason)
    }
}

impl std::error::Error for ParseCacheKeyError {}

impl TryFrom<String> for CacheKey {
    type Error = ParseCacheKeyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match Self::validate(&s) {
            Ok(()) => Ok(Self(s)),
            Err(reason) => Err(ParseCacheKeyError { input: s, reason }),
        }
    }
}

impl FromStr for CacheKey {
    type Err = ParseCacheKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_key() {
        let key: CacheKey = "0123abcd".parse().unwrap();
        assert_eq!(key.as_str(), "0123abcd");
        assert_eq!(key.to_string(), "0123abcd");
    }

    #[test]
    fn metadata_file_name() {
        let key: CacheKey = "abc".parse().unwrap();
        assert_eq!(key.metadata_file_name(), "abc.metadata");
    }

    #[test]
    fn rejects_empty() {
        let err = "".parse::<CacheKey>().unwrap_err();
        assert_eq!(err.reason, "key is empty");
    }

    #[test]
    fn rejects_path_components() {
        assert!(".".parse::<CacheKey>().is_err());
        assert!("..".parse::<CacheKey>().is_err());
        assert!("a/b".parse::<CacheKey>().is_err());
        assert!("a\\b".parse::<CacheKey>().is_err());
        assert!("a\0b".parse::<CacheKey>().is_err());
    }

    #[test]
    fn rejects_reserved_suffixes() {
        assert!("abc.metadata".parse::<CacheKey>().is_err());
        assert!("artifact123.tmp".parse::<CacheKey>().is_err());
    }

    #[test]
    fn content_key_is_deterministic_hex() {
        let a = CacheKey::from(ContentHash::from_bytes(b"libfoo.a contents"));
        let b = CacheKey::from(ContentHash::from_bytes(b"libfoo.a contents"));
        let c = CacheKey::from(ContentHash::from_bytes(b"libbar.a contents"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert!(a.as_str().parse::<CacheKey>().is_ok());
    }

    #[test]
    fn error_display() {
        let err = "x/y".parse::<CacheKey>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("invalid cache key 'x/y'"));
        assert!(msg.contains("path separator"));
    }

    #[test]
    fn debug_format() {
        let key: CacheKey = "k1".parse().unwrap();
        assert_eq!(format!("{key:?}"), "CacheKey(k1)");
    }
}
