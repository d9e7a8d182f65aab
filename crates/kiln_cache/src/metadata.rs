//! Binary encoding of artifact metadata.
//!
//! A metadata record is a string-to-string mapping stored next to each
//! artifact as `<key>.metadata`. The layout is big-endian throughout:
//!
//! ```text
//! u32                 entry count
//! repeated count times:
//!   u16               key length in bytes
//!   [u8; key len]     UTF-8 key
//!   u32               value length in bytes
//!   [u8; value len]   UTF-8 value
//! ```
//!
//! There is no checksum. Corruption is detected structurally, when the
//! stream ends before the declared entries are read or a declared length
//! runs past the end of the stream. Bytes after the last entry are ignored.

use std::collections::BTreeMap;

use crate::error::CacheError;

/// Side information recorded with a build artifact (origin host, rule type...).
pub type Metadata = BTreeMap<String, String>;

/// Encodes a metadata mapping into its binary record.
///
/// Fails only if a key is longer than `u16::MAX` bytes, a value longer than
/// `u32::MAX` bytes, or there are more than `u32::MAX` entries.
pub fn encode(metadata: &Metadata) -> Result<Vec<u8>, CacheError> {
    let count = u32::try_from(metadata.len()).map_err(|_| CacheError::MetadataTooLarge {
        reason: format!("{} entries", metadata.len()),
    })?;

    let payload: usize = metadata.iter().map(|(k, v)| 2 + k.len() + 4 + v.len()).sum();
    let mut out = Vec::with_capacity(4 + payload);
    out.extend_from_slice(&count.to_be_bytes());

    for (key, value) in metadata {
        let key_len = u16::try_from(key.len()).map_err(|_| CacheError::MetadataTooLarge {
            reason: format!("key of {} bytes exceeds {}", key.len(), u16::MAX),
        })?;
        let value_len = u32::try_from(value.len()).map_err(|_| CacheError::MetadataTooLarge {
            reason: format!("value for '{key}' of {} bytes", value.len()),
        })?;
        out.extend_from_slice(&key_len.to_be_bytes());
        out.extend_from_slice(key.as_bytes());
        out.extend_from_slice(&value_len.to_be_bytes());
        out.extend_from_slice(value.as_bytes());
    }

    Ok(out)
}

/// Decodes a binary metadata record.
///
/// If the record repeats a key, the last occurrence wins.
pub fn decode(bytes: &[u8]) -> Result<Metadata, CacheError> {
    let mut reader = Reader { buf: bytes, pos: 0 };
    let count = reader.read_u32("entry count")?;

    let mut metadata = Metadata::new();
    for _ in 0..count {
        let key_len = reader.read_u16("key length")? as usize;
        let key = reader.read_str(key_len, "key")?;
        let value_len = reader.read_u32("value length")? as usize;
        let value = reader.read_str(value_len, "value")?;
        metadata.insert(key, value);
    }

    Ok(metadata)
}

/// Bounds-checked cursor over a metadata record.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8], CacheError> {
        let remaining = self.buf.len() - self.pos;
        if len > remaining {
            return Err(CacheError::CorruptMetadata {
                reason: format!(
                    "{what} needs {len} bytes at offset {} but only {remaining} remain",
                    self.pos
                ),
            });
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_u16(&mut self, what: &str) -> Result<u16, CacheError> {
        let raw = self.take(2, what)?;
        Ok(u16::from_be_bytes([raw[0], raw[1]]))
    }

    fn read_u32(&mut self, what: &str) -> Result<u32, CacheError> {
        let raw = self.take(4, what)?;
        Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn read_str(&mut self, len: usize, what: &str) -> Result<String, CacheError> {
        let offset = self.pos;
        let raw = self.take(len, what)?;
        String::from_utf8(raw.to_vec()).map_err(|e| CacheError::CorruptMetadata {
            reason: format!("{what} at offset {offset} is not valid UTF-8: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn meta(pairs: &[(&str, &str)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_mapping_is_four_zero_bytes() {
        let bytes = encode(&Metadata::new()).unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 0]);
        assert!(decode(&bytes).unwrap().is_empty());
    }

    #[test]
    fn layout_is_big_endian_length_prefixed() {
        let bytes = encode(&meta(&[("host", "ci-7")])).unwrap();
        let expected: Vec<u8> = [
            &[0, 0, 0, 1][..],
            &[0, 4],
            b"host",
            &[0, 0, 0, 4],
            b"ci-7",
        ]
        .concat();
        assert_eq!(bytes, expected);
    }

    #[test]
    fn roundtrip_multiple_entries() {
        let m = meta(&[
            ("build_host", "worker-12"),
            ("rule_type", "cxx_library"),
            ("empty", ""),
            ("unicode", "größe ✓"),
        ]);
        assert_eq!(decode(&encode(&m).unwrap()).unwrap(), m);
    }

    #[test]
    fn truncated_count_is_corrupt() {
        let err = decode(&[0, 0]).unwrap_err();
        assert!(matches!(err, CacheError::CorruptMetadata { .. }));
    }

    #[test]
    fn missing_entries_is_corrupt() {
        // Declares two entries but only carries one.
        let mut bytes = encode(&meta(&[("a", "1")])).unwrap();
        bytes[3] = 2;
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, CacheError::CorruptMetadata { .. }));
    }

    #[test]
    fn value_length_past_end_is_corrupt() {
        let mut bytes = encode(&meta(&[("a", "xyz")])).unwrap();
        // Value length sits after count (4), key len (2) and key (1).
        bytes[7..11].copy_from_slice(&1000u32.to_be_bytes());
        let err = decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("value needs 1000 bytes"));
    }

    #[test]
    fn huge_declared_count_fails_without_allocating() {
        let err = decode(&u32::MAX.to_be_bytes()).unwrap_err();
        assert!(matches!(err, CacheError::CorruptMetadata { .. }));
    }

    #[test]
    fn invalid_utf8_is_corrupt() {
        let bytes: Vec<u8> = [&[0, 0, 0, 1][..], &[0, 1], &[0xff], &[0, 0, 0, 0]].concat();
        let err = decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("not valid UTF-8"));
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let m = meta(&[("k", "v")]);
        let mut bytes = encode(&m).unwrap();
        bytes.extend_from_slice(b"junk");
        assert_eq!(decode(&bytes).unwrap(), m);
    }

    #[test]
    fn duplicate_keys_last_wins() {
        let bytes: Vec<u8> = [
            &[0, 0, 0, 2][..],
            &[0, 1],
            b"k",
            &[0, 0, 0, 1],
            b"1",
            &[0, 1],
            b"k",
            &[0, 0, 0, 1],
            b"2",
        ]
        .concat();
        assert_eq!(decode(&bytes).unwrap(), meta(&[("k", "2")]));
    }

    #[test]
    fn oversized_key_is_rejected() {
        let mut m = Metadata::new();
        m.insert("k".repeat(u16::MAX as usize + 1), "v".to_string());
        let err = encode(&m).unwrap_err();
        assert!(matches!(err, CacheError::MetadataTooLarge { .. }));
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(m in prop::collection::btree_map(".{0,24}", ".{0,64}", 0..16)) {
            let bytes = encode(&m).unwrap();
            prop_assert_eq!(decode(&bytes).unwrap(), m);
        }

        #[test]
        fn decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..128)) {
            let _ = decode(&bytes);
        }
    }
}
