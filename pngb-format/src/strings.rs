//! Interned UTF-8 string table with stable 16-bit ids (§3, §4.B).

use crate::ids::{ArenaError, StringId};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StringTableError {
    #[error("string table already holds 65535 entries")]
    TooManyStrings,
    #[error("string table payload would exceed 65535 bytes (the u16 offset/length wire format cannot address past that)")]
    PayloadTooLarge,
    #[error("string id {0:?} is not present in this table")]
    InvalidStringId(StringId),
    #[error("string table is truncated or malformed: {0}")]
    Malformed(&'static str),
}

impl From<ArenaError> for StringTableError {
    fn from(e: ArenaError) -> Self {
        match e {
            ArenaError::Full => StringTableError::TooManyStrings,
            ArenaError::OutOfRange(_) => StringTableError::Malformed("id out of range"),
        }
    }
}

/// Ordered collection of UTF-8 strings, deduplicated by content. A
/// [`StringId`] stays valid for the lifetime of the table: strings are
/// appended, never rewritten or removed (§3 invariant).
#[derive(Debug, Clone, Default)]
pub struct StringTable {
    strings: Vec<Vec<u8>>,
    index: HashMap<Vec<u8>, StringId>,
    /// Sum of every interned string's byte length, tracked incrementally so
    /// `intern` can reject a string that would push the *cumulative* wire
    /// payload past what a `u16` offset can address, not just a string that
    /// is individually too long (§4.B: offsets/lengths are `u16`).
    payload_len: usize,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `bytes`, returning the same id for equal byte content.
    pub fn intern(&mut self, bytes: &[u8]) -> Result<StringId, StringTableError> {
        if let Some(&id) = self.index.get(bytes) {
            return Ok(id);
        }
        if self.strings.len() >= u16::MAX as usize {
            return Err(StringTableError::TooManyStrings);
        }
        if bytes.len() > u16::MAX as usize {
            return Err(StringTableError::Malformed("string longer than 65535 bytes"));
        }
        if self.payload_len + bytes.len() > u16::MAX as usize {
            return Err(StringTableError::PayloadTooLarge);
        }
        let id = StringId::new(self.strings.len() as u16);
        self.strings.push(bytes.to_vec());
        self.index.insert(bytes.to_vec(), id);
        self.payload_len += bytes.len();
        Ok(id)
    }

    pub fn intern_str(&mut self, s: &str) -> Result<StringId, StringTableError> {
        self.intern(s.as_bytes())
    }

    pub fn get(&self, id: StringId) -> Result<&[u8], StringTableError> {
        self.strings
            .get(id.as_usize())
            .map(|v| v.as_slice())
            .ok_or(StringTableError::InvalidStringId(id))
    }

    pub fn get_str(&self, id: StringId) -> Result<&str, StringTableError> {
        let bytes = self.get(id)?;
        std::str::from_utf8(bytes).map_err(|_| StringTableError::Malformed("non-UTF-8 string"))
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// `[count:u16][offsets:count*u16][lengths:count*u16][utf8 bytes]` (§3).
    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.strings.len() as u16).to_le_bytes());
        let mut offset: u16 = 0;
        let mut offsets = Vec::with_capacity(self.strings.len());
        let mut lengths = Vec::with_capacity(self.strings.len());
        for s in &self.strings {
            offsets.push(offset);
            lengths.push(s.len() as u16);
            // `intern` rejects any string that would push `payload_len`
            // past `u16::MAX`, so this running offset never overflows a
            // `u16` for a table built through the public API.
            offset += s.len() as u16;
        }
        for o in &offsets {
            out.extend_from_slice(&o.to_le_bytes());
        }
        for l in &lengths {
            out.extend_from_slice(&l.to_le_bytes());
        }
        for s in &self.strings {
            out.extend_from_slice(s);
        }
    }

    pub fn deserialize(buf: &[u8]) -> Result<(Self, usize), StringTableError> {
        if buf.len() < 2 {
            return Err(StringTableError::Malformed("truncated count"));
        }
        let count = u16::from_le_bytes([buf[0], buf[1]]) as usize;
        let mut cursor = 2usize;
        let offsets_end = cursor + count * 2;
        let lengths_end = offsets_end + count * 2;
        if buf.len() < lengths_end {
            return Err(StringTableError::Malformed("truncated offset/length arrays"));
        }
        let mut offsets = Vec::with_capacity(count);
        for i in 0..count {
            let base = cursor + i * 2;
            offsets.push(u16::from_le_bytes([buf[base], buf[base + 1]]));
        }
        cursor = offsets_end;
        let mut lengths = Vec::with_capacity(count);
        for i in 0..count {
            let base = cursor + i * 2;
            lengths.push(u16::from_le_bytes([buf[base], buf[base + 1]]));
        }
        let payload = &buf[lengths_end..];
        let mut table = StringTable::new();
        for i in 0..count {
            let start = offsets[i] as usize;
            let len = lengths[i] as usize;
            let end = start
                .checked_add(len)
                .ok_or(StringTableError::Malformed("string offset overflow"))?;
            if end > payload.len() {
                return Err(StringTableError::Malformed("string payload truncated"));
            }
            let bytes = &payload[start..end];
            let id = StringId::new(table.strings.len() as u16);
            table.strings.push(bytes.to_vec());
            table.index.insert(bytes.to_vec(), id);
            table.payload_len += bytes.len();
        }
        let total_payload_len: usize = lengths.iter().map(|&l| l as usize).sum();
        if total_payload_len > payload.len() {
            return Err(StringTableError::Malformed("string payload shorter than declared"));
        }
        Ok((table, lengths_end + total_payload_len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_deduplicates_equal_bytes() {
        let mut table = StringTable::new();
        let a = table.intern_str("hello").unwrap();
        let b = table.intern_str("hello").unwrap();
        let c = table.intern_str("world").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn get_returns_what_was_interned() {
        let mut table = StringTable::new();
        let id = table.intern_str("shader_a").unwrap();
        assert_eq!(table.get_str(id).unwrap(), "shader_a");
    }

    #[test]
    fn invalid_id_is_rejected() {
        let table = StringTable::new();
        let bogus = StringId::new(0);
        assert_eq!(
            table.get(bogus),
            Err(StringTableError::InvalidStringId(bogus))
        );
    }

    #[test]
    fn cumulative_payload_overflow_is_rejected_not_a_panic() {
        // None of these strings is individually close to u16::MAX, but
        // enough distinct ones push the cumulative payload past it.
        let mut table = StringTable::new();
        let chunk = "x".repeat(2000);
        for i in 0..32 {
            table.intern_str(&format!("{chunk}{i}")).unwrap();
        }
        let err = table.intern_str(&"y".repeat(2000)).unwrap_err();
        assert_eq!(err, StringTableError::PayloadTooLarge);
        // The table is left exactly as it was before the failed insert.
        let mut buf = Vec::new();
        table.serialize(&mut buf);
    }

    #[test]
    fn serialize_deserialize_roundtrip() {
        let mut table = StringTable::new();
        table.intern_str("alpha").unwrap();
        table.intern_str("beta").unwrap();
        table.intern_str("").unwrap();
        let mut buf = Vec::new();
        table.serialize(&mut buf);
        let (restored, consumed) = StringTable::deserialize(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(restored.len(), table.len());
        for i in 0..table.len() as u16 {
            let id = StringId::new(i);
            assert_eq!(restored.get(id).unwrap(), table.get(id).unwrap());
        }
    }
}
