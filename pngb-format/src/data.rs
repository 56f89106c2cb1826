//! Opaque byte blobs keyed by 16-bit ids (§3, §4.C).
//!
//! `DataSection` carries WGSL source, JSON resource descriptors, static
//! numeric arrays, and generator expression strings — anything the compiler
//! wants addressed by id without giving the format itself an opinion on its
//! contents.

use crate::ids::{ArenaError, DataId};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DataSectionError {
    #[error("data id {0:?} is not present in this section")]
    InvalidDataId(DataId),
    #[error("data section is truncated or malformed: {0}")]
    Malformed(&'static str),
    #[error("data section already holds 65535 entries")]
    TooManyBlobs,
}

impl From<ArenaError> for DataSectionError {
    fn from(e: ArenaError) -> Self {
        match e {
            ArenaError::Full => DataSectionError::TooManyBlobs,
            ArenaError::OutOfRange(_) => DataSectionError::Malformed("id out of range"),
        }
    }
}

/// Ordered collection of opaque byte blobs. A [`DataId`] points at the same
/// bytes forever (§3 invariant); the section owns its buffer.
#[derive(Debug, Clone, Default)]
pub struct DataSection {
    blobs: Vec<Vec<u8>>,
}

impl DataSection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` as a new blob. Structural deduplication is allowed by
    /// §4.C but not required; this implementation does not dedup, matching
    /// the "data never moves once assigned" emphasis of the emitter's
    /// shader-data binding invariant (§4.L, §8).
    pub fn add_bytes(&mut self, bytes: &[u8]) -> Result<DataId, DataSectionError> {
        if self.blobs.len() >= u16::MAX as usize {
            return Err(DataSectionError::TooManyBlobs);
        }
        let id = DataId::new(self.blobs.len() as u16);
        self.blobs.push(bytes.to_vec());
        Ok(id)
    }

    pub fn get(&self, id: DataId) -> Result<&[u8], DataSectionError> {
        self.blobs
            .get(id.as_usize())
            .map(|v| v.as_slice())
            .ok_or(DataSectionError::InvalidDataId(id))
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// `[count:u16]` then per-blob `[offset:u32][len:u32]` header array,
    /// then payload (§4.C).
    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.blobs.len() as u16).to_le_bytes());
        let mut offset: u32 = 0;
        let mut headers = Vec::with_capacity(self.blobs.len());
        for blob in &self.blobs {
            headers.push((offset, blob.len() as u32));
            offset = offset
                .checked_add(blob.len() as u32)
                .expect("data section payload exceeds 4GiB");
        }
        for (off, len) in &headers {
            out.extend_from_slice(&off.to_le_bytes());
            out.extend_from_slice(&len.to_le_bytes());
        }
        for blob in &self.blobs {
            out.extend_from_slice(blob);
        }
    }

    pub fn deserialize(buf: &[u8]) -> Result<(Self, usize), DataSectionError> {
        if buf.len() < 2 {
            return Err(DataSectionError::Malformed("truncated count"));
        }
        let count = u16::from_le_bytes([buf[0], buf[1]]) as usize;
        let headers_start = 2usize;
        let headers_end = headers_start + count * 8;
        if buf.len() < headers_end {
            return Err(DataSectionError::Malformed("truncated header array"));
        }
        let mut headers = Vec::with_capacity(count);
        for i in 0..count {
            let base = headers_start + i * 8;
            let offset = u32::from_le_bytes(buf[base..base + 4].try_into().unwrap());
            let len = u32::from_le_bytes(buf[base + 4..base + 8].try_into().unwrap());
            headers.push((offset, len));
        }
        let payload = &buf[headers_end..];
        let mut blobs = Vec::with_capacity(count);
        let mut max_end = 0usize;
        for (offset, len) in &headers {
            let start = *offset as usize;
            let end = start
                .checked_add(*len as usize)
                .ok_or(DataSectionError::Malformed("blob range overflow"))?;
            if end > payload.len() {
                return Err(DataSectionError::Malformed("blob payload truncated"));
            }
            blobs.push(payload[start..end].to_vec());
            max_end = max_end.max(end);
        }
        Ok((DataSection { blobs }, headers_end + max_end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_get_roundtrip() {
        let mut ds = DataSection::new();
        let a = ds.add_bytes(b"fn main() {}").unwrap();
        let b = ds.add_bytes(b"{}").unwrap();
        assert_eq!(ds.get(a).unwrap(), b"fn main() {}");
        assert_eq!(ds.get(b).unwrap(), b"{}");
    }

    #[test]
    fn serialize_deserialize_roundtrip() {
        let mut ds = DataSection::new();
        ds.add_bytes(b"one").unwrap();
        ds.add_bytes(b"").unwrap();
        ds.add_bytes(b"three-bytes-long").unwrap();
        let mut buf = Vec::new();
        ds.serialize(&mut buf);
        let (restored, consumed) = DataSection::deserialize(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(restored.len(), ds.len());
        for i in 0..ds.len() as u16 {
            let id = DataId::new(i);
            assert_eq!(restored.get(id).unwrap(), ds.get(id).unwrap());
        }
    }

    #[test]
    fn invalid_id_is_rejected() {
        let ds = DataSection::new();
        let bogus = DataId::new(0);
        assert_eq!(ds.get(bogus), Err(DataSectionError::InvalidDataId(bogus)));
    }
}
