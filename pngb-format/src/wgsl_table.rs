//! Ordered list of WGSL module references into [`DataSection`] (§3, §4.D).
//!
//! The DSL lets WGSL fragments be referenced by name; the analyzer resolves
//! `$wgsl.foo` to a [`WgslId`], and the emitter converts that to the
//! underlying [`DataId`] when writing a `create_shader_module` opcode. The
//! emitter must emit the `DataId`, never the `WgslId`, to that opcode (§4.D,
//! §4.L, §8 "Shader-data binding") — this table exists precisely to make
//! that translation a single explicit step instead of something callers
//! might skip.

use crate::data::DataSection;
use crate::ids::{ArenaError, DataId, StringId, WgslId};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WgslTableError {
    #[error("wgsl id {0:?} is not present in this table")]
    InvalidWgslId(WgslId),
    #[error("wgsl table already holds 65535 entries")]
    TooManyEntries,
    #[error("wgsl table is truncated or malformed: {0}")]
    Malformed(&'static str),
}

impl From<ArenaError> for WgslTableError {
    fn from(e: ArenaError) -> Self {
        match e {
            ArenaError::Full => WgslTableError::TooManyEntries,
            ArenaError::OutOfRange(_) => WgslTableError::Malformed("id out of range"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WgslEntry {
    pub name: StringId,
    pub data: DataId,
    pub entry_points: Vec<StringId>,
}

#[derive(Debug, Clone, Default)]
pub struct WgslTable {
    entries: Vec<WgslEntry>,
}

impl WgslTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: WgslEntry) -> Result<WgslId, WgslTableError> {
        if self.entries.len() >= u16::MAX as usize {
            return Err(WgslTableError::TooManyEntries);
        }
        let id = WgslId::new(self.entries.len() as u16);
        self.entries.push(entry);
        Ok(id)
    }

    pub fn get(&self, id: WgslId) -> Result<&WgslEntry, WgslTableError> {
        self.entries
            .get(id.as_usize())
            .ok_or(WgslTableError::InvalidWgslId(id))
    }

    /// Resolves a [`WgslId`] straight to the [`DataId`] it ultimately points
    /// at. Callers that are about to emit `create_shader_module` should go
    /// through this rather than reaching into [`WgslEntry::data`] directly,
    /// so the boundary has one narrow choke point to test (§4.D, §8).
    pub fn resolve_data_id(&self, id: WgslId) -> Result<DataId, WgslTableError> {
        Ok(self.get(id)?.data)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WgslEntry> {
        self.entries.iter()
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.entries.len() as u16).to_le_bytes());
        for entry in &self.entries {
            out.extend_from_slice(&entry.name.index().to_le_bytes());
            out.extend_from_slice(&entry.data.index().to_le_bytes());
            out.extend_from_slice(&(entry.entry_points.len() as u16).to_le_bytes());
            for ep in &entry.entry_points {
                out.extend_from_slice(&ep.index().to_le_bytes());
            }
        }
    }

    pub fn deserialize(buf: &[u8]) -> Result<(Self, usize), WgslTableError> {
        if buf.len() < 2 {
            return Err(WgslTableError::Malformed("truncated count"));
        }
        let count = u16::from_le_bytes([buf[0], buf[1]]) as usize;
        let mut cursor = 2usize;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            if buf.len() < cursor + 6 {
                return Err(WgslTableError::Malformed("truncated entry header"));
            }
            let name = StringId::new(u16::from_le_bytes([buf[cursor], buf[cursor + 1]]));
            let data = DataId::new(u16::from_le_bytes([buf[cursor + 2], buf[cursor + 3]]));
            let ep_count =
                u16::from_le_bytes([buf[cursor + 4], buf[cursor + 5]]) as usize;
            cursor += 6;
            if buf.len() < cursor + ep_count * 2 {
                return Err(WgslTableError::Malformed("truncated entry_point array"));
            }
            let mut entry_points = Vec::with_capacity(ep_count);
            for i in 0..ep_count {
                let base = cursor + i * 2;
                entry_points.push(StringId::new(u16::from_le_bytes([
                    buf[base],
                    buf[base + 1],
                ])));
            }
            cursor += ep_count * 2;
            entries.push(WgslEntry {
                name,
                data,
                entry_points,
            });
        }
        Ok((WgslTable { entries }, cursor))
    }
}

/// Interns `source` into `data` and registers a WGSL table entry for it.
/// Convenience wrapper used by the compiler's `#wgsl`/`#shaderModule`
/// handling (§4.L).
pub fn register_wgsl_source(
    table: &mut WgslTable,
    data: &mut DataSection,
    name: StringId,
    source: &[u8],
    entry_points: Vec<StringId>,
) -> Result<(WgslId, DataId), WgslTableError> {
    let data_id = data
        .add_bytes(source)
        .map_err(|_| WgslTableError::TooManyEntries)?;
    let wgsl_id = table.push(WgslEntry {
        name,
        data: data_id,
        entry_points,
    })?;
    Ok((wgsl_id, data_id))
}
