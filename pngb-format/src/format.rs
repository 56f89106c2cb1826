//! Versioned PNGB header: magic, flags, plugin bitset, and section offset
//! table (§4.G).
//!
//! Version 5 (40-byte header) is the only version this workspace emits;
//! version 4 (28-byte header) must still be readable. A v4 buffer has no
//! independent wgsl/uniform/animation tables, so this reader treats those
//! three offsets as pointing at the end of the buffer (empty tables, no
//! animation) and forces the plugin byte to `core`-only, per §4.G/§9's note
//! that v4's plugin bits should be read as defaulted rather than trusted.

use crate::error::FormatError;
use bitflags::bitflags;

pub const MAGIC: [u8; 4] = *b"PNGB";
pub const VERSION_4: u16 = 4;
pub const VERSION_5: u16 = 5;
pub const HEADER_SIZE_V4: usize = 28;
pub const HEADER_SIZE_V5: usize = 40;

bitflags! {
    /// Header `flags` field (§4.G).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HeaderFlags: u16 {
        const HAS_EMBEDDED_EXECUTOR = 1 << 0;
        const HAS_ANIMATION_TABLE = 1 << 1;
    }
}

bitflags! {
    /// Header `plugins` byte — one bit per feature family detected by the
    /// analyzer (§4.G, §4.K item 4).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PluginBits: u8 {
        const CORE = 1 << 0;
        const RENDER = 1 << 1;
        const COMPUTE = 1 << 2;
        const WASM = 1 << 3;
        const ANIM = 1 << 4;
        const TEXTURE = 1 << 5;
    }
}

/// Byte offsets of every section, plus the header metadata that precedes
/// them. All offsets are absolute from the start of the PNGB buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u16,
    pub flags: HeaderFlags,
    pub plugins: PluginBits,
    pub executor_offset: u32,
    pub executor_length: u32,
    pub string_table_offset: u32,
    pub data_section_offset: u32,
    pub wgsl_table_offset: u32,
    pub uniform_table_offset: u32,
    pub animation_table_offset: u32,
}

impl Header {
    pub fn header_size(&self) -> usize {
        match self.version {
            VERSION_4 => HEADER_SIZE_V4,
            _ => HEADER_SIZE_V5,
        }
    }

    /// `[header_size + executor_length, string_table_offset)` (§4.G).
    pub fn bytecode_range(&self) -> (u32, u32) {
        let start = self.header_size() as u32 + self.executor_length;
        (start, self.string_table_offset)
    }

    /// Writes the 40-byte version-5 header. Offsets must already be
    /// resolved by the caller (`Module::serialize`).
    pub fn serialize_v5(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&VERSION_5.to_le_bytes());
        out.extend_from_slice(&self.flags.bits().to_le_bytes());
        out.push(self.plugins.bits());
        out.extend_from_slice(&[0u8; 3]);
        out.extend_from_slice(&self.executor_offset.to_le_bytes());
        out.extend_from_slice(&self.executor_length.to_le_bytes());
        out.extend_from_slice(&self.string_table_offset.to_le_bytes());
        out.extend_from_slice(&self.data_section_offset.to_le_bytes());
        out.extend_from_slice(&self.wgsl_table_offset.to_le_bytes());
        out.extend_from_slice(&self.uniform_table_offset.to_le_bytes());
        out.extend_from_slice(&self.animation_table_offset.to_le_bytes());
        debug_assert_eq!(out.len(), HEADER_SIZE_V5);
    }

    /// Parses either header version and validates the invariants in §4.G:
    /// magic match, supported version, non-decreasing section offsets,
    /// every section ending within the buffer, `bytecode_start <=
    /// bytecode_end`.
    pub fn deserialize(buf: &[u8]) -> Result<Self, FormatError> {
        if buf.len() < 6 {
            return Err(FormatError::InvalidFormat("buffer shorter than magic+version"));
        }
        if buf[0..4] != MAGIC {
            return Err(FormatError::InvalidFormat("bad magic"));
        }
        let version = u16::from_le_bytes([buf[4], buf[5]]);
        let header = match version {
            VERSION_5 => Self::parse_v5(buf)?,
            VERSION_4 => Self::parse_v4(buf)?,
            other => return Err(FormatError::UnsupportedVersion(other)),
        };
        header.validate(buf.len())?;
        Ok(header)
    }

    fn parse_v5(buf: &[u8]) -> Result<Self, FormatError> {
        if buf.len() < HEADER_SIZE_V5 {
            return Err(FormatError::InvalidFormat("v5 header truncated"));
        }
        let flags = HeaderFlags::from_bits_truncate(u16::from_le_bytes([buf[6], buf[7]]));
        let plugins = PluginBits::from_bits_truncate(buf[8]);
        let executor_offset = u32::from_le_bytes(buf[12..16].try_into().unwrap());
        let executor_length = u32::from_le_bytes(buf[16..20].try_into().unwrap());
        let string_table_offset = u32::from_le_bytes(buf[20..24].try_into().unwrap());
        let data_section_offset = u32::from_le_bytes(buf[24..28].try_into().unwrap());
        let wgsl_table_offset = u32::from_le_bytes(buf[28..32].try_into().unwrap());
        let uniform_table_offset = u32::from_le_bytes(buf[32..36].try_into().unwrap());
        let animation_table_offset = u32::from_le_bytes(buf[36..40].try_into().unwrap());
        Ok(Header {
            version: VERSION_5,
            flags,
            plugins,
            executor_offset,
            executor_length,
            string_table_offset,
            data_section_offset,
            wgsl_table_offset,
            uniform_table_offset,
            animation_table_offset,
        })
    }

    fn parse_v4(buf: &[u8]) -> Result<Self, FormatError> {
        if buf.len() < HEADER_SIZE_V4 {
            return Err(FormatError::InvalidFormat("v4 header truncated"));
        }
        let flags = HeaderFlags::from_bits_truncate(u16::from_le_bytes([buf[6], buf[7]]))
            & !HeaderFlags::HAS_ANIMATION_TABLE;
        let executor_offset = u32::from_le_bytes(buf[12..16].try_into().unwrap());
        let executor_length = u32::from_le_bytes(buf[16..20].try_into().unwrap());
        let string_table_offset = u32::from_le_bytes(buf[20..24].try_into().unwrap());
        let data_section_offset = u32::from_le_bytes(buf[24..28].try_into().unwrap());
        let end = buf.len() as u32;
        Ok(Header {
            version: VERSION_4,
            flags,
            plugins: PluginBits::CORE,
            executor_offset,
            executor_length,
            string_table_offset,
            data_section_offset,
            wgsl_table_offset: end,
            uniform_table_offset: end,
            animation_table_offset: end,
        })
    }

    fn validate(&self, buf_len: usize) -> Result<(), FormatError> {
        let offsets = [
            self.string_table_offset,
            self.data_section_offset,
            self.wgsl_table_offset,
            self.uniform_table_offset,
            self.animation_table_offset,
        ];
        for pair in offsets.windows(2) {
            if pair[0] > pair[1] {
                return Err(FormatError::InvalidFormat("section offsets are not non-decreasing"));
            }
        }
        if *offsets.last().unwrap() as usize > buf_len {
            return Err(FormatError::InvalidFormat("a section ends past the buffer"));
        }
        let (bytecode_start, bytecode_end) = self.bytecode_range();
        if bytecode_start > bytecode_end {
            return Err(FormatError::InvalidFormat("bytecode_start > bytecode_end"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> Header {
        Header {
            version: VERSION_5,
            flags: HeaderFlags::empty(),
            plugins: PluginBits::CORE | PluginBits::RENDER,
            executor_offset: 0,
            executor_length: 0,
            string_table_offset: 45,
            data_section_offset: 47,
            wgsl_table_offset: 49,
            uniform_table_offset: 50,
            animation_table_offset: 51,
        }
    }

    #[test]
    fn v5_header_roundtrip() {
        let header = sample_header();
        let mut buf = Vec::new();
        header.serialize_v5(&mut buf);
        buf.resize(51, 0);
        assert_eq!(buf.len(), HEADER_SIZE_V5.max(51));
        let restored = Header::deserialize(&buf).unwrap();
        assert_eq!(restored, header);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut buf = vec![0u8; HEADER_SIZE_V5];
        buf[0..4].copy_from_slice(b"NOPE");
        assert_eq!(
            Header::deserialize(&buf),
            Err(FormatError::InvalidFormat("bad magic"))
        );
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let mut buf = vec![0u8; HEADER_SIZE_V5];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4..6].copy_from_slice(&99u16.to_le_bytes());
        assert_eq!(Header::deserialize(&buf), Err(FormatError::UnsupportedVersion(99)));
    }

    #[test]
    fn decreasing_offsets_are_rejected() {
        let mut header = sample_header();
        header.data_section_offset = header.string_table_offset - 1;
        let mut buf = Vec::new();
        header.serialize_v5(&mut buf);
        buf.resize(60, 0);
        assert!(matches!(
            Header::deserialize(&buf),
            Err(FormatError::InvalidFormat(_))
        ));
    }

    #[test]
    fn v4_header_defaults_missing_tables_to_end_of_buffer() {
        let mut buf = vec![0u8; HEADER_SIZE_V4];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4..6].copy_from_slice(&VERSION_4.to_le_bytes());
        buf[20..24].copy_from_slice(&20u32.to_le_bytes()); // string_table_offset
        buf[24..28].copy_from_slice(&24u32.to_le_bytes()); // data_section_offset
        let header = Header::deserialize(&buf).unwrap();
        assert_eq!(header.plugins, PluginBits::CORE);
        assert_eq!(header.wgsl_table_offset, buf.len() as u32);
        assert_eq!(header.uniform_table_offset, buf.len() as u32);
        assert_eq!(header.animation_table_offset, buf.len() as u32);
    }
}
