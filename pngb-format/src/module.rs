//! `Module`: the deserialized PNGB image a compiler produces and a host
//! loads (§3 "Module (PNGB)").
//!
//! Owns every table plus the raw bytecode slice. Immutable after
//! construction/deserialization — nothing in this crate or `pngine-vm`
//! mutates a `Module` in place.

use crate::animation::AnimationTable;
use crate::data::DataSection;
use crate::error::FormatError;
use crate::format::{Header, HeaderFlags, PluginBits, VERSION_5};
use crate::strings::StringTable;
use crate::uniform::UniformTable;
use crate::wgsl_table::WgslTable;

/// A fully assembled PNGB module, ready to serialize, or the result of
/// deserializing one.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub version: u16,
    pub plugins: PluginBits,
    pub embedded_executor: Vec<u8>,
    pub bytecode: Vec<u8>,
    pub strings: StringTable,
    pub data: DataSection,
    pub wgsl: WgslTable,
    pub uniforms: UniformTable,
    pub animation: Option<AnimationTable>,
}

impl Module {
    pub fn new(bytecode: Vec<u8>, plugins: PluginBits) -> Self {
        Self {
            version: VERSION_5,
            plugins,
            embedded_executor: Vec::new(),
            bytecode,
            strings: StringTable::new(),
            data: DataSection::new(),
            wgsl: WgslTable::new(),
            uniforms: UniformTable::new(),
            animation: None,
        }
    }

    /// Serializes the module as a version-5 PNGB buffer: header, optional
    /// embedded executor, bytecode, then the tables in header-field order
    /// (§4.G layout).
    pub fn serialize(&self) -> Vec<u8> {
        let header_size = crate::format::HEADER_SIZE_V5;

        let mut strings_buf = Vec::new();
        self.strings.serialize(&mut strings_buf);
        let mut data_buf = Vec::new();
        self.data.serialize(&mut data_buf);
        let mut wgsl_buf = Vec::new();
        self.wgsl.serialize(&mut wgsl_buf);
        let mut uniforms_buf = Vec::new();
        self.uniforms.serialize(&mut uniforms_buf);
        let mut animation_buf = Vec::new();
        match &self.animation {
            Some(table) => table.serialize(&mut animation_buf),
            None => AnimationTable::serialize_absent(&mut animation_buf),
        }

        let executor_offset = if self.embedded_executor.is_empty() {
            0
        } else {
            header_size as u32
        };
        let executor_length = self.embedded_executor.len() as u32;
        let bytecode_start = header_size as u32 + executor_length;
        let string_table_offset = bytecode_start + self.bytecode.len() as u32;
        let data_section_offset = string_table_offset + strings_buf.len() as u32;
        let wgsl_table_offset = data_section_offset + data_buf.len() as u32;
        let uniform_table_offset = wgsl_table_offset + wgsl_buf.len() as u32;
        let animation_table_offset = uniform_table_offset + uniforms_buf.len() as u32;

        let mut flags = HeaderFlags::empty();
        if executor_length > 0 {
            flags |= HeaderFlags::HAS_EMBEDDED_EXECUTOR;
        }
        if self.animation.is_some() {
            flags |= HeaderFlags::HAS_ANIMATION_TABLE;
        }

        let header = Header {
            version: VERSION_5,
            flags,
            plugins: self.plugins,
            executor_offset,
            executor_length,
            string_table_offset,
            data_section_offset,
            wgsl_table_offset,
            uniform_table_offset,
            animation_table_offset,
        };

        let mut out = Vec::with_capacity(animation_table_offset as usize + animation_buf.len());
        header.serialize_v5(&mut out);
        out.extend_from_slice(&self.embedded_executor);
        out.extend_from_slice(&self.bytecode);
        out.extend_from_slice(&strings_buf);
        out.extend_from_slice(&data_buf);
        out.extend_from_slice(&wgsl_buf);
        out.extend_from_slice(&uniforms_buf);
        out.extend_from_slice(&animation_buf);
        out
    }

    pub fn deserialize(buf: &[u8]) -> Result<Self, FormatError> {
        let header = Header::deserialize(buf)?;
        let (bytecode_start, bytecode_end) = header.bytecode_range();
        let bytecode = buf[bytecode_start as usize..bytecode_end as usize].to_vec();

        let embedded_executor = if header.executor_length > 0 {
            let start = header.executor_offset as usize;
            let end = start + header.executor_length as usize;
            buf.get(start..end)
                .ok_or(FormatError::InvalidFormat("embedded executor out of range"))?
                .to_vec()
        } else {
            Vec::new()
        };

        let (strings, strings_len) = StringTable::deserialize(&buf[header.string_table_offset as usize..])
            .map_err(|_| FormatError::InvalidFormat("malformed string table"))?;
        let string_table_end = header.string_table_offset as usize + strings_len;
        if string_table_end as u32 > header.data_section_offset {
            return Err(FormatError::InvalidFormat("string table overruns data section"));
        }

        let (data, data_len) = DataSection::deserialize(&buf[header.data_section_offset as usize..])
            .map_err(|_| FormatError::InvalidFormat("malformed data section"))?;
        let data_section_end = header.data_section_offset as usize + data_len;
        if data_section_end as u32 > header.wgsl_table_offset {
            return Err(FormatError::InvalidFormat("data section overruns wgsl table"));
        }

        let (wgsl, wgsl_len) = WgslTable::deserialize(&buf[header.wgsl_table_offset as usize..])
            .map_err(|_| FormatError::InvalidFormat("malformed wgsl table"))?;
        let wgsl_table_end = header.wgsl_table_offset as usize + wgsl_len;
        if wgsl_table_end as u32 > header.uniform_table_offset {
            return Err(FormatError::InvalidFormat("wgsl table overruns uniform table"));
        }

        let (uniforms, uniforms_len) =
            UniformTable::deserialize(&buf[header.uniform_table_offset as usize..])
                .map_err(|_| FormatError::InvalidFormat("malformed uniform table"))?;
        let uniform_table_end = header.uniform_table_offset as usize + uniforms_len;
        if uniform_table_end as u32 > header.animation_table_offset {
            return Err(FormatError::InvalidFormat("uniform table overruns animation table"));
        }

        let (animation, _animation_len) =
            AnimationTable::deserialize(&buf[header.animation_table_offset as usize..])
                .map_err(|_| FormatError::InvalidFormat("malformed animation table"))?;

        Ok(Module {
            version: header.version,
            plugins: header.plugins,
            embedded_executor,
            bytecode,
            strings,
            data,
            wgsl,
            uniforms,
            animation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::StringId;

    #[test]
    fn serialize_deserialize_roundtrip() {
        let mut module = Module::new(vec![0x01, 0x00, 0x00], PluginBits::CORE);
        module.strings.intern_str("main").unwrap();
        module.data.add_bytes(b"fn main() {}").unwrap();
        let bytes = module.serialize();
        let restored = Module::deserialize(&bytes).unwrap();
        assert_eq!(restored, module);
    }

    #[test]
    fn pngb_section_layout_matches_component_sizes() {
        // §8 scenario 3: one 3-byte bytecode, no other content. The literal
        // offsets in the spec's worked example aren't reachable from the
        // header/bytecode-range formula it also gives (see DESIGN.md); this
        // asserts the derivable property instead — each offset equals the
        // previous one plus the actual serialized size of that section.
        let module = Module::new(vec![0x01, 0x00, 0x00], PluginBits::CORE);
        let bytes = module.serialize();
        let header = Header::deserialize(&bytes).unwrap();

        let mut strings_buf = Vec::new();
        module.strings.serialize(&mut strings_buf);
        let mut data_buf = Vec::new();
        module.data.serialize(&mut data_buf);
        let mut wgsl_buf = Vec::new();
        module.wgsl.serialize(&mut wgsl_buf);
        let mut uniforms_buf = Vec::new();
        module.uniforms.serialize(&mut uniforms_buf);

        assert_eq!(header.string_table_offset, 40 + 3);
        assert_eq!(
            header.data_section_offset,
            header.string_table_offset + strings_buf.len() as u32
        );
        assert_eq!(
            header.wgsl_table_offset,
            header.data_section_offset + data_buf.len() as u32
        );
        assert_eq!(
            header.uniform_table_offset,
            header.wgsl_table_offset + wgsl_buf.len() as u32
        );
        assert_eq!(
            header.animation_table_offset,
            header.uniform_table_offset + uniforms_buf.len() as u32
        );
    }

    #[test]
    fn embedded_executor_flag_tracks_length() {
        let mut module = Module::new(vec![], PluginBits::CORE);
        module.embedded_executor = vec![1, 2, 3, 4];
        let bytes = module.serialize();
        let header = Header::deserialize(&bytes).unwrap();
        assert!(header.flags.contains(HeaderFlags::HAS_EMBEDDED_EXECUTOR));
        let restored = Module::deserialize(&bytes).unwrap();
        assert_eq!(restored.embedded_executor, vec![1, 2, 3, 4]);
    }

    #[test]
    fn animation_flag_tracks_presence() {
        let mut module = Module::new(vec![], PluginBits::CORE | PluginBits::ANIM);
        module.animation = Some(
            AnimationTable::new(
                StringId::new(0),
                1000,
                false,
                crate::animation::EndBehavior::Stop,
                vec![],
            )
            .unwrap(),
        );
        let bytes = module.serialize();
        let header = Header::deserialize(&bytes).unwrap();
        assert!(header.flags.contains(HeaderFlags::HAS_ANIMATION_TABLE));
        let restored = Module::deserialize(&bytes).unwrap();
        assert_eq!(restored.animation, module.animation);
    }
}
