//! Reflection table used by a host to write named uniforms into GPU buffers
//! (§3, §4.E).

use crate::ids::DataId;
use thiserror::Error;

/// Scalar/vector/matrix types a uniform field can hold (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    F32,
    I32,
    U32,
    Vec2F,
    Vec3F,
    Vec4F,
    Vec2I,
    Vec3I,
    Vec4I,
    Vec2U,
    Vec3U,
    Vec4U,
    Mat3x3F,
    Mat4x4F,
}

impl FieldType {
    /// Byte size of this field *as stored in the uniform buffer*. Matrix
    /// types use their padded GPU layout, not their tightly packed input
    /// layout (§4.E).
    pub fn size_bytes(self) -> u32 {
        match self {
            FieldType::F32 | FieldType::I32 | FieldType::U32 => 4,
            FieldType::Vec2F | FieldType::Vec2I | FieldType::Vec2U => 8,
            FieldType::Vec3F | FieldType::Vec3I | FieldType::Vec3U => 12,
            FieldType::Vec4F | FieldType::Vec4I | FieldType::Vec4U => 16,
            FieldType::Mat3x3F => 48,
            FieldType::Mat4x4F => 64,
        }
    }

    /// How many `f32`/`i32`/`u32` input lanes [`convert`] expects, for
    /// types fed as flat numeric arrays from the DSL (scalars and vectors
    /// take one lane per component; matrices take one lane per element of
    /// their tightly-packed row-major input).
    pub fn input_lanes(self) -> usize {
        match self {
            FieldType::F32 | FieldType::I32 | FieldType::U32 => 1,
            FieldType::Vec2F | FieldType::Vec2I | FieldType::Vec2U => 2,
            FieldType::Vec3F | FieldType::Vec3I | FieldType::Vec3U => 3,
            FieldType::Vec4F | FieldType::Vec4I | FieldType::Vec4U => 4,
            FieldType::Mat3x3F => 9,
            FieldType::Mat4x4F => 16,
        }
    }

    fn tag(self) -> u8 {
        match self {
            FieldType::F32 => 0,
            FieldType::I32 => 1,
            FieldType::U32 => 2,
            FieldType::Vec2F => 3,
            FieldType::Vec3F => 4,
            FieldType::Vec4F => 5,
            FieldType::Vec2I => 6,
            FieldType::Vec3I => 7,
            FieldType::Vec4I => 8,
            FieldType::Vec2U => 9,
            FieldType::Vec3U => 10,
            FieldType::Vec4U => 11,
            FieldType::Mat3x3F => 12,
            FieldType::Mat4x4F => 13,
        }
    }

    fn from_tag(tag: u8) -> Result<Self, UniformTableError> {
        Ok(match tag {
            0 => FieldType::F32,
            1 => FieldType::I32,
            2 => FieldType::U32,
            3 => FieldType::Vec2F,
            4 => FieldType::Vec3F,
            5 => FieldType::Vec4F,
            6 => FieldType::Vec2I,
            7 => FieldType::Vec3I,
            8 => FieldType::Vec4I,
            9 => FieldType::Vec2U,
            10 => FieldType::Vec3U,
            11 => FieldType::Vec4U,
            12 => FieldType::Mat3x3F,
            13 => FieldType::Mat4x4F,
            other => return Err(UniformTableError::Malformed("unknown field type tag", other)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformField {
    pub slot: u16,
    pub name: crate::ids::StringId,
    pub offset_bytes: u32,
    pub size_bytes: u32,
    pub ty: FieldType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBinding {
    pub buffer_id: u16,
    pub name: crate::ids::StringId,
    pub group: u32,
    pub binding_index: u32,
    pub fields: Vec<UniformField>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UniformTableError {
    #[error("uniform fields overlap: field at offset {0} overlaps field at offset {1}")]
    OverlappingFields(u32, u32),
    #[error("uniform fields extend to byte {extent}, past the declared buffer size {buffer_size}")]
    ExceedsBufferSize { extent: u32, buffer_size: u32 },
    #[error("uniform table is truncated or malformed: {0} ({1})")]
    Malformed(&'static str, u8),
    #[error("field conversion expected {expected} input lanes, got {got}")]
    WrongInputArity { expected: usize, got: usize },
    #[error("no field named {0:?} in binding")]
    UnknownField(String),
}

#[derive(Debug, Clone, Default)]
pub struct UniformTable {
    bindings: Vec<UniformBinding>,
}

impl UniformTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates §3's invariant (fields within a binding do not overlap;
    /// total extent does not exceed `buffer_size`) and appends the binding.
    pub fn push(
        &mut self,
        binding: UniformBinding,
        buffer_size: u32,
    ) -> Result<(), UniformTableError> {
        let mut sorted: Vec<&UniformField> = binding.fields.iter().collect();
        sorted.sort_by_key(|f| f.offset_bytes);
        let mut cursor = 0u32;
        for field in &sorted {
            if field.offset_bytes < cursor {
                return Err(UniformTableError::OverlappingFields(
                    field.offset_bytes,
                    cursor,
                ));
            }
            cursor = field.offset_bytes + field.size_bytes;
        }
        if cursor > buffer_size {
            return Err(UniformTableError::ExceedsBufferSize {
                extent: cursor,
                buffer_size,
            });
        }
        self.bindings.push(binding);
        Ok(())
    }

    pub fn bindings(&self) -> &[UniformBinding] {
        &self.bindings
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.bindings.len() as u16).to_le_bytes());
        for binding in &self.bindings {
            out.extend_from_slice(&binding.buffer_id.to_le_bytes());
            out.extend_from_slice(&binding.name.index().to_le_bytes());
            out.extend_from_slice(&binding.group.to_le_bytes());
            out.extend_from_slice(&binding.binding_index.to_le_bytes());
            out.extend_from_slice(&(binding.fields.len() as u16).to_le_bytes());
            for field in &binding.fields {
                out.extend_from_slice(&field.slot.to_le_bytes());
                out.extend_from_slice(&field.name.index().to_le_bytes());
                out.extend_from_slice(&field.offset_bytes.to_le_bytes());
                out.extend_from_slice(&field.size_bytes.to_le_bytes());
                out.push(field.ty.tag());
            }
        }
    }

    pub fn deserialize(buf: &[u8]) -> Result<(Self, usize), UniformTableError> {
        if buf.len() < 2 {
            return Err(UniformTableError::Malformed("truncated binding count", 0));
        }
        let binding_count = u16::from_le_bytes([buf[0], buf[1]]) as usize;
        let mut cursor = 2usize;
        let mut bindings = Vec::with_capacity(binding_count);
        for _ in 0..binding_count {
            if buf.len() < cursor + 14 {
                return Err(UniformTableError::Malformed("truncated binding header", 0));
            }
            let buffer_id = u16::from_le_bytes([buf[cursor], buf[cursor + 1]]);
            let name = crate::ids::StringId::new(u16::from_le_bytes([
                buf[cursor + 2],
                buf[cursor + 3],
            ]));
            let group = u32::from_le_bytes(buf[cursor + 4..cursor + 8].try_into().unwrap());
            let binding_index =
                u32::from_le_bytes(buf[cursor + 8..cursor + 12].try_into().unwrap());
            let field_count =
                u16::from_le_bytes([buf[cursor + 12], buf[cursor + 13]]) as usize;
            cursor += 14;
            let mut fields = Vec::with_capacity(field_count);
            for _ in 0..field_count {
                if buf.len() < cursor + 13 {
                    return Err(UniformTableError::Malformed("truncated field", 0));
                }
                let slot = u16::from_le_bytes([buf[cursor], buf[cursor + 1]]);
                let fname = crate::ids::StringId::new(u16::from_le_bytes([
                    buf[cursor + 2],
                    buf[cursor + 3],
                ]));
                let offset_bytes =
                    u32::from_le_bytes(buf[cursor + 4..cursor + 8].try_into().unwrap());
                let size_bytes =
                    u32::from_le_bytes(buf[cursor + 8..cursor + 12].try_into().unwrap());
                let ty = FieldType::from_tag(buf[cursor + 12])?;
                cursor += 13;
                fields.push(UniformField {
                    slot,
                    name: fname,
                    offset_bytes,
                    size_bytes,
                    ty,
                });
            }
            bindings.push(UniformBinding {
                buffer_id,
                name,
                group,
                binding_index,
                fields,
            });
        }
        Ok((UniformTable { bindings }, cursor))
    }
}

/// Also returned by the PNGB `DataId` some formats use to stash a default
/// value blob for a binding; unused fields are `None` until the compiler
/// wires default-value support in (not required by §4.E).
pub type DefaultValueData = Option<DataId>;

/// Converts a host-supplied numeric value into the padded byte layout a
/// field's [`FieldType`] expects (§4.E). `input` lanes are row-major; for
/// scalars/vectors this is a straight float/int reinterpretation, for
/// matrices the padding rules below apply.
pub fn convert(ty: FieldType, input: &[f32]) -> Result<Vec<u8>, UniformTableError> {
    if input.len() != ty.input_lanes() {
        return Err(UniformTableError::WrongInputArity {
            expected: ty.input_lanes(),
            got: input.len(),
        });
    }
    let mut out = Vec::with_capacity(ty.size_bytes() as usize);
    match ty {
        FieldType::F32 | FieldType::Vec2F | FieldType::Vec3F | FieldType::Vec4F => {
            for v in input {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        FieldType::I32 | FieldType::Vec2I | FieldType::Vec3I | FieldType::Vec4I => {
            for v in input {
                out.extend_from_slice(&(*v as i32).to_le_bytes());
            }
        }
        FieldType::U32 | FieldType::Vec2U | FieldType::Vec3U | FieldType::Vec4U => {
            for v in input {
                out.extend_from_slice(&(*v as u32).to_le_bytes());
            }
        }
        FieldType::Mat3x3F => {
            // Input is 9 floats row-major; output is three 16-byte columns,
            // column-major, each with a trailing zero pad float (§4.E, §8
            // scenario 5).
            for col in 0..3 {
                for row in 0..3 {
                    out.extend_from_slice(&input[row * 3 + col].to_le_bytes());
                }
                out.extend_from_slice(&0f32.to_le_bytes());
            }
        }
        FieldType::Mat4x4F => {
            // Input is 16 floats, written as-is, column-major (§4.E).
            for v in input {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
    }
    debug_assert_eq!(out.len(), ty.size_bytes() as usize);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mat3x3f_padding_matches_spec_scenario() {
        let input: Vec<f32> = (1..=9).map(|n| n as f32).collect();
        let bytes = convert(FieldType::Mat3x3F, &input).unwrap();
        assert_eq!(bytes.len(), 48);
        let floats: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(&floats[0..4], &[1.0, 4.0, 7.0, 0.0]);
        assert_eq!(&floats[4..8], &[2.0, 5.0, 8.0, 0.0]);
        assert_eq!(&floats[8..12], &[3.0, 6.0, 9.0, 0.0]);
    }

    #[test]
    fn mat4x4f_is_written_as_is() {
        let input: Vec<f32> = (1..=16).map(|n| n as f32).collect();
        let bytes = convert(FieldType::Mat4x4F, &input).unwrap();
        assert_eq!(bytes.len(), 64);
        let floats: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(floats, input);
    }

    #[test]
    fn overlapping_fields_are_rejected() {
        let mut table = UniformTable::new();
        let binding = UniformBinding {
            buffer_id: 0,
            name: crate::ids::StringId::new(0),
            group: 0,
            binding_index: 0,
            fields: vec![
                UniformField {
                    slot: 0,
                    name: crate::ids::StringId::new(1),
                    offset_bytes: 0,
                    size_bytes: 8,
                    ty: FieldType::Vec2F,
                },
                UniformField {
                    slot: 1,
                    name: crate::ids::StringId::new(2),
                    offset_bytes: 4,
                    size_bytes: 4,
                    ty: FieldType::F32,
                },
            ],
        };
        assert!(matches!(
            table.push(binding, 64),
            Err(UniformTableError::OverlappingFields(_, _))
        ));
    }

    #[test]
    fn extent_beyond_buffer_size_is_rejected() {
        let mut table = UniformTable::new();
        let binding = UniformBinding {
            buffer_id: 0,
            name: crate::ids::StringId::new(0),
            group: 0,
            binding_index: 0,
            fields: vec![UniformField {
                slot: 0,
                name: crate::ids::StringId::new(1),
                offset_bytes: 60,
                size_bytes: 16,
                ty: FieldType::Vec4F,
            }],
        };
        assert!(matches!(
            table.push(binding, 64),
            Err(UniformTableError::ExceedsBufferSize { .. })
        ));
    }

    #[test]
    fn serialize_deserialize_roundtrip() {
        let mut table = UniformTable::new();
        table
            .push(
                UniformBinding {
                    buffer_id: 2,
                    name: crate::ids::StringId::new(5),
                    group: 0,
                    binding_index: 1,
                    fields: vec![
                        UniformField {
                            slot: 0,
                            name: crate::ids::StringId::new(6),
                            offset_bytes: 0,
                            size_bytes: 4,
                            ty: FieldType::F32,
                        },
                        UniformField {
                            slot: 1,
                            name: crate::ids::StringId::new(7),
                            offset_bytes: 16,
                            size_bytes: 64,
                            ty: FieldType::Mat4x4F,
                        },
                    ],
                },
                128,
            )
            .unwrap();
        let mut buf = Vec::new();
        table.serialize(&mut buf);
        let (restored, consumed) = UniformTable::deserialize(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(restored.bindings(), table.bindings());
    }
}
