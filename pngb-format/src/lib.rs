//! PNGB binary module format: the versioned header, every table it embeds,
//! varint encoding, and the (de)serializer that ties them together (§3,
//! §4.A–G of the PNGine specification).
//!
//! This crate has no opinion on *how* a module's bytecode is produced
//! (`pngine-compiler`) or interpreted (`pngine-vm`); it only defines the
//! wire-exact shape those two crates trade in.

pub mod animation;
pub mod data;
pub mod error;
pub mod format;
pub mod ids;
pub mod module;
pub mod opcode;
pub mod strings;
pub mod uniform;
pub mod varint;
pub mod wgsl_table;

pub use animation::{AnimationTable, EndBehavior, Scene};
pub use data::DataSection;
pub use error::FormatError;
pub use format::{Header, HeaderFlags, PluginBits, VERSION_4, VERSION_5};
pub use ids::{DataId, StringId, UniformBindingId, WgslId};
pub use module::Module;
pub use opcode::{ArgShape, PngbOpcode};
pub use strings::StringTable;
pub use uniform::{FieldType, UniformBinding, UniformField, UniformTable};
pub use wgsl_table::{WgslEntry, WgslTable};
