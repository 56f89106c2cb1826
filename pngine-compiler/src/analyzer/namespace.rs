//! The 23 namespaces a `$namespace.name` reference can resolve against
//! (§3 "names live in one of 23 namespaces").

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    Wgsl,
    ShaderModule,
    Data,
    Buffer,
    Texture,
    TextureView,
    Sampler,
    BindGroupLayout,
    BindGroup,
    PipelineLayout,
    RenderPipeline,
    ComputePipeline,
    RenderPass,
    ComputePass,
    Queue,
    Frame,
    Animation,
    Scene,
    WasmModule,
    WasmCall,
    Define,
    Init,
    AnonymousDescriptor,
}

impl Namespace {
    pub const ALL: [Namespace; 23] = [
        Namespace::Wgsl,
        Namespace::ShaderModule,
        Namespace::Data,
        Namespace::Buffer,
        Namespace::Texture,
        Namespace::TextureView,
        Namespace::Sampler,
        Namespace::BindGroupLayout,
        Namespace::BindGroup,
        Namespace::PipelineLayout,
        Namespace::RenderPipeline,
        Namespace::ComputePipeline,
        Namespace::RenderPass,
        Namespace::ComputePass,
        Namespace::Queue,
        Namespace::Frame,
        Namespace::Animation,
        Namespace::Scene,
        Namespace::WasmModule,
        Namespace::WasmCall,
        Namespace::Define,
        Namespace::Init,
        Namespace::AnonymousDescriptor,
    ];

    /// Maps a `#macroName` keyword to the namespace it declares into.
    /// Returns `None` for an unrecognized macro name.
    pub fn from_macro(name: &str) -> Option<Namespace> {
        Some(match name {
            "wgsl" => Namespace::Wgsl,
            "shaderModule" => Namespace::ShaderModule,
            "data" => Namespace::Data,
            "buffer" => Namespace::Buffer,
            "texture" => Namespace::Texture,
            "sampler" => Namespace::Sampler,
            "bindGroupLayout" => Namespace::BindGroupLayout,
            "bindGroup" => Namespace::BindGroup,
            "pipelineLayout" => Namespace::PipelineLayout,
            "renderPipeline" => Namespace::RenderPipeline,
            "computePipeline" => Namespace::ComputePipeline,
            "renderPass" => Namespace::RenderPass,
            "computePass" => Namespace::ComputePass,
            "queue" => Namespace::Queue,
            "frame" => Namespace::Frame,
            "animation" => Namespace::Animation,
            "wasmModule" => Namespace::WasmModule,
            "wasmCall" => Namespace::WasmCall,
            "define" => Namespace::Define,
            "init" => Namespace::Init,
            _ => return None,
        })
    }

    /// Maps a `$namespace.name` reference's namespace token to a
    /// `Namespace`. Slightly broader than `from_macro` since references can
    /// also target `scene`/`textureView`, which have no top-level macro.
    pub fn from_reference(name: &str) -> Option<Namespace> {
        match name {
            "scene" => Some(Namespace::Scene),
            "textureView" => Some(Namespace::TextureView),
            other => Self::from_macro(other),
        }
    }

    /// Whether a form in this namespace requires an explicit label. The
    /// anonymous families (`queue`, `init`) are referenced positionally, not
    /// by name.
    pub fn requires_label(self) -> bool {
        !matches!(self, Namespace::Queue | Namespace::Init)
    }
}

/// Per-namespace name -> id table. Ids are assigned in declaration order,
/// starting at 0, matching §3's "IDs assigned in declaration order".
#[derive(Debug, Default)]
pub struct SymbolTable {
    names: Vec<Option<String>>,
    index_of: HashMap<String, u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateName;

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves one id for `name`.
    pub fn insert(&mut self, name: &str) -> Result<u16, DuplicateName> {
        self.insert_n(name, 1)
    }

    /// Reserves `count` consecutive ids, with `name` bound to the first one
    /// (used for pooled buffers, §4.K item 5).
    pub fn insert_n(&mut self, name: &str, count: u32) -> Result<u16, DuplicateName> {
        if self.index_of.contains_key(name) {
            return Err(DuplicateName);
        }
        let base = self.names.len() as u16;
        self.index_of.insert(name.to_string(), base);
        self.names.push(Some(name.to_string()));
        for _ in 1..count {
            self.names.push(None);
        }
        Ok(base)
    }

    /// Reserves one id with no name (anonymous-descriptor family members).
    pub fn insert_anonymous(&mut self) -> u16 {
        let id = self.names.len() as u16;
        self.names.push(None);
        id
    }

    pub fn get(&self, name: &str) -> Option<u16> {
        self.index_of.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut table = SymbolTable::new();
        table.insert("a").unwrap();
        assert_eq!(table.insert("a"), Err(DuplicateName));
    }

    #[test]
    fn pooled_insert_reserves_consecutive_ids() {
        let mut table = SymbolTable::new();
        let base = table.insert_n("pool", 4).unwrap();
        assert_eq!(base, 0);
        let next = table.insert("other").unwrap();
        assert_eq!(next, 4);
    }

    #[test]
    fn macro_name_maps_to_namespace() {
        assert_eq!(Namespace::from_macro("buffer"), Some(Namespace::Buffer));
        assert_eq!(Namespace::from_macro("nope"), None);
    }
}
