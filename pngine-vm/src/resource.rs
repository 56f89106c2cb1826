//! Resource handle table (§5, §8 "Dispatcher idempotency").
//!
//! The dispatcher never talks to a real GPU — wgpu/winit and friends are
//! dropped teacher dependencies here. [`Handle`] is an opaque marker a host
//! process maps to its own resource on the other side of the command
//! buffer. What this module guarantees is the idempotency property: running
//! the same `create_*` opcode twice (e.g. because a caller replays the
//! resource-declaration prefix of the bytecode) yields the same handle
//! rather than allocating a new resource.

use std::collections::HashMap;

/// Opaque resource marker handed back across the command buffer boundary.
/// Carries no type information of its own; `ResourceKind` plus the PNGB id
/// it was keyed by is what a host needs to know what it points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub u32);

/// Which PNGB id-space a handle was allocated from. Mirrors the
/// `create_*` opcode group (§4.H) one level up from raw tags so the table
/// doesn't need 14 separate maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Buffer,
    Texture,
    Sampler,
    ShaderModule,
    RenderPipeline,
    ComputePipeline,
    BindGroup,
    BindGroupLayout,
    PipelineLayout,
    TextureView,
    ImageBitmap,
    QuerySet,
    RenderBundle,
    TypedArray,
}

impl ResourceKind {
    pub fn from_opcode(op: pngb_format::PngbOpcode) -> Option<Self> {
        use pngb_format::PngbOpcode::*;
        Some(match op {
            CreateBuffer => ResourceKind::Buffer,
            CreateTexture => ResourceKind::Texture,
            CreateSampler => ResourceKind::Sampler,
            CreateShaderModule | CreateShaderConcat => ResourceKind::ShaderModule,
            CreateRenderPipeline => ResourceKind::RenderPipeline,
            CreateComputePipeline => ResourceKind::ComputePipeline,
            CreateBindGroup => ResourceKind::BindGroup,
            CreateBindGroupLayout => ResourceKind::BindGroupLayout,
            CreatePipelineLayout => ResourceKind::PipelineLayout,
            CreateTextureView => ResourceKind::TextureView,
            CreateImageBitmap => ResourceKind::ImageBitmap,
            CreateQuerySet => ResourceKind::QuerySet,
            CreateRenderBundle => ResourceKind::RenderBundle,
            CreateTypedArray => ResourceKind::TypedArray,
            _ => return None,
        })
    }
}

/// Maps `(kind, pngb id)` to a stable [`Handle`], allocating a fresh handle
/// the first time a given pair is seen and returning the existing one on
/// every subsequent call.
#[derive(Debug, Default)]
pub struct ResourceTable {
    slots: HashMap<(ResourceKind, u16), Handle>,
    next: u32,
}

impl ResourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `(handle, created)`; `created` is `false` when this exact
    /// `(kind, id)` pair already had a handle.
    pub fn get_or_create(&mut self, kind: ResourceKind, id: u16) -> (Handle, bool) {
        if let Some(&handle) = self.slots.get(&(kind, id)) {
            return (handle, false);
        }
        let handle = Handle(self.next);
        self.next += 1;
        self.slots.insert((kind, id), handle);
        (handle, true)
    }

    pub fn get(&self, kind: ResourceKind, id: u16) -> Option<Handle> {
        self.slots.get(&(kind, id)).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
