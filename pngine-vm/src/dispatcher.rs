//! Bytecode dispatcher: loads a [`Module`](pngb_format::Module), materializes
//! its resource-creation prefix once, and replays individual frames into
//! [`CommandEncoder`] buffers on demand (§4.N, §5, §8).
//!
//! Two load-time passes over the bytecode do all the work:
//!   1. Resource creation and data-generation opcodes are dispatched
//!      immediately: resource handles land in a [`ResourceTable`], and
//!      `fill_*`/`write_buffer_from_array` opcodes materialize generated
//!      array bytes once rather than re-deriving them every frame. This is
//!      what gives repeated loads (or a bytecode stream that happens to
//!      redeclare a resource) idempotent behaviour (§8 "Dispatcher
//!      idempotency") — a frame replay never re-walks this prefix, so it
//!      can't re-create or re-generate anything either.
//!   2. Pass bodies (`define_pass` .. `end_pass_def`) and frame bodies
//!      (`define_frame` followed by its `exec_pass` list) are recorded as
//!      byte ranges, so [`Vm::run_frame`] only has to slice and translate,
//!      not re-scan the whole module.
//!
//! Pool ids: PNGB carries no explicit pool-width field (a `pool=N` buffer
//! declaration is expanded by the compiler into N plain `create_buffer`
//! ops that happen to share one `data_id`). The dispatcher reconstructs
//! pool ranges heuristically at load time by grouping consecutive
//! `create_buffer` ops with identical `data_id` and contiguous ids; a
//! buffer id inside such a group is rewritten round-robin by frame count
//! when a pass references it, giving the "animate through a ring buffer"
//! behaviour pooled buffers exist for.
//!
//! Opcodes a scan doesn't otherwise interpret are never dropped silently:
//! every scan consults [`PngbOpcode::arg_shape`] to skip exactly that
//! opcode's argument bytes and resynchronize with the next tag (§7).

use std::collections::HashMap;

use pngb_format::{ArgShape, DataId, DataSection, Module, PngbOpcode};

use crate::command::{CommandEncoder, CommandOp};
use crate::error::ExecutionError;
use crate::expr::Expr;
use crate::prng::Xorshift32;
use crate::resource::{ResourceKind, ResourceTable};

#[derive(Debug, Clone, Copy)]
struct PoolGroup {
    base_id: u16,
    width: u16,
}

#[derive(Debug, Clone)]
struct PassBody {
    start: usize,
    end: usize,
}

#[derive(Debug, Clone)]
struct FrameInfo {
    perform: Vec<u16>,
}

/// Per-frame dispatch counter, used to pick which buffer in a pool a pass
/// sees this time round (§4.N "pool id rewriting", §8).
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameState {
    pub frame_counter: u32,
}

impl FrameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self) {
        self.frame_counter = self.frame_counter.wrapping_add(1);
    }
}

/// A loaded module ready to dispatch frames from.
pub struct Vm {
    module: Module,
    resources: ResourceTable,
    passes: HashMap<u16, PassBody>,
    frames: HashMap<u16, FrameInfo>,
    frame_name_to_id: HashMap<u16, u16>,
    pools: HashMap<u16, PoolGroup>,
    /// Generated array contents, keyed by the `typed_array` id a `fill_*`
    /// opcode targeted (§4.H data generation). Populated once at load time.
    generated_arrays: HashMap<u16, Vec<f32>>,
    /// Buffer bytes a `write_buffer_from_array` opcode produced, keyed by
    /// the destination buffer id, for a host to upload once at load time.
    initial_buffer_data: HashMap<u16, Vec<u8>>,
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn read_op(&mut self) -> Result<PngbOpcode, ExecutionError> {
        let tag = *self
            .buf
            .get(self.pos)
            .ok_or(ExecutionError::Truncated(self.pos))?;
        let op = PngbOpcode::from_tag(tag).map_err(|_| ExecutionError::Truncated(self.pos))?;
        self.pos += 1;
        Ok(op)
    }

    fn read_varint(&mut self) -> Result<u32, ExecutionError> {
        let decoded = pngb_format::varint::decode(&self.buf[self.pos..])
            .map_err(|e| ExecutionError::BadVarint(self.pos, e))?;
        self.pos += decoded.len as usize;
        Ok(decoded.value)
    }

    /// Consumes exactly the argument bytes `shape` declares without
    /// interpreting them, so a scan that doesn't otherwise handle this
    /// opcode can still resynchronize with the next tag (§7).
    fn skip_args(&mut self, shape: ArgShape) -> Result<(), ExecutionError> {
        match shape {
            ArgShape::Varints(n) => {
                for _ in 0..n {
                    self.read_varint()?;
                }
            }
            ArgShape::CountPrefixed => {
                let count = self.read_varint()?;
                for _ in 0..count {
                    self.read_varint()?;
                }
            }
        }
        Ok(())
    }
}

/// Reads the little-endian `f32` at float-slot `index` of the blob `data_id`
/// points at (each data-generation float parameter is 4 bytes wide).
fn read_f32_param(data: &DataSection, data_id: u16, index: usize) -> Result<f32, ExecutionError> {
    let bytes = data
        .get(DataId::new(data_id))
        .map_err(|_| ExecutionError::BadGeneratorData(data_id))?;
    let start = index * 4;
    let chunk = bytes
        .get(start..start + 4)
        .ok_or(ExecutionError::BadGeneratorData(data_id))?;
    Ok(f32::from_le_bytes(chunk.try_into().unwrap()))
}

impl Vm {
    /// Loads `module`, running the resource-creation prefix immediately and
    /// indexing pass/frame bodies for later dispatch.
    pub fn load(module: Module) -> Result<Self, ExecutionError> {
        let mut resources = ResourceTable::new();
        let mut passes = HashMap::new();
        let mut frames = HashMap::new();
        let mut frame_name_to_id = HashMap::new();
        let mut buffer_creations: Vec<(u16, u16)> = Vec::new(); // (buffer_id, data_id)
        let mut generated_arrays: HashMap<u16, Vec<f32>> = HashMap::new();
        let mut initial_buffer_data: HashMap<u16, Vec<u8>> = HashMap::new();

        let mut cur = Cursor::new(&module.bytecode);
        while !cur.at_end() {
            let op = cur.read_op()?;
            match op {
                PngbOpcode::End | PngbOpcode::Submit => break,
                PngbOpcode::DefinePass => {
                    let pass_id = cur.read_varint()? as u16;
                    let start = cur.pos;
                    skip_pass_body(&mut cur)?;
                    // `skip_pass_body` consumes the trailing `end_pass_def`
                    // tag (a single byte, no operand) to know where to
                    // stop; exclude it from the recorded range so replay
                    // doesn't see it as an unrecognized opcode.
                    let end = cur.pos - 1;
                    passes.insert(pass_id, PassBody { start, end });
                }
                PngbOpcode::DefineFrame => {
                    let frame_id = cur.read_varint()? as u16;
                    let name = cur.read_varint()? as u16;
                    frame_name_to_id.insert(name, frame_id);
                    let mut perform = Vec::new();
                    while let Some(next_tag) = cur.buf.get(cur.pos) {
                        if *next_tag == PngbOpcode::ExecPass.tag() {
                            cur.pos += 1;
                            perform.push(cur.read_varint()? as u16);
                        } else {
                            break;
                        }
                    }
                    frames.insert(frame_id, FrameInfo { perform });
                }
                PngbOpcode::CreateBuffer => {
                    let id = cur.read_varint()? as u16;
                    let data_id = cur.read_varint()? as u16;
                    buffer_creations.push((id, data_id));
                    resources.get_or_create(ResourceKind::Buffer, id);
                }
                PngbOpcode::FillConstant => {
                    let array_id = cur.read_varint()? as u16;
                    let count = cur.read_varint()?;
                    let data_id = cur.read_varint()? as u16;
                    let value = read_f32_param(&module.data, data_id, 0)?;
                    generated_arrays.insert(array_id, vec![value; count as usize]);
                }
                PngbOpcode::FillLinear => {
                    let array_id = cur.read_varint()? as u16;
                    let count = cur.read_varint()?;
                    let data_id = cur.read_varint()? as u16;
                    let start = read_f32_param(&module.data, data_id, 0)?;
                    let step = read_f32_param(&module.data, data_id, 1)?;
                    let values = (0..count).map(|i| start + step * i as f32).collect();
                    generated_arrays.insert(array_id, values);
                }
                PngbOpcode::FillElementIndex => {
                    let array_id = cur.read_varint()? as u16;
                    let count = cur.read_varint()?;
                    let values = (0..count).map(|i| i as f32).collect();
                    generated_arrays.insert(array_id, values);
                }
                PngbOpcode::FillRandom => {
                    let array_id = cur.read_varint()? as u16;
                    let count = cur.read_varint()?;
                    let seed = cur.read_varint()?;
                    let mut rng = Xorshift32::new(seed);
                    let values = (0..count).map(|_| rng.next_f32()).collect();
                    generated_arrays.insert(array_id, values);
                }
                PngbOpcode::FillExpression => {
                    let array_id = cur.read_varint()? as u16;
                    let count = cur.read_varint()?;
                    let data_id = cur.read_varint()? as u16;
                    let expr_bytes = module
                        .data
                        .get(DataId::new(data_id))
                        .map_err(|_| ExecutionError::BadGeneratorData(data_id))?;
                    let expr_str = std::str::from_utf8(expr_bytes)
                        .map_err(|_| ExecutionError::BadGeneratorData(data_id))?;
                    let expr = Expr::parse(expr_str)?;
                    let values = (0..count).map(|i| expr.eval(i as f32)).collect();
                    generated_arrays.insert(array_id, values);
                }
                PngbOpcode::WriteBufferFromArray => {
                    let buffer_id = cur.read_varint()? as u16;
                    let array_id = cur.read_varint()? as u16;
                    if let Some(values) = generated_arrays.get(&array_id) {
                        let mut bytes = Vec::with_capacity(values.len() * 4);
                        for v in values {
                            bytes.extend_from_slice(&v.to_le_bytes());
                        }
                        initial_buffer_data.insert(buffer_id, bytes);
                    }
                }
                other => {
                    if let Some(kind) = ResourceKind::from_opcode(other) {
                        let id = cur.read_varint()? as u16;
                        let _data_or_arg = cur.read_varint()?;
                        resources.get_or_create(kind, id);
                    } else {
                        log::warn!(
                            "pngine-vm: unrecognized top-level opcode {other:?}, skipping its argument bytes to resynchronize"
                        );
                        cur.skip_args(other.arg_shape())?;
                    }
                }
            }
        }

        let pools = group_pools(&buffer_creations);

        Ok(Self {
            module,
            resources,
            passes,
            frames,
            frame_name_to_id,
            pools,
            generated_arrays,
            initial_buffer_data,
        })
    }

    /// Bytes a `write_buffer_from_array` opcode produced for `buffer_id`, if
    /// any — a host reads this once after [`Vm::load`] to seed that
    /// buffer's initial contents (§4.H data generation).
    pub fn initial_buffer_data(&self, buffer_id: u16) -> Option<&[u8]> {
        self.initial_buffer_data.get(&buffer_id).map(|v| v.as_slice())
    }

    /// The values a `fill_*` opcode generated for `array_id`, if any.
    pub fn generated_array(&self, array_id: u16) -> Option<&[f32]> {
        self.generated_arrays.get(&array_id).map(|v| v.as_slice())
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn resources(&self) -> &ResourceTable {
        &self.resources
    }

    /// Resolves the scene active at `time_ms` (§4.F `findSceneAtTime`) and
    /// runs that scene's frame.
    pub fn run_at_time(&self, time_ms: u32, state: &mut FrameState) -> Result<Vec<u8>, ExecutionError> {
        let anim = self
            .module
            .animation
            .as_ref()
            .ok_or(ExecutionError::NoSceneAtTime(time_ms as u64))?;
        let scene_index = anim
            .find_scene_at_time(time_ms)
            .ok_or(ExecutionError::NoSceneAtTime(time_ms as u64))?;
        let scene = &anim.scenes[scene_index];
        let frame_id = *self
            .frame_name_to_id
            .get(&scene.frame.index())
            .ok_or(ExecutionError::UnknownFrame(scene.frame.index()))?;
        self.run_frame(frame_id, state)
    }

    /// Translates one frame's passes into a single command buffer.
    pub fn run_frame(&self, frame_id: u16, state: &mut FrameState) -> Result<Vec<u8>, ExecutionError> {
        let frame = self
            .frames
            .get(&frame_id)
            .ok_or(ExecutionError::UnknownFrame(frame_id))?;

        let mut enc = CommandEncoder::new();
        for &pass_id in &frame.perform {
            let pass = self
                .passes
                .get(&pass_id)
                .ok_or(ExecutionError::UnknownPass(pass_id))?;
            self.translate_pass(pass, state, &mut enc)?;
        }
        enc.push_op(CommandOp::Submit);
        state.advance();
        Ok(enc.finish(0))
    }

    /// Resolves a buffer id that may fall inside a pool to the slot this
    /// frame should use: `base + (frame_counter mod width)`.
    fn rewrite_buffer_id(&self, id: u16, state: &FrameState) -> u16 {
        if let Some(pool) = self.pools.get(&id) {
            let offset = (state.frame_counter % pool.width as u32) as u16;
            return pool.base_id + offset;
        }
        id
    }

    fn translate_pass(
        &self,
        pass: &PassBody,
        state: &FrameState,
        enc: &mut CommandEncoder,
    ) -> Result<(), ExecutionError> {
        let body = &self.module.bytecode[pass.start..pass.end];
        let mut cur = Cursor::new(body);
        while !cur.at_end() {
            let op = cur.read_op()?;
            match op {
                PngbOpcode::BeginRenderPass => {
                    let id = cur.read_varint()?;
                    enc.push_op(CommandOp::BeginRenderPass).push_varint(id);
                }
                PngbOpcode::BeginComputePass => {
                    let id = cur.read_varint()?;
                    enc.push_op(CommandOp::BeginComputePass).push_varint(id);
                }
                PngbOpcode::SetPipeline => {
                    let id = cur.read_varint()?;
                    enc.push_op(CommandOp::SetPipeline).push_varint(id);
                }
                PngbOpcode::SetBindGroup => {
                    let index = cur.read_varint()?;
                    let id = cur.read_varint()?;
                    enc.push_op(CommandOp::SetBindGroup).push_varint(index).push_varint(id);
                }
                PngbOpcode::SetVertexBuffer => {
                    let slot = cur.read_varint()?;
                    let buffer_id = self.rewrite_buffer_id(cur.read_varint()? as u16, state);
                    enc.push_op(CommandOp::SetVertexBuffer)
                        .push_varint(slot)
                        .push_varint(buffer_id as u32);
                }
                PngbOpcode::SetIndexBuffer => {
                    let buffer_id = self.rewrite_buffer_id(cur.read_varint()? as u16, state);
                    enc.push_op(CommandOp::SetIndexBuffer).push_varint(buffer_id as u32);
                }
                PngbOpcode::Draw => {
                    let vertex_count = cur.read_varint()?;
                    let instances = cur.read_varint()?;
                    let first_vertex = cur.read_varint()?;
                    let first_instance = cur.read_varint()?;
                    enc.push_op(CommandOp::Draw)
                        .push_varint(vertex_count)
                        .push_varint(instances)
                        .push_varint(first_vertex)
                        .push_varint(first_instance);
                }
                PngbOpcode::DrawIndexed => {
                    let index_count = cur.read_varint()?;
                    let instances = cur.read_varint()?;
                    let first_index = cur.read_varint()?;
                    let base_vertex = cur.read_varint()?;
                    let first_instance = cur.read_varint()?;
                    enc.push_op(CommandOp::DrawIndexed)
                        .push_varint(index_count)
                        .push_varint(instances)
                        .push_varint(first_index)
                        .push_varint(base_vertex)
                        .push_varint(first_instance);
                }
                PngbOpcode::Dispatch => {
                    let x = cur.read_varint()?;
                    let y = cur.read_varint()?;
                    let z = cur.read_varint()?;
                    enc.push_op(CommandOp::Dispatch).push_varint(x).push_varint(y).push_varint(z);
                }
                PngbOpcode::ExecuteBundles => {
                    let count = cur.read_varint()?;
                    enc.push_op(CommandOp::ExecuteBundles).push_varint(count);
                    for _ in 0..count {
                        let id = cur.read_varint()?;
                        enc.push_varint(id);
                    }
                }
                PngbOpcode::EndPass => {
                    enc.push_op(CommandOp::EndPass);
                }
                other => {
                    log::warn!(
                        "pngine-vm: unrecognized pass opcode {other:?}, skipping its argument bytes to resynchronize"
                    );
                    cur.skip_args(other.arg_shape())?;
                }
            }
        }
        Ok(())
    }
}

/// Consumes a `define_pass` body up to and including its matching
/// `end_pass_def`, without attempting to interpret the ops in between —
/// the load-time scan only needs the byte range.
fn skip_pass_body(cur: &mut Cursor) -> Result<(), ExecutionError> {
    loop {
        let op = cur.read_op()?;
        if op == PngbOpcode::EndPassDef {
            return Ok(());
        }
        // Every other opcode inside a pass body — including ones this scan
        // has no other use for — is skipped by its declared argument
        // length rather than aborting the scan, so the `end_pass_def` that
        // ends this body is never missed and the caller's recorded pass
        // boundary stays correct (§7).
        cur.skip_args(op.arg_shape())?;
    }
}

/// Groups consecutive `(buffer_id, data_id)` creations that share a
/// `data_id` and contiguous ids into pools, keyed by every id the group
/// covers so lookup from any member id finds the group.
fn group_pools(creations: &[(u16, u16)]) -> HashMap<u16, PoolGroup> {
    let mut pools = HashMap::new();
    let mut i = 0;
    while i < creations.len() {
        let (base_id, data_id) = creations[i];
        let mut width: u16 = 1;
        let mut j = i + 1;
        while j < creations.len() {
            let (id, d) = creations[j];
            if d == data_id && id == base_id + width {
                width += 1;
                j += 1;
            } else {
                break;
            }
        }
        if width > 1 {
            let group = PoolGroup { base_id, width };
            for offset in 0..width {
                pools.insert(base_id + offset, group);
            }
        }
        i = j;
    }
    pools
}

#[cfg(test)]
mod tests {
    use super::*;
    use pngb_format::PluginBits;

    fn bytecode_with_pool() -> Vec<u8> {
        let mut code = Vec::new();
        // Three pooled buffers sharing data_id 0.
        for id in 0..3u32 {
            code.push(PngbOpcode::CreateBuffer.tag());
            pngb_format::varint::encode(id, &mut code);
            pngb_format::varint::encode(0, &mut code);
        }
        // One pass that sets a vertex buffer (id 0, which is pooled) and draws.
        code.push(PngbOpcode::DefinePass.tag());
        pngb_format::varint::encode(0, &mut code);
        code.push(PngbOpcode::BeginRenderPass.tag());
        pngb_format::varint::encode(0, &mut code);
        code.push(PngbOpcode::SetVertexBuffer.tag());
        pngb_format::varint::encode(0, &mut code);
        pngb_format::varint::encode(0, &mut code);
        code.push(PngbOpcode::Draw.tag());
        for _ in 0..4 {
            pngb_format::varint::encode(0, &mut code);
        }
        code.push(PngbOpcode::EndPass.tag());
        code.push(PngbOpcode::EndPassDef.tag());
        // One frame performing that pass.
        code.push(PngbOpcode::DefineFrame.tag());
        pngb_format::varint::encode(0, &mut code);
        pngb_format::varint::encode(0, &mut code);
        code.push(PngbOpcode::ExecPass.tag());
        pngb_format::varint::encode(0, &mut code);
        code.push(PngbOpcode::Submit.tag());
        code.push(PngbOpcode::End.tag());
        code
    }

    #[test]
    fn load_materializes_one_handle_per_declared_buffer() {
        let module = Module::new(bytecode_with_pool(), PluginBits::CORE);
        let vm = Vm::load(module).unwrap();
        assert_eq!(vm.resources().len(), 3);
    }

    #[test]
    fn running_a_frame_twice_does_not_grow_the_resource_table() {
        // §8 "Dispatcher idempotency": replaying a frame must not re-walk
        // the resource-creation prefix, so the table stays at its
        // load-time size no matter how many times a frame is dispatched.
        let module = Module::new(bytecode_with_pool(), PluginBits::CORE);
        let vm = Vm::load(module).unwrap();
        let mut state = FrameState::new();
        vm.run_frame(0, &mut state).unwrap();
        vm.run_frame(0, &mut state).unwrap();
        vm.run_frame(0, &mut state).unwrap();
        assert_eq!(vm.resources().len(), 3);
    }

    #[test]
    fn running_the_same_frame_rotates_through_the_pool() {
        let module = Module::new(bytecode_with_pool(), PluginBits::CORE);
        let vm = Vm::load(module).unwrap();
        let mut state = FrameState::new();
        let first = vm.run_frame(0, &mut state).unwrap();
        let second = vm.run_frame(0, &mut state).unwrap();
        // Not identical: the rewritten vertex buffer id differs between the
        // two calls once the pool rotates.
        assert_ne!(first, second);
    }

    #[test]
    fn unknown_frame_is_reported() {
        let module = Module::new(bytecode_with_pool(), PluginBits::CORE);
        let vm = Vm::load(module).unwrap();
        let mut state = FrameState::new();
        assert_eq!(vm.run_frame(99, &mut state), Err(ExecutionError::UnknownFrame(99)));
    }

    fn two_frame_bytecode() -> (Vec<u8>, pngb_format::StringId, pngb_format::StringId) {
        use pngb_format::StringId;
        let mut code = Vec::new();
        // Two trivial passes, one per frame.
        for pass_id in 0u32..2 {
            code.push(PngbOpcode::DefinePass.tag());
            pngb_format::varint::encode(pass_id, &mut code);
            code.push(PngbOpcode::BeginRenderPass.tag());
            pngb_format::varint::encode(pass_id, &mut code);
            code.push(PngbOpcode::EndPass.tag());
            code.push(PngbOpcode::EndPassDef.tag());
        }
        let name_a = StringId::new(10);
        let name_b = StringId::new(11);
        for (frame_id, name, pass_id) in [(0u32, name_a, 0u32), (1, name_b, 1)] {
            code.push(PngbOpcode::DefineFrame.tag());
            pngb_format::varint::encode(frame_id, &mut code);
            pngb_format::varint::encode(name.index() as u32, &mut code);
            code.push(PngbOpcode::ExecPass.tag());
            pngb_format::varint::encode(pass_id, &mut code);
        }
        code.push(PngbOpcode::Submit.tag());
        code.push(PngbOpcode::End.tag());
        (code, name_a, name_b)
    }

    #[test]
    fn run_at_time_selects_the_scene_that_covers_that_time() {
        use pngb_format::animation::{AnimationTable, EndBehavior, Scene};
        use pngb_format::StringId;

        let (code, name_a, name_b) = two_frame_bytecode();
        let mut module = Module::new(code, PluginBits::CORE | PluginBits::ANIM);
        module.animation = Some(
            AnimationTable::new(
                StringId::new(0),
                10_000,
                false,
                EndBehavior::Stop,
                vec![
                    Scene {
                        id: StringId::new(1),
                        frame: name_a,
                        start_ms: 0,
                        end_ms: 5000,
                    },
                    Scene {
                        id: StringId::new(2),
                        frame: name_b,
                        start_ms: 5000,
                        end_ms: 10_000,
                    },
                ],
            )
            .unwrap(),
        );

        let vm = Vm::load(module).unwrap();
        let mut state = FrameState::new();
        let early = vm.run_at_time(1000, &mut state).unwrap();
        let late = vm.run_at_time(6000, &mut state).unwrap();
        assert_ne!(early, late);
        assert_eq!(
            vm.run_at_time(20_000, &mut state),
            Err(ExecutionError::NoSceneAtTime(20_000))
        );
    }

    #[test]
    fn unrecognized_top_level_opcode_is_skipped_not_fatal() {
        // §7: an opcode the load scan doesn't special-case must be skipped
        // by its declared argument length, not treated as a scan-ending
        // error — the `create_buffer` after it must still be materialized.
        let mut code = Vec::new();
        code.push(PngbOpcode::CreateBuffer.tag());
        pngb_format::varint::encode(0, &mut code);
        pngb_format::varint::encode(0, &mut code);
        code.push(PngbOpcode::WriteBuffer.tag());
        pngb_format::varint::encode(0, &mut code);
        pngb_format::varint::encode(0, &mut code);
        pngb_format::varint::encode(0, &mut code);
        code.push(PngbOpcode::CreateBuffer.tag());
        pngb_format::varint::encode(1, &mut code);
        pngb_format::varint::encode(0, &mut code);
        code.push(PngbOpcode::Submit.tag());
        code.push(PngbOpcode::End.tag());

        let module = Module::new(code, PluginBits::CORE);
        let vm = Vm::load(module).unwrap();
        assert_eq!(vm.resources().len(), 2);
    }

    fn pass_body_with_unrecognized_opcode() -> Vec<u8> {
        let mut code = Vec::new();
        code.push(PngbOpcode::DefinePass.tag());
        pngb_format::varint::encode(0, &mut code);
        code.push(PngbOpcode::BeginRenderPass.tag());
        pngb_format::varint::encode(0, &mut code);
        code.push(PngbOpcode::WriteBuffer.tag());
        pngb_format::varint::encode(0, &mut code);
        pngb_format::varint::encode(0, &mut code);
        pngb_format::varint::encode(0, &mut code);
        code.push(PngbOpcode::EndPass.tag());
        code.push(PngbOpcode::EndPassDef.tag());
        code.push(PngbOpcode::DefineFrame.tag());
        pngb_format::varint::encode(0, &mut code);
        pngb_format::varint::encode(0, &mut code);
        code.push(PngbOpcode::ExecPass.tag());
        pngb_format::varint::encode(0, &mut code);
        code.push(PngbOpcode::Submit.tag());
        code.push(PngbOpcode::End.tag());
        code
    }

    #[test]
    fn pass_body_resync_keeps_the_pass_boundary_correct() {
        // The worst case of the same bug: a wrong pass boundary would either
        // mis-slice the next pass or leave `run_frame` unable to find
        // `end_pass_def` at all. An opcode inside the body that isn't
        // specially handled must still be skipped by its argument length.
        let module = Module::new(pass_body_with_unrecognized_opcode(), PluginBits::CORE);
        let vm = Vm::load(module).unwrap();
        let mut state = FrameState::new();
        let buf = vm.run_frame(0, &mut state).unwrap();
        assert!(!buf.is_empty());
    }

    #[test]
    fn fill_constant_materializes_a_repeated_value() {
        let mut data = pngb_format::DataSection::new();
        let data_id = data.add_bytes(&2.5f32.to_le_bytes()).unwrap();

        let mut code = Vec::new();
        code.push(PngbOpcode::FillConstant.tag());
        pngb_format::varint::encode(0, &mut code);
        pngb_format::varint::encode(4, &mut code);
        pngb_format::varint::encode(data_id.index() as u32, &mut code);
        code.push(PngbOpcode::Submit.tag());
        code.push(PngbOpcode::End.tag());

        let mut module = Module::new(code, PluginBits::CORE);
        module.data = data;
        let vm = Vm::load(module).unwrap();
        assert_eq!(vm.generated_array(0).unwrap(), &[2.5, 2.5, 2.5, 2.5]);
    }

    #[test]
    fn fill_linear_produces_a_start_step_ramp() {
        let mut data = pngb_format::DataSection::new();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1.0f32.to_le_bytes());
        bytes.extend_from_slice(&0.5f32.to_le_bytes());
        let data_id = data.add_bytes(&bytes).unwrap();

        let mut code = Vec::new();
        code.push(PngbOpcode::FillLinear.tag());
        pngb_format::varint::encode(0, &mut code);
        pngb_format::varint::encode(4, &mut code);
        pngb_format::varint::encode(data_id.index() as u32, &mut code);
        code.push(PngbOpcode::Submit.tag());
        code.push(PngbOpcode::End.tag());

        let mut module = Module::new(code, PluginBits::CORE);
        module.data = data;
        let vm = Vm::load(module).unwrap();
        assert_eq!(vm.generated_array(0).unwrap(), &[1.0, 1.5, 2.0, 2.5]);
    }

    #[test]
    fn fill_element_index_counts_up_from_zero() {
        let mut code = Vec::new();
        code.push(PngbOpcode::FillElementIndex.tag());
        pngb_format::varint::encode(0, &mut code);
        pngb_format::varint::encode(5, &mut code);
        code.push(PngbOpcode::Submit.tag());
        code.push(PngbOpcode::End.tag());

        let module = Module::new(code, PluginBits::CORE);
        let vm = Vm::load(module).unwrap();
        assert_eq!(vm.generated_array(0).unwrap(), &[0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn fill_random_is_deterministic_for_a_fixed_seed() {
        let mut code = Vec::new();
        code.push(PngbOpcode::FillRandom.tag());
        pngb_format::varint::encode(0, &mut code);
        pngb_format::varint::encode(8, &mut code);
        pngb_format::varint::encode(42, &mut code);
        code.push(PngbOpcode::Submit.tag());
        code.push(PngbOpcode::End.tag());

        let module_a = Module::new(code.clone(), PluginBits::CORE);
        let module_b = Module::new(code, PluginBits::CORE);
        let vm_a = Vm::load(module_a).unwrap();
        let vm_b = Vm::load(module_b).unwrap();
        assert_eq!(vm_a.generated_array(0), vm_b.generated_array(0));
        assert_eq!(vm_a.generated_array(0).unwrap().len(), 8);
    }

    #[test]
    fn fill_expression_evaluates_per_element() {
        let mut data = pngb_format::DataSection::new();
        let data_id = data.add_bytes(b"i * 2").unwrap();

        let mut code = Vec::new();
        code.push(PngbOpcode::FillExpression.tag());
        pngb_format::varint::encode(0, &mut code);
        pngb_format::varint::encode(3, &mut code);
        pngb_format::varint::encode(data_id.index() as u32, &mut code);
        code.push(PngbOpcode::Submit.tag());
        code.push(PngbOpcode::End.tag());

        let mut module = Module::new(code, PluginBits::CORE);
        module.data = data;
        let vm = Vm::load(module).unwrap();
        assert_eq!(vm.generated_array(0).unwrap(), &[0.0, 2.0, 4.0]);
    }

    #[test]
    fn write_buffer_from_array_materializes_initial_buffer_bytes() {
        let mut code = Vec::new();
        code.push(PngbOpcode::FillElementIndex.tag());
        pngb_format::varint::encode(7, &mut code); // array_id
        pngb_format::varint::encode(2, &mut code); // count
        code.push(PngbOpcode::CreateBuffer.tag());
        pngb_format::varint::encode(3, &mut code); // buffer_id
        pngb_format::varint::encode(0, &mut code); // data_id (unused here)
        code.push(PngbOpcode::WriteBufferFromArray.tag());
        pngb_format::varint::encode(3, &mut code); // buffer_id
        pngb_format::varint::encode(7, &mut code); // array_id
        code.push(PngbOpcode::Submit.tag());
        code.push(PngbOpcode::End.tag());

        let module = Module::new(code, PluginBits::CORE);
        let vm = Vm::load(module).unwrap();
        let mut expected = Vec::new();
        expected.extend_from_slice(&0.0f32.to_le_bytes());
        expected.extend_from_slice(&1.0f32.to_le_bytes());
        assert_eq!(vm.initial_buffer_data(3), Some(expected.as_slice()));
    }
}
