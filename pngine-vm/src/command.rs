//! GPU command buffer wire format the dispatcher produces (§4.M).
//!
//! Distinct opcode numbering from PNGB's bytecode (`pngb_format::PngbOpcode`)
//! — the two vocabularies serve different consumers and are allowed to
//! diverge. Grounded on the teacher's `CommandEncoder` (`webgpu/command.rs`):
//! an encoder that appends one command at a time to a growing buffer, kept
//! here as a byte stream instead of an in-memory `Command` enum because
//! `pngine-vm` hands this buffer to a host process, not to an in-process
//! GPU call.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandOp {
    // Resource creation, 0x01..0x0D.
    CreateBuffer = 0x01,
    CreateTexture = 0x02,
    CreateSampler = 0x03,
    CreateShaderModule = 0x04,
    CreateRenderPipeline = 0x05,
    CreateComputePipeline = 0x06,
    CreateBindGroup = 0x07,
    CreateTextureView = 0x08,
    CreateQuerySet = 0x09,
    CreateBindGroupLayout = 0x0A,
    CreateImageBitmap = 0x0B,
    CreatePipelineLayout = 0x0C,
    CreateRenderBundle = 0x0D,

    // Pass operations, 0x10..0x1A.
    BeginRenderPass = 0x10,
    BeginComputePass = 0x11,
    SetPipeline = 0x12,
    SetBindGroup = 0x13,
    SetVertexBuffer = 0x14,
    Draw = 0x15,
    DrawIndexed = 0x16,
    EndPass = 0x17,
    Dispatch = 0x18,
    SetIndexBuffer = 0x19,
    ExecuteBundles = 0x1A,

    // Queue operations, 0x20..0x25.
    WriteBuffer = 0x20,
    WriteTimeUniform = 0x21,
    CopyBufferToBuffer = 0x22,
    CopyTextureToTexture = 0x23,
    WriteBufferFromWasm = 0x24,
    CopyExternalImageToTexture = 0x25,

    // WASM operations, 0x30/0x31. `call_wasm_func`'s payload is inlined
    // directly after the opcode as fixed-width fields (not varints):
    // `[call_id:u16][module_id:u16][name_ptr:u32][name_len:u32]
    // [arg_count:u8][arg_bytes..]`, so a call's argument bytes never point
    // into transient stack memory.
    InitWasmModule = 0x30,
    CallWasmFunc = 0x31,

    // Control.
    Submit = 0xF0,
    End = 0xFF,
}

impl CommandOp {
    pub fn tag(self) -> u8 {
        self as u8
    }
}

/// Appends commands to a growing byte buffer; `finish` wraps them with the
/// 8-byte header `[total_len:u32][cmd_count:u16][flags:u16]` (§4.M).
#[derive(Debug, Default)]
pub struct CommandEncoder {
    ops: Vec<u8>,
    count: u16,
}

impl CommandEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_op(&mut self, op: CommandOp) -> &mut Self {
        self.ops.push(op.tag());
        self.count += 1;
        self
    }

    pub fn push_varint(&mut self, value: u32) -> &mut Self {
        pngb_format::varint::encode(value, &mut self.ops);
        self
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.ops.extend_from_slice(bytes);
        self
    }

    pub fn command_count(&self) -> u16 {
        self.count
    }

    /// Wraps the recorded ops with the command-buffer header. `flags` is
    /// reserved for future per-buffer metadata (e.g. "contains WASM calls");
    /// `0` until a consumer needs one.
    pub fn finish(self, flags: u16) -> Vec<u8> {
        let total_len = 8 + self.ops.len() as u32;
        let mut out = Vec::with_capacity(total_len as usize);
        out.extend_from_slice(&total_len.to_le_bytes());
        out.extend_from_slice(&self.count.to_le_bytes());
        out.extend_from_slice(&flags.to_le_bytes());
        out.extend_from_slice(&self.ops);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_reflects_length_and_count() {
        let mut enc = CommandEncoder::new();
        enc.push_op(CommandOp::SetPipeline).push_varint(2);
        enc.push_op(CommandOp::Draw).push_varint(3).push_varint(1).push_varint(0).push_varint(0);
        let buf = enc.finish(0);
        let total_len = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        let count = u16::from_le_bytes(buf[4..6].try_into().unwrap());
        assert_eq!(total_len as usize, buf.len());
        assert_eq!(count, 2);
    }
}
