//! PNGB bytecode opcode tags (§4.H).
//!
//! Single-byte tags, distinct from the command-buffer opcodes of §4.M (those
//! live in `pngine-vm`). This enum is the data-side vocabulary shared by the
//! emitter (`pngine-compiler`) and the dispatcher (`pngine-vm`); neither
//! crate hand-maintains its own copy of the tag numbering.

/// One opcode per bytecode operation the emitter can produce and the
/// dispatcher must interpret. Numbering is stable across versions: the
/// emitter's "ID stability for deterministic bytecode diffs" invariant
/// (§4.H) extends to these tag values, so variants are append-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PngbOpcode {
    // Resource creation.
    CreateBuffer = 0,
    CreateTexture = 1,
    CreateSampler = 2,
    CreateShaderModule = 3,
    CreateShaderConcat = 4,
    CreateRenderPipeline = 5,
    CreateComputePipeline = 6,
    CreateBindGroup = 7,
    CreateBindGroupLayout = 8,
    CreatePipelineLayout = 9,
    CreateTextureView = 10,
    CreateImageBitmap = 11,
    CreateQuerySet = 12,
    CreateRenderBundle = 13,

    // Pass operations.
    BeginRenderPass = 14,
    BeginComputePass = 15,
    SetPipeline = 16,
    SetBindGroup = 17,
    SetVertexBuffer = 18,
    SetIndexBuffer = 19,
    Draw = 20,
    DrawIndexed = 21,
    Dispatch = 22,
    EndPass = 23,
    ExecuteBundles = 24,

    // Queue operations.
    WriteBuffer = 25,
    WriteTimeUniform = 26,
    CopyBufferToBuffer = 27,
    CopyTextureToTexture = 28,
    WriteBufferFromWasm = 29,
    CopyExternalImageToTexture = 30,

    // Data generation.
    CreateTypedArray = 31,
    FillConstant = 32,
    FillLinear = 33,
    FillElementIndex = 34,
    FillRandom = 35,
    FillExpression = 36,
    WriteBufferFromArray = 37,

    // Frame structure.
    DefineFrame = 38,
    DefinePass = 39,
    EndPassDef = 40,
    ExecPass = 41,
    ExecPassOnce = 42,
    Submit = 43,
    End = 44,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown PNGB opcode tag {0}")]
pub struct UnknownOpcode(pub u8);

impl PngbOpcode {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Result<Self, UnknownOpcode> {
        use PngbOpcode::*;
        Ok(match tag {
            0 => CreateBuffer,
            1 => CreateTexture,
            2 => CreateSampler,
            3 => CreateShaderModule,
            4 => CreateShaderConcat,
            5 => CreateRenderPipeline,
            6 => CreateComputePipeline,
            7 => CreateBindGroup,
            8 => CreateBindGroupLayout,
            9 => CreatePipelineLayout,
            10 => CreateTextureView,
            11 => CreateImageBitmap,
            12 => CreateQuerySet,
            13 => CreateRenderBundle,
            14 => BeginRenderPass,
            15 => BeginComputePass,
            16 => SetPipeline,
            17 => SetBindGroup,
            18 => SetVertexBuffer,
            19 => SetIndexBuffer,
            20 => Draw,
            21 => DrawIndexed,
            22 => Dispatch,
            23 => EndPass,
            24 => ExecuteBundles,
            25 => WriteBuffer,
            26 => WriteTimeUniform,
            27 => CopyBufferToBuffer,
            28 => CopyTextureToTexture,
            29 => WriteBufferFromWasm,
            30 => CopyExternalImageToTexture,
            31 => CreateTypedArray,
            32 => FillConstant,
            33 => FillLinear,
            34 => FillElementIndex,
            35 => FillRandom,
            36 => FillExpression,
            37 => WriteBufferFromArray,
            38 => DefineFrame,
            39 => DefinePass,
            40 => EndPassDef,
            41 => ExecPass,
            42 => ExecPassOnce,
            43 => Submit,
            44 => End,
            other => return Err(UnknownOpcode(other)),
        })
    }

    /// Resource-creation opcodes are the ones the dispatcher's idempotency
    /// table must de-duplicate across frames (§4.N item 4, §5, §8
    /// "Dispatcher idempotency").
    pub fn is_resource_creation(self) -> bool {
        (self.tag() as usize) <= (PngbOpcode::CreateRenderBundle.tag() as usize)
    }

    /// How many varint arguments follow this opcode's tag, so a scan that
    /// doesn't otherwise interpret the opcode can still advance past it and
    /// resynchronize with the next tag (§7 "unknown opcodes... advance by
    /// the opcode's declared argument length").
    pub fn arg_shape(self) -> ArgShape {
        use ArgShape::*;
        use PngbOpcode::*;
        match self {
            CreateBuffer | CreateTexture | CreateSampler | CreateShaderModule
            | CreateShaderConcat | CreateRenderPipeline | CreateComputePipeline
            | CreateBindGroup | CreateBindGroupLayout | CreatePipelineLayout
            | CreateTextureView | CreateImageBitmap | CreateQuerySet | CreateRenderBundle => {
                Varints(2)
            }
            BeginRenderPass | BeginComputePass | SetPipeline | SetIndexBuffer => Varints(1),
            SetBindGroup | SetVertexBuffer => Varints(2),
            Draw => Varints(4),
            DrawIndexed => Varints(5),
            Dispatch => Varints(3),
            EndPass => Varints(0),
            ExecuteBundles => CountPrefixed,
            // Queue operations are not emitted by the compiler yet; shapes
            // are placeholders sized for their obvious argument list so a
            // scan can still skip past one if it ever appears in bytecode
            // produced by another tool (§9 "render-bundle and query-set
            // opcodes are reserved... stubbed" is the same kind of gap).
            WriteBuffer => Varints(3),         // buffer_id, offset, data_id
            WriteTimeUniform => Varints(2),    // buffer_id, offset
            CopyBufferToBuffer => Varints(5),  // src, src_offset, dst, dst_offset, size
            CopyTextureToTexture => Varints(4), // src, dst, width, height
            WriteBufferFromWasm => Varints(2), // buffer_id, wasm_call_id
            CopyExternalImageToTexture => Varints(2), // texture_id, image_ref
            CreateTypedArray => Varints(2),
            FillConstant => Varints(3),      // array_id, count, data_id
            FillLinear => Varints(3),        // array_id, count, data_id
            FillElementIndex => Varints(2),  // array_id, count
            FillRandom => Varints(3),        // array_id, count, seed
            FillExpression => Varints(3),    // array_id, count, data_id
            WriteBufferFromArray => Varints(2), // buffer_id, array_id
            DefineFrame => Varints(2),
            DefinePass => Varints(1),
            EndPassDef => Varints(0),
            ExecPass | ExecPassOnce => Varints(1),
            Submit | End => Varints(0),
        }
    }
}

/// The shape of the argument bytes following an opcode's tag (§4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgShape {
    /// A fixed number of plain varints.
    Varints(u8),
    /// A varint count `n`, followed by `n` more varints (`execute_bundles`).
    CountPrefixed,
}
