//! Dispatcher error type (§4.N, §7).

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("frame id {0} has no matching define_frame in this module")]
    UnknownFrame(u16),
    #[error("pass id {0} has no matching define_pass in this module")]
    UnknownPass(u16),
    #[error("bytecode ended mid-instruction at offset {0}")]
    Truncated(usize),
    #[error("malformed varint at offset {0}: {1}")]
    BadVarint(usize, pngb_format::varint::VarintError),
    #[error("animation table has no scene covering time {0}ms")]
    NoSceneAtTime(u64),
    #[error("data generation opcode referenced data id {0} with a missing or malformed payload")]
    BadGeneratorData(u16),
    #[error("fill_expression descriptor is not a valid expression: {0}")]
    BadExpression(#[from] crate::expr::ExprError),
}
