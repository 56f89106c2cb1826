//! Command-dispatch virtual machine (§4.N–§5): loads a PNGB
//! [`Module`](pngb_format::Module) produced by `pngine-compiler` and
//! replays individual frames as GPU command buffers a host can execute.
//!
//! This crate has no GPU backend of its own — [`resource::Handle`] is an
//! opaque marker, not a live wgpu resource. A host process owns the actual
//! device/queue and maps handles to its own resources; that boundary keeps
//! this crate runnable in contexts (servers, tests, headless tooling) that
//! never touch a GPU at all.

pub mod command;
pub mod dispatcher;
pub mod error;
pub mod expr;
pub mod prng;
pub mod resource;

pub use command::{CommandEncoder, CommandOp};
pub use dispatcher::{FrameState, Vm};
pub use error::ExecutionError;
pub use expr::{Expr, ExprError};
pub use prng::Xorshift32;
pub use resource::{Handle, ResourceKind, ResourceTable};
