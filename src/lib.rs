//! PNGine: compiles a declarative shader-art DSL to a PNGB bytecode module
//! and runs it on a small command-dispatch VM.
//!
//! This crate is a thin facade over three independently useful crates:
//! - [`pngb_format`] defines the wire-exact PNGB module shape.
//! - [`pngine_compiler`] lexes, parses, analyzes, and emits DSL source into
//!   a [`Module`](pngb_format::Module).
//! - [`pngine_vm`] loads a `Module` and dispatches its frames into GPU
//!   command buffers.
//!
//! ```no_run
//! use pngine::{compile, CompileOptions, Vm, FrameState};
//!
//! let module = compile("#frame main { perform = [] }", &CompileOptions::default())?;
//! let vm = Vm::load(module)?;
//! let mut state = FrameState::new();
//! let _command_buffer = vm.run_frame(0, &mut state)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use pngb_format;
pub use pngine_compiler::{compile, CompileError, CompileOptions};
pub use pngine_vm::{ExecutionError, FrameState, Vm};
