//! PNGine DSL compiler: lexer, iterative-descent parser, analyzer, and
//! bytecode emitter (§4.I–L). `compile` is the single entry point; everything
//! else in this crate exists to support it, but stays public so tooling can
//! stop partway through the pipeline (e.g. to print an AST for debugging).

pub mod analyzer;
pub mod ast;
pub mod emit;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::Ast;
pub use error::{AnalyzeError, CompileError, EmitError, LexError, ParseError};
pub use pngb_format::Module;

/// Knobs the caller can tune before compiling; currently only a switch for
/// whether to keep the AST's interning of pass names case-sensitive. Fields
/// are intentionally sparse — add them as the DSL grows options worth
/// exposing, not speculatively.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Reserved for future use (e.g. optimization level, target plugin
    /// allowlist). Present so call sites don't need to change signature
    /// when the first real option lands.
    pub _reserved: (),
}

/// Compiles DSL source text to a fully assembled [`Module`] (§4.I–L).
pub fn compile(source: &str, _options: &CompileOptions) -> Result<Module, CompileError> {
    let ast = parser::parse(source)?;
    let analysis = analyzer::analyze(&ast)?;
    let module = emit::emit(&ast, &analysis)?;
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_minimal_triangle_to_a_module() {
        let src = r#"
            #shaderModule tri {
                source = "fn vs_main() {} fn fs_main() {}"
            }
            #renderPipeline p {
                shader = $shaderModule.tri
            }
            #renderPass drawTri {
                pipeline = $renderPipeline.p
                draw = 3
            }
            #frame main {
                perform = [drawTri]
            }
        "#;
        let module = compile(src, &CompileOptions::default()).unwrap();
        assert!(module.plugins.contains(pngb_format::PluginBits::RENDER));
        let bytes = module.serialize();
        let restored = Module::deserialize(&bytes).unwrap();
        assert_eq!(restored.bytecode, module.bytecode);
    }

    #[test]
    fn duplicate_declaration_surfaces_as_a_compile_error() {
        let src = r#"
            #buffer a { size = 16 }
            #buffer a { size = 32 }
        "#;
        let err = compile(src, &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, CompileError::Analyze(_)));
    }

    #[test]
    fn lexer_errors_propagate_through_compile_error() {
        let err = compile("#buffer b { size ~ 1 }", &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, CompileError::Parse(_)));
    }
}
