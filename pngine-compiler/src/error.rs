//! Compiler error types, one per pipeline stage, aggregated into
//! `CompileError` (§7 "errors are surfaced with source spans").

use crate::token::Span;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at {span:?}")]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected} at {span:?}")]
pub struct ParseError {
    pub span: Span,
    pub expected: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzeErrorKind {
    DuplicateName,
    UnresolvedReference,
    ImportCycle,
    InvalidFormStructure,
    UnknownMacro,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?}: {message} at {span:?}")]
pub struct AnalyzeError {
    pub kind: AnalyzeErrorKind,
    pub span: Span,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitErrorKind {
    TooManyStrings,
    TooManyResources,
    BadVarint,
    UnknownGeneratorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?}: {message}")]
pub struct EmitError {
    pub kind: EmitErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Analyze(#[from] AnalyzeError),
    #[error(transparent)]
    Emit(#[from] EmitError),
}
