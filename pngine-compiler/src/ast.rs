//! Flat AST: a `Vec<Node>` plus an `extra_data: Vec<u32>` side array for
//! variable-arity children, instead of a pointer tree (§3, §9 "flat AST over
//! pointer trees"). `Root` is always node index 0.

use crate::token::Token;

pub type NodeIndex = u32;

pub const ROOT: NodeIndex = 0;

/// Sentinel meaning "no token" (e.g. a form with no label).
pub const NO_TOKEN: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeTag {
    /// Top-level container. `lhs..lhs+rhs` in `extra_data` lists the
    /// top-level `Form` node indices, in declaration order.
    Root,
    /// `#<macro_name> <label>? { <body> }`. `main_token` is the macro-name
    /// identifier token (right after `#`). `lhs` is the label token index
    /// (`NO_TOKEN` if the form has no label). `rhs` is the body `Object`
    /// node index.
    Form,
    /// `key = value`. `main_token` is the key identifier token. `lhs` is the
    /// value node index.
    Property,
    /// `{ key = value ... }`. `lhs..lhs+rhs` in `extra_data` lists `Property`
    /// node indices.
    Object,
    /// `[ value, value, ... ]`. `lhs..lhs+rhs` in `extra_data` lists value
    /// node indices (any of `Ident`/`Str`/`Num`/`Reference`/`Object`/`Array`).
    Array,
    /// A bare identifier used as an atom (e.g. `UNIFORM`). `main_token` is
    /// the identifier token.
    Ident,
    /// A string literal. `main_token` is the string token (quotes included;
    /// use `lexer::unescape_string` to get the contents).
    Str,
    /// A number literal. `main_token` is the number token.
    Num,
    /// `$namespace.name`. `main_token` is the namespace identifier token,
    /// `lhs` is the name identifier token.
    Reference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    pub tag: NodeTag,
    pub main_token: u32,
    pub lhs: u32,
    pub rhs: u32,
}

pub struct Ast {
    pub nodes: Vec<Node>,
    pub extra_data: Vec<u32>,
    pub tokens: Vec<Token>,
    pub source: String,
}

impl Ast {
    pub(crate) fn new(tokens: Vec<Token>, source: String) -> Self {
        // Reserve node 0 for Root; it's patched once top-level forms are known.
        let nodes = vec![Node {
            tag: NodeTag::Root,
            main_token: NO_TOKEN,
            lhs: 0,
            rhs: 0,
        }];
        Self {
            nodes,
            extra_data: Vec::new(),
            tokens,
            source,
        }
    }

    pub(crate) fn push_node(&mut self, node: Node) -> NodeIndex {
        let index = self.nodes.len() as NodeIndex;
        self.nodes.push(node);
        index
    }

    pub(crate) fn push_extra(&mut self, children: &[u32]) -> (u32, u32) {
        let start = self.extra_data.len() as u32;
        self.extra_data.extend_from_slice(children);
        (start, children.len() as u32)
    }

    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.nodes[index as usize]
    }

    pub fn children(&self, node: &Node) -> &[u32] {
        &self.extra_data[node.lhs as usize..(node.lhs + node.rhs) as usize]
    }

    pub fn token_text(&self, token_index: u32) -> &str {
        let span = self.tokens[token_index as usize].span;
        &self.source[span.start as usize..span.end as usize]
    }

    pub fn root_forms(&self) -> &[u32] {
        self.children(self.node(ROOT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Span, TokenKind};

    #[test]
    fn root_is_always_index_zero() {
        let ast = Ast::new(vec![], String::new());
        assert_eq!(ast.node(ROOT).tag, NodeTag::Root);
    }

    #[test]
    fn extra_data_round_trips_children() {
        let mut ast = Ast::new(vec![], String::new());
        let a = ast.push_node(Node {
            tag: NodeTag::Ident,
            main_token: 0,
            lhs: 0,
            rhs: 0,
        });
        let b = ast.push_node(Node {
            tag: NodeTag::Ident,
            main_token: 1,
            lhs: 0,
            rhs: 0,
        });
        let (start, count) = ast.push_extra(&[a, b]);
        ast.nodes[ROOT as usize].lhs = start;
        ast.nodes[ROOT as usize].rhs = count;
        assert_eq!(ast.root_forms(), &[a, b]);
    }

    #[test]
    fn token_text_slices_source() {
        let tokens = vec![Token {
            kind: TokenKind::Identifier,
            span: Span::new(1, 4),
        }];
        let ast = Ast::new(tokens, "#foo".to_string());
        assert_eq!(ast.token_text(0), "foo");
    }
}
