//! Iterative-descent parser (§4.J): turns a token stream into the flat AST.
//! Every nested `{...}`/`[...]` is parsed with an explicit `Vec<Frame>` stack
//! rather than recursive calls, so pathological nesting depth can't blow the
//! Rust call stack. The parser never panics; malformed input always comes
//! back as a `ParseError` with a span.

use crate::ast::{Ast, Node, NodeIndex, NodeTag};
use crate::error::ParseError;
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

pub fn parse(source: &str) -> Result<Ast, ParseError> {
    let tokens = Lexer::tokenize(source).map_err(|e| ParseError {
        span: e.span,
        expected: e.message,
    })?;
    let mut parser = Parser {
        ast: Ast::new(tokens, source.to_string()),
        pos: 0,
    };
    parser.parse_root()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Object,
    Array,
}

struct Frame {
    kind: FrameKind,
    children: Vec<NodeIndex>,
    /// If this frame is itself the value of a pending `key =` in its parent
    /// object, the key token; closing the frame wraps its result in a
    /// `Property` before attaching it to the grandparent.
    for_property_key: Option<u32>,
}

struct Parser {
    ast: Ast,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Token {
        self.ast.tokens[self.pos]
    }

    fn peek_text(&self) -> &str {
        let span = self.peek().span;
        &self.ast.source[span.start as usize..span.end as usize]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ParseError> {
        let token = self.peek();
        if token.kind == kind {
            Ok(self.advance())
        } else {
            Err(ParseError {
                span: token.span,
                expected: expected.to_string(),
            })
        }
    }

    fn parse_root(&mut self) -> Result<Ast, ParseError> {
        let mut forms = Vec::new();
        while self.peek().kind != TokenKind::Eof {
            let form = self.parse_form()?;
            forms.push(form);
        }
        let (start, count) = self.ast.push_extra(&forms);
        self.ast.nodes[crate::ast::ROOT as usize].lhs = start;
        self.ast.nodes[crate::ast::ROOT as usize].rhs = count;
        // Bind by value: `Ast` doesn't implement `Clone`, move it out.
        Ok(std::mem::replace(&mut self.ast, Ast::new(Vec::new(), String::new())))
    }

    fn parse_form(&mut self) -> Result<NodeIndex, ParseError> {
        self.expect(TokenKind::Hash, "'#'")?;
        let macro_token = self.expect(TokenKind::Identifier, "macro name")?;
        let macro_token_index = self.pos as u32 - 1;

        let label_token = if self.peek().kind == TokenKind::Identifier {
            self.advance();
            (self.pos - 1) as u32
        } else {
            crate::ast::NO_TOKEN
        };

        self.expect(TokenKind::LBrace, "'{'")?;
        let body = self.parse_container(FrameKind::Object)?;

        let _ = macro_token;
        Ok(self.ast.push_node(Node {
            tag: NodeTag::Form,
            main_token: macro_token_index,
            lhs: label_token,
            rhs: body,
        }))
    }

    /// Parses the contents of an already-opened `{`/`[` up to and including
    /// its matching close, using an explicit stack so nesting never
    /// recurses through Rust's call stack.
    fn parse_container(&mut self, root_kind: FrameKind) -> Result<NodeIndex, ParseError> {
        let mut stack = vec![Frame {
            kind: root_kind,
            children: Vec::new(),
            for_property_key: None,
        }];

        loop {
            let top_kind = stack.last().unwrap().kind;
            let token = self.peek();

            let closing = match (top_kind, token.kind) {
                (FrameKind::Object, TokenKind::RBrace) => true,
                (FrameKind::Array, TokenKind::RBracket) => true,
                _ => false,
            };

            if closing {
                self.advance();
                let frame = stack.pop().unwrap();
                let node = self.finish_frame(frame)?;
                match stack.last_mut() {
                    None => return Ok(node),
                    Some(parent) => {
                        self.attach(parent, node)?;
                    }
                }
                continue;
            }

            if token.kind == TokenKind::Comma {
                self.advance();
                continue;
            }

            if token.kind == TokenKind::Eof {
                return Err(ParseError {
                    span: token.span,
                    expected: "'}' or ']'".to_string(),
                });
            }

            match top_kind {
                FrameKind::Object => {
                    let key_token = self.expect(TokenKind::Identifier, "property name")?;
                    let key_index = self.pos as u32 - 1;
                    let _ = key_token;
                    self.expect(TokenKind::Equals, "'='")?;
                    self.open_value(&mut stack, Some(key_index))?;
                }
                FrameKind::Array => {
                    self.open_value(&mut stack, None)?;
                }
            }
        }
    }

    /// Parses one value position: either a leaf (attached immediately) or
    /// the opening of a nested `{`/`[` (pushed as a new frame, attached when
    /// it later closes).
    fn open_value(&mut self, stack: &mut Vec<Frame>, key: Option<u32>) -> Result<(), ParseError> {
        match self.peek().kind {
            TokenKind::LBrace => {
                self.advance();
                stack.push(Frame {
                    kind: FrameKind::Object,
                    children: Vec::new(),
                    for_property_key: key,
                });
            }
            TokenKind::LBracket => {
                self.advance();
                stack.push(Frame {
                    kind: FrameKind::Array,
                    children: Vec::new(),
                    for_property_key: key,
                });
            }
            _ => {
                let leaf = self.parse_leaf_value()?;
                let top = stack.last_mut().unwrap();
                match key {
                    Some(key_index) => {
                        let prop = self.ast.push_node(Node {
                            tag: NodeTag::Property,
                            main_token: key_index,
                            lhs: leaf,
                            rhs: 0,
                        });
                        top.children.push(prop);
                    }
                    None => top.children.push(leaf),
                }
            }
        }
        Ok(())
    }

    fn parse_leaf_value(&mut self) -> Result<NodeIndex, ParseError> {
        let token = self.peek();
        match token.kind {
            TokenKind::String => {
                self.advance();
                Ok(self.ast.push_node(Node {
                    tag: NodeTag::Str,
                    main_token: self.pos as u32 - 1,
                    lhs: 0,
                    rhs: 0,
                }))
            }
            TokenKind::Number => {
                self.advance();
                Ok(self.ast.push_node(Node {
                    tag: NodeTag::Num,
                    main_token: self.pos as u32 - 1,
                    lhs: 0,
                    rhs: 0,
                }))
            }
            TokenKind::Identifier => {
                self.advance();
                Ok(self.ast.push_node(Node {
                    tag: NodeTag::Ident,
                    main_token: self.pos as u32 - 1,
                    lhs: 0,
                    rhs: 0,
                }))
            }
            TokenKind::Dollar => {
                self.advance();
                let ns = self.expect(TokenKind::Identifier, "namespace name")?;
                let ns_index = self.pos as u32 - 1;
                let _ = ns;
                self.expect(TokenKind::Dot, "'.'")?;
                self.expect(TokenKind::Identifier, "reference name")?;
                let name_index = self.pos as u32 - 1;
                Ok(self.ast.push_node(Node {
                    tag: NodeTag::Reference,
                    main_token: ns_index,
                    lhs: name_index,
                    rhs: 0,
                }))
            }
            _ => Err(ParseError {
                span: token.span,
                expected: "a value (string, number, identifier, or $ref)".to_string(),
            }),
        }
    }

    fn finish_frame(&mut self, frame: Frame) -> Result<NodeIndex, ParseError> {
        let (start, count) = self.ast.push_extra(&frame.children);
        let tag = match frame.kind {
            FrameKind::Object => NodeTag::Object,
            FrameKind::Array => NodeTag::Array,
        };
        let node = self.ast.push_node(Node {
            tag,
            main_token: crate::ast::NO_TOKEN,
            lhs: start,
            rhs: count,
        });
        match frame.for_property_key {
            Some(key_index) => Ok(self.ast.push_node(Node {
                tag: NodeTag::Property,
                main_token: key_index,
                lhs: node,
                rhs: 0,
            })),
            None => Ok(node),
        }
    }

    fn attach(&mut self, parent: &mut Frame, value: NodeIndex) -> Result<(), ParseError> {
        parent.children.push(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_triangle_shape() {
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
        let ast = parse(src).unwrap();
        assert_eq!(ast.root_forms().len(), 4);
        for &form_index in ast.root_forms() {
            assert_eq!(ast.node(form_index).tag, NodeTag::Form);
        }
    }

    #[test]
    fn nested_objects_and_arrays_do_not_recurse_through_parse_value() {
        let src = r#"
            #bindGroup bg {
                entries = [
                    { binding = 0 resource = $buffer.b }
                    { binding = 1 resource = $sampler.s }
                ]
            }
        "#;
        let ast = parse(src).unwrap();
        let form = ast.node(ast.root_forms()[0]);
        let body = ast.node(form.rhs);
        let entries_prop = ast.node(ast.children(body)[0]);
        let array = ast.node(entries_prop.lhs);
        assert_eq!(array.tag, NodeTag::Array);
        assert_eq!(ast.children(array).len(), 2);
    }

    #[test]
    fn missing_closing_brace_is_a_parse_error_not_a_panic() {
        let err = parse("#frame main { perform = [a,b]").unwrap_err();
        assert!(!err.expected.is_empty());
    }

    #[test]
    fn bad_reference_syntax_reports_span() {
        let err = parse("#renderPipeline p { shader = $shaderModule tri }").unwrap_err();
        assert_eq!(err.expected, "'.'");
    }
}
