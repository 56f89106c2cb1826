//! Semantic analysis over the flat AST (§4.K): namespace symbol tables,
//! `$ns.name` reference resolution, duplicate-name detection, wgsl
//! import-cycle detection, plugin-bit detection, and pool-buffer
//! bookkeeping.

mod namespace;

pub use namespace::{DuplicateName, Namespace, SymbolTable};

use crate::ast::{Ast, Node, NodeIndex, NodeTag};
use crate::error::{AnalyzeError, AnalyzeErrorKind};
use crate::token::Span;
use pngb_format::PluginBits;
use std::collections::HashMap;

/// A pooled buffer's base id and sibling count (§4.K item 5).
#[derive(Debug, Clone, Copy)]
pub struct PoolInfo {
    pub base_id: u16,
    pub width: u32,
}

/// An entry's reference to a pooled buffer, recorded so the emitter can
/// carry the offset into the bind group descriptor it writes out.
#[derive(Debug, Clone, Copy)]
pub struct PoolOffset {
    pub consumer_bind_group_id: u16,
    pub base_buffer_id: u16,
    pub width: u32,
    pub offset: u32,
}

pub struct Analysis {
    pub tables: HashMap<Namespace, SymbolTable>,
    pub plugins: PluginBits,
    /// Resolved `$ns.name` reference nodes -> (namespace, id).
    pub resolved: HashMap<NodeIndex, (Namespace, u16)>,
    pub pool_widths: HashMap<u16, PoolInfo>,
    pub pool_offsets: Vec<PoolOffset>,
}

impl Analysis {
    pub fn table(&self, ns: Namespace) -> &SymbolTable {
        self.tables.get(&ns).expect("every namespace has a table")
    }
}

struct FormInfo {
    node: NodeIndex,
    namespace: Namespace,
    label: Option<String>,
    span: Span,
}

pub fn analyze(ast: &Ast) -> Result<Analysis, AnalyzeError> {
    let mut tables: HashMap<Namespace, SymbolTable> = Namespace::ALL
        .iter()
        .map(|ns| (*ns, SymbolTable::new()))
        .collect();
    let mut plugins = PluginBits::CORE;
    let mut pool_widths = HashMap::new();
    let mut forms = Vec::new();

    for &form_index in ast.root_forms() {
        let form = ast.node(form_index);
        let macro_name = ast.token_text(form.main_token);
        let namespace = Namespace::from_macro(macro_name).ok_or_else(|| AnalyzeError {
            kind: AnalyzeErrorKind::UnknownMacro,
            span: form_span(ast, form),
            message: format!("unknown macro '#{macro_name}'"),
        })?;

        let label = if form.lhs != crate::ast::NO_TOKEN {
            Some(ast.token_text(form.lhs).to_string())
        } else {
            None
        };

        if namespace.requires_label() && label.is_none() {
            return Err(AnalyzeError {
                kind: AnalyzeErrorKind::InvalidFormStructure,
                span: form_span(ast, form),
                message: format!("'#{macro_name}' requires a name"),
            });
        }

        let table = tables.get_mut(&namespace).unwrap();
        let id = match &label {
            Some(name) => {
                let pool = namespace_matches(namespace, Namespace::Buffer)
                    .then(|| pool_width_of(ast, form))
                    .flatten();
                let base = match pool {
                    Some(width) => table.insert_n(name, width).map_err(|DuplicateName| dup(ast, form, name))?,
                    None => table.insert(name).map_err(|DuplicateName| dup(ast, form, name))?,
                };
                if let Some(width) = pool {
                    pool_widths.insert(base, PoolInfo { base_id: base, width });
                }
                base
            }
            None => table.insert_anonymous(),
        };
        let _ = id;

        match namespace {
            Namespace::RenderPipeline => plugins |= PluginBits::RENDER,
            Namespace::ComputePipeline => plugins |= PluginBits::COMPUTE,
            Namespace::WasmCall | Namespace::WasmModule => plugins |= PluginBits::WASM,
            Namespace::Animation => plugins |= PluginBits::ANIM,
            Namespace::Texture if has_property(ast, form, "source").is_some() => {
                plugins |= PluginBits::TEXTURE
            }
            _ => {}
        }

        forms.push(FormInfo {
            node: form_index,
            namespace,
            label,
            span: form_span(ast, form),
        });
    }

    check_wgsl_import_cycles(ast, &forms, &tables)?;

    let mut resolved = HashMap::new();
    for node_index in 0..ast.nodes.len() as NodeIndex {
        let node = ast.node(node_index);
        if node.tag != NodeTag::Reference {
            continue;
        }
        let ns_name = ast.token_text(node.main_token);
        let ref_name = ast.token_text(node.lhs);
        let namespace = Namespace::from_reference(ns_name).ok_or_else(|| AnalyzeError {
            kind: AnalyzeErrorKind::UnresolvedReference,
            span: node_span(ast, node),
            message: format!("unknown reference namespace '{ns_name}'"),
        })?;
        let id = tables
            .get(&namespace)
            .and_then(|t| t.get(ref_name))
            .ok_or_else(|| AnalyzeError {
                kind: AnalyzeErrorKind::UnresolvedReference,
                span: node_span(ast, node),
                message: format!("unresolved reference ${ns_name}.{ref_name}"),
            })?;
        resolved.insert(node_index, (namespace, id));
    }

    // `perform = [ident, ...]` inside `#frame` bodies: bare identifiers that
    // name render/compute passes, resolved the same way references are, but
    // without `$ns.` syntax since a frame's body is unambiguously pass names.
    for form in &forms {
        if form.namespace != Namespace::Frame {
            continue;
        }
        let node = ast.node(form.node);
        let body = ast.node(node.rhs);
        if let Some(perform) = find_property(ast, body, "perform") {
            let value = ast.node(perform.lhs);
            if value.tag == NodeTag::Array {
                for &child in ast.children(value) {
                    let child_node = ast.node(child);
                    if child_node.tag != NodeTag::Ident {
                        continue;
                    }
                    let name = ast.token_text(child_node.main_token);
                    let id = tables
                        .get(&Namespace::RenderPass)
                        .and_then(|t| t.get(name))
                        .or_else(|| tables.get(&Namespace::ComputePass).and_then(|t| t.get(name)));
                    match id {
                        Some(_) => {}
                        None => {
                            return Err(AnalyzeError {
                                kind: AnalyzeErrorKind::UnresolvedReference,
                                span: node_span(ast, child_node),
                                message: format!("'{name}' is not a declared pass"),
                            })
                        }
                    }
                }
            }
        }
    }

    let pool_offsets = collect_pool_offsets(ast, &forms, &tables, &pool_widths);

    Ok(Analysis {
        tables,
        plugins,
        resolved,
        pool_widths,
        pool_offsets,
    })
}

fn namespace_matches(a: Namespace, b: Namespace) -> bool {
    a == b
}

fn dup(ast: &Ast, form: &Node, name: &str) -> AnalyzeError {
    AnalyzeError {
        kind: AnalyzeErrorKind::DuplicateName,
        span: form_span(ast, form),
        message: format!("duplicate name '{name}'"),
    }
}

fn form_span(ast: &Ast, form: &Node) -> Span {
    ast.tokens[form.main_token as usize].span
}

fn node_span(ast: &Ast, node: &Node) -> Span {
    ast.tokens[node.main_token as usize].span
}

/// Reads a `pool = N` numeric property off a buffer form's body, if present.
fn pool_width_of(ast: &Ast, form: &Node) -> Option<u32> {
    let body = ast.node(form.rhs);
    let prop = find_property(ast, body, "pool")?;
    let value = ast.node(prop.lhs);
    if value.tag != NodeTag::Num {
        return None;
    }
    ast.token_text(value.main_token).parse::<u32>().ok().filter(|n| *n > 1)
}

fn has_property<'a>(ast: &'a Ast, form: &Node, key: &str) -> Option<&'a Node> {
    let body = ast.node(form.rhs);
    find_property(ast, body, key)
}

fn find_property<'a>(ast: &'a Ast, object: &Node, key: &str) -> Option<&'a Node> {
    debug_assert_eq!(object.tag, NodeTag::Object);
    for &child in ast.children(object) {
        let prop = ast.node(child);
        if prop.tag == NodeTag::Property && ast.token_text(prop.main_token) == key {
            return Some(prop);
        }
    }
    None
}

/// Iterative DFS with a tri-color array, following `#wgsl` forms' `imports =
/// [name, ...]` lists (bare identifiers naming other `#wgsl` entries). No
/// recursive call, per §9.
fn check_wgsl_import_cycles(
    ast: &Ast,
    forms: &[FormInfo],
    tables: &HashMap<Namespace, SymbolTable>,
) -> Result<(), AnalyzeError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    let wgsl_forms: Vec<&FormInfo> = forms.iter().filter(|f| f.namespace == Namespace::Wgsl).collect();
    let wgsl_table = match tables.get(&Namespace::Wgsl) {
        Some(t) if !t.is_empty() => t,
        _ => return Ok(()),
    };

    let mut adjacency: Vec<Vec<u16>> = vec![Vec::new(); wgsl_table.len()];
    let mut spans: Vec<Span> = vec![Span::default(); wgsl_table.len()];
    for info in &wgsl_forms {
        let name = info.label.as_deref().unwrap();
        let id = wgsl_table.get(name).unwrap();
        spans[id as usize] = info.span;
        let form = ast.node(info.node);
        let body = ast.node(form.rhs);
        if let Some(prop) = find_property(ast, body, "imports") {
            let value = ast.node(prop.lhs);
            if value.tag == NodeTag::Array {
                for &child in ast.children(value) {
                    let child_node = ast.node(child);
                    if child_node.tag != NodeTag::Ident {
                        continue;
                    }
                    let dep_name = ast.token_text(child_node.main_token);
                    if let Some(dep_id) = wgsl_table.get(dep_name) {
                        adjacency[id as usize].push(dep_id);
                    }
                }
            }
        }
    }

    let n = adjacency.len();
    let mut color = vec![Color::White; n];

    for start in 0..n {
        if color[start] != Color::White {
            continue;
        }
        // Explicit stack of (node, next-child-index-to-visit).
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        color[start] = Color::Gray;
        while let Some(&mut (node, ref mut next)) = stack.last_mut() {
            if *next < adjacency[node].len() {
                let child = adjacency[node][*next] as usize;
                *next += 1;
                match color[child] {
                    Color::White => {
                        color[child] = Color::Gray;
                        stack.push((child, 0));
                    }
                    Color::Gray => {
                        return Err(AnalyzeError {
                            kind: AnalyzeErrorKind::ImportCycle,
                            span: spans[child],
                            message: "cyclic #wgsl imports".to_string(),
                        });
                    }
                    Color::Black => {}
                }
            } else {
                color[node] = Color::Black;
                stack.pop();
            }
        }
    }

    Ok(())
}

/// Walks every `#bindGroup` form's `entries = [{ resource = $buffer.x ... }]`
/// list and records pool-offset bookkeeping for entries referencing a
/// pooled buffer (§4.K item 5).
fn collect_pool_offsets(
    ast: &Ast,
    forms: &[FormInfo],
    tables: &HashMap<Namespace, SymbolTable>,
    pool_widths: &HashMap<u16, PoolInfo>,
) -> Vec<PoolOffset> {
    let mut out = Vec::new();
    let buffer_table = match tables.get(&Namespace::Buffer) {
        Some(t) => t,
        None => return out,
    };
    let bind_group_table = match tables.get(&Namespace::BindGroup) {
        Some(t) => t,
        None => return out,
    };

    for info in forms.iter().filter(|f| f.namespace == Namespace::BindGroup) {
        let name = match &info.label {
            Some(n) => n,
            None => continue,
        };
        let bind_group_id = match bind_group_table.get(name) {
            Some(id) => id,
            None => continue,
        };
        let form = ast.node(info.node);
        let body = ast.node(form.rhs);
        let entries_prop = match find_property(ast, body, "entries") {
            Some(p) => p,
            None => continue,
        };
        let entries = ast.node(entries_prop.lhs);
        if entries.tag != NodeTag::Array {
            continue;
        }
        for &entry_index in ast.children(entries) {
            let entry = ast.node(entry_index);
            if entry.tag != NodeTag::Object {
                continue;
            }
            let resource_prop = match find_property(ast, entry, "resource") {
                Some(p) => p,
                None => continue,
            };
            let resource = ast.node(resource_prop.lhs);
            if resource.tag != NodeTag::Reference {
                continue;
            }
            let ns_name = ast.token_text(resource.main_token);
            if Namespace::from_reference(ns_name) != Some(Namespace::Buffer) {
                continue;
            }
            let buf_name = ast.token_text(resource.lhs);
            let buf_id = match buffer_table.get(buf_name) {
                Some(id) => id,
                None => continue,
            };
            let pool = match pool_widths.get(&buf_id) {
                Some(p) => p,
                None => continue,
            };
            let offset = find_property(ast, entry, "poolOffset")
                .map(|p| ast.node(p.lhs))
                .and_then(|v| (v.tag == NodeTag::Num).then(|| ast.token_text(v.main_token)))
                .and_then(|s| s.parse::<u32>().ok())
                .unwrap_or(0);
            out.push(PoolOffset {
                consumer_bind_group_id: bind_group_id,
                base_buffer_id: pool.base_id,
                width: pool.width,
                offset,
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn resolves_minimal_triangle_references() {
        let src = r#"
            #shaderModule tri { source = "x" }
            #renderPipeline p { shader = $shaderModule.tri }
            #renderPass drawTri { pipeline = $renderPipeline.p draw = 3 }
            #frame main { perform = [drawTri] }
        "#;
        let ast = parse(src).unwrap();
        let analysis = analyze(&ast).unwrap();
        assert_eq!(analysis.table(Namespace::ShaderModule).get("tri"), Some(0));
        assert_eq!(analysis.table(Namespace::RenderPipeline).get("p"), Some(0));
        assert!(analysis.plugins.contains(PluginBits::RENDER));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let src = r#"
            #buffer a { size = 16 }
            #buffer a { size = 32 }
        "#;
        let ast = parse(src).unwrap();
        let err = analyze(&ast).unwrap_err();
        assert_eq!(err.kind, AnalyzeErrorKind::DuplicateName);
    }

    #[test]
    fn unresolved_reference_is_reported() {
        let src = r#"
            #renderPipeline p { shader = $shaderModule.missing }
        "#;
        let ast = parse(src).unwrap();
        let err = analyze(&ast).unwrap_err();
        assert_eq!(err.kind, AnalyzeErrorKind::UnresolvedReference);
    }

    #[test]
    fn wgsl_import_cycle_is_detected() {
        let src = r#"
            #wgsl a { source = "x" imports = [b] }
            #wgsl b { source = "y" imports = [a] }
        "#;
        let ast = parse(src).unwrap();
        let err = analyze(&ast).unwrap_err();
        assert_eq!(err.kind, AnalyzeErrorKind::ImportCycle);
    }

    #[test]
    fn pooled_buffer_reserves_n_ids() {
        let src = r#"
            #buffer pooled { size = 16 pool = 3 }
            #buffer other { size = 8 }
        "#;
        let ast = parse(src).unwrap();
        let analysis = analyze(&ast).unwrap();
        assert_eq!(analysis.table(Namespace::Buffer).get("pooled"), Some(0));
        assert_eq!(analysis.table(Namespace::Buffer).get("other"), Some(3));
    }
}
