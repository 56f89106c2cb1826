//! Bytecode emission (§4.L): walks the analyzed AST in the fixed
//! declaration-group order (shaders → data → buffers → textures → samplers
//! → layouts → pipelines → bind groups → passes → frames), assigns the
//! PNGB tables their final contents, and appends one opcode per resource or
//! structural element to the bytecode stream.
//!
//! The one invariant this module exists to protect: `create_shader_module`
//! always takes a [`DataId`], never a [`WgslId`] (§4.D, §8 "shader-data
//! binding"). A `#shaderModule`'s `source` property can be a literal string
//! or a `$wgsl.name` reference; both paths resolve to a `DataId` before the
//! opcode is written.

use crate::analyzer::{Analysis, Namespace};
use crate::ast::{Ast, Node, NodeTag};
use crate::error::{EmitError, EmitErrorKind};
use crate::lexer::unescape_string;
use pngb_format::{DataId, Module, PluginBits, PngbOpcode, StringId, UniformTable, WgslEntry};
use serde_json::json;

pub fn emit(ast: &Ast, analysis: &Analysis) -> Result<Module, EmitError> {
    let mut emitter = Emitter {
        ast,
        analysis,
        strings: pngb_format::StringTable::new(),
        data: pngb_format::DataSection::new(),
        wgsl: pngb_format::WgslTable::new(),
        uniforms: UniformTable::new(),
        code: Vec::new(),
    };
    emitter.run()
}

struct Emitter<'a> {
    ast: &'a Ast,
    analysis: &'a Analysis,
    strings: pngb_format::StringTable,
    data: pngb_format::DataSection,
    wgsl: pngb_format::WgslTable,
    uniforms: UniformTable,
    code: Vec<u8>,
}

impl<'a> Emitter<'a> {
    fn run(mut self) -> Result<Module, EmitError> {
        self.emit_group(Namespace::Wgsl, Self::emit_wgsl)?;
        self.emit_group(Namespace::ShaderModule, Self::emit_shader_module)?;
        self.emit_group(Namespace::Data, Self::emit_data)?;
        self.emit_buffers()?;
        self.emit_group(Namespace::Texture, Self::emit_texture)?;
        self.emit_group(Namespace::Sampler, Self::emit_sampler)?;
        self.emit_group(Namespace::BindGroupLayout, Self::emit_bind_group_layout)?;
        self.emit_group(Namespace::PipelineLayout, Self::emit_pipeline_layout)?;
        self.emit_group(Namespace::RenderPipeline, Self::emit_render_pipeline)?;
        self.emit_group(Namespace::ComputePipeline, Self::emit_compute_pipeline)?;
        self.emit_group(Namespace::BindGroup, Self::emit_bind_group)?;
        self.emit_group(Namespace::RenderPass, Self::emit_render_pass)?;
        self.emit_group(Namespace::ComputePass, Self::emit_compute_pass)?;
        self.emit_group(Namespace::Frame, Self::emit_frame)?;

        self.push_op(PngbOpcode::Submit);
        self.push_op(PngbOpcode::End);

        let mut module = Module::new(self.code, self.analysis.plugins | PluginBits::CORE);
        module.strings = self.strings;
        module.data = self.data;
        module.wgsl = self.wgsl;
        module.uniforms = self.uniforms;
        Ok(module)
    }

    fn push_op(&mut self, op: PngbOpcode) {
        self.code.push(op.tag());
    }

    fn push_varint(&mut self, value: u32) -> Result<(), EmitError> {
        pngb_format::varint::try_encode(value, &mut self.code).map_err(|e| EmitError {
            kind: EmitErrorKind::BadVarint,
            message: e.to_string(),
        })?;
        Ok(())
    }

    fn intern(&mut self, s: &str) -> Result<StringId, EmitError> {
        self.strings.intern_str(s).map_err(|_| EmitError {
            kind: EmitErrorKind::TooManyStrings,
            message: "string table is full".to_string(),
        })
    }

    fn add_data(&mut self, bytes: &[u8]) -> Result<DataId, EmitError> {
        self.data.add_bytes(bytes).map_err(|_| EmitError {
            kind: EmitErrorKind::TooManyResources,
            message: "data section is full".to_string(),
        })
    }

    /// Runs `f` once per form in `namespace`, in declaration order, passing
    /// the form's assigned id.
    fn emit_group(
        &mut self,
        namespace: Namespace,
        f: impl Fn(&mut Self, &FormView) -> Result<(), EmitError>,
    ) -> Result<(), EmitError> {
        for view in self.forms_in(namespace) {
            f(self, &view)?;
        }
        Ok(())
    }

    fn forms_in(&self, namespace: Namespace) -> Vec<FormView> {
        let mut out = Vec::new();
        for &form_index in self.ast.root_forms() {
            let form = self.ast.node(form_index);
            let macro_name = self.ast.token_text(form.main_token);
            if Namespace::from_macro(macro_name) != Some(namespace) {
                continue;
            }
            let label = if form.lhs != crate::ast::NO_TOKEN {
                Some(self.ast.token_text(form.lhs).to_string())
            } else {
                None
            };
            let id = label
                .as_deref()
                .and_then(|name| self.analysis.table(namespace).get(name));
            out.push(FormView {
                node: *form,
                label,
                id,
            });
        }
        out
    }

    fn body_of<'n>(&self, form: &'n Node) -> &'n Node {
        self.ast.node(form.rhs)
    }

    fn property<'n>(&self, object: &'n Node, key: &str) -> Option<&'n Node> {
        for &child in self.ast.children(object) {
            let prop = self.ast.node(child);
            if prop.tag == NodeTag::Property && self.ast.token_text(prop.main_token) == key {
                return Some(prop);
            }
        }
        None
    }

    fn string_value(&self, object: &Node, key: &str) -> Option<String> {
        let prop = self.property(object, key)?;
        let value = self.ast.node(prop.lhs);
        (value.tag == NodeTag::Str).then(|| unescape_string(self.ast.token_text(value.main_token)))
    }

    fn number_value(&self, object: &Node, key: &str) -> Option<f64> {
        let prop = self.property(object, key)?;
        let value = self.ast.node(prop.lhs);
        (value.tag == NodeTag::Num)
            .then(|| self.ast.token_text(value.main_token))
            .and_then(|s| s.parse::<f64>().ok())
    }

    fn ident_value(&self, object: &Node, key: &str) -> Option<String> {
        let prop = self.property(object, key)?;
        let value = self.ast.node(prop.lhs);
        (value.tag == NodeTag::Ident).then(|| self.ast.token_text(value.main_token).to_string())
    }

    fn object_value<'n>(&self, object: &'n Node, key: &str) -> Option<&'n Node> {
        let prop = self.property(object, key)?;
        let value = self.ast.node(prop.lhs);
        (value.tag == NodeTag::Object).then_some(value)
    }

    fn ident_list(&self, object: &Node, key: &str) -> Vec<String> {
        let Some(prop) = self.property(object, key) else {
            return Vec::new();
        };
        let value = self.ast.node(prop.lhs);
        if value.tag != NodeTag::Array {
            return Vec::new();
        }
        self.ast
            .children(value)
            .iter()
            .map(|&c| self.ast.node(c))
            .filter(|n| n.tag == NodeTag::Ident)
            .map(|n| self.ast.token_text(n.main_token).to_string())
            .collect()
    }

    fn reference_target(&self, object: &Node, key: &str) -> Option<(Namespace, u16)> {
        let prop = self.property(object, key)?;
        let node_index = prop.lhs;
        self.analysis.resolved.get(&node_index).copied()
    }

    // -- shaders ---------------------------------------------------------

    fn emit_wgsl(&mut self, view: &FormView) -> Result<(), EmitError> {
        let body = self.body_of(&view.node);
        let source = self.string_value(body, "source").unwrap_or_default();
        let name_str = view.label.clone().unwrap_or_default();
        let name = self.intern(&name_str)?;
        let entry_points: Vec<StringId> = self
            .ident_list(body, "entryPoints")
            .into_iter()
            .map(|s| self.intern(&s))
            .collect::<Result<_, _>>()?;
        let data_id = self.add_data(source.as_bytes())?;
        let wgsl_id = self.wgsl.push(WgslEntry { name, data: data_id, entry_points }).map_err(|_| EmitError {
            kind: EmitErrorKind::TooManyResources,
            message: "wgsl table is full".to_string(),
        })?;
        debug_assert_eq!(wgsl_id.index(), view.id.unwrap_or(wgsl_id.index()));
        Ok(())
    }

    fn emit_shader_module(&mut self, view: &FormView) -> Result<(), EmitError> {
        let body = self.body_of(&view.node);
        let data_id = match self.reference_target(body, "source") {
            Some((Namespace::Wgsl, wgsl_ns_id)) => {
                // Critical boundary: resolve through `WgslTable`, emit the
                // `DataId` it points at, never the `WgslId`/namespace id.
                let wgsl_id = pngb_format::WgslId::new(wgsl_ns_id);
                self.wgsl.resolve_data_id(wgsl_id).map_err(|_| EmitError {
                    kind: EmitErrorKind::TooManyResources,
                    message: "dangling $wgsl reference".to_string(),
                })?
            }
            _ => {
                let source = self.string_value(body, "source").unwrap_or_default();
                self.add_data(source.as_bytes())?
            }
        };
        let shader_id = view.id.unwrap_or(0) as u32;
        self.push_op(PngbOpcode::CreateShaderModule);
        self.push_varint(shader_id)?;
        self.push_varint(data_id.index() as u32)?;
        Ok(())
    }

    // -- data --------------------------------------------------------------

    fn emit_data(&mut self, view: &FormView) -> Result<(), EmitError> {
        let body = self.body_of(&view.node);
        let array_id = view.id.unwrap_or(0) as u32;

        // `generator = { kind = ... }` produces one of the `fill_*` opcodes
        // instead of a plain `create_typed_array` + literal payload (§4.H
        // data generation).
        if let Some(generator) = self.object_value(body, "generator") {
            return self.emit_generator(array_id, generator);
        }

        let values_prop = self.property(body, "values");
        let bytes: Vec<u8> = match values_prop {
            Some(prop) => {
                let value = self.ast.node(prop.lhs);
                let mut out = Vec::new();
                if value.tag == NodeTag::Array {
                    for &child in self.ast.children(value) {
                        let child_node = self.ast.node(child);
                        if child_node.tag == NodeTag::Num {
                            let n: f32 = self.ast.token_text(child_node.main_token).parse().unwrap_or(0.0);
                            out.extend_from_slice(&n.to_le_bytes());
                        }
                    }
                }
                out
            }
            None => Vec::new(),
        };
        let data_id = self.add_data(&bytes)?;
        self.push_op(PngbOpcode::CreateTypedArray);
        self.push_varint(array_id)?;
        self.push_varint(data_id.index() as u32)?;
        Ok(())
    }

    /// Lowers a `generator = { kind = ... }` property to the matching
    /// `fill_*` opcode. Each generator kind carries its numeric parameters
    /// through `DataSection` rather than as raw varints, since a `f32` bit
    /// pattern can legitimately exceed the varint format's 30-bit bucket
    /// (§4.H, §8 "PRNG determinism").
    fn emit_generator(&mut self, array_id: u32, generator: &Node) -> Result<(), EmitError> {
        let kind = self.ident_value(generator, "kind").unwrap_or_default();
        let count = self.number_value(generator, "count").unwrap_or(0.0) as u32;
        match kind.as_str() {
            "fillConstant" => {
                let value = self.number_value(generator, "value").unwrap_or(0.0) as f32;
                let data_id = self.add_data(&value.to_le_bytes())?;
                self.push_op(PngbOpcode::FillConstant);
                self.push_varint(array_id)?;
                self.push_varint(count)?;
                self.push_varint(data_id.index() as u32)?;
            }
            "fillLinear" => {
                let start = self.number_value(generator, "start").unwrap_or(0.0) as f32;
                let step = self.number_value(generator, "step").unwrap_or(0.0) as f32;
                let mut bytes = Vec::with_capacity(8);
                bytes.extend_from_slice(&start.to_le_bytes());
                bytes.extend_from_slice(&step.to_le_bytes());
                let data_id = self.add_data(&bytes)?;
                self.push_op(PngbOpcode::FillLinear);
                self.push_varint(array_id)?;
                self.push_varint(count)?;
                self.push_varint(data_id.index() as u32)?;
            }
            "fillElementIndex" => {
                self.push_op(PngbOpcode::FillElementIndex);
                self.push_varint(array_id)?;
                self.push_varint(count)?;
            }
            "fillRandom" => {
                let seed = self.number_value(generator, "seed").unwrap_or(0.0) as u32;
                self.push_op(PngbOpcode::FillRandom);
                self.push_varint(array_id)?;
                self.push_varint(count)?;
                self.push_varint(seed)?;
            }
            "fillExpression" => {
                let expr = self.string_value(generator, "expr").unwrap_or_default();
                let data_id = self.add_data(expr.as_bytes())?;
                self.push_op(PngbOpcode::FillExpression);
                self.push_varint(array_id)?;
                self.push_varint(count)?;
                self.push_varint(data_id.index() as u32)?;
            }
            other => {
                return Err(EmitError {
                    kind: EmitErrorKind::UnknownGeneratorKind,
                    message: format!("unknown data generator kind '{other}'"),
                });
            }
        }
        Ok(())
    }

    // -- buffers (pool-aware) ----------------------------------------------

    fn emit_buffers(&mut self) -> Result<(), EmitError> {
        for view in self.forms_in(Namespace::Buffer) {
            let body = self.body_of(&view.node);
            let size = self.number_value(body, "size").unwrap_or(0.0) as u64;
            let usage = self.ident_list(body, "usage");
            let descriptor = json!({ "size": size, "usage": usage });
            let data_id = self.add_data(descriptor.to_string().as_bytes())?;

            let base_id = view.id.unwrap_or(0);
            let width = self
                .analysis
                .pool_widths
                .get(&base_id)
                .map(|p| p.width)
                .unwrap_or(1);
            for i in 0..width {
                self.push_op(PngbOpcode::CreateBuffer);
                self.push_varint((base_id as u32) + i)?;
                self.push_varint(data_id.index() as u32)?;
            }

            // `fillFrom = $data.name` seeds this buffer from a generated
            // array right after it's created (§4.H): every buffer in the
            // pool gets the same generated contents.
            if let Some((Namespace::Data, array_ns_id)) = self.reference_target(body, "fillFrom") {
                for i in 0..width {
                    self.push_op(PngbOpcode::WriteBufferFromArray);
                    self.push_varint((base_id as u32) + i)?;
                    self.push_varint(array_ns_id as u32)?;
                }
            }
        }
        Ok(())
    }

    // -- textures / samplers -------------------------------------------------

    fn emit_texture(&mut self, view: &FormView) -> Result<(), EmitError> {
        let body = self.body_of(&view.node);
        let width = self.number_value(body, "width").unwrap_or(0.0) as u32;
        let height = self.number_value(body, "height").unwrap_or(0.0) as u32;
        let format = self.string_value(body, "format").unwrap_or_default();
        let descriptor = json!({ "width": width, "height": height, "format": format });
        let data_id = self.add_data(descriptor.to_string().as_bytes())?;
        self.push_op(PngbOpcode::CreateTexture);
        self.push_varint(view.id.unwrap_or(0) as u32)?;
        self.push_varint(data_id.index() as u32)?;
        Ok(())
    }

    fn emit_sampler(&mut self, view: &FormView) -> Result<(), EmitError> {
        let body = self.body_of(&view.node);
        let filter = self.string_value(body, "filter").unwrap_or_default();
        let descriptor = json!({ "filter": filter });
        let data_id = self.add_data(descriptor.to_string().as_bytes())?;
        self.push_op(PngbOpcode::CreateSampler);
        self.push_varint(view.id.unwrap_or(0) as u32)?;
        self.push_varint(data_id.index() as u32)?;
        Ok(())
    }

    // -- layouts --------------------------------------------------------------

    fn emit_bind_group_layout(&mut self, view: &FormView) -> Result<(), EmitError> {
        let body = self.body_of(&view.node);
        let entries = self.ident_list(body, "entries");
        let descriptor = json!({ "entries": entries });
        let data_id = self.add_data(descriptor.to_string().as_bytes())?;
        self.push_op(PngbOpcode::CreateBindGroupLayout);
        self.push_varint(view.id.unwrap_or(0) as u32)?;
        self.push_varint(data_id.index() as u32)?;
        Ok(())
    }

    fn emit_pipeline_layout(&mut self, view: &FormView) -> Result<(), EmitError> {
        let body = self.body_of(&view.node);
        let layouts = self.ident_list(body, "bindGroupLayouts");
        let descriptor = json!({ "bindGroupLayouts": layouts });
        let data_id = self.add_data(descriptor.to_string().as_bytes())?;
        self.push_op(PngbOpcode::CreatePipelineLayout);
        self.push_varint(view.id.unwrap_or(0) as u32)?;
        self.push_varint(data_id.index() as u32)?;
        Ok(())
    }

    // -- pipelines --------------------------------------------------------------

    fn emit_render_pipeline(&mut self, view: &FormView) -> Result<(), EmitError> {
        let body = self.body_of(&view.node);
        let shader_id = self.reference_target(body, "shader").map(|(_, id)| id);
        let layout_id = self.reference_target(body, "layout").map(|(_, id)| id);
        let descriptor = json!({ "shader": shader_id, "layout": layout_id });
        let data_id = self.add_data(descriptor.to_string().as_bytes())?;
        self.push_op(PngbOpcode::CreateRenderPipeline);
        self.push_varint(view.id.unwrap_or(0) as u32)?;
        self.push_varint(data_id.index() as u32)?;
        Ok(())
    }

    fn emit_compute_pipeline(&mut self, view: &FormView) -> Result<(), EmitError> {
        let body = self.body_of(&view.node);
        let shader_id = self.reference_target(body, "shader").map(|(_, id)| id);
        let layout_id = self.reference_target(body, "layout").map(|(_, id)| id);
        let descriptor = json!({ "shader": shader_id, "layout": layout_id });
        let data_id = self.add_data(descriptor.to_string().as_bytes())?;
        self.push_op(PngbOpcode::CreateComputePipeline);
        self.push_varint(view.id.unwrap_or(0) as u32)?;
        self.push_varint(data_id.index() as u32)?;
        Ok(())
    }

    // -- bind groups --------------------------------------------------------------

    fn emit_bind_group(&mut self, view: &FormView) -> Result<(), EmitError> {
        let body = self.body_of(&view.node);
        let mut entries_json = Vec::new();
        if let Some(prop) = self.property(body, "entries") {
            let array = self.ast.node(prop.lhs);
            if array.tag == NodeTag::Array {
                for &entry_index in self.ast.children(array) {
                    let entry = self.ast.node(entry_index);
                    if entry.tag != NodeTag::Object {
                        continue;
                    }
                    let binding = self.number_value(entry, "binding").unwrap_or(0.0) as u32;
                    let resource = self.reference_target(entry, "resource").map(|(_, id)| id);
                    entries_json.push(json!({ "binding": binding, "resource": resource }));
                }
            }
        }
        let descriptor = json!({ "entries": entries_json });
        let data_id = self.add_data(descriptor.to_string().as_bytes())?;
        self.push_op(PngbOpcode::CreateBindGroup);
        self.push_varint(view.id.unwrap_or(0) as u32)?;
        self.push_varint(data_id.index() as u32)?;
        Ok(())
    }

    // -- passes --------------------------------------------------------------

    fn emit_render_pass(&mut self, view: &FormView) -> Result<(), EmitError> {
        let body = self.body_of(&view.node);
        let pipeline_id = self.reference_target(body, "pipeline").map(|(_, id)| id);
        let draw = self.number_value(body, "draw").map(|n| n as u32);
        let instances = self.number_value(body, "instances").map(|n| n as u32).unwrap_or(1);

        self.push_op(PngbOpcode::DefinePass);
        self.push_varint(view.id.unwrap_or(0) as u32)?;
        self.push_op(PngbOpcode::BeginRenderPass);
        self.push_varint(view.id.unwrap_or(0) as u32)?;
        if let Some(pipeline_id) = pipeline_id {
            self.push_op(PngbOpcode::SetPipeline);
            self.push_varint(pipeline_id as u32)?;
        }
        if let Some(vertex_count) = draw {
            self.push_op(PngbOpcode::Draw);
            self.push_varint(vertex_count)?;
            self.push_varint(instances)?;
            self.push_varint(0)?; // first_vertex
            self.push_varint(0)?; // first_instance
        }
        self.push_op(PngbOpcode::EndPass);
        self.push_op(PngbOpcode::EndPassDef);
        Ok(())
    }

    fn emit_compute_pass(&mut self, view: &FormView) -> Result<(), EmitError> {
        let body = self.body_of(&view.node);
        let pipeline_id = self.reference_target(body, "pipeline").map(|(_, id)| id);
        let x = self.number_value(body, "x").map(|n| n as u32).unwrap_or(1);
        let y = self.number_value(body, "y").map(|n| n as u32).unwrap_or(1);
        let z = self.number_value(body, "z").map(|n| n as u32).unwrap_or(1);

        self.push_op(PngbOpcode::DefinePass);
        self.push_varint(view.id.unwrap_or(0) as u32)?;
        self.push_op(PngbOpcode::BeginComputePass);
        self.push_varint(view.id.unwrap_or(0) as u32)?;
        if let Some(pipeline_id) = pipeline_id {
            self.push_op(PngbOpcode::SetPipeline);
            self.push_varint(pipeline_id as u32)?;
        }
        self.push_op(PngbOpcode::Dispatch);
        self.push_varint(x)?;
        self.push_varint(y)?;
        self.push_varint(z)?;
        self.push_op(PngbOpcode::EndPass);
        self.push_op(PngbOpcode::EndPassDef);
        Ok(())
    }

    // -- frames --------------------------------------------------------------

    fn emit_frame(&mut self, view: &FormView) -> Result<(), EmitError> {
        let body = self.body_of(&view.node);
        let name_str = view.label.clone().unwrap_or_default();
        let name = self.intern(&name_str)?;

        self.push_op(PngbOpcode::DefineFrame);
        self.push_varint(view.id.unwrap_or(0) as u32)?;
        self.push_varint(name.index() as u32)?;

        for pass_name in self.ident_list(body, "perform") {
            let id = self
                .analysis
                .table(Namespace::RenderPass)
                .get(&pass_name)
                .or_else(|| self.analysis.table(Namespace::ComputePass).get(&pass_name))
                .unwrap_or(0);
            self.push_op(PngbOpcode::ExecPass);
            self.push_varint(id as u32)?;
        }
        Ok(())
    }
}

struct FormView {
    node: Node,
    label: Option<String>,
    id: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze;
    use crate::parser::parse;

    fn compile_to_module(src: &str) -> Module {
        let ast = parse(src).unwrap();
        let analysis = analyze(&ast).unwrap();
        emit(&ast, &analysis).unwrap()
    }

    #[test]
    fn minimal_triangle_emits_expected_opcodes_in_order() {
        let src = r#"
            #shaderModule tri { source = "fn vs_main() {} fn fs_main() {}" }
            #renderPipeline p { shader = $shaderModule.tri }
            #renderPass drawTri { pipeline = $renderPipeline.p draw = 3 }
            #frame main { perform = [drawTri] }
        "#;
        let module = compile_to_module(src);

        let create_shader = module.bytecode.iter().position(|&b| b == PngbOpcode::CreateShaderModule.tag());
        let create_pipeline = module.bytecode.iter().position(|&b| b == PngbOpcode::CreateRenderPipeline.tag());
        let draw = module.bytecode.iter().position(|&b| b == PngbOpcode::Draw.tag());
        let define_frame = module.bytecode.iter().position(|&b| b == PngbOpcode::DefineFrame.tag());
        let submit = module.bytecode.iter().position(|&b| b == PngbOpcode::Submit.tag());
        let end = module.bytecode.iter().position(|&b| b == PngbOpcode::End.tag());

        assert!(create_shader.unwrap() < create_pipeline.unwrap());
        assert!(create_pipeline.unwrap() < define_frame.unwrap());
        assert!(draw.unwrap() < define_frame.unwrap());
        assert!(define_frame.unwrap() < submit.unwrap());
        assert!(submit.unwrap() < end.unwrap());

        assert_eq!(module.bytecode[create_shader.unwrap() + 1], 0); // shader id 0
        assert_eq!(module.bytecode[create_shader.unwrap() + 2], 0); // data id 0
    }

    #[test]
    fn shader_module_referencing_wgsl_emits_a_data_id_not_a_wgsl_id() {
        // Regression test for the shader-data binding boundary (§4.D/§8):
        // when `source = $wgsl.frag`, the emitted `create_shader_module`
        // argument must be the `DataId` the wgsl entry points at, which need
        // not equal the wgsl namespace id once more than one wgsl/data blob
        // has been registered first.
        let src = r#"
            #wgsl frag { source = "fn fs_main() {}" }
            #shaderModule combined { source = $wgsl.frag }
        "#;
        let module = compile_to_module(src);
        let op_pos = module
            .bytecode
            .iter()
            .position(|&b| b == PngbOpcode::CreateShaderModule.tag())
            .unwrap();
        let data_id = module.bytecode[op_pos + 2] as u16;
        let expected = module.wgsl.get(pngb_format::WgslId::new(0)).unwrap().data;
        assert_eq!(data_id, expected.index());
    }

    #[test]
    fn pooled_buffer_emits_n_create_buffer_ops() {
        let src = r#"
            #buffer ring { size = 16 pool = 3 }
        "#;
        let module = compile_to_module(src);
        let count = module
            .bytecode
            .iter()
            .filter(|&&b| b == PngbOpcode::CreateBuffer.tag())
            .count();
        assert_eq!(count, 3);
    }
}
