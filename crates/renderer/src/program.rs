//! GLSL shader program: compile a vertex/fragment pair, reflect named
//! uniforms and attributes, and own the pipeline that draws with them.
//!
//! GLSL goes through naga's front end. Reflection reads the resulting IR:
//! a uniform is a named member of a `layout(set = 0, binding = N)` uniform
//! block, an attribute is a vertex entry-point input with an explicit
//! `layout(location = N)`.

use std::{
    borrow::Cow,
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use glam::Mat4;
use naga::{
    AddressSpace, Binding, Module, Scalar, ShaderStage, TypeInner, VectorSize,
    front::glsl,
    valid::{Capabilities, ValidationFlags, Validator},
};
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingType, Buffer, BufferBindingType, BufferDescriptor, BufferSize,
    BufferUsages, ColorTargetState, ColorWrites, CompareFunction, DepthStencilState, Device,
    ErrorFilter, FragmentState, PipelineCompilationOptions, PipelineLayoutDescriptor, Queue,
    RenderPass, RenderPipeline, RenderPipelineDescriptor, ShaderModuleDescriptor, ShaderSource,
    ShaderStages, TextureFormat, VertexAttribute, VertexBufferLayout, VertexFormat, VertexState,
    VertexStepMode,
};

use crate::error::ProgramError;

/// Where a uniform lives: a byte range inside a set 0 uniform block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniformSlot {
    pub binding: u32,
    pub offset: u32,
    pub size: u32,
}

/// Where an attribute lives: its shader location and the vertex buffer slot
/// the pipeline reads it from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttributeSlot {
    pub location: u32,
    pub buffer_slot: u32,
    pub format: VertexFormat,
}

#[derive(Clone, Copy, Debug)]
struct UniformBlock {
    binding: u32,
    size: u32,
    visibility: ShaderStages,
}

/// Everything reflection finds in a compiled program.
#[derive(Clone, Debug, Default)]
struct ProgramLayout {
    uniforms: HashMap<String, UniformSlot>,
    attributes: HashMap<String, AttributeSlot>,
    blocks: Vec<UniformBlock>,
}

impl ProgramLayout {
    /// Vertex inputs ordered by the buffer slot the pipeline reads them from.
    fn vertex_inputs(&self) -> Vec<(&str, AttributeSlot)> {
        let mut inputs: Vec<_> = self
            .attributes
            .iter()
            .map(|(name, slot)| (name.as_str(), *slot))
            .collect();
        inputs.sort_by_key(|(_, slot)| slot.buffer_slot);
        inputs
    }

    /// The same block may appear in both stages; a name may not map to two
    /// different slots.
    fn insert_uniform(&mut self, name: &str, slot: UniformSlot) -> Result<(), ProgramError> {
        match self.uniforms.get(name) {
            Some(existing) if *existing != slot => Err(ProgramError::Unsupported(format!(
                "uniform '{name}' is declared at binding {} and binding {}",
                existing.binding, slot.binding
            ))),
            Some(_) => Ok(()),
            None => {
                self.uniforms.insert(name.to_owned(), slot);
                Ok(())
            }
        }
    }
}

struct Compiled {
    vertex: Module,
    fragment: Module,
    layout: ProgramLayout,
}

struct GpuProgram {
    pipeline: RenderPipeline,
    bind_group: BindGroup,
    /// Uniform buffers keyed by binding index (group 0).
    buffers: HashMap<u32, Buffer>,
}

#[derive(Default)]
pub struct ShaderProgram {
    vert_path: Option<PathBuf>,
    frag_path: Option<PathBuf>,
    verbose: bool,
    compiled: Option<Compiled>,
    uniforms: HashMap<String, UniformSlot>,
    attributes: HashMap<String, AttributeSlot>,
    gpu: Option<GpuProgram>,
    bound: bool,
}

impl ShaderProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn set_shader_names(&mut self, vert: impl Into<PathBuf>, frag: impl Into<PathBuf>) {
        self.vert_path = Some(vert.into());
        self.frag_path = Some(frag.into());
    }

    /// Read, compile and reflect both shader files. Needs no GPU.
    pub fn compile(&mut self) -> Result<(), ProgramError> {
        let (Some(vert), Some(frag)) = (self.vert_path.clone(), self.frag_path.clone()) else {
            return Err(ProgramError::MissingShaderNames);
        };
        let vert_src = self.read_source(&vert)?;
        let frag_src = self.read_source(&frag)?;
        self.compile_sources(&vert_src, &frag_src)
    }

    /// Compile and reflect from in-memory GLSL sources.
    pub fn compile_sources(&mut self, vert_src: &str, frag_src: &str) -> Result<(), ProgramError> {
        let result = compile_stage(vert_src, ShaderStage::Vertex).and_then(|vertex| {
            let fragment = compile_stage(frag_src, ShaderStage::Fragment)?;
            let layout = reflect(&vertex, &fragment)?;
            Ok(Compiled {
                vertex,
                fragment,
                layout,
            })
        });

        match result {
            Ok(compiled) => {
                if self.verbose {
                    log::info!(
                        "Shader program compiled: {} uniform(s), {} attribute(s)",
                        compiled.layout.uniforms.len(),
                        compiled.layout.attributes.len()
                    );
                }
                self.compiled = Some(compiled);
                Ok(())
            }
            Err(err) => {
                self.compiled = None;
                if self.verbose {
                    log::error!("{err}");
                }
                Err(err)
            }
        }
    }

    /// Compile, then create shader modules, uniform buffers and the pipeline.
    /// On failure the program stays unusable.
    pub fn init(
        &mut self,
        device: &Device,
        color_format: TextureFormat,
        depth_format: TextureFormat,
    ) -> Result<(), ProgramError> {
        self.gpu = None;
        self.compile()?;
        let compiled = self.compiled.as_ref().ok_or(ProgramError::NotInitialized)?;

        match link(device, compiled, color_format, depth_format) {
            Ok(gpu) => {
                self.gpu = Some(gpu);
                Ok(())
            }
            Err(err) => {
                if self.verbose {
                    log::error!("{err}");
                }
                Err(err)
            }
        }
    }

    /// Register an active uniform and cache its location.
    pub fn add_uniform(&mut self, name: &str) -> Result<UniformSlot, ProgramError> {
        let found = self
            .compiled
            .as_ref()
            .and_then(|c| c.layout.uniforms.get(name).copied());
        match found {
            Some(slot) => {
                self.uniforms.insert(name.to_owned(), slot);
                Ok(slot)
            }
            None => {
                log::error!("{name} is not an active uniform variable");
                Err(ProgramError::UnknownUniform(name.to_owned()))
            }
        }
    }

    /// Register an active vertex attribute and cache its location.
    pub fn add_attribute(&mut self, name: &str) -> Result<AttributeSlot, ProgramError> {
        let found = self
            .compiled
            .as_ref()
            .and_then(|c| c.layout.attributes.get(name).copied());
        match found {
            Some(slot) => {
                self.attributes.insert(name.to_owned(), slot);
                Ok(slot)
            }
            None => {
                log::error!("{name} is not an active attribute variable");
                Err(ProgramError::UnknownAttribute(name.to_owned()))
            }
        }
    }

    pub fn uniform(&self, name: &str) -> Result<UniformSlot, ProgramError> {
        self.uniforms
            .get(name)
            .copied()
            .ok_or_else(|| ProgramError::UnregisteredUniform(name.to_owned()))
    }

    pub fn attribute(&self, name: &str) -> Result<AttributeSlot, ProgramError> {
        self.attributes
            .get(name)
            .copied()
            .ok_or_else(|| ProgramError::UnregisteredAttribute(name.to_owned()))
    }

    /// Every attribute the vertex stage reads, in pipeline buffer-slot order.
    /// A draw must feed all of them.
    pub fn vertex_inputs(&self) -> Vec<(&str, AttributeSlot)> {
        self.compiled
            .as_ref()
            .map(|c| c.layout.vertex_inputs())
            .unwrap_or_default()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn is_initialized(&self) -> bool {
        self.gpu.is_some()
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Upload a column-major 4x4 matrix to a registered uniform.
    pub fn set_uniform_mat4(&self, queue: &Queue, name: &str, m: &Mat4) -> Result<(), ProgramError> {
        let slot = self.uniform(name)?;
        let cols = m.to_cols_array();
        let bytes: &[u8] = bytemuck::cast_slice(&cols);
        if slot.size as usize != bytes.len() {
            return Err(ProgramError::UniformSize {
                name: name.to_owned(),
                expected: slot.size,
                actual: bytes.len(),
            });
        }
        let buffer = self
            .gpu
            .as_ref()
            .and_then(|gpu| gpu.buffers.get(&slot.binding))
            .ok_or(ProgramError::NotInitialized)?;
        queue.write_buffer(buffer, slot.offset as u64, bytes);
        Ok(())
    }

    /// Make this program current for `pass`.
    pub fn bind(&mut self, pass: &mut RenderPass<'_>) -> Result<(), ProgramError> {
        let gpu = self.gpu.as_ref().ok_or(ProgramError::NotInitialized)?;
        pass.set_pipeline(&gpu.pipeline);
        pass.set_bind_group(0, &gpu.bind_group, &[]);
        self.bound = true;
        Ok(())
    }

    /// Release the program. A render pass has no "no pipeline" state to
    /// restore, so this only ends the bound section.
    pub fn unbind(&mut self) {
        self.bound = false;
    }

    fn read_source(&self, path: &Path) -> Result<String, ProgramError> {
        if self.verbose {
            log::info!("Reading shader {}", path.display());
        }
        fs::read_to_string(path).map_err(|source| {
            let err = ProgramError::Read {
                path: path.to_owned(),
                source,
            };
            log::error!("{err}");
            err
        })
    }
}

fn compile_stage(source: &str, stage: ShaderStage) -> Result<Module, ProgramError> {
    let mut frontend = glsl::Frontend::default();
    let module = frontend
        .parse(&glsl::Options::from(stage), source)
        .map_err(|errors| ProgramError::Compile {
            stage,
            message: errors.emit_to_string(source),
        })?;

    Validator::new(ValidationFlags::all(), Capabilities::default())
        .validate(&module)
        .map_err(|err| ProgramError::Compile {
            stage,
            message: err.emit_to_string(source),
        })?;
    Ok(module)
}

fn reflect(vertex: &Module, fragment: &Module) -> Result<ProgramLayout, ProgramError> {
    let mut layout = ProgramLayout::default();

    for (module, visibility) in [
        (vertex, ShaderStages::VERTEX),
        (fragment, ShaderStages::FRAGMENT),
    ] {
        reflect_uniforms(module, visibility, &mut layout)?;
    }

    let entry = vertex
        .entry_points
        .iter()
        .find(|ep| ep.stage == ShaderStage::Vertex)
        .ok_or_else(|| ProgramError::Unsupported("no vertex entry point".into()))?;

    let mut inputs = Vec::new();
    for arg in &entry.function.arguments {
        let (Some(name), Some(Binding::Location { location, .. })) = (&arg.name, &arg.binding)
        else {
            continue;
        };
        let format = vertex_format(&vertex.types[arg.ty].inner).ok_or_else(|| {
            ProgramError::Unsupported(format!("attribute '{name}' has a non-float type"))
        })?;
        inputs.push((name.clone(), *location, format));
    }
    inputs.sort_by_key(|(_, location, _)| *location);

    for (buffer_slot, (name, location, format)) in inputs.into_iter().enumerate() {
        layout.attributes.insert(
            name,
            AttributeSlot {
                location,
                buffer_slot: buffer_slot as u32,
                format,
            },
        );
    }

    Ok(layout)
}

fn reflect_uniforms(
    module: &Module,
    visibility: ShaderStages,
    layout: &mut ProgramLayout,
) -> Result<(), ProgramError> {
    let ctx = module.to_ctx();
    for (_, var) in module.global_variables.iter() {
        if !matches!(var.space, AddressSpace::Uniform) {
            continue;
        }
        let Some(rb) = &var.binding else {
            continue;
        };
        if rb.group != 0 {
            return Err(ProgramError::Unsupported(format!(
                "uniform block in set {} (only set 0 is used)",
                rb.group
            )));
        }

        let ty = &module.types[var.ty].inner;
        let size = ty.size(ctx);
        match layout.blocks.iter_mut().find(|b| b.binding == rb.binding) {
            Some(block) => {
                block.size = block.size.max(size);
                block.visibility |= visibility;
            }
            None => layout.blocks.push(UniformBlock {
                binding: rb.binding,
                size,
                visibility,
            }),
        }

        match ty {
            TypeInner::Struct { members, .. } => {
                for member in members {
                    let Some(name) = &member.name else {
                        continue;
                    };
                    layout.insert_uniform(
                        name,
                        UniformSlot {
                            binding: rb.binding,
                            offset: member.offset,
                            size: module.types[member.ty].inner.size(ctx),
                        },
                    )?;
                }
            }
            _ => {
                if let Some(name) = &var.name {
                    layout.insert_uniform(
                        name,
                        UniformSlot {
                            binding: rb.binding,
                            offset: 0,
                            size,
                        },
                    )?;
                }
            }
        }
    }
    Ok(())
}

fn vertex_format(ty: &TypeInner) -> Option<VertexFormat> {
    match *ty {
        TypeInner::Scalar(s) if s == Scalar::F32 => Some(VertexFormat::Float32),
        TypeInner::Vector { size, scalar } if scalar == Scalar::F32 => Some(match size {
            VectorSize::Bi => VertexFormat::Float32x2,
            VectorSize::Tri => VertexFormat::Float32x3,
            VectorSize::Quad => VertexFormat::Float32x4,
        }),
        _ => None,
    }
}

/// Create GPU objects for a compiled program. Interface mismatches between the
/// stages surface here as validation errors.
fn link(
    device: &Device,
    compiled: &Compiled,
    color_format: TextureFormat,
    depth_format: TextureFormat,
) -> Result<GpuProgram, ProgramError> {
    device.push_error_scope(ErrorFilter::Validation);

    let vs = device.create_shader_module(ShaderModuleDescriptor {
        label: Some("Vertex shader"),
        source: ShaderSource::Naga(Cow::Owned(compiled.vertex.clone())),
    });
    let fs = device.create_shader_module(ShaderModuleDescriptor {
        label: Some("Fragment shader"),
        source: ShaderSource::Naga(Cow::Owned(compiled.fragment.clone())),
    });

    let mut blocks = compiled.layout.blocks.clone();
    blocks.sort_by_key(|b| b.binding);

    let bgl_entries: Vec<BindGroupLayoutEntry> = blocks
        .iter()
        .map(|b| BindGroupLayoutEntry {
            binding: b.binding,
            visibility: b.visibility,
            ty: BindingType::Buffer {
                ty: BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: BufferSize::new(b.size as u64),
            },
            count: None,
        })
        .collect();
    let bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("Program BGL"),
        entries: &bgl_entries,
    });

    let buffers: HashMap<u32, Buffer> = blocks
        .iter()
        .map(|b| {
            let buffer = device.create_buffer(&BufferDescriptor {
                label: Some("Program UBO"),
                size: (b.size as u64).next_multiple_of(16),
                usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            (b.binding, buffer)
        })
        .collect();

    let bg_entries: Vec<BindGroupEntry> = blocks
        .iter()
        .map(|b| BindGroupEntry {
            binding: b.binding,
            resource: buffers[&b.binding].as_entire_binding(),
        })
        .collect();
    let bind_group = device.create_bind_group(&BindGroupDescriptor {
        label: Some("Program BG"),
        layout: &bgl,
        entries: &bg_entries,
    });

    // One tightly packed buffer per attribute, ordered by buffer slot.
    let attributes: Vec<AttributeSlot> = compiled
        .layout
        .vertex_inputs()
        .into_iter()
        .map(|(_, slot)| slot)
        .collect();
    let vertex_attributes: Vec<[VertexAttribute; 1]> = attributes
        .iter()
        .map(|a| {
            [VertexAttribute {
                format: a.format,
                offset: 0,
                shader_location: a.location,
            }]
        })
        .collect();
    let vertex_buffers: Vec<VertexBufferLayout> = attributes
        .iter()
        .zip(&vertex_attributes)
        .map(|(a, attrs)| VertexBufferLayout {
            array_stride: a.format.size(),
            step_mode: VertexStepMode::Vertex,
            attributes: attrs,
        })
        .collect();

    let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("Program PipelineLayout"),
        bind_group_layouts: &[&bgl],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("Program Pipeline"),
        layout: Some(&pipeline_layout),
        vertex: VertexState {
            module: &vs,
            entry_point: Some("main"),
            buffers: &vertex_buffers,
            compilation_options: PipelineCompilationOptions::default(),
        },
        fragment: Some(FragmentState {
            module: &fs,
            entry_point: Some("main"),
            targets: &[Some(ColorTargetState {
                format: color_format,
                blend: None,
                write_mask: ColorWrites::ALL,
            })],
            compilation_options: PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: Some(DepthStencilState {
            format: depth_format,
            depth_write_enabled: true,
            depth_compare: CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });

    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(ProgramError::Link(err.to_string()));
    }

    Ok(GpuProgram {
        pipeline,
        bind_group,
        buffers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERT: &str = include_str!("../../../resources/simple_vert.glsl");
    const FRAG: &str = include_str!("../../../resources/simple_frag.glsl");

    fn compiled() -> ShaderProgram {
        let mut program = ShaderProgram::new();
        program.compile_sources(VERT, FRAG).expect("shipped shaders compile");
        program
    }

    #[test]
    fn reflects_transform_uniforms() {
        let mut program = compiled();
        let p = program.add_uniform("P").unwrap();
        let v = program.add_uniform("V").unwrap();
        let mv = program.add_uniform("MV").unwrap();

        assert_eq!(p.binding, 0);
        assert_eq!([p.offset, v.offset, mv.offset], [0, 64, 128]);
        assert_eq!([p.size, v.size, mv.size], [64, 64, 64]);
        assert_eq!(program.uniform("MV").unwrap(), mv);
    }

    #[test]
    fn reflects_vertex_attributes() {
        let mut program = compiled();
        let pos = program.add_attribute("vertPos").unwrap();
        let nor = program.add_attribute("vertNor").unwrap();

        assert_eq!(pos.location, 0);
        assert_eq!(pos.buffer_slot, 0);
        assert_eq!(pos.format, VertexFormat::Float32x3);
        assert_eq!(nor.location, 1);
        assert_eq!(nor.buffer_slot, 1);
        assert!(program.has_attribute("vertNor"));
    }

    #[test]
    fn buffer_slots_follow_location_order() {
        let vert = r#"#version 450
layout(location = 3) in vec2 b;
layout(location = 1) in vec4 a;
void main() { gl_Position = a + vec4(b, 0.0, 0.0); }
"#;
        let frag = r#"#version 450
layout(location = 0) out vec4 color;
void main() { color = vec4(1.0); }
"#;
        let mut program = ShaderProgram::new();
        program.compile_sources(vert, frag).unwrap();
        let a = program.add_attribute("a").unwrap();
        let b = program.add_attribute("b").unwrap();
        assert_eq!((a.location, a.buffer_slot, a.format), (1, 0, VertexFormat::Float32x4));
        assert_eq!((b.location, b.buffer_slot, b.format), (3, 1, VertexFormat::Float32x2));
    }

    #[test]
    fn vertex_inputs_list_pipeline_slots_in_order() {
        let program = compiled();
        let inputs: Vec<(&str, u32)> = program
            .vertex_inputs()
            .into_iter()
            .map(|(name, slot)| (name, slot.buffer_slot))
            .collect();
        assert_eq!(inputs, vec![("vertPos", 0), ("vertNor", 1)]);
        assert!(ShaderProgram::new().vertex_inputs().is_empty());
    }

    #[test]
    fn uniform_block_shared_by_both_stages_is_accepted() {
        let vert = r#"#version 450
layout(set = 0, binding = 0) uniform Shared { mat4 M; };
layout(location = 0) in vec4 a;
void main() { gl_Position = M * a; }
"#;
        let frag = r#"#version 450
layout(set = 0, binding = 0) uniform Shared { mat4 M; };
layout(location = 0) out vec4 color;
void main() { color = M[0]; }
"#;
        let mut program = ShaderProgram::new();
        program.compile_sources(vert, frag).unwrap();
        assert_eq!(program.add_uniform("M").unwrap().binding, 0);
    }

    #[test]
    fn same_uniform_name_in_two_blocks_is_rejected() {
        let vert = r#"#version 450
layout(set = 0, binding = 0) uniform First { mat4 M; };
layout(set = 0, binding = 1) uniform Second { vec4 pad; mat4 M; } second;
layout(location = 0) in vec4 a;
void main() { gl_Position = M * second.M * a + second.pad; }
"#;
        let frag = r#"#version 450
layout(location = 0) out vec4 color;
void main() { color = vec4(1.0); }
"#;
        let mut program = ShaderProgram::new();
        let err = program.compile_sources(vert, frag).unwrap_err();
        assert!(matches!(err, ProgramError::Unsupported(msg) if msg.contains("'M'")));
    }

    #[test]
    fn unknown_names_are_rejected() {
        let mut program = compiled();
        assert!(matches!(
            program.add_uniform("Q"),
            Err(ProgramError::UnknownUniform(name)) if name == "Q"
        ));
        assert!(matches!(
            program.add_attribute("vertTex"),
            Err(ProgramError::UnknownAttribute(_))
        ));
    }

    #[test]
    fn unregistered_lookup_is_an_error() {
        let program = compiled();
        assert!(matches!(
            program.uniform("P"),
            Err(ProgramError::UnregisteredUniform(_))
        ));
        assert!(matches!(
            program.attribute("vertPos"),
            Err(ProgramError::UnregisteredAttribute(_))
        ));
        assert!(!program.has_attribute("vertPos"));
    }

    #[test]
    fn compile_error_leaves_program_unusable() {
        let mut program = ShaderProgram::new();
        let err = program
            .compile_sources("#version 450\nvoid main() { undefined_call(); }\n", FRAG)
            .unwrap_err();
        assert!(matches!(
            err,
            ProgramError::Compile {
                stage: ShaderStage::Vertex,
                ..
            }
        ));
        assert!(program.add_uniform("P").is_err());
        assert!(!program.is_initialized());
    }

    #[test]
    fn compile_requires_shader_names() {
        let mut program = ShaderProgram::new();
        assert!(matches!(program.compile(), Err(ProgramError::MissingShaderNames)));
    }

    #[test]
    fn missing_shader_file_is_reported() {
        let mut program = ShaderProgram::new();
        program.set_shader_names("/no/such/simple_vert.glsl", "/no/such/simple_frag.glsl");
        assert!(matches!(program.compile(), Err(ProgramError::Read { .. })));
    }

    #[test]
    fn compile_reads_shipped_files() {
        let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../../resources");
        let mut program = ShaderProgram::new();
        program.set_verbose(true);
        program.set_shader_names(
            Path::new(dir).join("simple_vert.glsl"),
            Path::new(dir).join("simple_frag.glsl"),
        );
        program.compile().unwrap();
        assert!(program.add_uniform("V").is_ok());
    }
}
