//! GPU-resident triangle mesh.

use std::ops::Range;

use asset::MeshData;
use wgpu::{Buffer, BufferUsages, Device, IndexFormat, RenderPass, VertexFormat, util::DeviceExt};

use crate::{error::RenderError, program::ShaderProgram};

/// Attribute fed from the position buffer.
pub const POSITION_ATTRIBUTE: &str = "vertPos";
/// Attribute fed from the normal buffer.
pub const NORMAL_ATTRIBUTE: &str = "vertNor";

/// The part of a render pass a mesh needs to draw itself.
pub trait DrawEncoder<B> {
    fn set_vertex_buffer(&mut self, slot: u32, buffer: &B);
    fn set_index_buffer(&mut self, buffer: &B);
    fn draw_indexed(&mut self, indices: Range<u32>);
}

impl DrawEncoder<Buffer> for RenderPass<'_> {
    fn set_vertex_buffer(&mut self, slot: u32, buffer: &Buffer) {
        RenderPass::set_vertex_buffer(self, slot, buffer.slice(..));
    }

    fn set_index_buffer(&mut self, buffer: &Buffer) {
        RenderPass::set_index_buffer(self, buffer.slice(..), IndexFormat::Uint32);
    }

    fn draw_indexed(&mut self, indices: Range<u32>) {
        RenderPass::draw_indexed(self, indices, 0, 0..1);
    }
}

/// Positions, normals and indices in separate buffers.
pub struct Mesh<B = Buffer> {
    positions: B,
    normals: B,
    indices: B,
    vertex_count: u32,
    index_count: u32,
}

impl Mesh<Buffer> {
    /// Upload `data` to the GPU. The CPU copy is dropped afterwards.
    pub fn init(device: &Device, data: MeshData) -> Result<Self, RenderError> {
        let (vertex_count, index_count) = counts(&data)?;

        let positions = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh positions"),
            contents: bytemuck::cast_slice(&data.positions),
            usage: BufferUsages::VERTEX,
        });
        let normals = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh normals"),
            contents: bytemuck::cast_slice(&data.normals),
            usage: BufferUsages::VERTEX,
        });
        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh indices"),
            contents: bytemuck::cast_slice(&data.indices),
            usage: BufferUsages::INDEX,
        });

        log::info!(
            "Mesh uploaded: {} vertices, {} triangles",
            vertex_count,
            index_count / 3
        );

        Ok(Self {
            positions,
            normals,
            indices,
            vertex_count,
            index_count,
        })
    }
}

impl<B> Mesh<B> {
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Bind a buffer to every vertex input of the program and issue one draw.
    /// Nothing is recorded unless every input is registered and fed.
    pub fn draw<E: DrawEncoder<B>>(
        &self,
        program: &ShaderProgram,
        encoder: &mut E,
    ) -> Result<(), RenderError> {
        program.attribute(POSITION_ATTRIBUTE)?;

        let inputs = program.vertex_inputs();
        let mut bindings = Vec::with_capacity(inputs.len());
        for (name, _) in inputs {
            let slot = program.attribute(name)?;
            let buffer = match name {
                POSITION_ATTRIBUTE => &self.positions,
                NORMAL_ATTRIBUTE => &self.normals,
                other => return Err(RenderError::UnfedAttribute(other.to_owned())),
            };
            expect_vec3(name, slot.format)?;
            bindings.push((slot.buffer_slot, buffer));
        }

        for (slot, buffer) in bindings {
            encoder.set_vertex_buffer(slot, buffer);
        }
        encoder.set_index_buffer(&self.indices);
        encoder.draw_indexed(0..self.index_count);
        Ok(())
    }
}

fn expect_vec3(name: &str, format: VertexFormat) -> Result<(), RenderError> {
    if format == VertexFormat::Float32x3 {
        Ok(())
    } else {
        Err(RenderError::AttributeFormat {
            name: name.to_owned(),
            format,
        })
    }
}

/// Vertex and index counts of an uploadable mesh.
fn counts(data: &MeshData) -> Result<(u32, u32), RenderError> {
    if !data.is_valid() {
        return Err(RenderError::InvalidMesh(format!(
            "{} positions, {} normals, {} indices",
            data.positions.len(),
            data.normals.len(),
            data.indices.len()
        )));
    }
    let vertex_count = u32::try_from(data.positions.len())
        .map_err(|_| RenderError::InvalidMesh("too many vertices".into()))?;
    let index_count = u32::try_from(data.indices.len())
        .map_err(|_| RenderError::InvalidMesh("too many indices".into()))?;
    Ok((vertex_count, index_count))
}
