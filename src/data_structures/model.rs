//! Mesh and material data.
//!
//! [`MeshData`] is the CPU-side description of a drawable primitive as it
//! lives in the scene graph. [`GpuMesh`] holds the uploaded vertex/index
//! buffers and the material bind group; the renderer creates it lazily, the
//! first time a mesh is drawn.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use wgpu::util::DeviceExt;

use crate::data_structures::texture::{Texture, TextureData};

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Surface description of a mesh: a base colour multiplied with an optional texture.
#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,
    /// Linear RGBA.
    pub base_colour: [f32; 4],
    pub base_colour_texture: Option<Arc<TextureData>>,
    pub double_sided: bool,
}

impl Material {
    pub fn coloured(name: &str, base_colour: [f32; 4]) -> Self {
        Self {
            name: name.to_string(),
            base_colour,
            base_colour_texture: None,
            double_sided: false,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::coloured("default", [1.0; 4])
    }
}

/// Process-unique identity of a [`MeshData`], used to key uploaded GPU buffers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(u64);

impl MeshId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug)]
pub struct MeshData {
    id: MeshId,
    pub name: String,
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    pub material: Material,
}

impl MeshData {
    pub fn new(
        name: impl Into<String>,
        vertices: Vec<ModelVertex>,
        indices: Vec<u32>,
        material: Material,
    ) -> Self {
        Self {
            id: MeshId::next(),
            name: name.into(),
            vertices,
            indices,
            material,
        }
    }

    pub fn id(&self) -> MeshId {
        self.id
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct MaterialUniform {
    base_colour: [f32; 4],
}

pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
        label: Some("material_bind_group_layout"),
    })
}

/// Uploaded buffers of one [`MeshData`].
#[derive(Debug)]
pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
    pub material_bind_group: wgpu::BindGroup,
}

impl GpuMesh {
    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        mesh: &MeshData,
    ) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Vertex Buffer", mesh.name)),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Index Buffer", mesh.name)),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let material = &mesh.material;
        let texture = match &material.base_colour_texture {
            Some(data) => Texture::from_data(device, queue, data, &material.name),
            None => Texture::white(device, queue),
        };
        let material_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Material Buffer", material.name)),
            contents: bytemuck::cast_slice(&[MaterialUniform {
                base_colour: material.base_colour,
            }]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let material_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&texture.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: material_buffer.as_entire_binding(),
                },
            ],
            label: Some(&material.name),
        });

        Self {
            vertex_buffer,
            index_buffer,
            num_elements: mesh.indices.len() as u32,
            material_bind_group,
        }
    }
}

pub trait DrawMesh {
    fn draw_mesh(&mut self, mesh: &GpuMesh, instance: u32);
    fn draw_mesh_depth(&mut self, mesh: &GpuMesh, instance: u32);
}

impl DrawMesh for wgpu::RenderPass<'_> {
    /// Draw with the material bound at group 2 (main pass).
    fn draw_mesh(&mut self, mesh: &GpuMesh, instance: u32) {
        self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        self.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.set_bind_group(2, &mesh.material_bind_group, &[]);
        self.draw_indexed(0..mesh.num_elements, 0, instance..instance + 1);
    }

    /// Geometry only, for the shadow pass.
    fn draw_mesh_depth(&mut self, mesh: &GpuMesh, instance: u32) {
        self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        self.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.draw_indexed(0..mesh.num_elements, 0, instance..instance + 1);
    }
}
