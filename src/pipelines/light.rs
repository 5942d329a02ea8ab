use wgpu::util::DeviceExt;

use crate::data_structures::{scene_graph::Scene, texture::Texture};

/// Everything the shaders need to know about the scene's lights.
///
/// `direction.w` is 1.0 while the sun casts shadows.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    view_proj: [[f32; 4]; 4],
    direction: [f32; 4],
    colour: [f32; 4],
    ambient: [f32; 4],
}

impl LightUniform {
    pub fn new(scene: &Scene) -> Self {
        let sun = &scene.sun;
        let ambient = &scene.ambient;
        let direction = sun.direction();
        let scaled = |rgb: [f32; 3], intensity: f32| {
            [rgb[0] * intensity, rgb[1] * intensity, rgb[2] * intensity, 1.0]
        };
        Self {
            view_proj: sun.view_proj().into(),
            direction: [
                direction.x,
                direction.y,
                direction.z,
                if sun.cast_shadow { 1.0 } else { 0.0 },
            ],
            colour: scaled(sun.colour, sun.intensity),
            ambient: scaled(ambient.colour, ambient.intensity),
        }
    }
}

pub struct LightResources {
    pub uniform: LightUniform,
    pub buffer: wgpu::Buffer,
    pub shadow_map: Texture,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub bind_group: wgpu::BindGroup,
    /// Light buffer only, for the shadow pass which renders into `shadow_map`.
    pub shadow_bind_group_layout: wgpu::BindGroupLayout,
    pub shadow_bind_group: wgpu::BindGroup,
}

pub fn mk_buffer(device: &wgpu::Device, light_uniform: LightUniform) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Light Buffer"),
        contents: bytemuck::cast_slice(&[light_uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            uniform_entry(0, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT),
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Depth,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                count: None,
            },
        ],
        label: Some("light_bind_group_layout"),
    })
}

pub fn mk_shadow_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX)],
        label: Some("shadow_bind_group_layout"),
    })
}

impl LightResources {
    pub fn new(device: &wgpu::Device, scene: &Scene) -> Self {
        let uniform = LightUniform::new(scene);
        let buffer = mk_buffer(device, uniform);
        let shadow_map = Texture::create_shadow_map(device, scene.sun.shadow.map_size);

        let bind_group_layout = mk_bind_group_layout(device);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&shadow_map.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&shadow_map.sampler),
                },
            ],
            label: Some("light_bind_group"),
        });

        let shadow_bind_group_layout = mk_shadow_bind_group_layout(device);
        let shadow_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &shadow_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("shadow_bind_group"),
        });

        Self {
            uniform,
            buffer,
            shadow_map,
            bind_group_layout,
            bind_group,
            shadow_bind_group_layout,
            shadow_bind_group,
        }
    }

    /// Upload the lights again if they changed since the last frame.
    pub fn update(&mut self, queue: &wgpu::Queue, scene: &Scene) {
        let uniform = LightUniform::new(scene);
        if uniform != self.uniform {
            self.uniform = uniform;
            queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[uniform]));
        }
    }
}
