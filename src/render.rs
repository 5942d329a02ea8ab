//! Frame encoding.
//!
//! [`ScenePasses`] owns every GPU resource that depends on the scene rather
//! than on the surface: pipelines, camera and light uniforms, the shadow map,
//! the per-frame instance buffer and a cache of uploaded meshes. Each frame
//! runs a depth-only shadow pass from the sun followed by the lit main pass.

use std::collections::{HashMap, HashSet};

use wgpu::util::DeviceExt;

use crate::{
    camera::{Camera, CameraUniform},
    data_structures::{
        instance::InstanceRaw,
        model::{self, DrawMesh, GpuMesh, MeshId},
        scene_graph::{DrawItem, Scene},
    },
    pipelines::{basic, light::LightResources, shadow},
};

pub struct CameraResources {
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub bind_group: wgpu::BindGroup,
}

impl CameraResources {
    pub fn new(device: &wgpu::Device, camera: &Camera) -> Self {
        let mut uniform = CameraUniform::new();
        uniform.update_view_proj(camera);

        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("camera_bind_group_layout"),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        Self {
            uniform,
            buffer,
            bind_group_layout,
            bind_group,
        }
    }

    pub fn update(&mut self, queue: &wgpu::Queue, camera: &Camera) {
        self.uniform.update_view_proj(camera);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

pub struct ScenePasses {
    camera: CameraResources,
    light: LightResources,
    material_layout: wgpu::BindGroupLayout,
    basic_pipeline: wgpu::RenderPipeline,
    shadow_pipeline: wgpu::RenderPipeline,
    meshes: HashMap<MeshId, GpuMesh>,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
}

fn mk_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Instance Buffer"),
        size: (capacity * std::mem::size_of::<InstanceRaw>()) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

impl ScenePasses {
    const INITIAL_INSTANCES: usize = 16;

    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        scene: &Scene,
        camera: &Camera,
    ) -> Self {
        let camera = CameraResources::new(device, camera);
        let light = LightResources::new(device, scene);
        let material_layout = model::material_layout(device);

        let basic_pipeline = basic::mk_basic_pipeline(
            device,
            color_format,
            &camera.bind_group_layout,
            &light.bind_group_layout,
            &material_layout,
        );
        let shadow_pipeline = shadow::mk_shadow_pipeline(device, &light.shadow_bind_group_layout);

        Self {
            camera,
            light,
            material_layout,
            basic_pipeline,
            shadow_pipeline,
            meshes: HashMap::new(),
            instance_buffer: mk_instance_buffer(device, Self::INITIAL_INSTANCES),
            instance_capacity: Self::INITIAL_INSTANCES,
        }
    }

    pub fn uploaded_meshes(&self) -> usize {
        self.meshes.len()
    }

    /// Upload uniforms, instances and any mesh seen for the first time.
    fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        scene: &Scene,
        camera: &Camera,
    ) -> Vec<DrawItem> {
        self.camera.update(queue, camera);
        self.light.update(queue, scene);

        let items = scene.draw_items();

        let live: HashSet<MeshId> = items.iter().map(|item| item.mesh.id()).collect();
        self.meshes.retain(|id, _| live.contains(id));
        for item in &items {
            self.meshes.entry(item.mesh.id()).or_insert_with(|| {
                log::debug!("uploading mesh {}", item.mesh.name);
                GpuMesh::upload(device, queue, &self.material_layout, &item.mesh)
            });
        }

        let raws: Vec<InstanceRaw> = items
            .iter()
            .map(|item| item.world.to_raw(item.receive_shadow))
            .collect();
        if raws.len() > self.instance_capacity {
            self.instance_capacity = raws.len().next_power_of_two();
            self.instance_buffer = mk_instance_buffer(device, self.instance_capacity);
        }
        if !raws.is_empty() {
            queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&raws));
        }

        items
    }

    /// Record the shadow pass and the main pass of one frame into `encoder`.
    #[allow(clippy::too_many_arguments)]
    pub fn encode(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        color_view: &wgpu::TextureView,
        depth_view: &wgpu::TextureView,
        scene: &Scene,
        camera: &Camera,
    ) {
        let items = self.prepare(device, queue, scene, camera);

        {
            // Cleared even without casters so receivers sample a lit map.
            let mut shadow_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.light.shadow_map.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if scene.sun.cast_shadow {
                shadow_pass.set_pipeline(&self.shadow_pipeline);
                shadow_pass.set_bind_group(0, &self.light.shadow_bind_group, &[]);
                shadow_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
                for (index, item) in items.iter().enumerate() {
                    if !item.cast_shadow {
                        continue;
                    }
                    if let Some(mesh) = self.meshes.get(&item.mesh.id()) {
                        shadow_pass.draw_mesh_depth(mesh, index as u32);
                    }
                }
            }
        }

        let [r, g, b] = scene.background;
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: r as f64,
                        g: g as f64,
                        b: b as f64,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        if items.is_empty() {
            return;
        }
        render_pass.set_pipeline(&self.basic_pipeline);
        render_pass.set_bind_group(0, &self.camera.bind_group, &[]);
        render_pass.set_bind_group(1, &self.light.bind_group, &[]);
        render_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
        for (index, item) in items.iter().enumerate() {
            if let Some(mesh) = self.meshes.get(&item.mesh.id()) {
                render_pass.draw_mesh(mesh, index as u32);
            }
        }
    }
}
