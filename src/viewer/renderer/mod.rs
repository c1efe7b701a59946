//! wgpu implementation of the shadow pipeline's render backend.
//!
//! Every pass records into its own encoder and submits immediately, so a
//! uniform written with `queue.write_buffer` before a pass is the value the
//! pass sees. Targets stay on the GPU; the composite pass samples light
//! maps and irradiance directly.

mod passes;
mod pipelines;
mod resources;

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use shadow_shaders::{
    AccumulateUniform, AtlasRowUniform, BindGroupLayouts, CameraUniform, CompositeUniform,
    DrawUniform, KernelUniform, LightPassUniform, Vertex,
};

pub use resources::{GpuAccum, GpuGBuffer, GpuTarget};

use pipelines::{create_pipelines, Pipelines};
use resources::{placeholder_texture, DepthTexture, Mesh};

use crate::camera::ViewportSize;
use crate::geom::{GeometryBuffer, Scene};
use crate::util::{Error, Result};

fn uniform_buffer<T: bytemuck::Pod + bytemuck::Zeroable>(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::bytes_of(&T::zeroed()),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

/// Object and receiver as uploaded by `prepare_scene`.
struct SceneMeshes {
    object: Option<Mesh>,
    receiver: Option<Mesh>,
}

/// Shared VPL storage plus the atlas row bind group that reads it.
struct VplStorage {
    buffer: wgpu::Buffer,
    capacity: usize,
    atlas_bind_group: wgpu::BindGroup,
}

/// Per-draw composite flags.
struct DrawFlags {
    #[allow(dead_code)]
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// GPU renderer state
pub struct Renderer {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    layouts: BindGroupLayouts,
    pipelines: Pipelines,

    map_sampler: wgpu::Sampler,
    placeholder_map: wgpu::TextureView,
    placeholder_accum: wgpu::TextureView,

    // Uniforms
    light_buffer: wgpu::Buffer,
    light_bind_group: wgpu::BindGroup,
    atlas_row_buffer: wgpu::Buffer,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    accumulate_buffer: wgpu::Buffer,
    composite_buffer: wgpu::Buffer,
    kernel_buffer: wgpu::Buffer,
    /// Samples packed by the last `upload_kernel`.
    kernel_len: usize,
    composite_frame_bind_group: wgpu::BindGroup,
    /// [casts only, receives shadow]
    draw_flags: [DrawFlags; 2],

    meshes: Option<SceneMeshes>,
    vpls: Option<VplStorage>,

    // Size-keyed attachments
    depth_textures: HashMap<ViewportSize, DepthTexture>,
    atlas_depth: Option<DepthTexture>,
    gbuffer: Option<GpuGBuffer>,
    frame: Option<GpuTarget>,
}

impl Renderer {
    /// Build the renderer on an existing device, e.g. eframe's.
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Result<Self> {
        let _span = tracing::info_span!("renderer_new").entered();
        let device = device.clone();
        let queue = queue.clone();

        let layouts = shadow_shaders::create_bind_group_layouts(&device);
        let pipelines = create_pipelines(&device, &layouts)?;

        let map_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("light_map_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let placeholder_map = placeholder_texture(&device, "placeholder_map", shadow_shaders::TARGET_FORMAT);
        let placeholder_accum = placeholder_texture(&device, "placeholder_accum", shadow_shaders::ACCUM_FORMAT);

        let light_buffer = uniform_buffer::<LightPassUniform>(&device, "light_pass_uniform");
        let light_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("light_pass_bind_group"),
            layout: &layouts.light_pass,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: light_buffer.as_entire_binding(),
            }],
        });

        let atlas_row_buffer = uniform_buffer::<AtlasRowUniform>(&device, "atlas_row_uniform");

        let camera_buffer = uniform_buffer::<CameraUniform>(&device, "gbuffer_camera_uniform");
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("gbuffer_camera_bind_group"),
            layout: &layouts.gbuffer,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let accumulate_buffer = uniform_buffer::<AccumulateUniform>(&device, "accumulate_uniform");

        let composite_buffer = uniform_buffer::<CompositeUniform>(&device, "composite_uniform");
        let kernel_buffer = uniform_buffer::<KernelUniform>(&device, "kernel_uniform");
        let composite_frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("composite_frame_bind_group"),
            layout: &layouts.composite_frame,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: composite_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: kernel_buffer.as_entire_binding(),
                },
            ],
        });

        let draw_flags = [false, true].map(|receive_shadow| {
            let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("composite_draw_uniform"),
                contents: bytemuck::bytes_of(&DrawUniform::new(receive_shadow)),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("composite_draw_bind_group"),
                layout: &layouts.composite_draw,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            });
            DrawFlags { buffer, bind_group }
        });

        log::info!("GPU renderer ready");
        Ok(Self {
            device,
            queue,
            layouts,
            pipelines,
            map_sampler,
            placeholder_map,
            placeholder_accum,
            light_buffer,
            light_bind_group,
            atlas_row_buffer,
            camera_buffer,
            camera_bind_group,
            accumulate_buffer,
            composite_buffer,
            kernel_buffer,
            kernel_len: 0,
            composite_frame_bind_group,
            draw_flags,
            meshes: None,
            vpls: None,
            depth_textures: HashMap::new(),
            atlas_depth: None,
            gbuffer: None,
            frame: None,
        })
    }

    /// Create a device without a window for the `render --gpu` command.
    pub fn headless() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| Error::gpu(format!("no suitable GPU adapter: {e}")))?;

        let info = adapter.get_info();
        log::info!("Headless adapter: {} ({:?})", info.name, info.backend);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("shadowmaps_headless"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            ..Default::default()
        }))
        .map_err(|e| Error::gpu(format!("failed to create GPU device: {e}")))?;

        Self::new(&device, &queue)
    }

    fn upload_mesh(&self, label: &str, geometry: &GeometryBuffer) -> Option<Mesh> {
        if geometry.is_empty() {
            return None;
        }

        let vertices: Vec<Vertex> = geometry
            .positions()
            .iter()
            .zip(geometry.normals())
            .zip(geometry.colors())
            .map(|((p, n), c)| Vertex {
                position: p.to_array(),
                normal: n.to_array(),
                color: c.to_array(),
            })
            .collect();
        let indices: Vec<u32> = geometry.triangles().iter().flatten().copied().collect();

        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Some(Mesh {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        })
    }

    /// Uploaded mesh of `geometry`, which must be one of `scene`'s buffers.
    fn mesh_for(&self, scene: &Scene, geometry: &GeometryBuffer) -> Option<&Mesh> {
        let meshes = self.meshes.as_ref()?;
        if std::ptr::eq(geometry, &scene.object) {
            meshes.object.as_ref()
        } else if std::ptr::eq(geometry, &scene.receiver) {
            meshes.receiver.as_ref()
        } else {
            None
        }
    }

    fn depth_view(&mut self, size: ViewportSize) -> wgpu::TextureView {
        let device = &self.device;
        self.depth_textures
            .entry(size)
            .or_insert_with(|| DepthTexture::new(device, size))
            .view
            .clone()
    }

    /// VPL storage sized for `capacity` cells, reallocated when it grows.
    fn ensure_vpl_storage(&mut self, capacity: usize) -> &VplStorage {
        let storage = match self.vpls.take() {
            Some(storage) if storage.capacity >= capacity => storage,
            _ => self.create_vpl_storage(capacity.max(1)),
        };
        self.vpls.insert(storage)
    }

    fn create_vpl_storage(&self, capacity: usize) -> VplStorage {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("vpl_storage"),
            size: (capacity * std::mem::size_of::<shadow_shaders::GpuVpl>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let atlas_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("atlas_row_bind_group"),
            layout: &self.layouts.atlas,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.atlas_row_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffer.as_entire_binding(),
                },
            ],
        });
        VplStorage {
            buffer,
            capacity,
            atlas_bind_group,
        }
    }

    fn ensure_gbuffer(&mut self, size: ViewportSize) -> GpuGBuffer {
        match &self.gbuffer {
            Some(gbuffer) if gbuffer.size == size => gbuffer.clone(),
            _ => {
                let gbuffer = GpuGBuffer::new(&self.device, size);
                self.gbuffer = Some(gbuffer.clone());
                gbuffer
            }
        }
    }

    fn ensure_frame(&mut self, size: ViewportSize) -> GpuTarget {
        match &self.frame {
            Some(frame) if frame.size == size => frame.clone(),
            _ => {
                log::debug!("Frame target {}x{}", size.width, size.height);
                let frame = GpuTarget::new(&self.device, "frame_target", size);
                self.frame = Some(frame.clone());
                frame
            }
        }
    }
}
