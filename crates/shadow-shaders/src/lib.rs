//! WGSL passes for shadow mapping with one-bounce indirect light on wgpu.
//!
//! Five shaders cover the three techniques:
//!
//! - `light_pass`: light-space depth, normal, position or albedo (SM, RSM)
//! - `ism_atlas`: one row of imperfect shadow maps, one VPL per instance
//! - `gbuffer`: camera-space world position and normal
//! - `accumulate`: one atlas row of VPL irradiance added to the previous row
//! - `composite`: direct light, PCF shadows and the indirect term
//!
//! All share `codec.wgsl`, which packs depth into 24 bits of RGB exactly
//! like the CPU codec so targets can be read back and compared.
//!
//! ## Usage
//!
//! ```ignore
//! use shadow_shaders::{create_bind_group_layouts, create_composite_pipeline};
//!
//! let layouts = create_bind_group_layouts(&device);
//! let ism = create_composite_pipeline(&device, &layouts, 2.0);
//! ```

mod params;

pub use params::{
    AccumulateUniform, AtlasRowUniform, CameraUniform, CompositeUniform, DrawUniform, GpuVpl,
    KernelUniform, LightPassUniform, KERNEL_CAPACITY,
};

use std::num::NonZeroU64;

/// Shared encodings, vertex input and the VPL struct.
pub const CODEC: &str = include_str!("shaders/codec.wgsl");

/// A WGSL pass, prefixed with [`CODEC`] when compiled.
#[derive(Clone, Copy, Debug)]
pub struct ShaderSource {
    pub label: &'static str,
    pub file: &'static str,
    pub body: &'static str,
}

impl ShaderSource {
    /// Full module text.
    pub fn wgsl(&self) -> String {
        format!("{CODEC}\n{}", self.body)
    }

    pub fn create_module(&self, device: &wgpu::Device) -> wgpu::ShaderModule {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(self.label),
            source: wgpu::ShaderSource::Wgsl(self.wgsl().into()),
        })
    }
}

pub const LIGHT_PASS: ShaderSource = ShaderSource {
    label: "light_pass",
    file: "light_pass.wgsl",
    body: include_str!("shaders/light_pass.wgsl"),
};

pub const ISM_ATLAS: ShaderSource = ShaderSource {
    label: "ism_atlas",
    file: "ism_atlas.wgsl",
    body: include_str!("shaders/ism_atlas.wgsl"),
};

pub const GBUFFER: ShaderSource = ShaderSource {
    label: "gbuffer",
    file: "gbuffer.wgsl",
    body: include_str!("shaders/gbuffer.wgsl"),
};

pub const ACCUMULATE: ShaderSource = ShaderSource {
    label: "accumulate",
    file: "accumulate.wgsl",
    body: include_str!("shaders/accumulate.wgsl"),
};

pub const COMPOSITE: ShaderSource = ShaderSource {
    label: "composite",
    file: "composite.wgsl",
    body: include_str!("shaders/composite.wgsl"),
};

pub const ALL_SHADERS: [ShaderSource; 5] = [LIGHT_PASS, ISM_ATLAS, GBUFFER, ACCUMULATE, COMPOSITE];

/// Light maps, atlas and final frame.
pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// ISM irradiance ping-pong buffers.
pub const ACCUM_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// G-buffer position and normal.
pub const GBUFFER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Mesh vertex: position, normal and albedo.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
}

/// Vertex buffer layout for [`Vertex`]
pub fn vertex_buffer_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            // position
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            // normal
            wgpu::VertexAttribute {
                offset: 12,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x3,
            },
            // color
            wgpu::VertexAttribute {
                offset: 24,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32x3,
            },
        ],
    }
}

fn uniform_entry<T>(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(std::mem::size_of::<T>() as u64),
        },
        count: None,
    }
}

fn vpl_storage_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(std::mem::size_of::<GpuVpl>() as u64),
        },
        count: None,
    }
}

/// Every texture is read with `textureLoad` or a nearest sampler.
fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// Create the bind group layouts of every pass
pub fn create_bind_group_layouts(device: &wgpu::Device) -> BindGroupLayouts {
    let both = wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT;

    let light_pass = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("light_pass_uniform"),
        entries: &[uniform_entry::<LightPassUniform>(0, both)],
    });

    let atlas = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("ism_atlas_row"),
        entries: &[uniform_entry::<AtlasRowUniform>(0, both), vpl_storage_entry(1, both)],
    });

    let gbuffer = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("gbuffer_camera"),
        entries: &[uniform_entry::<CameraUniform>(0, wgpu::ShaderStages::VERTEX)],
    });

    let accumulate = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("accumulate_row"),
        entries: &[
            uniform_entry::<AccumulateUniform>(0, wgpu::ShaderStages::FRAGMENT),
            vpl_storage_entry(1, wgpu::ShaderStages::FRAGMENT),
            // previous row's irradiance
            texture_entry(2),
            // G-buffer position, normal
            texture_entry(3),
            texture_entry(4),
            // ISM atlas
            texture_entry(5),
        ],
    });

    // Group 0: frame uniform + disc kernel
    let composite_frame = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("composite_frame"),
        entries: &[
            uniform_entry::<CompositeUniform>(0, both),
            uniform_entry::<KernelUniform>(1, wgpu::ShaderStages::FRAGMENT),
        ],
    });

    // Group 1: light maps, their sampler and irradiance
    let composite_maps = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("composite_maps"),
        entries: &[
            texture_entry(0),
            texture_entry(1),
            texture_entry(2),
            texture_entry(3),
            wgpu::BindGroupLayoutEntry {
                binding: 4,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                count: None,
            },
            texture_entry(5),
        ],
    });

    // Group 2: per-draw flags
    let composite_draw = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("composite_draw"),
        entries: &[uniform_entry::<DrawUniform>(0, wgpu::ShaderStages::FRAGMENT)],
    });

    BindGroupLayouts {
        light_pass,
        atlas,
        gbuffer,
        accumulate,
        composite_frame,
        composite_maps,
        composite_draw,
    }
}

/// Bind group layouts of all passes
pub struct BindGroupLayouts {
    /// Light pass uniform
    pub light_pass: wgpu::BindGroupLayout,
    /// Atlas row uniform + VPL storage
    pub atlas: wgpu::BindGroupLayout,
    /// G-buffer camera uniform
    pub gbuffer: wgpu::BindGroupLayout,
    /// Accumulate uniform, VPLs and input textures
    pub accumulate: wgpu::BindGroupLayout,
    /// Composite group 0
    pub composite_frame: wgpu::BindGroupLayout,
    /// Composite group 1
    pub composite_maps: wgpu::BindGroupLayout,
    /// Composite group 2
    pub composite_draw: wgpu::BindGroupLayout,
}

struct MeshPass<'a> {
    label: &'static str,
    source: &'a ShaderSource,
    bind_groups: &'a [&'a wgpu::BindGroupLayout],
    targets: &'a [Option<wgpu::ColorTargetState>],
    constants: &'a [(&'a str, f64)],
}

fn opaque(format: wgpu::TextureFormat) -> Option<wgpu::ColorTargetState> {
    Some(wgpu::ColorTargetState {
        format,
        blend: None,
        write_mask: wgpu::ColorWrites::ALL,
    })
}

/// Triangle-list pipeline over [`Vertex`] with a less-than depth test and
/// no culling; the scene mixes windings.
fn mesh_pipeline(device: &wgpu::Device, pass: MeshPass<'_>) -> wgpu::RenderPipeline {
    let module = pass.source.create_module(device);
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(pass.label),
        bind_group_layouts: pass.bind_groups,
        push_constant_ranges: &[],
    });

    let compilation_options = wgpu::PipelineCompilationOptions {
        constants: pass.constants,
        ..Default::default()
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(pass.label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: Some("vs_main"),
            buffers: &[vertex_buffer_layout()],
            compilation_options: compilation_options.clone(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: Some("fs_main"),
            targets: pass.targets,
            compilation_options,
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Light-space sub-pass writing one [`TARGET_FORMAT`] map.
pub fn create_light_pipeline(device: &wgpu::Device, layouts: &BindGroupLayouts) -> wgpu::RenderPipeline {
    mesh_pipeline(
        device,
        MeshPass {
            label: "light_pass_pipeline",
            source: &LIGHT_PASS,
            bind_groups: &[&layouts.light_pass],
            targets: &[opaque(TARGET_FORMAT)],
            constants: &[],
        },
    )
}

/// Instanced ISM atlas row pipeline.
pub fn create_atlas_pipeline(device: &wgpu::Device, layouts: &BindGroupLayouts) -> wgpu::RenderPipeline {
    mesh_pipeline(
        device,
        MeshPass {
            label: "ism_atlas_pipeline",
            source: &ISM_ATLAS,
            bind_groups: &[&layouts.atlas],
            targets: &[opaque(TARGET_FORMAT)],
            constants: &[],
        },
    )
}

/// Camera G-buffer with two [`GBUFFER_FORMAT`] targets.
pub fn create_gbuffer_pipeline(device: &wgpu::Device, layouts: &BindGroupLayouts) -> wgpu::RenderPipeline {
    mesh_pipeline(
        device,
        MeshPass {
            label: "gbuffer_pipeline",
            source: &GBUFFER,
            bind_groups: &[&layouts.gbuffer],
            targets: &[opaque(GBUFFER_FORMAT), opaque(GBUFFER_FORMAT)],
            constants: &[],
        },
    )
}

/// Composite pipeline specialized for one shadow mode (0 SM, 1 RSM, 2 ISM).
pub fn create_composite_pipeline(
    device: &wgpu::Device,
    layouts: &BindGroupLayouts,
    shadow_mode: f64,
) -> wgpu::RenderPipeline {
    mesh_pipeline(
        device,
        MeshPass {
            label: "composite_pipeline",
            source: &COMPOSITE,
            bind_groups: &[&layouts.composite_frame, &layouts.composite_maps, &layouts.composite_draw],
            targets: &[opaque(TARGET_FORMAT)],
            constants: &[("SHADOW_MODE", shadow_mode)],
        },
    )
}

/// Fullscreen accumulation into an [`ACCUM_FORMAT`] target; draw 3 vertices.
pub fn create_accumulate_pipeline(device: &wgpu::Device, layouts: &BindGroupLayouts) -> wgpu::RenderPipeline {
    let module = ACCUMULATE.create_module(device);
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("accumulate_pipeline"),
        bind_group_layouts: &[&layouts.accumulate],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("accumulate_pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: Some("vs_fullscreen"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: Some("fs_main"),
            targets: &[opaque(ACCUM_FORMAT)],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_sizes() {
        assert_eq!(std::mem::size_of::<Vertex>(), 36);
        assert_eq!(std::mem::size_of::<LightPassUniform>(), 80);
        assert_eq!(std::mem::size_of::<CameraUniform>(), 64);
        assert_eq!(std::mem::size_of::<GpuVpl>(), 128);
        assert_eq!(std::mem::size_of::<AtlasRowUniform>(), 16);
        assert_eq!(std::mem::size_of::<AccumulateUniform>(), 32);
        assert_eq!(std::mem::size_of::<CompositeUniform>(), 160);
        assert_eq!(std::mem::size_of::<KernelUniform>(), KERNEL_CAPACITY * 8);
        assert_eq!(std::mem::size_of::<DrawUniform>(), 16);
    }

    #[test]
    fn test_shader_entry_points() {
        for shader in [LIGHT_PASS, ISM_ATLAS, GBUFFER, COMPOSITE] {
            assert!(shader.body.contains("fn vs_main"), "{}", shader.file);
            assert!(shader.body.contains("fn fs_main"), "{}", shader.file);
        }
        assert!(ACCUMULATE.body.contains("fn vs_fullscreen"));
        assert!(COMPOSITE.body.contains("override SHADOW_MODE"));
    }

    #[test]
    fn test_codec_prefix() {
        for shader in ALL_SHADERS {
            let src = shader.wgsl();
            assert!(src.starts_with(CODEC));
            assert!(src.contains("fn encode_depth"));
            assert!(!shader.body.contains("fn encode_depth"), "{} redefines codec", shader.file);
        }
    }
}
