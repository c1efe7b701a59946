//! GPU-side resources used by the renderer.

use std::sync::atomic::{AtomicU64, Ordering};

use image::{Rgba32FImage, RgbaImage};

use crate::camera::ViewportSize;
use crate::util::{Error, Result};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

fn extent(size: ViewportSize) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: size.width,
        height: size.height,
        depth_or_array_layers: 1,
    }
}

fn create_texture(
    device: &wgpu::Device,
    label: &str,
    size: ViewportSize,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: extent(size),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

/// Color texture usable as attachment, shader input and copy source.
fn sampled_target(
    device: &wgpu::Device,
    label: &str,
    size: ViewportSize,
    format: wgpu::TextureFormat,
) -> (wgpu::Texture, wgpu::TextureView) {
    create_texture(
        device,
        label,
        size,
        format,
        wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC,
    )
}

/// Offscreen RGBA8 image: light maps, the ISM atlas and frames.
///
/// Cloning shares the texture. `generation` changes whenever a new texture
/// is allocated so the viewport knows when to re-register it with egui.
#[derive(Clone, Debug)]
pub struct GpuTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub size: ViewportSize,
    pub generation: u64,
}

impl GpuTarget {
    pub fn new(device: &wgpu::Device, label: &str, size: ViewportSize) -> Self {
        let (texture, view) = sampled_target(device, label, size, shadow_shaders::TARGET_FORMAT);
        Self {
            texture,
            view,
            size,
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
        }
    }
}

/// Float irradiance buffer, one half of the ping-pong pair.
#[derive(Debug)]
pub struct GpuAccum {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub size: ViewportSize,
}

impl GpuAccum {
    pub fn new(device: &wgpu::Device, label: &str, size: ViewportSize) -> Self {
        let (texture, view) = sampled_target(device, label, size, shadow_shaders::ACCUM_FORMAT);
        Self { texture, view, size }
    }
}

/// Camera G-buffer: world position (alpha = coverage) and normal.
#[derive(Clone, Debug)]
pub struct GpuGBuffer {
    #[allow(dead_code)]
    pub position: wgpu::Texture,
    #[allow(dead_code)]
    pub normal: wgpu::Texture,
    pub position_view: wgpu::TextureView,
    pub normal_view: wgpu::TextureView,
    pub size: ViewportSize,
}

impl GpuGBuffer {
    pub fn new(device: &wgpu::Device, size: ViewportSize) -> Self {
        let format = shadow_shaders::GBUFFER_FORMAT;
        let (position, position_view) = sampled_target(device, "gbuffer_position", size, format);
        let (normal, normal_view) = sampled_target(device, "gbuffer_normal", size, format);
        Self {
            position,
            normal,
            position_view,
            normal_view,
            size,
        }
    }
}

#[derive(Debug)]
pub struct DepthTexture {
    #[allow(dead_code)]
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub size: ViewportSize,
}

impl DepthTexture {
    pub fn new(device: &wgpu::Device, size: ViewportSize) -> Self {
        let (texture, view) = create_texture(
            device,
            "depth_texture",
            size,
            shadow_shaders::DEPTH_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );
        Self { texture, view, size }
    }
}

/// 1x1 stand-in bound where a mode has no light map or no irradiance.
pub fn placeholder_texture(device: &wgpu::Device, label: &str, format: wgpu::TextureFormat) -> wgpu::TextureView {
    let (_, view) = create_texture(
        device,
        label,
        ViewportSize::new(1, 1),
        format,
        wgpu::TextureUsages::TEXTURE_BINDING,
    );
    view
}

/// Uploaded triangle mesh.
pub struct Mesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

/// Copy a whole texture into CPU memory, row padding removed.
///
/// `bytes_per_pixel` must match the texture format.
pub fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    size: ViewportSize,
    bytes_per_pixel: u32,
) -> Result<Vec<u8>> {
    let unpadded = size.width * bytes_per_pixel;
    // bytes_per_row must be aligned to 256 (COPY_BYTES_PER_ROW_ALIGNMENT)
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded = unpadded.div_ceil(align) * align;

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback_buffer"),
        size: padded as u64 * size.height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("readback_encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(size.height),
            },
        },
        extent(size),
    );
    queue.submit(Some(encoder.finish()));

    let slice = buffer.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device
        .poll(wgpu::PollType::wait_indefinitely())
        .map_err(|e| Error::gpu(format!("device poll failed during readback: {e}")))?;
    receiver
        .recv()
        .map_err(|_| Error::gpu("readback callback was dropped"))?
        .map_err(|e| Error::gpu(format!("failed to map readback buffer: {e}")))?;

    let mut pixels = Vec::with_capacity((unpadded * size.height) as usize);
    {
        let data = slice.get_mapped_range();
        for row in data.chunks_exact(padded as usize) {
            pixels.extend_from_slice(&row[..unpadded as usize]);
        }
    }
    buffer.unmap();
    Ok(pixels)
}

pub fn read_target(device: &wgpu::Device, queue: &wgpu::Queue, target: &GpuTarget) -> Result<RgbaImage> {
    let bytes = read_texture(device, queue, &target.texture, target.size, 4)?;
    RgbaImage::from_raw(target.size.width, target.size.height, bytes)
        .ok_or_else(|| Error::gpu("readback size does not match the target"))
}

/// Rgba16Float texels widened to f32.
pub fn read_accum(device: &wgpu::Device, queue: &wgpu::Queue, accum: &GpuAccum) -> Result<Rgba32FImage> {
    let bytes = read_texture(device, queue, &accum.texture, accum.size, 8)?;
    let floats = bytes
        .chunks_exact(2)
        .map(|c| half::f16::from_le_bytes([c[0], c[1]]).to_f32())
        .collect();
    Rgba32FImage::from_raw(accum.size.width, accum.size.height, floats)
        .ok_or_else(|| Error::gpu("readback size does not match the accumulator"))
}
