//! The shadow pipeline's passes on wgpu.

use image::{Rgba32FImage, RgbaImage};

use shadow_shaders::{
    AccumulateUniform, AtlasRowUniform, CameraUniform, CompositeUniform, GpuVpl, KernelUniform,
    LightPassUniform,
};

use super::resources::{read_accum, read_target, DepthTexture, GpuAccum, GpuGBuffer, GpuTarget, Mesh};
use super::{Renderer, SceneMeshes};
use crate::camera::{ViewTransforms, ViewportSize};
use crate::geom::Scene;
use crate::pipeline::software::CLEAR_COLOR;
use crate::pipeline::{AccumulateRow, CompositeJob, RenderBackend};
use crate::sampling::{DiscKernel, Vpl};
use crate::stage::ism::{vpl_view_projection, ISM_BIAS, VPL_FAR};
use crate::stage::{DrawMode, LightSpace};
use crate::target::AtlasLayout;
use crate::util::{Error, Result};

/// Encoded depth 1.0, the clear value of depth-encoding targets.
const BACKGROUND: wgpu::Color = wgpu::Color::WHITE;

fn clear_color(mode: DrawMode) -> wgpu::Color {
    match mode {
        DrawMode::Depth => BACKGROUND,
        _ => wgpu::Color::BLACK,
    }
}

fn color_attachment(view: &wgpu::TextureView, load: wgpu::LoadOp<wgpu::Color>) -> Option<wgpu::RenderPassColorAttachment<'_>> {
    Some(wgpu::RenderPassColorAttachment {
        view,
        resolve_target: None,
        ops: wgpu::Operations {
            load,
            store: wgpu::StoreOp::Store,
        },
        depth_slice: None,
    })
}

fn depth_attachment(view: &wgpu::TextureView, load: wgpu::LoadOp<f32>) -> Option<wgpu::RenderPassDepthStencilAttachment<'_>> {
    Some(wgpu::RenderPassDepthStencilAttachment {
        view,
        depth_ops: Some(wgpu::Operations {
            load,
            store: wgpu::StoreOp::Store,
        }),
        stencil_ops: None,
    })
}

fn draw_mesh(pass: &mut wgpu::RenderPass<'_>, mesh: &Mesh, instances: u32) {
    pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
    pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
    pass.draw_indexed(0..mesh.index_count, 0, 0..instances);
}

fn gpu_vpl(vpl: &Vpl) -> GpuVpl {
    GpuVpl::new(vpl_view_projection(vpl), vpl.eye(), vpl.position, vpl.normal, vpl.albedo)
}

impl Renderer {
    fn encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    /// Write `vpls` into storage starting at atlas cell `first_cell`.
    fn write_vpls(&mut self, capacity: usize, first_cell: usize, vpls: &[Vpl]) -> Result<()> {
        if first_cell + vpls.len() > capacity {
            return Err(Error::other(format!(
                "VPLs {}..{} exceed the atlas capacity of {}",
                first_cell,
                first_cell + vpls.len(),
                capacity
            )));
        }
        let data: Vec<GpuVpl> = vpls.iter().map(gpu_vpl).collect();
        let buffer = self.ensure_vpl_storage(capacity).buffer.clone();
        let offset = (first_cell * std::mem::size_of::<GpuVpl>()) as u64;
        self.queue.write_buffer(&buffer, offset, bytemuck::cast_slice(&data));
        Ok(())
    }

    fn check_scene(&self) -> Result<&SceneMeshes> {
        self.meshes
            .as_ref()
            .ok_or_else(|| Error::gpu("scene has not been uploaded"))
    }
}

impl RenderBackend for Renderer {
    type Target = GpuTarget;
    type Accum = GpuAccum;
    type GBuffer = GpuGBuffer;

    fn upload_kernel(&mut self, kernel: &DiscKernel) -> Result<()> {
        let (packed, len) = KernelUniform::pack(kernel.samples());
        if len < kernel.len() {
            log::warn!("Disc kernel truncated to {} of {} samples on the GPU", len, kernel.len());
        }
        self.queue.write_buffer(&self.kernel_buffer, 0, bytemuck::bytes_of(&packed));
        self.kernel_len = len;
        Ok(())
    }

    fn prepare_scene(&mut self, scene: &Scene) -> Result<()> {
        let _span = tracing::info_span!("upload_scene").entered();
        let meshes = SceneMeshes {
            object: self.upload_mesh("object_mesh", &scene.object),
            receiver: self.upload_mesh("receiver_mesh", &scene.receiver),
        };
        log::debug!(
            "Uploaded scene: {} + {} triangles",
            scene.object.triangle_count(),
            scene.receiver.triangle_count()
        );
        self.meshes = Some(meshes);
        Ok(())
    }

    fn light_pass(
        &mut self,
        scene: &Scene,
        light: &LightSpace,
        mode: DrawMode,
        size: ViewportSize,
        scene_extent: f32,
    ) -> Result<GpuTarget> {
        self.check_scene()?;
        let target = GpuTarget::new(&self.device, mode.file_stem(), size);
        let depth = self.depth_view(size);

        let uniform = LightPassUniform::new(light.view_projection(), mode.index() as u32, scene_extent);
        self.queue.write_buffer(&self.light_buffer, 0, bytemuck::bytes_of(&uniform));

        let mut encoder = self.encoder("light_pass_encoder");
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("light_pass"),
                color_attachments: &[color_attachment(&target.view, wgpu::LoadOp::Clear(clear_color(mode)))],
                depth_stencil_attachment: depth_attachment(&depth, wgpu::LoadOp::Clear(1.0)),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipelines.light);
            pass.set_bind_group(0, &self.light_bind_group, &[]);
            for geometry in scene.casters() {
                if let Some(mesh) = self.mesh_for(scene, geometry) {
                    draw_mesh(&mut pass, mesh, 1);
                }
            }
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(target)
    }

    fn create_atlas(&mut self, layout: &AtlasLayout) -> Result<GpuTarget> {
        let size = layout.size();
        let atlas = GpuTarget::new(&self.device, "ism_atlas", size);
        let depth = DepthTexture::new(&self.device, size);
        self.ensure_vpl_storage(layout.capacity());

        let mut encoder = self.encoder("atlas_clear_encoder");
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("atlas_clear"),
                color_attachments: &[color_attachment(&atlas.view, wgpu::LoadOp::Clear(BACKGROUND))],
                depth_stencil_attachment: depth_attachment(&depth.view, wgpu::LoadOp::Clear(1.0)),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.queue.submit(Some(encoder.finish()));

        self.atlas_depth = Some(depth);
        Ok(atlas)
    }

    fn draw_atlas_row(
        &mut self,
        atlas: &mut GpuTarget,
        scene: &Scene,
        layout: &AtlasLayout,
        first_cell: usize,
        vpls: &[Vpl],
    ) -> Result<()> {
        if vpls.is_empty() {
            return Ok(());
        }
        self.check_scene()?;
        self.write_vpls(layout.capacity(), first_cell, vpls)?;

        let uniform = AtlasRowUniform {
            grid: glam::Vec4::new(layout.cols as f32, layout.rows as f32, first_cell as f32, VPL_FAR),
        };
        self.queue.write_buffer(&self.atlas_row_buffer, 0, bytemuck::bytes_of(&uniform));

        let (Some(depth), Some(storage)) = (&self.atlas_depth, &self.vpls) else {
            return Err(Error::gpu("atlas drawn before it was created"));
        };
        let row = first_cell as u32 / layout.cols;
        let size = layout.size();

        let mut encoder = self.encoder("atlas_row_encoder");
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("atlas_row"),
                color_attachments: &[color_attachment(&atlas.view, wgpu::LoadOp::Load)],
                depth_stencil_attachment: depth_attachment(&depth.view, wgpu::LoadOp::Load),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_scissor_rect(0, row * layout.cell_size, size.width, layout.cell_size);
            pass.set_pipeline(&self.pipelines.atlas);
            pass.set_bind_group(0, &storage.atlas_bind_group, &[]);
            for geometry in scene.casters() {
                if let Some(mesh) = self.mesh_for(scene, geometry) {
                    draw_mesh(&mut pass, mesh, vpls.len() as u32);
                }
            }
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn camera_gbuffer(
        &mut self,
        scene: &Scene,
        view: &ViewTransforms,
        size: ViewportSize,
    ) -> Result<GpuGBuffer> {
        self.check_scene()?;
        let gbuffer = self.ensure_gbuffer(size);
        let depth = self.depth_view(size);

        let uniform = CameraUniform {
            view_proj: view.view_projection(),
        };
        self.queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&uniform));

        let mut encoder = self.encoder("gbuffer_encoder");
        {
            let clear = wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT);
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("gbuffer_pass"),
                color_attachments: &[
                    color_attachment(&gbuffer.position_view, clear),
                    color_attachment(&gbuffer.normal_view, clear),
                ],
                depth_stencil_attachment: depth_attachment(&depth, wgpu::LoadOp::Clear(1.0)),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipelines.gbuffer);
            pass.set_bind_group(0, &self.camera_bind_group, &[]);
            for draw in scene.draws() {
                if let Some(mesh) = self.mesh_for(scene, draw.geometry) {
                    draw_mesh(&mut pass, mesh, 1);
                }
            }
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(gbuffer)
    }

    fn create_accumulators(&mut self, size: ViewportSize) -> Result<[GpuAccum; 2]> {
        Ok([
            GpuAccum::new(&self.device, "irradiance_ping", size),
            GpuAccum::new(&self.device, "irradiance_pong", size),
        ])
    }

    fn clear_accum(&mut self, accum: &mut GpuAccum) -> Result<()> {
        let mut encoder = self.encoder("accum_clear_encoder");
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("accum_clear"),
                color_attachments: &[color_attachment(&accum.view, wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT))],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn accumulate_row(&mut self, job: AccumulateRow<'_, Self>) -> Result<()> {
        let size = job.gbuffer.size;
        if job.previous.size != size || job.output.size != size {
            return Err(Error::other("accumulation buffers do not match the G-buffer size"));
        }
        self.write_vpls(job.layout.capacity(), job.first_cell, job.vpls)?;

        let uniform = AccumulateUniform {
            grid: glam::Vec4::new(
                job.layout.cols as f32,
                job.layout.rows as f32,
                job.first_cell as f32,
                job.layout.cell_size as f32,
            ),
            params: glam::Vec4::new(job.vpls.len() as f32, job.flux, VPL_FAR, ISM_BIAS),
        };
        self.queue.write_buffer(&self.accumulate_buffer, 0, bytemuck::bytes_of(&uniform));

        let Some(storage) = &self.vpls else {
            return Err(Error::gpu("accumulation ran before any VPL was uploaded"));
        };
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("accumulate_bind_group"),
            layout: &self.layouts.accumulate,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.accumulate_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: storage.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&job.previous.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&job.gbuffer.position_view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&job.gbuffer.normal_view),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(&job.atlas.view),
                },
            ],
        });

        let mut encoder = self.encoder("accumulate_encoder");
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("accumulate_row"),
                color_attachments: &[color_attachment(&job.output.view, wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT))],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipelines.accumulate);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn composite(&mut self, scene: &Scene, job: &CompositeJob<'_, Self>) -> Result<GpuTarget> {
        self.check_scene()?;
        let Some(depth_map) = job.light_targets[DrawMode::Depth.index()].as_ref() else {
            return Err(Error::other("composite needs the light depth map"));
        };
        let frame = self.ensure_frame(job.size);
        let depth = self.depth_view(job.size);

        let uniform = CompositeUniform {
            view_proj: job.view.view_projection(),
            shadow_matrix: job.light.shadow_matrix(),
            light_position: job.light.position.extend(1.0),
            params: glam::Vec4::new(job.scene_extent, job.indirect_strength, self.kernel_len as f32, 0.0),
        };
        self.queue.write_buffer(&self.composite_buffer, 0, bytemuck::bytes_of(&uniform));

        let map_view = |mode: DrawMode| {
            job.light_targets[mode.index()]
                .as_ref()
                .map_or(&self.placeholder_map, |target| &target.view)
        };
        let irradiance = job
            .irradiance
            .filter(|accum| accum.size == job.size)
            .map_or(&self.placeholder_accum, |accum| &accum.view);

        let maps = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("composite_maps_bind_group"),
            layout: &self.layouts.composite_maps,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&depth_map.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(map_view(DrawMode::Normal)),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(map_view(DrawMode::Position)),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(map_view(DrawMode::Albedo)),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&self.map_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(irradiance),
                },
            ],
        });

        let background = wgpu::Color {
            r: CLEAR_COLOR.x as f64,
            g: CLEAR_COLOR.y as f64,
            b: CLEAR_COLOR.z as f64,
            a: 1.0,
        };

        let mut encoder = self.encoder("composite_encoder");
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("composite_pass"),
                color_attachments: &[color_attachment(&frame.view, wgpu::LoadOp::Clear(background))],
                depth_stencil_attachment: depth_attachment(&depth, wgpu::LoadOp::Clear(1.0)),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(self.pipelines.composite(job.mode));
            pass.set_bind_group(0, &self.composite_frame_bind_group, &[]);
            pass.set_bind_group(1, &maps, &[]);
            for draw in scene.draws() {
                if let Some(mesh) = self.mesh_for(scene, draw.geometry) {
                    let flags = &self.draw_flags[draw.receive_shadow as usize];
                    pass.set_bind_group(2, &flags.bind_group, &[]);
                    draw_mesh(&mut pass, mesh, 1);
                }
            }
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(frame)
    }

    fn read_back(&mut self, target: &GpuTarget) -> Result<RgbaImage> {
        read_target(&self.device, &self.queue, target)
    }

    fn read_back_accum(&mut self, accum: &GpuAccum) -> Result<Rgba32FImage> {
        read_accum(&self.device, &self.queue, accum)
    }
}
