//! Render pipelines of every pass, one composite variant per shadow mode.

use shadow_shaders::{BindGroupLayouts, ShaderSource, ACCUMULATE, COMPOSITE, GBUFFER, ISM_ATLAS, LIGHT_PASS};

use crate::pipeline::ShadowMode;
use crate::util::{Error, Result};

pub struct Pipelines {
    pub light: wgpu::RenderPipeline,
    pub atlas: wgpu::RenderPipeline,
    pub gbuffer: wgpu::RenderPipeline,
    pub accumulate: wgpu::RenderPipeline,
    /// Indexed like [`ShadowMode::ALL`].
    pub composite: [wgpu::RenderPipeline; 3],
}

impl Pipelines {
    pub fn composite(&self, mode: ShadowMode) -> &wgpu::RenderPipeline {
        match mode {
            ShadowMode::Sm => &self.composite[0],
            ShadowMode::Rsm => &self.composite[1],
            ShadowMode::Ism => &self.composite[2],
        }
    }
}

/// Build a pipeline inside a validation scope so a broken shader surfaces
/// as an error naming its source file instead of a device panic.
fn checked(
    device: &wgpu::Device,
    source: &ShaderSource,
    build: impl FnOnce() -> wgpu::RenderPipeline,
) -> Result<wgpu::RenderPipeline> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let pipeline = build();
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(Error::gpu(format!(
            "shader '{}' ({}) failed to build: {err}",
            source.label, source.file
        ))),
        None => Ok(pipeline),
    }
}

pub fn create_pipelines(device: &wgpu::Device, layouts: &BindGroupLayouts) -> Result<Pipelines> {
    let _span = tracing::info_span!("create_pipelines").entered();

    let light = checked(device, &LIGHT_PASS, || shadow_shaders::create_light_pipeline(device, layouts))?;
    let atlas = checked(device, &ISM_ATLAS, || shadow_shaders::create_atlas_pipeline(device, layouts))?;
    let gbuffer = checked(device, &GBUFFER, || shadow_shaders::create_gbuffer_pipeline(device, layouts))?;
    let accumulate = checked(device, &ACCUMULATE, || {
        shadow_shaders::create_accumulate_pipeline(device, layouts)
    })?;

    let composite_for = |mode: ShadowMode| {
        checked(device, &COMPOSITE, || {
            shadow_shaders::create_composite_pipeline(device, layouts, mode.shader_constant())
        })
    };
    let composite = [
        composite_for(ShadowMode::Sm)?,
        composite_for(ShadowMode::Rsm)?,
        composite_for(ShadowMode::Ism)?,
    ];

    log::debug!("Built {} render pipelines", 4 + composite.len());
    Ok(Pipelines {
        light,
        atlas,
        gbuffer,
        accumulate,
        composite,
    })
}
