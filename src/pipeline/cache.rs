use super::ShadowMode;
use crate::camera::ViewportSize;
use crate::sampling::Vpl;
use crate::stage::{DrawMode, LightSpace};
use crate::target::AtlasLayout;
use crate::util::Mat4;

/// Irradiance accumulated for one camera pose and frame size.
pub struct IrradianceEntry<A> {
    pub model_view: Mat4,
    pub size: ViewportSize,
    pub buffer: A,
}

/// Light-dependent results kept across frames.
///
/// Filled lazily by the orchestrator and cleared only by [`invalidate`].
/// `T` is the backend's target type and `A` its accumulation buffer.
///
/// [`invalidate`]: ShadowPipelineCache::invalidate
pub struct ShadowPipelineCache<T, A> {
    light: Option<LightSpace>,
    targets: [Option<T>; 4],
    vpls: Option<Vec<Vpl>>,
    atlas: Option<(AtlasLayout, T)>,
    irradiance: Option<IrradianceEntry<A>>,
}

impl<T, A> Default for ShadowPipelineCache<T, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, A> ShadowPipelineCache<T, A> {
    pub fn new() -> Self {
        Self {
            light: None,
            targets: [None, None, None, None],
            vpls: None,
            atlas: None,
            irradiance: None,
        }
    }

    /// True once the light transforms have been fixed.
    pub fn is_valid(&self) -> bool {
        self.light.is_some()
    }

    /// True when everything `mode` reads is present.
    pub fn is_complete_for(&self, mode: ShadowMode) -> bool {
        self.is_valid()
            && mode.light_passes().iter().all(|m| self.targets[m.index()].is_some())
            && (!mode.uses_vpls() || (self.vpls.is_some() && self.atlas.is_some()))
    }

    pub fn invalidate(&mut self) {
        log::debug!("shadow pipeline cache invalidated");
        *self = Self::new();
    }

    pub fn light(&self) -> Option<&LightSpace> {
        self.light.as_ref()
    }

    pub fn set_light(&mut self, light: LightSpace) {
        self.light = Some(light);
    }

    pub fn target(&self, mode: DrawMode) -> Option<&T> {
        self.targets[mode.index()].as_ref()
    }

    pub fn targets(&self) -> &[Option<T>; 4] {
        &self.targets
    }

    pub fn insert_target(&mut self, mode: DrawMode, target: T) {
        self.targets[mode.index()] = Some(target);
    }

    pub fn vpls(&self) -> Option<&[Vpl]> {
        self.vpls.as_deref()
    }

    pub fn set_vpls(&mut self, vpls: Vec<Vpl>) {
        self.vpls = Some(vpls);
    }

    pub fn atlas(&self) -> Option<(&AtlasLayout, &T)> {
        self.atlas.as_ref().map(|(layout, target)| (layout, target))
    }

    pub fn set_atlas(&mut self, layout: AtlasLayout, atlas: T) {
        self.atlas = Some((layout, atlas));
    }

    /// Cached irradiance if it was accumulated for this pose and size.
    pub fn irradiance_for(&self, model_view: Mat4, size: ViewportSize) -> Option<&A> {
        self.irradiance
            .as_ref()
            .filter(|e| e.model_view == model_view && e.size == size)
            .map(|e| &e.buffer)
    }

    pub fn irradiance(&self) -> Option<&A> {
        self.irradiance.as_ref().map(|e| &e.buffer)
    }

    /// Remove the stale irradiance entry so its buffer can be reused.
    pub fn take_irradiance(&mut self) -> Option<IrradianceEntry<A>> {
        self.irradiance.take()
    }

    pub fn store_irradiance(&mut self, model_view: Mat4, size: ViewportSize, buffer: A) {
        self.irradiance = Some(IrradianceEntry { model_view, size, buffer });
    }
}
