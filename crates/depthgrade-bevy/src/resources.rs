//! Bevy resources and per-view components for depth grading.

use bevy::prelude::*;
use depthgrade_core::{EffectController, EffectSettings, ShaderConstants, ViewContext};
use glam::Mat4;

use crate::EcsEffectBackend;

/// The settings every graded view resolves to.
///
/// Systems edit this only through `DepthGradingCommand`.
#[derive(Resource, Debug, Default, Clone)]
pub struct DepthGradingSettings {
    pub settings: EffectSettings,
}

/// The render backend shared by all views.
#[derive(Resource)]
pub struct DepthGradingBackend<B: EcsEffectBackend>(pub B);

/// Color target format handed to the wgpu backend at startup.
#[derive(Resource, Debug, Clone, Copy)]
pub struct DepthGradingColorFormat(pub wgpu::TextureFormat);

/// Marks a camera that gets depth grading, with the camera state the
/// effect reads.
#[derive(Component, Debug, Clone, Copy)]
#[require(DepthGradingFrame)]
pub struct DepthGradingView {
    /// Column-major projection with forward 0..1 depth (0 near, 1 far).
    pub projection: [f32; 16],
    pub hdr: bool,
    pub post_processing: bool,
}

impl DepthGradingView {
    pub fn new(projection: Mat4) -> Self {
        Self {
            projection: projection.to_cols_array(),
            hdr: false,
            post_processing: true,
        }
    }

    pub fn context(&self) -> ViewContext {
        ViewContext {
            projection: Mat4::from_cols_array(&self.projection),
            hdr_enabled: self.hdr,
            post_processing_enabled: self.post_processing,
        }
    }
}

/// The view's controller. Attached automatically to every
/// [`DepthGradingView`].
#[derive(Component)]
pub struct DepthGradingController<B: EcsEffectBackend>(pub EffectController<B>);

impl<B: EcsEffectBackend> Default for DepthGradingController<B> {
    fn default() -> Self {
        Self(EffectController::new())
    }
}

/// The buffers a view is graded in. Supplied by the host; views without
/// targets are skipped.
#[derive(Component)]
pub struct DepthGradingTargets<B: EcsEffectBackend> {
    pub color: B::ColorTarget,
    pub depth: B::DepthSource,
}

/// What the last frame did for a view. `constants` is `None` when the pass
/// was skipped.
#[derive(Component, Debug, Default, Clone, Copy, PartialEq)]
pub struct DepthGradingFrame {
    pub constants: Option<ShaderConstants>,
    pub near_revision: u64,
    pub far_revision: u64,
    /// The controller failed to load its program and will not run again.
    pub disabled: bool,
}
