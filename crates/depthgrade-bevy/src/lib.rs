//! Depthgrade Bevy Plugin: runs depth grading from Bevy's ECS.
//!
//! Every entity with a [`DepthGradingView`](resources::DepthGradingView) gets
//! its own [`EffectController`](depthgrade_core::EffectController). Each
//! frame the controller grades the view's
//! [`DepthGradingTargets`](resources::DepthGradingTargets) through the
//! [`DepthGradingBackend`](resources::DepthGradingBackend) resource.
//!
//! `DepthGradingPlugin` wires this to a wgpu device created at startup.
//! `DepthGradingBackendPlugin<B>` does the same for any backend the host
//! inserts itself.

pub mod events;
pub mod resources;
pub mod systems;

use std::marker::PhantomData;

use bevy::prelude::*;
use depthgrade_core::{EffectBackend, EffectSettings};
use depthgrade_gpu::WgpuBackend;

use events::{DepthGradingCommand, LutRegeneratedEvent, SettingsUpdatedEvent};
use resources::{DepthGradingBackend, DepthGradingColorFormat, DepthGradingSettings};
use systems::{
    attach_view_controllers, detect_settings_changes, handle_depth_grading_commands,
    release_removed_views, render_depth_grading,
};

/// An [`EffectBackend`] whose program and targets can live in the ECS.
pub trait EcsEffectBackend:
    EffectBackend<
        Program: Send + Sync + 'static,
        ColorTarget: Send + Sync + 'static,
        DepthSource: Send + Sync + 'static,
    > + Send
    + Sync
    + 'static
{
}

impl<B> EcsEffectBackend for B where
    B: EffectBackend<
            Program: Send + Sync + 'static,
            ColorTarget: Send + Sync + 'static,
            DepthSource: Send + Sync + 'static,
        > + Send
        + Sync
        + 'static
{
}

/// Depth grading on a dedicated wgpu device.
///
/// The device is created in a `Startup` system. Hosts create their
/// `DepthGradingTargets<WgpuBackend>` textures on the device returned by
/// `WgpuBackend::device`.
pub struct DepthGradingPlugin {
    /// Initial settings, clamped on insert.
    pub settings: EffectSettings,
    /// Format of the color targets the program renders to.
    pub color_format: wgpu::TextureFormat,
}

impl Default for DepthGradingPlugin {
    fn default() -> Self {
        Self {
            settings: EffectSettings::default(),
            color_format: wgpu::TextureFormat::Rgba8Unorm,
        }
    }
}

impl Plugin for DepthGradingPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(DepthGradingColorFormat(self.color_format))
            .add_plugins(DepthGradingBackendPlugin::<WgpuBackend>::new(self.settings))
            .add_systems(Startup, init_wgpu_backend);
    }
}

/// Settings, messages and per-view systems for backend `B`. The host
/// inserts the `DepthGradingBackend<B>` resource.
pub struct DepthGradingBackendPlugin<B> {
    pub settings: EffectSettings,
    _backend: PhantomData<fn() -> B>,
}

impl<B> DepthGradingBackendPlugin<B> {
    pub fn new(settings: EffectSettings) -> Self {
        Self {
            settings,
            _backend: PhantomData,
        }
    }
}

impl<B: EcsEffectBackend> Plugin for DepthGradingBackendPlugin<B> {
    fn build(&self, app: &mut App) {
        app.add_message::<DepthGradingCommand>()
            .add_message::<SettingsUpdatedEvent>()
            .add_message::<LutRegeneratedEvent>()
            .insert_resource(DepthGradingSettings {
                settings: self.settings.clamped(),
            })
            .add_systems(
                Update,
                (
                    attach_view_controllers::<B>,
                    handle_depth_grading_commands::<B>.after(attach_view_controllers::<B>),
                    release_removed_views::<B>.after(handle_depth_grading_commands::<B>),
                    render_depth_grading::<B>.after(release_removed_views::<B>),
                    detect_settings_changes,
                ),
            );
    }
}

/// Startup system: create the wgpu device and insert the backend.
fn init_wgpu_backend(mut commands: Commands, format: Res<DepthGradingColorFormat>) {
    match depthgrade_gpu::create_device_blocking() {
        Ok((device, queue)) => {
            tracing::info!("depth grading backend initialized ({:?})", format.0);
            commands.insert_resource(DepthGradingBackend(WgpuBackend::new(
                device, queue, format.0,
            )));
        }
        Err(e) => {
            tracing::error!("Failed to initialize depth grading backend: {e}");
            tracing::warn!("Depth grading will not run without a GPU backend");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wgpu_plugin_registers_resources() {
        let mut app = App::new();
        app.add_plugins(DepthGradingPlugin {
            color_format: wgpu::TextureFormat::Bgra8Unorm,
            ..Default::default()
        });

        let world = app.world();
        assert_eq!(
            world.resource::<DepthGradingColorFormat>().0,
            wgpu::TextureFormat::Bgra8Unorm
        );
        assert_eq!(
            world.resource::<DepthGradingSettings>().settings,
            EffectSettings::default()
        );
        // Created at Startup, not at build time.
        assert!(!world.contains_resource::<DepthGradingBackend<WgpuBackend>>());
    }
}
