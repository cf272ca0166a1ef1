//! Bevy systems for depth grading.
//!
//! Settings change only in `handle_depth_grading_commands`. Each view's
//! controller runs the pass in `render_depth_grading`.

use bevy::prelude::*;

use depthgrade_core::EffectSettings;

use crate::EcsEffectBackend;
use crate::events::{DepthGradingCommand, LutRegeneratedEvent, LutSlot, SettingsUpdatedEvent};
use crate::resources::{
    DepthGradingBackend, DepthGradingController, DepthGradingFrame, DepthGradingSettings,
    DepthGradingTargets, DepthGradingView,
};

/// Give every new view its own controller.
pub fn attach_view_controllers<B: EcsEffectBackend>(
    mut commands: Commands,
    views: Query<Entity, (With<DepthGradingView>, Without<DepthGradingController<B>>)>,
) {
    for entity in &views {
        commands
            .entity(entity)
            .insert(DepthGradingController::<B>::default());
    }
}

/// Apply inbound commands to `DepthGradingSettings`.
pub fn handle_depth_grading_commands<B: EcsEffectBackend>(
    mut commands: MessageReader<DepthGradingCommand>,
    mut state: ResMut<DepthGradingSettings>,
    views: Query<&DepthGradingController<B>>,
    mut updated: MessageWriter<SettingsUpdatedEvent>,
) {
    let mut pending: Option<EffectSettings> = None;

    for cmd in commands.read() {
        let current = state.settings;
        let next = match cmd {
            DepthGradingCommand::SetSettings { settings } => *settings,
            DepthGradingCommand::SetConfig { config } => EffectSettings {
                config: *config,
                ..current
            },
            DepthGradingCommand::SetNear { params } => EffectSettings {
                near: *params,
                ..current
            },
            DepthGradingCommand::SetFar { params } => EffectSettings {
                far: *params,
                ..current
            },
            DepthGradingCommand::Reset => EffectSettings::default(),
            DepthGradingCommand::LoadSettings { path } => match EffectSettings::load(path) {
                Ok(loaded) => {
                    tracing::info!("loaded depth grading settings from {}", path.display());
                    loaded
                }
                Err(e) => {
                    tracing::warn!("LoadSettings: {e}");
                    continue;
                }
            },
            DepthGradingCommand::ExportLut { view, slot, path } => {
                export_lut(&views, *view, *slot, path);
                continue;
            }
        }
        .clamped();

        if next != current {
            state.settings = next;
            pending = Some(next);
        }
    }

    if let Some(settings) = pending {
        updated.write(SettingsUpdatedEvent { settings });
    }
}

fn export_lut<B: EcsEffectBackend>(
    views: &Query<&DepthGradingController<B>>,
    view: Entity,
    slot: LutSlot,
    path: &std::path::Path,
) {
    let Ok(controller) = views.get(view) else {
        tracing::warn!("ExportLut: {view} is not a depth graded view");
        return;
    };
    let table = match slot {
        LutSlot::Near => controller.0.lut0().cached(),
        LutSlot::Far => controller.0.lut1().cached(),
    };
    let Some(table) = table else {
        tracing::warn!("ExportLut: no {slot:?} LUT generated yet");
        return;
    };
    match table.save_png(path) {
        Ok(()) => tracing::info!("exported {slot:?} LUT to {}", path.display()),
        Err(e) => tracing::warn!("ExportLut {}: {e}", path.display()),
    }
}

/// Run each view's controller against its targets.
pub fn render_depth_grading<B: EcsEffectBackend>(
    settings: Option<Res<DepthGradingSettings>>,
    backend: Option<ResMut<DepthGradingBackend<B>>>,
    mut views: Query<(
        Entity,
        &DepthGradingView,
        &mut DepthGradingController<B>,
        &mut DepthGradingFrame,
        Option<&mut DepthGradingTargets<B>>,
    )>,
    mut regenerated: MessageWriter<LutRegeneratedEvent>,
) {
    let Some(mut backend) = backend else {
        return;
    };
    let settings = settings.as_deref().map(|s| &s.settings);

    for (entity, view, mut controller, mut frame, targets) in &mut views {
        let Some(targets) = targets else {
            tracing::trace!("{entity} has no depth grading targets");
            if frame.constants.is_some() {
                frame.constants = None;
            }
            continue;
        };
        let targets = targets.into_inner();

        let constants = match controller.0.render_frame(
            &mut backend.0,
            settings,
            &view.context(),
            &mut targets.color,
            &targets.depth,
        ) {
            Ok(constants) => constants,
            Err(e) => {
                tracing::warn!("depth grading failed for {entity}: {e}");
                None
            }
        };

        let near_revision = controller.0.lut0().revision();
        let far_revision = controller.0.lut1().revision();
        if near_revision != frame.near_revision {
            regenerated.write(LutRegeneratedEvent {
                view: entity,
                slot: LutSlot::Near,
                revision: near_revision,
            });
        }
        if far_revision != frame.far_revision {
            regenerated.write(LutRegeneratedEvent {
                view: entity,
                slot: LutSlot::Far,
                revision: far_revision,
            });
        }

        let next = DepthGradingFrame {
            constants,
            near_revision,
            far_revision,
            disabled: controller.0.is_disabled(),
        };
        if *frame != next {
            *frame = next;
        }
    }
}

/// Deactivate the controllers of views that stopped being graded.
pub fn release_removed_views<B: EcsEffectBackend>(
    mut removed: RemovedComponents<DepthGradingView>,
    mut views: Query<(&mut DepthGradingController<B>, &mut DepthGradingFrame)>,
) {
    for entity in removed.read() {
        if let Ok((mut controller, mut frame)) = views.get_mut(entity) {
            controller.0.deactivate();
            frame.constants = None;
            tracing::info!("depth grading released for {entity}");
        }
    }
}

/// Diagnostic system that logs when the settings change.
pub fn detect_settings_changes(state: Res<DepthGradingSettings>) {
    if state.is_changed() && !state.is_added() {
        tracing::debug!(
            "depth grading settings changed, blend={}",
            state.settings.config.blend
        );
    }
}
