//! Bevy messages for driving and observing depth grading.

use std::path::PathBuf;

use bevy::prelude::*;
use depthgrade_core::{EffectConfig, EffectSettings, GradingParameters};

/// Which of a view's two looks a message refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LutSlot {
    Near,
    Far,
}

/// Inbound edits to the shared settings. Values are clamped on apply.
#[derive(Message, Debug, Clone)]
pub enum DepthGradingCommand {
    /// Replace everything.
    SetSettings { settings: EffectSettings },
    SetConfig { config: EffectConfig },
    SetNear { params: GradingParameters },
    SetFar { params: GradingParameters },
    /// Back to authoring defaults.
    Reset,
    /// Replace the settings from a JSON file.
    LoadSettings { path: PathBuf },
    /// Write one of a view's tables to a PNG.
    ExportLut {
        view: Entity,
        slot: LutSlot,
        path: PathBuf,
    },
}

/// Fired when a command actually changed the settings.
#[derive(Message)]
pub struct SettingsUpdatedEvent {
    pub settings: EffectSettings,
}

/// Fired when a view's table was rebuilt.
#[derive(Message)]
pub struct LutRegeneratedEvent {
    pub view: Entity,
    pub slot: LutSlot,
    pub revision: u64,
}
