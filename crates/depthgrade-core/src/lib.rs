//! Depthgrade Core: domain layer for depth-blended color grading.
//!
//! This crate contains the LUT generation math, shader constant derivation,
//! a CPU reference of the resample pass, and the per-frame effect controller.
//! No GPU or framework dependencies.

pub mod composite;
pub mod constants;
pub mod controller;
pub mod error;
pub mod lut;
pub mod params;

// Re-exports for convenience.
pub use constants::{DepthLinearization, ShaderConstants};
pub use controller::{
    EffectBackend, EffectController, LutBinding, PROGRAM_NAME, PassInputs, ViewContext,
    generator_parameters,
};
pub use error::{EffectError, SettingsError};
pub use lut::{LUT_HEIGHT, LUT_SIZE, LUT_WIDTH, LutGenerator, LutTable};
pub use params::{EffectConfig, EffectSettings, GradingParameters, PassTiming};
