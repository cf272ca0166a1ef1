//! Parameter structs that drive the depth grading effect.
//!
//! `EffectSettings` plays the role of the host's configuration stack: it is
//! the single source of truth the controller reads every frame. Scalar ranges
//! are enforced here, not in the LUT generator.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

/// Opaque white, the neutral tint.
pub const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
/// Opaque black, the neutral lift.
pub const BLACK: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// One grading look. Two of these exist per effect: near and far.
///
/// Colors are `[R, G, B, A]`; the alpha channel is the effect weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingParameters {
    /// Hue shift in `[-1, 1]`. Cubed before use.
    pub hue: f32,
    /// Saturation shift in `[-1, 1]`. Added to HSV saturation as-is.
    pub saturation: f32,
    /// Lightness shift in `[-1, 1]`.
    pub lightness: f32,
    /// Gamma shift in `[-1, 1]`. Cubed, then used as a power of ten.
    pub gamma: f32,
    /// Multiplicative tint. Default: white.
    pub tint: [f32; 4],
    /// Additive lift. Default: black.
    pub lift: [f32; 4],
}

impl Default for GradingParameters {
    /// Identity look.
    fn default() -> Self {
        Self {
            hue: 0.0,
            saturation: 0.0,
            lightness: 0.0,
            gamma: 0.0,
            tint: WHITE,
            lift: BLACK,
        }
    }
}

impl GradingParameters {
    /// Clamp scalar shifts to `[-1, 1]`. Colors are left untouched.
    pub fn clamped(&self) -> Self {
        Self {
            hue: self.hue.clamp(-1.0, 1.0),
            saturation: self.saturation.clamp(-1.0, 1.0),
            lightness: self.lightness.clamp(-1.0, 1.0),
            gamma: self.gamma.clamp(-1.0, 1.0),
            ..*self
        }
    }

    /// Exact comparison used for LUT dirty tracking.
    ///
    /// Scalars use float equality, colors compare bit patterns.
    pub fn same_as(&self, other: &Self) -> bool {
        fn bits(c: &[f32; 4]) -> [u32; 4] {
            c.map(f32::to_bits)
        }

        self.hue == other.hue
            && self.saturation == other.saturation
            && self.lightness == other.lightness
            && self.gamma == other.gamma
            && bits(&self.tint) == bits(&other.tint)
            && bits(&self.lift) == bits(&other.lift)
    }
}

/// Top-level tunables of the effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectConfig {
    /// Overall effect strength in `[0, 1]`. Zero disables the effect.
    pub blend: f32,
    /// Strength on sky pixels in `[0, 1]`, multiplied with `blend`.
    pub sky_box_blend: f32,
    /// Depth falloff shape in `[0, 1]`.
    pub falloff: f32,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            blend: 0.0,
            sky_box_blend: 0.5,
            falloff: 0.1,
        }
    }
}

impl EffectConfig {
    /// The effect does work only when it has a nonzero blend.
    pub fn is_active(&self) -> bool {
        self.blend > 0.0
    }

    /// Clamp every field to `[0, 1]`.
    pub fn clamped(&self) -> Self {
        Self {
            blend: self.blend.clamp(0.0, 1.0),
            sky_box_blend: self.sky_box_blend.clamp(0.0, 1.0),
            falloff: self.falloff.clamp(0.0, 1.0),
        }
    }
}

/// Where in the host pipeline the resample pass is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PassTiming {
    AfterOpaque,
    BeforePostProcessing,
    #[default]
    AfterPostProcessing,
}

/// Full effect state: tunables plus the near and far looks.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectSettings {
    pub config: EffectConfig,
    /// Look applied close to the camera (LUT 0).
    pub near: GradingParameters,
    /// Look applied with distance and on the sky (LUT 1).
    pub far: GradingParameters,
    pub timing: PassTiming,
}

impl EffectSettings {
    pub fn is_active(&self) -> bool {
        self.config.is_active()
    }

    /// Copy of these settings with every scalar clamped to its range.
    pub fn clamped(&self) -> Self {
        Self {
            config: self.config.clamped(),
            near: self.near.clamped(),
            far: self.far.clamped(),
            timing: self.timing,
        }
    }

    /// Parse settings from JSON. Missing fields take their defaults and the
    /// result is clamped.
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        Ok(settings.clamped())
    }

    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_inactive() {
        let settings = EffectSettings::default();
        assert!(!settings.is_active());
        assert_eq!(settings.config.sky_box_blend, 0.5);
        assert_eq!(settings.config.falloff, 0.1);
        assert_eq!(settings.near.tint, WHITE);
        assert_eq!(settings.far.lift, BLACK);
        assert_eq!(settings.timing, PassTiming::AfterPostProcessing);
    }

    #[test]
    fn test_clamped_limits_ranges() {
        let settings = EffectSettings {
            config: EffectConfig {
                blend: 3.0,
                sky_box_blend: -1.0,
                falloff: 1.5,
            },
            near: GradingParameters {
                hue: -4.0,
                gamma: 2.0,
                ..Default::default()
            },
            ..Default::default()
        }
        .clamped();

        assert_eq!(settings.config.blend, 1.0);
        assert_eq!(settings.config.sky_box_blend, 0.0);
        assert_eq!(settings.config.falloff, 1.0);
        assert_eq!(settings.near.hue, -1.0);
        assert_eq!(settings.near.gamma, 1.0);
    }

    #[test]
    fn test_json_partial_uses_defaults() {
        let json = r#"{ "config": { "blend": 0.75 }, "far": { "hue": 0.25 } }"#;
        let settings = EffectSettings::from_json_str(json).expect("valid json");
        assert!(settings.is_active());
        assert_eq!(settings.config.blend, 0.75);
        assert_eq!(settings.config.sky_box_blend, 0.5);
        assert_eq!(settings.far.hue, 0.25);
        assert_eq!(settings.far.tint, WHITE);
        assert_eq!(settings.near, GradingParameters::default());
    }

    #[test]
    fn test_json_rejects_garbage() {
        let err = EffectSettings::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }

    #[test]
    fn test_json_roundtrip_keeps_timing() {
        let settings = EffectSettings {
            timing: PassTiming::AfterOpaque,
            ..Default::default()
        };
        let json = settings.to_json_string().expect("serializable");
        let parsed = EffectSettings::from_json_str(&json).expect("valid json");
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_same_as_distinguishes_signed_zero_in_colors_only() {
        let a = GradingParameters::default();
        let mut b = a;
        b.hue = -0.0;
        assert!(a.same_as(&b), "scalars compare by value");

        b.lift[0] = -0.0;
        assert!(!a.same_as(&b), "colors compare by bits");
    }
}
