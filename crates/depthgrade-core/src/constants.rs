//! Per-frame shader constants derived from the effect config and camera.
//!
//! ```text
//!   far           = 16384 ^ (falloff²)
//!   falloff_coeff = −1 / (far × 0.5)
//!
//!   Params            = (sky_box_blend × blend, blend, 1 / hdr_scale, hdr_scale)
//!   Params2           = (1 / H, H − 1, falloff_coeff, 0)
//!   Params3           = (0.5 / W, 0.5 / H, (H − 1) / W, (H − 1) / H)
//!   DepthToViewParams = (2 / P00, (−1 − P02) / P00, 2 / P11, (−1 − P20) / P11)
//! ```

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

use crate::lut::{LUT_HEIGHT, LUT_WIDTH};
use crate::params::EffectConfig;

/// Base of the falloff distance curve.
const FALLOFF_DISTANCE_BASE: f32 = 16384.0;

/// Headroom reserved for HDR color buffers.
const HDR_SCALE: f32 = 4.0;

/// The four vectors handed to the resample program every frame.
///
/// Laid out for direct upload as a uniform block.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ShaderConstants {
    pub params: [f32; 4],
    pub params2: [f32; 4],
    pub params3: [f32; 4],
    pub depth_to_view: [f32; 4],
}

impl ShaderConstants {
    /// Derive all four vectors.
    pub fn derive(config: &EffectConfig, projection: &Mat4, hdr_enabled: bool) -> Self {
        Self {
            params: blend_params(config, hdr_enabled).to_array(),
            params2: lut_params(config.falloff).to_array(),
            params3: lut_texel_params().to_array(),
            depth_to_view: depth_to_view_params(projection).to_array(),
        }
    }
}

/// Distance at which the far look takes over: `16384 ^ (falloff²)`.
pub fn falloff_distance(falloff: f32) -> f32 {
    FALLOFF_DISTANCE_BASE.powf(falloff * falloff)
}

/// Exponent coefficient applied to view distance: `−1 / (far × 0.5)`.
pub fn falloff_coefficient(falloff: f32) -> f32 {
    -1.0 / (falloff_distance(falloff) * 0.5)
}

pub fn hdr_scale(hdr_enabled: bool) -> f32 {
    if hdr_enabled { HDR_SCALE } else { 1.0 }
}

/// `Params`: sky blend, blend, inverse HDR scale, HDR scale.
pub fn blend_params(config: &EffectConfig, hdr_enabled: bool) -> Vec4 {
    let scale = hdr_scale(hdr_enabled);
    Vec4::new(
        config.sky_box_blend * config.blend,
        config.blend,
        1.0 / scale,
        scale,
    )
}

/// `Params2`: tile width in u, last tile index, falloff coefficient. `w` is unused.
pub fn lut_params(falloff: f32) -> Vec4 {
    let h = LUT_HEIGHT as f32;
    Vec4::new(1.0 / h, h - 1.0, falloff_coefficient(falloff), 0.0)
}

/// `Params3`: half-texel offsets and index-to-uv scales for the packed table.
pub fn lut_texel_params() -> Vec4 {
    let w = LUT_WIDTH as f32;
    let h = LUT_HEIGHT as f32;
    Vec4::new(0.5 / w, 0.5 / h, (h - 1.0) / w, (h - 1.0) / h)
}

/// `DepthToViewParams` from a perspective projection.
///
/// Indices are (row, column). glam stores columns, so `P02` is `col(2).x`.
pub fn depth_to_view_params(projection: &Mat4) -> Vec4 {
    let p00 = projection.x_axis.x;
    let p11 = projection.y_axis.y;
    let p02 = projection.z_axis.x;
    let p20 = projection.x_axis.z;
    Vec4::new(
        2.0 / p00,
        (-1.0 - p02) / p00,
        2.0 / p11,
        (-1.0 - p20) / p11,
    )
}

/// Coefficients turning a `[0, 1]` depth sample into eye depth:
/// `eye = b / (depth + a)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthLinearization {
    pub a: f32,
    pub b: f32,
}

impl DepthLinearization {
    /// Read `P22` and `P23` from a zero-to-one depth projection.
    pub fn from_projection(projection: &Mat4) -> Self {
        Self {
            a: projection.z_axis.z,
            b: projection.w_axis.z,
        }
    }

    pub fn eye_depth(&self, depth: f32) -> f32 {
        self.b / (depth + self.a)
    }
}
