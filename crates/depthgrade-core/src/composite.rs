//! CPU reference of the resample pass. `depth_grading.wgsl` mirrors this.
//!
//! Per pixel:
//! 1. Scale the source color into LUT range (`Params.z`) and look it up in
//!    both packed tables.
//! 2. Reconstruct view distance from depth, weight the far table by
//!    `1 − exp(distance × falloff_coeff)`. Sky pixels use the far table.
//! 3. Blend the graded color over the source by `blend` (or the sky blend).

use glam::{Vec2, Vec3, Vec4};

use crate::constants::{DepthLinearization, ShaderConstants};
use crate::lut::LutTable;

/// Depth samples at or beyond this value are sky.
pub const SKY_DEPTH: f32 = 1.0;

/// An RGBA float image, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Vec4>,
}

impl ColorImage {
    pub fn filled(width: u32, height: u32, color: Vec4) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; (width * height) as usize],
        }
    }
}

/// A `[0, 1]` depth buffer, row-major, `0` at the near plane.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthImage {
    pub width: u32,
    pub height: u32,
    pub depths: Vec<f32>,
}

impl DepthImage {
    pub fn filled(width: u32, height: u32, depth: f32) -> Self {
        Self {
            width,
            height,
            depths: vec![depth; (width * height) as usize],
        }
    }
}

/// Look up `rgb` (already in `[0, 1]`) in a packed table.
pub fn sample_packed(table: &LutTable, rgb: Vec3, constants: &ShaderConstants) -> Vec3 {
    let [tile_u, last_tile, _, _] = constants.params2;
    let [half_u, half_v, scale_u, scale_v] = constants.params3;

    let bz = rgb.z * last_tile;
    let shift = bz.floor();
    let uv = Vec2::new(
        half_u + rgb.x * scale_u + shift * tile_u,
        half_v + rgb.y * scale_v,
    );
    let lo = table.sample_bilinear(uv);
    let hi = table.sample_bilinear(uv + Vec2::new(tile_u, 0.0));
    lo.lerp(hi, bz - shift)
}

/// Weight of the far look for one depth sample. `uv` has y pointing down.
pub fn far_weight(
    depth: f32,
    uv: Vec2,
    constants: &ShaderConstants,
    linearization: &DepthLinearization,
) -> f32 {
    if depth >= SKY_DEPTH {
        return 1.0;
    }
    let [sx, ox, sy, oy] = constants.depth_to_view;
    let ndc_uv = Vec2::new(uv.x, 1.0 - uv.y);
    let ray = Vec3::new(ndc_uv.x * sx + ox, ndc_uv.y * sy + oy, 1.0);
    let distance = linearization.eye_depth(depth) * ray.length();
    1.0 - (distance * constants.params2[2]).exp()
}

/// Grade one pixel.
pub fn composite_pixel(
    source: Vec4,
    depth: f32,
    uv: Vec2,
    constants: &ShaderConstants,
    linearization: &DepthLinearization,
    near: &LutTable,
    far: &LutTable,
) -> Vec4 {
    let [sky_blend, blend, inv_scale, scale] = constants.params;

    let lut_in = (source.truncate() * inv_scale).clamp(Vec3::ZERO, Vec3::ONE);
    let graded_near = sample_packed(near, lut_in, constants);
    let graded_far = sample_packed(far, lut_in, constants);

    let t = far_weight(depth, uv, constants, linearization);
    let graded = graded_near.lerp(graded_far, t) * scale;

    let amount = if depth >= SKY_DEPTH { sky_blend } else { blend };
    source.truncate().lerp(graded, amount).extend(source.w)
}

/// Resample `source` into `target`. All three buffers must share the same
/// dimensions; on a mismatch `target` is left untouched.
pub fn composite(
    source: &ColorImage,
    depth: &DepthImage,
    target: &mut ColorImage,
    constants: &ShaderConstants,
    linearization: &DepthLinearization,
    near: &LutTable,
    far: &LutTable,
) {
    let (w, h) = (source.width, source.height);
    let len = (w * h) as usize;
    if (depth.width, depth.height) != (w, h)
        || (target.width, target.height) != (w, h)
        || source.pixels.len() != len
        || depth.depths.len() != len
        || target.pixels.len() != len
    {
        tracing::warn!(
            "composite size mismatch: source {w}x{h}, depth {}x{}, target {}x{}",
            depth.width,
            depth.height,
            target.width,
            target.height
        );
        return;
    }

    let texels = source.pixels.iter().zip(&depth.depths).zip(&mut target.pixels);
    for (i, ((&src, &d), out)) in texels.enumerate() {
        let (x, y) = (i as u32 % w, i as u32 / w);
        let uv = Vec2::new((x as f32 + 0.5) / w as f32, (y as f32 + 0.5) / h as f32);
        *out = composite_pixel(src, d, uv, constants, linearization, near, far);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lut::generate;
    use crate::params::{EffectConfig, GradingParameters};
    use glam::Mat4;

    fn projection() -> Mat4 {
        Mat4::perspective_rh(1.2, 1.0, 0.1, 1000.0)
    }

    fn constants(blend: f32, sky: f32, falloff: f32, hdr: bool) -> ShaderConstants {
        let config = EffectConfig {
            blend,
            sky_box_blend: sky,
            falloff,
        };
        ShaderConstants::derive(&config, &projection(), hdr)
    }

    fn depth_at(eye: f32) -> f32 {
        let clip = projection() * Vec4::new(0.0, 0.0, -eye, 1.0);
        clip.z / clip.w
    }

    fn assert_close(a: Vec3, b: Vec3, tol: f32) {
        assert!((a - b).abs().max_element() <= tol, "{a:?} vs {b:?}");
    }

    #[test]
    fn test_identity_table_samples_back_input() {
        let table = generate(&GradingParameters::default());
        let c = constants(1.0, 1.0, 0.5, false);
        for rgb in [
            Vec3::new(0.1, 0.5, 0.9),
            Vec3::new(0.33, 0.66, 0.12),
            Vec3::ZERO,
            Vec3::ONE,
        ] {
            assert_close(sample_packed(&table, rgb, &c), rgb, 2.0 / 255.0);
        }
    }

    #[test]
    fn test_sky_uses_far_table_and_sky_blend() {
        let near = generate(&GradingParameters::default());
        let far = generate(&GradingParameters {
            lift: [1.0, 0.0, 0.0, 1.0],
            ..Default::default()
        });
        let c = constants(1.0, 0.5, 0.5, false);
        let lin = DepthLinearization::from_projection(&projection());

        let source = Vec4::new(0.0, 0.0, 0.0, 1.0);
        let out = composite_pixel(source, 1.0, Vec2::splat(0.5), &c, &lin, &near, &far);
        // Far look maps black to red; half sky blend.
        assert_close(out.truncate(), Vec3::new(0.5, 0.0, 0.0), 2.0 / 255.0);
        assert_eq!(out.w, 1.0);
    }

    #[test]
    fn test_far_weight_grows_with_distance() {
        let c = constants(1.0, 1.0, 0.5, false);
        let lin = DepthLinearization::from_projection(&projection());
        let uv = Vec2::splat(0.5);

        let close = far_weight(depth_at(0.5), uv, &c, &lin);
        let mid = far_weight(depth_at(50.0), uv, &c, &lin);
        let distant = far_weight(depth_at(900.0), uv, &c, &lin);
        assert!(close < mid && mid < distant, "{close} {mid} {distant}");
        assert!((0.0..=1.0).contains(&close));
    }

    #[test]
    fn test_zero_falloff_saturates_quickly() {
        // far = 1, coefficient −2: at 5 units the far look dominates.
        let c = constants(1.0, 1.0, 0.0, false);
        let lin = DepthLinearization::from_projection(&projection());
        let w = far_weight(depth_at(5.0), Vec2::splat(0.5), &c, &lin);
        assert!(w > 0.99, "{w}");
    }

    #[test]
    fn test_zero_blend_is_passthrough() {
        let near = generate(&GradingParameters {
            hue: 0.6,
            ..Default::default()
        });
        let far = near.clone();
        let c = constants(0.0, 1.0, 0.5, false);
        let lin = DepthLinearization::from_projection(&projection());
        let source = Vec4::new(0.7, 0.2, 0.4, 0.5);
        let out = composite_pixel(source, depth_at(3.0), Vec2::splat(0.25), &c, &lin, &near, &far);
        assert_eq!(out, source);
    }

    #[test]
    fn test_hdr_scale_round_trips_through_identity() {
        let table = generate(&GradingParameters::default());
        let c = constants(1.0, 1.0, 0.5, true);
        let lin = DepthLinearization::from_projection(&projection());
        let source = Vec4::new(2.0, 1.0, 0.5, 1.0);
        let out = composite_pixel(source, depth_at(10.0), Vec2::splat(0.5), &c, &lin, &table, &table);
        assert_close(out.truncate(), source.truncate(), 4.0 * 2.0 / 255.0);
    }

    #[test]
    fn test_composite_whole_image() {
        let near = generate(&GradingParameters::default());
        let far = generate(&GradingParameters {
            saturation: -1.0,
            ..Default::default()
        });
        let c = constants(1.0, 1.0, 0.0, false);
        let lin = DepthLinearization::from_projection(&projection());

        let source = ColorImage::filled(4, 2, Vec4::new(1.0, 0.0, 0.0, 1.0));
        let depth = DepthImage::filled(4, 2, SKY_DEPTH);
        let mut target = ColorImage::filled(4, 2, Vec4::ZERO);
        composite(&source, &depth, &mut target, &c, &lin, &near, &far);

        for p in &target.pixels {
            assert_close(p.truncate(), Vec3::ONE, 2.0 / 255.0);
        }
    }

    #[test]
    fn test_mismatched_buffers_leave_target_untouched() {
        let table = generate(&GradingParameters::default());
        let c = constants(1.0, 1.0, 0.5, false);
        let lin = DepthLinearization::from_projection(&projection());

        let source = ColorImage::filled(4, 2, Vec4::new(0.2, 0.4, 0.6, 1.0));
        let mut target = ColorImage::filled(4, 2, Vec4::ZERO);
        let short_depth = DepthImage::filled(2, 2, SKY_DEPTH);
        composite(&source, &short_depth, &mut target, &c, &lin, &table, &table);
        assert!(target.pixels.iter().all(|p| *p == Vec4::ZERO));

        let depth = DepthImage::filled(4, 2, SKY_DEPTH);
        let mut small_target = ColorImage::filled(2, 2, Vec4::ZERO);
        composite(&source, &depth, &mut small_target, &c, &lin, &table, &table);
        assert!(small_target.pixels.iter().all(|p| *p == Vec4::ZERO));

        let mut truncated = source.clone();
        truncated.pixels.pop();
        composite(&truncated, &depth, &mut target, &c, &lin, &table, &table);
        assert!(target.pixels.iter().all(|p| *p == Vec4::ZERO));
    }
}
