//! Packed 2D LUT generation and memoization.
//!
//! A 16³ color cube is stored as a 256×16 RGBA8 image. Blue selects one of
//! sixteen 16×16 tiles laid out left to right; red runs along x inside a tile
//! and green runs along y.
//!
//! ```text
//!   x = r + b × N        y = g        coord = index / (N − 1)
//! ```

use std::path::Path;

use glam::{Vec2, Vec3};
use palette::convert::FromColorUnclamped;
use palette::{Hsv, RgbHue, Srgb};

use crate::params::GradingParameters;

/// Samples per axis of the color cube.
pub const LUT_SIZE: u32 = 16;
/// Packed image width (`N²`).
pub const LUT_WIDTH: u32 = LUT_SIZE * LUT_SIZE;
/// Packed image height (`N`).
pub const LUT_HEIGHT: u32 = LUT_SIZE;

/// Maps a grid index in `[0, N−1]` to its continuous coordinate in `[0, 1]`.
const INDEX_TO_COORD: f32 = 1.0 / (LUT_SIZE - 1) as f32;

/// Cube indices `[r, g, b]` addressed by packed pixel `(x, y)`.
pub fn grid_index(x: u32, y: u32) -> [u32; 3] {
    [x % LUT_SIZE, y, x / LUT_SIZE]
}

/// Packed pixel `(x, y)` holding cube indices `[r, g, b]`.
pub fn packed_position(index: [u32; 3]) -> (u32, u32) {
    let [r, g, b] = index;
    (r + b * LUT_SIZE, g)
}

/// Grading parameters with their response curves already applied.
#[derive(Debug, Clone, Copy)]
struct Shaped {
    hue_shift: f32,
    saturation_shift: f32,
    lightness: f32,
    gamma_power: f32,
    tint: Vec3,
    tint_weight: f32,
    lift: Vec3,
    lift_weight: f32,
}

impl Shaped {
    fn new(params: &GradingParameters) -> Self {
        let [tr, tg, tb, ta] = params.tint;
        let [lr, lg, lb, la] = params.lift;
        Self {
            hue_shift: params.hue.powi(3),
            saturation_shift: params.saturation,
            lightness: params.lightness,
            gamma_power: 10.0_f32.powf(params.gamma.powi(3)),
            tint: Vec3::new(tr, tg, tb),
            tint_weight: ta * ta,
            lift: Vec3::new(lr, lg, lb),
            lift_weight: la * la,
        }
    }

    /// Grade one cube coordinate. The result is not clamped.
    fn grade(&self, rgb: Vec3) -> Vec3 {
        let g = rgb.powf(self.gamma_power);

        let mut hsv: Hsv<palette::encoding::Srgb, f32> =
            Hsv::from_color_unclamped(Srgb::new(g.x, g.y, g.z));
        let degrees = hsv.hue.into_positive_degrees() + self.hue_shift * 360.0;
        hsv.hue = RgbHue::from_degrees(degrees);
        hsv.saturation = (hsv.saturation + self.saturation_shift).clamp(0.0, 1.0);
        hsv.value *= self.lightness.clamp(0.0, 1.0) + 1.0;

        let back = Srgb::from_color_unclamped(hsv);
        let mut out = Vec3::new(back.red, back.green, back.blue).clamp(Vec3::ZERO, Vec3::ONE);
        if self.lightness < 0.0 {
            out *= self.lightness + 1.0;
        }

        out.lerp(out * self.tint, self.tint_weight) + self.lift * self.lift_weight
    }
}

/// Grade a single color with the full LUT transform, before quantization.
///
/// Useful for checking a table entry against its exact value.
pub fn grade_color(rgb: Vec3, params: &GradingParameters) -> Vec3 {
    Shaped::new(params).grade(rgb)
}

/// Quantize a channel to 8 bits, rounding to nearest.
fn quantize(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// A generated LUT in packed RGBA8 layout. Alpha is always zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LutTable {
    pixels: Vec<[u8; 4]>,
}

impl LutTable {
    /// A zero-filled table.
    pub fn empty() -> Self {
        Self {
            pixels: vec![[0; 4]; (LUT_WIDTH * LUT_HEIGHT) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        LUT_WIDTH
    }

    pub fn height(&self) -> u32 {
        LUT_HEIGHT
    }

    /// Row-major pixels, `y * width + x`.
    pub fn pixels(&self) -> &[[u8; 4]] {
        &self.pixels
    }

    /// Raw RGBA8 bytes for texture upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    pub fn texel(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels[(y * LUT_WIDTH + x) as usize]
    }

    /// Decoded color stored for cube indices `[r, g, b]`.
    pub fn grid_color(&self, index: [u32; 3]) -> Vec3 {
        let (x, y) = packed_position(index);
        decode(self.texel(x, y))
    }

    /// Bilinear sample at normalized texture coordinates with clamp-to-edge
    /// addressing, as a linear-filtered texture fetch would return it.
    pub fn sample_bilinear(&self, uv: Vec2) -> Vec3 {
        let fx = uv.x * LUT_WIDTH as f32 - 0.5;
        let fy = uv.y * LUT_HEIGHT as f32 - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();
        let tx = fx - x0;
        let ty = fy - y0;

        let fetch = |x: f32, y: f32| {
            let xi = (x as i64).clamp(0, LUT_WIDTH as i64 - 1) as u32;
            let yi = (y as i64).clamp(0, LUT_HEIGHT as i64 - 1) as u32;
            decode(self.texel(xi, yi))
        };

        let top = fetch(x0, y0).lerp(fetch(x0 + 1.0, y0), tx);
        let bottom = fetch(x0, y0 + 1.0).lerp(fetch(x0 + 1.0, y0 + 1.0), tx);
        top.lerp(bottom, ty)
    }

    /// Copy into an [`image::RgbaImage`]. Alpha is forced opaque so the
    /// exported file is viewable.
    pub fn to_image(&self) -> image::RgbaImage {
        image::RgbaImage::from_fn(LUT_WIDTH, LUT_HEIGHT, |x, y| {
            let [r, g, b, _] = self.texel(x, y);
            image::Rgba([r, g, b, 255])
        })
    }

    /// Write the table to a PNG file for inspection.
    pub fn save_png(&self, path: &Path) -> image::ImageResult<()> {
        self.to_image().save_with_format(path, image::ImageFormat::Png)
    }
}

fn decode(texel: [u8; 4]) -> Vec3 {
    Vec3::new(texel[0] as f32, texel[1] as f32, texel[2] as f32) / 255.0
}

/// Regenerate `table` in place from `params`.
pub fn generate_into(table: &mut LutTable, params: &GradingParameters) {
    let shaped = Shaped::new(params);
    for y in 0..LUT_HEIGHT {
        for x in 0..LUT_WIDTH {
            let [r, g, b] = grid_index(x, y);
            let base = Vec3::new(r as f32, g as f32, b as f32) * INDEX_TO_COORD;
            let out = shaped.grade(base);
            table.pixels[(y * LUT_WIDTH + x) as usize] =
                [quantize(out.x), quantize(out.y), quantize(out.z), 0];
        }
    }
}

/// Build a fresh table from `params`.
pub fn generate(params: &GradingParameters) -> LutTable {
    let mut table = LutTable::empty();
    generate_into(&mut table, params);
    table
}

/// Memoizing wrapper around [`generate`].
///
/// Holds the parameters most recently set and the table built from the
/// parameters most recently applied. The table is rebuilt in place only when
/// the two differ or nothing has been built yet.
#[derive(Debug, Default)]
pub struct LutGenerator {
    params: GradingParameters,
    applied: Option<GradingParameters>,
    table: Option<LutTable>,
    revision: u64,
}

impl LutGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store new parameters. Does not regenerate.
    pub fn set_parameters(&mut self, params: GradingParameters) {
        self.params = params;
    }

    pub fn parameters(&self) -> &GradingParameters {
        &self.params
    }

    /// Whether the next access will regenerate.
    pub fn is_dirty(&self) -> bool {
        match (&self.applied, &self.table) {
            (Some(applied), Some(_)) => !applied.same_as(&self.params),
            _ => true,
        }
    }

    /// Number of regenerations so far. Advances by one per rebuild.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Rebuild the table if dirty and return the current revision.
    pub fn refresh(&mut self) -> u64 {
        if self.is_dirty() {
            let params = self.params;
            let table = self.table.get_or_insert_with(LutTable::empty);
            generate_into(table, &params);
            self.applied = Some(params);
            self.revision += 1;
            tracing::debug!(revision = self.revision, "regenerated depth grading LUT");
        }
        self.revision
    }

    /// The last built table, without regenerating.
    pub fn cached(&self) -> Option<&LutTable> {
        self.table.as_ref()
    }

    /// The table for the current parameters, rebuilt if dirty.
    pub fn texture(&mut self) -> &LutTable {
        self.refresh();
        self.table.get_or_insert_with(LutTable::empty)
    }

    /// Drop the cached table. The next access rebuilds it.
    pub fn release(&mut self) {
        self.table = None;
        self.applied = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUANT: f32 = 1.0 / 255.0 + 1e-6;

    fn assert_close(a: Vec3, b: Vec3, tol: f32, what: &str) {
        assert!(
            (a - b).abs().max_element() <= tol,
            "{what}: {a:?} vs {b:?} (tol {tol})"
        );
    }

    #[test]
    fn test_packing_is_a_bijection() {
        let mut seen = vec![false; (LUT_SIZE * LUT_SIZE * LUT_SIZE) as usize];
        for y in 0..LUT_HEIGHT {
            for x in 0..LUT_WIDTH {
                let index = grid_index(x, y);
                assert!(index.iter().all(|&i| i < LUT_SIZE));
                assert_eq!(packed_position(index), (x, y));

                let [r, g, b] = index;
                let flat = (r + g * LUT_SIZE + b * LUT_SIZE * LUT_SIZE) as usize;
                assert!(!seen[flat], "index {index:?} visited twice");
                seen[flat] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_identity_table_reproduces_grid() {
        for tint_alpha in [0.0, 1.0] {
            let params = GradingParameters {
                tint: [1.0, 1.0, 1.0, tint_alpha],
                lift: [0.0, 0.0, 0.0, 0.0],
                ..Default::default()
            };
            let table = generate(&params);
            for b in 0..LUT_SIZE {
                for g in 0..LUT_SIZE {
                    for r in 0..LUT_SIZE {
                        let expected = Vec3::new(r as f32, g as f32, b as f32) * INDEX_TO_COORD;
                        assert_close(
                            table.grid_color([r, g, b]),
                            expected,
                            QUANT,
                            &format!("identity at {r},{g},{b} (tint alpha {tint_alpha})"),
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_alpha_is_always_zero() {
        let params = GradingParameters {
            hue: 0.4,
            lift: [0.2, 0.1, 0.0, 1.0],
            ..Default::default()
        };
        assert!(generate(&params).pixels().iter().all(|p| p[3] == 0));
    }

    #[test]
    fn test_lift_raises_black() {
        let params = GradingParameters {
            lift: [0.5, 0.25, 0.0, 1.0],
            ..Default::default()
        };
        let table = generate(&params);
        assert_close(table.grid_color([0, 0, 0]), Vec3::new(0.5, 0.25, 0.0), QUANT, "lift");
    }

    #[test]
    fn test_lift_weight_is_squared() {
        let params = GradingParameters {
            lift: [1.0, 1.0, 1.0, 0.5],
            ..Default::default()
        };
        let out = grade_color(Vec3::ZERO, &params);
        assert_close(out, Vec3::splat(0.25), 1e-6, "half alpha gives quarter lift");
    }

    #[test]
    fn test_tint_multiplies_with_squared_weight() {
        let params = GradingParameters {
            tint: [0.0, 1.0, 1.0, 0.5],
            ..Default::default()
        };
        let out = grade_color(Vec3::ONE, &params);
        // lerp(1, 0, 0.25) on red, unchanged elsewhere.
        assert_close(out, Vec3::new(0.75, 1.0, 1.0), 1e-5, "tint");
    }

    #[test]
    fn test_negative_lightness_darkens() {
        let params = GradingParameters {
            lightness: -0.5,
            ..Default::default()
        };
        let out = grade_color(Vec3::new(0.8, 0.4, 0.2), &params);
        assert_close(out, Vec3::new(0.4, 0.2, 0.1), 1e-5, "lightness -0.5");
    }

    #[test]
    fn test_positive_lightness_scales_value_and_clamps() {
        let params = GradingParameters {
            lightness: 1.0,
            ..Default::default()
        };
        let out = grade_color(Vec3::new(0.8, 0.4, 0.2), &params);
        assert_close(out, Vec3::new(1.0, 0.8, 0.4), 1e-5, "lightness +1");
    }

    #[test]
    fn test_hue_shift_leaves_grays_alone() {
        let params = GradingParameters {
            hue: 0.7,
            ..Default::default()
        };
        let shifted = generate(&params);
        let identity = generate(&GradingParameters::default());

        for i in 0..LUT_SIZE {
            assert_eq!(
                shifted.grid_color([i, i, i]),
                identity.grid_color([i, i, i]),
                "gray {i} should not move"
            );
        }
        assert_ne!(shifted.grid_color([15, 0, 0]), identity.grid_color([15, 0, 0]));
    }

    #[test]
    fn test_full_hue_turn_is_identity() {
        // 1³ = one full turn around the hue circle.
        let params = GradingParameters {
            hue: 1.0,
            ..Default::default()
        };
        let rgb = Vec3::new(0.9, 0.3, 0.1);
        assert_close(grade_color(rgb, &params), rgb, 1e-4, "hue 1.0");
    }

    #[test]
    fn test_saturation_minus_one_gives_gray() {
        let params = GradingParameters {
            saturation: -1.0,
            ..Default::default()
        };
        let out = grade_color(Vec3::new(0.9, 0.3, 0.1), &params);
        assert_close(out, Vec3::splat(0.9), 1e-5, "desaturated keeps value");
    }

    #[test]
    fn test_gamma_uses_cubed_power_of_ten() {
        let params = GradingParameters {
            gamma: 1.0,
            ..Default::default()
        };
        // Power 10 on a gray.
        let out = grade_color(Vec3::splat(0.5), &params);
        assert_close(out, Vec3::splat(0.5_f32.powi(10)), 1e-6, "gamma 1.0");

        let endpoints = generate(&params);
        assert_eq!(endpoints.texel(0, 0), [0, 0, 0, 0]);
        assert_eq!(endpoints.texel(LUT_WIDTH - 1, LUT_HEIGHT - 1), [255, 255, 255, 0]);
    }

    #[test]
    fn test_generator_caches_until_params_change() {
        let mut generator = LutGenerator::new();
        assert!(generator.is_dirty());

        let first = generator.texture().clone();
        assert_eq!(generator.revision(), 1);

        let second = generator.texture().clone();
        assert_eq!(generator.revision(), 1, "unchanged params must not regenerate");
        assert_eq!(first, second);

        generator.set_parameters(GradingParameters::default());
        assert!(!generator.is_dirty(), "equal params are not dirty");
    }

    #[test]
    fn test_generator_regenerates_on_any_change() {
        let edits: [fn(&mut GradingParameters); 6] = [
            |p| p.hue = 0.5,
            |p| p.saturation = -0.5,
            |p| p.lightness = 0.25,
            |p| p.gamma = 0.5,
            |p| p.tint = [1.0, 0.5, 0.5, 1.0],
            |p| p.lift = [0.1, 0.1, 0.1, 1.0],
        ];

        for (i, edit) in edits.iter().enumerate() {
            let mut generator = LutGenerator::new();
            let before = generator.texture().clone();

            let mut params = GradingParameters::default();
            edit(&mut params);
            generator.set_parameters(params);
            assert!(generator.is_dirty(), "edit {i} should mark dirty");

            let after = generator.texture().clone();
            assert_eq!(generator.revision(), 2, "edit {i}");
            assert_ne!(before, after, "edit {i} should change the table");
        }
    }

    #[test]
    fn test_release_forces_rebuild() {
        let mut generator = LutGenerator::new();
        let _ = generator.texture();
        generator.release();
        assert!(generator.is_dirty());
        let _ = generator.texture();
        assert_eq!(generator.revision(), 2);
    }

    #[test]
    fn test_bilinear_hits_texel_centers() {
        let table = generate(&GradingParameters::default());
        let (x, y) = packed_position([3, 7, 5]);
        let uv = Vec2::new(
            (x as f32 + 0.5) / LUT_WIDTH as f32,
            (y as f32 + 0.5) / LUT_HEIGHT as f32,
        );
        assert_close(table.sample_bilinear(uv), table.grid_color([3, 7, 5]), 1e-6, "center");
    }

    #[test]
    fn test_to_image_matches_table() {
        let table = generate(&GradingParameters::default());
        let image = table.to_image();
        assert_eq!(image.dimensions(), (LUT_WIDTH, LUT_HEIGHT));
        let [r, g, b, _] = table.texel(37, 9);
        assert_eq!(image.get_pixel(37, 9).0, [r, g, b, 255]);
    }
}
