//! Data Augmentation Module
//!
//! Random geometric augmentations applied by the image feeds: rotation,
//! horizontal/vertical shift and horizontal flip. One random [`Transform`] is
//! drawn per image and applied as a single inverse mapping; pixels that fall
//! outside the source are filled from the nearest edge.

use image::{Rgb, RgbImage};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Configuration for data augmentation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationConfig {
    /// Maximum rotation angle in degrees (applies ±rotation_range)
    pub rotation_range: f32,
    /// Maximum horizontal shift as a fraction of the width
    pub width_shift_range: f32,
    /// Maximum vertical shift as a fraction of the height
    pub height_shift_range: f32,
    /// Flip half of the images horizontally
    pub horizontal_flip: bool,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            rotation_range: 40.0,
            width_shift_range: 0.2,
            height_shift_range: 0.2,
            horizontal_flip: true,
        }
    }
}

impl AugmentationConfig {
    /// No augmentation
    pub fn none() -> Self {
        Self {
            rotation_range: 0.0,
            width_shift_range: 0.0,
            height_shift_range: 0.0,
            horizontal_flip: false,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.rotation_range == 0.0
            && self.width_shift_range == 0.0
            && self.height_shift_range == 0.0
            && !self.horizontal_flip
    }
}

/// Concrete parameters drawn for one image
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Transform {
    /// Rotation in degrees, counter-clockwise about the image center
    pub angle: f32,
    /// Horizontal shift in pixels
    pub shift_x: f32,
    /// Vertical shift in pixels
    pub shift_y: f32,
    /// Mirror the result horizontally
    pub flip: bool,
}

impl Transform {
    pub fn is_identity(&self) -> bool {
        self.angle == 0.0 && self.shift_x == 0.0 && self.shift_y == 0.0 && !self.flip
    }
}

/// Image augmenter that applies random transformations
#[derive(Clone, Debug)]
pub struct Augmenter {
    config: AugmentationConfig,
}

impl Augmenter {
    pub fn new(config: AugmentationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AugmentationConfig {
        &self.config
    }

    /// Draw random transform parameters for an image of the given size
    pub fn sample<R: Rng + ?Sized>(&self, width: u32, height: u32, rng: &mut R) -> Transform {
        let angle = symmetric(rng, self.config.rotation_range);
        let shift_x = symmetric(rng, self.config.width_shift_range) * width as f32;
        let shift_y = symmetric(rng, self.config.height_shift_range) * height as f32;
        let flip = self.config.horizontal_flip && rng.gen_bool(0.5);

        Transform {
            angle,
            shift_x,
            shift_y,
            flip,
        }
    }

    /// Apply a random transform to `img`
    pub fn augment<R: Rng + ?Sized>(&self, img: &RgbImage, rng: &mut R) -> RgbImage {
        if self.config.is_identity() {
            return img.clone();
        }
        let transform = self.sample(img.width(), img.height(), rng);
        self.apply(img, &transform)
    }

    /// Apply `transform` to `img`: rotate and shift, then flip
    pub fn apply(&self, img: &RgbImage, transform: &Transform) -> RgbImage {
        if transform.is_identity() {
            return img.clone();
        }

        let (width, height) = img.dimensions();
        let cx = (width as f32 - 1.0) / 2.0;
        let cy = (height as f32 - 1.0) / 2.0;
        let (sin_a, cos_a) = transform.angle.to_radians().sin_cos();

        RgbImage::from_fn(width, height, |x, y| {
            let x = if transform.flip { width - 1 - x } else { x };

            // Undo the shift, then rotate back around the center
            let dx = x as f32 - cx - transform.shift_x;
            let dy = y as f32 - cy - transform.shift_y;
            let src_x = cx + dx * cos_a + dy * sin_a;
            let src_y = cy - dx * sin_a + dy * cos_a;

            bilinear_sample(img, src_x, src_y)
        })
    }
}

/// Uniform draw from `[-range, range]`, or 0 when the range is disabled
fn symmetric<R: Rng + ?Sized>(rng: &mut R, range: f32) -> f32 {
    if range > 0.0 {
        rng.gen_range(-range..=range)
    } else {
        0.0
    }
}

/// Sample a pixel using bilinear interpolation, clamping to the nearest edge
fn bilinear_sample(img: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let (width, height) = img.dimensions();
    let x = x.clamp(0.0, (width - 1) as f32);
    let y = y.clamp(0.0, (height - 1) as f32);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x1, y0);
    let p01 = img.get_pixel(x0, y1);
    let p11 = img.get_pixel(x1, y1);

    let mut result = [0u8; 3];
    for c in 0..3 {
        let v = p00[c] as f32 * (1.0 - fx) * (1.0 - fy)
            + p10[c] as f32 * fx * (1.0 - fy)
            + p01[c] as f32 * (1.0 - fx) * fy
            + p11[c] as f32 * fx * fy;
        result[c] = v.round().clamp(0.0, 255.0) as u8;
    }

    Rgb(result)
}
