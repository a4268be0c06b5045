use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgba, RgbaImage};

use crate::config::MotionConfig;

/// Low-resolution RGBA raster sampled from the live source at one instant.
#[derive(Debug, Clone)]
pub struct FrameSample {
    raster: RgbaImage,
}

impl FrameSample {
    pub fn new(raster: RgbaImage) -> Self {
        Self { raster }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.raster.dimensions()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.raster.as_raw()
    }

    /// Motion score of `self` relative to an earlier sample.
    pub fn motion_since(&self, previous: &FrameSample, sampling: &Sampling) -> f64 {
        motion_score(previous.as_bytes(), self.as_bytes(), sampling)
    }
}

/// Sampling parameters of the motion score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub stride: usize,
    pub noise_floor: u32,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            stride: 12,
            noise_floor: 20,
        }
    }
}

impl From<&MotionConfig> for Sampling {
    fn from(config: &MotionConfig) -> Self {
        Self {
            stride: config.sample_stride,
            noise_floor: config.noise_floor,
        }
    }
}

/// Mean noise-floored RGB difference between two interleaved RGBA buffers.
///
/// Positions are visited every `stride` bytes. A position contributes its
/// summed |dR| + |dG| + |dB| only when that sum exceeds the noise floor, but
/// every visited position counts toward the divisor.
pub fn motion_score(previous: &[u8], current: &[u8], sampling: &Sampling) -> f64 {
    let len = previous.len().min(current.len());
    let stride = sampling.stride.max(4);

    let mut total: u64 = 0;
    let mut positions: u64 = 0;

    let mut i = 0;
    while i + 2 < len {
        let diff = channel_diff(previous[i], current[i])
            + channel_diff(previous[i + 1], current[i + 1])
            + channel_diff(previous[i + 2], current[i + 2]);

        if diff > sampling.noise_floor {
            total += diff as u64;
        }
        positions += 1;
        i += stride;
    }

    if positions == 0 {
        0.0
    } else {
        total as f64 / positions as f64
    }
}

fn channel_diff(a: u8, b: u8) -> u32 {
    (a as i32 - b as i32).unsigned_abs()
}

/// Scale a full-resolution RGBA frame down to the sampling raster.
pub fn downsample(frame: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    if frame.dimensions() == (width, height) {
        return frame.clone();
    }
    imageops::resize(frame, width, height, FilterType::Triangle)
}

/// Uniformly coloured raster, handy for sources that have nothing to show.
pub fn solid_raster(width: u32, height: u32, rgb: [u8; 3]) -> RgbaImage {
    ImageBuffer::from_pixel(width, height, Rgba([rgb[0], rgb[1], rgb[2], 255]))
}
