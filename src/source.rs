use image::{DynamicImage, ImageBuffer, RgbImage, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{CaptureError, CaptureResult};
use crate::frame::downsample;

/// Which way the camera points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FacingMode {
    /// Front camera; preview and captures are mirrored
    User,
    /// Back camera
    Environment,
}

impl FacingMode {
    pub fn toggled(self) -> Self {
        match self {
            FacingMode::User => FacingMode::Environment,
            FacingMode::Environment => FacingMode::User,
        }
    }

    pub fn is_mirrored(self) -> bool {
        matches!(self, FacingMode::User)
    }

    pub fn name(&self) -> &'static str {
        match self {
            FacingMode::User => "front",
            FacingMode::Environment => "back",
        }
    }
}

impl std::fmt::Display for FacingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Live video source the capture core reads from.
///
/// The motion estimator only ever calls `dimensions` and `draw_into`; the
/// capture session additionally grabs full frames and switches facing.
pub trait VideoSource: Send + Sync {
    /// Natural frame size, `(0, 0)` while the stream is still starting.
    fn dimensions(&self) -> (u32, u32);

    fn is_ready(&self) -> bool {
        let (width, height) = self.dimensions();
        width > 0 && height > 0
    }

    /// Draw the current frame scaled to `width` x `height`.
    fn draw_into(&mut self, width: u32, height: u32) -> CaptureResult<RgbaImage>;

    /// Grab the current frame at full resolution.
    fn grab_frame(&mut self) -> CaptureResult<RgbImage>;

    /// Whether the underlying track is still delivering frames.
    fn is_live(&self) -> bool;

    fn facing(&self) -> FacingMode;

    fn set_facing(&mut self, facing: FacingMode) -> CaptureResult<()>;
}

pub type SharedSource<S> = Arc<RwLock<S>>;

/// Generated stand-in for a device camera: vertical black and white stripes,
/// optionally jittered sideways on every frame to simulate hand shake.
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    stripe_width: u32,
    facing: FacingMode,
    shake: u32,
    ready: bool,
    live: bool,
    frames_drawn: u64,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            stripe_width: 32,
            facing: FacingMode::User,
            shake: 0,
            ready: true,
            live: true,
            frames_drawn: 0,
        }
    }

    pub fn with_shake(mut self, pixels: u32) -> Self {
        self.shake = pixels;
        self
    }

    /// Sideways jitter in source pixels. Half the stripe width flips the
    /// pattern completely between consecutive frames.
    pub fn set_shake(&mut self, pixels: u32) {
        self.shake = pixels;
        log::debug!("Synthetic camera shake set to {}px", pixels);
    }

    pub fn shake(&self) -> u32 {
        self.shake
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    pub fn set_live(&mut self, live: bool) {
        self.live = live;
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    fn current_offset(&self) -> i64 {
        if self.shake == 0 {
            return 0;
        }
        if self.frames_drawn % 2 == 0 {
            self.shake as i64
        } else {
            -(self.shake as i64)
        }
    }

    fn render(&self) -> RgbaImage {
        let offset = self.current_offset();
        let stripe = self.stripe_width.max(1) as i64;

        ImageBuffer::from_fn(self.width, self.height, |x, y| {
            let shifted = (x as i64 + offset).rem_euclid(stripe * 2);
            let base: u8 = if shifted < stripe { 230 } else { 20 };
            // Faint vertical gradient so the frame is not perfectly flat
            let shade = (y * 10 / self.height.max(1)) as u8;
            let value = base.saturating_sub(shade);
            Rgba([value, value, value, 255])
        })
    }
}

impl VideoSource for SyntheticCamera {
    fn dimensions(&self) -> (u32, u32) {
        if self.ready {
            (self.width, self.height)
        } else {
            (0, 0)
        }
    }

    fn draw_into(&mut self, width: u32, height: u32) -> CaptureResult<RgbaImage> {
        if !self.ready {
            return Err(CaptureError::SourceNotReady);
        }
        if !self.live {
            return Err(CaptureError::SourceLost);
        }

        let frame = self.render();
        self.frames_drawn += 1;
        Ok(downsample(&frame, width, height))
    }

    fn grab_frame(&mut self) -> CaptureResult<RgbImage> {
        if !self.ready {
            return Err(CaptureError::SourceNotReady);
        }
        if !self.live {
            return Err(CaptureError::SourceLost);
        }

        Ok(DynamicImage::ImageRgba8(self.render()).to_rgb8())
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn facing(&self) -> FacingMode {
        self.facing
    }

    fn set_facing(&mut self, facing: FacingMode) -> CaptureResult<()> {
        log::info!("Switching synthetic camera to {} facing", facing);
        self.facing = facing;
        self.frames_drawn = 0;
        Ok(())
    }
}
