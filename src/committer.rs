use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, RgbImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::CaptureError;

/// Receives photos once the gate approved them and the settle delay passed.
#[async_trait::async_trait]
pub trait CaptureCommitter: Send {
    async fn commit(&mut self, photo: RgbImage) -> Result<PathBuf>;
}

/// Writes JPEGs into one timestamped folder per capture session.
pub struct DirectoryCommitter {
    root: PathBuf,
    quality: u8,
    session_folder: Option<String>,
    photo_counter: usize,
}

impl DirectoryCommitter {
    pub fn new<P: AsRef<Path>>(root: P, quality: u8) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            quality: quality.clamp(1, 100),
            session_folder: None,
            photo_counter: 0,
        }
    }

    /// Next photo opens a fresh session folder.
    pub fn start_new_session(&mut self) {
        self.session_folder = None;
        self.photo_counter = 0;
    }

    pub fn photos_in_session(&self) -> usize {
        self.photo_counter
    }

    pub fn session_dir(&self) -> Option<PathBuf> {
        self.session_folder.as_ref().map(|folder| self.root.join(folder))
    }

    fn ensure_session_dir(&mut self) -> Result<PathBuf> {
        if self.session_folder.is_none() {
            let now: DateTime<Local> = Local::now();
            self.session_folder = Some(format!("session_{}", now.format("%Y%m%d_%H%M%S")));
            self.photo_counter = 0;
        }

        let session_dir = self.session_dir()
            .context("Session folder missing after initialization")?;
        std::fs::create_dir_all(&session_dir)
            .with_context(|| format!("Failed to create session directory {}", session_dir.display()))?;
        Ok(session_dir)
    }
}

fn write_jpeg(photo: &RgbImage, path: &Path, quality: u8) -> std::result::Result<(), CaptureError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality);
    encoder.encode(photo.as_raw(), photo.width(), photo.height(), ColorType::Rgb8)?;
    writer.flush()?;
    Ok(())
}

#[async_trait::async_trait]
impl CaptureCommitter for DirectoryCommitter {
    async fn commit(&mut self, photo: RgbImage) -> Result<PathBuf> {
        let session_dir = self.ensure_session_dir()?;

        self.photo_counter += 1;
        let path = session_dir.join(format!("photo_{:03}.jpg", self.photo_counter));

        write_jpeg(&photo, &path, self.quality)
            .with_context(|| format!("Failed to save photo to {}", path.display()))?;

        log::info!("Photo saved to {} ({}x{})", path.display(), photo.width(), photo.height());
        Ok(path)
    }
}
