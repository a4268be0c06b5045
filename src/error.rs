//! Error types for the capture core.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    /// The video source has not reported frame dimensions yet
    #[error("Video source not ready")]
    SourceNotReady,

    /// The video stream ended or was muted
    #[error("Video stream lost")]
    SourceLost,

    /// Encoding a captured photo failed
    #[error("Encoding error: {0}")]
    Encode(#[from] image::ImageError),

    /// Writing a captured photo failed
    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CaptureResult<T> = std::result::Result<T, CaptureError>;
