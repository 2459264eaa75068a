//! Captured frames and the image payload they carry.

use crate::error::{Result, SightError};
use image::{DynamicImage, ImageFormat, ImageReader, RgbImage};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

/// An encoded image ready to hand to the captioning service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    /// Encoded image bytes (PNG or JPEG).
    pub bytes: Vec<u8>,
    /// MIME type matching `bytes`.
    pub content_type: String,
    /// Pixel dimensions, when known.
    pub dimensions: Option<(u32, u32)>,
}

impl ImageData {
    /// Wraps already-encoded bytes without inspecting them.
    pub fn new(bytes: Vec<u8>, content_type: &str) -> Self {
        Self {
            bytes,
            content_type: content_type.to_string(),
            dimensions: None,
        }
    }

    /// Wraps an uploaded photo, detecting its format from the magic bytes.
    ///
    /// Only PNG and JPEG are accepted.
    pub fn from_encoded(bytes: Vec<u8>) -> Result<Self> {
        let format = image::guess_format(&bytes)?;
        let content_type = mime_for(format)?;
        let dimensions = ImageReader::with_format(Cursor::new(&bytes), format).into_dimensions()?;
        Ok(Self {
            bytes,
            content_type: content_type.to_string(),
            dimensions: Some(dimensions),
        })
    }

    /// Encodes a decoded RGB8 camera frame as PNG.
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        let actual = pixels.len();
        let rgb = RgbImage::from_raw(width, height, pixels).ok_or_else(|| {
            SightError::UnsupportedImage {
                message: format!("expected {expected} RGB bytes for {width}x{height}, got {actual}"),
            }
        })?;

        let mut encoded = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(rgb).write_to(&mut encoded, ImageFormat::Png)?;

        Ok(Self {
            bytes: encoded.into_inner(),
            content_type: "image/png".to_string(),
            dimensions: Some((width, height)),
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn mime_for(format: ImageFormat) -> Result<&'static str> {
    match format {
        ImageFormat::Png => Ok("image/png"),
        ImageFormat::Jpeg => Ok("image/jpeg"),
        other => Err(SightError::UnsupportedImage {
            message: format!("{other:?} (expected PNG or JPEG)"),
        }),
    }
}

/// One image sample from the camera, with its arrival time.
///
/// Cheap to clone: the image payload is shared.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub image: Arc<ImageData>,
    /// Arrival offset from the start of the session.
    pub timestamp: Duration,
    /// Sequence number assigned by the source.
    pub sequence: u64,
}

impl Frame {
    pub fn new(image: ImageData, timestamp: Duration, sequence: u64) -> Self {
        Self {
            image: Arc::new(image),
            timestamp,
            sequence,
        }
    }
}
