//! Multipart upload bodies and image shrinking.
//!
//! Phone photos are routinely 4000px wide. Before a photo goes out in a
//! multipart body it is scaled down to at most `MAX_UPLOAD_WIDTH` and
//! re-encoded as JPEG.

use std::path::Path;

use anyhow::{Context, Result};
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, GenericImageView, ImageFormat};
use tracing::debug;

/// Widest image sent to the backend
pub const MAX_UPLOAD_WIDTH: u32 = 1024;

/// JPEG quality used when re-encoding
pub const JPEG_QUALITY: u8 = 80;

#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read image: {}", path.display()))?;
        let content_type = ImageFormat::from_path(path)
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_else(|_| "application/octet-stream".to_string());
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        Ok(Self {
            file_name,
            content_type,
            bytes,
        })
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// Height that keeps the aspect ratio when `width` is scaled to `target_width`
fn scaled_height(width: u32, height: u32, target_width: u32) -> u32 {
    let scaled = (f64::from(height) * f64::from(target_width) / f64::from(width)).round();
    (scaled as u32).max(1)
}

/// Shrink an image wider than [`MAX_UPLOAD_WIDTH`] and re-encode it as JPEG.
/// Narrower images are returned untouched.
pub fn shrink_for_upload(upload: ImageUpload) -> Result<ImageUpload> {
    let img = image::load_from_memory(&upload.bytes)
        .with_context(|| format!("Failed to decode image: {}", upload.file_name))?;

    let (width, height) = img.dimensions();
    if width <= MAX_UPLOAD_WIDTH {
        debug!(width, height, "Image within upload width, sending as is");
        return Ok(upload);
    }

    let new_height = scaled_height(width, height, MAX_UPLOAD_WIDTH);
    let resized = img.resize_exact(MAX_UPLOAD_WIDTH, new_height, FilterType::Triangle);

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
        .encode_image(&resized.to_rgb8())
        .context("Failed to encode resized image")?;

    debug!(
        from = %format!("{}x{}", width, height),
        to = %format!("{}x{}", MAX_UPLOAD_WIDTH, new_height),
        size = bytes.len(),
        "Shrunk image for upload"
    );

    let file_name = Path::new(&upload.file_name)
        .with_extension("jpg")
        .to_string_lossy()
        .into_owned();

    Ok(ImageUpload {
        file_name,
        content_type: "image/jpeg".to_string(),
        bytes,
    })
}
