//! Still capture for cloud descriptions

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::fmt::Debug;
use std::io::Cursor;
use tracing::debug;

/// An encoded still frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl CapturedImage {
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: "image/jpeg".to_string(),
        }
    }
}

/// Captures a single frame, scaled so its longest side fits `max_dimension`
#[async_trait]
pub trait Camera: Send + Sync + Debug {
    async fn capture(&self, max_dimension: u32) -> Result<CapturedImage>;
}

/// Target size for a frame whose longest side must not exceed `max_dimension`.
/// Aspect ratio is preserved; frames that already fit are left alone.
pub fn scaled_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width == 0 || height == 0 || width.max(height) <= max_dimension {
        return (width, height);
    }

    if width > height {
        let scaled = (max_dimension as u64 * height as u64 / width as u64) as u32;
        (max_dimension, scaled.max(1))
    } else {
        let scaled = (max_dimension as u64 * width as u64 / height as u64) as u32;
        (scaled.max(1), max_dimension)
    }
}

/// Decode an encoded still and shrink it so its longest side fits
/// `max_dimension`. PNG stays PNG; everything else is re-encoded as JPEG.
/// Frames that already fit are returned untouched.
pub fn downscale(bytes: &[u8], max_dimension: u32) -> Result<CapturedImage> {
    let format = image::guess_format(bytes).context("unrecognised image data")?;
    let mime_type = match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        other => bail!("unsupported image format {:?}", other),
    };
    let img = image::load_from_memory_with_format(bytes, format).context("could not decode image")?;

    let (width, height) = (img.width(), img.height());
    let (target_w, target_h) = scaled_dimensions(width, height, max_dimension);
    if (target_w, target_h) == (width, height) {
        return Ok(CapturedImage {
            bytes: bytes.to_vec(),
            mime_type: mime_type.to_string(),
        });
    }

    debug!("📷 Scaling {}x{} frame to {}x{}", width, height, target_w, target_h);
    let resized = img.resize_exact(target_w, target_h, FilterType::Triangle);
    let mut out = Vec::new();
    let written = match format {
        ImageFormat::Png => resized.write_to(&mut Cursor::new(&mut out), ImageFormat::Png),
        _ => DynamicImage::ImageRgb8(resized.to_rgb8())
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg),
    };
    written.context("could not encode scaled image")?;

    Ok(CapturedImage {
        bytes: out,
        mime_type: mime_type.to_string(),
    })
}
