use std::io::Cursor;
use std::sync::Arc;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};

use crate::error::{Error, Result};
use crate::http::Fetch;

/// Longest side of a preview, in pixels.
pub const PREVIEW_MAX_SIDE: u32 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub width: u32,
    pub height: u32,
    /// PNG-encoded preview.
    pub preview_bytes: Vec<u8>,
}

/// Downloads a candidate, reads its true dimensions and renders a bounded
/// PNG preview in memory.
#[derive(Clone)]
pub struct ImageProcessor {
    fetch: Arc<dyn Fetch>,
    max_side: u32,
}

impl ImageProcessor {
    pub fn new(fetch: Arc<dyn Fetch>) -> Self {
        Self {
            fetch,
            max_side: PREVIEW_MAX_SIDE,
        }
    }

    pub fn process(&self, url: &str) -> Result<Preview> {
        let bytes = self.fetch.get_bytes(url)?;
        let image = image::load_from_memory(&bytes).map_err(|e| Error::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let (width, height) = (image.width(), image.height());
        let preview_bytes = encode_preview(&image, self.max_side).map_err(|e| Error::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Preview {
            width,
            height,
            preview_bytes,
        })
    }
}

/// Dimensions that fit `max_side` while keeping the aspect ratio. Images that
/// already fit are returned unchanged.
pub fn preview_size(width: u32, height: u32, max_side: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_side {
        return (width, height);
    }
    let scale = |side: u32| {
        let scaled = (u64::from(side) * u64::from(max_side) + u64::from(longest) / 2)
            / u64::from(longest);
        (scaled as u32).clamp(1, max_side)
    };
    (scale(width), scale(height))
}

fn encode_preview(image: &DynamicImage, max_side: u32) -> image::ImageResult<Vec<u8>> {
    let (width, height) = preview_size(image.width(), image.height(), max_side);
    let mut buffer = Cursor::new(Vec::new());
    if (width, height) == (image.width(), image.height()) {
        image.write_to(&mut buffer, ImageFormat::Png)?;
    } else {
        image
            .resize_exact(width, height, FilterType::Triangle)
            .write_to(&mut buffer, ImageFormat::Png)?;
    }
    Ok(buffer.into_inner())
}
