//! Encoded image to wire pixmap.

use image::ImageError;
use trayline_protocol::IconPixmap;

#[derive(Debug, thiserror::Error)]
pub enum IconError {
    #[error("failed to decode icon: {0}")]
    Decode(#[from] ImageError),

    #[error("icon too large: {width}x{height}")]
    TooLarge { width: u32, height: u32 },
}

/// Decodes an encoded raster image into a pixmap.
///
/// The buffer holds one big-endian ARGB group per pixel, rows top to
/// bottom, pixels left to right, every channel widened or narrowed to 8
/// bits. Empty input gives an empty pixmap.
pub fn pixmap_from_bytes(data: &[u8]) -> Result<IconPixmap, IconError> {
    if data.is_empty() {
        return Ok(IconPixmap::default());
    }

    let rgba = image::load_from_memory(data)?.to_rgba8();
    let (w, h) = rgba.dimensions();
    let too_large = || IconError::TooLarge { width: w, height: h };
    let width = i32::try_from(w).map_err(|_| too_large())?;
    let height = i32::try_from(h).map_err(|_| too_large())?;

    let mut argb = Vec::with_capacity(rgba.as_raw().len());
    for px in rgba.pixels() {
        let [r, g, b, a] = px.0;
        argb.extend_from_slice(&[a, r, g, b]);
    }

    Ok(IconPixmap {
        width,
        height,
        data: argb,
    })
}
