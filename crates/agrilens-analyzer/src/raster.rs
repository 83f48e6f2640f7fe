//! Raster intake: decoding, raw-buffer wrapping, and validity checks.
//!
//! Accepts either encoded image bytes (PNG, JPEG, BMP, WebP) or an
//! already-decoded 8-bit buffer with explicit dimensions, and produces an
//! [`RgbImage`] the feature extractor can consume.
//!
//! This is the first step in the pipeline: bytes in, validated RGB out.

use crate::types::{InvalidImageError, RgbImage};

/// Decode raw image bytes into an RGB raster.
///
/// Alpha is discarded. Validity (size, degenerate data) is checked
/// separately by [`validate`], which the analyzer runs on every input.
///
/// # Errors
///
/// Returns [`InvalidImageError::EmptyInput`] if `bytes` is empty.
/// Returns [`InvalidImageError::Decode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<RgbImage, InvalidImageError> {
    if bytes.is_empty() {
        return Err(InvalidImageError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgb8())
}

/// Wrap a raw 8-bit raster with explicit dimensions and channel count.
///
/// `channels` must be 3 (RGB) or 4 (RGBA, alpha dropped). Rows are
/// expected tightly packed, top to bottom.
///
/// # Errors
///
/// Returns [`InvalidImageError::UnsupportedChannels`] for any other
/// channel count, [`InvalidImageError::TooLarge`] if the byte count
/// overflows `usize`, and [`InvalidImageError::BufferMismatch`] if `data`
/// does not hold exactly `width * height * channels` bytes.
pub fn from_raw(
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
) -> Result<RgbImage, InvalidImageError> {
    if channels != 3 && channels != 4 {
        return Err(InvalidImageError::UnsupportedChannels(channels));
    }
    let expected = usize::try_from(width)
        .ok()
        .zip(usize::try_from(height).ok())
        .and_then(|(w, h)| w.checked_mul(h))
        .and_then(|n| n.checked_mul(usize::from(channels)))
        .ok_or(InvalidImageError::TooLarge {
            width,
            height,
            channels,
        })?;
    if data.len() != expected {
        return Err(InvalidImageError::BufferMismatch {
            width,
            height,
            expected,
            actual: data.len(),
        });
    }

    let rgb = if channels == 4 {
        data.chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect()
    } else {
        data
    };

    RgbImage::from_raw(width, height, rgb).ok_or(InvalidImageError::BufferMismatch {
        width,
        height,
        expected,
        actual: expected,
    })
}

/// Reject rasters that cannot yield a meaningful analysis.
///
/// # Errors
///
/// Returns [`InvalidImageError::TooSmall`] if either side is below
/// `min_dimension`, [`InvalidImageError::AllZero`] for an all-black
/// raster, and [`InvalidImageError::AllSaturated`] when every channel is
/// 255.
pub fn validate(image: &RgbImage, min_dimension: u32) -> Result<(), InvalidImageError> {
    let (width, height) = image.dimensions();
    if width < min_dimension || height < min_dimension {
        return Err(InvalidImageError::TooSmall {
            width,
            height,
            min: min_dimension,
        });
    }

    let raw = image.as_raw();
    if raw.iter().all(|&b| b == 0) {
        return Err(InvalidImageError::AllZero);
    }
    if raw.iter().all(|&b| b == u8::MAX) {
        return Err(InvalidImageError::AllSaturated);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Encode an RGB image as PNG bytes.
    fn encode_png(img: &RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        let result = decode(&[]);
        assert!(matches!(result, Err(InvalidImageError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_decode_error() {
        let result = decode(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(InvalidImageError::Decode(_))));
    }

    #[test]
    fn valid_png_round_trips_pixels() {
        let img = RgbImage::from_fn(17, 31, |x, y| image::Rgb([x as u8, y as u8, 99]));
        let decoded = decode(&encode_png(&img)).unwrap();
        assert_eq!(decoded.dimensions(), (17, 31));
        assert_eq!(decoded.get_pixel(3, 5).0, [3, 5, 99]);
    }

    #[test]
    fn from_raw_rgba_drops_alpha() {
        let data = vec![10, 20, 30, 255, 40, 50, 60, 0];
        let img = from_raw(2, 1, 4, data).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [10, 20, 30]);
        assert_eq!(img.get_pixel(1, 0).0, [40, 50, 60]);
    }

    #[test]
    fn from_raw_rejects_bad_channel_count() {
        let result = from_raw(2, 2, 1, vec![0; 4]);
        assert!(matches!(result, Err(InvalidImageError::UnsupportedChannels(1))));
    }

    #[test]
    fn from_raw_rejects_short_buffer() {
        let result = from_raw(4, 4, 3, vec![0; 47]);
        assert!(matches!(
            result,
            Err(InvalidImageError::BufferMismatch {
                expected: 48,
                actual: 47,
                ..
            })
        ));
    }

    #[test]
    fn from_raw_rejects_overflowing_dimensions() {
        let result = from_raw(u32::MAX, u32::MAX, 4, vec![0; 16]);
        assert!(matches!(
            result,
            Err(InvalidImageError::TooLarge {
                width: u32::MAX,
                height: u32::MAX,
                channels: 4
            })
        ));
    }

    #[test]
    fn validate_rejects_small_images() {
        let img = RgbImage::from_pixel(63, 128, image::Rgb([40, 120, 40]));
        let result = validate(&img, 64);
        assert!(matches!(
            result,
            Err(InvalidImageError::TooSmall {
                width: 63,
                height: 128,
                min: 64
            })
        ));
    }

    #[test]
    fn validate_rejects_black_and_saturated() {
        let black = RgbImage::new(64, 64);
        assert!(matches!(validate(&black, 64), Err(InvalidImageError::AllZero)));

        let white = RgbImage::from_pixel(64, 64, image::Rgb([255, 255, 255]));
        assert!(matches!(
            validate(&white, 64),
            Err(InvalidImageError::AllSaturated)
        ));
    }

    #[test]
    fn validate_accepts_mostly_black_image() {
        let mut img = RgbImage::new(64, 64);
        img.put_pixel(10, 10, image::Rgb([0, 1, 0]));
        assert!(validate(&img, 64).is_ok());
    }
}
