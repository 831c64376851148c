//! Image decoding and re-encoding.
//!
//! Inbound images are decoded (which validates them) and scaled down when
//! they exceed the configured dimension or the inline payload limit, before
//! being sent to the model. Generated images are decoded and stored as PNG.

use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};

use crate::error::{Context, Result};

/// Default maximum dimension (width or height) for input images.
pub const DEFAULT_MAX_DIMENSION: u32 = 1568;

/// Inline request payloads above this size get re-encoded.
pub const MAX_INLINE_BYTES: usize = 5 * 1024 * 1024;

/// JPEG quality for resized images (0-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// A decoded input image, ready to be inlined in a generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputImage {
    pub data: Vec<u8>,
    /// MIME type of `data`.
    pub media_type: String,
    pub width: u32,
    pub height: u32,
    pub was_resized: bool,
}

/// Width, height and detected format, without a full decode.
pub fn get_image_metadata(data: &[u8]) -> Result<(u32, u32, Option<ImageFormat>)> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .context("failed to guess image format")?;
    let format = reader.format();
    let (width, height) = reader
        .into_dimensions()
        .context("failed to read image dimensions")?;
    Ok((width, height, format))
}

fn decode(data: &[u8]) -> Result<(DynamicImage, Option<ImageFormat>)> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .context("failed to guess image format")?;
    let format = reader.format();
    let img = reader.decode().context("failed to decode image")?;
    Ok((img, format))
}

/// Decode `data` and make it fit for a generation request.
///
/// Images within `max_dimension` and [`MAX_INLINE_BYTES`] keep their original
/// bytes. Larger ones are resized preserving aspect ratio and re-encoded:
/// PNG when they carry an alpha channel, JPEG otherwise.
pub fn prepare_input(data: &[u8], max_dimension: u32) -> Result<InputImage> {
    let (img, format) = decode(data)?;
    let (width, height) = img.dimensions();

    let needs_resize = width > max_dimension || height > max_dimension;
    if !needs_resize && data.len() <= MAX_INLINE_BYTES {
        return Ok(InputImage {
            data: data.to_vec(),
            media_type: format_to_media_type(format).to_string(),
            width,
            height,
            was_resized: false,
        });
    }

    let resized = if needs_resize {
        let ratio = (max_dimension as f64 / width as f64).min(max_dimension as f64 / height as f64);
        let new_width = ((width as f64 * ratio).round() as u32).max(1);
        let new_height = ((height as f64 * ratio).round() as u32).max(1);
        img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3)
    } else {
        img
    };
    let (final_width, final_height) = resized.dimensions();

    let (data, media_type) = if resized.color().has_alpha() {
        (encode_png(&resized)?, "image/png")
    } else {
        (encode_jpeg(&resized, DEFAULT_JPEG_QUALITY)?, "image/jpeg")
    };

    Ok(InputImage {
        data,
        media_type: media_type.to_string(),
        width: final_width,
        height: final_height,
        was_resized: true,
    })
}

/// Decode a generated image in any supported format and re-encode it as PNG.
pub fn to_png(data: &[u8]) -> Result<Vec<u8>> {
    let (img, _) = decode(data)?;
    encode_png(&img)
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut output = Cursor::new(Vec::new());
    img.write_to(&mut output, ImageFormat::Png)
        .context("failed to encode as PNG")?;
    Ok(output.into_inner())
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut output = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut output, quality);
    // JPEG has no alpha; flatten first so RGBA sources encode.
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .context("failed to encode as JPEG")?;
    Ok(output.into_inner())
}

/// Convert an `ImageFormat` to its MIME type.
pub fn format_to_media_type(format: Option<ImageFormat>) -> &'static str {
    match format {
        Some(ImageFormat::Jpeg) => "image/jpeg",
        Some(ImageFormat::Png) => "image/png",
        Some(ImageFormat::WebP) => "image/webp",
        Some(ImageFormat::Gif) => "image/gif",
        Some(ImageFormat::Bmp) => "image/bmp",
        _ => "image/jpeg",
    }
}


#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, test_support::*};

    #[test]
    fn metadata_reads_dimensions_and_format() {
        let (w, h, format) = get_image_metadata(&png(3, 2)).unwrap();
        assert_eq!((w, h), (3, 2));
        assert_eq!(format, Some(ImageFormat::Png));
    }

    #[test]
    fn small_image_keeps_original_bytes() {
        let data = png(4, 4);
        let img = prepare_input(&data, DEFAULT_MAX_DIMENSION).unwrap();
        assert!(!img.was_resized);
        assert_eq!(img.data, data);
        assert_eq!(img.media_type, "image/png");
    }

    #[test]
    fn large_image_is_scaled_to_fit() {
        let img = prepare_input(&png(400, 100), 200).unwrap();
        assert!(img.was_resized);
        assert_eq!((img.width, img.height), (200, 50));
        assert_eq!(img.media_type, "image/jpeg");
    }

    #[test]
    fn transparent_image_stays_png_when_scaled() {
        let img = prepare_input(&rgba_png(64, 64), 32).unwrap();
        assert!(img.was_resized);
        assert_eq!(img.media_type, "image/png");
        assert_eq!((img.width, img.height), (32, 32));
    }

    #[test]
    fn gif_and_bmp_inputs_decode() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            5,
            3,
            image::Rgb([1, 2, 3]),
        ));
        for (format, media_type) in [(ImageFormat::Gif, "image/gif"), (ImageFormat::Bmp, "image/bmp")]
        {
            let mut out = Cursor::new(Vec::new());
            img.write_to(&mut out, format).unwrap();
            let prepared = prepare_input(&out.into_inner(), DEFAULT_MAX_DIMENSION).unwrap();
            assert_eq!((prepared.width, prepared.height), (5, 3));
            assert_eq!(prepared.media_type, media_type);
            assert!(to_png(&prepared.data).is_ok());
        }
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = prepare_input(b"definitely not an image", 100).unwrap_err();
        assert!(err.to_string().contains("image"), "{err}");
    }

    #[test]
    fn to_png_reencodes() {
        let jpeg = prepare_input(&png(400, 100), 200).unwrap().data;
        let png_bytes = to_png(&jpeg).unwrap();
        let (.., format) = get_image_metadata(&png_bytes).unwrap();
        assert_eq!(format, Some(ImageFormat::Png));
    }

    #[test]
    fn media_type_mapping() {
        assert_eq!(format_to_media_type(Some(ImageFormat::Jpeg)), "image/jpeg");
        assert_eq!(format_to_media_type(Some(ImageFormat::WebP)), "image/webp");
        assert_eq!(format_to_media_type(None), "image/jpeg");
    }
}
