//! Raster image routines: decode, normalise, re-encode.
//!
//! Decoding is strict about the declared source kind: bytes declared as PNG
//! must decode as PNG. `FileKind::Image` accepts anything the decoder can
//! sniff. Every image is brought to an 8-bit color model before encoding;
//! JPEG has no alpha channel, so transparent pixels are composited onto
//! white first.

use super::Job;
use crate::error::ConvertError;
use crate::kind::FileKind;
use crate::output::OutputFile;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, ImageReader, RgbImage};
use std::io::Cursor;
use tracing::debug;

/// PNG ↔ JPG, WebP → PNG, PNG → WebP, GIF → PNG.
pub fn convert_image(job: &Job<'_>) -> Result<Vec<OutputFile>, ConvertError> {
    let img = decode(job.bytes, job.source)?;
    let bytes = encode(&img, job.target, job.config.jpeg_quality)?;
    Ok(job.single(bytes))
}

/// Decode `bytes` as `kind`. GIF sources yield their first frame.
pub fn decode(bytes: &[u8], kind: FileKind) -> Result<DynamicImage, ConvertError> {
    if !kind.is_image() {
        return Err(ConvertError::unreadable(kind, "not a raster image kind"));
    }
    let cursor = Cursor::new(bytes);
    let reader = match image_format(kind) {
        Some(format) => ImageReader::with_format(cursor, format),
        None => ImageReader::new(cursor)
            .with_guessed_format()
            .map_err(|e| ConvertError::unreadable(kind, e))?,
    };
    if reader.format().is_none() {
        return Err(ConvertError::unreadable(kind, "unrecognised image format"));
    }

    let img = reader.decode().map_err(|e| ConvertError::unreadable(kind, e))?;
    debug!(
        "Decoded {} image {}x{} ({:?})",
        kind,
        img.width(),
        img.height(),
        img.color()
    );
    Ok(img)
}

/// Encode `img` as `target`.
pub fn encode(img: &DynamicImage, target: FileKind, jpeg_quality: u8) -> Result<Vec<u8>, ConvertError> {
    let mut buf = Vec::new();
    let result = match target {
        FileKind::Jpg | FileKind::PageImages => {
            let rgb = flatten(img);
            JpegEncoder::new_with_quality(&mut buf, jpeg_quality).encode_image(&rgb)
        }
        FileKind::Png => to_8bit(img).write_to(&mut Cursor::new(&mut buf), ImageFormat::Png),
        FileKind::Webp => to_8bit(img).write_to(&mut Cursor::new(&mut buf), ImageFormat::WebP),
        other => {
            return Err(ConvertError::encoding(other, "not a raster image format"));
        }
    };
    result.map_err(|e| ConvertError::encoding(target, e))?;

    debug!("Encoded {} → {} bytes", target, buf.len());
    Ok(buf)
}

/// Composite onto an opaque white base and drop the alpha channel.
pub fn flatten(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (src, dst) in rgba.pixels().zip(out.pixels_mut()) {
        let [r, g, b, a] = src.0;
        let a = u32::from(a);
        let blend = |c: u8| ((u32::from(c) * a + 255 * (255 - a) + 127) / 255) as u8;
        dst.0 = [blend(r), blend(g), blend(b)];
    }
    out
}

/// RGB8 or RGBA8, keeping alpha only when the source has it.
fn to_8bit(img: &DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => img.clone(),
        other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

fn image_format(kind: FileKind) -> Option<ImageFormat> {
    match kind {
        FileKind::Png => Some(ImageFormat::Png),
        FileKind::Jpg => Some(ImageFormat::Jpeg),
        FileKind::Webp => Some(ImageFormat::WebP),
        FileKind::Gif => Some(ImageFormat::Gif),
        _ => None,
    }
}
