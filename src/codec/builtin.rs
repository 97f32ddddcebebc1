//! Built-in encoders.
//!
//! Raster formats go through `image` (decode + JPEG/PNG/ICO/WebP encode) and
//! `ravif` (AVIF). SVG is re-serialized by `usvg`.

use image::codecs::ico::IcoEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};

use super::{CodecError, CodecId, CodecOptions};

/// Largest edge an ICO entry may have.
const ICO_MAX_EDGE: u32 = 256;

fn decode(input: &[u8]) -> Result<DynamicImage, CodecError> {
    image::load_from_memory(input).map_err(CodecError::Decode)
}

pub fn encode_jpeg(input: &[u8], options: &CodecOptions) -> Result<Vec<u8>, CodecError> {
    let quality = options.quality()?.unwrap_or(80);
    let rgb = decode(input)?.to_rgb8();

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(|e| CodecError::encode(CodecId::Jpeg, e))?;
    Ok(out)
}

/// Lossy PNG: an alpha channel that is fully opaque is dropped.
pub fn encode_png(input: &[u8], _options: &CodecOptions) -> Result<Vec<u8>, CodecError> {
    let img = decode(input)?;
    let img = if img.color().has_alpha() && is_opaque(&img) {
        DynamicImage::ImageRgb8(img.to_rgb8())
    } else {
        img
    };
    write_png(&img, CodecId::Png)
}

pub fn encode_png_lossless(input: &[u8], _options: &CodecOptions) -> Result<Vec<u8>, CodecError> {
    write_png(&decode(input)?, CodecId::PngLossless)
}

fn write_png(img: &DynamicImage, codec: CodecId) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut out, CompressionType::Best, FilterType::Adaptive);
    img.write_with_encoder(encoder)
        .map_err(|e| CodecError::encode(codec, e))?;
    Ok(out)
}

fn is_opaque(img: &DynamicImage) -> bool {
    img.to_rgba8().pixels().all(|p| p[3] == u8::MAX)
}

pub fn encode_ico(input: &[u8], _options: &CodecOptions) -> Result<Vec<u8>, CodecError> {
    let img = decode(input)?;
    let img = if img.width() > ICO_MAX_EDGE || img.height() > ICO_MAX_EDGE {
        img.thumbnail(ICO_MAX_EDGE, ICO_MAX_EDGE)
    } else {
        img
    };
    let rgba = img.to_rgba8();

    let mut out = Vec::new();
    IcoEncoder::new(&mut out)
        .write_image(rgba.as_raw(), rgba.width(), rgba.height(), ExtendedColorType::Rgba8)
        .map_err(|e| CodecError::encode(CodecId::Ico, e))?;
    Ok(out)
}

/// Lossless WebP. `quality` is accepted but has no effect on this encoder.
pub fn encode_webp(input: &[u8], options: &CodecOptions) -> Result<Vec<u8>, CodecError> {
    options.quality()?;
    let rgba = decode(input)?.to_rgba8();

    let mut out = Vec::new();
    WebPEncoder::new_lossless(&mut out)
        .write_image(rgba.as_raw(), rgba.width(), rgba.height(), ExtendedColorType::Rgba8)
        .map_err(|e| CodecError::encode(CodecId::Webp, e))?;
    Ok(out)
}

pub fn encode_avif(input: &[u8], options: &CodecOptions) -> Result<Vec<u8>, CodecError> {
    let quality = options.quality()?.unwrap_or(60);
    let speed = options.u8_in("speed", 1..=10)?.unwrap_or(6);
    let alpha_quality = options.u8_in("alphaQuality", 1..=100)?.unwrap_or(quality);

    let rgba = decode(input)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    let pixels: Vec<ravif::RGBA8> = rgba
        .pixels()
        .map(|p| ravif::RGBA8::new(p[0], p[1], p[2], p[3]))
        .collect();

    let encoded = ravif::Encoder::new()
        .with_quality(f32::from(quality))
        .with_alpha_quality(f32::from(alpha_quality))
        .with_speed(speed)
        .encode_rgba(ravif::Img::new(
            pixels.as_slice(),
            width as usize,
            height as usize,
        ))
        .map_err(|e| CodecError::encode(CodecId::Avif, e.to_string()))?;
    Ok(encoded.avif_file)
}

pub fn encode_svg(input: &[u8], options: &CodecOptions) -> Result<Vec<u8>, CodecError> {
    let precision = options.u8_in("precision", 0..=8)?.unwrap_or(3);

    let tree =
        usvg::Tree::from_data(input, &usvg::Options::default()).map_err(CodecError::Svg)?;

    let write_options = usvg::WriteOptions {
        indent: usvg::Indent::None,
        coordinates_precision: precision,
        transforms_precision: precision,
        ..Default::default()
    };
    Ok(tree.to_string(&write_options).into_bytes())
}
