//! Product image normalization
//!
//! Uploads are decoded, rotated upright from their EXIF orientation, flattened
//! onto white, center-cropped to a square, resized and stored as WebP.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use chrono::Local;
use image::codecs::webp::WebPEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageDecoder, ImageReader, Rgb, RgbImage};
use thiserror::Error;

/// Supported upload extensions
pub const SUPPORTED_FORMATS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Public URL prefix under which stored thumbnails are served.
pub const PUBLIC_PREFIX: &str = "/static/uploads";

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Unsupported image format '{0}'. Use PNG/JPG/JPEG/WEBP.")]
    UnsupportedFormat(String),

    #[error("Invalid image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Failed to store image: {0}")]
    Io(#[from] std::io::Error),
}

/// Lowercased extension of `filename` if it is an accepted upload format.
pub fn allowed_extension(filename: &str) -> Result<String, ImageError> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    if SUPPORTED_FORMATS.contains(&ext.as_str()) { Ok(ext) } else { Err(ImageError::UnsupportedFormat(ext)) }
}

/// Decode `data` and return a `side × side` lossless WebP.
pub fn normalize_thumbnail(data: &[u8], side: u32) -> Result<Vec<u8>, ImageError> {
    let mut decoder = ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .into_decoder()
        .map_err(ImageError::Decode)?;
    let orientation = decoder.orientation().map_err(ImageError::Decode)?;
    let mut img = DynamicImage::from_decoder(decoder).map_err(ImageError::Decode)?;
    img.apply_orientation(orientation);

    let rgb = flatten_on_white(&img);
    let (w, h) = rgb.dimensions();
    let edge = w.min(h);
    let square = imageops::crop_imm(&rgb, (w - edge) / 2, (h - edge) / 2, edge, edge).to_image();
    let resized = imageops::resize(&square, side, side, FilterType::Lanczos3);

    let mut buffer = Vec::new();
    resized
        .write_with_encoder(WebPEncoder::new_lossless(&mut buffer))
        .map_err(ImageError::Encode)?;
    Ok(buffer)
}

fn flatten_on_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let a = u32::from(a);
        let blend = |c: u8| ((u32::from(c) * a + 255 * (255 - a) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// `<sanitized stem>_<YYYYmmdd_HHMMSS>.webp`
pub fn unique_webp_name(original_filename: &str) -> String {
    let stem = Path::new(original_filename).file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let mut base: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect::<String>()
        .trim_matches('_')
        .to_string();
    if base.is_empty() {
        base = "img".to_string();
    }
    format!("{base}_{}.webp", Local::now().format("%Y%m%d_%H%M%S"))
}

/// Validate, normalize and write an upload into `dir`, returning its public URL.
pub fn save_upload(dir: &Path, original_filename: &str, data: &[u8], side: u32) -> Result<String, ImageError> {
    allowed_extension(original_filename)?;
    let webp = normalize_thumbnail(data, side)?;
    std::fs::create_dir_all(dir)?;
    let name = free_name(dir, &unique_webp_name(original_filename));
    std::fs::write(dir.join(&name), webp)?;
    tracing::info!(file = %name, "Stored product image");
    Ok(format!("{PUBLIC_PREFIX}/{name}"))
}

/// `name`, or `name` with a `_<n>` suffix when two uploads land in the same second.
fn free_name(dir: &Path, name: &str) -> String {
    let stem = name.trim_end_matches(".webp");
    let mut candidate = name.to_string();
    let mut n = 1;
    while dir.join(&candidate).exists() {
        candidate = format!("{stem}_{n}.webp");
        n += 1;
    }
    candidate
}

/// File behind a public upload URL; `None` for URLs outside the upload prefix.
pub fn upload_path(dir: &Path, url: &str) -> Option<PathBuf> {
    let name = url.strip_prefix(PUBLIC_PREFIX)?.strip_prefix('/')?;
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return None;
    }
    Some(dir.join(name))
}

/// Delete a stored thumbnail. Missing files are ignored.
pub async fn remove_upload(dir: &Path, url: &str) {
    let Some(path) = upload_path(dir, url) else { return };
    match tokio::fs::remove_file(&path).await {
        Ok(()) => tracing::info!(file = %path.display(), "Removed product image"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(file = %path.display(), error = %e, "Failed to remove product image"),
    }
}
