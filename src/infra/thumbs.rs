//! Lazy thumbnail generation.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader};
use tempfile::NamedTempFile;
use time::OffsetDateTime;
use tracing::debug;

const JPEG_QUALITY: u8 = 85;

/// Generate `thumb_path` from `photo_path` unless a thumbnail newer than
/// `modified_at` already exists. The output is a quality-85 JPEG whose
/// longer dimension is `target_size`, written atomically. Returns whether
/// a file was written, so bulk regeneration can count its work.
pub fn ensure_thumbnail(
    photo_path: &Path,
    thumb_path: &Path,
    target_size: u32,
    modified_at: OffsetDateTime,
) -> Result<bool> {
    if is_fresh(thumb_path, modified_at) {
        return Ok(false);
    }

    let parent = thumb_path
        .parent()
        .context("thumbnail path has no parent directory")?;
    fs::create_dir_all(parent)
        .with_context(|| format!("cannot create {}", parent.display()))?;

    let reader = ImageReader::open(photo_path)
        .with_context(|| format!("cannot open {}", photo_path.display()))?
        .with_guessed_format()
        .with_context(|| format!("cannot probe {}", photo_path.display()))?;
    let mut decoder = reader
        .into_decoder()
        .with_context(|| format!("cannot decode {}", photo_path.display()))?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let image = DynamicImage::from_decoder(decoder)
        .with_context(|| format!("cannot decode {}", photo_path.display()))?;

    let image = exif_rotate(image, orientation);
    let thumbnail = image.resize(target_size, target_size, FilterType::Lanczos3);

    let mut tmp = NamedTempFile::new_in(parent)?;
    JpegEncoder::new_with_quality(&mut tmp, JPEG_QUALITY)
        .encode_image(&thumbnail.to_rgb8())
        .context("cannot encode thumbnail")?;
    tmp.persist(thumb_path).map_err(|err| err.error)?;

    debug!(path = %thumb_path.display(), "thumbnail written");
    Ok(true)
}

fn is_fresh(thumb_path: &Path, modified_at: OffsetDateTime) -> bool {
    let Ok(metadata) = fs::metadata(thumb_path) else {
        return false;
    };
    let Ok(mtime) = metadata.modified() else {
        return false;
    };
    mtime >= SystemTime::from(modified_at)
}

/// Upright an image per its EXIF orientation tag. Only the pure rotations
/// (tags 3, 6 and 8) are corrected; mirrored orientations and images
/// without EXIF pass through untouched.
pub fn exif_rotate(image: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Rotate180 => image.rotate180(),
        Orientation::Rotate90 => image.rotate90(),
        Orientation::Rotate270 => image.rotate270(),
        _ => image,
    }
}

/// Decode just enough of an uploaded image to learn its pixel dimensions.
pub fn probe_image(data: &[u8]) -> Result<(u32, u32)> {
    let image = image::load_from_memory(data).context("unsupported or corrupt image data")?;
    Ok((image.width(), image.height()))
}
