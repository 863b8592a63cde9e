//! Client-side image compression before upload.
//!
//! Compression is best effort: every failure path hands back the original
//! blob so an upload is never blocked by the encoder.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::{debug, warn};
use crate::core::FileBlob;
use crate::utils::format_bytes;

/// Inputs smaller than this are uploaded as-is
pub const MIN_COMPRESS_BYTES: u64 = 500 * 1024;
/// Longest edge after resizing
pub const MAX_DIMENSION: u32 = 1920;
/// Output size the encoder aims for
pub const TARGET_BYTES: u64 = 1_258_291; // 1.2 MiB

const QUALITY_STEPS: [u8; 5] = [90, 80, 70, 60, 50];

#[derive(Debug, Clone)]
pub struct CompressionOptions {
    pub min_bytes: u64,
    pub max_dimension: u32,
    pub target_bytes: u64,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            min_bytes: MIN_COMPRESS_BYTES,
            max_dimension: MAX_DIMENSION,
            target_bytes: TARGET_BYTES,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Compressor {
    options: CompressionOptions,
}

impl Compressor {
    pub fn new(options: CompressionOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompressionOptions {
        &self.options
    }

    /// Compress on the blocking pool. Always resolves to a blob.
    pub async fn compress(&self, file: FileBlob) -> FileBlob {
        if !self.should_compress(&file) {
            return file;
        }

        let compressor = self.clone();
        let original = file.clone();
        match tokio::task::spawn_blocking(move || compressor.compress_blocking(file)).await {
            Ok(compressed) => compressed,
            Err(err) => {
                warn!(error = %err, name = %original.name, "compression task failed, using original");
                original
            }
        }
    }

    pub fn should_compress(&self, file: &FileBlob) -> bool {
        file.is_image() && file.size() >= self.options.min_bytes
    }

    pub fn compress_blocking(&self, file: FileBlob) -> FileBlob {
        if !self.should_compress(&file) {
            return file;
        }

        match self.reencode(&file) {
            Ok(Some(data)) => {
                debug!(
                    name = %file.name,
                    before = %format_bytes(file.size()),
                    after = %format_bytes(data.len() as u64),
                    "image compressed"
                );
                FileBlob {
                    name: jpeg_file_name(&file.name),
                    content_type: "image/jpeg".to_string(),
                    data: Bytes::from(data),
                }
            }
            Ok(None) => {
                debug!(name = %file.name, "re-encoding did not shrink image, keeping original");
                file
            }
            Err(err) => {
                warn!(name = %file.name, error = %err, "image compression failed, using original");
                file
            }
        }
    }

    /// `Ok(None)` when the best encoding is not smaller than the input
    fn reencode(&self, file: &FileBlob) -> image::ImageResult<Option<Vec<u8>>> {
        let decoded = image::load_from_memory(&file.data)?;
        let resized = self.fit(decoded);
        let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());

        let mut best: Option<Vec<u8>> = None;
        for quality in QUALITY_STEPS {
            let mut buffer = Vec::new();
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, quality))?;

            let fits = buffer.len() as u64 <= self.options.target_bytes;
            if best.as_ref().map_or(true, |b| buffer.len() < b.len()) {
                best = Some(buffer);
            }
            if fits {
                break;
            }
        }

        Ok(best.filter(|data| (data.len() as u64) < file.size()))
    }

    fn fit(&self, image: DynamicImage) -> DynamicImage {
        let (width, height) = fit_within(image.width(), image.height(), self.options.max_dimension);
        if (width, height) == (image.width(), image.height()) {
            image
        } else {
            image.resize_exact(width, height, FilterType::Lanczos3)
        }
    }
}

/// Scale `width`x`height` so the longer edge is at most `max_edge`. Never upscales.
pub fn fit_within(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longer = width.max(height);
    if longer <= max_edge || longer == 0 {
        return (width, height);
    }

    let scale = max_edge as f64 / longer as f64;
    let scaled = |edge: u32| ((edge as f64 * scale).round() as u32).max(1);
    if width >= height {
        (max_edge, scaled(height))
    } else {
        (scaled(width), max_edge)
    }
}

fn jpeg_file_name(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => format!("{}.jpg", stem),
        _ => format!("{}.jpg", name),
    }
}
