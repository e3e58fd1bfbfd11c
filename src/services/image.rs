//! Image Service
//!
//! Size variants and re-encoding for uploaded images.

use image::{imageops::FilterType, DynamicImage, ImageFormat as ImgFormat};

use crate::models::ImageVariant;
use crate::settings::{ImageSize, ImageSizes, MediaDoctorSettings};

/// Prefix of generated variant files and metadata keys
pub const VARIANT_PREFIX: &str = "smd_";

/// Image processing error
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),
}

/// Output encodings this service writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl OutputFormat {
    /// The encoding named by the file's extension; `None` for formats this
    /// service does not write
    pub fn for_filename(filename: &str) -> Option<Self> {
        match ImgFormat::from_path(filename).ok()? {
            ImgFormat::Jpeg => Some(Self::Jpeg),
            ImgFormat::Png => Some(Self::Png),
            ImgFormat::Gif => Some(Self::Gif),
            ImgFormat::WebP => Some(Self::WebP),
            _ => None,
        }
    }

    /// Formats whose re-encoding keeps every frame and pixel intact.
    /// GIF drops animation frames and WebP is only written losslessly.
    pub fn is_recompressible(&self) -> bool {
        matches!(self, Self::Jpeg | Self::Png)
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
        }
    }
}

/// Image service for processing
#[derive(Debug, Default, Clone)]
pub struct ImageService;

impl ImageService {
    pub fn new() -> Self {
        Self
    }

    /// One variant per configured size, named `smd_<size>_<filename>`.
    ///
    /// Cropped sizes are filled to the exact box; the rest keep their aspect
    /// ratio inside it.
    pub fn resize_variants(
        &self,
        data: &[u8],
        filename: &str,
        settings: &MediaDoctorSettings,
    ) -> Result<Vec<ImageVariant>, ImageError> {
        let format = OutputFormat::for_filename(filename)
            .ok_or_else(|| ImageError::UnsupportedFormat(filename.to_string()))?;
        let img = image::load_from_memory(data)?;

        let mut variants = Vec::with_capacity(ImageSizes::NAMES.len());
        for (name, size) in settings.image_sizes.iter() {
            let resized = resize(&img, size);
            let data = encode_image(&resized, format, settings.compression_quality)?;

            variants.push(ImageVariant {
                size_name: format!("{}{}", VARIANT_PREFIX, name),
                file: variant_filename(name, filename),
                width: resized.width(),
                height: resized.height(),
                mime_type: format.mime_type().to_string(),
                data,
            });
        }

        Ok(variants)
    }

    /// Re-encode at the given quality, keeping the source format
    pub fn compress(&self, data: &[u8], filename: &str, quality: u8) -> Result<Vec<u8>, ImageError> {
        let format = OutputFormat::for_filename(filename)
            .filter(OutputFormat::is_recompressible)
            .ok_or_else(|| ImageError::UnsupportedFormat(filename.to_string()))?;
        let img = image::load_from_memory(data)?;
        encode_image(&img, format, quality)
    }

    /// Check if file is an image
    pub fn is_image(mime_type: &str) -> bool {
        mime_type.starts_with("image/")
    }
}

fn resize(img: &DynamicImage, size: &ImageSize) -> DynamicImage {
    if size.crop {
        img.resize_to_fill(size.width, size.height, FilterType::Lanczos3)
    } else {
        img.resize(size.width, size.height, FilterType::Lanczos3)
    }
}

/// `smd_<size>_<filename>`
pub fn variant_filename(size_name: &str, filename: &str) -> String {
    format!("{}{}_{}", VARIANT_PREFIX, size_name, filename)
}

/// Encode image to bytes
pub fn encode_image(img: &DynamicImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>, ImageError> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);

    match format {
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
            rgb.write_with_encoder(encoder)?;
        }
        OutputFormat::Png => {
            img.write_to(&mut cursor, ImgFormat::Png)?;
        }
        OutputFormat::Gif => {
            DynamicImage::ImageRgba8(img.to_rgba8()).write_to(&mut cursor, ImgFormat::Gif)?;
        }
        OutputFormat::WebP => {
            DynamicImage::ImageRgba8(img.to_rgba8()).write_to(&mut cursor, ImgFormat::WebP)?;
        }
    }

    Ok(buffer)
}
