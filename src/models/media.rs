//! Media Models
//!
//! Attachments resolved from the host CMS and the results of processing
//! them.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static NON_SLUG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("slug pattern"));

/// Media type category
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum MediaType {
    Image,
    Video,
    Audio,
    Document,
    #[default]
    Other,
}

impl MediaType {
    /// Determine media type from MIME type
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("image/") {
            Self::Image
        } else if mime.starts_with("video/") {
            Self::Video
        } else if mime.starts_with("audio/") {
            Self::Audio
        } else if mime.starts_with("application/pdf") || mime.starts_with("text/") {
            Self::Document
        } else {
            Self::Other
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => write!(f, "Image"),
            Self::Video => write!(f, "Video"),
            Self::Audio => write!(f, "Audio"),
            Self::Document => write!(f, "Document"),
            Self::Other => write!(f, "Other"),
        }
    }
}

/// Attachment as known to the host CMS
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: u64,
    /// Parent post
    pub post_id: Option<u64>,
    pub title: String,
    /// Absolute file path
    pub path: PathBuf,
    pub mime_type: String,
}

impl Attachment {
    pub fn media_type(&self) -> MediaType {
        MediaType::from_mime(&self.mime_type)
    }

    pub fn is_image(&self) -> bool {
        matches!(self.media_type(), MediaType::Image)
    }

    /// File name component of the path
    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string()
    }
}

/// One resized rendition of an image
#[derive(Debug, Clone)]
pub struct ImageVariant {
    /// Metadata key, e.g. "smd_desktop"
    pub size_name: String,
    /// File name, e.g. "smd_desktop_photo.jpg"
    pub file: String,
    pub width: u32,
    pub height: u32,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Admin media operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaOperation {
    Rename,
    Resize,
    Compress,
}

impl FromStr for MediaOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "rename" => Ok(Self::Rename),
            "resize" => Ok(Self::Resize),
            "compress" => Ok(Self::Compress),
            other => Err(format!("Unknown action '{}'", other)),
        }
    }
}

impl std::fmt::Display for MediaOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rename => write!(f, "rename"),
            Self::Resize => write!(f, "resize"),
            Self::Compress => write!(f, "compress"),
        }
    }
}

/// Result of one media operation
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingOutcome {
    pub operation: MediaOperation,
    pub attachment_id: u64,
    /// Files written or renamed
    pub affected: usize,
    pub message: String,
}

impl ProcessingOutcome {
    pub fn new(operation: MediaOperation, attachment_id: u64, affected: usize, message: impl Into<String>) -> Self {
        Self {
            operation,
            attachment_id,
            affected,
            message: message.into(),
        }
    }

    pub fn not_found(operation: MediaOperation, attachment_id: u64) -> Self {
        Self::new(operation, attachment_id, 0, "Media item not found")
    }
}

/// Lowercase, dash-separated slug of a title
pub fn sanitize_title(title: &str) -> String {
    NON_SLUG
        .replace_all(&title.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

/// Lowercase extension of a file name, if any
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_lowercase())
}

/// Format bytes to human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_from_mime() {
        assert_eq!(MediaType::from_mime("image/jpeg"), MediaType::Image);
        assert_eq!(MediaType::from_mime("video/mp4"), MediaType::Video);
        assert_eq!(MediaType::from_mime("audio/mpeg"), MediaType::Audio);
        assert_eq!(MediaType::from_mime("application/pdf"), MediaType::Document);
        assert_eq!(MediaType::from_mime("application/zip"), MediaType::Other);
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("My Summer Trip!"), "my-summer-trip");
        assert_eq!(sanitize_title("  Kampala -- 2024 "), "kampala-2024");
        assert_eq!(sanitize_title("***"), "");
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("photo.JPG"), Some("jpg".to_string()));
        assert_eq!(extension_of("README"), None);
    }

    #[test]
    fn test_operation_parse() {
        assert_eq!("resize".parse::<MediaOperation>(), Ok(MediaOperation::Resize));
        assert!("delete".parse::<MediaOperation>().is_err());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1572864), "1.50 MB");
    }
}
