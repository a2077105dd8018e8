use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::ImageReader;
use tracing::{debug, info};

use crate::llm::media::{
    detect_mime_type, download_media, is_remote_source, normalize_image_mime_type, InlineImage,
};

pub const MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;
pub const ACCEPTED_UPLOAD_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/webp", "image/heic"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExampleSpace {
    pub name: &'static str,
    pub file_name: &'static str,
}

pub const EXAMPLE_SPACES: [ExampleSpace; 3] = [
    ExampleSpace {
        name: "Modern Deck",
        file_name: "deck1.png",
    },
    ExampleSpace {
        name: "Garden Patio",
        file_name: "deck2.png",
    },
    ExampleSpace {
        name: "Outdoor Terrace",
        file_name: "deck 3.png",
    },
];

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Unsupported file type ({0}). Please upload a JPEG, PNG, WebP or HEIC image.")]
    UnsupportedType(String),
    #[error("File is too large ({size} bytes). The maximum size is 20 MB.")]
    TooLarge { size: u64 },
    #[error("Could not read {source_name}: {detail}")]
    Unreadable { source_name: String, detail: String },
    #[error("Could not decode image: {0}")]
    Decode(String),
}

/// Type is checked before size, so an oversized text file reports the type problem.
pub fn validate_upload(mime_type: &str, size: u64) -> Result<(), UploadError> {
    let normalized = normalize_image_mime_type(mime_type);
    if !ACCEPTED_UPLOAD_TYPES.contains(&normalized.as_str()) {
        return Err(UploadError::UnsupportedType(mime_type.to_string()));
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge { size });
    }
    Ok(())
}

fn decode_dimensions(bytes: &[u8]) -> Result<(u32, u32), UploadError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| UploadError::Decode(err.to_string()))?
        .into_dimensions()
        .map_err(|err| UploadError::Decode(err.to_string()))
}

/// A validated photo of the user's outdoor space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub source: String,
    /// HEIC is forwarded as-is and never decoded locally.
    pub dimensions: Option<(u32, u32)>,
}

impl UploadedImage {
    pub fn from_bytes(bytes: Vec<u8>, source: &str) -> Result<Self, UploadError> {
        let mime_type = detect_mime_type(&bytes)
            .map(|mime| normalize_image_mime_type(&mime))
            .ok_or_else(|| UploadError::UnsupportedType("unknown".to_string()))?;
        validate_upload(&mime_type, bytes.len() as u64)?;

        let dimensions = if mime_type == "image/heic" {
            None
        } else {
            Some(decode_dimensions(&bytes)?)
        };
        debug!(source, mime_type = %mime_type, ?dimensions, "Accepted upload");

        Ok(Self {
            bytes,
            mime_type,
            source: source.to_string(),
            dimensions,
        })
    }

    pub fn to_inline(&self) -> InlineImage {
        InlineImage::new(self.bytes.clone(), &self.mime_type)
    }

    pub fn describe(&self) -> String {
        let size_kb = self.bytes.len() as f64 / 1024.0;
        match self.dimensions {
            Some((width, height)) => format!(
                "{} ({}, {}x{}, {:.0} KB)",
                self.source, self.mime_type, width, height, size_kb
            ),
            None => format!("{} ({}, {:.0} KB)", self.source, self.mime_type, size_kb),
        }
    }
}

fn unreadable(source: &str, detail: impl ToString) -> UploadError {
    UploadError::Unreadable {
        source_name: source.to_string(),
        detail: detail.to_string(),
    }
}

/// Loads a local path or an http(s) URL.
pub async fn load_upload(source: &str) -> Result<UploadedImage, UploadError> {
    let source = source.trim();
    if source.is_empty() {
        return Err(unreadable(source, "no file given"));
    }

    if is_remote_source(source) {
        let bytes = download_media(source)
            .await
            .ok_or_else(|| unreadable(source, "download failed"))?;
        return UploadedImage::from_bytes(bytes, source);
    }

    let path = PathBuf::from(source);
    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|err| unreadable(source, err))?;
    if metadata.len() > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge {
            size: metadata.len(),
        });
    }
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|err| unreadable(source, err))?;
    UploadedImage::from_bytes(bytes, source)
}

/// `number` is 1-based, as shown to the user.
pub async fn load_example(number: usize, dir: &Path) -> Result<UploadedImage, UploadError> {
    let example = number
        .checked_sub(1)
        .and_then(|index| EXAMPLE_SPACES.get(index))
        .ok_or_else(|| {
            unreadable(
                &format!("example {number}"),
                format!("choose 1-{}", EXAMPLE_SPACES.len()),
            )
        })?;
    let path = dir.join(example.file_name);
    info!("Loading example space '{}' from {}", example.name, path.display());
    load_upload(&path.to_string_lossy()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::generator::testing::solid_png;

    const MB: u64 = 1024 * 1024;

    #[test]
    fn rejects_oversized_jpeg() {
        assert!(matches!(
            validate_upload("image/jpeg", 21 * MB),
            Err(UploadError::TooLarge { .. })
        ));
    }

    #[test]
    fn rejects_text_files() {
        assert!(matches!(
            validate_upload("text/plain", 5 * MB),
            Err(UploadError::UnsupportedType(_))
        ));
    }

    #[test]
    fn accepts_supported_images_up_to_limit() {
        assert!(validate_upload("image/jpeg", 5 * MB).is_ok());
        assert!(validate_upload("image/jpg", MAX_UPLOAD_BYTES).is_ok());
        assert!(validate_upload("image/heic", 1).is_ok());
        assert!(validate_upload("image/gif", 1).is_err());
    }

    #[test]
    fn reads_dimensions_from_png() {
        let upload = UploadedImage::from_bytes(solid_png(12, 7, [0, 0, 0, 255]), "deck.png").unwrap();
        assert_eq!(upload.mime_type, "image/png");
        assert_eq!(upload.dimensions, Some((12, 7)));
    }

    #[test]
    fn heic_is_accepted_without_dimensions() {
        let mut bytes = vec![0, 0, 0, 24];
        bytes.extend_from_slice(b"ftypheic");
        bytes.extend_from_slice(&[0; 16]);
        let upload = UploadedImage::from_bytes(bytes, "photo.heic").unwrap();
        assert_eq!(upload.mime_type, "image/heic");
        assert_eq!(upload.dimensions, None);
    }

    #[test]
    fn unknown_bytes_are_rejected() {
        let result = UploadedImage::from_bytes(b"just some text".to_vec(), "notes.txt");
        assert!(matches!(result, Err(UploadError::UnsupportedType(_))));
    }

    #[tokio::test]
    async fn loads_numbered_example_from_directory() {
        let dir = std::env::temp_dir().join(format!("aquavision-examples-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("deck 3.png"), solid_png(5, 5, [1, 1, 1, 255])).unwrap();

        let upload = load_example(3, &dir).await.unwrap();
        assert_eq!(upload.dimensions, Some((5, 5)));
        assert!(upload.source.ends_with("deck 3.png"));
        assert!(load_example(4, &dir).await.is_err());
        assert!(load_example(0, &dir).await.is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_file_is_unreadable() {
        let result = load_upload("/definitely/not/here.png").await;
        assert!(matches!(result, Err(UploadError::Unreadable { .. })));
    }
}
