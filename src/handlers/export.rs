use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, warn};

use crate::llm::media::{extension_for_mime, GeneratedImage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Saved(PathBuf),
    /// The write failed; the text tells the user how to save the image themselves.
    Manual(String),
}

pub fn export_file_name(image: &GeneratedImage, millis: i64) -> String {
    format!(
        "spa-visualization-{}.{}",
        millis,
        extension_for_mime(&image.mime_type)
    )
}

fn manual_instructions(dir: &Path, reason: &str) -> String {
    format!(
        "Could not save the image automatically ({reason}).\n\
         To save it manually:\n\
         1. Make sure {} exists and is writable, or pick another folder with `save <dir>`.\n\
         2. Run `save` again; the current visualization is kept until you leave this step.",
        dir.display()
    )
}

pub async fn save_result(image: &GeneratedImage, dir: &Path) -> ExportOutcome {
    let bytes = match image.decode_bytes() {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("Failed to decode visualization for export: {}", err);
            return ExportOutcome::Manual(manual_instructions(dir, &err.to_string()));
        }
    };

    let path = dir.join(export_file_name(image, Utc::now().timestamp_millis()));
    match tokio::fs::write(&path, &bytes).await {
        Ok(()) => {
            info!("Saved visualization to {} ({} bytes)", path.display(), bytes.len());
            ExportOutcome::Saved(path)
        }
        Err(err) => {
            warn!("Failed to save visualization to {}: {}", path.display(), err);
            ExportOutcome::Manual(manual_instructions(dir, &err.to_string()))
        }
    }
}
