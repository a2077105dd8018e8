pub mod filter;
pub mod models;

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::resolve_asset_path;
use crate::llm::media::{download_media, is_remote_source, InlineImage};

pub use filter::{CapacityBucket, CatalogFilter, PlanShape};
pub use models::{builtin_spa_models, SpaModel};

#[derive(Debug, Deserialize)]
struct CatalogFile {
    spas: Vec<SpaModel>,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    models: Vec<SpaModel>,
}

fn load_catalog_from_path(path: &Path) -> Vec<SpaModel> {
    if !path.exists() {
        info!("Spa catalog not found at {}", path.display());
        return Vec::new();
    }

    let raw = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            warn!("Failed to read spa catalog at {}: {}", path.display(), err);
            return Vec::new();
        }
    };

    let parsed: CatalogFile = match serde_json::from_str(&raw) {
        Ok(data) => data,
        Err(err) => {
            warn!("Failed to parse spa catalog at {}: {}", path.display(), err);
            return Vec::new();
        }
    };

    let mut models = Vec::new();
    for spa in parsed.spas {
        if spa.id.trim().is_empty() || spa.name.trim().is_empty() {
            continue;
        }
        if models.iter().any(|existing: &SpaModel| existing.id == spa.id) {
            warn!("Duplicate spa id '{}' in {}; keeping the first", spa.id, path.display());
            continue;
        }
        models.push(spa);
    }
    models
}

impl Catalog {
    pub fn new(models: Vec<SpaModel>) -> Self {
        Self { models }
    }

    /// Uses the override file when it yields at least one product, otherwise the built-in list.
    pub fn load(path: Option<&Path>) -> Self {
        if let Some(path) = path {
            let models = load_catalog_from_path(path);
            if !models.is_empty() {
                info!("Loaded {} spa model(s) from {}", models.len(), path.display());
                return Self::new(models);
            }
        }
        Self::new(builtin_spa_models())
    }

    pub fn all(&self) -> &[SpaModel] {
        &self.models
    }

    pub fn find(&self, id: &str) -> Option<&SpaModel> {
        let wanted = id.trim();
        self.models
            .iter()
            .find(|spa| spa.id.eq_ignore_ascii_case(wanted))
    }

    pub fn filtered(&self, filter: &CatalogFilter) -> Vec<&SpaModel> {
        self.models.iter().filter(|spa| filter.matches(spa)).collect()
    }
}

/// Fetches the product reference image, either from the assets directory or over HTTP.
pub async fn load_product_image(spa: &SpaModel, assets_dir: &Path) -> Result<InlineImage> {
    let source = spa.image_url.trim();
    let bytes = if is_remote_source(source) {
        download_media(source)
            .await
            .ok_or_else(|| anyhow!("Failed to download spa image for {} from {}", spa.id, source))?
    } else {
        let path = resolve_asset_path(assets_dir, source);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to load spa image {}", path.display()))?
    };

    if bytes.is_empty() {
        return Err(anyhow!("Spa image for {} is empty", spa.id));
    }
    Ok(InlineImage::sniffed(bytes))
}
