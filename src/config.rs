use std::env;
use std::path::{Path, PathBuf};

use anyhow::Result;
use once_cell::sync::Lazy;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub gemini_api_key: String,
    pub gemini_image_model: String,
    pub gemini_base_url: String,
    pub gemini_safety_settings: String,
    pub gemini_request_timeout_secs: u64,
    pub assets_dir: PathBuf,
    pub watermark_path: PathBuf,
    pub enable_watermark: bool,
    pub example_spaces_dir: PathBuf,
    pub spa_catalog_path: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub lighting_region: String,
    pub default_hour: u8,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .map(|value| value.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_path(name: &str, default: &str) -> PathBuf {
    let value = env_string(name, default);
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return PathBuf::from(default);
    }
    PathBuf::from(trimmed)
}

fn env_optional_path(name: &str) -> Option<PathBuf> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

pub fn normalize_gemini_safety_settings(value: String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "permissive".to_string();
    }

    let lowered = trimmed.to_lowercase();
    match lowered.as_str() {
        "permissive" | "off" | "none" => "permissive".to_string(),
        "standard" => "standard".to_string(),
        _ => {
            warn!(
                "Unknown GEMINI_SAFETY_SETTINGS value '{}'; defaulting to permissive.",
                value
            );
            "permissive".to_string()
        }
    }
}

fn normalize_base_url(value: String) -> String {
    value.trim().trim_end_matches('/').to_string()
}

fn normalize_default_hour(value: u64) -> u8 {
    if value > 23 {
        warn!("DEFAULT_HOUR {} is outside 0-23; using 12.", value);
        return 12;
    }
    value as u8
}

impl Config {
    pub fn load() -> Result<Self> {
        let assets_dir = env_path("ASSETS_DIR", "public");
        let default_watermark = assets_dir
            .join("spa-images")
            .join("logo white -trademark-small.png");
        let watermark_path = env_optional_path("WATERMARK_PATH").unwrap_or(default_watermark);
        let example_spaces_dir = env_optional_path("EXAMPLE_SPACES_DIR")
            .unwrap_or_else(|| assets_dir.join("spaces"));

        Ok(Config {
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            gemini_api_key: env_string("GEMINI_API_KEY", "").trim().to_string(),
            gemini_image_model: env_string("GEMINI_IMAGE_MODEL", "gemini-2.5-flash-image-preview"),
            gemini_base_url: normalize_base_url(env_string(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            )),
            gemini_safety_settings: normalize_gemini_safety_settings(env_string(
                "GEMINI_SAFETY_SETTINGS",
                "permissive",
            )),
            gemini_request_timeout_secs: env_u64("GEMINI_REQUEST_TIMEOUT_SECS", 0),
            assets_dir,
            watermark_path,
            enable_watermark: env_bool("ENABLE_WATERMARK", true),
            example_spaces_dir,
            spa_catalog_path: env_optional_path("SPA_CATALOG_PATH"),
            output_dir: env_path("OUTPUT_DIR", "."),
            lighting_region: env_string("LIGHTING_REGION", "New Zealand").trim().to_string(),
            default_hour: normalize_default_hour(env_u64("DEFAULT_HOUR", 12)),
        })
    }
}

/// Catalog image URLs are site-rooted ("/spa-images/x.png"); map them under the assets dir.
pub fn resolve_asset_path(assets_dir: &Path, relative: &str) -> PathBuf {
    let trimmed = relative.trim().trim_start_matches('/');
    assets_dir.join(trimmed)
}
