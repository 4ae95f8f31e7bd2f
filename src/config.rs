//! Project configuration module.
//!
//! Handles loading, validating, and merging the project's `config.toml`.
//! Stock defaults describe the conventional project layout; a user file only
//! needs to name the values it changes.
//!
//! ## Config File Location
//!
//! ```text
//! project/
//! ├── config.toml              # Optional (overrides stock defaults)
//! ├── index.html
//! ├── images/
//! └── data/
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [paths]
//! capture_metadata = "data/exif.json"
//! captions = "data/captions.json"
//! tag_metadata = "data/gallery-meta.json"
//! tags_dir = "data/tags"
//! global_tags = "data/tags/all-tags.json"
//! image_index = "data/images.json"
//! template = "scripts/templates/gallery.html"
//! landing = "index.html"
//! pages_dir = "."
//!
//! [gallery]
//! page_suffix = "-gallery.html"
//! all_photos_label = "All Photos"
//! exclude_tag = "Exclude"
//! heading_suffix = " Gallery"
//! eager_images = 8
//! analytics_id = ""
//!
//! [server]
//! port = 5179
//! max_body_bytes = 2097152
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::naming::normalize_tag_key;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the config file looked up in the project root.
pub const CONFIG_FILENAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Project configuration loaded from `config.toml`.
///
/// All fields have defaults matching the conventional project layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Input and output locations, relative to the project root.
    pub paths: PathsConfig,
    /// Catalog and page rendering settings.
    pub gallery: GalleryConfig,
    /// Companion persistence endpoint settings.
    pub server: ServerConfig,
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.gallery.page_suffix.ends_with(".html") {
            return Err(ConfigError::Validation(
                "gallery.page_suffix must end with .html".into(),
            ));
        }
        if normalize_tag_key(&self.gallery.all_photos_label).is_empty() {
            return Err(ConfigError::Validation(
                "gallery.all_photos_label must not be blank".into(),
            ));
        }
        if normalize_tag_key(&self.gallery.exclude_tag).is_empty() {
            return Err(ConfigError::Validation(
                "gallery.exclude_tag must not be blank".into(),
            ));
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::Validation(
                "server.max_body_bytes must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// File locations. Every path is resolved against the project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Capture metadata array (exiftool `-json` output).
    pub capture_metadata: PathBuf,
    /// Caption mapping, nested by page or flat.
    pub captions: PathBuf,
    /// Per-tag presentation metadata.
    pub tag_metadata: PathBuf,
    /// Directory holding legacy per-page tag files.
    pub tags_dir: PathBuf,
    /// Consolidated tag file. Its presence selects the global regime.
    pub global_tags: PathBuf,
    /// Image index artifact written for the browser runtime.
    pub image_index: PathBuf,
    /// Gallery page template with `{{TOKEN}}` placeholders.
    pub template: PathBuf,
    /// Landing document carrying the navigation and card markers.
    pub landing: PathBuf,
    /// Directory generated gallery pages are written to.
    pub pages_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            capture_metadata: PathBuf::from("data/exif.json"),
            captions: PathBuf::from("data/captions.json"),
            tag_metadata: PathBuf::from("data/gallery-meta.json"),
            tags_dir: PathBuf::from("data/tags"),
            global_tags: PathBuf::from("data/tags/all-tags.json"),
            image_index: PathBuf::from("data/images.json"),
            template: PathBuf::from("scripts/templates/gallery.html"),
            landing: PathBuf::from("index.html"),
            pages_dir: PathBuf::from("."),
        }
    }
}

/// Catalog and page rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryConfig {
    /// Appended to an entry slug to form its page filename.
    pub page_suffix: String,
    /// Label of the synthetic entry aggregating every non-excluded image.
    pub all_photos_label: String,
    /// Tag that hides an image from the all-photos entry only.
    pub exclude_tag: String,
    /// Appended to the entry label in the page heading.
    pub heading_suffix: String,
    /// Number of leading images per page rendered with an eager-loading hint.
    pub eager_images: usize,
    /// Substituted for the `{{GA_ID}}` template token.
    pub analytics_id: String,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            page_suffix: "-gallery.html".to_string(),
            all_photos_label: "All Photos".to_string(),
            exclude_tag: "Exclude".to_string(),
            heading_suffix: " Gallery".to_string(),
            eager_images: 8,
            analytics_id: String::new(),
        }
    }
}

/// Companion endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Port bound on localhost.
    pub port: u16,
    /// Largest accepted request body, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5179,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(SiteConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config does not serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from the project root as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the project config, merging user values over stock defaults.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# tag-gal Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Paths are relative to the project root.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Inputs and outputs
# ---------------------------------------------------------------------------
[paths]
# Capture metadata, as produced by `exiftool -json -r images/`.
capture_metadata = "data/exif.json"

# Captions: { "<page>": { "<image path>": "caption" } } or a flat mapping.
captions = "data/captions.json"

# Per-tag title, slug, description, cover, order and hidden flag.
tag_metadata = "data/gallery-meta.json"

# Legacy per-page tag files (tags-<page>.json) live here.
tags_dir = "data/tags"

# When this file exists it is the only tag source; legacy files are ignored.
global_tags = "data/tags/all-tags.json"

# Image index consumed by the browser runtime.
image_index = "data/images.json"

# Gallery page template.
template = "scripts/templates/gallery.html"

# Landing document with GALLERY_NAV and GALLERY_CARDS marker comments.
landing = "index.html"

# Where <slug>-gallery.html pages are written.
pages_dir = "."

# ---------------------------------------------------------------------------
# Catalog and pages
# ---------------------------------------------------------------------------
[gallery]
page_suffix = "-gallery.html"

# Label of the page listing every photo not tagged with exclude_tag.
all_photos_label = "All Photos"

# Images carrying this tag are left out of the all-photos page only.
exclude_tag = "Exclude"

# Page heading is "<label><heading_suffix>".
heading_suffix = " Gallery"

# Leading images per page that get loading="eager" fetchpriority="high".
eager_images = 8

# Substituted for {{GA_ID}} in the template.
analytics_id = ""

# ---------------------------------------------------------------------------
# Companion endpoint (`tag-gal serve`)
# ---------------------------------------------------------------------------
[server]
port = 5179
max_body_bytes = 2097152
"##
}
