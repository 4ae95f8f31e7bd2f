//! Metadata sources and their readers.
//!
//! Four independent JSON files describe a photo collection:
//!
//! | Source | Shape | Keyed by |
//! |--------|-------|----------|
//! | capture metadata | `[{ "SourceFile": ..., "Make": ... }]` | OS path |
//! | captions | `{ page: { path: caption } }` or `{ path: caption }` | any path |
//! | tags | `{ path: "a, b; c" }` | any path |
//! | tag metadata | `{ label: { title, slug, ... } }` | tag label |
//!
//! ## Missing vs. broken
//!
//! A file that does not exist, or holds only whitespace, reads as the empty
//! default: a fresh project has no captions yet and that is fine. A file with
//! content that does not parse is fatal. Every join downstream would be built
//! on a guess, so the run stops and names the file.
//!
//! ## Field resolution
//!
//! exiftool writes the same fact under different names depending on the file
//! format. Each descriptive field is resolved from a priority list, first
//! non-empty value wins:
//!
//! - **Date**: `DateTimeOriginal` → `CreateDate`
//! - **Camera**: `Make` and `Model`, space-joined
//! - **Lens**: `LensModel` → `LensID`
//! - **Dimensions**: `ImageWidth` → `ExifImageWidth` → `SourceImageWidth`
//!   (and the same for height); both must resolve

use crate::paths::normalize_image_path;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("IO error reading {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("Malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Read and parse a JSON file, falling back to `T::default()` when the file
/// is missing or blank.
pub fn read_json_or_default<T>(path: &Path) -> Result<T, MetadataError>
where
    T: DeserializeOwned + Default,
{
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "source missing, using empty default");
            return Ok(T::default());
        }
        Err(source) => {
            return Err(MetadataError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    if raw.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&raw).map_err(|source| MetadataError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Loose truthiness for hand-edited flags: `null`, `false`, `0` and `""`
/// are false, everything else is true.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Resolve a metadata field from multiple sources.
///
/// Takes a list of optional values in priority order and returns the first
/// non-None, non-empty value.
pub fn resolve(sources: &[Option<&str>]) -> Option<String> {
    sources
        .iter()
        .filter_map(|opt| {
            opt.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        })
        .next()
}

// ============================================================================
// Capture metadata
// ============================================================================

/// A scalar exiftool may emit as either a string or a number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(serde_json::Number),
    Other(IgnoredAny),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::Number(n) => Some(n.to_string()),
            FieldValue::Other(_) => None,
        }
    }

    /// Positive pixel count, accepting `"4000"` as well as `4000`.
    pub fn as_pixels(&self) -> Option<u32> {
        let value = match self {
            FieldValue::Text(s) => s.trim().parse::<u32>().ok(),
            FieldValue::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            FieldValue::Other(_) => None,
        }?;
        (value > 0).then_some(value)
    }
}

/// One element of the capture metadata array, using exiftool field names.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CaptureEntry {
    pub source_file: Option<String>,
    /// Set by exiftool when it could not read the file.
    pub error: Option<Value>,
    pub date_time_original: Option<FieldValue>,
    pub create_date: Option<FieldValue>,
    pub make: Option<FieldValue>,
    pub model: Option<FieldValue>,
    pub lens_model: Option<FieldValue>,
    #[serde(rename = "LensID")]
    pub lens_id: Option<FieldValue>,
    pub image_width: Option<FieldValue>,
    pub exif_image_width: Option<FieldValue>,
    pub source_image_width: Option<FieldValue>,
    pub image_height: Option<FieldValue>,
    pub exif_image_height: Option<FieldValue>,
    pub source_image_height: Option<FieldValue>,
}

fn text(value: &Option<FieldValue>) -> Option<String> {
    value.as_ref().and_then(FieldValue::as_text)
}

fn first_pixels(values: [&Option<FieldValue>; 3]) -> Option<u32> {
    values
        .into_iter()
        .find_map(|v| v.as_ref().and_then(FieldValue::as_pixels))
}

impl CaptureEntry {
    /// Source path, unless the entry is unusable (no path, or an exiftool error).
    pub fn usable_source(&self) -> Option<&str> {
        if self.error.as_ref().is_some_and(is_truthy) {
            return None;
        }
        self.source_file.as_deref().filter(|s| !s.trim().is_empty())
    }

    pub fn capture_date(&self) -> String {
        resolve(&[
            text(&self.date_time_original).as_deref(),
            text(&self.create_date).as_deref(),
        ])
        .unwrap_or_default()
    }

    pub fn camera(&self) -> String {
        [text(&self.make), text(&self.model)]
            .into_iter()
            .flatten()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn lens(&self) -> String {
        resolve(&[
            text(&self.lens_model).as_deref(),
            text(&self.lens_id).as_deref(),
        ])
        .unwrap_or_default()
    }

    /// Pixel dimensions as `(width, height)`, only when both are known.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let width = first_pixels([
            &self.image_width,
            &self.exif_image_width,
            &self.source_image_width,
        ])?;
        let height = first_pixels([
            &self.image_height,
            &self.exif_image_height,
            &self.source_image_height,
        ])?;
        Some((width, height))
    }
}

/// Load the capture metadata array. Null elements are dropped.
pub fn read_capture_metadata(path: &Path) -> Result<Vec<CaptureEntry>, MetadataError> {
    let entries: Vec<Option<CaptureEntry>> = read_json_or_default(path)?;
    Ok(entries.into_iter().flatten().collect())
}

// ============================================================================
// Captions
// ============================================================================

/// A top-level value in the captions file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CaptionsValue {
    /// `{ "<page>": { "<image path>": "caption" } }`
    Page(BTreeMap<String, Option<String>>),
    /// Legacy flat form: `{ "<image path>": "caption" }`
    Caption(String),
    Other(IgnoredAny),
}

/// Captions keyed by normalized image key.
///
/// When several entries normalize to the same key, the first non-empty one
/// wins. Pages are visited in page-identifier order, and flat legacy entries
/// only fill keys no page supplied.
pub fn read_captions(path: &Path) -> Result<BTreeMap<String, String>, MetadataError> {
    let raw: BTreeMap<String, CaptionsValue> = read_json_or_default(path)?;
    let mut captions = BTreeMap::new();
    let mut flat = Vec::new();

    for (page, value) in &raw {
        match value {
            CaptionsValue::Page(entries) => {
                for (image_path, caption) in entries {
                    if let Some(caption) = caption {
                        insert_caption(&mut captions, image_path, caption);
                    }
                }
            }
            CaptionsValue::Caption(caption) => flat.push((page, caption)),
            CaptionsValue::Other(_) => {
                debug!(page = %page, "ignoring caption entry that is neither a page nor text");
            }
        }
    }
    for (image_path, caption) in flat {
        insert_caption(&mut captions, image_path, caption);
    }
    Ok(captions)
}

fn insert_caption(captions: &mut BTreeMap<String, String>, image_path: &str, caption: &str) {
    let key = normalize_image_path(image_path);
    let caption = caption.trim();
    if key.is_empty() || caption.is_empty() {
        return;
    }
    if captions.contains_key(&key) {
        debug!(key = %key, "caption already set by an earlier entry, keeping it");
        return;
    }
    captions.insert(key, caption.to_string());
}

// ============================================================================
// Tags and tag metadata
// ============================================================================

/// Raw tag assignments: image path → delimited tag string.
pub type TagAssignments = BTreeMap<String, String>;

/// Read one tag file (consolidated or legacy per-page; same shape).
///
/// Non-string values are ignored.
pub fn read_tag_assignments(path: &Path) -> Result<TagAssignments, MetadataError> {
    let raw: BTreeMap<String, Value> = read_json_or_default(path)?;
    Ok(raw
        .into_iter()
        .filter_map(|(image_path, value)| match value {
            Value::String(tags) => Some((image_path, tags)),
            _ => None,
        })
        .collect())
}

/// Presentation metadata for one tag, as declared in the tag metadata file.
///
/// The file is hand-edited, so fields are read leniently: a text field that
/// is not a string is absent, an `order` that is not a finite number is
/// absent, and `hidden` is true for any truthy value.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TagMeta {
    #[serde(deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub slug: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub cover: Option<String>,
    #[serde(deserialize_with = "lenient_order")]
    pub order: Option<f64>,
    #[serde(deserialize_with = "lenient_flag")]
    pub hidden: bool,
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_order<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(Value::deserialize(deserializer)?
        .as_f64()
        .filter(|order| order.is_finite()))
}

fn lenient_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(is_truthy(&Value::deserialize(deserializer)?))
}

impl TagMeta {
    fn non_empty(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn title(&self) -> Option<&str> {
        Self::non_empty(&self.title)
    }

    /// Declared slug, unless it would name a file outside the pages
    /// directory.
    pub fn slug(&self) -> Option<&str> {
        Self::non_empty(&self.slug)
            .filter(|slug| !slug.contains(['/', '\\']) && !slug.chars().all(|c| c == '.'))
    }

    pub fn description(&self) -> Option<&str> {
        Self::non_empty(&self.description)
    }

    pub fn cover(&self) -> Option<&str> {
        Self::non_empty(&self.cover)
    }
}

/// Read the tag metadata file as declared: label → metadata.
///
/// Key normalization happens in [`crate::tags::TagMetaIndex`].
pub fn read_tag_metadata(path: &Path) -> Result<BTreeMap<String, TagMeta>, MetadataError> {
    read_json_or_default(path)
}
