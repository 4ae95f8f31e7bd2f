//! Shared types used across pipeline stages.
//!
//! [`ImageRecord`] is also the on-disk shape of the image index consumed by
//! the browser runtime, so its serialized field names are a contract.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One physical image file confirmed to exist on disk, joined with every
/// metadata source that mentions it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    /// Path as written in the capture metadata, untouched.
    pub source_path: String,
    /// Normalized key. Unique across the index.
    pub key: String,
    /// Case-preserving relative path, percent-encoded per segment.
    pub encoded_src: String,
    /// Empty when no caption was supplied.
    pub caption: String,
    /// Display labels, parallel to `tag_keys`.
    pub tags: Vec<String>,
    pub tag_keys: BTreeSet<String>,
    pub capture_date: String,
    pub camera: String,
    pub lens: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl ImageRecord {
    pub fn has_tag(&self, key: &str) -> bool {
        self.tag_keys.contains(key)
    }

    /// `(width, height)` when capture metadata supplied both.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.width.zip(self.height)
    }
}
