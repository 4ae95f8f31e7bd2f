//! Image index: one record per physical photo.
//!
//! The capture metadata is the spine. Every usable entry is normalized,
//! checked against the disk, and joined with its caption and resolved tags.
//! Entries whose file is gone are dropped without complaint: exports get
//! cropped, renamed and deleted all the time, and the metadata dump lags.
//!
//! ## Record order
//!
//! Records keep capture metadata order. Two entries normalizing to the same
//! key are one image; the first entry that points at an existing file wins.
//!
//! ## Reverse index
//!
//! Alongside the records the index keeps, per tag key, the records carrying
//! it (in record order), plus the synthetic all-photos bucket: every record
//! not carrying the exclude tag.

use crate::metadata::CaptureEntry;
use crate::paths::{encode_path, image_exists, is_under_image_root, relative_image_path};
use crate::tags::ResolvedTags;
use crate::types::ImageRecord;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error checking {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Counts of what the builder kept and why it dropped the rest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub kept: usize,
    /// File not found on disk.
    pub orphaned: usize,
    /// Same key as an earlier kept entry.
    pub duplicates: usize,
    /// No source path, outside `images/`, or flagged as errored by exiftool.
    pub unusable: usize,
}

/// The joined image model for one run.
#[derive(Debug, Clone, Default)]
pub struct ImageIndex {
    records: Vec<ImageRecord>,
    by_tag: BTreeMap<String, Vec<usize>>,
    all_photos: Vec<usize>,
    stats: IndexStats,
}

/// Inputs the builder joins.
pub struct IndexInputs<'a> {
    pub capture: &'a [CaptureEntry],
    pub captions: &'a BTreeMap<String, String>,
    pub tags: &'a ResolvedTags,
    /// Normalized key of the exclude tag.
    pub exclude_key: &'a str,
}

impl ImageIndex {
    /// Build the index, checking every candidate file under `root`.
    pub fn build(root: &Path, inputs: IndexInputs<'_>) -> Result<Self, IndexError> {
        let mut index = ImageIndex::default();
        let mut seen = BTreeSet::new();

        for entry in inputs.capture {
            let Some(source) = entry.usable_source() else {
                index.stats.unusable += 1;
                continue;
            };
            let relative = relative_image_path(source);
            if !is_under_image_root(&relative) {
                debug!(source = %source, "not under images/, skipping");
                index.stats.unusable += 1;
                continue;
            }
            let key = relative.to_lowercase();
            if seen.contains(&key) {
                debug!(key = %key, source = %source, "duplicate capture entry, keeping first");
                index.stats.duplicates += 1;
                continue;
            }
            let exists = image_exists(root, &relative).map_err(|source| IndexError::Io {
                path: root.join(&relative),
                source,
            })?;
            if !exists {
                debug!(key = %key, "image file missing, dropping metadata");
                index.stats.orphaned += 1;
                continue;
            }

            let tag_keys = inputs.tags.tags_for(&key);
            let tags = tag_keys
                .iter()
                .map(|k| inputs.tags.label(k).to_string())
                .collect();
            let (width, height) = entry.dimensions().unzip();

            seen.insert(key.clone());
            index.push(
                ImageRecord {
                    source_path: source.to_string(),
                    encoded_src: encode_path(&relative),
                    caption: inputs.captions.get(&key).cloned().unwrap_or_default(),
                    key,
                    tags,
                    tag_keys,
                    capture_date: entry.capture_date(),
                    camera: entry.camera(),
                    lens: entry.lens(),
                    width,
                    height,
                },
                inputs.exclude_key,
            );
        }

        Ok(index)
    }

    fn push(&mut self, record: ImageRecord, exclude_key: &str) {
        let position = self.records.len();
        for tag_key in &record.tag_keys {
            self.by_tag.entry(tag_key.clone()).or_default().push(position);
        }
        if !record.has_tag(exclude_key) {
            self.all_photos.push(position);
        }
        self.records.push(record);
        self.stats.kept += 1;
    }

    /// All records, in capture metadata order.
    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn stats(&self) -> IndexStats {
        self.stats
    }

    /// Tag keys carried by at least one record.
    pub fn tag_keys(&self) -> impl Iterator<Item = &str> {
        self.by_tag.keys().map(String::as_str)
    }

    /// Records carrying `tag_key`, in record order.
    pub fn images_for_tag(&self, tag_key: &str) -> Vec<&ImageRecord> {
        self.by_tag
            .get(tag_key)
            .map(|positions| positions.iter().map(|&i| &self.records[i]).collect())
            .unwrap_or_default()
    }

    /// Records not carrying the exclude tag, in record order.
    pub fn all_photos(&self) -> Vec<&ImageRecord> {
        self.all_photos.iter().map(|&i| &self.records[i]).collect()
    }
}

/// Serialize the records as the runtime's image index: pretty JSON with a
/// trailing newline.
pub fn render_index_json(records: &[ImageRecord]) -> Result<String, IndexError> {
    let mut json = serde_json::to_string_pretty(records)?;
    json.push('\n');
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::tags::{TagMetaIndex, TagSource, resolve};
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "fake image").unwrap();
    }

    fn capture(json: &str) -> Vec<CaptureEntry> {
        serde_json::from_str(json).unwrap()
    }

    fn tags_from(root: &Path, all_tags: &str) -> ResolvedTags {
        let path = root.join("data/tags/all-tags.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, all_tags).unwrap();
        let meta = TagMetaIndex::default();
        let config = SiteConfig::default();
        let source = TagSource::discover(root, &config, &meta).unwrap();
        resolve(&source, &meta, &config.gallery).unwrap()
    }

    fn build(root: &Path, capture: &[CaptureEntry], tags: &ResolvedTags) -> ImageIndex {
        let captions = BTreeMap::from([(
            "images/street/one.jpg".to_string(),
            "First light".to_string(),
        )]);
        ImageIndex::build(
            root,
            IndexInputs {
                capture,
                captions: &captions,
                tags,
                exclude_key: "exclude",
            },
        )
        .unwrap()
    }

    #[test]
    fn orphan_metadata_is_dropped() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "images/Street/One.jpg");
        let entries = capture(
            r#"[
                { "SourceFile": "/home/me/site/images/Street/One.jpg" },
                { "SourceFile": "/home/me/site/images/Street/Gone.jpg" }
            ]"#,
        );

        let index = build(tmp.path(), &entries, &ResolvedTags::default());
        let keys: Vec<&str> = index.records().iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["images/street/one.jpg"]);
        assert_eq!(index.stats().orphaned, 1);
        assert_eq!(index.stats().kept, 1);
    }

    #[test]
    fn record_joins_caption_tags_and_capture_fields() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "images/Street/One.jpg");
        let tags = tags_from(tmp.path(), r#"{ "images/street/ONE.jpg": "night, street" }"#);
        let entries = capture(
            r#"[{
                "SourceFile": "C:\\site\\images\\Street\\One.jpg",
                "DateTimeOriginal": "2024:03:01 18:00:00",
                "Make": "Leica", "Model": "Q2", "LensModel": "Summilux 28",
                "ImageWidth": 6000, "ImageHeight": 4000
            }]"#,
        );

        let index = build(tmp.path(), &entries, &tags);
        let record = &index.records()[0];
        assert_eq!(record.source_path, r"C:\site\images\Street\One.jpg");
        assert_eq!(record.key, "images/street/one.jpg");
        assert_eq!(record.encoded_src, "images/Street/One.jpg");
        assert_eq!(record.caption, "First light");
        assert_eq!(record.tags, vec!["Night", "Street"]);
        assert_eq!(record.capture_date, "2024:03:01 18:00:00");
        assert_eq!(record.camera, "Leica Q2");
        assert_eq!(record.lens, "Summilux 28");
        assert_eq!(record.dimensions(), Some((6000, 4000)));
    }

    #[test]
    fn encoded_src_escapes_segments() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "images/Trips Two/a b.jpg");
        let entries = capture(r#"[{ "SourceFile": "/x/images/Trips Two/a b.jpg" }]"#);

        let index = build(tmp.path(), &entries, &ResolvedTags::default());
        assert_eq!(index.records()[0].encoded_src, "images/Trips%20Two/a%20b.jpg");
    }

    #[test]
    fn duplicate_keys_keep_first_existing_entry() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "images/a.jpg");
        let entries = capture(
            r#"[
                { "SourceFile": "/one/images/a.jpg", "Make": "First" },
                { "SourceFile": "/two/images/A.JPG", "Make": "Second" }
            ]"#,
        );

        let index = build(tmp.path(), &entries, &ResolvedTags::default());
        assert_eq!(index.records().len(), 1);
        assert_eq!(index.records()[0].camera, "First");
        assert_eq!(index.stats().duplicates, 1);
    }

    #[test]
    fn unusable_entries_are_counted() {
        let tmp = TempDir::new().unwrap();
        let entries = capture(
            r#"[{ "Make": "NoPath" }, { "SourceFile": "images/a.jpg", "Error": "bad" }]"#,
        );
        let index = build(tmp.path(), &entries, &ResolvedTags::default());
        assert!(index.records().is_empty());
        assert_eq!(index.stats().unusable, 2);
    }

    #[test]
    fn entries_outside_image_root_are_unusable() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "images/a.jpg");
        fs::write(tmp.path().join("index.html"), "<html>").unwrap();
        fs::create_dir_all(tmp.path().join("data")).unwrap();
        fs::write(tmp.path().join("data/exif.json"), "[]").unwrap();
        let entries = capture(
            r#"[
                { "SourceFile": "images/a.jpg" },
                { "SourceFile": "index.html" },
                { "SourceFile": "images/../data/exif.json" }
            ]"#,
        );

        let index = build(tmp.path(), &entries, &ResolvedTags::default());
        let keys: Vec<&str> = index.records().iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["images/a.jpg"]);
        assert_eq!(index.stats().unusable, 2);
        assert_eq!(index.all_photos().len(), 1);
    }

    #[test]
    fn reverse_index_and_all_photos_bucket() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "images/a.jpg");
        touch(tmp.path(), "images/b.jpg");
        touch(tmp.path(), "images/c.jpg");
        let tags = tags_from(
            tmp.path(),
            r#"{ "images/a.jpg": "Street", "images/b.jpg": "Exclude", "images/c.jpg": "Street, Exclude" }"#,
        );
        let entries = capture(
            r#"[
                { "SourceFile": "images/a.jpg" },
                { "SourceFile": "images/b.jpg" },
                { "SourceFile": "images/c.jpg" }
            ]"#,
        );

        let index = build(tmp.path(), &entries, &tags);
        let street: Vec<&str> = index
            .images_for_tag("street")
            .iter()
            .map(|r| r.key.as_str())
            .collect();
        assert_eq!(street, vec!["images/a.jpg", "images/c.jpg"]);

        let all: Vec<&str> = index.all_photos().iter().map(|r| r.key.as_str()).collect();
        assert_eq!(all, vec!["images/a.jpg"]);

        assert!(index.images_for_tag("missing").is_empty());
        assert_eq!(index.tag_keys().collect::<Vec<_>>(), vec!["exclude", "street"]);
    }

    #[test]
    fn index_json_uses_runtime_field_names() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "images/a.jpg");
        let entries = capture(r#"[{ "SourceFile": "images/a.jpg" }]"#);
        let index = build(tmp.path(), &entries, &ResolvedTags::default());

        let json = render_index_json(index.records()).unwrap();
        assert!(json.ends_with("]\n"));
        assert!(json.contains("\"encodedSrc\": \"images/a.jpg\""));
        assert!(json.contains("\"tagKeys\": []"));
        assert!(json.contains("\"captureDate\": \"\""));
        assert!(!json.contains("\"width\""));
    }
}
