//! Tag resolution.
//!
//! Decides, for every image key, the authoritative set of tag keys, and
//! records a display label for every tag key it meets.
//!
//! ## Two regimes
//!
//! Tags come from exactly one of two places, chosen once per run by
//! [`TagSource::discover`]:
//!
//! - **Global**: `data/tags/all-tags.json` exists. It is the only source of
//!   truth. Per-page legacy files are not even opened.
//! - **Legacy**: no consolidated file. Membership is seeded from the gallery
//!   pages a previous run generated (the page heading names the tag, every
//!   `<img src>` is a member), then every `data/tags/*.json` file adds to it.
//!   Headings and sources are read back with HTML entities decoded, since
//!   that is how they were written.
//!   A page that has its own `tags-<page>.json` is not scanned; the file
//!   replaces it.
//!
//! ## Labels
//!
//! Tag metadata seeds labels first: an explicit `title` verbatim, otherwise
//! the declared label formatted. After that, the first source to introduce a
//! key names it and later spellings never rename it.

use crate::config::{GalleryConfig, SiteConfig};
use crate::metadata::{self, MetadataError, TagMeta};
use crate::naming::{format_tag_label, normalize_tag_key, parse_tag_list, slugify};
use crate::paths::normalize_image_path;
use html_escape::decode_html_entities;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Tag key reserved for the default "all" page name; never a catalog entry.
pub const RESERVED_ALL_KEY: &str = "all";

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<h2>([^<]+)</h2>").expect("valid heading pattern"));
static IMG_SRC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<img\s+[^>]*src="([^"]+)""#).expect("valid img pattern"));

#[derive(Error, Debug)]
pub enum TagError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("IO error reading {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("Tag directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Invalid heading pattern: {0}")]
    Pattern(#[from] regex::Error),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> TagError + '_ {
    move |source| TagError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ============================================================================
// Tag metadata index
// ============================================================================

/// Tag metadata keyed by normalized tag key.
#[derive(Debug, Clone, Default)]
pub struct TagMetaIndex {
    by_key: BTreeMap<String, TagMeta>,
    declared: BTreeMap<String, String>,
    slug_to_key: BTreeMap<String, String>,
}

/// Resolved presentation of the synthetic all-photos entry.
#[derive(Debug, Clone, PartialEq)]
pub struct AllPhotosMeta {
    pub label: String,
    pub slug: String,
    /// Tag key a real tag would need to collide with this entry's page.
    pub label_key: String,
    pub meta: TagMeta,
}

impl TagMetaIndex {
    /// Index declared metadata by normalized key.
    ///
    /// Labels normalizing to the same key keep the first declaration in
    /// sorted label order.
    pub fn new(raw: BTreeMap<String, TagMeta>) -> Self {
        let mut index = Self::default();
        for (label, meta) in raw {
            let key = normalize_tag_key(&label);
            if key.is_empty() {
                continue;
            }
            if index.by_key.contains_key(&key) {
                debug!(label = %label, key = %key, "duplicate tag metadata, keeping first");
                continue;
            }
            if let Some(slug) = meta.slug() {
                index.slug_to_key.insert(slug.to_string(), key.clone());
            }
            index.declared.insert(key.clone(), label);
            index.by_key.insert(key, meta);
        }
        index
    }

    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        Ok(Self::new(metadata::read_tag_metadata(path)?))
    }

    pub fn get(&self, key: &str) -> Option<&TagMeta> {
        self.by_key.get(key)
    }

    pub fn key_for_slug(&self, slug: &str) -> Option<&str> {
        self.slug_to_key.get(slug).map(String::as_str)
    }

    /// Label a declaration implies: explicit title verbatim, else the
    /// declared label formatted.
    pub fn label(&self, key: &str) -> Option<String> {
        let meta = self.by_key.get(key)?;
        match meta.title() {
            Some(title) => Some(title.to_string()),
            None => self.declared.get(key).map(|label| format_tag_label(label)),
        }
    }

    fn labels(&self) -> impl Iterator<Item = (&String, String)> {
        self.by_key
            .keys()
            .filter_map(|key| self.label(key).map(|label| (key, label)))
    }

    /// Presentation of the synthetic all-photos entry.
    ///
    /// Metadata is looked up under the configured label.
    pub fn all_photos(&self, gallery: &GalleryConfig) -> AllPhotosMeta {
        let meta = self
            .get(&normalize_tag_key(&gallery.all_photos_label))
            .cloned()
            .unwrap_or_default();
        let label = meta
            .title()
            .unwrap_or(gallery.all_photos_label.trim())
            .to_string();
        let slug = meta
            .slug()
            .map(String::from)
            .unwrap_or_else(|| slug_or_encoded(&label));
        AllPhotosMeta {
            label_key: normalize_tag_key(&label),
            label,
            slug,
            meta,
        }
    }
}

/// Slug for a label, falling back to the percent-encoded tag key when the
/// label has no ASCII alphanumerics.
pub fn slug_or_encoded(label: &str) -> String {
    let slug = slugify(label);
    if slug.is_empty() {
        urlencoding::encode(&normalize_tag_key(label)).into_owned()
    } else {
        slug
    }
}

// ============================================================================
// Tag sources
// ============================================================================

/// Where this run's tags come from.
#[derive(Debug, Clone, PartialEq)]
pub enum TagSource {
    /// The consolidated tag file.
    Global(PathBuf),
    Legacy(LegacySources),
}

/// Inputs of the legacy regime, in visiting order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacySources {
    /// Previously generated gallery pages used as seeds.
    pub pages: Vec<PathBuf>,
    /// Per-page tag files layered on top.
    pub tag_files: Vec<PathBuf>,
}

impl TagSource {
    /// Pick the regime for this run.
    pub fn discover(
        root: &Path,
        config: &SiteConfig,
        meta: &TagMetaIndex,
    ) -> Result<Self, TagError> {
        let global = root.join(&config.paths.global_tags);
        if global.try_exists().map_err(io_error(&global))? {
            info!(path = %global.display(), "using consolidated tag file");
            return Ok(TagSource::Global(global));
        }

        let tag_files = list_files(&root.join(&config.paths.tags_dir), |name| {
            name.to_ascii_lowercase().ends_with(".json")
        })?;
        let overridden: BTreeSet<String> = tag_files
            .iter()
            .filter_map(|p| p.file_name())
            .map(|name| tag_file_page(&name.to_string_lossy()))
            .collect();

        let suffix = config.gallery.page_suffix.to_ascii_lowercase();
        let all_photos_page = format!(
            "{}{}",
            meta.all_photos(&config.gallery).slug,
            config.gallery.page_suffix
        );
        let pages = list_files(&root.join(&config.paths.pages_dir), |name| {
            name.to_ascii_lowercase().ends_with(&suffix)
                && !overridden.contains(name)
                && name != all_photos_page
        })?;

        info!(
            pages = pages.len(),
            tag_files = tag_files.len(),
            "no consolidated tag file, using legacy sources"
        );
        Ok(TagSource::Legacy(LegacySources { pages, tag_files }))
    }

    pub fn regime(&self) -> &'static str {
        match self {
            TagSource::Global(_) => "global",
            TagSource::Legacy(_) => "legacy",
        }
    }
}

/// Files directly inside `dir` whose names pass `keep`, sorted by name.
/// A missing directory has no files.
fn list_files(dir: &Path, keep: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>, TagError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if entry.file_type().is_file() && keep(&entry.file_name().to_string_lossy()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Page a legacy tag file stands in for.
///
/// `tags-street-gallery-html.json` → `street-gallery.html`,
/// `tags-street.json` → `street`.
pub fn tag_file_page(file_name: &str) -> String {
    let base = file_name.strip_prefix("tags-").unwrap_or(file_name);
    let base = match base.len().checked_sub(".json".len()) {
        Some(cut) if base.is_char_boundary(cut) && base[cut..].eq_ignore_ascii_case(".json") => {
            &base[..cut]
        }
        _ => base,
    };
    match base.len().checked_sub("-html".len()) {
        Some(cut) if base.is_char_boundary(cut) && base[cut..].eq_ignore_ascii_case("-html") => {
            format!("{}.html", &base[..cut])
        }
        _ => base.to_string(),
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Outcome of tag resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedTags {
    /// Image key → tag keys.
    pub by_image: BTreeMap<String, BTreeSet<String>>,
    /// Tag key → display label, for every key observed.
    pub labels: BTreeMap<String, String>,
}

impl ResolvedTags {
    fn seeded(meta: &TagMetaIndex) -> Self {
        let mut resolved = Self::default();
        for (key, label) in meta.labels() {
            resolved.labels.insert(key.clone(), label);
        }
        resolved
    }

    pub fn tags_for(&self, image_key: &str) -> BTreeSet<String> {
        self.by_image.get(image_key).cloned().unwrap_or_default()
    }

    /// Display label of a tag key; the key itself if never labelled.
    pub fn label<'a>(&'a self, tag_key: &'a str) -> &'a str {
        self.labels.get(tag_key).map(String::as_str).unwrap_or(tag_key)
    }

    fn name_tag(&mut self, tag_key: &str, label: String) {
        if !label.is_empty() && !self.labels.contains_key(tag_key) {
            self.labels.insert(tag_key.to_string(), label);
        }
    }

    fn add_tag_key(&mut self, image_key: String, tag_key: &str) {
        if image_key.is_empty() || tag_key.is_empty() {
            return;
        }
        self.by_image
            .entry(image_key)
            .or_default()
            .insert(tag_key.to_string());
    }

    /// Apply one `{ image path: "a, b; c" }` mapping.
    fn apply_assignments(&mut self, assignments: &metadata::TagAssignments) {
        for (image_path, raw_tags) in assignments {
            let image_key = normalize_image_path(image_path);
            if image_key.is_empty() {
                continue;
            }
            for raw_tag in parse_tag_list(raw_tags) {
                let tag_key = normalize_tag_key(&raw_tag);
                if tag_key.is_empty() {
                    continue;
                }
                self.name_tag(&tag_key, format_tag_label(&raw_tag));
                self.add_tag_key(image_key.clone(), &tag_key);
            }
        }
    }
}

/// Resolve tags from the chosen source.
pub fn resolve(
    source: &TagSource,
    meta: &TagMetaIndex,
    gallery: &GalleryConfig,
) -> Result<ResolvedTags, TagError> {
    match source {
        TagSource::Global(path) => resolve_global(path, meta),
        TagSource::Legacy(legacy) => resolve_legacy(legacy, meta, gallery),
    }
}

fn resolve_global(path: &Path, meta: &TagMetaIndex) -> Result<ResolvedTags, TagError> {
    let mut resolved = ResolvedTags::seeded(meta);
    resolved.apply_assignments(&metadata::read_tag_assignments(path)?);
    Ok(resolved)
}

fn resolve_legacy(
    legacy: &LegacySources,
    meta: &TagMetaIndex,
    gallery: &GalleryConfig,
) -> Result<ResolvedTags, TagError> {
    let mut resolved = ResolvedTags::seeded(meta);
    let heading_suffix = heading_suffix_pattern(&gallery.heading_suffix)?;

    for page in &legacy.pages {
        seed_from_page(&mut resolved, page, meta, gallery, heading_suffix.as_ref())?;
    }
    for file in &legacy.tag_files {
        resolved.apply_assignments(&metadata::read_tag_assignments(file)?);
    }
    Ok(resolved)
}

fn heading_suffix_pattern(suffix: &str) -> Result<Option<Regex>, regex::Error> {
    let suffix = suffix.trim();
    if suffix.is_empty() {
        return Ok(None);
    }
    Regex::new(&format!(r"(?i)\s*{}\s*$", regex::escape(suffix))).map(Some)
}

/// Add every image referenced by a generated page to the page's tag.
fn seed_from_page(
    resolved: &mut ResolvedTags,
    page: &Path,
    meta: &TagMetaIndex,
    gallery: &GalleryConfig,
    heading_suffix: Option<&Regex>,
) -> Result<(), TagError> {
    let file_name = page
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let slug = &file_name[..file_name.len().saturating_sub(gallery.page_suffix.len())];
    let html = fs::read_to_string(page).map_err(io_error(page))?;

    let tag_key = match meta.key_for_slug(slug) {
        Some(key) => key.to_string(),
        None => {
            let Some(heading) = HEADING_RE.captures(&html).and_then(|c| c.get(1)) else {
                debug!(page = %file_name, "no tag heading, skipping page");
                return Ok(());
            };
            let heading = decode_html_entities(heading.as_str());
            let raw = match heading_suffix {
                Some(re) => re.replace(&heading, "").into_owned(),
                None => heading.into_owned(),
            };
            let key = normalize_tag_key(&raw);
            resolved.name_tag(&key, format_tag_label(&raw));
            key
        }
    };
    if tag_key.is_empty() {
        return Ok(());
    }

    for capture in IMG_SRC_RE.captures_iter(&html) {
        if let Some(src) = capture.get(1) {
            let src = decode_html_entities(src.as_str());
            resolved.add_tag_key(normalize_image_path(&src), &tag_key);
        }
    }
    Ok(())
}
