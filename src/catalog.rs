//! Tag catalog: the ordered list of gallery pages.
//!
//! Every tag key observed (declared in tag metadata, assigned by a tag
//! source, or carried by an indexed image) becomes a [`CatalogEntry`], plus
//! one synthetic entry aggregating every non-excluded photo. Entries without
//! images stay in the list but get no page. Three keys never get an entry of
//! their own:
//!
//! - the exclude tag (it is a switch, not a gallery)
//! - `all` (reserved for the aggregate page's default name)
//! - whatever key the aggregate entry's label normalizes to, so a real tag
//!   called "All Photos" cannot produce a second page with the same name
//!
//! Hidden entries are dropped before sorting. They get no page and no
//! navigation link, and a page left over from an earlier run is not touched.
//!
//! ## Ordering
//!
//! Declared `order` ascending, entries without one last. Ties are broken by
//! label ignoring case, then by label, then by key, so the order is total
//! and the same on every run.

use crate::config::GalleryConfig;
use crate::index::ImageIndex;
use crate::metadata::TagMeta;
use crate::naming::normalize_tag_key;
use crate::tags::{RESERVED_ALL_KEY, ResolvedTags, TagMetaIndex, slug_or_encoded};
use crate::types::ImageRecord;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Key of the synthetic all-photos entry. Cannot collide with a normalized
/// tag key in practice, and is never written to an image's tag set.
pub const ALL_PHOTOS_KEY: &str = "__all__";

/// Resolved identity and presentation of one tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagDefinition {
    pub key: String,
    pub label: String,
    pub slug: String,
    /// `None` sorts after every declared order.
    pub order: Option<f64>,
    pub hidden: bool,
    pub cover: Option<String>,
    pub description: Option<String>,
}

impl TagDefinition {
    fn from_meta(key: &str, label: String, slug: Option<String>, meta: Option<&TagMeta>) -> Self {
        let slug = slug
            .or_else(|| meta.and_then(TagMeta::slug).map(String::from))
            .unwrap_or_else(|| slug_or_encoded(&label));
        Self {
            key: key.to_string(),
            slug,
            order: meta.and_then(|m| m.order),
            hidden: meta.is_some_and(|m| m.hidden),
            cover: meta.and_then(TagMeta::cover).map(String::from),
            description: meta.and_then(TagMeta::description).map(String::from),
            label,
        }
    }

    /// Filename of this tag's generated page.
    pub fn page_name(&self, gallery: &GalleryConfig) -> String {
        format!("{}{}", self.slug, gallery.page_suffix)
    }
}

/// One generation unit: a tag bound to its images.
#[derive(Debug, Clone)]
pub struct CatalogEntry<'a> {
    pub definition: TagDefinition,
    /// Images in index order, before page-level dedup.
    pub images: Vec<&'a ImageRecord>,
}

impl CatalogEntry<'_> {
    pub fn is_all_photos(&self) -> bool {
        self.definition.key == ALL_PHOTOS_KEY
    }

    pub fn label(&self) -> &str {
        &self.definition.label
    }
}

/// Visible entries in page order, plus a definition for every tag seen.
#[derive(Debug, Clone)]
pub struct Catalog<'a> {
    entries: Vec<CatalogEntry<'a>>,
    definitions: BTreeMap<String, TagDefinition>,
}

impl<'a> Catalog<'a> {
    pub fn build(
        index: &'a ImageIndex,
        tags: &ResolvedTags,
        meta: &TagMetaIndex,
        gallery: &GalleryConfig,
    ) -> Self {
        let exclude_key = normalize_tag_key(&gallery.exclude_tag);
        let all_photos = meta.all_photos(gallery);

        let observed: BTreeSet<&str> = tags
            .labels
            .keys()
            .map(String::as_str)
            .chain(index.tag_keys())
            .collect();
        let definitions: BTreeMap<String, TagDefinition> = observed
            .into_iter()
            .map(|key| {
                let definition = TagDefinition::from_meta(
                    key,
                    tags.label(key).to_string(),
                    None,
                    meta.get(key),
                );
                (key.to_string(), definition)
            })
            .collect();

        let mut entries: Vec<CatalogEntry<'a>> = definitions
            .iter()
            .filter(|(key, _)| {
                let key = key.as_str();
                key != exclude_key && key != RESERVED_ALL_KEY && key != all_photos.label_key
            })
            .map(|(key, definition)| CatalogEntry {
                definition: definition.clone(),
                images: index.images_for_tag(key),
            })
            .collect();

        let all_images = index.all_photos();
        if !all_images.is_empty() {
            entries.push(CatalogEntry {
                definition: TagDefinition::from_meta(
                    ALL_PHOTOS_KEY,
                    all_photos.label,
                    Some(all_photos.slug),
                    Some(&all_photos.meta),
                ),
                images: all_images,
            });
        }

        entries.retain(|entry| !entry.definition.hidden);
        sort_entries(&mut entries);
        warn_on_slug_collisions(&entries);

        Catalog {
            entries,
            definitions,
        }
    }

    /// Visible entries in page order, including empty ones.
    pub fn entries(&self) -> &[CatalogEntry<'a>] {
        &self.entries
    }

    /// Visible entries that get a page.
    pub fn pages(&self) -> impl Iterator<Item = &CatalogEntry<'a>> {
        self.entries.iter().filter(|e| !e.images.is_empty())
    }

    /// Every tag key ever observed, hidden and reserved ones included.
    pub fn definitions(&self) -> &BTreeMap<String, TagDefinition> {
        &self.definitions
    }
}

fn compare_definitions(a: &TagDefinition, b: &TagDefinition) -> Ordering {
    let by_order = match (a.order, b.order) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_order
        .then_with(|| a.label.to_lowercase().cmp(&b.label.to_lowercase()))
        .then_with(|| a.label.cmp(&b.label))
        .then_with(|| a.key.cmp(&b.key))
}

fn sort_entries(entries: &mut [CatalogEntry<'_>]) {
    entries.sort_by(|a, b| compare_definitions(&a.definition, &b.definition));
}

fn warn_on_slug_collisions(entries: &[CatalogEntry<'_>]) {
    let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
    for entry in entries.iter().filter(|e| !e.images.is_empty()) {
        let slug = entry.definition.slug.as_str();
        if let Some(previous) = seen.insert(slug, entry.label()) {
            warn!(
                slug = %slug,
                first = %previous,
                second = %entry.label(),
                "two galleries share a slug; the later one overwrites the earlier page"
            );
        }
    }
}
