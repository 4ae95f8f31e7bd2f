//! HTML generation for gallery pages and the landing document.
//!
//! Everything here is pure: renderers take the catalog and return strings.
//! Writing happens later, once every document has rendered, so a failure
//! here leaves the site untouched.
//!
//! ## Gallery pages
//!
//! The page template is opaque text with `{{TOKEN}}` placeholders:
//!
//! | Token                 | Value                                  |
//! |-----------------------|----------------------------------------|
//! | `{{GA_ID}}`           | `gallery.analytics_id`                 |
//! | `{{NAV_ITEMS}}`       | one link per gallery page              |
//! | `{{GALLERY_TITLE}}`   | entry label, escaped                   |
//! | `{{GALLERY_HEADING}}` | label + `gallery.heading_suffix`       |
//! | `{{GALLERY_IMAGES}}`  | one `<img>` per image, deduplicated    |
//!
//! Substitution is a single left-to-right pass; substituted text is never
//! rescanned and unknown tokens are copied through.
//!
//! ## Landing document
//!
//! Two regions delimited by marker comments are replaced verbatim. Bytes
//! outside the regions are never touched. A missing marker aborts the run.
//!
//! Markup uses [maud](https://maud.lambda.xyz/), so labels and captions are
//! escaped on the way out.

use crate::catalog::CatalogEntry;
use crate::config::GalleryConfig;
use crate::paths::{encode_path, filename_key, image_exists, relative_image_path};
use crate::types::ImageRecord;
use maud::{Markup, PreEscaped, html};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("landing document has no {marker} marker (or it is out of order)")]
    MissingMarker { marker: &'static str },
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A start/end comment pair delimiting a replaceable region.
#[derive(Debug, Clone, Copy)]
pub struct Markers {
    pub start: &'static str,
    pub end: &'static str,
}

pub const NAV_MARKERS: Markers = Markers {
    start: "<!-- GALLERY_NAV_START -->",
    end: "<!-- GALLERY_NAV_END -->",
};

pub const CARD_MARKERS: Markers = Markers {
    start: "<!-- GALLERY_CARDS_START -->",
    end: "<!-- GALLERY_CARDS_END -->",
};

const INDENT: &str = "            ";

/// One rendered gallery page, ready to write.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub file_name: String,
    pub label: String,
    /// Images on the page after dedup.
    pub images: usize,
    pub html: String,
}

// ============================================================================
// Shared pieces
// ============================================================================

/// Drop images whose filename was already seen, keeping the first.
pub fn dedupe_by_filename<'a>(images: &[&'a ImageRecord]) -> Vec<&'a ImageRecord> {
    let mut seen = BTreeSet::new();
    images
        .iter()
        .copied()
        .filter(|record| seen.insert(filename_key(&record.key)))
        .collect()
}

fn escaped(text: &str) -> String {
    html! { (text) }.into_string()
}

fn indent_lines(markup: &str) -> String {
    markup
        .lines()
        .map(|line| format!("{INDENT}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Navigation links, one per entry with a page, blank-line separated.
pub fn render_nav(entries: &[&CatalogEntry<'_>], gallery: &GalleryConfig) -> String {
    entries
        .iter()
        .map(|entry| {
            let link = html! {
                a href=(entry.definition.page_name(gallery)) { (entry.label()) }
            };
            format!("{INDENT}{}", link.into_string())
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ============================================================================
// Gallery pages
// ============================================================================

fn image_tag(record: &ImageRecord, alt: &str, eager: bool) -> Markup {
    let (width, height) = record.dimensions().unzip();
    html! {
        img src=(record.encoded_src)
            alt=(alt)
            loading=(if eager { "eager" } else { "lazy" })
            decoding="async"
            fetchpriority=[eager.then_some("high")]
            width=[width]
            height=[height];
    }
}

/// The `{{GALLERY_IMAGES}}` block for one entry.
pub fn render_images(entry: &CatalogEntry<'_>, gallery: &GalleryConfig) -> String {
    dedupe_by_filename(&entry.images)
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            let alt = if record.caption.is_empty() {
                format!("{} {}", entry.label(), i + 1)
            } else {
                record.caption.clone()
            };
            let tag = image_tag(record, &alt, i < gallery.eager_images);
            format!("{INDENT}{}", tag.into_string())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Replace `{{NAME}}` tokens in one pass.
pub fn fill_template(template: &str, tokens: &BTreeMap<&str, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let known = after
            .find("}}")
            .and_then(|end| tokens.get(&after[..end]).map(|value| (end, value)));
        match known {
            Some((end, value)) => {
                out.push_str(value);
                rest = &after[end + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Render the page for one entry. `nav` is shared by every page.
pub fn render_page(
    template: &str,
    entry: &CatalogEntry<'_>,
    nav: &str,
    gallery: &GalleryConfig,
) -> RenderedPage {
    let images = render_images(entry, gallery);
    let tokens = BTreeMap::from([
        ("GA_ID", gallery.analytics_id.clone()),
        ("NAV_ITEMS", nav.to_string()),
        ("GALLERY_TITLE", escaped(entry.label())),
        (
            "GALLERY_HEADING",
            escaped(&format!("{}{}", entry.label(), gallery.heading_suffix)),
        ),
        ("GALLERY_IMAGES", images),
    ]);
    RenderedPage {
        file_name: entry.definition.page_name(gallery),
        label: entry.label().to_string(),
        images: dedupe_by_filename(&entry.images).len(),
        html: fill_template(template, &tokens),
    }
}

// ============================================================================
// Landing document
// ============================================================================

/// Cover source for a card: the declared cover when that file exists,
/// else the first image.
fn card_cover(
    root: &Path,
    entry: &CatalogEntry<'_>,
    first: &ImageRecord,
) -> Result<String, GenerateError> {
    if let Some(cover) = entry.definition.cover.as_deref() {
        let relative = relative_image_path(cover);
        let exists = !relative.is_empty()
            && image_exists(root, &relative).map_err(|source| GenerateError::Io {
                path: root.join(&relative),
                source,
            })?;
        if exists {
            return Ok(encode_path(&relative));
        }
    }
    Ok(first.encoded_src.clone())
}

fn card(
    root: &Path,
    entry: &CatalogEntry<'_>,
    gallery: &GalleryConfig,
) -> Result<Option<Markup>, GenerateError> {
    let images = dedupe_by_filename(&entry.images);
    let Some(first) = images.first() else {
        return Ok(None);
    };
    let cover = card_cover(root, entry, first)?;
    let data_images = images
        .iter()
        .map(|r| r.encoded_src.as_str())
        .collect::<Vec<_>>()
        .join("|");
    let label = entry.label();

    Ok(Some(html! {
        article.album-card {
            "\n    "
            a.album-link href=(entry.definition.page_name(gallery)) data-images=(data_images) {
                "\n        "
                img src=(cover) alt={ (label) " preview" };
                "\n        "
                span.album-title { (label) }
                "\n    "
            }
            "\n    "
            div.album-content {
                "\n        "
                p {
                    @if let Some(description) = &entry.definition.description {
                        (PreEscaped(description))
                    } @else {
                        "A selection from the " (label) " gallery."
                    }
                }
                "\n    "
            }
            "\n"
        }
    }))
}

/// Preview cards, one per entry with images.
pub fn render_cards(
    root: &Path,
    entries: &[&CatalogEntry<'_>],
    gallery: &GalleryConfig,
) -> Result<String, GenerateError> {
    let mut cards = Vec::new();
    for entry in entries {
        if let Some(markup) = card(root, entry, gallery)? {
            cards.push(indent_lines(&markup.into_string()));
        }
    }
    Ok(cards.join("\n"))
}

/// Replace the text between a marker pair with `\n{content}\n`.
pub fn replace_section(
    document: &str,
    markers: Markers,
    content: &str,
) -> Result<String, GenerateError> {
    let start = document
        .find(markers.start)
        .ok_or(GenerateError::MissingMarker {
            marker: markers.start,
        })?;
    let body_start = start + markers.start.len();
    let end = document[body_start..]
        .find(markers.end)
        .map(|offset| body_start + offset)
        .ok_or(GenerateError::MissingMarker {
            marker: markers.end,
        })?;
    Ok(format!(
        "{}\n{}\n{}",
        &document[..body_start],
        content,
        &document[end..]
    ))
}

/// Rewrite both marked regions of the landing document.
pub fn render_landing(document: &str, nav: &str, cards: &str) -> Result<String, GenerateError> {
    let with_nav = replace_section(document, NAV_MARKERS, nav)?;
    replace_section(&with_nav, CARD_MARKERS, cards)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TagDefinition;
    use std::fs;
    use tempfile::TempDir;

    fn record(key: &str, caption: &str, dims: Option<(u32, u32)>) -> ImageRecord {
        ImageRecord {
            source_path: key.to_string(),
            key: key.to_string(),
            encoded_src: encode_path(key),
            caption: caption.to_string(),
            tags: Vec::new(),
            tag_keys: BTreeSet::new(),
            capture_date: String::new(),
            camera: String::new(),
            lens: String::new(),
            width: dims.map(|d| d.0),
            height: dims.map(|d| d.1),
        }
    }

    fn entry<'a>(label: &str, images: Vec<&'a ImageRecord>) -> CatalogEntry<'a> {
        CatalogEntry {
            definition: TagDefinition {
                key: label.to_lowercase(),
                label: label.to_string(),
                slug: label.to_lowercase().replace(' ', "-"),
                order: None,
                hidden: false,
                cover: None,
                description: None,
            },
            images,
        }
    }

    const LANDING: &str = "<html>\n<nav>\n<!-- GALLERY_NAV_START -->\nold nav\n<!-- GALLERY_NAV_END -->\n</nav>\n<main><!-- GALLERY_CARDS_START --><p>old</p><!-- GALLERY_CARDS_END --></main>\n</html>\n";

    // =========================================================================
    // Dedup
    // =========================================================================

    #[test]
    fn dedup_keeps_first_of_same_filename() {
        let a = record("images/street/one.jpg", "first", None);
        let b = record("images/travel/one.jpg", "second", None);
        let c = record("images/travel/two.jpg", "", None);
        let kept = dedupe_by_filename(&[&a, &b, &c]);
        let keys: Vec<&str> = kept.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["images/street/one.jpg", "images/travel/two.jpg"]);
    }

    // =========================================================================
    // Image markup
    // =========================================================================

    #[test]
    fn alt_text_uses_caption_or_numbered_label() {
        let a = record("images/a.jpg", "Harbour at dusk", None);
        let b = record("images/b.jpg", "", None);
        let html = render_images(&entry("Street", vec![&a, &b]), &GalleryConfig::default());
        assert!(html.contains(r#"alt="Harbour at dusk""#));
        assert!(html.contains(r#"alt="Street 2""#));
    }

    #[test]
    fn placeholder_numbering_follows_dedup() {
        let a = record("images/x/a.jpg", "", None);
        let dup = record("images/y/a.jpg", "", None);
        let b = record("images/b.jpg", "", None);
        let html = render_images(&entry("Night", vec![&a, &dup, &b]), &GalleryConfig::default());
        assert_eq!(html.lines().count(), 2);
        assert!(html.contains(r#"alt="Night 2""#));
        assert!(!html.contains("Night 3"));
    }

    #[test]
    fn first_images_load_eagerly() {
        let records: Vec<ImageRecord> = (0..10)
            .map(|i| record(&format!("images/{i}.jpg"), "", None))
            .collect();
        let refs: Vec<&ImageRecord> = records.iter().collect();
        let html = render_images(&entry("All", refs), &GalleryConfig::default());
        assert_eq!(html.matches(r#"loading="eager""#).count(), 8);
        assert_eq!(html.matches(r#"fetchpriority="high""#).count(), 8);
        assert_eq!(html.matches(r#"loading="lazy""#).count(), 2);
    }

    #[test]
    fn eager_count_is_configurable() {
        let a = record("images/a.jpg", "", None);
        let b = record("images/b.jpg", "", None);
        let gallery = GalleryConfig {
            eager_images: 1,
            ..GalleryConfig::default()
        };
        let html = render_images(&entry("All", vec![&a, &b]), &gallery);
        assert_eq!(html.matches(r#"loading="eager""#).count(), 1);
    }

    #[test]
    fn dimensions_only_when_known() {
        let a = record("images/a.jpg", "", Some((6000, 4000)));
        let b = record("images/b.jpg", "", None);
        let html = render_images(&entry("Street", vec![&a, &b]), &GalleryConfig::default());
        let lines: Vec<&str> = html.lines().collect();
        assert!(lines[0].contains(r#"width="6000" height="4000""#));
        assert!(!lines[1].contains("width="));
    }

    #[test]
    fn captions_are_escaped() {
        let a = record("images/a.jpg", r#"Fish & "chips" <b>"#, None);
        let html = render_images(&entry("Food", vec![&a]), &GalleryConfig::default());
        assert!(html.contains("Fish &amp; &quot;chips&quot; &lt;b&gt;"));
    }

    #[test]
    fn src_is_encoded() {
        let a = record("images/My Trip/a b.jpg", "", None);
        let html = render_images(&entry("Trip", vec![&a]), &GalleryConfig::default());
        assert!(html.contains(r#"src="images/My%20Trip/a%20b.jpg""#));
    }

    // =========================================================================
    // Templates
    // =========================================================================

    #[test]
    fn fill_template_is_single_pass() {
        let tokens = BTreeMap::from([
            ("A", "{{B}}".to_string()),
            ("B", "bee".to_string()),
        ]);
        assert_eq!(fill_template("<{{A}}|{{B}}>", &tokens), "<{{B}}|bee>");
    }

    #[test]
    fn fill_template_keeps_unknown_tokens() {
        let tokens = BTreeMap::from([("A", "x".to_string())]);
        assert_eq!(
            fill_template("{{A}} {{UNKNOWN}} {{A", &tokens),
            "x {{UNKNOWN}} {{A"
        );
    }

    #[test]
    fn render_page_fills_every_token() {
        let a = record("images/a.jpg", "", None);
        let gallery = GalleryConfig {
            analytics_id: "G-TEST".to_string(),
            ..GalleryConfig::default()
        };
        let street = entry("Rock & Roll", vec![&a]);
        let template = "{{GA_ID}}\n<title>{{GALLERY_TITLE}}</title>\n<nav>{{NAV_ITEMS}}</nav>\n<h2>{{GALLERY_HEADING}}</h2>\n{{GALLERY_IMAGES}}\n";
        let page = render_page(template, &street, "NAV", &gallery);

        assert_eq!(page.file_name, "rock-&-roll-gallery.html");
        assert_eq!(page.images, 1);
        assert!(page.html.starts_with("G-TEST\n"));
        assert!(page.html.contains("<title>Rock &amp; Roll</title>"));
        assert!(page.html.contains("<h2>Rock &amp; Roll Gallery</h2>"));
        assert!(page.html.contains("<nav>NAV</nav>"));
        assert!(page.html.contains(r#"<img src="images/a.jpg""#));
        assert!(!page.html.contains("{{"));
    }

    #[test]
    fn nav_links_every_entry() {
        let a = record("images/a.jpg", "", None);
        let street = entry("Street", vec![&a]);
        let night = entry("Night", vec![&a]);
        let nav = render_nav(&[&street, &night], &GalleryConfig::default());
        assert_eq!(
            nav,
            format!(
                "{INDENT}<a href=\"street-gallery.html\">Street</a>\n\n{INDENT}<a href=\"night-gallery.html\">Night</a>"
            )
        );
    }

    // =========================================================================
    // Landing document
    // =========================================================================

    #[test]
    fn replace_section_keeps_outside_bytes() {
        let out = render_landing(LANDING, "NEW NAV", "NEW CARDS").unwrap();
        assert_eq!(
            out,
            "<html>\n<nav>\n<!-- GALLERY_NAV_START -->\nNEW NAV\n<!-- GALLERY_NAV_END -->\n</nav>\n<main><!-- GALLERY_CARDS_START -->\nNEW CARDS\n<!-- GALLERY_CARDS_END --></main>\n</html>\n"
        );
    }

    #[test]
    fn replace_section_is_idempotent() {
        let once = render_landing(LANDING, "N", "C").unwrap();
        let twice = render_landing(&once, "N", "C").unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn missing_marker_is_an_error() {
        let doc = "<!-- GALLERY_NAV_START --><!-- GALLERY_NAV_END -->";
        let err = render_landing(doc, "n", "c").unwrap_err();
        assert!(matches!(
            err,
            GenerateError::MissingMarker {
                marker: "<!-- GALLERY_CARDS_START -->"
            }
        ));
    }

    #[test]
    fn end_marker_before_start_is_an_error() {
        let doc = "<!-- GALLERY_NAV_END --><!-- GALLERY_NAV_START -->";
        let err = replace_section(doc, NAV_MARKERS, "x").unwrap_err();
        assert!(matches!(
            err,
            GenerateError::MissingMarker {
                marker: "<!-- GALLERY_NAV_END -->"
            }
        ));
    }

    #[test]
    fn card_uses_existing_cover() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("images")).unwrap();
        fs::write(tmp.path().join("images/Cover.jpg"), "x").unwrap();
        let a = record("images/a.jpg", "", None);
        let b = record("images/b.jpg", "", None);
        let mut street = entry("Street", vec![&a, &b]);
        street.definition.cover = Some("/site/images/Cover.jpg".to_string());

        let cards = render_cards(tmp.path(), &[&street], &GalleryConfig::default()).unwrap();
        assert!(cards.contains(r#"<img src="images/Cover.jpg" alt="Street preview">"#));
        assert!(cards.contains(r#"data-images="images/a.jpg|images/b.jpg""#));
        assert!(cards.contains(r#"href="street-gallery.html""#));
        assert!(cards.contains("A selection from the Street gallery."));
    }

    #[test]
    fn card_falls_back_to_first_image() {
        let tmp = TempDir::new().unwrap();
        let a = record("images/a.jpg", "", None);
        let mut street = entry("Street", vec![&a]);
        street.definition.cover = Some("images/missing.jpg".to_string());
        street.definition.description = Some("Walks <em>downtown</em>".to_string());

        let cards = render_cards(tmp.path(), &[&street], &GalleryConfig::default()).unwrap();
        assert!(cards.contains(r#"<img src="images/a.jpg" alt="Street preview">"#));
        assert!(cards.contains("<p>Walks <em>downtown</em></p>"));
    }

    #[test]
    fn cards_skip_empty_entries() {
        let tmp = TempDir::new().unwrap();
        let empty = entry("Empty", Vec::new());
        let cards = render_cards(tmp.path(), &[&empty], &GalleryConfig::default()).unwrap();
        assert!(cards.is_empty());
    }

    #[test]
    fn cards_are_indented_line_by_line() {
        let tmp = TempDir::new().unwrap();
        let a = record("images/a.jpg", "", None);
        let street = entry("Street", vec![&a]);
        let cards = render_cards(tmp.path(), &[&street], &GalleryConfig::default()).unwrap();
        assert!(cards.lines().all(|line| line.starts_with(INDENT)));
        assert!(cards.lines().next().unwrap().ends_with(r#"<article class="album-card">"#));
    }
}
