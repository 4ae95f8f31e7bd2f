//! # Tag Gal
//!
//! Tag-driven gallery pages for a static photo site. A folder of photographs,
//! their exiftool metadata and a few hand-edited JSON files go in; one gallery
//! page per tag, a rewritten landing page and a JSON image index come out.
//!
//! # Architecture: One Forward Pass
//!
//! ```text
//! exif.json ──────┐
//! captions.json ──┤
//! tags ───────────┼─→ resolve → index → catalog → render ─→ images.json
//! gallery-meta ───┘                                     ├─→ <slug>-gallery.html
//!                                                       └─→ index.html (markers)
//! ```
//!
//! Every stage takes the previous stage's output by reference and returns a
//! new value. Nothing is cached between runs; the model is rebuilt from the
//! sources each time, and identical inputs give byte-identical outputs.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `config.toml` loading, stock defaults, merging, validation |
//! | [`paths`] | Image reference → canonical key, relative path, encoded src |
//! | [`naming`] | Tag keys, display labels, slugs, tag-list parsing |
//! | [`metadata`] | Readers for capture metadata, captions, tags, tag metadata |
//! | [`tags`] | Tag source selection (global vs legacy) and resolution |
//! | [`index`] | Image records for files that exist, reverse tag index, index JSON |
//! | [`catalog`] | Ordered, visible gallery entries including All Photos |
//! | [`generate`] | Page and landing rendering with Maud |
//! | [`pipeline`] | Plan in memory, then write |
//! | [`output`] | CLI build report |
//! | [`serve`] | Local endpoint persisting edited captions and tags |
//! | [`types`] | [`types::ImageRecord`], the index artifact's shape |
//!
//! # Design Decisions
//!
//! ## Two Tag Regimes, Chosen Once
//!
//! When `data/tags/all-tags.json` exists it is the only tag source. Without
//! it, tags are recovered from previously generated pages and per-page tag
//! files. [`tags::TagSource`] makes that choice once, up front, and each
//! variant has its own resolver, so a consolidated file can never be
//! silently mixed with legacy data.
//!
//! ## Render Everything, Then Write
//!
//! The landing page is edited in place between marker comments. If a marker
//! is missing the run aborts before any file is written, so a half-updated
//! site (new pages, stale landing) cannot happen through this path.
//!
//! ## Missing Files Are Normal
//!
//! Exports get cropped, renamed and deleted. Capture metadata for a file that
//! is no longer on disk is dropped quietly (visible with `RUST_LOG=debug`).
//! A JSON source that exists but does not parse is a hard error.

pub mod catalog;
pub mod config;
pub mod generate;
pub mod index;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod paths;
pub mod pipeline;
pub mod serve;
pub mod tags;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
