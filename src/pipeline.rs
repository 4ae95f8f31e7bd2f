//! The whole build as two steps: [`plan`] then [`BuildPlan::write`].
//!
//! [`plan`] reads every source, resolves tags, builds the index and catalog,
//! and renders every output into memory. Nothing touches disk until all of
//! that has succeeded, so a malformed source or a missing landing marker
//! leaves the previous site as it was. [`BuildPlan::write`] then writes the
//! image index, the gallery pages and the landing document, in that order.
//!
//! The `check` command stops after [`plan`].

use crate::catalog::Catalog;
use crate::config::{ConfigError, SiteConfig};
use crate::generate::{self, GenerateError};
use crate::index::{self, ImageIndex, IndexError, IndexInputs, IndexStats};
use crate::metadata::{self, MetadataError};
use crate::naming::normalize_tag_key;
use crate::tags::{self, TagError, TagMetaIndex, TagSource};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Tags(#[from] TagError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One catalog entry as shown in the build report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportEntry {
    pub label: String,
    /// Images on the page after dedup.
    pub images: usize,
    /// `None` for entries without images.
    pub page: Option<String>,
}

/// Summary of a planned build, for the user-facing report.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    /// `"global"` or `"legacy"`.
    pub regime: &'static str,
    pub stats: IndexStats,
    pub entries: Vec<ReportEntry>,
    /// Relative to the project root.
    pub index_path: PathBuf,
    pub landing_path: PathBuf,
}

impl BuildReport {
    pub fn pages(&self) -> usize {
        self.entries.iter().filter(|e| e.page.is_some()).count()
    }
}

/// A file to write, with its full contents.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub path: PathBuf,
    pub contents: String,
}

/// Every output of a build, rendered and ordered for writing.
#[derive(Debug, Clone)]
pub struct BuildPlan {
    pub report: BuildReport,
    outputs: Vec<Output>,
}

impl BuildPlan {
    /// Index first, then pages, then the landing document.
    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn write(&self) -> Result<(), BuildError> {
        for output in &self.outputs {
            let io_err = |source| BuildError::Io {
                path: output.path.clone(),
                source,
            };
            if let Some(parent) = output.path.parent() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
            fs::write(&output.path, &output.contents).map_err(io_err)?;
            debug!(path = %output.path.display(), bytes = output.contents.len(), "wrote");
        }
        info!(files = self.outputs.len(), "build written");
        Ok(())
    }
}

fn read_text(path: &Path) -> Result<String, BuildError> {
    fs::read_to_string(path).map_err(|source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load config from `root` and plan the build.
pub fn plan_project(root: &Path) -> Result<BuildPlan, BuildError> {
    let config = crate::config::load_config(root)?;
    plan(root, &config)
}

/// Read, resolve and render everything without writing.
pub fn plan(root: &Path, config: &SiteConfig) -> Result<BuildPlan, BuildError> {
    let paths = &config.paths;
    let gallery = &config.gallery;

    let capture = metadata::read_capture_metadata(&root.join(&paths.capture_metadata))?;
    let captions = metadata::read_captions(&root.join(&paths.captions))?;
    let meta = TagMetaIndex::load(&root.join(&paths.tag_metadata))?;

    let source = TagSource::discover(root, config, &meta)?;
    let resolved = tags::resolve(&source, &meta, gallery)?;

    let exclude_key = normalize_tag_key(&gallery.exclude_tag);
    let image_index = ImageIndex::build(
        root,
        IndexInputs {
            capture: &capture,
            captions: &captions,
            tags: &resolved,
            exclude_key: &exclude_key,
        },
    )?;
    let catalog = Catalog::build(&image_index, &resolved, &meta, gallery);

    let template = read_text(&root.join(&paths.template))?;
    let landing = read_text(&root.join(&paths.landing))?;

    let with_pages: Vec<_> = catalog.pages().collect();
    let nav = generate::render_nav(&with_pages, gallery);
    let pages: Vec<_> = with_pages
        .iter()
        .map(|entry| generate::render_page(&template, entry, &nav, gallery))
        .collect();
    let cards = generate::render_cards(root, &with_pages, gallery)?;
    let landing = generate::render_landing(&landing, &nav, &cards)?;

    let mut outputs = Vec::with_capacity(pages.len() + 2);
    outputs.push(Output {
        path: root.join(&paths.image_index),
        contents: index::render_index_json(image_index.records())?,
    });
    let pages_dir = root.join(&paths.pages_dir);
    outputs.extend(pages.into_iter().map(|page| Output {
        path: pages_dir.join(&page.file_name),
        contents: page.html,
    }));
    outputs.push(Output {
        path: root.join(&paths.landing),
        contents: landing,
    });

    let entries = catalog
        .entries()
        .iter()
        .map(|entry| {
            let images = generate::dedupe_by_filename(&entry.images).len();
            ReportEntry {
                label: entry.label().to_string(),
                images,
                page: (images > 0).then(|| entry.definition.page_name(gallery)),
            }
        })
        .collect();

    Ok(BuildPlan {
        report: BuildReport {
            regime: source.regime(),
            stats: image_index.stats(),
            entries,
            index_path: paths.image_index.clone(),
            landing_path: paths.landing.clone(),
        },
        outputs,
    })
}
