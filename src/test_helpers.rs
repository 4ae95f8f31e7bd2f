//! Shared test utilities.
//!
//! [`sample_project`] copies `fixtures/project/` into a temp directory. The
//! fixture exercises every source at once:
//!
//! | Image                          | Tags                     | Notes                         |
//! |--------------------------------|--------------------------|-------------------------------|
//! | `images/street/Crossing.jpg`   | Street, Night            | dimensions, caption           |
//! | `images/street/Market.jpg`     | Street                   | legacy file says Night        |
//! | `images/night/Lamp.jpg`        | Night                    | flat caption, string dims     |
//! | `images/travel/Crossing.jpg`   | Travel                   | same filename as street one   |
//! | `images/travel/Harbor View.jpg`| Travel, Exclude          | percent-encoded in metadata   |
//! | `images/private/Secret.jpg`    | Exclude, Drafts (hidden) |                               |
//!
//! Plus one orphaned capture entry (`images/gone/Missing.jpg`), one errored
//! entry and one null.
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let project = sample_project();
//! let plan = plan_project(project.path()).unwrap();
//! let page = find_output(&plan, "street-gallery.html");
//! assert_eq!(image_srcs(page), vec!["images/street/Crossing.jpg", "images/street/Market.jpg"]);
//! ```

use std::path::Path;
use tempfile::TempDir;

use crate::pipeline::BuildPlan;

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/project/` to a temp directory and return it.
pub fn sample_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/project");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

// =========================================================================
// Plan lookups (panic with a clear message on miss)
// =========================================================================

/// Contents of the planned output whose file name is `name`.
pub fn find_output<'a>(plan: &'a BuildPlan, name: &str) -> &'a str {
    plan.outputs()
        .iter()
        .find(|o| o.path.file_name().is_some_and(|f| f == name))
        .map(|o| o.contents.as_str())
        .unwrap_or_else(|| {
            let names: Vec<String> = plan
                .outputs()
                .iter()
                .map(|o| o.path.display().to_string())
                .collect();
            panic!("output '{name}' not planned. Available: {names:?}")
        })
}

/// `src` attribute of every `<img>` on a gallery page, in order.
pub fn image_srcs(html: &str) -> Vec<&str> {
    html.lines()
        .filter_map(|line| line.trim_start().strip_prefix("<img src=\""))
        .filter_map(|rest| rest.split('"').next())
        .collect()
}
