//! Image path normalization.
//!
//! Every metadata source refers to images differently: exiftool writes OS
//! paths (`C:\Photos\site\images\Trips\IMG_01.JPG`), the caption editor writes
//! browser URLs (`/images/Trips/IMG_01.JPG`), generated pages carry encoded
//! sources (`images/Trips%20Two/IMG_01.JPG`). All of them join on one key.
//!
//! ## The Rule
//!
//! 1. Percent-decode (invalid UTF-8 after decoding keeps the raw input)
//! 2. Backslashes become forward slashes
//! 3. Keep everything from the `images/` of the last `/images/` segment
//!    (matched case-insensitively); without one, strip leading slashes
//! 4. Lowercase
//!
//! Steps 1-3 give the case-preserving [`relative_image_path`], used to find
//! the file on disk and to build the encoded `src`. Step 4 gives the
//! [`normalize_image_path`] key. Both functions must be the only way any
//! module turns a path into a key; a second rule would silently split one
//! image into two.

use std::borrow::Cow;
use std::io;
use std::path::Path;

const IMAGES_SEGMENT: &str = "/images/";

fn percent_decode(value: &str) -> Cow<'_, str> {
    urlencoding::decode(value).unwrap_or(Cow::Borrowed(value))
}

/// Case-preserving project-relative path of an image reference.
///
/// ```text
/// /A/images/Foo/Bar.JPG      → images/Foo/Bar.JPG
/// C:\site\images\a b\c.jpg   → images/a b/c.jpg
/// %2Fimages%2Ffoo%2Fbar.jpg  → images/foo/bar.jpg
/// /photos/x.jpg              → photos/x.jpg
/// ```
pub fn relative_image_path(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let decoded = percent_decode(value).replace('\\', "/");
    // ASCII lowercasing keeps byte offsets aligned with `decoded`.
    match decoded.to_ascii_lowercase().rfind(IMAGES_SEGMENT) {
        Some(index) => decoded[index + 1..].to_string(),
        None => decoded.trim_start_matches('/').to_string(),
    }
}

/// Canonical lookup key for an image reference.
///
/// An empty key means "no image" and never matches anything downstream.
pub fn normalize_image_path(value: &str) -> String {
    relative_image_path(value).to_lowercase()
}

/// Percent-encode each `/`-separated segment of a relative path.
pub fn encode_path(value: &str) -> String {
    value
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Final path segment of a key, used to spot the same photo posted under
/// two directories.
pub fn filename_key(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Whether a relative path names something inside the `images/` tree.
///
/// The path must start at an `images/` segment and never step out of it.
pub fn is_under_image_root(relative: &str) -> bool {
    let mut segments = relative.split('/');
    let starts_at_images = segments
        .next()
        .is_some_and(|first| first.eq_ignore_ascii_case("images"));
    let mut rest = segments.peekable();
    starts_at_images
        && rest.peek().is_some()
        && rest.all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}

/// Check whether a relative image path exists under the image root.
///
/// Paths outside the `images/` tree are absent. Only "not found" counts as
/// absent; any other I/O failure is returned.
pub fn image_exists(root: &Path, relative: &str) -> io::Result<bool> {
    if !is_under_image_root(relative) {
        return Ok(false);
    }
    root.join(relative).try_exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn equivalent_references_share_one_key() {
        let expected = "images/foo/bar.jpg";
        assert_eq!(normalize_image_path("/A/images/Foo/Bar.JPG"), expected);
        assert_eq!(normalize_image_path("images/foo/bar.jpg"), expected);
        assert_eq!(normalize_image_path("%2Fimages%2Ffoo%2Fbar.jpg"), expected);
    }

    #[test]
    fn windows_paths_are_normalized() {
        assert_eq!(
            normalize_image_path(r"C:\Photos\site\images\Trips\IMG_01.JPG"),
            "images/trips/img_01.jpg"
        );
    }

    #[test]
    fn absolute_url_is_normalized() {
        assert_eq!(
            normalize_image_path("https://example.com/images/Trips%20Two/a.jpg"),
            "images/trips two/a.jpg"
        );
    }

    #[test]
    fn last_images_segment_wins() {
        assert_eq!(
            normalize_image_path("/images/archive/images/x.jpg"),
            "images/x.jpg"
        );
    }

    #[test]
    fn images_segment_matched_case_insensitively() {
        assert_eq!(relative_image_path("/site/IMAGES/Foo.jpg"), "IMAGES/Foo.jpg");
    }

    #[test]
    fn no_images_segment_strips_leading_slashes() {
        assert_eq!(normalize_image_path("//photos/X.jpg"), "photos/x.jpg");
    }

    #[test]
    fn empty_input_is_empty_key() {
        assert_eq!(normalize_image_path(""), "");
    }

    #[test]
    fn invalid_utf8_escape_keeps_raw_input() {
        assert_eq!(normalize_image_path("images/%FF.jpg"), "images/%ff.jpg");
    }

    #[test]
    fn relative_path_preserves_case() {
        assert_eq!(
            relative_image_path("/A/images/Foo/Bar.JPG"),
            "images/Foo/Bar.JPG"
        );
    }

    #[test]
    fn encode_path_encodes_segments_not_separators() {
        assert_eq!(
            encode_path("images/Trips Two/a&b.jpg"),
            "images/Trips%20Two/a%26b.jpg"
        );
    }

    #[test]
    fn encoded_path_normalizes_back_to_key() {
        let relative = "images/Trips Two/Bar.JPG";
        assert_eq!(
            normalize_image_path(&encode_path(relative)),
            normalize_image_path(relative)
        );
    }

    #[test]
    fn filename_key_is_last_segment() {
        assert_eq!(filename_key("images/a/b/c.jpg"), "c.jpg");
        assert_eq!(filename_key("c.jpg"), "c.jpg");
    }

    #[test]
    fn image_exists_checks_under_root() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("images/a")).unwrap();
        fs::write(tmp.path().join("images/a/x.jpg"), "fake image").unwrap();

        assert!(image_exists(tmp.path(), "images/a/x.jpg").unwrap());
        assert!(!image_exists(tmp.path(), "images/a/missing.jpg").unwrap());
        assert!(!image_exists(tmp.path(), "").unwrap());
    }

    #[test]
    fn image_root_rejects_paths_outside_images() {
        assert!(is_under_image_root("images/a.jpg"));
        assert!(is_under_image_root("IMAGES/Trips/a.jpg"));
        assert!(!is_under_image_root("index.html"));
        assert!(!is_under_image_root("images/../data/exif.json"));
        assert!(!is_under_image_root("images/./a.jpg"));
        assert!(!is_under_image_root("images//a.jpg"));
        assert!(!is_under_image_root("images/"));
        assert!(!is_under_image_root("images"));
        assert!(!is_under_image_root("photos/images.jpg"));
    }

    #[test]
    fn image_exists_ignores_files_outside_images() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("images")).unwrap();
        fs::write(tmp.path().join("index.html"), "<html>").unwrap();
        assert!(!image_exists(tmp.path(), "index.html").unwrap());
        assert!(!image_exists(tmp.path(), "images/../index.html").unwrap());
    }
}
