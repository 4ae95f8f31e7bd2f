//! Tag identity and display naming.
//!
//! A tag has three faces that must never be confused:
//!
//! - **Key**: the identity used for joins. Case-folded, whitespace-collapsed,
//!   leading `#` stripped. `"#Street  Photo"` and `"street photo"` are the
//!   same tag.
//! - **Label**: what a visitor reads. Inferred from the first raw spelling
//!   seen, title-cased when that spelling was all lowercase.
//! - **Slug**: the URL-safe page name derived from the label.
//!
//! ## Display Labels
//!
//! - `street photo` → "Street Photo"
//! - `black-and-white` → "Black-And-White"
//! - `iPhone shots` → "iPhone shots" (mixed case is kept as typed)

/// Strip leading `#` characters and collapse internal whitespace.
fn clean_tag_text(value: &str) -> String {
    value
        .trim()
        .trim_start_matches('#')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize a raw tag string into its key.
///
/// Returns an empty string for input that carries no tag, which callers treat
/// as "no tag".
pub fn normalize_tag_key(value: &str) -> String {
    clean_tag_text(value).to_lowercase()
}

fn title_case_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Render a raw tag string as a display label.
///
/// All-lowercase input is title-cased word by word, where both spaces and
/// hyphens separate words. Anything with deliberate capitals is kept.
pub fn format_tag_label(value: &str) -> String {
    let cleaned = clean_tag_text(value);
    if cleaned != cleaned.to_lowercase() {
        return cleaned;
    }
    cleaned
        .split(' ')
        .map(|word| {
            word.split('-')
                .map(title_case_word)
                .collect::<Vec<_>>()
                .join("-")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Derive a URL-safe slug from a label.
///
/// - Lowercases ASCII letters
/// - Replaces `&` with `and`
/// - Replaces every run of characters outside `[a-z0-9]` with one dash
/// - Strips leading and trailing dashes
pub fn slugify(value: &str) -> String {
    let lowered = value.trim().to_lowercase().replace('&', "and");
    let mut slug = String::with_capacity(lowered.len());
    let mut prev_dash = false;
    for c in lowered.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
            prev_dash = false;
        } else if !prev_dash {
            slug.push('-');
            prev_dash = true;
        }
    }
    slug.trim_matches('-').to_string()
}

/// Split a raw tag assignment into individual tag strings.
///
/// Commas, semicolons, and newlines all separate tags; blank pieces are
/// dropped. `"Street, Night;\nRain"` → `["Street", "Night", "Rain"]`.
pub fn parse_tag_list(value: &str) -> Vec<String> {
    value
        .split([',', ';', '\n'])
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(String::from)
        .collect()
}
