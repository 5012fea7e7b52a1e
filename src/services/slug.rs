//! Copy-slug suffixing
//!
//! `about` becomes `about-copy`, `about-copy` becomes `about-copy-2`,
//! `about-copy-2` becomes `about-copy-3`.

use once_cell::sync::Lazy;
use regex::Regex;

static COPY_SLUG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^.*-copy(?:-(\d+)*)?$").expect("valid copy slug pattern"));

/// The slug to try after `slug` turned out to be taken
pub fn next_copy_slug(slug: &str) -> String {
    let Some(captures) = COPY_SLUG.captures(slug) else {
        return format!("{}-copy", slug);
    };

    let number = captures
        .get(1)
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .and_then(|n| n.checked_add(1));

    match (number, slug.rsplit_once('-')) {
        (Some(next), Some((head, _))) => format!("{}-{}", head, next),
        _ => format!("{}-2", slug),
    }
}

/// Split a title path into its parent path and last segment
pub fn split_path(path: &str) -> (&str, &str) {
    path.rsplit_once('/').unwrap_or(("", path))
}

/// Inverse of `split_path`
pub fn join_path(base: &str, slug: &str) -> String {
    if base.is_empty() {
        slug.to_string()
    } else {
        format!("{}/{}", base, slug)
    }
}
