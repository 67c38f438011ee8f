use std::collections::HashSet;

/// Longest slug produced by [`slugify`], leaving room for a numeric suffix.
pub const MAX_SLUG_LEN: usize = 50;

/// Lower-case, ASCII-alphanumeric, hyphen-separated form of a title.
///
/// Runs of any other characters collapse into a single hyphen; leading
/// and trailing hyphens are dropped. Returns an empty string when the
/// title has no usable characters.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }

    slug.truncate(MAX_SLUG_LEN);
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// First of `base`, `base-1`, `base-2`, ... that is not in `taken`.
pub fn next_available(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (1..)
        .map(|n: u32| format!("{base}-{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Whether `label` can address a tenant subdomain (DNS label rules).
pub fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 63
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}
