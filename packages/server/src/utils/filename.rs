use std::collections::HashSet;

/// Longest filename accepted for a stored file.
pub const MAX_FILENAME_LEN: usize = 255;

/// Why a filename was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FilenameError {
    #[error("Filename cannot be empty")]
    Empty,
    #[error("Filename exceeds 255 bytes")]
    TooLong,
    #[error("Invalid filename: path separators are not allowed")]
    ContainsPathSeparator,
    #[error("Invalid filename: '..' is not allowed")]
    PathTraversal,
    #[error("Invalid filename: null bytes are not allowed")]
    NullByte,
    #[error("Invalid filename: hidden files (starting with '.') are not allowed")]
    Hidden,
    /// CR/LF and friends would let a name inject headers via Content-Disposition.
    #[error("Invalid filename: control characters are not allowed")]
    ControlCharacter,
}

/// Validates a flat filename (no directory components allowed).
pub fn validate_flat_filename(filename: &str) -> Result<&str, FilenameError> {
    let trimmed = filename.trim();

    if trimmed.is_empty() {
        return Err(FilenameError::Empty);
    }

    if trimmed.len() > MAX_FILENAME_LEN {
        return Err(FilenameError::TooLong);
    }

    if trimmed.contains('\0') {
        return Err(FilenameError::NullByte);
    }

    if trimmed.chars().any(|c| c.is_ascii_control()) {
        return Err(FilenameError::ControlCharacter);
    }

    if trimmed.contains('/') || trimmed.contains('\\') {
        return Err(FilenameError::ContainsPathSeparator);
    }

    if trimmed == ".." {
        return Err(FilenameError::PathTraversal);
    }

    if trimmed.starts_with('.') {
        return Err(FilenameError::Hidden);
    }

    Ok(trimmed)
}

/// Split a filename into stem and extension at the last dot.
///
/// `archive.tar.gz` splits into `("archive.tar", Some("gz"))`; a name with
/// no dot, or only a leading dot, has no extension.
pub fn split_extension(filename: &str) -> (&str, Option<&str>) {
    match filename.rfind('.') {
        Some(pos) if pos > 0 => (&filename[..pos], Some(&filename[pos + 1..])),
        _ => (filename, None),
    }
}

/// The `n`-th collision variant of a filename: `a.txt` becomes `a_n.txt`.
pub fn with_suffix(filename: &str, n: u32) -> String {
    match split_extension(filename) {
        (stem, Some(ext)) => format!("{stem}_{n}.{ext}"),
        (stem, None) => format!("{stem}_{n}"),
    }
}

/// First name in the sequence `name`, `name_1`, `name_2`, ... not in `taken`.
pub fn next_available(filename: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(filename) {
        return filename.to_string();
    }
    (1..)
        .map(|n| with_suffix(filename, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| filename.to_string())
}

/// Build a safe `Content-Disposition` header value.
pub fn content_disposition_value(filename: &str, disposition: &str) -> String {
    let ascii_safe: String = filename
        .chars()
        .filter(|c| c.is_ascii_graphic() && !matches!(c, '"' | ';' | '\\'))
        .collect();
    let ascii_name = if ascii_safe.is_empty() {
        "download".to_string()
    } else {
        ascii_safe
    };

    // RFC 5987 percent-encoding for filename*.
    let encoded: String = filename
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'!'
            | b'#'
            | b'$'
            | b'&'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~' => String::from(b as char),
            _ => format!("%{b:02X}"),
        })
        .collect();

    format!("{disposition}; filename=\"{ascii_name}\"; filename*=UTF-8''{encoded}")
}
