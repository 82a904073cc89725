//! Target-name construction for the three rename operations.
//!
//! All functions are pure: they take a base file name and return the name the
//! file should have. Returning the input unchanged means "nothing to do".

use camino::Utf8Path;

/// `"{tag} {name}"`
pub fn with_tag(tag: &str, name: &str) -> String {
    format!("{} {}", tag, name)
}

/// `"{prefix} {name}"`, unless the name already starts with that prefix and a space
pub fn with_prefix(name: &str, prefix: &str) -> String {
    let marker = format!("{} ", prefix);
    if name.starts_with(&marker) {
        return name.to_string();
    }
    format!("{}{}", marker, name)
}

/// `"{stem} {suffix}{.ext}"`, unless the stem already ends with a space and the suffix
pub fn with_suffix(name: &str, suffix: &str) -> String {
    let (stem, ext) = split_extension(name);
    let marker = format!(" {}", suffix);
    if stem.ends_with(&marker) {
        return name.to_string();
    }
    format!("{}{}{}", stem, marker, ext)
}

/// Split `name` into stem and extension (with its dot).
///
/// Matches `Utf8Path::file_stem`/`extension`: a leading dot is part of the stem,
/// only the last dot separates.
fn split_extension(name: &str) -> (&str, &str) {
    match Utf8Path::new(name).extension() {
        Some(ext) => name.split_at(name.len() - ext.len() - 1),
        None => (name, ""),
    }
}
