use chrono::{Local, NaiveDateTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default upper bound on worker count when none is configured
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Date/time placeholders expanded when a preset is resolved, with their formats
pub const DATE_PLACEHOLDERS: [(&str, &str); 3] = [
    ("{datetime}", "%Y%m%d_%H%M%S"),
    ("{date}", "%Y%m%d"),
    ("{time}", "%H%M%S"),
];

/// Replace `{date}`, `{time}` and `{datetime}` in preset text with stamps for `now`
pub fn expand_placeholders(text: &str, now: NaiveDateTime) -> String {
    DATE_PLACEHOLDERS
        .iter()
        .fold(text.to_string(), |acc, &(placeholder, format)| {
            acc.replace(placeholder, &now.format(format).to_string())
        })
}

/// Errors raised when editing the rename settings
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("Extension must not be empty")]
    EmptyExtension,

    #[error("Tag must not be empty")]
    EmptyTag,

    #[error("Tag {0:?} must not contain whitespace")]
    TagContainsWhitespace(String),

    #[error("Concurrency must be at least 1")]
    ZeroConcurrency,
}

/// Normalize an extension key: trimmed, lowercase, with a leading dot.
///
/// Returns `None` for input that is empty once the dot and whitespace are removed.
pub fn normalize_extension(ext: &str) -> Option<String> {
    let trimmed = ext.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return None;
    }
    Some(format!(".{}", trimmed.to_lowercase()))
}

fn validate_tag(tag: &str) -> Result<String, ConfigValidationError> {
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(ConfigValidationError::EmptyTag);
    }
    if tag.chars().any(char::is_whitespace) {
        return Err(ConfigValidationError::TagContainsWhitespace(tag.to_string()));
    }
    Ok(tag.to_string())
}

/// Lookup from archive entry extension (".skp") to tag ("SU").
///
/// Keys are always stored normalized, so lookups only need to lowercase the
/// entry extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtensionTagMap(IndexMap<String, String>);

impl ExtensionTagMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Insert or replace a mapping, returning the previous tag for the extension
    pub fn insert(&mut self, ext: &str, tag: &str) -> Result<Option<String>, ConfigValidationError> {
        let ext = normalize_extension(ext).ok_or(ConfigValidationError::EmptyExtension)?;
        let tag = validate_tag(tag)?;
        Ok(self.0.insert(ext, tag))
    }

    /// Remove a mapping, preserving the order of the remaining entries
    pub fn remove(&mut self, ext: &str) -> Option<String> {
        let ext = normalize_extension(ext)?;
        self.0.shift_remove(&ext)
    }

    /// Look up the tag for an already-normalized extension
    pub fn get(&self, ext: &str) -> Option<&str> {
        self.0.get(ext).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Distinct tags in first-seen order
    pub fn tags(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for tag in self.0.values() {
            if !seen.contains(&tag.as_str()) {
                seen.push(tag);
            }
        }
        seen
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Re-normalize keys loaded from a hand-edited file, dropping invalid rows
    pub fn normalized(self) -> Self {
        let mut out = Self::new();
        for (ext, tag) in self.0 {
            if let Err(e) = out.insert(&ext, &tag) {
                tracing::warn!("Ignoring invalid extension mapping {:?} -> {:?}: {}", ext, tag, e);
            }
        }
        out
    }
}

impl Default for ExtensionTagMap {
    fn default() -> Self {
        let mut map = IndexMap::new();
        map.insert(".skp".to_string(), "SU".to_string());
        map.insert(".max".to_string(), "3D".to_string());
        map.insert(".dwg".to_string(), "CAD".to_string());
        Self(map)
    }
}

/// User configuration from `Archive Tagger.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(rename = "Rename_Settings", default)]
    pub settings: RenameSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenameSettings {
    /// Known tags in priority order
    #[serde(rename = "Tags", default = "default_tags")]
    pub tags: Vec<String>,

    #[serde(rename = "Extension Tags", default)]
    pub extension_tags: ExtensionTagMap,

    #[serde(rename = "Prefix", default)]
    pub prefix: String,

    #[serde(rename = "Suffix", default)]
    pub suffix: String,

    #[serde(rename = "Prefix Presets", default = "default_prefix_presets")]
    pub prefix_presets: IndexMap<String, String>,

    #[serde(rename = "Suffix Presets", default = "default_suffix_presets")]
    pub suffix_presets: IndexMap<String, String>,

    #[serde(rename = "Concurrency", default)]
    pub concurrency: Option<usize>,

    #[serde(rename = "Debug Mode", default)]
    pub debug_mode: bool,
}

impl Default for RenameSettings {
    fn default() -> Self {
        Self {
            tags: default_tags(),
            extension_tags: ExtensionTagMap::default(),
            prefix: String::new(),
            suffix: String::new(),
            prefix_presets: default_prefix_presets(),
            suffix_presets: default_suffix_presets(),
            concurrency: None,
            debug_mode: false,
        }
    }
}

fn default_tags() -> Vec<String> {
    vec!["3D".to_string(), "SU".to_string(), "CAD".to_string()]
}

fn default_prefix_presets() -> IndexMap<String, String> {
    let mut presets = IndexMap::new();
    presets.insert("Date".to_string(), "{date}".to_string());
    presets.insert("Time".to_string(), "{time}".to_string());
    presets.insert("DateTime".to_string(), "{datetime}".to_string());
    presets.insert("Version".to_string(), "V1.0".to_string());
    presets.insert("Draft".to_string(), "Draft".to_string());
    presets.insert("Final".to_string(), "Final".to_string());
    presets
}

fn default_suffix_presets() -> IndexMap<String, String> {
    let mut presets = IndexMap::new();
    presets.insert("Modified Date".to_string(), "{date}".to_string());
    presets.insert("Version".to_string(), "v1.0".to_string());
    presets.insert("Status".to_string(), "Done".to_string());
    presets.insert("Review".to_string(), "Pending Review".to_string());
    presets.insert("Backup".to_string(), "backup".to_string());
    presets
}

impl RenameSettings {
    /// Map an archive entry extension to a tag
    pub fn set_extension_tag(&mut self, ext: &str, tag: &str) -> Result<Option<String>, ConfigValidationError> {
        self.extension_tags.insert(ext, tag)
    }

    pub fn remove_extension_tag(&mut self, ext: &str) -> Option<String> {
        self.extension_tags.remove(ext)
    }

    /// Append a tag to the vocabulary; returns false if it was already known
    pub fn add_tag(&mut self, tag: &str) -> Result<bool, ConfigValidationError> {
        let tag = validate_tag(tag)?;
        if self.tags.contains(&tag) {
            return Ok(false);
        }
        self.tags.push(tag);
        Ok(true)
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag.trim());
        self.tags.len() != before
    }

    pub fn set_concurrency(&mut self, concurrency: usize) -> Result<(), ConfigValidationError> {
        if concurrency == 0 {
            return Err(ConfigValidationError::ZeroConcurrency);
        }
        self.concurrency = Some(concurrency);
        Ok(())
    }

    /// Resolve a preset label to its text, stamping date placeholders with the current local time
    pub fn prefix_preset(&self, label: &str) -> Option<String> {
        self.prefix_preset_at(label, Local::now().naive_local())
    }

    pub fn suffix_preset(&self, label: &str) -> Option<String> {
        self.suffix_preset_at(label, Local::now().naive_local())
    }

    pub fn prefix_preset_at(&self, label: &str, now: NaiveDateTime) -> Option<String> {
        self.prefix_presets
            .get(label)
            .map(|text| expand_placeholders(text, now))
    }

    pub fn suffix_preset_at(&self, label: &str, now: NaiveDateTime) -> Option<String> {
        self.suffix_presets
            .get(label)
            .map(|text| expand_placeholders(text, now))
    }

    /// Effective worker count for a batch.
    ///
    /// An explicit request wins over the configured value. Without either, the
    /// default is `min(DEFAULT_CONCURRENCY, available parallelism)`. The result
    /// is always clamped to `1..=available parallelism`.
    pub fn resolve_concurrency(&self, requested: Option<usize>) -> usize {
        resolve_concurrency(requested.or(self.concurrency), available_parallelism())
    }
}

fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

pub(crate) fn resolve_concurrency(requested: Option<usize>, available: usize) -> usize {
    let available = available.max(1);
    requested
        .unwrap_or(DEFAULT_CONCURRENCY.min(available))
        .clamp(1, available)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rename_settings_defaults() {
        let settings = RenameSettings::default();
        assert_eq!(settings.tags, vec!["3D", "SU", "CAD"]);
        assert_eq!(settings.extension_tags.len(), 3);
        assert_eq!(settings.extension_tags.get(".skp"), Some("SU"));
        assert_eq!(settings.extension_tags.get(".max"), Some("3D"));
        assert_eq!(settings.extension_tags.get(".dwg"), Some("CAD"));
        assert!(settings.concurrency.is_none());
        assert!(!settings.debug_mode);
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension("skp").as_deref(), Some(".skp"));
        assert_eq!(normalize_extension(" .DWG ").as_deref(), Some(".dwg"));
        assert_eq!(normalize_extension("."), None);
        assert_eq!(normalize_extension("   "), None);
    }

    #[test]
    fn test_extension_map_insert_normalizes() {
        let mut map = ExtensionTagMap::new();
        assert_eq!(map.insert("RVT", "BIM").unwrap(), None);
        assert_eq!(map.get(".rvt"), Some("BIM"));

        let previous = map.insert(".rvt", "REVIT").unwrap();
        assert_eq!(previous.as_deref(), Some("BIM"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_extension_map_rejects_invalid() {
        let mut map = ExtensionTagMap::new();
        assert_eq!(map.insert("", "SU"), Err(ConfigValidationError::EmptyExtension));
        assert_eq!(map.insert(".skp", "  "), Err(ConfigValidationError::EmptyTag));
        assert!(matches!(
            map.insert(".skp", "Sketch Up"),
            Err(ConfigValidationError::TagContainsWhitespace(_))
        ));
        assert!(map.is_empty());
    }

    #[test]
    fn test_extension_map_remove_keeps_order() {
        let mut map = ExtensionTagMap::default();
        assert_eq!(map.remove("MAX").as_deref(), Some("3D"));
        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![".skp", ".dwg"]);
    }

    #[test]
    fn test_extension_map_tags_deduplicated() {
        let mut map = ExtensionTagMap::default();
        map.insert(".3ds", "3D").unwrap();
        map.insert(".rvt", "BIM").unwrap();
        assert_eq!(map.tags(), vec!["SU", "3D", "CAD", "BIM"]);
    }

    #[test]
    fn test_normalized_drops_bad_rows() {
        let yaml = "SKP: SU\n'': CAD\n.max: 3D\n";
        let map: ExtensionTagMap = serde_yaml_ng::from_str(yaml).unwrap();
        let map = map.normalized();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(".skp"), Some("SU"));
        assert_eq!(map.get(".max"), Some("3D"));
    }

    #[test]
    fn test_add_and_remove_tag() {
        let mut settings = RenameSettings::default();
        assert!(settings.add_tag("BIM").unwrap());
        assert!(!settings.add_tag("BIM").unwrap());
        assert_eq!(settings.tags.last().map(String::as_str), Some("BIM"));

        assert!(settings.remove_tag("SU"));
        assert!(!settings.remove_tag("SU"));
        assert_eq!(settings.tags, vec!["3D", "CAD", "BIM"]);
    }

    #[test]
    fn test_presets() {
        let settings = RenameSettings::default();
        assert_eq!(settings.prefix_preset("Draft").as_deref(), Some("Draft"));
        assert_eq!(settings.suffix_preset("Backup").as_deref(), Some("backup"));
        assert_eq!(settings.prefix_preset("Missing"), None);
    }

    fn sample_time() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(9, 5, 2)
            .unwrap()
    }

    #[test]
    fn test_date_presets_expand_at_use_time() {
        let settings = RenameSettings::default();
        let now = sample_time();

        assert_eq!(settings.prefix_preset_at("Date", now).as_deref(), Some("20240307"));
        assert_eq!(settings.prefix_preset_at("Time", now).as_deref(), Some("090502"));
        assert_eq!(
            settings.prefix_preset_at("DateTime", now).as_deref(),
            Some("20240307_090502")
        );
        assert_eq!(
            settings.suffix_preset_at("Modified Date", now).as_deref(),
            Some("20240307")
        );
        // Stored text keeps the placeholder
        assert_eq!(settings.prefix_presets["Date"], "{date}");
    }

    #[test]
    fn test_expand_placeholders_mixed_text() {
        let now = sample_time();
        assert_eq!(expand_placeholders("rev-{date}-{time}", now), "rev-20240307-090502");
        assert_eq!(expand_placeholders("{datetime} {date}", now), "20240307_090502 20240307");
        assert_eq!(expand_placeholders("{year}", now), "{year}");
        assert_eq!(expand_placeholders("plain", now), "plain");
    }

    #[test]
    fn test_set_concurrency_rejects_zero() {
        let mut settings = RenameSettings::default();
        assert_eq!(settings.set_concurrency(0), Err(ConfigValidationError::ZeroConcurrency));
        settings.set_concurrency(2).unwrap();
        assert_eq!(settings.concurrency, Some(2));
    }

    #[test]
    fn test_resolve_concurrency() {
        assert_eq!(resolve_concurrency(None, 16), 4);
        assert_eq!(resolve_concurrency(None, 2), 2);
        assert_eq!(resolve_concurrency(Some(8), 16), 8);
        assert_eq!(resolve_concurrency(Some(64), 16), 16);
        assert_eq!(resolve_concurrency(Some(0), 16), 1);
        assert_eq!(resolve_concurrency(None, 0), 1);
    }

    #[test]
    fn test_resolve_concurrency_prefers_request() {
        let mut settings = RenameSettings::default();
        settings.concurrency = Some(1);
        assert_eq!(settings.resolve_concurrency(None), 1);
        assert!(settings.resolve_concurrency(Some(2)) >= 1);
    }
}
