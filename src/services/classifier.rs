use crate::models::{ExtensionTagMap, RenameSettings, normalize_extension};
use crate::services::archive::{ArchiveError, ArchiveFile, EntryLister};
use crate::services::naming;
use camino::Utf8Path;
use regex::Regex;

/// Where a tag was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagSource {
    Filename,
    Content,
}

/// Result of classifying one archive
#[derive(Debug)]
pub enum Classification {
    Tagged { tag: String, source: TagSource },
    /// Neither the filename nor any archive entry matched
    Untagged,
    /// No filename match and the archive could not be listed
    Unreadable(ArchiveError),
}

impl Classification {
    pub fn tag(&self) -> Option<&str> {
        match self {
            Classification::Tagged { tag, .. } => Some(tag),
            _ => None,
        }
    }
}

/// Decides an archive's category tag.
///
/// The vocabulary is the configured tag list followed by any tag that only
/// appears as an extension mapping, so every tag the classifier can return is
/// also one it recognizes and strips on a later run.
///
/// # Fields
///
/// - `leading_tag`: matches one vocabulary tag at the start of a name followed
///   by at least one separator (whitespace, `_` or `-`). `None` when the
///   vocabulary is empty.
#[derive(Debug, Clone)]
pub struct Classifier {
    vocabulary: Vec<String>,
    extension_tags: ExtensionTagMap,
    leading_tag: Option<Regex>,
}

impl Classifier {
    pub fn new(tags: &[String], extension_tags: ExtensionTagMap) -> Result<Self, regex::Error> {
        let mut vocabulary: Vec<String> = Vec::new();
        let mapped = extension_tags.tags();
        for tag in tags.iter().map(String::as_str).chain(mapped) {
            if !tag.is_empty() && !vocabulary.iter().any(|t| t == tag) {
                vocabulary.push(tag.to_string());
            }
        }

        let leading_tag = if vocabulary.is_empty() {
            None
        } else {
            let alternatives: Vec<String> = vocabulary.iter().map(|t| regex::escape(t)).collect();
            Some(Regex::new(&format!(r"^(?:{})[\s_\-]+", alternatives.join("|")))?)
        };

        Ok(Self {
            vocabulary,
            extension_tags,
            leading_tag,
        })
    }

    pub fn from_settings(settings: &RenameSettings) -> Result<Self, regex::Error> {
        Self::new(&settings.tags, settings.extension_tags.clone())
    }

    /// Tags in priority order
    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    /// First vocabulary tag occurring anywhere in the file name
    pub fn tag_from_filename(&self, file_name: &str) -> Option<&str> {
        self.vocabulary
            .iter()
            .find(|tag| file_name.contains(tag.as_str()))
            .map(String::as_str)
    }

    /// Tag mapped from the extension of the first matching entry
    pub fn tag_from_entries<'a, I>(&self, entries: I) -> Option<&str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        entries.into_iter().find_map(|entry| {
            let ext = Utf8Path::new(entry).extension()?;
            let ext = normalize_extension(ext)?;
            self.extension_tags.get(&ext)
        })
    }

    /// Classify an archive, only listing its contents when the filename is inconclusive
    pub fn classify(&self, file: &ArchiveFile, lister: &dyn EntryLister) -> Classification {
        if let Some(tag) = self.tag_from_filename(&file.file_name) {
            return Classification::Tagged {
                tag: tag.to_string(),
                source: TagSource::Filename,
            };
        }

        let entries = match lister.list_entries(&file.path, file.format) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!("Could not list {}: {}", file.path, e);
                return Classification::Unreadable(e);
            }
        };

        match self.tag_from_entries(entries.iter().map(String::as_str)) {
            Some(tag) => Classification::Tagged {
                tag: tag.to_string(),
                source: TagSource::Content,
            },
            None => Classification::Untagged,
        }
    }

    /// Remove one leading vocabulary tag and its separators
    pub fn strip_tag<'a>(&self, file_name: &'a str) -> &'a str {
        match &self.leading_tag {
            Some(re) => match re.find(file_name) {
                Some(m) => &file_name[m.end()..],
                None => file_name,
            },
            None => file_name,
        }
    }

    /// Name a file should carry once tagged: `"{tag} {stripped_name}"`
    pub fn tagged_name(&self, tag: &str, file_name: &str) -> String {
        naming::with_tag(tag, self.strip_tag(file_name))
    }
}
