use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::fs::File;
use thiserror::Error;

/// Container formats the renamer works on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    Zip,
    Rar,
    SevenZip,
}

impl ArchiveFormat {
    pub const ALL: [ArchiveFormat; 3] = [ArchiveFormat::Zip, ArchiveFormat::Rar, ArchiveFormat::SevenZip];

    /// Detect the format from a path's extension (case-insensitive)
    pub fn from_path(path: &Utf8Path) -> Option<Self> {
        let ext = path.extension()?.to_ascii_lowercase();
        Self::ALL.into_iter().find(|format| format.extension() == ext)
    }

    /// Extension without the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Rar => "rar",
            ArchiveFormat::SevenZip => "7z",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One archive discovered on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    pub path: Utf8PathBuf,
    pub file_name: String,
    pub format: ArchiveFormat,
}

impl ArchiveFile {
    /// Build from a path, or `None` if it has no file name or an unsupported extension
    pub fn from_path(path: impl Into<Utf8PathBuf>) -> Option<Self> {
        let path = path.into();
        let format = ArchiveFormat::from_path(&path)?;
        let file_name = path.file_name()?.to_string();
        Some(Self {
            path,
            file_name,
            format,
        })
    }
}

/// Errors raised while listing an archive's entries
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Invalid rar archive: {0}")]
    Rar(String),

    #[error("Invalid 7z archive: {0}")]
    SevenZip(String),
}

/// Lists entry names of an archive without extracting it.
///
/// Implementations are shared by every worker in a batch.
#[cfg_attr(test, mockall::automock)]
pub trait EntryLister: Send + Sync {
    fn list_entries(&self, path: &Utf8Path, format: ArchiveFormat) -> Result<Vec<String>, ArchiveError>;
}

/// Default lister backed by the `zip`, `unrar` and `sevenz-rust` crates
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveReader;

impl ArchiveReader {
    pub fn new() -> Self {
        Self
    }

    fn list_zip(path: &Utf8Path) -> Result<Vec<String>, ArchiveError> {
        let file = File::open(path)?;
        let archive = zip::ZipArchive::new(file)?;
        Ok(archive.file_names().map(str::to_owned).collect())
    }

    fn list_rar(path: &Utf8Path) -> Result<Vec<String>, ArchiveError> {
        let archive = unrar::Archive::new(path.as_std_path())
            .open_for_listing()
            .map_err(|e| ArchiveError::Rar(e.to_string()))?;

        let mut names = Vec::new();
        for header in archive {
            let header = header.map_err(|e| ArchiveError::Rar(e.to_string()))?;
            if header.is_directory() {
                continue;
            }
            names.push(header.filename.to_string_lossy().into_owned());
        }
        Ok(names)
    }

    fn list_7z(path: &Utf8Path) -> Result<Vec<String>, ArchiveError> {
        let reader = sevenz_rust::SevenZReader::open(path.as_std_path(), sevenz_rust::Password::empty())
            .map_err(|e| ArchiveError::SevenZip(e.to_string()))?;

        Ok(reader
            .archive()
            .files
            .iter()
            .filter(|entry| !entry.is_directory())
            .map(|entry| entry.name().to_string())
            .collect())
    }
}

impl EntryLister for ArchiveReader {
    fn list_entries(&self, path: &Utf8Path, format: ArchiveFormat) -> Result<Vec<String>, ArchiveError> {
        let entries = match format {
            ArchiveFormat::Zip => Self::list_zip(path)?,
            ArchiveFormat::Rar => Self::list_rar(path)?,
            ArchiveFormat::SevenZip => Self::list_7z(path)?,
        };
        tracing::debug!("Listed {} entries in {}", entries.len(), path);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn utf8_dir(temp_dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ArchiveFormat::from_path(Utf8Path::new("a.zip")), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::from_path(Utf8Path::new("a.RAR")), Some(ArchiveFormat::Rar));
        assert_eq!(ArchiveFormat::from_path(Utf8Path::new("x/a.7Z")), Some(ArchiveFormat::SevenZip));
        assert_eq!(ArchiveFormat::from_path(Utf8Path::new("a.tar")), None);
        assert_eq!(ArchiveFormat::from_path(Utf8Path::new("zip")), None);
    }

    #[test]
    fn test_archive_file_from_path() {
        let file = ArchiveFile::from_path("/data/3D_villa.rar").unwrap();
        assert_eq!(file.file_name, "3D_villa.rar");
        assert_eq!(file.format, ArchiveFormat::Rar);
        assert!(ArchiveFile::from_path("/data/notes.txt").is_none());
    }

    #[test]
    fn test_list_zip_entries() {
        let temp_dir = TempDir::new().unwrap();
        let path = utf8_dir(&temp_dir).join("house.zip");

        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        writer.start_file("docs/readme.txt", options).unwrap();
        writer.write_all(b"hello").unwrap();
        writer.start_file("model.skp", options).unwrap();
        writer.write_all(b"skp").unwrap();
        writer.finish().unwrap();

        let entries = ArchiveReader::new().list_entries(&path, ArchiveFormat::Zip).unwrap();
        assert_eq!(entries, vec!["docs/readme.txt", "model.skp"]);
    }

    #[test]
    fn test_list_7z_entries() {
        let temp_dir = TempDir::new().unwrap();
        let dir = utf8_dir(&temp_dir);
        let source = dir.join("main.skp");
        std::fs::write(&source, b"skp").unwrap();
        let path = dir.join("tower.7z");

        let mut writer = sevenz_rust::SevenZWriter::create(&path).unwrap();
        writer
            .push_archive_entry(
                sevenz_rust::SevenZArchiveEntry::from_path(&source, "model/main.skp".to_string()),
                Some(File::open(&source).unwrap()),
            )
            .unwrap();
        writer.finish().unwrap();

        let entries = ArchiveReader::new().list_entries(&path, ArchiveFormat::SevenZip).unwrap();
        assert_eq!(entries, vec!["model/main.skp"]);
    }

    #[test]
    fn test_list_corrupt_archives_fail() {
        let temp_dir = TempDir::new().unwrap();
        let dir = utf8_dir(&temp_dir);
        let reader = ArchiveReader::new();

        for format in ArchiveFormat::ALL {
            let path = dir.join(format!("broken.{}", format.extension()));
            std::fs::write(&path, b"definitely not an archive").unwrap();
            assert!(
                reader.list_entries(&path, format).is_err(),
                "corrupt {} should fail to list",
                format
            );
        }
    }

    #[test]
    fn test_list_missing_zip_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = utf8_dir(&temp_dir).join("missing.zip");
        let err = ArchiveReader::new().list_entries(&path, ArchiveFormat::Zip).unwrap_err();
        assert!(matches!(err, ArchiveError::Io(_)));
    }
}
