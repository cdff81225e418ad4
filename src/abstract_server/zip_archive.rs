use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use zip::result::ZipError;
use zip::ZipArchive;

use super::server_interface::{
    checked_archive_path, ArchiveStore, ErrorDetails, ErrorLayer, Result, ServerError,
};

/// A corrupt archive stays corrupt.
impl From<ZipError> for ServerError {
    fn from(err: ZipError) -> ServerError {
        ServerError::StickyProblem(ErrorDetails {
            layer: ErrorLayer::DataLayer,
            message: err.to_string(),
        })
    }
}

/// Where the archive keeps the artifacts that tree `location`s point at.
pub const DEFAULT_ENTRY_PREFIX: &str = "files/";

/// Serves files out of a zip archive on disk.
///
/// The archive is opened for every request and closed again before the
/// blocking task returns, so replacing the archive file while the server is
/// running is fine.
#[derive(Debug)]
pub struct ZipArchiveStore {
    archive_path: PathBuf,
    entry_prefix: String,
}

impl ZipArchiveStore {
    pub fn new(archive_path: impl Into<PathBuf>, entry_prefix: &str) -> Self {
        ZipArchiveStore {
            archive_path: archive_path.into(),
            entry_prefix: entry_prefix.to_string(),
        }
    }
}

fn open_archive(archive_path: &Path) -> Result<ZipArchive<BufReader<File>>> {
    let file = match File::open(archive_path) {
        Ok(f) => f,
        Err(err) => {
            return Err(ServerError::TransientProblem(ErrorDetails {
                layer: ErrorLayer::ServerLayer,
                message: format!("can't open archive {}: {}", archive_path.display(), err),
            }));
        }
    };
    Ok(ZipArchive::new(BufReader::new(file))?)
}

fn read_entry(archive_path: &Path, entry_name: &str) -> Result<Vec<u8>> {
    let mut archive = open_archive(archive_path)?;
    let mut entry = match archive.by_name(entry_name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => {
            return Err(ServerError::NotFound(entry_name.to_string()));
        }
        Err(err) => return Err(err.into()),
    };
    if entry.is_dir() {
        return Err(ServerError::NotFound(entry_name.to_string()));
    }
    // The size in the header is only a claim; let the read decide.
    let mut contents = Vec::new();
    entry.read_to_end(&mut contents)?;
    Ok(contents)
}

fn list_entries(archive_path: &Path, entry_prefix: &str) -> Result<Vec<String>> {
    let mut archive = open_archive(archive_path)?;
    let mut names = Vec::new();
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        if let Some(rel_path) = entry.name().strip_prefix(entry_prefix) {
            names.push(rel_path.to_string());
        }
    }
    names.sort();
    Ok(names)
}

#[async_trait]
impl ArchiveStore for ZipArchiveStore {
    async fn fetch_file(&self, path: &str) -> Result<Vec<u8>> {
        let entry_name = format!("{}{}", self.entry_prefix, checked_archive_path(path)?);
        let archive_path = self.archive_path.clone();
        let contents =
            tokio::task::spawn_blocking(move || read_entry(&archive_path, &entry_name)).await??;
        debug!(path, bytes = contents.len(), "read archive entry");
        Ok(contents)
    }

    async fn list_files(&self) -> Result<Vec<String>> {
        let archive_path = self.archive_path.clone();
        let entry_prefix = self.entry_prefix.clone();
        tokio::task::spawn_blocking(move || list_entries(&archive_path, &entry_prefix)).await?
    }
}
