//! The deployable code payload: a zip archive holding the indexer executable
//! under the single entry the custom runtime boots.

use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const ARTIFACT_ENTRY: &str = "bootstrap";
const EXECUTABLE_MODE: u32 = 0o755;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("indexer executable is empty")]
    EmptyExecutable,
    #[error("failed to read artifact '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("artifact is not a valid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("artifact must contain exactly one 'bootstrap' entry, found {0:?}")]
    UnexpectedEntries(Vec<String>),
}

/// Zips `executable` as a single executable `bootstrap` entry.
pub fn build_code_payload(executable: &[u8]) -> Result<Vec<u8>, ArtifactError> {
    if executable.is_empty() {
        return Err(ArtifactError::EmptyExecutable);
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(EXECUTABLE_MODE);
    zip.start_file(ARTIFACT_ENTRY, options)?;
    zip.write_all(executable)
        .map_err(|source| ArtifactError::Io {
            path: PathBuf::from(ARTIFACT_ENTRY),
            source,
        })?;
    Ok(zip.finish()?.into_inner())
}

pub fn write_code_payload(executable: &[u8], path: &Path) -> Result<(), ArtifactError> {
    let payload = build_code_payload(executable)?;
    let io_error = |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    fs::write(path, payload).map_err(io_error)
}

/// Reads a packaged artifact and checks its layout before it is deployed.
pub fn read_code_payload(path: &Path) -> Result<Vec<u8>, ArtifactError> {
    let payload = fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    validate_code_payload(&payload)?;
    Ok(payload)
}

pub fn validate_code_payload(payload: &[u8]) -> Result<(), ArtifactError> {
    let mut archive = ZipArchive::new(Cursor::new(payload))?;
    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    if names.len() != 1 || names[0] != ARTIFACT_ENTRY {
        return Err(ArtifactError::UnexpectedEntries(names));
    }

    let mut entry = archive.by_name(ARTIFACT_ENTRY)?;
    let mut first = [0u8; 1];
    let read = entry.read(&mut first).map_err(|source| ArtifactError::Io {
        path: PathBuf::from(ARTIFACT_ENTRY),
        source,
    })?;
    if read == 0 {
        return Err(ArtifactError::EmptyExecutable);
    }
    Ok(())
}
