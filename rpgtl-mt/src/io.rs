//! Reading and writing game data files

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::warn;

use crate::error::{MtError, MtResult};

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> MtError + '_ {
    move |source| MtError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Read and parse one JSON file, keeping key order
pub fn read_json(path: &Path) -> MtResult<Value> {
    let content = fs::read_to_string(path).map_err(io_error(path))?;
    // RPG Maker writes a BOM on some platforms
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
    Ok(serde_json::from_str(content)?)
}

/// Serialize `value` compactly to `path`, creating parent directories
pub fn write_json(path: &Path, value: &Value) -> MtResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let content = serde_json::to_string(value)?;
    fs::write(path, content).map_err(io_error(path))
}

/// Where the translated copy of `input` goes
pub fn output_path(output_dir: &Path, input: &Path) -> MtResult<PathBuf> {
    let name = input
        .file_name()
        .ok_or_else(|| MtError::UnsupportedFile(input.display().to_string()))?;
    Ok(output_dir.join(name))
}

/// Expand the given paths into a sorted list of JSON files.
///
/// Directories are scanned one level deep for `*.json`; files are taken
/// as they are.
///
/// # Errors
/// - A path that does not exist
/// - Directory read errors
pub fn collect_inputs(paths: &[PathBuf]) -> MtResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let entries = fs::read_dir(path).map_err(io_error(path))?;
            let before = files.len();
            for entry in entries {
                let entry = entry.map_err(io_error(path))?;
                let file = entry.path();
                if file.is_file() && file.extension().and_then(|e| e.to_str()) == Some("json") {
                    files.push(file);
                }
            }
            if files.len() == before {
                warn!(dir = %path.display(), "no JSON files found");
            }
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            return Err(MtError::Io {
                path: path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory"),
            });
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}
