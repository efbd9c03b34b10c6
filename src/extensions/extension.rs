// Extension source
//
// The script text of one extension together with where it came from.

use super::loader::LoadError;
use std::path::{Path, PathBuf};

/// Represents an extension script read from disk
#[derive(Debug, Clone)]
pub struct ExtensionSource {
    pub path: PathBuf,
    pub code: String,
}

impl ExtensionSource {
    /// Read the script at `path` as UTF-8 text
    pub fn read(path: &Path) -> Result<Self, LoadError> {
        let code = std::fs::read_to_string(path).map_err(|source| LoadError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        log::debug!("read extension script {} ({} bytes)", path.display(), code.len());

        Ok(Self::from_code(path.to_path_buf(), code))
    }

    pub fn from_code(path: PathBuf, code: impl Into<String>) -> Self {
        // a leading BOM would otherwise be a syntax error
        let mut code = code.into();
        if code.starts_with('\u{feff}') {
            code.remove(0);
        }
        Self { path, code }
    }

    /// Site key used when neither the caller nor the script names one:
    /// the file name without its extension.
    pub fn default_site_key(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .filter(|stem| !stem.is_empty())
            .unwrap_or_else(|| "spider".to_string())
    }
}
