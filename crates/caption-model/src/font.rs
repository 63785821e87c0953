//! Font file resolution from an explicit font directory.

use std::path::{Path, PathBuf};

use subburn_common::error::{SubburnError, SubburnResult};

const FONT_EXTENSIONS: &[&str] = &["ttf", "otf", "ttc"];

/// A directory of font files addressed by file name.
#[derive(Debug, Clone)]
pub struct FontCatalog {
    dir: PathBuf,
}

impl FontCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Font file names in the directory, sorted.
    pub fn list(&self) -> SubburnResult<Vec<String>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            SubburnError::config(format!(
                "Failed to read font directory {}: {e}",
                self.dir.display()
            ))
        })?;

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_font_file(path))
            .filter_map(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Resolve a font file name to its path inside the directory.
    ///
    /// Absolute paths to existing files are accepted as-is.
    pub fn resolve(&self, name: &str) -> SubburnResult<PathBuf> {
        let candidate = Path::new(name);
        let path = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.dir.join(candidate)
        };

        if !path.is_file() {
            return Err(SubburnError::font(
                path,
                format!("font '{name}' not found in {}", self.dir.display()),
            ));
        }
        Ok(path)
    }
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FONT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
