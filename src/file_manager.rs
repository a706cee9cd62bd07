//! # File Management Module
//!
//! Questo modulo gestisce tutte le operazioni sui file e la discovery delle immagini.
//!
//! ## Responsabilità:
//! - Discovery ricorsiva di immagini in una directory sorgente
//! - Filtraggio per estensione (case-insensitive)
//! - Calcolo del path di output preservando la struttura delle sottodirectory
//! - Creazione idempotente delle directory di output
//! - Formattazione human-readable delle dimensioni
//!
//! ## Mappatura path:
//! ```text
//! Source: /src/photos
//! Input:  /src/photos/2023/vacation/IMG_001.png
//! Output: /dest/2023/vacation/IMG_001.jpg
//! ```
//!
//! ## Errori:
//! - Directory sorgente mancante o non leggibile → `ConvertError::SourceUnreadable`
//!   (fatale per il run)
//! - Singole entry non leggibili durante la discovery vengono saltate con un warning

use crate::error::{ConvertError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Find all files under `root` whose extension is in `extensions`.
    ///
    /// The result is sorted so that dispatch order is stable across runs.
    pub fn find_image_files(root: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
        let metadata = std::fs::metadata(root)
            .map_err(|e| ConvertError::SourceUnreadable(format!("{}: {}", root.display(), e)))?;
        if !metadata.is_dir() {
            return Err(ConvertError::SourceUnreadable(format!(
                "{}: not a directory",
                root.display()
            )));
        }
        std::fs::read_dir(root)
            .map_err(|e| ConvertError::SourceUnreadable(format!("{}: {}", root.display(), e)))?;

        let mut files = Vec::new();

        for entry in WalkDir::new(root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };

            if entry.file_type().is_file() && Self::has_extension(entry.path(), extensions) {
                files.push(entry.into_path());
            }
        }

        files.sort();
        debug!("Discovered {} files under {}", files.len(), root.display());
        Ok(files)
    }

    /// Check a path against a list of lowercase extensions (no dot)
    pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
        match path.extension() {
            Some(ext) => {
                let ext_lower = ext.to_string_lossy().to_lowercase();
                extensions.iter().any(|e| *e == ext_lower)
            }
            None => false,
        }
    }

    /// Output path for `input`: same relative directory under `output_root`,
    /// same file stem, new extension.
    pub fn output_path_for(
        input: &Path,
        source_root: &Path,
        output_root: &Path,
        extension: &str,
    ) -> Result<PathBuf> {
        let file_stem = input
            .file_stem()
            .ok_or_else(|| ConvertError::Write(format!("Invalid file name: {}", input.display())))?
            .to_string_lossy();

        let relative_dir = match input.strip_prefix(source_root) {
            Ok(rel) => rel.parent().unwrap_or(Path::new("")),
            Err(_) => {
                debug!(
                    "{} is outside {} - writing to output root",
                    input.display(),
                    source_root.display()
                );
                Path::new("")
            }
        };

        Ok(output_root
            .join(relative_dir)
            .join(format!("{}.{}", file_stem, extension)))
    }

    /// Create the parent directories of `path`. Existing directories are not an error.
    pub fn ensure_parent_dirs(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConvertError::Write(format!(
                    "Failed to create parent directories for {}: {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Byte size of a file on disk
    pub fn file_size(path: &Path) -> Result<u64> {
        Ok(std::fs::metadata(path)?.len())
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}
