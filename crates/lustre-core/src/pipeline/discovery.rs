//! Finding candidate images in an input directory.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::InputConfig;
use crate::error::PipelineError;

/// Finds supported image files in a directory.
pub struct FileDiscovery {
    config: InputConfig,
}

/// A file selected for processing.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Full path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

impl FileDiscovery {
    pub fn new(config: InputConfig) -> Self {
        Self { config }
    }

    /// List supported files under `directory`, sorted by path.
    ///
    /// An empty directory yields an empty list. A missing path, a path that
    /// is not a directory, or an unreadable directory is an error.
    pub fn enumerate(&self, directory: &Path) -> Result<Vec<DiscoveredFile>, PipelineError> {
        if !directory.exists() {
            return Err(PipelineError::DirectoryNotFound(directory.to_path_buf()));
        }
        if !directory.is_dir() {
            return Err(PipelineError::NotADirectory(directory.to_path_buf()));
        }
        // Surface permission problems on the root itself instead of an empty list.
        std::fs::read_dir(directory).map_err(|e| PipelineError::Directory {
            path: directory.to_path_buf(),
            message: e.to_string(),
        })?;

        let max_depth = if self.config.recursive { usize::MAX } else { 1 };
        let mut files = Vec::new();

        for entry in WalkDir::new(directory)
            .follow_links(true)
            .max_depth(max_depth)
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry under {:?}: {e}", directory);
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file() || !self.is_supported(path) {
                continue;
            }
            match entry.metadata() {
                Ok(meta) => files.push(DiscoveredFile {
                    path: path.to_path_buf(),
                    size: meta.len(),
                }),
                Err(e) => tracing::warn!("Cannot stat {:?}: {e}", path),
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::debug!("Discovered {} image(s) in {:?}", files.len(), directory);
        Ok(files)
    }

    /// Case-insensitive extension match against `supported_formats`.
    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.config
                    .supported_formats
                    .iter()
                    .any(|fmt| fmt.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    pub fn total_size(files: &[DiscoveredFile]) -> u64 {
        files.iter().map(|f| f.size).sum()
    }
}
