//! Manifest loading from files, directories and glob patterns.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{ManifestError, ManifestResult};
use crate::manifest::ManifestList;

/// Manifest loader.
pub struct ManifestLoader {
    base_path: PathBuf,
    separator: Regex,
}

impl ManifestLoader {
    /// Create a loader resolving relative paths against `base_path`.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            // A document separator is a line made of `---` only.
            separator: Regex::new(r"(?m)^---[ \t]*\r?$").expect("valid separator pattern"),
        }
    }

    /// Load every manifest matched by `patterns`, in pattern order.
    ///
    /// Each pattern is a file, a directory (all YAML files beneath it) or a
    /// glob. A pattern matching no file is an error.
    pub fn load_all<S: AsRef<str>>(&self, patterns: &[S]) -> ManifestResult<ManifestList> {
        let mut manifests = ManifestList::new();
        for pattern in patterns {
            let files = self.expand(pattern.as_ref())?;
            for file in files {
                for doc in self.load_file(&file)? {
                    manifests.push(doc);
                }
            }
        }
        info!("Loaded {} manifests", manifests.len());
        Ok(manifests)
    }

    /// Resolve a pattern to the list of files it designates.
    pub fn expand(&self, pattern: &str) -> ManifestResult<Vec<PathBuf>> {
        let full = self.base_path.join(pattern);

        if full.is_dir() {
            let mut files: Vec<PathBuf> = WalkDir::new(&full)
                .into_iter()
                .filter_map(|e| e.ok())
                .map(|e| e.into_path())
                .filter(|p| p.is_file() && is_yaml(p))
                .collect();
            if files.is_empty() {
                return Err(ManifestError::NotFound(full));
            }
            files.sort();
            return Ok(files);
        }

        if full.is_file() {
            return Ok(vec![full]);
        }

        let full_pattern = full.to_string_lossy();
        let paths = glob::glob(&full_pattern).map_err(|e| ManifestError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        let mut files: Vec<PathBuf> = paths
            .filter_map(|p| p.ok())
            .filter(|p| p.is_file())
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(ManifestError::NotFound(full));
        }
        Ok(files)
    }

    /// Read a file and split it into its YAML documents.
    pub fn load_file(&self, path: &Path) -> ManifestResult<Vec<Vec<u8>>> {
        debug!("Loading manifests from {:?}", path);
        let content = fs::read_to_string(path)?;
        Ok(self.split_documents(&content))
    }

    /// Split a multi-document YAML stream, dropping blank documents.
    pub fn split_documents(&self, content: &str) -> Vec<Vec<u8>> {
        self.separator
            .split(content)
            .filter(|doc| !doc.trim().is_empty())
            .map(|doc| doc.trim_start_matches(['\r', '\n']).as_bytes().to_vec())
            .collect()
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            ext == "yaml" || ext == "yml"
        })
        .unwrap_or(false)
}
