use crate::parser::{AstParser, ParsedFile};
use anyhow::{bail, Result};
use log::{debug, warn};
use std::path::PathBuf;
use walkdir::WalkDir;

/// File scanner for the source directory of the analysed crate.
///
/// Walks the directory recursively, skipping `target` and hidden directories,
/// and yields every `.rs` file in a stable (sorted) order.
///
/// # Example
///
/// ```no_run
/// use openapi_from_handlers::scanner::FileScanner;
/// use std::path::PathBuf;
///
/// let scanner = FileScanner::new(PathBuf::from("./my-project/src"));
/// let result = scanner.scan().unwrap();
/// println!("Found {} Rust files", result.rust_files.len());
/// ```
pub struct FileScanner {
    root_path: PathBuf,
}

/// Result of directory scanning operation.
pub struct ScanResult {
    /// List of paths to all discovered `.rs` files, sorted
    pub rust_files: Vec<PathBuf>,
    /// Warning messages for any issues encountered (e.g., inaccessible directories)
    pub warnings: Vec<String>,
}

impl FileScanner {
    pub fn new(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    /// Scans the directory tree and collects all `.rs` files.
    ///
    /// Inaccessible entries are logged and recorded as warnings; scanning continues.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory does not exist.
    pub fn scan(&self) -> Result<ScanResult> {
        if !self.root_path.is_dir() {
            bail!("Source directory not found: {}", self.root_path.display());
        }

        let mut rust_files = Vec::new();
        let mut warnings = Vec::new();

        for entry in WalkDir::new(&self.root_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.path() == self.root_path {
                    return true;
                }

                let file_name = e.file_name().to_string_lossy();
                !file_name.starts_with('.') && file_name != "target"
            })
        {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("rs") {
                        rust_files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        debug!("Found {} Rust files in {}", rust_files.len(), self.root_path.display());
        Ok(ScanResult {
            rust_files,
            warnings,
        })
    }

    /// Scans and parses every file; files that fail to parse are skipped with a warning.
    pub fn parse_all(&self) -> Result<Vec<ParsedFile>> {
        let scan = self.scan()?;
        Ok(AstParser::parse_files(&scan.rust_files, &self.root_path)
            .into_iter()
            .filter_map(|r| r.ok())
            .collect())
    }
}
