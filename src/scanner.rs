use crate::error::{Error, Result};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Predicate deciding whether a file (given relative to the scan root) is admitted.
pub type FileFilter = Box<dyn Fn(&Path) -> bool>;

/// File scanner for traversing a crate's source tree.
///
/// The `FileScanner` recursively walks a source directory and yields every Rust file
/// together with the module path it declares. It skips `target` and hidden directories
/// and can be narrowed to specific files with an inclusion predicate, which is how
/// secondary trees such as a shared models crate are admitted.
///
/// # Example
///
/// ```no_run
/// use client_from_source::scanner::FileScanner;
/// use std::path::PathBuf;
///
/// let scanner = FileScanner::new(PathBuf::from("./server/src"), "crate");
/// let result = scanner.scan().unwrap();
/// println!("Found {} Rust files", result.files.len());
/// ```
pub struct FileScanner {
    root_path: PathBuf,
    crate_name: String,
    filter: Option<FileFilter>,
}

/// A discovered Rust file and the module it defines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Fully-qualified module path, e.g. `crate::routes::users`
    pub module_path: String,
}

/// Result of directory scanning operation.
pub struct ScanResult {
    /// Discovered files in a stable (sorted by path) order
    pub files: Vec<SourceFile>,
    /// Warning messages for any issues encountered (e.g., inaccessible directories)
    pub warnings: Vec<String>,
}

impl FileScanner {
    /// Creates a scanner for `root_path`, the directory playing the role of `src/`.
    ///
    /// `crate_name` becomes the first segment of every derived module path
    /// (`crate` for the server itself, the crate's name for secondary trees).
    pub fn new(root_path: PathBuf, crate_name: &str) -> Self {
        Self {
            root_path,
            crate_name: crate_name.to_string(),
            filter: None,
        }
    }

    /// Restricts the scan to files accepted by `filter`.
    pub fn with_filter(mut self, filter: FileFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Scans the directory tree and collects all admitted `.rs` files.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceRootMissing`] if the root directory does not exist.
    pub fn scan(&self) -> Result<ScanResult> {
        if !self.root_path.exists() {
            return Err(Error::SourceRootMissing(self.root_path.clone()));
        }

        let mut files = Vec::new();
        let mut warnings = Vec::new();

        for entry in WalkDir::new(&self.root_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                // Don't filter the root directory itself
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
                    if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("rs")
                    {
                        continue;
                    }

                    let relative = path.strip_prefix(&self.root_path).unwrap_or(path);
                    if let Some(filter) = &self.filter {
                        if !filter(relative) {
                            continue;
                        }
                    }

                    let module_path = module_path_for(relative, &self.crate_name);
                    debug!("Found {} ({})", path.display(), module_path);
                    files.push(SourceFile {
                        path: path.to_path_buf(),
                        module_path,
                    });
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        Ok(ScanResult { files, warnings })
    }
}

/// Derives the module path declared by a file, given its path relative to the source root.
///
/// `lib.rs`/`main.rs` at the root are the crate root and `mod.rs` collapses to its
/// parent directory's module.
pub fn module_path_for(relative: &Path, crate_name: &str) -> String {
    let mut segments = vec![crate_name.to_string()];
    let components: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();

    for (idx, component) in components.iter().enumerate() {
        let is_last = idx + 1 == components.len();
        if !is_last {
            segments.push(component.clone());
            continue;
        }

        let stem = component.strip_suffix(".rs").unwrap_or(component);
        let is_root_file = idx == 0 && (stem == "lib" || stem == "main");
        if stem != "mod" && !is_root_file {
            segments.push(stem.to_string());
        }
    }

    segments.join("::")
}
