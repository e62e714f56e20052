use crate::error::{Error, Result};
use crate::scanner::SourceFile;
use log::{debug, warn};
use std::fs;
use std::path::PathBuf;

/// Tolerant parser for Rust source files.
///
/// The `AstParser` runs `syn` over every file. Unlike a compiler front end it never
/// discards a readable file: when `syn` rejects the syntax the file is kept with its
/// raw text only, so the textual extractors can still recover declarations from it.
///
/// # Example
///
/// ```no_run
/// use client_from_source::parser::AstParser;
/// use client_from_source::scanner::SourceFile;
/// use std::path::PathBuf;
///
/// let file = SourceFile { path: PathBuf::from("src/main.rs"), module_path: "crate".into() };
/// let parsed = AstParser::parse_file(&file).unwrap();
/// println!("syntax tree available: {}", parsed.syntax_tree.is_some());
/// ```
pub struct AstParser;

/// A readable Rust file, with its syntax tree when `syn` could parse it.
#[derive(Debug)]
pub struct ParsedFile {
    /// Path to the source file
    pub path: PathBuf,
    /// Module path the file declares, e.g. `crate::routes::users`
    pub module_path: String,
    /// Raw file content, used by the textual fallback extractors
    pub source: String,
    /// The parsed syntax tree, `None` when the file has unrecoverable syntax errors
    pub syntax_tree: Option<syn::File>,
}

impl ParsedFile {
    /// Builds a parsed file from in-memory source.
    pub fn from_source(path: PathBuf, module_path: &str, source: String) -> Self {
        let syntax_tree = match syn::parse_file(&source) {
            Ok(tree) => Some(tree),
            Err(e) => {
                warn!(
                    "Syntax error in {} ({}); falling back to textual extraction",
                    path.display(),
                    e
                );
                None
            }
        };

        Self {
            path,
            module_path: module_path.to_string(),
            source,
            syntax_tree,
        }
    }

    /// File name without directories, used for file-level conventions.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

impl AstParser {
    /// Reads and parses a single source file.
    ///
    /// # Errors
    ///
    /// Returns an error only if the file cannot be read. Syntax errors are not
    /// errors: the returned file simply carries no syntax tree.
    pub fn parse_file(file: &SourceFile) -> Result<ParsedFile> {
        debug!("Parsing file: {}", file.path.display());

        let content = fs::read_to_string(&file.path).map_err(|e| Error::ParseError {
            file: file.path.clone(),
            message: format!("failed to read file: {}", e),
        })?;

        Ok(ParsedFile::from_source(
            file.path.clone(),
            &file.module_path,
            content,
        ))
    }

    /// Parses multiple files, skipping (with a diagnostic) those that cannot be read.
    pub fn parse_files(files: &[SourceFile]) -> Vec<ParsedFile> {
        debug!("Parsing {} files", files.len());

        let parsed: Vec<ParsedFile> = files
            .iter()
            .filter_map(|file| match Self::parse_file(file) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    warn!("Skipping {}: {}", file.path.display(), e);
                    None
                }
            })
            .collect();

        let with_tree = parsed.iter().filter(|p| p.syntax_tree.is_some()).count();
        debug!(
            "Parsing complete: {} read, {} with syntax tree, {} skipped",
            parsed.len(),
            with_tree,
            files.len() - parsed.len()
        );

        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    /// Helper function to create a temporary file with content
    fn create_temp_file(dir: &TempDir, name: &str, content: &str) -> SourceFile {
        let file_path = dir.path().join(name);
        let mut file = fs::File::create(&file_path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        SourceFile {
            path: file_path,
            module_path: "crate::test".to_string(),
        }
    }

    #[test]
    fn test_parse_valid_rust_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = create_temp_file(
            &temp_dir,
            "valid.rs",
            r#"
            pub struct User {
                pub id: u32,
                pub name: String,
            }
            "#,
        );

        let parsed = AstParser::parse_file(&file).unwrap();
        assert_eq!(parsed.path, file.path);
        assert_eq!(parsed.module_path, "crate::test");
        assert!(parsed.syntax_tree.is_some());
    }

    #[test]
    fn test_parse_invalid_file_keeps_source() {
        let temp_dir = TempDir::new().unwrap();
        let file = create_temp_file(
            &temp_dir,
            "invalid.rs",
            r#"
            pub struct User {
                pub id: u32
                pub name: String
            }
            "#,
        );

        let parsed = AstParser::parse_file(&file).unwrap();
        assert!(parsed.syntax_tree.is_none());
        assert!(parsed.source.contains("pub struct User"));
    }

    #[test]
    fn test_parse_nonexistent_file() {
        let file = SourceFile {
            path: PathBuf::from("/nonexistent/file.rs"),
            module_path: "crate".to_string(),
        };
        let err = AstParser::parse_file(&file).unwrap_err();
        assert!(err.to_string().contains("failed to read file"));
    }

    #[test]
    fn test_parse_files_skips_unreadable() {
        let temp_dir = TempDir::new().unwrap();
        let good = create_temp_file(&temp_dir, "a.rs", "pub fn a() {}");
        let broken = create_temp_file(&temp_dir, "b.rs", "pub fn broken( {");
        let missing = SourceFile {
            path: temp_dir.path().join("missing.rs"),
            module_path: "crate".to_string(),
        };

        let parsed = AstParser::parse_files(&[good, broken, missing]);
        assert_eq!(parsed.len(), 2);
        assert!(parsed[0].syntax_tree.is_some());
        assert!(parsed[1].syntax_tree.is_none());
    }

    #[test]
    fn test_file_name() {
        let parsed = ParsedFile::from_source(
            PathBuf::from("src/router/admin_routes.rs"),
            "crate::router::admin_routes",
            String::new(),
        );
        assert_eq!(parsed.file_name(), "admin_routes.rs");
    }
}
