//! Vault directory walking.
//!
//! Produces the deterministic, lexicographically sorted list of supported
//! files under the vault root, skipping hidden and application-control
//! directories. Unreadable entries propagate as errors so a sync pass never
//! silently indexes a partial tree.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directories never descended into, in addition to any hidden directory.
const SKIP_DIRS: &[&str] = &[".git", ".obsidian", ".notegraph", ".trash", "node_modules"];

/// A supported file discovered under the vault root.
#[derive(Debug, Clone)]
pub struct VaultFile {
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub file_type: String,
}

/// Map a file extension to its detected type; `None` means unsupported.
pub fn detect_file_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "md" | "markdown" => Some("markdown"),
        "txt" => Some("text"),
        "csv" | "tsv" => Some("csv"),
        _ => None,
    }
}

fn skip_dir(name: &str) -> bool {
    name.starts_with('.') || SKIP_DIRS.contains(&name)
}

pub fn walk_vault(root: &Path) -> Result<Vec<VaultFile>> {
    if !root.exists() {
        bail!("Vault directory does not exist: {}", root.display());
    }

    let mut files = Vec::new();

    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }
        entry
            .file_name()
            .to_str()
            .map(|name| !skip_dir(name))
            .unwrap_or(false)
    });

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(file_type) = detect_file_type(path) else {
            continue;
        };

        let relative = path.strip_prefix(root).unwrap_or(path);
        files.push(VaultFile {
            relative_path: relative.to_string_lossy().to_string(),
            absolute_path: path.to_path_buf(),
            file_type: file_type.to_string(),
        });
    }

    // Sort for deterministic ordering
    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn setup_vault() -> tempfile::TempDir {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("b.md"), "beta").unwrap();
        fs::write(root.join("a.txt"), "alpha").unwrap();
        fs::write(root.join("data.csv"), "x,y\n1,2").unwrap();
        fs::write(root.join("image.png"), [0u8; 4]).unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub").join("c.md"), "gamma").unwrap();
        fs::create_dir(root.join(".git")).unwrap();
        fs::write(root.join(".git").join("hidden.md"), "no").unwrap();
        fs::create_dir(root.join(".notegraph")).unwrap();
        fs::write(root.join(".notegraph").join("index.md"), "no").unwrap();
        tmp
    }

    #[test]
    fn test_walk_sorted_and_filtered() {
        let tmp = setup_vault();
        let files = walk_vault(tmp.path()).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "b.md", "data.csv", "sub/c.md"]);
    }

    #[test]
    fn test_detects_file_types() {
        let tmp = setup_vault();
        let files = walk_vault(tmp.path()).unwrap();
        let types: Vec<&str> = files.iter().map(|f| f.file_type.as_str()).collect();
        assert_eq!(types, vec!["text", "markdown", "csv", "markdown"]);
    }

    #[test]
    fn test_missing_root_is_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        assert!(walk_vault(&missing).is_err());
    }

    #[test]
    fn test_extension_case_insensitive() {
        assert_eq!(detect_file_type(Path::new("A.MD")), Some("markdown"));
        assert_eq!(detect_file_type(Path::new("notes.TSV")), Some("csv"));
        assert_eq!(detect_file_type(Path::new("bin.exe")), None);
        assert_eq!(detect_file_type(Path::new("noext")), None);
    }
}
