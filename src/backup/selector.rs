//! Glob-based file selection
//!
//! Resolves a definition's include/exclude glob lists against a directory
//! root into the concrete set of regular files to archive, as root-relative
//! paths. A file is selected iff it matches at least one include pattern and
//! none of the exclude patterns. An empty include list means everything
//! (`**/*`); an empty exclude list means nothing is excluded. A single `*`
//! never crosses a directory boundary; `**` recurses.
//!
//! Only leaf files decide inclusion. Directories are never selected; the
//! hierarchy above a selected file is recreated implicitly when the archive
//! is built and extracted.

use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::warn;
use walkdir::WalkDir;

use crate::config::DirFilter;
use crate::error::{VaultError, VaultResult};

/// Pattern applied when a definition does not restrict inclusion
const MATCH_EVERYTHING: &str = "**/*";

/// Compiled include/exclude matcher for one directory root
#[derive(Debug)]
pub struct FileSelector {
    includes: GlobSet,
    excludes: GlobSet,
}

impl FileSelector {
    /// Compile a selector from a definition's filter lists.
    ///
    /// Fails with a configuration error on malformed glob patterns.
    pub fn new(filter: &DirFilter) -> VaultResult<Self> {
        let includes = if filter.include_list.is_empty() {
            build_globset(&[MATCH_EVERYTHING.to_string()])?
        } else {
            build_globset(&filter.include_list)?
        };
        let excludes = build_globset(&filter.exclude_list)?;

        Ok(Self { includes, excludes })
    }

    /// Walk `root` and return the selected files as root-relative paths.
    ///
    /// A missing root or a root with no matches yields an empty selection.
    /// Entries that cannot be read during the walk are logged and skipped.
    pub fn select(&self, root: &Path) -> Vec<PathBuf> {
        let mut selected = Vec::new();

        if !root.is_dir() {
            return selected;
        }

        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let relative = match entry.path().strip_prefix(root) {
                Ok(relative) => relative,
                Err(_) => continue,
            };

            if self.includes.is_match(relative) && !self.excludes.is_match(relative) {
                selected.push(relative.to_path_buf());
            }
        }

        selected
    }
}

fn build_globset(patterns: &[String]) -> VaultResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();

    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| VaultError::Config(format!("Invalid glob pattern [{}]: {}", pattern, e)))?;
        builder.add(glob);
    }

    builder
        .build()
        .map_err(|e| VaultError::Config(format!("Failed to compile glob patterns: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;
    use tempfile::TempDir;

    fn filter(include: &[&str], exclude: &[&str]) -> DirFilter {
        DirFilter {
            include_list: include.iter().map(|s| s.to_string()).collect(),
            exclude_list: exclude.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn populate(root: &Path, files: &[&str]) {
        for file in files {
            let path = root.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, b"").unwrap();
        }
    }

    fn select(selector: &FileSelector, root: &Path) -> BTreeSet<String> {
        selector
            .select(root)
            .into_iter()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .collect()
    }

    fn sample_tree() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("data");
        populate(
            &root,
            &[
                "1.txt",
                "2.txt",
                "3.yml",
                "4.log",
                "populated_folder/first.txt",
                "populated_folder/third.log",
            ],
        );
        fs::create_dir_all(root.join("empty_folder")).unwrap();
        (temp_dir, root)
    }

    #[test]
    fn test_empty_include_selects_everything() {
        let (_temp, root) = sample_tree();
        let selector = FileSelector::new(&filter(&[], &[])).unwrap();

        let selected = select(&selector, &root);
        assert_eq!(selected.len(), 6);
        assert!(selected.contains("1.txt"));
        assert!(selected.contains("populated_folder/third.log"));
    }

    #[test]
    fn test_directories_never_selected() {
        let (_temp, root) = sample_tree();
        let selector = FileSelector::new(&filter(&[], &[])).unwrap();

        let selected = select(&selector, &root);
        assert!(!selected.iter().any(|p| p.contains("empty_folder")));
    }

    #[test]
    fn test_include_list_restricts_selection() {
        let (_temp, root) = sample_tree();
        let selector = FileSelector::new(&filter(&["**/*.log"], &[])).unwrap();

        let selected = select(&selector, &root);
        assert_eq!(
            selected,
            ["4.log", "populated_folder/third.log"]
                .iter()
                .map(|s| s.to_string())
                .collect::<BTreeSet<String>>()
        );
    }

    #[test]
    fn test_single_star_does_not_cross_directories() {
        let (_temp, root) = sample_tree();
        let selector = FileSelector::new(&filter(&["*.log"], &[])).unwrap();

        let selected = select(&selector, &root);
        assert_eq!(
            selected,
            ["4.log"].iter().map(|s| s.to_string()).collect::<BTreeSet<String>>()
        );
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let (_temp, root) = sample_tree();
        let selector = FileSelector::new(&filter(&["**/*.txt"], &["**/first.txt"])).unwrap();

        let selected = select(&selector, &root);
        assert_eq!(
            selected,
            ["1.txt", "2.txt"]
                .iter()
                .map(|s| s.to_string())
                .collect::<BTreeSet<String>>()
        );
    }

    #[test]
    fn test_exclude_only() {
        let (_temp, root) = sample_tree();
        let selector = FileSelector::new(&filter(&[], &["**/*.txt"])).unwrap();

        let selected = select(&selector, &root);
        assert_eq!(
            selected,
            ["3.yml", "4.log", "populated_folder/third.log"]
                .iter()
                .map(|s| s.to_string())
                .collect::<BTreeSet<String>>()
        );
    }

    #[test]
    fn test_missing_root_yields_empty_selection() {
        let temp_dir = TempDir::new().unwrap();
        let selector = FileSelector::new(&filter(&[], &[])).unwrap();

        assert!(selector.select(&temp_dir.path().join("missing")).is_empty());
    }

    #[test]
    fn test_empty_root_yields_empty_selection() {
        let temp_dir = TempDir::new().unwrap();
        let selector = FileSelector::new(&filter(&[], &[])).unwrap();

        assert!(selector.select(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = FileSelector::new(&filter(&["a{b"], &[])).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_hidden_files_are_ordinary() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("conf");
        populate(&root, &[".hidden/10.txt", "visible/11.txt"]);

        let selector = FileSelector::new(&filter(&["**/*.txt"], &[])).unwrap();
        let selected = select(&selector, &root);
        assert_eq!(selected.len(), 2);
        assert!(selected.contains(".hidden/10.txt"));
    }
}
