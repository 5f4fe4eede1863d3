//! The Corpus Provider boundary: file discovery and content reads.
//!
//! The index treats this as an external collaborator — it only needs
//! `list_paths` and `read`. This module carries the trait plus a concrete
//! filesystem-backed implementation so the crate is runnable end to end.

use std::path::{Path, PathBuf};

/// Supplies the ordered list of document paths and reads file contents.
///
/// Implementations must be idempotent and append-only: once a path has
/// been returned at a given index from `list_paths`, it keeps that index
/// on every subsequent call, so `document_id`s handed out by the index
/// stay valid across refreshes.
pub trait CorpusProvider: Send + Sync {
    /// Returns the full, stable-ordered list of paths discovered so far.
    fn list_paths(&self) -> Vec<PathBuf>;

    /// Reads the full contents of `path` as a string.
    ///
    /// Read failures are surfaced as empty content, not an error: the
    /// index simply ingests zero tokens for that document.
    fn read(&self, path: &Path) -> String;
}

/// A [`CorpusProvider`] that recursively lists `.txt` files under a set
/// of root directories.
pub struct FsCorpusProvider {
    roots: Vec<PathBuf>,
    paths: parking_lot::Mutex<Vec<PathBuf>>,
}

impl FsCorpusProvider {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            paths: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Rescans the configured roots, appending any newly discovered
    /// `.txt` files in discovery order. Already-known paths are never
    /// reordered or dropped.
    pub fn refresh(&self) {
        let mut paths = self.paths.lock();
        let mut seen: std::collections::HashSet<PathBuf> = paths.iter().cloned().collect();

        for root in &self.roots {
            if !root.is_dir() {
                continue;
            }
            let mut found = Vec::new();
            find_txt_files(root, &mut found);
            for path in found {
                if seen.insert(path.clone()) {
                    paths.push(path);
                }
            }
        }

        if !paths.is_empty() {
            log::info!("corpus: {} files known after refresh", paths.len());
        }
    }
}

fn find_txt_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("corpus: failed to read directory {}: {}", dir.display(), e);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            find_txt_files(&path, out);
        } else if path.extension().and_then(|e| e.to_str()) == Some("txt") {
            out.push(path);
        }
    }
}

impl CorpusProvider for FsCorpusProvider {
    fn list_paths(&self) -> Vec<PathBuf> {
        self.refresh();
        self.paths.lock().clone()
    }

    fn read(&self, path: &Path) -> String {
        match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("corpus: could not read file {}: {}", path.display(), e);
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn lists_only_txt_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "hello").unwrap();
        fs::write(dir.path().join("ignore.md"), "nope").unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("b.txt"), "world").unwrap();

        let provider = FsCorpusProvider::new(vec![dir.path().to_path_buf()]);
        let mut paths = provider.list_paths();
        paths.sort();

        assert_eq!(paths.len(), 2);
        assert!(paths.iter().all(|p| p.extension().unwrap() == "txt"));
    }

    #[test]
    fn list_paths_is_stable_and_append_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "hello").unwrap();

        let provider = FsCorpusProvider::new(vec![dir.path().to_path_buf()]);
        let first = provider.list_paths();
        assert_eq!(first.len(), 1);

        fs::write(dir.path().join("b.txt"), "world").unwrap();
        let second = provider.list_paths();
        assert_eq!(second.len(), 2);
        assert_eq!(second[0], first[0]);
    }

    #[test]
    fn read_missing_file_returns_empty_string() {
        let provider = FsCorpusProvider::new(vec![]);
        let content = provider.read(Path::new("/does/not/exist.txt"));
        assert!(content.is_empty());
    }
}
