//! Content fingerprints for change detection
//!
//! Every digest is a lowercase hex SHA256. Directory digests walk the tree in
//! sorted order and mix each entry's relative path into the hash, so renames
//! and moved files change the digest as well as edited content.

use crate::error::{SkiffError, SkiffResult};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

/// Directory names that are never part of a fingerprint.
///
/// `.skiff` holds the cache file itself; hashing it would make every save
/// invalidate any image whose build context is the project root.
pub const ALWAYS_EXCLUDED: &[&str] = &[".skiff"];

/// Length of the abbreviated digest used in tags and log lines
pub const SHORT_LEN: usize = 12;

/// Hash a string
pub fn hash_string(s: &str) -> String {
    hash_bytes(s.as_bytes())
}

/// Hash raw bytes
pub fn hash_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Abbreviate a digest to its first `SHORT_LEN` characters
pub fn short(hash: &str) -> &str {
    &hash[..hash.len().min(SHORT_LEN)]
}

/// Hash a file's contents
pub fn hash_file(path: &Path) -> SkiffResult<String> {
    let mut file = fs::File::open(path).map_err(|e| SkiffError::hash(path, e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| SkiffError::hash(path, e))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Hash a directory tree (or a single file)
pub fn hash_directory(path: &Path) -> SkiffResult<String> {
    hash_directory_excluding(path, &[])
}

/// Hash a directory tree, skipping entries that match any of `patterns`.
///
/// Patterns are matched against `/`-separated paths relative to `path`:
/// - `dir/sub` matches that path and everything below it
/// - `name` (no slash) matches any entry with that file name
/// - `*.log` / `tmp*` match on the file name suffix / prefix
pub fn hash_directory_excluding(path: &Path, patterns: &[String]) -> SkiffResult<String> {
    hash_directory_with(path, |rel, _| {
        if patterns.iter().any(|p| matches_pattern(rel, p)) {
            Visit::Prune
        } else {
            Visit::Hash
        }
    })
}

/// How a directory walk treats one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Part of the digest
    Hash,
    /// Left out of the digest; a directory's children are still visited
    Skip,
    /// Left out together with everything below it
    Prune,
}

/// Hash a directory tree, asking `visit` about every entry.
///
/// `visit` gets the `/`-separated relative path and whether the entry is a
/// directory. `.skiff` is always pruned.
pub fn hash_directory_with<F>(path: &Path, visit: F) -> SkiffResult<String>
where
    F: Fn(&str, bool) -> Visit,
{
    let meta = fs::symlink_metadata(path).map_err(|e| SkiffError::hash(path, e))?;
    let mut hasher = Sha256::new();

    if !meta.is_dir() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        hash_entry(&mut hasher, path, &name, EntryKind::File)?;
        return Ok(hex::encode(hasher.finalize()));
    }

    let decide = |entry: &DirEntry| {
        let rel = relative_path(path, entry.path());
        if ALWAYS_EXCLUDED.iter().any(|p| matches_pattern(&rel, p)) {
            return (rel, Visit::Prune);
        }
        let decision = visit(&rel, entry.file_type().is_dir());
        (rel, decision)
    };

    let walker = WalkDir::new(path)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || decide(entry).1 != Visit::Prune);

    for entry in walker {
        let entry = entry.map_err(|e| SkiffError::hash(path, e))?;
        if entry.depth() == 0 {
            continue;
        }

        let (rel, decision) = decide(&entry);
        if decision != Visit::Hash {
            continue;
        }
        let kind = if entry.file_type().is_dir() {
            EntryKind::Dir
        } else if entry.file_type().is_symlink() {
            EntryKind::Symlink
        } else {
            EntryKind::File
        };
        hash_entry(&mut hasher, entry.path(), &rel, kind)?;
    }

    Ok(hex::encode(hasher.finalize()))
}

#[derive(Clone, Copy)]
enum EntryKind {
    Dir,
    File,
    Symlink,
}

fn hash_entry(hasher: &mut Sha256, path: &Path, rel: &str, kind: EntryKind) -> SkiffResult<()> {
    let marker: &[u8] = match kind {
        EntryKind::Dir => b"d:",
        EntryKind::File => b"f:",
        EntryKind::Symlink => b"l:",
    };
    hasher.update(marker);
    hasher.update(rel.as_bytes());
    hasher.update([0u8]);

    match kind {
        EntryKind::Dir => {}
        EntryKind::Symlink => {
            let target = fs::read_link(path).map_err(|e| SkiffError::hash(path, e))?;
            hasher.update(target.to_string_lossy().as_bytes());
            hasher.update([0u8]);
        }
        EntryKind::File => {
            let mut file = fs::File::open(path).map_err(|e| SkiffError::hash(path, e))?;
            let len = io::copy(&mut file, hasher).map_err(|e| SkiffError::hash(path, e))?;
            // Length suffix keeps file boundaries unambiguous
            hasher.update(len.to_le_bytes());
        }
    }
    Ok(())
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Match a relative `/`-separated path against an exclusion pattern
pub fn matches_pattern(rel: &str, pattern: &str) -> bool {
    let pattern = pattern.trim_matches('/');
    if pattern.is_empty() {
        return false;
    }
    if rel == pattern || rel.starts_with(&format!("{}/", pattern)) {
        return true;
    }
    if pattern.contains('/') {
        return false;
    }

    let name = rel.rsplit('/').next().unwrap_or(rel);
    if let Some(suffix) = pattern.strip_prefix('*') {
        if !suffix.contains('*') {
            return name.ends_with(suffix);
        }
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        if !prefix.contains('*') {
            return name.starts_with(prefix);
        }
    }
    name == pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn string_hash_is_sha256_hex() {
        assert_eq!(
            hash_string("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(short(&hash_string("abc")), "ba7816bf8f01");
    }

    #[test]
    fn file_hash_deterministic() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "Dockerfile", "FROM alpine");

        let a = hash_file(&dir.path().join("Dockerfile")).unwrap();
        let b = hash_file(&dir.path().join("Dockerfile")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, hash_string("FROM alpine"));
    }

    #[test]
    fn directory_hash_stable_and_content_sensitive() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/main.rs", "fn main() {}");
        write(dir.path(), "README", "hi");

        let first = hash_directory(dir.path()).unwrap();
        assert_eq!(first, hash_directory(dir.path()).unwrap());

        write(dir.path(), "src/main.rs", "fn main() { }");
        assert_ne!(first, hash_directory(dir.path()).unwrap());
    }

    #[test]
    fn directory_hash_detects_rename() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.txt", "same");
        let before = hash_directory(dir.path()).unwrap();

        fs::rename(dir.path().join("a.txt"), dir.path().join("b.txt")).unwrap();
        assert_ne!(before, hash_directory(dir.path()).unwrap());
    }

    #[test]
    fn directory_hash_ignores_skiff_dir() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "app.py", "print(1)");
        let before = hash_directory(dir.path()).unwrap();

        write(dir.path(), ".skiff/cache.json", "{}");
        assert_eq!(before, hash_directory(dir.path()).unwrap());
    }

    #[test]
    fn exclusions_are_honored() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "app.py", "print(1)");
        fs::create_dir_all(dir.path().join("logs")).unwrap();
        let patterns = vec!["target".to_string(), "*.log".to_string()];
        let before = hash_directory_excluding(dir.path(), &patterns).unwrap();

        write(dir.path(), "target/debug/app", "binary");
        write(dir.path(), "logs/run.log", "noise");
        assert_eq!(before, hash_directory_excluding(dir.path(), &patterns).unwrap());

        write(dir.path(), "logs/keep.txt", "signal");
        assert_ne!(before, hash_directory_excluding(dir.path(), &patterns).unwrap());
    }

    #[test]
    fn skipped_directory_still_visits_children() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "vendor/keep.txt", "1");
        write(dir.path(), "vendor/drop.txt", "1");
        let visit = |rel: &str, _: bool| match rel {
            "vendor" | "vendor/drop.txt" => Visit::Skip,
            _ => Visit::Hash,
        };
        let before = hash_directory_with(dir.path(), visit).unwrap();

        write(dir.path(), "vendor/drop.txt", "2");
        assert_eq!(before, hash_directory_with(dir.path(), visit).unwrap());

        write(dir.path(), "vendor/keep.txt", "2");
        assert_ne!(before, hash_directory_with(dir.path(), visit).unwrap());
    }

    #[test]
    fn missing_directory_is_hash_error() {
        let dir = TempDir::new().unwrap();
        let err = hash_directory(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, SkiffError::Hash { .. }));
    }

    #[test]
    fn pattern_matching() {
        assert!(matches_pattern("target", "target"));
        assert!(matches_pattern("target/debug", "target"));
        assert!(matches_pattern("a/b/target", "target"));
        assert!(matches_pattern("docs/x.md", "*.md"));
        assert!(matches_pattern("tmp-1", "tmp*"));
        assert!(matches_pattern("web/dist/app.js", "web/dist"));
        assert!(!matches_pattern("src/web/dist", "web/dist"));
        assert!(!matches_pattern("targets", "target"));
        assert!(!matches_pattern("anything", ""));
    }
}
