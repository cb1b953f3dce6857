//! File system collaborator
//!
//! Existence, timestamps and wildcard scans go through the [`FileSystem`]
//! trait so evaluation and up-to-date checks can be driven from tests.

use glob::MatchOptions;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

/// One file matched by a wildcard include
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardMatch {
    /// Matched path, relative to the base directory when the pattern was
    pub path: String,
    /// Directory portion covered by the wildcard directory part of the pattern
    pub recursive_dir: String,
}

pub trait FileSystem {
    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    fn modified(&self, path: &Path) -> Option<SystemTime>;

    fn created(&self, path: &Path) -> Option<SystemTime>;

    fn accessed(&self, path: &Path) -> Option<SystemTime>;

    /// Expand a wildcard pattern (`*`, `?`, `**`) against `base_dir`.
    ///
    /// Only files are matched; results are in lexical order.
    fn expand_wildcard(&self, base_dir: &Path, pattern: &str) -> Vec<WildcardMatch>;
}

/// The real file system
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskFileSystem;

impl FileSystem for DiskFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn modified(&self, path: &Path) -> Option<SystemTime> {
        fs::metadata(path).and_then(|m| m.modified()).ok()
    }

    fn created(&self, path: &Path) -> Option<SystemTime> {
        fs::metadata(path).and_then(|m| m.created()).ok()
    }

    fn accessed(&self, path: &Path) -> Option<SystemTime> {
        fs::metadata(path).and_then(|m| m.accessed()).ok()
    }

    fn expand_wildcard(&self, base_dir: &Path, pattern: &str) -> Vec<WildcardMatch> {
        let pattern = normalize_separators(pattern);
        let relative = !Path::new(&pattern).is_absolute();
        let full_pattern = if relative {
            format!(
                "{}/{}",
                normalize_separators(&base_dir.to_string_lossy()).trim_end_matches('/'),
                pattern
            )
        } else {
            pattern.clone()
        };

        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };

        let paths = match glob::glob_with(&full_pattern, options) {
            Ok(paths) => paths,
            Err(err) => {
                tracing::warn!(pattern = %full_pattern, error = %err, "invalid wildcard pattern");
                return Vec::new();
            }
        };

        let fixed_prefix = wildcard_fixed_prefix(&pattern);
        let mut matches: Vec<WildcardMatch> = paths
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .filter_map(|path| {
                let shown = if relative {
                    path.strip_prefix(base_dir).ok()?.to_path_buf()
                } else {
                    path
                };
                let shown = normalize_separators(&shown.to_string_lossy());
                let recursive_dir = recursive_dir_of(&shown, &fixed_prefix);
                Some(WildcardMatch {
                    path: shown,
                    recursive_dir,
                })
            })
            .collect();
        matches.sort_by(|a, b| a.path.cmp(&b.path));
        matches
    }
}

/// Use `/` as the only separator
pub fn normalize_separators(s: &str) -> String {
    s.replace('\\', "/")
}

/// Directory part of `pattern` before the first wildcard component, with a
/// trailing `/` when non-empty
pub fn wildcard_fixed_prefix(pattern: &str) -> String {
    let pattern = normalize_separators(pattern);
    let mut prefix = String::new();
    let components: Vec<&str> = pattern.split('/').collect();
    for component in &components[..components.len().saturating_sub(1)] {
        if component.contains('*') || component.contains('?') {
            break;
        }
        prefix.push_str(component);
        prefix.push('/');
    }
    prefix
}

fn recursive_dir_of(matched: &str, fixed_prefix: &str) -> String {
    let rest = matched.strip_prefix(fixed_prefix).unwrap_or(matched);
    match rest.rfind('/') {
        Some(idx) => rest[..=idx].to_string(),
        None => String::new(),
    }
}

/// Lexically resolve `.` and `..` components
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve `spec` against `base_dir` unless it is already absolute
pub fn resolve(base_dir: &Path, spec: &str) -> PathBuf {
    let path = Path::new(spec);
    if path.is_absolute() {
        normalize_path(path)
    } else {
        normalize_path(&base_dir.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fixed_prefix() {
        assert_eq!(wildcard_fixed_prefix("src/**/*.cs"), "src/");
        assert_eq!(wildcard_fixed_prefix("*.cs"), "");
        assert_eq!(wildcard_fixed_prefix("a/b/c?.txt"), "a/b/");
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
    }

    #[test]
    fn test_expand_wildcard_with_recursive_dir() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("src/net/http")).unwrap();
        fs::write(root.join("src/main.cs"), "").unwrap();
        fs::write(root.join("src/net/http/client.cs"), "").unwrap();
        fs::write(root.join("src/readme.md"), "").unwrap();

        let matches = DiskFileSystem.expand_wildcard(root, "src/**/*.cs");
        let paths: Vec<&str> = matches.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["src/main.cs", "src/net/http/client.cs"]);
        assert_eq!(matches[0].recursive_dir, "");
        assert_eq!(matches[1].recursive_dir, "net/http/");
    }

    #[test]
    fn test_expand_wildcard_single_level() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("a.txt"), "").unwrap();
        fs::write(root.join("sub/b.txt"), "").unwrap();

        let matches = DiskFileSystem.expand_wildcard(root, "*.txt");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].path, "a.txt");
    }
}
