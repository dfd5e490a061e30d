//! Path normalization utilities.

use std::path::{Path, PathBuf};

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`).
/// Falls back to:
/// - Return as-is if already absolute
/// - Join with current directory if relative
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_absolute() {
        let path = Path::new("/absolute/path/file.txt");
        assert_eq!(normalize_path(path), path);
    }

    #[test]
    fn test_normalize_path_relative() {
        let normalized = normalize_path(Path::new("relative/path/file.txt"));
        assert!(normalized.is_absolute());
        assert!(normalized.ends_with("relative/path/file.txt"));
    }

    #[test]
    fn test_normalize_existing_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        let nested = temp.path().join("a");
        std::fs::create_dir(&nested).unwrap();
        let dotted = temp.path().join("a").join("..").join("a");
        assert_eq!(normalize_path(&dotted), normalize_path(&nested));
    }
}
