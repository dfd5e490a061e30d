//! Path filter: decides whether a path is observed at all.
//!
//! Rules, in order:
//! 1. reject any segment below the target root starting with `.`
//! 2. reject paths deeper than `depth + 1` segments below the root
//! 3. reject paths outside every target root
//!
//! Only segments *below* the root count, so a target that itself lives in a
//! hidden directory (e.g. `~/.config/app`) is still observed.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Pure predicate over the configured target roots.
#[derive(Debug, Clone)]
pub struct PathFilter {
    roots: Vec<PathBuf>,
    depth: usize,
}

impl PathFilter {
    pub fn new(roots: impl IntoIterator<Item = PathBuf>, depth: usize) -> Self {
        Self {
            roots: roots.into_iter().collect(),
            depth,
        }
    }

    pub fn should_observe(&self, path: &Path) -> bool {
        self.root_of(path)
            .is_some_and(|root| observes(root, path, self.depth))
    }

    /// Innermost target root containing `path`.
    pub fn root_of(&self, path: &Path) -> Option<&Path> {
        self.roots
            .iter()
            .filter(|root| path.starts_with(root))
            .max_by_key(|root| root.components().count())
            .map(PathBuf::as_path)
    }
}

/// Whether `path` is observed below `root` with the given depth limit.
pub fn observes(root: &Path, path: &Path, depth: usize) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };

    let mut segments = 0;
    for component in relative.components() {
        match component {
            Component::Normal(name) if is_hidden(name) => return false,
            Component::Normal(_) => segments += 1,
            Component::CurDir => {}
            _ => return false,
        }
    }

    segments <= depth + 1
}

/// Number of segments between `root` and `path`, if `path` is below `root`.
pub fn relative_depth(root: &Path, path: &Path) -> Option<usize> {
    path.strip_prefix(root)
        .ok()
        .map(|relative| relative.components().count())
}

fn is_hidden(name: &OsStr) -> bool {
    name.as_encoded_bytes().first() == Some(&b'.')
}
