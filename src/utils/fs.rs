//! Glob-matched file sets and atomic writes.

use anyhow::{Context, Result};
use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use std::{
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// Files to ignore during directory traversal
pub const IGNORED_FILES: &[&str] = &[".DS_Store"];

/// A set of glob patterns anchored at a base directory.
///
/// Patterns are matched against paths relative to `base`; `*` never crosses
/// a `/`, `**` does.
#[derive(Debug, Clone)]
pub struct FileSet {
    base: PathBuf,
    globs: GlobSet,
}

impl FileSet {
    pub fn new(base: impl Into<PathBuf>, patterns: &[&str]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(compile(pattern)?);
        }
        let globs = builder.build().context("Failed to build glob set")?;
        Ok(Self {
            base: base.into(),
            globs,
        })
    }

    #[inline]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Whether `path` (absolute or base-relative) belongs to the set.
    pub fn matches(&self, path: &Path) -> bool {
        self.relative(path).is_some_and(|rel| self.globs.is_match(rel))
    }

    /// Path relative to the base, if it lies under it.
    pub fn relative<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        if path.is_relative() && !path.starts_with(&self.base) {
            return Some(path);
        }
        path.strip_prefix(&self.base).ok()
    }

    /// Every existing file under `base` that matches, in walk order.
    pub fn collect(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.base)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                let name = e.file_name().to_str().unwrap_or_default();
                !IGNORED_FILES.contains(&name)
            })
            .map(walkdir::DirEntry::into_path)
            .filter(|path| self.matches(path))
            .collect()
    }

    /// Copy of this set rooted at a different (e.g. canonical) base.
    pub fn rebased(&self, base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            globs: self.globs.clone(),
        }
    }
}

fn compile(pattern: &str) -> Result<Glob> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("Invalid glob pattern: {pattern}"))
}

/// Write `content` to `dest` through a sibling temp file and a rename, so
/// readers never see a half-written file.
pub fn write_atomic(dest: &Path, content: impl AsRef<[u8]>) -> Result<()> {
    let parent = dest
        .parent()
        .with_context(|| format!("No parent directory for {}", dest.display()))?;
    fs::create_dir_all(parent)?;

    let file_name = dest
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid file name: {}", dest.display()))?;
    let staging = parent.join(format!(".{file_name}.partial"));

    fs::write(&staging, content)
        .with_context(|| format!("Failed to write {}", staging.display()))?;
    fs::rename(&staging, dest)
        .with_context(|| format!("Failed to publish {}", dest.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn test_matches_relative_and_nested() {
        let set = FileSet::new("/proj/src", &["**/*.html", "**/*.php"]).unwrap();
        assert!(set.matches(Path::new("/proj/src/index.html")));
        assert!(set.matches(Path::new("/proj/src/pages/about.php")));
        assert!(set.matches(Path::new("partials/nav.php")));
        assert!(!set.matches(Path::new("/proj/src/styles/main.scss")));
        assert!(!set.matches(Path::new("/other/index.html")));
    }

    #[test]
    fn test_star_does_not_cross_separator() {
        let set = FileSet::new("/src", &["assets/*"]).unwrap();
        assert!(set.matches(Path::new("/src/assets/logo.png")));
        assert!(!set.matches(Path::new("/src/assets/img/logo.png")));

        let deep = FileSet::new("/src", &["assets/**/*"]).unwrap();
        assert!(deep.matches(Path::new("/src/assets/img/logo.png")));
    }

    #[test]
    fn test_brace_alternatives() {
        let set = FileSet::new("/src", &["**/*.{html,php,js}"]).unwrap();
        assert!(set.matches(Path::new("/src/js/app.js")));
        assert!(set.matches(Path::new("/src/index.php")));
        assert!(!set.matches(Path::new("/src/styles/a.scss")));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(FileSet::new("/src", &["a[b"]).is_err());
    }

    #[test]
    fn test_collect_filters_and_sorts() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        touch(&src.join("b.html"));
        touch(&src.join("a.html"));
        touch(&src.join("styles/main.scss"));
        touch(&src.join("nested/.DS_Store"));

        let set = FileSet::new(&src, &["**/*"]).unwrap();
        let files: Vec<_> = set
            .collect()
            .into_iter()
            .map(|p| p.strip_prefix(&src).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            files,
            vec![
                PathBuf::from("a.html"),
                PathBuf::from("b.html"),
                PathBuf::from("styles/main.scss"),
            ]
        );
    }

    #[test]
    fn test_write_atomic_replaces_and_leaves_no_staging() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("out/main.css");

        write_atomic(&dest, "a{}").unwrap();
        write_atomic(&dest, "b{}").unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "b{}");
        assert!(!dir.path().join("out/.main.css.partial").exists());
    }
}
