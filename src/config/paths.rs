//! The directory set and every fixed path derived from it.
//!
//! ```text
//! Paths (root)
//!     │
//!     ├── src/  ── styles/main.scss, js/app.js, **/*.{html,php}, assets/**
//!     ├── dist/ ── mirrors markup; compiled + copied assets under dist/assets
//!     └── tmp/  ── intermediate CSS only
//! ```

use super::defaults::{dirs, entries};
use anyhow::{Context, Result};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Resolved source, output and temporary roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub root: PathBuf,
    pub src: PathBuf,
    pub dist: PathBuf,
    pub tmp: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new(dirs::root())
    }
}

impl Paths {
    /// Resolve the fixed directory names against a project root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            src: root.join(dirs::src()),
            dist: root.join(dirs::dist()),
            tmp: root.join(dirs::tmp()),
            root,
        }
    }

    #[inline]
    pub fn style_entry(&self) -> PathBuf {
        self.src.join(entries::STYLE)
    }

    #[inline]
    pub fn script_entry(&self) -> PathBuf {
        self.src.join(entries::SCRIPT)
    }

    #[inline]
    pub fn style_tmp(&self) -> PathBuf {
        self.tmp.join(entries::STYLE_TMP)
    }

    #[inline]
    pub fn utility_tmp(&self) -> PathBuf {
        self.tmp.join(entries::UTILITY_TMP)
    }

    #[inline]
    pub fn assets_src(&self) -> PathBuf {
        self.src.join(dirs::ASSETS)
    }

    #[inline]
    pub fn assets_out(&self) -> PathBuf {
        self.dist.join(dirs::ASSETS)
    }

    #[inline]
    pub fn style_out(&self) -> PathBuf {
        self.assets_out().join(entries::STYLE_OUT)
    }

    /// Create `dist`, `dist/assets` and `tmp`. Safe to call repeatedly.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.dist, &self.assets_out(), &self.tmp] {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }

    /// Remove `dist` and `tmp` recursively. Missing directories are fine.
    pub fn clean(&self) -> Result<()> {
        for dir in [&self.dist, &self.tmp] {
            match fs::remove_dir_all(dir) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to remove directory: {}", dir.display()));
                }
            }
        }
        Ok(())
    }

    /// Path relative to the project root, for log display.
    ///
    /// `/proj/dist/assets/main.css` → `dist/assets/main.css`
    pub fn rel(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}
