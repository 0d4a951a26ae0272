//! Static pipeline: copy markup and the assets sub-tree verbatim.
//!
//! | Source                | Destination                  |
//! |-----------------------|------------------------------|
//! | `src/**/*.{html,php}` | `dist/<same relative path>`  |
//! | `src/assets/**`       | `dist/assets/<rel to assets>`|
//!
//! Every run is a full re-copy; nothing is diffed.

use crate::{
    config::{BuildConfig, Paths, defaults::patterns},
    log,
    utils::fs::FileSet,
    watch::{self, PipelineWatch, Trigger},
};
use anyhow::{Context, Result};
use std::{fs, path::PathBuf};

#[derive(Debug, Clone)]
pub struct StaticPipeline {
    paths: Paths,
    markup: FileSet,
    assets: FileSet,
}

impl StaticPipeline {
    pub fn new(config: &BuildConfig) -> Result<Self> {
        let paths = config.paths.clone();
        Ok(Self {
            markup: FileSet::new(&paths.src, patterns::MARKUP)?,
            assets: FileSet::new(&paths.assets_src(), &["**/*"])?,
            paths,
        })
    }

    /// Source → destination pairs for every matched file.
    ///
    /// A markup file inside the assets sub-tree maps to the same destination
    /// either way and is listed once.
    pub fn plan(&self) -> Vec<(PathBuf, PathBuf)> {
        let assets_out = self.paths.assets_out();

        let markup = self.markup.collect().into_iter().filter_map(|src| {
            let rel = self.markup.relative(&src)?.to_path_buf();
            Some((src, self.paths.dist.join(rel)))
        });
        let assets = self.assets.collect().into_iter().filter_map(|src| {
            let rel = self.assets.relative(&src)?.to_path_buf();
            Some((src, assets_out.join(rel)))
        });

        let mut plan: Vec<_> = markup.chain(assets).collect();
        plan.sort();
        plan.dedup();
        plan
    }

    /// Copy every matched file, overwriting what is already there.
    pub fn copy_all(&self) -> Result<usize> {
        let plan = self.plan();
        for (src, dest) in &plan {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(src, dest).with_context(|| {
                format!("Failed to copy {} → {}", src.display(), dest.display())
            })?;
        }
        log!("static"; "static files copied ({})", plan.len());
        Ok(plan.len())
    }

    /// Markup anywhere under `src`, plus anything under `src/assets`.
    pub fn watch_set(&self) -> Result<FileSet> {
        let patterns = [patterns::MARKUP, patterns::ASSETS].concat();
        FileSet::new(&self.paths.src, &patterns)
    }
}

/// Copy static files once and, in watch mode, re-copy on any change.
pub fn build(config: &BuildConfig) -> Result<Option<PipelineWatch>> {
    let pipeline = StaticPipeline::new(config)?;
    pipeline.copy_all()?;

    if !config.mode.watch {
        return Ok(None);
    }

    let set = pipeline.watch_set()?;
    let watch = watch::spawn("static", set, Trigger::Any, move || {
        pipeline.copy_all().map(|_| ())
    })?;
    log!("static"; "watching static files");
    Ok(Some(watch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Command, Mode};
    use std::path::Path;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn project() -> (tempfile::TempDir, BuildConfig) {
        let dir = tempdir().unwrap();
        let config = BuildConfig::for_command(dir.path(), Command::Build);
        let src = &config.paths.src;

        write(&src.join("index.php"), "<?php echo 1; ?>");
        write(&src.join("about.html"), "<h1>about</h1>");
        write(&src.join("partials/nav.php"), "<nav></nav>");
        write(&src.join("assets/img/logo.svg"), "<svg/>");
        write(&src.join("assets/fonts/a.woff2"), "font");
        write(&src.join("styles/main.scss"), ".a { color: red; }");
        write(&src.join("js/app.js"), "console.log(1)");
        write(&src.join("notes.md"), "# notes");

        config.paths.ensure_dirs().unwrap();
        (dir, config)
    }

    fn listing(root: &Path) -> Vec<String> {
        let mut files: Vec<_> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                e.path()
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_copies_exactly_matched_files() {
        let (_dir, config) = project();
        let copied = StaticPipeline::new(&config).unwrap().copy_all().unwrap();

        assert_eq!(copied, 5);
        assert_eq!(
            listing(&config.paths.dist),
            vec![
                "about.html",
                "assets/fonts/a.woff2",
                "assets/img/logo.svg",
                "index.php",
                "partials/nav.php",
            ]
        );
    }

    #[test]
    fn test_overwrites_existing_output() {
        let (_dir, config) = project();
        let pipeline = StaticPipeline::new(&config).unwrap();
        pipeline.copy_all().unwrap();

        write(&config.paths.src.join("about.html"), "<h1>changed</h1>");
        pipeline.copy_all().unwrap();

        let copied = fs::read_to_string(config.paths.dist.join("about.html")).unwrap();
        assert_eq!(copied, "<h1>changed</h1>");
    }

    #[test]
    fn test_markup_inside_assets_is_copied_once() {
        let (_dir, config) = project();
        write(&config.paths.src.join("assets/embed.html"), "<p/>");

        let plan = StaticPipeline::new(&config).unwrap().plan();
        let dest = config.paths.assets_out().join("embed.html");
        assert_eq!(plan.iter().filter(|(_, d)| *d == dest).count(), 1);
    }

    #[test]
    fn test_missing_assets_dir_is_fine() {
        let dir = tempdir().unwrap();
        let config = BuildConfig::for_command(dir.path(), Command::Build);
        write(&config.paths.src.join("index.html"), "<p/>");

        let copied = StaticPipeline::new(&config).unwrap().copy_all().unwrap();
        assert_eq!(copied, 1);
    }

    #[test]
    fn test_watch_set_patterns() {
        let (_dir, mut config) = project();
        config.mode = Mode::development();
        let set = StaticPipeline::new(&config).unwrap().watch_set().unwrap();
        let src = &config.paths.src;

        assert!(set.matches(&src.join("partials/nav.php")));
        assert!(set.matches(&src.join("assets/img/new.png")));
        assert!(!set.matches(&src.join("styles/main.scss")));
        assert!(!set.matches(&src.join("js/app.js")));
    }
}
