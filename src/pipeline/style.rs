//! Style pipeline: Sass → CSS → post-processing → `dist/assets/main.css`.
//!
//! ```text
//! styles/main.scss ──grass──► tmp/main.css ──utility cmd──► tmp/main.utility.css
//!                                                                │
//!                         dist/assets/main.css ◄──lightningcss───┘
//!                                                (prefix, minify in production)
//! ```

use crate::{
    config::{BuildConfig, Paths, defaults::patterns},
    exec, log,
    utils::{
        exec::OutputFilter,
        fs::{FileSet, write_atomic},
    },
    watch::{self, PipelineWatch, Trigger},
};
use anyhow::{Context, Result, anyhow};
use lightningcss::{
    stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet},
    targets::{Browsers, Targets},
};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Utility generator noise: version banner and timing line.
static UTILITY_FILTER: OutputFilter = OutputFilter::new(&["≈ tailwindcss", "Done in"]);

/// Encode a browser major version the way lightningcss expects it.
const fn version(major: u32) -> Option<u32> {
    Some(major << 16)
}

/// Browsers that receive vendor prefixes.
fn targets() -> Targets {
    Targets::from(Browsers {
        chrome: version(100),
        edge: version(100),
        firefox: version(100),
        safari: version(13),
        ios_saf: version(13),
        samsung: version(16),
        ..Browsers::default()
    })
}

/// Everything one style run needs, owned so watch reruns can move it.
#[derive(Debug, Clone)]
pub struct StylePipeline {
    paths: Paths,
    production: bool,
    utility: Option<Vec<String>>,
}

impl StylePipeline {
    pub fn new(config: &BuildConfig) -> Self {
        Self {
            paths: config.paths.clone(),
            production: config.mode.production,
            utility: config.tools.utility.clone(),
        }
    }

    /// Run compile → post-process → write once, to completion.
    ///
    /// The published file is only replaced after every step succeeded.
    pub fn compile(&self) -> Result<()> {
        let entry = self.paths.style_entry();
        let name = entry
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        log!("css"; "compiling {name}...");
        let css = compile_sass(&entry)?;
        log!("css"; "compiled");

        let tmp = self.paths.style_tmp();
        fs::create_dir_all(&self.paths.tmp)?;
        fs::write(&tmp, css).with_context(|| format!("Failed to write {}", tmp.display()))?;
        log!("css"; "wrote temp file");

        let expanded = self.expand_utilities(&tmp)?;
        let source = fs::read_to_string(&expanded)
            .with_context(|| format!("Failed to read {}", expanded.display()))?;
        let processed = post_process(&source, &self.paths.rel(&expanded), self.production)?;
        log!("css"; "processing done");

        let out = self.paths.style_out();
        write_atomic(&out, processed)?;
        log!("css"; "css built: {}", self.paths.rel(&out));
        Ok(())
    }

    /// Stylesheets plus every file whose class names feed utility generation.
    pub fn watch_set(&self) -> Result<FileSet> {
        let patterns = [patterns::STYLES, patterns::UTILITY_SOURCES].concat();
        FileSet::new(&self.paths.src, &patterns)
    }

    /// Run the utility generator over `input`, scanning from the project root.
    ///
    /// Returns the file holding the expanded CSS.
    fn expand_utilities(&self, input: &Path) -> Result<PathBuf> {
        let Some(utility) = &self.utility else {
            return Ok(input.to_path_buf());
        };

        let output = self.paths.utility_tmp();
        exec!(filter=&UTILITY_FILTER; &self.paths.root; utility; "-i", input, "-o", &output)?;
        Ok(output)
    }
}

/// Compile a Sass entry and its imports to expanded CSS.
pub fn compile_sass(entry: &Path) -> Result<String> {
    let mut options = grass::Options::default().style(grass::OutputStyle::Expanded);
    if let Some(dir) = entry.parent() {
        options = options.load_path(dir);
    }

    grass::from_path(entry, &options).map_err(|e| anyhow!("{}: {e}", entry.display()))
}

/// Add vendor prefixes and, in production, minify the printed output.
///
/// lightningcss only inserts prefixes from its `minify` pass, so that pass
/// runs in both modes. It also merges duplicate rules, collapses longhands
/// into shorthands and shortens colors, even in development. Development
/// output differs only in being pretty-printed, one declaration per line.
pub fn post_process(css: &str, filename: &str, production: bool) -> Result<String> {
    let mut sheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: filename.to_owned(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| anyhow!("{filename}: {e}"))?;

    sheet
        .minify(MinifyOptions {
            targets: targets(),
            ..MinifyOptions::default()
        })
        .map_err(|e| anyhow!("{filename}: {e}"))?;

    let result = sheet
        .to_css(PrinterOptions {
            minify: production,
            targets: targets(),
            ..PrinterOptions::default()
        })
        .map_err(|e| anyhow!("{filename}: {e}"))?;

    Ok(result.code)
}

/// Build styles once and, in watch mode, keep rebuilding on changes.
pub fn build(config: &BuildConfig) -> Result<Option<PipelineWatch>> {
    let pipeline = StylePipeline::new(config);
    pipeline.compile()?;

    if !config.mode.watch {
        return Ok(None);
    }

    let set = pipeline.watch_set()?;
    let watch = watch::spawn("css", set, Trigger::Changes, move || pipeline.compile())?;
    log!("css"; "watching css");
    Ok(Some(watch))
}
