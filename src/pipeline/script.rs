//! Script pipeline: bundle `src/js/app.js` into `dist/assets`.
//!
//! The bundler is held as an explicit resource:
//!
//! ```text
//! BundleContext::new ──► rebuild() ──► dispose()          (one-shot)
//!        │
//!        └──► watch() ──► BundleWatch ──► dispose()/drop  (incremental)
//! ```
//!
//! In watch mode the bundler runs its own incremental rebuild loop; no
//! separate file watcher is installed for this stage.

use crate::{
    config::BuildConfig,
    log,
    utils::exec::{self, EMPTY_FILTER, RunningProcess, internal::to_cmd_vec},
};
use anyhow::Result;
use std::{ffi::OsString, path::PathBuf};

/// Bundler invocation for one entry point, not yet running anything.
#[derive(Debug)]
pub struct BundleContext {
    root: PathBuf,
    command: Vec<OsString>,
    args: Vec<OsString>,
}

impl BundleContext {
    pub fn new(config: &BuildConfig) -> Self {
        Self {
            root: config.paths.root.clone(),
            command: to_cmd_vec(&config.tools.bundler),
            args: bundle_args(config),
        }
    }

    /// Run one complete build.
    pub fn rebuild(&self) -> Result<()> {
        exec::exec(Some(self.root.as_path()), &self.command, &self.args, &EMPTY_FILTER)?;
        Ok(())
    }

    /// Hand the context over to the bundler's incremental watch mode.
    ///
    /// The bundler performs the initial build itself, in the background:
    /// this returns once the process is started, so `dist/assets/app.js`
    /// may appear shortly after the dev server is already listening.
    pub fn watch(self) -> Result<BundleWatch> {
        let mut args = self.args;
        args.push("--watch".into());

        let process = exec::spawn_with_stdin(Some(self.root.as_path()), &self.command, &args)?;
        Ok(BundleWatch {
            process: Some(process),
        })
    }

    /// Release the context.
    ///
    /// A context owns no live process until [`BundleContext::watch`] turns
    /// it into a [`BundleWatch`]; each `rebuild` runs to completion, so
    /// there is nothing left to stop here.
    pub fn dispose(self) {}
}

/// A long-lived incremental bundler. Released on `dispose` or drop by
/// closing its stdin and reaping the process.
#[derive(Debug)]
pub struct BundleWatch {
    process: Option<RunningProcess>,
}

impl BundleWatch {
    pub fn dispose(mut self) -> Result<()> {
        match self.process.take() {
            Some(process) => process.close().map(|_| ()),
            None => Ok(()),
        }
    }
}

impl Drop for BundleWatch {
    fn drop(&mut self) {
        if let Some(process) = self.process.take()
            && let Err(e) = process.close()
        {
            log!("js"; "{e}");
        }
    }
}

/// Command-line flags for the bundler.
///
/// Production minifies and drops source maps; development keeps source
/// maps and leaves the output readable.
fn bundle_args(config: &BuildConfig) -> Vec<OsString> {
    let paths = &config.paths;
    let mut out_dir = OsString::from("--outdir=");
    out_dir.push(paths.assets_out());

    let mut args: Vec<OsString> = vec![
        paths.script_entry().into(),
        "--bundle".into(),
        out_dir,
        "--log-level=warning".into(),
    ];
    if config.mode.production {
        args.push("--minify".into());
    } else {
        args.push("--sourcemap".into());
    }
    args
}

/// Build scripts once, or start the bundler's watch mode.
pub fn build(config: &BuildConfig) -> Result<Option<BundleWatch>> {
    let context = BundleContext::new(config);

    if config.mode.watch {
        let watch = context.watch()?;
        log!("js"; "watching js");
        return Ok(Some(watch));
    }

    context.rebuild()?;
    context.dispose();
    log!("js"; "js built");
    Ok(None)
}
