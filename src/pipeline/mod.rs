//! The three asset pipelines and the session that owns their watchers.
//!
//! ```text
//! run_all()
//!     │
//!     ├── ensure dist/, dist/assets/, tmp/
//!     ├── style::build()   ──► Option<PipelineWatch>
//!     ├── script::build()  ──► Option<BundleWatch>
//!     └── statics::build() ──► Option<PipelineWatch>
//! ```
//!
//! Startup is sequential in that order. Once running, each pipeline reacts
//! only to its own files and writes only its own outputs.

pub mod script;
pub mod statics;
pub mod style;

use crate::{config::BuildConfig, log, watch::PipelineWatch};
use anyhow::Result;
use script::BundleWatch;

/// A long-lived resource left behind by a pipeline in watch mode.
pub enum Handle {
    Watch(PipelineWatch),
    Bundle(BundleWatch),
}

impl From<PipelineWatch> for Handle {
    fn from(watch: PipelineWatch) -> Self {
        Self::Watch(watch)
    }
}

impl From<BundleWatch> for Handle {
    fn from(watch: BundleWatch) -> Self {
        Self::Bundle(watch)
    }
}

/// Everything kept alive after the first run. Empty outside watch mode.
#[derive(Default)]
pub struct Session {
    handles: Vec<Handle>,
}

impl Session {
    fn keep(&mut self, handle: Option<impl Into<Handle>>) {
        self.handles.extend(handle.map(Into::into));
    }

    /// Release watchers and the bundler in reverse start order.
    pub fn close(mut self) {
        while let Some(handle) = self.handles.pop() {
            match handle {
                Handle::Watch(watch) => watch.stop(),
                Handle::Bundle(bundle) => {
                    if let Err(e) = bundle.dispose() {
                        log!("js"; "{e:#}");
                    }
                }
            }
        }
    }
}

/// Run styles, scripts and static files once, in that order.
///
/// The first error aborts the remaining pipelines and releases any watcher
/// already started.
pub fn run_all(config: &BuildConfig) -> Result<Session> {
    config.paths.ensure_dirs()?;

    let mut session = Session::default();
    session.keep(style::build(config)?);
    session.keep(script::build(config)?);
    session.keep(statics::build(config)?);
    Ok(session)
}
