//! Per-pipeline file watching.
//!
//! Each watching pipeline owns one `notify` watcher and one worker thread.
//! Reruns of a pipeline never overlap, and events that arrive while a rerun
//! is in flight collapse into a single follow-up rerun.
//!
//! ```text
//! notify ──► channel ──► worker ──► rerun() ──► drain ──┬─► pending? rerun() again
//!                                                       └─► idle:   wait for next event
//! ```

use crate::{log, logger, utils::fs::FileSet};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::{
    sync::mpsc::{Receiver, TryRecvError},
    thread::{self, JoinHandle},
};

type EventResult = notify::Result<Event>;

/// Which event kinds re-run a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Created or modified files.
    Changes,
    /// Created, modified or removed files.
    Any,
}

impl Trigger {
    const fn accepts(self, kind: &EventKind) -> bool {
        match self {
            Self::Changes => matches!(kind, EventKind::Create(_) | EventKind::Modify(_)),
            Self::Any => matches!(
                kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ),
        }
    }
}

/// What the worker found in the channel after a rerun.
#[derive(Debug, PartialEq, Eq)]
enum Pending {
    Rerun,
    Idle,
    Closed,
}

/// A live watch for one pipeline. Dropping it stops the watcher.
pub struct PipelineWatch {
    name: &'static str,
    watcher: Option<RecommendedWatcher>,
    worker: Option<JoinHandle<()>>,
}

impl PipelineWatch {
    /// Stop watching and wait for an in-flight rerun to finish.
    pub fn stop(mut self) {
        drop(self.watcher.take());
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            log!("watch"; "{} worker panicked", self.name);
        }
    }
}

impl Drop for PipelineWatch {
    fn drop(&mut self) {
        drop(self.watcher.take());
    }
}

/// Watch `set` and call `rerun` for every relevant change.
///
/// Errors from `rerun` are logged and the watch keeps going.
pub fn spawn<F>(
    name: &'static str,
    set: FileSet,
    trigger: Trigger,
    mut rerun: F,
) -> Result<PipelineWatch>
where
    F: FnMut() -> Result<()> + Send + 'static,
{
    // notify reports canonical paths on some platforms
    let base = set
        .base()
        .canonicalize()
        .unwrap_or_else(|_| set.base().to_path_buf());
    let set = set.rebased(&base);

    let (tx, rx) = std::sync::mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;
    watcher
        .watch(&base, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}: {}", name, base.display()))?;

    let worker = thread::Builder::new()
        .name(format!("watch-{name}"))
        .spawn(move || {
            let relevant = |event: &Event| {
                trigger.accepts(&event.kind) && event.paths.iter().any(|p| set.matches(p))
            };
            run_loop(name, &rx, relevant, &mut rerun);
        })
        .context("Failed to spawn watch thread")?;

    Ok(PipelineWatch {
        name,
        watcher: Some(watcher),
        worker: Some(worker),
    })
}

/// Serve events until the channel closes.
fn run_loop<R, F>(name: &str, rx: &Receiver<EventResult>, relevant: R, rerun: &mut F)
where
    R: Fn(&Event) -> bool,
    F: FnMut() -> Result<()>,
{
    while let Ok(message) = rx.recv() {
        match message {
            Ok(event) if relevant(&event) => loop {
                report(name, rerun());
                match drain(rx, &relevant) {
                    Pending::Rerun => {}
                    Pending::Idle => break,
                    Pending::Closed => return,
                }
            },
            Ok(_) => {}
            Err(e) => log!("watch"; "{name}: {e}"),
        }
    }
}

/// Empty the channel without blocking. Any relevant event fills the single
/// rerun slot; the rest are absorbed by it.
fn drain<R>(rx: &Receiver<EventResult>, relevant: &R) -> Pending
where
    R: Fn(&Event) -> bool,
{
    let mut pending = false;
    loop {
        match rx.try_recv() {
            Ok(Ok(event)) => pending |= relevant(&event),
            Ok(Err(e)) => log!("watch"; "error: {e}"),
            Err(TryRecvError::Empty) if pending => return Pending::Rerun,
            Err(TryRecvError::Empty) => return Pending::Idle,
            // Queued changes still get their rerun; the next drain reports Closed
            Err(TryRecvError::Disconnected) if pending => return Pending::Rerun,
            Err(TryRecvError::Disconnected) => return Pending::Closed,
        }
    }
}

fn report(name: &str, result: Result<()>) {
    let ts = logger::timestamp();
    match result {
        Ok(()) => log!("watch"; "[{ts}] {name} rebuilt"),
        Err(e) => {
            log!("watch"; "[{ts}] {name} build failed");
            log!("watch"; "{e:#}");
        }
    }
}
