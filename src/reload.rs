//! Live reload for the dev server.
//!
//! ```text
//! dist/ ──notify──► Debouncer (100ms) ──► classify ──► LiveReload::broadcast
//!                                                          │
//!                          browser ◄── "css" | "reload" ◄──┘
//! ```
//!
//! Browsers connect over a WebSocket upgraded on the same port as the HTTP
//! server, at [`RELOAD_PATH`]. A batch made only of stylesheets swaps the
//! stylesheets in place; anything else reloads the page.

use crate::log;
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::{
    io::{Read, Write},
    path::{Path, PathBuf},
    sync::{Arc, mpsc::RecvTimeoutError},
    thread,
    time::{Duration, Instant},
};
use tiny_http::{Header, Request, Response, StatusCode};
use tungstenite::{Message, WebSocket, handshake::derive_accept_key, protocol::Role};

pub const RELOAD_PATH: &str = "/__livereload";

/// Client script, injected into every served page.
const CLIENT_SCRIPT: &str = include_str!("embed/serve/livereload.js");

const DEBOUNCE_MS: u64 = 100;

// ============================================================================
// Script Injection
// ============================================================================

/// Insert the reload client before the last `</body>`, or append it when
/// the document has none (PHP fragments, partial templates).
pub fn inject_script(html: &str) -> String {
    let tag = format!("<script>{CLIENT_SCRIPT}</script>");
    match html.rfind("</body>") {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + tag.len());
            out.push_str(&html[..pos]);
            out.push_str(&tag);
            out.push_str(&html[pos..]);
            out
        }
        None => format!("{html}{tag}"),
    }
}

// ============================================================================
// Signals
// ============================================================================

/// What connected browsers should do about a batch of output changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Swap stylesheets without reloading.
    Css,
    /// Full page reload.
    Reload,
}

impl Signal {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::Reload => "reload",
        }
    }
}

pub fn classify(paths: &[PathBuf]) -> Signal {
    let css_only = !paths.is_empty()
        && paths
            .iter()
            .all(|p| p.extension().is_some_and(|ext| ext == "css"));
    if css_only { Signal::Css } else { Signal::Reload }
}

// ============================================================================
// WebSocket Hub
// ============================================================================

/// Anything an upgraded HTTP connection can be used as.
trait Stream: Read + Write + Send {}
impl<T: Read + Write + Send> Stream for T {}

type Socket = WebSocket<Box<dyn Stream>>;

/// Connected browsers. Cheap to clone; clones share the same clients.
#[derive(Clone, Default)]
pub struct LiveReload {
    clients: Arc<Mutex<Vec<Socket>>>,
}

impl LiveReload {
    /// Whether `request` asks to join the reload channel.
    pub fn is_upgrade(request: &Request) -> bool {
        let path = request.url().split('?').next().unwrap_or_default();
        path == RELOAD_PATH
            && header(request, "Upgrade").is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
    }

    /// Complete the WebSocket handshake and register the connection.
    pub fn accept(&self, request: Request) -> Result<()> {
        let key = header(&request, "Sec-WebSocket-Key").context("Missing Sec-WebSocket-Key header")?;
        let accept = derive_accept_key(key.as_bytes());

        let response = Response::empty(StatusCode(101)).with_header(
            Header::from_bytes("Sec-WebSocket-Accept", accept)
                .map_err(|()| anyhow::anyhow!("Invalid accept header"))?,
        );
        let stream: Box<dyn Stream> = Box::new(request.upgrade("websocket", response));

        let socket = WebSocket::from_raw_socket(stream, Role::Server, None);
        let mut clients = self.clients.lock();
        clients.push(socket);
        log!("serve"; "live reload connected ({})", clients.len());
        Ok(())
    }

    /// Send `signal` to every client, dropping the ones that went away.
    pub fn broadcast(&self, signal: Signal) {
        let mut clients = self.clients.lock();
        clients.retain_mut(|socket| socket.send(Message::text(signal.as_str())).is_ok());
        log!("serve"; "{} ({} connected)", signal.as_str(), clients.len());
    }
}

fn header<'a>(request: &'a Request, name: &'static str) -> Option<&'a str> {
    request
        .headers()
        .iter()
        .find(|h| h.field.equiv(name))
        .map(|h| h.value.as_str())
}

// ============================================================================
// Output Watcher
// ============================================================================

/// Editor and staging artifacts that never trigger a reload.
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    name.starts_with('.') || name.ends_with('~') || name.ends_with(".partial")
}

/// Collects changed paths until the output has been quiet for a moment.
struct Debouncer {
    pending: FxHashSet<PathBuf>,
    last_event: Option<Instant>,
}

impl Debouncer {
    fn new() -> Self {
        Self {
            pending: FxHashSet::default(),
            last_event: None,
        }
    }

    fn add(&mut self, event: Event) {
        for path in event.paths {
            if !is_temp_file(&path) {
                self.pending.insert(path);
            }
        }
        self.last_event = Some(Instant::now());
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty()
            && self
                .last_event
                .is_some_and(|t| t.elapsed() >= Duration::from_millis(DEBOUNCE_MS))
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        self.pending.drain().collect()
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            Duration::from_secs(60)
        } else {
            Duration::from_millis(DEBOUNCE_MS)
        }
    }
}

const fn is_output_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Watch the output tree and notify `hub` after each settled batch.
///
/// Watching stops when the returned watcher is dropped.
pub fn watch_output(dist: &Path, hub: LiveReload) -> Result<RecommendedWatcher> {
    let (tx, rx) = std::sync::mpsc::channel::<notify::Result<Event>>();
    let mut watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;
    watcher
        .watch(dist, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", dist.display()))?;

    thread::Builder::new()
        .name("watch-output".into())
        .spawn(move || {
            let mut debouncer = Debouncer::new();
            loop {
                match rx.recv_timeout(debouncer.timeout()) {
                    Ok(Ok(event)) if is_output_change(&event.kind) => debouncer.add(event),
                    Ok(Ok(_)) | Err(RecvTimeoutError::Timeout) => {}
                    Ok(Err(e)) => log!("watch"; "{e}"),
                    Err(RecvTimeoutError::Disconnected) => break,
                }

                if debouncer.ready() {
                    hub.broadcast(classify(&debouncer.take()));
                }
            }
        })
        .context("Failed to spawn output watch thread")?;

    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::ModifyKind;
    use tiny_http::Server;

    #[test]
    fn test_inject_before_closing_body() {
        let html = "<html><body><p>hi</p></body></html>";
        let out = inject_script(html);
        let script = out.find("<script>").unwrap();
        assert!(script > out.find("<p>hi</p>").unwrap());
        assert!(script < out.find("</body>").unwrap());
        assert!(out.contains(RELOAD_PATH));
    }

    #[test]
    fn test_inject_uses_last_body_tag() {
        let html = "<pre>&lt;/body&gt; </body></pre></body>";
        let out = inject_script(html);
        assert!(out.ends_with("</script></body>"));
    }

    #[test]
    fn test_inject_appends_without_body() {
        let out = inject_script("<?php echo 1; ?>");
        assert!(out.starts_with("<?php echo 1; ?><script>"));
        assert!(out.ends_with("</script>"));
    }

    #[test]
    fn test_classify() {
        let css = vec![PathBuf::from("/d/assets/main.css")];
        assert_eq!(classify(&css), Signal::Css);

        let mixed = vec![
            PathBuf::from("/d/assets/main.css"),
            PathBuf::from("/d/assets/app.js"),
        ];
        assert_eq!(classify(&mixed), Signal::Reload);
        assert_eq!(classify(&[PathBuf::from("/d/index.php")]), Signal::Reload);
        assert_eq!(classify(&[]), Signal::Reload);
    }

    #[test]
    fn test_temp_files_are_ignored() {
        assert!(is_temp_file(Path::new("/d/assets/.main.css.partial")));
        assert!(is_temp_file(Path::new("/d/index.html~")));
        assert!(!is_temp_file(Path::new("/d/assets/main.css")));
    }

    #[test]
    fn test_debouncer_collects_and_settles() {
        let mut debouncer = Debouncer::new();
        assert!(!debouncer.ready());
        assert_eq!(debouncer.timeout(), Duration::from_secs(60));

        let kind = EventKind::Modify(ModifyKind::Any);
        debouncer.add(Event::new(kind).add_path("/d/a.css".into()));
        debouncer.add(Event::new(kind).add_path("/d/a.css".into()));
        debouncer.add(Event::new(kind).add_path("/d/.a.css.partial".into()));
        assert!(!debouncer.ready());

        thread::sleep(Duration::from_millis(DEBOUNCE_MS + 20));
        assert!(debouncer.ready());
        assert_eq!(debouncer.take(), vec![PathBuf::from("/d/a.css")]);
        assert!(!debouncer.ready());
    }

    #[test]
    fn test_broadcast_reaches_connected_client() {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let hub = LiveReload::default();

        let accepting = hub.clone();
        let worker = thread::spawn(move || {
            let request = server.recv().unwrap();
            assert!(LiveReload::is_upgrade(&request));
            accepting.accept(request).unwrap();
        });

        let (mut client, response) =
            tungstenite::connect(format!("ws://{addr}{RELOAD_PATH}")).unwrap();
        assert_eq!(response.status().as_u16(), 101);
        worker.join().unwrap();
        assert_eq!(hub.clients.lock().len(), 1);

        hub.broadcast(Signal::Css);
        assert_eq!(client.read().unwrap(), Message::text("css"));

        hub.broadcast(Signal::Reload);
        assert_eq!(client.read().unwrap(), Message::text("reload"));
    }

    #[test]
    fn test_plain_request_is_not_an_upgrade() {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let client = thread::spawn(move || {
            let mut stream = std::net::TcpStream::connect(addr).unwrap();
            stream
                .write_all(b"GET /__livereload?x=1 HTTP/1.1\r\nHost: localhost\r\nupgrade: h2c\r\n\r\n")
                .unwrap();
            stream
        });

        let request = server.recv().unwrap();
        assert_eq!(header(&request, "Upgrade"), Some("h2c"));
        assert_eq!(header(&request, "HOST"), Some("localhost"));
        assert_eq!(header(&request, "Sec-WebSocket-Key"), None);
        assert!(!LiveReload::is_upgrade(&request));
        drop(client.join().unwrap());
    }
}
