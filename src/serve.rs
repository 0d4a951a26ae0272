//! Development server with live reload.
//!
//! Serves `dist/` over HTTP with `tiny_http`:
//!
//! - Static file serving, query strings ignored
//! - `index.html` then `index.php` resolution for directories
//! - Directory listing when a directory has no index
//! - Reload client injected into HTML and PHP responses
//! - Graceful shutdown on Ctrl+C
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌──────────────────┐
//! │   Main Thread   │     │  Output Watcher  │     │ Pipeline Watches │
//! │  (HTTP Server)  │     │  (dist/ → hub)   │     │ (src/ → dist/)   │
//! └────────┬────────┘     └────────┬─────────┘     └────────┬─────────┘
//!          │                       │                        │
//!          ▼                       ▼                        ▼
//!    serve files /           broadcast              rebuild outputs
//!    upgrade sockets         css | reload
//! ```
//!
//! PHP is not executed; `.php` files are returned as HTML.

use crate::{
    config::BuildConfig,
    log,
    reload::{self, LiveReload},
};
use anyhow::{Context, Result, anyhow};
use std::{
    borrow::Cow,
    fs,
    io::Cursor,
    path::{Path, PathBuf},
    sync::Arc,
};
use tiny_http::{Header, Request, Response, Server, StatusCode};

// ============================================================================
// Constants - HTML Templates
// ============================================================================

/// Directory listing HTML template (embedded at compile time)
const DIRECTORY_TEMPLATE: &str = include_str!("embed/serve/directory.html");

/// Shown when the output directory has nothing to list
const WELCOME_TEMPLATE: &str = include_str!("embed/serve/welcome.html");

/// Index files tried for a directory, in order.
const INDEX_FILES: &[&str] = &["index.html", "index.php"];

// ============================================================================
// Server Entry Point
// ============================================================================

/// Serve `dist/` until Ctrl+C.
///
/// Binds the fixed address once; an address in use is an error.
pub fn serve_site(config: &BuildConfig) -> Result<()> {
    let addr = config.serve.addr()?;
    let server = Server::http(addr).map_err(|e| anyhow!("Failed to bind {addr}: {e}"))?;
    let server = Arc::new(server);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    let hub = LiveReload::default();
    let _output_watch = reload::watch_output(&config.paths.dist, hub.clone())?;

    let url = config.serve.url();
    log!("serve"; "serving on {url}");
    if config.serve.open
        && let Err(e) = open::that(&url)
    {
        log!("serve"; "could not open browser: {e}");
    }

    for request in server.incoming_requests() {
        let result = if LiveReload::is_upgrade(&request) {
            hub.accept(request)
        } else {
            handle_request(request, &config.paths.dist)
        };
        if let Err(e) = result {
            log!("serve"; "request error: {e}");
        }
    }

    Ok(())
}

// ============================================================================
// Request Handling
// ============================================================================

/// What a request path resolves to under the serve root.
#[derive(Debug, PartialEq, Eq)]
enum Resolved {
    File(PathBuf),
    Listing(PathBuf),
    NotFound,
}

/// Map a raw request URL to something under `root`.
///
/// Resolution order:
/// 1. Exact file match
/// 2. Directory with `index.html`, then `index.php`
/// 3. Directory without an index → listing
/// 4. Nothing found
fn resolve(root: &Path, url: &str) -> (String, Resolved) {
    // Cache-busting queries (`main.css?t=123`) never reach the filesystem
    let path = url.split('?').next().unwrap_or_default();
    let decoded = urlencoding::decode(path).unwrap_or(Cow::Borrowed(path));
    let request_path = decoded.trim_matches('/').to_owned();

    if request_path.split('/').any(|seg| seg == "..") {
        return (request_path, Resolved::NotFound);
    }

    let local_path = root.join(&request_path);
    if local_path.is_file() {
        return (request_path, Resolved::File(local_path));
    }

    if local_path.is_dir() {
        let index = INDEX_FILES
            .iter()
            .map(|name| local_path.join(name))
            .find(|p| p.is_file());
        let resolved = match index {
            Some(index) => Resolved::File(index),
            None => Resolved::Listing(local_path),
        };
        return (request_path, resolved);
    }

    (request_path, Resolved::NotFound)
}

fn handle_request(request: Request, root: &Path) -> Result<()> {
    match resolve(root, request.url()) {
        (_, Resolved::File(path)) => serve_file(request, &path),
        (request_path, Resolved::Listing(dir)) => match generate_directory_listing(&dir, &request_path)
        {
            Ok(listing) => serve_html(request, &listing),
            Err(_) => serve_not_found(request),
        },
        (_, Resolved::NotFound) => serve_not_found(request),
    }
}

// ============================================================================
// Response Helpers
// ============================================================================

fn content_type_header(value: &str) -> Result<Header> {
    Header::from_bytes("Content-Type", value).map_err(|()| anyhow!("Invalid header value: {value}"))
}

/// Serve a file with appropriate content type; pages get the reload client.
fn serve_file(request: Request, path: &Path) -> Result<()> {
    if is_page(path) {
        let html = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return serve_html(request, &html);
    }

    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let response =
        Response::from_data(content).with_header(content_type_header(guess_content_type(path))?);
    request.respond(response)?;
    Ok(())
}

/// Serve HTML content with the reload client injected.
fn serve_html(request: Request, content: &str) -> Result<()> {
    let response = Response::from_string(reload::inject_script(content))
        .with_header(content_type_header("text/html; charset=utf-8")?);
    request.respond(response)?;
    Ok(())
}

/// Serve 404 Not Found response.
fn serve_not_found(request: Request) -> Result<()> {
    let response = Response::new(
        StatusCode(404),
        vec![content_type_header("text/plain")?],
        Cursor::new("404 Not Found"),
        Some(13),
        None,
    );
    request.respond(response)?;
    Ok(())
}

// ============================================================================
// Content Type Detection
// ============================================================================

fn is_page(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("html" | "htm" | "php")
    )
}

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        // Web content
        Some("html" | "htm" | "php") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("map" | "json") => "application/json; charset=utf-8",

        // Images
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("ico") => "image/x-icon",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",

        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

// ============================================================================
// Directory Listing
// ============================================================================

/// Generate an HTML directory listing.
///
/// Hidden entries are skipped; directories are listed before files. An
/// empty directory gets the welcome page instead.
fn generate_directory_listing(dir_path: &Path, request_path: &str) -> std::io::Result<String> {
    let mut entries: Vec<(bool, String)> = fs::read_dir(dir_path)?
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                return None;
            }
            let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
            Some((!is_dir, name))
        })
        .collect();
    entries.sort();

    if entries.is_empty() {
        return Ok(WELCOME_TEMPLATE
            .replace("{title}", "Welcome")
            .replace("{version}", env!("CARGO_PKG_VERSION")));
    }

    let items: Vec<String> = entries
        .iter()
        .map(|(is_file, name)| {
            let icon = if *is_file { "📄" } else { "📁" };
            let href = if request_path.is_empty() {
                format!("/{name}")
            } else {
                format!("/{request_path}/{name}")
            };
            format!(r#"<li><span class="icon">{icon}</span><a href="{href}">{name}</a></li>"#)
        })
        .collect();

    let parent_link = if request_path.is_empty() {
        String::new()
    } else {
        let parent_href = match request_path.rsplit_once('/') {
            Some((parent, _)) => format!("/{parent}"),
            None => "/".to_owned(),
        };
        format!(
            r#"<li class="parent"><span class="icon">📂</span><a href="{parent_href}">..</a></li>"#
        )
    };

    #[allow(clippy::literal_string_with_formatting_args)]
    // These are template placeholders, not format args
    Ok(DIRECTORY_TEMPLATE
        .replace("{path}", request_path)
        .replace("{parent_link}", &parent_link)
        .replace("{entries}", &items.join("\n        ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{io::Read, net::TcpStream, thread};
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_resolve_order() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "index.php", "<?php ?>");
        write(root, "both/index.html", "<p/>");
        write(root, "both/index.php", "<?php ?>");
        write(root, "bare/notes.txt", "x");
        write(root, "assets/main.css", "a{}");

        assert_eq!(resolve(root, "/").1, Resolved::File(root.join("index.php")));
        assert_eq!(resolve(root, "/both/").1, Resolved::File(root.join("both/index.html")));
        assert_eq!(resolve(root, "/bare").1, Resolved::Listing(root.join("bare")));
        assert_eq!(resolve(root, "/missing.html").1, Resolved::NotFound);
        assert_eq!(
            resolve(root, "/assets/main.css?t=1712345").1,
            Resolved::File(root.join("assets/main.css"))
        );
    }

    #[test]
    fn test_resolve_decodes_and_rejects_parent_segments() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("dist");
        write(&root, "my page.html", "<p/>");
        write(dir.path(), "secret.txt", "x");

        assert_eq!(
            resolve(&root, "/my%20page.html").1,
            Resolved::File(root.join("my page.html"))
        );
        assert_eq!(resolve(&root, "/../secret.txt").1, Resolved::NotFound);
        assert_eq!(resolve(&root, "/%2E%2E/secret.txt").1, Resolved::NotFound);
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type(Path::new("a.php")), "text/html; charset=utf-8");
        assert_eq!(guess_content_type(Path::new("a.css")), "text/css; charset=utf-8");
        assert_eq!(guess_content_type(Path::new("app.js.map")), "application/json; charset=utf-8");
        assert_eq!(guess_content_type(Path::new("a.woff2")), "font/woff2");
        assert_eq!(guess_content_type(Path::new("a.bin")), "application/octet-stream");
    }

    #[test]
    fn test_directory_listing() {
        let dir = tempdir().unwrap();
        write(dir.path(), "docs/b.html", "");
        write(dir.path(), "docs/a/x.html", "");
        write(dir.path(), "docs/.hidden", "");

        let html = generate_directory_listing(&dir.path().join("docs"), "docs").unwrap();
        assert!(html.contains(r#"<a href="/docs/a">a</a>"#));
        assert!(html.contains(r#"<a href="/docs/b.html">b.html</a>"#));
        assert!(!html.contains(".hidden"));
        assert!(html.contains(r#"<a href="/">..</a>"#));
        // directories first
        assert!(html.find("/docs/a\"").unwrap() < html.find("/docs/b.html").unwrap());
    }

    #[test]
    fn test_empty_directory_shows_welcome() {
        let dir = tempdir().unwrap();
        let html = generate_directory_listing(dir.path(), "").unwrap();
        assert!(html.contains("<title>Welcome</title>"));
        assert!(html.contains(env!("CARGO_PKG_VERSION")));
    }

    /// Serve one request against `root` and return the raw HTTP response.
    fn roundtrip(root: &Path, path: &str) -> String {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let root = root.to_path_buf();
        let worker = thread::spawn(move || {
            let request = server.recv().unwrap();
            handle_request(request, &root).unwrap();
        });

        let mut stream = TcpStream::connect(addr).unwrap();
        std::io::Write::write_all(
            &mut stream,
            format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").as_bytes(),
        )
        .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        worker.join().unwrap();
        response
    }

    #[test]
    fn test_pages_get_reload_client() {
        let dir = tempdir().unwrap();
        write(dir.path(), "index.php", "<html><body><?php echo 1; ?></body></html>");

        let response = roundtrip(dir.path(), "/");
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("text/html; charset=utf-8"));
        assert!(response.contains("<?php echo 1; ?>"));
        assert!(response.contains(reload::RELOAD_PATH));
    }

    #[test]
    fn test_assets_served_verbatim() {
        let dir = tempdir().unwrap();
        write(dir.path(), "assets/main.css", ".a{color:red}");

        let response = roundtrip(dir.path(), "/assets/main.css?t=42");
        assert!(response.contains("text/css; charset=utf-8"));
        assert!(response.ends_with(".a{color:red}"));
        assert!(!response.contains("<script>"));
    }

    #[test]
    fn test_missing_path_is_404() {
        let dir = tempdir().unwrap();
        let response = roundtrip(dir.path(), "/nope.html");
        assert!(response.starts_with("HTTP/1.1 404"));
        assert!(response.ends_with("404 Not Found"));
    }
}
