use std::env;
use std::fs::File;
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};

use tiny_http::{Header, Response, Server, StatusCode};

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = env::args().nth(1).unwrap_or_else(|| DEFAULT_ADDR.to_string());
    let root = env::current_dir()?.join("web");
    if !root.is_dir() {
        eprintln!("web directory not found at {}", root.display());
        std::process::exit(1);
    }

    let server = Server::http(&addr)?;
    println!("serving {} on http://{}", root.display(), addr);
    for request in server.incoming_requests() {
        let method = request.method().to_string();
        let url = request.url().to_string();
        let path = url.split('?').next().unwrap_or("/");
        let status = match resolve(&root, path).and_then(|p| File::open(&p).ok().map(|f| (p, f))) {
            Some((path, file)) => {
                let mut response = Response::from_file(file);
                if let Ok(header) = Header::from_bytes("Content-Type", content_type(&path)) {
                    response.add_header(header);
                }
                // Rebuilt wasm must never be served stale during development.
                if let Ok(header) = Header::from_bytes("Cache-Control", "no-cache") {
                    response.add_header(header);
                }
                let _ = request.respond(response);
                200
            }
            None => {
                let _ = request.respond(not_found());
                404
            }
        };
        println!("{method} {url} -> {status}");
    }
    Ok(())
}

// Maps a request path to a file under the web root, refusing anything that
// would escape it ("..", absolute components, etc.).
fn resolve(root: &Path, url: &str) -> Option<PathBuf> {
    let relative = url.trim_start_matches('/');
    let candidate = Path::new(relative);
    if candidate
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    let mut path = root.join(candidate);
    if relative.is_empty() || path.is_dir() {
        path = path.join("index.html");
    }
    path.is_file().then_some(path)
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
        "html" => "text/html; charset=utf-8",
        "js" => "application/javascript",
        "css" => "text/css",
        "wasm" => "application/wasm",
        "json" => "application/json",
        "png" => "image/png",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

fn not_found() -> Response<Cursor<Vec<u8>>> {
    Response::from_string("Not Found").with_status_code(StatusCode(404))
}
