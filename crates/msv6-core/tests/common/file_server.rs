//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves a fixed set of paths with `Range: bytes=N-` / `bytes=N-M` support,
//! answers 416 with `Content-Range: bytes */LEN` past the end, records every
//! request and tracks the peak number of requests being served at once.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct FileServerOptions {
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// Held before answering each request.
    pub delay: Duration,
}

impl Default for FileServerOptions {
    fn default() -> Self {
        Self {
            support_ranges: true,
            delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Request target including any query string.
    pub target: String,
    pub range_start: Option<u64>,
}

#[derive(Default)]
struct State {
    requests: Mutex<Vec<RecordedRequest>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

pub struct FileServer {
    base: String,
    state: Arc<State>,
}

impl FileServer {
    /// Starts a server in a background thread. Routes are matched on the full
    /// request target first, then on the path without query.
    pub fn start(files: Vec<(&str, Vec<u8>)>) -> Self {
        Self::start_with_options(files, FileServerOptions::default())
    }

    pub fn start_with_options(files: Vec<(&str, Vec<u8>)>, opts: FileServerOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let routes: Arc<HashMap<String, Vec<u8>>> =
            Arc::new(files.into_iter().map(|(p, b)| (p.to_string(), b)).collect());
        let state = Arc::new(State::default());
        let server_state = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let routes = Arc::clone(&routes);
                let state = Arc::clone(&server_state);
                thread::spawn(move || handle(stream, &routes, &state, opts));
            }
        });
        Self {
            base: format!("http://127.0.0.1:{port}"),
            state,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// `/a.bin` → `http://127.0.0.1:PORT/a.bin`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.target.split('?').next() == Some(path))
            .collect()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.state.peak.load(Ordering::SeqCst)
    }
}

fn handle(mut stream: TcpStream, routes: &HashMap<String, Vec<u8>>, state: &State, opts: FileServerOptions) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let (method, target, range) = parse_request(request);
    state.requests.lock().unwrap().push(RecordedRequest {
        target: target.to_string(),
        range_start: range.map(|(start, _)| start),
    });

    let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.peak.fetch_max(now, Ordering::SeqCst);
    if !opts.delay.is_zero() {
        thread::sleep(opts.delay);
    }
    respond(&mut stream, method, target, range, routes, opts);
    state.in_flight.fetch_sub(1, Ordering::SeqCst);
}

fn respond(
    stream: &mut TcpStream,
    method: &str,
    target: &str,
    range: Option<(u64, u64)>,
    routes: &HashMap<String, Vec<u8>>,
    opts: FileServerOptions,
) {
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        return;
    }
    let path = target.split('?').next().unwrap_or(target);
    let Some(body) = routes.get(target).or_else(|| routes.get(path)) else {
        let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        return;
    };
    let total = body.len() as u64;
    let (status, content_range, slice) = match range.filter(|_| opts.support_ranges) {
        Some((start, end_incl)) => {
            let end_incl = end_incl.min(total.saturating_sub(1));
            if start > end_incl || start >= total {
                ("416 Range Not Satisfiable", Some(format!("bytes */{total}")), &body[0..0])
            } else {
                let slice = &body[start as usize..=end_incl as usize];
                (
                    "206 Partial Content",
                    Some(format!("bytes {start}-{end_incl}/{total}")),
                    slice,
                )
            }
        }
        None => ("200 OK", None, &body[..]),
    };
    let content_range = content_range
        .map(|v| format!("Content-Range: {v}\r\n"))
        .unwrap_or_default();
    let accept_ranges = if opts.support_ranges { "Accept-Ranges: bytes\r\n" } else { "" };
    let head = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\n{content_range}{accept_ranges}Connection: close\r\n\r\n",
        slice.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(slice);
}

/// Returns (method, target, optional (start, end_inclusive) for `Range: bytes=X-Y`).
fn parse_request(request: &str) -> (&str, &str, Option<(u64, u64)>) {
    let mut lines = request.lines();
    let mut first = lines.next().unwrap_or("").split_whitespace();
    let method = first.next().unwrap_or("");
    let target = first.next().unwrap_or("/");
    let mut range = None;
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case("range") {
            continue;
        }
        let Some(spec) = value.trim().strip_prefix("bytes=") else {
            continue;
        };
        if let Some((a, b)) = spec.split_once('-') {
            let start = a.trim().parse::<u64>().unwrap_or(0);
            let end = b.trim();
            let end_incl = if end.is_empty() {
                u64::MAX
            } else {
                end.parse::<u64>().unwrap_or(0)
            };
            range = Some((start, end_incl));
        }
    }
    (method, target, range)
}
