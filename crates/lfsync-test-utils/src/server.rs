// Copyright (C) 2026  lfsync Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! In-process resolve server.
//!
//! Serves the two URL shapes the sync engine uses:
//!
//! - `GET /<owner>/<name>/tree/<branch>`: `200` for public repositories,
//!   `401` for private ones without the right bearer token, `404` otherwise
//! - `GET /<owner>/<name>/resolve/<branch>/<path>`: file content, honouring
//!   `Range: bytes=<start>-` with `206`/`416`
//!
//! Failures can be injected to exercise retries.

use crate::repo::UpstreamRepo;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One request seen by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Raw request path
    pub path: String,
    /// `Range` header, if any
    pub range: Option<String>,
    /// `Authorization` header, if any
    pub authorization: Option<String>,
}

impl RecordedRequest {
    /// True for `resolve` downloads.
    pub fn is_resolve(&self) -> bool {
        self.path.split('/').nth(3) == Some("resolve")
    }
}

#[derive(Default)]
struct ServerState {
    files: Mutex<HashMap<String, Bytes>>,
    repos: Mutex<HashSet<String>>,
    private: Mutex<HashMap<String, String>>,
    requests: Mutex<Vec<RecordedRequest>>,
    fail_next: AtomicUsize,
    ignore_range: AtomicBool,
}

fn encode_segment(segment: &str) -> String {
    segment.replace('%', "%25").replace(' ', "%20")
}

fn resolve_key(owner: &str, name: &str, branch: &str, rel_path: &str) -> String {
    let path: Vec<String> = rel_path.split('/').map(encode_segment).collect();
    format!("/{}/{}/resolve/{}/{}", owner, name, branch, path.join("/"))
}

fn parse_range_start(value: &str) -> Option<usize> {
    value
        .strip_prefix("bytes=")?
        .strip_suffix('-')?
        .parse()
        .ok()
}

/// Running server, shut down on drop.
pub struct ResolveServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    _shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl ResolveServer {
    /// Bind to an ephemeral local port and start serving.
    pub async fn start() -> Self {
        let state = Arc::new(ServerState::default());
        let app = Router::new()
            .fallback(handle)
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get local address");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        Self {
            addr,
            state,
            _shutdown_tx: shutdown_tx,
        }
    }

    /// Base URL to use as the remote endpoint.
    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Register `owner/name` and serve every file of `upstream` on `branch`.
    pub fn publish(&self, owner: &str, name: &str, branch: &str, upstream: &UpstreamRepo) {
        self.add_repo(owner, name);
        for (path, content) in upstream.contents() {
            self.add_file(owner, name, branch, path, content);
        }
    }

    /// Register a repository without files.
    pub fn add_repo(&self, owner: &str, name: &str) {
        self.state
            .repos
            .lock()
            .unwrap()
            .insert(format!("{}/{}", owner, name));
    }

    /// Serve `content` at the resolve URL of `rel_path`.
    pub fn add_file(&self, owner: &str, name: &str, branch: &str, rel_path: &str, content: &[u8]) {
        self.state.files.lock().unwrap().insert(
            resolve_key(owner, name, branch, rel_path),
            Bytes::copy_from_slice(content),
        );
    }

    /// Require `Authorization: Bearer <token>` for `owner/name`.
    pub fn make_private(&self, owner: &str, name: &str, token: &str) {
        self.state
            .private
            .lock()
            .unwrap()
            .insert(format!("{}/{}", owner, name), format!("Bearer {}", token));
    }

    /// Answer the next `count` resolve requests with `503`.
    pub fn fail_next(&self, count: usize) {
        self.state.fail_next.store(count, Ordering::SeqCst);
    }

    /// Answer range requests with the full body and `200`.
    pub fn ignore_range(&self, ignore: bool) {
        self.state.ignore_range.store(ignore, Ordering::SeqCst);
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Only the resolve downloads.
    pub fn resolve_requests(&self) -> Vec<RecordedRequest> {
        self.requests().into_iter().filter(|r| r.is_resolve()).collect()
    }
}

async fn handle(State(state): State<Arc<ServerState>>, uri: Uri, headers: HeaderMap) -> Response {
    let path = uri.path().to_string();
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let request = RecordedRequest {
        path: path.clone(),
        range: header_value(header::RANGE),
        authorization: header_value(header::AUTHORIZATION),
    };
    state.requests.lock().unwrap().push(request.clone());

    let segments: Vec<&str> = path.trim_start_matches('/').splitn(4, '/').collect();
    let [owner, name, kind, _rest] = segments.as_slice() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let repo_id = format!("{}/{}", owner, name);
    if !state.repos.lock().unwrap().contains(&repo_id) {
        return StatusCode::NOT_FOUND.into_response();
    }
    if let Some(expected) = state.private.lock().unwrap().get(&repo_id) {
        if request.authorization.as_deref() != Some(expected.as_str()) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    match *kind {
        "tree" => StatusCode::OK.into_response(),
        "resolve" => serve_file(&state, &path, request.range.as_deref()),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

fn serve_file(state: &ServerState, path: &str, range: Option<&str>) -> Response {
    let failed = state
        .fail_next
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if failed {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let Some(body) = state.files.lock().unwrap().get(path).cloned() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let len = body.len();

    let start = range
        .and_then(parse_range_start)
        .filter(|_| !state.ignore_range.load(Ordering::SeqCst));
    match start {
        Some(start) if start >= len => (
            StatusCode::RANGE_NOT_SATISFIABLE,
            [(header::CONTENT_RANGE, format!("bytes */{}", len))],
        )
            .into_response(),
        Some(start) => (
            StatusCode::PARTIAL_CONTENT,
            [(
                header::CONTENT_RANGE,
                format!("bytes {}-{}/{}", start, len - 1, len),
            )],
            body.slice(start..),
        )
            .into_response(),
        None => (StatusCode::OK, body).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_key_encodes_spaces() {
        assert_eq!(
            resolve_key("acme", "model", "main", "dir/my file.bin"),
            "/acme/model/resolve/main/dir/my%20file.bin"
        );
    }

    #[test]
    fn test_parse_range_start() {
        assert_eq!(parse_range_start("bytes=1024-"), Some(1024));
        assert_eq!(parse_range_start("bytes=0-10"), None);
        assert_eq!(parse_range_start("items=5-"), None);
    }

    #[test]
    fn test_request_kind() {
        let request = RecordedRequest {
            path: "/acme/model/resolve/main/a.bin".to_string(),
            range: None,
            authorization: None,
        };
        assert!(request.is_resolve());
        let probe = RecordedRequest {
            path: "/acme/model/tree/main".to_string(),
            ..request
        };
        assert!(!probe.is_resolve());
    }
}
