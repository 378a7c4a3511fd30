//! Minimal HTTP/1.1 campaign API for integration tests.
//!
//! `GET  /api/campaigns/{id}/status` drains the stock by `step` and
//! returns what is left. `POST /api/admin/batch/simulate/{id}` accepts,
//! except for id `closed` (400, success=false) and `broken` (500).

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub struct CampaignState {
    pub stock: AtomicU64,
    pub total: u64,
    pub step: u64,
    pub status_hits: AtomicU64,
    pub submit_hits: AtomicU64,
}

/// Starts the server on a background thread. Returns the base URL (without
/// trailing slash) and the shared campaign state.
pub fn start(stock: u64, step: u64) -> (String, Arc<CampaignState>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let state = Arc::new(CampaignState {
        stock: AtomicU64::new(stock),
        total: stock,
        step,
        status_hits: AtomicU64::new(0),
        submit_hits: AtomicU64::new(0),
    });
    let shared = Arc::clone(&state);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let state = Arc::clone(&shared);
            thread::spawn(move || handle(stream, &state));
        }
    });
    (format!("http://127.0.0.1:{}", port), state)
}

fn handle(mut stream: TcpStream, state: &CampaignState) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let Some((method, path)) = read_request(&mut stream) else {
        return;
    };

    let (status, body) = route(&method, &path, state);
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
}

fn route(method: &str, path: &str, state: &CampaignState) -> (&'static str, String) {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match (method, segments.as_slice()) {
        ("GET", ["api", "campaigns", _id, "status"]) => {
            state.status_hits.fetch_add(1, Ordering::SeqCst);
            let previous = state
                .stock
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |s| {
                    Some(s.saturating_sub(state.step))
                })
                .unwrap_or(0);
            let current = previous.saturating_sub(state.step);
            let sold = state.total - current;
            (
                "200 OK",
                format!(
                    r#"{{"success":true,"data":{{"campaignId":1,"totalStock":{},"currentStock":{},"successCount":{},"failCount":0}}}}"#,
                    state.total, current, sold
                ),
            )
        }
        ("POST", ["api", "admin", "batch", "simulate", id]) => {
            state.submit_hits.fetch_add(1, Ordering::SeqCst);
            match *id {
                "closed" => (
                    "400 Bad Request",
                    r#"{"success":false,"message":"campaign closed","errorCode":"CAMPAIGN_CLOSED"}"#
                        .to_string(),
                ),
                "broken" => ("500 Internal Server Error", "oops".to_string()),
                _ => (
                    "200 OK",
                    r#"{"success":true,"data":"simulation started"}"#.to_string(),
                ),
            }
        }
        _ => (
            "404 Not Found",
            r#"{"success":false,"message":"not found"}"#.to_string(),
        ),
    }
}

/// Reads the request head and any body announced by Content-Length.
fn read_request(stream: &mut TcpStream) -> Option<(String, String)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = std::str::from_utf8(&buf[..head_end]).ok()?;
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let content_length = lines
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let mut have = buf.len() - head_end;
    while have < content_length {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            break;
        }
        have += n;
    }
    Some((method, path))
}
