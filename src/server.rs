//! Minimal HTTP/1.1 front end for the [`Verifier`].
//!
//! Routes:
//! - `GET  /challenge?nbits=N`  (N defaults to 8)
//! - `POST /challenge_debug`    body `{"msg", "nbits"}`
//! - `POST /verify`             body `{"msg", "proof_bits", "nbits"}`
//!
//! Every response is JSON with `Connection: close`. Rejections carry
//! `{"detail": "..."}`; bodies that do not decode are answered with 422.

use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;

use crate::verifier::{DebugRequest, Verifier, VerifierError, VerifyRequest};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8008;
pub const DEFAULT_CHALLENGE_NBITS: i64 = 8;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest request body the server will read.
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Per-read deadline on accepted connections.
    pub read_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Reads `VERIFIER_HOST`, `VERIFIER_PORT` and `VERIFIER_READ_TIMEOUT_SECS`;
    /// unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("VERIFIER_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = lookup("VERIFIER_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let read_timeout = lookup("VERIFIER_READ_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_READ_TIMEOUT);
        Self {
            host,
            port,
            read_timeout,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Accepts connections forever, one thread per connection. A client that
/// stalls longer than `read_timeout` on any read is dropped.
pub fn serve(
    listener: TcpListener,
    verifier: Arc<Verifier>,
    read_timeout: Duration,
) -> io::Result<()> {
    let local = listener.local_addr()?;
    tracing::info!(addr = %local, "verifier listening");

    for stream in listener.incoming() {
        match stream {
            Ok(mut stream) => {
                let verifier = Arc::clone(&verifier);
                std::thread::spawn(move || {
                    let peer = stream.peer_addr().ok();
                    let handled = stream
                        .set_read_timeout(Some(read_timeout))
                        .and_then(|()| handle_connection(&mut stream, &verifier));
                    if let Err(e) = handled {
                        tracing::debug!(?peer, error = %e, "connection dropped");
                    }
                });
            }
            Err(e) => tracing::warn!(error = %e, "accept failed"),
        }
    }
    Ok(())
}

/// Binds `addr` and serves on a background thread. Returns the bound address,
/// which differs from `addr` when port 0 was requested.
pub fn spawn(
    addr: &str,
    verifier: Arc<Verifier>,
    read_timeout: Duration,
) -> io::Result<SocketAddr> {
    let listener = TcpListener::bind(addr)?;
    let local = listener.local_addr()?;
    std::thread::spawn(move || {
        if let Err(e) = serve(listener, verifier, read_timeout) {
            tracing::error!(error = %e, "verifier server stopped");
        }
    });
    Ok(local)
}

fn handle_connection(stream: &mut TcpStream, verifier: &Verifier) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;

    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 {
        let resp = http_json(400, &detail("malformed request line"));
        stream.write_all(resp.as_bytes())?;
        return stream.flush();
    }
    let (method, target) = (parts[0], parts[1]);

    let mut content_length: Option<usize> = Some(0);
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 || line.trim().is_empty() {
            break;
        }
        if let Some((key, val)) = line.trim().split_once(':') {
            if key.trim().eq_ignore_ascii_case("content-length") {
                content_length = val.trim().parse().ok();
            }
        }
    }

    let response = match content_length {
        None => http_json(400, &detail("invalid Content-Length")),
        Some(len) if len > MAX_BODY_BYTES => http_json(413, &detail("request body too large")),
        Some(len) => {
            let mut body = vec![0u8; len];
            reader.read_exact(&mut body)?;
            route(method, target, &String::from_utf8_lossy(&body), verifier)
        }
    };

    stream.write_all(response.as_bytes())?;
    stream.flush()
}

/// Dispatches one request and renders the full HTTP response.
pub fn route(method: &str, target: &str, body: &str, verifier: &Verifier) -> String {
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    };

    let (status, payload) = match (method, path) {
        ("GET", "/challenge") => handle_challenge(query, verifier),
        ("POST", "/challenge_debug") => handle_challenge_debug(body, verifier),
        ("POST", "/verify") => handle_verify(body, verifier),
        _ => (404, detail("Not Found")),
    };

    tracing::debug!(method, path, status, "request served");
    http_json(status, &payload)
}

fn handle_challenge(query: &str, verifier: &Verifier) -> (u16, String) {
    let params = parse_query(query);
    let nbits = match params.get("nbits") {
        None => DEFAULT_CHALLENGE_NBITS,
        Some(raw) => match raw.parse::<i64>() {
            Ok(n) => n,
            Err(_) => return (422, detail("nbits must be an integer")),
        },
    };
    respond(verifier.challenge(nbits, &mut rand::thread_rng()))
}

fn handle_challenge_debug(body: &str, verifier: &Verifier) -> (u16, String) {
    match serde_json::from_str::<DebugRequest>(body) {
        Ok(req) => respond(verifier.challenge_debug(&req)),
        Err(e) => (422, detail(&e.to_string())),
    }
}

fn handle_verify(body: &str, verifier: &Verifier) -> (u16, String) {
    match serde_json::from_str::<VerifyRequest>(body) {
        Ok(req) => respond(verifier.verify(&req)),
        Err(e) => (422, detail(&e.to_string())),
    }
}

fn respond<T: Serialize>(result: Result<T, VerifierError>) -> (u16, String) {
    match result {
        Ok(value) => match serde_json::to_string(&value) {
            Ok(body) => (200, body),
            Err(e) => (500, detail(&e.to_string())),
        },
        Err(e) => (e.status_code(), detail(&e.to_string())),
    }
}

fn parse_query(query: &str) -> HashMap<&str, &str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .collect()
}

fn detail(message: &str) -> String {
    json!({ "detail": message }).to_string()
}

fn http_json(status: u16, body: &str) -> String {
    let status_text = match status {
        200 => "OK",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        413 => "Payload Too Large",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        _ => "Unknown",
    };

    format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        status_text,
        body.len(),
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::VerifierConfig;
    use serde_json::Value;

    fn split(response: &str) -> (u16, Value) {
        let (head, body) = response.split_once("\r\n\r\n").unwrap();
        let status = head.split_whitespace().nth(1).unwrap().parse().unwrap();
        (status, serde_json::from_str(body).unwrap())
    }

    fn verifier(debug: bool) -> Verifier {
        Verifier::new(VerifierConfig {
            debug,
            ..VerifierConfig::default()
        })
    }

    #[test]
    fn test_challenge_default_and_explicit() {
        let v = verifier(false);
        let (status, body) = split(&route("GET", "/challenge", "", &v));
        assert_eq!(status, 200);
        assert_eq!(body["nbits"], 8);
        assert_eq!(body["msg"].as_str().unwrap().len(), 8);

        let (status, body) = split(&route("GET", "/challenge?nbits=12", "", &v));
        assert_eq!(status, 200);
        assert_eq!(body["nbits"], 12);
    }

    #[test]
    fn test_challenge_rejects_bad_nbits() {
        let v = verifier(false);
        let (status, body) = split(&route("GET", "/challenge?nbits=70", "", &v));
        assert_eq!(status, 400);
        assert!(body["detail"].as_str().unwrap().contains("nbits"));

        let (status, _) = split(&route("GET", "/challenge?nbits=abc", "", &v));
        assert_eq!(status, 422);
    }

    #[test]
    fn test_verify_route() {
        let v = verifier(false);
        let ok = route(
            "POST",
            "/verify",
            r#"{"msg":"abcd1234","proof_bits":"111","nbits":3}"#,
            &v,
        );
        let (status, body) = split(&ok);
        assert_eq!(status, 200);
        assert_eq!(body, json!({"ok": true, "nbits": 3}));

        let (status, _) = split(&route(
            "POST",
            "/verify",
            r#"{"msg":"abcd1234","proof_bits":"11","nbits":3}"#,
            &v,
        ));
        assert_eq!(status, 400);

        let (status, _) = split(&route("POST", "/verify", "{not json", &v));
        assert_eq!(status, 422);
    }

    #[test]
    fn test_debug_route_gated() {
        let body = r#"{"msg":"abcd1234","nbits":3}"#;
        let (status, payload) = split(&route("POST", "/challenge_debug", body, &verifier(false)));
        assert_eq!(status, 403);
        assert!(payload.get("target").is_none());

        let (status, payload) = split(&route("POST", "/challenge_debug", body, &verifier(true)));
        assert_eq!(status, 200);
        assert_eq!(payload["target"], "111");
    }

    #[test]
    fn test_unknown_route() {
        let v = verifier(true);
        assert_eq!(split(&route("GET", "/verify", "", &v)).0, 404);
        assert_eq!(split(&route("DELETE", "/challenge", "", &v)).0, 404);
    }

    #[test]
    fn test_server_config_from_lookup() {
        let config = ServerConfig::from_lookup(|key| match key {
            "VERIFIER_HOST" => Some("0.0.0.0".into()),
            "VERIFIER_PORT" => Some("9100".into()),
            "VERIFIER_READ_TIMEOUT_SECS" => Some("2".into()),
            _ => None,
        });
        assert_eq!(config.addr(), "0.0.0.0:9100");
        assert_eq!(config.read_timeout, Duration::from_secs(2));

        let fallback = ServerConfig::from_lookup(|key| {
            (key == "VERIFIER_PORT").then(|| "not-a-port".to_string())
        });
        assert_eq!(fallback, ServerConfig::default());
    }

    #[test]
    fn test_round_trip_over_tcp() {
        let addr = spawn("127.0.0.1:0", Arc::new(verifier(false)), DEFAULT_READ_TIMEOUT).unwrap();
        let mut stream = TcpStream::connect(addr).unwrap();
        let body = r#"{"msg":"abcd1234","proof_bits":"000","nbits":3}"#;
        write!(
            stream,
            "POST /verify HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        )
        .unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        let (status, payload) = split(&response);
        assert_eq!(status, 200);
        assert_eq!(payload["ok"], false);
    }

    #[test]
    fn test_bad_content_length_rejected() {
        let addr = spawn("127.0.0.1:0", Arc::new(verifier(false)), DEFAULT_READ_TIMEOUT).unwrap();
        let mut stream = TcpStream::connect(addr).unwrap();
        stream
            .write_all(b"POST /verify HTTP/1.1\r\nHost: localhost\r\nContent-Length: abc\r\n\r\n")
            .unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        let (status, payload) = split(&response);
        assert_eq!(status, 400);
        assert_eq!(payload["detail"], "invalid Content-Length");
    }

    #[test]
    fn test_stalled_client_is_dropped() {
        let addr = spawn(
            "127.0.0.1:0",
            Arc::new(verifier(false)),
            Duration::from_millis(200),
        )
        .unwrap();
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        // Headers never terminated.
        stream.write_all(b"POST /verify HTTP/1.1\r\nHost: localhost\r\n").unwrap();

        let start = std::time::Instant::now();
        let mut response = String::new();
        let _ = stream.read_to_string(&mut response);
        assert!(start.elapsed() < Duration::from_secs(3));
        assert!(response.is_empty());
    }
}
