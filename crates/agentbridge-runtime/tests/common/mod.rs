//! Shared fixtures: a minimal in-process agent HTTP server and a fake
//! agent executable, so lifecycle tests never touch the network or a real
//! agent install.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// How the fake agent answers `POST /message`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageBehavior {
    /// Well-formed `AgentResponse` body
    Ok,
    /// Syntactically valid JSON with the wrong shape
    Malformed,
    /// HTTP 500 with a plain body
    ServerError,
}

/// Handle to a running fake agent server.
pub struct FakeAgent {
    pub addr: SocketAddr,
    /// Total TCP connections accepted; proves (non-)traffic in tests
    pub connections: Arc<AtomicUsize>,
    _task: JoinHandle<()>,
}

impl FakeAgent {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.addr.port())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

/// Bind a fake agent on an ephemeral port, serving `/status` and `/message`.
pub async fn spawn_fake_agent(behavior: MessageBehavior) -> FakeAgent {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake agent");
    let addr = listener.local_addr().expect("local addr");
    let connections = Arc::new(AtomicUsize::new(0));
    let accepted = connections.clone();

    let task = tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            accepted.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(handle_connection(socket, behavior));
        }
    });

    FakeAgent {
        addr,
        connections,
        _task: task,
    }
}

async fn handle_connection(mut socket: tokio::net::TcpStream, behavior: MessageBehavior) {
    let Some((method, path)) = read_request(&mut socket).await else {
        return;
    };

    let (status_line, body) = match (method.as_str(), path.as_str()) {
        (_, "/status") => (
            "HTTP/1.1 200 OK",
            r#"{"state":"stable","model":"claude-3-5-sonnet","uptime_secs":42}"#.to_string(),
        ),
        ("POST", "/message") => match behavior {
            MessageBehavior::Ok => (
                "HTTP/1.1 200 OK",
                r#"{"content":"patch applied","usage":{"input_tokens":12,"output_tokens":34},"completed_at":"2026-08-30T10:00:00Z"}"#.to_string(),
            ),
            MessageBehavior::Malformed => {
                ("HTTP/1.1 200 OK", r#"{"unexpected":"shape"}"#.to_string())
            }
            MessageBehavior::ServerError => (
                "HTTP/1.1 500 Internal Server Error",
                "agent exploded".to_string(),
            ),
        },
        _ => ("HTTP/1.1 404 Not Found", "not found".to_string()),
    };

    let response = format!(
        "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Read one HTTP request (head + body) and return its method and path.
async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<(String, String)> {
    let mut buf: Vec<u8> = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    // Read until the end of headers
    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_head_end(&buf) {
            break pos;
        }
        if buf.len() > 64 * 1024 {
            return None;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut request_line = head.lines().next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();

    // Drain the body so the client can finish writing before we respond
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())?
        })
        .unwrap_or(0);
    let body_start = head_end + 4;
    let mut have = buf.len().saturating_sub(body_start);
    while have < content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        have += n;
    }

    Some((method, path))
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Write an executable shell script that stays alive like a real agent
/// process. Returns its path; the tempdir must outlive the test.
#[cfg(unix)]
pub fn write_fake_agent_binary(dir: &tempfile::TempDir) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.path().join("agentapi");
    std::fs::write(&path, "#!/bin/sh\nexec sleep 300\n").expect("write fake agent");
    let mut perms = std::fs::metadata(&path).expect("metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod");
    path
}
