//! Shared helpers for the data adapter behaviour tests.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use camino::Utf8PathBuf;
use tempfile::TempDir;

/// Canned reply served by [`StubObjectServer`].
#[derive(Debug, Clone)]
pub enum StubReply {
    /// Respond with `status` and `body`.
    Respond {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: Vec<u8>,
    },
    /// Accept the request and never answer within `delay`.
    Stall {
        /// How long to hold the connection open.
        delay: Duration,
    },
}

/// Minimal HTTP/1.1 server answering every request with one reply.
#[derive(Debug)]
pub struct StubObjectServer {
    endpoint: String,
    paths: Arc<Mutex<Vec<String>>>,
}

impl StubObjectServer {
    /// Start serving `reply` on an ephemeral local port.
    pub fn start(reply: StubReply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub server");
        let address = listener.local_addr().expect("stub server address");
        let paths = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&paths);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                serve(stream, &reply, &recorded);
            }
        });
        Self {
            endpoint: format!("http://{address}"),
            paths,
        }
    }

    /// Base URL of the server.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Request paths received so far.
    pub fn paths(&self) -> Vec<String> {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn serve(mut stream: TcpStream, reply: &StubReply, recorded: &Mutex<Vec<String>>) {
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    let mut request_line = String::new();
    reader.read_line(&mut request_line).unwrap_or_default();
    let mut header = String::new();
    while reader.read_line(&mut header).unwrap_or_default() > 2 {
        header.clear();
    }
    let path = request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or_default()
        .to_owned();
    recorded
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(path);
    match reply {
        StubReply::Respond { status, body } => {
            let head = format!(
                "HTTP/1.1 {status} Stub\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(body);
            let _ = stream.flush();
        }
        StubReply::Stall { delay } => thread::sleep(*delay),
    }
}

/// Endpoint on which nothing listens.
pub fn unreachable_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind probe listener");
    let address = listener.local_addr().expect("probe address");
    drop(listener);
    format!("http://{address}")
}

/// Temporary directory holding a blob root and a database file.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create an empty workspace.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temporary workspace"),
        }
    }

    /// Directory serving as the blob root.
    pub fn blob_root(&self) -> Utf8PathBuf {
        self.path("blobs")
    }

    /// Database file inside the workspace.
    pub fn database(&self) -> Utf8PathBuf {
        self.path("state/features.db")
    }

    /// Write `content` to `<blob root>/<bucket>/<key>`.
    pub fn put_blob(&self, bucket: &str, key: &str, content: &str) {
        let path = self.blob_root().join(bucket).join(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create blob directory");
        }
        std::fs::write(path, content).expect("write blob");
    }

    fn path(&self, relative: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.dir.path().join(relative)).expect("utf-8 temp path")
    }
}
