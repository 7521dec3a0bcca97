//! Suggestion query endpoint
//!
//! A Unix socket where operator tools ask for the most used clues. One
//! request per connection:
//!
//! ```text
//! client: {"n": 5}\n          (or an empty line for the default count)
//! server: {"clues": ["...", "..."]}\n
//! ```
//!
//! Malformed requests get `{"error": "..."}`. Queries go through the
//! dispatcher channel like any command, so answers reflect every clue
//! applied before the query arrived.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use cluedisplay_core::DisplayHandle;

/// Longest request line accepted
const MAX_REQUEST_BYTES: u64 = 4096;

/// How long a client may take to send its request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SuggestRequest {
    #[serde(default)]
    n: Option<usize>,
}

/// Reply sent back to the client
#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SuggestResponse {
    /// Ranked clues, most frequent first
    Clues {
        /// Clue texts
        clues: Vec<String>,
    },
    /// The request could not be answered
    Error {
        /// What went wrong
        error: String,
    },
}

/// Read the requested count from a request line
///
/// An empty line means "use the default count".
pub fn parse_request(line: &str) -> Result<Option<usize>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str::<SuggestRequest>(line)
        .map(|request| request.n)
        .map_err(|e| format!("invalid request: {e}"))
}

/// Bound suggestion socket
pub struct SuggestServer {
    socket_path: PathBuf,
    listener: UnixListener,
}

impl SuggestServer {
    /// Create the socket directory, remove a stale socket and bind
    ///
    /// The socket is restricted to the owning user.
    pub fn bind(socket_path: &Path) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create socket directory: {parent:?}"))?;
                info!(path = ?parent, "Created socket directory");
            }
        }

        if socket_path.exists() {
            warn!(path = ?socket_path, "Removing stale socket file");
            fs::remove_file(socket_path)
                .with_context(|| format!("Failed to remove stale socket: {socket_path:?}"))?;
        }

        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("Failed to bind to {socket_path:?}"))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(socket_path, perms)
                .with_context(|| format!("Failed to restrict {socket_path:?}"))?;
        }

        info!(path = ?socket_path, "Suggestion endpoint listening");
        Ok(Self {
            socket_path: socket_path.to_path_buf(),
            listener,
        })
    }

    /// Socket location
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept clients until the task is aborted
    ///
    /// Each client runs on its own task; aborting this future aborts them too.
    pub async fn serve(self, handle: DisplayHandle) {
        let our_uid = unsafe { libc::getuid() };
        let mut clients = JoinSet::new();

        loop {
            let stream = match self.listener.accept().await {
                Ok((stream, _addr)) => stream,
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    continue;
                }
            };

            // reap finished clients
            while clients.try_join_next().is_some() {}

            let peer_uid = stream.peer_cred().ok().map(|cred| cred.uid());
            if let Some(uid) = peer_uid {
                if uid != our_uid && uid != 0 {
                    warn!(peer_uid = uid, our_uid, "Rejecting suggestion client from different user");
                    continue;
                }
            }

            let handle = handle.clone();
            clients.spawn(async move {
                match tokio::time::timeout(REQUEST_TIMEOUT, answer(stream, &handle)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => debug!(error = %e, "Suggestion client failed"),
                    Err(_) => debug!("Suggestion client timed out"),
                }
            });
        }
    }

    /// Remove the socket file
    pub fn remove_socket(path: &Path) {
        if path.exists() {
            if let Err(e) = fs::remove_file(path) {
                warn!(error = %e, path = ?path, "Failed to remove suggestion socket");
            } else {
                debug!(path = ?path, "Suggestion socket removed");
            }
        }
    }
}

async fn answer(stream: UnixStream, handle: &DisplayHandle) -> std::io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read.take(MAX_REQUEST_BYTES));
    let mut line = String::new();

    let response = match reader.read_line(&mut line).await {
        Ok(_) => match parse_request(&line) {
            Ok(count) => match handle.suggestions(count).await {
                Ok(clues) => SuggestResponse::Clues { clues },
                Err(e) => SuggestResponse::Error {
                    error: e.to_string(),
                },
            },
            Err(error) => SuggestResponse::Error { error },
        },
        Err(e) => SuggestResponse::Error {
            error: format!("unreadable request: {e}"),
        },
    };

    let mut body = serde_json::to_vec(&response).map_err(std::io::Error::other)?;
    body.push(b'\n');
    write.write_all(&body).await?;
    write.shutdown().await
}
