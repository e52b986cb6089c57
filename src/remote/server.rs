//! Unix socket front end for the remote facade
//!
//! Clients speak JSON lines. A client sends `{"type":"subscribe","display":N}`
//! to receive that display's [`RemoteEvent`]s, and
//! `{"type":"command","command":{...}}` to queue a [`RemoteCommand`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use super::{RemoteCommand, RemoteDesktopFacade, RemoteEvent};
use crate::error::DeskResult;
use crate::ids::DisplayId;

/// Environment variable overriding the socket path
pub const SOCKET_ENV: &str = "DESKMODE_IPC_SOCKET";

const DEFAULT_SOCKET: &str = "/tmp/deskmode-ipc.sock";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    Subscribe { display: DisplayId },
    Command { command: RemoteCommand },
}

#[derive(Debug)]
pub struct RemoteServer {
    socket_path: PathBuf,
    facade: Arc<RemoteDesktopFacade>,
    next_client_id: Arc<AtomicUsize>,
}

impl RemoteServer {
    /// Server on the socket named by `DESKMODE_IPC_SOCKET`, or the default path
    pub fn new(facade: Arc<RemoteDesktopFacade>) -> DeskResult<Self> {
        let socket_path = std::env::var(SOCKET_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SOCKET));
        Self::with_path(socket_path, facade)
    }

    pub fn with_path(socket_path: impl Into<PathBuf>, facade: Arc<RemoteDesktopFacade>) -> DeskResult<Self> {
        let socket_path = socket_path.into();
        // Stale socket from an earlier run
        if socket_path.exists() {
            std::fs::remove_file(&socket_path)?;
        }
        Ok(Self {
            socket_path,
            facade,
            next_client_id: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Bind the socket and accept clients in the background
    pub async fn start(&self) -> DeskResult<()> {
        let listener = UnixListener::bind(&self.socket_path)?;
        info!("Remote server listening on {:?}", self.socket_path);

        let facade = self.facade.clone();
        let next_client_id = self.next_client_id.clone();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _)) => {
                        let client_id = next_client_id.fetch_add(1, Ordering::Relaxed);
                        tokio::spawn(serve_client(stream, facade.clone(), client_id));
                    }
                    Err(e) => {
                        error!("Failed to accept remote connection: {e}");
                    }
                }
            }
        });

        Ok(())
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for RemoteServer {
    fn drop(&mut self) {
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!("Failed to remove remote socket: {e}");
            }
        }
    }
}

enum Step {
    Request(String),
    Event(RemoteEvent),
    Idle,
    Disconnect,
}

async fn next_event(events: &mut Option<broadcast::Receiver<RemoteEvent>>) -> Option<RemoteEvent> {
    let Some(rx) = events.as_mut() else {
        return std::future::pending().await;
    };
    loop {
        match rx.recv().await {
            Ok(event) => return Some(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Remote client lagging, skipped {skipped} events");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

async fn serve_client(stream: UnixStream, facade: Arc<RemoteDesktopFacade>, client_id: usize) {
    info!("New remote client connected: {client_id}");
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    let mut events: Option<broadcast::Receiver<RemoteEvent>> = None;

    loop {
        let step = tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => Step::Request(line),
                Ok(None) => Step::Disconnect,
                Err(e) => {
                    warn!("Failed to read from client {client_id}: {e}");
                    Step::Disconnect
                }
            },
            event = next_event(&mut events) => match event {
                Some(event) => Step::Event(event),
                None => Step::Idle,
            },
        };

        match step {
            Step::Request(line) => match serde_json::from_str::<ClientRequest>(&line) {
                Ok(ClientRequest::Subscribe { display }) => {
                    events = Some(facade.subscribe(display));
                }
                Ok(ClientRequest::Command { command }) => {
                    if let Err(e) = facade.send_command(command) {
                        warn!("Client {client_id} command dropped: {e}");
                    }
                }
                Err(e) => warn!("Client {client_id} sent an invalid request: {e}"),
            },
            Step::Event(event) => {
                let mut json = match serde_json::to_string(&event) {
                    Ok(j) => j,
                    Err(e) => {
                        warn!("Failed to serialize remote event: {e}");
                        continue;
                    }
                };
                json.push('\n');
                if let Err(e) = write.write_all(json.as_bytes()).await {
                    warn!("Failed to send to client {client_id}: {e}");
                    break;
                }
            }
            Step::Idle => events = None,
            Step::Disconnect => break,
        }
    }

    info!("Remote client disconnected: {client_id}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::DeskId;
    use crate::repository::DeskChangeListener;
    use std::time::Duration;
    use tokio::time::timeout;

    fn socket_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("deskmode-{name}-{}.sock", std::process::id()))
    }

    #[tokio::test]
    async fn subscribed_client_receives_desk_events() {
        let (facade, _queue) = RemoteDesktopFacade::new();
        let server = RemoteServer::with_path(socket_path("events"), facade.clone()).unwrap();
        server.start().await.unwrap();

        let stream = UnixStream::connect(server.socket_path()).await.unwrap();
        let (read, mut write) = stream.into_split();
        write
            .write_all(b"{\"type\":\"subscribe\",\"display\":3}\n")
            .await
            .unwrap();

        let display = DisplayId::new(3);
        timeout(Duration::from_secs(5), async {
            while facade.subscriber_count(display) == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        facade.on_desk_added(display, DeskId::new(8));

        let mut lines = BufReader::new(read).lines();
        let line = timeout(Duration::from_secs(5), lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let event: RemoteEvent = serde_json::from_str(&line).unwrap();
        assert_eq!(event, RemoteEvent::DeskAdded { display, desk: DeskId::new(8) });
    }

    #[tokio::test]
    async fn client_commands_reach_the_queue() {
        let (facade, mut queue) = RemoteDesktopFacade::new();
        let server = RemoteServer::with_path(socket_path("commands"), facade).unwrap();
        server.start().await.unwrap();

        let mut stream = UnixStream::connect(server.socket_path()).await.unwrap();
        stream
            .write_all(b"{\"type\":\"command\",\"command\":{\"command\":\"remove_desk\",\"desk\":2}}\n")
            .await
            .unwrap();

        let command = timeout(Duration::from_secs(5), queue.recv()).await.unwrap();
        assert_eq!(command, Some(RemoteCommand::RemoveDesk { desk: DeskId::new(2) }));
    }
}
