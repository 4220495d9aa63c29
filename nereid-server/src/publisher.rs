//! Sentence fan-out: one connected UDP socket plus a TCP acceptor with
//! an independent writer task per client.
//!
//! The scheduler publishes each line once; a broadcast channel carries
//! it to every client writer. A slow client lags its receiver and loses
//! the oldest lines (counted per client), and a write that stalls past
//! the timeout evicts the client. Nothing a consumer does can stall the
//! scheduler or another consumer.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use nereid_core::SimConfig;

use crate::status::TcpClientInfo;

/// Outbound queue depth per TCP client, in lines.
pub const CLIENT_QUEUE_CAPACITY: usize = 1024;
/// A client whose socket accepts nothing for this long is evicted.
pub const CLIENT_WRITE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug)]
struct ClientEntry {
    connected_at: DateTime<Utc>,
    dropped: Arc<AtomicU64>,
}

/// Registry of live TCP clients, shared with the engine for status.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    inner: Arc<Mutex<HashMap<SocketAddr, ClientEntry>>>,
}

impl ClientRegistry {
    fn insert(&self, peer: SocketAddr, dropped: Arc<AtomicU64>) {
        self.inner.lock().unwrap().insert(
            peer,
            ClientEntry {
                connected_at: Utc::now(),
                dropped,
            },
        );
    }

    fn remove(&self, peer: &SocketAddr) {
        self.inner.lock().unwrap().remove(peer);
    }

    /// Immutable copy of the current client endpoints.
    pub fn snapshot(&self) -> Vec<TcpClientInfo> {
        self.inner
            .lock()
            .unwrap()
            .iter()
            .map(|(addr, entry)| TcpClientInfo {
                remote: addr.to_string(),
                connected_at: entry.connected_at,
                dropped_lines: entry.dropped.load(Ordering::Relaxed),
            })
            .collect()
    }
}

pub struct Publisher {
    udp: UdpSocket,
    udp_destination: String,
    line_tx: Option<broadcast::Sender<String>>,
    clients: ClientRegistry,
    tcp_local: Option<SocketAddr>,
    accept_task: Option<JoinHandle<()>>,
}

impl Publisher {
    /// Bind the UDP sender and, when enabled, the TCP listener.
    ///
    /// Bind failures propagate; the caller stays idle.
    pub async fn bind(config: &SimConfig) -> std::io::Result<Publisher> {
        let (host, port) = config.udp_destination();
        let udp = UdpSocket::bind("0.0.0.0:0").await?;
        udp.connect((host.as_str(), port)).await?;
        let udp_destination = format!("{}:{}", host, port);

        let clients = ClientRegistry::default();
        let (line_tx, tcp_local, accept_task) = if config.tcp_enabled() {
            let listener =
                TcpListener::bind((config.tcp_host.as_str(), config.tcp_port)).await?;
            let local = listener.local_addr()?;
            log::info!("TCP fan-out listening on {}", local);
            let (tx, _) = broadcast::channel(CLIENT_QUEUE_CAPACITY);
            let task = tokio::spawn(accept_loop(listener, tx.clone(), clients.clone()));
            (Some(tx), Some(local), Some(task))
        } else {
            (None, None, None)
        };

        log::info!("UDP sentences to {}", udp_destination);
        Ok(Publisher {
            udp,
            udp_destination,
            line_tx,
            clients,
            tcp_local,
            accept_task,
        })
    }

    /// Publish one line to UDP and to every TCP client queue.
    ///
    /// Send errors never propagate; a failed datagram is logged and
    /// dropped.
    pub async fn publish(&self, line: &str) {
        if let Err(e) = self.udp.send(line.as_bytes()).await {
            log::debug!("UDP send to {} failed: {}", self.udp_destination, e);
        }
        if let Some(tx) = &self.line_tx {
            // An error only means no client is connected right now
            let _ = tx.send(line.to_string());
        }
    }

    pub fn udp_destination(&self) -> &str {
        &self.udp_destination
    }

    pub fn tcp_local_addr(&self) -> Option<SocketAddr> {
        self.tcp_local
    }

    /// Immutable snapshot of the current client endpoints.
    pub fn client_snapshot(&self) -> Vec<TcpClientInfo> {
        self.clients.snapshot()
    }

    /// Handle for status reporting after the publisher has moved into
    /// the worker task.
    pub fn client_registry(&self) -> ClientRegistry {
        self.clients.clone()
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
        // Dropping line_tx closes every client writer's receiver
    }
}

async fn accept_loop(
    listener: TcpListener,
    line_tx: broadcast::Sender<String>,
    clients: ClientRegistry,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                log::info!("TCP client connected: {}", peer);
                let dropped = Arc::new(AtomicU64::new(0));
                clients.insert(peer, dropped.clone());
                // Subscribing here means the client sees every line
                // emitted from its connection time onwards
                let rx = line_tx.subscribe();
                tokio::spawn(client_writer(stream, peer, rx, clients.clone(), dropped));
            }
            Err(e) => {
                log::warn!("TCP accept failed: {}", e);
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

async fn client_writer(
    mut stream: TcpStream,
    peer: SocketAddr,
    mut rx: broadcast::Receiver<String>,
    clients: ClientRegistry,
    dropped: Arc<AtomicU64>,
) {
    loop {
        match rx.recv().await {
            Ok(line) => {
                match tokio::time::timeout(CLIENT_WRITE_TIMEOUT, stream.write_all(line.as_bytes()))
                    .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        log::info!("TCP client {} write failed, removing: {}", peer, e);
                        break;
                    }
                    Err(_) => {
                        log::warn!(
                            "TCP client {} stalled for {:?}, evicting",
                            peer,
                            CLIENT_WRITE_TIMEOUT
                        );
                        break;
                    }
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                // This client alone loses its oldest queued lines
                dropped.fetch_add(n, Ordering::Relaxed);
                log::debug!("TCP client {} lagged, dropped {} lines", peer, n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    clients.remove(&peer);
    log::info!("TCP client disconnected: {}", peer);
}
