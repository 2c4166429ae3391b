//! Connection supervisor: owns the WebSocket to the server, keeps it alive
//! with periodic pings, forwards inbound text frames and reconnects with
//! exponential backoff.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rand::Rng;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;

use super::messages::Command;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Capacity of the event channel towards the client loop.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// What the supervisor reports to the client loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened,
    Frame(String),
    Closed { reason: String },
}

/// Sending half used by the client loop to put commands on the wire.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    outbound: mpsc::UnboundedSender<Command>,
}

impl ConnectionHandle {
    /// Queue a command. Returns false once the supervisor has stopped.
    pub fn send(&self, command: Command) -> bool {
        self.outbound.send(command).is_ok()
    }

    /// A handle not attached to any supervisor, with the receiving end.
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<Command>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectionHandle { outbound: tx }, rx)
    }
}

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Doubling retry delay, capped at `max`, reset after a successful open.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let max = max.max(initial);
        Backoff {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to wait now; the following call returns twice as much.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Add up to 10% random jitter.
fn jittered(delay: Duration) -> Duration {
    let spread = (delay.as_millis() / 10) as u64;
    if spread == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
}

// ---------------------------------------------------------------------------
// ConnectionSupervisor
// ---------------------------------------------------------------------------

/// Returned when the owning side has gone away and the supervisor must stop.
struct Shutdown;

pub struct ConnectionSupervisor {
    url: String,
    keepalive: Duration,
    backoff: Backoff,
    events: mpsc::Sender<ConnectionEvent>,
    outbound: mpsc::UnboundedReceiver<Command>,
}

impl ConnectionSupervisor {
    /// Start the supervisor task. Dropping every [`ConnectionHandle`] or the
    /// event receiver stops it.
    pub fn spawn(
        config: &ClientConfig,
    ) -> (
        ConnectionHandle,
        mpsc::Receiver<ConnectionEvent>,
        JoinHandle<()>,
    ) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (ev_tx, ev_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let supervisor = ConnectionSupervisor {
            url: config.server_url.clone(),
            keepalive: config.keepalive_interval,
            backoff: Backoff::new(config.reconnect_initial, config.reconnect_max),
            events: ev_tx,
            outbound: out_rx,
        };
        let task = tokio::spawn(supervisor.run());
        (ConnectionHandle { outbound: out_tx }, ev_rx, task)
    }

    async fn run(mut self) {
        loop {
            if self.discard_stale_outbound().is_err() || self.events.is_closed() {
                break;
            }

            match tokio_tungstenite::connect_async(self.url.as_str()).await {
                Ok((ws, _response)) => {
                    self.backoff.reset();
                    info!(url = %self.url, "connected");
                    if self.events.send(ConnectionEvent::Opened).await.is_err() {
                        break;
                    }
                    let reason = match self.serve(ws).await {
                        Ok(reason) => reason,
                        Err(Shutdown) => break,
                    };
                    warn!(url = %self.url, reason = %reason, "connection closed");
                    if self
                        .events
                        .send(ConnectionEvent::Closed { reason })
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => {
                    warn!(url = %self.url, error = %e, "connect failed");
                }
            }

            let delay = jittered(self.backoff.next_delay());
            info!(delay_ms = delay.as_millis() as u64, "reconnecting");
            tokio::time::sleep(delay).await;
        }
        debug!(url = %self.url, "connection supervisor stopped");
    }

    /// Pump one open connection until it closes. `Ok` carries the close reason.
    async fn serve(&mut self, ws: WsStream) -> Result<String, Shutdown> {
        let (mut sink, mut stream) = ws.split();
        let ping = Command::Ping.to_json();

        let mut keepalive = tokio::time::interval(self.keepalive);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        keepalive.tick().await;

        loop {
            tokio::select! {
                _ = keepalive.tick() => {
                    if let Err(e) = sink.send(Message::Text(ping.clone().into())).await {
                        return Ok(format!("keepalive failed: {e}"));
                    }
                }
                command = self.outbound.recv() => {
                    let Some(command) = command else {
                        let _ = sink.close().await;
                        return Err(Shutdown);
                    };
                    debug!(kind = command.kind(), "sending");
                    if let Err(e) = sink.send(Message::Text(command.to_json().into())).await {
                        return Ok(format!("send failed: {e}"));
                    }
                }
                message = stream.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        let frame = ConnectionEvent::Frame(text.as_str().to_string());
                        if self.events.send(frame).await.is_err() {
                            let _ = sink.close().await;
                            return Err(Shutdown);
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        return Ok(frame
                            .map(|f| format!("closed by server ({}): {}", f.code, f.reason))
                            .unwrap_or_else(|| "closed by server".to_string()));
                    }
                    // Binary frames are not part of the protocol; control frames
                    // are answered by tungstenite.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Ok(format!("read error: {e}")),
                    None => return Ok("stream ended".to_string()),
                },
            }
        }
    }

    /// Commands queued while disconnected are stale; drop them.
    fn discard_stale_outbound(&mut self) -> Result<(), Shutdown> {
        loop {
            match self.outbound.try_recv() {
                Ok(command) => {
                    debug!(kind = command.kind(), "dropping command issued while disconnected");
                }
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => return Err(Shutdown),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
