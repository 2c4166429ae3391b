//! The client loop: one task that owns the [`SessionStateMachine`] and
//! applies connection events, user commands and timer ticks to it in order.
//!
//! Renderers subscribe to a `watch` channel of [`SessionView`]s; they never
//! touch the machine directly.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::session::{SessionStateMachine, SessionView, UserCommand};
use crate::ws::connection::{ConnectionEvent, ConnectionHandle, ConnectionSupervisor};
use crate::ws::messages::Command;

/// How often timeouts and banners are re-evaluated.
pub const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Owner-side handle to a running client.
pub struct GameClient {
    commands: mpsc::UnboundedSender<UserCommand>,
    view: watch::Receiver<SessionView>,
    task: JoinHandle<()>,
    connection: JoinHandle<()>,
}

impl GameClient {
    /// Spawn the connection supervisor and the client loop.
    pub fn start(config: ClientConfig) -> Self {
        let (conn, events, connection) = ConnectionSupervisor::spawn(&config);
        let machine = SessionStateMachine::new(&config);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(machine.view());

        info!(url = %config.server_url, "client starting");
        let task = tokio::spawn(run(machine, conn, events, cmd_rx, view_tx));

        GameClient {
            commands: cmd_tx,
            view: view_rx,
            task,
            connection,
        }
    }

    /// Queue a user command. Returns false once the loop has stopped.
    pub fn send(&self, command: UserCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    /// A fresh subscription to view updates.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Snapshot of the current view.
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Stop the loop and the connection, waiting for both to finish.
    pub async fn shutdown(self) {
        drop(self.commands);
        if let Err(e) = self.task.await {
            warn!(error = %e, "client loop ended abnormally");
        }
        // The supervisor may be sleeping between reconnect attempts.
        self.connection.abort();
        let _ = self.connection.await;
        info!("client stopped");
    }
}

/// Drive the machine until the user side hangs up or the connection stops.
pub async fn run(
    mut machine: SessionStateMachine,
    conn: ConnectionHandle,
    mut events: mpsc::Receiver<ConnectionEvent>,
    mut commands: mpsc::UnboundedReceiver<UserCommand>,
    view: watch::Sender<SessionView>,
) {
    let mut ticker = tokio::time::interval(TICK_INTERVAL);

    loop {
        let outbound = tokio::select! {
            event = events.recv() => match event {
                Some(event) => apply_event(&mut machine, event),
                None => break,
            },
            command = commands.recv() => match command {
                Some(command) => machine.on_user_command(command, Utc::now()),
                None => break,
            },
            _ = ticker.tick() => {
                machine.on_tick(Utc::now());
                Vec::new()
            }
        };

        for command in outbound {
            if !conn.send(command) {
                warn!("connection supervisor gone, dropping command");
            }
        }

        view.send_if_modified(|current| {
            let next = machine.view();
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
    debug!(state = %machine.state(), "client loop finished");
}

/// Apply one connection event, returning the commands it produced.
pub fn apply_event(machine: &mut SessionStateMachine, event: ConnectionEvent) -> Vec<Command> {
    let now = Utc::now();
    match event {
        ConnectionEvent::Opened => machine.on_connection_opened(),
        ConnectionEvent::Frame(text) => {
            machine.on_frame(&text, now);
            Vec::new()
        }
        ConnectionEvent::Closed { reason } => {
            machine.on_connection_closed(&reason, now);
            Vec::new()
        }
    }
}
