//! Async driver: owns the websocket and feeds the [`Bridge`].
//!
//! One task per open board. The host talks to it through a [`BridgeHandle`]
//! and never touches the socket. On a dropped connection the driver backs
//! off, reconnects, and rejoins; commands keep being applied locally while
//! it waits or while a handshake is pending.

use frames::Frame;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use canvas::batch::Batch;
use canvas::engine::Action;

use crate::bridge::{BatchReport, Bridge, BridgeOptions, Command, ConnectionStatus};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::session::BoardSession;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type SocketSink = SplitSink<Socket, Message>;

/// View actions fanned out to subscribers.
const ACTION_CHANNEL_CAPACITY: usize = 256;

/// Host-side handle to a running driver.
#[derive(Clone)]
pub struct BridgeHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
    actions: broadcast::Sender<Action>,
}

impl BridgeHandle {
    /// Queue a command for the bridge.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Closed`] if the driver has stopped.
    pub fn send(&self, command: Command) -> Result<(), ClientError> {
        self.commands.send(command).map_err(|_| ClientError::Closed)
    }

    /// Run `f` against the session on the driver task and return its result.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Closed`] if the driver has stopped.
    pub async fn inspect<T, F>(&self, f: F) -> Result<T, ClientError>
    where
        T: Send + 'static,
        F: FnOnce(&BoardSession) -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Inspect(Box::new(move |session| {
            if tx.send(f(session)).is_err() {
                debug!("driver: inspect caller went away");
            }
        })))?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    /// Apply an AI batch and wait for its report.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Closed`] if the driver has stopped.
    pub async fn apply_batch(&self, batch: Batch) -> Result<BatchReport, ClientError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Batch { batch, reply: Some(tx) })?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    /// Leave the board and stop the driver.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Closed`] if the driver has already stopped.
    pub fn leave(&self) -> Result<(), ClientError> {
        self.send(Command::Leave)
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Wait until the connection reaches `status`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Closed`] if the driver stops first.
    pub async fn wait_for_status(&self, status: ConnectionStatus) -> Result<(), ClientError> {
        let mut rx = self.status.clone();
        rx.wait_for(|current| *current == status).await.map(|_| ()).map_err(|_| ClientError::Closed)
    }

    /// Receive view actions (`RenderNeeded`, `FitRequested`) as they happen.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Action> {
        self.actions.subscribe()
    }
}

/// Start a driver for `board_id` with a fresh session.
#[must_use]
pub fn spawn(
    config: ClientConfig,
    board_id: impl Into<String>,
    user_id: Option<String>,
) -> (BridgeHandle, JoinHandle<Result<(), ClientError>>) {
    let bridge = Bridge::new(BoardSession::new(board_id, user_id), BridgeOptions::from(&config));
    spawn_bridge(config, bridge)
}

/// Start a driver around a bridge the caller has already configured.
#[must_use]
pub fn spawn_bridge(config: ClientConfig, bridge: Bridge) -> (BridgeHandle, JoinHandle<Result<(), ClientError>>) {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = watch::channel(bridge.status());
    let (actions_tx, _) = broadcast::channel(ACTION_CHANNEL_CAPACITY);

    let driver = Driver { config, bridge, commands: commands_rx, status: status_tx, actions: actions_tx.clone() };
    let task = tokio::spawn(driver.run());
    (BridgeHandle { commands: commands_tx, status: status_rx, actions: actions_tx }, task)
}

/// Outcome of one connection attempt.
enum Attempt {
    Open(Box<Socket>),
    /// Refused, failed, or timed out; counts toward the retry budget.
    Failed,
    /// The host left while the handshake was pending.
    Left,
}

/// How a connected session ended.
enum SessionEnd {
    /// The host left; stop for good.
    Left,
    /// The socket went away; reconnect.
    Dropped,
}

struct Driver {
    config: ClientConfig,
    bridge: Bridge,
    commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<ConnectionStatus>,
    actions: broadcast::Sender<Action>,
}

impl Driver {
    async fn run(mut self) -> Result<(), ClientError> {
        let url = self.config.connect_url();
        let policy = self.config.reconnect;
        let mut failures = 0_u32;

        loop {
            self.bridge.on_connecting();
            self.publish_status();

            match self.connect(&url).await {
                Attempt::Open(socket) => {
                    info!(%url, board_id = %self.bridge.session().board_id(), "driver: connected");
                    failures = 0;
                    self.bridge.on_connected();
                    self.publish_status();
                    if let SessionEnd::Left = self.session(*socket).await {
                        self.publish_status();
                        return Ok(());
                    }
                }
                Attempt::Failed => {}
                Attempt::Left => {
                    self.bridge.on_disconnected();
                    self.publish_status();
                    return Ok(());
                }
            }

            self.bridge.on_disconnected();
            self.publish_status();

            failures = failures.saturating_add(1);
            if failures > policy.max_attempts {
                warn!(attempts = policy.max_attempts, "driver: giving up");
                return Err(ClientError::ReconnectExhausted { attempts: policy.max_attempts });
            }
            let delay = policy.backoff(failures - 1);
            info!(attempt = failures, delay_ms = delay.as_millis(), "driver: reconnecting");
            if let SessionEnd::Left = self.wait_offline(delay).await {
                self.publish_status();
                return Ok(());
            }
        }
    }

    /// Run the websocket handshake, bounded by the connect timeout, while
    /// still applying commands locally.
    async fn connect(&mut self, url: &str) -> Attempt {
        let limit = self.config.connect_timeout();
        let handshake = tokio::time::timeout(limit, connect_async(url));
        tokio::pin!(handshake);

        loop {
            tokio::select! {
                result = &mut handshake => return match result {
                    Ok(Ok((socket, _))) => Attempt::Open(Box::new(socket)),
                    Ok(Err(e)) => {
                        warn!(%url, error = %e, "driver: connect failed");
                        Attempt::Failed
                    }
                    Err(_) => {
                        warn!(%url, timeout_ms = limit.as_millis(), "driver: connect timed out");
                        Attempt::Failed
                    }
                },
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Leave) | None => {
                        self.bridge.leave();
                        return Attempt::Left;
                    }
                    Some(cmd) => {
                        let actions = self.bridge.handle_command(cmd, frames::now_ms());
                        self.publish_actions(actions);
                    }
                },
            }
        }
    }

    /// Pump one connected session until it drops or the host leaves.
    async fn session(&mut self, socket: Socket) -> SessionEnd {
        let (mut sink, mut stream) = socket.split();

        loop {
            if let Err(e) = self.flush(&mut sink).await {
                warn!(error = %e, "driver: send failed");
                return SessionEnd::Dropped;
            }

            tokio::select! {
                msg = stream.next() => match msg {
                    Some(Ok(Message::Binary(bytes))) => match frames::decode_frame(&bytes) {
                        Ok(frame) => {
                            let actions = self.bridge.handle_frame(&frame);
                            self.publish_actions(actions);
                        }
                        Err(e) => warn!(error = %e, "driver: undecodable frame"),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        info!("driver: relay closed connection");
                        return SessionEnd::Dropped;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "driver: socket error");
                        return SessionEnd::Dropped;
                    }
                },
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Leave) | None => {
                        self.bridge.leave();
                        if let Err(e) = self.flush(&mut sink).await {
                            debug!(error = %e, "driver: could not send leave");
                        }
                        if let Err(e) = sink.close().await {
                            debug!(error = %e, "driver: close failed");
                        }
                        self.bridge.on_disconnected();
                        return SessionEnd::Left;
                    }
                    Some(cmd) => {
                        let actions = self.bridge.handle_command(cmd, frames::now_ms());
                        self.publish_actions(actions);
                    }
                },
            }
        }
    }

    /// Sleep out a backoff delay while still applying commands locally.
    async fn wait_offline(&mut self, delay: std::time::Duration) -> SessionEnd {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                () = &mut sleep => return SessionEnd::Dropped,
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Leave) | None => {
                        self.bridge.leave();
                        return SessionEnd::Left;
                    }
                    Some(cmd) => {
                        let actions = self.bridge.handle_command(cmd, frames::now_ms());
                        self.publish_actions(actions);
                    }
                },
            }
        }
    }

    async fn flush(&mut self, sink: &mut SocketSink) -> Result<(), ClientError> {
        for frame in self.bridge.take_outbound() {
            send_frame(sink, &frame).await?;
        }
        Ok(())
    }

    fn publish_status(&self) {
        self.status.send_replace(self.bridge.status());
    }

    fn publish_actions(&self, actions: Vec<Action>) {
        // No subscribers is fine; the host may poll via inspect instead.
        for action in actions {
            if self.actions.send(action).is_err() {
                break;
            }
        }
    }
}

async fn send_frame(sink: &mut SocketSink, frame: &Frame) -> Result<(), ClientError> {
    sink.send(Message::Binary(frames::encode_frame(frame).into())).await?;
    Ok(())
}

#[cfg(test)]
#[path = "driver_test.rs"]
mod tests;
