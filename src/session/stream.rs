//! WebSocket session with the script editor.
//!
//! One connection carries traffic both ways: a consumer task applies the
//! editor's start/stop/exit commands to the shared control state while a
//! producer task drains the action queue into `add_action` commands. The
//! first of the two to finish ends the connection. A lost connection is
//! logged and retried; it never reaches the processing loop.

use crate::config::SessionConfig;
use crate::core::turnpoints::Action;
use crate::session::control::SharedControl;
use crate::session::protocol::{encode_action, parse_command, ControlCommand};
use crate::session::queue::QueueReader;
use crate::telemetry::SharedStats;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, error, info, warn};

/// Errors that end a single connection.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("Failed to encode action: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Connection settings of a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub url: String,
    pub poll_interval: Duration,
    pub reconnect_interval: Duration,
}

impl From<&SessionConfig> for SessionOptions {
    fn from(config: &SessionConfig) -> Self {
        Self {
            url: config.url(),
            poll_interval: config.poll_interval,
            reconnect_interval: config.reconnect_interval,
        }
    }
}

/// Owns the editor connection for the lifetime of the process.
pub struct StreamingSession {
    options: SessionOptions,
    control: SharedControl,
    reader: QueueReader,
    stats: SharedStats,
    /// Dequeued action whose send has not completed yet
    unsent: Option<Action>,
}

impl StreamingSession {
    pub fn new(
        options: SessionOptions,
        control: SharedControl,
        reader: QueueReader,
        stats: SharedStats,
    ) -> Self {
        Self {
            options,
            control,
            reader,
            stats,
            unsent: None,
        }
    }

    /// Run the session on its own thread with a dedicated runtime.
    pub fn spawn(mut self) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("copilot-session".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Failed to start session runtime: {}", e);
                        return;
                    }
                };
                runtime.block_on(self.run());
            })
    }

    /// Connect, serve, and reconnect until exit is requested.
    pub async fn run(&mut self) {
        info!("Start copilot session");
        while !self.control.should_exit() {
            match self.run_once().await {
                Ok(()) => info!("Session with {} ended", self.options.url),
                Err(e) => warn!("Session with {} failed: {}", self.options.url, e),
            }

            if self.control.should_exit() {
                break;
            }
            self.idle(self.options.reconnect_interval).await;
        }
        info!("Copilot session stopped");
    }

    /// Serve a single connection until either direction finishes.
    ///
    /// An action whose send was cut short is kept and goes out first on the
    /// next connection.
    pub async fn run_once(&mut self) -> Result<(), SessionError> {
        info!("Websocket connect to {}", self.options.url);
        let (socket, _response) = connect_async(self.options.url.as_str()).await?;
        let (mut sink, mut stream) = socket.split();

        let result = tokio::select! {
            result = consume(&mut stream, &self.control, &self.stats) => result,
            result = produce(
                &mut sink,
                &self.reader,
                &mut self.unsent,
                &self.control,
                &self.stats,
                self.options.poll_interval,
            ) => result,
        };

        if let Err(e) = sink.close().await {
            debug!("Closing connection failed: {}", e);
        }
        result
    }

    /// Sleep up to `duration`, waking early on exit.
    async fn idle(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while Instant::now() < deadline && !self.control.should_exit() {
            tokio::time::sleep(self.options.poll_interval.min(duration)).await;
        }
    }
}

/// Apply inbound commands until exit is requested or the peer goes away.
pub async fn consume<S>(
    stream: &mut S,
    control: &SharedControl,
    stats: &SharedStats,
) -> Result<(), SessionError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while !control.should_exit() {
        let Some(message) = stream.next().await else {
            info!("Connection closed by peer");
            return Ok(());
        };

        let text = match message? {
            Message::Text(text) => text,
            Message::Close(frame) => {
                info!("Peer closed connection: {:?}", frame);
                return Ok(());
            }
            _ => continue,
        };

        let Some(command) = parse_command(&text) else {
            continue;
        };

        info!("ws receive {}", text);
        stats.record_command();
        apply_command(control, command);
    }
    Ok(())
}

/// Route a command to the control state.
pub fn apply_command(control: &SharedControl, command: ControlCommand) {
    match command {
        ControlCommand::Exit => {
            warn!("ws event request exit");
            control.request_exit();
        }
        ControlCommand::Stop => {
            warn!("ws event request stop");
            control.request_stop();
        }
        ControlCommand::Start { start_ms, channel } => {
            info!("ws event request start @ {} ms", start_ms.round());
            control.request_start(start_ms, channel);
        }
    }
}

/// Send queued actions, one message per action, in queue order.
///
/// The action being sent stays in `unsent` until the sink accepts it, so a
/// failed or cancelled send is retried by the next call.
pub async fn produce<W>(
    sink: &mut W,
    reader: &QueueReader,
    unsent: &mut Option<Action>,
    control: &SharedControl,
    stats: &SharedStats,
    poll_interval: Duration,
) -> Result<(), SessionError>
where
    W: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        if unsent.is_none() {
            *unsent = reader.pop();
        }

        match *unsent {
            Some(action) => {
                let text = match encode_action(&action) {
                    Ok(text) => text,
                    Err(e) => {
                        *unsent = None;
                        return Err(e.into());
                    }
                };
                sink.send(Message::Text(text)).await?;
                *unsent = None;
                stats.record_action_sent();
            }
            None => {
                if control.should_exit() {
                    return Ok(());
                }
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::control::create_shared_control;
    use crate::session::protocol::decode_action;
    use crate::session::queue::action_queue;
    use crate::telemetry::create_shared_stats;
    use futures::channel::mpsc;

    fn closed_sink() -> impl Sink<Message, Error = tungstenite::Error> + Unpin {
        let (tx, rx) = mpsc::unbounded::<Message>();
        drop(rx);
        tx.sink_map_err(|_| tungstenite::Error::ConnectionClosed)
    }

    #[tokio::test]
    async fn test_failed_send_keeps_action() {
        let (writer, reader) = action_queue(4);
        let control = create_shared_control();
        let stats = create_shared_stats();
        let mut unsent = None;

        assert!(writer.push(Action::new(1500.0, 100, None)));
        assert!(writer.push(Action::new(2000.0, 0, None)));

        let mut sink = closed_sink();
        let result = produce(
            &mut sink,
            &reader,
            &mut unsent,
            &control,
            &stats,
            Duration::from_millis(5),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(unsent.map(|a| a.position), Some(100));
        assert_eq!(stats.stats().actions_sent, 0);

        control.request_exit();
        let (tx, mut rx) = mpsc::unbounded::<Message>();
        let mut sink = tx.sink_map_err(|_| tungstenite::Error::ConnectionClosed);
        produce(
            &mut sink,
            &reader,
            &mut unsent,
            &control,
            &stats,
            Duration::from_millis(5),
        )
        .await
        .unwrap();
        drop(sink);

        let mut positions = Vec::new();
        while let Some(Message::Text(text)) = rx.next().await {
            positions.push(decode_action(&text).unwrap().position);
        }
        assert_eq!(positions, vec![100, 0]);
        assert!(unsent.is_none());
        assert_eq!(stats.stats().actions_sent, 2);
    }

    #[tokio::test]
    async fn test_commands_reach_control() {
        let control = create_shared_control();
        let stats = create_shared_stats();
        let start = r#"{"type":"event","name":"user_data_01","data":{"source":"copilot","message":{"action":"start","startPosition":2}}}"#;
        let exit = r#"{"type":"event","name":"user_data_01","data":{"source":"copilot","message":{"action":"exit"}}}"#;

        let mut stream = futures::stream::iter(vec![
            Ok::<_, tungstenite::Error>(Message::Text("garbage".to_string())),
            Ok(Message::Text(start.to_string())),
            Ok(Message::Text(exit.to_string())),
        ]);
        consume(&mut stream, &control, &stats).await.unwrap();

        assert!(control.should_exit());
        assert_eq!(stats.stats().commands_received, 2);
    }
}
