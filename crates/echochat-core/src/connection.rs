//! Connection management.
//!
//! [`ConnectionManager`] owns the transport connection of one [`Client`]:
//! it opens it, feeds received payloads to the client one at a time, runs a
//! writer task that drains the client's outbound queue, executes UI
//! [`Command`]s and reconnects with exponential backoff when the connection
//! is lost.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use echochat_transport::{ConnectionId, FrameSink, FrameStream, Transport, TransportError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::client::Client;
use crate::error::ClientError;
use crate::metrics;
use crate::render::Renderer;
use crate::state::ConnectionState;

/// A user action for the client to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Subscribe(String),
    /// Unsubscribe from the named topic, or the current one.
    Unsubscribe(Option<String>),
    /// Publish to the named topic, or the current one.
    Publish {
        topic: Option<String>,
        message: String,
    },
    ListTopics,
    TopicStatus(String),
    /// Close the connection and stop.
    Shutdown,
}

/// When and how often to reconnect after the connection is lost.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    /// Delay before the first attempt; doubled on every failure.
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_attempts: 10,
        }
    }
}

impl ReconnectPolicy {
    /// Never reconnect.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Delay before attempt number `attempt`, counted from zero.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.initial_delay
            .saturating_mul(1 << attempt.min(16))
            .min(self.max_delay)
    }
}

struct Link {
    id: ConnectionId,
    stream: Box<dyn FrameStream>,
    writer: JoinHandle<()>,
}

/// Drives a [`Client`] over a [`Transport`].
pub struct ConnectionManager<R: Renderer> {
    transport: Arc<dyn Transport>,
    uri: String,
    policy: ReconnectPolicy,
    client: Client<R>,
    link: Option<Link>,
}

impl<R: Renderer> ConnectionManager<R> {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, client: Client<R>, policy: ReconnectPolicy) -> Self {
        Self {
            transport,
            uri: String::new(),
            policy,
            client,
            link: None,
        }
    }

    #[must_use]
    pub fn client(&self) -> &Client<R> {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut Client<R> {
        &mut self.client
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.client.state()
    }

    /// Open a connection to `uri`.
    ///
    /// A failure is reported to the client and leaves the manager closed;
    /// [`run`](Self::run) then starts reconnecting.
    pub async fn connect(&mut self, uri: &str) -> ConnectionState {
        self.uri = uri.to_string();
        self.client.on_connecting();
        if let Err(e) = self.open_link().await {
            warn!(uri = %self.uri, error = %e, transport = self.transport.name(), "Connection failed");
            self.client.on_error(ClientError::Transport(e));
            self.client.mark_closed();
        }
        self.client.state()
    }

    async fn open_link(&mut self) -> Result<(), TransportError> {
        let connection = self.transport.connect(&self.uri).await?;
        let id = connection.id().clone();
        let (sink, stream) = connection.split();
        let (outbound, queue) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_loop(id.clone(), sink, queue));

        info!(connection = %id, uri = %self.uri, "Connected");
        self.link = Some(Link { id, stream, writer });
        self.client.on_open(outbound);
        Ok(())
    }

    /// Process commands and incoming payloads until shutdown.
    ///
    /// Incoming payloads are handled before queued commands.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ReconnectExhausted`] once every reconnection
    /// attempt failed.
    pub async fn run(
        &mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) -> Result<(), ClientError> {
        loop {
            let Some(link) = self.link.as_mut() else {
                if self.reconnect(&mut commands).await? {
                    continue;
                }
                return Ok(());
            };

            tokio::select! {
                biased;

                incoming = link.stream.recv() => match incoming {
                    Ok(Some(data)) => {
                        self.client.on_message(&data);
                    }
                    Ok(None) => {
                        info!("Connection closed by server");
                        self.drop_link();
                    }
                    Err(e) => {
                        self.client.on_error(ClientError::Transport(e));
                        self.drop_link();
                    }
                },

                _ = &mut link.writer => {
                    warn!("Writer stopped, closing connection");
                    self.drop_link();
                }

                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => {
                        self.shutdown().await;
                        return Ok(());
                    }
                    Some(command) => self.execute(command),
                },
            }
        }
    }

    /// Wait out the backoff and reconnect. Returns `false` if shutdown was
    /// requested meanwhile.
    async fn reconnect(
        &mut self,
        commands: &mut mpsc::UnboundedReceiver<Command>,
    ) -> Result<bool, ClientError> {
        if !self.policy.enabled {
            info!("Reconnect disabled, stopping");
            return Ok(false);
        }

        self.client.on_reconnecting();
        for attempt in 0..self.policy.max_attempts {
            let delay = self.policy.delay_for(attempt);
            info!(attempt = attempt + 1, delay_ms = delay.as_millis() as u64, "Reconnecting");

            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    _ = &mut sleep => break,
                    command = commands.recv() => match command {
                        Some(Command::Shutdown) | None => {
                            self.client.mark_closed();
                            return Ok(false);
                        }
                        Some(command) => self.execute(command),
                    },
                }
            }

            metrics::record_reconnect();
            match self.open_link().await {
                Ok(()) => {
                    if let Err(e) = self.client.resubscribe() {
                        self.client.report(&e);
                    }
                    return Ok(true);
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "Reconnect failed");
                }
            }
        }

        error!(attempts = self.policy.max_attempts, "Giving up reconnecting");
        self.client.mark_closed();
        Err(ClientError::ReconnectExhausted(self.policy.max_attempts))
    }

    fn execute(&mut self, command: Command) {
        debug!(?command, "Executing command");
        let result = match command {
            Command::Subscribe(name) => self.client.subscribe(&name),
            Command::Unsubscribe(name) => self.client.unsubscribe(name.as_deref()),
            Command::Publish {
                topic: Some(topic),
                message,
            } => self.client.publish_to(&topic, &message),
            Command::Publish {
                topic: None,
                message,
            } => self.client.publish(&message),
            Command::ListTopics => self.client.list_topics(),
            Command::TopicStatus(name) => self.client.topic_status(&name),
            Command::Shutdown => return,
        };
        if let Err(e) = result {
            self.client.report(&e);
        }
    }

    fn drop_link(&mut self) {
        if let Some(link) = self.link.take() {
            link.writer.abort();
            debug!(connection = %link.id, "Connection dropped");
        }
        self.client.on_close();
    }

    /// Close the connection gracefully.
    pub async fn shutdown(&mut self) {
        // Closing the client drops the outbound queue, which lets the writer
        // flush what is queued and close the sink.
        self.client.on_close();
        if let Some(link) = self.link.take() {
            if let Err(e) = link.writer.await {
                debug!(error = %e, "Writer task ended abnormally");
            }
            info!(connection = %link.id, "Disconnected");
        }
    }
}

async fn write_loop(
    id: ConnectionId,
    mut sink: Box<dyn FrameSink>,
    mut queue: mpsc::UnboundedReceiver<Bytes>,
) {
    while let Some(data) = queue.recv().await {
        if let Err(e) = sink.send(data).await {
            error!(connection = %id, error = %e, "Failed to send");
            return;
        }
    }
    if let Err(e) = sink.close().await {
        debug!(connection = %id, error = %e, "Close failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::echo::Side;
    use crate::testing::{RecordingRenderer, RenderCall};
    use echochat_protocol::{OperationTag, Request, Response};
    use echochat_transport::{MemoryListener, MemoryPeer, MemoryTransport};
    use serde_json::json;

    fn manager(
        policy: ReconnectPolicy,
    ) -> (
        ConnectionManager<RecordingRenderer>,
        MemoryTransport,
        MemoryListener,
        RecordingRenderer,
    ) {
        let (transport, listener) = MemoryTransport::new();
        let renderer = RecordingRenderer::new();
        let manager = ConnectionManager::new(
            Arc::new(transport.clone()),
            Client::new(renderer.clone()),
            policy,
        );
        (manager, transport, listener, renderer)
    }

    async fn next_request(peer: &mut MemoryPeer) -> Request {
        peer.recv_request().await.unwrap().unwrap()
    }

    #[test]
    fn test_backoff() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(10), Duration::from_secs(30));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_topic_list_round_trip() {
        let (mut manager, _transport, mut listener, renderer) = manager(ReconnectPolicy::disabled());
        assert_eq!(manager.connect("memory://chat").await, ConnectionState::Open);
        let mut peer = listener.accept().await.unwrap();

        let (commands, rx) = mpsc::unbounded_channel();
        commands.send(Command::ListTopics).unwrap();

        let server = tokio::spawn(async move {
            let request = next_request(&mut peer).await;
            assert_eq!(request.function, OperationTag::ListTopics);
            peer.send(&Response::success(
                OperationTag::ListTopics,
                json!({"topic_list": ["general", "random"]}),
            ))
            .unwrap();

            for _ in 0..2 {
                let request = next_request(&mut peer).await;
                assert_eq!(request.function, OperationTag::GetTopicStatus);
                let topic = request.topic().unwrap().to_string();
                peer.send(&Response::success(
                    OperationTag::GetTopicStatus,
                    json!({"topic": topic, "subscribers": 2}),
                ))
                .unwrap();
            }
            commands.send(Command::Shutdown).unwrap();
            peer
        });

        manager.run(rx).await.unwrap();
        let _peer = server.await.unwrap();

        let calls = renderer.calls();
        assert!(calls.contains(&RenderCall::TopicStatus("general".into(), 2)));
        assert!(calls.contains(&RenderCall::TopicStatus("random".into(), 2)));
        assert!(calls.contains(&RenderCall::HideSpinner));
        assert_eq!(manager.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_publish_echo_through_connection() {
        let (mut manager, _transport, mut listener, renderer) = manager(ReconnectPolicy::disabled());
        manager.connect("memory://chat").await;
        let mut peer = listener.accept().await.unwrap();

        let (commands, rx) = mpsc::unbounded_channel();
        commands.send(Command::Subscribe("general".into())).unwrap();
        commands
            .send(Command::Publish {
                topic: Some("general".into()),
                message: "hello".into(),
            })
            .unwrap();

        let server = tokio::spawn(async move {
            let subscribe = next_request(&mut peer).await;
            assert_eq!(subscribe.function, OperationTag::SubscribeTopic);
            let publish = next_request(&mut peer).await;
            assert_eq!(publish.function, OperationTag::PublishTopic);

            peer.send(&Response::success(OperationTag::SubscribeTopic, json!({"topic": "general"})))
                .unwrap();
            peer.send(&Response::success(
                OperationTag::UpdateTopic,
                json!({"name": "general", "message": "hello", "timestamp": "2024-01-01 00:00:00"}),
            ))
            .unwrap();
            commands.send(Command::Shutdown).unwrap();
            peer
        });

        manager.run(rx).await.unwrap();
        let _peer = server.await.unwrap();

        assert!(renderer
            .calls()
            .contains(&RenderCall::Chat("hello".into(), Side::Right)));
    }

    #[tokio::test]
    async fn test_closed_without_reconnect() {
        let (mut manager, _transport, mut listener, renderer) = manager(ReconnectPolicy::disabled());
        manager.connect("memory://chat").await;
        let mut peer = listener.accept().await.unwrap();
        peer.close();

        let (_commands, rx) = mpsc::unbounded_channel();
        manager.run(rx).await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Closed);
        assert_eq!(renderer.calls().last(), Some(&RenderCall::State(ConnectionState::Closed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_resubscribes() {
        let (mut manager, transport, mut listener, renderer) = manager(ReconnectPolicy::default());
        manager.connect("memory://chat").await;
        let mut first = listener.accept().await.unwrap();

        let (commands, rx) = mpsc::unbounded_channel();
        commands.send(Command::Subscribe("general".into())).unwrap();

        let server = tokio::spawn(async move {
            next_request(&mut first).await;
            first
                .send(&Response::success(OperationTag::SubscribeTopic, json!({"topic": "general"})))
                .unwrap();
            // Let the confirmation land, then drop the connection.
            tokio::time::sleep(Duration::from_millis(10)).await;
            transport.refuse_next(1);
            first.close();

            let mut second = listener.accept().await.unwrap();
            let request = next_request(&mut second).await;
            commands.send(Command::Shutdown).unwrap();
            (request, transport.attempts())
        });

        manager.run(rx).await.unwrap();
        let (request, attempts) = server.await.unwrap();

        assert_eq!(request.function, OperationTag::SubscribeTopic);
        assert_eq!(request.topic(), Some("general"));
        assert_eq!(attempts, 3);
        assert!(renderer
            .calls()
            .contains(&RenderCall::State(ConnectionState::Reconnecting)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_exhausted() {
        let policy = ReconnectPolicy {
            max_attempts: 2,
            ..ReconnectPolicy::default()
        };
        let (mut manager, transport, mut listener, _renderer) = manager(policy);
        manager.connect("memory://chat").await;
        let mut peer = listener.accept().await.unwrap();
        transport.refuse_next(10);
        peer.close();

        let (_commands, rx) = mpsc::unbounded_channel();
        let err = manager.run(rx).await.unwrap_err();
        assert!(matches!(err, ClientError::ReconnectExhausted(2)));
        assert!(err.is_fatal());
        assert_eq!(transport.attempts(), 3);
        assert_eq!(manager.state(), ConnectionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_fail_while_reconnecting() {
        let (mut manager, transport, _listener, renderer) = manager(ReconnectPolicy {
            max_attempts: 1,
            initial_delay: Duration::from_secs(1),
            ..ReconnectPolicy::default()
        });
        transport.refuse_next(10);
        assert_eq!(manager.connect("memory://chat").await, ConnectionState::Closed);

        let (commands, rx) = mpsc::unbounded_channel();
        commands.send(Command::ListTopics).unwrap();
        let err = manager.run(rx).await.unwrap_err();

        assert!(matches!(err, ClientError::ReconnectExhausted(1)));
        assert_eq!(renderer.errors(), vec!["transport", "not_connected"]);
    }

    #[tokio::test]
    async fn test_initial_connect_failure() {
        let (mut manager, transport, _listener, renderer) = manager(ReconnectPolicy::disabled());
        transport.refuse_next(1);

        assert_eq!(manager.connect("memory://chat").await, ConnectionState::Closed);
        assert_eq!(
            renderer.calls(),
            vec![
                RenderCall::State(ConnectionState::Connecting),
                RenderCall::Error("transport"),
                RenderCall::State(ConnectionState::Closed),
            ]
        );
    }
}
