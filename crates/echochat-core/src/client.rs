//! Client facade.
//!
//! [`Client`] ties the connection state, the session, request dispatch and
//! response routing to a [`Renderer`]. It performs no I/O itself: the
//! connection manager feeds it transport events and it queues outgoing
//! payloads on the channel handed to [`Client::on_open`].

use bytes::Bytes;
use echochat_protocol::{EnvelopeCodec, RequestId, MAX_ENVELOPE_SIZE};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::dispatcher::Dispatcher;
use crate::echo::{EchoState, DEFAULT_MAX_PENDING};
use crate::error::ClientError;
use crate::metrics;
use crate::pending::PendingRequests;
use crate::render::Renderer;
use crate::router::{ResponseRouter, RouteContext, Routed};
use crate::session::{ChatMessage, Session};
use crate::state::ConnectionState;
use crate::topics::TopicStore;

/// Client tuning.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Own messages remembered while awaiting their echo.
    pub max_pending_echoes: usize,
    /// Largest envelope accepted or sent, in bytes.
    pub max_envelope_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_pending_echoes: DEFAULT_MAX_PENDING,
            max_envelope_size: MAX_ENVELOPE_SIZE,
        }
    }
}

/// An EchoChat client session driving a renderer.
pub struct Client<R: Renderer> {
    state: ConnectionState,
    session: Session,
    dispatcher: Dispatcher,
    router: ResponseRouter,
    renderer: R,
    /// Last confirmed subscription, kept across a close so it can be
    /// subscribed again after a reconnect.
    resume_topic: Option<String>,
}

impl<R: Renderer> Client<R> {
    #[must_use]
    pub fn new(renderer: R) -> Self {
        Self::with_config(renderer, ClientConfig::default())
    }

    #[must_use]
    pub fn with_config(renderer: R, config: ClientConfig) -> Self {
        let codec = EnvelopeCodec::with_max_size(config.max_envelope_size);
        Self {
            state: ConnectionState::Closed,
            session: Session::new(config.max_pending_echoes),
            dispatcher: Dispatcher::new(codec.clone()),
            router: ResponseRouter::new(codec),
            renderer,
            resume_topic: None,
        }
    }

    // Transport events

    /// The transport is being opened.
    pub fn on_connecting(&mut self) {
        self.set_state(ConnectionState::Connecting);
    }

    /// The transport was lost and a new attempt is scheduled.
    pub fn on_reconnecting(&mut self) {
        self.set_state(ConnectionState::Reconnecting);
    }

    /// The transport is open; requests are queued on `outbound`.
    pub fn on_open(&mut self, outbound: mpsc::UnboundedSender<Bytes>) {
        self.session.reset();
        self.dispatcher.attach(outbound);
        self.set_state(ConnectionState::Open);
    }

    /// Handle one payload received from the transport.
    ///
    /// Errors are logged and reported to the renderer, never returned.
    pub fn on_message(&mut self, raw: &[u8]) -> Option<Routed> {
        let mut ctx = RouteContext {
            session: &mut self.session,
            dispatcher: &mut self.dispatcher,
            renderer: &mut self.renderer,
        };
        match self.router.route(&mut ctx, raw) {
            Ok(routed) => {
                self.track_subscription(&routed);
                Some(routed)
            }
            Err(e) => {
                self.report(&e);
                None
            }
        }
    }

    fn track_subscription(&mut self, routed: &Routed) {
        match routed {
            Routed::Subscribed { topic } => self.resume_topic = Some(topic.clone()),
            Routed::Unsubscribed {
                was_current: true, ..
            } => self.resume_topic = None,
            _ => {}
        }
    }

    /// The transport closed. Outstanding requests are abandoned and the
    /// session is torn down; the resume topic is kept.
    pub fn on_close(&mut self) {
        self.dispatcher.detach();
        let had_topic = self.session.current_topic.is_some();
        self.session.reset();
        if had_topic {
            self.renderer.on_current_topic_changed(None);
        }
        self.set_state(ConnectionState::Closed);
    }

    /// A transport error occurred.
    pub fn on_error(&mut self, err: ClientError) {
        self.report(&err);
    }

    /// Log, count and surface an error. Stale statuses are only logged.
    pub fn report(&mut self, err: &ClientError) {
        metrics::record_error(err.kind());
        match err {
            ClientError::StaleReference(topic) => {
                debug!(topic = %topic, "Ignoring status for unlisted topic");
                return;
            }
            ClientError::NotConnected | ClientError::EmptyMessage | ClientError::NoCurrentTopic => {
                warn!(error = %err, "Request rejected");
            }
            ClientError::ServerError { .. } | ClientError::UnknownOperation(_) => {
                warn!(error = %err, "Server reply not applied");
            }
            _ => error!(error = %err, kind = err.kind(), "Client error"),
        }
        self.renderer.report_error(err);
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            info!(from = %self.state, to = %state, "Connection state changed");
            self.state = state;
            self.renderer.on_connection_state_changed(state);
        }
    }

    pub(crate) fn mark_closed(&mut self) {
        self.set_state(ConnectionState::Closed);
    }

    // UI operations

    /// Subscribe to `name`, leaving the current topic first.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if the connection is not open.
    pub fn subscribe(&mut self, name: &str) -> Result<RequestId, ClientError> {
        self.ensure_open()?;
        if let Some(previous) = self.session.current_topic.clone() {
            if previous != name {
                self.dispatcher.unsubscribe(&previous)?;
            }
        }
        self.dispatcher.subscribe(name)
    }

    /// Unsubscribe from `name`, or from the current topic.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NoCurrentTopic`] if no name is given and no
    /// topic is current, or [`ClientError::NotConnected`].
    pub fn unsubscribe(&mut self, name: Option<&str>) -> Result<RequestId, ClientError> {
        self.ensure_open()?;
        let name = match name {
            Some(name) => name.to_string(),
            None => self
                .session
                .current_topic
                .clone()
                .ok_or(ClientError::NoCurrentTopic)?,
        };
        if self.resume_topic.as_deref() == Some(name.as_str()) {
            self.resume_topic = None;
        }
        self.dispatcher.unsubscribe(&name)
    }

    /// Publish `message` to the current topic.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::EmptyMessage`] for blank text,
    /// [`ClientError::NoCurrentTopic`] if nothing is subscribed, or
    /// [`ClientError::NotConnected`].
    pub fn publish(&mut self, message: &str) -> Result<RequestId, ClientError> {
        let topic = self
            .session
            .current_topic
            .clone()
            .ok_or(ClientError::NoCurrentTopic)?;
        self.publish_to(&topic, message)
    }

    /// Publish `message` to `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::EmptyMessage`] for blank text or
    /// [`ClientError::NotConnected`].
    pub fn publish_to(&mut self, topic: &str, message: &str) -> Result<RequestId, ClientError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ClientError::EmptyMessage);
        }
        self.ensure_open()?;
        self.dispatcher.publish(&mut self.session.echo, topic, message)
    }

    /// Request the topic list and show the spinner until it is complete.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if the connection is not open.
    pub fn list_topics(&mut self) -> Result<RequestId, ClientError> {
        self.ensure_open()?;
        let id = self.dispatcher.list_topics()?;
        self.session.spinner = true;
        self.renderer.show_spinner();
        Ok(id)
    }

    /// Request the status of one topic.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if the connection is not open.
    pub fn topic_status(&mut self, name: &str) -> Result<RequestId, ClientError> {
        self.ensure_open()?;
        self.dispatcher.topic_status(name)
    }

    /// Subscribe again to the last confirmed topic, unless it was left.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if the connection is not open.
    pub fn resubscribe(&mut self) -> Result<Option<RequestId>, ClientError> {
        let Some(topic) = self.resume_topic.clone() else {
            return Ok(None);
        };
        info!(topic = %topic, "Subscribing again after reconnect");
        self.subscribe(&topic).map(Some)
    }

    fn ensure_open(&self) -> Result<(), ClientError> {
        if self.state.is_open() && self.dispatcher.is_attached() {
            Ok(())
        } else {
            Err(ClientError::NotConnected)
        }
    }

    // Accessors

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn current_topic(&self) -> Option<&str> {
        self.session.current_topic()
    }

    #[must_use]
    pub fn topics(&self) -> &TopicStore {
        self.session.topics()
    }

    /// Own messages awaiting their echo, oldest first.
    #[must_use]
    pub fn pending_own_messages(&self) -> Vec<&str> {
        self.session.echo().pending().collect()
    }

    #[must_use]
    pub fn echo_state(&self) -> EchoState {
        self.session.echo().state()
    }

    #[must_use]
    pub fn chat(&self) -> &[ChatMessage] {
        self.session.chat()
    }

    #[must_use]
    pub fn pending_requests(&self) -> &PendingRequests {
        self.dispatcher.pending()
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Topic that will be subscribed again after a reconnect.
    #[must_use]
    pub fn resume_topic(&self) -> Option<&str> {
        self.resume_topic.as_deref()
    }

    #[must_use]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }
}
