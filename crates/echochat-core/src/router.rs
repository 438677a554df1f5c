//! Incoming envelope routing.
//!
//! Every payload received on the connection is decoded and dispatched on
//! `(status, function)`. Handlers run to completion one at a time against the
//! session; what they did is reported back as a [`Routed`] value.

use echochat_protocol::{EnvelopeCodec, OperationTag, ProtocolError, Response};
use tracing::{debug, info, trace, warn};

use crate::dispatcher::Dispatcher;
use crate::echo::{Side, Verdict};
use crate::error::ClientError;
use crate::metrics;
use crate::render::Renderer;
use crate::session::{ChatMessage, Session};

/// Outcome of routing one envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// The server confirmed a subscription; the topic is now current.
    Subscribed { topic: String },
    /// The server confirmed an unsubscription.
    Unsubscribed { topic: Option<String>, was_current: bool },
    /// The server acknowledged a publish.
    Published {
        topic: Option<String>,
        /// Own message no longer awaiting its echo.
        cleared: Option<String>,
    },
    /// A new topic list replaced the old one.
    TopicList {
        topics: Vec<String>,
        /// Status requests issued for the new list.
        status_requests: usize,
    },
    /// A topic's status was applied.
    TopicStatus {
        topic: String,
        subscribers: u64,
        changed: bool,
    },
    /// A message for the current topic.
    Chat { topic: String, text: String, side: Side },
    /// A message for a topic other than the current one.
    Discarded { topic: String },
}

/// Mutable state a handler works on.
pub struct RouteContext<'a> {
    pub session: &'a mut Session,
    pub dispatcher: &'a mut Dispatcher,
    pub renderer: &'a mut dyn Renderer,
}

/// Decodes incoming payloads and dispatches them to their handlers.
#[derive(Debug, Clone, Default)]
pub struct ResponseRouter {
    codec: EnvelopeCodec,
}

impl ResponseRouter {
    #[must_use]
    pub fn new(codec: EnvelopeCodec) -> Self {
        Self { codec }
    }

    /// Decode and handle one payload.
    ///
    /// # Errors
    ///
    /// Returns the error the payload represents. The session is left
    /// unchanged by malformed payloads, server errors and unknown operations.
    pub fn route(&self, ctx: &mut RouteContext<'_>, raw: &[u8]) -> Result<Routed, ClientError> {
        let response = self.codec.decode(raw).map_err(ClientError::MalformedEnvelope)?;
        trace!(id = ?response.id, status = %response.status.as_str(), function = ?response.function, "Envelope received");
        metrics::record_response(response.status.as_str());
        self.dispatch(ctx, response)
    }

    /// Handle an already decoded response.
    ///
    /// # Errors
    ///
    /// See [`route`](Self::route).
    pub fn dispatch(
        &self,
        ctx: &mut RouteContext<'_>,
        response: Response,
    ) -> Result<Routed, ClientError> {
        if !response.is_success() {
            return Err(on_failure(ctx, response));
        }

        let function = response.function.as_deref().unwrap_or_default();
        let tag = OperationTag::parse(function)
            .ok_or_else(|| ClientError::UnknownOperation(function.to_string()))?;

        match tag {
            OperationTag::SubscribeTopic => on_subscribed(ctx, &response),
            OperationTag::UnsubscribeTopic => on_unsubscribed(ctx, &response),
            OperationTag::PublishTopic => on_published(ctx, &response),
            OperationTag::ListTopics => on_topic_list(ctx, &response),
            OperationTag::GetTopicStatus => on_topic_status(ctx, &response),
            OperationTag::UpdateTopic => on_topic_update(ctx, &response),
        }
    }
}

fn malformed(err: ProtocolError) -> ClientError {
    ClientError::MalformedEnvelope(err)
}

fn on_failure(ctx: &mut RouteContext<'_>, response: Response) -> ClientError {
    let topic = response
        .data
        .get("topic")
        .and_then(|t| t.as_str())
        .map(str::to_string);
    let request = match response.operation() {
        Some(tag) => ctx.dispatcher.resolve(&response, tag, topic.as_deref()),
        None => ctx.dispatcher.resolve_id(&response),
    };
    let rejected_publish = response.operation() == Some(OperationTag::PublishTopic)
        || request
            .as_ref()
            .is_some_and(|r| r.function == OperationTag::PublishTopic);
    if rejected_publish {
        // The message was rejected, so no echo will come back.
        let message = response
            .data
            .get("message")
            .and_then(|m| m.as_str())
            .or_else(|| request.as_ref().and_then(|r| r.message.as_deref()));
        ctx.session.echo.acknowledge(message);
    }
    ClientError::ServerError {
        function: response.function,
        message: response
            .error
            .unwrap_or_else(|| format!("status {}", response.status.as_str())),
    }
}

fn on_subscribed(ctx: &mut RouteContext<'_>, response: &Response) -> Result<Routed, ClientError> {
    let confirmation = response.confirmation().map_err(malformed)?;
    let request = ctx.dispatcher.resolve(
        response,
        OperationTag::SubscribeTopic,
        confirmation.topic.as_deref(),
    );
    let topic = confirmation
        .topic
        .or_else(|| request.and_then(|r| r.topic))
        .ok_or_else(|| {
            malformed(ProtocolError::InvalidData(
                "subscribe confirmation names no topic".to_string(),
            ))
        })?;

    info!(topic = %topic, "Subscribed");
    ctx.session.enter_topic(topic.clone());
    ctx.renderer.on_current_topic_changed(Some(&topic));
    Ok(Routed::Subscribed { topic })
}

fn on_unsubscribed(ctx: &mut RouteContext<'_>, response: &Response) -> Result<Routed, ClientError> {
    let confirmation = response.confirmation().map_err(malformed)?;
    let request = ctx.dispatcher.resolve(
        response,
        OperationTag::UnsubscribeTopic,
        confirmation.topic.as_deref(),
    );
    let topic = confirmation.topic.or_else(|| request.and_then(|r| r.topic));

    let was_current = topic.is_some() && topic.as_deref() == ctx.session.current_topic();
    if was_current {
        ctx.session.leave_topic();
        ctx.renderer.on_current_topic_changed(None);
    }
    info!(topic = ?topic, was_current, "Unsubscribed");
    Ok(Routed::Unsubscribed { topic, was_current })
}

fn on_published(ctx: &mut RouteContext<'_>, response: &Response) -> Result<Routed, ClientError> {
    let confirmation = response.confirmation().map_err(malformed)?;
    let request = ctx.dispatcher.resolve(
        response,
        OperationTag::PublishTopic,
        confirmation.topic.as_deref(),
    );
    let (sent_topic, sent_message) = match request {
        Some(r) => (r.topic, r.message),
        None => (None, None),
    };
    let message = confirmation.message.or(sent_message);
    let cleared = ctx.session.echo.acknowledge(message.as_deref());
    let topic = confirmation.topic.or(sent_topic);

    debug!(topic = ?topic, cleared = cleared.is_some(), "Publish acknowledged");
    Ok(Routed::Published { topic, cleared })
}

fn on_topic_list(ctx: &mut RouteContext<'_>, response: &Response) -> Result<Routed, ClientError> {
    let list = response.topic_list().map_err(malformed)?;
    ctx.dispatcher.resolve(response, OperationTag::ListTopics, None);

    // Statuses still outstanding belong to the list being replaced.
    ctx.dispatcher.abandon_fan_out();
    ctx.session.topics.replace(list.topic_list.iter().cloned());
    ctx.renderer.render_topic_list(&ctx.session.topics.names());
    info!(count = list.topic_list.len(), "Topic list received");

    let mut status_requests = 0;
    for name in &list.topic_list {
        ctx.dispatcher.fan_out_status(name)?;
        status_requests += 1;
    }

    if status_requests == 0 && ctx.session.spinner {
        ctx.session.spinner = false;
        ctx.renderer.hide_spinner();
    }

    Ok(Routed::TopicList {
        topics: list.topic_list,
        status_requests,
    })
}

fn on_topic_status(ctx: &mut RouteContext<'_>, response: &Response) -> Result<Routed, ClientError> {
    let status = response.topic_status().map_err(malformed)?;
    let request = ctx
        .dispatcher
        .resolve(response, OperationTag::GetTopicStatus, Some(&status.topic));
    // A status the user asked for is always shown, listed or not.
    let requested = request.is_some_and(|r| !r.fan_out);

    let changed = match ctx.session.topics.apply_status(&status) {
        Ok(changed) => changed,
        Err(_) if requested => false,
        Err(e) => return Err(e),
    };
    if changed || requested {
        ctx.renderer.render_topic_status(&status.topic, status.subscribers);
    }

    let outstanding = ctx.dispatcher.pending().fan_out_count();
    if outstanding == 0 && ctx.session.spinner {
        ctx.session.spinner = false;
        ctx.renderer.hide_spinner();
    }

    debug!(topic = %status.topic, subscribers = status.subscribers, changed, requested, outstanding, "Topic status received");
    Ok(Routed::TopicStatus {
        topic: status.topic,
        subscribers: status.subscribers,
        changed,
    })
}

fn on_topic_update(ctx: &mut RouteContext<'_>, response: &Response) -> Result<Routed, ClientError> {
    let update = response.topic_update().map_err(malformed)?;
    let verdict = ctx
        .session
        .echo
        .classify(ctx.session.current_topic.as_deref(), &update);

    let Some(side) = verdict.side() else {
        warn!(
            topic = %update.name,
            current = ?ctx.session.current_topic,
            "Discarding message for a topic that is not current"
        );
        return Ok(Routed::Discarded { topic: update.name });
    };

    trace!(topic = %update.name, own = (verdict == Verdict::Own), "Chat message");
    ctx.renderer.render_chat_message(&update.message, side);
    ctx.session.chat.push(ChatMessage {
        topic: update.name.clone(),
        text: update.message.clone(),
        side,
        timestamp: update.timestamp,
    });
    Ok(Routed::Chat {
        topic: update.name,
        text: update.message,
        side,
    })
}
