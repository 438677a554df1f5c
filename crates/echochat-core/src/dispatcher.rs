//! Outgoing request dispatch.

use bytes::Bytes;
use echochat_protocol::{EnvelopeCodec, OperationTag, Request, RequestId, Response};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::echo::EchoSuppressor;
use crate::error::ClientError;
use crate::metrics;
use crate::pending::{PendingRequest, PendingRequests};

/// Builds requests, assigns their ids and queues them on the open connection.
///
/// Sending is fire-and-forget: replies come back through the router and are
/// matched against the pending requests kept here.
#[derive(Debug)]
pub struct Dispatcher {
    outbound: Option<mpsc::UnboundedSender<Bytes>>,
    codec: EnvelopeCodec,
    next_id: RequestId,
    pending: PendingRequests,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(EnvelopeCodec::new())
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new(codec: EnvelopeCodec) -> Self {
        Self {
            outbound: None,
            codec,
            next_id: 1,
            pending: PendingRequests::new(),
        }
    }

    /// Start sending on a newly opened connection.
    pub fn attach(&mut self, outbound: mpsc::UnboundedSender<Bytes>) {
        self.outbound = Some(outbound);
    }

    /// Stop sending. Outstanding requests are abandoned.
    pub fn detach(&mut self) {
        self.outbound = None;
        if !self.pending.is_empty() {
            debug!(count = self.pending.len(), "Abandoning unanswered requests");
            self.pending.clear();
        }
        metrics::set_pending_requests(0);
    }

    /// Whether requests can currently be queued.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.outbound.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    #[must_use]
    pub fn pending(&self) -> &PendingRequests {
        &self.pending
    }

    /// Send `SUBSCRIBE_TOPIC`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if no connection is open.
    pub fn subscribe(&mut self, name: &str) -> Result<RequestId, ClientError> {
        self.send(Request::subscribe(name))
    }

    /// Send `UNSUBSCRIBE_TOPIC`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if no connection is open.
    pub fn unsubscribe(&mut self, name: &str) -> Result<RequestId, ClientError> {
        self.send(Request::unsubscribe(name))
    }

    /// Send `PUBLISH_TOPIC`, arming `echo` with the message first.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if no connection is open; `echo`
    /// is left as it was.
    pub fn publish(
        &mut self,
        echo: &mut EchoSuppressor,
        name: &str,
        message: &str,
    ) -> Result<RequestId, ClientError> {
        if !self.is_attached() {
            return Err(ClientError::NotConnected);
        }
        echo.arm(message);
        self.send(Request::publish(name, message)).map_err(|e| {
            echo.disarm(message);
            e
        })
    }

    /// Send `LIST_TOPICS`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if no connection is open.
    pub fn list_topics(&mut self) -> Result<RequestId, ClientError> {
        self.send(Request::list_topics())
    }

    /// Send `GET_TOPIC_STATUS`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if no connection is open.
    pub fn topic_status(&mut self, name: &str) -> Result<RequestId, ClientError> {
        self.send(Request::topic_status(name))
    }

    /// Send `GET_TOPIC_STATUS` on behalf of a topic list refresh.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if no connection is open.
    pub fn fan_out_status(&mut self, name: &str) -> Result<RequestId, ClientError> {
        self.queue(Request::topic_status(name), true)
    }

    fn send(&mut self, request: Request) -> Result<RequestId, ClientError> {
        self.queue(request, false)
    }

    fn queue(&mut self, request: Request, fan_out: bool) -> Result<RequestId, ClientError> {
        let outbound = self
            .outbound
            .as_ref()
            .filter(|tx| !tx.is_closed())
            .ok_or(ClientError::NotConnected)?;

        let id = self.next_id;
        let request = request.with_id(id);
        let data = self.codec.encode(&request).map_err(ClientError::Encode)?;
        trace!(id, size = data.len(), "Queueing request");
        outbound.send(data).map_err(|_| ClientError::NotConnected)?;
        self.next_id += 1;

        debug!(id, function = %request.function, topic = ?request.topic(), "Request sent");
        metrics::record_request(request.function.as_str());

        let evicted = self.pending.insert(PendingRequest {
            id,
            function: request.function,
            topic: request.parameters.name,
            message: request.parameters.message,
            fan_out,
        });
        if let Some(oldest) = evicted {
            warn!(id = oldest.id, function = %oldest.function, "Forgetting unanswered request");
        }
        metrics::set_pending_requests(self.pending.len());
        Ok(id)
    }

    /// Match a reply to the request it answers.
    pub fn resolve(
        &mut self,
        response: &Response,
        function: OperationTag,
        topic: Option<&str>,
    ) -> Option<PendingRequest> {
        let resolved = self.pending.resolve(response.id, function, topic);
        match &resolved {
            Some(request) => trace!(id = request.id, function = %function, "Reply matched"),
            None => debug!(id = ?response.id, function = %function, "Reply matches no outstanding request"),
        }
        metrics::set_pending_requests(self.pending.len());
        resolved
    }

    /// Match a reply that names no operation by its echoed id alone.
    pub fn resolve_id(&mut self, response: &Response) -> Option<PendingRequest> {
        let resolved = response.id.and_then(|id| self.pending.remove(id));
        if resolved.is_some() {
            metrics::set_pending_requests(self.pending.len());
        }
        resolved
    }

    /// Forget the status requests of the previous topic list refresh.
    pub fn abandon_fan_out(&mut self) {
        let dropped = self.pending.abandon_fan_out();
        if dropped > 0 {
            debug!(count = dropped, "Abandoned outstanding status requests");
            metrics::set_pending_requests(self.pending.len());
        }
    }
}
