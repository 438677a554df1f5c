//! Test support.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::echo::Side;
use crate::error::ClientError;
use crate::render::Renderer;
use crate::state::ConnectionState;

/// One call received by a [`RecordingRenderer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderCall {
    TopicList(Vec<String>),
    TopicStatus(String, u64),
    Chat(String, Side),
    ShowSpinner,
    HideSpinner,
    CurrentTopic(Option<String>),
    State(ConnectionState),
    /// Error kind, see [`ClientError::kind`].
    Error(&'static str),
}

/// Renderer that records every call.
///
/// Clones share the same record, so a test can keep a handle while the
/// client owns the renderer.
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    calls: Arc<Mutex<Vec<RenderCall>>>,
}

impl RecordingRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RenderCall>> {
        // A poisoned record only means another test thread panicked.
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push(&self, call: RenderCall) {
        self.lock().push(call);
    }

    /// Every call so far.
    #[must_use]
    pub fn calls(&self) -> Vec<RenderCall> {
        self.lock().clone()
    }

    /// Every call so far, clearing the record.
    #[must_use]
    pub fn take(&self) -> Vec<RenderCall> {
        std::mem::take(&mut *self.lock())
    }

    /// Kinds of the errors reported so far.
    #[must_use]
    pub fn errors(&self) -> Vec<&'static str> {
        self.lock()
            .iter()
            .filter_map(|call| match call {
                RenderCall::Error(kind) => Some(*kind),
                _ => None,
            })
            .collect()
    }
}

impl Renderer for RecordingRenderer {
    fn render_topic_list(&mut self, names: &[String]) {
        self.push(RenderCall::TopicList(names.to_vec()));
    }

    fn render_topic_status(&mut self, name: &str, subscribers: u64) {
        self.push(RenderCall::TopicStatus(name.to_string(), subscribers));
    }

    fn render_chat_message(&mut self, text: &str, side: Side) {
        self.push(RenderCall::Chat(text.to_string(), side));
    }

    fn show_spinner(&mut self) {
        self.push(RenderCall::ShowSpinner);
    }

    fn hide_spinner(&mut self) {
        self.push(RenderCall::HideSpinner);
    }

    fn on_current_topic_changed(&mut self, name: Option<&str>) {
        self.push(RenderCall::CurrentTopic(name.map(str::to_string)));
    }

    fn on_connection_state_changed(&mut self, state: ConnectionState) {
        self.push(RenderCall::State(state));
    }

    fn report_error(&mut self, error: &ClientError) {
        self.push(RenderCall::Error(error.kind()));
    }
}
