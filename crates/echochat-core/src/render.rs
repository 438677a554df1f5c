//! The presentation interface the client core drives.

use crate::echo::Side;
use crate::error::ClientError;
use crate::state::ConnectionState;

/// Receives everything the user should see.
///
/// The core never formats output itself; a terminal, a GUI or a test double
/// implements this trait.
pub trait Renderer {
    /// A fresh topic list replaced the previous one.
    fn render_topic_list(&mut self, names: &[String]);

    /// A topic's subscriber count is known or changed.
    fn render_topic_status(&mut self, name: &str, subscribers: u64);

    /// A chat message for the current topic.
    fn render_chat_message(&mut self, text: &str, side: Side);

    /// A topic list was requested.
    fn show_spinner(&mut self);

    /// The requested topic list and its statuses have arrived.
    fn hide_spinner(&mut self);

    /// The subscribed topic changed. `None` once unsubscribed or disconnected.
    fn on_current_topic_changed(&mut self, name: Option<&str>);

    fn on_connection_state_changed(&mut self, _state: ConnectionState) {}

    /// A recoverable error occurred.
    fn report_error(&mut self, _error: &ClientError) {}
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render_topic_list(&mut self, names: &[String]) {
        (**self).render_topic_list(names);
    }

    fn render_topic_status(&mut self, name: &str, subscribers: u64) {
        (**self).render_topic_status(name, subscribers);
    }

    fn render_chat_message(&mut self, text: &str, side: Side) {
        (**self).render_chat_message(text, side);
    }

    fn show_spinner(&mut self) {
        (**self).show_spinner();
    }

    fn hide_spinner(&mut self) {
        (**self).hide_spinner();
    }

    fn on_current_topic_changed(&mut self, name: Option<&str>) {
        (**self).on_current_topic_changed(name);
    }

    fn on_connection_state_changed(&mut self, state: ConnectionState) {
        (**self).on_connection_state_changed(state);
    }

    fn report_error(&mut self, error: &ClientError) {
        (**self).report_error(error);
    }
}
