//! Terminal rendering of client events.

use std::collections::HashMap;
use std::io::Write;

use clap::ValueEnum;
use echochat_core::{ClientError, Command, ConnectionState, Renderer, Side};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

/// Column own messages are right-aligned to in human output.
const CHAT_WIDTH: usize = 60;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One JSON object per line
    Json,
    /// Plain text
    Human,
}

/// When a one-shot run is complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOn {
    /// The topic list and all statuses have arrived.
    TopicList,
    /// The named topic's status has arrived.
    TopicStatus(String),
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Event<'a> {
    TopicList { topics: &'a [String] },
    TopicStatus { topic: &'a str, subscribers: u64 },
    Message { text: &'a str, side: Side },
    CurrentTopic { topic: Option<&'a str> },
    Connection { state: &'a str },
    Error { kind: &'a str, message: String },
}

/// Prints client events to a terminal.
pub struct TerminalRenderer<W: Write> {
    out: W,
    format: OutputFormat,
    exit: Option<(ExitOn, mpsc::UnboundedSender<Command>)>,
    statuses: HashMap<String, u64>,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self {
            out,
            format,
            exit: None,
            statuses: HashMap::new(),
        }
    }

    /// Request shutdown through `commands` once `condition` is met.
    #[must_use]
    pub fn exit_on(mut self, condition: ExitOn, commands: mpsc::UnboundedSender<Command>) -> Self {
        self.exit = Some((condition, commands));
        self
    }

    #[cfg(test)]
    pub fn output(&self) -> &W {
        &self.out
    }

    fn emit(&mut self, event: &Event<'_>, human: impl FnOnce() -> String) {
        let line = match self.format {
            OutputFormat::Json => match serde_json::to_string(event) {
                Ok(line) => line,
                Err(e) => {
                    debug!(error = %e, "Failed to serialize event");
                    return;
                }
            },
            OutputFormat::Human => human(),
        };
        self.write_line(&line);
    }

    fn write_line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{}", line).and_then(|_| self.out.flush()) {
            debug!(error = %e, "Failed to write output");
        }
    }

    fn finish(&mut self) {
        if let Some((_, commands)) = self.exit.take() {
            // The manager may already be gone.
            let _ = commands.send(Command::Shutdown);
        }
    }

    fn exits_on(&self, condition: &ExitOn) -> bool {
        matches!(&self.exit, Some((c, _)) if c == condition)
    }
}

impl<W: Write> Renderer for TerminalRenderer<W> {
    fn render_topic_list(&mut self, names: &[String]) {
        self.statuses.clear();
        self.emit(&Event::TopicList { topics: names }, || {
            if names.is_empty() {
                "no topics".to_string()
            } else {
                format!("topics: {}", names.join(", "))
            }
        });
    }

    fn render_topic_status(&mut self, name: &str, subscribers: u64) {
        self.statuses.insert(name.to_string(), subscribers);
        self.emit(&Event::TopicStatus { topic: name, subscribers }, || {
            format!("{}: {} subscriber(s)", name, subscribers)
        });
        if self.exits_on(&ExitOn::TopicStatus(name.to_string())) {
            self.finish();
        }
    }

    fn render_chat_message(&mut self, text: &str, side: Side) {
        self.emit(&Event::Message { text, side }, || match side {
            Side::Left => text.to_string(),
            Side::Right => format!("{:>width$}", text, width = CHAT_WIDTH),
        });
    }

    // JSON consumers only see the list once it arrives.
    fn show_spinner(&mut self) {
        if self.format == OutputFormat::Human {
            self.write_line("loading topics...");
        }
    }

    fn hide_spinner(&mut self) {
        match self.exit.as_ref().map(|(c, _)| c.clone()) {
            Some(ExitOn::TopicList) => self.finish(),
            Some(ExitOn::TopicStatus(topic)) if !self.statuses.contains_key(&topic) => {
                self.emit(
                    &Event::Error {
                        kind: "unknown_topic",
                        message: format!("topic does not exist: {}", topic),
                    },
                    || format!("error: topic does not exist: {}", topic),
                );
                self.finish();
            }
            _ => {}
        }
    }

    fn on_current_topic_changed(&mut self, name: Option<&str>) {
        self.emit(&Event::CurrentTopic { topic: name }, || match name {
            Some(name) => format!("subscribed to {}", name),
            None => "not subscribed to any topic".to_string(),
        });
    }

    fn on_connection_state_changed(&mut self, state: ConnectionState) {
        self.emit(&Event::Connection { state: state.as_str() }, || {
            format!("connection {}", state)
        });
    }

    fn report_error(&mut self, error: &ClientError) {
        self.emit(
            &Event::Error {
                kind: error.kind(),
                message: error.to_string(),
            },
            || format!("error: {}", error),
        );
        // One-shot lookups fail on the first server-side error.
        if matches!(error, ClientError::ServerError { .. } | ClientError::NotConnected) {
            self.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn lines(renderer: &TerminalRenderer<Vec<u8>>) -> Vec<String> {
        String::from_utf8(renderer.output().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_json_output() {
        let mut renderer = TerminalRenderer::new(Vec::new(), OutputFormat::Json);
        renderer.render_topic_list(&["general".to_string()]);
        renderer.render_chat_message("hello", Side::Right);

        let events: Vec<Value> = lines(&renderer)
            .iter()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(events[0]["event"], "topic_list");
        assert_eq!(events[0]["topics"][0], "general");
        assert_eq!(events[1]["event"], "message");
        assert_eq!(events[1]["side"], "right");
    }

    #[test]
    fn test_human_output_aligns_own_messages() {
        let mut renderer = TerminalRenderer::new(Vec::new(), OutputFormat::Human);
        renderer.render_chat_message("hi", Side::Left);
        renderer.render_chat_message("hello", Side::Right);
        renderer.render_topic_status("general", 3);

        let lines = lines(&renderer);
        assert_eq!(lines[0], "hi");
        assert_eq!(lines[1].len(), CHAT_WIDTH);
        assert!(lines[1].ends_with("hello"));
        assert_eq!(lines[2], "general: 3 subscriber(s)");
    }

    #[test]
    fn test_exit_after_topic_list() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut renderer =
            TerminalRenderer::new(Vec::new(), OutputFormat::Json).exit_on(ExitOn::TopicList, tx);

        renderer.render_topic_list(&["a".to_string()]);
        assert!(rx.try_recv().is_err());
        renderer.render_topic_status("a", 1);
        renderer.hide_spinner();
        assert_eq!(rx.try_recv().unwrap(), Command::Shutdown);
    }

    #[test]
    fn test_exit_after_status() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut renderer = TerminalRenderer::new(Vec::new(), OutputFormat::Json)
            .exit_on(ExitOn::TopicStatus("b".to_string()), tx);

        renderer.render_topic_status("a", 1);
        assert!(rx.try_recv().is_err());
        renderer.render_topic_status("b", 2);
        assert_eq!(rx.try_recv().unwrap(), Command::Shutdown);
    }

    #[test]
    fn test_status_for_unknown_topic() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut renderer = TerminalRenderer::new(Vec::new(), OutputFormat::Human)
            .exit_on(ExitOn::TopicStatus("missing".to_string()), tx);

        renderer.render_topic_list(&["a".to_string()]);
        renderer.render_topic_status("a", 1);
        renderer.hide_spinner();

        assert_eq!(rx.try_recv().unwrap(), Command::Shutdown);
        assert_eq!(
            lines(&renderer).last().unwrap(),
            "error: topic does not exist: missing"
        );
    }

    #[test]
    fn test_spinner_only_in_human_output() {
        let mut json = TerminalRenderer::new(Vec::new(), OutputFormat::Json);
        json.show_spinner();
        assert!(lines(&json).is_empty());

        let mut human = TerminalRenderer::new(Vec::new(), OutputFormat::Human);
        human.show_spinner();
        assert_eq!(lines(&human), vec!["loading topics...".to_string()]);
    }
}
