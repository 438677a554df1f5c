//! Interactive prompt.

use std::io::Write;

use echochat_core::Command;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

pub const HELP: &str = "
----------------------------------------------------
======== EchoChat Interactive CLI Commands =========
----------------------------------------------------
-> (s)ubscribe --- subscribe to a topic, creates
                   one if topic does not exist
-> (u)nsubscribe - unsubscribe from a topic
-> (p)ublish ----- send a message to a topic
-> (l)ist -------- list all existing topics
-> s(t)atus ------ check subscription to a topic
-> (h)elp -------- see this menu again
-> (e)xit/(q)uit - stop the client

Arguments may follow the command, e.g. `p general hello`.
Run with --help to see the one-shot options.
";

/// What a line of input amounts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Command(Command),
    /// An argument is missing; ask for it.
    Prompt(&'static str),
    Help,
    Exit,
    Invalid,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Awaiting {
    SubscribeTopic,
    UnsubscribeTopic,
    PublishTopic,
    PublishMessage { topic: String },
    StatusTopic,
}

impl Awaiting {
    fn prompt(&self) -> &'static str {
        match self {
            Awaiting::SubscribeTopic => "subscribe to topic:",
            Awaiting::UnsubscribeTopic => "unsubscribe from topic (empty for current):",
            Awaiting::PublishTopic => "choose topic to publish to (empty for current):",
            Awaiting::PublishMessage { .. } => "message to publish:",
            Awaiting::StatusTopic => "choose topic to check:",
        }
    }
}

/// Turns input lines into commands, asking for missing arguments.
#[derive(Debug, Default)]
pub struct InputParser {
    awaiting: Option<Awaiting>,
}

impl InputParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line of input.
    pub fn feed(&mut self, line: &str) -> Input {
        let line = line.trim();
        match self.awaiting.take() {
            Some(awaiting) => self.answer(awaiting, line),
            None => self.command(line),
        }
    }

    fn command(&mut self, line: &str) -> Input {
        if line.is_empty() {
            return Input::Empty;
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let awaiting = match word.to_lowercase().as_str() {
            "s" | "subscribe" => Awaiting::SubscribeTopic,
            "u" | "unsubscribe" => Awaiting::UnsubscribeTopic,
            "p" | "publish" => Awaiting::PublishTopic,
            "t" | "status" => Awaiting::StatusTopic,
            "l" | "list" => return Input::Command(Command::ListTopics),
            "h" | "help" => return Input::Help,
            "e" | "exit" | "q" | "quit" => return Input::Exit,
            _ => return Input::Invalid,
        };

        if rest.is_empty() {
            return self.ask(awaiting);
        }
        match awaiting {
            Awaiting::PublishTopic => match rest.split_once(char::is_whitespace) {
                Some((topic, message)) => Input::Command(Command::Publish {
                    topic: Some(topic.to_string()),
                    message: message.trim().to_string(),
                }),
                None => self.ask(Awaiting::PublishMessage {
                    topic: rest.to_string(),
                }),
            },
            awaiting => self.answer(awaiting, rest),
        }
    }

    fn answer(&mut self, awaiting: Awaiting, line: &str) -> Input {
        match awaiting {
            Awaiting::SubscribeTopic | Awaiting::StatusTopic if line.is_empty() => {
                self.ask(awaiting)
            }
            Awaiting::SubscribeTopic => Input::Command(Command::Subscribe(line.to_string())),
            Awaiting::StatusTopic => Input::Command(Command::TopicStatus(line.to_string())),
            Awaiting::UnsubscribeTopic => {
                Input::Command(Command::Unsubscribe((!line.is_empty()).then(|| line.to_string())))
            }
            Awaiting::PublishTopic => self.ask(Awaiting::PublishMessage {
                topic: line.to_string(),
            }),
            Awaiting::PublishMessage { topic } => Input::Command(Command::Publish {
                topic: (!topic.is_empty()).then_some(topic),
                message: line.to_string(),
            }),
        }
    }

    fn ask(&mut self, awaiting: Awaiting) -> Input {
        let prompt = awaiting.prompt();
        self.awaiting = Some(awaiting);
        Input::Prompt(prompt)
    }
}

/// Read commands from stdin until exit or end of input.
pub async fn read_commands(commands: mpsc::UnboundedSender<Command>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut parser = InputParser::new();
    print_prompt("> ");

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "Failed to read stdin");
                break;
            }
        };

        match parser.feed(&line) {
            Input::Command(command) => {
                if commands.send(command).is_err() {
                    return;
                }
                print_prompt("> ");
            }
            Input::Prompt(prompt) => print_prompt(&format!("{}\n>> ", prompt)),
            Input::Help => {
                println!("{}", HELP);
                print_prompt("> ");
            }
            Input::Exit => break,
            Input::Invalid => {
                println!("invalid function");
                print_prompt("> ");
            }
            Input::Empty => print_prompt("> "),
        }
    }

    // The manager may already be gone.
    let _ = commands.send(Command::Shutdown);
}

fn print_prompt(prompt: &str) {
    let mut stdout = std::io::stdout();
    if write!(stdout, "{}", prompt).and_then(|_| stdout.flush()).is_err() {
        debug!("Failed to write prompt");
    }
}
