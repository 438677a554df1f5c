//! # EchoChat CLI
//!
//! Terminal client for the EchoChat publish/subscribe chat service.
//!
//! ## Usage
//!
//! ```bash
//! # Interactive prompt
//! echochat
//!
//! # One-shot commands
//! echochat --cli list
//! echochat --cli status --topic general
//! echochat --cli subscribe --topic general
//! echochat --cli --output human publish general "Hello, World!"
//!
//! # Another server
//! ECHOCHAT_URI=ws://10.0.0.2:8000/ws echochat
//! ```

mod config;
mod interactive;
mod metrics;
mod output;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use echochat_core::{Client, Command, ConnectionManager};
use echochat_transport::WebSocketTransport;
use output::{ExitOn, OutputFormat, TerminalRenderer};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "echochat")]
#[command(version, about = "EchoChat CLI client")]
struct Cli {
    /// Suppress the interactive prompt and run COMMAND
    #[arg(short, long)]
    cli: bool,

    /// Output type
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    output: OutputFormat,

    /// The command to run with --cli
    #[arg(value_enum)]
    command: Option<OneShot>,

    /// Topic argument, when not given with --topic
    #[arg(value_name = "TOPIC")]
    topic_arg: Option<String>,

    /// Message argument, when not given with --message
    #[arg(value_name = "MESSAGE")]
    message_arg: Option<String>,

    /// The topic parameter
    #[arg(short, long)]
    topic: Option<String>,

    /// The message to publish
    #[arg(short, long)]
    message: Option<String>,

    /// Server endpoint, overrides config and ECHOCHAT_URI
    #[arg(long)]
    uri: Option<String>,

    /// Path to a config file
    #[arg(long)]
    config: Option<PathBuf>,
}

/// One-shot commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OneShot {
    /// List all topics with their subscriber counts, then exit
    List,
    /// Print one topic's status, then exit
    Status,
    /// Subscribe and print messages until interrupted
    Subscribe,
    /// Subscribe, publish, and print messages until interrupted
    Publish,
}

/// What the client does once connected.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Interactive,
    OneShot {
        commands: Vec<Command>,
        exit: Option<ExitOn>,
    },
}

impl Cli {
    fn mode(&self) -> Result<Mode> {
        if !self.cli {
            return Ok(Mode::Interactive);
        }
        let Some(command) = self.command else {
            bail!("--cli needs a command: list, status, subscribe or publish");
        };

        let topic = self.topic.clone().or_else(|| self.topic_arg.clone());
        let require_topic = || topic.clone().with_context(|| "a topic is required, use --topic");

        let mode = match command {
            OneShot::List => Mode::OneShot {
                commands: vec![Command::ListTopics],
                exit: Some(ExitOn::TopicList),
            },
            OneShot::Status => {
                let topic = require_topic()?;
                // Statuses only apply to listed topics, so list first.
                Mode::OneShot {
                    commands: vec![Command::ListTopics],
                    exit: Some(ExitOn::TopicStatus(topic)),
                }
            }
            OneShot::Subscribe => Mode::OneShot {
                commands: vec![Command::Subscribe(require_topic()?)],
                exit: None,
            },
            OneShot::Publish => {
                let topic = require_topic()?;
                let message = self
                    .message
                    .clone()
                    .or_else(|| self.message_arg.clone())
                    .context("a message is required, use --message")?;
                Mode::OneShot {
                    commands: vec![
                        Command::Subscribe(topic.clone()),
                        Command::Publish {
                            topic: Some(topic),
                            message,
                        },
                    ],
                    exit: None,
                }
            }
        };
        Ok(mode)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays parseable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "echochat=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => config::Config::from_file(path)?,
        None => config::Config::load()?,
    }
    .with_env(|key| std::env::var(key).ok());
    if let Some(uri) = &cli.uri {
        config.uri = uri.clone();
    }

    if config.metrics.enabled {
        metrics::start_metrics_server(config.metrics.port)?;
    }

    let mode = cli.mode()?;
    let (commands, rx) = mpsc::unbounded_channel();

    let mut renderer = TerminalRenderer::new(std::io::stdout(), cli.output);
    if let Mode::OneShot {
        exit: Some(condition),
        ..
    } = &mode
    {
        renderer = renderer.exit_on(condition.clone(), commands.clone());
    }

    let client = Client::with_config(renderer, config.client_config());
    let transport = Arc::new(WebSocketTransport::new(config.websocket_config()));
    let mut manager = ConnectionManager::new(transport, client, config.reconnect_policy());

    tracing::info!("Connecting to {}", config.uri);
    let state = manager.connect(&config.uri).await;

    match mode {
        Mode::OneShot { commands: queued, .. } => {
            if !state.is_open() {
                bail!("Could not connect to {}", config.uri);
            }
            for command in queued {
                commands.send(command).context("Client stopped")?;
            }
        }
        Mode::Interactive => {
            println!("{}", interactive::HELP);
            tokio::spawn(interactive::read_commands(commands.clone()));
        }
    }

    let interrupt = commands.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = interrupt.send(Command::Shutdown);
        }
    });

    manager.run(rx).await.context("Connection lost")?;
    Ok(())
}
