//! Console front end for the gate coordinator.
//!
//! Reads one inbound message per stdin line and logs every outbound
//! notification instead of delivering it:
//!
//! ```text
//! <user_id> <name> <text>                   typed text (1, 2, 4 or a button caption)
//! <user_id> <name> press <callback-data>    pressed control, e.g. `press done:<id>`
//! ```
//!
//! Ctrl-C or end of input drains in-flight notifications and exits.

use anyhow::Context;
use gatekeeper::{
    Actor, Config, Control, GateCoordinator, GateEnvironment, GateEvent, LoggingNotifier, messages,
};
use gatekeeper_core::environment::SystemClock;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// One parsed console line.
#[derive(Debug, PartialEq, Eq)]
enum ConsoleInput {
    Text { actor: Actor, text: String },
    Press { actor: Actor, control: Control },
}

impl ConsoleInput {
    fn parse(line: &str) -> anyhow::Result<Self> {
        let mut parts = line.trim().splitn(3, char::is_whitespace);
        let id = parts
            .next()
            .filter(|s| !s.is_empty())
            .context("missing user id")?
            .parse::<i64>()
            .context("user id must be an integer")?;
        let name = parts.next().context("missing user name")?;
        let rest = parts.next().context("missing message text")?.trim();
        let actor = Actor::new(id, name);

        match rest.strip_prefix("press ") {
            Some(data) => Ok(Self::Press {
                actor,
                control: data.parse().context("invalid callback data")?,
            }),
            None => Ok(Self::Text {
                actor,
                text: rest.to_string(),
            }),
        }
    }

    fn into_event(self) -> Option<(Actor, GateEvent)> {
        match self {
            Self::Press { actor, control } => {
                let event = GateEvent::from_control(control, &actor);
                Some((actor, event))
            },
            Self::Text { actor, text } => {
                if text == "/start" {
                    info!(user = actor.id, "{}", messages::WELCOME);
                }
                let event = GateEvent::from_text(&text, &actor)?;
                Some((actor, event))
            },
        }
    }
}

async fn handle_line(coordinator: &GateCoordinator, line: &str) {
    if line.trim().is_empty() {
        return;
    }
    let input = match ConsoleInput::parse(line) {
        Ok(input) => input,
        Err(error) => {
            warn!(%error, "Unrecognised input, expected `<user_id> <name> <text>`");
            return;
        },
    };
    let Some((actor, event)) = input.into_event() else {
        return;
    };

    match coordinator.handle(event).await {
        Ok(outcome) => match outcome.feedback_text() {
            Some(feedback) => info!(user = actor.id, ?outcome, "{feedback}"),
            None => info!(user = actor.id, ?outcome, "Event handled"),
        },
        Err(error) => warn!(user = actor.id, %error, "Event rejected"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let config = Config::from_env().context("failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.log_filter)
                .unwrap_or_else(|_| gatekeeper::config::DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        operators = config.operators.len(),
        shutdown_timeout = ?config.shutdown_timeout,
        "Configuration loaded"
    );
    if config.operators.is_empty() {
        warn!("No operators configured, requests will never be answered");
    }

    let environment = GateEnvironment::new(
        Arc::new(SystemClock),
        LoggingNotifier::shared(),
        config.operators.clone(),
    );
    let coordinator = GateCoordinator::new(environment);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line.context("failed to read stdin")? {
                Some(line) => handle_line(&coordinator, &line).await,
                None => {
                    info!("End of input");
                    break;
                },
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received");
                break;
            },
        }
    }

    if let Err(error) = coordinator.shutdown(config.shutdown_timeout).await {
        warn!(%error, "Shutdown did not drain cleanly");
    }
    info!("Gatekeeper stopped");
    Ok(())
}
