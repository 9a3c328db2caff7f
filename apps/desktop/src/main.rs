use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{HttpRemoteStore, LocalMirror, SelectionController, SelectionEvent};
use shared::domain::{Card, Selection, SELECTION_CAPACITY};
use storage::Storage;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::{self, error::RecvError},
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, Overrides};

#[derive(Parser, Debug)]
#[command(name = "pick-six", about = "Pick up to six cards and keep them in sync")]
struct Args {
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    cache_url: Option<String>,
    #[arg(long)]
    cache_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Next,
    Save,
    List,
    Show,
    Refresh,
    Dismiss,
    Help,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let cmd = match line.trim().to_ascii_lowercase().as_str() {
            "next" | "n" => Self::Next,
            "save" | "s" => Self::Save,
            "list" | "l" => Self::List,
            "show" => Self::Show,
            "refresh" | "r" => Self::Refresh,
            "dismiss" | "d" => Self::Dismiss,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            _ => return None,
        };
        Some(cmd)
    }
}

const HELP: &str = "commands: next, save, list, show, refresh, dismiss, help, quit";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let args = Args::parse();

    let settings = load_settings(Overrides {
        server_url: args.server_url,
        cache_url: args.cache_url,
        cache_key: args.cache_key,
    });
    let server_url = settings.validated_server_url()?;
    let cache = Storage::new(&settings.cache_url)
        .await
        .with_context(|| format!("failed to open local cache at {}", settings.cache_url))?;
    let remote = HttpRemoteStore::new(server_url.as_str())?;
    info!(server_url = %remote.base_url(), cache_url = %settings.cache_url, "pick-six starting");

    let controller = SelectionController::new(
        Arc::new(remote),
        LocalMirror::new(Arc::new(cache), settings.cache_key.clone()),
    );
    info!(cache_key = %controller.mirror().key(), "local mirror ready");
    spawn_event_log(&controller);

    controller.initialize().await;
    let _ = controller.refresh_stored().await;
    println!("{}", execute(&controller, Command::Show).await);
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let Some(cmd) = Command::parse(&line) else {
            println!("unknown command '{}'. {HELP}", line.trim());
            continue;
        };
        if cmd == Command::Quit {
            break;
        }
        let out = execute(&controller, cmd).await;
        if !out.is_empty() {
            println!("{out}");
        }
    }

    info!("pick-six exiting");
    Ok(())
}

/// Runs one command and renders what the user should see. A pending error is
/// always the last line and appears once.
async fn execute(controller: &SelectionController, cmd: Command) -> String {
    let mut out = Vec::new();
    match cmd {
        Command::Next => {
            if let Ok(card) = controller.next_random().await {
                out.push(format!("candidate: {}", describe_card(&card)));
            }
        }
        Command::Save => {
            if controller.save_current().await.is_ok() {
                out.push(describe_selection(&controller.list_stored().await));
            }
        }
        Command::List => out.push(describe_selection(&controller.list_stored().await)),
        Command::Show => {
            match controller.random_card().await {
                Some(card) => out.push(format!("candidate: {}", describe_card(&card))),
                None => out.push("candidate: none".to_string()),
            }
            out.push(describe_selection(&controller.list_stored().await));
        }
        Command::Refresh => {
            if let Ok(selection) = controller.refresh_stored().await {
                out.push(describe_selection(&selection));
            }
        }
        Command::Dismiss => controller.dismiss_error().await,
        Command::Help => out.push(HELP.to_string()),
        Command::Quit => {}
    }
    if let Some(err) = controller.error().await {
        out.push(format!("error: {err}"));
    }
    out.join("\n")
}

fn spawn_event_log(controller: &SelectionController) {
    tokio::spawn(log_events(controller.subscribe_events()));
}

/// Logs controller events until the controller goes away. Returns how many
/// were logged; events dropped while lagging are skipped.
async fn log_events(mut events: broadcast::Receiver<SelectionEvent>) -> usize {
    let mut logged = 0;
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "event log fell behind");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        match event {
            SelectionEvent::RandomCardChanged(card) => {
                debug!(card_id = %card.id, "event: random card changed")
            }
            SelectionEvent::SelectionChanged(selection) => {
                debug!(cards = selection.len(), "event: selection changed")
            }
            SelectionEvent::SaveFinished(outcome) => debug!(?outcome, "event: save finished"),
            SelectionEvent::Error(message) => debug!(%message, "event: error"),
        }
        logged += 1;
    }
    logged
}

fn describe_card(card: &Card) -> String {
    format!("{} [{}] {}", card.name, card.id, card.image)
}

fn describe_selection(selection: &Selection) -> String {
    let mut out = format!("stored {}/{SELECTION_CAPACITY}", selection.len());
    for (slot, card) in selection.iter().enumerate() {
        out.push_str(&format!("\n  {}. {}", slot + 1, describe_card(card)));
    }
    out
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
