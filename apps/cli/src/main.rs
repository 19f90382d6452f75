use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_client_settings, HttpGateway, NoticeLevel, Operation, SessionController, SessionError,
    SessionEvent, SessionState,
};
use shared::{
    domain::HistoryId,
    domain::Tone,
    protocol::{HistoryEntry, RephraseResult},
};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rephrase", about = "Rephrase text and browse past rephrasings")]
struct Args {
    /// Base URL of the rephrasing service.
    #[arg(long)]
    server_url: Option<String>,
    /// Upper bound in seconds for each remote call.
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Settings file (defaults to ./client.toml).
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rephrase the given text (or stdin when no text is given).
    Rephrase {
        #[arg(long, short, default_value_t = Tone::Conversational)]
        tone: Tone,
        text: Vec<String>,
    },
    /// List stored rephrasings, newest first.
    History,
    /// Delete a stored rephrasing by id.
    Delete { id: HistoryId },
    /// Line-oriented session; this is the default.
    Interactive,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_client_settings(args.config.as_deref());
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    if let Some(secs) = args.timeout_secs.filter(|secs| *secs > 0) {
        settings.request_timeout = Duration::from_secs(secs);
    }

    let gateway = HttpGateway::new(&settings.server_url, settings.request_timeout)?;
    debug!(
        server_url = %gateway.server_url(),
        timeout_secs = settings.request_timeout.as_secs(),
        "session ready"
    );
    let session = Arc::new(SessionController::with_config(
        Arc::new(gateway),
        settings.session_config(),
    ));

    match args.command.unwrap_or(Command::Interactive) {
        Command::Rephrase { tone, text } => {
            let text = if text.is_empty() {
                read_stdin().await?
            } else {
                text.join(" ")
            };
            session.set_input(text).await;
            session.set_tone(tone).await;
            let outcome = session.submit().await;
            let state = session.snapshot().await;
            if let Some(output) = applied_output(&outcome, &state) {
                println!("{output}");
                eprintln!("{}", stats_line(&state));
            }
            outcome?;
        }
        Command::History => {
            session.refresh_history().await?;
            print_history(&session.snapshot().await.history);
        }
        Command::Delete { id } => {
            session.delete_history_item(id).await?;
            println!("deleted {id}");
        }
        Command::Interactive => run_interactive(session).await?,
    }
    Ok(())
}

async fn read_stdin() -> Result<String> {
    let mut text = String::new();
    tokio::io::stdin()
        .read_to_string(&mut text)
        .await
        .context("failed to read text from stdin")?;
    Ok(text)
}

async fn run_interactive(session: Arc<SessionController>) -> Result<()> {
    let mut events = session.subscribe_events();
    let notices = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let SessionEvent::Notice { level, message } = event {
                match level {
                    NoticeLevel::Success => eprintln!("ok: {message}"),
                    NoticeLevel::Error(_) => eprintln!("error: {message}"),
                }
            }
        }
    });

    // Failures are already reported as notices.
    let _ = session.refresh_history().await;
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim_end();
        match line.split_once(' ').unwrap_or((line, "")) {
            (":quit" | ":q", _) => break,
            (":help", _) => print_help(),
            (":show", _) => print_state(&session.snapshot().await),
            (":history", _) => {
                let _ = session.refresh_history().await;
                print_history(&session.snapshot().await.history);
            }
            (":clear", _) => {
                let _ = session.clear().await;
            }
            (":tone", name) => match name.parse::<Tone>() {
                Ok(tone) => session.set_tone(tone).await,
                Err(err) => eprintln!("error: {err}"),
            },
            (":load", target) => match resolve_entry(&session, target).await {
                Ok(id) => {
                    if session.load_history_item(id).await.is_ok() {
                        print_state(&session.snapshot().await);
                    }
                }
                Err(err) => eprintln!("error: {err}"),
            },
            (":delete", target) => match resolve_entry(&session, target).await {
                Ok(id) => {
                    let _ = session.delete_history_item(id).await;
                }
                Err(err) => eprintln!("error: {err}"),
            },
            (command, _) if command.starts_with(':') => {
                eprintln!("error: unknown command {command}; try :help")
            }
            _ => {
                session.set_input(line).await;
                let outcome = session.submit().await;
                let state = session.snapshot().await;
                if let Some(output) = applied_output(&outcome, &state) {
                    println!("{output}");
                    println!("  [{}]", stats_line(&state));
                }
            }
        }
    }

    notices.abort();
    Ok(())
}

/// Accepts a 1-based position in the listed history or a full id.
async fn resolve_entry(session: &SessionController, target: &str) -> Result<HistoryId> {
    let target = target.trim();
    if let Ok(position) = target.parse::<usize>() {
        let history = session.snapshot().await.history;
        return match position.checked_sub(1).and_then(|idx| history.get(idx)) {
            Some(entry) => Ok(entry.id),
            None => bail!("no history item at position {position}"),
        };
    }
    target
        .parse::<HistoryId>()
        .with_context(|| format!("'{target}' is neither a position nor a history id"))
}

/// The rephrased text to show for a finished submission. A failure while
/// saving or reloading history comes after the output was applied, so the
/// output is still shown.
fn applied_output<'a>(
    outcome: &Result<RephraseResult, SessionError>,
    state: &'a SessionState,
) -> Option<&'a str> {
    match outcome {
        Ok(_) => Some(&state.output_text),
        Err(
            SessionError::Service { operation, .. } | SessionError::Timeout { operation, .. },
        ) if matches!(operation, Operation::SaveHistory | Operation::LoadHistory) => {
            Some(&state.output_text)
        }
        Err(_) => None,
    }
}

fn stats_line(state: &SessionState) -> String {
    let input = state.input_stats();
    format!(
        "{} tone | input {} words / {} chars | output {} words / {} chars",
        state.tone, input.words, input.chars, state.stats.words, state.stats.chars
    )
}

fn print_state(state: &SessionState) {
    println!("input:  {}", state.input_text);
    println!("output: {}", state.output_text);
    println!("  [{}]", stats_line(state));
}

fn print_history(history: &[HistoryEntry]) {
    if history.is_empty() {
        println!("no history yet");
        return;
    }
    for (idx, entry) in history.iter().enumerate() {
        println!(
            "{:>3}. [{}] {} ({})",
            idx + 1,
            entry.tone,
            entry.rephrased_text,
            entry.timestamp.format("%Y-%m-%d %H:%M")
        );
        println!("     from: {}", entry.original_text);
        println!("     id:   {}", entry.id);
    }
}

fn print_help() {
    println!("Type text to rephrase it. Commands:");
    println!("  :tone <formal|conversational|academic|creative>");
    println!("  :history            list stored rephrasings");
    println!("  :load <n|id>        restore a stored rephrasing");
    println!("  :delete <n|id>      delete a stored rephrasing");
    println!("  :show  :clear  :help  :quit");
}
