use std::io::{self, Read};
use std::path::PathBuf;
use std::time::Duration;

use canvas::batch::{Batch, BatchAction};
use canvas::doc::ObjectKind;
use clap::{Args, Parser, Subcommand};
use client::{BoardSession, BridgeHandle, ClientConfig, ClientError, ConnectionStatus};
use serde_json::{Map, Value, json};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("config error: {0}")]
    Config(#[from] client::config::ConfigError),
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("relay did not create the note")]
    NotCreated,
}

#[derive(Parser, Debug)]
#[command(name = "sketchroom", about = "Sketchroom board client")]
struct Cli {
    /// Relay websocket endpoint.
    #[arg(long, env = "SKETCHROOM_URL")]
    url: Option<String>,

    /// Display name shown to other users.
    #[arg(long, env = "SKETCHROOM_USER")]
    user: Option<String>,

    /// Seconds to wait for the relay before giving up.
    #[arg(long, default_value_t = 10)]
    connect_timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a JSON line whenever the board, roster, or cursors change.
    Watch(WatchArgs),
    /// Print the board's objects as a JSON array.
    Dump(BoardArg),
    /// Drop a sticky note on the board.
    Sticky(StickyArgs),
    /// Apply an action batch read from a JSON file.
    Batch(BatchArgs),
}

#[derive(Args, Debug)]
struct BoardArg {
    board_id: String,
}

#[derive(Args, Debug)]
struct WatchArgs {
    board_id: String,

    /// Stop after this many seconds. Runs until Ctrl-C otherwise.
    #[arg(long)]
    seconds: Option<u64>,
}

#[derive(Args, Debug)]
struct StickyArgs {
    board_id: String,

    #[arg(long, default_value = "")]
    text: String,

    #[arg(long, default_value_t = 0.0)]
    x: f64,

    #[arg(long, default_value_t = 0.0)]
    y: f64,

    #[arg(long)]
    color: Option<String>,
}

#[derive(Args, Debug)]
struct BatchArgs {
    board_id: String,

    #[arg(default_value = "-", help = "Batch file path, or - for stdin")]
    input: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = client_config(&cli, ClientConfig::from_env()?);
    let connect_timeout = Duration::from_secs(cli.connect_timeout);

    match cli.command {
        Command::Watch(args) => {
            let (handle, task) = open(config, &args.board_id, connect_timeout).await?;
            watch(&handle, args.seconds.map(Duration::from_secs)).await?;
            close(handle, task).await
        }
        Command::Dump(args) => {
            let (handle, task) = open(config, &args.board_id, connect_timeout).await?;
            let objects = handle.inspect(|session| serde_json::to_value(session.engine.doc.snapshot())).await??;
            print_json(&objects)?;
            close(handle, task).await
        }
        Command::Sticky(args) => {
            let (handle, task) = open(config, &args.board_id, connect_timeout).await?;
            let report = handle.apply_batch(sticky_batch(&args)).await?;
            let id = report.resolved.get(STICKY_TEMP_ID).cloned().ok_or(CliError::NotCreated)?;
            print_json(&json!({ "id": id }))?;
            close(handle, task).await
        }
        Command::Batch(args) => {
            let batch = read_batch(&args.input)?;
            let (handle, task) = open(config, &args.board_id, connect_timeout).await?;
            let report = handle.apply_batch(batch).await?;
            print_json(&json!({ "resolved": report.resolved, "skipped": report.skipped }))?;
            close(handle, task).await
        }
    }
}

/// Flags win over the environment-derived config.
fn client_config(cli: &Cli, mut config: ClientConfig) -> ClientConfig {
    if let Some(url) = &cli.url {
        url.trim_end_matches('/').clone_into(&mut config.url);
    }
    if let Some(user) = cli.user.as_ref().filter(|name| !name.trim().is_empty()) {
        config.user_name = Some(user.clone());
    }
    config
}

// =============================================================================
// SESSION
// =============================================================================

/// Connect and wait until the relay has answered the join.
async fn open(
    config: ClientConfig,
    board_id: &str,
    connect_timeout: Duration,
) -> Result<(BridgeHandle, JoinHandle<Result<(), ClientError>>), CliError> {
    let (handle, task) = client::spawn(config, board_id, None);
    tokio::time::timeout(connect_timeout, handle.wait_for_status(ConnectionStatus::Connected))
        .await
        .map_err(|_| CliError::Timeout("connection"))??;

    // The role frame follows the snapshot, so a known role means the board is loaded.
    tokio::time::timeout(connect_timeout, async {
        loop {
            if handle.inspect(|session| session.role.is_some()).await? {
                return Ok::<(), ClientError>(());
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    })
    .await
    .map_err(|_| CliError::Timeout("board snapshot"))??;

    info!(%board_id, "cli: board loaded");
    Ok((handle, task))
}

async fn close(handle: BridgeHandle, task: JoinHandle<Result<(), ClientError>>) -> Result<(), CliError> {
    handle.leave()?;
    match task.await {
        Ok(result) => result.map_err(CliError::from),
        Err(e) => {
            debug!(error = %e, "cli: driver task aborted");
            Ok(())
        }
    }
}

// =============================================================================
// COMMANDS
// =============================================================================

async fn watch(handle: &BridgeHandle, limit: Option<Duration>) -> Result<(), CliError> {
    let mut actions = handle.subscribe();
    let deadline = limit.map(|limit| tokio::time::Instant::now() + limit);
    let mut last = handle.inspect(summarize).await?;
    print_json(&last)?;

    loop {
        let stop = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            () = stop => return Ok(()),
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    debug!(error = %e, "cli: ctrl-c handler unavailable");
                }
                return Ok(());
            }
            action = actions.recv() => {
                if let Err(tokio::sync::broadcast::error::RecvError::Closed) = action {
                    return Err(ClientError::Closed.into());
                }
                let summary = handle.inspect(summarize).await?;
                if summary != last {
                    print_json(&summary)?;
                    last = summary;
                }
            }
        }
    }
}

fn summarize(session: &BoardSession) -> Value {
    let users: Vec<&str> = session.roster.users().iter().map(|peer| peer.user_name.as_str()).collect();
    let cursors: Map<String, Value> = session
        .cursors
        .iter()
        .map(|cursor| (cursor.user_name.clone(), json!([cursor.x.round(), cursor.y.round()])))
        .collect();
    json!({
        "role": session.role,
        "objects": session.engine.doc.len(),
        "users": users,
        "cursors": cursors,
    })
}

const STICKY_TEMP_ID: &str = "note";

fn sticky_batch(args: &StickyArgs) -> Batch {
    let mut props = Map::new();
    props.insert("x".into(), json!(args.x));
    props.insert("y".into(), json!(args.y));
    props.insert("text".into(), json!(args.text));
    if let Some(color) = &args.color {
        props.insert("color".into(), json!(color));
    }
    Batch {
        actions: vec![BatchAction::Create {
            object_type: ObjectKind::Sticky,
            temp_id: Some(STICKY_TEMP_ID.to_owned()),
            props,
        }],
        fit_to_view: false,
    }
}

fn read_batch(input: &PathBuf) -> Result<Batch, CliError> {
    let path = input.display().to_string();
    let raw = if path == "-" {
        let mut raw = String::new();
        io::stdin().read_to_string(&mut raw).map_err(|source| CliError::Read { path, source })?;
        raw
    } else {
        std::fs::read_to_string(input).map_err(|source| CliError::Read { path, source })?
    };
    Ok(serde_json::from_str(&raw)?)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
