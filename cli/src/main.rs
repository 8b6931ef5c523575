//! # `sentiment-tail`: Follow the Live Sentiment Stream
//!
//! Headless consumer of `lib_sentiment`. It stands where the app's UI would:
//! it owns a connection controller, reads snapshots and optionally drives the
//! widget sink for one focused category.
//!
//! ## Usage
//!
//! ```text
//! sentiment-tail [OPTIONS] stream [--focus <category>] [--auto-reconnect] [--format json|table]
//! sentiment-tail [OPTIONS] replay <file> [--focus <category>] [--records]
//! ```
//!
//! Options are read from `sentiment.conf` (JSON), then from `SENTIMENT_*`
//! environment variables (a `.env` file is honoured) and finally from flags.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures_util::StreamExt;
use serde::Serialize;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;

use lib_sentiment::ingestors::decode_records;
use lib_sentiment::loggers;
use lib_sentiment::model::Trend;
use lib_sentiment::platform::widgets;
use lib_sentiment::{
    Category, CategoryValues, ConnectionController, ConnectionState, HttpSseTransport, SentimentSnapshot,
    SessionFlag, SnapshotPublisher, StreamConfig, StreamTransport, TranscriptTransport,
};

use crate::config::Settings;

#[derive(Parser, Debug)]
#[command(name = "sentiment-tail", about = "Follow the real-time sentiment stream", version)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect to the live SSE endpoint and print every snapshot.
    Stream(StreamArgs),
    /// Feed a captured SSE transcript through the engine offline.
    Replay(ReplayArgs),
}

#[derive(clap::Args, Debug)]
struct StreamArgs {
    /// Category to follow on the widget sink.
    #[arg(long)]
    focus: Option<Category>,

    /// Connect again after a failure or server close.
    #[arg(long)]
    auto_reconnect: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

#[derive(clap::Args, Debug)]
struct ReplayArgs {
    /// File holding a raw SSE response body.
    file: PathBuf,

    #[arg(long)]
    focus: Option<Category>,

    /// Print each decoded record instead of running the full pipeline.
    #[arg(long)]
    records: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Table,
}

/// One printed line per snapshot.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotLine<'a> {
    timestamp: Option<&'a str>,
    updates_applied: u64,
    values: &'a CategoryValues,
    #[serde(skip_serializing_if = "Option::is_none")]
    focus: Option<FocusLine>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FocusLine {
    category: Category,
    value: f64,
    delta: f64,
    trend: Trend,
    history: Vec<f64>,
}

fn snapshot_line<'a>(snapshot: &'a SentimentSnapshot, focus: Option<Category>, history_limit: usize) -> SnapshotLine<'a> {
    SnapshotLine {
        timestamp: snapshot.last_record.as_ref().map(|r| r.timestamp.as_str()),
        updates_applied: snapshot.updates_applied,
        values: &snapshot.values,
        focus: focus.map(|category| FocusLine {
            category,
            value: snapshot.current_value(category),
            delta: snapshot.last_delta(category),
            trend: Trend::of(snapshot.full_history(category)),
            history: snapshot.history(category, history_limit),
        }),
    }
}

fn print_snapshot(
    snapshot: &SentimentSnapshot,
    focus: Option<Category>,
    format: OutputFormat,
    history_limit: usize,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let line = snapshot_line(snapshot, focus, history_limit);
            println!("{}", serde_json::to_string(&line)?);
        }
        OutputFormat::Table => {
            let when = snapshot
                .updated_at
                .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
                .unwrap_or_else(|| "-".to_string());
            let values: Vec<String> = Category::ALL
                .iter()
                .map(|c| format!("{}={:6.2}", c, snapshot.current_value(*c)))
                .collect();
            println!("{} #{:<5} {}", when, snapshot.updates_applied, values.join(" "));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let (settings, notes) = config::resolve(cli.settings.clone());
    let _guard = loggers::init(&settings.logging_options())?;
    for note in notes {
        log::info!("{}", note);
    }

    let stream_config = settings.stream_config();
    stream_config.validate()?;

    match cli.command {
        Command::Stream(args) => run_stream(stream_config, args).await,
        Command::Replay(args) => run_replay(stream_config, args).await,
    }
}

async fn run_stream(config: StreamConfig, args: StreamArgs) -> Result<()> {
    let session = Arc::new(SessionFlag::new(config.has_api_key()));
    let transport = Arc::new(HttpSseTransport::from_config(&config)?);
    let publisher = Arc::new(SnapshotPublisher::from_config(&config, widgets::from_mode(config.widget)));
    let controller = ConnectionController::from_config(&config, transport, Arc::clone(&publisher), session);

    if let Some(category) = args.focus {
        publisher.start_widget(category);
    }

    let mut snapshots = publisher.add_subscriber("sentiment-tail");
    let mut transitions = controller.subscribe_transitions();

    controller.connect();
    if controller.status().attempts == 0 {
        bail!(controller
            .last_error()
            .unwrap_or_else(|| "connection was not started".to_string()));
    }

    let outcome = loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                log::info!("Ctrl-C received, initiating shutdown.");
                break Ok(());
            }
            Some(snapshot) = snapshots.recv() => {
                print_snapshot(&snapshot, publisher.focus(), args.format, config.history_limit)?;
            }
            transition = transitions.recv() => match transition {
                Ok(ConnectionState::Failed(reason)) => {
                    log::warn!("Stream failed: {}", reason);
                }
                Ok(ConnectionState::Disconnected) if args.auto_reconnect => {
                    let delay = controller.reconnect_delay();
                    log::info!("Reconnecting in {:?}", delay);
                    let controller = controller.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        controller.connect();
                    });
                }
                Ok(ConnectionState::Disconnected) => {
                    break match controller.last_error() {
                        Some(reason) => Err(anyhow::anyhow!(reason)),
                        None => Ok(()),
                    };
                }
                Ok(state) => log::info!("Stream state: {:?}", state),
                Err(RecvError::Lagged(skipped)) => log::warn!("Missed {} state transitions", skipped),
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    controller.disconnect();
    publisher.stop_all_widgets();
    log::info!("Shutdown complete.");
    outcome
}

async fn run_replay(config: StreamConfig, args: ReplayArgs) -> Result<()> {
    let transport = Arc::new(TranscriptTransport::new(&args.file));

    if args.records {
        let bytes = transport
            .open()
            .await
            .with_context(|| format!("Opening {}", args.file.display()))?;
        let mut records = Box::pin(decode_records(bytes));
        while let Some(record) = records.next().await {
            println!("{}", serde_json::to_string(&record?)?);
        }
        return Ok(());
    }

    let publisher = Arc::new(SnapshotPublisher::from_config(&config, widgets::from_mode(config.widget)));
    let controller = ConnectionController::from_config(
        &config,
        transport,
        Arc::clone(&publisher),
        Arc::new(SessionFlag::new(true)),
    );
    if let Some(category) = args.focus {
        publisher.start_widget(category);
    }

    let mut status = controller.subscribe_status();
    controller.connect();
    status
        .wait_for(|s| s.epoch > 0 && !s.state.is_active())
        .await
        .context("Controller dropped before the replay finished")?;

    if let Some(reason) = controller.last_error() {
        bail!(reason);
    }

    let snapshot = publisher.snapshot();
    let summary = serde_json::json!({
        "snapshot": snapshot_line(&snapshot, publisher.focus(), config.history_limit),
        "decoder": controller.decoder_stats(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    publisher.stop_all_widgets();
    Ok(())
}
