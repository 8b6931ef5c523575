//! # Live Sentiment Stream Test
//!
//! Connects to the real backend via lib_sentiment and prints the first few
//! snapshots. Needs `SENTIMENT_API_KEY`; `SENTIMENT_BASE_URL` overrides the
//! default origin.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use lib_sentiment::platform::{widgets, SessionFlag};
use lib_sentiment::{
    Category, ConnectionController, HttpSseTransport, SnapshotPublisher, StreamConfig, WidgetMode,
};

const SNAPSHOTS_TO_PRINT: usize = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = StreamConfig {
        widget: WidgetMode::Log,
        ..StreamConfig::default()
    };
    if let Ok(key) = env::var("SENTIMENT_API_KEY") {
        config.api_key = key;
    }
    if let Ok(base) = env::var("SENTIMENT_BASE_URL") {
        config.base_url = base;
    }

    let _guard = lib_sentiment::loggers::init(&lib_sentiment::loggers::LoggingOptions::default())?;

    let publisher = Arc::new(SnapshotPublisher::from_config(&config, widgets::from_mode(config.widget)));
    let controller = ConnectionController::from_config(
        &config,
        Arc::new(HttpSseTransport::from_config(&config)?),
        Arc::clone(&publisher),
        Arc::new(SessionFlag::new(config.has_api_key())),
    );
    publisher.start_widget(Category::Calm);

    println!("[*] Connecting to {}", config.endpoint());
    let mut snapshots = publisher.add_subscriber("live-test");
    controller.connect();

    for n in 1..=SNAPSHOTS_TO_PRINT {
        match tokio::time::timeout(Duration::from_secs(120), snapshots.recv()).await {
            Ok(Some(snapshot)) => {
                println!("\n[SNAPSHOT {}]", n);
                println!("{}", serde_json::to_string_pretty(&*snapshot)?);
            }
            Ok(None) => break,
            Err(_) => {
                eprintln!("\n[ERROR] No data within 120s. Status: {:?}", controller.status());
                controller.disconnect();
                std::process::exit(1);
            }
        }
    }

    controller.disconnect();
    publisher.stop_all_widgets();
    println!("\n[INFO] Decoder stats: {:?}", controller.decoder_stats());
    Ok(())
}
