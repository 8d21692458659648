//! Stream watcher binary.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sclip_media::{ClipCutter, FfprobeClient, StreamRecorder};
use sclip_storage::StorageClient;
use sclip_store::{EventStore, SupabaseStore};
use sclip_watcher::{ClipFinder, ClipperBot, GeminiClient, StreamWatcher, WatcherConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("sclip=info".parse().unwrap()))
        .init();

    info!("Starting sclip-watcher");

    let config = match WatcherConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("Watcher config: {:?}", config);

    let store = match SupabaseStore::from_env() {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Failed to create event store: {}", e);
            std::process::exit(1);
        }
    };

    let gemini = match GeminiClient::new() {
        Ok(g) => Arc::new(g),
        Err(e) => {
            error!("Failed to create Gemini client: {}", e);
            std::process::exit(1);
        }
    };

    let storage = match StorageClient::from_env().await {
        Ok(s) => Some(s),
        Err(e) => {
            warn!("Clip storage not configured ({}); keeping clips local", e);
            None
        }
    };

    let streamer_name = match resolve_streamer_name(&config, store.as_ref()).await {
        Ok(name) => name,
        Err(e) => {
            error!("Failed to resolve streamer name: {}", e);
            std::process::exit(1);
        }
    };

    // Ctrl-c flips the cancellation channel; libraries only ever observe
    // the channel.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        let _ = cancel_tx.send(true);
    });

    let recorder = StreamRecorder::new();
    let segments = recorder.record(
        &config.stream_url,
        &config.output_dir(),
        config.segment_secs,
        cancel_rx.clone(),
    );

    let probe = Arc::new(FfprobeClient::new());
    let cutter = Arc::new(
        ClipCutter::new(probe.clone(), config.clips_dir.clone()).with_cancel(cancel_rx.clone()),
    );
    let finder = ClipFinder::new(gemini.clone(), store.clone(), config.stream_id);

    let watcher = StreamWatcher::new(
        gemini,
        probe,
        cutter,
        store.clone(),
        finder,
        config.stream_id,
        streamer_name,
        config.buf_start_secs,
        config.buf_end_secs,
    );
    let results = watcher.watch(segments, cancel_rx);

    let bot = ClipperBot::new(store, storage, config.stream_id);
    match bot.start(results).await {
        Ok(clips) => info!("Watch session complete: {} clips", clips.len()),
        Err(e) => {
            error!("Watch session failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Prefer the configured name; otherwise look the streamer up in the store.
async fn resolve_streamer_name(
    config: &WatcherConfig,
    store: &dyn EventStore,
) -> Result<String, Box<dyn std::error::Error>> {
    if let Some(name) = &config.streamer_name {
        return Ok(name.clone());
    }
    let streamer_id = config
        .streamer_id
        .ok_or("neither STREAMER_NAME nor STREAMER_ID is set")?;
    Ok(store.get_streamer(streamer_id).await?.name)
}
