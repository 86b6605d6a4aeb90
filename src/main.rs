use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use env_logger::Env;
use log::{debug, error, info, trace, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use playcore::engine::{DataSourceType, SimulatedEngineFactory};
use playcore::global::{self, IoStatComplete};
use playcore::message::Message;
use playcore::player::{MessageReceiver, PlayerHandle, PlayerOptions};
use playcore::utils::{self, Config};

/// playcore - drive a simulated playback session from the command line
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Media URL to play
    #[arg(value_name = "URL")]
    url: String,

    /// Latency class of the source
    #[arg(long, value_enum, default_value = "vod")]
    source_type: SourceTypeArg,

    /// Seek to this position (ms) once prepared
    #[arg(long, value_name = "MS")]
    seek: Option<i64>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Read configuration from this file instead of the default locations
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Demuxer option
    #[arg(short = 'f', long = "format-option", value_name = "KEY=VALUE")]
    format_options: Vec<String>,

    /// Decoder option
    #[arg(short = 'c', long = "codec-option", value_name = "KEY=VALUE")]
    codec_options: Vec<String>,

    /// Scaler option
    #[arg(short = 's', long = "sws-option", value_name = "KEY=VALUE")]
    sws_options: Vec<String>,

    /// Print the final media metadata as JSON
    #[arg(long)]
    json_meta: bool,

    /// Override the simulated media length
    #[arg(long, value_name = "MS")]
    duration_ms: Option<i64>,

    /// Log every queued message
    #[arg(long)]
    log_report: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SourceTypeArg {
    Vod,
    LowDelayLive,
    HighDelayLive,
}

impl From<SourceTypeArg> for DataSourceType {
    fn from(arg: SourceTypeArg) -> Self {
        match arg {
            SourceTypeArg::Vod => DataSourceType::Vod,
            SourceTypeArg::LowDelayLive => DataSourceType::LowDelayLive,
            SourceTypeArg::HighDelayLive => DataSourceType::HighDelayLive,
        }
    }
}

#[derive(Debug)]
enum Outcome {
    Completed,
    Failed(i32),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    // Initialize logging
    let log_level = if args.debug { "debug" } else { config.logging.level.as_str() };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    info!("Starting playcore v{}", env!("CARGO_PKG_VERSION"));

    global::global_init();
    global::global_set_log_report(args.log_report || config.logging.report);
    register_io_hooks()?;

    let options = build_options(&config.player, &args)?;
    let mut profile = config.engine.clone();
    if let Some(duration_ms) = args.duration_ms {
        profile.duration_ms = duration_ms;
    }

    let (done_tx, mut done_rx) = oneshot::channel();
    let seek = args.seek;
    let player = PlayerHandle::builder(Arc::new(SimulatedEngineFactory::new(profile)))
        .with_options(options)
        .with_message_loop(move |receiver| run_message_loop(receiver, seek, done_tx))
        .build();

    player.set_data_source(&args.url, args.source_type.into())?;
    player.prepare_async()?;

    let mut progress = tokio::time::interval(Duration::from_secs(1));
    let outcome = loop {
        tokio::select! {
            outcome = &mut done_rx => break outcome.ok(),
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted");
                break None;
            }
            _ = progress.tick() => {
                info!(
                    "{} {} / {}",
                    player.state(),
                    utils::format_millis(player.current_position()),
                    utils::format_millis(player.duration())
                );
            }
        }
    };

    if args.json_meta {
        match player.meta() {
            Some(meta) => println!("{}", serde_json::to_string_pretty(&meta)?),
            None => warn!("No metadata available"),
        }
    }

    // Shutdown joins the engine and message loop threads
    tokio::task::spawn_blocking(move || player.dec_ref())
        .await
        .context("Player teardown panicked")?;
    global::global_uninit();

    match outcome {
        Some(Outcome::Failed(code)) => bail!("Playback failed with code {}", code),
        Some(Outcome::Completed) => info!("Playback completed"),
        None => info!("Playback stopped"),
    }
    Ok(())
}

fn register_io_hooks() -> Result<()> {
    global::io_stat_register(|url: &str, kind: i32, bytes: i64| {
        trace!("io read {} type={} bytes={}", url, kind, bytes);
    })?;
    global::io_stat_complete_register(|stat: &IoStatComplete| {
        info!(
            "io complete {}: {} of {} bytes in {} ms ({} ms of media)",
            stat.url, stat.read_bytes, stat.total_size, stat.elapsed_ms, stat.total_duration_ms
        );
    })?;
    Ok(())
}

fn build_options(defaults: &PlayerOptions, args: &Args) -> Result<PlayerOptions> {
    let mut options = defaults.clone();
    for raw in &args.format_options {
        let (key, value) = split_option(raw)?;
        options.set_format_option(key, value);
    }
    for raw in &args.codec_options {
        let (key, value) = split_option(raw)?;
        options.set_codec_option(key, value);
    }
    for raw in &args.sws_options {
        let (key, value) = split_option(raw)?;
        options.set_sws_option(key, value);
    }
    Ok(options)
}

fn split_option(raw: &str) -> Result<(&str, &str)> {
    utils::parse_key_value(raw).with_context(|| format!("Option '{}' is not KEY=VALUE", raw))
}

fn run_message_loop(receiver: MessageReceiver, seek: Option<i64>, done: oneshot::Sender<Outcome>) {
    let mut done = Some(done);
    let mut finish = |outcome: Outcome| {
        if let Some(done) = done.take() {
            let _ = done.send(outcome);
        }
    };

    for msg in receiver.iter() {
        match msg {
            Message::Prepared => {
                let Some(player) = receiver.player() else { break };
                info!("Prepared: {} ms", player.duration());
                if let Some(codec) = player.video_codec_info() {
                    info!("Video: {}", codec);
                }
                if let Err(e) = player.start() {
                    error!("Failed to start: {}", e);
                }
                if let Some(position) = seek {
                    if let Err(e) = player.seek_to(position) {
                        error!("Failed to seek: {}", e);
                    }
                }
            }
            Message::VideoSizeChanged { width, height } => info!("Video size {}x{}", width, height),
            Message::SeekComplete { position_ms } => {
                info!("Seek complete at {}", utils::format_millis(position_ms))
            }
            Message::PlaybackCompleted => finish(Outcome::Completed),
            Message::Error { code } => {
                error!("Playback error {}", code);
                finish(Outcome::Failed(code));
            }
            other => debug!("{:?}", other),
        }
    }
    debug!("Message loop exiting");
}
