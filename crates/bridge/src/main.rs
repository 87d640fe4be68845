//! dsi2lsl - stream a Wearable Sensing DSI headset to Lab Streaming Layer

use anyhow::{Context, Result};
use bridge::config::{self, BridgeConfig, Settings};
use bridge::options::{Options, ParseWarning, Resolution};
use bridge::{lifecycle, outlet, usage};
use common::{ShutdownToken, setup_logging, spawn_ctrl_c_listener};
use std::process::ExitCode;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("dsi2lsl");

    let Resolution { options, warnings } = Options::resolve(args.get(1..).unwrap_or_default());

    if options.help {
        usage::print_usage(program);
        return ExitCode::SUCCESS;
    }

    match run(program, options, warnings).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(program: &str, options: Options, warnings: Vec<ParseWarning>) -> Result<ExitCode> {
    // Handle --save-config early (before loading config)
    if options.save_config {
        let path = BridgeConfig::default_path();
        BridgeConfig::default()
            .save(&path)
            .context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    // Load configuration first (to get log level from config if not specified)
    let config_path = options.config_path.as_deref().filter(|p| !p.is_empty());
    let (file_config, config_source) = match config_path {
        Some(path) => config::load_config(path).context("Failed to load configuration")?,
        None => BridgeConfig::load_or_default(),
    };
    let settings = Settings::merge(&options, &file_config)?;

    setup_logging(&settings.log_level).context("Failed to setup logging")?;

    info!("dsi2lsl v{}", env!("CARGO_PKG_VERSION"));
    config_source.log();
    for warning in &warnings {
        warn!("{}", warning);
    }

    let shutdown = ShutdownToken::new();
    let listener = spawn_ctrl_c_listener(shutdown.clone());

    // The headset handle never leaves this worker thread
    let worker_token = shutdown.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let interface = lifecycle::load_interface(settings.library.as_deref())?;
        let mut factory = outlet::default_factory();
        lifecycle::run(&interface, factory.as_mut(), &settings, &worker_token)
    })
    .await
    .context("Acquisition worker panicked")?;

    shutdown.request();
    match listener.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Signal listener failed: {}", e),
        Err(e) => warn!("Signal listener task failed: {}", e),
    }

    match outcome {
        Ok(summary) => {
            info!(
                "Stream {} (source {}) closed after {} samples on {} channels",
                summary.stream_name,
                summary.source_id,
                summary.samples_forwarded,
                summary.channel_count
            );
            info!("{} will exit now...", program);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("{}", e);
            Ok(ExitCode::from(e.exit_code()))
        }
    }
}
