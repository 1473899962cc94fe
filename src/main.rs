//! autoamp — amplifier power automation.
//!
//! Listens to an audio input, turns Denon receivers on when music starts and
//! puts them in standby once things have been quiet for a while.

mod activity;
mod amp;
mod audio;
mod config;
mod error;
mod logging;
mod monitor;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Parser;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use amp::{Actuator, DenonTransport};
use audio::{Capture, SampleReader};
use config::{Cli, Config};
use monitor::Monitor;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::load(Cli::parse()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err:#}");
            return ExitCode::from(2);
        }
    };

    if let Err(err) = logging::init(config.verbose, config.log_dir.as_deref()) {
        eprintln!("Error: {err:#}");
        return ExitCode::from(2);
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let classifier = config.classifier();
    info!(
        amps = ?config.amps,
        backend = %config.backend,
        sample_rate = config.sample_rate,
        window_samples = config.window_samples(),
        threshold = classifier.variance_threshold,
        min_playing_secs = config.min_playing_secs,
        idle_secs = config.idle_secs,
        dry_run = config.dry_run,
        "autoamp starting"
    );

    let transport = Arc::new(DenonTransport::new(
        config.connect_timeout,
        config.command_timeout,
    ));
    let actuator = Actuator::new(
        config.amps.clone(),
        transport,
        Handle::current(),
        config.dry_run,
    );
    let mut monitor = Monitor::new(config.window_samples(), classifier, actuator);

    let (capture, recorder) = Capture::start(
        config.backend,
        config.sample_rate,
        config.alsa_device.as_deref(),
    )?;
    let mut reader = SampleReader::new(capture);

    // Sample reads block, so the loop gets its own thread; actuations are
    // spawned back onto the runtime.
    let (done_tx, done_rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("sampler".into())
        .spawn(move || {
            let _ = done_tx.send(monitor.run(&mut reader));
        })
        .context("failed to spawn sampling thread")?;

    let result = tokio::select! {
        result = done_rx => {
            result.unwrap_or_else(|_| Err(anyhow!("sampling thread exited unexpectedly")))
        }
        signal = shutdown_signal() => {
            signal.map(|name| info!(signal = name, "Shutting down"))
        }
    };

    // Killing the recorder also unblocks the sampling thread's read.
    if let Some(recorder) = recorder {
        match recorder.stop() {
            Ok(status) => info!(%status, "Recorder stopped"),
            Err(e) => warn!("Failed to stop recorder: {}", e),
        }
    }
    result
}

/// Resolves on Ctrl-C, or SIGTERM where there is one.
async fn shutdown_signal() -> anyhow::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term =
            signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for Ctrl-C")?;
                Ok("SIGINT")
            }
            _ = term.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
        Ok("Ctrl-C")
    }
}
