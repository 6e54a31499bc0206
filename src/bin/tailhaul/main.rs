// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use std::error::Error;
use std::process::ExitCode;
use tokio::select;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tower::BoxError;
use tracing::metadata::LevelFilter;
use tracing::{error, info, warn};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

use tailhaul::harvest::Harvester;
use tailhaul::init::args::{Arguments, LogFormatArg};
use tailhaul::init::config::Config;
use tailhaul::init::plugins;

fn main() -> ExitCode {
    let opt = Arguments::parse();

    let _guard = match setup_logging(&opt.log_format) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ERROR: failed to setup logging: {}", e);
            return ExitCode::from(1);
        }
    };

    let config = match Config::from_file(&opt.config) {
        Ok(config) => config,
        Err(e) => {
            error!(path = ?opt.config, error = %e, "Failed to load configuration.");
            return ExitCode::from(1);
        }
    };

    match run_agent(config) {
        Ok(_) => {}
        Err(e) => {
            error!(error = e, "Failed to run agent.");
            return ExitCode::from(1);
        }
    }

    ExitCode::SUCCESS
}

#[tokio::main]
async fn run_agent(config: Config) -> Result<(), Box<dyn Error + Send + Sync>> {
    let filter = plugins::build_filter(&config.filter)?;
    let output_factory = plugins::build_output_factory(&config.output)?;

    let mut harvester = Harvester::new(config.harvest_config(), output_factory, filter)?;
    harvester.start()?;

    let cancel_token = CancellationToken::new();
    let mut harvest_task = tokio::spawn(harvester.run(cancel_token.clone()));

    select! {
        _ = signal_wait() => {
            info!("Shutdown signal received.");
            cancel_token.cancel();
        },
        res = &mut harvest_task => {
            warn!("Unexpected early exit of harvester.");
            res??;
            return Ok(());
        },
    }

    harvest_task.await??;
    info!("Registry persisted, exiting.");
    Ok(())
}

type LoggerGuard = tracing_appender::non_blocking::WorkerGuard;

fn setup_logging(log_format: &LogFormatArg) -> Result<LoggerGuard, BoxError> {
    LogTracer::init()?;

    let (non_blocking_writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;

    if *log_format == LogFormatArg::Json {
        let app_name = format!("{}-{}", env!("CARGO_PKG_NAME"), get_version());
        let bunyan_formatting_layer = BunyanFormattingLayer::new(app_name, non_blocking_writer);

        let subscriber = Registry::default()
            .with(filter)
            .with(JsonStorageLayer)
            .with(bunyan_formatting_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        use std::io;
        use std::io::IsTerminal;

        // Skip color codes when not in a terminal
        let use_ansi = io::stdout().is_terminal();

        let stdout_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_target(false)
            .with_level(true)
            .with_ansi(use_ansi)
            .compact();

        let subscriber = Registry::default().with(filter).with(stdout_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(guard)
}

fn get_version() -> String {
    // Set during CI
    let version_build = option_env!("BUILD_SHORT_SHA").unwrap_or("dev");

    format!("{}-{}", env!("CARGO_PKG_VERSION"), version_build)
}

/// Resolves on the first hangup, interrupt, terminate or quit signal
async fn signal_wait() {
    let (mut sig_hup, mut sig_int, mut sig_term, mut sig_quit) = match (
        signal(SignalKind::hangup()),
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
        signal(SignalKind::quit()),
    ) {
        (Ok(hup), Ok(int), Ok(term), Ok(quit)) => (hup, int, term, quit),
        _ => {
            error!("Failed to install signal handlers, shutting down.");
            return;
        }
    };

    select! {
        _ = sig_hup.recv() => {},
        _ = sig_int.recv() => {},
        _ = sig_term.recv() => {},
        _ = sig_quit.recv() => {},
    }
}
