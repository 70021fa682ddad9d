use clap::Parser;
use correction_relay::adapters::{PassthroughProducer, TcpFeedConnector, TtyBackend};
use correction_relay::core::bringup::BringUpPlan;
use correction_relay::utils::error::RelayError;
use correction_relay::utils::monitor::ProcessMonitor;
use correction_relay::utils::{logger, validation::Validate};
use correction_relay::{CliConfig, RelayConfig, Result, ShutdownSignal, StreamRelay};
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = CliConfig::parse();

    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting correction-relay");

    let config = match cli.resolve().and_then(|config| config.validate().map(|()| config)) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            return ExitCode::FAILURE;
        }
    };
    if cli.verbose {
        tracing::debug!("Relay config: {:?}", config);
    }

    if cli.dry_run {
        print_dry_run(&config);
        return ExitCode::SUCCESS;
    }

    let mut monitor = ProcessMonitor::new(cli.monitor);
    if monitor.is_enabled() {
        tracing::info!("🔍 System monitoring enabled");
    }

    match run(config, &mut monitor).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(
                "❌ Relay failed to start: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
            ExitCode::FAILURE
        }
    }
}

async fn run(config: RelayConfig, monitor: &mut ProcessMonitor) -> Result<()> {
    let mut producer = PassthroughProducer::new(&config.producer);
    if let Some(geoid) = &config.producer.geoid_file {
        producer.load_geoid(geoid)?;
    }

    // Startup blocks on device opens and bring-up pacing.
    let relay = tokio::task::spawn_blocking(move || {
        StreamRelay::start(
            &config,
            producer,
            Arc::new(TtyBackend::new()),
            Arc::new(TcpFeedConnector::default()),
        )
    })
    .await
    .map_err(|e| RelayError::ReactorError {
        message: format!("startup task failed: {}", e),
    })??;

    let signal = ShutdownSignal::install()?;
    monitor.log_stats("Relay running");
    println!("✅ Correction relay running. Press Ctrl-C to stop.");

    signal.wait().await;

    let stats = tokio::task::spawn_blocking(move || relay.shutdown())
        .await
        .map_err(|e| RelayError::ReactorError {
            message: format!("shutdown task failed: {}", e),
        })?;
    tracing::debug!("Final byte counters: {:?}", stats);
    monitor.log_final_stats();
    Ok(())
}

fn print_dry_run(config: &RelayConfig) {
    println!("🔍 Dry run: configuration is valid");
    for line in config.summary_lines() {
        println!("  {}", line);
    }

    if config.receiver.configure {
        println!("Bring-up commands for {}:", config.receiver.path);
        for command in BringUpPlan::from_config(config).commands() {
            println!("  {}", command.escape_debug());
        }
    } else {
        println!("Bring-up disabled");
    }
}
