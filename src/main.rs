//! procgauge - host telemetry agent binary
//!
//! Samples `/proc` counters and serves them as Prometheus gauges until it
//! receives `SIGTERM` or `SIGINT`.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use procgauge::metrics::collector::take_readings;
use procgauge::{
    spawn_signal_listeners, start_web_server, ConfigController, ControlFlags, CpuUsageTracker,
    MetricRegistry, MetricToggles, ProcFs, Readings, Sampler, WebConfig, DEFAULT_WEB_PORT,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "procgauge")]
#[command(about = "Host telemetry agent exposing /proc counters as Prometheus gauges")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(args_conflicts_with_subcommands = true, subcommand_negates_reqs = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the JSON sampling configuration (re-read on SIGHUP)
    #[arg(required = true)]
    config: Option<PathBuf>,

    /// Exposition server bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Exposition server port
    #[arg(short, long, default_value_t = DEFAULT_WEB_PORT)]
    port: u16,

    /// Root of the proc filesystem
    #[arg(long, global = true, default_value = procgauge::metrics::procfs::DEFAULT_PROC_ROOT)]
    proc_root: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Take one reading of every metric and exit
    Snapshot(SnapshotArgs),
}

#[derive(Args)]
struct SnapshotArgs {
    /// Output format: json or pretty
    #[arg(short, long, default_value = "pretty")]
    format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    match (&cli.command, &cli.config) {
        (Some(Commands::Snapshot(args)), _) => snapshot_command(&cli, args).await,
        (None, Some(config)) => serve_command(&cli, config.clone()).await,
        // clap rejects a missing config path before we get here
        (None, None) => anyhow::bail!("a configuration file path is required"),
    }
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

async fn serve_command(cli: &Cli, config_path: PathBuf) -> anyhow::Result<()> {
    info!("Starting procgauge {}", env!("CARGO_PKG_VERSION"));

    let registry =
        Arc::new(MetricRegistry::with_default_gauges().context("failed to define gauges")?);

    let web_config = WebConfig::new(&cli.host, cli.port);
    let (addr, mut server) = start_web_server(&web_config, Arc::clone(&registry))
        .await
        .context("failed to start exposition server")?;

    let flags = Arc::new(ControlFlags::new());
    let listeners = spawn_signal_listeners(Arc::clone(&flags))
        .context("failed to install signal handlers")?;

    let config = ConfigController::load_initial(config_path);
    info!("Configuration:");
    info!("  - Config file: {}", config.path().display());
    info!("  - Proc root: {}", cli.proc_root.display());
    info!("  - Listening on: {}", addr);
    info!("  - Interval: {}s", config.active().interval);

    let mut sampler = Sampler::new(
        ProcFs::new(cli.proc_root.clone()),
        registry,
        config,
        flags,
    );

    let outcome = tokio::select! {
        _ = sampler.run() => Ok(()),
        result = &mut server => match result {
            Ok(Ok(())) => Err(anyhow::anyhow!("exposition server exited unexpectedly")),
            Ok(Err(e)) => Err(e.into()),
            Err(e) => Err(anyhow::anyhow!("exposition server task failed: {}", e)),
        },
    };

    server.abort();
    for listener in listeners {
        listener.abort();
    }

    match &outcome {
        Ok(()) => info!("procgauge stopped"),
        Err(e) => error!("procgauge aborted: {:#}", e),
    }
    outcome
}

async fn snapshot_command(cli: &Cli, args: &SnapshotArgs) -> anyhow::Result<()> {
    let procfs = ProcFs::new(cli.proc_root.clone());

    // CPU usage needs a baseline sample one interval earlier
    let mut cpu = CpuUsageTracker::new();
    if let Err(e) = cpu.sample(&procfs) {
        warn!("Failed to take baseline CPU sample: {}", e);
    }
    tokio::time::sleep(Duration::from_secs(1)).await;

    let (readings, failures) = take_readings(&procfs, &mut cpu, &MetricToggles::default());
    for (family, e) in &failures {
        warn!("No {} reading: {}", family, e);
    }

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&readings)?),
        "pretty" => print_pretty_readings(&readings),
        other => anyhow::bail!("Unsupported format: {}. Use 'json' or 'pretty'", other),
    }

    Ok(())
}

fn print_pretty_readings(readings: &Readings) {
    fn show<T: std::fmt::Display>(value: Option<T>) -> String {
        value.map_or_else(|| "unavailable".to_string(), |v| v.to_string())
    }

    println!(
        "System Snapshot ({})",
        chrono::DateTime::from_timestamp_millis(readings.timestamp as i64)
            .unwrap_or_default()
            .format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("==========================================");
    println!(
        "  CPU usage:        {}",
        show(readings.cpu_usage_percent.map(|v| format!("{:.1}%", v)))
    );
    println!(
        "  Memory usage:     {}",
        show(readings.memory_usage_percent.map(|v| format!("{:.1}%", v)))
    );
    if let Some(disk) = readings.disk_io {
        println!("  Disk sectors:     {} read, {} written", disk.read_sectors, disk.write_sectors);
    } else {
        println!("  Disk sectors:     unavailable");
    }
    if let Some(net) = readings.network {
        println!("  Network bytes:    {} rx, {} tx", net.rx_bytes, net.tx_bytes);
        println!(
            "  Network errors:   {} rx, {} tx, {} collisions",
            net.rx_errors, net.tx_errors, net.collisions
        );
    } else {
        println!("  Network:          unavailable");
    }
    println!("  Running procs:    {}", show(readings.process_count));
    println!("  Context switches: {}", show(readings.context_switches));
}
