//! The sampling loop: reads enabled counters and publishes them as gauges.

use crate::config::{ConfigController, MetricToggles, SamplingConfig};
use crate::metrics::cpu::CpuUsageTracker;
use crate::metrics::data::Readings;
use crate::metrics::procfs::{ProcFs, ReadError};
use crate::metrics::registry::{names, MetricRegistry};
use crate::signals::ControlFlags;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A group of gauges fed by one reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricFamily {
    Cpu,
    Memory,
    DiskIo,
    NetworkStats,
    ProcessCount,
    ContextSwitches,
}

impl MetricFamily {
    pub const ALL: [MetricFamily; 6] = [
        MetricFamily::Cpu,
        MetricFamily::Memory,
        MetricFamily::DiskIo,
        MetricFamily::NetworkStats,
        MetricFamily::ProcessCount,
        MetricFamily::ContextSwitches,
    ];

    /// Name used in the config file.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::DiskIo => "disk_io",
            Self::NetworkStats => "network_stats",
            Self::ProcessCount => "process_count",
            Self::ContextSwitches => "context_switches",
        }
    }

    pub fn is_enabled(&self, toggles: &MetricToggles) -> bool {
        match self {
            Self::Cpu => toggles.cpu,
            Self::Memory => toggles.memory,
            Self::DiskIo => toggles.disk_io,
            Self::NetworkStats => toggles.network_stats,
            Self::ProcessCount => toggles.process_count,
            Self::ContextSwitches => toggles.context_switches,
        }
    }
}

impl fmt::Display for MetricFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read every family in `toggles`, collecting failures instead of stopping.
pub fn take_readings(
    procfs: &ProcFs,
    cpu: &mut CpuUsageTracker,
    toggles: &MetricToggles,
) -> (Readings, Vec<(MetricFamily, ReadError)>) {
    let mut readings = Readings::new();
    let mut failures = Vec::new();

    for family in MetricFamily::ALL {
        if !family.is_enabled(toggles) {
            continue;
        }
        let outcome = match family {
            MetricFamily::Cpu => cpu
                .sample(procfs)
                .map(|v| readings.cpu_usage_percent = Some(v)),
            MetricFamily::Memory => procfs
                .memory_usage()
                .map(|m| readings.memory_usage_percent = Some(m.percent())),
            MetricFamily::DiskIo => procfs.disk_io().map(|d| readings.disk_io = Some(d)),
            MetricFamily::NetworkStats => {
                procfs.network_stats().map(|n| readings.network = Some(n))
            }
            MetricFamily::ProcessCount => procfs
                .process_count()
                .map(|p| readings.process_count = Some(p)),
            MetricFamily::ContextSwitches => procfs
                .context_switches()
                .map(|c| readings.context_switches = Some(c)),
        };
        if let Err(e) = outcome {
            failures.push((family, e));
        }
    }

    (readings, failures)
}

/// Flatten readings into `(gauge name, value)` pairs. Missing readings
/// produce no pairs, leaving the previous gauge value in place.
pub fn gauge_updates(readings: &Readings) -> Vec<(&'static str, f64)> {
    let mut updates = Vec::new();

    if let Some(cpu) = readings.cpu_usage_percent {
        updates.push((names::CPU_USAGE, cpu));
    }
    if let Some(memory) = readings.memory_usage_percent {
        updates.push((names::MEMORY_USAGE, memory));
    }
    if let Some(disk) = readings.disk_io {
        updates.push((names::DISK_IO_READS, disk.read_sectors as f64));
        updates.push((names::DISK_IO_WRITES, disk.write_sectors as f64));
    }
    if let Some(net) = readings.network {
        updates.push((names::NETWORK_RX_BYTES, net.rx_bytes as f64));
        updates.push((names::NETWORK_TX_BYTES, net.tx_bytes as f64));
        updates.push((names::NETWORK_RX_ERRORS, net.rx_errors as f64));
        updates.push((names::NETWORK_TX_ERRORS, net.tx_errors as f64));
        updates.push((names::NETWORK_COLLISIONS, net.collisions as f64));
    }
    if let Some(count) = readings.process_count {
        updates.push((names::PROCESS_COUNT, count as f64));
    }
    if let Some(ctxt) = readings.context_switches {
        updates.push((names::CONTEXT_SWITCHES, ctxt as f64));
    }

    updates
}

/// Lifecycle of the sampling loop. `Stopping` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopping,
}

/// What one sampling cycle did.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// A reload was requested this cycle
    pub reload_requested: bool,
    /// The reload was requested but rejected
    pub reload_failed: bool,
    /// Gauges that received a new value
    pub published: Vec<&'static str>,
    /// Families that produced no value
    pub failed: Vec<(MetricFamily, ReadError)>,
}

/// Drives the readers on the configured interval and publishes their values.
pub struct Sampler {
    procfs: ProcFs,
    cpu: CpuUsageTracker,
    registry: Arc<MetricRegistry>,
    config: ConfigController,
    flags: Arc<ControlFlags>,
    state: LoopState,
}

impl Sampler {
    pub fn new(
        procfs: ProcFs,
        registry: Arc<MetricRegistry>,
        config: ConfigController,
        flags: Arc<ControlFlags>,
    ) -> Self {
        Self {
            procfs,
            cpu: CpuUsageTracker::new(),
            registry,
            config,
            flags,
            state: LoopState::Running,
        }
    }

    pub fn config(&self) -> &SamplingConfig {
        self.config.active()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// One cycle without the sleep: apply a pending reload, read the enabled
    /// families, then publish every successful value in one locked batch.
    pub fn run_once(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        if self.flags.take_reload() {
            report.reload_requested = true;
            if let Err(e) = self.config.reload().map(|_| ()) {
                report.reload_failed = true;
                warn!(
                    path = %self.config.path().display(),
                    error = %e,
                    "Reload rejected, keeping previous configuration"
                );
            }
        }

        let toggles = self.config.active().metrics;
        let (readings, failures) = take_readings(&self.procfs, &mut self.cpu, &toggles);

        for (family, error) in &failures {
            if error.is_transient() {
                debug!(metric = %family, %error, "No value this cycle");
            } else {
                warn!(metric = %family, %error, "Failed to read metric");
            }
        }

        let updates = gauge_updates(&readings);
        report.published = self.registry.update(|batch| {
            updates
                .iter()
                .filter_map(|(name, value)| match batch.set(name, *value) {
                    Ok(()) => Some(*name),
                    Err(e) => {
                        warn!(gauge = name, error = %e, "Failed to publish gauge");
                        None
                    }
                })
                .collect()
        });
        report.failed = failures;

        debug!(
            published = report.published.len(),
            failed = report.failed.len(),
            "Sampling cycle complete"
        );
        report
    }

    /// Run until a stop is requested. The stop flag is checked after each
    /// cycle's sleep, so shutdown takes at most one interval.
    pub async fn run(&mut self) {
        info!(
            interval = self.config.active().interval,
            "Sampling loop started"
        );

        while self.state == LoopState::Running {
            self.run_once();
            tokio::time::sleep(self.config.active().interval_duration()).await;

            if self.flags.stop_requested() {
                self.state = LoopState::Stopping;
            }
        }

        info!("Sampling loop stopped");
    }
}
