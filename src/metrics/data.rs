//! Data structures for kernel counter readings.

use serde::{Deserialize, Serialize};

/// Cumulative CPU tick counters from the aggregate `cpu` line of `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CpuSample {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuSample {
    /// Ticks spent idle or waiting on I/O.
    pub fn idle_total(&self) -> u64 {
        self.idle.saturating_add(self.iowait)
    }

    /// Ticks spent doing work.
    pub fn non_idle(&self) -> u64 {
        [
            self.user,
            self.nice,
            self.system,
            self.irq,
            self.softirq,
            self.steal,
        ]
        .iter()
        .fold(0u64, |acc, v| acc.saturating_add(*v))
    }

    /// All ticks.
    pub fn total(&self) -> u64 {
        self.idle_total().saturating_add(self.non_idle())
    }

    /// An all-zero sample carries no history and cannot serve as a baseline.
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// Memory totals from `/proc/meminfo`, in kB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsage {
    /// `MemTotal`
    pub total_kb: u64,
    /// `MemAvailable`
    pub available_kb: u64,
}

impl MemoryUsage {
    /// Used memory as a percentage of total (0.0 to 100.0).
    pub fn percent(&self) -> f64 {
        if self.total_kb == 0 {
            return 0.0;
        }
        let used = self.total_kb.saturating_sub(self.available_kb);
        (used as f64 / self.total_kb as f64) * 100.0
    }
}

/// Sector counts summed across every device in `/proc/diskstats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiskIo {
    pub read_sectors: u64,
    pub write_sectors: u64,
}

/// Interface counters summed across every interface in `/proc/net/dev`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkStats {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub collisions: u64,
}

/// One reading of every metric family; families that failed are `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Readings {
    /// Timestamp when the readings were taken (Unix timestamp in milliseconds)
    pub timestamp: u64,
    /// CPU usage percentage (0.0 to 100.0)
    pub cpu_usage_percent: Option<f64>,
    /// Memory usage percentage (0.0 to 100.0)
    pub memory_usage_percent: Option<f64>,
    /// Disk sectors read and written
    pub disk_io: Option<DiskIo>,
    /// Network byte, error and collision totals
    pub network: Option<NetworkStats>,
    /// Processes currently running
    pub process_count: Option<u64>,
    /// Context switches since boot
    pub context_switches: Option<u64>,
}

impl Readings {
    /// Create empty readings stamped with the current time.
    pub fn new() -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis().max(0) as u64,
            ..Default::default()
        }
    }
}
