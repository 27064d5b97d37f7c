//! Readers for the `/proc` text sources.
//!
//! Every reader is split in two: a pure `parse_*` function over the file
//! contents, and a method on [`ProcFs`] that reads the file and hands it to the
//! parser. Malformed lines in multi-line sources are skipped.

use crate::metrics::data::{CpuSample, DiskIo, MemoryUsage, NetworkStats};
use std::fs;
use std::path::PathBuf;

/// The default procfs mount point.
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Why a reader produced no value this cycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    /// The source file could not be opened or read
    #[error("cannot read {path}: {reason}")]
    SourceUnavailable { path: String, reason: String },

    /// The expected field never appeared in the source
    #[error("field `{0}` not found")]
    MissingField(&'static str),

    /// A line that must parse did not
    #[error("malformed `{0}` line")]
    Malformed(&'static str),

    /// The field was present but its value cannot be used
    #[error("invalid value for `{0}`")]
    InvalidValue(&'static str),

    /// No previous CPU sample to compute a delta against
    #[error("no baseline CPU sample yet")]
    NoBaseline,

    /// CPU counters went backwards (reset or reboot)
    #[error("CPU counters decreased since last sample")]
    CounterReset,

    /// No kernel time elapsed between two CPU samples
    #[error("no CPU time elapsed since last sample")]
    NoElapsedTime,
}

impl ReadError {
    /// Expected conditions of the CPU delta that resolve on the next cycle.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NoBaseline | Self::CounterReset | Self::NoElapsedTime
        )
    }
}

/// Handle on a procfs tree.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new(DEFAULT_PROC_ROOT)
    }
}

impl ProcFs {
    /// Create a handle rooted at `root` (usually `/proc`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read(&self, relative: &str) -> Result<String, ReadError> {
        let path = self.root.join(relative);
        fs::read_to_string(&path).map_err(|e| ReadError::SourceUnavailable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Read the aggregate CPU tick counters from `stat`.
    pub fn cpu_sample(&self) -> Result<CpuSample, ReadError> {
        parse_cpu_sample(&self.read("stat")?)
    }

    /// Read memory usage from `meminfo`.
    pub fn memory_usage(&self) -> Result<MemoryUsage, ReadError> {
        parse_meminfo(&self.read("meminfo")?)
    }

    /// Read the context switch counter from `stat`.
    pub fn context_switches(&self) -> Result<u64, ReadError> {
        parse_context_switches(&self.read("stat")?)
    }

    /// Read the number of running processes from `stat`.
    pub fn process_count(&self) -> Result<u64, ReadError> {
        parse_procs_running(&self.read("stat")?)
    }

    /// Read summed sector counts from `diskstats`.
    pub fn disk_io(&self) -> Result<DiskIo, ReadError> {
        Ok(parse_diskstats(&self.read("diskstats")?))
    }

    /// Read summed interface counters from `net/dev`.
    pub fn network_stats(&self) -> Result<NetworkStats, ReadError> {
        Ok(parse_net_dev(&self.read("net/dev")?))
    }
}

/// Parse the aggregate `cpu` line of `/proc/stat`.
///
/// The first eight columns (user through steal) are required. Later columns
/// (guest, guest_nice) are already counted in user and nice and are ignored.
pub fn parse_cpu_sample(content: &str) -> Result<CpuSample, ReadError> {
    let line = content
        .lines()
        .find(|l| l.split_whitespace().next() == Some("cpu"))
        .ok_or(ReadError::MissingField("cpu"))?;

    let values = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|v| v.parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ReadError::Malformed("cpu"))?;

    let [user, nice, system, idle, iowait, irq, softirq, steal] = values[..] else {
        return Err(ReadError::Malformed("cpu"));
    };

    Ok(CpuSample {
        user,
        nice,
        system,
        idle,
        iowait,
        irq,
        softirq,
        steal,
    })
}

/// Find the first `key value` line and parse its value.
fn parse_keyed_counter(content: &str, key: &'static str) -> Result<u64, ReadError> {
    content
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some(k), Some(v)) if k == key => v.parse::<u64>().ok(),
                _ => None,
            }
        })
        .next()
        .ok_or(ReadError::MissingField(key))
}

/// Parse the `ctxt` line of `/proc/stat`.
pub fn parse_context_switches(content: &str) -> Result<u64, ReadError> {
    parse_keyed_counter(content, "ctxt")
}

/// Parse the `procs_running` line of `/proc/stat`.
pub fn parse_procs_running(content: &str) -> Result<u64, ReadError> {
    parse_keyed_counter(content, "procs_running")
}

/// Parse `MemTotal` and `MemAvailable` from `/proc/meminfo`.
pub fn parse_meminfo(content: &str) -> Result<MemoryUsage, ReadError> {
    let mut total = None;
    let mut available = None;

    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let Some(kb) = value
            .split_whitespace()
            .next()
            .and_then(|v| v.parse::<u64>().ok())
        else {
            continue;
        };
        match key.trim() {
            "MemTotal" => total = Some(kb),
            "MemAvailable" => available = Some(kb),
            _ => {}
        }
        if total.is_some() && available.is_some() {
            break;
        }
    }

    let total_kb = total.ok_or(ReadError::MissingField("MemTotal"))?;
    let available_kb = available.ok_or(ReadError::MissingField("MemAvailable"))?;
    if total_kb == 0 {
        return Err(ReadError::InvalidValue("MemTotal"));
    }

    Ok(MemoryUsage {
        total_kb,
        available_kb,
    })
}

/// Sum sectors read (field 6) and written (field 10) over every device line.
pub fn parse_diskstats(content: &str) -> DiskIo {
    content
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 10 {
                return None;
            }
            let read = parts[5].parse::<u64>().ok()?;
            let write = parts[9].parse::<u64>().ok()?;
            Some((read, write))
        })
        .fold(DiskIo::default(), |mut acc, (read, write)| {
            acc.read_sectors = acc.read_sectors.saturating_add(read);
            acc.write_sectors = acc.write_sectors.saturating_add(write);
            acc
        })
}

/// Sum byte, error and collision counters over every interface line.
pub fn parse_net_dev(content: &str) -> NetworkStats {
    content
        .lines()
        .skip(2)
        .filter_map(|line| {
            let (_, counters) = line.split_once(':')?;
            let values = counters
                .split_whitespace()
                .map(|v| v.parse::<u64>())
                .collect::<Result<Vec<_>, _>>()
                .ok()?;
            if values.len() < 16 {
                return None;
            }
            Some(NetworkStats {
                rx_bytes: values[0],
                rx_errors: values[2],
                tx_bytes: values[8],
                tx_errors: values[10],
                collisions: values[13],
            })
        })
        .fold(NetworkStats::default(), |acc, iface| NetworkStats {
            rx_bytes: acc.rx_bytes.saturating_add(iface.rx_bytes),
            tx_bytes: acc.tx_bytes.saturating_add(iface.tx_bytes),
            rx_errors: acc.rx_errors.saturating_add(iface.rx_errors),
            tx_errors: acc.tx_errors.saturating_add(iface.tx_errors),
            collisions: acc.collisions.saturating_add(iface.collisions),
        })
}
