//! Process-wide set of named gauges.
//!
//! Gauges live in a `prometheus::Registry`. One mutex guards every write and
//! every read of their values, so a scrape never observes half of an update
//! batch (for example three of the five network counters from a new cycle and
//! two from the previous one).

use crate::error::{Result, SystemError};
use prometheus::{Encoder, Gauge, Registry, TextEncoder};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Names of the gauges the agent publishes.
pub mod names {
    pub const CPU_USAGE: &str = "cpu_usage_percentage";
    pub const MEMORY_USAGE: &str = "memory_usage_percentage";
    pub const DISK_IO_READS: &str = "disk_io_reads";
    pub const DISK_IO_WRITES: &str = "disk_io_writes";
    pub const NETWORK_RX_BYTES: &str = "network_rx_bytes";
    pub const NETWORK_TX_BYTES: &str = "network_tx_bytes";
    pub const NETWORK_RX_ERRORS: &str = "network_rx_errors";
    pub const NETWORK_TX_ERRORS: &str = "network_tx_errors";
    pub const NETWORK_COLLISIONS: &str = "network_collisions";
    pub const PROCESS_COUNT: &str = "process_count";
    pub const CONTEXT_SWITCHES: &str = "context_switches";
}

const DEFAULT_GAUGES: [(&str, &str); 11] = [
    (names::CPU_USAGE, "CPU usage percentage"),
    (names::MEMORY_USAGE, "Memory usage percentage"),
    (names::DISK_IO_READS, "Number of disk read sectors"),
    (names::DISK_IO_WRITES, "Number of disk write sectors"),
    (names::NETWORK_RX_BYTES, "Bytes received over the network"),
    (names::NETWORK_TX_BYTES, "Bytes transmitted over the network"),
    (names::NETWORK_RX_ERRORS, "Network receive errors"),
    (names::NETWORK_TX_ERRORS, "Network transmit errors"),
    (names::NETWORK_COLLISIONS, "Network collisions"),
    (names::PROCESS_COUNT, "Number of running processes"),
    (names::CONTEXT_SWITCHES, "Number of context switches"),
];

/// Current value of every gauge, keyed by name.
pub type MetricSnapshot = BTreeMap<String, f64>;

/// A named gauge with its help text.
#[derive(Debug, Clone)]
pub struct GaugeMetric {
    name: String,
    help: String,
    gauge: Gauge,
}

impl GaugeMetric {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn value(&self) -> f64 {
        self.gauge.get()
    }
}

struct Inner {
    registry: Registry,
    gauges: BTreeMap<String, GaugeMetric>,
}

/// Registry of gauges shared between the sampling loop and the HTTP server.
pub struct MetricRegistry {
    inner: Mutex<Inner>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                registry: Registry::new(),
                gauges: BTreeMap::new(),
            }),
        }
    }

    /// Create a registry with every gauge the agent publishes.
    pub fn with_default_gauges() -> Result<Self> {
        let registry = Self::new();
        for (name, help) in DEFAULT_GAUGES {
            registry.define(name, help)?;
        }
        Ok(registry)
    }

    // Values are plain floats, so a panic mid-batch leaves nothing to repair.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Define a gauge. Defining the same name twice is an error.
    pub fn define(&self, name: &str, help: &str) -> Result<()> {
        let mut inner = self.lock();
        if inner.gauges.contains_key(name) {
            return Err(SystemError::registry_error(format!(
                "gauge `{}` is already defined",
                name
            )));
        }

        let gauge = Gauge::new(name, help)?;
        inner.registry.register(Box::new(gauge.clone()))?;
        inner.gauges.insert(
            name.to_string(),
            GaugeMetric {
                name: name.to_string(),
                help: help.to_string(),
                gauge,
            },
        );
        Ok(())
    }

    /// Overwrite one gauge.
    pub fn set(&self, name: &str, value: f64) -> Result<()> {
        self.update(|batch| batch.set(name, value))
    }

    /// Run `f` with exclusive access, so every value it sets becomes visible
    /// to readers at once.
    pub fn update<R>(&self, f: impl FnOnce(&mut MetricBatch<'_>) -> R) -> R {
        let inner = self.lock();
        let mut batch = MetricBatch {
            gauges: &inner.gauges,
        };
        f(&mut batch)
    }

    /// Current value of one gauge.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.lock().gauges.get(name).map(GaugeMetric::value)
    }

    /// Definitions of every gauge, in name order.
    pub fn gauges(&self) -> Vec<GaugeMetric> {
        self.lock().gauges.values().cloned().collect()
    }

    /// Copy every gauge value.
    pub fn snapshot(&self) -> MetricSnapshot {
        self.lock()
            .gauges
            .iter()
            .map(|(name, metric)| (name.clone(), metric.value()))
            .collect()
    }

    /// Render every gauge in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String> {
        let families = self.lock().registry.gather();

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| SystemError::system_error(e.to_string()))
    }
}

/// Exclusive write access to the registry's gauges, obtained via
/// [`MetricRegistry::update`].
pub struct MetricBatch<'a> {
    gauges: &'a BTreeMap<String, GaugeMetric>,
}

impl MetricBatch<'_> {
    pub fn set(&mut self, name: &str, value: f64) -> Result<()> {
        let metric = self
            .gauges
            .get(name)
            .ok_or_else(|| SystemError::registry_error(format!("gauge `{}` is not defined", name)))?;
        metric.gauge.set(value);
        Ok(())
    }
}
