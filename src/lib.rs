//! # procgauge - host telemetry agent
//!
//! Samples kernel counters from `/proc` on a fixed cadence and republishes
//! them as Prometheus gauges.
//!
//! ## Features
//!
//! - **Counters**: CPU usage, memory usage, disk sectors, network totals,
//!   running processes, context switches
//! - **Exposition**: `/metrics` in the Prometheus text format
//! - **Runtime control**: `SIGHUP` reloads the JSON config, `SIGTERM`/`SIGINT`
//!   stop the loop after the current cycle
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use procgauge::{ConfigController, ControlFlags, MetricRegistry, ProcFs, Sampler, WebConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(MetricRegistry::with_default_gauges()?);
//!     procgauge::start_web_server(&WebConfig::default(), Arc::clone(&registry)).await?;
//!
//!     let config = ConfigController::load_initial("procgauge.json");
//!     let flags = Arc::new(ControlFlags::new());
//!     Sampler::new(ProcFs::default(), registry, config, flags).run().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod signals;
pub mod web;

// Re-export public API
pub use config::{ConfigController, MetricToggles, SamplingConfig};
pub use error::{Result, SystemError};
pub use metrics::{
    collector::{CycleReport, LoopState, MetricFamily, Sampler},
    cpu::CpuUsageTracker,
    data::{CpuSample, DiskIo, MemoryUsage, NetworkStats, Readings},
    procfs::{ProcFs, ReadError},
    registry::MetricRegistry,
};
pub use signals::{spawn_signal_listeners, ControlFlags};
pub use web::{start_web_server, WebConfig};

/// The default exposition port
pub const DEFAULT_WEB_PORT: u16 = 8000;
