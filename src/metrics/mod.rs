//! Kernel counter readers, the gauge registry, and the sampling loop.
//!
//! Readers in [`procfs`] and [`cpu`] turn `/proc` text into numbers, the
//! [`registry`] holds the published gauges, and the [`collector`] ties them
//! together on a fixed cadence.

pub mod collector;
pub mod cpu;
pub mod data;
pub mod procfs;
pub mod registry;

// Re-export commonly used items
pub use collector::{LoopState, MetricFamily, Sampler};
pub use cpu::CpuUsageTracker;
pub use data::{CpuSample, Readings};
pub use procfs::{ProcFs, ReadError};
pub use registry::MetricRegistry;
