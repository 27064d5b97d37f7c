//! CPU usage from successive `/proc/stat` samples.

use crate::metrics::data::CpuSample;
use crate::metrics::procfs::{ProcFs, ReadError};

/// Computes CPU usage as the busy share of ticks elapsed since the previous
/// sample.
///
/// The tracker owns the previous sample. Every attempted computation replaces
/// it with the new raw counters, so a cycle that cannot produce a value still
/// gives the next cycle a valid baseline.
#[derive(Debug, Default)]
pub struct CpuUsageTracker {
    previous: Option<CpuSample>,
}

impl CpuUsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The sample the next delta will be computed against.
    pub fn previous(&self) -> Option<&CpuSample> {
        self.previous.as_ref()
    }

    /// Feed a new sample and return usage in percent (0.0 to 100.0).
    pub fn update(&mut self, current: CpuSample) -> Result<f64, ReadError> {
        let previous = self.previous.replace(current);
        match previous {
            Some(prev) if !prev.is_zero() => usage_between(&prev, &current),
            _ => Err(ReadError::NoBaseline),
        }
    }

    /// Read `stat` and feed the sample. A read failure leaves the stored
    /// sample untouched.
    pub fn sample(&mut self, procfs: &ProcFs) -> Result<f64, ReadError> {
        let current = procfs.cpu_sample()?;
        self.update(current)
    }
}

/// Usage percentage between two samples of the same counter source.
pub fn usage_between(prev: &CpuSample, current: &CpuSample) -> Result<f64, ReadError> {
    let total = current.total();
    let prev_total = prev.total();
    let idle = current.idle_total();
    let prev_idle = prev.idle_total();

    // iowait may decrease on tickless kernels, which also lands here and
    // drops that cycle
    if total < prev_total || idle < prev_idle {
        return Err(ReadError::CounterReset);
    }

    let totald = total - prev_total;
    let idled = idle - prev_idle;
    if totald == 0 {
        return Err(ReadError::NoElapsedTime);
    }

    // idled can exceed totald only if non-idle counters went backwards
    let busy = totald.saturating_sub(idled);
    Ok(busy as f64 / totald as f64 * 100.0)
}
