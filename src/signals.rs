//! Reload and stop requests delivered by signals.
//!
//! Listeners only flip atomic flags. The sampling loop polls them once per
//! iteration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Edge-triggered flags shared between signal listeners and the sampling loop.
#[derive(Debug, Default)]
pub struct ControlFlags {
    reload: AtomicBool,
    stop: AtomicBool,
}

impl ControlFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_reload(&self) {
        self.reload.store(true, Ordering::SeqCst);
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Clear the reload flag, returning whether it was set.
    pub fn take_reload(&self) -> bool {
        self.reload.swap(false, Ordering::SeqCst)
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// Install listeners: `SIGHUP` requests a reload, `SIGTERM` and `SIGINT`
/// request a stop. A second stop signal while the first is pending exits the
/// process immediately.
pub fn spawn_signal_listeners(flags: Arc<ControlFlags>) -> std::io::Result<Vec<JoinHandle<()>>> {
    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    let reload_flags = Arc::clone(&flags);
    let reload = tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            reload_flags.request_reload();
            info!("SIGHUP received, reload scheduled");
        }
    });

    let stop = tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                Some(()) = terminate.recv() => "SIGTERM",
                Some(()) = interrupt.recv() => "SIGINT",
                else => break,
            };
            if flags.stop_requested() {
                warn!("{} received again, exiting without waiting for the cycle", name);
                std::process::exit(1);
            }
            info!("{} received, stopping after this cycle", name);
            flags.request_stop();
        }
    });

    Ok(vec![reload, stop])
}
