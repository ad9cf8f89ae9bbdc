//! # Termination Signals
//!
//! A process-wide shutdown flag, raised by SIGINT/SIGTERM and checked
//! cooperatively by the accept loop and the tick loop. A second signal
//! while the flag is already raised exits the process immediately.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Cloneable shutdown request flag.
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal {
    requested: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Creates a flag that has not been raised.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag.
    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
    }

    /// Returns true once the flag has been raised.
    #[inline]
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Raises the flag and reports whether this request escalates an
    /// earlier one.
    #[must_use]
    pub fn escalate(&self) -> TerminationAction {
        if self.requested.swap(true, Ordering::AcqRel) {
            TerminationAction::ForceExit
        } else {
            TerminationAction::Graceful
        }
    }
}

/// What a termination signal should do to the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminationAction {
    /// First request: let the loops wind down.
    Graceful,
    /// Shutdown already requested: leave without waiting.
    ForceExit,
}

/// Exit status used when a repeated signal cuts shutdown short.
pub const FORCED_EXIT_CODE: i32 = 130;

/// Raises `signal` on the first SIGINT or SIGTERM and exits the process
/// with [`FORCED_EXIT_CODE`] on the next one.
///
/// Runs a single-threaded tokio runtime on a dedicated thread; the rest of
/// the process stays synchronous. The flag may also have been raised by
/// other means, in which case the first signal already forces the exit.
pub fn install_termination_handler(signal: ShutdownSignal) -> io::Result<thread::JoinHandle<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    thread::Builder::new()
        .name("termination-signal".into())
        .spawn(move || loop {
            runtime.block_on(wait_for_termination());
            match signal.escalate() {
                TerminationAction::Graceful => {
                    tracing::info!("termination requested, signal again to force exit");
                }
                TerminationAction::ForceExit => {
                    tracing::warn!("repeated termination signal, exiting now");
                    std::process::exit(FORCED_EXIT_CODE);
                }
            }
        })
}

#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        tracing::warn!(error = %e, "SIGINT handler failed");
                    }
                }
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable, listening for SIGINT only");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "SIGINT handler failed");
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_shared_between_clones() {
        let signal = ShutdownSignal::new();
        let observer = signal.clone();
        assert!(!observer.is_requested());

        signal.request();
        assert!(observer.is_requested());
    }

    #[test]
    fn test_second_request_escalates() {
        let signal = ShutdownSignal::new();
        let observer = signal.clone();

        assert_eq!(signal.escalate(), TerminationAction::Graceful);
        assert!(observer.is_requested());
        assert_eq!(observer.escalate(), TerminationAction::ForceExit);
        assert_eq!(signal.escalate(), TerminationAction::ForceExit);
    }

    #[test]
    fn test_programmatic_request_counts_as_first() {
        let signal = ShutdownSignal::new();
        signal.request();
        assert_eq!(signal.escalate(), TerminationAction::ForceExit);
    }
}
