//! Cooperative cancellation for the runner's document fan-out.
//!
//! Each spawned document task checks a shared flag before starting its work;
//! no in-flight unit is forcibly aborted, so partial artifact writes are
//! possible and are overwritten on the next run.

use tokio::sync::watch;

/// Receiver half, cloned into every spawned document task.
#[derive(Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    /// A signal that never fires; used when nothing can cancel a run (tests,
    /// library callers that don't wire up a signal handler).
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self(rx)
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }
}

/// Sender half, held by whatever installs the signal handler (the CLI's
/// `ctrl_c` listener).
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn new() -> (Self, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (Self(tx), CancelSignal(rx))
    }

    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_signal_stays_uncancelled() {
        assert!(!CancelSignal::never().is_cancelled());
    }

    #[test]
    fn handle_cancel_is_observed_by_clones() {
        let (handle, signal) = CancelHandle::new();
        let cloned = signal.clone();
        assert!(!signal.is_cancelled());
        handle.cancel();
        assert!(signal.is_cancelled());
        assert!(cloned.is_cancelled());
    }
}
