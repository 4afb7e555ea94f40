//! Control flags shared between the streaming session and the processing loop.
//!
//! The session is the only writer of commands; the processing loop reads the
//! stop/exit flags every frame and takes pending start requests with a
//! single read-then-clear under the lock.

use serde::Serialize;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// A start command waiting to be picked up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StartRequest {
    /// Playback position to start from, in milliseconds
    pub start_ms: f64,
    /// Script slot the generated actions are routed to
    pub channel: Option<u32>,
}

/// Plain view of the flags, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ControlFlags {
    pub should_stop: bool,
    pub should_exit: bool,
    pub pending_start_ms: Option<f64>,
    pub pending_channel: Option<u32>,
}

/// Mutex-guarded control block with a wake-up for the idle wait.
#[derive(Debug, Default)]
pub struct ControlState {
    flags: Mutex<ControlFlags>,
    changed: Condvar,
}

/// Thread-safe shared control state.
pub type SharedControl = Arc<ControlState>;

/// Create a new shared control block.
pub fn create_shared_control() -> SharedControl {
    Arc::new(ControlState::new())
}

impl ControlState {
    /// Create a control block with all flags cleared.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ControlFlags> {
        // Flags stay consistent even if a holder panicked mid-update.
        self.flags.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Halt the current activation; the session stays up.
    ///
    /// A start that has not been taken yet is discarded with it, so the
    /// last command received always wins.
    pub fn request_stop(&self) {
        let mut flags = self.lock();
        flags.should_stop = true;
        flags.pending_start_ms = None;
        flags.pending_channel = None;
        drop(flags);
        self.changed.notify_all();
    }

    /// Terminal shutdown of both the session and the processing loop.
    pub fn request_exit(&self) {
        let mut flags = self.lock();
        flags.should_stop = true;
        flags.should_exit = true;
        drop(flags);
        self.changed.notify_all();
    }

    /// Queue a start at `start_ms`, replacing any request not yet taken.
    pub fn request_start(&self, start_ms: f64, channel: Option<u32>) {
        let mut flags = self.lock();
        flags.pending_start_ms = Some(start_ms);
        flags.pending_channel = channel;
        drop(flags);
        self.changed.notify_all();
    }

    /// Whether the current activation should end.
    pub fn should_stop(&self) -> bool {
        self.lock().should_stop
    }

    /// Whether both loops should shut down.
    pub fn should_exit(&self) -> bool {
        self.lock().should_exit
    }

    /// Copy of the current flags.
    pub fn snapshot(&self) -> ControlFlags {
        *self.lock()
    }

    /// Take and clear the pending start request.
    ///
    /// Taking a request also clears `should_stop`, so the stop that ended the
    /// previous activation does not cancel the new one. Nothing is taken once
    /// exit has been requested.
    pub fn take_pending_start(&self) -> Option<StartRequest> {
        let mut flags = self.lock();
        Self::take_locked(&mut flags)
    }

    fn take_locked(flags: &mut ControlFlags) -> Option<StartRequest> {
        if flags.should_exit {
            return None;
        }
        let start_ms = flags.pending_start_ms.take()?;
        let channel = flags.pending_channel.take();
        flags.should_stop = false;
        Some(StartRequest { start_ms, channel })
    }

    /// Block up to `timeout` for a start request.
    ///
    /// Returns early with `None` when exit is requested.
    pub fn wait_for_start(&self, timeout: Duration) -> Option<StartRequest> {
        let flags = self.lock();
        let (mut flags, _) = self
            .changed
            .wait_timeout_while(flags, timeout, |f| {
                !f.should_exit && f.pending_start_ms.is_none()
            })
            .unwrap_or_else(|e| e.into_inner());
        Self::take_locked(&mut flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_take_clears_pending() {
        let control = ControlState::new();
        control.request_start(5000.0, Some(1));

        let request = control.take_pending_start().unwrap();
        assert_eq!(request.start_ms, 5000.0);
        assert_eq!(request.channel, Some(1));

        let flags = control.snapshot();
        assert_eq!(flags.pending_start_ms, None);
        assert_eq!(flags.pending_channel, None);
        assert!(control.take_pending_start().is_none());
    }

    #[test]
    fn test_start_after_stop_clears_stop() {
        let control = ControlState::new();
        control.request_stop();
        assert!(control.should_stop());

        control.request_start(0.0, None);
        assert!(control.take_pending_start().is_some());
        assert!(!control.should_stop());
    }

    #[test]
    fn test_stop_discards_untaken_start() {
        let control = ControlState::new();
        control.request_start(0.0, Some(2));
        control.request_stop();

        assert!(control.take_pending_start().is_none());
        assert!(control.should_stop());

        let flags = control.snapshot();
        assert_eq!(flags.pending_start_ms, None);
        assert_eq!(flags.pending_channel, None);
    }

    #[test]
    fn test_exit_is_terminal() {
        let control = ControlState::new();
        control.request_start(1000.0, None);
        control.request_exit();

        assert!(control.should_stop());
        assert!(control.should_exit());
        assert!(control.take_pending_start().is_none());
    }

    #[test]
    fn test_wait_times_out() {
        let control = ControlState::new();
        let started = Instant::now();
        assert!(control.wait_for_start(Duration::from_millis(50)).is_none());
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_wait_wakes_on_start() {
        let control = create_shared_control();
        let remote = control.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.request_start(250.0, None);
        });

        let request = control.wait_for_start(Duration::from_secs(5));
        handle.join().unwrap();
        assert_eq!(request.map(|r| r.start_ms), Some(250.0));
    }

    #[test]
    fn test_wait_wakes_on_exit() {
        let control = create_shared_control();
        let remote = control.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.request_exit();
        });

        let started = Instant::now();
        assert!(control.wait_for_start(Duration::from_secs(5)).is_none());
        assert!(started.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }
}
