//! Liveness supervision: turns the time since the last accepted frame into a
//! fail-safe decision.
//!
//! The clock unit is chosen by the owner. Host channels count control cycles,
//! the unit counts microseconds.

/// Observable state of a [`Watchdog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    /// Not evaluated yet. Nothing may be transmitted in this state.
    Idle,
    /// The link is considered alive.
    Running,
    /// No frame was accepted within the timeout; outputs are held safe.
    Expired,
}

/// Edge reported by [`Watchdog::evaluate`] and [`Watchdog::feed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogEvent {
    None,
    /// `Running → Expired`. Reported once per trip.
    Expired,
    /// `Expired → Running` on an accepted frame.
    Recovered,
}

#[derive(Debug, Clone)]
pub struct Watchdog {
    timeout: u64,
    last_valid: u64,
    now: u64,
    running: bool,
    expired: bool,
}

impl Watchdog {
    pub fn new(timeout: u64) -> Self {
        Self {
            timeout,
            last_valid: 0,
            now: 0,
            running: false,
            expired: false,
        }
    }

    /// Starts the clock at `now` without waiting for a frame. Used by owners
    /// whose clock does not start at zero.
    pub fn arm(&mut self, now: u64) {
        self.now = now;
        self.last_valid = now;
        self.running = true;
        self.expired = false;
    }

    /// Advances the clock to `now` and evaluates the timeout.
    pub fn evaluate(&mut self, now: u64) -> WatchdogEvent {
        self.now = now;
        self.running = true;
        if !self.expired && self.elapsed() > self.timeout {
            self.expired = true;
            return WatchdogEvent::Expired;
        }
        WatchdogEvent::None
    }

    /// Records an accepted frame at the current clock value.
    pub fn feed(&mut self) -> WatchdogEvent {
        self.last_valid = self.now;
        if self.expired {
            self.expired = false;
            return WatchdogEvent::Recovered;
        }
        WatchdogEvent::None
    }

    pub fn state(&self) -> WatchdogState {
        match (self.running, self.expired) {
            (false, _) => WatchdogState::Idle,
            (true, false) => WatchdogState::Running,
            (true, true) => WatchdogState::Expired,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Whether [`evaluate`](Self::evaluate) has run at least once.
    pub fn has_run(&self) -> bool {
        self.running
    }

    /// Clock units since the last accepted frame.
    pub fn elapsed(&self) -> u64 {
        self.now.saturating_sub(self.last_valid)
    }

    pub fn timeout(&self) -> u64 {
        self.timeout
    }

    pub fn now(&self) -> u64 {
        self.now
    }
}
