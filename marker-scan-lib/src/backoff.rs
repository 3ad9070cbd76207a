//! Global pause on timeouts.
//!
//! [`Backoff`] owns the shared [`RateLimiter`] and the process-wide pause
//! signal. Every permit a worker uses comes from [`Backoff::acquire`], and
//! every timeout is reported through [`Backoff::signal_pause`]; nothing else
//! touches the pacing or pause state.
//!
//! Each permit remembers the pause epoch it was issued under. A timeout on a
//! request issued before the latest pause started is already covered by that
//! pause, so concurrent timeouts collapse into a single cooldown.

use crate::limiter::RateLimiter;
use crate::types::ScanConfig;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, trace, warn};

/// Snapshot of the pause signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PauseState {
    /// Number of pauses started so far
    epoch: u64,
    /// Whether a pause is in effect right now
    paused: bool,
}

/// Authorization for one outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permit {
    epoch: u64,
}

impl Permit {
    /// Pause epoch this permit was issued under.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Rate and backoff controller shared by all scan workers.
#[derive(Debug)]
pub struct Backoff {
    limiter: RateLimiter,
    cooldown: Duration,
    state: watch::Sender<PauseState>,
}

impl Backoff {
    /// Create a controller around `limiter` with the given cooldown.
    pub fn new(limiter: RateLimiter, cooldown: Duration) -> Self {
        let (state, _) = watch::channel(PauseState::default());
        Self {
            limiter,
            cooldown,
            state,
        }
    }

    /// Create a controller from the pacing and pause settings in `config`.
    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(RateLimiter::from_config(config), config.pause_duration)
    }

    /// The shared rate limiter.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Cooldown applied on every pause.
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Whether a pause is in effect right now.
    pub fn is_paused(&self) -> bool {
        self.state.borrow().paused
    }

    /// Number of pauses started so far.
    pub fn pause_cycles(&self) -> u64 {
        self.state.borrow().epoch
    }

    /// Wait until no pause is in effect.
    pub async fn wait_until_clear(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|state| !state.paused).await;
    }

    /// Wait for a permit from the rate limiter, honouring any pause.
    ///
    /// A permit the limiter grants while a pause is in effect is discarded and
    /// the caller goes back to waiting for the pause to clear.
    pub async fn acquire(&self) -> Permit {
        loop {
            self.wait_until_clear().await;
            self.limiter.acquire().await;

            let state = *self.state.borrow();
            if !state.paused {
                return Permit { epoch: state.epoch };
            }
            trace!("discarding permit granted during a pause");
        }
    }

    /// Report a timeout observed on a request made with `permit`.
    ///
    /// The first report for the current epoch starts a pause: it holds every
    /// new permit back for the cooldown, resets the limiter and clears the
    /// signal, then returns `true`. Any other report waits for the pause in
    /// effect (if any) to clear and returns `false`.
    pub async fn signal_pause(&self, permit: &Permit) -> bool {
        let mut leader = false;
        self.state.send_if_modified(|state| {
            if state.epoch == permit.epoch && !state.paused {
                state.epoch += 1;
                state.paused = true;
                leader = true;
                true
            } else {
                false
            }
        });

        if !leader {
            self.wait_until_clear().await;
            return false;
        }

        warn!(
            cooldown_secs = self.cooldown.as_secs_f64(),
            "Pausing all requests due to timeout error"
        );
        tokio::time::sleep(self.cooldown).await;
        self.limiter.reset();
        self.state.send_modify(|state| state.paused = false);
        info!("Resuming requests after pause");

        true
    }
}
