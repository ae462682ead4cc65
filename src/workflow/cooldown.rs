//! Refresh cooldown
//!
//! Enforces a minimum time between unforced refreshes. The window is
//! claimed before any network work starts, so overlapping refreshes cannot
//! both pass the check.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// A claimed cooldown window; hand it back with [`RefreshCooldown::release`]
/// if the refresh fails
#[derive(Debug)]
#[must_use]
pub struct CooldownLease {
    generation: u64,
    previous: Option<Instant>,
}

#[derive(Default)]
struct Window {
    started: Option<Instant>,
    /// Bumped on every claim
    generation: u64,
}

pub struct RefreshCooldown {
    /// Minimum time between refreshes
    cooldown_duration: Duration,
    window: Arc<RwLock<Window>>,
}

impl RefreshCooldown {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown_duration: cooldown,
            window: Arc::new(RwLock::new(Window::default())),
        }
    }

    pub fn from_secs(cooldown_seconds: u64) -> Self {
        Self::new(Duration::from_secs(cooldown_seconds))
    }

    /// Claim the window, or return the time left in the current one
    pub async fn try_arm(&self) -> Result<CooldownLease, Duration> {
        let mut window = self.window.write().await;
        if let Some(started) = window.started {
            let elapsed = started.elapsed();
            if elapsed < self.cooldown_duration {
                return Err(self.cooldown_duration - elapsed);
            }
        }
        Ok(self.claim(&mut window))
    }

    /// Claim the window regardless of the time left
    pub async fn arm(&self) -> CooldownLease {
        let mut window = self.window.write().await;
        self.claim(&mut window)
    }

    fn claim(&self, window: &mut Window) -> CooldownLease {
        window.generation += 1;
        let previous = window.started.replace(Instant::now());
        tracing::debug!(
            cooldown_seconds = self.cooldown_duration.as_secs(),
            "Refresh cooldown armed"
        );
        CooldownLease {
            generation: window.generation,
            previous,
        }
    }

    /// Undo a claim after a failed refresh, unless a later claim replaced it
    pub async fn release(&self, lease: CooldownLease) {
        let mut window = self.window.write().await;
        if window.generation == lease.generation {
            window.started = lease.previous;
        }
    }
}

/// Whole seconds, rounded up so a pending wait never reads as zero
pub fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}
