//! Injected time source.
//!
//! Nothing in the parser reads the system clock directly. `now()`,
//! `forever()` and unit conversion all ask the [`Clock`] held by the
//! grammar, so tests can pin "now" to a fixed instant.

use chrono::{DateTime, SubsecRound, Utc};

pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the OS clock through `chrono::Utc::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always answers with the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Read the clock once, dropping sub-second precision.
pub(crate) fn now_seconds(clock: &dyn Clock) -> DateTime<Utc> {
    clock.now().trunc_subsecs(0)
}
