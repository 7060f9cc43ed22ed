use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;

/// Source of "now" in the storefront's locale.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock pinned to a configured time zone
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.tz).fixed_offset()
    }
}

/// Clock frozen at a single instant, for tests
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}
