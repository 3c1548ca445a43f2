//! 设备运行时间与一次性的墙钟偏移

use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Monotonic millisecond clock since node start
///
/// Truncated to `u32` like the sample timestamps it feeds, so it wraps after ~49.7 days.
#[derive(Debug, Clone, Copy)]
pub struct Uptime {
    start: Instant,
}

impl Uptime {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Full-width uptime in milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Uptime in milliseconds as carried in sample records
    pub fn now_ms(&self) -> u32 {
        self.elapsed_ms() as u32
    }
}

impl Default for Uptime {
    fn default() -> Self {
        Self::start()
    }
}

/// Clock Offset Service
///
/// Called once at startup; the result is `wall_clock_ms - uptime_ms` at the
/// moment of synchronisation.
pub trait ClockOffsetSource: Send + Sync {
    fn offset_ms(&self, uptime: &Uptime) -> u64;
}

/// Offset from the host's (NTP-disciplined) wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClockOffset;

impl ClockOffsetSource for SystemClockOffset {
    fn offset_ms(&self, uptime: &Uptime) -> u64 {
        let wall_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        wall_ms.saturating_sub(uptime.elapsed_ms())
    }
}

/// Preconfigured offset (bench setups, tests)
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedClockOffset(pub u64);

impl ClockOffsetSource for FixedClockOffset {
    fn offset_ms(&self, _uptime: &Uptime) -> u64 {
        self.0
    }
}
