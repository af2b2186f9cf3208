//! Time source abstraction for supporting both real-time and frozen time.
//!
//! This module provides a trait-based abstraction that allows the application
//! to use either the real system clock or a frozen, manually advanced clock
//! for deterministic testing. The scheduler reasons entirely about local
//! wall-clock time, so every consumer goes through this module rather than
//! calling `Local::now()` directly.

use chrono::{DateTime, Local};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::Duration as StdDuration;

/// Global time source instance, defaults to RealTimeSource
static TIME_SOURCE: OnceCell<Arc<dyn TimeSource>> = OnceCell::new();

/// Trait for abstracting time operations
pub trait TimeSource: Send + Sync {
    /// Get the current local time
    fn now(&self) -> DateTime<Local>;

    /// Sleep for the specified duration (or simulate it)
    fn sleep(&self, duration: StdDuration);

    /// Check if this is a simulated time source
    fn is_simulated(&self) -> bool;
}

/// Real-time implementation that uses the actual system clock
pub struct RealTimeSource;

impl TimeSource for RealTimeSource {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn sleep(&self, duration: StdDuration) {
        std::thread::sleep(duration);
    }

    fn is_simulated(&self) -> bool {
        false
    }
}

/// Frozen time source for deterministic tests.
///
/// The clock only moves when a test advances it explicitly (or through
/// `sleep`, which jumps the clock instead of blocking).
#[cfg(any(test, feature = "testing-support"))]
pub struct FrozenTimeSource {
    current: std::sync::Mutex<DateTime<Local>>,
}

#[cfg(any(test, feature = "testing-support"))]
impl FrozenTimeSource {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            current: std::sync::Mutex::new(start),
        }
    }

    /// Jump the clock to an absolute instant.
    pub fn set(&self, instant: DateTime<Local>) {
        *self.current.lock().unwrap() = instant;
    }

    /// Jump the clock to a naive local wall-clock instant.
    pub fn set_naive(&self, instant: chrono::NaiveDateTime) {
        use chrono::TimeZone;
        let resolved = Local
            .from_local_datetime(&instant)
            .earliest()
            .expect("invalid local wall-clock instant");
        self.set(resolved);
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: StdDuration) {
        let mut guard = self.current.lock().unwrap();
        *guard += chrono::Duration::from_std(duration).unwrap_or_default();
    }
}

#[cfg(any(test, feature = "testing-support"))]
impl TimeSource for FrozenTimeSource {
    fn now(&self) -> DateTime<Local> {
        *self.current.lock().unwrap()
    }

    fn sleep(&self, duration: StdDuration) {
        self.advance(duration);
        // Minimal real sleep to let other threads run
        std::thread::sleep(StdDuration::from_millis(1));
    }

    fn is_simulated(&self) -> bool {
        true
    }
}

/// Initialize the global time source (call once at startup)
pub fn init_time_source(source: Arc<dyn TimeSource>) {
    TIME_SOURCE.set(source).ok();
}

/// Check if the time source has been initialized
pub fn is_initialized() -> bool {
    TIME_SOURCE.get().is_some()
}

/// Get the current local time from the global time source
pub fn now() -> DateTime<Local> {
    TIME_SOURCE.get_or_init(|| Arc::new(RealTimeSource)).now()
}

/// Sleep for the specified duration using the global time source
pub fn sleep(duration: StdDuration) {
    TIME_SOURCE
        .get_or_init(|| Arc::new(RealTimeSource))
        .sleep(duration)
}

/// Check if we're running against a simulated clock
pub fn is_simulated() -> bool {
    TIME_SOURCE
        .get_or_init(|| Arc::new(RealTimeSource))
        .is_simulated()
}

/// Install (or fetch the already-installed) frozen time source.
///
/// The global source can only be set once per process, so tests share one
/// frozen clock and must serialize against each other when they move it.
#[cfg(any(test, feature = "testing-support"))]
pub fn frozen() -> Arc<FrozenTimeSource> {
    static FROZEN: OnceCell<Arc<FrozenTimeSource>> = OnceCell::new();
    let frozen = FROZEN
        .get_or_init(|| Arc::new(FrozenTimeSource::new(Local::now())))
        .clone();
    init_time_source(frozen.clone());
    frozen
}
