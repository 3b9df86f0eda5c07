use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use rand::Rng;

use super::domain::RequestNumber;

/// Source of fresh request numbers, swappable so tests can force collisions.
pub trait RequestNumberSource: Send + Sync {
    fn next_number(&self) -> RequestNumber;
}

/// `TRN-<last six digits of a millisecond tick>-<100..=999>`.
pub fn format_request_number(tick_millis: i64, random: u16) -> RequestNumber {
    RequestNumber(format!(
        "TRN-{:06}-{:03}",
        tick_millis.rem_euclid(1_000_000),
        random
    ))
}

/// Clock-derived numbers. The tick never repeats within a process: when several numbers are
/// requested in the same millisecond the tick runs ahead of the wall clock by one per number,
/// so the time suffix alone is unique across any million consecutive numbers.
#[derive(Debug, Default)]
pub struct TimestampedNumbers {
    last_tick: AtomicI64,
}

impl TimestampedNumbers {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_tick(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut previous = self.last_tick.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(previous + 1);
            match self.last_tick.compare_exchange_weak(
                previous,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(current) => previous = current,
            }
        }
    }
}

impl RequestNumberSource for TimestampedNumbers {
    fn next_number(&self) -> RequestNumber {
        let tick = self.next_tick();
        let random = rand::thread_rng().gen_range(100..=999);
        format_request_number(tick, random)
    }
}
