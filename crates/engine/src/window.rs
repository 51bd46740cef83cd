//! Wall-clock gate for the weekly summary.

use chrono::{DateTime, Datelike, IsoWeek, Timelike, Utc, Weekday};
use std::sync::Mutex;

/// The weekday and UTC hour during which the summary may go out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryWindow {
    pub weekday: Weekday,
    pub hour_utc: u32,
}

impl Default for SummaryWindow {
    fn default() -> Self {
        Self {
            weekday: Weekday::Mon,
            hour_utc: 12,
        }
    }
}

impl SummaryWindow {
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        now.weekday() == self.weekday && now.hour() == self.hour_utc
    }
}

/// Opens at most once per ISO week, on the first check inside the window.
///
/// Checked on every scheduler tick. The binary caps the tick interval below
/// an hour so every window is seen.
#[derive(Debug, Default)]
pub struct WeeklyGate {
    window: SummaryWindow,
    last_opened: Mutex<Option<IsoWeek>>,
}

impl WeeklyGate {
    pub fn new(window: SummaryWindow) -> Self {
        Self {
            window,
            last_opened: Mutex::new(None),
        }
    }

    pub fn window(&self) -> SummaryWindow {
        self.window
    }

    /// Returns true exactly once per ISO week, when `now` falls inside the
    /// window. Later calls in the same week return false.
    pub fn try_open(&self, now: DateTime<Utc>) -> bool {
        if !self.window.contains(now) {
            return false;
        }
        let week = now.iso_week();
        let mut last = self
            .last_opened
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *last == Some(week) {
            return false;
        }
        *last = Some(week);
        true
    }
}
