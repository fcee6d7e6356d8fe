//! Adaptive throttling of error notifications.
//!
//! Each [`ErrorCategory`] keeps the time of its last notification and an
//! occurrence counter. The first occurrence of a problem always notifies;
//! repeats follow the schedule of the category's [`ThrottleClass`], with a
//! minimum-elapsed-time override so a long-running condition is re-announced.

use nfcuid_core::constants::{
    CARD_RENOTIFY_SECS, CRITICAL_RENOTIFY_SECS, DEFAULT_RENOTIFY_SECS, SERVICE_RENOTIFY_SECS,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Category attached to every user-visible error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// PC/SC context could not be established or was lost.
    PcscContext,
    /// Reader enumeration or reader availability.
    Reader,
    /// Card detection or card read.
    Card,
    /// Keystroke emission.
    Keyboard,
    /// Service loop iteration.
    Service,
    /// UID formatting.
    Format,
    General,
}

impl ErrorCategory {
    pub fn class(self) -> ThrottleClass {
        match self {
            Self::PcscContext | Self::Reader => ThrottleClass::Critical,
            Self::Card => ThrottleClass::CardRead,
            Self::Service => ThrottleClass::ServiceLoop,
            Self::Keyboard | Self::Format | Self::General => ThrottleClass::Default,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PcscContext => "pcsc-context",
            Self::Reader => "reader",
            Self::Card => "card",
            Self::Keyboard => "keyboard",
            Self::Service => "service",
            Self::Format => "format",
            Self::General => "general",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification schedule shared by several categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleClass {
    /// Context and reader failures: counts 0, 2, 4, then every 10th.
    Critical,
    /// Card failures: count 0, then every 5th.
    CardRead,
    /// Service loop failures: counts 0 and 1, then every 5th.
    ServiceLoop,
    /// Everything else: count 0, then every 3rd.
    Default,
}

impl ThrottleClass {
    /// True if the occurrence `count` (0-based) is on the schedule.
    pub fn on_schedule(self, count: u32) -> bool {
        match self {
            Self::Critical => matches!(count, 0 | 2 | 4) || (count >= 10 && count % 10 == 0),
            Self::CardRead => count % 5 == 0,
            Self::ServiceLoop => count <= 1 || count % 5 == 0,
            Self::Default => count % 3 == 0,
        }
    }

    /// Time after which a repeat notifies regardless of the schedule.
    pub fn renotify_after(self) -> Duration {
        Duration::from_secs(match self {
            Self::Critical => CRITICAL_RENOTIFY_SECS,
            Self::CardRead => CARD_RENOTIFY_SECS,
            Self::ServiceLoop => SERVICE_RENOTIFY_SECS,
            Self::Default => DEFAULT_RENOTIFY_SECS,
        })
    }
}

/// Outcome of recording one error occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleDecision {
    pub notify: bool,

    /// Occurrence count before this error was recorded.
    pub previous_count: u32,
}

#[derive(Debug, Default, Clone, Copy)]
struct Entry {
    last_notified: Option<Instant>,
    count: u32,
}

/// Per-category notification state.
///
/// All methods lock once, decide and update, then release; nothing blocks
/// while the lock is held.
#[derive(Debug, Default)]
pub struct NotificationThrottle {
    entries: Mutex<HashMap<ErrorCategory, Entry>>,
}

impl NotificationThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ErrorCategory, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record an occurrence of `category` now.
    pub fn record(&self, category: ErrorCategory) -> ThrottleDecision {
        self.record_at(category, Instant::now())
    }

    /// Record an occurrence of `category` at `now`.
    ///
    /// The decision is taken on the count before the increment. The count is
    /// always incremented; the notification time only moves when the
    /// decision is to notify.
    pub fn record_at(&self, category: ErrorCategory, now: Instant) -> ThrottleDecision {
        let mut entries = self.lock();
        let entry = entries.entry(category).or_default();
        let previous_count = entry.count;

        let notify = match entry.last_notified {
            None => true,
            Some(last) => {
                let class = category.class();
                class.on_schedule(previous_count)
                    || now.saturating_duration_since(last) >= class.renotify_after()
            }
        };

        if notify {
            entry.last_notified = Some(now);
        }
        entry.count = entry.count.saturating_add(1);

        ThrottleDecision {
            notify,
            previous_count,
        }
    }

    pub fn occurrences(&self, category: ErrorCategory) -> u32 {
        self.lock().get(&category).map_or(0, |entry| entry.count)
    }

    /// True if any category has a non-zero occurrence count.
    pub fn has_errors(&self) -> bool {
        self.lock().values().any(|entry| entry.count > 0)
    }

    /// Reset every occurrence count if any is non-zero.
    ///
    /// Returns whether the system was recovering, i.e. whether a success
    /// notification is due. Notification times are kept.
    pub fn take_recovery(&self) -> bool {
        let mut entries = self.lock();
        let recovering = entries.values().any(|entry| entry.count > 0);
        if recovering {
            for entry in entries.values_mut() {
                entry.count = 0;
            }
        }
        recovering
    }
}
