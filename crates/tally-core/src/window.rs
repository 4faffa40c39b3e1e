//! Fixed-size time windows.
//!
//! Every event is attributed to the 60 second window containing it. A file
//! that was last active in window `w` keeps receiving idle credit until
//! `w + IDLE_TIMEOUT`.

use crate::clock::Clock;

/// Length of one accounting window, in seconds.
pub const WINDOW_SIZE: i64 = 60;

/// How long after the last event a file keeps accruing time, in seconds.
pub const IDLE_TIMEOUT: i64 = 120;

const _: () = assert!(IDLE_TIMEOUT % WINDOW_SIZE == 0);

/// Start of the window containing `epoch`.
///
/// Floors, so pre-1970 timestamps land in the window that begins at or
/// before them. Saturates at `i64::MIN`.
#[must_use]
pub const fn window_of(epoch: i64) -> i64 {
    epoch.saturating_sub(epoch.rem_euclid(WINDOW_SIZE))
}

#[must_use]
pub fn current_window(clock: &dyn Clock) -> i64 {
    window_of(clock.now())
}

/// Iterate window starts strictly between `from` and `to`, both window-aligned.
///
/// Stops early rather than overflow near `i64::MAX`.
pub fn windows_between(from: i64, to: i64) -> impl Iterator<Item = i64> {
    std::iter::successors(from.checked_add(WINDOW_SIZE), |w| w.checked_add(WINDOW_SIZE))
        .take_while(move |w| *w < to)
}
