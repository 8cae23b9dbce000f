//! Countdown projection from clock anchors.

use crate::session::ClockAnchor;

/// Remaining match time in milliseconds at `now`.
///
/// Ended matches report zero, unstarted ones the full duration. While paused
/// the projection is evaluated at the instant the pause began, so it stays
/// frozen until the matching unpause folds the pause into the anchor.
pub fn remaining_millis(anchor: &ClockAnchor, duration_secs: u16, now: u64) -> u64 {
    let duration = u64::from(duration_secs) * 1000;
    if anchor.ended {
        return 0;
    }
    let Some(started) = anchor.time_started else {
        return duration;
    };
    let at = match (anchor.paused, anchor.paused_at) {
        (true, Some(paused_at)) => paused_at,
        _ => now,
    };
    let elapsed = at.saturating_sub(started.saturating_add(anchor.accumulated_paused));
    duration.saturating_sub(elapsed)
}

/// `m:ss` rendering of a millisecond count, truncated to whole seconds.
pub fn format_clock(millis: u64) -> String {
    let secs = millis / 1000;
    format!("{}:{:02}", secs / 60, secs % 60)
}
