//! # Note lifecycle rules
//!
//! Pure time arithmetic behind posting cooldowns and note expiry. A single
//! window drives both: a user may post again exactly when their previous note
//! stops being visible.

use chrono::{DateTime, TimeDelta, Utc};

/// Hours a note stays visible, and the minimum gap between two posts.
pub const WINDOW_HOURS: i64 = 6;

pub fn window() -> TimeDelta {
    TimeDelta::hours(WINDOW_HOURS)
}

/// Whether a user may publish right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostEligibility {
    Ready,
    CoolingDown { next_allowed_at: DateTime<Utc> },
}

impl PostEligibility {
    pub fn is_ready(&self) -> bool {
        matches!(self, PostEligibility::Ready)
    }

    /// Instant posting reopens, if currently blocked.
    pub fn next_allowed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            PostEligibility::Ready => None,
            PostEligibility::CoolingDown { next_allowed_at } => Some(*next_allowed_at),
        }
    }
}

/// Cooldown check. Inclusive at the boundary: exactly one window later is allowed.
pub fn can_post(last_post_time: Option<DateTime<Utc>>, now: DateTime<Utc>) -> PostEligibility {
    match last_post_time {
        None => PostEligibility::Ready,
        Some(last) => {
            let next_allowed_at = last + window();
            if now >= next_allowed_at {
                PostEligibility::Ready
            } else {
                PostEligibility::CoolingDown { next_allowed_at }
            }
        }
    }
}

/// Earliest creation time still visible at `now` (exclusive bound).
pub fn visibility_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - window()
}

/// A note is visible while `now - window < created_at <= now`.
pub fn is_visible(created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    created_at > visibility_cutoff(now) && created_at <= now
}

/// Fraction of the window left, clamped to `[0, 1]`. Zero means expired.
pub fn remaining_visibility(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let total = window().num_milliseconds() as f64;
    let left = ((created_at + window()) - now).num_milliseconds() as f64;
    (left / total).clamp(0.0, 1.0)
}

/// Time until the note expires, zero once expired.
pub fn time_left(created_at: DateTime<Utc>, now: DateTime<Utc>) -> TimeDelta {
    let left = (created_at + window()) - now;
    left.max(TimeDelta::zero())
}
