use serde::{Deserialize, Serialize};

pub const DECAY_LAMBDA: f64 = 0.1;
pub const MIN_EASE: f64 = 1.3;
pub const MAX_EASE: f64 = 3.0;
pub const EASE_REWARD: f64 = 0.1;
pub const EASE_PENALTY: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sm2Schedule {
    pub interval_days: i64,
    pub ease_factor: f64,
}

/// One SM-2 transition: the interval ladder on success (0 -> 1 -> 6 ->
/// interval * ease), a reset to 1 day on failure, ease nudged inside
/// [1.3, 3.0] either way.
pub fn next_schedule(is_correct: bool, interval_days: i64, ease_factor: f64) -> Sm2Schedule {
    if is_correct {
        let next_interval = match interval_days {
            0 => 1,
            1 => 6,
            current => (current as f64 * ease_factor).round() as i64,
        };
        Sm2Schedule {
            interval_days: next_interval.max(1),
            ease_factor: (ease_factor + EASE_REWARD).min(MAX_EASE),
        }
    } else {
        Sm2Schedule {
            interval_days: 1,
            ease_factor: (ease_factor - EASE_PENALTY).max(MIN_EASE),
        }
    }
}

/// Stored mastery after exponential forgetting, rounded to 3 decimals.
/// Applied at read time only; the stored score never decays in place.
pub fn effective_mastery(stored_score: f64, elapsed_days: f64) -> f64 {
    let safe_elapsed = elapsed_days.max(0.0);
    let decayed = stored_score * (-DECAY_LAMBDA * safe_elapsed).exp();
    round3(decayed.max(0.0))
}

pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

pub fn difficulty_for_mastery(effective: f64) -> Difficulty {
    if effective < 0.3 {
        Difficulty::Easy
    } else if effective < 0.6 {
        Difficulty::Medium
    } else {
        Difficulty::Hard
    }
}
