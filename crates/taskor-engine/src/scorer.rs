//! Heuristic output quality scoring.
//!
//! Deliberately simple and fully deterministic so it can be unit-tested
//! in isolation and swapped for a real grader without touching any
//! scheduling logic.

use std::time::Duration;
use taskor_core::TaskType;

const BASE_SCORE: f64 = 0.5;

/// Output length (chars) at which the length term saturates.
const LENGTH_PLATEAU_CHARS: f64 = 1600.0;
const LENGTH_TERM_MAX: f64 = 0.2;

/// Latency beyond which the speed term vanishes.
const SPEED_CUTOFF_SECS: f64 = 5.0;
const SPEED_TERM_MAX: f64 = 0.1;

const STRUCTURE_BONUS_MAX: f64 = 0.3;

/// Scores a completed task's output against task-type-specific signals.
///
/// Pure function of its inputs. The result is always in `[0, 1]`:
/// a base of 0.5, plus a saturating length term (up to +0.2), a speed
/// term (up to +0.1, gone beyond ~5s), and a task-type keyword and
/// structure bonus (up to +0.3).
pub fn score(output: &str, task_type: TaskType, latency: Duration) -> f64 {
    let total = BASE_SCORE
        + length_term(output)
        + speed_term(latency)
        + structure_bonus(output, task_type);
    total.clamp(0.0, 1.0)
}

fn length_term(output: &str) -> f64 {
    let len = output.chars().count() as f64;
    (len / LENGTH_PLATEAU_CHARS).min(1.0) * LENGTH_TERM_MAX
}

fn speed_term(latency: Duration) -> f64 {
    let secs = latency.as_secs_f64();
    (1.0 - secs / SPEED_CUTOFF_SECS).clamp(0.0, 1.0) * SPEED_TERM_MAX
}

fn structure_bonus(output: &str, task_type: TaskType) -> f64 {
    let lower = output.to_lowercase();
    let has = |needle: &str| lower.contains(needle);

    let bonus = match task_type {
        TaskType::Planning => {
            signal(has("1.") || has("- "), 0.15)
                + signal(has("step") || has("phase"), 0.1)
                + signal(has("plan"), 0.05)
        }
        TaskType::Coding => {
            signal(has("```"), 0.2) + signal(has("fn ") || has("def ") || has("class "), 0.1)
        }
        TaskType::Review => {
            signal(has("issue") || has("problem"), 0.15)
                + signal(has("suggest") || has("recommend"), 0.15)
        }
        TaskType::Testing => signal(has("test"), 0.15) + signal(has("assert"), 0.15),
        TaskType::Debugging => {
            signal(has("cause"), 0.1) + signal(has("fix"), 0.1) + signal(has("error"), 0.1)
        }
        TaskType::Documentation => {
            signal(has("# "), 0.1) + signal(has("example"), 0.1) + signal(has("usage"), 0.1)
        }
        TaskType::Deployment => {
            signal(has("docker") || has("kubernetes"), 0.15)
                + signal(has("deploy") || has("environment"), 0.15)
        }
    };

    bonus.min(STRUCTURE_BONUS_MAX)
}

fn signal(present: bool, weight: f64) -> f64 {
    if present {
        weight
    } else {
        0.0
    }
}
