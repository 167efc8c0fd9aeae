//! Pluggable scoring strategies.
//!
//! The aggregate re-applies its strategy over the full result list on
//! every append, so a strategy must be idempotent: running it twice over
//! the same records yields the same scores.

use crate::result::GradedResult;

/// Rewrites the scores of an ordered result list.
pub trait GradingStrategy {
    fn grade(&self, results: &mut Vec<GradedResult>);
}

/// Default strategy: every record keeps the score the run recorded.
///
/// Each test is worth its declared points, a pass earns them all, a
/// failure earns zero, and the overall total is the plain sum.
#[derive(Debug, Clone, Copy, Default)]
pub struct CumulativeStrategy;

impl GradingStrategy for CumulativeStrategy {
    fn grade(&self, _results: &mut Vec<GradedResult>) {}
}

/// Start from a caller-set overall score and deduct per failure.
///
/// Passing records score 0.0; each failed record becomes a negative
/// deduction of its points. Deductions are clamped so the overall score
/// (starting score plus the sum of all records) never drops below the
/// floor. The walk recomputes everything from pass state and points
/// alone, so repeated application is safe.
#[derive(Debug, Clone, Copy)]
pub struct DeductiveStrategy {
    starting_score: f64,
    floor: f64,
}

impl DeductiveStrategy {
    pub fn new(starting_score: f64) -> Self {
        Self {
            starting_score,
            floor: 0.0,
        }
    }

    /// Lowest overall score deductions may reach. Defaults to 0.0.
    pub fn with_floor(mut self, floor: f64) -> Self {
        self.floor = floor;
        self
    }

    pub fn starting_score(&self) -> f64 {
        self.starting_score
    }
}

impl GradingStrategy for DeductiveStrategy {
    fn grade(&self, results: &mut Vec<GradedResult>) {
        let mut budget = (self.starting_score - self.floor).max(0.0);
        for result in results.iter_mut() {
            if result.passed() {
                result.set_score(0.0);
            } else {
                let deduction = result.points().min(budget);
                result.set_score(-deduction);
                budget -= deduction;
            }
        }
    }
}
