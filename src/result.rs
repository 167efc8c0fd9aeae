//! Per-test graded result records.

use crate::visibility::Visibility;

/// Outcome record for one graded test.
///
/// Identity (name, number, points, visibility) is fixed at construction;
/// score, output, and pass state stay mutable until the record is handed
/// to the aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct GradedResult {
    name: String,
    number: String,
    points: f64,
    visibility: Visibility,
    score: f64,
    output: String,
    passed: bool,
}

impl GradedResult {
    /// Name used when a test declares none.
    pub const DEFAULT_NAME: &'static str = "Test";
    /// Number used when a test declares none.
    pub const DEFAULT_NUMBER: &'static str = "0.0";
    /// Points used when a test declares none.
    pub const DEFAULT_POINTS: f64 = 1.0;

    /// Create a record with the given identity.
    ///
    /// A fresh record starts at score 0.0: an unscored test has earned
    /// nothing until an outcome or an explicit [`set_score`] says
    /// otherwise. `passed` starts `true`; the run listener always writes
    /// score and pass state together.
    ///
    /// [`set_score`]: GradedResult::set_score
    pub fn new(
        name: impl Into<String>,
        number: impl Into<String>,
        points: f64,
        visibility: Visibility,
    ) -> Self {
        Self {
            name: name.into(),
            number: number.into(),
            points,
            visibility,
            score: 0.0,
            output: String::new(),
            passed: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    /// Maximum score this test is worth.
    pub fn points(&self) -> f64 {
        self.points
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Score earned so far. Never negative and never above `points` under
    /// the default strategy; alternative strategies may write deductions.
    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn set_score(&mut self, score: f64) {
        self.score = score;
    }

    pub fn set_passed(&mut self, passed: bool) {
        self.passed = passed;
    }

    /// Append text to the record's output. Output only grows; there is no
    /// way to erase what an earlier step reported.
    pub fn add_output(&mut self, text: impl AsRef<str>) {
        self.output.push_str(text.as_ref());
    }
}

impl Default for GradedResult {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_NAME,
            Self::DEFAULT_NUMBER,
            Self::DEFAULT_POINTS,
            Visibility::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_record_has_earned_nothing() {
        let result = GradedResult::new("Sorting", "2.1", 10.0, Visibility::Visible);
        assert_eq!(result.score(), 0.0);
        assert!(result.passed());
        assert_eq!(result.output(), "");
    }

    #[test]
    fn identity_fields_are_preserved() {
        let result = GradedResult::new("Sorting", "2.1", 10.0, Visibility::Hidden);
        assert_eq!(result.name(), "Sorting");
        assert_eq!(result.number(), "2.1");
        assert_eq!(result.points(), 10.0);
        assert_eq!(result.visibility(), Visibility::Hidden);
    }

    #[test]
    fn default_record_uses_declared_defaults() {
        let result = GradedResult::default();
        assert_eq!(result.name(), GradedResult::DEFAULT_NAME);
        assert_eq!(result.number(), GradedResult::DEFAULT_NUMBER);
        assert_eq!(result.points(), GradedResult::DEFAULT_POINTS);
        assert_eq!(result.visibility(), Visibility::Visible);
    }

    #[test]
    fn output_is_append_only() {
        let mut result = GradedResult::default();
        result.add_output("first");
        result.add_output(" second");
        assert_eq!(result.output(), "first second");
    }

    #[test]
    fn score_and_pass_state_are_mutable() {
        let mut result = GradedResult::new("T", "1", 5.0, Visibility::Visible);
        result.set_score(5.0);
        assert_eq!(result.score(), 5.0);
        result.set_passed(false);
        assert!(!result.passed());
    }
}
