//! The grading aggregate: run-wide fields plus the ordered result list.

use std::time::Instant;

use crate::capture::OutputSink;
use crate::listener::GradedRunListener;
use crate::result::GradedResult;
use crate::strategy::{CumulativeStrategy, GradingStrategy};
use crate::suite::{SuiteRunner, TestSuite};

/// Everything one grading run accumulates before the report is emitted.
///
/// Run-wide fields (overall score, max score, execution time, output)
/// are optional; the report only carries the ones that were set.
/// Results stay in insertion order, and the scoring strategy re-runs
/// over the whole list each time a result is appended.
pub struct Grader {
    score: Option<f64>,
    max_score: Option<f64>,
    execution_time: Option<f64>,
    output: Option<String>,
    results: Vec<GradedResult>,
    strategy: Box<dyn GradingStrategy>,
    timer: Option<Instant>,
}

impl Default for Grader {
    fn default() -> Self {
        Self::new()
    }
}

impl Grader {
    pub fn new() -> Self {
        Self {
            score: None,
            max_score: None,
            execution_time: None,
            output: None,
            results: Vec::new(),
            strategy: Box::new(CumulativeStrategy),
            timer: None,
        }
    }

    pub fn score(&self) -> Option<f64> {
        self.score
    }

    pub fn has_score(&self) -> bool {
        self.score.is_some()
    }

    pub fn set_score(&mut self, score: f64) {
        self.score = Some(score);
    }

    pub fn max_score(&self) -> Option<f64> {
        self.max_score
    }

    pub fn has_max_score(&self) -> bool {
        self.max_score.is_some()
    }

    pub fn set_max_score(&mut self, max_score: f64) {
        self.max_score = Some(max_score);
    }

    pub fn execution_time(&self) -> Option<f64> {
        self.execution_time
    }

    pub fn has_execution_time(&self) -> bool {
        self.execution_time.is_some()
    }

    /// Execution time in seconds, as the platform expects.
    pub fn set_execution_time(&mut self, seconds: f64) {
        self.execution_time = Some(seconds);
    }

    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    /// Append run-wide output. The first append creates the field.
    pub fn add_output(&mut self, text: impl AsRef<str>) {
        self.output.get_or_insert_with(String::new).push_str(text.as_ref());
    }

    /// Append a result and re-apply the strategy over the full list.
    pub fn add_result(&mut self, result: GradedResult) {
        self.results.push(result);
        self.strategy.grade(&mut self.results);
    }

    pub fn results(&self) -> &[GradedResult] {
        &self.results
    }

    pub fn has_results(&self) -> bool {
        !self.results.is_empty()
    }

    /// Number of recorded results that did not pass.
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.passed()).count()
    }

    /// Replace the scoring strategy. Takes effect immediately over any
    /// results already recorded, then on every later append.
    pub fn set_strategy(&mut self, strategy: impl GradingStrategy + 'static) {
        self.strategy = Box::new(strategy);
        if !self.results.is_empty() {
            self.strategy.grade(&mut self.results);
        }
    }

    /// Start the wall-clock timer for `execution_time`.
    pub fn start_timer(&mut self) {
        self.timer = Some(Instant::now());
    }

    /// Stop the timer and record the elapsed seconds. Does nothing when
    /// the timer was never started.
    pub fn stop_timer(&mut self) {
        if let Some(started) = self.timer.take() {
            self.execution_time = Some(started.elapsed().as_secs_f64());
        }
    }

    /// Run a suite through the built-in engine and absorb every graded
    /// result it produces. Returns the number of failed graded tests.
    ///
    /// Each result goes through [`add_result`], so the strategy applies
    /// as the records arrive.
    ///
    /// [`add_result`]: Grader::add_result
    pub fn run_graded_tests(&mut self, suite: &TestSuite) -> usize {
        let sink = OutputSink::new();
        let mut listener = GradedRunListener::new(sink.clone());
        SuiteRunner::new(sink).run(suite, &mut listener);
        let failed = listener.failed_count();
        for result in listener.into_results() {
            self.add_result(result);
        }
        failed
    }
}
