//! Run listener: turns the execution event stream into graded results.

use tracing::{debug, warn};

use crate::capture::{CaptureGuard, OutputSink};
use crate::events::{TestEvent, TestEventHandler, TestNode, TestOutcome};
use crate::result::GradedResult;

/// Marker prepended to a failed or aborted test's output, ahead of the
/// failure detail. Downstream tooling matches on this exact text.
pub const FAILURE_MARKER: &str = "FAILED/ABORTED:: \n";

/// Collects one [`GradedResult`] per graded test that finishes.
///
/// The listener opens a fresh capture scope for every started node,
/// containers included, so each node sees an empty output buffer. On
/// every finish the scope is released first; whether the node resolves
/// to grading metadata or not, pass-through is restored. One listener
/// serves one run; a single live capture scope cannot serve parallel
/// runs.
pub struct GradedRunListener {
    sink: OutputSink,
    results: Vec<GradedResult>,
    failed: usize,
    capture: Option<CaptureGuard>,
}

impl GradedRunListener {
    pub fn new(sink: OutputSink) -> Self {
        Self {
            sink,
            results: Vec::new(),
            failed: 0,
            capture: None,
        }
    }

    /// Number of graded results collected so far.
    pub fn result_count(&self) -> usize {
        self.results.len()
    }

    /// Number of collected results that did not pass.
    pub fn failed_count(&self) -> usize {
        self.failed
    }

    /// Collected results in the order their tests finished.
    pub fn results(&self) -> &[GradedResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<GradedResult> {
        self.results
    }

    fn node_finished(&mut self, node: &TestNode, outcome: &TestOutcome) {
        // Release the scope unconditionally; a node the run cannot
        // resolve must still hand the sink back.
        let captured = self
            .capture
            .take()
            .map(CaptureGuard::finish)
            .unwrap_or_default();

        let Some(meta) = node.graded_meta() else {
            debug!(node = %node.name, "finished node has no grading metadata, ignoring");
            return;
        };

        let mut result = GradedResult::new(
            meta.name.clone(),
            meta.number.clone(),
            meta.points,
            meta.visibility,
        );
        match outcome {
            TestOutcome::Successful => {
                result.set_score(meta.points);
            }
            TestOutcome::Failed { detail } | TestOutcome::Aborted { detail } => {
                result.set_score(0.0);
                result.set_passed(false);
                result.add_output(FAILURE_MARKER);
                if let Some(detail) = detail {
                    result.add_output(detail);
                }
                self.failed += 1;
            }
        }
        result.add_output(&captured);
        self.results.push(result);
    }
}

impl TestEventHandler for GradedRunListener {
    fn on_event(&mut self, event: &TestEvent) {
        match event {
            TestEvent::Started { .. } => {
                // Fresh scope per node; superseding releases the old one.
                self.capture = Some(self.sink.capture());
            }
            TestEvent::Finished { node, outcome } => self.node_finished(node, outcome),
            TestEvent::Skipped { node, reason } => {
                warn!(test = %node.name, reason = %reason, "test skipped, no result recorded");
            }
            TestEvent::DynamicRegistered { node } => {
                warn!(test = %node.name, "dynamically registered test will not be graded");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::{GradedTest, SuiteRunner, TestCase, TestFailure, TestSuite};
    use crate::visibility::Visibility;

    const EXAMPLE_OUTPUT: &str = "t3ST StR1nG";
    const EXAMPLE_MESSAGE: &str = "assertion failed: expected 3, got 4";

    fn graded(name: &str, points: f64) -> GradedTest {
        GradedTest::new()
            .with_name(name)
            .with_number("1.1")
            .with_points(points)
    }

    fn run(suite: &TestSuite) -> GradedRunListener {
        let sink = OutputSink::new();
        let mut listener = GradedRunListener::new(sink.clone());
        SuiteRunner::new(sink).run(suite, &mut listener);
        listener
    }

    #[test]
    fn one_record_per_graded_test_only() {
        let suite = TestSuite::new("s")
            .case(TestCase::new("a", |_| Ok(())).graded(graded("A", 1.0)))
            .case(TestCase::new("ungraded", |_| Ok(())))
            .case(TestCase::new("b", |_| Ok(())).graded(graded("B", 1.0)));
        let listener = run(&suite);

        assert_eq!(listener.result_count(), 2);
        let names: Vec<&str> = listener.results().iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn passing_tests_earn_their_full_points() {
        let suite =
            TestSuite::new("s").case(TestCase::new("a", |_| Ok(())).graded(graded("A", 2.0)));
        let listener = run(&suite);

        let result = &listener.results()[0];
        assert_eq!(result.score(), 2.0);
        assert!(result.passed());
        assert_eq!(listener.failed_count(), 0);
    }

    #[test]
    fn failing_tests_score_zero_and_carry_the_marker() {
        let suite = TestSuite::new("s").case(
            TestCase::new("a", |_| Err(TestFailure::failed(EXAMPLE_MESSAGE)))
                .graded(graded("A", 2.0)),
        );
        let listener = run(&suite);

        let result = &listener.results()[0];
        assert_eq!(result.score(), 0.0);
        assert!(!result.passed());
        assert!(result.output().starts_with(FAILURE_MARKER));
        assert!(result.output().contains(EXAMPLE_MESSAGE));
        assert_eq!(listener.failed_count(), 1);
    }

    #[test]
    fn aborted_tests_are_scored_like_failures() {
        let suite = TestSuite::new("s").case(
            TestCase::new("a", |_| Err(TestFailure::aborted("no fixture")))
                .graded(graded("A", 3.0)),
        );
        let listener = run(&suite);

        let result = &listener.results()[0];
        assert_eq!(result.score(), 0.0);
        assert!(!result.passed());
        assert_eq!(listener.failed_count(), 1);
    }

    #[test]
    fn captured_output_lands_on_the_record() {
        let suite = TestSuite::new("s").case(
            TestCase::new("a", |ctx| {
                ctx.print(EXAMPLE_OUTPUT);
                Ok(())
            })
            .graded(graded("A", 1.0)),
        );
        let listener = run(&suite);

        assert_eq!(listener.results()[0].output(), EXAMPLE_OUTPUT);
    }

    #[test]
    fn failure_marker_and_detail_precede_captured_output() {
        let suite = TestSuite::new("s").case(
            TestCase::new("a", |ctx| {
                ctx.print(EXAMPLE_OUTPUT);
                Err(TestFailure::failed(EXAMPLE_MESSAGE))
            })
            .graded(graded("A", 1.0)),
        );
        let listener = run(&suite);

        let expected = format!("{FAILURE_MARKER}{EXAMPLE_MESSAGE}{EXAMPLE_OUTPUT}");
        assert_eq!(listener.results()[0].output(), expected);
    }

    #[test]
    fn panicking_tests_record_the_panic_text() {
        let suite = TestSuite::new("s").case(
            TestCase::new("a", |_| panic!("stack empty")).graded(graded("A", 5.0)),
        );
        let listener = run(&suite);

        let result = &listener.results()[0];
        assert_eq!(result.score(), 0.0);
        assert!(!result.passed());
        assert!(result.output().contains("stack empty"));
    }

    #[test]
    fn each_node_starts_with_an_empty_buffer() {
        // Drive the listener directly: text printed while only the
        // container scope is open must not leak into the test's record.
        let sink = OutputSink::new();
        let mut listener = GradedRunListener::new(sink.clone());
        let container = TestNode::container("suite");
        let test = TestNode::graded_test("t", graded("T", 1.0));

        listener.on_event(&TestEvent::Started {
            node: container.clone(),
        });
        sink.print("container noise");
        listener.on_event(&TestEvent::Started { node: test.clone() });
        sink.print("test text");
        listener.on_event(&TestEvent::Finished {
            node: test,
            outcome: TestOutcome::Successful,
        });
        listener.on_event(&TestEvent::Finished {
            node: container,
            outcome: TestOutcome::Successful,
        });

        assert_eq!(listener.results()[0].output(), "test text");
        assert!(!sink.is_capturing());
    }

    #[test]
    fn unresolvable_finishes_still_restore_pass_through() {
        let sink = OutputSink::new();
        let mut listener = GradedRunListener::new(sink.clone());
        let plain = TestNode::test("not graded");

        listener.on_event(&TestEvent::Started { node: plain.clone() });
        assert!(sink.is_capturing());
        listener.on_event(&TestEvent::Finished {
            node: plain,
            outcome: TestOutcome::Successful,
        });

        assert!(!sink.is_capturing());
        assert_eq!(listener.result_count(), 0);
    }

    #[test]
    fn skipped_and_dynamic_events_produce_no_records() {
        let sink = OutputSink::new();
        let mut listener = GradedRunListener::new(sink.clone());

        listener.on_event(&TestEvent::Skipped {
            node: TestNode::graded_test("s", graded("S", 1.0)),
            reason: "manual grading".to_string(),
        });
        listener.on_event(&TestEvent::DynamicRegistered {
            node: TestNode::test("d"),
        });

        assert_eq!(listener.result_count(), 0);
        assert_eq!(listener.failed_count(), 0);
        assert!(!sink.is_capturing());
    }

    #[test]
    fn records_keep_declared_visibility() {
        let meta = GradedTest::new()
            .with_name("Hidden check")
            .with_visibility(Visibility::Hidden);
        let suite = TestSuite::new("s").case(TestCase::new("a", |_| Ok(())).graded(meta));
        let listener = run(&suite);

        assert_eq!(listener.results()[0].visibility(), Visibility::Hidden);
    }

    #[test]
    fn into_results_preserves_finish_order() {
        let suite = TestSuite::new("s")
            .case(TestCase::new("first", |_| Ok(())).graded(graded("First", 1.0)))
            .case(
                TestCase::new("second", |_| Err(TestFailure::failed("nope")))
                    .graded(graded("Second", 1.0)),
            );
        let results = run(&suite).into_results();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name(), "First");
        assert_eq!(results[1].name(), "Second");
    }
}
