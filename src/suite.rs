//! Built-in test suite engine.
//!
//! Suites are ordered collections of closure-bodied cases. Running a
//! suite walks the cases in order and emits the event stream the run
//! listener consumes: a container frame around per-case started/finished
//! events, with skip markers for cases whose bodies never run. Panics in
//! a body are caught and reported as failed outcomes, so one broken test
//! cannot take down the whole grading run.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

use crate::capture::OutputSink;
use crate::events::{TestEvent, TestEventHandler, TestNode, TestOutcome};
use crate::result::GradedResult;
use crate::visibility::Visibility;

/// Grading metadata attached to a test case.
///
/// Defaults mirror an unannotated test: one point, default name and
/// number, visible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedTest {
    pub name: String,
    pub number: String,
    pub points: f64,
    pub visibility: Visibility,
}

impl Default for GradedTest {
    fn default() -> Self {
        Self {
            name: GradedResult::DEFAULT_NAME.to_string(),
            number: GradedResult::DEFAULT_NUMBER.to_string(),
            points: GradedResult::DEFAULT_POINTS,
            visibility: Visibility::default(),
        }
    }
}

impl GradedTest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.number = number.into();
        self
    }

    pub fn with_points(mut self, points: f64) -> Self {
        self.points = points;
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }
}

/// Why a test body did not succeed.
///
/// `Aborted` means the body gave up mid-run (a missing precondition, an
/// environment problem); distinct from a skip, which prevents the body
/// from starting at all.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TestFailure {
    #[error("{0}")]
    Failed(String),

    #[error("{0}")]
    Aborted(String),
}

impl TestFailure {
    pub fn failed(message: impl Into<String>) -> Self {
        TestFailure::Failed(message.into())
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        TestFailure::Aborted(message.into())
    }
}

/// What a test body returns.
pub type TestResult = Result<(), TestFailure>;

/// Handle a running body uses to talk to the harness. Output written
/// here lands in the per-test capture buffer.
pub struct TestContext {
    sink: OutputSink,
}

impl TestContext {
    fn new(sink: OutputSink) -> Self {
        Self { sink }
    }

    pub fn print(&self, text: impl AsRef<str>) {
        self.sink.print(text);
    }

    pub fn println(&self, text: impl AsRef<str>) {
        self.sink.println(text);
    }
}

/// One runnable test case.
pub struct TestCase {
    name: String,
    graded: Option<GradedTest>,
    skip: Option<String>,
    body: Box<dyn Fn(&mut TestContext) -> TestResult>,
}

impl TestCase {
    pub fn new(
        name: impl Into<String>,
        body: impl Fn(&mut TestContext) -> TestResult + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            graded: None,
            skip: None,
            body: Box::new(body),
        }
    }

    /// Attach grading metadata; only graded cases produce result records.
    pub fn graded(mut self, meta: GradedTest) -> Self {
        self.graded = Some(meta);
        self
    }

    /// Mark the case skipped. The body never runs; the run emits a skip
    /// event carrying the reason instead.
    pub fn skip(mut self, reason: impl Into<String>) -> Self {
        self.skip = Some(reason.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn node(&self) -> TestNode {
        match &self.graded {
            Some(meta) => TestNode::graded_test(&self.name, meta.clone()),
            None => TestNode::test(&self.name),
        }
    }
}

/// A named, ordered collection of cases.
pub struct TestSuite {
    name: String,
    cases: Vec<TestCase>,
}

impl TestSuite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cases: Vec::new(),
        }
    }

    pub fn case(mut self, case: TestCase) -> Self {
        self.cases.push(case);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

/// Runs suites and emits the event stream.
pub struct SuiteRunner {
    sink: OutputSink,
}

impl SuiteRunner {
    pub fn new(sink: OutputSink) -> Self {
        Self { sink }
    }

    /// Execute every case in order, reporting through the handler.
    ///
    /// The suite itself appears as a container node wrapped around the
    /// per-case events.
    pub fn run(&self, suite: &TestSuite, handler: &mut dyn TestEventHandler) {
        let container = TestNode::container(suite.name());
        handler.on_event(&TestEvent::Started {
            node: container.clone(),
        });

        for case in &suite.cases {
            let node = case.node();
            if let Some(reason) = &case.skip {
                handler.on_event(&TestEvent::Skipped {
                    node,
                    reason: reason.clone(),
                });
                continue;
            }
            handler.on_event(&TestEvent::Started { node: node.clone() });
            let outcome = self.run_body(case);
            handler.on_event(&TestEvent::Finished { node, outcome });
        }

        handler.on_event(&TestEvent::Finished {
            node: container,
            outcome: TestOutcome::Successful,
        });
    }

    fn run_body(&self, case: &TestCase) -> TestOutcome {
        let mut ctx = TestContext::new(self.sink.clone());
        match panic::catch_unwind(AssertUnwindSafe(|| (case.body)(&mut ctx))) {
            Ok(Ok(())) => TestOutcome::Successful,
            Ok(Err(TestFailure::Failed(detail))) => TestOutcome::Failed {
                detail: Some(detail),
            },
            Ok(Err(TestFailure::Aborted(detail))) => TestOutcome::Aborted {
                detail: Some(detail),
            },
            Err(payload) => TestOutcome::Failed {
                detail: panic_detail(payload),
            },
        }
    }
}

/// Panic payloads are only strings when raised by `panic!` or a failed
/// assertion; anything else has no printable detail.
fn panic_detail(payload: Box<dyn Any + Send>) -> Option<String> {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        Some((*s).to_string())
    } else {
        payload.downcast_ref::<String>().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Recorder {
        events: Vec<TestEvent>,
    }

    impl TestEventHandler for Recorder {
        fn on_event(&mut self, event: &TestEvent) {
            self.events.push(event.clone());
        }
    }

    fn run_suite(suite: &TestSuite) -> Vec<TestEvent> {
        let mut recorder = Recorder::default();
        SuiteRunner::new(OutputSink::new()).run(suite, &mut recorder);
        recorder.events
    }

    #[test]
    fn events_wrap_cases_in_a_container_frame() {
        let suite = TestSuite::new("arith")
            .case(TestCase::new("adds", |_| Ok(())))
            .case(TestCase::new("subtracts", |_| {
                Err(TestFailure::failed("off by one"))
            }));
        let events = run_suite(&suite);

        assert_eq!(events.len(), 6);
        assert!(
            matches!(&events[0], TestEvent::Started { node } if node.name == "arith" && !node.is_test())
        );
        assert!(matches!(&events[1], TestEvent::Started { node } if node.name == "adds"));
        assert!(matches!(
            &events[2],
            TestEvent::Finished { outcome: TestOutcome::Successful, .. }
        ));
        assert!(matches!(
            &events[4],
            TestEvent::Finished { outcome, .. } if outcome.detail() == Some("off by one")
        ));
        assert!(
            matches!(&events[5], TestEvent::Finished { node, .. } if node.name == "arith")
        );
    }

    #[test]
    fn skipped_cases_never_run_their_bodies() {
        let ran = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&ran);
        let suite = TestSuite::new("s").case(
            TestCase::new("manual", move |_| {
                *flag.borrow_mut() = true;
                Ok(())
            })
            .skip("requires grading hardware"),
        );
        let events = run_suite(&suite);

        assert!(!*ran.borrow());
        assert!(matches!(
            &events[1],
            TestEvent::Skipped { reason, .. } if reason == "requires grading hardware"
        ));
    }

    #[test]
    fn panicking_bodies_become_failed_outcomes() {
        let suite = TestSuite::new("s").case(TestCase::new("blows up", |_| {
            panic!("index out of range");
        }));
        let events = run_suite(&suite);

        match &events[2] {
            TestEvent::Finished { outcome, .. } => {
                assert_eq!(outcome.detail(), Some("index out of range"));
                assert!(!outcome.is_successful());
            }
            other => panic!("Expected Finished, got {other:?}"),
        }
    }

    #[test]
    fn non_string_panic_payloads_have_no_detail() {
        let suite = TestSuite::new("s").case(TestCase::new("odd payload", |_| {
            std::panic::panic_any(42);
        }));
        let events = run_suite(&suite);

        match &events[2] {
            TestEvent::Finished { outcome, .. } => assert_eq!(outcome.detail(), None),
            other => panic!("Expected Finished, got {other:?}"),
        }
    }

    #[test]
    fn aborting_bodies_become_aborted_outcomes() {
        let suite = TestSuite::new("s").case(TestCase::new("gives up", |_| {
            Err(TestFailure::aborted("fixture file missing"))
        }));
        let events = run_suite(&suite);

        assert!(matches!(
            &events[2],
            TestEvent::Finished {
                outcome: TestOutcome::Aborted { .. },
                ..
            }
        ));
    }

    #[test]
    fn graded_cases_carry_their_metadata_on_the_node() {
        let suite = TestSuite::new("s").case(
            TestCase::new("worth five", |_| Ok(()))
                .graded(GradedTest::new().with_name("Worth Five").with_points(5.0)),
        );
        let events = run_suite(&suite);

        match &events[1] {
            TestEvent::Started { node } => {
                let meta = node.graded_meta().unwrap();
                assert_eq!(meta.name, "Worth Five");
                assert_eq!(meta.points, 5.0);
            }
            other => panic!("Expected Started, got {other:?}"),
        }
    }

    #[test]
    fn graded_test_defaults_match_record_defaults() {
        let meta = GradedTest::new();
        assert_eq!(meta.name, GradedResult::DEFAULT_NAME);
        assert_eq!(meta.number, GradedResult::DEFAULT_NUMBER);
        assert_eq!(meta.points, GradedResult::DEFAULT_POINTS);
        assert_eq!(meta.visibility, Visibility::Visible);
    }
}
