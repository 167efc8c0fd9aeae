//! Test-execution event stream.
//!
//! The execution engine and the run listener meet at a plain message
//! seam: the engine emits [`TestEvent`] values, a [`TestEventHandler`]
//! consumes them. Events carry data only, so any producer that walks a
//! test tree in order can drive the listener.

use serde::{Deserialize, Serialize};

use crate::suite::GradedTest;

/// What kind of node an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Groups other nodes; never produces a result record.
    Container,
    /// A runnable test.
    Test,
}

/// One node of the executed test tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestNode {
    pub name: String,
    pub kind: NodeKind,
    /// Grading metadata; `None` for containers and ungraded tests.
    pub graded: Option<GradedTest>,
}

impl TestNode {
    pub fn container(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Container,
            graded: None,
        }
    }

    pub fn test(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Test,
            graded: None,
        }
    }

    pub fn graded_test(name: impl Into<String>, meta: GradedTest) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Test,
            graded: Some(meta),
        }
    }

    pub fn is_test(&self) -> bool {
        self.kind == NodeKind::Test
    }

    /// Grading metadata, present only on graded test nodes.
    pub fn graded_meta(&self) -> Option<&GradedTest> {
        match self.kind {
            NodeKind::Test => self.graded.as_ref(),
            NodeKind::Container => None,
        }
    }
}

/// How a finished node ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TestOutcome {
    Successful,
    Failed { detail: Option<String> },
    Aborted { detail: Option<String> },
}

impl TestOutcome {
    pub fn failed(detail: impl Into<String>) -> Self {
        TestOutcome::Failed {
            detail: Some(detail.into()),
        }
    }

    pub fn aborted(detail: impl Into<String>) -> Self {
        TestOutcome::Aborted {
            detail: Some(detail.into()),
        }
    }

    pub fn is_successful(&self) -> bool {
        matches!(self, TestOutcome::Successful)
    }

    /// Failure or abort description, when one was recorded.
    pub fn detail(&self) -> Option<&str> {
        match self {
            TestOutcome::Successful => None,
            TestOutcome::Failed { detail } | TestOutcome::Aborted { detail } => detail.as_deref(),
        }
    }
}

/// Events a test run emits, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TestEvent {
    /// A node began executing. Emitted for containers too.
    Started { node: TestNode },
    /// A started node finished with the given outcome.
    Finished { node: TestNode, outcome: TestOutcome },
    /// A node was skipped before starting; `Started` never fires for it.
    Skipped { node: TestNode, reason: String },
    /// A test was registered dynamically mid-run.
    DynamicRegistered { node: TestNode },
}

/// Consumer side of the event stream.
pub trait TestEventHandler {
    fn on_event(&mut self, event: &TestEvent);
}
