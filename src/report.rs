//! Platform JSON report emission.
//!
//! The report schema is positional as well as nominal: graders and
//! scripts downstream parse with fixed key order, so the emission
//! structs pin the order through field declaration rather than trusting
//! a map type.

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::errors::ReportError;
use crate::grader::Grader;
use crate::result::GradedResult;
use crate::visibility::Visibility;

/// Formats a grading aggregate for upload.
pub trait ReportFormatter {
    fn format(&self, grader: &Grader) -> Result<String, ReportError>;
}

/// Top-level document. Declaration order is wire order; unset optionals
/// are omitted entirely.
#[derive(Serialize)]
struct ReportDoc<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    execution_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    visibility: Option<Visibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stdout_visibility: Option<Visibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tests: Option<Vec<TestEntry<'a>>>,
}

/// One per-test entry. All six keys are always present, in this order.
#[derive(Serialize)]
struct TestEntry<'a> {
    name: &'a str,
    score: f64,
    max_score: f64,
    number: &'a str,
    output: &'a str,
    visibility: Visibility,
}

impl<'a> TestEntry<'a> {
    fn from_result(result: &'a GradedResult) -> Self {
        Self {
            name: result.name(),
            score: result.score(),
            max_score: result.points(),
            number: result.number(),
            output: result.output(),
            visibility: result.visibility(),
        }
    }
}

/// Emits the platform JSON schema, compact by default.
#[derive(Debug, Clone, Default)]
pub struct JsonReportFormatter {
    visibility: Option<Visibility>,
    stdout_visibility: Option<Visibility>,
    indent: Option<usize>,
}

impl JsonReportFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the report-level visibility. The value is validated here, at
    /// the point of setting; emission never sees an invalid level.
    pub fn set_visibility(&mut self, visibility: &str) -> Result<(), ReportError> {
        self.visibility = Some(visibility.parse()?);
        Ok(())
    }

    /// Set the visibility of captured stdout. Validated eagerly, like
    /// [`set_visibility`].
    ///
    /// [`set_visibility`]: JsonReportFormatter::set_visibility
    pub fn set_stdout_visibility(&mut self, visibility: &str) -> Result<(), ReportError> {
        self.stdout_visibility = Some(visibility.parse()?);
        Ok(())
    }

    /// Pretty-print with the given indent width instead of emitting one
    /// compact line.
    pub fn set_pretty_print(&mut self, indent: usize) {
        self.indent = Some(indent);
    }

    fn validate(&self, grader: &Grader) -> Result<(), ReportError> {
        if grader.has_score() || grader.has_results() {
            Ok(())
        } else {
            Err(ReportError::EmptyReport)
        }
    }
}

impl ReportFormatter for JsonReportFormatter {
    fn format(&self, grader: &Grader) -> Result<String, ReportError> {
        self.validate(grader)?;

        let doc = ReportDoc {
            score: grader.score(),
            max_score: grader.max_score(),
            execution_time: grader.execution_time(),
            output: grader.output(),
            visibility: self.visibility,
            stdout_visibility: self.stdout_visibility,
            tests: if grader.has_results() {
                Some(grader.results().iter().map(TestEntry::from_result).collect())
            } else {
                None
            },
        };

        match self.indent {
            None => Ok(serde_json::to_string(&doc)?),
            Some(indent) => {
                let spaces = vec![b' '; indent];
                let mut out = Vec::new();
                let mut ser =
                    Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(&spaces));
                doc.serialize(&mut ser)?;
                Ok(String::from_utf8_lossy(&out).into_owned())
            }
        }
    }
}
