//! Visibility levels the upload platform understands.
//!
//! Every graded result and the report itself carry one of four levels
//! controlling when students may see them. Values outside this set are
//! rejected eagerly, at the point of setting, never at emission time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ReportError;

/// When a result (or the whole report) becomes visible to the student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Visible immediately after grading.
    #[default]
    Visible,
    /// Never shown to the student.
    Hidden,
    /// Shown once the assignment due date passes.
    AfterDueDate,
    /// Shown once grades are published.
    AfterPublished,
}

impl Visibility {
    /// All levels the platform accepts, in display order.
    pub fn all() -> &'static [Visibility] {
        &[
            Visibility::Visible,
            Visibility::Hidden,
            Visibility::AfterDueDate,
            Visibility::AfterPublished,
        ]
    }

    /// The platform's wire name for this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Visible => "visible",
            Visibility::Hidden => "hidden",
            Visibility::AfterDueDate => "after_due_date",
            Visibility::AfterPublished => "after_published",
        }
    }

    fn valid_list() -> String {
        Visibility::all()
            .iter()
            .map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "visible" => Ok(Visibility::Visible),
            "hidden" => Ok(Visibility::Hidden),
            "after_due_date" => Ok(Visibility::AfterDueDate),
            "after_published" => Ok(Visibility::AfterPublished),
            other => Err(ReportError::InvalidVisibility {
                value: other.to_string(),
                valid: Visibility::valid_list(),
            }),
        }
    }
}
