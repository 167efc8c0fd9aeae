//! Explicit registration and discovery of grading callbacks.
//!
//! A grading target enumerates its own callbacks against a
//! [`CallbackRegistry`] instead of being scanned for annotations. The
//! registry validates registrations as they arrive (blank names are
//! excluded with a warning, duplicate names are rejected under the
//! default strict mode) and hands callbacks back in deterministic
//! execution order: every before-grading callback, then every grade
//! callback, then every after-grading callback, name-sorted within each
//! phase.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use tracing::{error, warn};

use crate::errors::RegistryError;
use crate::grader::Grader;

/// Grading lifecycle phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Setup that runs before any grading work
    BeforeGrading,
    /// The grading work itself
    Grade,
    /// Teardown that runs after all grading work
    AfterGrading,
}

impl Lifecycle {
    /// All phases, in execution order.
    pub fn all() -> &'static [Lifecycle] {
        &[
            Lifecycle::BeforeGrading,
            Lifecycle::Grade,
            Lifecycle::AfterGrading,
        ]
    }

    /// Returns the phase name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::BeforeGrading => "before_grading",
            Lifecycle::Grade => "grade",
            Lifecycle::AfterGrading => "after_grading",
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Lifecycle {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "before_grading" | "beforegrading" => Ok(Lifecycle::BeforeGrading),
            "grade" => Ok(Lifecycle::Grade),
            "after_grading" | "aftergrading" => Ok(Lifecycle::AfterGrading),
            _ => anyhow::bail!(
                "Invalid lifecycle phase '{}'. Valid values: before_grading, grade, after_grading",
                s
            ),
        }
    }
}

type CallbackFn = Box<dyn Fn(&mut Grader) -> Result<()>>;

/// A named callback bound to one lifecycle phase.
pub struct GradingCallback {
    name: String,
    phase: Lifecycle,
    run: CallbackFn,
}

impl GradingCallback {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> Lifecycle {
        self.phase
    }

    pub fn invoke(&self, grader: &mut Grader) -> Result<()> {
        (self.run)(grader)
    }
}

impl fmt::Debug for GradingCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GradingCallback")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

/// Something that can be graded: enumerates its callbacks into a registry.
pub trait GradingTarget {
    fn register(&self, registry: &mut CallbackRegistry) -> Result<(), RegistryError>;
}

/// Holds the callbacks of one grading target, keyed by name per phase.
///
/// Name-keyed ordered maps make execution order within a phase a
/// property of the data rather than of registration order.
#[derive(Debug, Default)]
pub struct CallbackRegistry {
    before: BTreeMap<String, GradingCallback>,
    grade: BTreeMap<String, GradingCallback>,
    after: BTreeMap<String, GradingCallback>,
    warnings: Vec<String>,
    lenient: bool,
}

impl CallbackRegistry {
    /// Strict registry: duplicate names are hard errors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lenient registry: duplicate names are excluded with a warning and
    /// the first registration wins.
    pub fn lenient() -> Self {
        Self {
            lenient: true,
            ..Self::default()
        }
    }

    /// Build a strict registry from a target's own enumeration.
    pub fn discover(target: &dyn GradingTarget) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        target.register(&mut registry)?;
        Ok(registry)
    }

    /// Register a callback under a phase.
    ///
    /// Blank names are never fatal: the callback is excluded and a
    /// warning recorded. A name that is already taken, in any phase, is
    /// rejected (strict) or excluded with a warning (lenient).
    pub fn register(
        &mut self,
        phase: Lifecycle,
        name: impl Into<String>,
        run: impl Fn(&mut Grader) -> Result<()> + 'static,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if name.trim().is_empty() {
            warn!(phase = %phase, "ignoring callback with a blank name");
            self.warnings
                .push(format!("Ignoring callback with a blank name in phase {phase}"));
            return Ok(());
        }
        if self.contains(&name) {
            if !self.lenient {
                return Err(RegistryError::DuplicateCallback { name });
            }
            warn!(callback = %name, "duplicate registration ignored, first one wins");
            self.warnings.push(format!(
                "Callback '{name}' is registered more than once; keeping the first registration"
            ));
            return Ok(());
        }
        self.phase_map(phase).insert(
            name.clone(),
            GradingCallback {
                name,
                phase,
                run: Box::new(run),
            },
        );
        Ok(())
    }

    /// Whether any phase holds a callback with this name.
    pub fn contains(&self, name: &str) -> bool {
        self.before.contains_key(name)
            || self.grade.contains_key(name)
            || self.after.contains_key(name)
    }

    /// Diagnostics recorded for excluded registrations.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn count_for(&self, phase: Lifecycle) -> usize {
        match phase {
            Lifecycle::BeforeGrading => self.before.len(),
            Lifecycle::Grade => self.grade.len(),
            Lifecycle::AfterGrading => self.after.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.before.len() + self.grade.len() + self.after.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All callbacks in execution order: before-grading, grade,
    /// after-grading, name-sorted within each phase.
    pub fn ordered(&self) -> Vec<&GradingCallback> {
        self.before
            .values()
            .chain(self.grade.values())
            .chain(self.after.values())
            .collect()
    }

    /// Invoke every callback in execution order against the grader.
    ///
    /// A callback that returns an error or panics is logged and skipped;
    /// the run continues. Returns how many callbacks failed.
    pub fn run(&self, grader: &mut Grader) -> usize {
        let mut failures = 0;
        for callback in self.ordered() {
            match panic::catch_unwind(AssertUnwindSafe(|| callback.invoke(grader))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    error!(
                        callback = %callback.name(),
                        phase = %callback.phase(),
                        error = %e,
                        "grading callback failed"
                    );
                }
                Err(_) => {
                    failures += 1;
                    error!(
                        callback = %callback.name(),
                        phase = %callback.phase(),
                        "grading callback panicked"
                    );
                }
            }
        }
        failures
    }

    fn phase_map(&mut self, phase: Lifecycle) -> &mut BTreeMap<String, GradingCallback> {
        match phase {
            Lifecycle::BeforeGrading => &mut self.before,
            Lifecycle::Grade => &mut self.grade,
            Lifecycle::AfterGrading => &mut self.after,
        }
    }
}

/// Maps CLI target identifiers to grading targets.
#[derive(Default)]
pub struct TargetRegistry {
    targets: BTreeMap<String, Box<dyn GradingTarget>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, target: impl GradingTarget + 'static) {
        self.targets.insert(name.into(), Box::new(target));
    }

    pub fn get(&self, name: &str) -> Option<&dyn GradingTarget> {
        self.targets.get(name).map(|t| t.as_ref())
    }

    /// Registered identifiers, sorted.
    pub fn names(&self) -> Vec<String> {
        self.targets.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
