//! The gradekit binary: registers the bundled demo targets and hands
//! control to the CLI.
//!
//! Real assignments build their own binary: implement `GradingTarget`
//! for each assignment, register the targets, and call `cli::run`.

use anyhow::Result;

use gradekit::cli;
use gradekit::errors::RegistryError;
use gradekit::registry::{CallbackRegistry, GradingTarget, Lifecycle, TargetRegistry};
use gradekit::suite::{GradedTest, TestCase, TestFailure, TestSuite};

/// The "submission" the hello target grades.
fn greet(name: Option<&str>) -> String {
    match name {
        Some(name) => format!("Hello, {name}!"),
        None => "Hello, world!".to_string(),
    }
}

/// A broken rendition of the same submission, kept so failure reporting
/// can be exercised end to end.
fn broken_greet(name: Option<&str>) -> String {
    match name {
        Some(name) => panic!("unknown name: {name}"),
        None => "hello world".to_string(),
    }
}

fn greeting_suite(subject: fn(Option<&str>) -> String) -> TestSuite {
    TestSuite::new("greeting")
        .case(
            TestCase::new("default_greeting", move |_| {
                let got = subject(None);
                if got == "Hello, world!" {
                    Ok(())
                } else {
                    Err(TestFailure::failed(format!(
                        "expected 'Hello, world!', got '{got}'"
                    )))
                }
            })
            .graded(
                GradedTest::new()
                    .with_name("greet() works")
                    .with_number("1.1"),
            ),
        )
        .case(
            TestCase::new("personal_greeting", move |_| {
                let got = subject(Some("Ada"));
                if got == "Hello, Ada!" {
                    Ok(())
                } else {
                    Err(TestFailure::failed(format!(
                        "expected 'Hello, Ada!', got '{got}'"
                    )))
                }
            })
            .graded(
                GradedTest::new()
                    .with_name("greet(name) works")
                    .with_number("1.2")
                    .with_points(2.0),
            ),
        )
        .case(
            TestCase::new("prints_greeting", move |ctx| {
                ctx.println(subject(None));
                Ok(())
            })
            .graded(
                GradedTest::new()
                    .with_name("prints greeting")
                    .with_number("1.3")
                    .with_points(0.0),
            ),
        )
}

struct GreetingTarget {
    subject: fn(Option<&str>) -> String,
}

impl GradingTarget for GreetingTarget {
    fn register(&self, registry: &mut CallbackRegistry) -> Result<(), RegistryError> {
        let subject = self.subject;
        registry.register(Lifecycle::BeforeGrading, "start_clock", |grader| {
            grader.start_timer();
            Ok(())
        })?;
        registry.register(Lifecycle::Grade, "run_greeting_suite", move |grader| {
            grader.run_graded_tests(&greeting_suite(subject));
            grader.set_max_score(3.0);
            Ok(())
        })?;
        registry.register(Lifecycle::AfterGrading, "stop_clock", |grader| {
            grader.stop_timer();
            Ok(())
        })?;
        Ok(())
    }
}

fn main() -> Result<()> {
    let mut targets = TargetRegistry::new();
    targets.register("hello", GreetingTarget { subject: greet });
    targets.register(
        "hello-broken",
        GreetingTarget {
            subject: broken_greet,
        },
    );
    cli::run(&targets)
}
