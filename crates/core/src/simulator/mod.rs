//! Approximate printed output of short learner programs.
//!
//! There is no interpreter here: the simulator finds `print(...)` calls and
//! evaluates their arguments with a small expression evaluator. Variables,
//! control flow, imports and user functions are not modelled.

mod interp;
mod lexer;
mod parser;
mod scan;
mod value;

use std::sync::Arc;
use thiserror::Error;

/// Shown when the program contains no `print` call.
pub const NO_OUTPUT_PLACEHOLDER: &str = "Program executed successfully!";

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Evaluation failure of a single call, displayed with the teaching language's
/// exception name.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SimulationError {
    #[error("SyntaxError: {0}")]
    Syntax(String),

    #[error("NameError: name '{0}' is not defined")]
    UnknownName(String),

    #[error("TypeError: {0}")]
    Type(String),

    #[error("ValueError: {0}")]
    Value(String),

    #[error("IndexError: {0}")]
    Index(String),

    #[error("AttributeError: {0}")]
    Attribute(String),

    #[error("ZeroDivisionError: {0}")]
    ZeroDivision(&'static str),

    #[error("OverflowError: {0}")]
    Overflow(&'static str),
}

//
// ─── OUTPUT ────────────────────────────────────────────────────────────────────
//

/// Result of one simulated run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    text: String,
    calls: usize,
    failed_calls: usize,
    scan_failed: bool,
}

impl RunOutput {
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }

    /// Number of `print` calls found.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls
    }

    #[must_use]
    pub fn failed_calls(&self) -> usize {
        self.failed_calls
    }

    /// The code could not be scanned at all; `text` is a single error line.
    #[must_use]
    pub fn scan_failed(&self) -> bool {
        self.scan_failed
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.scan_failed || self.failed_calls > 0
    }
}

//
// ─── RUNNERS ───────────────────────────────────────────────────────────────────
//

/// Turns learner code into displayable output.
pub trait CodeRunner: Send + Sync {
    fn run(&self, code: &str) -> RunOutput;
}

impl<T: CodeRunner + ?Sized> CodeRunner for Arc<T> {
    fn run(&self, code: &str) -> RunOutput {
        (**self).run(code)
    }
}

/// Default runner: evaluates `print(...)` arguments, one output line per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrintSimulator;

impl PrintSimulator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl CodeRunner for PrintSimulator {
    fn run(&self, code: &str) -> RunOutput {
        let calls = match scan::find_print_calls(code) {
            Ok(calls) => calls,
            Err(err) => {
                return RunOutput {
                    text: format!("Error: {err}"),
                    calls: 0,
                    failed_calls: 0,
                    scan_failed: true,
                };
            }
        };

        if calls.is_empty() {
            return RunOutput {
                text: NO_OUTPUT_PLACEHOLDER.to_owned(),
                calls: 0,
                failed_calls: 0,
                scan_failed: false,
            };
        }

        let mut failed_calls = 0;
        let lines: Vec<String> = calls
            .iter()
            .map(|call| match interp::evaluate_print_arguments(call.arguments) {
                Ok(line) => line,
                Err(err) => {
                    failed_calls += 1;
                    format!("Error: {err}")
                }
            })
            .collect();

        RunOutput {
            text: lines.join("\n"),
            calls: calls.len(),
            failed_calls,
            scan_failed: false,
        }
    }
}
