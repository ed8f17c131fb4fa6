//! Pass/fail decisions for learner attempts.

use std::fmt;

use crate::model::{Step, StepKind, StepType};
use crate::simulator::{CodeRunner, PrintSimulator};

/// What the learner did on a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt<'a> {
    /// Output of a code run.
    Output(&'a str),
    /// Index of the chosen quiz option.
    Select(usize),
    /// Code submitted for checking.
    Submit(&'a str),
}

/// Why an attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    Output { expected: String, actual: String },
    WrongOption { selected: usize },
    OptionOutOfRange { selected: usize, available: usize },
    Solution,
    EmptySubmission,
    /// The attempt does not fit the step, e.g. a selection on a code step.
    NotApplicable { step_type: StepType },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::Output { expected, actual } => {
                write!(f, "expected output {expected:?}, got {actual:?}")
            }
            Mismatch::WrongOption { selected } => write!(f, "option {selected} is not correct"),
            Mismatch::OptionOutOfRange {
                selected,
                available,
            } => write!(f, "option {selected} out of range (0..{available})"),
            Mismatch::Solution => f.write_str("answer does not match the solution"),
            Mismatch::EmptySubmission => f.write_str("no answer entered"),
            Mismatch::NotApplicable { step_type } => {
                write!(f, "attempt does not apply to a {step_type} step")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(Mismatch),
}

impl Verdict {
    #[must_use]
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    #[must_use]
    pub fn mismatch(&self) -> Option<&Mismatch> {
        match self {
            Verdict::Pass => None,
            Verdict::Fail(mismatch) => Some(mismatch),
        }
    }

    fn from_check(passed: bool, mismatch: impl FnOnce() -> Mismatch) -> Self {
        if passed { Verdict::Pass } else { Verdict::Fail(mismatch()) }
    }
}

/// Decides whether an attempt passes a step.
pub trait Grader: Send + Sync {
    fn grade(&self, step: &Step, attempt: Attempt<'_>) -> Verdict;
}

//
// ─── STRATEGIES ────────────────────────────────────────────────────────────────
//

/// Outputs match after trimming surrounding whitespace.
#[must_use]
pub fn output_matches(expected: &str, actual: &str) -> bool {
    expected.trim() == actual.trim()
}

/// With all whitespace removed, either text contains the other.
/// An empty submission never matches.
#[must_use]
pub fn solution_matches(solution: &str, submission: &str) -> bool {
    let strip = |text: &str| text.chars().filter(|c| !c.is_whitespace()).collect::<String>();
    let submission = strip(submission);
    if submission.is_empty() {
        return false;
    }
    let solution = strip(solution);
    submission.contains(&solution) || solution.contains(&submission)
}

/// Grades by step kind and which reference fields are present; code is run
/// through `R` when a submission has to be compared by output.
#[derive(Debug, Clone, Default)]
pub struct StrategyGrader<R = PrintSimulator> {
    runner: R,
}

impl<R: CodeRunner> StrategyGrader<R> {
    #[must_use]
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    fn grade_output(expected: Option<&str>, actual: &str) -> Verdict {
        match expected {
            Some(expected) => Verdict::from_check(output_matches(expected, actual), || {
                Mismatch::Output {
                    expected: expected.trim().to_owned(),
                    actual: actual.trim().to_owned(),
                }
            }),
            None => Verdict::Pass,
        }
    }
}

impl<R: CodeRunner> Grader for StrategyGrader<R> {
    fn grade(&self, step: &Step, attempt: Attempt<'_>) -> Verdict {
        let not_applicable = || {
            Verdict::Fail(Mismatch::NotApplicable {
                step_type: step.step_type(),
            })
        };

        match (step.kind(), attempt) {
            (StepKind::Quiz(quiz), Attempt::Select(selected)) => match quiz.option(selected) {
                Some(option) => Verdict::from_check(option.is_correct(), || {
                    Mismatch::WrongOption { selected }
                }),
                None => Verdict::Fail(Mismatch::OptionOutOfRange {
                    selected,
                    available: quiz.options().len(),
                }),
            },

            (StepKind::Code(exercise), Attempt::Output(actual)) => {
                Self::grade_output(exercise.expected_output(), actual)
            }
            (StepKind::Code(exercise), Attempt::Submit(code)) => {
                let output = self.runner.run(code);
                Self::grade_output(exercise.expected_output(), output.text())
            }

            (StepKind::Challenge(_), Attempt::Submit(code)) if code.trim().is_empty() => {
                Verdict::Fail(Mismatch::EmptySubmission)
            }
            (StepKind::Challenge(exercise), Attempt::Submit(code)) => {
                match (exercise.expected_output(), exercise.solution()) {
                    (Some(expected), _) => {
                        let output = self.runner.run(code);
                        Self::grade_output(Some(expected), output.text())
                    }
                    (None, Some(solution)) => {
                        Verdict::from_check(solution_matches(solution, code), || {
                            Mismatch::Solution
                        })
                    }
                    (None, None) => Verdict::Pass,
                }
            }
            (StepKind::Challenge(exercise), Attempt::Output(actual)) => {
                match exercise.expected_output() {
                    Some(expected) => Self::grade_output(Some(expected), actual),
                    None => not_applicable(),
                }
            }

            _ => not_applicable(),
        }
    }
}
