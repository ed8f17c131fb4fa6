use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::StepId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StepError {
    #[error("step title cannot be empty")]
    EmptyTitle,

    #[error("quiz must offer at least one option")]
    NoOptions,

    #[error("quiz must mark at least one option as correct")]
    NoCorrectOption,

    #[error("quiz option {index} has no text")]
    EmptyOptionText { index: usize },

    #[error("unknown step type: {0}")]
    UnknownType(String),
}

//
// ─── STEP TYPE ─────────────────────────────────────────────────────────────────
//

/// Discriminant of a [`StepKind`], used for display and for flat records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    Explanation,
    Code,
    Quiz,
    Challenge,
}

impl StepType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StepType::Explanation => "explanation",
            StepType::Code => "code",
            StepType::Quiz => "quiz",
            StepType::Challenge => "challenge",
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepType {
    type Err = StepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "explanation" => Ok(StepType::Explanation),
            "code" => Ok(StepType::Code),
            "quiz" => Ok(StepType::Quiz),
            "challenge" => Ok(StepType::Challenge),
            other => Err(StepError::UnknownType(other.to_owned())),
        }
    }
}

//
// ─── EXERCISES ─────────────────────────────────────────────────────────────────
//

/// Editable-code exercise shared by `code` and `challenge` steps.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Exercise {
    template: String,
    expected_output: Option<String>,
    hints: Vec<String>,
    solution: Option<String>,
}

impl Exercise {
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_expected_output(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = Some(expected.into());
        self
    }

    #[must_use]
    pub fn with_solution(mut self, solution: impl Into<String>) -> Self {
        self.solution = Some(solution.into());
        self
    }

    #[must_use]
    pub fn with_hints(mut self, hints: Vec<String>) -> Self {
        self.hints = hints;
        self
    }

    /// Starter text placed in the editor.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    #[must_use]
    pub fn expected_output(&self) -> Option<&str> {
        self.expected_output.as_deref()
    }

    #[must_use]
    pub fn hints(&self) -> &[String] {
        &self.hints
    }

    #[must_use]
    pub fn solution(&self) -> Option<&str> {
        self.solution.as_deref()
    }
}

/// One answer choice of a quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizOption {
    text: String,
    correct: bool,
}

impl QuizOption {
    #[must_use]
    pub fn new(text: impl Into<String>, correct: bool) -> Self {
        Self {
            text: text.into(),
            correct,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.correct
    }
}

/// Multiple-choice question.
///
/// Several options may be marked correct; grading only ever looks at the
/// option the learner picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quiz {
    options: Vec<QuizOption>,
    hints: Vec<String>,
}

impl Quiz {
    /// # Errors
    ///
    /// Returns `StepError::NoOptions` for an empty option list,
    /// `StepError::EmptyOptionText` for a blank option and
    /// `StepError::NoCorrectOption` when nothing is marked correct.
    pub fn new(options: Vec<QuizOption>, hints: Vec<String>) -> Result<Self, StepError> {
        if options.is_empty() {
            return Err(StepError::NoOptions);
        }
        if let Some(index) = options.iter().position(|o| o.text.trim().is_empty()) {
            return Err(StepError::EmptyOptionText { index });
        }
        if !options.iter().any(QuizOption::is_correct) {
            return Err(StepError::NoCorrectOption);
        }
        Ok(Self { options, hints })
    }

    #[must_use]
    pub fn options(&self) -> &[QuizOption] {
        &self.options
    }

    #[must_use]
    pub fn option(&self, index: usize) -> Option<&QuizOption> {
        self.options.get(index)
    }

    #[must_use]
    pub fn hints(&self) -> &[String] {
        &self.hints
    }
}

/// Type-dependent payload of a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    Explanation,
    Code(Exercise),
    Quiz(Quiz),
    Challenge(Exercise),
}

impl StepKind {
    #[must_use]
    pub fn step_type(&self) -> StepType {
        match self {
            StepKind::Explanation => StepType::Explanation,
            StepKind::Code(_) => StepType::Code,
            StepKind::Quiz(_) => StepType::Quiz,
            StepKind::Challenge(_) => StepType::Challenge,
        }
    }

    /// The editable exercise, for `code` and `challenge` steps.
    #[must_use]
    pub fn exercise(&self) -> Option<&Exercise> {
        match self {
            StepKind::Code(exercise) | StepKind::Challenge(exercise) => Some(exercise),
            StepKind::Explanation | StepKind::Quiz(_) => None,
        }
    }
}

//
// ─── STEP ──────────────────────────────────────────────────────────────────────
//

/// A single screen of a lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    id: StepId,
    title: String,
    content: String,
    kind: StepKind,
}

impl Step {
    /// # Errors
    ///
    /// Returns `StepError::EmptyTitle` if the title is blank.
    pub fn new(
        id: StepId,
        title: impl Into<String>,
        content: impl Into<String>,
        kind: StepKind,
    ) -> Result<Self, StepError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(StepError::EmptyTitle);
        }
        Ok(Self {
            id,
            title: title.trim().to_owned(),
            content: content.into(),
            kind,
        })
    }

    #[must_use]
    pub fn id(&self) -> StepId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Instructional markdown shown above the exercise.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn kind(&self) -> &StepKind {
        &self.kind
    }

    #[must_use]
    pub fn step_type(&self) -> StepType {
        self.kind.step_type()
    }

    #[must_use]
    pub fn hints(&self) -> &[String] {
        match &self.kind {
            StepKind::Explanation => &[],
            StepKind::Code(exercise) | StepKind::Challenge(exercise) => exercise.hints(),
            StepKind::Quiz(quiz) => quiz.hints(),
        }
    }

    #[must_use]
    pub fn solution(&self) -> Option<&str> {
        self.kind.exercise().and_then(Exercise::solution)
    }

    #[must_use]
    pub fn expected_output(&self) -> Option<&str> {
        self.kind.exercise().and_then(Exercise::expected_output)
    }

    /// Starter editor text; empty for steps without an editor.
    #[must_use]
    pub fn template(&self) -> &str {
        self.kind.exercise().map_or("", Exercise::template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_requires_a_correct_option() {
        let err = Quiz::new(
            vec![QuizOption::new("4", false), QuizOption::new("5", false)],
            Vec::new(),
        )
        .unwrap_err();
        assert_eq!(err, StepError::NoCorrectOption);
    }

    #[test]
    fn quiz_rejects_empty_options() {
        assert_eq!(Quiz::new(Vec::new(), Vec::new()).unwrap_err(), StepError::NoOptions);
        let err = Quiz::new(vec![QuizOption::new("  ", true)], Vec::new()).unwrap_err();
        assert_eq!(err, StepError::EmptyOptionText { index: 0 });
    }

    #[test]
    fn quiz_allows_several_correct_options() {
        let quiz = Quiz::new(
            vec![QuizOption::new("a", true), QuizOption::new("b", true)],
            Vec::new(),
        )
        .unwrap();
        assert_eq!(quiz.options().len(), 2);
    }

    #[test]
    fn step_exposes_exercise_fields() {
        let exercise = Exercise::new("print()")
            .with_expected_output("Hi")
            .with_solution("print(\"Hi\")")
            .with_hints(vec!["use quotes".into()]);
        let step = Step::new(StepId::new(1), " Say hi ", "", StepKind::Code(exercise)).unwrap();

        assert_eq!(step.title(), "Say hi");
        assert_eq!(step.step_type(), StepType::Code);
        assert_eq!(step.template(), "print()");
        assert_eq!(step.expected_output(), Some("Hi"));
        assert_eq!(step.solution(), Some("print(\"Hi\")"));
        assert_eq!(step.hints(), ["use quotes".to_string()]);
    }

    #[test]
    fn explanation_has_no_editor_fields() {
        let step = Step::new(StepId::new(1), "Intro", "# Hi", StepKind::Explanation).unwrap();
        assert_eq!(step.template(), "");
        assert!(step.hints().is_empty());
        assert!(step.solution().is_none());
    }

    #[test]
    fn step_type_parses_case_insensitively() {
        assert_eq!("Challenge".parse::<StepType>().unwrap(), StepType::Challenge);
        assert!(matches!(
            "game".parse::<StepType>(),
            Err(StepError::UnknownType(raw)) if raw == "game"
        ));
    }
}
