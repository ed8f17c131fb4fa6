//! Catalog documents: flat JSON records converted into the validated domain catalog.

use async_trait::async_trait;
use lesson_core::model::{
    Catalog, Difficulty, Exercise, Lesson, LessonDraft, LessonId, Module, ModuleId, Quiz,
    QuizOption, Step, StepId, StepKind, StepType,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Catalog shipped with the application.
pub const BUILTIN_CATALOG: &str = include_str!("../content/catalog.json");

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogLoadError {
    #[error("cannot read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("catalog is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("lesson {lesson_id} step {step_id}: {reason}")]
    InvalidStep {
        lesson_id: u64,
        step_id: u64,
        reason: &'static str,
    },

    #[error(transparent)]
    Domain(#[from] lesson_core::Error),
}

fn domain<E: Into<lesson_core::Error>>(err: E) -> CatalogLoadError {
    CatalogLoadError::Domain(err.into())
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDocument {
    pub modules: Vec<ModuleRecord>,
    pub lessons: Vec<LessonRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRecord {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub order_index: u32,
    pub lessons: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonRecord {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub module_id: u64,
    pub difficulty: Difficulty,
    /// Estimated minutes.
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub prerequisites: Vec<u64>,
    pub steps: Vec<StepRecord>,
}

/// A step as authored: a `type` tag plus optional fields, not all of which
/// make sense for every type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<OptionRecord>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionRecord {
    pub text: String,
    #[serde(default)]
    pub correct: bool,
}

impl StepRecord {
    /// Convert into a domain step, rejecting fields that do not belong to its type.
    ///
    /// # Errors
    ///
    /// Returns `CatalogLoadError::InvalidStep` for impossible field combinations
    /// and `CatalogLoadError::Domain` for unknown types or invalid quizzes.
    pub fn into_step(self, lesson_id: u64) -> Result<Step, CatalogLoadError> {
        let invalid = |reason| CatalogLoadError::InvalidStep {
            lesson_id,
            step_id: self.id,
            reason,
        };
        let step_type: StepType = self.step_type.parse().map_err(domain)?;

        let kind = match step_type {
            StepType::Explanation => {
                if self.code_template.is_some()
                    || self.expected_output.is_some()
                    || self.solution.is_some()
                {
                    return Err(invalid("explanation steps have no editor"));
                }
                if self.options.is_some() {
                    return Err(invalid("explanation steps have no options"));
                }
                if self.hints.as_ref().is_some_and(|hints| !hints.is_empty()) {
                    return Err(invalid("explanation steps have no hints"));
                }
                StepKind::Explanation
            }
            StepType::Code | StepType::Challenge => {
                if self.options.is_some() {
                    return Err(invalid("only quiz steps have options"));
                }
                let mut exercise = Exercise::new(self.code_template.clone().unwrap_or_default())
                    .with_hints(self.hints.clone().unwrap_or_default());
                if let Some(expected) = &self.expected_output {
                    exercise = exercise.with_expected_output(expected.clone());
                }
                if let Some(solution) = &self.solution {
                    exercise = exercise.with_solution(solution.clone());
                }
                if step_type == StepType::Code {
                    StepKind::Code(exercise)
                } else {
                    StepKind::Challenge(exercise)
                }
            }
            StepType::Quiz => {
                if self.code_template.is_some()
                    || self.expected_output.is_some()
                    || self.solution.is_some()
                {
                    return Err(invalid("quiz steps have no editor"));
                }
                let options = self
                    .options
                    .clone()
                    .unwrap_or_default()
                    .into_iter()
                    .map(|option| QuizOption::new(option.text, option.correct))
                    .collect();
                let quiz = Quiz::new(options, self.hints.clone().unwrap_or_default())
                    .map_err(domain)?;
                StepKind::Quiz(quiz)
            }
        };

        Step::new(StepId::new(self.id), self.title, self.content, kind).map_err(domain)
    }
}

impl LessonRecord {
    /// # Errors
    ///
    /// Returns `CatalogLoadError` if a step or the lesson itself is invalid.
    pub fn into_lesson(self) -> Result<Lesson, CatalogLoadError> {
        let lesson_id = self.id;
        let steps = self
            .steps
            .into_iter()
            .map(|step| step.into_step(lesson_id))
            .collect::<Result<Vec<_>, _>>()?;

        LessonDraft {
            id: LessonId::new(self.id),
            title: self.title,
            description: self.description,
            module_id: ModuleId::new(self.module_id),
            difficulty: self.difficulty,
            duration_minutes: self.duration,
            prerequisites: self.prerequisites.into_iter().map(LessonId::new).collect(),
            steps,
        }
        .validate()
        .map_err(domain)
    }
}

impl ModuleRecord {
    /// # Errors
    ///
    /// Returns `CatalogLoadError::Domain` if the module is invalid.
    pub fn into_module(self) -> Result<Module, CatalogLoadError> {
        Module::new(
            ModuleId::new(self.id),
            self.title,
            self.description,
            self.order_index,
            self.lessons.into_iter().map(LessonId::new).collect(),
        )
        .map_err(domain)
    }
}

impl CatalogDocument {
    /// # Errors
    ///
    /// Returns `CatalogLoadError` if any record is invalid or the catalog graph
    /// is inconsistent (unknown references, prerequisite cycles).
    pub fn into_catalog(self) -> Result<Catalog, CatalogLoadError> {
        let modules = self
            .modules
            .into_iter()
            .map(ModuleRecord::into_module)
            .collect::<Result<Vec<_>, _>>()?;
        let lessons = self
            .lessons
            .into_iter()
            .map(LessonRecord::into_lesson)
            .collect::<Result<Vec<_>, _>>()?;
        Catalog::new(modules, lessons).map_err(domain)
    }
}

/// Parse and validate a JSON catalog document.
///
/// # Errors
///
/// Returns `CatalogLoadError` for malformed JSON or invalid content.
pub fn parse_catalog(json: &str) -> Result<Catalog, CatalogLoadError> {
    let document: CatalogDocument = serde_json::from_str(json)?;
    let catalog = document.into_catalog()?;
    tracing::debug!(
        modules = catalog.modules().len(),
        lessons = catalog.lessons().len(),
        "loaded catalog"
    );
    Ok(catalog)
}

//
// ─── SOURCES ───────────────────────────────────────────────────────────────────
//

/// Read access to the lesson catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// # Errors
    ///
    /// Returns `CatalogLoadError` if the catalog cannot be read or is invalid.
    async fn load(&self) -> Result<Catalog, CatalogLoadError>;
}

#[derive(Debug, Clone)]
enum JsonOrigin {
    Builtin,
    Text(String),
    File(PathBuf),
}

/// Catalog read from a JSON document.
#[derive(Debug, Clone)]
pub struct JsonCatalogSource {
    origin: JsonOrigin,
}

impl JsonCatalogSource {
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            origin: JsonOrigin::Builtin,
        }
    }

    #[must_use]
    pub fn from_text(json: impl Into<String>) -> Self {
        Self {
            origin: JsonOrigin::Text(json.into()),
        }
    }

    #[must_use]
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            origin: JsonOrigin::File(path.into()),
        }
    }
}

#[async_trait]
impl CatalogSource for JsonCatalogSource {
    async fn load(&self) -> Result<Catalog, CatalogLoadError> {
        match &self.origin {
            JsonOrigin::Builtin => parse_catalog(BUILTIN_CATALOG),
            JsonOrigin::Text(json) => parse_catalog(json),
            JsonOrigin::File(path) => {
                let json = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| CatalogLoadError::Io {
                        path: path.clone(),
                        source,
                    })?;
                parse_catalog(&json)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::model::CatalogError;

    fn one_lesson(step: &str) -> String {
        format!(
            r#"{{
                "modules": [{{"id": 1, "title": "M", "orderIndex": 1, "lessons": [1]}}],
                "lessons": [{{
                    "id": 1, "title": "L", "moduleId": 1, "difficulty": "beginner",
                    "duration": 5, "steps": [{step}]
                }}]
            }}"#
        )
    }

    #[tokio::test]
    async fn builtin_catalog_is_valid() {
        let catalog = JsonCatalogSource::builtin().load().await.unwrap();
        assert_eq!(catalog.modules().len(), 3);
        assert_eq!(catalog.lessons().len(), 10);

        let lesson_five = catalog.lesson(LessonId::new(5)).unwrap();
        let prerequisites: Vec<u64> = lesson_five
            .prerequisites()
            .iter()
            .map(LessonId::value)
            .collect();
        assert_eq!(prerequisites, vec![3, 4]);

        let module_ids: Vec<u64> = catalog.modules().iter().map(|m| m.id().value()).collect();
        assert_eq!(module_ids, vec![1, 2, 3]);
    }

    #[test]
    fn builtin_reference_code_produces_expected_output() {
        use lesson_core::{Attempt, Grader, StrategyGrader};

        let catalog = parse_catalog(BUILTIN_CATALOG).unwrap();
        let grader: StrategyGrader = StrategyGrader::default();
        for lesson in catalog.lessons() {
            for step in lesson.steps() {
                if step.expected_output().is_none() {
                    continue;
                }
                let reference = step.solution().unwrap_or(step.template());
                let verdict = grader.grade(step, Attempt::Submit(reference));
                assert!(
                    verdict.is_pass(),
                    "lesson {} step {}: {verdict:?}",
                    lesson.id(),
                    step.id()
                );
            }
        }
    }

    #[test]
    fn converts_each_step_type() {
        let json = format!(
            r#"{{
                "modules": [{{"id": 1, "title": "M", "lessons": [1]}}],
                "lessons": [{{
                    "id": 1, "title": "L", "moduleId": 1, "difficulty": "advanced",
                    "steps": [
                        {{"id": 1, "title": "Read", "content": "text", "type": "explanation", "animation": "fade-in"}},
                        {{"id": 2, "title": "Run", "type": "code", "codeTemplate": "print(1)", "expectedOutput": "1"}},
                        {{"id": 3, "title": "Pick", "type": "quiz", "options": [{{"text": "a", "correct": true}}]}},
                        {{"id": 4, "title": "Try", "type": "challenge", "solution": "print(2)", "hints": ["h1", "h2"]}}
                    ]
                }}]
            }}"#
        );
        let catalog = parse_catalog(&json).unwrap();
        let lesson = catalog.lesson(LessonId::new(1)).unwrap();
        let types: Vec<StepType> = lesson.steps().iter().map(Step::step_type).collect();
        assert_eq!(
            types,
            vec![StepType::Explanation, StepType::Code, StepType::Quiz, StepType::Challenge]
        );
        assert_eq!(lesson.steps()[1].expected_output(), Some("1"));
        assert_eq!(lesson.steps()[3].hints().len(), 2);
        assert_eq!(lesson.steps()[3].template(), "");
    }

    #[test]
    fn rejects_options_on_code_step() {
        let json = one_lesson(
            r#"{"id": 1, "title": "S", "type": "code", "options": [{"text": "x", "correct": true}]}"#,
        );
        assert!(matches!(
            parse_catalog(&json),
            Err(CatalogLoadError::InvalidStep { step_id: 1, .. })
        ));
    }

    #[test]
    fn rejects_quiz_without_options() {
        let json = one_lesson(r#"{"id": 1, "title": "S", "type": "quiz"}"#);
        assert!(matches!(parse_catalog(&json), Err(CatalogLoadError::Domain(_))));
    }

    #[test]
    fn rejects_unknown_step_type() {
        let json = one_lesson(r#"{"id": 1, "title": "S", "type": "game"}"#);
        let err = parse_catalog(&json).unwrap_err();
        assert_eq!(err.to_string(), "unknown step type: game");
    }

    #[test]
    fn rejects_prerequisite_cycles() {
        let json = r#"{
            "modules": [{"id": 1, "title": "M", "lessons": [1, 2]}],
            "lessons": [
                {"id": 1, "title": "A", "moduleId": 1, "difficulty": "beginner", "prerequisites": [2],
                 "steps": [{"id": 1, "title": "S", "type": "explanation"}]},
                {"id": 2, "title": "B", "moduleId": 1, "difficulty": "beginner", "prerequisites": [1],
                 "steps": [{"id": 1, "title": "S", "type": "explanation"}]}
            ]
        }"#;
        assert!(matches!(
            parse_catalog(json),
            Err(CatalogLoadError::Domain(lesson_core::Error::Catalog(
                CatalogError::PrerequisiteCycle { .. }
            )))
        ));
    }

    #[test]
    fn reports_malformed_json() {
        assert!(matches!(parse_catalog("{"), Err(CatalogLoadError::Json(_))));
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let source = JsonCatalogSource::from_file("/nonexistent/catalog.json");
        assert!(matches!(source.load().await, Err(CatalogLoadError::Io { .. })));
    }
}
