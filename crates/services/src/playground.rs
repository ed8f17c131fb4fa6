//! Free-form code entry outside any lesson. No grading, no persistence.

use std::sync::Arc;
use std::time::Duration;

use lesson_core::model::EngineSettings;
use lesson_core::{CodeRunner, PrintSimulator};

use crate::error::PlaygroundError;

const STARTER_PROGRAM: &str = r#"# Write your Python code here
print("Hello, PythonChik!")

# Let's do some math
print("5 + 5 =", 5 + 5)
"#;

const HELLO_TEMPLATE: &str = r#"# Simple Hello World program
print("Hello, World!")
print("Welcome to Python programming!")
"#;

const CALCULATOR_TEMPLATE: &str = r#"# Simple Calculator
print(f"{10} + {5} = {10 + 5}")
print(f"{10} - {5} = {10 - 5}")
print(f"{10} * {5} = {10 * 5}")
print(f"{10} / {5} = {10 / 5}")
"#;

/// Named starter programs, in menu order.
pub const TEMPLATES: [(&str, &str); 2] = [
    ("hello-world", HELLO_TEMPLATE),
    ("calculator", CALCULATOR_TEMPLATE),
];

/// Short names accepted by [`Playground::load_template`].
const TEMPLATE_ALIASES: [(&str, &str); 2] = [("hello", "hello-world"), ("math", "calculator")];

/// Handle for a playground run in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaygroundTicket {
    generation: u64,
    code: String,
}

impl PlaygroundTicket {
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }
}

/// Editor state of the playground.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playground {
    code: String,
    output: Option<String>,
    template: Option<&'static str>,
    pending: bool,
    generation: u64,
}

impl Default for Playground {
    fn default() -> Self {
        Self {
            code: STARTER_PROGRAM.to_owned(),
            output: None,
            template: None,
            pending: false,
            generation: 0,
        }
    }
}

impl Playground {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    #[must_use]
    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    /// Name of the last loaded template.
    #[must_use]
    pub fn template(&self) -> Option<&'static str> {
        self.template
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.pending
    }

    fn invalidate(&mut self) {
        self.generation += 1;
        self.pending = false;
    }

    pub fn set_code(&mut self, code: impl Into<String>) {
        self.code = code.into();
        self.invalidate();
    }

    /// Empty both the editor and the output.
    pub fn clear(&mut self) {
        self.code.clear();
        self.output = None;
        self.template = None;
        self.invalidate();
    }

    /// Replace the editor text with a named template.
    ///
    /// # Errors
    ///
    /// Returns `PlaygroundError::UnknownTemplate` for names not in [`TEMPLATES`].
    pub fn load_template(&mut self, name: &str) -> Result<(), PlaygroundError> {
        let wanted = name.trim();
        let wanted = TEMPLATE_ALIASES
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(wanted))
            .map_or(wanted, |&(_, id)| id);
        let &(found, code) = TEMPLATES
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(wanted))
            .ok_or_else(|| PlaygroundError::UnknownTemplate(name.to_owned()))?;
        self.code = code.to_owned();
        self.template = Some(found);
        self.invalidate();
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `PlaygroundError::RunInProgress` while a run is pending.
    pub fn begin_run(&mut self) -> Result<PlaygroundTicket, PlaygroundError> {
        if self.pending {
            return Err(PlaygroundError::RunInProgress);
        }
        self.pending = true;
        self.output = None;
        Ok(PlaygroundTicket {
            generation: self.generation,
            code: self.code.clone(),
        })
    }

    /// # Errors
    ///
    /// Returns `PlaygroundError::StaleRun` if the editor changed since
    /// [`Self::begin_run`]; the output is discarded.
    pub fn finish_run(
        &mut self,
        ticket: &PlaygroundTicket,
        output: impl Into<String>,
    ) -> Result<&str, PlaygroundError> {
        if !self.pending || ticket.generation != self.generation {
            return Err(PlaygroundError::StaleRun);
        }
        self.pending = false;
        let output = self.output.insert(output.into());
        Ok(output.as_str())
    }
}

/// Runs playground code with the same delay as lesson runs.
#[derive(Clone)]
pub struct PlaygroundService {
    runner: Arc<dyn CodeRunner>,
    run_delay: Duration,
}

impl PlaygroundService {
    #[must_use]
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            runner: Arc::new(PrintSimulator::new()),
            run_delay: settings.run_delay(),
        }
    }

    /// Run the editor text and store the output.
    ///
    /// # Errors
    ///
    /// Returns `PlaygroundError::RunInProgress` while another run is pending.
    pub async fn run<'a>(&self, playground: &'a mut Playground) -> Result<&'a str, PlaygroundError> {
        let ticket = playground.begin_run()?;
        if !self.run_delay.is_zero() {
            tokio::time::sleep(self.run_delay).await;
        }
        let output = self.runner.run(ticket.code());
        tracing::debug!(calls = output.calls(), errors = output.has_errors(), "playground run finished");
        playground.finish_run(&ticket, output.into_text())
    }
}
