//! Line-oriented front end: lesson player, playground and dashboard.

use std::error::Error;
use std::fmt;
use std::io::{self, Write as _};
use std::str::FromStr;

use lesson_core::Verdict;
use lesson_core::model::{LessonId, StepAttempt, StepKind};
use services::playground::TEMPLATES;
use services::{AdvanceOutcome, AppServices, DashboardSnapshot, LessonNavigator, Playground};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// Terminates a multi-line block typed after `edit`.
const BLOCK_END: &str = ".";

pub struct Input {
    lines: Lines<BufReader<Stdin>>,
}

impl Input {
    #[must_use]
    pub fn stdin() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// # Errors
    ///
    /// Returns an I/O error if stdout or stdin fails.
    pub async fn prompt(&mut self, prompt: &str) -> io::Result<Option<String>> {
        print!("{prompt}");
        io::stdout().flush()?;
        self.lines.next_line().await
    }

    /// Lines up to a lone `.` or end of input.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if stdin fails.
    pub async fn read_block(&mut self) -> io::Result<String> {
        let mut block = Vec::new();
        while let Some(line) = self.lines.next_line().await? {
            if line.trim_end() == BLOCK_END {
                break;
            }
            block.push(line);
        }
        Ok(block.join("\n"))
    }
}

//
// ─── COMMANDS ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    Unknown(String),
    MissingNumber { command: &'static str },
    InvalidNumber { command: &'static str, raw: String },
    UnexpectedArgument(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Unknown(word) => write!(f, "unknown command: {word} (try `help`)"),
            CommandError::MissingNumber { command } => write!(f, "{command} requires a number"),
            CommandError::InvalidNumber { command, raw } => {
                write!(f, "invalid {command} number: {raw}")
            }
            CommandError::UnexpectedArgument(arg) => write!(f, "unexpected argument: {arg}"),
        }
    }
}

impl std::error::Error for CommandError {}

/// One line typed in the lesson player. Numbers are 1-based on input and
/// stored 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonCommand {
    Next,
    Back,
    Run,
    Check,
    Select(usize),
    Edit,
    Reset,
    Hint,
    HideHints,
    Solution,
    Jump(usize),
    Show,
    Help,
    Quit,
}

fn position(raw: Option<&str>, command: &'static str) -> Result<usize, CommandError> {
    let raw = raw.ok_or(CommandError::MissingNumber { command })?;
    match raw.parse::<usize>() {
        Ok(number) if number > 0 => Ok(number - 1),
        _ => Err(CommandError::InvalidNumber {
            command,
            raw: raw.to_owned(),
        }),
    }
}

impl FromStr for LessonCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(Self::Show);
        };
        let command = match head.to_ascii_lowercase().as_str() {
            "n" | "next" => Self::Next,
            "b" | "back" => Self::Back,
            "r" | "run" => Self::Run,
            "c" | "check" => Self::Check,
            "s" | "select" => Self::Select(position(words.next(), "select")?),
            "e" | "edit" => Self::Edit,
            "reset" => Self::Reset,
            "h" | "hint" => Self::Hint,
            "hide" => Self::HideHints,
            "solution" => Self::Solution,
            "j" | "jump" => Self::Jump(position(words.next(), "jump")?),
            "l" | "look" | "show" => Self::Show,
            "?" | "help" => Self::Help,
            "q" | "quit" | "exit" => Self::Quit,
            other => return Err(CommandError::Unknown(other.to_owned())),
        };
        if let Some(extra) = words.next() {
            return Err(CommandError::UnexpectedArgument(extra.to_owned()));
        }
        Ok(command)
    }
}

fn print_lesson_help() {
    println!("Commands:");
    println!("  next | back            move between steps");
    println!("  run | check            run the editor code / check a challenge answer");
    println!("  edit                   replace the editor text (end with a line '.')");
    println!("  reset                  restore the starter code");
    println!("  select <n>             choose quiz option n");
    println!("  hint | hide            reveal the next hint / hide hints");
    println!("  solution               show or hide the solution");
    println!("  jump <n>               go to step n (completed steps only)");
    println!("  show | help | quit");
}

//
// ─── LESSON PLAYER ─────────────────────────────────────────────────────────────
//

fn render_verdict(verdict: &Verdict) {
    match verdict.mismatch() {
        None => println!("Correct!"),
        Some(mismatch) => println!("Not quite: {mismatch}"),
    }
}

fn render_step(nav: &LessonNavigator) {
    let step = nav.current_step();
    let progress = nav.progress();
    println!();
    println!(
        "[{}/{}] {} ({}) - lesson {}%",
        progress.index + 1,
        progress.total,
        step.title(),
        step.step_type(),
        progress.percent
    );
    println!("{}", step.content());

    match step.kind() {
        StepKind::Explanation => {}
        StepKind::Quiz(quiz) => {
            let selected = nav.attempt().and_then(StepAttempt::selected);
            for (index, option) in quiz.options().iter().enumerate() {
                let marker = if selected == Some(index) { '*' } else { ' ' };
                println!(" {marker}{}. {}", index + 1, option.text());
            }
        }
        StepKind::Code(_) | StepKind::Challenge(_) => {
            println!("--- editor ---");
            println!("{}", nav.editor_text());
            if let Some(output) = nav.last_output() {
                println!("--- output ---");
                println!("{output}");
            }
        }
    }

    for (number, hint) in nav.visible_hints().iter().enumerate() {
        println!("hint {}: {hint}", number + 1);
    }
    if let Some(solution) = nav.visible_solution() {
        println!("--- solution ---");
        println!("{solution}");
    }
}

/// Play one lesson until it is finished or the learner quits.
///
/// # Errors
///
/// Returns an error for unknown lessons and for terminal I/O failures.
/// Step-level mistakes are printed and the loop continues.
pub async fn run_lesson(
    app: &AppServices,
    lesson_id: LessonId,
    input: &mut Input,
) -> Result<(), Box<dyn Error>> {
    let missing = app.dashboard().missing_prerequisites(lesson_id).await?;
    if !missing.is_empty() {
        let ids: Vec<String> = missing.iter().map(ToString::to_string).collect();
        eprintln!(
            "warning: lesson {lesson_id} is locked until lessons {} are complete",
            ids.join(", ")
        );
    }

    let lessons = app.lesson_loop();
    let mut nav = lessons.open_lesson(lesson_id).await?;
    let lesson = nav.lesson();
    println!(
        "{} - {} ({}, {} min)",
        lesson.title(),
        lesson.description(),
        lesson.difficulty(),
        lesson.duration_minutes()
    );
    render_step(&nav);

    while let Some(line) = input.prompt("> ").await? {
        let command = match line.parse::<LessonCommand>() {
            Ok(command) => command,
            Err(err) => {
                eprintln!("{err}");
                continue;
            }
        };

        match command {
            LessonCommand::Quit => break,
            LessonCommand::Help => print_lesson_help(),
            LessonCommand::Show => render_step(&nav),
            LessonCommand::Next => match lessons.go_next(&mut nav).await {
                Ok(advance) => match advance.outcome {
                    AdvanceOutcome::Moved { .. } => render_step(&nav),
                    AdvanceOutcome::Finished { event } => {
                        if event.is_some() {
                            println!("Lesson complete!");
                        }
                        render_dashboard(&app.dashboard().snapshot().await?);
                        break;
                    }
                },
                Err(err) => println!("{err}"),
            },
            LessonCommand::Back => {
                if nav.go_back() {
                    render_step(&nav);
                } else {
                    println!("already at the first step");
                }
            }
            LessonCommand::Run => {
                println!("running...");
                match lessons.run_code(&mut nav).await {
                    Ok(report) => {
                        println!("{}", report.output);
                        if let Some(verdict) = &report.verdict {
                            render_verdict(verdict);
                        }
                    }
                    Err(err) => println!("{err}"),
                }
            }
            LessonCommand::Check => {
                println!("checking...");
                match lessons.check_answer(&mut nav).await {
                    Ok(verdict) => render_verdict(&verdict),
                    Err(err) => println!("{err}"),
                }
            }
            LessonCommand::Select(index) => match lessons.select_option(&mut nav, index) {
                Ok(verdict) => render_verdict(&verdict),
                Err(err) => println!("{err}"),
            },
            LessonCommand::Edit => {
                if nav.current_step().kind().exercise().is_none() {
                    println!("this step has no editor");
                    continue;
                }
                println!("enter code, finish with a line containing only '{BLOCK_END}'");
                let code = input.read_block().await?;
                match nav.edit_answer(code) {
                    Ok(()) => render_step(&nav),
                    Err(err) => println!("{err}"),
                }
            }
            LessonCommand::Reset => match nav.reset_answer() {
                Ok(()) => render_step(&nav),
                Err(err) => println!("{err}"),
            },
            LessonCommand::Hint => match nav.reveal_next_hint() {
                Some(hint) => println!("hint: {hint}"),
                None => println!("no more hints"),
            },
            LessonCommand::HideHints => nav.hide_hints(),
            LessonCommand::Solution => match nav.toggle_solution() {
                Ok(true) => {
                    if let Some(solution) = nav.visible_solution() {
                        println!("{solution}");
                    }
                }
                Ok(false) => println!("solution hidden"),
                Err(err) => println!("{err}"),
            },
            LessonCommand::Jump(index) => match nav.jump_to(index) {
                Ok(()) => render_step(&nav),
                Err(err) => println!("{err}"),
            },
        }
    }
    Ok(())
}

//
// ─── DASHBOARD ─────────────────────────────────────────────────────────────────
//

pub fn render_dashboard(snapshot: &DashboardSnapshot) {
    println!();
    println!(
        "Overall progress: {}% ({}/{} lessons)",
        snapshot.overall_percent, snapshot.completed_lessons, snapshot.total_lessons
    );
    for module in &snapshot.modules {
        println!("  {:<24} {:>3}%", module.title, module.percent);
    }
    println!("Lessons:");
    for lesson in &snapshot.lessons {
        let status = if lesson.complete {
            "done"
        } else if lesson.locked {
            "locked"
        } else {
            "open"
        };
        println!(
            "  {}. {:<36} {:>3}%  {status} ({})",
            lesson.lesson_id, lesson.title, lesson.percent, lesson.difficulty
        );
    }
    if snapshot.recommended.is_empty() {
        println!("Nothing left to recommend. Well done!");
    } else {
        let ids: Vec<String> = snapshot.recommended.iter().map(ToString::to_string).collect();
        println!("Up next: {}", ids.join(", "));
    }
}

//
// ─── PLAYGROUND ────────────────────────────────────────────────────────────────
//

fn print_playground_help() {
    println!("Commands:");
    println!("  run                    run the editor code");
    println!("  edit                   replace the editor text (end with a line '.')");
    println!("  template <name>        load a starter program");
    println!("  clear | show | help | quit");
}

fn render_playground(playground: &Playground) {
    println!("--- editor ---");
    println!("{}", playground.code());
    if let Some(output) = playground.output() {
        println!("--- output ---");
        println!("{output}");
    }
}

/// # Errors
///
/// Returns an error on terminal I/O failures.
pub async fn run_playground(app: &AppServices, input: &mut Input) -> Result<(), Box<dyn Error>> {
    let service = app.playground();
    let mut playground = Playground::new();
    render_playground(&playground);

    while let Some(line) = input.prompt("playground> ").await? {
        let mut words = line.split_whitespace();
        match words.next().unwrap_or("show") {
            "r" | "run" => {
                println!("running...");
                match service.run(&mut playground).await {
                    Ok(output) => println!("{output}"),
                    Err(err) => println!("{err}"),
                }
            }
            "e" | "edit" => {
                println!("enter code, finish with a line containing only '{BLOCK_END}'");
                let code = input.read_block().await?;
                playground.set_code(code);
            }
            "t" | "template" => match words.next() {
                Some(name) => match playground.load_template(name) {
                    Ok(()) => render_playground(&playground),
                    Err(err) => println!("{err}"),
                },
                None => {
                    let names: Vec<&str> = TEMPLATES.iter().map(|(name, _)| *name).collect();
                    println!("templates: {}", names.join(", "));
                }
            },
            "clear" => playground.clear(),
            "show" => render_playground(&playground),
            "?" | "help" => print_playground_help(),
            "q" | "quit" | "exit" => break,
            other => eprintln!("unknown command: {other} (try `help`)"),
        }
    }
    Ok(())
}
