mod logging;
mod repl;

use std::fmt;
use std::path::PathBuf;

use lesson_core::model::{EngineSettings, LessonId};
use services::{AppServices, Clock};
use storage::catalog::JsonCatalogSource;

use repl::Input;

#[derive(Debug, PartialEq, Eq)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidLessonId { raw: String },
    InvalidRunDelay { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidLessonId { raw } => write!(f, "invalid --lesson value: {raw}"),
            ArgsError::InvalidRunDelay { raw } => write!(f, "invalid --run-delay-ms value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  pythonchik [learn]    [options]   # play a lesson");
    eprintln!("  pythonchik dashboard  [options]   # show progress and recommendations");
    eprintln!("  pythonchik playground [options]   # free-form code runner");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>       default sqlite://pythonchik.sqlite3");
    eprintln!("  --lesson <id>           default: first recommended lesson");
    eprintln!("  --catalog <file.json>   default: built-in course");
    eprintln!("  --run-delay-ms <ms>     simulated execution delay, default 1000");
    eprintln!("  -v, --verbose           more logging (repeatable)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  CHIK_DB_URL, CHIK_LESSON_ID, CHIK_CATALOG, CHIK_RUN_DELAY_MS, CHIK_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Learn,
    Dashboard,
    Playground,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "learn" => Some(Self::Learn),
            "dashboard" => Some(Self::Dashboard),
            "playground" => Some(Self::Playground),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Args {
    db_url: String,
    lesson_id: Option<LessonId>,
    catalog: Option<PathBuf>,
    run_delay_ms: Option<u64>,
    verbosity: u8,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            db_url: "sqlite://pythonchik.sqlite3".into(),
            lesson_id: None,
            catalog: None,
            run_delay_ms: None,
            verbosity: 0,
        }
    }
}

fn parse_lesson_id(raw: String) -> Result<LessonId, ArgsError> {
    raw.parse::<LessonId>()
        .map_err(|_| ArgsError::InvalidLessonId { raw })
}

fn parse_run_delay(raw: String) -> Result<u64, ArgsError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ArgsError::InvalidRunDelay { raw })
}

impl Args {
    /// Defaults overridden by `CHIK_*` variables. Flags override both.
    fn from_env() -> Result<Self, ArgsError> {
        let mut args = Self::default();
        if let Ok(value) = std::env::var("CHIK_DB_URL") {
            args.db_url = normalize_sqlite_url(value);
        }
        if let Ok(value) = std::env::var("CHIK_LESSON_ID") {
            args.lesson_id = Some(parse_lesson_id(value)?);
        }
        if let Ok(value) = std::env::var("CHIK_CATALOG") {
            args.catalog = Some(PathBuf::from(value));
        }
        if let Ok(value) = std::env::var("CHIK_RUN_DELAY_MS") {
            args.run_delay_ms = Some(parse_run_delay(value)?);
        }
        Ok(args)
    }

    fn parse(mut self, args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    self.db_url = normalize_sqlite_url(value);
                }
                "--lesson" => {
                    self.lesson_id = Some(parse_lesson_id(require_value(args, "--lesson")?)?);
                }
                "--catalog" => {
                    self.catalog = Some(PathBuf::from(require_value(args, "--catalog")?));
                }
                "--run-delay-ms" => {
                    self.run_delay_ms =
                        Some(parse_run_delay(require_value(args, "--run-delay-ms")?)?);
                }
                "-v" | "--verbose" => self.verbosity = self.verbosity.saturating_add(1),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }
        Ok(self)
    }

    fn settings(&self) -> Result<EngineSettings, Box<dyn std::error::Error>> {
        let settings = EngineSettings::default();
        Ok(match self.run_delay_ms {
            Some(ms) => settings.with_run_delay_ms(ms)?,
            None => settings,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim();
    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = std::path::Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Create the database directory; the pool creates the file itself.
fn prepare_sqlite_dir(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .map(|rest| rest.split('?').next().unwrap_or(rest))
        .filter(|path| !path.is_empty())
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    if let Some(parent) = std::path::Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Learn,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with('-') => Command::Learn,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    if argv.first().is_some_and(|first| !first.starts_with('-')) {
        argv.remove(0);
    }

    let parsed = Args::from_env()
        .and_then(|defaults| defaults.parse(&mut argv.into_iter()))
        .map_err(|e| {
            eprintln!("{e}");
            print_usage();
            e
        })?;

    if let Err(err) = logging::init_logging(parsed.verbosity) {
        eprintln!("logging disabled: {err}");
    }

    let catalog = match &parsed.catalog {
        Some(path) => JsonCatalogSource::from_file(path.clone()),
        None => JsonCatalogSource::builtin(),
    };
    prepare_sqlite_dir(&parsed.db_url)?;
    let app =
        AppServices::new_sqlite(&parsed.db_url, &catalog, Clock::System, parsed.settings()?).await?;
    tracing::info!(db = %parsed.db_url, command = ?cmd, "starting");

    let mut input = Input::stdin();
    match cmd {
        Command::Learn => {
            let lesson_id = match parsed.lesson_id {
                Some(id) => id,
                None => app
                    .dashboard()
                    .snapshot()
                    .await?
                    .recommended
                    .first()
                    .copied()
                    .unwrap_or_else(|| LessonId::new(1)),
            };
            repl::run_lesson(&app, lesson_id, &mut input).await?;
        }
        Command::Dashboard => {
            repl::render_dashboard(&app.dashboard().snapshot().await?);
        }
        Command::Playground => {
            repl::run_playground(&app, &mut input).await?;
        }
    }

    let unsaved = app.progress().flush().await;
    if unsaved > 0 {
        tracing::warn!(lessons = unsaved, "some progress could not be saved");
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        Args::default().parse(&mut args.iter().map(|arg| (*arg).to_owned()))
    }

    #[test]
    fn flags_override_defaults() {
        let args = parse(&[
            "--db",
            "sqlite::memory:",
            "--lesson",
            "5",
            "--run-delay-ms",
            "0",
            "-v",
            "-v",
        ])
        .unwrap();
        assert_eq!(args.db_url, "sqlite::memory:");
        assert_eq!(args.lesson_id, Some(LessonId::new(5)));
        assert_eq!(args.run_delay_ms, Some(0));
        assert_eq!(args.verbosity, 2);
        assert_eq!(args.settings().unwrap().run_delay_ms(), 0);
    }

    #[test]
    fn bad_flags_are_reported() {
        assert_eq!(
            parse(&["--lesson"]),
            Err(ArgsError::MissingValue { flag: "--lesson" })
        );
        assert_eq!(
            parse(&["--lesson", "first"]),
            Err(ArgsError::InvalidLessonId {
                raw: "first".into()
            })
        );
        assert_eq!(
            parse(&["--db", " "]),
            Err(ArgsError::InvalidDbUrl { raw: " ".into() })
        );
        assert_eq!(
            parse(&["--fast"]),
            Err(ArgsError::UnknownArg("--fast".into()))
        );
    }

    #[test]
    fn excessive_run_delay_is_rejected_by_settings() {
        let args = parse(&["--run-delay-ms", "60000"]).unwrap();
        assert!(args.settings().is_err());
    }

    #[test]
    fn sqlite_urls_are_made_absolute() {
        assert_eq!(
            normalize_sqlite_url("sqlite::memory:".into()),
            "sqlite::memory:"
        );
        assert_eq!(
            normalize_sqlite_url("sqlite:///tmp/chik.db".into()),
            "sqlite:///tmp/chik.db"
        );
        let relative = normalize_sqlite_url("sqlite:chik.db".into());
        assert!(relative.starts_with("sqlite:///"));
        assert!(relative.ends_with("chik.db"));
    }

    #[test]
    fn subcommands_are_recognised() {
        assert_eq!(Command::from_arg("playground"), Some(Command::Playground));
        assert_eq!(Command::from_arg("ui"), None);
    }
}
