use std::fmt;

use course_core::model::{
    CRITERIA, CardId, Curriculum, EngineSettings, EngineSettingsDraft, NEXT_STEPS, UserId,
};
use course_core::optimistic::WriteOutcome;
use services::{AppServices, CardView, Clock, SaveAttempt, SectionView, UserSession};
use storage::repository::Storage;
use storage::rest::RestConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EMBEDDED_CURRICULUM: &str = include_str!("../curriculum.json");

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { command: &'static str, name: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidDbUrl { raw: String },
    InvalidUserId { raw: String },
    InvalidDebounce { raw: String },
    InvalidIndex { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { command, name } => {
                write!(f, "{command} requires <{name}>")
            }
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidUserId { raw } => write!(f, "invalid --user value: {raw}"),
            ArgsError::InvalidDebounce { raw } => write!(f, "invalid --debounce-ms value: {raw}"),
            ArgsError::InvalidIndex { raw } => write!(f, "invalid item index: {raw}"),
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
    eprintln!("  cargo run -p app -- [options] board");
    eprintln!("  cargo run -p app -- [options] open <card>");
    eprintln!("  cargo run -p app -- [options] toggle <card>");
    eprintln!("  cargo run -p app -- [options] check <card> <index>");
    eprintln!("  cargo run -p app -- [options] checklist <card>");
    eprintln!("  cargo run -p app -- [options] note <card> <text>");
    eprintln!("  cargo run -p app -- [options] diagnostic [<criterion>=<level> ...] [--step <id> ...] [--unstep <id> ...]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>       default sqlite://course.sqlite3");
    eprintln!("  --user <uuid>           signed-in user; anonymous when absent");
    eprintln!("  --curriculum <path>     curriculum JSON; embedded course when absent");
    eprintln!("  --debounce-ms <ms>      note autosave delay, default 1000");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  COURSE_DB_URL, COURSE_USER_ID, COURSE_CURRICULUM, COURSE_NOTE_DEBOUNCE_MS,");
    eprintln!("  COURSE_ONBOARDING_CARD, RUST_LOG");
    eprintln!("  COURSE_REST_URL, COURSE_REST_KEY, COURSE_REST_TOKEN  # REST storage instead of SQLite");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Board,
    Open(CardId),
    Toggle(CardId),
    Check(CardId, usize),
    Checklist(CardId),
    Note(CardId, String),
    Diagnostic {
        answers: Vec<(String, String)>,
        steps: Vec<String>,
        cleared: Vec<String>,
    },
}

impl Command {
    fn parse(
        positional: Vec<String>,
        steps: Vec<String>,
        cleared: Vec<String>,
    ) -> Result<Self, ArgsError> {
        let mut iter = positional.into_iter();
        let Some(name) = iter.next() else {
            return Ok(Self::Board);
        };
        match name.as_str() {
            "board" => Ok(Self::Board),
            "open" => Ok(Self::Open(next_card(&mut iter, "open")?)),
            "toggle" => Ok(Self::Toggle(next_card(&mut iter, "toggle")?)),
            "checklist" => Ok(Self::Checklist(next_card(&mut iter, "checklist")?)),
            "check" => {
                let card_id = next_card(&mut iter, "check")?;
                let raw = iter.next().ok_or(ArgsError::MissingArgument {
                    command: "check",
                    name: "index",
                })?;
                let index = raw
                    .parse()
                    .map_err(|_| ArgsError::InvalidIndex { raw: raw.clone() })?;
                Ok(Self::Check(card_id, index))
            }
            "note" => {
                let card_id = next_card(&mut iter, "note")?;
                let text: Vec<String> = iter.collect();
                if text.is_empty() {
                    return Err(ArgsError::MissingArgument {
                        command: "note",
                        name: "text",
                    });
                }
                Ok(Self::Note(card_id, text.join(" ")))
            }
            "diagnostic" => {
                let answers = iter
                    .map(|pair| match pair.split_once('=') {
                        Some((criterion, level)) => Ok((criterion.to_owned(), level.to_owned())),
                        None => Err(ArgsError::UnknownArg(pair)),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::Diagnostic {
                    answers,
                    steps,
                    cleared,
                })
            }
            _ => Err(ArgsError::UnknownCommand(name)),
        }
    }
}

fn next_card(
    args: &mut impl Iterator<Item = String>,
    command: &'static str,
) -> Result<CardId, ArgsError> {
    args.next()
        .map(CardId::new)
        .ok_or(ArgsError::MissingArgument {
            command,
            name: "card",
        })
}

struct Args {
    db_url: String,
    user_id: Option<UserId>,
    curriculum_path: Option<String>,
    debounce_ms: Option<u32>,
    onboarding_card: Option<String>,
    command: Command,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("COURSE_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://course.sqlite3".into(), normalize_sqlite_url);
        let mut user_id = std::env::var("COURSE_USER_ID")
            .ok()
            .and_then(|value| value.parse::<UserId>().ok());
        let mut curriculum_path = std::env::var("COURSE_CURRICULUM").ok();
        let mut debounce_ms = std::env::var("COURSE_NOTE_DEBOUNCE_MS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok());
        let onboarding_card = std::env::var("COURSE_ONBOARDING_CARD").ok();

        let mut positional = Vec::new();
        let mut steps = Vec::new();
        let mut cleared = Vec::new();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--user" => {
                    let value = require_value(args, "--user")?;
                    let parsed = value
                        .parse::<UserId>()
                        .map_err(|_| ArgsError::InvalidUserId { raw: value.clone() })?;
                    user_id = Some(parsed);
                }
                "--curriculum" => {
                    curriculum_path = Some(require_value(args, "--curriculum")?);
                }
                "--debounce-ms" => {
                    let value = require_value(args, "--debounce-ms")?;
                    let parsed = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidDebounce { raw: value.clone() })?;
                    debounce_ms = Some(parsed);
                }
                "--step" => steps.push(require_value(args, "--step")?),
                "--unstep" => cleared.push(require_value(args, "--unstep")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ if arg.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }

        Ok(Self {
            db_url,
            user_id,
            curriculum_path,
            debounce_ms,
            onboarding_card,
            command: Command::parse(positional, steps, cleared)?,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn read_curriculum(path: Option<&str>) -> std::io::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path),
        None => Ok(EMBEDDED_CURRICULUM.to_owned()),
    }
}

fn engine_inputs(
    raw_curriculum: &str,
    args: &Args,
) -> Result<(Curriculum, EngineSettings), course_core::Error> {
    let settings = EngineSettingsDraft {
        note_debounce_ms: args.debounce_ms,
        onboarding_card: args.onboarding_card.clone(),
    }
    .validate()?;
    let curriculum = Curriculum::from_json(raw_curriculum)?;
    Ok((curriculum, settings))
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// ─── Output ──────────────────────────────────────────────────────────────────

fn print_board(session: &UserSession) {
    println!("course progress {}%", session.overall_percentage());
    let states = session.board();
    for (module, state) in session.curriculum().modules().iter().zip(states) {
        let lock = if state.locked { "locked" } else { "open" };
        println!(
            "{}. {} [{lock}] {}%",
            state.position + 1,
            module.title(),
            state.percentage
        );
        for card in module.cards() {
            let mark = if session.progress().progress().get(card.id()) {
                "x"
            } else {
                " "
            };
            let bonus = if card.is_bonus() { " (bonus)" } else { "" };
            println!(
                "   [{mark}] {} {}{bonus} ({})",
                card.id(),
                card.title(),
                card.kind().as_str()
            );
        }
    }
}

fn print_card(view: &CardView) {
    let mark = if view.completed { "done" } else { "open" };
    println!("{} {} [{mark}]", view.card_id, view.title);
    if let Some(description) = &view.description {
        println!("{description}");
    }
    if view.checklist.total > 0 {
        println!(
            "checklist {}/{} ({}%)",
            view.checklist.completed, view.checklist.total, view.checklist.percentage
        );
    }
    for section in &view.sections {
        match section {
            SectionView::Text(text) => println!("{text}"),
            SectionView::Checklist { items, stats } => {
                for item in items {
                    let mark = if item.completed { "x" } else { " " };
                    println!("  {:>2} [{mark}] {}", item.index, item.text);
                }
                println!("     {}/{} in this section", stats.completed, stats.total);
            }
        }
    }
}

fn print_outcome(what: &str, outcome: WriteOutcome) {
    match outcome {
        WriteOutcome::Persisted { completed } => println!("{what}: completed = {completed}"),
        WriteOutcome::Reverted { completed } => {
            println!("{what}: could not be saved, still completed = {completed}");
        }
        WriteOutcome::Ignored => println!("{what}: sign in (--user) to record progress"),
    }
}

// ─── Commands ────────────────────────────────────────────────────────────────

async fn run_command(
    session: &mut UserSession,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Board => print_board(session),
        Command::Open(card_id) => {
            let view = session.open_card(&card_id).await?;
            print_card(&view);
            if let Some(note) = session.notes().current() {
                if !note.content().is_empty() {
                    println!("--- note ---\n{}", note.content());
                }
            }
        }
        Command::Toggle(card_id) => {
            let outcome = session.toggle_card(&card_id).await?;
            print_outcome(card_id.as_str(), outcome);
        }
        Command::Check(card_id, index) => {
            session.open_card(&card_id).await?;
            let outcome = session.toggle_item(&card_id, index).await?;
            print_outcome(&format!("{card_id} item {index}"), outcome);
        }
        Command::Checklist(card_id) => {
            let view = session.checklist_view(&card_id)?;
            print_card(&view);
        }
        Command::Note(card_id, text) => {
            session.open_card(&card_id).await?;
            session.notes_mut().edit(text);
            if let Some(wait) = session.notes().time_until_due() {
                tokio::time::sleep(wait).await;
            }
            match session.notes_mut().tick().await {
                Some(SaveAttempt::Saved { at }) => println!("note saved at {at}"),
                Some(SaveAttempt::Failed { message }) => println!("note not saved: {message}"),
                None if session.is_anonymous() => println!("sign in (--user) to save notes"),
                None => {}
            }
        }
        Command::Diagnostic {
            answers,
            steps,
            cleared,
        } => {
            if answers.is_empty() && steps.is_empty() && cleared.is_empty() {
                let diagnostic = session.load_diagnostic().await;
                for criterion in CRITERIA {
                    let level = diagnostic
                        .level(criterion.id)
                        .map_or("-", |level| level.as_str());
                    println!("{:<24} {level}", criterion.id);
                }
                println!("next steps: {}", diagnostic.next_steps().join(", "));
                println!(
                    "score {}/{}: {}",
                    diagnostic.score(),
                    CRITERIA.len(),
                    diagnostic.band().headline()
                );
                let available: Vec<&str> = NEXT_STEPS.iter().map(|(id, _)| *id).collect();
                println!("available next steps: {}", available.join(", "));
            } else {
                let answers: Vec<(&str, &str)> = answers
                    .iter()
                    .map(|(criterion, level)| (criterion.as_str(), level.as_str()))
                    .collect();
                let steps: Vec<&str> = steps.iter().map(String::as_str).collect();
                let cleared: Vec<&str> = cleared.iter().map(String::as_str).collect();
                let record = session
                    .update_diagnostic(&answers, &steps, &cleared)
                    .await?;
                println!(
                    "diagnostic saved: score {}/{} ({})",
                    record.score,
                    CRITERIA.len(),
                    record.diagnostic.band().headline()
                );
            }
        }
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let args = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let raw_curriculum = read_curriculum(args.curriculum_path.as_deref())?;
    let (curriculum, settings) = engine_inputs(&raw_curriculum, &args)?;

    let clock = Clock::default_clock();
    let services = match RestConfig::from_env() {
        Some(config) => {
            tracing::debug!(url = %config.base_url, "using REST storage");
            AppServices::new(clock, Storage::rest(config), curriculum, settings)?
        }
        None => {
            // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
            prepare_sqlite_file(&args.db_url)?;
            let services = AppServices::new_sqlite(&args.db_url, clock, curriculum, settings).await?;
            tracing::debug!(db = %args.db_url, "storage ready");
            services
        }
    };

    let mut session = services.session_for(args.user_id).await;
    let result = run_command(&mut session, args.command).await;
    if let Some(SaveAttempt::Failed { message }) = session.sign_out().await {
        eprintln!("unsaved note: {message}");
    }
    result
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
