use std::fmt;
use std::path::PathBuf;

use edu_core::model::{QuizType, SlotKey, UserId};
use services::AppConfig;

pub const DEFAULT_CACHE_DIR: &str = ".edusentri";
const DEFAULT_QUESTION_COUNT: usize = 10;

#[derive(Debug)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { what: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidDbUrl { raw: String },
    InvalidUser { raw: String },
    InvalidQuizType { raw: String },
    InvalidCount { raw: String },
    InvalidOption { raw: String },
    InvalidIndex { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { what } => write!(f, "missing {what}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidUser { raw } => write!(f, "invalid --user value: {raw}"),
            ArgsError::InvalidQuizType { raw } => write!(
                f,
                "invalid --type value (general, area, discipline, practice, review): {raw}"
            ),
            ArgsError::InvalidCount { raw } => write!(f, "invalid --count value: {raw}"),
            ArgsError::InvalidOption { raw } => {
                write!(f, "invalid option (expected a letter like A or B): {raw}")
            }
            ArgsError::InvalidIndex { raw } => write!(f, "invalid question number: {raw}"),
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

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start { slot: SlotKey, count: usize },
    Show { slot: SlotKey },
    Answer { slot: SlotKey, option: usize },
    GoTo { slot: SlotKey, index: usize },
    Finish { slot: SlotKey },
    Abandon { slot: SlotKey },
    Best { slot: SlotKey },
    History,
    Mastery,
    Review { clear: bool },
    Chat { message: String, context: Option<String> },
    Credits,
    Help,
}

#[derive(Debug, Clone)]
pub struct Cli {
    pub config: AppConfig,
    pub command: Command,
}

/// Quiz slot flags shared by the quiz commands.
#[derive(Debug, Default)]
struct SlotArgs {
    quiz_type: Option<QuizType>,
    area: Option<String>,
    disciplina: Option<String>,
}

impl SlotArgs {
    fn into_slot(self) -> SlotKey {
        SlotKey::new(
            self.quiz_type.unwrap_or(QuizType::General),
            self.area.as_deref(),
            self.disciplina.as_deref(),
        )
    }
}

impl Cli {
    /// Parse `args` (without the program name) on top of `config`.
    ///
    /// Global flags may appear anywhere; the first free word picks the command.
    pub fn parse(
        mut config: AppConfig,
        args: impl IntoIterator<Item = String>,
    ) -> Result<Self, ArgsError> {
        let mut args = args.into_iter();
        let mut command: Option<String> = None;
        let mut positional: Vec<String> = Vec::new();
        let mut slot = SlotArgs::default();
        let mut count = DEFAULT_QUESTION_COUNT;
        let mut context = None;
        let mut clear = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    config.db_url = value;
                }
                "--user" => {
                    let value = require_value(&mut args, "--user")?;
                    let parsed: u64 = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidUser { raw: value.clone() })?;
                    config.user_id = UserId::new(parsed);
                }
                "--cache-dir" => {
                    config.cache_dir = Some(PathBuf::from(require_value(&mut args, "--cache-dir")?));
                }
                "--type" => {
                    let value = require_value(&mut args, "--type")?;
                    let parsed = value
                        .parse::<QuizType>()
                        .map_err(|_| ArgsError::InvalidQuizType { raw: value.clone() })?;
                    slot.quiz_type = Some(parsed);
                }
                "--area" => slot.area = Some(require_value(&mut args, "--area")?),
                "--disciplina" => slot.disciplina = Some(require_value(&mut args, "--disciplina")?),
                "--count" => {
                    let value = require_value(&mut args, "--count")?;
                    count = value
                        .parse::<usize>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or(ArgsError::InvalidCount { raw: value.clone() })?;
                }
                "--context" => context = Some(require_value(&mut args, "--context")?),
                "--clear" => clear = true,
                "--help" | "-h" => {
                    return Ok(Self {
                        config,
                        command: Command::Help,
                    });
                }
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ if command.is_none() => command = Some(arg),
                _ => positional.push(arg),
            }
        }

        if config.cache_dir.is_none() {
            config.cache_dir = Some(PathBuf::from(DEFAULT_CACHE_DIR));
        }

        let mut positional = positional.into_iter();
        let command = match command.as_deref() {
            None | Some("help") => Command::Help,
            Some("start") => Command::Start {
                slot: slot.into_slot(),
                count,
            },
            Some("show") => Command::Show {
                slot: slot.into_slot(),
            },
            Some("answer") => {
                let raw = positional.next().ok_or(ArgsError::MissingArgument {
                    what: "option to answer",
                })?;
                Command::Answer {
                    slot: slot.into_slot(),
                    option: parse_option(&raw)?,
                }
            }
            Some("goto") => {
                let raw = positional.next().ok_or(ArgsError::MissingArgument {
                    what: "question number",
                })?;
                let index = raw
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .ok_or(ArgsError::InvalidIndex { raw: raw.clone() })?;
                Command::GoTo {
                    slot: slot.into_slot(),
                    index,
                }
            }
            Some("finish") => Command::Finish {
                slot: slot.into_slot(),
            },
            Some("abandon") => Command::Abandon {
                slot: slot.into_slot(),
            },
            Some("best") => Command::Best {
                slot: slot.into_slot(),
            },
            Some("history") => Command::History,
            Some("mastery") => Command::Mastery,
            Some("review") => Command::Review { clear },
            Some("chat") => {
                let message = positional.by_ref().collect::<Vec<_>>().join(" ");
                if message.trim().is_empty() {
                    return Err(ArgsError::MissingArgument { what: "chat message" });
                }
                Command::Chat { message, context }
            }
            Some("credits") => Command::Credits,
            Some(other) => return Err(ArgsError::UnknownCommand(other.to_owned())),
        };

        if let Some(extra) = positional.next() {
            return Err(ArgsError::UnknownArg(extra));
        }

        Ok(Self { config, command })
    }
}

/// Accepts an option letter (`A`, `b`) and returns its index.
fn parse_option(raw: &str) -> Result<usize, ArgsError> {
    let mut chars = raw.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => {
            Ok(usize::from(c.to_ascii_uppercase() as u8 - b'A'))
        }
        _ => Err(ArgsError::InvalidOption {
            raw: raw.to_owned(),
        }),
    }
}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  edusentri <command> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  start      Start or resume a quiz");
    eprintln!("  show       Show the current question of a quiz");
    eprintln!("  answer <letter>   Answer the current question");
    eprintln!("  goto <n>   Jump to question n");
    eprintln!("  finish     Score the quiz and keep it if it beats your best");
    eprintln!("  abandon    Drop the quiz in progress");
    eprintln!("  best       Show your best attempt for a quiz");
    eprintln!("  history    List your best attempts");
    eprintln!("  mastery    Show mastery per area");
    eprintln!("  review     List questions queued for review (--clear to empty)");
    eprintln!("  chat <message>    Ask the study assistant (--context <text>)");
    eprintln!("  credits    Show remaining chat credits");
    eprintln!();
    eprintln!("Quiz options:");
    eprintln!("  --type <type>             general, area, discipline, practice, review");
    eprintln!("  --area <name>             Subject area");
    eprintln!("  --disciplina <name>       Discipline within the area");
    eprintln!("  --count <n>               Questions in a new quiz (default: 10)");
    eprintln!();
    eprintln!("Global options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:edusentri.sqlite3)");
    eprintln!("  --user <id>               User id (default: 1)");
    eprintln!("  --cache-dir <dir>         Local cache directory (default: {DEFAULT_CACHE_DIR})");
    eprintln!();
    eprintln!("Environment:");
    eprintln!(
        "  EDU_DB_URL, EDU_USER_ID, EDU_CACHE_DIR, EDU_CHAT_WEBHOOK_URL, EDU_CHAT_CREDITS, RUST_LOG"
    );
}
