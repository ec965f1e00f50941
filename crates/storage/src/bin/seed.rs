use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use edu_core::model::{Question, QuestionId, UserId};
use serde::Deserialize;
use storage::repository::{Profile, Storage};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    questions: Option<PathBuf>,
    user: UserId,
    display_name: String,
    credits: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidUser { raw: String },
    InvalidCredits { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidUser { raw } => write!(f, "invalid --user value: {raw}"),
            ArgsError::InvalidCredits { raw } => write!(f, "invalid --credits value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("EDU_DB_URL").unwrap_or_else(|_| "sqlite:edusentri.sqlite3".into());
        let mut user = std::env::var("EDU_USER_ID")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map_or_else(|| UserId::new(1), UserId::new);
        let mut credits = std::env::var("EDU_CHAT_CREDITS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(20);
        let mut questions = None;
        let mut display_name = "Estudante".to_owned();
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--questions" => {
                    questions = Some(PathBuf::from(require_value(&mut args, "--questions")?));
                }
                "--user" => {
                    let value = require_value(&mut args, "--user")?;
                    let parsed: u64 = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidUser { raw: value.clone() })?;
                    user = UserId::new(parsed);
                }
                "--name" => {
                    display_name = require_value(&mut args, "--name")?;
                }
                "--credits" => {
                    let value = require_value(&mut args, "--credits")?;
                    credits = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidCredits { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            questions,
            user,
            display_name,
            credits,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:edusentri.sqlite3)");
    eprintln!("  --questions <file.json>   Question bank to load (default: built-in samples)");
    eprintln!("  --user <id>               Profile to create (default: 1)");
    eprintln!("  --name <text>             Profile display name (default: Estudante)");
    eprintln!("  --credits <n>             Chat credits to grant (default: 20)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  EDU_DB_URL, EDU_USER_ID, EDU_CHAT_CREDITS");
}

/// One entry of a question-bank JSON file.
#[derive(Debug, Deserialize)]
struct QuestionSeed {
    id: u64,
    area: Option<String>,
    disciplina: Option<String>,
    statement: String,
    options: Vec<String>,
    correct_option: usize,
    #[serde(default)]
    explanation: String,
}

impl QuestionSeed {
    fn into_question(self) -> Result<Question, edu_core::model::QuestionError> {
        Question::new(
            QuestionId::new(self.id),
            self.area.as_deref(),
            self.disciplina.as_deref(),
            self.statement,
            self.options,
            self.correct_option,
            self.explanation,
        )
    }
}

fn sample_questions() -> Vec<QuestionSeed> {
    let samples = [
        (
            "Raciocínio Lógico",
            "Proposições",
            "Qual é a negação de \"todo aluno estuda\"?",
            ["Nenhum aluno estuda", "Algum aluno não estuda", "Todo aluno não estuda"],
            1,
        ),
        (
            "Raciocínio Lógico",
            "Sequências",
            "Qual o próximo termo de 2, 4, 8, 16?",
            ["24", "32", "30"],
            1,
        ),
        (
            "Língua Portuguesa",
            "Crase",
            "Em qual frase a crase está correta?",
            ["Vou à praia", "Vou à pé", "Refiro-me à você"],
            0,
        ),
        (
            "Língua Portuguesa",
            "Concordância",
            "Qual forma está correta?",
            ["Fazem dois anos", "Faz dois anos", "Fazem-se dois anos"],
            1,
        ),
        (
            "Direito Constitucional",
            "Direitos Fundamentais",
            "O habeas corpus protege qual direito?",
            ["Liberdade de locomoção", "Acesso à informação", "Propriedade"],
            0,
        ),
    ];

    samples
        .into_iter()
        .zip(1_u64..)
        .map(
            |((area, disciplina, statement, options, correct), id)| QuestionSeed {
                id,
                area: Some(area.to_owned()),
                disciplina: Some(disciplina.to_owned()),
                statement: statement.to_owned(),
                options: options.iter().map(|o| (*o).to_owned()).collect(),
                correct_option: correct,
                explanation: String::new(),
            },
        )
        .collect()
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let seeds = match &args.questions {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str::<Vec<QuestionSeed>>(&raw)?
        }
        None => sample_questions(),
    };

    let mut loaded = 0_usize;
    for seed in seeds {
        let question = seed.into_question()?;
        storage.questions.upsert_question(&question).await?;
        loaded += 1;
    }

    if storage.profiles.get_profile(args.user).await?.is_none() {
        storage
            .profiles
            .upsert_profile(&Profile {
                user_id: args.user,
                display_name: args.display_name.clone(),
                created_at: now,
            })
            .await?;
    }
    storage
        .chat_credits
        .set_credits(args.user, args.credits)
        .await?;

    println!(
        "Seeded {loaded} questions and {} chat credits for user {} into {}",
        args.credits, args.user, args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
