mod args;

use edu_core::model::{ActiveSession, Attempt, SlotKey, option_label};
use services::{AppConfig, AppServices, Clock, CurrentBest, SaveOutcome};

use crate::args::{Cli, Command, print_usage};

fn init_logging() {
    let mut builder = env_logger::Builder::from_default_env();
    if std::env::var_os("RUST_LOG").is_none() {
        builder.filter_level(log::LevelFilter::Info);
    }
    builder.init();
}

fn print_question(session: &ActiveSession) {
    let Some(question) = session.current_question() else {
        println!(
            "All {} questions visited ({} answered). Run `finish` to score the quiz.",
            session.questions().len(),
            session.answered_count()
        );
        return;
    };

    println!(
        "[{}] Question {}/{}",
        session.slot_key(),
        session.current_index() + 1,
        session.questions().len()
    );
    if let Some(area) = &question.area {
        println!("Area: {area}");
    }
    println!("{}", question.statement);
    for (index, option) in question.options.iter().enumerate() {
        println!("  {}) {option}", option_label(index));
    }
    if let Some(selected) = session.answers()[session.current_index()] {
        println!("(answered {})", option_label(selected));
    }
}

fn print_attempt(attempt: &Attempt) {
    println!(
        "{}  {}  {}/{} correct, {} wrong  {}%",
        attempt.completed_at().format("%Y-%m-%d %H:%M"),
        attempt.slot_key(),
        attempt.correct_count(),
        attempt.total_questions(),
        attempt.incorrect_count(),
        attempt.percentage()
    );
}

fn no_quiz(slot: &SlotKey) -> Box<dyn std::error::Error> {
    format!("no quiz in progress for {slot}; run `start` first").into()
}

async fn execute(app: &AppServices, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    let user = app.user_id();
    let quiz = app.quiz();

    match command {
        Command::Help => print_usage(),
        Command::Start { slot, count } => {
            let session = quiz.start(user, &slot, count).await?;
            print_question(&session);
        }
        Command::Show { slot } => {
            let session = quiz.snapshot(user, &slot).ok_or_else(|| no_quiz(&slot))?;
            print_question(&session);
        }
        Command::Answer { slot, option } => {
            let mut session = quiz.snapshot(user, &slot).ok_or_else(|| no_quiz(&slot))?;
            let feedback = quiz.answer(user, &mut session, option)?;
            if feedback.correct {
                println!("Correct!");
            } else {
                println!(
                    "Wrong: you chose {}, the answer is {}.",
                    option_label(feedback.selected),
                    feedback.question.correct_label()
                );
            }
            if !feedback.question.explanation.is_empty() {
                println!("{}", feedback.question.explanation);
            }
            println!();
            print_question(&session);
        }
        Command::GoTo { slot, index } => {
            let mut session = quiz.snapshot(user, &slot).ok_or_else(|| no_quiz(&slot))?;
            quiz.go_to(user, &mut session, index)?;
            print_question(&session);
        }
        Command::Finish { slot } => {
            let session = quiz.snapshot(user, &slot).ok_or_else(|| no_quiz(&slot))?;
            let finished = quiz.finish(user, session).await?;
            print_attempt(&finished.attempt);
            match finished.outcome {
                SaveOutcome::Saved { replaced: true, .. } => println!("New best score!"),
                SaveOutcome::Saved { replaced: false, .. } => println!("First score saved."),
                SaveOutcome::NotImproved { current_best } => {
                    let source = match current_best {
                        CurrentBest::Local(_) => "cached",
                        CurrentBest::Remote(_) => "stored",
                    };
                    println!("Your {source} best is still higher; this attempt was not kept.");
                }
                SaveOutcome::LocalOnly { error } => {
                    println!("Saved on this device only ({error}).");
                }
            }
        }
        Command::Abandon { slot } => {
            quiz.abandon(user, &slot)?;
            println!("Quiz {slot} abandoned.");
        }
        Command::Best { slot } => match app.attempts().best_attempt(user, &slot).await? {
            Some(attempt) => print_attempt(&attempt),
            None => println!("No attempt yet for {slot}."),
        },
        Command::History => {
            let history = app.attempts().history(user).await?;
            if history.is_empty() {
                println!("No attempts yet.");
            }
            for attempt in &history {
                print_attempt(attempt);
            }
        }
        Command::Mastery => {
            let mastery = app.mastery().mastery(user).await?;
            if mastery.is_empty() {
                println!("No mastery data yet.");
            }
            for (area, percentage) in mastery.iter() {
                println!("{area:<32} {percentage:>3}%");
            }
        }
        Command::Review { clear } => {
            let review = app.review_queue();
            if clear {
                review.clear(user)?;
                println!("Review queue cleared.");
                return Ok(());
            }
            let entries = review.entries(user);
            println!("{} question(s) to review", entries.len());
            for question in entries.iter() {
                println!(
                    "  #{} [{}] {}",
                    question.id,
                    question.area.as_deref().unwrap_or("-"),
                    question.statement
                );
            }
        }
        Command::Chat { message, context } => {
            let reply = app
                .chat()
                .send(user, &message, context.as_deref())
                .await?;
            println!("{}", reply.reply);
            if let Some(link) = reply.link {
                println!("{link}");
            }
            println!("({} chat credits left)", reply.remaining_credits);
        }
        Command::Credits => {
            let remaining = app.chat().remaining_credits(user).await?;
            println!("{remaining} chat credits left");
        }
    }

    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    let cli = Cli::parse(config, std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    if cli.command == Command::Help {
        print_usage();
        return Ok(());
    }

    let app = AppServices::new_sqlite(&cli.config, Clock::default()).await?;
    if app.first_launch() {
        log::info!("welcome, user {}", app.user_id());
    }
    execute(&app, cli.command).await
}

#[tokio::main]
async fn main() {
    init_logging();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
