use std::borrow::Cow::{self, Borrowed, Owned};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as AnyhowContext, Result, anyhow};
use colored::Colorize;
use rustyline::Editor;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use cradle_application::{GameController, ResumeOutcome};
use cradle_core::error::CradleError;
use cradle_core::session::question::ChoiceInput;
use cradle_core::session::{GamePhase, Question};
use cradle_infrastructure::{EngineConfig, TomlSnapshotStore, TracingEventSink};
use cradle_interaction::reveal::{RevealScheduler, RevealTiming};
use cradle_interaction::HttpContentService;

/// CLI helper for rustyline that provides completion, highlighting, and hints.
#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        Self {
            commands: vec![
                "/new".to_string(),
                "/continue".to_string(),
                "/reset".to_string(),
            ],
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if line.starts_with('/') {
            let candidates: Vec<Pair> = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .map(|cmd| Pair {
                    display: cmd.clone(),
                    replacement: cmd.clone(),
                })
                .collect();
            Ok((0, candidates))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

/// Prints text with the paced reveal cadence instead of one dump.
async fn reveal(text: &str, timing: RevealTiming) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let scheduler = RevealScheduler::spawn(
        timing,
        move |prefix| {
            let _ = tx.send(prefix);
        },
        || {},
    );
    scheduler.push_text(text);
    scheduler.complete();

    let mut printed = 0usize;
    while let Some(prefix) = rx.recv().await {
        let chars: Vec<char> = prefix.chars().collect();
        if chars.len() > printed {
            let delta: String = chars[printed..].iter().collect();
            print!("{}", delta.bright_blue());
            let _ = std::io::stdout().flush();
            printed = chars.len();
        }
    }
    println!();
}

fn print_question(question: &Question) {
    println!();
    println!("{}", question.text.bright_blue());
    if question.important_event {
        println!("{}", "An important moment.".bright_yellow());
    }
    println!();
    for (i, option) in question.options.iter().enumerate() {
        println!("{}", format!("  {}. {}", i + 1, option.text).cyan());
    }
    println!(
        "{}",
        "Pick a number, or type your own answer.".bright_black()
    );
}

async fn show_state(controller: &GameController, timing: &RevealTiming) {
    match controller.phase().await {
        GamePhase::Feedback => {
            println!();
            reveal(&controller.feedback_text().await, timing.clone()).await;
            let snapshot = controller.snapshot().await;
            println!(
                "{}",
                format!(
                    "[age {} | finance {}/10 | relationship {}/10]",
                    snapshot.child_age(),
                    snapshot.finance,
                    snapshot.relationship
                )
                .bright_black()
            );
            println!("{}", "Press enter to continue.".bright_black());
        }
        GamePhase::Playing => {
            if let Some(question) = controller.current_question().await {
                print_question(&question);
            }
        }
        GamePhase::Summary => {
            println!();
            println!("{}", "=== The story ends ===".bright_magenta().bold());
            reveal(&controller.feedback_text().await, timing.clone()).await;
            println!("{}", "Type /new to start another life.".bright_black());
        }
        GamePhase::Welcome => {
            println!("{}", "Type /new to begin a new story.".bright_black());
        }
        GamePhase::InitializationFailed => {
            println!(
                "{}",
                "Could not start the story. Type /new to try again.".red()
            );
        }
        phase => {
            tracing::debug!(?phase, "nothing to show for phase");
        }
    }
}

/// Maps a line typed while a question is on screen to a choice.
async fn choice_from_line(controller: &GameController, line: &str) -> Option<ChoiceInput> {
    let question = controller.current_question().await?;
    if let Ok(number) = line.parse::<usize>() {
        let option = question.options.get(number.checked_sub(1)?)?;
        return Some(ChoiceInput::option(option.id.clone()));
    }
    Some(ChoiceInput::custom(line.to_string()))
}

async fn handle_line(
    controller: &Arc<GameController>,
    timing: &RevealTiming,
    line: &str,
) -> Result<()> {
    let result = match (controller.phase().await, line) {
        (_, "/new") => controller.initialize_game(None, None).await,
        (_, "/reset") => controller.reset_to_welcome().await,
        (_, "/continue") => controller.continue_saved_game().await.map(|_| ()),
        (GamePhase::Feedback, "") => controller.continue_game().await,
        (GamePhase::Playing, input) if !input.is_empty() => {
            match choice_from_line(controller, input).await {
                Some(choice) => controller.select_option(choice).await,
                None => Ok(()),
            }
        }
        _ => Ok(()),
    };

    match result {
        Ok(()) => {}
        Err(CradleError::ActionInProgress) => {
            println!("{}", "Still working on the last step...".yellow());
        }
        Err(e) => {
            println!("{}", format!("{e}").red());
        }
    }

    show_state(controller, timing).await;
    Ok(())
}

/// The main entry point for the cradle REPL.
///
/// Sets up tracing, builds the controller from config/env, resumes any
/// saved session, and runs a rustyline loop translating typed lines into
/// controller operations.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let config = EngineConfig::load().map_err(|e| anyhow!("{e}"))?;
    let content_url = config
        .content_url
        .clone()
        .context("set content_url in config.toml or CRADLE_CONTENT_URL")?;
    let mut content = HttpContentService::new(content_url);
    if let Some(token) = &config.api_token {
        content = content.with_token(token.clone());
    }

    let store = TomlSnapshotStore::at_default_location().map_err(|e| anyhow!("{e}"))?;
    let controller = Arc::new(
        GameController::new(
            Arc::new(store),
            Arc::new(content),
            Arc::new(TracingEventSink),
        )
        .with_ending_age(config.ending_age()),
    );

    let timing = match &config.reveal {
        Some(reveal) => RevealTiming {
            base_delay: Duration::from_millis(reveal.base_delay_ms.unwrap_or(35)),
            sentence_delay: Duration::from_millis(reveal.sentence_delay_ms.unwrap_or(280)),
            newline_delay: Duration::from_millis(reveal.newline_delay_ms.unwrap_or(15)),
            ..RevealTiming::default()
        },
        None => RevealTiming::default(),
    };

    let helper = CliHelper::new();
    let mut rl = Editor::new()?;
    rl.set_helper(Some(helper));

    println!("{}", "=== Cradle ===".bright_magenta().bold());
    println!(
        "{}",
        "A life, one question per year. Type 'quit' to leave.".bright_black()
    );
    println!();

    // Pick up where a reload left off.
    match controller.continue_saved_game().await {
        Ok(ResumeOutcome::NoSave) => {}
        Ok(_) => println!("{}", "Resumed your saved story.".green()),
        Err(e) => println!("{}", format!("Resume failed: {e}").red()),
    }
    show_state(&controller, &timing).await;

    loop {
        let readline = rl.readline(">> ");

        match readline {
            Ok(line) => {
                let trimmed = line.trim();

                if trimmed == "quit" || trimmed == "exit" {
                    println!("{}", "Goodbye!".bright_green());
                    break;
                }

                if !trimmed.is_empty() {
                    let _ = rl.add_history_entry(&line);
                }

                handle_line(&controller, &timing, trimmed).await?;
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type 'quit' to exit.".yellow());
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        }
    }

    Ok(())
}
