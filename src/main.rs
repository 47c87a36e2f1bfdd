//! ReadAlong - read-aloud alignment replay
//!
//! Replays a recorded recognition script against a reference text and
//! prints how every word was judged.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use readalong::asr::ScriptedRecognizer;
use readalong::{AlignmentSnapshot, Config, Difficulty, NullObserver, SessionController, WordState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Reference text file, or '-' to read it from stdin
    #[arg(short, long)]
    text: PathBuf,

    /// Recognition script to replay
    #[arg(short, long)]
    script: PathBuf,

    /// Strictness: low, medium or high (overrides the config file)
    #[arg(short, long)]
    difficulty: Option<Difficulty>,

    /// Config file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the final snapshot as JSON
    #[arg(long)]
    json: bool,

    /// Write the effective config (with --difficulty applied) back to the config file
    #[arg(long)]
    save_config: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn read_reference(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading reference text from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn print_report(snapshot: &AlignmentSnapshot) {
    for (i, word) in snapshot.words.iter().enumerate() {
        let marker = if snapshot.cursor == i { ">" } else { " " };
        println!("{} {:>4}  {:<20} {:?}", marker, i, word.text, word.state);
    }
    println!(
        "\n{} correct, {} incorrect, {} skipped, {} pending, cursor {}/{}",
        snapshot.count(WordState::Correct),
        snapshot.count(WordState::Incorrect),
        snapshot.count(WordState::Skipped),
        snapshot.count(WordState::Pending) + snapshot.count(WordState::UnresolvedDebt),
        snapshot.cursor,
        snapshot.words.len()
    );
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(difficulty) = args.difficulty {
        config.difficulty = difficulty;
    }

    // Setup logging
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("📚 ReadAlong v{} starting...", env!("CARGO_PKG_VERSION"));

    if args.save_config {
        config.validate()?;
        match &args.config {
            Some(path) => config.save_to(path)?,
            None => config.save()?,
        }
        info!("💾 Config saved");
    }

    let text = read_reference(&args.text)?;
    let recognizer = ScriptedRecognizer::from_file(&args.script)
        .with_context(|| format!("loading script {}", args.script.display()))?;
    info!("🎬 Loaded {} recognizer events", recognizer.events().len());

    let mut session = SessionController::new(&text, &config, Arc::new(NullObserver))?;

    session.start(Box::new(recognizer))?;
    session.wait_for_recognizer();
    // Let the debounced pass and strict checks settle
    std::thread::sleep(std::time::Duration::from_millis(
        config.greedy.deferred_delay_ms.max(config.strict.timeout_ms) + 50,
    ));
    session.tick();

    let snapshot = session.snapshot();
    session.shutdown();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_report(&snapshot);
    }

    if let Some(failure) = session.last_error().filter(|f| f.critical) {
        anyhow::bail!("recognizer failed with critical error {}", failure.code);
    }
    Ok(())
}
