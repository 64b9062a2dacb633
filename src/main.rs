use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use snipdrill::coach::Coach;
use snipdrill::config::Config;
use snipdrill::content::builtin::builtin_languages;
use snipdrill::content::identity::content_id_of;
use snipdrill::content::{ImportOutcome, SnippetSource};
use snipdrill::engine::difficulty::{MAX_TIER, MIN_TIER};
use snipdrill::store::JsonStore;

#[derive(Parser)]
#[command(name = "snipdrill", version, about = "Adaptive code-typing practice")]
struct Cli {
    #[arg(
        short,
        long,
        global = true,
        help = "Language to practice (rust, python, javascript, go, ...)"
    )]
    language: Option<String>,

    #[arg(long, global = true, help = "Data directory (defaults to the platform data dir)")]
    data_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Seed for reproducible selection")]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the next planned snippet without starting it
    Next,
    /// Plan a snippet, read your typing from stdin and record the session
    Practice,
    /// Difficulty, trend and weakness summary
    Report,
    /// Add a snippet from a file to the library
    Add {
        file: PathBuf,
        #[arg(short, long, help = "Difficulty tier 1-7 (estimated when omitted)")]
        difficulty: Option<u8>,
    },
    /// Print the content id of a file
    Id { file: PathBuf },
    /// Pin every session to one tier, or clear the pin when no tier is given
    Lock { tier: Option<u8> },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("SNIPDRILL_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_default();
    match cli.language.as_deref() {
        // User-added snippets can be in any language, so no fallback here.
        Some(language) => config.language = Config::canonical_language(language),
        None => config.normalize_language(&builtin_languages()),
    }

    let store = match cli.data_dir {
        Some(dir) => JsonStore::with_base_dir(dir)?,
        None => JsonStore::new()?,
    };
    let mut rng = match cli.seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    };

    match cli.command {
        Command::Next => {
            let mut coach = Coach::from_store(config, &store);
            let (snippet, plan) = coach.next_session(&mut rng);
            println!(
                "# {} [{}] D{} ({})",
                snippet.id, snippet.language, snippet.difficulty, plan.reason
            );
            println!("{}", snippet.code);
        }
        Command::Practice => practice(Coach::from_store(config, &store), &store, &mut rng)?,
        Command::Report => report(&Coach::from_store(config, &store)),
        Command::Add { file, difficulty } => {
            let code = fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let mut coach = Coach::from_store(config, &store);
            let language = coach.language().to_string();
            let outcome = coach.library_mut().add_with_difficulty(
                &language,
                &code,
                difficulty,
                Vec::new(),
                SnippetSource::User,
            )?;
            match outcome {
                ImportOutcome::Added(id) => {
                    coach.save_all(&store)?;
                    info!(%id, "snippet added");
                    println!("added {id}");
                }
                ImportOutcome::Duplicate(id) => println!("already in library as {id}"),
            }
        }
        Command::Id { file } => {
            let code = fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            println!("{}", content_id_of(&config.language, &code));
        }
        Command::Lock { tier } => {
            if let Some(t) = tier.filter(|t| !(MIN_TIER..=MAX_TIER).contains(t)) {
                bail!("tier {t} is outside {MIN_TIER}..={MAX_TIER}");
            }
            // Reload so a --language override is not written back
            let mut stored = Config::load().unwrap_or_default();
            stored.manual_difficulty = tier;
            stored.save()?;
            info!(path = %Config::config_path().display(), ?tier, "manual difficulty saved");
            match tier {
                Some(t) => println!("sessions locked to D{t}"),
                None => println!("manual lock cleared"),
            }
        }
    }
    Ok(())
}

fn practice(mut coach: Coach, store: &JsonStore, rng: &mut SmallRng) -> Result<()> {
    let (snippet, plan) = coach.next_session(rng);
    eprintln!("-- {} | D{} | {} --", snippet.language, snippet.difficulty, plan.reason);
    eprintln!("{}", snippet.code);
    eprintln!("-- type the snippet, then EOF (Ctrl-D) --");

    // Keystrokes arrive in one batch, so the drill's own clock would read ~0
    let started = Instant::now();
    let mut typed = String::new();
    io::stdin().read_to_string(&mut typed)?;
    let elapsed = started.elapsed().as_secs_f64();

    let typed = typed.replace("\r\n", "\n");
    for ch in typed.trim_end_matches('\n').chars() {
        coach.on_keystroke(ch);
    }
    let Some(outcome) = coach.on_session_complete(Some(elapsed), Utc::now()) else {
        println!("nothing typed, session not recorded");
        return Ok(());
    };
    coach.save(store)?;

    println!(
        "{:.1} wpm, {:.1}% accuracy, rating {} -> {}",
        outcome.record.wpm,
        outcome.record.accuracy,
        outcome.rating_before,
        outcome.record.rating_after
    );
    println!(
        "next: D{} (D{}-D{}, {})",
        outcome.next_difficulty.target,
        outcome.next_difficulty.min,
        outcome.next_difficulty.max,
        outcome.next_difficulty.reason.as_str()
    );
    if outcome.snapshot_taken {
        println!("weakness snapshot saved");
    }
    Ok(())
}

fn report(coach: &Coach) {
    let language = coach.language();
    let difficulty = coach.difficulty();
    println!("language: {language}");
    println!("rating: {}", coach.profile().rating(language));
    println!(
        "difficulty: D{} (D{}-D{}), {}, confidence {:.2}",
        difficulty.target,
        difficulty.min,
        difficulty.max,
        difficulty.reason.as_str(),
        difficulty.confidence
    );

    match coach.trend_summary() {
        Some(t) => {
            println!(
                "trend: {} sessions, {:.1} wpm / {:.1}% recent, momentum {:?}",
                t.session_count, t.recent_wpm, t.recent_accuracy, t.momentum
            );
            println!(
                "  wpm velocity {:+.2}/session, plateau {} sessions{}",
                t.wpm_velocity,
                t.wpm_plateau_length,
                if t.is_plateau { " (plateau)" } else { "" }
            );
        }
        None => println!("trend: not enough sessions yet"),
    }

    let report = coach.weakness_report();
    if report.items.is_empty() {
        println!("weaknesses: none yet");
    } else {
        println!("weaknesses:");
        for item in &report.items {
            let confusion = coach
                .profile()
                .heatmap
                .top_confusion(item.character)
                .map(|(c, n)| format!(", often typed as {c:?} ({n}x)"))
                .unwrap_or_default();
            println!(
                "  {:?}: {:.0}% over {} attempts, {:?}{}",
                item.character,
                item.error_rate * 100.0,
                item.attempts,
                item.trajectory,
                confusion
            );
        }
    }
    let groups: Vec<String> = coach
        .profile()
        .heatmap
        .weakest_groups(10)
        .iter()
        .filter(|g| g.misses > 0)
        .map(|g| format!("{} {:.0}%", g.group.to_key(), g.error_rate * 100.0))
        .collect();
    if !groups.is_empty() {
        println!("symbol groups: {}", groups.join(", "));
    }
    if !report.resolved.is_empty() {
        let resolved: String = report.resolved.iter().collect();
        println!("resolved: {resolved}");
    }
    if let Some(mean) = report.mean_improvement {
        println!("mean improvement since last snapshot: {:+.1}%", mean * 100.0);
    }
}
