//! Postal Chess - operator CLI
//!
//! Runs the correspondence game: storage setup, preflight, trigger
//! installation, and the locked tick/new-game/resume entry points.

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use postal_chess::{GameConfig, Session, TurnState, preflight, trigger, wiring};
use postal_chess_notation::{Fen, render_board};
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();
    initialize_tracing();

    let cli = Cli::parse();
    let config = GameConfig::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Command::InitStorage => init_storage(&config),
        Command::Preflight => run_preflight(&config).await,
        Command::InstallTrigger {
            every_minutes,
            crontab,
        } => install_trigger(&config, &cli.config, every_minutes, crontab.as_deref()),
        Command::NewGame => new_game(&config).await,
        Command::Tick => tick(&config).await,
        Command::Watch => watch(&config).await,
        Command::Resume => resume(&config).await,
        Command::Status => status(&config),
        Command::Bootstrap { crontab } => {
            init_storage(&config)?;
            run_preflight(&config).await?;
            install_trigger(&config, &cli.config, None, crontab.as_deref())?;
            new_game(&config).await
        }
    }
}

fn initialize_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,postal_chess=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[instrument(skip(config))]
fn init_storage(config: &GameConfig) -> Result<()> {
    wiring::session_store(config).initialize()?;
    println!("Storage ready at {}", config.db_path());
    Ok(())
}

#[instrument(skip(config))]
async fn run_preflight(config: &GameConfig) -> Result<()> {
    preflight::check_environment(config)?;
    let wiring = wiring::build(config)?;
    preflight::check_collaborators(wiring.transport.as_ref(), wiring.move_source.as_ref()).await?;
    println!("Preflight passed");
    Ok(())
}

#[instrument(skip(config))]
fn install_trigger(
    config: &GameConfig,
    config_path: &Path,
    every_minutes: Option<u32>,
    crontab: Option<&Path>,
) -> Result<()> {
    let executable = std::env::current_exe().context("locating the postal_chess executable")?;
    let config_path = config_path
        .canonicalize()
        .with_context(|| format!("resolving {}", config_path.display()))?;
    let minutes = every_minutes.unwrap_or(*config.poll_interval_minutes());
    let line = trigger::cron_line(minutes, &executable, &config_path)?;

    match crontab {
        Some(path) => {
            if trigger::install(path, &line)? {
                println!("Installed into {}: {}", path.display(), line);
            } else {
                println!("Trigger already present in {}", path.display());
            }
        }
        None => println!("{}", line),
    }
    Ok(())
}

#[instrument(skip(config))]
async fn new_game(config: &GameConfig) -> Result<()> {
    let wiring = wiring::build(config)?;
    let session = wiring.service.start_new_game().await?;
    println!(
        "New game {} started; you play {}",
        session.session_token(),
        session.human_side()
    );
    Ok(())
}

#[instrument(skip(config))]
async fn tick(config: &GameConfig) -> Result<()> {
    let wiring = wiring::build(config)?;
    let outcome = wiring.service.tick().await?;
    info!(?outcome, "Tick complete");
    Ok(())
}

#[instrument(skip(config))]
async fn watch(config: &GameConfig) -> Result<()> {
    let wiring = wiring::build(config)?;
    let interval = Duration::from_secs(u64::from(*config.poll_interval_minutes()) * 60);
    info!(?interval, "Watching for moves");
    tokio::select! {
        _ = trigger::watch(&wiring.service, interval) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }
    Ok(())
}

#[instrument(skip(config))]
async fn resume(config: &GameConfig) -> Result<()> {
    let wiring = wiring::build(config)?;
    if wiring.service.resume().await? {
        println!("Opponent move delivered");
    } else {
        println!("No opponent move was owed");
    }
    Ok(())
}

#[instrument(skip(config))]
fn status(config: &GameConfig) -> Result<()> {
    match wiring::session_store(config).load_session()? {
        Some(session) => print_status(&session),
        None => println!("No game has been started"),
    }
    Ok(())
}

fn print_status(session: &Session) {
    println!("Game:       {}", session.session_token());
    println!("State:      {}", TurnState::of(session));
    println!("You play:   {}", session.human_side());
    println!("Difficulty: {}", session.difficulty());
    println!(
        "Thread:     {}",
        session
            .thread_handle()
            .as_ref()
            .map_or_else(|| "(not yet located)".to_string(), |t| t.to_string())
    );
    println!("Cursor:     {}", session.cursor());
    match session.position().parse::<Fen>() {
        Ok(fen) => println!("\n{}\n", render_board(&fen, *session.human_side())),
        Err(e) => warn!(error = %e, "Stored position does not parse"),
    }
    if !session.move_log().is_empty() {
        println!("Moves: {}", session.move_log().render());
    }
}
