//! `rasort`: classify ROMs by RetroAchievements support and sort them.

mod cli;
mod error;

use crate::cli::{Cli, Command, SortArgs};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use rasort_cache::HashLibrary;
use rasort_catalog::{CatalogClient, parse_game_list};
use rasort_config::{Config, SortMode};
use rasort_library::{DUPLICATES_DIR, Reconciler, Report, Sorter, Transfer, dedupe_output, import_catalog};
use rasort_rom::hash_file;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level())))
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    if let Some(cache) = cli.cache {
        config.cache = cache;
    }
    tracing::debug!(?config, "Loaded configuration");
    match cli.command {
        Command::Sort(args) => sort(config, args),
        Command::Refresh { with_achievements_only } => refresh(&config, with_achievements_only),
        Command::Import { file } => import(&config, &file),
        Command::Dedupe { dir } => dedupe(&config, dir.as_deref()),
        Command::Hash { files } => hash(&config, &files),
    }
}

fn catalog(config: &Config) -> Result<CatalogClient> {
    let credentials = config.credentials().or_raise(|| ErrorKind::Config)?;
    let client = CatalogClient::http(&config.catalog.base_url, config.catalog.timeout(), credentials)
        .or_raise(|| ErrorKind::Catalog)?;
    Ok(client.with_attempts(config.catalog.attempts))
}

fn sort(mut config: Config, args: SortArgs) -> Result<()> {
    if let Some(output) = args.output {
        config.sort.output = output;
    }
    if args.move_files {
        config.sort.mode = SortMode::Move;
    }
    if args.dedupe {
        config.sort.dedupe = true;
    }
    let transfer = match config.sort.mode {
        SortMode::Copy => Transfer::Copy,
        SortMode::Move => Transfer::Move,
    };

    let catalog = catalog(&config)?;
    let mut library = HashLibrary::load(&config.cache).or_raise(|| ErrorKind::Cache)?;
    let roms = rasort_rom::discover(&args.rom_dir, config.system).or_raise(|| ErrorKind::Discover)?;
    if roms.is_empty() {
        tracing::warn!(dir = %args.rom_dir.display(), system = %config.system, "No ROM files found");
    }

    let run = Reconciler::new(&mut library, &catalog, config.system)
        .with_refresh_on_miss(config.catalog.refresh_on_miss && !args.no_refresh)
        .run(roms.iter().map(|rom| &rom.path))
        .or_raise(|| ErrorKind::Reconcile)?;
    let placements = Sorter::new(&config.sort.output, transfer)
        .with_dedupe(config.sort.dedupe)
        .sort(&run.roms)
        .or_raise(|| ErrorKind::Sort)?;

    let report = Report::new(&run.summary, &run.roms, &placements);
    let text = report.save(config.report_path()).or_raise(|| ErrorKind::Report)?;
    print!("{text}");
    println!("\nReport saved to {}", config.report_path().display());
    Ok(())
}

fn refresh(config: &Config, with_achievements_only: bool) -> Result<()> {
    let catalog = catalog(config)?;
    let mut library = HashLibrary::load(&config.cache).or_raise(|| ErrorKind::Cache)?;
    let changed = rasort_library::refresh(&mut library, &catalog, config.system, with_achievements_only)
        .or_raise(|| ErrorKind::Reconcile)?;
    println!("{changed} record(s) updated, {} hashes in {}", library.len(), library.path().display());
    Ok(())
}

/// Accepts either a saved catalog game list or a hash library in any format
/// `HashLibrary::load` understands.
fn import(config: &Config, file: &Path) -> Result<()> {
    let mut library = HashLibrary::load(&config.cache).or_raise(|| ErrorKind::Cache)?;
    let text = std::fs::read_to_string(file).or_raise(|| ErrorKind::Import(file.to_path_buf()))?;
    let changed = match parse_game_list(&text) {
        Ok(entries) => {
            tracing::info!(hashes = entries.len(), "Importing catalog game list");
            import_catalog(&mut library, entries)
        },
        Err(_) => {
            let other = HashLibrary::load(file).or_raise(|| ErrorKind::Import(file.to_path_buf()))?;
            tracing::info!(hashes = other.len(), "Importing hash library");
            library.merge_from(other)
        },
    };
    if library.is_dirty() {
        library.persist().or_raise(|| ErrorKind::Cache)?;
    }
    println!("{changed} record(s) updated, {} hashes in {}", library.len(), library.path().display());
    Ok(())
}

fn dedupe(config: &Config, dir: Option<&Path>) -> Result<()> {
    let output = dir.unwrap_or(&config.sort.output);
    let (folders, total) = dedupe_output(output, config.system).or_raise(|| ErrorKind::Sort)?;
    for (folder, stats) in &folders {
        println!(
            "{folder}: {} scanned, {} unique, {} set aside, {} unreadable, {} failed",
            stats.scanned, stats.unique, stats.moved, stats.unreadable, stats.failed
        );
    }
    println!(
        "Total: {} scanned, {} unique, {} set aside into {}",
        total.scanned,
        total.unique,
        total.moved,
        output.join(DUPLICATES_DIR).display()
    );
    Ok(())
}

fn hash(config: &Config, files: &[PathBuf]) -> Result<()> {
    let mut failed = 0;
    for file in files {
        match hash_file(file, config.system) {
            Ok(rom) => println!("{}  {}", rom.hash, file.display()),
            Err(err) => {
                let kind: &rasort_rom::error::ErrorKind = &err;
                eprintln!("{}: {kind}", file.display());
                failed += 1;
            },
        }
    }
    if failed > 0 {
        exn::bail!(ErrorKind::Hash(failed));
    }
    Ok(())
}
