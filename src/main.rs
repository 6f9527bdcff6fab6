use anyhow::{Context, Result};
use clap::Parser;
use quickfind::core::config::Config;
use quickfind::search::session::SearchHandle;
use quickfind::ui::cli::{Cli, Commands};
use quickfind::ui::format::{format_record, format_record_json, format_status};
use quickfind::{
    IndexMaintainer, IndexStore, LiveScanner, MonitorStatus, RebuildOutcome, ScanOptions,
    SearchEvent, SearchOrchestrator,
};
use std::io::BufRead;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = build_config(&cli)?;

    match &cli.command {
        Commands::Index => handle_index(&config),
        Commands::Watch { no_rebuild } => handle_watch(&config, *no_rebuild),
        Commands::Search { query, limit, json } => handle_search(&config, query, *limit, *json),
        Commands::Scan { query, limit, json } => handle_scan(&config, query, *limit, *json),
        Commands::Status => handle_status(&config),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quickfind=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::new(cli.base_dir.clone())?.with_show_hidden(cli.hidden);
    if !cli.roots.is_empty() {
        config = config.with_roots(&cli.roots);
    }
    if let Some(index_path) = &cli.index_path {
        config = config.with_index_path(index_path.clone());
    }
    if let Some(max_depth) = cli.max_depth {
        config = config.with_max_depth(max_depth);
    }
    Ok(config)
}

fn open_maintainer(config: &Config) -> Result<IndexMaintainer> {
    config.init().context("Failed to create quickfind directories")?;
    IndexMaintainer::open(config)
        .with_context(|| format!("Failed to open index at {}", config.index_path.display()))
}

fn rebuild(maintainer: &IndexMaintainer) {
    match maintainer.rebuild_index() {
        RebuildOutcome::Completed(stats) => {
            println!(
                "Indexed {} files from {} roots ({} skipped)",
                stats.files, stats.roots, stats.skipped
            );
        }
        RebuildOutcome::AlreadyRunning => println!("A rebuild is already running"),
        RebuildOutcome::Stopped => println!("Index maintainer is stopped"),
    }
}

fn handle_index(config: &Config) -> Result<()> {
    let maintainer = open_maintainer(config)?;
    for root in maintainer.roots() {
        println!("Indexing: {}", root.display());
    }
    rebuild(&maintainer);
    Ok(())
}

fn handle_watch(config: &Config, no_rebuild: bool) -> Result<()> {
    let maintainer = open_maintainer(config)?;
    if !no_rebuild {
        rebuild(&maintainer);
    }

    match maintainer.start_monitoring()? {
        MonitorStatus::Started => {}
        MonitorStatus::AlreadyRunning | MonitorStatus::Stopped => return Ok(()),
    }
    println!("Watching for changes. Press Enter to stop.");

    let mut line = String::new();
    let _ = std::io::stdin().lock().read_line(&mut line);

    maintainer.shutdown();
    let entries = maintainer.store().len()?;
    println!("Stopped. {} files in index.", entries);
    Ok(())
}

fn print_results(handle: SearchHandle, limit: usize, json: bool) -> Result<usize> {
    let home = dirs::home_dir();
    let mut printed = 0;
    while let Some(event) = handle.recv() {
        match event {
            SearchEvent::Batch(batch) => {
                for record in batch {
                    if printed == limit {
                        handle.cancel();
                        break;
                    }
                    if json {
                        println!("{}", format_record_json(&record)?);
                    } else {
                        println!("{}", format_record(&record, home.as_deref()));
                    }
                    printed += 1;
                }
            }
            SearchEvent::Finished => break,
        }
    }
    Ok(printed)
}

fn handle_search(config: &Config, query: &str, limit: usize, json: bool) -> Result<()> {
    if !config.index_path.exists() {
        anyhow::bail!(
            "No index at {}. Run 'quickfind index' first.",
            config.index_path.display()
        );
    }
    let store = IndexStore::open(config)?;
    let orchestrator = Arc::new(SearchOrchestrator::new(Arc::new(store)));

    let printed = print_results(orchestrator.start(query), limit, json)?;
    if printed == 0 && !json {
        println!("No results found.");
    }
    Ok(())
}

fn handle_scan(config: &Config, query: &str, limit: usize, json: bool) -> Result<()> {
    let scanner = LiveScanner::new(ScanOptions::from_config(config));
    let printed = print_results(scanner.scan(query, &config.search_roots), limit, json)?;
    if printed == 0 && !json {
        println!("No results found.");
    }
    Ok(())
}

fn handle_status(config: &Config) -> Result<()> {
    let files = if config.index_path.exists() {
        Some(IndexStore::open(config)?.len()?)
    } else {
        None
    };
    println!("{}", format_status(config, files));
    Ok(())
}
