// src/main.rs
use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dvifonts::{CliError, CliOptions, ConsoleObserver, FontPool, LoadStatus, ResolutionState};

fn main() -> anyhow::Result<()> {
    // Default filter is "info" if RUST_LOG is not set
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let options = match CliOptions::parse(std::env::args().skip(1)) {
        Ok(options) if options.help => {
            println!("{}", dvifonts::cli::USAGE);
            return Ok(());
        }
        Ok(options) => options,
        Err(e @ CliError::NoFonts) | Err(e @ CliError::UnknownOption(_)) => {
            eprintln!("{}\n{}", e, dvifonts::cli::USAGE);
            std::process::exit(2);
        }
        Err(e) => return Err(e).context("Invalid command line"),
    };

    info!(
        "Resolving {} fonts with {} (mode {})",
        options.fonts.len(),
        options.config.program,
        options.config.mode
    );

    let mut pool = FontPool::with_config(options.config);
    pool.set_observer(Box::new(ConsoleObserver::stderr()));
    for font in &options.fonts {
        pool.append_font(&font.name, font.checksum, font.scale, font.design, None);
    }

    if pool.wait_until_loaded() != LoadStatus::Done {
        warn!("Font resolution did not finish");
    }

    print!("{}", pool.status());

    let failed = pool.fonts().iter().filter(|f| f.state() == ResolutionState::Failed).count();
    if failed > 0 {
        warn!("{} fonts could not be resolved", failed);
        std::process::exit(1);
    }
    Ok(())
}
