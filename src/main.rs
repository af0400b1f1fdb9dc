use anyhow::Result;
use clap::Parser;
use console::style;
use log::{info, warn};
use std::path::Path;
use std::process::ExitCode;
use video_splitter::cli::Cli;
use video_splitter::component::VideoSplitter;
use video_splitter::config::{Config, SETTINGS_FILE, save_settings};
use video_splitter::init;
use video_splitter::signal::setup_shutdown_signal;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init::init(cli.verbose);
    let cancel = setup_shutdown_signal()?;

    let mut config = Config::new()?;
    cli.apply_to(&mut config.settings);
    if cli.save_defaults {
        save_settings(&config.settings, Path::new(SETTINGS_FILE))?;
        info!("Saved defaults to {SETTINGS_FILE}");
    }

    let splitter = VideoSplitter::new(config, cancel);
    match splitter.run(&cli.input, cli.output_dir.as_deref()) {
        Ok(summary) if summary.is_complete() => Ok(ExitCode::SUCCESS),
        Ok(_) => Ok(ExitCode::FAILURE),
        Err(e) => {
            warn!("Program error: {e:#}");
            eprintln!("{} {e:#}", style("Error:").red().bold());
            Ok(ExitCode::FAILURE)
        }
    }
}
