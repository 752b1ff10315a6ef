mod app;
mod clock;
mod color;
mod config;
mod constellation;
mod controller;
mod error;
mod field;
mod histogram;
mod input;
mod render;
mod sampler;
mod snapshot;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::path::Path;

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let env = env_logger::Env::default().default_filter_or("info");
    let mut builder = env_logger::Builder::from_env(env);
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        // stderr shares the alternate screen, so stay quiet unless asked
        None if std::env::var_os("RUST_LOG").is_none() => {
            builder.filter_level(log::LevelFilter::Off);
        }
        None => {}
    }
    builder.init();
    Ok(())
}

fn main() -> Result<()> {
    let args = config::Args::parse();
    init_logging(args.log_file.as_deref())?;
    app::run(&args)
}
