mod cli;
mod config;
mod render;

use chrono::{Local, NaiveDateTime};
use clap::Parser;
use color_eyre::eyre::Context as _;
use color_eyre::Result;
use tracing::{info, instrument, Level};

use crate::cli::Args;
use crate::config::Settings;

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    register_logging(args.log_level)?;

    let settings = Settings::new(&args.config).wrap_err("parsing config file")?;
    run(&settings, Local::now().naive_local())
}

#[instrument(skip_all, fields(output = ?settings.output_path))]
fn run(settings: &Settings, now: NaiveDateTime) -> Result<()> {
    let query = settings.query().wrap_err("invalid field schema")?;
    let cluster = query.collect(&settings.shell(), settings.rules(), now);

    let summary = cluster.summary();
    let page = render::page(&cluster, now, settings.refresh_seconds);
    render::write_report(&settings.output_path, page)?;

    info!(
        used = summary.total_used,
        total = summary.total_gpus,
        rate = summary.usage_rate,
        jobs = cluster.jobs().len(),
        "page written"
    );
    Ok(())
}

fn register_logging(level: Option<Level>) -> Result<()> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(level.unwrap_or(Level::INFO))
        // stdout may be captured by cron
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).wrap_err("setting default subscriber failed")
}
