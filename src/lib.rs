pub mod artifact;
pub mod cli;
pub mod config;
pub mod elasticsearch;
pub mod error;
pub mod flatten;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod schema;
pub mod source;
pub mod store;

use anyhow::Context;
use console::Term;
use std::{fs::OpenOptions, io::Write};

use crate::cli::Cli;
use crate::config::EtlConfig;
use crate::error::EtlError;
use crate::pipeline::{Pipeline, PipelineOptions};
use crate::report::RunReport;
use crate::source::{DocumentSource, ElasticSource};
use crate::store::MySqlStore;

/// Configure env_logger, writing `timestamp - LEVEL - message` lines to the log file
fn init_logging(args: &Cli) -> anyhow::Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if args.debug {
        builder.filter_level(log::LevelFilter::Debug);
    }

    if args.log_file != "-" {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&args.log_file)
            .with_context(|| format!("Failed to open log file: {}", args.log_file))?;
        builder
            .target(env_logger::Target::Pipe(Box::new(file)))
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{} - {} - {}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
                    record.level(),
                    record.args()
                )
            });
    }

    builder.try_init().context("Failed to initialize logger")?;
    log::debug!("Debug logging enabled");
    Ok(())
}

pub async fn run() -> anyhow::Result<()> {
    use clap::Parser;

    // A missing .env file is fine, flags and the environment still apply
    let _ = dotenvy::dotenv();
    let args = Cli::parse();

    init_logging(&args)?;

    // Enable colors if not in quiet mode
    if !args.quiet {
        console::set_colors_enabled(true);
    }

    let config = EtlConfig::from_cli(&args)?;
    let term = Term::stdout();

    let client = elasticsearch::create_client(&config.source)?;
    elasticsearch::validate_credentials(&client).await?;

    let source = ElasticSource::new(client, &config.source);
    let catalog = source.list_units().await?;
    if catalog.is_empty() {
        return Err(EtlError::Catalog("no indices found in Elasticsearch".into()).into());
    }

    if args.list_indices {
        return list_indices(&term, &catalog);
    }

    let (selected, missing) = config.selection.apply(&catalog);
    for name in &missing {
        log::warn!("Index '{}' not found in Elasticsearch", name);
    }
    log::info!(
        "Processing {} of {} indices from {}",
        selected.len(),
        catalog.len(),
        config.source.host
    );

    let store = MySqlStore::connect(&config.store).await?;

    let pipeline = Pipeline::new(&source, &store, PipelineOptions::from(&config))
        .with_progress(progress::index_progress(selected.len(), args.quiet));
    let mut report: RunReport = pipeline.run(&selected).await;
    report.record_not_found(&missing);

    store.close().await;

    report.log();
    report.print(&term)?;
    Ok(())
}

fn list_indices(term: &Term, catalog: &[String]) -> anyhow::Result<()> {
    term.write_line("Index names (alphabetical):")?;
    for name in catalog {
        term.write_line(name)?;
        log::info!("Index found: {}", name);
    }
    term.write_line(&format!("\nTotal indices: {}", catalog.len()))?;
    log::info!("Total indices: {}", catalog.len());
    Ok(())
}
