//! costplan - Estimate the monthly cost of planned infrastructure resources

use clap::Parser;
use costplan::{
    cli::{Cli, Command},
    evaluation::Evaluator,
    input::{load_descriptors, load_usage_opt},
    output::get_formatter,
};
use costplan_core::config::EngineConfig;
use costplan_core::error::Result;
use costplan_core::provider::ResourceProvider;
use costplan_core::registry::Registry;
use costplan_pricing::{HttpCatalog, PriceCatalog, StaticCatalog};
use costplan_provider_aws::AwsProvider;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn create_catalog(cli: &Cli, config: &EngineConfig) -> Result<Arc<dyn PriceCatalog>> {
    Ok(match &cli.price_book {
        Some(path) => Arc::new(StaticCatalog::from_file(path)?),
        None => Arc::new(HttpCatalog::new(config)?),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first to check for quiet flag
    let cli = Cli::parse();

    // Initialize logging. The --quiet flag should override RUST_LOG.
    let filter = if cli.quiet {
        tracing_subscriber::EnvFilter::new("warn")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("costplan=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = cli.engine_config()?;
    let providers: [&dyn ResourceProvider; 1] = [&AwsProvider];
    let registry = Arc::new(Registry::from_providers(&providers));
    info!("Registered {} resource types", registry.len());
    debug!(types = ?registry.resource_types(), "Registered resource types");

    let catalog = create_catalog(&cli, &config)?;
    let show_progress = !cli.json && is_terminal::is_terminal(std::io::stderr());
    let evaluator = Evaluator::new(registry, catalog, config).with_progress(show_progress);

    // Ctrl-C cancels the run; results gathered so far are still reported
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling pending price lookups");
            interrupt.cancel();
        }
    });

    let formatter = get_formatter(cli.json);
    match &cli.command {
        Command::Breakdown { resources, usage } => {
            info!("Running cost breakdown");
            let descriptors = load_descriptors(resources)?;
            let usage = load_usage_opt(usage.as_deref())?;

            let report = evaluator.evaluate(descriptors, &usage, cancel).await?;
            println!("{}", formatter.format_breakdown(&report));
        }
        Command::Diff {
            past,
            current,
            usage,
        } => {
            info!("Running cost diff");
            let past = load_descriptors(past)?;
            let current = load_descriptors(current)?;
            let usage = load_usage_opt(usage.as_deref())?;

            let report = evaluator
                .evaluate_diff(past, current, &usage, cancel)
                .await?;
            println!("{}", formatter.format_diff(&report));
        }
    }

    Ok(())
}
