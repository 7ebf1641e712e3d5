use std::sync::Arc;

use anyhow::{Context, bail};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use campsync::config::Config;
use campsync::inventory::Inventory;
use campsync::journal::JournalOccupancy;
use campsync::pipeline::{Collaborators, RunLedger, SyncPipeline};
use campsync::ports::fs::{FsDocumentStore, FsSystemOfRecord, TextConfirmationRenderer};
use campsync::ports::{DocumentStore, Ephemeral, Lookup, OccupancyStore, SystemOfRecord};
use campsync::report::{daily_summary, summarize};
use campsync::{observability, source};

const USAGE: &str = "usage: campsync [run | lookup <identifier>]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        None | Some("run") => run(&config).await,
        Some("lookup") => {
            let identifier = args.next().context(USAGE)?;
            lookup(&config, &identifier).await
        }
        Some(other) => bail!("unknown command {other:?}\n{USAGE}"),
    }
}

async fn run(config: &Config) -> anyhow::Result<()> {
    observability::init(config.metrics_port)?;

    info!("campsync run");
    info!("  bookings: {}", config.bookings.display());
    info!("  data_dir: {}", config.data_dir.display());
    info!("  campground: {}", config.campground_id);
    info!(
        "  occupancy: {}",
        config
            .occupancy_journal
            .as_ref()
            .map_or("ephemeral".to_string(), |p| p.display().to_string())
    );

    let bookings = source::load_bookings(&config.bookings).await?;

    let occupancy: Arc<dyn OccupancyStore> = match &config.occupancy_journal {
        Some(path) => Arc::new(
            JournalOccupancy::open(path)
                .with_context(|| format!("opening occupancy journal {}", path.display()))?,
        ),
        None => Arc::new(Ephemeral),
    };
    let mut inventory = Inventory::initialize(&config.seed);
    let restored = inventory.restore(&occupancy.load().await?);
    if restored > 0 {
        info!("restored {restored} reservations from the occupancy journal");
        metrics::counter!(observability::OCCUPANCY_RESTORED_TOTAL).increment(restored as u64);
    }

    let system_of_record = Arc::new(
        FsSystemOfRecord::open(config.system_of_record_dir())
            .await
            .context("opening system of record")?,
    );
    let collaborators = Collaborators {
        system_of_record: system_of_record.clone(),
        documents: Arc::new(
            FsDocumentStore::open(config.documents_dir())
                .await
                .context("opening document store")?,
        ),
        artifacts: Arc::new(
            TextConfirmationRenderer::open(config.confirmations_dir())
                .await
                .context("opening confirmations directory")?,
        ),
        occupancy,
    };

    let pipeline = SyncPipeline::new(collaborators, config.pipeline_options());
    let report = pipeline
        .run(bookings, &mut inventory, &mut RunLedger::new())
        .await;

    let summary = summarize(&report, &inventory);
    info!("{summary}");
    for outcome in report.failed() {
        let problems: Vec<String> = outcome.problems.iter().map(ToString::to_string).collect();
        warn!(
            "booking {} {}: {}",
            outcome.booking.booking_id,
            outcome.status(),
            if problems.is_empty() { "no unit free".to_string() } else { problems.join("; ") }
        );
    }

    let daily = daily_summary(&report, config.campground_id, chrono::Local::now().date_naive());
    match daily.validate() {
        Ok(()) => {
            if let Err(e) = system_of_record.record_summary(&daily).await {
                error!("daily summary not recorded: {e}");
            }
        }
        Err(e) => warn!("daily summary skipped: {e}"),
    }
    Ok(())
}

async fn lookup(config: &Config, identifier: &str) -> anyhow::Result<()> {
    let Some(query) = Lookup::parse(identifier) else {
        bail!("identifier must not be empty\n{USAGE}");
    };
    let store = FsDocumentStore::open(config.documents_dir()).await?;
    let documents = store.find(&query).await?;
    if documents.is_empty() {
        println!("no bookings match {identifier:?}");
    }
    for document in documents {
        println!("{}", serde_json::to_string_pretty(&document)?);
    }
    Ok(())
}
