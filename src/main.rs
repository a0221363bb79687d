use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use place_resolver::config::Config;
use place_resolver::gazetteer::GazetteerIndex;
use place_resolver::models::collect_pending;
use place_resolver::resolve::{ResolutionContext, Resolver, RunSummary};
use place_resolver::sink::{attach_all, DocumentSink, LocationStore, ResultSink};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let Some(input) = std::env::args_os().nth(1).map(PathBuf::from) else {
        bail!("usage: place-resolver <documents.json>");
    };

    let config = Config::from_env();
    tracing::info!("POI search: {}", config.poi.base_url);
    tracing::info!("Geocoder: {}", config.geocoder.base_url);
    tracing::info!(
        "External call budget: {}, concurrency: {}",
        config.max_external_calls,
        config.concurrency
    );
    if config.poi.api_key.is_none() || config.geocoder.api_key.is_none() {
        tracing::warn!("Provider API key missing; external lookups will fail and fall back");
    }

    let gazetteer = Arc::new(GazetteerIndex::load(&config.pincode_file, &config.village_file)?);

    let documents = DocumentSink::load_documents(&input)?;
    let pending = collect_pending(&documents);
    let reported: usize = documents
        .iter()
        .filter(|d| d.is_report())
        .filter_map(|d| d.record.as_ref())
        .map(|r| r.locations.len())
        .sum();
    tracing::info!(
        "Loaded {} documents: {} mentions pending, {} already located",
        documents.len(),
        pending.len(),
        reported.saturating_sub(pending.len())
    );

    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .build()
        .context("Failed to build HTTP client")?;
    let resolver = Resolver::from_config(&config, gazetteer, client);
    let ctx = ResolutionContext::from_config(&config);

    let cancel = ctx.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; finishing in-flight lookups");
            cancel.cancel();
        }
    });

    let results = resolver
        .resolve_batch(pending.clone(), &ctx, config.concurrency)
        .await;

    let mut document_sink = DocumentSink::new(documents, DocumentSink::output_path_for(&input));
    let mut store = LocationStore::open_or_create(&config.store_path)?;
    store.seed_from_documents(document_sink.documents());
    attach_all(&mut document_sink, &pending, &results);
    attach_all(&mut store, &pending, &results);
    document_sink.flush()?;
    store.flush()?;

    RunSummary::tally(&results).log();
    tracing::info!("External calls left in budget: {}", ctx.budget.remaining());
    Ok(())
}
