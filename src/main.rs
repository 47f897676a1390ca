use anyhow::Result;
use listing_scout::collector::{CollectResult, Collector, CollectorOptions};
use listing_scout::config::ScoutConfig;
use listing_scout::error::{SourceError, WorkerError};
use listing_scout::models::{identity_key, Record};
use listing_scout::runner::{self, Job};
use listing_scout::sink;
use listing_scout::sources::{
    FeedSource, MapsExtractor, SharedSeen, MAPS_CARD_SELECTOR, MAPS_FEED_SELECTOR,
};
use std::time::Instant;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => ScoutConfig::load(path)?,
        None => {
            let config = ScoutConfig::default();
            config.validate()?;
            config
        }
    };

    info!(
        query = %config.query,
        partitions = config.partition_list().len(),
        target = config.max_results,
        "listing-scout starting"
    );

    let shared_seen = SharedSeen::new();
    let per_partition = config.per_partition_target();

    let mut jobs = Vec::new();
    for partition in config.partition_list() {
        let label = if partition.is_empty() {
            "all".to_string()
        } else {
            partition.clone()
        };
        let config = config.clone();
        let seen = shared_seen.clone();
        jobs.push(Job::new(label, move || {
            run_partition(&config, &partition, per_partition, seen)
        }));
    }

    let report = runner::run_partitions(jobs, config.max_workers, config.max_results).await;

    info!(
        "collected {} records across {} partitions",
        report.records.len(),
        report.outcomes.len()
    );
    for (i, record) in report.records.iter().take(5).enumerate() {
        println!(
            "{}. {} — {} (rating: {})",
            i + 1,
            record.get("name").unwrap_or("?"),
            record.get("address").unwrap_or("-"),
            record.get("rating").unwrap_or("-"),
        );
    }

    sink::write_csv(&report.records, &config.output_csv)?;
    sink::write_summary(&report.summary(), &config.output_summary)?;

    Ok(())
}

/// One partition's run: own browser, own feed, own collector state. Only the
/// seen-set is shared.
fn run_partition(
    config: &ScoutConfig,
    partition: &str,
    target: usize,
    mut seen: SharedSeen,
) -> Result<CollectResult, WorkerError> {
    let label = if partition.is_empty() { "all" } else { partition };

    let browser = FeedSource::launch_browser(config.headless).map_err(|e| {
        WorkerError::SourceInit {
            partition: label.to_string(),
            source: SourceError::Browser(e),
        }
    })?;

    let url = FeedSource::maps_search_url(&config.query, partition);
    let mut source = FeedSource::open(
        &browser,
        &url,
        MAPS_FEED_SELECTOR,
        MAPS_CARD_SELECTOR,
        config.feed_wait(),
        config.scroll_step_px(),
    )?;

    let extractor = MapsExtractor::new()?;

    let mut options = CollectorOptions::new(target)
        .map_err(anyhow::Error::from)?
        .with_stall_threshold(config.stall_threshold)
        .map_err(anyhow::Error::from)?
        .with_pacing(config.delays);
    if let Some(timeout) = config.worker_timeout() {
        options = options.with_deadline(Instant::now() + timeout);
    }

    let fields = config.identity_fields.clone();
    let suffix = partition.to_string();
    let identity = move |record: &Record| {
        identity_key(record, &fields).map(|key| {
            if suffix.is_empty() {
                key
            } else {
                format!("{key}_{suffix}")
            }
        })
    };

    let mut result = Collector::new(options).collect(&mut source, &extractor, identity, &mut seen)?;

    if !partition.is_empty() {
        for record in &mut result.items {
            record.set(config.partition_field.as_str(), partition);
        }
    }
    Ok(result)
}
