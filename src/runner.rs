//! Partitioned execution: one isolated blocking job per partition, merged
//! through a single channel into one report. Workers share nothing but the
//! deduplication set and the merge point.

use crate::collector::{CollectResult, StopReason};
use crate::error::WorkerError;
use crate::models::{Record, RunSummary};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task;
use tracing::{error, info, warn};

/// One partition's collection run, ready to execute on a blocking thread.
/// The closure owns its element source and everything else it needs.
pub struct Job {
    pub partition: String,
    run: Box<dyn FnOnce() -> Result<CollectResult, WorkerError> + Send + 'static>,
}

impl Job {
    pub fn new(
        partition: impl Into<String>,
        run: impl FnOnce() -> Result<CollectResult, WorkerError> + Send + 'static,
    ) -> Self {
        Self {
            partition: partition.into(),
            run: Box::new(run),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PartitionOutcome {
    pub partition: String,
    pub accepted: usize,
    pub reason: Option<StopReason>,
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct RunReport {
    /// Merged records: per-worker first-seen order, partitions concatenated
    /// in completion order, truncated to the global target.
    pub records: Vec<Record>,
    pub outcomes: Vec<PartitionOutcome>,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        let mut partitions = BTreeMap::new();
        for outcome in &self.outcomes {
            partitions.insert(outcome.partition.clone(), outcome.accepted);
        }
        RunSummary::new(self.records.len(), partitions)
    }
}

/// Run every job, at most `max_workers` concurrently, and merge results.
///
/// A failing or panicking worker is contained at this boundary: it is logged
/// and contributes zero results while the other partitions proceed. Partial
/// results returned by a timed-out worker are merged like any others.
pub async fn run_partitions(jobs: Vec<Job>, max_workers: usize, max_results: usize) -> RunReport {
    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let (tx, mut rx) = mpsc::unbounded_channel();

    for job in jobs {
        let semaphore = Arc::clone(&semaphore);
        let tx = tx.clone();
        tokio::spawn(async move {
            let Job { partition, run } = job;
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            let joined = task::spawn_blocking(run).await;
            let _ = tx.send((partition, joined));
        });
    }
    drop(tx);

    let mut records = Vec::new();
    let mut outcomes = Vec::new();
    while let Some((partition, joined)) = rx.recv().await {
        match joined {
            Ok(Ok(result)) => {
                info!(
                    partition = %partition,
                    accepted = result.items.len(),
                    reason = ?result.reason,
                    duplicates = result.duplicates,
                    "partition finished"
                );
                outcomes.push(PartitionOutcome {
                    partition,
                    accepted: result.items.len(),
                    reason: Some(result.reason),
                    error: None,
                });
                records.extend(result.items);
            }
            Ok(Err(err)) => {
                error!(partition = %partition, error = %err, "partition failed");
                outcomes.push(PartitionOutcome {
                    partition,
                    accepted: 0,
                    reason: None,
                    error: Some(err.to_string()),
                });
            }
            Err(join_err) => {
                error!(partition = %partition, error = %join_err, "worker crashed");
                outcomes.push(PartitionOutcome {
                    partition,
                    accepted: 0,
                    reason: None,
                    error: Some(format!("worker crashed: {join_err}")),
                });
            }
        }
    }

    if records.len() > max_results {
        warn!(
            merged = records.len(),
            max_results, "merged more records than the global target, truncating"
        );
        records.truncate(max_results);
    }
    RunReport { records, outcomes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::sources::{SeenSet, SharedSeen};

    fn ok_result(names: &[&str]) -> CollectResult {
        CollectResult {
            items: names
                .iter()
                .map(|n| Record::from_pairs(&[("name", n)]))
                .collect(),
            reason: StopReason::Exhausted,
            iterations: 1,
            duplicates: 0,
            failed_extractions: 0,
        }
    }

    #[tokio::test]
    async fn failing_and_panicking_workers_do_not_block_others() {
        let jobs = vec![
            Job::new("east", || Ok(ok_result(&["A", "B"]))),
            Job::new("west", || {
                Err(WorkerError::Source(SourceError::Unavailable(
                    "feed never appeared".to_string(),
                )))
            }),
            Job::new("north", || panic!("boom")),
        ];

        let report = run_partitions(jobs, 2, 100).await;

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.outcomes.len(), 3);
        let by_name = |p: &str| {
            report
                .outcomes
                .iter()
                .find(|o| o.partition == p)
                .unwrap()
                .clone()
        };
        assert_eq!(by_name("east").accepted, 2);
        assert!(by_name("west").error.is_some());
        assert!(by_name("north").error.as_deref().unwrap().contains("crashed"));
    }

    #[tokio::test]
    async fn merged_records_are_truncated_to_the_global_target() {
        let jobs = vec![
            Job::new("p1", || Ok(ok_result(&["A", "B", "C"]))),
            Job::new("p2", || Ok(ok_result(&["D", "E", "F"]))),
        ];
        let report = run_partitions(jobs, 4, 4).await;
        assert_eq!(report.records.len(), 4);
    }

    #[tokio::test]
    async fn workers_share_one_seen_set() {
        let shared = SharedSeen::new();
        let make_job = |partition: &str, names: Vec<&'static str>| {
            let mut seen = shared.clone();
            Job::new(partition, move || {
                let mut result = ok_result(&[]);
                for name in names {
                    if seen.claim(name) {
                        result.items.push(Record::from_pairs(&[("name", name)]));
                    }
                }
                Ok(result)
            })
        };
        // One worker at a time so the claim order is deterministic.
        let jobs = vec![
            make_job("p1", vec!["A", "B"]),
            make_job("p2", vec!["A", "C"]),
        ];
        let report = run_partitions(jobs, 1, 100).await;

        let mut all_names: Vec<String> = report
            .records
            .iter()
            .map(|r| r.get("name").unwrap().to_string())
            .collect();
        all_names.sort();
        assert_eq!(all_names, ["A", "B", "C"]);
    }

    #[tokio::test]
    async fn summary_counts_per_partition() {
        let jobs = vec![
            Job::new("p1", || Ok(ok_result(&["A"]))),
            Job::new("p2", || Ok(ok_result(&["B", "C"]))),
        ];
        let report = run_partitions(jobs, 2, 100).await;
        let summary = report.summary();

        assert_eq!(summary.total_records, 3);
        assert_eq!(summary.partitions.get("p1"), Some(&1));
        assert_eq!(summary.partitions.get("p2"), Some(&2));
    }
}
