//! The incremental collection loop: read newly materialized elements, extract
//! defensively, deduplicate by identity key, scroll for more, and stop once
//! the target is reached or the source has stalled long enough to be
//! considered exhausted.

use crate::error::{ConfigError, ExtractError, SourceError};
use crate::models::Record;
use crate::pacing::DelayProfile;
use crate::sources::{ElementSource, Extract, SeenSet};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Consecutive no-progress iterations before the source is declared
/// exhausted. A heuristic, not a proof: a slow source can be mistaken for an
/// empty one.
pub const DEFAULT_STALL_THRESHOLD: usize = 3;

#[derive(Debug, Clone)]
pub struct CollectorOptions {
    max_results: usize,
    stall_threshold: usize,
    pacing: DelayProfile,
    deadline: Option<Instant>,
}

impl CollectorOptions {
    /// `max_results` of zero is a precondition violation and is rejected
    /// here, never handled inside the loop.
    pub fn new(max_results: usize) -> Result<Self, ConfigError> {
        if max_results == 0 {
            return Err(ConfigError::ZeroMaxResults);
        }
        Ok(Self {
            max_results,
            stall_threshold: DEFAULT_STALL_THRESHOLD,
            pacing: DelayProfile::none(),
            deadline: None,
        })
    }

    pub fn with_stall_threshold(mut self, threshold: usize) -> Result<Self, ConfigError> {
        if threshold == 0 {
            return Err(ConfigError::ZeroStallThreshold);
        }
        self.stall_threshold = threshold;
        Ok(self)
    }

    pub fn with_pacing(mut self, pacing: DelayProfile) -> Self {
        self.pacing = pacing;
        self
    }

    /// Cooperative time bound: the loop will not start another outer
    /// iteration past the deadline. In-flight extraction is never preempted.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }
}

/// Why a collection run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `max_results` accepted items.
    TargetReached,
    /// Stalled for the configured number of iterations.
    Exhausted,
    /// The per-run deadline passed before the next iteration.
    DeadlineExceeded,
}

#[derive(Debug)]
pub struct CollectResult {
    /// Accepted items in first-seen order, at most `max_results` of them.
    pub items: Vec<Record>,
    pub reason: StopReason,
    pub iterations: usize,
    pub duplicates: usize,
    pub failed_extractions: usize,
}

pub struct Collector {
    options: CollectorOptions,
}

impl Collector {
    pub fn new(options: CollectorOptions) -> Self {
        Self { options }
    }

    /// Run the loop until the target count is reached, the source looks
    /// exhausted, or the deadline passes.
    ///
    /// Only a source failure propagates; a single unreadable element is
    /// skipped and counted, and an item without its identity field is dropped
    /// as noise.
    pub fn collect<S, X, F, D>(
        &self,
        source: &mut S,
        extractor: &X,
        identity: F,
        seen: &mut D,
    ) -> Result<CollectResult, SourceError>
    where
        S: ElementSource,
        X: Extract<S::Element>,
        F: Fn(&Record) -> Option<String>,
        D: SeenSet,
    {
        let opts = &self.options;
        let mut accepted: Vec<Record> = Vec::new();
        let mut cursor = 0usize;
        let mut stall_count = 0usize;
        let mut iterations = 0usize;
        let mut duplicates = 0usize;
        let mut failed_extractions = 0usize;

        let reason = loop {
            if let Some(deadline) = opts.deadline {
                if Instant::now() >= deadline {
                    info!(
                        accepted = accepted.len(),
                        "deadline passed, not starting another iteration"
                    );
                    break StopReason::DeadlineExceeded;
                }
            }
            iterations += 1;

            let elements = source.current_elements()?;
            let before = accepted.len();

            // Previously processed elements are never re-extracted.
            for element in &elements[cursor.min(elements.len())..] {
                if accepted.len() >= opts.max_results {
                    break;
                }
                opts.pacing.pre_extract.sleep();

                let item = match extractor.extract(element) {
                    Ok(item) => item,
                    Err(ExtractError::Stale) => {
                        failed_extractions += 1;
                        warn!("element unreadable, skipping");
                        continue;
                    }
                };
                let Some(key) = identity(&item) else {
                    debug!("item lacks its identity field, dropped as noise");
                    continue;
                };
                if !seen.claim(&key) {
                    duplicates += 1;
                    debug!(%key, "duplicate, skipped");
                    continue;
                }
                debug!(%key, accepted = accepted.len() + 1, "accepted");
                accepted.push(item);
            }
            cursor = elements.len();

            if accepted.len() >= opts.max_results {
                break StopReason::TargetReached;
            }
            if accepted.len() == before {
                stall_count += 1;
                if stall_count >= opts.stall_threshold {
                    info!(
                        iterations,
                        accepted = accepted.len(),
                        stall_count,
                        "no new results, source considered exhausted"
                    );
                    break StopReason::Exhausted;
                }
            } else {
                stall_count = 0;
            }

            opts.pacing.pre_advance.sleep();
            source.advance()?;
            opts.pacing.post_advance.sleep();
        };

        accepted.truncate(opts.max_results);
        Ok(CollectResult {
            items: accepted,
            reason,
            iterations,
            duplicates,
            failed_extractions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::identity_key;
    use crate::sources::SharedSeen;
    use std::collections::HashSet;

    /// Source that replays a fixed sequence of cumulative snapshots. The last
    /// snapshot repeats once the script runs out, like a feed that has
    /// stopped growing.
    struct ScriptedSource {
        batches: Vec<Vec<&'static str>>,
        index: usize,
        advances: usize,
    }

    impl ScriptedSource {
        fn new(batches: Vec<Vec<&'static str>>) -> Self {
            Self {
                batches,
                index: 0,
                advances: 0,
            }
        }
    }

    impl ElementSource for ScriptedSource {
        type Element = &'static str;

        fn current_elements(&mut self) -> Result<Vec<&'static str>, SourceError> {
            Ok(self.batches[self.index].clone())
        }

        fn advance(&mut self) -> Result<(), SourceError> {
            self.advances += 1;
            if self.index + 1 < self.batches.len() {
                self.index += 1;
            }
            Ok(())
        }
    }

    /// Extractor keyed on the element string itself: "stale" fails, "anon"
    /// yields a record without a name, "bare" has a name but no address.
    struct NameExtractor;

    impl Extract<&'static str> for NameExtractor {
        fn extract(&self, element: &&'static str) -> Result<Record, ExtractError> {
            match *element {
                "stale" => Err(ExtractError::Stale),
                "anon" => Ok(Record::from_pairs(&[("rating", "4.0")])),
                "bare" => Ok(Record::from_pairs(&[("name", "bare")])),
                name => Ok(Record::from_pairs(&[
                    ("name", name),
                    ("address", "1 Main St"),
                ])),
            }
        }
    }

    fn ident(record: &Record) -> Option<String> {
        identity_key(record, &["name", "address"])
    }

    fn collect(
        source: &mut ScriptedSource,
        options: CollectorOptions,
    ) -> CollectResult {
        let mut seen: HashSet<String> = HashSet::new();
        Collector::new(options)
            .collect(source, &NameExtractor, ident, &mut seen)
            .expect("scripted source never fails")
    }

    fn names(result: &CollectResult) -> Vec<&str> {
        result
            .items
            .iter()
            .map(|r| r.get("name").unwrap_or("?"))
            .collect()
    }

    #[test]
    fn duplicate_in_later_batch_is_skipped_without_stalling() {
        // Feed grows [A,B] then [A,B,A,C]: A shows up again among the newly
        // materialized elements and must be deduplicated while C is accepted.
        let mut source = ScriptedSource::new(vec![
            vec!["A", "B"],
            vec!["A", "B", "A", "C"],
        ]);
        let result = collect(&mut source, CollectorOptions::new(10).unwrap());

        assert_eq!(names(&result), ["A", "B", "C"]);
        assert_eq!(result.duplicates, 1);
        assert_eq!(result.reason, StopReason::Exhausted);
    }

    #[test]
    fn unchanging_source_stops_after_three_stalls() {
        let mut source = ScriptedSource::new(vec![vec!["A", "B"]]);
        let result = collect(&mut source, CollectorOptions::new(10).unwrap());

        assert_eq!(names(&result), ["A", "B"]);
        assert_eq!(result.reason, StopReason::Exhausted);
        // One productive iteration, then three stalled ones; the loop stops
        // instead of advancing a fourth time.
        assert_eq!(source.advances, 3);
        assert_eq!(result.iterations, 4);
    }

    #[test]
    fn target_of_one_stops_without_advancing() {
        let mut source = ScriptedSource::new(vec![vec!["A", "B", "C"]]);
        let result = collect(&mut source, CollectorOptions::new(1).unwrap());

        assert_eq!(names(&result), ["A"]);
        assert_eq!(result.reason, StopReason::TargetReached);
        assert_eq!(source.advances, 0);
    }

    #[test]
    fn output_is_bounded_by_max_results() {
        let batch: Vec<&'static str> = vec![
            "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l",
        ];
        let mut source = ScriptedSource::new(vec![batch]);
        let result = collect(&mut source, CollectorOptions::new(7).unwrap());

        assert_eq!(result.items.len(), 7);
        assert_eq!(result.reason, StopReason::TargetReached);
    }

    #[test]
    fn output_preserves_first_seen_order() {
        let mut source = ScriptedSource::new(vec![
            vec!["zebra", "apple"],
            vec!["zebra", "apple", "mango"],
        ]);
        let result = collect(&mut source, CollectorOptions::new(10).unwrap());

        assert_eq!(names(&result), ["zebra", "apple", "mango"]);
    }

    #[test]
    fn missing_identity_field_drops_only_that_item() {
        let mut source = ScriptedSource::new(vec![vec!["bare", "anon", "A"]]);
        let result = collect(&mut source, CollectorOptions::new(10).unwrap());

        // "bare" has a name but no address and is still accepted; "anon" has
        // no name at all and vanishes without affecting the rest.
        assert_eq!(names(&result), ["bare", "A"]);
    }

    #[test]
    fn stale_element_is_skipped_and_never_reprocessed() {
        let mut source = ScriptedSource::new(vec![
            vec!["stale", "A"],
            vec!["stale", "A", "B"],
        ]);
        let result = collect(&mut source, CollectorOptions::new(10).unwrap());

        assert_eq!(names(&result), ["A", "B"]);
        assert_eq!(result.failed_extractions, 1);
    }

    #[test]
    fn source_that_never_yields_terminates_empty() {
        let mut source = ScriptedSource::new(vec![vec![]]);
        let result = collect(&mut source, CollectorOptions::new(10).unwrap());

        assert!(result.items.is_empty());
        assert_eq!(result.reason, StopReason::Exhausted);
        assert_eq!(source.advances, 2);
    }

    #[test]
    fn expired_deadline_stops_before_the_first_iteration() {
        let mut source = ScriptedSource::new(vec![vec!["A"]]);
        let options = CollectorOptions::new(10)
            .unwrap()
            .with_deadline(Instant::now());
        let result = collect(&mut source, options);

        assert!(result.items.is_empty());
        assert_eq!(result.reason, StopReason::DeadlineExceeded);
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn zero_targets_are_rejected_at_construction() {
        assert_eq!(
            CollectorOptions::new(0).unwrap_err(),
            ConfigError::ZeroMaxResults
        );
        assert_eq!(
            CollectorOptions::new(5)
                .unwrap()
                .with_stall_threshold(0)
                .unwrap_err(),
            ConfigError::ZeroStallThreshold
        );
    }

    #[test]
    fn shared_seen_dedupes_across_runs() {
        let shared = SharedSeen::new();

        let mut first = ScriptedSource::new(vec![vec!["A", "B"]]);
        let mut seen = shared.clone();
        let result = Collector::new(CollectorOptions::new(10).unwrap())
            .collect(&mut first, &NameExtractor, ident, &mut seen)
            .unwrap();
        assert_eq!(names(&result), ["A", "B"]);

        let mut second = ScriptedSource::new(vec![vec!["A", "C"]]);
        let mut seen = shared.clone();
        let result = Collector::new(CollectorOptions::new(10).unwrap())
            .collect(&mut second, &NameExtractor, ident, &mut seen)
            .unwrap();
        assert_eq!(names(&result), ["C"]);
        assert_eq!(result.duplicates, 1);
    }

    #[test]
    fn custom_stall_threshold_is_honored() {
        let mut source = ScriptedSource::new(vec![vec!["A"]]);
        let options = CollectorOptions::new(10)
            .unwrap()
            .with_stall_threshold(1)
            .unwrap();
        let result = collect(&mut source, options);

        assert_eq!(names(&result), ["A"]);
        assert_eq!(source.advances, 1);
    }
}
