//! The change-detection and idempotent-dispatch pipeline.
//!
//! One run walks a fixed stage sequence:
//!
//! ```text
//! fetch -> extract -> normalize -> dedup -> commit -> notify
//! ```
//!
//! Each stage is a pure function or a narrow-interface component returning
//! a value; the orchestrator owns the in-memory batch for the duration of
//! the run and decides the overall outcome:
//!
//! - A fetch or store failure ends the run at that stage with
//!   [`RunOutcome::Failed`]; nothing later is attempted, so a failed store
//!   can never produce a notification for items that were not persisted.
//! - An empty deduped batch short-circuits to [`RunOutcome::NoUpdate`]
//!   without touching the store or the notifier.
//! - Notification failures never roll back the commit and never fail the
//!   run: a successful store with missed deliveries is
//!   [`RunOutcome::PartialSuccess`].
//!
//! The dedup oracle is a seen-set snapshot taken once per run, not
//! re-queried per item; overlapping runs are reconciled at commit time by
//! the store's uniqueness guarantee (see [`crate::store`]).

use crate::dedup::filter_new;
use crate::extract::extract;
use crate::fetch::Source;
use crate::models::Item;
use crate::normalize::normalize;
use crate::notify::{Alerter, DeliveryReport};
use crate::store::ItemStore;
use scraper::Selector;
use serde::Serialize;
use std::fmt;
use tracing::{info, instrument, warn};
use url::Url;

/// Pipeline stages, used to name where a failed run died.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Fetch,
    Extract,
    Normalize,
    Dedup,
    Store,
    Notify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Extract => "extract",
            Stage::Normalize => "normalize",
            Stage::Dedup => "dedup",
            Stage::Store => "store",
            Stage::Notify => "notify",
        };
        write!(f, "{name}")
    }
}

/// Terminal result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    /// Nothing new on the source page; the store and notifier were not
    /// touched.
    NoUpdate,
    /// New items were committed and every destination was notified.
    Success {
        committed: usize,
        delivery: DeliveryReport,
    },
    /// New items were committed but at least one delivery failed. The
    /// commit stands.
    PartialSuccess {
        committed: usize,
        delivery: DeliveryReport,
    },
    /// The run was abandoned at `stage`; no side effects beyond what had
    /// already committed atomically.
    Failed { stage: Stage, reason: String },
}

impl RunOutcome {
    /// Machine-readable status code for the run.
    pub fn status_code(&self) -> &'static str {
        match self {
            RunOutcome::NoUpdate => "no_update",
            RunOutcome::Success { .. } => "success",
            RunOutcome::PartialSuccess { .. } => "partial_success",
            RunOutcome::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::NoUpdate => write!(f, "no new items"),
            RunOutcome::Success { committed, .. } => {
                write!(f, "stored and notified {committed} new item(s)")
            }
            RunOutcome::PartialSuccess {
                committed,
                delivery,
            } => write!(
                f,
                "stored {committed} new item(s) but only {}/{} notifications were delivered",
                delivery.delivered_count(),
                delivery.outcomes.len()
            ),
            RunOutcome::Failed { stage, reason } => write!(f, "failed at {stage}: {reason}"),
        }
    }
}

/// Sequences one run over the injected collaborators.
///
/// Holds the per-source constants: the selector rule that marks story
/// elements and the origin used to absolutize their links. Constructed
/// once at startup from configuration and passed by reference wherever a
/// run is triggered.
pub struct Pipeline {
    selector: Selector,
    origin: Url,
}

impl Pipeline {
    pub fn new(selector: Selector, origin: Url) -> Self {
        Self { selector, origin }
    }

    /// Execute one run to completion.
    ///
    /// Never returns an error: every way a run can end is a
    /// [`RunOutcome`], including failures.
    #[instrument(level = "info", skip_all)]
    pub async fn run<S, St, A>(&self, source: &S, store: &mut St, alerter: &A) -> RunOutcome
    where
        S: Source,
        St: ItemStore,
        A: Alerter,
    {
        let html = match source.fetch().await {
            Ok(html) => html,
            Err(e) => {
                warn!(error = %e, "Fetch failed; abandoning run");
                return RunOutcome::Failed {
                    stage: Stage::Fetch,
                    reason: e.to_string(),
                };
            }
        };

        let candidates = extract(&html, &self.selector);
        info!(stage = %Stage::Extract, candidates = candidates.len(), "Extracted candidates");

        let items: Vec<Item> = candidates
            .into_iter()
            .filter_map(|candidate| normalize(candidate, &self.origin))
            .collect();
        info!(stage = %Stage::Normalize, items = items.len(), "Normalized candidates");

        // Snapshot once; per-item re-queries would race a concurrent run.
        let seen = match store.current_links() {
            Ok(seen) => seen,
            Err(e) => {
                warn!(error = %e, "Could not read seen set; abandoning run");
                return RunOutcome::Failed {
                    stage: Stage::Store,
                    reason: e.to_string(),
                };
            }
        };

        let fresh = filter_new(items, &seen);
        if fresh.is_empty() {
            info!(stage = %Stage::Dedup, "No new items");
            return RunOutcome::NoUpdate;
        }
        info!(stage = %Stage::Dedup, fresh = fresh.len(), "New items found");

        let commit = match store.commit(&fresh) {
            Ok(commit) => commit,
            Err(e) => {
                warn!(error = %e, "Commit failed; abandoning run without notifying");
                return RunOutcome::Failed {
                    stage: Stage::Store,
                    reason: e.to_string(),
                };
            }
        };

        // A concurrent run may have recorded every link between our
        // snapshot and our commit; those items are theirs to notify.
        if commit.accepted.is_empty() {
            info!(
                skipped_existing = commit.skipped_existing,
                "Entire batch was already recorded elsewhere"
            );
            return RunOutcome::NoUpdate;
        }

        let delivery = alerter.notify(&commit.accepted).await;
        let committed = commit.rows_written();

        if delivery.all_delivered() {
            info!(stage = %Stage::Notify, committed, "Run complete; all notifications delivered");
            RunOutcome::Success {
                committed,
                delivery,
            }
        } else {
            warn!(
                stage = %Stage::Notify,
                committed,
                failed = delivery.failed_count(),
                "Run complete; some notifications were not delivered"
            );
            RunOutcome::PartialSuccess {
                committed,
                delivery,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, StoreError};
    use crate::models::CommitResult;
    use crate::notify::{DeliveryOutcome, DeliveryStatus};
    use std::collections::HashSet;
    use std::sync::Mutex;

    const PAGE: &str = r#"
        <html><body>
          <a class="story-link" href="/ai-atlas/alpha/">Alpha headline14 hours ago</a>
          <a class="story-link" href="/ai-atlas/beta/">Beta headline9:05 • 2 days ago</a>
          <a class="story-link" href="/ai-atlas/gamma/">Gamma headline</a>
        </body></html>
    "#;

    fn pipeline() -> Pipeline {
        Pipeline::new(
            Selector::parse("a.story-link").unwrap(),
            Url::parse("https://www.cnet.com").unwrap(),
        )
    }

    struct FakeSource {
        html: Option<String>,
    }

    impl FakeSource {
        fn page(html: &str) -> Self {
            Self {
                html: Some(html.to_string()),
            }
        }

        fn failing() -> Self {
            Self { html: None }
        }
    }

    impl Source for FakeSource {
        async fn fetch(&self) -> Result<String, FetchError> {
            match &self.html {
                Some(html) => Ok(html.clone()),
                None => Err(FetchError::Status {
                    status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                    url: "https://www.cnet.com/ai-atlas/".to_string(),
                }),
            }
        }
    }

    #[derive(Default)]
    struct MemStore {
        rows: Vec<Item>,
        fail_commits: bool,
        skip_all: bool,
        commit_calls: usize,
    }

    impl ItemStore for MemStore {
        fn current_links(&self) -> Result<HashSet<String>, StoreError> {
            Ok(self.rows.iter().map(|item| item.link.clone()).collect())
        }

        fn commit(&mut self, items: &[Item]) -> Result<CommitResult, StoreError> {
            self.commit_calls += 1;
            if self.fail_commits {
                // Whole batch fails; nothing becomes visible.
                return Err(StoreError::Unavailable("injected failure".to_string()));
            }
            if self.skip_all {
                return Ok(CommitResult {
                    accepted: Vec::new(),
                    skipped_existing: items.len(),
                });
            }
            self.rows.extend_from_slice(items);
            Ok(CommitResult {
                accepted: items.to_vec(),
                skipped_existing: 0,
            })
        }
    }

    struct RecordingAlerter {
        batches: Mutex<Vec<Vec<Item>>>,
        failing_destinations: usize,
    }

    impl RecordingAlerter {
        fn new() -> Self {
            Self {
                batches: Mutex::new(Vec::new()),
                failing_destinations: 0,
            }
        }

        fn with_failures(failing_destinations: usize) -> Self {
            Self {
                batches: Mutex::new(Vec::new()),
                failing_destinations,
            }
        }

        fn notified_batches(&self) -> Vec<Vec<Item>> {
            self.batches.lock().unwrap().clone()
        }
    }

    impl Alerter for RecordingAlerter {
        async fn notify(&self, items: &[Item]) -> DeliveryReport {
            self.batches.lock().unwrap().push(items.to_vec());
            let mut outcomes = vec![DeliveryOutcome {
                destination: "+15551230001".to_string(),
                status: DeliveryStatus::Delivered {
                    receipt: "SM1".to_string(),
                },
            }];
            for i in 0..self.failing_destinations {
                outcomes.push(DeliveryOutcome {
                    destination: format!("+1555123100{i}"),
                    status: DeliveryStatus::Failed {
                        reason: "injected failure".to_string(),
                    },
                });
            }
            DeliveryReport { outcomes }
        }
    }

    #[tokio::test]
    async fn test_second_run_on_unchanged_page_is_no_update() {
        let source = FakeSource::page(PAGE);
        let mut store = MemStore::default();
        let alerter = RecordingAlerter::new();
        let pipe = pipeline();

        let first = pipe.run(&source, &mut store, &alerter).await;
        assert!(matches!(first, RunOutcome::Success { committed: 3, .. }));
        let rows_after_first = store.rows.len();

        let second = pipe.run(&source, &mut store, &alerter).await;
        assert_eq!(second, RunOutcome::NoUpdate);
        assert_eq!(store.rows.len(), rows_after_first);
        // The notifier saw exactly one batch; nothing was re-notified.
        assert_eq!(alerter.notified_batches().len(), 1);
    }

    #[tokio::test]
    async fn test_committed_batch_is_cleaned_and_in_document_order() {
        let source = FakeSource::page(PAGE);
        let mut store = MemStore::default();
        let alerter = RecordingAlerter::new();

        pipeline().run(&source, &mut store, &alerter).await;

        let headlines: Vec<&str> = store.rows.iter().map(|i| i.headline.as_str()).collect();
        assert_eq!(
            headlines,
            vec!["Alpha headline", "Beta headline", "Gamma headline"]
        );
        assert_eq!(store.rows[0].link, "https://www.cnet.com/ai-atlas/alpha/");

        // The notified batch equals the committed batch, same order.
        assert_eq!(alerter.notified_batches(), vec![store.rows.clone()]);
    }

    #[tokio::test]
    async fn test_only_unseen_items_are_committed_and_notified() {
        let source = FakeSource::page(PAGE);
        let mut store = MemStore::default();
        store.rows.push(Item {
            headline: "Alpha headline".to_string(),
            link: "https://www.cnet.com/ai-atlas/alpha/".to_string(),
        });
        let alerter = RecordingAlerter::new();

        let outcome = pipeline().run(&source, &mut store, &alerter).await;
        assert!(matches!(outcome, RunOutcome::Success { committed: 2, .. }));

        let batches = alerter.notified_batches();
        assert_eq!(batches.len(), 1);
        let notified: Vec<&str> = batches[0].iter().map(|i| i.headline.as_str()).collect();
        assert_eq!(notified, vec!["Beta headline", "Gamma headline"]);
    }

    #[tokio::test]
    async fn test_batch_internal_duplicates_commit_once() {
        let html = r#"
            <a class="story-link" href="/ai-atlas/dup/">First wording2 hours ago</a>
            <a class="story-link" href="/ai-atlas/dup/">Second wording</a>
        "#;
        let source = FakeSource::page(html);
        let mut store = MemStore::default();
        let alerter = RecordingAlerter::new();

        let outcome = pipeline().run(&source, &mut store, &alerter).await;
        assert!(matches!(outcome, RunOutcome::Success { committed: 1, .. }));
        assert_eq!(store.rows.len(), 1);
        assert_eq!(store.rows[0].headline, "First wording");
    }

    #[tokio::test]
    async fn test_fetch_failure_stops_the_run_before_any_stage() {
        let source = FakeSource::failing();
        let mut store = MemStore::default();
        let alerter = RecordingAlerter::new();

        let outcome = pipeline().run(&source, &mut store, &alerter).await;

        assert!(matches!(
            outcome,
            RunOutcome::Failed {
                stage: Stage::Fetch,
                ..
            }
        ));
        assert_eq!(outcome.status_code(), "failed");
        assert_eq!(store.commit_calls, 0);
        assert!(alerter.notified_batches().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_leaves_no_rows_and_never_notifies() {
        let source = FakeSource::page(PAGE);
        let mut store = MemStore {
            fail_commits: true,
            ..MemStore::default()
        };
        let alerter = RecordingAlerter::new();

        let outcome = pipeline().run(&source, &mut store, &alerter).await;

        assert!(matches!(
            outcome,
            RunOutcome::Failed {
                stage: Stage::Store,
                ..
            }
        ));
        assert!(store.rows.is_empty());
        assert!(alerter.notified_batches().is_empty());
    }

    #[tokio::test]
    async fn test_partial_delivery_reports_partial_success_and_keeps_commit() {
        let source = FakeSource::page(PAGE);
        let mut store = MemStore::default();
        let alerter = RecordingAlerter::with_failures(1);

        let outcome = pipeline().run(&source, &mut store, &alerter).await;

        match &outcome {
            RunOutcome::PartialSuccess {
                committed,
                delivery,
            } => {
                assert_eq!(*committed, 3);
                assert_eq!(delivery.failed_count(), 1);
            }
            other => panic!("expected PartialSuccess, got {other:?}"),
        }
        assert_eq!(outcome.status_code(), "partial_success");
        // The commit is intact.
        assert_eq!(store.rows.len(), 3);
    }

    #[tokio::test]
    async fn test_page_with_no_matching_elements_is_no_update() {
        let source = FakeSource::page("<html><body><p>quiet day</p></body></html>");
        let mut store = MemStore::default();
        let alerter = RecordingAlerter::new();

        let outcome = pipeline().run(&source, &mut store, &alerter).await;

        assert_eq!(outcome, RunOutcome::NoUpdate);
        assert_eq!(outcome.status_code(), "no_update");
        assert_eq!(store.commit_calls, 0);
        assert!(alerter.notified_batches().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_candidates_never_reach_the_store() {
        let html = r#"
            <a class="story-link" href="">No link here</a>
            <a class="story-link" href="/ai-atlas/only-time/">3 hours ago</a>
            <a class="story-link" href="/ai-atlas/kept/">Kept story</a>
        "#;
        let source = FakeSource::page(html);
        let mut store = MemStore::default();
        let alerter = RecordingAlerter::new();

        let outcome = pipeline().run(&source, &mut store, &alerter).await;
        assert!(matches!(outcome, RunOutcome::Success { committed: 1, .. }));
        assert_eq!(store.rows.len(), 1);
        assert_eq!(store.rows[0].headline, "Kept story");
    }

    #[tokio::test]
    async fn test_batch_fully_claimed_by_concurrent_writer_is_no_update() {
        let source = FakeSource::page(PAGE);
        let mut store = MemStore {
            skip_all: true,
            ..MemStore::default()
        };
        let alerter = RecordingAlerter::new();

        let outcome = pipeline().run(&source, &mut store, &alerter).await;

        assert_eq!(outcome, RunOutcome::NoUpdate);
        assert_eq!(store.commit_calls, 1);
        assert!(alerter.notified_batches().is_empty());
    }
}
