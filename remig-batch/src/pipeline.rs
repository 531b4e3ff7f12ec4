//! Batch pipeline orchestration
//!
//! Drives every archive item through extraction, cleansing, validation and
//! reconciliation under a bounded worker pool. Item failures are terminal
//! for the item only; the run itself fails only on infrastructure faults.
//!
//! COPY items can legitimately arrive before their ORIGINAL in inventory
//! order. A COPY rejected because its ORIGINAL or case is absent or still
//! in flight is deferred and retried once after the first pass completes;
//! a second rejection is final.

use crate::entities::{
    compare_version_strings, FailedItem, FailureCategory, RawArchiveItem, VersionType,
};
use crate::reference::{ReferenceSnapshot, SourceRow};
use crate::services::archive_select::{self, CandidateFile};
use crate::services::extraction::{ExtractionOutcome, MetadataExtractor};
use crate::services::reconcile::{GraphBuilder, ReconcileOutcome};
use crate::services::records::MigrationRecordStore;
use crate::services::state_store::{self, InMemoryStateStore};
use crate::services::tracker::{MigrationTracker, TrackerReport};
use crate::services::transformation::DataTransformer;
use crate::services::validation::DataValidator;
use remig_common::{Error, MigrationConfig, Result};
use sqlx::SqlitePool;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Counts for one completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total_archives: usize,
    pub migrated: usize,
    pub failed: usize,
    pub test_items: usize,
    pub notify_items: usize,
    pub retried: usize,
}

enum ItemOutcome {
    Done,
    /// COPY waiting on an ORIGINAL that may appear later in the pass.
    Deferred,
}

struct PipelineCtx {
    config: MigrationConfig,
    extractor: MetadataExtractor,
    snapshot: ReferenceSnapshot,
    store: InMemoryStateStore,
    records: MigrationRecordStore,
    tracker: MigrationTracker,
}

pub struct Pipeline {
    ctx: Arc<PipelineCtx>,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Build a pipeline for one run over the given inventory rows. The
    /// reference snapshot is fixed from the rows at construction and never
    /// refreshed mid-run.
    pub fn new(config: MigrationConfig, db: SqlitePool, rows: Vec<SourceRow>) -> (Self, Vec<RawArchiveItem>) {
        let (snapshot, archives) = ReferenceSnapshot::from_rows(rows);
        let ctx = PipelineCtx {
            extractor: MetadataExtractor::new(config.clone()),
            config,
            snapshot,
            store: InMemoryStateStore::new(),
            records: MigrationRecordStore::new(db),
            tracker: MigrationTracker::new(),
        };
        (
            Self {
                ctx: Arc::new(ctx),
                cancel: CancellationToken::new(),
            },
            archives,
        )
    }

    /// Token for external shutdown; in-flight items finish, queued items
    /// are abandoned.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Everything tracked during the run, for the reporting collaborator.
    pub fn report(&self) -> TrackerReport {
        self.ctx.tracker.report()
    }

    pub async fn run(&self, archives: Vec<RawArchiveItem>) -> Result<RunSummary> {
        self.ctx.records.init_schema().await?;
        let total = archives.len();
        info!(total, workers = self.ctx.config.max_workers, "starting migration run");

        let archives = self.ctx.select_inventory(archives).await?;
        if archives.len() < total {
            info!(
                dropped = total - archives.len(),
                "dropped losing duplicate files"
            );
        }

        let semaphore = Arc::new(Semaphore::new(self.ctx.config.max_workers.max(1)));
        let deferred: Arc<Mutex<Vec<RawArchiveItem>>> = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::with_capacity(total);

        for item in archives {
            if self.cancel.is_cancelled() {
                warn!("cancellation requested; abandoning remaining items");
                break;
            }
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| Error::Internal(format!("worker pool closed: {e}")))?;
            let ctx = Arc::clone(&self.ctx);
            let deferred = Arc::clone(&deferred);
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                match ctx.process_item(&item, true).await {
                    Ok(ItemOutcome::Done) => {}
                    Ok(ItemOutcome::Deferred) => {
                        deferred.lock().expect("deferral lock poisoned").push(item);
                    }
                    Err(e) => ctx.fail_item(&item, FailureCategory::General, &e.to_string()).await,
                }
            }));
        }

        for handle in handles {
            handle
                .await
                .map_err(|e| Error::Internal(format!("worker panicked: {e}")))?;
        }

        // Single retry pass for COPYs that outran their ORIGINAL. Runs
        // sequentially; a second deferral is a final failure.
        let retries: Vec<RawArchiveItem> = {
            let mut guard = deferred.lock().expect("deferral lock poisoned");
            std::mem::take(&mut *guard)
        };
        let retried = retries.len();
        if retried > 0 {
            info!(count = retried, "retrying deferred copy items");
        }
        for item in retries {
            if self.cancel.is_cancelled() {
                break;
            }
            if let Err(e) = self.ctx.process_item(&item, false).await {
                self.ctx
                    .fail_item(&item, FailureCategory::General, &e.to_string())
                    .await;
            }
        }

        let summary = RunSummary {
            total_archives: total,
            migrated: self.ctx.tracker.migrated_count(),
            failed: self.ctx.tracker.failed_count(),
            test_items: self.ctx.tracker.test_count(),
            notify_items: self.ctx.tracker.notify_count(),
            retried,
        };
        info!(
            migrated = summary.migrated,
            failed = summary.failed,
            test = summary.test_items,
            notify = summary.notify_items,
            "migration run complete"
        );
        Ok(summary)
    }
}

impl PipelineCtx {
    /// Inventories sometimes carry two rows for one archive, one per
    /// extracted media file. The tie-break chain picks the file to migrate.
    /// A losing row that shares the winner's archive id is dropped from the
    /// run; a losing row with its own archive id is demoted so validation
    /// later rejects it as an alternative of the chosen file.
    async fn select_inventory(
        &self,
        archives: Vec<RawArchiveItem>,
    ) -> Result<Vec<RawArchiveItem>> {
        let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
        for (idx, item) in archives.iter().enumerate() {
            groups
                .entry(item.archive_name.as_str())
                .or_default()
                .push(idx);
        }

        let mut dropped = vec![false; archives.len()];
        for indices in groups.values().filter(|g| g.len() > 1) {
            // The first row's duration anchors the closeness rule.
            let expected = archives[indices[0]].duration_secs;
            let mut winner = indices[0];
            for &idx in &indices[1..] {
                let selection = archive_select::select_between(
                    &candidate(&archives[winner]),
                    &candidate(&archives[idx]),
                    expected,
                );
                if selection.index == 1 {
                    winner = idx;
                }
            }
            for &idx in indices {
                if idx == winner {
                    continue;
                }
                let item = &archives[idx];
                if item.archive_id == archives[winner].archive_id {
                    dropped[idx] = true;
                    continue;
                }
                self.records.insert_pending(item).await?;
                self.records.set_preferred(&item.archive_id, false).await?;
            }
        }

        Ok(archives
            .into_iter()
            .enumerate()
            .filter_map(|(idx, item)| (!dropped[idx]).then_some(item))
            .collect())
    }

    async fn process_item(&self, item: &RawArchiveItem, allow_defer: bool) -> Result<ItemOutcome> {
        self.records.insert_pending(item).await?;

        if self.records.already_migrated(&item.archive_id).await? {
            self.tracker.record_failed(FailedItem::new(
                item,
                FailureCategory::AlreadyMigrated,
                "archive id already migrated in a previous run",
            ));
            return Ok(ItemOutcome::Done);
        }

        let meta = match self.extractor.process(item) {
            ExtractionOutcome::Test(test) => {
                self.tracker.record_test(test);
                return Ok(ItemOutcome::Done);
            }
            ExtractionOutcome::Failed { category, message } => {
                self.fail_item(item, category, &message).await;
                return Ok(ItemOutcome::Done);
            }
            ExtractionOutcome::Extracted(meta) => meta,
        };

        self.tracker.flag_for_attention(item, &meta);

        let base_key = state_store::base_group_key(
            &meta.urn,
            &meta.exhibit_reference,
            &meta.witness_first_name,
            &meta.defendant_last_name,
        );
        let group_key = state_store::recording_group_key(
            &meta.urn,
            &meta.exhibit_reference,
            &meta.witness_first_name,
            &meta.defendant_last_name,
            &meta.date_pattern,
            meta.create_time,
        );
        self.records.update_metadata(&meta, &group_key, &base_key).await?;

        let mut processed = match DataTransformer::new(&self.snapshot).transform(&meta) {
            Ok(processed) => processed,
            Err((category, message)) => {
                self.fail_item(item, category, &message).await;
                return Ok(ItemOutcome::Done);
            }
        };

        // Lineage flags come from tracked state, not the filename.
        if processed.version_type == VersionType::Copy {
            let versions = self.records.version_numbers_in_group(&base_key).await?;
            processed.is_most_recent = versions
                .iter()
                .all(|v| compare_version_strings(v, &processed.version_number) != Ordering::Greater);
        }
        if let Some(record) = self.records.find(&item.archive_id).await? {
            processed.is_preferred = record.is_preferred;
        }

        if let Some((category, message)) = DataValidator::validate(&processed) {
            self.fail_item(item, category, &message).await;
            return Ok(ItemOutcome::Done);
        }

        let builder = GraphBuilder::new(&self.store, &self.records, &self.config.ingest_user_email);
        match builder.reconcile(&processed).await? {
            ReconcileOutcome::Migrated(group) => {
                self.records.mark_success(&item.archive_id).await?;
                self.tracker.record_migrated(*group);
                Ok(ItemOutcome::Done)
            }
            ReconcileOutcome::Rejected { category, message } => {
                let retryable = matches!(
                    category,
                    FailureCategory::NoOriginalFound
                        | FailureCategory::MissingCaseForCopy
                        | FailureCategory::OriginalMissingRecordingId
                );
                if retryable && allow_defer {
                    info!(
                        archive_id = %item.archive_id,
                        category = category.as_str(),
                        "deferring copy until first pass completes"
                    );
                    return Ok(ItemOutcome::Deferred);
                }
                self.fail_item(item, category, &message).await;
                Ok(ItemOutcome::Done)
            }
        }
    }

    async fn fail_item(&self, item: &RawArchiveItem, category: FailureCategory, message: &str) {
        self.tracker
            .record_failed(FailedItem::new(item, category, message));
        if let Err(e) = self.records.mark_failed(&item.archive_id, message).await {
            error!(
                archive_id = %item.archive_id,
                error = %e,
                "failed to persist failure status"
            );
        }
    }
}

fn candidate(item: &RawArchiveItem) -> CandidateFile {
    CandidateFile {
        file_name: item.file_name.clone(),
        file_size_mb: item.file_size_mb,
        duration_secs: item.duration_secs,
        has_watermark: item.has_watermark,
    }
}

/// Failure counts per category, largest first, for summary logging.
pub fn failure_breakdown(report: &TrackerReport) -> Vec<(&'static str, usize)> {
    let mut counts: std::collections::HashMap<FailureCategory, usize> = Default::default();
    for item in &report.failed {
        *counts.entry(item.category).or_insert(0) += 1;
    }
    let mut breakdown: Vec<(&'static str, usize)> = counts
        .into_iter()
        .map(|(category, count)| (category.as_str(), count))
        .collect();
    breakdown.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    breakdown
}
