//! Run reporting tracker
//!
//! Collects categorized failures, test diversions, attention flags and
//! migrated groups for one run. This crate only classifies and forwards;
//! formatting the final reports belongs to the reporting collaborator.

use crate::entities::{
    ExtractedMetadata, FailedItem, FailureCategory, MigratedItemGroup, NotifyItem, RawArchiveItem,
    TestItem,
};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{info, warn};

#[derive(Default)]
struct TrackerInner {
    migrated: Vec<MigratedItemGroup>,
    failed: Vec<FailedItem>,
    test_items: Vec<TestItem>,
    notify: Vec<NotifyItem>,
}

/// Shared across workers; every mutation takes the one lock.
#[derive(Default)]
pub struct MigrationTracker {
    inner: Mutex<TrackerInner>,
}

/// Point-in-time copy of everything tracked, for reporting.
#[derive(Debug, Clone)]
pub struct TrackerReport {
    pub migrated: Vec<MigratedItemGroup>,
    pub failed: Vec<FailedItem>,
    pub test_items: Vec<TestItem>,
    pub notify: Vec<NotifyItem>,
}

impl MigrationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_migrated(&self, group: MigratedItemGroup) {
        self.lock().migrated.push(group);
    }

    pub fn record_failed(&self, item: FailedItem) {
        warn!(
            archive_id = %item.archive_id,
            category = item.category.as_str(),
            message = %item.message,
            "item failed"
        );
        self.lock().failed.push(item);
    }

    pub fn record_test(&self, item: TestItem) {
        info!(
            archive_id = %item.archive_id,
            reason = %item.reason,
            "item classified as test recording"
        );
        self.lock().test_items.push(item);
    }

    pub fn record_notify(&self, item: NotifyItem) {
        self.lock().notify.push(item);
    }

    /// Flag extracted items whose fields are plausible but unusual enough
    /// to warrant operator review. Flagged items still migrate.
    pub fn flag_for_attention(&self, item: &RawArchiveItem, meta: &ExtractedMetadata) {
        for reason in notify_reasons(meta) {
            self.record_notify(NotifyItem {
                archive_id: item.archive_id.clone(),
                archive_name: item.archive_name.clone(),
                reason,
            });
        }
    }

    pub fn failed_by_category(&self) -> HashMap<FailureCategory, usize> {
        let inner = self.lock();
        let mut counts = HashMap::new();
        for item in &inner.failed {
            *counts.entry(item.category).or_insert(0) += 1;
        }
        counts
    }

    pub fn migrated_count(&self) -> usize {
        self.lock().migrated.len()
    }

    pub fn failed_count(&self) -> usize {
        self.lock().failed.len()
    }

    pub fn test_count(&self) -> usize {
        self.lock().test_items.len()
    }

    pub fn notify_count(&self) -> usize {
        self.lock().notify.len()
    }

    pub fn report(&self) -> TrackerReport {
        let inner = self.lock();
        TrackerReport {
            migrated: inner.migrated.clone(),
            failed: inner.failed.clone(),
            test_items: inner.test_items.clone(),
            notify: inner.notify.clone(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackerInner> {
        self.inner.lock().expect("tracker lock poisoned")
    }
}

fn notify_reasons(meta: &ExtractedMetadata) -> Vec<String> {
    let mut reasons = Vec::new();
    if meta.defendant_last_name.contains('-') {
        reasons.push("double-barrelled defendant name".to_string());
    }
    let urn = meta.urn.trim();
    if !urn.is_empty() && urn.len() < 11 {
        reasons.push(format!("URN '{urn}' shorter than expected"));
    }
    let exhibit = meta.exhibit_reference.trim();
    if !exhibit.is_empty() && exhibit.len() < 9 {
        reasons.push(format!("exhibit reference '{exhibit}' shorter than expected"));
    }
    reasons
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::VersionType;

    fn meta(urn: &str, exhibit: &str, defendant: &str) -> ExtractedMetadata {
        ExtractedMetadata {
            court_reference: "Leeds".into(),
            date_pattern: "200101".into(),
            urn: urn.into(),
            exhibit_reference: exhibit.into(),
            defendant_last_name: defendant.into(),
            witness_first_name: "John".into(),
            version_type: VersionType::Original,
            version_number: "1".into(),
            file_extension: "mp4".into(),
            create_time: None,
            duration_secs: 120,
            file_name: "f.mp4".into(),
            file_size_mb: 10.0,
            archive_id: "a1".into(),
            archive_name: "f.mp4".into(),
        }
    }

    #[test]
    fn flags_short_urn_and_double_barrelled_name() {
        let reasons = notify_reasons(&meta("12AB34567", "", "Smith-Jones"));
        assert_eq!(reasons.len(), 2);
        assert!(reasons.iter().any(|r| r.contains("double-barrelled")));
        assert!(reasons.iter().any(|r| r.contains("URN")));
    }

    #[test]
    fn long_references_raise_no_flags() {
        assert!(notify_reasons(&meta("12AB3456789", "T20241234X", "Smith")).is_empty());
    }

    #[test]
    fn empty_references_are_not_flagged_as_short() {
        assert!(notify_reasons(&meta("", "", "Smith")).is_empty());
    }

    #[test]
    fn failure_counts_group_by_category() {
        let tracker = MigrationTracker::new();
        let item = RawArchiveItem {
            archive_id: "a1".into(),
            archive_name: "f.mp4".into(),
            create_time_epoch: None,
            duration_secs: 0,
            file_name: "f.mp4".into(),
            file_size_mb: 0.0,
            has_watermark: false,
        };
        tracker.record_failed(FailedItem::new(&item, FailureCategory::PatternMatch, "x"));
        tracker.record_failed(FailedItem::new(&item, FailureCategory::PatternMatch, "y"));
        tracker.record_failed(FailedItem::new(&item, FailureCategory::PreGoLive, "z"));

        let counts = tracker.failed_by_category();
        assert_eq!(counts[&FailureCategory::PatternMatch], 2);
        assert_eq!(counts[&FailureCategory::PreGoLive], 1);
        assert_eq!(tracker.failed_count(), 3);
    }
}
