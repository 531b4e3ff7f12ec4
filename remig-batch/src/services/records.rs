//! Migration record tracking
//!
//! One row per archive item for the lifetime of the migration. The row is
//! the idempotence anchor: an archive id whose record is already SUCCESS
//! is a no-op on re-processing, and COPY items find their ORIGINAL through
//! the group columns here rather than through in-process state.
//!
//! Status flow: PENDING -> SUBMITTED -> SUCCESS | FAILED.

use crate::entities::{ExtractedMetadata, RawArchiveItem};
use remig_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};

// ============================================================================
// Record Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Pending,
    Submitted,
    Success,
    Failed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Submitted => "SUBMITTED",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw {
            "SUBMITTED" => Self::Submitted,
            "SUCCESS" => Self::Success,
            "FAILED" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// One tracking row, as stored.
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub archive_id: String,
    pub archive_name: String,
    pub status: RecordStatus,
    pub group_key: Option<String>,
    pub base_group_key: Option<String>,
    pub version_type: Option<String>,
    pub version_number: Option<String>,
    /// Claimed slot in the lineage's version sequence, if any.
    pub lineage_version: Option<i64>,
    pub is_preferred: bool,
    pub file_name: Option<String>,
    pub booking_id: Option<String>,
    pub capture_session_id: Option<String>,
    pub recording_id: Option<String>,
    pub parent_archive_id: Option<String>,
    pub error_message: Option<String>,
}

// ============================================================================
// Store
// ============================================================================

pub struct MigrationRecordStore {
    db: SqlitePool,
}

impl MigrationRecordStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create the tracking table if this is a fresh database.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS migration_records (
                archive_id TEXT PRIMARY KEY,
                archive_name TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'PENDING',
                group_key TEXT,
                base_group_key TEXT,
                version_type TEXT,
                version_number TEXT,
                lineage_version INTEGER,
                is_preferred INTEGER NOT NULL DEFAULT 1,
                file_name TEXT,
                booking_id TEXT,
                capture_session_id TEXT,
                recording_id TEXT,
                parent_archive_id TEXT,
                error_message TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_migration_records_base_group
             ON migration_records (base_group_key)",
        )
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Insert a PENDING row for a newly seen archive id. Returns false when
    /// a row already exists, leaving it untouched.
    pub async fn insert_pending(&self, item: &RawArchiveItem) -> Result<bool> {
        let now = chrono::Utc::now().timestamp_millis();
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO migration_records
                (archive_id, archive_name, status, created_at, updated_at)
            VALUES (?, ?, 'PENDING', ?, ?)
            "#,
        )
        .bind(&item.archive_id)
        .bind(&item.archive_name)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn find(&self, archive_id: &str) -> Result<Option<MigrationRecord>> {
        let row = sqlx::query(
            r#"
            SELECT archive_id, archive_name, status, group_key, base_group_key,
                   version_type, version_number, lineage_version, is_preferred,
                   file_name, booking_id, capture_session_id, recording_id,
                   parent_archive_id, error_message
            FROM migration_records
            WHERE archive_id = ?
            "#,
        )
        .bind(archive_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(read_record).transpose()
    }

    /// True when the archive id has already completed successfully.
    pub async fn already_migrated(&self, archive_id: &str) -> Result<bool> {
        Ok(self
            .find(archive_id)
            .await?
            .is_some_and(|r| r.status == RecordStatus::Success))
    }

    /// Attach extracted metadata and the derived group keys, moving the row
    /// to SUBMITTED.
    pub async fn update_metadata(
        &self,
        meta: &ExtractedMetadata,
        group_key: &str,
        base_group_key: &str,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        sqlx::query(
            r#"
            UPDATE migration_records
            SET status = 'SUBMITTED',
                group_key = ?,
                base_group_key = ?,
                version_type = ?,
                version_number = ?,
                file_name = ?,
                updated_at = ?
            WHERE archive_id = ?
            "#,
        )
        .bind(group_key)
        .bind(base_group_key)
        .bind(meta.version_type.as_str())
        .bind(&meta.version_number)
        .bind(&meta.file_name)
        .bind(now)
        .bind(&meta.archive_id)
        .execute(&self.db)
        .await?;

        debug!(archive_id = %meta.archive_id, group_key, "recorded extracted metadata");
        Ok(())
    }

    pub async fn mark_success(&self, archive_id: &str) -> Result<()> {
        self.set_status(archive_id, RecordStatus::Success, None).await
    }

    pub async fn mark_failed(&self, archive_id: &str, message: &str) -> Result<()> {
        self.set_status(archive_id, RecordStatus::Failed, Some(message))
            .await
    }

    async fn set_status(
        &self,
        archive_id: &str,
        status: RecordStatus,
        message: Option<&str>,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let result = sqlx::query(
            r#"
            UPDATE migration_records
            SET status = ?, error_message = ?, updated_at = ?
            WHERE archive_id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(message)
        .bind(now)
        .bind(archive_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            warn!(archive_id, status = status.as_str(), "no tracking row to update");
        }
        Ok(())
    }

    /// Record the entity ids produced for this archive item.
    pub async fn set_entity_ids(
        &self,
        archive_id: &str,
        booking_id: &str,
        capture_session_id: &str,
        recording_id: &str,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        sqlx::query(
            r#"
            UPDATE migration_records
            SET booking_id = ?, capture_session_id = ?, recording_id = ?, updated_at = ?
            WHERE archive_id = ?
            "#,
        )
        .bind(booking_id)
        .bind(capture_session_id)
        .bind(recording_id)
        .bind(now)
        .bind(archive_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Point a COPY row at the archive id of its ORIGINAL.
    pub async fn set_parent(&self, archive_id: &str, parent_archive_id: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        sqlx::query(
            "UPDATE migration_records SET parent_archive_id = ?, updated_at = ? WHERE archive_id = ?",
        )
        .bind(parent_archive_id)
        .bind(now)
        .bind(archive_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    pub async fn set_preferred(&self, archive_id: &str, is_preferred: bool) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        sqlx::query(
            "UPDATE migration_records SET is_preferred = ?, updated_at = ? WHERE archive_id = ?",
        )
        .bind(is_preferred as i64)
        .bind(now)
        .bind(archive_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Find the completed ORIGINAL for a lineage. Preferred rows win; among
    /// equally preferred rows, mp4 files win; ties break on insertion order.
    /// One query answers both "is there an original" and "does it carry a
    /// recording id"; the caller branches on `recording_id` of the single
    /// returned row, so a worker finishing between two separate lookups
    /// cannot skew the verdict.
    pub async fn find_original_in_group(
        &self,
        base_group_key: &str,
    ) -> Result<Option<MigrationRecord>> {
        let row = sqlx::query(
            r#"
            SELECT archive_id, archive_name, status, group_key, base_group_key,
                   version_type, version_number, lineage_version, is_preferred,
                   file_name, booking_id, capture_session_id, recording_id,
                   parent_archive_id, error_message
            FROM migration_records
            WHERE base_group_key = ?
              AND version_type = 'ORIG'
              AND status = 'SUCCESS'
            ORDER BY is_preferred DESC,
                     CASE WHEN lower(file_name) LIKE '%.mp4' THEN 0 ELSE 1 END,
                     created_at ASC
            LIMIT 1
            "#,
        )
        .bind(base_group_key)
        .fetch_optional(&self.db)
        .await?;

        row.map(read_record).transpose()
    }

    /// Claim the next sequential version slot in a lineage for a COPY row.
    /// The scan and the write are one statement, so concurrent claimants
    /// in the same lineage always receive distinct slots. The ORIGINAL
    /// implicitly holds slot 1; a row that already claimed a slot keeps it.
    pub async fn allocate_lineage_version(
        &self,
        archive_id: &str,
        base_group_key: &str,
    ) -> Result<u32> {
        let now = chrono::Utc::now().timestamp_millis();
        let row = sqlx::query(
            r#"
            UPDATE migration_records
            SET lineage_version = (
                    SELECT IFNULL(MAX(lineage_version), 1) + 1
                    FROM migration_records
                    WHERE base_group_key = ?
                ),
                updated_at = ?
            WHERE archive_id = ? AND lineage_version IS NULL
            RETURNING lineage_version
            "#,
        )
        .bind(base_group_key)
        .bind(now)
        .bind(archive_id)
        .fetch_optional(&self.db)
        .await?;

        if let Some(row) = row {
            let version: i64 = row.try_get("lineage_version")?;
            return Ok(version as u32);
        }

        self.find(archive_id)
            .await?
            .and_then(|r| r.lineage_version)
            .map(|v| v as u32)
            .ok_or_else(|| {
                Error::Internal(format!("no tracking row to hold a version for '{archive_id}'"))
            })
    }

    /// All version-number strings tracked in a lineage, for most-recent
    /// comparison by the caller.
    pub async fn version_numbers_in_group(&self, base_group_key: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT version_number FROM migration_records
             WHERE base_group_key = ? AND version_number IS NOT NULL",
        )
        .bind(base_group_key)
        .fetch_all(&self.db)
        .await?;

        let mut versions = Vec::with_capacity(rows.len());
        for row in rows {
            let v: Option<String> = row.try_get("version_number")?;
            if let Some(v) = v {
                versions.push(v);
            }
        }
        Ok(versions)
    }
}

fn read_record(row: sqlx::sqlite::SqliteRow) -> Result<MigrationRecord> {
    let status: String = row.try_get("status")?;
    let is_preferred: i64 = row.try_get("is_preferred")?;
    Ok(MigrationRecord {
        archive_id: row.try_get("archive_id")?,
        archive_name: row.try_get("archive_name")?,
        status: RecordStatus::parse(&status),
        group_key: row.try_get("group_key")?,
        base_group_key: row.try_get("base_group_key")?,
        version_type: row.try_get("version_type")?,
        version_number: row.try_get("version_number")?,
        lineage_version: row.try_get("lineage_version")?,
        is_preferred: is_preferred != 0,
        file_name: row.try_get("file_name")?,
        booking_id: row.try_get("booking_id")?,
        capture_session_id: row.try_get("capture_session_id")?,
        recording_id: row.try_get("recording_id")?,
        parent_archive_id: row.try_get("parent_archive_id")?,
        error_message: row.try_get("error_message")?,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::VersionType;

    async fn store() -> MigrationRecordStore {
        // Single connection: pooled connections each see their own
        // in-memory database.
        let db = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = MigrationRecordStore::new(db);
        store.init_schema().await.unwrap();
        store
    }

    fn item(id: &str, name: &str) -> RawArchiveItem {
        RawArchiveItem {
            archive_id: id.into(),
            archive_name: name.into(),
            create_time_epoch: Some(1_700_000_000),
            duration_secs: 120,
            file_name: name.into(),
            file_size_mb: 10.0,
            has_watermark: false,
        }
    }

    fn meta(id: &str, name: &str, version_type: VersionType, version: &str) -> ExtractedMetadata {
        ExtractedMetadata {
            court_reference: "Leeds".into(),
            date_pattern: "200101".into(),
            urn: "12AB345678".into(),
            exhibit_reference: String::new(),
            defendant_last_name: "Smith".into(),
            witness_first_name: "John".into(),
            version_type,
            version_number: version.into(),
            file_extension: "mp4".into(),
            create_time: None,
            duration_secs: 120,
            file_name: name.into(),
            file_size_mb: 10.0,
            archive_id: id.into(),
            archive_name: name.into(),
        }
    }

    #[tokio::test]
    async fn insert_pending_is_idempotent() {
        let store = store().await;
        let a = item("a1", "first.mp4");
        assert!(store.insert_pending(&a).await.unwrap());
        assert!(!store.insert_pending(&a).await.unwrap());
    }

    #[tokio::test]
    async fn status_flow_reaches_success() {
        let store = store().await;
        let a = item("a1", "first.mp4");
        store.insert_pending(&a).await.unwrap();
        assert!(!store.already_migrated("a1").await.unwrap());

        let m = meta("a1", "first.mp4", VersionType::Original, "1");
        store.update_metadata(&m, "gk", "bgk").await.unwrap();
        store.mark_success("a1").await.unwrap();

        assert!(store.already_migrated("a1").await.unwrap());
        let rec = store.find("a1").await.unwrap().unwrap();
        assert_eq!(rec.status, RecordStatus::Success);
        assert_eq!(rec.version_type.as_deref(), Some("ORIG"));
    }

    #[tokio::test]
    async fn failed_records_keep_the_message() {
        let store = store().await;
        store.insert_pending(&item("a1", "x.mp4")).await.unwrap();
        store.mark_failed("a1", "no pattern matched").await.unwrap();
        let rec = store.find("a1").await.unwrap().unwrap();
        assert_eq!(rec.status, RecordStatus::Failed);
        assert_eq!(rec.error_message.as_deref(), Some("no pattern matched"));
    }

    #[tokio::test]
    async fn original_lookup_requires_success() {
        let store = store().await;
        store.insert_pending(&item("a1", "orig.mp4")).await.unwrap();
        let m = meta("a1", "orig.mp4", VersionType::Original, "1");
        store.update_metadata(&m, "gk", "bgk").await.unwrap();

        // SUBMITTED covers the whole in-flight window, entity ids included.
        assert!(store.find_original_in_group("bgk").await.unwrap().is_none());
        store.set_entity_ids("a1", "b1", "cs1", "r1").await.unwrap();
        assert!(store.find_original_in_group("bgk").await.unwrap().is_none());

        store.mark_success("a1").await.unwrap();
        let orig = store.find_original_in_group("bgk").await.unwrap().unwrap();
        assert_eq!(orig.archive_id, "a1");
        assert_eq!(orig.recording_id.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn original_lookup_surfaces_missing_recording_id() {
        let store = store().await;
        store.insert_pending(&item("a1", "orig.mp4")).await.unwrap();
        let m = meta("a1", "orig.mp4", VersionType::Original, "1");
        store.update_metadata(&m, "gk", "bgk").await.unwrap();
        store.mark_success("a1").await.unwrap();

        // A success row without entity ids is still returned; the caller
        // sees the absent recording id rather than an absent original.
        let orig = store.find_original_in_group("bgk").await.unwrap().unwrap();
        assert_eq!(orig.archive_id, "a1");
        assert!(orig.recording_id.is_none());
    }

    #[tokio::test]
    async fn original_lookup_prefers_preferred_then_mp4() {
        let store = store().await;
        for (id, name) in [("a1", "orig.avi"), ("a2", "orig.mp4"), ("a3", "other.mp4")] {
            store.insert_pending(&item(id, name)).await.unwrap();
            let m = meta(id, name, VersionType::Original, "1");
            store.update_metadata(&m, "gk", "bgk").await.unwrap();
            store
                .set_entity_ids(id, "b", "cs", &format!("r-{id}"))
                .await
                .unwrap();
            store.mark_success(id).await.unwrap();
        }
        store.set_preferred("a1", false).await.unwrap();
        store.set_preferred("a3", false).await.unwrap();

        // a2 is the only preferred row.
        let orig = store.find_original_in_group("bgk").await.unwrap().unwrap();
        assert_eq!(orig.archive_id, "a2");

        // With no preferred rows, the mp4 with the earliest insert wins.
        store.set_preferred("a2", false).await.unwrap();
        let orig = store.find_original_in_group("bgk").await.unwrap().unwrap();
        assert_eq!(orig.archive_id, "a2");
    }

    #[tokio::test]
    async fn lineage_versions_allocate_sequentially() {
        let store = store().await;
        for (id, vt, v) in [
            ("a1", VersionType::Original, "1"),
            ("a2", VersionType::Copy, "2"),
            ("a3", VersionType::Copy, "3"),
        ] {
            store.insert_pending(&item(id, "x.mp4")).await.unwrap();
            let m = meta(id, "x.mp4", vt, v);
            store.update_metadata(&m, "gk", "bgk").await.unwrap();
        }

        // The ORIGINAL holds slot 1 implicitly; copies claim 2 onward.
        assert_eq!(store.allocate_lineage_version("a2", "bgk").await.unwrap(), 2);
        assert_eq!(store.allocate_lineage_version("a3", "bgk").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn allocated_lineage_version_is_sticky() {
        let store = store().await;
        for id in ["a1", "a2"] {
            store.insert_pending(&item(id, "x.mp4")).await.unwrap();
            let m = meta(id, "x.mp4", VersionType::Copy, "2");
            store.update_metadata(&m, "gk", "bgk").await.unwrap();
        }

        assert_eq!(store.allocate_lineage_version("a1", "bgk").await.unwrap(), 2);
        assert_eq!(store.allocate_lineage_version("a2", "bgk").await.unwrap(), 3);
        // Re-claiming returns the slot already held, never a new one.
        assert_eq!(store.allocate_lineage_version("a1", "bgk").await.unwrap(), 2);
    }
}
