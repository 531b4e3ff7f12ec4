//! Entity reconciliation and graph assembly
//!
//! Per-item state machine: resolve or create the Case, then the Booking,
//! CaptureSession and Recording, wiring COPY recordings to their ORIGINAL
//! parent and assigning sequential versions. The state store is consulted
//! before every fragment creation (check-then-create); the record store
//! provides the cross-run ORIGINAL lookup.
//!
//! Domain rejections come back as `Rejected` with a failure category;
//! only infrastructure faults surface as `Err`.

use crate::entities::{
    CaseOutcome, CaseState, CreateBooking, CreateCaptureSession, CreateCase, CreateParticipant,
    CreateRecording, CreateShareBooking, FailureCategory, MigratedItemGroup, ParticipantType,
    ProcessedRecording, VersionType,
};
use crate::services::records::MigrationRecordStore;
use crate::services::state_store::{self, ns, StateStore};
use chrono::Duration;
use remig_common::{Error, Result};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result of reconciling one processed recording.
#[derive(Debug)]
pub enum ReconcileOutcome {
    Migrated(Box<MigratedItemGroup>),
    Rejected {
        category: FailureCategory,
        message: String,
    },
}

pub struct GraphBuilder<'a> {
    store: &'a dyn StateStore,
    records: &'a MigrationRecordStore,
    ingest_user_email: String,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(
        store: &'a dyn StateStore,
        records: &'a MigrationRecordStore,
        ingest_user_email: impl Into<String>,
    ) -> Self {
        Self {
            store,
            records,
            ingest_user_email: ingest_user_email.into(),
        }
    }

    pub async fn reconcile(&self, rec: &ProcessedRecording) -> Result<ReconcileOutcome> {
        let participants = participants_for(rec);

        let (case, case_outcome) = match self.resolve_case(rec, &participants)? {
            Ok(pair) => pair,
            Err(rejected) => return Ok(rejected),
        };

        if case.has_deleted_participant() {
            warn!(
                archive_id = %rec.archive_id,
                case_reference = %case.reference,
                "case contains a deleted participant; skipping item"
            );
            return Ok(ReconcileOutcome::Rejected {
                category: FailureCategory::DeletedParticipant,
                message: format!(
                    "case '{}' contains a participant marked deleted",
                    case.reference
                ),
            });
        }

        let fragment_key = state_store::fragment_key(
            &rec.case_reference,
            &rec.witness_first_name,
            &rec.defendant_last_name,
        );

        let booking = self.resolve_booking(rec, &case, &participants, &fragment_key)?;
        let capture_session = self.resolve_capture_session(rec, &booking, &fragment_key)?;

        let recording = match self.resolve_recording(rec, &capture_session).await? {
            Ok(recording) => recording,
            Err(rejected) => return Ok(rejected),
        };

        self.records
            .set_entity_ids(
                &rec.archive_id,
                &booking.id.to_string(),
                &capture_session.id.to_string(),
                &recording.id.to_string(),
            )
            .await?;

        let share_bookings = self.resolve_shares(rec, &booking)?;

        info!(
            archive_id = %rec.archive_id,
            case_reference = %case.reference,
            version = recording.version,
            outcome = ?case_outcome,
            "assembled entity group"
        );
        Ok(ReconcileOutcome::Migrated(Box::new(MigratedItemGroup {
            archive_id: rec.archive_id.clone(),
            case,
            case_outcome,
            booking,
            capture_session,
            recording,
            share_bookings,
        })))
    }

    /// Resolve the case: reuse and merge when present, create only for an
    /// ORIGINAL. A COPY arriving before its case exists is a hard failure,
    /// since only an ORIGINAL may originate a case.
    fn resolve_case(
        &self,
        rec: &ProcessedRecording,
        participants: &[CreateParticipant],
    ) -> Result<std::result::Result<(CreateCase, CaseOutcome), ReconcileOutcome>> {
        let key = rec.case_reference.trim().to_lowercase();

        if let Some(mut existing) =
            state_store::get_json::<CreateCase>(self.store, ns::CASES, &key)?
        {
            if existing.has_deleted_participant() {
                // Guard fires before any merge mutates the record.
                return Ok(Ok((existing, CaseOutcome::Reused)));
            }
            let changed = existing.merge_participants(participants);
            if changed {
                state_store::put_json(self.store, ns::CASES, &key, &existing)?;
                debug!(case_reference = %existing.reference, "merged new participants into case");
                return Ok(Ok((existing, CaseOutcome::Updated)));
            }
            return Ok(Ok((existing, CaseOutcome::Reused)));
        }

        if rec.version_type == VersionType::Copy {
            return Ok(Err(ReconcileOutcome::Rejected {
                category: FailureCategory::MissingCaseForCopy,
                message: format!(
                    "no case '{}' was originated by an ORIGINAL",
                    rec.case_reference
                ),
            }));
        }

        let court_id = rec.court_id.ok_or_else(|| {
            Error::Internal("unvalidated recording reached reconciliation without a court".into())
        })?;
        let case = CreateCase {
            id: Uuid::new_v4(),
            court_id,
            reference: rec.case_reference.clone(),
            participants: participants.to_vec(),
            state: CaseState::Open,
        };

        // A concurrent worker may claim the key first; its case wins and we
        // merge into it.
        let mut authoritative = state_store::claim_json(self.store, ns::CASES, &key, &case)?;
        if authoritative.id == case.id {
            return Ok(Ok((case, CaseOutcome::Created)));
        }
        let changed = authoritative.merge_participants(participants);
        if changed {
            state_store::put_json(self.store, ns::CASES, &key, &authoritative)?;
            return Ok(Ok((authoritative, CaseOutcome::Updated)));
        }
        Ok(Ok((authoritative, CaseOutcome::Reused)))
    }

    fn resolve_booking(
        &self,
        rec: &ProcessedRecording,
        case: &CreateCase,
        participants: &[CreateParticipant],
        fragment_key: &str,
    ) -> Result<CreateBooking> {
        if let Some(existing) =
            state_store::get_json::<CreateBooking>(self.store, ns::BOOKINGS, fragment_key)?
        {
            debug!(booking_id = %existing.id, "reusing booking fragment");
            return Ok(existing);
        }

        let booking = CreateBooking {
            id: Uuid::new_v4(),
            case_id: case.id,
            scheduled_for: rec.recording_timestamp,
            participants: participants.to_vec(),
        };
        state_store::claim_json(self.store, ns::BOOKINGS, fragment_key, &booking)
    }

    fn resolve_capture_session(
        &self,
        rec: &ProcessedRecording,
        booking: &CreateBooking,
        fragment_key: &str,
    ) -> Result<CreateCaptureSession> {
        if let Some(existing) = state_store::get_json::<CreateCaptureSession>(
            self.store,
            ns::CAPTURE_SESSIONS,
            fragment_key,
        )? {
            debug!(capture_session_id = %existing.id, "reusing capture session fragment");
            return Ok(existing);
        }

        let session = CreateCaptureSession {
            id: Uuid::new_v4(),
            booking_id: booking.id,
            started_at: rec.recording_timestamp,
            finished_at: rec.recording_timestamp + Duration::seconds(rec.duration_secs as i64),
            operator_email: self.ingest_user_email.clone(),
        };
        state_store::claim_json(self.store, ns::CAPTURE_SESSIONS, fragment_key, &session)
    }

    /// ORIGINAL: version 1, parent pointing at itself. COPY: parent is the
    /// tracked ORIGINAL's recording, version is the next sequential slot in
    /// the lineage.
    async fn resolve_recording(
        &self,
        rec: &ProcessedRecording,
        capture_session: &CreateCaptureSession,
    ) -> Result<std::result::Result<CreateRecording, ReconcileOutcome>> {
        let base_group_key = state_store::base_group_key(
            &rec.urn,
            &rec.exhibit_reference,
            &rec.witness_first_name,
            &rec.defendant_last_name,
        );

        match rec.version_type {
            VersionType::Original => {
                let id = Uuid::new_v4();
                Ok(Ok(CreateRecording {
                    id,
                    capture_session_id: capture_session.id,
                    parent_recording_id: id,
                    version: 1,
                    duration_secs: rec.duration_secs,
                    filename: rec.file_name.clone(),
                }))
            }
            VersionType::Copy => {
                // One lookup answers both questions; a worker finishing
                // between two separate queries cannot flip the verdict.
                let Some(original) = self.records.find_original_in_group(&base_group_key).await?
                else {
                    return Ok(Err(ReconcileOutcome::Rejected {
                        category: FailureCategory::NoOriginalFound,
                        message: format!("no tracked original for lineage '{base_group_key}'"),
                    }));
                };
                let Some(raw_parent) = original.recording_id.as_deref() else {
                    return Ok(Err(ReconcileOutcome::Rejected {
                        category: FailureCategory::OriginalMissingRecordingId,
                        message: format!(
                            "original for lineage '{base_group_key}' has no recording id"
                        ),
                    }));
                };
                let parent_id = Uuid::parse_str(raw_parent).map_err(|e| {
                    Error::Internal(format!("corrupt recording id '{raw_parent}': {e}"))
                })?;

                let version = self
                    .records
                    .allocate_lineage_version(&rec.archive_id, &base_group_key)
                    .await?;
                self.records
                    .set_parent(&rec.archive_id, &original.archive_id)
                    .await?;

                Ok(Ok(CreateRecording {
                    id: Uuid::new_v4(),
                    capture_session_id: capture_session.id,
                    parent_recording_id: parent_id,
                    version,
                    duration_secs: rec.duration_secs,
                    filename: rec.file_name.clone(),
                }))
            }
        }
    }

    /// One share per (booking, email), deduplicated across items through
    /// the state store.
    fn resolve_shares(
        &self,
        rec: &ProcessedRecording,
        booking: &CreateBooking,
    ) -> Result<Vec<CreateShareBooking>> {
        let mut shares = Vec::new();
        for contact in &rec.share_contacts {
            let key = format!("{}:{}", booking.id, contact.email.to_lowercase());
            if self
                .store
                .put_if_absent(ns::SHARES, &key, contact.email.clone())
                .is_some()
            {
                continue;
            }
            shares.push(CreateShareBooking {
                id: Uuid::new_v4(),
                booking_id: booking.id,
                shared_with_email: contact.email.clone(),
                shared_by_email: self.ingest_user_email.clone(),
            });
        }
        Ok(shares)
    }
}

fn participants_for(rec: &ProcessedRecording) -> Vec<CreateParticipant> {
    vec![
        CreateParticipant::new(ParticipantType::Witness, &rec.witness_first_name, ""),
        CreateParticipant::new(ParticipantType::Defendant, "", &rec.defendant_last_name),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ExtractedMetadata, RawArchiveItem};
    use crate::services::state_store::InMemoryStateStore;
    use chrono::{DateTime, Utc};

    const INGEST: &str = "ingest@example.com";

    fn processed(archive_id: &str, version_type: VersionType, version: &str) -> ProcessedRecording {
        ProcessedRecording {
            archive_id: archive_id.into(),
            archive_name: format!("{archive_id}.mp4"),
            court_reference: "Leeds".into(),
            court_id: Some(Uuid::new_v4()),
            court_name: "Leeds Crown Court".into(),
            case_reference: "12AB345678".into(),
            urn: "12AB345678".into(),
            exhibit_reference: String::new(),
            defendant_last_name: "Smith".into(),
            witness_first_name: "John".into(),
            recording_timestamp: DateTime::parse_from_rfc3339("2023-11-14T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            duration_secs: 120,
            version_type,
            version_number: version.into(),
            orig_version_number: "1".into(),
            copy_version_number: None,
            is_most_recent: true,
            is_preferred: true,
            file_extension: "mp4".into(),
            file_name: format!("{archive_id}.mp4"),
            share_contacts: Vec::new(),
        }
    }

    async fn records() -> MigrationRecordStore {
        let db = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = MigrationRecordStore::new(db);
        store.init_schema().await.unwrap();
        store
    }

    async fn track(records: &MigrationRecordStore, rec: &ProcessedRecording) {
        let item = RawArchiveItem {
            archive_id: rec.archive_id.clone(),
            archive_name: rec.archive_name.clone(),
            create_time_epoch: Some(1_700_000_000),
            duration_secs: rec.duration_secs,
            file_name: rec.file_name.clone(),
            file_size_mb: 10.0,
            has_watermark: false,
        };
        records.insert_pending(&item).await.unwrap();
        let meta = ExtractedMetadata {
            court_reference: rec.court_reference.clone(),
            date_pattern: "200101".into(),
            urn: rec.urn.clone(),
            exhibit_reference: rec.exhibit_reference.clone(),
            defendant_last_name: rec.defendant_last_name.clone(),
            witness_first_name: rec.witness_first_name.clone(),
            version_type: rec.version_type,
            version_number: rec.version_number.clone(),
            file_extension: rec.file_extension.clone(),
            create_time: Some(rec.recording_timestamp),
            duration_secs: rec.duration_secs,
            file_name: rec.file_name.clone(),
            file_size_mb: 10.0,
            archive_id: rec.archive_id.clone(),
            archive_name: rec.archive_name.clone(),
        };
        let base = state_store::base_group_key(
            &rec.urn,
            &rec.exhibit_reference,
            &rec.witness_first_name,
            &rec.defendant_last_name,
        );
        let group = state_store::recording_group_key(
            &rec.urn,
            &rec.exhibit_reference,
            &rec.witness_first_name,
            &rec.defendant_last_name,
            "200101",
            None,
        );
        records.update_metadata(&meta, &group, &base).await.unwrap();
    }

    #[tokio::test]
    async fn original_creates_full_graph_with_self_parent() {
        let store = InMemoryStateStore::new();
        let records = records().await;
        let builder = GraphBuilder::new(&store, &records, INGEST);

        let rec = processed("a1", VersionType::Original, "1");
        track(&records, &rec).await;

        let outcome = builder.reconcile(&rec).await.unwrap();
        let ReconcileOutcome::Migrated(group) = outcome else {
            panic!("expected migration, got {outcome:?}");
        };
        assert_eq!(group.case_outcome, CaseOutcome::Created);
        assert_eq!(group.recording.version, 1);
        assert_eq!(group.recording.parent_recording_id, group.recording.id);
        assert_eq!(group.capture_session.operator_email, INGEST);
        assert_eq!(group.case.participants.len(), 2);
    }

    #[tokio::test]
    async fn copy_links_to_original_and_takes_next_version() {
        let store = InMemoryStateStore::new();
        let records = records().await;
        let builder = GraphBuilder::new(&store, &records, INGEST);

        let orig = processed("a1", VersionType::Original, "1");
        track(&records, &orig).await;
        let ReconcileOutcome::Migrated(orig_group) = builder.reconcile(&orig).await.unwrap() else {
            panic!("original should migrate");
        };
        records.mark_success("a1").await.unwrap();

        let copy = processed("a2", VersionType::Copy, "2");
        track(&records, &copy).await;
        let ReconcileOutcome::Migrated(copy_group) = builder.reconcile(&copy).await.unwrap() else {
            panic!("copy should migrate");
        };

        assert_eq!(
            copy_group.recording.parent_recording_id,
            orig_group.recording.id
        );
        assert_eq!(copy_group.recording.version, 2);
        // Same fragment key, so booking and session are reused.
        assert_eq!(copy_group.booking.id, orig_group.booking.id);
        assert_eq!(copy_group.capture_session.id, orig_group.capture_session.id);
    }

    #[tokio::test]
    async fn copy_without_case_is_rejected() {
        let store = InMemoryStateStore::new();
        let records = records().await;
        let builder = GraphBuilder::new(&store, &records, INGEST);

        let copy = processed("a2", VersionType::Copy, "2");
        track(&records, &copy).await;

        let outcome = builder.reconcile(&copy).await.unwrap();
        let ReconcileOutcome::Rejected { category, .. } = outcome else {
            panic!("expected rejection");
        };
        assert_eq!(category, FailureCategory::MissingCaseForCopy);
    }

    #[tokio::test]
    async fn copy_with_case_but_no_original_is_rejected() {
        let store = InMemoryStateStore::new();
        let records = records().await;
        let builder = GraphBuilder::new(&store, &records, INGEST);

        // An ORIGINAL from a different lineage originates the case.
        let mut other = processed("a1", VersionType::Original, "1");
        other.urn = "99ZZ111111".into();
        other.case_reference = "12AB345678".into();
        track(&records, &other).await;
        builder.reconcile(&other).await.unwrap();
        records.mark_success("a1").await.unwrap();

        let copy = processed("a2", VersionType::Copy, "2");
        track(&records, &copy).await;
        let outcome = builder.reconcile(&copy).await.unwrap();
        let ReconcileOutcome::Rejected { category, .. } = outcome else {
            panic!("expected rejection");
        };
        assert_eq!(category, FailureCategory::NoOriginalFound);
    }

    #[tokio::test]
    async fn concurrent_copies_take_distinct_versions() {
        let store = InMemoryStateStore::new();
        let records = records().await;
        let builder = GraphBuilder::new(&store, &records, INGEST);

        let orig = processed("a1", VersionType::Original, "1");
        track(&records, &orig).await;
        builder.reconcile(&orig).await.unwrap();
        records.mark_success("a1").await.unwrap();

        let second = processed("a2", VersionType::Copy, "2");
        let third = processed("a3", VersionType::Copy, "3");
        track(&records, &second).await;
        track(&records, &third).await;

        let (r2, r3) = tokio::join!(builder.reconcile(&second), builder.reconcile(&third));
        let (ReconcileOutcome::Migrated(g2), ReconcileOutcome::Migrated(g3)) =
            (r2.unwrap(), r3.unwrap())
        else {
            panic!("both copies should migrate");
        };

        let mut versions = [g2.recording.version, g3.recording.version];
        versions.sort();
        assert_eq!(versions, [2, 3]);
    }

    #[tokio::test]
    async fn in_flight_original_reads_as_absent_not_incomplete() {
        let store = InMemoryStateStore::new();
        let records = records().await;
        let builder = GraphBuilder::new(&store, &records, INGEST);

        // The ORIGINAL has reconciled (entity ids recorded) but its run
        // has not marked it SUCCESS yet.
        let orig = processed("a1", VersionType::Original, "1");
        track(&records, &orig).await;
        builder.reconcile(&orig).await.unwrap();

        let copy = processed("a2", VersionType::Copy, "2");
        track(&records, &copy).await;
        let outcome = builder.reconcile(&copy).await.unwrap();
        let ReconcileOutcome::Rejected { category, .. } = outcome else {
            panic!("expected rejection");
        };
        assert_eq!(category, FailureCategory::NoOriginalFound);
    }

    #[tokio::test]
    async fn successful_original_without_recording_id_is_flagged() {
        let store = InMemoryStateStore::new();
        let records = records().await;
        let builder = GraphBuilder::new(&store, &records, INGEST);

        // An ORIGINAL from a different lineage originates the case.
        let mut other = processed("a0", VersionType::Original, "1");
        other.urn = "99ZZ111111".into();
        track(&records, &other).await;
        builder.reconcile(&other).await.unwrap();
        records.mark_success("a0").await.unwrap();

        // The lineage's own ORIGINAL succeeded without entity ids.
        let orig = processed("a1", VersionType::Original, "1");
        track(&records, &orig).await;
        records.mark_success("a1").await.unwrap();

        let copy = processed("a2", VersionType::Copy, "2");
        track(&records, &copy).await;
        let outcome = builder.reconcile(&copy).await.unwrap();
        let ReconcileOutcome::Rejected { category, .. } = outcome else {
            panic!("expected rejection");
        };
        assert_eq!(category, FailureCategory::OriginalMissingRecordingId);
    }

    #[tokio::test]
    async fn deleted_participant_guard_skips_item() {
        let store = InMemoryStateStore::new();
        let records = records().await;
        let builder = GraphBuilder::new(&store, &records, INGEST);

        let rec = processed("a1", VersionType::Original, "1");
        let mut participant = CreateParticipant::new(ParticipantType::Witness, "John", "");
        participant.deleted = true;
        let poisoned = CreateCase {
            id: Uuid::new_v4(),
            court_id: Uuid::new_v4(),
            reference: rec.case_reference.clone(),
            participants: vec![participant],
            state: CaseState::Open,
        };
        state_store::put_json(&store, ns::CASES, "12ab345678", &poisoned).unwrap();
        track(&records, &rec).await;

        let outcome = builder.reconcile(&rec).await.unwrap();
        let ReconcileOutcome::Rejected { category, .. } = outcome else {
            panic!("expected rejection");
        };
        assert_eq!(category, FailureCategory::DeletedParticipant);
    }

    #[tokio::test]
    async fn second_item_with_new_participant_updates_case() {
        let store = InMemoryStateStore::new();
        let records = records().await;
        let builder = GraphBuilder::new(&store, &records, INGEST);

        let first = processed("a1", VersionType::Original, "1");
        track(&records, &first).await;
        builder.reconcile(&first).await.unwrap();
        records.mark_success("a1").await.unwrap();

        let mut second = processed("a2", VersionType::Original, "1");
        second.urn = "12AB345678".into();
        second.witness_first_name = "Mary".into();
        track(&records, &second).await;
        let ReconcileOutcome::Migrated(group) = builder.reconcile(&second).await.unwrap() else {
            panic!("expected migration");
        };
        assert_eq!(group.case_outcome, CaseOutcome::Updated);
        assert_eq!(group.case.participants.len(), 3);
    }

    #[tokio::test]
    async fn shares_are_deduplicated_per_booking() {
        let store = InMemoryStateStore::new();
        let records = records().await;
        let builder = GraphBuilder::new(&store, &records, INGEST);

        let mut rec = processed("a1", VersionType::Original, "1");
        rec.share_contacts = vec![crate::entities::ShareContact {
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            email: "jane.doe@example.com".into(),
        }];
        track(&records, &rec).await;
        let ReconcileOutcome::Migrated(group) = builder.reconcile(&rec).await.unwrap() else {
            panic!("expected migration");
        };
        assert_eq!(group.share_bookings.len(), 1);
        records.mark_success("a1").await.unwrap();

        // Same contact on a later item sharing the booking adds nothing.
        let mut copy = processed("a2", VersionType::Copy, "2");
        copy.share_contacts = rec.share_contacts.clone();
        track(&records, &copy).await;
        let ReconcileOutcome::Migrated(copy_group) = builder.reconcile(&copy).await.unwrap() else {
            panic!("expected migration");
        };
        assert!(copy_group.share_bookings.is_empty());
    }
}
