//! Entity graph assembled by reconciliation
//!
//! Case (1) -< Booking (1) -< CaptureSession (1) -< Recording (N versions).
//! These values are handed off to the persistence collaborator; nothing in
//! this crate mutates them after assembly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticipantType {
    Witness,
    Defendant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseState {
    Open,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateParticipant {
    pub id: Uuid,
    pub participant_type: ParticipantType,
    pub first_name: String,
    pub last_name: String,
    /// Set on authoritative records whose membership was edited away.
    #[serde(default)]
    pub deleted: bool,
}

impl CreateParticipant {
    pub fn new(participant_type: ParticipantType, first_name: &str, last_name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            participant_type,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            deleted: false,
        }
    }

    /// Identity for set membership: (type, first, last) with names trimmed
    /// and lowercased.
    pub fn identity(&self) -> (ParticipantType, String, String) {
        (
            self.participant_type,
            self.first_name.trim().to_lowercase(),
            self.last_name.trim().to_lowercase(),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCase {
    pub id: Uuid,
    pub court_id: Uuid,
    pub reference: String,
    pub participants: Vec<CreateParticipant>,
    pub state: CaseState,
}

impl CreateCase {
    /// Merge `incoming` participants into the case without duplicating an
    /// existing (type, firstName, lastName) triple. Returns true when the
    /// participant set changed.
    pub fn merge_participants(&mut self, incoming: &[CreateParticipant]) -> bool {
        let mut changed = false;
        for candidate in incoming {
            let exists = self
                .participants
                .iter()
                .any(|p| p.identity() == candidate.identity());
            if !exists {
                self.participants.push(candidate.clone());
                changed = true;
            }
        }
        changed
    }

    pub fn has_deleted_participant(&self) -> bool {
        self.participants.iter().any(|p| p.deleted)
    }
}

/// How the case for an item was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseOutcome {
    Created,
    Updated,
    Reused,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBooking {
    pub id: Uuid,
    pub case_id: Uuid,
    pub scheduled_for: DateTime<Utc>,
    pub participants: Vec<CreateParticipant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCaptureSession {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// System user recorded as operator of the migrated session.
    pub operator_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecording {
    pub id: Uuid,
    pub capture_session_id: Uuid,
    /// Points at the ORIGINAL in the version chain; an ORIGINAL points at
    /// itself.
    pub parent_recording_id: Uuid,
    pub version: u32,
    pub duration_secs: u32,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateShareBooking {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub shared_with_email: String,
    pub shared_by_email: String,
}

/// Fully assembled output for one successfully migrated archive item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigratedItemGroup {
    pub archive_id: String,
    pub case: CreateCase,
    pub case_outcome: CaseOutcome,
    pub booking: CreateBooking,
    pub capture_session: CreateCaptureSession,
    pub recording: CreateRecording,
    pub share_bookings: Vec<CreateShareBooking>,
}
