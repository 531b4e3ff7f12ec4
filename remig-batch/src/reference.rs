//! Reference data snapshot
//!
//! Inventory input mixes archive rows with two reference tables: site
//! rows mapping site references to courts, and channel rows mapping
//! channel names to the users who should receive shares. Rows arrive as
//! a tagged union and are split once at run start; the resulting
//! snapshot is immutable for the whole run. Refreshing reference data
//! means rebuilding the snapshot between runs, never mutating it.

use crate::entities::{RawArchiveItem, ShareContact};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

/// One inventory row of any kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceRow {
    Archive(RawArchiveItem),
    Site {
        site_reference: String,
        court_name: String,
        court_id: Uuid,
    },
    Channel {
        channel_name: String,
        users: Vec<ChannelUser>,
    },
}

/// A user attached to a channel reference row. `name` is the legacy
/// `First.Last` form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelUser {
    pub name: String,
    pub email: String,
}

/// A resolved court.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourtRef {
    pub id: Uuid,
    pub name: String,
}

/// Read-only lookup tables for one run.
#[derive(Debug, Default)]
pub struct ReferenceSnapshot {
    courts_by_site: HashMap<String, CourtRef>,
    channels: HashMap<String, Vec<ShareContact>>,
}

impl ReferenceSnapshot {
    /// Split a mixed row list into the snapshot and the archive items to
    /// process. Duplicate site references keep the first row seen.
    pub fn from_rows(rows: Vec<SourceRow>) -> (Self, Vec<RawArchiveItem>) {
        let mut snapshot = Self::default();
        let mut archives = Vec::new();

        for row in rows {
            match row {
                SourceRow::Archive(item) => archives.push(item),
                SourceRow::Site {
                    site_reference,
                    court_name,
                    court_id,
                } => {
                    let key = site_reference.trim().to_lowercase();
                    if snapshot.courts_by_site.contains_key(&key) {
                        warn!(site_reference = %site_reference, "duplicate site row ignored");
                        continue;
                    }
                    snapshot.courts_by_site.insert(
                        key,
                        CourtRef {
                            id: court_id,
                            name: court_name,
                        },
                    );
                }
                SourceRow::Channel {
                    channel_name,
                    users,
                } => {
                    let contacts = users.into_iter().map(contact_from_user).collect();
                    snapshot
                        .channels
                        .insert(channel_name.trim().to_lowercase(), contacts);
                }
            }
        }

        info!(
            courts = snapshot.courts_by_site.len(),
            channels = snapshot.channels.len(),
            archives = archives.len(),
            "built reference snapshot"
        );
        (snapshot, archives)
    }

    /// Resolve a filename court reference against the site table.
    pub fn resolve_court(&self, court_reference: &str) -> Option<&CourtRef> {
        self.courts_by_site
            .get(&court_reference.trim().to_lowercase())
    }

    /// Users to share with: every channel whose name contains the case
    /// reference contributes its contacts.
    pub fn contacts_for_case(&self, case_reference: &str) -> Vec<ShareContact> {
        let needle = case_reference.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let mut contacts = Vec::new();
        for (channel, users) in &self.channels {
            if channel.contains(&needle) {
                for user in users {
                    if !contacts
                        .iter()
                        .any(|c: &ShareContact| c.email.eq_ignore_ascii_case(&user.email))
                    {
                        contacts.push(user.clone());
                    }
                }
            }
        }
        contacts
    }

    pub fn court_count(&self) -> usize {
        self.courts_by_site.len()
    }
}

/// Channel rows carry `First.Last` user names; anything without a dot
/// lands wholesale in the first name.
fn contact_from_user(user: ChannelUser) -> ShareContact {
    let (first, last) = match user.name.split_once('.') {
        Some((first, last)) => (first.to_string(), last.to_string()),
        None => (user.name.clone(), String::new()),
    };
    ShareContact {
        first_name: first,
        last_name: last,
        email: user.email,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(reference: &str, name: &str) -> SourceRow {
        SourceRow::Site {
            site_reference: reference.into(),
            court_name: name.into(),
            court_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn splits_rows_and_resolves_courts_case_insensitively() {
        let rows = vec![
            site("Leeds", "Leeds Crown Court"),
            SourceRow::Archive(RawArchiveItem {
                archive_id: "a1".into(),
                archive_name: "x.mp4".into(),
                create_time_epoch: None,
                duration_secs: 0,
                file_name: "x.mp4".into(),
                file_size_mb: 0.0,
                has_watermark: false,
            }),
        ];
        let (snapshot, archives) = ReferenceSnapshot::from_rows(rows);
        assert_eq!(archives.len(), 1);
        assert_eq!(
            snapshot.resolve_court("LEEDS").unwrap().name,
            "Leeds Crown Court"
        );
        assert!(snapshot.resolve_court("York").is_none());
    }

    #[test]
    fn duplicate_site_rows_keep_the_first() {
        let first = site("Leeds", "Leeds Crown Court");
        let second = site("leeds", "Leeds Annex");
        let (snapshot, _) = ReferenceSnapshot::from_rows(vec![first, second]);
        assert_eq!(snapshot.court_count(), 1);
        assert_eq!(
            snapshot.resolve_court("leeds").unwrap().name,
            "Leeds Crown Court"
        );
    }

    #[test]
    fn channel_contacts_match_on_case_reference_substring() {
        let rows = vec![SourceRow::Channel {
            channel_name: "Court-12AB345678-hearing".into(),
            users: vec![
                ChannelUser {
                    name: "Jane.Doe".into(),
                    email: "jane.doe@example.com".into(),
                },
                ChannelUser {
                    name: "Clerk".into(),
                    email: "clerk@example.com".into(),
                },
            ],
        }];
        let (snapshot, _) = ReferenceSnapshot::from_rows(rows);

        let contacts = snapshot.contacts_for_case("12AB345678");
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].first_name, "Jane");
        assert_eq!(contacts[0].last_name, "Doe");
        assert_eq!(contacts[1].first_name, "Clerk");
        assert_eq!(contacts[1].last_name, "");

        assert!(snapshot.contacts_for_case("99ZZ000000").is_empty());
        assert!(snapshot.contacts_for_case("").is_empty());
    }

    #[test]
    fn duplicate_emails_across_channels_are_deduplicated() {
        let user = ChannelUser {
            name: "Jane.Doe".into(),
            email: "jane.doe@example.com".into(),
        };
        let rows = vec![
            SourceRow::Channel {
                channel_name: "12AB345678-a".into(),
                users: vec![user.clone()],
            },
            SourceRow::Channel {
                channel_name: "12AB345678-b".into(),
                users: vec![user],
            },
        ];
        let (snapshot, _) = ReferenceSnapshot::from_rows(rows);
        assert_eq!(snapshot.contacts_for_case("12AB345678").len(), 1);
    }
}
