//! Migration state store
//!
//! Namespaced key-value cache holding partially-built entity fragments and
//! per-group ORIGINAL bookkeeping across a run. Values are opaque JSON
//! strings serialized by the caller; the store itself knows nothing about
//! their shape.
//!
//! Check-then-create is the rule: `put_if_absent` is a key-scoped
//! first-writer-wins claim, and a losing writer reuses the winner's value
//! instead of erroring.

use chrono::{DateTime, NaiveDate, Utc};
use remig_common::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;

/// Store namespaces used by the pipeline.
pub mod ns {
    /// Case reference -> CreateCase fragment.
    pub const CASES: &str = "cases";
    /// Fragment key -> booking and capture-session fragments. Recordings
    /// are tracked through the record store, not here.
    pub const BOOKINGS: &str = "bookings";
    pub const CAPTURE_SESSIONS: &str = "capture_sessions";
    /// Booking id -> emails already granted a share.
    pub const SHARES: &str = "shares";
}

pub trait StateStore: Send + Sync {
    fn exists(&self, namespace: &str, key: &str) -> bool;
    fn get(&self, namespace: &str, key: &str) -> Option<String>;
    fn put(&self, namespace: &str, key: &str, value: String);
    /// Atomically store `value` unless the key is already claimed. Returns
    /// `None` when this writer won, or the winner's value when it lost.
    fn put_if_absent(&self, namespace: &str, key: &str, value: String) -> Option<String>;
    fn clear_namespace(&self, namespace: &str);
}

/// Typed read: deserialize the stored JSON value, if any.
pub fn get_json<T: DeserializeOwned>(
    store: &dyn StateStore,
    namespace: &str,
    key: &str,
) -> Result<Option<T>> {
    match store.get(namespace, key) {
        None => Ok(None),
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| Error::StateStore(format!("corrupt value at {namespace}/{key}: {e}"))),
    }
}

/// Typed write.
pub fn put_json<T: Serialize>(
    store: &dyn StateStore,
    namespace: &str,
    key: &str,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_string(value)
        .map_err(|e| Error::StateStore(format!("failed to serialize {namespace}/{key}: {e}")))?;
    store.put(namespace, key, raw);
    Ok(())
}

/// Typed claim. Returns the value that is authoritative after the call:
/// the caller's own on a win, the winner's on a loss.
pub fn claim_json<T: Serialize + DeserializeOwned + Clone>(
    store: &dyn StateStore,
    namespace: &str,
    key: &str,
    value: &T,
) -> Result<T> {
    let raw = serde_json::to_string(value)
        .map_err(|e| Error::StateStore(format!("failed to serialize {namespace}/{key}: {e}")))?;
    match store.put_if_absent(namespace, key, raw) {
        None => Ok(value.clone()),
        Some(existing) => serde_json::from_str(&existing)
            .map_err(|e| Error::StateStore(format!("corrupt value at {namespace}/{key}: {e}"))),
    }
}

/// In-process implementation backing a single run.
#[derive(Default)]
pub struct InMemoryStateStore {
    namespaces: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for InMemoryStateStore {
    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.namespaces
            .read()
            .expect("state store lock poisoned")
            .get(namespace)
            .is_some_and(|m| m.contains_key(key))
    }

    fn get(&self, namespace: &str, key: &str) -> Option<String> {
        self.namespaces
            .read()
            .expect("state store lock poisoned")
            .get(namespace)
            .and_then(|m| m.get(key).cloned())
    }

    fn put(&self, namespace: &str, key: &str, value: String) {
        self.namespaces
            .write()
            .expect("state store lock poisoned")
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    fn put_if_absent(&self, namespace: &str, key: &str, value: String) -> Option<String> {
        let mut guard = self.namespaces.write().expect("state store lock poisoned");
        let map = guard.entry(namespace.to_string()).or_default();
        match map.get(key) {
            Some(existing) => Some(existing.clone()),
            None => {
                map.insert(key.to_string(), value);
                None
            }
        }
    }

    fn clear_namespace(&self, namespace: &str) {
        self.namespaces
            .write()
            .expect("state store lock poisoned")
            .remove(namespace);
    }
}

// ============================================================================
// Key derivation
// ============================================================================

/// Stable lineage key for one logical recording episode: reference and
/// participant parts lowercased and `|`-joined, empty parts skipped.
pub fn recording_group_key(
    urn: &str,
    exhibit: &str,
    witness: &str,
    defendant: &str,
    date_pattern: &str,
    create_time: Option<DateTime<Utc>>,
) -> String {
    let mut date_part = normalize_date(date_pattern);
    if date_part.is_empty() {
        if let Some(ts) = create_time {
            date_part = ts.date_naive().to_string();
        }
    }
    join_key_parts(&[urn, exhibit, witness, defendant, &date_part])
}

/// Lineage key without the date component, for cross-date version lookups.
pub fn base_group_key(urn: &str, exhibit: &str, witness: &str, defendant: &str) -> String {
    join_key_parts(&[urn, exhibit, witness, defendant])
}

/// Key colocating the Booking/CaptureSession/Recording fragments of one
/// case-and-participants episode.
pub fn fragment_key(case_reference: &str, witness: &str, defendant: &str) -> String {
    format!(
        "{}:{}-{}",
        case_reference.trim().to_lowercase(),
        witness.trim().to_lowercase(),
        defendant.trim().to_lowercase()
    )
}

fn join_key_parts(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("|")
}

/// Legacy `yyMMdd` date tokens become ISO dates; other formats pass
/// through trimmed.
fn normalize_date(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.len() == 6 && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%y%m%d") {
            return date.to_string();
        }
    }
    trimmed.to_string()
}
