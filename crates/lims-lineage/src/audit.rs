//! Append-only asset audit records
//!
//! Records are immutable once accepted and are hash-chained, so any edit to a
//! stored record breaks [`AuditLog::verify_integrity`].

use crate::error::AuditError;
use crate::types::{AssetId, AuditId, UserId};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

static KEY_FORMAT: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^[\w_]+$").unwrap()
});

/// Audit entry as submitted by a caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub asset: AssetId,
    pub key: String,
    pub actor: Option<UserId>,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl AuditEntry {
    /// Entry stamped with the current time and an empty payload
    #[must_use]
    pub fn new(asset: AssetId, key: impl Into<String>) -> Self {
        Self {
            asset,
            key: key.into(),
            actor: None,
            timestamp: Utc::now(),
            payload: serde_json::Value::Null,
        }
    }

    #[must_use]
    pub fn by(mut self, actor: UserId) -> Self {
        self.actor = Some(actor);
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Stored, chained audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: AuditId,
    pub entry: AuditEntry,
    pub prev_hash: String,
    pub hash: String,
}

/// Destination for audit entries
pub trait AuditSink: Send + Sync {
    /// Persist one entry
    ///
    /// # Errors
    /// `InvalidKey` when the key is not a word-character identifier
    fn record(&self, entry: AuditEntry) -> Result<AuditId, AuditError>;
}

/// Check an audit key against `^[\w_]+$`
///
/// # Errors
/// `InvalidKey`
pub fn validate_key(key: &str) -> Result<(), AuditError> {
    if KEY_FORMAT.is_match(key) {
        Ok(())
    } else {
        Err(AuditError::InvalidKey(key.to_string()))
    }
}

/// In-memory audit sink
#[derive(Debug, Default)]
pub struct AuditLog {
    inner: Mutex<Vec<AuditRecord>>,
}

impl AuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record in append order
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.inner.lock().clone()
    }

    /// Records for one asset
    #[must_use]
    pub fn records_for(&self, asset: AssetId) -> Vec<AuditRecord> {
        self.inner
            .lock()
            .iter()
            .filter(|r| r.entry.asset == asset)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recompute the hash chain
    ///
    /// # Errors
    /// `IntegrityViolation` at the first broken record
    pub fn verify_integrity(&self) -> Result<(), AuditError> {
        let guard = self.inner.lock();
        let mut prev = genesis_hash();
        for (index, record) in guard.iter().enumerate() {
            if record.prev_hash != prev || record.hash != compute_hash(record) {
                return Err(AuditError::IntegrityViolation { index });
            }
            prev.clone_from(&record.hash);
        }
        Ok(())
    }

    #[cfg(test)]
    fn tamper(&self, index: usize, key: &str) {
        self.inner.lock()[index].entry.key = key.to_string();
    }
}

impl AuditSink for AuditLog {
    fn record(&self, entry: AuditEntry) -> Result<AuditId, AuditError> {
        validate_key(&entry.key)?;

        let mut guard = self.inner.lock();
        let prev_hash = guard.last().map_or_else(genesis_hash, |r| r.hash.clone());
        let mut record = AuditRecord {
            id: AuditId::new(),
            entry,
            prev_hash,
            hash: String::new(),
        };
        record.hash = compute_hash(&record);
        let id = record.id;
        guard.push(record);
        Ok(id)
    }
}

fn genesis_hash() -> String {
    hex::encode([0u8; 32])
}

fn compute_hash(record: &AuditRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(record.id.0.as_bytes());
    hasher.update(record.entry.asset.0.as_bytes());
    hasher.update(record.entry.key.as_bytes());
    hasher.update([0]);
    if let Some(actor) = record.entry.actor {
        hasher.update(actor.0.as_bytes());
    }
    hasher.update(record.entry.timestamp.to_rfc3339().as_bytes());
    hasher.update([0]);
    hasher.update(record.entry.payload.to_string().as_bytes());
    hasher.update([0]);
    hasher.update(record.prev_hash.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_format() {
        assert!(validate_key("moved_to_asset_group").is_ok());
        assert!(validate_key("Scanned2").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("bad key").is_err());
        assert!(validate_key("semi;colon").is_err());
    }

    #[test]
    fn rejected_entry_is_not_stored() {
        let log = AuditLog::new();
        let err = log.record(AuditEntry::new(AssetId::new(), "no-dashes"));
        assert_eq!(err, Err(AuditError::InvalidKey("no-dashes".to_string())));
        assert!(log.is_empty());
    }

    #[test]
    fn chain_detects_tampering() {
        let log = AuditLog::new();
        let asset = AssetId::new();
        log.record(AuditEntry::new(asset, "created")).unwrap();
        log.record(
            AuditEntry::new(asset, "moved")
                .by(UserId::new())
                .with_payload(serde_json::json!({ "to": "S2" })),
        )
        .unwrap();
        assert!(log.verify_integrity().is_ok());
        assert_eq!(log.records_for(asset).len(), 2);

        log.tamper(0, "edited");
        assert_eq!(
            log.verify_integrity(),
            Err(AuditError::IntegrityViolation { index: 0 })
        );
    }
}
