use crate::error::TribunalError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Audit entry categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    Admission,
    Transition,
    Judgment,
    Appeal,
    Distribution,
    Refund,
}

/// Hash-chained audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry_id: String,
    pub index: u64,
    pub case_id: String,
    pub kind: AuditKind,
    pub timestamp: DateTime<Utc>,
    pub payload: Value,
    pub previous_hash: Option<String>,
    pub entry_hash: String,
}

/// Append-only audit trail with hash-chain proofs.
///
/// No in-place mutation APIs are exposed; every state change becomes an
/// additional record, which preserves full historical accountability for
/// admissions, transitions, judgments, distributions, and refunds.
#[derive(Debug, Default, Clone)]
pub struct AuditTrail {
    entries: Vec<AuditEntry>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Rebuild a trail from persisted entries and verify chain integrity.
    pub fn from_entries(entries: Vec<AuditEntry>) -> Result<Self, TribunalError> {
        let trail = Self { entries };

        for (expected_index, entry) in trail.entries.iter().enumerate() {
            if entry.index != expected_index as u64 {
                return Err(TribunalError::Storage(format!(
                    "audit index gap detected at position {} (found {})",
                    expected_index, entry.index
                )));
            }
        }

        if !trail.verify_chain() {
            return Err(TribunalError::Storage(
                "audit trail hash-chain verification failed".to_string(),
            ));
        }

        Ok(trail)
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn entries_for_case(&self, case_id: &str) -> Vec<&AuditEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.case_id == case_id)
            .collect()
    }

    pub fn append(
        &mut self,
        case_id: &str,
        kind: AuditKind,
        payload: Value,
    ) -> Result<AuditEntry, TribunalError> {
        let entry = self.build_entry(case_id, kind, payload);
        self.commit_entry(entry.clone())?;
        Ok(entry)
    }

    pub fn verify_chain(&self) -> bool {
        let mut previous_hash: Option<String> = None;
        for entry in &self.entries {
            let expected_hash = compute_entry_hash(
                entry.index,
                &entry.case_id,
                entry.kind,
                entry.timestamp,
                &entry.payload,
                previous_hash.as_deref(),
            );
            if entry.entry_hash != expected_hash {
                return false;
            }
            if entry.previous_hash != previous_hash {
                return false;
            }
            previous_hash = Some(entry.entry_hash.clone());
        }
        true
    }

    /// Build the next deterministic entry without mutating the chain.
    fn build_entry(&self, case_id: &str, kind: AuditKind, payload: Value) -> AuditEntry {
        let index = self.entries.len() as u64;
        let timestamp = Utc::now();
        let previous_hash = self.entries.last().map(|entry| entry.entry_hash.clone());
        let entry_hash = compute_entry_hash(
            index,
            case_id,
            kind,
            timestamp,
            &payload,
            previous_hash.as_deref(),
        );

        AuditEntry {
            entry_id: Uuid::new_v4().to_string(),
            index,
            case_id: case_id.to_string(),
            kind,
            timestamp,
            payload,
            previous_hash,
            entry_hash,
        }
    }

    fn commit_entry(&mut self, entry: AuditEntry) -> Result<(), TribunalError> {
        let expected_index = self.entries.len() as u64;
        if entry.index != expected_index {
            return Err(TribunalError::Storage(format!(
                "audit commit index mismatch: expected {}, got {}",
                expected_index, entry.index
            )));
        }

        let expected_previous = self.entries.last().map(|e| e.entry_hash.clone());
        if entry.previous_hash != expected_previous {
            return Err(TribunalError::Storage(
                "audit commit previous hash mismatch".to_string(),
            ));
        }

        self.entries.push(entry);
        Ok(())
    }
}

fn compute_entry_hash(
    index: u64,
    case_id: &str,
    kind: AuditKind,
    timestamp: DateTime<Utc>,
    payload: &Value,
    previous_hash: Option<&str>,
) -> String {
    let material = serde_json::json!({
        "index": index,
        "case_id": case_id,
        "kind": kind,
        "timestamp": timestamp,
        "payload": payload,
        "previous_hash": previous_hash,
    });

    let bytes = serde_json::to_vec(&material).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}
