//! History replay over a key's version log
use super::error::LedgerError;
use super::record::{Record, TimeStamp};
use super::store::{LogEntry, RecordStore};
use super::utils;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// One entry of a record's chain of custody, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionEntry {
    #[serde(rename = "txId")]
    pub transaction_ref: String,
    pub timestamp: TimeStamp<Utc>,
    pub is_delete: bool,
    pub record: Option<Record>, // None iff is_delete
}

impl RecordStore {
    /// Replay every append ever made to `id`, oldest to newest.
    ///
    /// Each call rescans the log from the start. A stored value that fails to
    /// decode aborts the whole replay with `MalformedRecord`; no partial history
    /// is returned. An id that was never written yields an empty vector.
    pub fn history(&self, id: &str) -> Result<Vec<VersionEntry>, LedgerError> {
        let mut entries = Vec::new();

        // the scan holds a sled iterator; it is dropped on every return path
        for item in self.log_tree().scan_prefix(utils::log_prefix(id)) {
            let (_, raw) = item?;
            let entry = LogEntry::decode(id, &raw)?;

            let record = if entry.is_delete {
                None
            } else {
                Some(Record::from_json(id, &entry.value)?)
            };

            entries.push(VersionEntry {
                transaction_ref: entry.tx_ref,
                timestamp: entry.timestamp,
                is_delete: entry.is_delete,
                record,
            });
        }

        tracing::debug!(id, entries = entries.len(), "replayed history");
        Ok(entries)
    }

    /// Recompute the digest chain of `id` and compare it with what was stored.
    ///
    /// Returns the number of verified entries, or `IntegrityViolation` naming
    /// the first entry whose digest does not match.
    pub fn verify_history(&self, id: &str) -> Result<u64, LedgerError> {
        let mut prev_digest = String::new();
        let mut seq = 0u64;

        for item in self.log_tree().scan_prefix(utils::log_prefix(id)) {
            let (key, raw) = item?;
            let entry = LogEntry::decode(id, &raw)?;

            let expected = LogEntry::digest_for(&prev_digest, &entry.tx_ref, entry.is_delete, &entry.value);
            if key[..] != utils::log_key(id, seq)[..] || entry.digest != expected {
                return Err(LedgerError::IntegrityViolation {
                    id: id.to_string(),
                    seq,
                });
            }

            prev_digest = entry.digest;
            seq += 1;
        }

        Ok(seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TxContext;
    use std::sync::Arc;

    fn store() -> RecordStore {
        let db = sled::Config::new().temporary(true).open().unwrap();
        RecordStore::new(Arc::new(db)).unwrap()
    }

    fn tx(tx_ref: &str, secs: i64) -> TxContext {
        TxContext {
            tx_ref: tx_ref.into(),
            timestamp: TimeStamp::from_unix(secs, 0).unwrap(),
        }
    }

    fn record(id: &str, status: &str) -> Record {
        Record {
            id: id.into(),
            description: "Shipping Manifest".into(),
            party: "Org2".into(),
            status: status.into(),
            timestamp: String::new(),
        }
    }

    #[test]
    fn never_written_id_has_empty_history() {
        assert!(store().history("nope").unwrap().is_empty());
        assert_eq!(store().verify_history("nope").unwrap(), 0);
    }

    #[test]
    fn delete_entries_carry_no_record() {
        let store = store();
        store.put(&tx("t1", 1), &record("REC002", "PENDING")).unwrap();
        store.delete(&tx("t2", 2), "REC002").unwrap();

        let history = store.history("REC002").unwrap();
        assert_eq!(history.len(), 2);
        assert!(!history[0].is_delete);
        assert!(history[1].is_delete);
        assert_eq!(history[1].record, None);
        assert_eq!(history[1].transaction_ref, "t2");
    }

    #[test]
    fn history_is_scoped_to_the_key() {
        let store = store();
        store.put(&tx("t1", 1), &record("A", "CREATED")).unwrap();
        store.put(&tx("t2", 2), &record("AB", "CREATED")).unwrap();
        store.put(&tx("t3", 3), &record("A", "VERIFIED")).unwrap();

        let refs: Vec<_> = store
            .history("A")
            .unwrap()
            .into_iter()
            .map(|e| e.transaction_ref)
            .collect();
        assert_eq!(refs, vec!["t1", "t3"]);
    }

    #[test]
    fn tampered_entry_fails_verification() {
        let store = store();
        store.put(&tx("t1", 1), &record("REC001", "CREATED")).unwrap();
        store.put(&tx("t2", 2), &record("REC001", "VERIFIED")).unwrap();
        assert_eq!(store.verify_history("REC001").unwrap(), 2);

        let key = utils::log_key("REC001", 1);
        let raw = store.log_tree().get(&key).unwrap().unwrap();
        let mut entry = LogEntry::decode("REC001", &raw).unwrap();
        entry.value = record("REC001", "REJECTED").to_json().unwrap();
        store
            .log_tree()
            .insert(&key, entry.encode("REC001").unwrap())
            .unwrap();

        let err = store.verify_history("REC001").unwrap_err();
        assert!(matches!(err, LedgerError::IntegrityViolation { seq: 1, .. }));
    }
}
