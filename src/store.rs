//! Versioned record store backed by sled.
//!
//! Three trees make up the store:
//!
//! * `current`: id -> record JSON, the current projection. Absent once deleted.
//! * `log`: [`utils::log_key`] -> CBOR [`LogEntry`], the append-only version log.
//! * `heads`: id -> CBOR [`LogHead`], next sequence number and last chain digest.
//!
//! Every write touches all three inside one sled transaction, so the existence
//! check of `create` and its append are a single atomic step and readers never
//! see a log entry without its projection.
use super::context::TxContext;
use super::error::LedgerError;
use super::record::{Record, TimeStamp};
use super::utils;
use chrono::Utc;
use sled::Transactional;
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionResult, abort};
use std::sync::Arc;

pub const CURRENT_TREE: &str = "current";
pub const LOG_TREE: &str = "log";
pub const HEADS_TREE: &str = "heads";

/// One immutable slot in a key's version log.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct LogEntry {
    #[n(0)]
    pub tx_ref: String,
    #[n(1)]
    pub timestamp: TimeStamp<Utc>, // platform transaction time, not the record's field
    #[n(2)]
    pub is_delete: bool,
    #[n(3)]
    #[cbor(with = "minicbor::bytes")]
    pub value: Vec<u8>, // record JSON, empty for deletes
    #[n(4)]
    pub digest: String, // sha256 over the previous digest and this entry
}

#[derive(Debug, Clone, Default, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct LogHead {
    #[n(0)]
    pub next_seq: u64,
    #[n(1)]
    pub last_digest: String,
}

#[derive(Debug, Clone, Copy)]
enum Write<'a> {
    Create(&'a Record),
    Update(&'a Record),
    Put(&'a Record),
    Delete,
}

#[derive(Clone)]
pub struct RecordStore {
    current: sled::Tree,
    log: sled::Tree,
    heads: sled::Tree,
}

impl LogEntry {
    /// Chain digest of an entry given the digest of its predecessor.
    /// The first entry of a key chains from the empty string.
    pub fn digest_for(prev_digest: &str, tx_ref: &str, is_delete: bool, value: &[u8]) -> String {
        let mut preimage = Vec::with_capacity(prev_digest.len() + tx_ref.len() + value.len() + 9);
        preimage.extend_from_slice(prev_digest.as_bytes());
        preimage.extend_from_slice(&(tx_ref.len() as u64).to_be_bytes());
        preimage.extend_from_slice(tx_ref.as_bytes());
        preimage.push(is_delete as u8);
        preimage.extend_from_slice(value);
        sha256::digest(preimage)
    }
    fn chained(prev_digest: &str, tx: &TxContext, value: Option<Vec<u8>>) -> Self {
        let is_delete = value.is_none();
        let value = value.unwrap_or_default();
        let digest = Self::digest_for(prev_digest, &tx.tx_ref, is_delete, &value);

        Self {
            tx_ref: tx.tx_ref.clone(),
            timestamp: tx.timestamp.clone(),
            is_delete,
            value,
            digest,
        }
    }
    pub fn decode(id: &str, bytes: &[u8]) -> Result<Self, LedgerError> {
        minicbor::decode(bytes).map_err(|e| LedgerError::malformed(id, e))
    }
    pub fn encode(&self, id: &str) -> Result<Vec<u8>, LedgerError> {
        encode(id, self)
    }
}

impl RecordStore {
    pub fn new(instance: Arc<sled::Db>) -> Result<Self, LedgerError> {
        Ok(Self {
            current: instance.open_tree(CURRENT_TREE)?,
            log: instance.open_tree(LOG_TREE)?,
            heads: instance.open_tree(HEADS_TREE)?,
        })
    }

    /// Latest non-delete value of `id`, or `None`. A missing key is not an error.
    pub fn get_current(&self, id: &str) -> Result<Option<Record>, LedgerError> {
        match self.current.get(id.as_bytes())? {
            Some(raw) => Ok(Some(Record::from_json(id, &raw)?)),
            None => Ok(None),
        }
    }

    /// Point lookup on the current projection; never scans the log.
    pub fn exists(&self, id: &str) -> Result<bool, LedgerError> {
        Ok(self.current.contains_key(id.as_bytes())?)
    }

    /// Append `record` only if its id has no current value.
    pub fn create(&self, tx: &TxContext, record: &Record) -> Result<u64, LedgerError> {
        self.append(tx, &record.id, Write::Create(record))
    }

    /// Append `record` only if its id already has a current value.
    pub fn update(&self, tx: &TxContext, record: &Record) -> Result<u64, LedgerError> {
        self.append(tx, &record.id, Write::Update(record))
    }

    /// Append `record` unconditionally.
    pub fn put(&self, tx: &TxContext, record: &Record) -> Result<u64, LedgerError> {
        self.append(tx, &record.id, Write::Put(record))
    }

    /// Append a deletion marker and drop the current projection of `id`.
    pub fn delete(&self, tx: &TxContext, id: &str) -> Result<u64, LedgerError> {
        self.append(tx, id, Write::Delete)
    }

    pub(crate) fn log_tree(&self) -> &sled::Tree {
        &self.log
    }

    // Returns the sequence number the entry was appended at.
    fn append(&self, tx: &TxContext, id: &str, write: Write<'_>) -> Result<u64, LedgerError> {
        let value = match write {
            Write::Create(record) | Write::Update(record) | Write::Put(record) => {
                Some(record.to_json()?)
            }
            Write::Delete => None,
        };

        let outcome: TransactionResult<u64, LedgerError> = (&self.current, &self.log, &self.heads)
            .transaction(|(current, log, heads)| {
                let present = current.get(id.as_bytes())?.is_some();
                match (write, present) {
                    (Write::Create(_), true) => {
                        return abort(LedgerError::AlreadyExists { id: id.to_string() });
                    }
                    (Write::Update(_) | Write::Delete, false) => {
                        return abort(LedgerError::NotFound { id: id.to_string() });
                    }
                    _ => {}
                }

                let head = match heads.get(id.as_bytes())? {
                    Some(raw) => minicbor::decode::<LogHead>(&raw)
                        .map_err(|e| ConflictableTransactionError::Abort(LedgerError::malformed(id, e)))?,
                    None => LogHead::default(),
                };

                let entry = LogEntry::chained(&head.last_digest, tx, value.clone());
                let encoded_entry = entry.encode(id).map_err(ConflictableTransactionError::Abort)?;
                let next_head = LogHead {
                    next_seq: head.next_seq + 1,
                    last_digest: entry.digest,
                };
                let encoded_head = encode(id, &next_head).map_err(ConflictableTransactionError::Abort)?;

                log.insert(utils::log_key(id, head.next_seq), encoded_entry)?;
                heads.insert(id.as_bytes(), encoded_head)?;
                match &value {
                    Some(json) => current.insert(id.as_bytes(), json.clone())?,
                    None => current.remove(id.as_bytes())?,
                };

                Ok(head.next_seq)
            });

        outcome.map_err(|e| match e {
            TransactionError::Abort(err) => err,
            TransactionError::Storage(err) => LedgerError::StorageUnavailable(err),
        })
    }
}

fn encode<T: minicbor::Encode<()>>(id: &str, value: &T) -> Result<Vec<u8>, LedgerError> {
    minicbor::to_vec(value).map_err(|e| LedgerError::malformed(id, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> RecordStore {
        let db = sled::Config::new().temporary(true).open().unwrap();
        RecordStore::new(Arc::new(db)).unwrap()
    }

    fn tx(tx_ref: &str, secs: i64) -> TxContext {
        TxContext {
            tx_ref: tx_ref.to_string(),
            timestamp: TimeStamp::from_unix(secs, 0).unwrap(),
        }
    }

    fn record(id: &str, status: &str) -> Record {
        Record {
            id: id.into(),
            description: "desc".into(),
            party: "Org1MSP".into(),
            status: status.into(),
            timestamp: "2024-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn create_then_exists() {
        let store = temp_store();
        assert!(!store.exists("REC001").unwrap());

        store.create(&tx("t1", 1), &record("REC001", "CREATED")).unwrap();

        assert!(store.exists("REC001").unwrap());
        assert_eq!(store.get_current("REC001").unwrap(), Some(record("REC001", "CREATED")));
    }

    #[test]
    fn second_create_is_rejected_without_append() {
        let store = temp_store();
        store.create(&tx("t1", 1), &record("REC001", "CREATED")).unwrap();

        let err = store.create(&tx("t2", 2), &record("REC001", "PENDING")).unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyExists { id } if id == "REC001"));

        // the next append still lands at sequence 1
        let seq = store.put(&tx("t3", 3), &record("REC001", "VERIFIED")).unwrap();
        assert_eq!(seq, 1);
    }

    #[test]
    fn update_requires_existing_record() {
        let store = temp_store();
        let err = store.update(&tx("t1", 1), &record("REC404", "VERIFIED")).unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));
        assert_eq!(store.log_tree().len(), 0);
    }

    #[test]
    fn delete_drops_projection_but_not_log() {
        let store = temp_store();
        store.put(&tx("t1", 1), &record("REC001", "CREATED")).unwrap();
        let seq = store.delete(&tx("t2", 2), "REC001").unwrap();

        assert_eq!(seq, 1);
        assert!(!store.exists("REC001").unwrap());
        assert_eq!(store.get_current("REC001").unwrap(), None);
        assert_eq!(store.log_tree().len(), 2);

        let err = store.delete(&tx("t3", 3), "REC001").unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));
    }

    #[test]
    fn create_after_delete_is_allowed() {
        let store = temp_store();
        store.create(&tx("t1", 1), &record("REC001", "CREATED")).unwrap();
        store.delete(&tx("t2", 2), "REC001").unwrap();
        assert_eq!(store.create(&tx("t3", 3), &record("REC001", "CREATED")).unwrap(), 2);
    }
}
