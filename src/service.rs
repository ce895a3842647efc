//! Service layer API for chain-of-custody operations
use super::context::Invocation;
use super::error::LedgerError;
use super::federation::{
    FederationGateway, QueryHandler, RemoteResponse, STATUS_BAD_REQUEST, STATUS_ERROR,
    STATUS_NOT_FOUND,
};
use super::history::VersionEntry;
use super::record::Record;
use super::store::RecordStore;
use serde::Serialize;
use std::sync::Arc;

pub const SEED_DEFAULTS: &str = "seed-defaults";
pub const BATCH_IMPORT: &str = "batch-import";
pub const CREATE_RECORD: &str = "create-record";
pub const UPDATE_RECORD: &str = "update-record";
pub const READ_RECORD: &str = "read-record";
pub const RECORD_EXISTS: &str = "record-exists";
pub const GET_HISTORY: &str = "get-history";
pub const QUERY_FOREIGN_DOMAIN: &str = "query-foreign-domain";

// (id, description, party, status)
const DEFAULT_RECORDS: [(&str, &str, &str, &str); 2] = [
    ("REC001", "Initial Contract Draft", "Org1", "CREATED"),
    ("REC002", "Shipping Manifest", "Org2", "PENDING"),
];

pub struct CustodyService {
    store: RecordStore,
    gateway: FederationGateway,
}

enum Query {
    Read,
    Exists,
    History,
}

impl CustodyService {
    pub fn new(instance: Arc<sled::Db>, gateway: FederationGateway) -> Result<Self, LedgerError> {
        Ok(Self {
            store: RecordStore::new(instance)?,
            gateway,
        })
    }

    /// A service that cannot reach any foreign domain.
    pub fn standalone(instance: Arc<sled::Db>) -> Result<Self, LedgerError> {
        Self::new(instance, FederationGateway::disconnected())
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Install the starter records, overwriting whatever is there.
    /// Parties are fixed; timestamps come from the transaction clock.
    pub fn seed_defaults(&self, inv: &Invocation<'_>) -> Result<(), LedgerError> {
        let tx = inv.tx()?;

        for (id, description, party, status) in DEFAULT_RECORDS {
            let record = Record::stamped(id, description, status, party.to_string(), &tx.timestamp);
            self.store.put(&tx, &record)?;
        }

        tracing::info!(tx_ref = %tx.tx_ref, count = DEFAULT_RECORDS.len(), "seeded default records");
        Ok(())
    }

    /// Create every record of a JSON array, in order.
    ///
    /// The whole array is decoded before anything is written. Creation stops at
    /// the first id that already exists; records before it stay written.
    pub fn batch_import(&self, inv: &Invocation<'_>, data: &str) -> Result<usize, LedgerError> {
        let records: Vec<Record> =
            serde_json::from_str(data).map_err(|e| LedgerError::MalformedInput(e.to_string()))?;
        let tx = inv.tx()?;

        for (imported, record) in records.iter().enumerate() {
            if let Err(err) = self.store.create(&tx, record) {
                tracing::warn!(
                    id = %record.id,
                    imported,
                    "batch import aborted: {err}"
                );
                return Err(err);
            }
        }

        tracing::info!(tx_ref = %tx.tx_ref, count = records.len(), "batch import applied");
        Ok(records.len())
    }

    /// Create a record attributed to the caller at the transaction time.
    pub fn create_record(
        &self,
        inv: &Invocation<'_>,
        id: &str,
        description: &str,
        status: &str,
    ) -> Result<Record, LedgerError> {
        let tx = inv.tx()?;
        let record = Record::stamped(id, description, status, inv.principal()?, &tx.timestamp);

        if let Err(err) = self.store.create(&tx, &record) {
            tracing::warn!(id, "create rejected: {err}");
            return Err(err);
        }

        tracing::info!(id, party = %record.party, tx_ref = %tx.tx_ref, "record created");
        Ok(record)
    }

    /// Overwrite an existing record, appending a new version to its history.
    pub fn update_record(
        &self,
        inv: &Invocation<'_>,
        id: &str,
        description: &str,
        status: &str,
    ) -> Result<Record, LedgerError> {
        let tx = inv.tx()?;
        let record = Record::stamped(id, description, status, inv.principal()?, &tx.timestamp);

        if let Err(err) = self.store.update(&tx, &record) {
            tracing::warn!(id, "update rejected: {err}");
            return Err(err);
        }

        tracing::info!(id, party = %record.party, status, tx_ref = %tx.tx_ref, "record updated");
        Ok(record)
    }

    pub fn read_record(&self, id: &str) -> Result<Record, LedgerError> {
        self.store
            .get_current(id)?
            .ok_or_else(|| LedgerError::NotFound { id: id.to_string() })
    }

    pub fn record_exists(&self, id: &str) -> Result<bool, LedgerError> {
        self.store.exists(id)
    }

    /// The chain of custody of `id`, oldest version first.
    pub fn get_history(&self, id: &str) -> Result<Vec<VersionEntry>, LedgerError> {
        self.store.history(id)
    }

    pub fn verify_history(&self, id: &str) -> Result<u64, LedgerError> {
        self.store.verify_history(id)
    }

    /// Read from a store in another domain. `operation` must be a query the
    /// foreign store serves; it refuses anything that would write.
    pub fn query_foreign_domain(
        &self,
        domain: &str,
        store_name: &str,
        operation: &str,
        argument: &str,
    ) -> Result<String, LedgerError> {
        let payload = self
            .gateway
            .query_foreign(domain, store_name, operation, argument)?;

        String::from_utf8(payload).map_err(|_| LedgerError::FederationQueryFailed {
            domain: domain.to_string(),
            store_name: store_name.to_string(),
            message: "payload is not valid UTF-8".into(),
        })
    }
}

impl QueryHandler for CustodyService {
    fn handle_query(&self, operation: &str, argument: &[u8]) -> RemoteResponse {
        let query = match operation {
            READ_RECORD => Query::Read,
            RECORD_EXISTS => Query::Exists,
            GET_HISTORY => Query::History,
            SEED_DEFAULTS | BATCH_IMPORT | CREATE_RECORD | UPDATE_RECORD | QUERY_FOREIGN_DOMAIN => {
                return RemoteResponse::error(
                    STATUS_BAD_REQUEST,
                    format!("{operation} is not a read-only query"),
                );
            }
            _ => {
                return RemoteResponse::error(
                    STATUS_BAD_REQUEST,
                    format!("unknown operation {operation}"),
                );
            }
        };

        let Ok(id) = std::str::from_utf8(argument) else {
            return RemoteResponse::error(STATUS_BAD_REQUEST, "argument is not UTF-8");
        };

        let result = match query {
            Query::Read => self.read_record(id).and_then(|record| json_payload(id, &record)),
            Query::Exists => self.record_exists(id).and_then(|exists| json_payload(id, &exists)),
            Query::History => self.get_history(id).and_then(|history| json_payload(id, &history)),
        };

        match result {
            Ok(payload) => RemoteResponse::ok(payload),
            Err(err @ LedgerError::NotFound { .. }) => {
                RemoteResponse::error(STATUS_NOT_FOUND, err.to_string())
            }
            Err(err) => RemoteResponse::error(STATUS_ERROR, err.to_string()),
        }
    }
}

fn json_payload<T: Serialize + ?Sized>(id: &str, value: &T) -> Result<Vec<u8>, LedgerError> {
    serde_json::to_vec(value).map_err(|e| LedgerError::malformed(id, e))
}
