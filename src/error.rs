#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    #[error("the record {id} already exists")]
    AlreadyExists { id: String },
    #[error("the record {id} does not exist")]
    NotFound { id: String },
    #[error("failed to decode input: {0}")]
    MalformedInput(String),
    #[error("stored value for {id} could not be decoded: {reason}")]
    MalformedRecord { id: String, reason: String },
    #[error("failed to get client identity: {0}")]
    IdentityUnavailable(String),
    #[error("failed to get transaction timestamp: {0}")]
    ClockUnavailable(String),
    #[error("failed to access world state: {0}")]
    StorageUnavailable(#[from] sled::Error),
    #[error("failed to query {store_name} on {domain}. Message: {message}")]
    FederationQueryFailed {
        domain: String,
        store_name: String,
        message: String,
    },
    #[error("history of {id} fails chain verification at entry {seq}")]
    IntegrityViolation { id: String, seq: u64 },
}

impl LedgerError {
    pub(crate) fn malformed(id: &str, reason: impl ToString) -> Self {
        LedgerError::MalformedRecord {
            id: id.to_string(),
            reason: reason.to_string(),
        }
    }
}
