//! Read-only queries into stores hosted by other domains.
//!
//! The gateway turns a local call into one remote invocation and maps the
//! remote status back into a local outcome. It neither caches nor retries.
//! Read-only is enforced by the foreign domain: a store answering federation
//! calls only dispatches query operations (see `CustodyService::handle_query`).
//! Timeouts belong to the [`RemoteInvoker`] implementation.
use super::error::LedgerError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

pub const STATUS_OK: i32 = 200;
pub const STATUS_BAD_REQUEST: i32 = 400;
pub const STATUS_NOT_FOUND: i32 = 404;
pub const STATUS_ERROR: i32 = 500;
pub const STATUS_UNAVAILABLE: i32 = 503;

/// What a foreign store answers: status, message, raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResponse {
    pub status: i32,
    pub message: String,
    pub payload: Vec<u8>,
}

/// Transport to other domains. `args[0]` is the operation name, the rest are
/// its arguments.
pub trait RemoteInvoker: Send + Sync {
    fn invoke(&self, domain: &str, store_name: &str, args: &[&[u8]]) -> RemoteResponse;
}

/// The serving side of a store reachable through federation.
pub trait QueryHandler: Send + Sync {
    fn handle_query(&self, operation: &str, argument: &[u8]) -> RemoteResponse;
}

#[derive(Clone)]
pub struct FederationGateway {
    invoker: Arc<dyn RemoteInvoker>,
}

/// Routes `(domain, store_name)` to stores living in the same process.
///
/// Handlers are held weakly so a store may register itself in the registry its
/// own gateway talks through.
#[derive(Default)]
pub struct DomainRegistry {
    stores: RwLock<HashMap<(String, String), Weak<dyn QueryHandler>>>,
}

struct Disconnected;

impl RemoteResponse {
    pub fn ok(payload: Vec<u8>) -> Self {
        Self {
            status: STATUS_OK,
            message: String::new(),
            payload,
        }
    }
    pub fn error(status: i32, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            payload: Vec::new(),
        }
    }
}

impl FederationGateway {
    pub fn new(invoker: Arc<dyn RemoteInvoker>) -> Self {
        Self { invoker }
    }

    /// A gateway with no transport; every query fails.
    pub fn disconnected() -> Self {
        Self::new(Arc::new(Disconnected))
    }

    /// Invoke `operation(argument)` on `store_name` in `domain`.
    ///
    /// Success returns the remote payload untouched. Any other status becomes
    /// `FederationQueryFailed` carrying the remote message.
    pub fn query_foreign(
        &self,
        domain: &str,
        store_name: &str,
        operation: &str,
        argument: &str,
    ) -> Result<Vec<u8>, LedgerError> {
        let args = [operation.as_bytes(), argument.as_bytes()];
        let response = self.invoker.invoke(domain, store_name, &args);

        if response.status != STATUS_OK {
            tracing::warn!(
                domain,
                store_name,
                operation,
                status = response.status,
                "foreign query failed: {}",
                response.message
            );
            return Err(LedgerError::FederationQueryFailed {
                domain: domain.to_string(),
                store_name: store_name.to_string(),
                message: response.message,
            });
        }

        Ok(response.payload)
    }
}

impl DomainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, domain: &str, store_name: &str, handler: &Arc<dyn QueryHandler>) {
        self.stores.write().insert(
            (domain.to_string(), store_name.to_string()),
            Arc::downgrade(handler),
        );
    }

    pub fn deregister(&self, domain: &str, store_name: &str) {
        self.stores
            .write()
            .remove(&(domain.to_string(), store_name.to_string()));
    }
}

impl RemoteInvoker for DomainRegistry {
    fn invoke(&self, domain: &str, store_name: &str, args: &[&[u8]]) -> RemoteResponse {
        let handler = self
            .stores
            .read()
            .get(&(domain.to_string(), store_name.to_string()))
            .and_then(Weak::upgrade);

        let Some(handler) = handler else {
            return RemoteResponse::error(
                STATUS_UNAVAILABLE,
                format!("no store {store_name} reachable on {domain}"),
            );
        };

        let (operation, argument) = match args {
            [operation, argument, ..] => (*operation, *argument),
            [operation] => (*operation, &[][..]),
            [] => return RemoteResponse::error(STATUS_BAD_REQUEST, "missing operation name"),
        };

        match std::str::from_utf8(operation) {
            Ok(operation) => handler.handle_query(operation, argument),
            Err(_) => RemoteResponse::error(STATUS_BAD_REQUEST, "operation name is not UTF-8"),
        }
    }
}

impl RemoteInvoker for Disconnected {
    fn invoke(&self, domain: &str, _: &str, _: &[&[u8]]) -> RemoteResponse {
        RemoteResponse::error(
            STATUS_UNAVAILABLE,
            format!("no federation transport configured for {domain}"),
        )
    }
}
