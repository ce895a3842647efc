//! Every store one process hosts, wired into a shared federation registry.
//!
//! The local store and each configured peer are opened from their own sled
//! database and registered under `(domain, store_name)`. Each store's gateway
//! talks through the same registry, so any of them can query the others.
use super::config::{LedgerConfig, StorageConfig};
use super::error::LedgerError;
use super::federation::{DomainRegistry, FederationGateway, QueryHandler};
use super::service::CustodyService;
use std::sync::Arc;

struct Hosted {
    domain: String,
    store_name: String,
    service: Arc<CustodyService>,
}

pub struct Deployment {
    // index 0 is the local store
    hosted: Vec<Hosted>,
}

impl Deployment {
    pub fn open(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let registry = Arc::new(DomainRegistry::new());
        let stores = std::iter::once((&config.domain, &config.store_name, &config.storage)).chain(
            config
                .peers
                .iter()
                .map(|peer| (&peer.domain, &peer.store_name, &peer.storage)),
        );

        let mut hosted: Vec<Hosted> = Vec::with_capacity(config.peers.len() + 1);
        for (domain, store_name, storage) in stores {
            if hosted
                .iter()
                .any(|h| &h.domain == domain && &h.store_name == store_name)
            {
                return Err(LedgerError::MalformedInput(format!(
                    "store {store_name} on {domain} is configured twice"
                )));
            }

            let service = Arc::new(open_service(storage, &registry)?);
            let handler: Arc<dyn QueryHandler> = service.clone();
            registry.register(domain, store_name, &handler);
            tracing::debug!(domain, store_name, path = %storage.path.display(), "store registered");

            hosted.push(Hosted {
                domain: domain.clone(),
                store_name: store_name.clone(),
                service,
            });
        }

        Ok(Self { hosted })
    }

    /// The store named by the top level of the config.
    pub fn local(&self) -> &CustodyService {
        &self.hosted[0].service
    }

    /// First hosted store of `domain`, local or peer.
    pub fn service_in(&self, domain: &str) -> Option<&CustodyService> {
        self.hosted
            .iter()
            .find(|h| h.domain == domain)
            .map(|h| h.service.as_ref())
    }

    /// `(domain, store_name)` of every hosted store, local first.
    pub fn stores(&self) -> impl Iterator<Item = (&str, &str)> {
        self.hosted
            .iter()
            .map(|h| (h.domain.as_str(), h.store_name.as_str()))
    }
}

fn open_service(
    storage: &StorageConfig,
    registry: &Arc<DomainRegistry>,
) -> Result<CustodyService, LedgerError> {
    let db = storage.open_db()?;
    CustodyService::new(Arc::new(db), FederationGateway::new(registry.clone()))
}
