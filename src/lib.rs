pub mod config;
pub mod context;
pub mod deployment;
pub mod error;
pub mod federation;
pub mod history;
pub mod record;
pub mod service;
pub mod store;
pub mod utils;

pub use deployment::Deployment;
pub use error::LedgerError;
pub use history::VersionEntry;
pub use record::{Record, TimeStamp};
pub use service::CustodyService;
pub use store::RecordStore;
