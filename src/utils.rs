//! Utility functions for identifiers, log keys and logging setup

use bech32::Bech32m;
use uuid7::uuid7;

/// Human readable prefix of minted transaction references.
pub const TX_HRP: &str = "tx";

/// Encode a fresh uuid7 as bech32m under `hrp`. Fails on an invalid prefix.
pub fn bech32_uuid7(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    Ok(bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?)
}

/// Mint a fresh transaction reference. uuid7 keeps references time ordered.
pub fn new_tx_ref() -> String {
    bech32_uuid7(TX_HRP).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "falling back to a plain uuid7 transaction reference");
        uuid7().to_string()
    })
}

/// Prefix shared by every log key of `id`: big-endian length, then the id bytes.
///
/// The length prefix keeps `"A"` and `"AB"` from sharing a scan range.
pub fn log_prefix(id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + id.len() + 8);
    key.extend_from_slice(&(id.len() as u32).to_be_bytes());
    key.extend_from_slice(id.as_bytes());
    key
}

/// Log key for the `seq`-th append to `id`. Big-endian so sled orders by append.
pub fn log_key(id: &str, seq: u64) -> Vec<u8> {
    let mut key = log_prefix(id);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

/// Install a `tracing` subscriber filtered by the `CUSTODY_LOG` environment variable.
///
/// Defaults to `info` when the variable is unset or unparsable.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_env("CUSTODY_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_keys_sort_by_sequence() {
        let mut keys = vec![log_key("REC001", 10), log_key("REC001", 2), log_key("REC001", 0)];
        keys.sort();
        assert_eq!(keys[0], log_key("REC001", 0));
        assert_eq!(keys[2], log_key("REC001", 10));
    }

    #[test]
    fn prefixes_do_not_overlap_for_nested_ids() {
        let short = log_prefix("A");
        let long = log_key("AB", 0);
        assert!(!long.starts_with(&short));
    }

    #[test]
    fn tx_refs_are_unique_and_prefixed() {
        let a = new_tx_ref();
        let b = new_tx_ref();
        assert_ne!(a, b);
        assert!(a.starts_with("tx1"));
    }

    #[test]
    fn tx_refs_decode_back_to_a_uuid() {
        let (hrp, data) = bech32::decode(&new_tx_ref()).unwrap();
        assert_eq!(hrp.as_str(), TX_HRP);
        assert_eq!(data.len(), 16);
    }

    #[test]
    fn invalid_prefix_is_an_error() {
        assert!(bech32_uuid7("").is_err());
        assert!(bech32_uuid7("t x").is_err());
    }
}
