//! Per-call identity and clock context.
//!
//! The host platform verifies callers and agrees on a transaction time. Both are
//! handed to every state-changing operation through an [`Invocation`] rather
//! than read from ambient state, so the store can be driven by fakes in tests.
use super::error::LedgerError;
use super::record::TimeStamp;
use super::utils;
use chrono::Utc;

/// Supplies the verified principal of the caller.
pub trait IdentitySource {
    fn principal(&self) -> Result<String, LedgerError>;
}

/// Supplies the consensus-agreed timestamp of the current transaction.
///
/// Every replica executing the same transaction must observe the same value.
pub trait DeterministicClock {
    fn tx_timestamp(&self) -> Result<TimeStamp<Utc>, LedgerError>;
}

/// An identity already verified by the host, e.g. an MSP id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedIdentity(Option<String>);

/// A clock pinned to the timestamp the host agreed on for this transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedClock(Option<TimeStamp<Utc>>);

/// What the store records alongside every append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxContext {
    pub tx_ref: String,
    pub timestamp: TimeStamp<Utc>,
}

/// A single externally invoked operation: transaction reference plus the
/// identity and clock it runs under.
pub struct Invocation<'a> {
    tx_ref: String,
    identity: &'a dyn IdentitySource,
    clock: &'a dyn DeterministicClock,
}

impl FixedIdentity {
    pub fn new(principal: impl Into<String>) -> Self {
        Self(Some(principal.into()))
    }
    pub fn unverified() -> Self {
        Self(None)
    }
}

impl IdentitySource for FixedIdentity {
    fn principal(&self) -> Result<String, LedgerError> {
        match &self.0 {
            Some(principal) if !principal.is_empty() => Ok(principal.clone()),
            _ => Err(LedgerError::IdentityUnavailable(
                "caller carries no verified principal".into(),
            )),
        }
    }
}

impl FixedClock {
    pub fn new(at: TimeStamp<Utc>) -> Self {
        Self(Some(at))
    }
    pub fn unavailable() -> Self {
        Self(None)
    }
    /// Clock for a host that passes the agreed time as RFC3339 text. No value
    /// means no agreed time, and writes then fail with `ClockUnavailable`.
    pub fn from_rfc3339(raw: Option<&str>) -> Result<Self, LedgerError> {
        match raw {
            Some(raw) => Ok(Self::new(TimeStamp::parse_rfc3339(raw)?)),
            None => Ok(Self::unavailable()),
        }
    }
}

impl DeterministicClock for FixedClock {
    fn tx_timestamp(&self) -> Result<TimeStamp<Utc>, LedgerError> {
        self.0
            .clone()
            .ok_or_else(|| LedgerError::ClockUnavailable("no transaction timestamp".into()))
    }
}

impl<'a> Invocation<'a> {
    /// Start an invocation with a freshly minted transaction reference.
    pub fn new(identity: &'a dyn IdentitySource, clock: &'a dyn DeterministicClock) -> Self {
        Self::with_tx_ref(utils::new_tx_ref(), identity, clock)
    }
    /// Start an invocation under a transaction reference chosen by the host.
    pub fn with_tx_ref(
        tx_ref: String,
        identity: &'a dyn IdentitySource,
        clock: &'a dyn DeterministicClock,
    ) -> Self {
        Self {
            tx_ref,
            identity,
            clock,
        }
    }
    pub fn tx_ref(&self) -> &str {
        &self.tx_ref
    }
    pub fn principal(&self) -> Result<String, LedgerError> {
        self.identity.principal()
    }
    /// Resolve the transaction context. Fails with `ClockUnavailable` if the
    /// host cannot supply a timestamp.
    pub fn tx(&self) -> Result<TxContext, LedgerError> {
        Ok(TxContext {
            tx_ref: self.tx_ref.clone(),
            timestamp: self.clock.tx_timestamp()?,
        })
    }
}
