//! Core record and timestamp types
use super::error::LedgerError;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The tracked entity. Stored under `id` as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub party: String, // verified identity of whoever wrote this version
    #[serde(default)]
    pub status: String, // e.g. "CREATED", "VERIFIED", "REJECTED"
    #[serde(default)]
    pub timestamp: String, // RFC3339 rendering of the transaction clock
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    /// Build from the `(seconds, nanos)` pair a host platform hands out.
    pub fn from_unix(secs: i64, nanos: u32) -> Option<Self> {
        DateTime::from_timestamp(secs, nanos).map(TimeStamp)
    }
    /// Parse an RFC3339 string supplied by the host, in any offset.
    pub fn parse_rfc3339(raw: &str) -> Result<Self, LedgerError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| TimeStamp(dt.with_timezone(&Utc)))
            .map_err(|e| LedgerError::MalformedInput(format!("'{raw}' is not RFC3339: {e}")))
    }
    /// Second precision, `Z` suffix. This is the form written into `Record::timestamp`.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

impl Record {
    /// Build a record whose `party` and `timestamp` come from the acting transaction,
    /// never from the client.
    pub fn stamped(
        id: &str,
        description: &str,
        status: &str,
        party: String,
        timestamp: &TimeStamp<Utc>,
    ) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            party,
            status: status.to_string(),
            timestamp: timestamp.to_rfc3339(),
        }
    }
    pub fn to_json(&self) -> Result<Vec<u8>, LedgerError> {
        serde_json::to_vec(self).map_err(|e| LedgerError::malformed(&self.id, e))
    }
    pub fn from_json(id: &str, bytes: &[u8]) -> Result<Self, LedgerError> {
        serde_json::from_slice(bytes).map_err(|e| LedgerError::malformed(id, e))
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl Serialize for TimeStamp<Utc> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl<'de> Deserialize<'de> for TimeStamp<Utc> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| TimeStamp(dt.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom)
    }
}

// (seconds, nanos) covers every instant chrono can represent; a single i64 of
// nanoseconds stops at 2262.
impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(2)?
            .i64(self.0.timestamp())?
            .u32(self.0.timestamp_subsec_nanos())?
            .ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        if d.array()? != Some(2) {
            return Err(minicbor::decode::Error::message(
                "expected a [seconds, nanos] timestamp",
            ));
        }
        let secs = d.i64()?;
        let nanos = d.u32()?;

        DateTime::from_timestamp(secs, nanos)
            .map(TimeStamp)
            .ok_or(minicbor::decode::Error::message(
                "failed to convert timestamp to utc",
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc3339_is_second_precision_utc() {
        let ts = TimeStamp::from_unix(1_700_000_000, 123_456_789).unwrap();
        assert_eq!(ts.to_rfc3339(), "2023-11-14T22:13:20Z");
    }

    #[test]
    fn timestamp_json_keeps_nanos() {
        let ts = TimeStamp::from_unix(1_700_000_000, 5).unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        let back: TimeStamp<Utc> = serde_json::from_str(&json).unwrap();
        assert_eq!(ts, back);
    }

    #[test]
    fn cbor_timestamp_survives_past_2262() {
        let far = TimeStamp::from(Utc.with_ymd_and_hms(2300, 1, 1, 0, 0, 0).unwrap());
        let encoded = minicbor::to_vec(&far).unwrap();
        let decoded: TimeStamp<Utc> = minicbor::decode(&encoded).unwrap();
        assert_eq!(decoded, far);

        let early = TimeStamp::from_unix(-20_000_000_000, 7).unwrap();
        let decoded: TimeStamp<Utc> = minicbor::decode(&minicbor::to_vec(&early).unwrap()).unwrap();
        assert_eq!(decoded, early);
    }

    #[test]
    fn parse_rfc3339_normalises_to_utc() {
        let ts = TimeStamp::parse_rfc3339("2024-06-15T12:30:00+02:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-06-15T10:30:00Z");
        assert!(matches!(
            TimeStamp::parse_rfc3339("yesterday"),
            Err(LedgerError::MalformedInput(_))
        ));
    }

    #[test]
    fn record_decodes_with_missing_optional_fields() {
        let record = Record::from_json("REC009", br#"{"id":"REC009"}"#).unwrap();
        assert_eq!(record.id, "REC009");
        assert!(record.party.is_empty());
    }

    #[test]
    fn record_without_id_is_malformed() {
        let err = Record::from_json("REC009", br#"{"description":"x"}"#).unwrap_err();
        assert!(matches!(err, LedgerError::MalformedRecord { .. }));
    }
}
