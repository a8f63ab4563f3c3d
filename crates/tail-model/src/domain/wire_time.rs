use serde::{Deserialize, Deserializer};
use time::{
    OffsetDateTime, PrimitiveDateTime, UtcOffset,
    format_description::well_known::{Iso8601, Rfc3339},
};

use crate::ModelError;

/// Parse a backend date-time.
///
/// RFC3339 values keep their offset; offset-less ISO-8601 values (what the
/// backend emits for local date-times) are placed in the local offset.
pub fn parse_datetime(raw: &str) -> Result<OffsetDateTime, ModelError> {
    let raw = raw.trim();
    if let Ok(dt) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(dt);
    }
    PrimitiveDateTime::parse(raw, &Iso8601::DEFAULT)
        .map(|dt| dt.assume_offset(local_offset()))
        .map_err(|e| ModelError::InvalidTimestamp(format!("{raw}: {e}")))
}

pub(crate) fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

pub(crate) fn to_millis(dt: OffsetDateTime) -> i64 {
    (dt.unix_timestamp_nanos() / 1_000_000) as i64
}

/// Accepts epoch-millis or a date-time string.
pub(crate) fn deserialize_millis<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Millis(ms) => Ok(ms),
        Raw::Text(s) => parse_datetime(&s)
            .map(to_millis)
            .map_err(serde::de::Error::custom),
    }
}
