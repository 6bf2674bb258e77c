use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::SqlValue;

/// Timestamp stored in a Text column as RFC 3339 with microseconds and `Z`,
/// so stored values sort chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StorageDatetime(pub DateTime<Utc>);

impl StorageDatetime {
    /// Current time, truncated to whole microseconds so it survives a round trip.
    pub fn now() -> Self {
        let now = Utc::now();
        StorageDatetime(DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now))
    }

    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

impl Serialize for StorageDatetime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for StorageDatetime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&text)
            .map(|dt| StorageDatetime(dt.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom)
    }
}

impl From<StorageDatetime> for SqlValue {
    fn from(dt: StorageDatetime) -> Self {
        SqlValue::Text(dt.to_rfc3339())
    }
}
