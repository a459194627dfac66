use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One categorical measurement: `y` story points in column `c` at instant `x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub x: DateTime<Utc>,
    pub y: u32,
    pub c: String,
}

impl ChartPoint {
    pub fn new(x: DateTime<Utc>, y: u32, c: impl Into<String>) -> Self {
        Self { x, y, c: c.into() }
    }
}

/// All points stored for one sprint, keyed by the identifier the storage
/// backend assigned at write time.
pub type ChartPointCollection = BTreeMap<String, ChartPoint>;

/// Stored timestamps may come back as RFC-3339 strings or epoch milliseconds.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Text(String),
        Millis(i64),
    }

    match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Text(s) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom),
        RawTimestamp::Millis(ms) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {ms}"))),
    }
}

/// Storage partition key: `<org>-<sprintNumber>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SprintKey(String);

impl SprintKey {
    pub fn new(organization: &str, sprint_number: u64) -> Self {
        Self(format!("{organization}-{sprint_number}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SprintKey {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl fmt::Display for SprintKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("invalid chart size \"{0}\", expected <width>x<height> such as 500x200")]
pub struct DimensionsError(pub String);

/// Physical chart size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartDimensions {
    pub width: u32,
    pub height: u32,
}

impl Default for ChartDimensions {
    fn default() -> Self {
        Self {
            width: 500,
            height: 200,
        }
    }
}

impl FromStr for ChartDimensions {
    type Err = DimensionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DimensionsError(s.to_string());
        let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let width: u32 = w.trim().parse().map_err(|_| invalid())?;
        let height: u32 = h.trim().parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}

impl fmt::Display for ChartDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
