use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Wire format of one PSK Reporter MQTT message.
///
/// Every documented key is optional and falls back to its default. Keys
/// outside the documented set are collected in `unknown` so they can be
/// flagged instead of vanishing silently.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpotPayload {
    #[serde(rename = "sq", default)]
    pub sequence: u64,
    #[serde(rename = "f", default)]
    pub frequency: i64,
    #[serde(rename = "md", default)]
    pub mode: String,
    #[serde(rename = "rp", default)]
    pub report: i32,
    #[serde(rename = "t", default)]
    pub time: i64,
    #[serde(rename = "sc", default)]
    pub sender_callsign: String,
    #[serde(rename = "sl", default)]
    pub sender_locator: String,
    #[serde(rename = "rc", default)]
    pub receiver_callsign: String,
    #[serde(rename = "rl", default)]
    pub receiver_locator: String,
    #[serde(rename = "sa", default)]
    pub sender_country: i32,
    #[serde(rename = "ra", default)]
    pub receiver_country: i32,
    #[serde(rename = "b", default)]
    pub band: String,
    #[serde(flatten)]
    pub unknown: BTreeMap<String, Value>,
}

impl SpotPayload {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Names of keys outside the documented schema
    pub fn unknown_keys(&self) -> Vec<&str> {
        self.unknown.keys().map(String::as_str).collect()
    }
}

/// One reception report: `sender` was heard by `receiver`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Spot {
    pub sequence: u64,
    /// Hz
    pub frequency: i64,
    pub mode: String,
    pub report: i32,
    /// Epoch seconds as reported by the receiver
    pub timestamp: i64,
    pub sender_callsign: String,
    pub sender_locator: String,
    pub receiver_callsign: String,
    pub receiver_locator: String,
    pub sender_country: i32,
    pub receiver_country: i32,
    pub band: String,
}

impl From<SpotPayload> for Spot {
    fn from(payload: SpotPayload) -> Self {
        Self {
            sequence: payload.sequence,
            frequency: payload.frequency,
            mode: payload.mode,
            report: payload.report,
            timestamp: payload.time,
            sender_callsign: payload.sender_callsign,
            sender_locator: payload.sender_locator,
            receiver_callsign: payload.receiver_callsign,
            receiver_locator: payload.receiver_locator,
            sender_country: payload.sender_country,
            receiver_country: payload.receiver_country,
            band: payload.band,
        }
    }
}

impl Spot {
    pub fn mhz(&self) -> f64 {
        self.frequency as f64 / 1_000_000.0
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }

    /// RFC 3339 UTC, or an empty string for a timestamp chrono cannot represent
    pub fn utc(&self) -> String {
        self.datetime()
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::Spot;

    /// A 2m FT8 spot between two stations; tests override what they need.
    pub fn spot() -> Spot {
        Spot {
            sequence: 1,
            frequency: 144_174_000,
            mode: "FT8".to_string(),
            report: -12,
            timestamp: 1_700_000_000,
            sender_callsign: "OH2ABC".to_string(),
            sender_locator: "KP20AB".to_string(),
            receiver_callsign: "SM5XYZ".to_string(),
            receiver_locator: "JO89CD".to_string(),
            sender_country: 224,
            receiver_country: 284,
            band: "2m".to_string(),
        }
    }
}
