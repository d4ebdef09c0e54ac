//! Per-viewer spot filter built from query parameters.

use serde::Deserialize;

use crate::config::defaults::{
    MAX_CALLSIGN_LENGTH, MAX_LOCATOR_LENGTH, MAX_MODE_COUNT, MAX_MODE_NAME_LENGTH,
};
use crate::models::Spot;

/// Raw query parameters shared by the snapshot page and the live stream
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterParams {
    #[serde(default)]
    pub bands: Option<String>,
    #[serde(default)]
    pub modes: Option<String>,
    #[serde(default)]
    pub locator: Option<String>,
    #[serde(default)]
    pub callsign: Option<String>,
}

/// All configured predicates must hold. Empty means "match everything".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpotFilter {
    pub bands: Vec<String>,
    pub modes: Vec<String>,
    pub locator: Option<String>,
    pub callsign: Option<String>,
}

impl SpotFilter {
    /// Sanitize user input: bands limited to `allowed_bands`, bounded mode
    /// list, truncated prefixes.
    pub fn from_params(params: &FilterParams, allowed_bands: &[String]) -> Self {
        let mut bands: Vec<String> = Vec::new();
        for band in split_list(params.bands.as_deref()) {
            if allowed_bands.iter().any(|allowed| allowed == band)
                && !bands.iter().any(|b| b == band)
            {
                bands.push(band.to_string());
            }
        }

        let mut modes: Vec<String> = Vec::new();
        for mode in split_list(params.modes.as_deref()) {
            if modes.len() >= MAX_MODE_COUNT {
                break;
            }
            if mode.chars().count() > MAX_MODE_NAME_LENGTH || modes.iter().any(|m| m == mode) {
                continue;
            }
            modes.push(mode.to_string());
        }

        Self {
            bands,
            modes,
            locator: prefix(params.locator.as_deref(), MAX_LOCATOR_LENGTH),
            callsign: prefix(params.callsign.as_deref(), MAX_CALLSIGN_LENGTH),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.bands.is_empty()
            || !self.modes.is_empty()
            || self.locator.is_some()
            || self.callsign.is_some()
    }

    pub fn matches(&self, spot: &Spot) -> bool {
        if !self.bands.is_empty() && !self.bands.iter().any(|b| *b == spot.band) {
            return false;
        }
        if !self.modes.is_empty() && !self.modes.iter().any(|m| *m == spot.mode) {
            return false;
        }
        either_starts_with(&self.locator, &spot.sender_locator, &spot.receiver_locator)
            && either_starts_with(&self.callsign, &spot.sender_callsign, &spot.receiver_callsign)
    }
}

fn either_starts_with(prefix: &Option<String>, sender: &str, receiver: &str) -> bool {
    match prefix {
        Some(prefix) => sender.starts_with(prefix.as_str()) || receiver.starts_with(prefix.as_str()),
        None => true,
    }
}

fn split_list(value: Option<&str>) -> impl Iterator<Item = &str> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
}

fn prefix(value: Option<&str>, max_chars: usize) -> Option<String> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    Some(value.chars().take(max_chars).collect())
}
