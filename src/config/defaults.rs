/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Feed defaults
pub const DEFAULT_BROKER: &str = "mqtt.pskreporter.info:1883";
pub const DEFAULT_BANDS: &str = "6m,4m,2m,70cm,23cm";
/// Finland; see https://www.adif.org/304/ADIF_304.htm#Country_Codes
pub const DEFAULT_COUNTRY: i32 = 224;
pub const DEFAULT_MQTT_KEEP_ALIVE: &str = "10s";

// Listener defaults
pub const DEFAULT_METRICS_ADDRPORT: &str = ":9108";
pub const DEFAULT_SPOTLOG_ADDRPORT: &str = ":8080";

// Retention defaults
pub const DEFAULT_SPOTLOG_RETENTION: &str = "24h";
pub const DEFAULT_DEDUP_TTL: &str = "1m";
pub const DEFAULT_PRUNE_PROBABILITY: f64 = 0.1;

// Live stream defaults
pub const DEFAULT_STREAM_QUEUE_CAPACITY: usize = 1000;
pub const DEFAULT_STREAM_POLL_INTERVAL: &str = "333ms";
pub const DEFAULT_STREAM_KEEPALIVE_INTERVAL: &str = "25s";
pub const DEFAULT_SUBSCRIBER_TIMEOUT: &str = "1m";
pub const DEFAULT_REAP_INTERVAL: &str = "30s";

// Logging defaults
pub const DEFAULT_LOG_JSON: bool = false;

// Filter input limits
pub const MAX_MODE_NAME_LENGTH: usize = 8;
pub const MAX_MODE_COUNT: usize = 8;
pub const MAX_LOCATOR_LENGTH: usize = 16;
pub const MAX_CALLSIGN_LENGTH: usize = 16;
