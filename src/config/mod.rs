use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use defaults::*;
use duration_serde::{comma_list, duration};

use crate::errors::{ConfigError, ConfigResult};

/// Environment variables read on top of the file layer, matched case-insensitively.
const ENV_KEYS: &[&str] = &[
    "broker",
    "bands",
    "country",
    "mqtt_keep_alive",
    "metrics_addrport",
    "spotlog_addrport",
    "spotlog_retention",
    "dedup_ttl",
    "prune_probability",
    "stream_queue_capacity",
    "stream_poll_interval",
    "stream_keepalive_interval",
    "subscriber_timeout",
    "reap_interval",
    "log_json",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// MQTT broker as `host:port`
    #[serde(default = "default_broker")]
    pub broker: String,
    /// Bands to subscribe to; also the whitelist for the `bands` filter
    #[serde(default = "default_bands", with = "comma_list")]
    pub bands: Vec<String>,
    /// Target country (ADIF DXCC code)
    #[serde(default = "default_country")]
    pub country: i32,
    #[serde(default = "default_mqtt_keep_alive", with = "duration")]
    pub mqtt_keep_alive: Duration,
    /// Prometheus listener, Go-style `:port` accepted
    #[serde(default = "default_metrics_addrport")]
    pub metrics_addrport: String,
    /// Spot log web listener, Go-style `:port` accepted
    #[serde(default = "default_spotlog_addrport")]
    pub spotlog_addrport: String,
    /// How long spots stay in the spot log
    #[serde(default = "default_spotlog_retention", with = "duration")]
    pub spotlog_retention: Duration,
    /// How long a message identity is remembered for deduplication
    #[serde(default = "default_dedup_ttl", with = "duration")]
    pub dedup_ttl: Duration,
    /// Chance that a hot-path call also sweeps expired entries
    #[serde(default = "default_prune_probability")]
    pub prune_probability: f64,
    /// Pending spots kept per live viewer before new ones are dropped
    #[serde(default = "default_stream_queue_capacity")]
    pub stream_queue_capacity: usize,
    #[serde(default = "default_stream_poll_interval", with = "duration")]
    pub stream_poll_interval: Duration,
    #[serde(default = "default_stream_keepalive_interval", with = "duration")]
    pub stream_keepalive_interval: Duration,
    /// Live viewers silent for longer than this are reaped
    #[serde(default = "default_subscriber_timeout", with = "duration")]
    pub subscriber_timeout: Duration,
    #[serde(default = "default_reap_interval", with = "duration")]
    pub reap_interval: Duration,
    #[serde(default = "default_log_json")]
    pub log_json: bool,
}

fn default_broker() -> String {
    DEFAULT_BROKER.to_string()
}

fn default_bands() -> Vec<String> {
    DEFAULT_BANDS.split(',').map(str::to_string).collect()
}

fn default_country() -> i32 {
    DEFAULT_COUNTRY
}

fn default_metrics_addrport() -> String {
    DEFAULT_METRICS_ADDRPORT.to_string()
}

fn default_spotlog_addrport() -> String {
    DEFAULT_SPOTLOG_ADDRPORT.to_string()
}

fn default_prune_probability() -> f64 {
    DEFAULT_PRUNE_PROBABILITY
}

fn default_stream_queue_capacity() -> usize {
    DEFAULT_STREAM_QUEUE_CAPACITY
}

fn default_log_json() -> bool {
    DEFAULT_LOG_JSON
}

fn parse_default_duration(value: &str) -> Duration {
    humantime::parse_duration(value).unwrap_or_default()
}

fn default_mqtt_keep_alive() -> Duration {
    parse_default_duration(DEFAULT_MQTT_KEEP_ALIVE)
}

fn default_spotlog_retention() -> Duration {
    parse_default_duration(DEFAULT_SPOTLOG_RETENTION)
}

fn default_dedup_ttl() -> Duration {
    parse_default_duration(DEFAULT_DEDUP_TTL)
}

fn default_stream_poll_interval() -> Duration {
    parse_default_duration(DEFAULT_STREAM_POLL_INTERVAL)
}

fn default_stream_keepalive_interval() -> Duration {
    parse_default_duration(DEFAULT_STREAM_KEEPALIVE_INTERVAL)
}

fn default_subscriber_timeout() -> Duration {
    parse_default_duration(DEFAULT_SUBSCRIBER_TIMEOUT)
}

fn default_reap_interval() -> Duration {
    parse_default_duration(DEFAULT_REAP_INTERVAL)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            broker: default_broker(),
            bands: default_bands(),
            country: default_country(),
            mqtt_keep_alive: default_mqtt_keep_alive(),
            metrics_addrport: default_metrics_addrport(),
            spotlog_addrport: default_spotlog_addrport(),
            spotlog_retention: default_spotlog_retention(),
            dedup_ttl: default_dedup_ttl(),
            prune_probability: default_prune_probability(),
            stream_queue_capacity: default_stream_queue_capacity(),
            stream_poll_interval: default_stream_poll_interval(),
            stream_keepalive_interval: default_stream_keepalive_interval(),
            subscriber_timeout: default_subscriber_timeout(),
            reap_interval: default_reap_interval(),
            log_json: default_log_json(),
        }
    }
}

impl Config {
    /// Layered sources: built-in defaults, then the TOML file if it exists,
    /// then environment variables.
    pub fn figment(config_file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::raw().only(ENV_KEYS))
    }

    pub fn load_from_file(config_file: &Path) -> ConfigResult<Self> {
        let config = Self::from_figment(Self::figment(config_file))?;
        if config_file.exists() {
            info!("Configuration file merged: {}", config_file.display());
        }
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> ConfigResult<Self> {
        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.bands.is_empty() {
            return Err(ConfigError::invalid("bands", "at least one band is required"));
        }
        if !(0.0..=1.0).contains(&self.prune_probability) {
            return Err(ConfigError::invalid(
                "prune_probability",
                format!("{} is outside 0.0..=1.0", self.prune_probability),
            ));
        }
        if self.stream_queue_capacity == 0 {
            return Err(ConfigError::invalid(
                "stream_queue_capacity",
                "must be greater than zero",
            ));
        }
        for (field, value) in [
            ("stream_poll_interval", self.stream_poll_interval),
            ("stream_keepalive_interval", self.stream_keepalive_interval),
            ("reap_interval", self.reap_interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::invalid(field, "must be greater than zero"));
            }
        }
        if !self.mqtt_keep_alive.is_zero() && self.mqtt_keep_alive < Duration::from_secs(1) {
            return Err(ConfigError::invalid(
                "mqtt_keep_alive",
                "must be zero or at least one second",
            ));
        }
        self.broker_host_port()?;
        self.metrics_addr()?;
        self.spotlog_addr()?;
        Ok(())
    }

    /// Topic filters: per band, one for spots sent from the target country
    /// and one for spots received in it.
    pub fn topics(&self) -> Vec<String> {
        self.bands
            .iter()
            .flat_map(|band| {
                [
                    format!("pskr/filter/v2/{band}/+/+/+/+/+/{}/+", self.country),
                    format!("pskr/filter/v2/{band}/+/+/+/+/+/+/{}", self.country),
                ]
            })
            .collect()
    }

    /// Split `broker` into host and port, tolerating a `tcp://` or `mqtt://` scheme.
    pub fn broker_host_port(&self) -> ConfigResult<(String, u16)> {
        let address = self
            .broker
            .trim_start_matches("tcp://")
            .trim_start_matches("mqtt://");
        let invalid = || ConfigError::invalid("broker", format!("'{}' is not host:port", self.broker));
        let (host, port) = address.rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        Ok((host.to_string(), port))
    }

    pub fn metrics_addr(&self) -> ConfigResult<SocketAddr> {
        listen_addr("metrics_addrport", &self.metrics_addrport)
    }

    pub fn spotlog_addr(&self) -> ConfigResult<SocketAddr> {
        listen_addr("spotlog_addrport", &self.spotlog_addrport)
    }
}

/// Parse a listen address; `:8080` binds all interfaces.
fn listen_addr(field: &str, value: &str) -> ConfigResult<SocketAddr> {
    let candidate = if value.starts_with(':') {
        format!("0.0.0.0{value}")
    } else {
        value.to_string()
    };
    candidate
        .parse()
        .map_err(|e| ConfigError::invalid(field, format!("'{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.country, 224);
        assert_eq!(config.bands, vec!["6m", "4m", "2m", "70cm", "23cm"]);
        assert_eq!(config.spotlog_retention, Duration::from_secs(24 * 3600));
        assert_eq!(config.dedup_ttl, Duration::from_secs(60));
        assert_eq!(config.stream_poll_interval, Duration::from_millis(333));
        assert_eq!(
            config.spotlog_addr().unwrap(),
            "0.0.0.0:8080".parse::<SocketAddr>().unwrap()
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_topics_cover_both_directions() {
        let config = Config {
            bands: vec!["2m".to_string()],
            country: 224,
            ..Config::default()
        };
        assert_eq!(
            config.topics(),
            vec![
                "pskr/filter/v2/2m/+/+/+/+/+/224/+",
                "pskr/filter/v2/2m/+/+/+/+/+/+/224",
            ]
        );
    }

    #[test]
    fn test_broker_host_port() {
        let mut config = Config::default();
        assert_eq!(
            config.broker_host_port().unwrap(),
            ("mqtt.pskreporter.info".to_string(), 1883)
        );

        config.broker = "tcp://localhost:1884".to_string();
        assert_eq!(
            config.broker_host_port().unwrap(),
            ("localhost".to_string(), 1884)
        );

        config.broker = "localhost".to_string();
        assert!(config.broker_host_port().is_err());
    }

    #[test]
    fn test_environment_overrides() {
        Jail::expect_with(|jail| {
            jail.set_env("COUNTRY", "230");
            jail.set_env("BANDS", "2m,70cm");
            jail.set_env("SPOTLOG_RETENTION", "6h");
            jail.set_env("SPOTLOG_ADDRPORT", "127.0.0.1:9000");

            let config = Config::from_figment(Config::figment(Path::new("missing.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.country, 230);
            assert_eq!(config.bands, vec!["2m", "70cm"]);
            assert_eq!(config.spotlog_retention, Duration::from_secs(6 * 3600));
            assert_eq!(
                config.spotlog_addr().map_err(|e| e.to_string())?,
                "127.0.0.1:9000".parse::<SocketAddr>().unwrap()
            );
            Ok(())
        });
    }

    #[test]
    fn test_file_layer_below_environment() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "exporter.toml",
                r#"
                country = 100
                bands = ["6m"]
                stream_queue_capacity = 100
                "#,
            )?;
            jail.set_env("COUNTRY", "101");

            let config = Config::from_figment(Config::figment(Path::new("exporter.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.country, 101);
            assert_eq!(config.bands, vec!["6m"]);
            assert_eq!(config.stream_queue_capacity, 100);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = Config {
            prune_probability: 1.5,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            spotlog_addrport: "not-an-address".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
