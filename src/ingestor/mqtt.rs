//! MQTT transport for the PSK Reporter feed.
//!
//! One event loop task: (re)subscribes on every ConnAck, hands each publish
//! to the [`Ingestor`], and backs off with jitter while the broker is
//! unreachable. Polling the event loop again after an error reconnects.

use rand::{Rng, rng};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, SubscribeFilter};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{IngestOutcome, Ingestor};
use crate::config::Config;
use crate::errors::{IngestError, IngestResult};

const REQUEST_CHANNEL_CAPACITY: usize = 64;
const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(60);

/// Capped exponential backoff with +/-15% jitter
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            current: base,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay.mul_f64(rng().random_range(0.85..1.15))
    }

    pub fn reset(&mut self) {
        self.current = self.base;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BACKOFF_BASE, BACKOFF_MAX)
    }
}

pub struct MqttSubscriber {
    host: String,
    port: u16,
    keep_alive: Duration,
    topics: Vec<String>,
}

impl MqttSubscriber {
    pub fn from_config(config: &Config) -> IngestResult<Self> {
        let (host, port) = config
            .broker_host_port()
            .map_err(|_| IngestError::BrokerAddress {
                address: config.broker.clone(),
            })?;
        Ok(Self {
            host,
            port,
            keep_alive: config.mqtt_keep_alive,
            topics: config.topics(),
        })
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    fn connect(&self) -> (AsyncClient, EventLoop) {
        let client_id = format!("pskreporter-exporter-{}", Uuid::new_v4().simple());
        let mut options = MqttOptions::new(client_id, self.host.clone(), self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY)
    }

    fn subscribe_all(&self, client: &AsyncClient) -> IngestResult<()> {
        let filters = self
            .topics
            .iter()
            .map(|topic| SubscribeFilter::new(topic.clone(), QoS::AtMostOnce));
        client.try_subscribe_many(filters)?;
        Ok(())
    }

    /// Drive the event loop until `cancel` fires
    pub async fn run(self, ingestor: Ingestor, cancel: CancellationToken) -> IngestResult<()> {
        let (client, mut eventloop) = self.connect();
        let mut backoff = Backoff::default();

        info!(
            broker = %format!("{}:{}", self.host, self.port),
            topics = self.topics.len(),
            "Starting MQTT subscriber"
        );

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = eventloop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    backoff.reset();
                    info!("Connected to MQTT broker, subscribing");
                    if let Err(e) = self.subscribe_all(&client) {
                        warn!(error = %e, "Failed to queue subscriptions");
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let outcome = ingestor.handle_message(&publish.topic, &publish.payload);
                    if let IngestOutcome::Recorded(classification) = outcome {
                        debug!(
                            topic = %publish.topic,
                            classification = classification.as_str(),
                            "Spot recorded"
                        );
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    debug!(pkid = ack.pkid, codes = ?ack.return_codes, "Subscription acknowledged");
                }
                Ok(_) => {}
                Err(e) => {
                    let delay = backoff.next_delay();
                    warn!(error = %e, retry_in = ?delay, "MQTT connection error");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        info!("MQTT subscriber stopping");
        if let Err(e) = client.try_disconnect() {
            debug!(error = %e, "Disconnect request not queued");
        }
        Ok(())
    }
}
