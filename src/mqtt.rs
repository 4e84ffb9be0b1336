//! # MQTT transport over `rumqttc`.
//!
//! [`MqttTransport`] adapts rumqttc's client/event-loop pair to the
//! [`Transport`] contract the supervisor loop drives:
//!
//! - `connect` rebuilds the client and event loop from scratch and
//!   re-subscribes to the config and command topics, so a reconnect after a
//!   broker outage starts from a clean session;
//! - `publish` enqueues the payload and briefly drives the event loop so the
//!   packet actually leaves the socket before the call returns;
//! - `poll` drains whatever inbound publishes are ready without parking the
//!   caller, bounded both by a per-packet timeout and a batch cap.
//!
//! The event loop is only ever advanced inside these methods; nothing runs
//! between calls, matching the single-loop design of the agent.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::identity::DeviceIdentity;
use crate::transport::{Inbound, Transport};

/// Most inbound packets drained per [`Transport::poll`] call.
const POLL_BUDGET: usize = 16;

/// How long a single `poll` waits for the next packet before concluding the
/// broker has nothing ready.
const POLL_STEP: Duration = Duration::from_millis(25);

/// How long `publish` drives the event loop to flush the outgoing packet.
const FLUSH_WINDOW: Duration = Duration::from_millis(100);

struct Link {
    client: AsyncClient,
    eventloop: EventLoop,
}

/// rumqttc-backed [`Transport`].
pub struct MqttTransport {
    options: MqttOptions,
    subscriptions: Vec<String>,
    link: Option<Link>,
}

impl MqttTransport {
    /// Builds an unconnected transport addressing the given broker,
    /// subscribed (once connected) to the device's inbound topics.
    pub fn new(client_id: &str, host: &str, port: u16, identity: &DeviceIdentity) -> Self {
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(30));
        Self {
            options,
            subscriptions: vec![identity.config_topic(), identity.command_topic()],
            link: None,
        }
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.options.set_credentials(username, password);
        self
    }

    /// Drives the event loop until `window` elapses or an error surfaces.
    /// Used to flush outgoing packets enqueued by the client.
    async fn drive_for(&mut self, window: Duration) -> Result<(), TransportError> {
        let Some(link) = self.link.as_mut() else {
            return Err(TransportError::NotConnected);
        };
        let deadline = tokio::time::Instant::now() + window;
        loop {
            match tokio::time::timeout_at(deadline, link.eventloop.poll()).await {
                Err(_) => return Ok(()), // window spent, packet is on the wire
                Ok(Ok(event)) => debug!(?event, "mqtt event while flushing"),
                Ok(Err(e)) => {
                    self.link = None;
                    return Err(TransportError::Poll(e.to_string()));
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl Transport for MqttTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        // Fresh client and event loop per attempt; half-open state from a
        // previous link must not leak into the new one.
        let (client, mut eventloop) = AsyncClient::new(self.options.clone(), 20);

        // Drive until the broker acknowledges the connection.
        loop {
            match tokio::time::timeout(Duration::from_secs(10), eventloop.poll()).await {
                Err(_) => return Err(TransportError::Connect("connack timeout".into())),
                Ok(Err(e)) => return Err(TransportError::Connect(e.to_string())),
                Ok(Ok(Event::Incoming(Packet::ConnAck(_)))) => break,
                Ok(Ok(event)) => debug!(?event, "mqtt event while connecting"),
            }
        }

        for topic in &self.subscriptions {
            client
                .subscribe(topic, QoS::AtLeastOnce)
                .await
                .map_err(|e| TransportError::Connect(format!("subscribe {topic}: {e}")))?;
        }
        self.link = Some(Link { client, eventloop });

        // Let the subscriptions flush before the first poll.
        self.drive_for(FLUSH_WINDOW).await
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        let Some(link) = self.link.as_ref() else {
            return Err(TransportError::NotConnected);
        };
        link.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| TransportError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;
        self.drive_for(FLUSH_WINDOW).await
    }

    async fn poll(&mut self) -> Result<Vec<Inbound>, TransportError> {
        let Some(link) = self.link.as_mut() else {
            return Err(TransportError::NotConnected);
        };
        let mut batch = Vec::new();
        while batch.len() < POLL_BUDGET {
            match tokio::time::timeout(POLL_STEP, link.eventloop.poll()).await {
                Err(_) => break, // nothing ready
                Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => {
                    batch.push(Inbound {
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                    });
                }
                Ok(Ok(event)) => debug!(?event, "mqtt event"),
                Ok(Err(e)) => {
                    warn!("mqtt event loop error: {e}");
                    self.link = None;
                    return Err(TransportError::Poll(e.to_string()));
                }
            }
        }
        Ok(batch)
    }
}
