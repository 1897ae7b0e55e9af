// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! MQTT transport for sessions

use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Outgoing,
    Packet, QoS,
};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use super::{BusLink, Connector, Delivery};
use crate::config::SessionConfig;
use crate::error::{Error, Result};

/// Result code reported when the broker could not be reached at all
pub const TRANSPORT_FAILURE: u8 = 0xFF;

const REQUEST_CAPACITY: usize = 100;

/// Opens rumqttc connections and runs each event loop on a tokio runtime
pub struct MqttConnector {
    runtime: Handle,
    qos: QoS,
}

impl MqttConnector {
    /// Connector spawning event loops on `runtime`
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            qos: QoS::AtMostOnce,
        }
    }

    /// Use `qos` for publishes and subscriptions
    pub fn with_qos(mut self, qos: QoS) -> Self {
        self.qos = qos;
        self
    }
}

impl Connector for MqttConnector {
    fn open(&self, config: &SessionConfig, delivery: Delivery) -> Result<Box<dyn BusLink>> {
        let options = mqtt_options(config);
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        self.runtime.spawn(run_event_loop(eventloop, delivery));

        Ok(Box::new(MqttLink {
            client,
            qos: self.qos,
        }))
    }
}

fn mqtt_options(config: &SessionConfig) -> MqttOptions {
    let mut options = MqttOptions::new(
        config.identity().as_str(),
        config.broker_address(),
        config.broker_port(),
    );

    options.set_keep_alive(config.keep_alive());
    options.set_clean_session(true);

    if let Some((username, password)) = config.credentials() {
        options.set_credentials(username, password);
    }

    options
}

/// Numeric connection result, 0 on success
fn return_code(code: ConnectReturnCode) -> u8 {
    code as u8
}

/// Drive one connection until it is closed or fails. Never reconnects.
async fn run_event_loop(mut eventloop: EventLoop, delivery: Delivery) {
    let mut connected = false;

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                connected = ack.code == ConnectReturnCode::Success;
                delivery.connection_result(return_code(ack.code));
                if !connected {
                    break;
                }
            }
            Ok(Event::Incoming(Packet::Publish(msg))) => {
                delivery.message(&msg.topic, &msg.payload);
            }
            Ok(Event::Incoming(Packet::SubAck(ack))) => {
                debug!("MQTT subscription acknowledged: {:?}", ack.return_codes);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("MQTT disconnect sent");
                break;
            }
            Ok(_) => {}
            Err(ConnectionError::ConnectionRefused(code)) => {
                delivery.connection_result(return_code(code));
                break;
            }
            Err(e) => {
                if connected {
                    delivery.connection_lost(&e.to_string());
                } else {
                    warn!("MQTT connection error: {}", e);
                    delivery.connection_result(TRANSPORT_FAILURE);
                }
                break;
            }
        }
    }

    info!("MQTT event loop finished");
}

/// Outbound requests on a live rumqttc client
struct MqttLink {
    client: AsyncClient,
    qos: QoS,
}

impl BusLink for MqttLink {
    fn subscribe(&self, filter: &str) -> Result<()> {
        self.client
            .try_subscribe(filter, self.qos)
            .map_err(|e| Error::Transport(format!("MQTT subscribe failed: {}", e)))
    }

    fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        self.client
            .try_publish(topic, self.qos, false, payload.to_vec())
            .map_err(|e| Error::Transport(format!("MQTT publish failed: {}", e)))
    }

    fn disconnect(&self) -> Result<()> {
        self.client
            .try_disconnect()
            .map_err(|e| Error::Transport(format!("MQTT disconnect failed: {}", e)))
    }
}
