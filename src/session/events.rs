//! Pure event translation for the broker session.
//!
//! Everything here is a pure function over transport events, so the
//! routing and payload policy can be tested without a broker.

use rumqttc::v5::mqttbytes::v5::{ConnectReturnCode, Packet, SubscribeReasonCode};
use rumqttc::v5::Event;
use tracing::{debug, warn};

/// Session-level signals the state machine consumes, translated from the
/// broker transport's own event vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Broker accepted the session (CONNACK success).
    Accepted,
    /// Broker refused the session (CONNACK failure).
    Rejected { reason: String },
    /// Broker answered the subscription request.
    SubscribeAcked { failed: bool },
    /// A message arrived on some subscribed topic.
    Message { topic: String, payload: Vec<u8> },
    /// The session is gone — broker disconnect or transport failure.
    Disconnected { reason: String },
}

/// Remote instruction decoded from a toggle-topic payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteToggle {
    Off,
    On,
}

/// Translate a raw transport event into a session event, if it carries
/// one. Infrastructure traffic (ping responses, acks for our own QoS-0
/// publishes, outgoing packets) maps to `None`.
pub fn route_session_event(event: &Event) -> Option<SessionEvent> {
    match event {
        Event::Incoming(packet) => match packet {
            Packet::ConnAck(ack) => {
                if ack.code == ConnectReturnCode::Success {
                    Some(SessionEvent::Accepted)
                } else {
                    Some(SessionEvent::Rejected {
                        reason: format!("{:?}", ack.code),
                    })
                }
            }
            Packet::SubAck(ack) => {
                let failed = ack.return_codes.iter().any(|code| {
                    !matches!(code, SubscribeReasonCode::Success(_))
                });
                Some(SessionEvent::SubscribeAcked { failed })
            }
            Packet::Publish(publish) => Some(SessionEvent::Message {
                topic: String::from_utf8_lossy(&publish.topic).to_string(),
                payload: publish.payload.to_vec(),
            }),
            Packet::Disconnect(disconnect) => Some(SessionEvent::Disconnected {
                reason: format!("{:?}", disconnect.reason_code),
            }),
            _ => None,
        },
        Event::Outgoing(_) => None,
    }
}

/// Apply the wire contract to an inbound message.
///
/// The contract with the counterpart publisher is fixed: messages arrive
/// on exactly the configured topic and carry exactly one byte, `'0'` or
/// `'1'`. Anything else is a protocol anomaly — logged and dropped, never
/// escalated to a state change.
pub fn decode_remote(expected_topic: &str, topic: &str, payload: &[u8]) -> Option<RemoteToggle> {
    if topic != expected_topic {
        debug!(topic, "ignoring message on unknown topic");
        return None;
    }
    if payload.len() != 1 {
        warn!(len = payload.len(), "unexpected payload length, dropping");
        return None;
    }
    match payload[0] {
        b'0' => Some(RemoteToggle::Off),
        b'1' => Some(RemoteToggle::On),
        other => {
            warn!(byte = other, "unknown payload value, dropping");
            None
        }
    }
}
