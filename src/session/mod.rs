//! Message-broker session layer.
//!
//! The state machine talks to the broker through the [`SessionTransport`]
//! trait: connect/disconnect/subscribe/publish/ping commands plus a
//! non-blocking drain of inbound [`SessionEvent`]s. The trait exists so
//! the control loop can be driven against a scripted transport in tests;
//! the production implementation is [`MqttSession`] over rumqttc.

pub mod client;
pub mod events;

pub use client::MqttSession;
pub use events::{decode_remote, route_session_event, RemoteToggle, SessionEvent};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::config::ConnectionConfig;
use crate::resolve::ResolveError;

/// Session-layer failures, already translated from transport error codes.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("session connect failed: {0}")]
    ConnectFailed(String),
    #[error("session disconnect failed: {0}")]
    DisconnectFailed(String),
    #[error("subscribe request failed: {0}")]
    SubscribeFailed(String),
    #[error("publish request failed: {0}")]
    PublishFailed(String),
    #[error("no active session")]
    NotConnected,
}

/// Broker session commands and inbound event drain.
///
/// Contract notes:
/// - `connect` must leave nothing armed on failure — a failed attempt
///   never delivers events later.
/// - `disconnect` is best-effort; callers perform their own session-down
///   bookkeeping whether or not it succeeds.
/// - `poll` never blocks; it drains whatever the transport has queued.
/// - `keepalive_time_left` must be cheap enough to call every tick, since
///   the transport does not push expiry notifications.
#[async_trait]
pub trait SessionTransport: Send {
    async fn connect(&mut self, config: &ConnectionConfig) -> Result<(), SessionError>;

    async fn disconnect(&mut self) -> Result<(), SessionError>;

    /// Subscribe to the single configured topic, at-most-once delivery.
    async fn subscribe(&mut self, topic: &str) -> Result<(), SessionError>;

    /// Publish at-most-once, no retain flag.
    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), SessionError>;

    /// Drain pending inbound events without blocking.
    fn poll(&mut self) -> Vec<SessionEvent>;

    /// Time until the keepalive deadline expires.
    fn keepalive_time_left(&self) -> Duration;

    /// Send a liveness probe.
    async fn ping(&mut self) -> Result<(), SessionError>;
}
