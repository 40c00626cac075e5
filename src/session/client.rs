//! MQTT implementation of the session transport.
//!
//! Wraps a rumqttc async client plus a background event-pump task. The
//! pump's only job is translation: it polls the rumqttc event loop,
//! routes each event through [`route_session_event`], and queues the
//! result on a channel the control loop drains synchronously. All state
//! decisions stay in the control loop — the pump never touches them.
//!
//! There is deliberately no reconnection supervisor here: when the event
//! loop errors, the pump reports `Disconnected` once and stops. Recovery
//! is an explicit operator action, which keeps the device's behavior
//! predictable from its current state plus the next command.

use rumqttc::v5::{AsyncClient, EventLoop, MqttOptions};
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::Transport as RumqttcTransport;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use super::events::{route_session_event, SessionEvent};
use super::{SessionError, SessionTransport};
use crate::config::ConnectionConfig;
use crate::resolve::{broker_port, resolve_broker_addr};

/// Keep-alive interval negotiated with the broker.
const KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Broker session over MQTT.
pub struct MqttSession {
    client: Option<AsyncClient>,
    events_rx: Option<mpsc::Receiver<SessionEvent>>,
    shutdown_tx: Option<watch::Sender<bool>>,
    pump: Option<JoinHandle<()>>,
    last_activity: Arc<Mutex<Instant>>,
}

impl MqttSession {
    pub fn new() -> Self {
        Self {
            client: None,
            events_rx: None,
            shutdown_tx: None,
            pump: None,
            last_activity: Arc::new(Mutex::new(Instant::now())),
        }
    }

    fn touch(&self) {
        if let Ok(mut guard) = self.last_activity.lock() {
            *guard = Instant::now();
        }
    }

    /// Stop the pump and drop the client. Safe to call repeatedly; used
    /// both for orderly disconnects and to clear a failed session before
    /// a fresh connect.
    async fn teardown(&mut self) {
        self.client = None;
        self.events_rx = None;
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(mut handle) = self.pump.take() {
            match tokio::time::timeout(Duration::from_secs(2), &mut handle).await {
                Ok(_) => debug!("session event pump stopped"),
                Err(_) => {
                    warn!("session event pump did not stop in time, aborting");
                    handle.abort();
                }
            }
        }
    }
}

impl Default for MqttSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SessionTransport for MqttSession {
    async fn connect(&mut self, config: &ConnectionConfig) -> Result<(), SessionError> {
        // A prior failed session may still hold a dead pump.
        self.teardown().await;

        let host = config.broker_host.as_str();

        // Resolve before arming anything, so a bad hostname or missing
        // resolver fails here with its own error. The transport performs
        // its own lookup for the actual connection (TLS verification
        // needs the hostname, not the address).
        let addr = resolve_broker_addr(host, config.use_tls).await?;
        debug!(%addr, "broker address preflight ok");

        // Unique client id per connect attempt, so a half-dead prior
        // session can't bump the new one off the broker.
        let client_id = format!("iotoggle-{}", Uuid::new_v4().simple());
        let mut options = MqttOptions::new(client_id, host, broker_port(config.use_tls));
        options.set_keep_alive(KEEP_ALIVE);
        if !config.broker_user.is_empty() {
            options.set_credentials(config.broker_user.as_str(), config.broker_pass.as_str());
        }
        if config.use_tls {
            options.set_transport(RumqttcTransport::tls_with_default_config());
        }

        let (client, event_loop) = AsyncClient::new(options, 10);
        let (events_tx, events_rx) = mpsc::channel(64);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        self.touch();
        let handle = tokio::spawn(run_pump(
            event_loop,
            events_tx,
            shutdown_rx,
            self.last_activity.clone(),
        ));

        self.client = Some(client);
        self.events_rx = Some(events_rx);
        self.shutdown_tx = Some(shutdown_tx);
        self.pump = Some(handle);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), SessionError> {
        let result = match self.client.take() {
            Some(client) => client
                .disconnect()
                .await
                .map_err(|e| SessionError::DisconnectFailed(e.to_string())),
            None => Err(SessionError::NotConnected),
        };
        // Local teardown happens whether or not the wire disconnect
        // worked; the caller must never stay armed on a dead session.
        self.teardown().await;
        result
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), SessionError> {
        let client = self.client.as_ref().ok_or(SessionError::NotConnected)?;
        client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .map_err(|e| SessionError::SubscribeFailed(e.to_string()))?;
        self.touch();
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), SessionError> {
        let client = self.client.as_ref().ok_or(SessionError::NotConnected)?;
        client
            .publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .await
            .map_err(|e| SessionError::PublishFailed(e.to_string()))?;
        self.touch();
        Ok(())
    }

    fn poll(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if let Some(rx) = &mut self.events_rx {
            while let Ok(event) = rx.try_recv() {
                events.push(event);
            }
        }
        events
    }

    fn keepalive_time_left(&self) -> Duration {
        let elapsed = self
            .last_activity
            .lock()
            .map(|guard| guard.elapsed())
            .unwrap_or_default();
        KEEP_ALIVE.saturating_sub(elapsed)
    }

    async fn ping(&mut self) -> Result<(), SessionError> {
        if self.client.is_none() {
            return Err(SessionError::NotConnected);
        }
        // rumqttc's event loop owns PINGREQ scheduling; its client API
        // has no manual ping request. Refresh the local deadline so the
        // margin check doesn't re-fire every tick while the library's
        // own keepalive timer is running.
        self.touch();
        trace!("keepalive probe delegated to transport event loop");
        Ok(())
    }
}

impl Drop for MqttSession {
    fn drop(&mut self) {
        if let Some(tx) = &self.shutdown_tx {
            let _ = tx.send(true);
        }
        if let Some(handle) = self.pump.take() {
            handle.abort();
        }
    }
}

/// Background translation task: transport events in, session events out.
async fn run_pump(
    mut event_loop: EventLoop,
    events: mpsc::Sender<SessionEvent>,
    mut shutdown: watch::Receiver<bool>,
    last_activity: Arc<Mutex<Instant>>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            polled = event_loop.poll() => match polled {
                Ok(event) => {
                    if let Ok(mut guard) = last_activity.lock() {
                        *guard = Instant::now();
                    }
                    if let Some(session_event) = route_session_event(&event) {
                        if events.send(session_event).await.is_err() {
                            break;
                        }
                    }
                }
                Err(err) => {
                    warn!(error = %err, "session transport error");
                    let _ = events
                        .send(SessionEvent::Disconnected {
                            reason: err.to_string(),
                        })
                        .await;
                    // No automatic reconnect: report once and stop.
                    break;
                }
            }
        }
    }
    debug!("session event pump exited");
}
