//! Mock implementations for testing.
//!
//! Each mock shares its interior behind `Arc<Mutex<..>>` and is `Clone`,
//! so a test can hand one to the controller and keep a handle for
//! scripting events and inspecting what the controller did.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::ConnectionConfig;
use crate::link::{LinkError, LinkEvent, LinkManager};
use crate::presentation::{PresentationEvent, Presenter};
use crate::session::{SessionError, SessionEvent, SessionTransport};

/// Scripted session transport.
#[derive(Debug, Clone, Default)]
pub struct MockSession {
    events: Arc<Mutex<VecDeque<SessionEvent>>>,
    connects: Arc<Mutex<usize>>,
    disconnects: Arc<Mutex<usize>>,
    subscribes: Arc<Mutex<Vec<String>>>,
    publishes: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    pings: Arc<Mutex<usize>>,
    keepalive_left: Arc<Mutex<Duration>>,
    fail_connect: bool,
    fail_disconnect: bool,
    fail_subscribe: bool,
    fail_publish: bool,
}

impl MockSession {
    pub fn new() -> Self {
        let session = Self::default();
        *session.keepalive_left.lock().unwrap() = Duration::from_secs(60);
        session
    }

    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn failing_disconnect(mut self) -> Self {
        self.fail_disconnect = true;
        self
    }

    pub fn failing_subscribe(mut self) -> Self {
        self.fail_subscribe = true;
        self
    }

    pub fn failing_publish(mut self) -> Self {
        self.fail_publish = true;
        self
    }

    pub fn with_keepalive_left(self, left: Duration) -> Self {
        *self.keepalive_left.lock().unwrap() = left;
        self
    }

    /// Queue an inbound event for the next `poll`.
    pub fn push_event(&self, event: SessionEvent) {
        self.events.lock().unwrap().push_back(event);
    }

    pub fn connect_calls(&self) -> usize {
        *self.connects.lock().unwrap()
    }

    pub fn disconnect_calls(&self) -> usize {
        *self.disconnects.lock().unwrap()
    }

    pub fn subscribed_topics(&self) -> Vec<String> {
        self.subscribes.lock().unwrap().clone()
    }

    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.publishes.lock().unwrap().clone()
    }

    pub fn ping_calls(&self) -> usize {
        *self.pings.lock().unwrap()
    }
}

#[async_trait]
impl SessionTransport for MockSession {
    async fn connect(&mut self, _config: &ConnectionConfig) -> Result<(), SessionError> {
        *self.connects.lock().unwrap() += 1;
        if self.fail_connect {
            return Err(SessionError::ConnectFailed("mock connect failure".into()));
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), SessionError> {
        *self.disconnects.lock().unwrap() += 1;
        // Pending events die with the session either way.
        self.events.lock().unwrap().clear();
        if self.fail_disconnect {
            return Err(SessionError::DisconnectFailed(
                "mock disconnect failure".into(),
            ));
        }
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), SessionError> {
        if self.fail_subscribe {
            return Err(SessionError::SubscribeFailed("mock subscribe failure".into()));
        }
        self.subscribes.lock().unwrap().push(topic.to_string());
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), SessionError> {
        if self.fail_publish {
            return Err(SessionError::PublishFailed("mock publish failure".into()));
        }
        self.publishes
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    fn poll(&mut self) -> Vec<SessionEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }

    fn keepalive_time_left(&self) -> Duration {
        *self.keepalive_left.lock().unwrap()
    }

    async fn ping(&mut self) -> Result<(), SessionError> {
        *self.pings.lock().unwrap() += 1;
        // A probe counts as traffic: reset the window like a real
        // transport would.
        *self.keepalive_left.lock().unwrap() = Duration::from_secs(60);
        Ok(())
    }
}

/// Scripted link manager.
#[derive(Debug, Clone, Default)]
pub struct MockLink {
    pending: Arc<Mutex<VecDeque<LinkEvent>>>,
    connects: Arc<Mutex<Vec<(String, String)>>>,
    disconnects: Arc<Mutex<usize>>,
    auto_up: bool,
    fail_connect: bool,
    fail_disconnect: bool,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with link events already queued.
    pub fn with_events(events: impl IntoIterator<Item = LinkEvent>) -> Self {
        let link = Self::default();
        link.pending.lock().unwrap().extend(events);
        link
    }

    /// Make every accepted connect request queue an `Up` event, like a
    /// link layer that associates instantly.
    pub fn auto_up(mut self) -> Self {
        self.auto_up = true;
        self
    }

    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn failing_disconnect(mut self) -> Self {
        self.fail_disconnect = true;
        self
    }

    pub fn push_event(&self, event: LinkEvent) {
        self.pending.lock().unwrap().push_back(event);
    }

    pub fn connect_requests(&self) -> Vec<(String, String)> {
        self.connects.lock().unwrap().clone()
    }

    pub fn disconnect_calls(&self) -> usize {
        *self.disconnects.lock().unwrap()
    }
}

impl LinkManager for MockLink {
    fn connect(&mut self, network_id: &str, network_secret: &str) -> Result<(), LinkError> {
        if self.fail_connect {
            return Err(LinkError::ConnectFailed("mock link failure".into()));
        }
        self.connects
            .lock()
            .unwrap()
            .push((network_id.to_string(), network_secret.to_string()));
        if self.auto_up {
            self.pending.lock().unwrap().push_back(LinkEvent::Up);
        }
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), LinkError> {
        *self.disconnects.lock().unwrap() += 1;
        if self.fail_disconnect {
            return Err(LinkError::DisconnectFailed("mock link failure".into()));
        }
        self.pending.lock().unwrap().push_back(LinkEvent::Down);
        Ok(())
    }

    fn poll(&mut self) -> Vec<LinkEvent> {
        self.pending.lock().unwrap().drain(..).collect()
    }
}

/// Presenter that records every event it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingPanel {
    events: Arc<Mutex<Vec<PresentationEvent>>>,
}

impl RecordingPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PresentationEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Count occurrences of one exact event.
    pub fn count_of(&self, event: PresentationEvent) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| **e == event)
            .count()
    }
}

impl Presenter for RecordingPanel {
    fn present(&mut self, event: PresentationEvent) {
        self.events.lock().unwrap().push(event);
    }
}
