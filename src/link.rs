//! Network link layer boundary.
//!
//! The controller only needs two things from the link layer: a way to ask
//! for an association (connect/disconnect) and a stream of up/down
//! notifications. Everything else about link management is the
//! collaborator's business. [`LinkMonitor`] folds the notifications into
//! the current up/down boolean the state machine reads each tick.

use thiserror::Error;
use tracing::debug;

/// Asynchronous link notifications, drained once per loop tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Up,
    Down,
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("link connect rejected: {0}")]
    ConnectFailed(String),
    #[error("link disconnect failed: {0}")]
    DisconnectFailed(String),
}

/// Commands and notifications for the underlying network link.
pub trait LinkManager: Send {
    /// Ask the link layer to associate using the stored credentials.
    /// Success means the request was accepted, not that the link is up;
    /// an [`LinkEvent::Up`] arrives later via [`LinkManager::poll`].
    fn connect(&mut self, network_id: &str, network_secret: &str) -> Result<(), LinkError>;

    /// Ask the link layer to drop the association.
    fn disconnect(&mut self) -> Result<(), LinkError>;

    /// Drain pending link notifications without blocking.
    fn poll(&mut self) -> Vec<LinkEvent>;
}

/// Wraps a [`LinkManager`] and tracks the current up/down state.
#[derive(Debug)]
pub struct LinkMonitor<L> {
    manager: L,
    up: bool,
}

impl<L: LinkManager> LinkMonitor<L> {
    pub fn new(manager: L) -> Self {
        Self { manager, up: false }
    }

    pub fn is_up(&self) -> bool {
        self.up
    }

    pub fn connect(&mut self, network_id: &str, network_secret: &str) -> Result<(), LinkError> {
        self.manager.connect(network_id, network_secret)
    }

    pub fn disconnect(&mut self) -> Result<(), LinkError> {
        self.manager.disconnect()
    }

    /// Drain pending notifications, updating the cached up/down boolean.
    pub fn poll_changes(&mut self) -> Vec<LinkEvent> {
        let events = self.manager.poll();
        for event in &events {
            self.up = matches!(event, LinkEvent::Up);
        }
        events
    }
}

/// Link manager for hosted builds, where the operating system owns the
/// physical network. A connect request reports up immediately; there is
/// no association to wait on.
#[derive(Debug, Default)]
pub struct HostLink {
    pending: Vec<LinkEvent>,
}

impl HostLink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LinkManager for HostLink {
    fn connect(&mut self, network_id: &str, _network_secret: &str) -> Result<(), LinkError> {
        debug!(network_id, "host link: connect requested, reporting up");
        self.pending.push(LinkEvent::Up);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), LinkError> {
        debug!("host link: disconnect requested, reporting down");
        self.pending.push(LinkEvent::Down);
        Ok(())
    }

    fn poll(&mut self) -> Vec<LinkEvent> {
        std::mem::take(&mut self.pending)
    }
}
