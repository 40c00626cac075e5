//! Connectivity state enumeration.
//!
//! The variants form a single total order, strictly increasing along the
//! happy path from no-connectivity up to ready-for-toggling. The order is
//! load-bearing: session maintenance and several guards compare states
//! with `>=`, so the derive of `Ord` and the variant order below are part
//! of the contract, not a convenience.

use std::fmt;

/// Layered connectivity state, from link-down to application-ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConnectivityState {
    /// No link; waiting for a button press to initiate a connection.
    LinkDown,
    /// Link attempt or association failed; waiting for operator recovery.
    LinkError,
    /// Waiting for the link layer to come up.
    LinkConnecting,
    /// Link up; broker session not attempted yet.
    LinkUp,
    /// Session attempt or established session failed; waiting for
    /// operator recovery.
    SessionError,
    /// Waiting for the broker to accept the session.
    SessionConnecting,
    /// Session accepted; subscription not issued yet.
    SessionAccepted,
    /// Waiting for the broker to acknowledge the subscription.
    SubscribePending,
    /// Subscribed; retained-value fetch not issued yet.
    Subscribed,
    /// Fully up: local input flips the toggle, remote messages set it.
    Ready,
}

impl ConnectivityState {
    /// Every state, in protocol order. Used by table-driven tests.
    pub const ALL: [ConnectivityState; 10] = [
        ConnectivityState::LinkDown,
        ConnectivityState::LinkError,
        ConnectivityState::LinkConnecting,
        ConnectivityState::LinkUp,
        ConnectivityState::SessionError,
        ConnectivityState::SessionConnecting,
        ConnectivityState::SessionAccepted,
        ConnectivityState::SubscribePending,
        ConnectivityState::Subscribed,
        ConnectivityState::Ready,
    ];

    /// A broker session is being set up, is up, or is partially up —
    /// session maintenance (event drain, keepalive) must run.
    pub fn is_session_active(self) -> bool {
        self >= ConnectivityState::SessionConnecting
    }

    /// A link attempt has at least been started.
    pub fn is_link_started(self) -> bool {
        self >= ConnectivityState::LinkConnecting
    }

    /// Human-readable status for the display surface. Error texts name
    /// the remedy category without guessing at the root cause.
    pub fn status_text(self) -> &'static str {
        match self {
            ConnectivityState::LinkDown => "Press the button\nto connect",
            ConnectivityState::LinkError => "Network error\n(check settings)",
            ConnectivityState::LinkConnecting => "Connecting...",
            ConnectivityState::LinkUp => "Network up",
            ConnectivityState::SessionError => "Broker error\n(check settings)",
            ConnectivityState::SessionConnecting => "Contacting broker...",
            ConnectivityState::SessionAccepted => "Broker session open",
            ConnectivityState::SubscribePending => "Subscribing...",
            ConnectivityState::Subscribed => "Subscribed",
            ConnectivityState::Ready => "Ready",
        }
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
