//! Connectivity state machine and control loop.
//!
//! [`Controller`] is the single authority over [`ConnectivityState`] and
//! [`ToggleValue`]: every mutation of either happens inside [`Controller::tick`]
//! or a command method, all of which run on the owning loop task. Link and
//! session collaborators never write state — they queue events that the
//! tick drains at fixed points, so there is no concurrent writer and no
//! locking.
//!
//! One tick performs, in this fixed order:
//!
//! 1. drain link notifications (link loss aborts any in-flight session);
//! 2. presentation sync if the state changed since the last tick;
//! 3. session maintenance while a session is active: drain transport
//!    events, probe the keepalive inside its safety margin;
//! 4. push-forward ratchet: the newest state's single outbound action
//!    (connect / subscribe / retained-value fetch);
//! 5. local activation handling;
//! 6. remote toggle instructions (these win same-tick collisions with
//!    step 5 — the ordering is the tie-break, and it is deliberate);
//! 7. toggle presentation sync.
//!
//! Error states are never retried automatically. The only paths out of
//! `LinkError` / `SessionError` are a button press or an explicit
//! command, which keeps behavior predictable from the current state plus
//! the next input.

pub mod state;
pub mod toggle;

pub use state::ConnectivityState;
pub use toggle::ToggleValue;

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{BoundedStr, ConfigError, ConnectionConfig};
use crate::error::DeviceError;
use crate::link::{LinkEvent, LinkManager, LinkMonitor};
use crate::presentation::{PresentationEvent, Presenter};
use crate::session::{decode_remote, RemoteToggle, SessionEvent, SessionTransport};
use crate::settings::SettingsStore;
use crate::url::BrokerUrl;

/// Probe the session keepalive when the deadline is within this margin.
pub const KEEPALIVE_MARGIN: Duration = Duration::from_millis(5000);

/// Status shown when a session is requested without a valid broker config.
pub const MSG_NOT_CONFIGURED: &str = "No broker URL set\n(check settings)";

/// Topic for the retained-value fetch convention: publishing an empty
/// payload to `<topic>/get` asks the counterpart to re-send the last
/// value, standing in for protocol-level retention.
pub fn retained_fetch_topic(topic: &str) -> String {
    format!("{topic}/get")
}

/// Operator commands, one per serial-shell verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    LinkUp,
    LinkDown,
    SessionUp,
    SessionDown,
    ReloadConfig,
}

/// The device control loop. Generic over its three collaborators so tests
/// can drive it against scripted implementations.
pub struct Controller<S, L, P> {
    session: S,
    link: LinkMonitor<L>,
    presenter: P,
    settings: SettingsStore,
    config: ConnectionConfig,
    state: ConnectivityState,
    presented_state: ConnectivityState,
    acted_state: ConnectivityState,
    toggle: ToggleValue,
    observed_toggle: ToggleValue,
    input_pending: bool,
    got_off: bool,
    got_on: bool,
}

impl<S, L, P> Controller<S, L, P>
where
    S: SessionTransport,
    L: LinkManager,
    P: Presenter,
{
    pub fn new(session: S, link: L, presenter: P, settings: SettingsStore) -> Self {
        let mut controller = Self {
            session,
            link: LinkMonitor::new(link),
            presenter,
            settings,
            config: ConnectionConfig::default(),
            state: ConnectivityState::LinkDown,
            presented_state: ConnectivityState::LinkDown,
            acted_state: ConnectivityState::LinkDown,
            toggle: ToggleValue::Unknown,
            observed_toggle: ToggleValue::Unknown,
            input_pending: false,
            got_off: false,
            got_on: false,
        };
        // Initial display contents, before the first tick runs.
        controller
            .presenter
            .present(PresentationEvent::SetLinkIcon(false));
        controller.presenter.present(PresentationEvent::ShowMessage(
            ConnectivityState::LinkDown.status_text(),
        ));
        controller
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    pub fn toggle(&self) -> ToggleValue {
        self.toggle
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ConnectionConfig {
        &mut self.config
    }

    /// Inter-tick sleep, dictated by the presentation layer.
    pub fn holdoff(&self) -> Duration {
        self.presenter.holdoff()
    }

    /// Record a local activation (button press). Consumed by the next
    /// tick; pressing twice between ticks is one press.
    pub fn press(&mut self) {
        self.input_pending = true;
    }

    /// One pass of the control loop.
    pub async fn tick(&mut self) {
        self.observe_link().await;
        self.sync_state_presentation();
        self.maintain_session().await;
        self.advance().await;
        self.handle_input().await;
        self.apply_remote();
        self.sync_toggle_presentation();
    }

    /// Step 1: link notifications. Link loss while a session is in flight
    /// bypasses the normal advance switch — the session is aborted here,
    /// before any session event could be processed on a stale link-up
    /// assumption.
    async fn observe_link(&mut self) {
        for event in self.link.poll_changes() {
            match event {
                LinkEvent::Up => {
                    if !self.state.is_session_active() {
                        info!("link up");
                        self.state = ConnectivityState::LinkUp;
                    }
                }
                LinkEvent::Down => {
                    if self.state.is_session_active() {
                        warn!("link lost with session active, aborting session");
                        self.abort_session().await;
                        self.state = ConnectivityState::LinkError;
                    } else if self.state.is_link_started() {
                        warn!("link lost");
                        self.state = ConnectivityState::LinkError;
                    }
                }
            }
        }
    }

    /// Step 2: exactly one state-describing presentation per change.
    fn sync_state_presentation(&mut self) {
        if self.presented_state == self.state {
            return;
        }
        self.presented_state = self.state;
        info!(state = %self.state, "connectivity state changed");
        match self.state {
            ConnectivityState::LinkDown | ConnectivityState::LinkError => {
                self.presenter.present(PresentationEvent::SetLinkIcon(false));
                self.presenter
                    .present(PresentationEvent::ShowMessage(self.state.status_text()));
            }
            ConnectivityState::LinkUp => {
                self.presenter.present(PresentationEvent::SetLinkIcon(true));
                self.presenter
                    .present(PresentationEvent::ShowMessage(self.state.status_text()));
            }
            ConnectivityState::Ready => {
                // The cached value can't be trusted without re-reading
                // the topic, so every entry into Ready forgets it. The
                // widget is parked off until a real value arrives.
                self.toggle = ToggleValue::Unknown;
                self.observed_toggle = ToggleValue::Unknown;
                self.presenter.present(PresentationEvent::SetToggle(false));
                self.presenter.present(PresentationEvent::ShowToggle);
            }
            other => {
                self.presenter
                    .present(PresentationEvent::ShowMessage(other.status_text()));
            }
        }
    }

    /// Step 3: session maintenance. Runs every tick while a session is
    /// active; the event drain and the keepalive check are independent.
    async fn maintain_session(&mut self) {
        if !self.state.is_session_active() {
            return;
        }

        for event in self.session.poll() {
            self.apply_session_event(event);
        }

        if self.session.keepalive_time_left() <= KEEPALIVE_MARGIN {
            if let Err(err) = self.session.ping().await {
                warn!(error = %err, "keepalive probe failed");
            }
        }
    }

    fn apply_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Accepted => {
                if self.state == ConnectivityState::SessionConnecting {
                    self.state = ConnectivityState::SessionAccepted;
                } else {
                    debug!(state = %self.state, "ignoring session-accepted in this state");
                }
            }
            SessionEvent::Rejected { reason } => {
                warn!(%reason, "session rejected by broker");
                self.state = ConnectivityState::SessionError;
            }
            SessionEvent::SubscribeAcked { failed } => {
                if self.state != ConnectivityState::SubscribePending {
                    debug!(state = %self.state, "ignoring subscribe ack in this state");
                } else if failed {
                    warn!("subscription rejected by broker");
                    self.state = ConnectivityState::SessionError;
                } else {
                    self.state = ConnectivityState::Subscribed;
                }
            }
            SessionEvent::Message { topic, payload } => {
                match decode_remote(self.config.broker_topic.as_str(), &topic, &payload) {
                    Some(RemoteToggle::Off) => self.got_off = true,
                    Some(RemoteToggle::On) => self.got_on = true,
                    None => {}
                }
            }
            SessionEvent::Disconnected { reason } => {
                warn!(%reason, "session disconnected");
                self.state = ConnectivityState::SessionError;
                // The subscription died with the session, so the cached
                // value did too.
                self.toggle = ToggleValue::Unknown;
            }
        }
    }

    /// Step 4: push-forward ratchet. Each state fires its one outbound
    /// action exactly once, on entry; failure faults to `SessionError`
    /// and stays there until an explicit retry.
    async fn advance(&mut self) {
        if self.state == self.acted_state {
            return;
        }
        self.acted_state = self.state;
        match self.state {
            ConnectivityState::LinkUp => {
                if !self.config.valid {
                    warn!("link up but no valid broker configuration");
                    self.state = ConnectivityState::SessionError;
                    return;
                }
                info!(host = %self.config.broker_host, "connecting to broker");
                match self.session.connect(&self.config).await {
                    Ok(()) => self.state = ConnectivityState::SessionConnecting,
                    Err(err) => {
                        warn!(error = %err, "session connect failed");
                        self.state = ConnectivityState::SessionError;
                    }
                }
            }
            ConnectivityState::SessionAccepted => {
                let topic = self.config.broker_topic.as_str().to_string();
                info!(%topic, "subscribing");
                match self.session.subscribe(&topic).await {
                    Ok(()) => self.state = ConnectivityState::SubscribePending,
                    Err(err) => {
                        warn!(error = %err, "subscribe failed");
                        self.state = ConnectivityState::SessionError;
                    }
                }
            }
            ConnectivityState::Subscribed => {
                // Ask for the current value before declaring ready; the
                // broker has no native retention, so this publish is the
                // fetch.
                let topic = retained_fetch_topic(self.config.broker_topic.as_str());
                debug!(%topic, "fetching retained value");
                match self.session.publish(&topic, b"").await {
                    Ok(()) => self.state = ConnectivityState::Ready,
                    Err(err) => {
                        warn!(error = %err, "retained-value fetch failed");
                        self.state = ConnectivityState::SessionError;
                    }
                }
            }
            _ => {}
        }
    }

    /// Step 5: local activation. The flag is always cleared, whatever the
    /// outcome. Only `Ready` flips the toggle; down/error states use the
    /// press as the recovery action instead.
    async fn handle_input(&mut self) {
        if !self.input_pending {
            return;
        }
        self.input_pending = false;
        match self.state {
            ConnectivityState::LinkDown | ConnectivityState::LinkError => {
                info!("input: starting link connection");
                let result = self.link.connect(
                    self.config.network_id.as_str(),
                    self.config.network_secret.as_str(),
                );
                match result {
                    Ok(()) => self.state = ConnectivityState::LinkConnecting,
                    Err(err) => {
                        warn!(error = %err, "link connect failed");
                        self.state = ConnectivityState::LinkError;
                    }
                }
            }
            ConnectivityState::SessionError => {
                // Retry: re-enter LinkUp so the ratchet reconnects.
                info!("input: retrying broker session");
                self.state = ConnectivityState::LinkUp;
            }
            ConnectivityState::Ready => {
                self.toggle = self.toggle.flipped();
                let turned_on = self.toggle == ToggleValue::On;
                // flipped() never yields Unknown, so the payload exists.
                let payload = self.toggle.as_payload().unwrap_or(b"0");
                info!(turned_on, "input: publishing toggle");
                let topic = self.config.broker_topic.as_str().to_string();
                if let Err(err) = self.session.publish(&topic, payload).await {
                    warn!(error = %err, "toggle publish failed");
                    self.state = ConnectivityState::SessionError;
                }
            }
            other => debug!(state = %other, "input ignored"),
        }
    }

    /// Step 6: remote instructions, applied after local input so a
    /// same-tick collision resolves in the remote's favor. Off before On:
    /// a pair arriving in one tick lands on On.
    fn apply_remote(&mut self) {
        if self.got_off {
            self.got_off = false;
            self.toggle = ToggleValue::Off;
        }
        if self.got_on {
            self.got_on = false;
            self.toggle = ToggleValue::On;
        }
    }

    /// Step 7: exactly one set-toggle presentation per observed change.
    /// `Unknown` emits nothing — no widget state represents it.
    fn sync_toggle_presentation(&mut self) {
        if self.observed_toggle == self.toggle {
            return;
        }
        self.observed_toggle = self.toggle;
        if let Some(position) = self.toggle.as_widget_position() {
            self.presenter
                .present(PresentationEvent::SetToggle(position));
        }
    }

    /// Best-effort disconnect plus the mandatory local bookkeeping.
    async fn abort_session(&mut self) {
        if let Err(err) = self.session.disconnect().await {
            // A failed disconnect still forces session-down bookkeeping;
            // the device must not keep believing it is connected.
            warn!(error = %err, "session disconnect failed");
        }
        self.toggle = ToggleValue::Unknown;
    }

    // ---- command surface ------------------------------------------------

    pub async fn dispatch(&mut self, command: DeviceCommand) -> Result<(), DeviceError> {
        match command {
            DeviceCommand::LinkUp => self.link_up(),
            DeviceCommand::LinkDown => self.link_down(),
            DeviceCommand::SessionUp => self.session_up().await,
            DeviceCommand::SessionDown => self.session_down().await,
            DeviceCommand::ReloadConfig => self.reload_config(),
        }
    }

    /// Ask the link layer to connect. A failure only demotes the state
    /// when a link attempt was already underway — a still-disconnected
    /// device does not become "errored" because a command failed.
    pub fn link_up(&mut self) -> Result<(), DeviceError> {
        let result = self.link.connect(
            self.config.network_id.as_str(),
            self.config.network_secret.as_str(),
        );
        match result {
            Ok(()) => {
                if !self.state.is_link_started() {
                    self.state = ConnectivityState::LinkConnecting;
                }
                Ok(())
            }
            Err(err) => {
                if self.state.is_link_started() {
                    self.state = ConnectivityState::LinkError;
                }
                Err(err.into())
            }
        }
    }

    pub fn link_down(&mut self) -> Result<(), DeviceError> {
        match self.link.disconnect() {
            // The Down notification arrives via the monitor and is
            // handled in step 1 of the next tick.
            Ok(()) => Ok(()),
            Err(err) => {
                if self.state.is_link_started() {
                    self.state = ConnectivityState::LinkError;
                }
                Err(err.into())
            }
        }
    }

    /// Connect to the broker. Refused outright while the config is
    /// invalid: a distinct status is shown and no attempt proceeds.
    pub async fn session_up(&mut self) -> Result<(), DeviceError> {
        if !self.config.valid {
            self.presenter
                .present(PresentationEvent::ShowMessage(MSG_NOT_CONFIGURED));
            return Err(ConfigError::NotConfigured.into());
        }
        match self.session.connect(&self.config).await {
            Ok(()) => {
                self.state = ConnectivityState::SessionConnecting;
                Ok(())
            }
            Err(err) => {
                if self.state.is_session_active() {
                    self.state = ConnectivityState::SessionError;
                }
                Err(err.into())
            }
        }
    }

    /// Disconnect from the broker. Lands in `SessionError` rather than
    /// `LinkUp`, since `LinkUp` would make the ratchet reconnect
    /// immediately. The local bookkeeping happens even when the wire
    /// disconnect fails.
    pub async fn session_down(&mut self) -> Result<(), DeviceError> {
        let result = self.session.disconnect().await;
        if self.state.is_session_active() {
            self.state = ConnectivityState::SessionError;
            self.toggle = ToggleValue::Unknown;
        }
        result.map_err(DeviceError::from)
    }

    /// Clear the in-memory config and re-derive it from the settings
    /// store. Clearing first guarantees a corrupted or partial store
    /// yields a cleanly invalid config, never a stale/fresh mix. Network
    /// credentials and broker URL validity are independent.
    pub fn reload_config(&mut self) -> Result<(), DeviceError> {
        self.config.clear();
        let settings = self.settings.load()?;

        if let Some(id) = settings.network_id {
            self.config.network_id = BoundedStr::new(id).map_err(|source| {
                ConfigError::FieldTooLong {
                    key: "network_id",
                    source,
                }
            })?;
        }
        if let Some(secret) = settings.network_secret {
            self.config.network_secret = BoundedStr::new(secret).map_err(|source| {
                ConfigError::FieldTooLong {
                    key: "network_secret",
                    source,
                }
            })?;
        }

        match settings.url {
            Some(url) => match BrokerUrl::parse(&url) {
                Ok(parsed) => {
                    info!(host = %parsed.host, topic = %parsed.topic, "broker configuration loaded");
                    self.config.apply_broker_url(parsed);
                }
                Err(err) => {
                    warn!(code = err.code(), error = %err, "broker url rejected");
                    self.presenter
                        .present(PresentationEvent::ShowMessage(MSG_NOT_CONFIGURED));
                    return Err(err.into());
                }
            },
            None => debug!("no broker url in settings"),
        }
        Ok(())
    }

    /// Orderly shutdown for process exit: best-effort teardown of the
    /// session and the link.
    pub async fn shutdown(&mut self) {
        if self.state.is_session_active() {
            if let Err(err) = self.session.disconnect().await {
                warn!(error = %err, "session disconnect during shutdown failed");
            }
        }
        if let Err(err) = self.link.disconnect() {
            debug!(error = %err, "link disconnect during shutdown failed");
        }
        info!("controller shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::{MockLink, MockSession, RecordingPanel};

    fn controller(
        session: MockSession,
        link: MockLink,
    ) -> (
        Controller<MockSession, MockLink, RecordingPanel>,
        RecordingPanel,
    ) {
        let panel = RecordingPanel::new();
        let handle = panel.clone();
        let settings = SettingsStore::new("/nonexistent/iotoggle.toml");
        (Controller::new(session, link, panel, settings), handle)
    }

    fn configured(
        session: MockSession,
        link: MockLink,
    ) -> (
        Controller<MockSession, MockLink, RecordingPanel>,
        RecordingPanel,
    ) {
        let (mut c, panel) = controller(session, link);
        let url = BrokerUrl::parse("mqtt://user:pw@broker.local/feeds/toggle").unwrap();
        c.config_mut().apply_broker_url(url);
        (c, panel)
    }

    #[test]
    fn startup_presents_offline_message() {
        let (_c, panel) = controller(MockSession::new(), MockLink::new());
        assert_eq!(
            panel.events(),
            vec![
                PresentationEvent::SetLinkIcon(false),
                PresentationEvent::ShowMessage(ConnectivityState::LinkDown.status_text()),
            ]
        );
    }

    #[tokio::test]
    async fn press_when_down_starts_link_connection() {
        let (mut c, _panel) = controller(MockSession::new(), MockLink::new());
        c.press();
        c.tick().await;
        assert_eq!(c.state(), ConnectivityState::LinkConnecting);
    }

    #[tokio::test]
    async fn press_is_consumed_even_when_ignored() {
        let (mut c, _panel) = configured(MockSession::new(), MockLink::new());
        c.config_mut().valid = true;
        // Force an intermediate state where a press is a no-op.
        c.press();
        c.tick().await; // LinkConnecting after the press connects the link
        assert_eq!(c.state(), ConnectivityState::LinkConnecting);
        c.press();
        c.tick().await;
        // Still waiting on the link; the press changed nothing but the
        // flag is gone, so another tick stays put too.
        c.tick().await;
        assert!(c.state() >= ConnectivityState::LinkConnecting);
    }

    #[tokio::test]
    async fn link_up_with_valid_config_starts_session() {
        let (mut c, _panel) = configured(MockSession::new(), MockLink::with_events([LinkEvent::Up]));
        c.tick().await;
        assert_eq!(c.state(), ConnectivityState::SessionConnecting);
    }

    #[tokio::test]
    async fn link_up_without_config_faults_session() {
        let (mut c, _panel) = controller(MockSession::new(), MockLink::with_events([LinkEvent::Up]));
        c.tick().await;
        assert_eq!(c.state(), ConnectivityState::SessionError);
        // No connect attempt was made.
        assert_eq!(c.session.connect_calls(), 0);
    }

    #[tokio::test]
    async fn session_connect_failure_faults() {
        let session = MockSession::new().failing_connect();
        let (mut c, _panel) = configured(session, MockLink::with_events([LinkEvent::Up]));
        c.tick().await;
        assert_eq!(c.state(), ConnectivityState::SessionError);
    }

    #[tokio::test]
    async fn session_up_refused_without_config() {
        let (mut c, panel) = controller(MockSession::new(), MockLink::new());
        let err = c.session_up().await.unwrap_err();
        assert!(matches!(
            err,
            DeviceError::Config(ConfigError::NotConfigured)
        ));
        assert!(panel
            .events()
            .contains(&PresentationEvent::ShowMessage(MSG_NOT_CONFIGURED)));
        // State untouched: still down, not "errored".
        assert_eq!(c.state(), ConnectivityState::LinkDown);
    }

    #[tokio::test]
    async fn session_down_forces_bookkeeping_even_on_failure() {
        let session = MockSession::new().failing_disconnect();
        let (mut c, _panel) = configured(session, MockLink::with_events([LinkEvent::Up]));
        c.tick().await;
        assert_eq!(c.state(), ConnectivityState::SessionConnecting);

        let result = c.session_down().await;
        assert!(result.is_err());
        assert_eq!(c.state(), ConnectivityState::SessionError);
        assert_eq!(c.toggle(), ToggleValue::Unknown);
    }

    #[tokio::test]
    async fn keepalive_probe_fires_inside_margin() {
        let session = MockSession::new().with_keepalive_left(Duration::from_millis(3000));
        let (mut c, _panel) = configured(session, MockLink::with_events([LinkEvent::Up]));
        c.tick().await; // reaches SessionConnecting
        c.tick().await; // session maintenance now runs
        assert!(c.session.ping_calls() >= 1);
    }

    #[tokio::test]
    async fn keepalive_probe_quiet_outside_margin() {
        let session = MockSession::new().with_keepalive_left(Duration::from_secs(55));
        let (mut c, _panel) = configured(session, MockLink::with_events([LinkEvent::Up]));
        c.tick().await;
        c.tick().await;
        assert_eq!(c.session.ping_calls(), 0);
    }

    #[tokio::test]
    async fn reload_config_missing_store_leaves_config_invalid() {
        let (mut c, _panel) = controller(MockSession::new(), MockLink::new());
        assert!(c.reload_config().is_err());
        assert!(!c.config().valid);
    }

    // ---- transition tables ----------------------------------------------

    /// Session events, enumerated over every session-active state. The
    /// expected outcomes are the whole contract: acks only count in the
    /// state that is waiting for them, faults count everywhere.
    #[tokio::test]
    async fn session_event_transition_table() {
        use ConnectivityState as CS;

        let active: Vec<CS> = CS::ALL
            .iter()
            .copied()
            .filter(|s| s.is_session_active())
            .collect();

        for &state in &active {
            let cases: Vec<(SessionEvent, CS)> = vec![
                (
                    SessionEvent::Accepted,
                    if state == CS::SessionConnecting {
                        CS::SessionAccepted
                    } else {
                        state
                    },
                ),
                (
                    SessionEvent::Rejected {
                        reason: "refused".into(),
                    },
                    CS::SessionError,
                ),
                (
                    SessionEvent::SubscribeAcked { failed: false },
                    if state == CS::SubscribePending {
                        CS::Subscribed
                    } else {
                        state
                    },
                ),
                (
                    SessionEvent::SubscribeAcked { failed: true },
                    if state == CS::SubscribePending {
                        CS::SessionError
                    } else {
                        state
                    },
                ),
                (
                    SessionEvent::Disconnected {
                        reason: "gone".into(),
                    },
                    CS::SessionError,
                ),
            ];

            for (event, expected) in cases {
                let (mut c, _panel) = configured(MockSession::new(), MockLink::new());
                c.state = state;
                c.apply_session_event(event.clone());
                assert_eq!(c.state, expected, "state {state:?}, event {event:?}");
            }
        }
    }

    /// In particular: Ready never jumps backwards to SessionAccepted on a
    /// stray CONNACK — the graph has no such edge.
    #[tokio::test]
    async fn ready_ignores_stray_accepted() {
        let (mut c, _panel) = configured(MockSession::new(), MockLink::new());
        c.state = ConnectivityState::Ready;
        c.apply_session_event(SessionEvent::Accepted);
        assert_eq!(c.state, ConnectivityState::Ready);
    }

    #[tokio::test]
    async fn events_ignored_while_session_inactive() {
        let session = MockSession::new();
        session.push_event(SessionEvent::Accepted);
        let (mut c, _panel) = controller(session, MockLink::new());
        c.tick().await;
        assert_eq!(c.state(), ConnectivityState::LinkDown);
    }

    /// Link-down observed in any state: states at or past LinkConnecting
    /// fall to LinkError, session-active states additionally abort the
    /// session and forget the toggle — all within the same tick.
    #[tokio::test]
    async fn link_down_transition_table() {
        for &state in &ConnectivityState::ALL {
            let session = MockSession::new();
            let link = MockLink::new();
            let (mut c, _panel) = configured(session.clone(), link.clone());
            c.state = state;
            c.acted_state = state;
            c.presented_state = state;
            c.toggle = ToggleValue::On;
            c.observed_toggle = ToggleValue::On;

            link.push_event(LinkEvent::Down);
            c.tick().await;

            let expected = if state.is_link_started() {
                ConnectivityState::LinkError
            } else {
                state
            };
            assert_eq!(c.state(), expected, "link down from {state:?}");

            if state.is_session_active() {
                assert_eq!(session.disconnect_calls(), 1, "abort from {state:?}");
                assert_eq!(c.toggle(), ToggleValue::Unknown, "forget from {state:?}");
            } else {
                assert_eq!(session.disconnect_calls(), 0, "no abort from {state:?}");
            }
        }
    }

    /// Link-up observed in any state: session-active states ignore it;
    /// everything else re-enters LinkUp, and (config being valid) the
    /// ratchet connects within the same tick. Re-entering from
    /// SessionError is the recovery path, so it reconnects too.
    #[tokio::test]
    async fn link_up_transition_table() {
        for &state in &ConnectivityState::ALL {
            let link = MockLink::new();
            let (mut c, _panel) = configured(MockSession::new(), link.clone());
            c.state = state;
            c.acted_state = state;
            c.presented_state = state;

            link.push_event(LinkEvent::Up);
            c.tick().await;

            let expected = if state.is_session_active() || state == ConnectivityState::LinkUp {
                state
            } else {
                ConnectivityState::SessionConnecting
            };
            assert_eq!(c.state(), expected, "link up from {state:?}");
        }
    }

    // ---- ratchet steps --------------------------------------------------

    #[tokio::test]
    async fn accepted_session_subscribes_to_configured_topic() {
        let session = MockSession::new();
        let (mut c, _panel) = configured(session.clone(), MockLink::new());
        c.state = ConnectivityState::SessionAccepted;
        c.tick().await;
        assert_eq!(c.state(), ConnectivityState::SubscribePending);
        assert_eq!(session.subscribed_topics(), vec!["feeds/toggle"]);
    }

    #[tokio::test]
    async fn subscribe_failure_faults() {
        let session = MockSession::new().failing_subscribe();
        let (mut c, _panel) = configured(session, MockLink::new());
        c.state = ConnectivityState::SessionAccepted;
        c.tick().await;
        assert_eq!(c.state(), ConnectivityState::SessionError);
    }

    #[tokio::test]
    async fn subscribed_session_fetches_retained_value() {
        let session = MockSession::new();
        let (mut c, _panel) = configured(session.clone(), MockLink::new());
        c.state = ConnectivityState::Subscribed;
        c.tick().await;
        assert_eq!(c.state(), ConnectivityState::Ready);
        assert_eq!(
            session.published(),
            vec![("feeds/toggle/get".to_string(), Vec::new())]
        );
    }

    #[tokio::test]
    async fn retained_fetch_failure_faults() {
        let session = MockSession::new().failing_publish();
        let (mut c, _panel) = configured(session, MockLink::new());
        c.state = ConnectivityState::Subscribed;
        c.tick().await;
        assert_eq!(c.state(), ConnectivityState::SessionError);
    }

    #[tokio::test]
    async fn ratchet_fires_once_per_state_entry() {
        let session = MockSession::new();
        let (mut c, _panel) = configured(session.clone(), MockLink::new());
        c.state = ConnectivityState::SessionAccepted;
        c.tick().await;
        assert_eq!(session.subscribed_topics().len(), 1);
        // No further acks arrive; extra ticks must not re-subscribe.
        c.tick().await;
        c.tick().await;
        assert_eq!(session.subscribed_topics().len(), 1);
    }
}
