//! Reload semantics: the persisted store feeds the in-memory config
//! wholesale, and a broken store yields a cleanly-invalid config.

use std::fs;
use tempfile::TempDir;

use iotoggle::config::{ConfigError, BROKER_FIELD_MAX, NETWORK_ID_MAX};
use iotoggle::controller::Controller;
use iotoggle::error::DeviceError;
use iotoggle::settings::SettingsStore;
use iotoggle::testing::mocks::{MockLink, MockSession, RecordingPanel};
use iotoggle::url::UrlError;

fn controller_on(
    dir: &TempDir,
) -> Controller<MockSession, MockLink, RecordingPanel> {
    let store = SettingsStore::new(dir.path().join("device.toml"));
    Controller::new(
        MockSession::new(),
        MockLink::new(),
        RecordingPanel::new(),
        store,
    )
}

fn write_settings(dir: &TempDir, content: &str) {
    fs::write(dir.path().join("device.toml"), content).unwrap();
}

#[test]
fn reload_populates_config_from_store() {
    let dir = TempDir::new().unwrap();
    write_settings(
        &dir,
        r#"
url = "mqtts://user:pw@io.example.com/feeds/toggle"
network_id = "home-net"
network_secret = "hunter2"
"#,
    );
    let mut controller = controller_on(&dir);
    controller.reload_config().unwrap();

    let config = controller.config();
    assert!(config.valid);
    assert!(config.use_tls);
    assert_eq!(config.network_id.as_str(), "home-net");
    assert_eq!(config.network_secret.as_str(), "hunter2");
    assert_eq!(config.broker_user.as_str(), "user");
    assert_eq!(config.broker_host.as_str(), "io.example.com");
    assert_eq!(config.broker_topic.as_str(), "feeds/toggle");
}

#[test]
fn reload_replaces_previous_config_wholesale() {
    let dir = TempDir::new().unwrap();
    write_settings(
        &dir,
        "url = \"mqtt://a:b@first.example.com/one\"\nnetwork_id = \"first\"\n",
    );
    let mut controller = controller_on(&dir);
    controller.reload_config().unwrap();
    assert_eq!(controller.config().broker_host.as_str(), "first.example.com");

    // New store content without a network_id: the old value must not
    // linger after reload.
    write_settings(&dir, "url = \"mqtt://a:b@second.example.com/two\"\n");
    controller.reload_config().unwrap();
    let config = controller.config();
    assert_eq!(config.broker_host.as_str(), "second.example.com");
    assert_eq!(config.broker_topic.as_str(), "two");
    assert!(config.network_id.is_empty());
}

#[test]
fn corrupt_store_yields_cleanly_invalid_config() {
    let dir = TempDir::new().unwrap();
    write_settings(&dir, "url = \"mqtt://a:b@host.example.com/topic\"\n");
    let mut controller = controller_on(&dir);
    controller.reload_config().unwrap();
    assert!(controller.config().valid);

    write_settings(&dir, "url = not even toml\n");
    let err = controller.reload_config().unwrap_err();
    assert!(matches!(
        err,
        DeviceError::Config(ConfigError::TomlParse(_))
    ));
    // Nothing stale survives the failed reload.
    let config = controller.config();
    assert!(!config.valid);
    assert!(config.broker_host.is_empty());
    assert!(config.network_id.is_empty());
}

#[test]
fn bad_url_invalidates_broker_but_keeps_network_credentials() {
    let dir = TempDir::new().unwrap();
    write_settings(
        &dir,
        "url = \"mqtt://missing-delimiters\"\nnetwork_id = \"home-net\"\n",
    );
    let mut controller = controller_on(&dir);
    let err = controller.reload_config().unwrap_err();
    assert!(matches!(
        err,
        DeviceError::Url(UrlError::MissingUserDelimiter)
    ));

    let config = controller.config();
    assert!(!config.valid);
    // Network credentials are stored independently of broker validity.
    assert_eq!(config.network_id.as_str(), "home-net");
}

#[test]
fn overlong_settings_are_rejected() {
    let dir = TempDir::new().unwrap();
    let long_id = "x".repeat(NETWORK_ID_MAX + 1);
    write_settings(&dir, &format!("network_id = \"{long_id}\"\n"));
    let mut controller = controller_on(&dir);
    let err = controller.reload_config().unwrap_err();
    assert!(matches!(
        err,
        DeviceError::Config(ConfigError::FieldTooLong {
            key: "network_id",
            ..
        })
    ));

    let long_topic = "t".repeat(BROKER_FIELD_MAX + 1);
    write_settings(&dir, &format!("url = \"mqtt://u:p@host/{long_topic}\"\n"));
    let err = controller.reload_config().unwrap_err();
    assert!(matches!(err, DeviceError::Url(UrlError::TopicTooLong)));
    assert!(!controller.config().valid);
}

#[test]
fn missing_url_key_loads_but_stays_invalid() {
    let dir = TempDir::new().unwrap();
    write_settings(&dir, "network_id = \"home-net\"\n");
    let mut controller = controller_on(&dir);
    controller.reload_config().unwrap();
    let config = controller.config();
    assert!(!config.valid);
    assert_eq!(config.network_id.as_str(), "home-net");
}
