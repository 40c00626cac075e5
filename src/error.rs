//! Device-level error taxonomy.
//!
//! Every failure in normal operation is one of four recoverable kinds:
//! configuration, URL grammar, link, or session. None of them is fatal to
//! the process — they surface as status strings and error states, and the
//! control loop keeps running.

use thiserror::Error;

use crate::config::ConfigError;
use crate::link::LinkError;
use crate::session::SessionError;
use crate::url::UrlError;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("broker url error: {0}")]
    Url(#[from] UrlError),
    #[error("link error: {0}")]
    Link(#[from] LinkError),
    #[error("session error: {0}")]
    Session(#[from] SessionError),
}

/// Result type for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;
