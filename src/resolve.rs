//! Broker hostname resolution.
//!
//! A connect attempt resolves the configured hostname before the MQTT
//! client is armed, so an unreachable resolver or a bad hostname fails
//! synchronously with its own error instead of surfacing later as an
//! opaque transport error. IPv4 results are preferred, matching the
//! original device stack, and the port follows the TLS flag.

use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::lookup_host;
use tracing::info;

/// Conventional MQTT-over-TLS port.
pub const TLS_PORT: u16 = 8883;
/// Conventional plaintext MQTT port.
pub const PLAIN_PORT: u16 = 1883;

pub const fn broker_port(use_tls: bool) -> u16 {
    if use_tls {
        TLS_PORT
    } else {
        PLAIN_PORT
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("DNS lookup for '{host}' failed: {source}")]
    Lookup {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("DNS lookup for '{host}' returned no usable address")]
    NoAddress { host: String },
}

/// Resolve the broker hostname to a socket address.
///
/// Returns the first IPv4 result when one exists, otherwise the first
/// result of any family.
pub async fn resolve_broker_addr(host: &str, use_tls: bool) -> Result<SocketAddr, ResolveError> {
    let port = broker_port(use_tls);
    let addrs: Vec<SocketAddr> = lookup_host((host, port))
        .await
        .map_err(|source| ResolveError::Lookup {
            host: host.to_string(),
            source,
        })?
        .collect();

    let chosen = addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| ResolveError::NoAddress {
            host: host.to_string(),
        })?;

    info!(host, addr = %chosen, "resolved broker address");
    Ok(chosen)
}
