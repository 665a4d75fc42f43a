//! Liveness probe

use std::time::Duration;

use tokio::net::TcpStream;

use super::errors::{DriverError, DriverResult};
use super::types::ServerEndpoint;

/// Open and drop a TCP connection to `endpoint` within `timeout`.
pub async fn tcp_probe(endpoint: &ServerEndpoint, timeout: Duration) -> DriverResult<()> {
    let address = endpoint.url();
    match tokio::time::timeout(timeout, TcpStream::connect(address.as_str())).await {
        Ok(Ok(_stream)) => Ok(()),
        Ok(Err(e)) => Err(DriverError::Unreachable {
            url: address,
            reason: e.to_string(),
        }),
        Err(_) => Err(DriverError::Unreachable {
            url: address,
            reason: format!("connect timed out after {}ms", timeout.as_millis()),
        }),
    }
}
