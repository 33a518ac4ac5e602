//! TCP dialing with fixed-interval retry.
//!
//! Field stations are often reachable only intermittently, so the default is
//! to keep dialing forever. Address resolution failures are not retried.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{lookup_host, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::ClientConfig;
use crate::error::{Iec104Error, Result};

/// Dials the remote station until a connection is established.
#[derive(Debug, Clone)]
pub struct Connector {
    address: String,
    connect_timeout: Duration,
    retry_interval: Duration,
    max_attempts: Option<u32>,
}

impl Connector {
    /// Build a connector from the client configuration.
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            address: config.address.clone(),
            connect_timeout: config.connect_timeout,
            retry_interval: config.retry_interval,
            max_attempts: config.max_connect_attempts,
        }
    }

    /// Resolve the configured address, preferring IPv4.
    pub async fn resolve(&self) -> Result<SocketAddr> {
        let resolution_error = |reason: String| Iec104Error::AddressResolution {
            address: self.address.clone(),
            reason,
        };

        let addrs: Vec<SocketAddr> = lookup_host(self.address.as_str())
            .await
            .map_err(|e| resolution_error(e.to_string()))?
            .collect();

        addrs
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| resolution_error("no addresses found".into()))
    }

    async fn dial(&self, addr: SocketAddr) -> Result<TcpStream> {
        let stream = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Iec104Error::ConnectionTimeout)??;

        if let Err(e) = stream.set_nodelay(true) {
            warn!(error = %e, "set TCP_NODELAY failed");
        }
        Ok(stream)
    }

    /// Dial until success, cancellation or the attempt cap.
    pub async fn connect(&self, cancel: &CancellationToken) -> Result<TcpStream> {
        let mut attempt: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(Iec104Error::Cancelled);
            }

            let addr = tokio::select! {
                _ = cancel.cancelled() => return Err(Iec104Error::Cancelled),
                addr = self.resolve() => addr?,
            };
            attempt += 1;
            info!(%addr, attempt, "connecting to station");

            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(Iec104Error::Cancelled),
                result = self.dial(addr) => result,
            };

            match result {
                Ok(stream) => {
                    info!(%addr, attempt, "connected to station");
                    return Ok(stream);
                }
                Err(e) if e.is_retryable() => {
                    if self.max_attempts.is_some_and(|max| attempt >= max) {
                        warn!(%addr, attempt, error = %e, "connect failed, giving up");
                        return Err(Iec104Error::ConnectRetriesExhausted(attempt));
                    }
                    warn!(
                        %addr,
                        attempt,
                        error = %e,
                        retry_in = ?self.retry_interval,
                        "connect failed, retrying"
                    );
                }
                Err(e) => return Err(e),
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(Iec104Error::Cancelled),
                _ = sleep(self.retry_interval) => {}
            }
        }
    }
}
