//! IEC 60870-5-104 client.
//!
//! [`Iec104Client`] dials the station, runs one [`Session`] on the
//! connection and feeds decoded frames to an application handler until the
//! connection fails or [`Iec104Client::close`] is called.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};

use crate::connector::Connector;
use crate::error::{Iec104Error, Result};
use crate::session::{FrameReceiver, Session};

/// Default IEC 104 port.
pub const DEFAULT_PORT: u16 = 2404;

/// Default TCP connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT: u64 = 10;

/// Default pause between connect attempts in seconds.
pub const DEFAULT_RETRY_INTERVAL: u64 = 10;

/// Default time allowed for the rest of a frame once its header arrived, in seconds.
pub const DEFAULT_FRAME_TIMEOUT: u64 = 30;

/// Default period of the repeated total call in seconds.
pub const DEFAULT_TOTAL_CALL_INTERVAL: u64 = 15 * 60;

/// Default common address of the station.
pub const DEFAULT_COMMON_ADDRESS: u16 = 1;

/// Default capacity of the outbound and delivery queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Station address (host:port)
    pub address: String,
    /// Timeout of a single TCP connect attempt
    pub connect_timeout: Duration,
    /// Pause between failed connect attempts
    pub retry_interval: Duration,
    /// Give up after this many failed attempts; `None` retries forever
    pub max_connect_attempts: Option<u32>,
    /// Deadline for the content of a frame after its header
    pub frame_timeout: Duration,
    /// Period of the repeated general interrogation; zero disables it
    pub total_call_interval: Duration,
    /// Common address used in outgoing commands
    pub common_address: u16,
    /// Capacity of the queue in front of the socket writer
    pub send_queue_capacity: usize,
    /// Capacity of the queue in front of the application handler
    pub delivery_queue_capacity: usize,
}

impl ClientConfig {
    /// Create a new configuration with the given address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT),
            retry_interval: Duration::from_secs(DEFAULT_RETRY_INTERVAL),
            max_connect_attempts: None,
            frame_timeout: Duration::from_secs(DEFAULT_FRAME_TIMEOUT),
            total_call_interval: Duration::from_secs(DEFAULT_TOTAL_CALL_INTERVAL),
            common_address: DEFAULT_COMMON_ADDRESS,
            send_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            delivery_queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Set connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the pause between connect attempts.
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Limit the number of connect attempts.
    pub fn max_connect_attempts(mut self, attempts: u32) -> Self {
        self.max_connect_attempts = Some(attempts);
        self
    }

    /// Set frame content timeout.
    pub fn frame_timeout(mut self, timeout: Duration) -> Self {
        self.frame_timeout = timeout;
        self
    }

    /// Set total call period.
    pub fn total_call_interval(mut self, interval: Duration) -> Self {
        self.total_call_interval = interval;
        self
    }

    /// Set common address.
    pub fn common_address(mut self, address: u16) -> Self {
        self.common_address = address;
        self
    }

    /// Set outbound queue capacity.
    pub fn send_queue_capacity(mut self, capacity: usize) -> Self {
        self.send_queue_capacity = capacity;
        self
    }

    /// Set delivery queue capacity.
    pub fn delivery_queue_capacity(mut self, capacity: usize) -> Self {
        self.delivery_queue_capacity = capacity;
        self
    }

    /// Check the configuration before connecting.
    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(Iec104Error::config("address must not be empty"));
        }
        if self.connect_timeout.is_zero() {
            return Err(Iec104Error::config("connect_timeout must be positive"));
        }
        if self.frame_timeout.is_zero() {
            return Err(Iec104Error::config("frame_timeout must be positive"));
        }
        if self.max_connect_attempts == Some(0) {
            return Err(Iec104Error::config("max_connect_attempts must be at least 1"));
        }
        if self.send_queue_capacity == 0 || self.delivery_queue_capacity == 0 {
            return Err(Iec104Error::config("queue capacities must be at least 1"));
        }
        Ok(())
    }
}

/// IEC 60870-5-104 client.
#[derive(Debug)]
pub struct Iec104Client {
    config: ClientConfig,
    cancel: CancellationToken,
}

impl Iec104Client {
    /// Create a new IEC 104 client.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Connect and run a session until it ends.
    ///
    /// `handler` receives the decoded frames and runs as a separate task.
    /// Returns `Ok(())` after [`close`](Self::close), including a close
    /// during the connect phase. Any other end of the session is an error;
    /// reconnecting is left to the caller.
    pub async fn start<F, Fut>(&self, handler: F) -> Result<()>
    where
        F: FnOnce(FrameReceiver) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.config.validate()?;

        let span = info_span!("iec104", address = %self.config.address);
        async {
            let connector = Connector::new(&self.config);
            let stream = match connector.connect(&self.cancel).await {
                Ok(stream) => stream,
                Err(Iec104Error::Cancelled) => {
                    info!("closed before a connection was established");
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            Session::new(stream, &self.config, self.cancel.child_token())
                .run(handler)
                .await
        }
        .instrument(span)
        .await
    }

    /// Stop the client. A running [`start`](Self::start) returns `Ok(())`.
    pub fn close(&self) {
        if !self.cancel.is_cancelled() {
            info!(address = %self.config.address, "closing client");
        }
        self.cancel.cancel();
    }

    /// True once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token cancelled by [`close`](Self::close), for tying the client to an
    /// outer shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;

    use crate::codec::Apdu;
    use crate::types::{Asdu, AsduHeader, Cot, TypeId};

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::new("127.0.0.1:2404");
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.retry_interval, Duration::from_secs(10));
        assert_eq!(config.max_connect_attempts, None);
        assert_eq!(config.frame_timeout, Duration::from_secs(30));
        assert_eq!(config.total_call_interval, Duration::from_secs(900));
        assert_eq!(config.common_address, 1);
        assert_eq!(config.send_queue_capacity, 1);
        assert_eq!(config.delivery_queue_capacity, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::new("station:2404")
            .connect_timeout(Duration::from_secs(3))
            .retry_interval(Duration::from_secs(1))
            .max_connect_attempts(5)
            .frame_timeout(Duration::from_secs(8))
            .total_call_interval(Duration::ZERO)
            .common_address(42)
            .send_queue_capacity(4)
            .delivery_queue_capacity(16);

        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.retry_interval, Duration::from_secs(1));
        assert_eq!(config.max_connect_attempts, Some(5));
        assert_eq!(config.frame_timeout, Duration::from_secs(8));
        assert!(config.total_call_interval.is_zero());
        assert_eq!(config.common_address, 42);
        assert_eq!(config.send_queue_capacity, 4);
        assert_eq!(config.delivery_queue_capacity, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let base = || ClientConfig::new("127.0.0.1:2404");
        let invalid = [
            ClientConfig::new(" "),
            base().connect_timeout(Duration::ZERO),
            base().frame_timeout(Duration::ZERO),
            base().max_connect_attempts(0),
            base().send_queue_capacity(0),
            base().delivery_queue_capacity(0),
        ];
        for config in invalid {
            assert!(matches!(config.validate(), Err(Iec104Error::Config(_))), "{:?}", config);
        }
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let client = Iec104Client::new(ClientConfig::new("127.0.0.1:2404").send_queue_capacity(0));
        let result = client.start(|_frames| async {}).await;
        assert!(matches!(result, Err(Iec104Error::Config(_))));
    }

    #[tokio::test]
    async fn test_close_before_start() {
        let client = Iec104Client::new(ClientConfig::new("127.0.0.1:1"));
        client.close();
        assert!(client.is_closed());
        assert!(client.start(|_frames| async {}).await.is_ok());
    }

    async fn read_frame(stream: &mut TcpStream) -> Vec<u8> {
        let mut header = [0u8; 2];
        stream.read_exact(&mut header).await.unwrap();
        let mut content = vec![0u8; header[1] as usize];
        stream.read_exact(&mut content).await.unwrap();
        [header.to_vec(), content].concat()
    }

    #[tokio::test]
    async fn test_end_to_end_with_station() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let mut measurement = Asdu::new(AsduHeader::new(TypeId::MeasuredFloat, 1, Cot::Spontaneous, 1));
        measurement.raw_data =
            bytes::Bytes::from_static(&[0x01, 0x40, 0x00, 0x00, 0x00, 0x80, 0x3F, 0x00]);
        let measurement = Apdu::i_frame(0, 1, measurement);

        let station = {
            let measurement = measurement.to_bytes().unwrap();
            tokio::spawn(async move {
                let (mut stream, _) = listener.accept().await.unwrap();
                assert_eq!(read_frame(&mut stream).await, [0x68, 0x04, 0x07, 0x00, 0x00, 0x00]);
                stream.write_all(&[0x68, 0x04, 0x0B, 0x00, 0x00, 0x00]).await.unwrap();

                let interrogation = read_frame(&mut stream).await;
                assert_eq!(interrogation[6], 100);
                stream.write_all(&measurement).await.unwrap();

                // S-frame acknowledging the measurement
                assert_eq!(read_frame(&mut stream).await, [0x68, 0x04, 0x01, 0x00, 0x02, 0x00]);

                let mut rest = Vec::new();
                stream.read_to_end(&mut rest).await.unwrap();
            })
        };

        let client = Arc::new(Iec104Client::new(ClientConfig::new(address)));
        let (tx, mut delivered) = mpsc::channel(8);
        let running = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .start(move |mut frames| async move {
                        while let Some(frame) = frames.recv().await {
                            if tx.send(frame).await.is_err() {
                                break;
                            }
                        }
                    })
                    .await
            })
        };

        assert_eq!(delivered.recv().await.unwrap(), measurement);

        client.close();
        assert!(running.await.unwrap().is_ok());
        station.await.unwrap();
    }
}
