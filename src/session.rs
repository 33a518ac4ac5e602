//! One established connection to a station.
//!
//! A running session has three parts:
//!
//! - the read loop (in the caller's task) decodes frames, applies
//!   [`Protocol`] and fires the periodic total call,
//! - the writer task drains the outbound queue into the socket,
//! - the application handler task consumes a [`FrameReceiver`].
//!
//! Both queues are bounded. A full queue blocks its producer, so a slow
//! handler or a slow socket stalls the read loop instead of dropping frames.
//! Any read, write or framing failure cancels the session token, which all
//! parts observe.

use std::future::Future;

use futures::SinkExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use crate::client::ClientConfig;
use crate::codec::{Apdu, Iec104Codec};
use crate::error::{Iec104Error, Result};
use crate::protocol::{Action, Protocol};
use crate::scheduler::TotalCallScheduler;
use crate::transport::FrameReader;

/// Application side of the delivery queue.
#[derive(Debug)]
pub struct FrameReceiver {
    frames: mpsc::Receiver<Apdu>,
    cancel: CancellationToken,
}

impl FrameReceiver {
    /// Next decoded frame, or `None` once the session has ended.
    pub async fn recv(&mut self) -> Option<Apdu> {
        tokio::select! {
            biased;
            frame = self.frames.recv() => frame,
            _ = self.cancel.cancelled() => None,
        }
    }

    /// Stop the session this receiver belongs to.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// True once the session has been cancelled.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

struct Outbound {
    tx: mpsc::Sender<Apdu>,
    cancel: CancellationToken,
}

impl Outbound {
    async fn send(&self, apdu: Apdu) -> Result<()> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Iec104Error::Cancelled),
            sent = self.tx.send(apdu) => sent.map_err(|_| Iec104Error::ChannelClosed),
        }
    }

    async fn deliver(&self, delivery: &mpsc::Sender<Apdu>, apdu: Apdu) -> Result<()> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Iec104Error::Cancelled),
            sent = delivery.send(apdu) => {
                if let Err(mpsc::error::SendError(apdu)) = sent {
                    debug!(frame = %apdu, "frame receiver dropped, discarding frame");
                }
                Ok(())
            }
        }
    }
}

/// A connected session over any byte stream.
pub struct Session<S> {
    stream: S,
    config: ClientConfig,
    cancel: CancellationToken,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wrap a connected stream.
    pub fn new(stream: S, config: &ClientConfig, cancel: CancellationToken) -> Self {
        Self {
            stream,
            config: config.clone(),
            cancel,
        }
    }

    /// Token that stops this session when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until the session ends.
    ///
    /// `handler` is called once with the receiving end of the delivery queue
    /// and runs as its own task. Returns `Ok(())` when the session was
    /// cancelled, otherwise the error that ended it.
    pub async fn run<F, Fut>(self, handler: F) -> Result<()>
    where
        F: FnOnce(FrameReceiver) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Self {
            stream,
            config,
            cancel,
        } = self;

        let (read_half, write_half) = tokio::io::split(stream);
        let (outbound_tx, outbound_rx) = mpsc::channel(config.send_queue_capacity.max(1));
        let (delivery_tx, delivery_rx) = mpsc::channel(config.delivery_queue_capacity.max(1));

        let mut protocol = Protocol::new(config.common_address);
        let outbound = Outbound {
            tx: outbound_tx,
            cancel: cancel.clone(),
        };

        let writer = tokio::spawn(
            write_loop(
                FramedWrite::new(write_half, Iec104Codec::new()),
                outbound_rx,
                cancel.clone(),
            )
            .in_current_span(),
        );
        tokio::spawn(
            handler(FrameReceiver {
                frames: delivery_rx,
                cancel: cancel.clone(),
            })
            .in_current_span(),
        );

        let mut reader = FrameReader::new(read_half, config.frame_timeout);
        let mut scheduler = TotalCallScheduler::new(config.total_call_interval);
        // First frame queued, so it is always the first frame out.
        let read_result = match outbound.send(protocol.start_data_transfer()).await {
            Ok(()) => {
                read_loop(
                    &mut reader,
                    &mut protocol,
                    &outbound,
                    &delivery_tx,
                    &mut scheduler,
                )
                .await
            }
            Err(e) => Err(e),
        };

        cancel.cancel();
        drop(outbound);
        drop(delivery_tx);

        let write_result = writer
            .await
            .unwrap_or_else(|e| Err(std::io::Error::other(e).into()));

        let result = match (read_result, write_result) {
            (Err(Iec104Error::Cancelled), Ok(())) => Ok(()),
            (Err(Iec104Error::Cancelled), Err(e)) => Err(e),
            (Err(e), _) => Err(e),
            (Ok(()), write_result) => write_result,
        };

        match &result {
            Ok(()) => info!(
                i_frames = protocol.i_frames_received(),
                "session closed"
            ),
            Err(e) => error!(
                error = %e,
                i_frames = protocol.i_frames_received(),
                "session terminated"
            ),
        }
        result
    }
}

async fn read_loop<R>(
    reader: &mut FrameReader<R>,
    protocol: &mut Protocol,
    outbound: &Outbound,
    delivery: &mpsc::Sender<Apdu>,
    scheduler: &mut TotalCallScheduler,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    loop {
        tokio::select! {
            _ = outbound.cancel.cancelled() => return Err(Iec104Error::Cancelled),
            frame = reader.read_frame() => {
                let apdu = match frame {
                    Ok(Some(apdu)) => apdu,
                    Ok(None) => return Err(Iec104Error::ConnectionClosed),
                    Err(e) => {
                        warn!(error = %e, "failed to read frame");
                        return Err(e);
                    }
                };

                let seq = protocol.sequence();
                debug!(
                    frame = %apdu,
                    send_seq = seq.send(),
                    recv_seq = seq.recv(),
                    "received frame"
                );

                for action in protocol.handle(apdu) {
                    match action {
                        Action::Deliver(apdu) => outbound.deliver(delivery, apdu).await?,
                        Action::Send(apdu) => outbound.send(apdu).await?,
                    }
                }
            }
            _ = scheduler.tick() => {
                info!("periodic interrogation");
                outbound.send(protocol.general_interrogation()).await?;
            }
        }
    }
}

async fn write_loop<W>(
    mut sink: FramedWrite<W, Iec104Codec>,
    mut outbound: mpsc::Receiver<Apdu>,
    cancel: CancellationToken,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let apdu = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            apdu = outbound.recv() => match apdu {
                Some(apdu) => apdu,
                None => break,
            },
        };

        debug!(frame = %apdu, "sending frame");
        let sent = tokio::select! {
            _ = cancel.cancelled() => break,
            sent = sink.send(apdu) => sent,
        };

        if let Err(e) = sent {
            warn!(error = %e, "failed to write frame");
            cancel.cancel();
            return Err(e);
        }
    }

    if let Err(e) = sink.get_mut().shutdown().await {
        debug!(error = %e, "socket shutdown failed");
    }
    Ok(())
}
