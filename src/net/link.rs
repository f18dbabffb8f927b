//! One established connection to the backend.
//!
//! # Responsibilities
//! - Dial the backend with a bounded connect timeout
//! - Run the writer task draining the outbound queue onto the socket
//! - Run the reader task routing responses to the correlation table and
//!   backend-initiated requests to the inbound dispatch table
//! - Fail in-flight calls and signal the manager when the link dies
//!
//! # Design Decisions
//! - Senders never touch the socket; they enqueue, the writer serializes
//! - The reader owns teardown so cleanup happens exactly once
//! - A link is never revived; the manager replaces it

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

use crate::config::BackendConfig;
use crate::net::codec::{CodecError, PacketCodec};
use crate::net::connection::ConnectionId;
use crate::rpc::correlation::CorrelationTable;
use crate::rpc::handlers::HandlerRegistry;
use crate::rpc::packet::{Packet, PacketKind, Pattern};
use crate::transport::TransportError;

pub struct Link {
    id: ConnectionId,
    peer: String,
    outbound: mpsc::Sender<Packet>,
    pending: Arc<CorrelationTable>,
    alive: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl Link {
    /// Dial the configured backend and start the link's tasks.
    pub async fn establish(
        config: &BackendConfig,
        handlers: Arc<HandlerRegistry>,
        on_lost: Arc<Notify>,
    ) -> Result<Arc<Self>, TransportError> {
        let addr = config.address();
        let connect = TcpStream::connect(&addr);
        let stream = match tokio::time::timeout(config.connect_timeout(), connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(TransportError::Connect { addr, source }),
            Err(_) => return Err(TransportError::ConnectTimeout(addr)),
        };

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "Could not disable Nagle on backend link");
        }
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or(addr);

        Ok(Self::spawn(stream, peer, config, handlers, on_lost))
    }

    /// Start reader and writer tasks over an already-connected stream.
    pub fn spawn<S>(
        stream: S,
        peer: String,
        config: &BackendConfig,
        handlers: Arc<HandlerRegistry>,
        on_lost: Arc<Notify>,
    ) -> Arc<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let id = ConnectionId::new();
        let (read_half, write_half) = tokio::io::split(stream);
        let codec = PacketCodec::new(config.max_frame_bytes);
        let (outbound, rx) = mpsc::channel(config.outbound_buffer);
        let pending = Arc::new(CorrelationTable::new());
        let alive = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        tokio::spawn(write_loop(
            id,
            FramedWrite::new(write_half, codec.clone()),
            rx,
            Arc::clone(&pending),
            cancel.clone(),
        ));

        tokio::spawn(read_loop(
            FramedRead::new(read_half, codec),
            ReadContext {
                id,
                outbound: outbound.clone(),
                pending: Arc::clone(&pending),
                handlers,
                alive: Arc::clone(&alive),
                cancel: cancel.clone(),
                on_lost,
            },
        ));

        tracing::debug!(link_id = %id, peer = %peer, "Link tasks started");

        Arc::new(Self {
            id,
            peer,
            outbound,
            pending,
            alive,
            cancel,
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Calls currently waiting for a response on this link.
    pub fn inflight(&self) -> usize {
        self.pending.len()
    }

    /// Send a request and wait for the correlated response.
    pub async fn request(&self, pattern: &Pattern, data: Value) -> Result<Value, TransportError> {
        if !self.is_alive() {
            return Err(TransportError::ConnectionClosed);
        }

        let pending = self.pending.register();
        let packet = Packet::request(pending.id(), pattern, data);

        // Teardown flips `alive` before failing the table, so a call that
        // registered too late to be failed sees the flag here.
        if !self.is_alive() {
            return Err(TransportError::ConnectionClosed);
        }

        self.outbound
            .send(packet)
            .await
            .map_err(|_| TransportError::ConnectionClosed)?;
        pending.wait().await
    }

    /// Queue an event for the writer. Never waits for queue space.
    pub fn publish(&self, event: &str, data: Value) -> Result<(), TransportError> {
        if !self.is_alive() {
            return Err(TransportError::NotConnected);
        }
        self.outbound
            .try_send(Packet::event(event, data))
            .map_err(|e| match e {
                TrySendError::Full(_) => TransportError::QueueFull,
                TrySendError::Closed(_) => TransportError::NotConnected,
            })
    }

    /// Stop both tasks. In-flight calls fail with `ConnectionClosed`.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("alive", &self.is_alive())
            .field("inflight", &self.pending.len())
            .finish()
    }
}

async fn write_loop<W>(
    id: ConnectionId,
    mut sink: FramedWrite<W, PacketCodec>,
    mut rx: mpsc::Receiver<Packet>,
    pending: Arc<CorrelationTable>,
    cancel: CancellationToken,
) where
    W: AsyncWrite + Unpin + Send,
{
    loop {
        let packet = tokio::select! {
            _ = cancel.cancelled() => break,
            next = rx.recv() => match next {
                Some(packet) => packet,
                None => break,
            },
        };

        let correlation_id = packet.id.clone();
        match sink.send(packet).await {
            Ok(()) => {}
            Err(CodecError::Io(e)) => {
                tracing::warn!(link_id = %id, error = %e, "Write to backend failed");
                break;
            }
            Err(e) => {
                // Nothing reached the socket; only this packet is lost.
                tracing::error!(link_id = %id, error = %e, "Dropping unencodable packet");
                if let Some(cid) = correlation_id {
                    pending.fail(&cid, TransportError::Codec(e));
                }
            }
        }
    }

    if let Err(e) = sink.close().await {
        tracing::debug!(link_id = %id, error = %e, "Error while closing backend socket");
    }
    cancel.cancel();
}

struct ReadContext {
    id: ConnectionId,
    outbound: mpsc::Sender<Packet>,
    pending: Arc<CorrelationTable>,
    handlers: Arc<HandlerRegistry>,
    alive: Arc<AtomicBool>,
    cancel: CancellationToken,
    on_lost: Arc<Notify>,
}

async fn read_loop<R>(mut frames: FramedRead<R, PacketCodec>, ctx: ReadContext)
where
    R: AsyncRead + Unpin + Send,
{
    loop {
        let frame = tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            frame = frames.next() => frame,
        };

        match frame {
            Some(Ok(packet)) => route_inbound(&ctx, packet),
            Some(Err(e)) => {
                tracing::warn!(link_id = %ctx.id, error = %e, "Dropping link after read error");
                break;
            }
            None => {
                tracing::warn!(link_id = %ctx.id, "Backend closed the connection");
                break;
            }
        }
    }

    ctx.alive.store(false, Ordering::SeqCst);
    ctx.cancel.cancel();
    let failed = ctx.pending.fail_all();
    tracing::info!(link_id = %ctx.id, failed_calls = failed, "Link down");
    ctx.on_lost.notify_one();
}

fn route_inbound(ctx: &ReadContext, packet: Packet) {
    match packet.kind() {
        PacketKind::Response { .. } => ctx.pending.resolve(packet),
        PacketKind::Request { id, pattern } => {
            tracing::debug!(link_id = %ctx.id, pattern = %pattern, "Inbound request");
            let reply = ctx
                .handlers
                .answer(&id, &pattern, packet.data.unwrap_or(Value::Null));
            // The reader never waits on the writer; a stalled queue drops
            // the reply instead of stalling response routing.
            match ctx.outbound.try_send(reply) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        link_id = %ctx.id,
                        pattern = %pattern,
                        "Outbound queue full, reply dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(link_id = %ctx.id, "Link closing, reply dropped");
                }
            }
        }
        PacketKind::Event { pattern } => {
            ctx.handlers
                .deliver(&pattern, packet.data.unwrap_or(Value::Null));
        }
        PacketKind::Malformed => {
            tracing::warn!(link_id = %ctx.id, "Ignoring packet with neither id nor pattern");
        }
    }
}
