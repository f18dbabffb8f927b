//! Shared utilities for integration tests.
//!
//! `MockBackend` speaks the gateway's wire protocol on an ephemeral port and
//! answers calls from a script. `start_gateway` wires a full gateway against
//! it and serves HTTP on another ephemeral port.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Notify};
use tokio_util::codec::Framed;

use service_gateway::config::GatewayConfig;
use service_gateway::lifecycle::{bootstrap, Shutdown};
use service_gateway::net::codec::PacketCodec;
use service_gateway::net::manager::ConnectionManager;
use service_gateway::rpc::packet::{Packet, PacketKind};

/// What the mock backend does with one call.
#[derive(Debug, Clone)]
pub enum Reply {
    Respond(Value),
    Error(String),
    /// Never answer.
    Silent,
    /// Drop the connection without answering.
    Hangup,
}

type Script = Arc<dyn Fn(&str, &Value) -> Reply + Send + Sync>;

pub struct MockBackend {
    addr: SocketAddr,
    calls: Arc<AtomicUsize>,
    events: Arc<Mutex<Vec<(String, Value)>>>,
    outbound: Arc<Mutex<Option<mpsc::UnboundedSender<Packet>>>>,
    answers: tokio::sync::Mutex<mpsc::UnboundedReceiver<Packet>>,
    kick: Arc<Notify>,
    connections: Arc<AtomicUsize>,
}

impl MockBackend {
    pub async fn start<F>(script: F) -> Self
    where
        F: Fn(&str, &Value) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let script: Script = Arc::new(script);
        let calls = Arc::new(AtomicUsize::new(0));
        let events = Arc::new(Mutex::new(Vec::new()));
        let outbound = Arc::new(Mutex::new(None));
        let (answers_tx, answers_rx) = mpsc::unbounded_channel();
        let kick = Arc::new(Notify::new());
        let connections = Arc::new(AtomicUsize::new(0));

        {
            let (calls, events, outbound, kick, connections) = (
                calls.clone(),
                events.clone(),
                outbound.clone(),
                kick.clone(),
                connections.clone(),
            );
            tokio::spawn(async move {
                while let Ok((socket, _)) = listener.accept().await {
                    tokio::spawn(serve_connection(
                        socket,
                        script.clone(),
                        calls.clone(),
                        events.clone(),
                        outbound.clone(),
                        answers_tx.clone(),
                        kick.clone(),
                        connections.clone(),
                    ));
                }
            });
        }

        Self {
            addr,
            calls,
            events,
            outbound,
            answers: tokio::sync::Mutex::new(answers_rx),
            kick,
            connections,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Connections the backend has started serving.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Wait until the backend serves its `n`th connection.
    ///
    /// The gateway sees its connect complete before the accept loop here
    /// has run, so tests that talk from the backend side wait on this.
    pub async fn wait_for_connection(&self, n: usize) {
        for _ in 0..200 {
            if self.connection_count() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} connections, got {}", n, self.connection_count());
    }

    pub fn events(&self) -> Vec<(String, Value)> {
        self.events.lock().unwrap().clone()
    }

    /// Wait until at least `n` events arrived.
    pub async fn wait_for_events(&self, n: usize) -> Vec<(String, Value)> {
        for _ in 0..200 {
            let events = self.events();
            if events.len() >= n {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} events, got {:?}", n, self.events());
    }

    /// Send a request to the gateway over the live connection and wait for
    /// its reply.
    pub async fn query(&self, id: &str, pattern: Value, data: Value) -> Packet {
        let sender = self
            .outbound
            .lock()
            .unwrap()
            .clone()
            .expect("no gateway connected");
        sender
            .send(Packet {
                id: Some(id.to_string()),
                pattern: Some(pattern),
                data: Some(data),
                ..Default::default()
            })
            .unwrap();

        let mut answers = self.answers.lock().await;
        tokio::time::timeout(Duration::from_secs(5), answers.recv())
            .await
            .expect("gateway did not answer")
            .expect("answer channel closed")
    }

    /// Drop the current gateway connection.
    pub fn kick(&self) {
        self.kick.notify_waiters();
    }
}

#[allow(clippy::too_many_arguments)]
async fn serve_connection(
    socket: TcpStream,
    script: Script,
    calls: Arc<AtomicUsize>,
    events: Arc<Mutex<Vec<(String, Value)>>>,
    outbound: Arc<Mutex<Option<mpsc::UnboundedSender<Packet>>>>,
    answers: mpsc::UnboundedSender<Packet>,
    kick: Arc<Notify>,
    connections: Arc<AtomicUsize>,
) {
    let (mut sink, mut stream) = Framed::new(socket, PacketCodec::new(1024 * 1024)).split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Packet>();
    *outbound.lock().unwrap() = Some(tx.clone());
    connections.fetch_add(1, Ordering::SeqCst);

    loop {
        tokio::select! {
            _ = kick.notified() => break,
            Some(packet) = rx.recv() => {
                if sink.send(packet).await.is_err() {
                    break;
                }
            }
            frame = stream.next() => {
                let packet = match frame {
                    Some(Ok(packet)) => packet,
                    _ => break,
                };
                match packet.kind() {
                    PacketKind::Request { id, pattern } => {
                        calls.fetch_add(1, Ordering::SeqCst);
                        let data = packet.data.clone().unwrap_or(Value::Null);
                        match script(&pattern, &data) {
                            Reply::Respond(value) => {
                                let _ = tx.send(Packet::reply(id, value));
                            }
                            Reply::Error(message) => {
                                let _ = tx.send(Packet::error_reply(id, &message));
                            }
                            Reply::Silent => {}
                            Reply::Hangup => break,
                        }
                    }
                    PacketKind::Event { pattern } => {
                        let data = packet.data.unwrap_or(Value::Null);
                        events.lock().unwrap().push((pattern, data));
                    }
                    PacketKind::Response { .. } => {
                        let _ = answers.send(packet);
                    }
                    PacketKind::Malformed => {}
                }
            }
        }
    }
}

/// A gateway serving HTTP on an ephemeral port.
pub struct TestGateway {
    pub base_url: String,
    pub manager: Arc<ConnectionManager>,
    pub shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Wait until the gateway holds a live link.
    pub async fn wait_connected(&self) {
        for _ in 0..200 {
            if self.manager.is_connected() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("gateway never connected");
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Config pointing at `backend`, with fast reconnects for tests.
pub fn config_for(backend: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.backend.host = backend.ip().to_string();
    config.backend.port = backend.port();
    config.backend.connect_timeout_ms = 500;
    config.reconnect.base_delay_ms = 20;
    config.reconnect.max_delay_ms = 100;
    config
}

/// Bootstrap a full gateway from `config` and serve it.
pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    let shutdown = Shutdown::new();
    let gateway = bootstrap(&config, &shutdown).await;
    let manager = gateway.manager().clone();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let serve_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = gateway.serve(listener, &serve_shutdown).await;
    });

    TestGateway {
        base_url: format!("http://{}", addr),
        manager,
        shutdown,
    }
}

/// An address nothing listens on.
pub async fn unreachable_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
