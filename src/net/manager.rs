//! Connection manager.
//!
//! Owns the single link to the backend. `connect` is idempotent and safe to
//! race; `supervise` re-establishes the link with exponential backoff after
//! it drops. Readers take the current link through an `ArcSwapOption`
//! snapshot so a reconnect never blocks a call in flight.

use arc_swap::ArcSwapOption;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, Notify};

use crate::config::{BackendConfig, ReconnectConfig};
use crate::net::connection::{ConnectionState, StateCell};
use crate::net::link::Link;
use crate::observability::metrics;
use crate::resilience::Backoff;
use crate::rpc::handlers::HandlerRegistry;
use crate::transport::TransportError;

pub struct ConnectionManager {
    config: BackendConfig,
    handlers: Arc<HandlerRegistry>,
    link: ArcSwapOption<Link>,
    state: StateCell,
    connect_lock: Mutex<()>,
    link_lost: Arc<Notify>,
}

impl ConnectionManager {
    pub fn new(config: BackendConfig, handlers: Arc<HandlerRegistry>) -> Self {
        Self {
            config,
            handlers,
            link: ArcSwapOption::empty(),
            state: StateCell::new(ConnectionState::Disconnected),
            connect_lock: Mutex::new(()),
            link_lost: Arc::new(Notify::new()),
        }
    }

    pub fn address(&self) -> String {
        self.config.address()
    }

    /// Establish the link if it is not already up.
    pub async fn connect(&self) -> Result<(), TransportError> {
        let _guard = self.connect_lock.lock().await;

        if self.is_connected() {
            return Ok(());
        }
        if !self.state.transition(ConnectionState::Connecting) {
            return Err(TransportError::NotConnected);
        }

        let addr = self.config.address();
        tracing::info!(addr = %addr, "Connecting to backend");

        let established = Link::establish(
            &self.config,
            Arc::clone(&self.handlers),
            Arc::clone(&self.link_lost),
        )
        .await;
        match established {
            Ok(link) => {
                let (id, peer) = (link.id(), link.peer().to_string());
                self.link.store(Some(link));

                if !self.state.transition(ConnectionState::Connected) {
                    // Closed while we were dialing.
                    if let Some(link) = self.link.swap(None) {
                        link.close();
                    }
                    return Err(TransportError::NotConnected);
                }

                metrics::record_connect_attempt("success");
                metrics::record_connection_state(ConnectionState::Connected);
                tracing::info!(link_id = %id, peer = %peer, "Successfully connected to backend");
                Ok(())
            }
            Err(e) => {
                self.state.transition(ConnectionState::Disconnected);
                metrics::record_connect_attempt("failure");
                metrics::record_connection_state(ConnectionState::Disconnected);
                tracing::error!(addr = %addr, error = %e, "Failed to connect to backend");
                Err(e)
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link
            .load()
            .as_ref()
            .is_some_and(|link| link.is_alive())
    }

    /// Current state, corrected for a link that died since the last connect.
    pub fn state(&self) -> ConnectionState {
        match self.state.get() {
            ConnectionState::Connected if !self.is_connected() => ConnectionState::Disconnected,
            other => other,
        }
    }

    /// Snapshot of the live link, if any.
    pub fn current_link(&self) -> Option<Arc<Link>> {
        self.link.load_full().filter(|link| link.is_alive())
    }

    /// Tear the link down for good. Later `connect` calls are refused.
    pub fn close(&self) {
        self.state.set(ConnectionState::Closed);
        if let Some(link) = self.link.swap(None) {
            link.close();
            tracing::info!(link_id = %link.id(), "Backend link closed");
        }
        metrics::record_connection_state(ConnectionState::Closed);
        self.link_lost.notify_one();
    }

    /// Keep the link up until shutdown or `close`.
    pub async fn supervise(
        self: Arc<Self>,
        reconnect: ReconnectConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut backoff = Backoff::new(&reconnect);
        tracing::info!(addr = %self.address(), "Connection supervisor started");

        loop {
            if self.state.get() == ConnectionState::Closed {
                break;
            }

            if self.is_connected() {
                backoff.reset();
                tokio::select! {
                    _ = self.link_lost.notified() => {
                        if !self.is_connected() && self.state.get() != ConnectionState::Closed {
                            metrics::record_connection_state(ConnectionState::Disconnected);
                            tracing::warn!("Backend link lost, reconnecting");
                        }
                        continue;
                    }
                    _ = shutdown.recv() => break,
                }
            }

            let delay = backoff.next_delay();
            tracing::info!(
                attempt = backoff.attempts(),
                delay_ms = delay.as_millis() as u64,
                "Scheduling backend reconnect"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.recv() => break,
            }

            // Failure is logged inside; the loop backs off and tries again.
            let _ = self.connect().await;
        }

        tracing::info!("Connection supervisor stopped");
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("addr", &self.config.address())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    fn backend_at(port: u16) -> BackendConfig {
        BackendConfig {
            host: "127.0.0.1".into(),
            port,
            connect_timeout_ms: 1000,
            ..Default::default()
        }
    }

    async fn unused_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_connect_failure_leaves_disconnected() {
        let manager = ConnectionManager::new(
            backend_at(unused_port().await),
            Arc::new(HandlerRegistry::new()),
        );

        assert!(manager.connect().await.is_err());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(manager.current_link().is_none());
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepts = tokio::spawn(async move {
            let mut sockets = Vec::new();
            while let Ok(Ok((socket, _))) =
                tokio::time::timeout(Duration::from_millis(300), listener.accept()).await
            {
                sockets.push(socket);
            }
            sockets.len()
        });

        let manager = ConnectionManager::new(backend_at(port), Arc::new(HandlerRegistry::new()));
        manager.connect().await.unwrap();
        let first = manager.current_link().unwrap().id();
        manager.connect().await.unwrap();

        assert_eq!(manager.current_link().unwrap().id(), first);
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(accepts.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_close_is_terminal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _accept = tokio::spawn(async move { listener.accept().await });

        let manager = ConnectionManager::new(backend_at(port), Arc::new(HandlerRegistry::new()));
        manager.connect().await.unwrap();
        manager.close();

        assert_eq!(manager.state(), ConnectionState::Closed);
        assert!(!manager.is_connected());
        assert!(manager.connect().await.is_err());
    }

    #[tokio::test]
    async fn test_supervisor_reconnects_after_drop() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let manager = Arc::new(ConnectionManager::new(
            backend_at(port),
            Arc::new(HandlerRegistry::new()),
        ));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let connect = manager.connect();
        let (first, _) = tokio::join!(listener.accept(), connect);
        let (first_socket, _) = first.unwrap();
        let first_id = manager.current_link().unwrap().id();

        let reconnect = ReconnectConfig {
            enabled: true,
            base_delay_ms: 10,
            max_delay_ms: 50,
        };
        let supervisor = tokio::spawn(Arc::clone(&manager).supervise(reconnect, shutdown_rx));

        drop(first_socket);
        let (_second_socket, _) = tokio::time::timeout(Duration::from_secs(5), listener.accept())
            .await
            .unwrap()
            .unwrap();

        let mut relinked = false;
        for _ in 0..100 {
            if manager.current_link().is_some_and(|link| link.id() != first_id) {
                relinked = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(relinked);

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), supervisor).await.unwrap().unwrap();
    }
}
