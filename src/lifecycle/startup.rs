//! Startup orchestration.
//!
//! # Responsibilities
//! - Register reverse handlers before any link exists
//! - Make the initial backend connection (failure is not fatal)
//! - Start the reconnect supervisor
//! - Assemble the gateway service and HTTP server
//!
//! # Design Decisions
//! - Subsystems initialize in order, not concurrently
//! - Teardown happens in reverse: HTTP drains, supervisor stops, link closes

use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::GatewayConfig;
use crate::gateway::GatewayService;
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::net::manager::ConnectionManager;
use crate::rpc::handlers::HandlerRegistry;
use crate::rpc::status::register_reverse_handlers;
use crate::transport::{TcpTransport, Transport};

/// A fully wired gateway, ready to serve.
pub struct Gateway {
    manager: Arc<ConnectionManager>,
    service: Arc<GatewayService>,
    server: HttpServer,
    supervisor: Option<JoinHandle<()>>,
}

/// Wire every subsystem from `config`.
pub async fn bootstrap(config: &GatewayConfig, shutdown: &Shutdown) -> Gateway {
    let handlers = Arc::new(HandlerRegistry::new());
    register_reverse_handlers(&handlers);

    let manager = Arc::new(ConnectionManager::new(config.backend.clone(), handlers));
    if let Err(e) = manager.connect().await {
        tracing::warn!(
            addr = %manager.address(),
            error = %e,
            "Starting without a backend link; calls fail until it connects"
        );
    }

    let supervisor = if config.reconnect.enabled {
        Some(tokio::spawn(
            Arc::clone(&manager).supervise(config.reconnect.clone(), shutdown.subscribe()),
        ))
    } else {
        tracing::info!("Backend reconnect disabled");
        None
    };

    let transport: Arc<dyn Transport> = Arc::new(TcpTransport::new(Arc::clone(&manager)));
    let service =
        Arc::new(GatewayService::new(transport, config).with_manager(Arc::clone(&manager)));
    let server = HttpServer::new(config, Arc::clone(&service));

    tracing::info!(
        call_deadline_ms = config.timeouts.call_ms,
        fixtures = config.fixtures.enabled,
        circuit_breaker = config.circuit_breaker.enabled,
        "Gateway assembled"
    );

    Gateway {
        manager,
        service,
        server,
        supervisor,
    }
}

impl Gateway {
    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    pub fn service(&self) -> &Arc<GatewayService> {
        &self.service
    }

    /// Serve HTTP on `listener` until shutdown, then tear everything down.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: &Shutdown,
    ) -> Result<(), std::io::Error> {
        let Gateway {
            manager,
            server,
            supervisor,
            ..
        } = self;

        let result = server.run(listener, shutdown.subscribe()).await;

        // The server may have stopped on its own; make sure the rest follows.
        shutdown.trigger();
        if let Some(handle) = supervisor {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Connection supervisor panicked");
            }
        }
        manager.close();

        result
    }
}
