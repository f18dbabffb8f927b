//! Production transport over the managed backend link.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::net::manager::ConnectionManager;
use crate::rpc::packet::Pattern;
use crate::transport::{Transport, TransportError};

#[derive(Debug, Clone)]
pub struct TcpTransport {
    manager: Arc<ConnectionManager>,
}

impl TcpTransport {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, pattern: &Pattern, data: Value) -> Result<Value, TransportError> {
        let link = self.manager.current_link().ok_or(TransportError::NotConnected)?;
        link.request(pattern, data).await
    }

    async fn emit(&self, event: &str, data: Value) -> Result<(), TransportError> {
        let link = self.manager.current_link().ok_or(TransportError::NotConnected)?;
        link.publish(event, data)
    }

    fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }
}
