//! Result transport between nodes

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::context::ContextManager;
use super::plan::NodeId;
use crate::errors::{EngineError, EngineResult};

/// Delivers encoded result requests to a node
pub trait ResultTransport: Send + Sync + fmt::Debug {
    fn send(&self, node: &NodeId, payload: Vec<u8>) -> EngineResult<()>;
}

/// In-process transport: one unbounded channel per bound node
#[derive(Debug, Default)]
pub struct LocalTransport {
    routes: Mutex<HashMap<NodeId, mpsc::UnboundedSender<Vec<u8>>>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `node`, returning its inbox; rebinding replaces the old inbox
    pub fn bind(&self, node: impl Into<NodeId>) -> EngineResult<mpsc::UnboundedReceiver<Vec<u8>>> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.routes
            .lock()
            .map_err(|_| EngineError::execution("transport routes poisoned"))?
            .insert(node.into(), sender);
        Ok(receiver)
    }
}

impl ResultTransport for LocalTransport {
    fn send(&self, node: &NodeId, payload: Vec<u8>) -> EngineResult<()> {
        let routes = self
            .routes
            .lock()
            .map_err(|_| EngineError::execution("transport routes poisoned"))?;
        let sender = routes
            .get(node)
            .ok_or_else(|| EngineError::execution(format!("unknown node {node}")))?;
        sender
            .send(payload)
            .map_err(|_| EngineError::execution(format!("node {node} stopped receiving")))
    }
}

/// Feeds an inbox into the context manager.
///
/// Each payload is handled on its own task so a request waiting for its job
/// to register never holds up requests of other jobs. Errors are logged by
/// the manager and otherwise dropped here.
pub fn spawn_receiver(
    manager: Arc<ContextManager>,
    mut inbox: mpsc::UnboundedReceiver<Vec<u8>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(payload) = inbox.recv().await {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                let _ = manager.receive(payload).await;
            });
        }
    })
}
