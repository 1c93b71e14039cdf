//! Tool catalog bridge
//!
//! Connects to the tool host once, converts its tool list into the function
//! declarations the LLM expects and caches both for every later request.
//! The cached session reopens itself when the tool host stops recognising
//! it, which happens after idle eviction or a tool-host restart.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::core::{Result, ToolDefinition, ToolchatError};
use crate::mcp::{CallToolResult, ToolDescriptor, ToolHost, ToolHostConnector};

/// Live tool-host session plus the catalog fetched through it
pub struct ToolHostHandle {
    host: Arc<dyn ToolHost>,
    tools: Vec<ToolDefinition>,
}

impl ToolHostHandle {
    pub fn new(host: Arc<dyn ToolHost>, tools: Vec<ToolDefinition>) -> Self {
        Self { host, tools }
    }

    /// The session used for tool invocations
    pub fn host(&self) -> &dyn ToolHost {
        self.host.as_ref()
    }

    /// Function declarations in tool-host order
    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }
}

type ConnectOutcome = std::result::Result<Arc<ToolHostHandle>, Arc<ToolchatError>>;
type PendingConnect = Shared<BoxFuture<'static, ConnectOutcome>>;

enum Slot {
    Empty,
    Connecting(PendingConnect),
    Ready(Arc<ToolHostHandle>),
}

/// Lazily connected, shared tool catalog
///
/// The first caller of [`ToolCatalog::ensure_connected`] starts the connect;
/// callers arriving while it runs await the same attempt and get the same
/// handle or the same error. A failed attempt caches nothing, so the next
/// caller after it tries again.
pub struct ToolCatalog {
    connector: Arc<dyn ToolHostConnector>,
    slot: Mutex<Slot>,
}

impl ToolCatalog {
    pub fn new(connector: Arc<dyn ToolHostConnector>) -> Self {
        Self {
            connector,
            slot: Mutex::new(Slot::Empty),
        }
    }

    /// Return the cached handle, connecting on first use
    pub async fn ensure_connected(&self) -> Result<Arc<ToolHostHandle>> {
        let pending = {
            let mut slot = self.lock_slot();
            match &*slot {
                Slot::Ready(handle) => return Ok(handle.clone()),
                Slot::Connecting(pending) => pending.clone(),
                Slot::Empty => {
                    let pending = load(self.connector.clone()).boxed().shared();
                    *slot = Slot::Connecting(pending.clone());
                    pending
                }
            }
        };

        let outcome = pending.clone().await;

        {
            let mut slot = self.lock_slot();
            // A disconnect during the attempt wins over its outcome.
            if matches!(&*slot, Slot::Connecting(current) if current.ptr_eq(&pending)) {
                *slot = match &outcome {
                    Ok(handle) => Slot::Ready(handle.clone()),
                    Err(_) => Slot::Empty,
                };
            }
        }

        outcome.map_err(ToolchatError::Shared)
    }

    /// Close the tool-host session and drop the cache; the next call reconnects
    pub async fn disconnect(&self) -> Result<()> {
        let previous = std::mem::replace(&mut *self.lock_slot(), Slot::Empty);
        if let Slot::Ready(handle) = previous {
            handle.host.close().await?;
            info!("Disconnected from tool host");
        }
        Ok(())
    }

    /// Whether a handle is cached
    pub async fn is_connected(&self) -> bool {
        matches!(*self.lock_slot(), Slot::Ready(_))
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Open a session and fetch its catalog
async fn load(connector: Arc<dyn ToolHostConnector>) -> ConnectOutcome {
    let host = connector.connect().await.map_err(Arc::new)?;
    let descriptors = match host.list_tools().await {
        Ok(descriptors) => descriptors,
        Err(e) => {
            if let Err(close_err) = host.close().await {
                warn!(error = %close_err, "Failed to close tool host session");
            }
            return Err(Arc::new(e));
        }
    };

    let tools: Vec<ToolDefinition> = descriptors.into_iter().map(to_function_definition).collect();
    info!(
        tools = ?tools.iter().map(ToolDefinition::name).collect::<Vec<_>>(),
        "Tool catalog loaded"
    );

    let host = Arc::new(ResumableHost::new(connector, host));
    Ok(Arc::new(ToolHostHandle::new(host, tools)))
}

/// Tool-host session that reopens itself once the host rejects its id
///
/// The catalog stays as fetched; only the session underneath is replaced.
/// A rejected request never ran, so it is retried once on the new session.
struct ResumableHost {
    connector: Arc<dyn ToolHostConnector>,
    current: RwLock<Arc<dyn ToolHost>>,
}

impl ResumableHost {
    fn new(connector: Arc<dyn ToolHostConnector>, host: Arc<dyn ToolHost>) -> Self {
        Self {
            connector,
            current: RwLock::new(host),
        }
    }

    async fn current(&self) -> Arc<dyn ToolHost> {
        self.current.read().await.clone()
    }

    /// Swap `stale` for a fresh session unless another caller already did
    async fn reopen(&self, stale: &Arc<dyn ToolHost>) -> Result<Arc<dyn ToolHost>> {
        let mut current = self.current.write().await;
        if !Arc::ptr_eq(&*current, stale) {
            return Ok(current.clone());
        }

        let fresh = self.connector.connect().await?;
        info!("Reopened tool host session");
        *current = fresh.clone();
        Ok(fresh)
    }
}

#[async_trait]
impl ToolHost for ResumableHost {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let host = self.current().await;
        match host.list_tools().await {
            Err(e) if e.is_session_lost() => {
                warn!(error = %e, "Tool host dropped the session");
                self.reopen(&host).await?.list_tools().await
            }
            outcome => outcome,
        }
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult> {
        let host = self.current().await;
        match host.call_tool(name, arguments.clone()).await {
            Err(e) if e.is_session_lost() => {
                warn!(tool = name, error = %e, "Tool host dropped the session");
                self.reopen(&host).await?.call_tool(name, arguments).await
            }
            outcome => outcome,
        }
    }

    async fn close(&self) -> Result<()> {
        self.current().await.close().await
    }
}

/// Rename a tool-host descriptor into an LLM function declaration
///
/// The input schema already is JSON Schema and passes through unchanged.
pub fn to_function_definition(descriptor: ToolDescriptor) -> ToolDefinition {
    ToolDefinition::function(descriptor.name, descriptor.description, descriptor.input_schema)
}
