//! Session registry
//!
//! Maps session ids to live [`SessionContext`]s. Every entry is removed by a
//! single guard owned by a watcher task that waits on the session's close
//! signal, so an explicit DELETE, an idle eviction and shutdown all funnel
//! through the same removal path and an entry disappears exactly once.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::server::session::SessionContext;
use crate::tools::ToolServer;

type SessionMap = RwLock<HashMap<String, Arc<SessionContext>>>;

/// Live sessions keyed by id
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<SessionMap>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<SessionContext>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<SessionContext>>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a session under a fresh random id and register it
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open(&self, server: Arc<ToolServer>) -> Arc<SessionContext> {
        let context = {
            let mut sessions = self.write();
            let mut id = Uuid::new_v4().to_string();
            while sessions.contains_key(&id) {
                id = Uuid::new_v4().to_string();
            }
            let context = Arc::new(SessionContext::new(id.clone(), server));
            sessions.insert(id, context.clone());
            context
        };

        let registration = Registration {
            sessions: Arc::downgrade(&self.sessions),
            id: context.id().to_string(),
        };
        let mut closed = context.closed();
        tokio::spawn(async move {
            let _registration = registration;
            // Errors only if the sender is gone, which also means closed.
            let _ = closed.wait_for(|closed| *closed).await;
        });

        info!(session = %context.id(), "Session opened");
        context
    }

    /// Look up a session; closed sessions are treated as unknown
    pub fn get(&self, id: &str) -> Option<Arc<SessionContext>> {
        self.read().get(id).filter(|ctx| !ctx.is_closed()).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Close a session by id; `false` if it was unknown or already closing
    pub fn close(&self, id: &str) -> bool {
        self.get(id).is_some_and(|ctx| ctx.close())
    }

    /// Number of registered entries, including ones still being torn down
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Close every session idle for longer than `max_idle`
    pub fn close_idle(&self, max_idle: Duration) -> usize {
        let stale: Vec<Arc<SessionContext>> = self
            .read()
            .values()
            .filter(|ctx| ctx.idle_for() > max_idle)
            .cloned()
            .collect();

        let mut reaped = 0;
        for ctx in stale {
            if ctx.close() {
                info!(session = %ctx.id(), "Reaping idle session");
                reaped += 1;
            }
        }
        reaped
    }

    /// Close all sessions, e.g. on shutdown
    pub fn close_all(&self) {
        let all: Vec<Arc<SessionContext>> = self.read().values().cloned().collect();
        for ctx in all {
            ctx.close();
        }
    }

    /// Periodically close idle sessions until the returned task is aborted
    pub fn spawn_reaper(&self, max_idle: Duration, interval: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let reaped = registry.close_idle(max_idle);
                debug!(sessions = registry.len(), reaped, "Reaper tick");
            }
        })
    }
}

/// Removes its session from the map when dropped
struct Registration {
    sessions: Weak<SessionMap>,
    id: String,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let Some(sessions) = self.sessions.upgrade() else {
            return;
        };
        let removed = sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
        if removed.is_some() {
            info!(session = %self.id, "Session closed");
        }
    }
}
