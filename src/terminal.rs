//! Terminal pool contracts.
//!
//! The actual terminal pool lives outside this gateway (hardware/modem-backed
//! endpoints driven by a separate process). The gateway only needs the narrow
//! surface below: look a terminal up by identifier, issue one command and
//! await its result, and enumerate connected dashboard clients. An in-process
//! [`TerminalPool`] implements the registry for embedding and for tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;

/// Why a terminal query did not produce a value.
///
/// The legacy wire protocol collapsed every failure into a bare
/// `{success:false}` plus an optional free-text payload; this union keeps the
/// kinds apart so logs and callers can tell a rejected command from a broken
/// transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    /// The terminal understood the command and refused it.
    #[error("terminal rejected command: {0}")]
    Rejected(String),
    /// The command never reached the terminal, or the link died mid-flight.
    /// Carries the raw payload the transport produced.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// A connected dashboard client as reported by the pool.
#[derive(Debug, Clone, Serialize)]
pub struct ClientInfo {
    pub id: String,
    pub address: String,
    pub time: Option<DateTime<Utc>>,
}

/// One pooled terminal. The gateway holds a reference only for the duration
/// of a dispatch.
#[async_trait]
pub trait Terminal: Send + Sync {
    /// Identifier the terminal is pooled under.
    fn id(&self) -> &str;

    /// Log file this terminal writes to, if any.
    fn log_file(&self) -> Option<&Path>;

    /// Execute one command and await its outcome.
    ///
    /// `Ok(None)` means the command completed without producing a value.
    /// Ordering of concurrent queries against the same terminal is the
    /// pool's business, not the gateway's.
    async fn query(&self, command: &str) -> Result<Option<serde_json::Value>, QueryError>;
}

/// Lookup surface of the terminal pool.
pub trait TerminalRegistry: Send + Sync {
    /// Find a terminal by identifier.
    fn get(&self, id: &str) -> Option<Arc<dyn Terminal>>;

    /// Enumerate connected dashboard clients.
    fn clients(&self) -> Vec<ClientInfo>;
}

/// In-process terminal registry.
#[derive(Clone, Default)]
pub struct TerminalPool {
    terminals: Arc<RwLock<HashMap<String, Arc<dyn Terminal>>>>,
    clients: Arc<RwLock<Vec<ClientInfo>>>,
}

impl TerminalPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a terminal under its own identifier.
    pub fn insert(&self, terminal: Arc<dyn Terminal>) {
        let id = terminal.id().to_string();
        self.terminals.write().insert(id, terminal);
    }

    /// Remove a terminal. No-op when the identifier is unknown.
    pub fn remove(&self, id: &str) {
        self.terminals.write().remove(id);
    }

    pub fn len(&self) -> usize {
        self.terminals.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.terminals.read().is_empty()
    }

    /// Record a connected dashboard client.
    pub fn add_client(&self, client: ClientInfo) {
        self.clients.write().push(client);
    }

    /// Forget a dashboard client by id.
    pub fn remove_client(&self, id: &str) {
        self.clients.write().retain(|c| c.id != id);
    }
}

impl TerminalRegistry for TerminalPool {
    fn get(&self, id: &str) -> Option<Arc<dyn Terminal>> {
        self.terminals.read().get(id).cloned()
    }

    fn clients(&self) -> Vec<ClientInfo> {
        self.clients.read().clone()
    }
}

/// A pool terminal whose log lives at a fixed path and whose queries are
/// served by a caller-supplied async responder. The embedding process wires
/// the responder to the real device link.
pub struct PooledTerminal<F> {
    id: String,
    log_file: Option<PathBuf>,
    responder: F,
}

impl<F, Fut> PooledTerminal<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Option<serde_json::Value>, QueryError>> + Send,
{
    pub fn new(id: impl Into<String>, log_file: Option<PathBuf>, responder: F) -> Self {
        Self {
            id: id.into(),
            log_file,
            responder,
        }
    }
}

#[async_trait]
impl<F, Fut> Terminal for PooledTerminal<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Option<serde_json::Value>, QueryError>> + Send,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    async fn query(&self, command: &str) -> Result<Option<serde_json::Value>, QueryError> {
        (self.responder)(command.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_terminal(id: &str) -> Arc<dyn Terminal> {
        Arc::new(PooledTerminal::new(id, None, |cmd: String| async move {
            Ok::<_, QueryError>(Some(serde_json::Value::String(cmd)))
        }))
    }

    #[test]
    fn pool_lookup_by_id() {
        let pool = TerminalPool::new();
        pool.insert(echo_terminal("gsm-1"));
        assert!(pool.get("gsm-1").is_some());
        assert!(pool.get("gsm-2").is_none());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn pool_remove_is_idempotent() {
        let pool = TerminalPool::new();
        pool.insert(echo_terminal("gsm-1"));
        pool.remove("gsm-1");
        pool.remove("gsm-1");
        assert!(pool.is_empty());
    }

    #[test]
    fn insert_replaces_same_id() {
        let pool = TerminalPool::new();
        pool.insert(echo_terminal("gsm-1"));
        pool.insert(echo_terminal("gsm-1"));
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test]
    async fn pooled_terminal_runs_responder() {
        let term = PooledTerminal::new("gsm-1", None, |cmd: String| async move {
            if cmd == "AT" {
                Ok(Some(serde_json::json!("OK")))
            } else {
                Err(QueryError::Rejected("ERROR".into()))
            }
        });
        assert_eq!(term.query("AT").await.unwrap(), Some(serde_json::json!("OK")));
        assert_eq!(
            term.query("AT+BAD").await.unwrap_err(),
            QueryError::Rejected("ERROR".into())
        );
    }

    #[test]
    fn client_roster_add_remove() {
        let pool = TerminalPool::new();
        pool.add_client(ClientInfo {
            id: "c1".into(),
            address: "127.0.0.1".into(),
            time: Some(Utc::now()),
        });
        pool.add_client(ClientInfo {
            id: "c2".into(),
            address: "10.0.0.2".into(),
            time: None,
        });
        assert_eq!(pool.clients().len(), 2);
        pool.remove_client("c1");
        let clients = pool.clients();
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].id, "c2");
    }
}
