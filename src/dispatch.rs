//! Command dispatch.
//!
//! Routes a client-submitted command string to one pooled terminal and
//! normalizes the asynchronous outcome into the stable `{success, data?}`
//! envelope the dashboard expects. At-most-once per HTTP request: the
//! dispatcher never retries, a client resubmits to retry.

use std::time::Duration;

use serde::Serialize;

use crate::terminal::{QueryError, TerminalRegistry};

/// Wire envelope for a dispatched command.
///
/// `success=true` carries the stringified result in `data` when the terminal
/// produced one. `success=false` carries the failure text in `data`, except
/// for an unknown terminal which stays a bare `{success:false}` (legacy
/// shape kept for client compatibility).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CommandReply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// What actually happened, before flattening onto the wire. Logged so an
/// operator can tell an absent terminal from a rejected command even though
/// both are unsuccessful replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Query fulfilled; `None` when it produced no value.
    Completed(Option<serde_json::Value>),
    /// No terminal with that identifier in the registry.
    Absent,
    /// The terminal refused the command.
    Rejected(String),
    /// The transport failed; carries the raw payload.
    Transport(String),
    /// The query did not settle before the dispatch deadline.
    TimedOut,
}

impl DispatchOutcome {
    /// Flatten onto the legacy wire envelope.
    pub fn into_reply(self) -> CommandReply {
        match self {
            DispatchOutcome::Completed(value) => CommandReply {
                success: true,
                data: match value {
                    None | Some(serde_json::Value::Null) => None,
                    Some(serde_json::Value::String(s)) if s.is_empty() => None,
                    Some(value) => Some(value.to_string()),
                },
            },
            DispatchOutcome::Absent => CommandReply {
                success: false,
                data: None,
            },
            DispatchOutcome::Rejected(message) => CommandReply {
                success: false,
                data: Some(message),
            },
            DispatchOutcome::Transport(payload) => CommandReply {
                success: false,
                data: Some(payload),
            },
            DispatchOutcome::TimedOut => CommandReply {
                success: false,
                data: Some("command timed out".to_string()),
            },
        }
    }
}

/// Dispatch `command` to the terminal registered under `term`.
///
/// Suspends the calling request until the terminal responds or `timeout`
/// expires. Never panics past this boundary; every outcome funnels into
/// [`DispatchOutcome`]. Concurrent dispatches to the same identifier are not
/// serialized here.
pub async fn dispatch(
    registry: &dyn TerminalRegistry,
    term: &str,
    command: &str,
    timeout: Duration,
) -> DispatchOutcome {
    let Some(terminal) = registry.get(term) else {
        tracing::debug!(term, "dispatch to unknown terminal");
        return DispatchOutcome::Absent;
    };

    match tokio::time::timeout(timeout, terminal.query(command)).await {
        Ok(Ok(value)) => {
            tracing::debug!(term, has_value = value.is_some(), "command completed");
            DispatchOutcome::Completed(value)
        }
        Ok(Err(QueryError::Rejected(message))) => {
            tracing::debug!(term, %message, "command rejected");
            DispatchOutcome::Rejected(message)
        }
        Ok(Err(QueryError::Transport(payload))) => {
            tracing::warn!(term, %payload, "transport failure during dispatch");
            DispatchOutcome::Transport(payload)
        }
        Err(_) => {
            tracing::warn!(term, ?timeout, "dispatch timed out");
            DispatchOutcome::TimedOut
        }
    }
}
