//! Command dispatch and query gateway for a pool of terminal sessions.
//!
//! The gateway fronts externally managed terminal endpoints (modem / SMS
//! hardware) with a small cookie-authenticated HTTP API: dispatch a command
//! to a named terminal, page through the activity log, inspect per-terminal
//! log files and the connected-client roster. Command replies always use the
//! `{success, data?}` envelope with HTTP 200; transport never encodes
//! command failure.
//!
//! The gateway may be mounted under a path prefix behind a reverse proxy;
//! [`uri::PathResolver`] keeps every generated link and cookie path aware of
//! that prefix.

pub mod activity;
pub mod api;
pub mod config;
pub mod dispatch;
pub mod session;
pub mod terminal;
pub mod uri;
