//! Login sessions.
//!
//! A successful login binds a [`Principal`] to a random session id carried in
//! a cookie. Sessions live in memory with a fixed TTL; persistence across
//! restarts is the deployment's problem, not this gateway's.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use subtle::ConstantTimeEq;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "termgw_sid";

/// The fixed login failure message. Deliberately uninformative so a caller
/// cannot tell an unknown user from a wrong password.
pub const LOGIN_FAILED: &str = "Invalid username and/or password";

/// The authenticated identity bound to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
}

struct SessionEntry {
    principal: Principal,
    expires: Instant,
}

/// In-memory store of logged-in sessions keyed by random id.
///
/// Expired entries are pruned on access. `destroy` is idempotent: destroying
/// an id that was never issued (or already expired) is a no-op.
pub struct SessionStore {
    ttl: Duration,
    inner: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Bind a principal to a fresh session. Returns the session id to set as
    /// a cookie.
    pub fn create(&self, principal: Principal) -> String {
        let sid: String = rand::thread_rng()
            .sample_iter(&rand::distributions::Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();

        let mut map = self.inner.lock();
        let now = Instant::now();
        map.retain(|_, entry| entry.expires > now);
        map.insert(
            sid.clone(),
            SessionEntry {
                principal,
                expires: now + self.ttl,
            },
        );
        sid
    }

    /// Look up the principal for a session id, if the session is still live.
    pub fn get(&self, sid: &str) -> Option<Principal> {
        let mut map = self.inner.lock();
        match map.get(sid) {
            Some(entry) if entry.expires > Instant::now() => Some(entry.principal.clone()),
            Some(_) => {
                map.remove(sid);
                None
            }
            None => None,
        }
    }

    /// Drop a session. No-op when the id is unknown.
    pub fn destroy(&self, sid: &str) {
        self.inner.lock().remove(sid);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// Credential check, delegated to whatever identity backend the deployment
/// wires in.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify a username/password pair. Both are opaque strings; no
    /// client-side hashing is assumed.
    async fn authenticate(&self, username: &str, password: &str) -> bool;
}

/// Identity provider backed by one fixed credential pair from config.
pub struct StaticCredentials {
    username: String,
    password: String,
}

impl StaticCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticCredentials {
    async fn authenticate(&self, username: &str, password: &str) -> bool {
        if username.is_empty() || password.is_empty() {
            return false;
        }
        // Compare both fields unconditionally, in constant time.
        let user_ok: bool = username
            .as_bytes()
            .ct_eq(self.username.as_bytes())
            .into();
        let pass_ok: bool = password
            .as_bytes()
            .ct_eq(self.password.as_bytes())
            .into();
        user_ok & pass_ok
    }
}
