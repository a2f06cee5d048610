use std::sync::Arc;

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::session::{Principal, SessionStore, SESSION_COOKIE};
use crate::uri::PathResolver;

use super::error::ApiError;

/// Extract the session id from the Cookie header.
pub(super) fn session_id(headers: &axum::http::HeaderMap) -> Option<String> {
    let cookies = headers.get("cookie")?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

/// True when the client is a browser navigating to a page (as opposed to an
/// XHR/JSON client), judged by the Accept header.
fn wants_html(req: &Request) -> bool {
    req.method() == axum::http::Method::GET
        && req
            .headers()
            .get("accept")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("text/html"))
            .unwrap_or(false)
}

/// Session gate in front of every protected route.
///
/// A live session puts the [`Principal`] into request extensions and lets the
/// request through. Without one, browsers are redirected to the login page
/// (carrying the original path as the `r` redirect target) and JSON clients
/// get a 401.
pub async fn require_session(
    sessions: Arc<SessionStore>,
    resolver: PathResolver,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(sid) = session_id(req.headers()) {
        if let Some(principal) = sessions.get(&sid) {
            let mut req = req;
            req.extensions_mut().insert::<Principal>(principal);
            return Ok(next.run(req).await);
        }
    }

    if wants_html(&req) {
        let target = format!("{}?r={}", resolver.resolve("/login"), req.uri().path());
        return Ok(Redirect::to(&target).into_response());
    }

    Err(ApiError::AuthRequired)
}
