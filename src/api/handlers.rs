use axum::{
    extract::{rejection::JsonRejection, FromRequest, Path, Query, Request, State},
    http::{
        header::{CONTENT_TYPE, SET_COOKIE},
        HeaderMap,
    },
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::activity;
use crate::dispatch;
use crate::session::{Principal, LOGIN_FAILED, SESSION_COOKIE};
use crate::uri::RequestOrigin;

use super::auth::session_id;
use super::error::ApiError;
use super::AppState;

/// Timestamp format shared with the activity page.
const TIME_FORMAT: &str = "%d %b %Y %H:%M";

/// Rebuild the request's origin from its headers. Honors
/// `X-Forwarded-Proto` so URIs come out right behind a TLS-terminating
/// proxy.
fn request_origin(headers: &HeaderMap) -> RequestOrigin {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get("host")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    RequestOrigin::from_host_header(scheme, host)
}

/// Minimal HTML attribute escaping for values echoed into the login page.
fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ── Dashboard ──────────────────────────────────────────────────────

/// GET / - landing page. The real dashboard is rendered client-side; this
/// hands it the socket address as a protocol-relative URI so it follows
/// whatever scheme the page was served over.
pub(super) async fn index(State(state): State<AppState>, headers: HeaderMap) -> Html<String> {
    let origin = request_origin(&headers);
    let sockaddress = origin.uri(&state.resolver, Some("/ui"), true);
    Html(format!(
        "<!DOCTYPE html>\n<html><head><title>{}</title></head>\n\
         <body data-socket=\"{}\"><h1>{}</h1></body></html>\n",
        escape_attr(&state.about.title),
        escape_attr(&sockaddress),
        escape_attr(&state.about.title),
    ))
}

// ── Security ───────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct LoginQuery {
    r: Option<String>,
}

/// GET /login - login form. The redirect target comes from the `r` query
/// parameter, falling back to the canonical root path.
pub(super) async fn login_form(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
) -> Result<Html<String>, ApiError> {
    let redirect = query
        .r
        .unwrap_or_else(|| state.resolver.root_path());
    let action = state
        .routes
        .resolve(
            "security",
            &[("name".to_string(), "login".to_string())].into_iter().collect(),
        )
        .map_err(|e| ApiError::internal(e, state.production))?;
    Ok(Html(format!(
        "<!DOCTYPE html>\n<html><head><title>Login</title></head>\n<body>\n\
         <form method=\"post\" action=\"{}\">\n\
         <input type=\"hidden\" name=\"continue\" value=\"{}\">\n\
         <input name=\"username\" placeholder=\"Username\">\n\
         <input name=\"password\" type=\"password\" placeholder=\"Password\">\n\
         <button type=\"submit\">Login</button>\n\
         </form>\n</body></html>\n",
        escape_attr(&state.resolver.resolve(&action)),
        escape_attr(&redirect),
    )))
}

/// Body extractor accepting either JSON or a form-encoded submission, so
/// the XHR dashboard and the plain HTML login form can post the same
/// payload.
pub(super) struct JsonOrForm<T>(pub T);

impl<S, T> FromRequest<S> for JsonOrForm<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false);
        if is_form {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(Self(value))
        } else {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(Self(value))
        }
    }
}

#[derive(Deserialize)]
pub(super) struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
    /// Where to send the client after a successful login.
    #[serde(rename = "continue")]
    continue_url: Option<String>,
}

#[derive(Serialize)]
pub(super) struct LoginReply {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// POST /login - authenticate and bind a session.
///
/// Always 200; the body carries the outcome. The failure message is fixed
/// and non-specific so callers cannot enumerate users.
pub(super) async fn login(
    State(state): State<AppState>,
    JsonOrForm(body): JsonOrForm<LoginRequest>,
) -> Response {
    let username = body.username.unwrap_or_default();
    let password = body.password.unwrap_or_default();

    if !state.identity.authenticate(&username, &password).await {
        tracing::info!(%username, "login failed");
        return Json(LoginReply {
            success: false,
            url: None,
            error: Some(LOGIN_FAILED.to_string()),
        })
        .into_response();
    }

    let sid = state.sessions.create(Principal {
        username: username.clone(),
    });
    tracing::info!(%username, "login succeeded");

    let url = body
        .continue_url
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| state.resolver.root_path());
    let cookie = format!(
        "{}={}; Path={}; HttpOnly; SameSite=Lax",
        SESSION_COOKIE,
        sid,
        state.resolver.root_path(),
    );
    (
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(LoginReply {
            success: true,
            url: Some(url),
            error: None,
        }),
    )
        .into_response()
}

/// GET /logout - drop the session, if any, and go back to the root.
/// Idempotent: logging out without a session is not an error.
pub(super) async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(sid) = session_id(&headers) {
        state.sessions.destroy(&sid);
    }
    let clear = format!(
        "{}=; Path={}; HttpOnly; Max-Age=0",
        SESSION_COOKIE,
        state.resolver.root_path(),
    );
    (
        AppendHeaders([(SET_COOKIE, clear)]),
        Redirect::to(&state.resolver.root_path()),
    )
        .into_response()
}

// ── Info ───────────────────────────────────────────────────────────

/// GET /about - package identity (config override or crate metadata).
pub(super) async fn about(State(state): State<AppState>) -> Json<crate::config::AboutInfo> {
    Json(state.about.as_ref().clone())
}

// ── Activity ───────────────────────────────────────────────────────

pub(super) async fn activity(State(state): State<AppState>) -> Result<Response, ApiError> {
    activity_response(state, 1).await
}

/// GET /activity/{page} - non-numeric or zero page segments clamp to 1.
pub(super) async fn activity_page(
    State(state): State<AppState>,
    Path(page): Path<String>,
) -> Result<Response, ApiError> {
    let page = page.parse::<u64>().unwrap_or(1);
    activity_response(state, page).await
}

async fn activity_response(state: AppState, page: u64) -> Result<Response, ApiError> {
    let page = activity::page(state.activities.as_ref(), page, &state.resolver)
        .await
        .map_err(|e| ApiError::internal(e, state.production))?;
    Ok(Json(page).into_response())
}

// ── Logs ───────────────────────────────────────────────────────────

#[derive(Serialize)]
pub(super) struct LogReply {
    time: i64,
    logs: String,
}

/// GET /log/{term} - raw log text of one terminal. An unknown terminal (or
/// one without a log file) yields an empty object, matching the dashboard's
/// expectations.
pub(super) async fn term_log(
    State(state): State<AppState>,
    Path(term): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let log_file = state
        .terminals
        .get(&term)
        .and_then(|t| t.log_file().map(|p| p.to_path_buf()));
    let Some(path) = log_file else {
        return Ok(Json(serde_json::json!({})));
    };
    let logs = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| ApiError::internal(e, state.production))?;
    Ok(Json(serde_json::json!({
        "time": chrono::Utc::now().timestamp_millis(),
        "logs": logs,
    })))
}

/// GET /activity-log - the gateway's own log file.
pub(super) async fn activity_log(
    State(state): State<AppState>,
) -> Result<Json<LogReply>, ApiError> {
    let logs = match &state.log_file {
        Some(path) => tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| ApiError::internal(e, state.production))?,
        None => String::new(),
    };
    Ok(Json(LogReply {
        time: chrono::Utc::now().timestamp_millis(),
        logs,
    }))
}

// ── Clients ────────────────────────────────────────────────────────

#[derive(Serialize)]
pub(super) struct ClientItem {
    nr: usize,
    id: String,
    address: String,
    time: Option<String>,
}

#[derive(Serialize)]
pub(super) struct ClientListReply {
    count: usize,
    items: Vec<ClientItem>,
}

/// GET /client - connected dashboard clients as reported by the pool.
pub(super) async fn client_list(State(state): State<AppState>) -> Json<ClientListReply> {
    let items: Vec<ClientItem> = state
        .terminals
        .clients()
        .into_iter()
        .enumerate()
        .map(|(i, client)| ClientItem {
            nr: i + 1,
            id: client.id,
            address: client.address,
            time: client.time.map(|t| t.format(TIME_FORMAT).to_string()),
        })
        .collect();
    Json(ClientListReply {
        count: items.len(),
        items,
    })
}

// ── Command dispatch ───────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct CommandRequest {
    command: Option<String>,
}

/// POST /{term}/at - dispatch one command to one pooled terminal.
///
/// A missing, empty or unreadable command never reaches the registry; the
/// request falls through to routing failure (404), same as a path that
/// matches nothing.
pub(super) async fn term_at(
    State(state): State<AppState>,
    Path(term): Path<String>,
    body: Result<Json<CommandRequest>, JsonRejection>,
) -> Result<Json<dispatch::CommandReply>, ApiError> {
    let command = body
        .ok()
        .and_then(|Json(body)| body.command)
        .filter(|c| !c.is_empty());
    let Some(command) = command else {
        return Err(ApiError::NotFound);
    };
    if term.is_empty() {
        return Err(ApiError::NotFound);
    }

    let outcome = dispatch::dispatch(
        state.terminals.as_ref(),
        &term,
        &command,
        state.dispatch_timeout,
    )
    .await;
    Ok(Json(outcome.into_reply()))
}
