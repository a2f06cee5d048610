pub mod auth;
pub mod error;
mod handlers;

use axum::{
    http::{HeaderName, HeaderValue},
    routing::{get, post},
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::activity::ActivityStore;
use crate::config::{AboutInfo, GatewayConfig};
use crate::session::{IdentityProvider, SessionStore};
use crate::terminal::TerminalRegistry;
use crate::uri::{PathResolver, RouteTable};

use handlers::*;

/// Everything a request handler needs, wired once at startup and cloned per
/// request. No module-level globals.
#[derive(Clone)]
pub struct AppState {
    pub terminals: Arc<dyn TerminalRegistry>,
    pub activities: Arc<dyn ActivityStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub sessions: Arc<SessionStore>,
    pub resolver: PathResolver,
    pub routes: Arc<RouteTable>,
    pub about: Arc<AboutInfo>,
    /// Gateway log file served by `GET /activity-log`.
    pub log_file: Option<Arc<PathBuf>>,
    pub dispatch_timeout: Duration,
    pub production: bool,
}

impl AppState {
    pub fn new(
        config: &GatewayConfig,
        terminals: Arc<dyn TerminalRegistry>,
        activities: Arc<dyn ActivityStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let about = config
            .about
            .clone()
            .unwrap_or_else(AboutInfo::from_package);
        Self {
            terminals,
            activities,
            identity,
            sessions: Arc::new(SessionStore::new(Duration::from_secs(
                config.session_ttl_secs,
            ))),
            resolver: PathResolver::new(&config.root),
            routes: Arc::new(default_routes()),
            about: Arc::new(about),
            log_file: config.log_file.clone().map(Arc::new),
            dispatch_timeout: Duration::from_secs(config.dispatch_timeout_secs),
            production: config.production,
        }
    }
}

/// The gateway's named-route table, declared once. Mirrors the router below;
/// link generation resolves against this instead of scanning handlers at
/// runtime.
pub fn default_routes() -> RouteTable {
    let mut table = RouteTable::new();
    table.register("term", "index", "/");
    table.register("term", "about", "/about");
    table.register("term", "activity", "/activity");
    table.register("term", "activity-page", "/activity/{page}");
    table.register("term", "log", "/log/{term}");
    table.register("term", "activity-log", "/activity-log");
    table.register("term", "client", "/client");
    table.register("term", "at", "/{term}/at");
    table.register("security", "index", "/login");
    table.register("security", "login", "/login");
    table.register("security", "logout", "/logout");
    table
}

/// Build the gateway router.
///
/// Everything except the login endpoints and `/about` sits behind the
/// session gate. JSON endpoints keep the legacy always-200 envelope; only
/// unmatched routes (404), missing auth (401) and unexpected failures (500)
/// surface as HTTP errors.
pub fn router(state: AppState) -> Router {
    let sessions = state.sessions.clone();
    let resolver = state.resolver.clone();

    let protected = Router::new()
        .route("/", get(index))
        .route("/activity", get(activity))
        .route("/activity/{page}", get(activity_page))
        .route("/log/{term}", get(term_log))
        .route("/activity-log", get(activity_log))
        .route("/client", get(client_list))
        .route("/{term}/at", post(term_at))
        .layer(axum::middleware::from_fn(move |req, next| {
            let sessions = sessions.clone();
            let resolver = resolver.clone();
            async move { auth::require_session(sessions, resolver, req, next).await }
        }));

    // Logout stays outside the gate: it is idempotent and always redirects
    // to the canonical root, whether or not a session exists.
    Router::new()
        .route("/login", get(login_form).post(login))
        .route("/logout", get(logout))
        .route("/about", get(about))
        .merge(protected)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("no-referrer"),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::MemoryActivityStore;
    use crate::session::StaticCredentials;
    use crate::terminal::TerminalPool;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt; // for oneshot()

    fn test_state() -> AppState {
        let config = GatewayConfig::default();
        AppState::new(
            &config,
            Arc::new(TerminalPool::new()),
            Arc::new(MemoryActivityStore::new()),
            Arc::new(StaticCredentials::new("admin", "secret")),
        )
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = Body::new(response.into_body())
            .collect()
            .await
            .unwrap()
            .to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    async fn login_cookie(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/login")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"username":"admin","password":"secret"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let set_cookie = response
            .headers()
            .get("set-cookie")
            .expect("login must set a session cookie")
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn about_is_public() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/about").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
        assert!(json.get("title").is_some());
        assert!(json.get("author").is_some());
        assert!(json.get("license").is_some());
    }

    #[tokio::test]
    async fn protected_routes_require_session() {
        let app = router(test_state());
        for uri in ["/activity", "/client", "/activity-log", "/log/gsm-1"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn login_failure_keeps_fixed_message() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/login")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"username":"a","password":"wrong"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("set-cookie").is_none());
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Invalid username and/or password");
        assert!(json.get("url").is_none());
    }

    #[tokio::test]
    async fn login_success_returns_root_url() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/login")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"username":"admin","password":"secret"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["url"], "/");
    }

    #[tokio::test]
    async fn login_success_honors_continue() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/login")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"username":"admin","password":"secret","continue":"/activity/2"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["url"], "/activity/2");
    }

    #[tokio::test]
    async fn session_cookie_unlocks_protected_routes() {
        let app = router(test_state());
        let cookie = login_cookie(&app).await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/client")
                    .header("cookie", cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["count"], 0);
    }

    #[tokio::test]
    async fn logout_redirects_to_root_and_kills_session() {
        let app = router(test_state());
        let cookie = login_cookie(&app).await;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/logout")
                    .header("cookie", cookie.clone())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_redirection());
        assert_eq!(response.headers().get("location").unwrap(), "/");

        // Session is gone; the cookie no longer unlocks anything.
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/client")
                    .header("cookie", cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_without_session_still_redirects_to_root() {
        let app = router(test_state());
        for accept in [Some("text/html"), None] {
            let mut builder = Request::builder().uri("/logout");
            if let Some(accept) = accept {
                builder = builder.header("accept", accept);
            }
            let response = app
                .clone()
                .oneshot(builder.body(Body::empty()).unwrap())
                .await
                .unwrap();
            // Anonymous logout is a no-op, not an error: straight back to
            // the canonical root for browsers and JSON clients alike.
            assert!(response.status().is_redirection());
            assert_eq!(response.headers().get("location").unwrap(), "/");
        }
    }

    #[tokio::test]
    async fn login_form_carries_redirect_target() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/login?r=/activity")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = Body::new(response.into_body())
            .collect()
            .await
            .unwrap()
            .to_bytes();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("value=\"/activity\""));
        assert!(html.contains("action=\"/login\""));
    }

    #[tokio::test]
    async fn unmatched_route_is_404() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/no/such/route")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn security_headers_are_set() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/about").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
    }

    #[test]
    fn route_table_mirrors_router() {
        let routes = default_routes();
        let params: std::collections::HashMap<String, String> =
            [("name".to_string(), "at".to_string()), ("term".to_string(), "gsm-1".to_string())]
                .into_iter()
                .collect();
        assert_eq!(routes.resolve("term", &params).unwrap(), "/gsm-1/at");
    }
}
