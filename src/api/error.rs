use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Structured error type for API handlers.
///
/// Application-level failures on the JSON endpoints travel inside the 200
/// body as `{success:false, ...}`; this type only covers the transport-level
/// cases: unauthenticated access, unmatched routes, and genuinely
/// unexpected failures.
#[derive(Debug)]
pub enum ApiError {
    /// 401 - No live session.
    AuthRequired,
    /// 404 - Unmatched route, or a request malformed enough to fall through
    /// to routing failure.
    NotFound,
    /// 500 - Unexpected internal failure. `expose` is set outside production
    /// mode so the detail reaches the client only during development.
    Internal { detail: String, expose: bool },
}

impl ApiError {
    /// Wrap an unexpected failure, hiding detail in production mode.
    pub fn internal(err: impl std::fmt::Display, production: bool) -> Self {
        ApiError::Internal {
            detail: err.to_string(),
            expose: !production,
        }
    }

    /// Returns the HTTP status code for this error variant.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::AuthRequired => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a machine-readable error code string.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::AuthRequired => "auth_required",
            ApiError::NotFound => "not_found",
            ApiError::Internal { .. } => "internal_error",
        }
    }

    /// Returns a human-readable error message.
    pub fn message(&self) -> String {
        match self {
            ApiError::AuthRequired => "Authentication required. Log in first.".to_string(),
            ApiError::NotFound => "Not found.".to_string(),
            ApiError::Internal { detail, expose } => {
                if *expose {
                    format!("Internal error: {}.", detail)
                } else {
                    "Internal server error.".to_string()
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal { ref detail, .. } = self {
            tracing::error!(%detail, "unhandled internal failure");
        }
        let body = serde_json::json!({
            "error": {
                "code": self.code(),
                "message": self.message(),
            }
        });
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn response_parts(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = Body::new(response.into_body())
            .collect()
            .await
            .unwrap()
            .to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        (status, json)
    }

    #[tokio::test]
    async fn auth_required_is_401() {
        let (status, json) = response_parts(ApiError::AuthRequired).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"]["code"], "auth_required");
    }

    #[tokio::test]
    async fn not_found_is_404() {
        let (status, json) = response_parts(ApiError::NotFound).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn internal_exposes_detail_in_development() {
        let (status, json) =
            response_parts(ApiError::internal("store unreachable", false)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"]["message"], "Internal error: store unreachable.");
    }

    #[tokio::test]
    async fn internal_hides_detail_in_production() {
        let (_, json) = response_parts(ApiError::internal("store unreachable", true)).await;
        assert_eq!(json["error"]["message"], "Internal server error.");
    }

    #[tokio::test]
    async fn response_has_error_wrapper() {
        let (_, json) = response_parts(ApiError::NotFound).await;
        assert!(json["error"].get("code").is_some());
        assert!(json["error"].get("message").is_some());
    }

    #[tokio::test]
    async fn response_content_type_is_json() {
        let response = ApiError::NotFound.into_response();
        let ct = response.headers().get("content-type").unwrap();
        assert!(ct.to_str().unwrap().contains("application/json"));
    }
}
