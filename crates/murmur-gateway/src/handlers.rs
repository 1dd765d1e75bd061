// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the chat REST API.
//!
//! Every response body has the shape `{"code": <status>, "message": ..., "data": ...}`.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use murmur_core::{HealthStatus, MessageId, MurmurError, UserId};
use murmur_hub::ChatMessage;

use crate::auth::AuthUser;
use crate::server::GatewayState;

/// Response envelope shared by every API endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: u16,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            message: message.into(),
            data,
        }
    }
}

/// A JSON error body with a matching status line.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ApiResponse::<()> {
        code: status.as_u16(),
        message: message.into(),
        data: None,
    };
    (status, Json(body)).into_response()
}

/// A [`MurmurError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub MurmurError);

impl From<MurmurError> for ApiError {
    fn from(err: MurmurError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            MurmurError::Validation(_) => StatusCode::BAD_REQUEST,
            MurmurError::NotFound { .. } => StatusCode::NOT_FOUND,
            MurmurError::Auth(_) => StatusCode::UNAUTHORIZED,
            MurmurError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.0.is_client_error() {
            error_response(status, self.0.to_string())
        } else {
            tracing::error!(error = %self.0, "request failed");
            error_response(status, "internal server error")
        }
    }
}

/// Query string for GET /api/chat/history.
///
/// Fields stay strings so a malformed number yields our own 400 body.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub with_user_id: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl HistoryQuery {
    /// Parse into `(peer, limit, offset)`, using `default_limit` when `limit` is absent.
    pub fn parse(&self, default_limit: i64) -> Result<(UserId, i64, i64), MurmurError> {
        let peer = match self.with_user_id.as_deref().map(str::trim) {
            None | Some("") => {
                return Err(MurmurError::Validation("with_user_id is required".into()));
            }
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .map(UserId)
                .filter(|u| u.is_valid())
                .ok_or_else(|| MurmurError::Validation("invalid with_user_id".into()))?,
        };

        let limit = match self.limit.as_deref() {
            None => default_limit,
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|l| *l > 0)
                .ok_or_else(|| MurmurError::Validation("invalid limit".into()))?,
        };

        let offset = match self.offset.as_deref() {
            None => 0,
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|o| *o >= 0)
                .ok_or_else(|| MurmurError::Validation("invalid offset".into()))?,
        };

        Ok((peer, limit, offset))
    }
}

/// GET /api/chat/history?with_user_id=&limit=&offset=
///
/// Conversation between the caller and `with_user_id`, oldest first.
pub async fn get_history(
    State(state): State<GatewayState>,
    AuthUser(user): AuthUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<ChatMessage>>>, ApiError> {
    let (peer, limit, offset) = query.parse(state.default_history_limit)?;
    let messages = state
        .service
        .fetch_history(user, peer, limit, offset)
        .await?;
    let data = messages.iter().map(ChatMessage::from).collect();
    Ok(Json(ApiResponse::ok(
        "chat history fetched successfully",
        Some(data),
    )))
}

/// POST /api/chat/messages/{message_id}/read
pub async fn post_mark_read(
    State(state): State<GatewayState>,
    AuthUser(user): AuthUser,
    Path(raw_id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let message_id = raw_id
        .trim()
        .parse::<i64>()
        .ok()
        .map(MessageId)
        .filter(|id| id.is_valid())
        .ok_or_else(|| MurmurError::Validation("invalid message ID".into()))?;
    state.service.mark_read(message_id, user).await?;
    Ok(Json(ApiResponse::ok("message marked as read", None)))
}

/// Response body for GET /health.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    /// `ok`, `degraded`, or `unhealthy`.
    pub status: String,
    /// Backend name of the message store.
    pub store: String,
    /// Detail when the store is not healthy.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detail: Option<String>,
    /// Users with a live connection.
    pub online: usize,
    pub version: String,
}

/// GET /health
///
/// Unauthenticated. Returns 503 when the store is unhealthy.
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    let health = match state.store.health_check().await {
        Ok(h) => h,
        Err(e) => HealthStatus::Unhealthy(e.to_string()),
    };
    let (code, status, detail) = match health {
        HealthStatus::Healthy => (StatusCode::OK, "ok", None),
        HealthStatus::Degraded(d) => (StatusCode::OK, "degraded", Some(d)),
        HealthStatus::Unhealthy(d) => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", Some(d)),
    };
    let body = HealthResponse {
        status: status.to_string(),
        store: state.store.name().to_string(),
        detail,
        online: state.hub.online_count(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    (code, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(with: Option<&str>, limit: Option<&str>, offset: Option<&str>) -> HistoryQuery {
        HistoryQuery {
            with_user_id: with.map(String::from),
            limit: limit.map(String::from),
            offset: offset.map(String::from),
        }
    }

    #[test]
    fn history_query_defaults() {
        let (peer, limit, offset) = query(Some("2"), None, None).parse(20).unwrap();
        assert_eq!(peer, UserId(2));
        assert_eq!(limit, 20);
        assert_eq!(offset, 0);
    }

    #[test]
    fn history_query_rejects_bad_values() {
        let cases = [
            (query(None, None, None), "with_user_id is required"),
            (query(Some("abc"), None, None), "invalid with_user_id"),
            (query(Some("0"), None, None), "invalid with_user_id"),
            (query(Some("2"), Some("0"), None), "invalid limit"),
            (query(Some("2"), Some("ten"), None), "invalid limit"),
            (query(Some("2"), Some("5"), Some("-1")), "invalid offset"),
        ];
        for (q, expected) in cases {
            let err = q.parse(20).unwrap_err();
            assert!(err.to_string().contains(expected), "{q:?}: {err}");
        }
    }

    #[test]
    fn api_error_status_mapping() {
        assert_eq!(
            ApiError(MurmurError::Validation("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(MurmurError::NotFound { message_id: 1 }).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(MurmurError::storage(std::io::Error::other("disk"))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn ok_response_serializes_null_data() {
        let json = serde_json::to_value(ApiResponse::<()>::ok("done", None)).unwrap();
        assert_eq!(json["code"], 200);
        assert_eq!(json["message"], "done");
        assert!(json["data"].is_null());
    }
}
