use crate::api::AppState;
use crate::domain::request::RequestContext;
use crate::error::AppError;
use axum::{
    extract::{ConnectInfo, FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts},
};
use std::net::SocketAddr;
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// A caller holding a valid access token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
}

fn bearer_token(parts: &Parts) -> Option<Result<&str, AppError>> {
    let auth_header = parts.headers.get(header::AUTHORIZATION)?;
    let token = auth_header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AppError::TokenInvalid);
    Some(token)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::TokenInvalid)??;
        let claims = state.sessions.authenticate(token)?;
        tracing::Span::current().record("user_id", tracing::field::display(claims.sub));
        Ok(Self { user_id: claims.sub })
    }
}

/// No header means anonymous; a header that fails validation is still rejected.
impl OptionalFromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Option<Self>, Self::Rejection> {
        if bearer_token(parts).is_none() {
            return Ok(None);
        }
        <Self as FromRequestParts<AppState>>::from_request_parts(parts, state).await.map(Some)
    }
}

/// Per-request facts the services need: resolved client address and request id.
#[derive(Debug, Clone)]
pub struct RequestMeta(pub RequestContext);

impl FromRequestParts<AppState> for RequestMeta {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let client_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| state.client_ip.identify_client_ip(&parts.headers, addr.ip()));
        let request_id =
            parts.headers.get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok()).map(ToString::to_string);

        Ok(Self(RequestContext::new(client_ip, request_id)))
    }
}
