use crate::api::AppState;
use crate::api::middleware::{AuthUser, RequestMeta};
use crate::api::schemas::auth::{LoggedOut, Login, Logout, Refresh, Refreshed, Session, User};
use crate::error::Result;
use crate::services::session_service::{LoginRequest, LogoutRequest};
use axum::{Json, extract::State, response::IntoResponse};

pub async fn login(
    State(state): State<AppState>,
    RequestMeta(ctx): RequestMeta,
    Json(payload): Json<Login>,
) -> Result<impl IntoResponse> {
    let request = LoginRequest {
        identifier: payload.identifier,
        password: payload.password,
        remember_me: payload.remember_me,
        challenge_token: payload.challenge_token,
    };
    let session = state.sessions.login(request, &ctx).await?;
    Ok(Json(Session::from(session)))
}

pub async fn refresh(
    State(state): State<AppState>,
    RequestMeta(ctx): RequestMeta,
    Json(payload): Json<Refresh>,
) -> Result<impl IntoResponse> {
    let session = state.sessions.refresh(&payload.refresh_token, &ctx).await?;
    Ok(Json(Refreshed::from(session)))
}

pub async fn logout(
    auth_user: Option<AuthUser>,
    State(state): State<AppState>,
    RequestMeta(ctx): RequestMeta,
    payload: Option<Json<Logout>>,
) -> Result<impl IntoResponse> {
    let payload = payload.map(|Json(body)| body).unwrap_or_default();
    let request = LogoutRequest { refresh_token: payload.refresh_token, user_id: auth_user.map(|u| u.user_id) };
    let scope = state.sessions.logout(request, &ctx).await?;
    Ok(Json(LoggedOut::from(scope)))
}

pub async fn me(
    auth_user: AuthUser,
    State(state): State<AppState>,
    RequestMeta(ctx): RequestMeta,
) -> Result<impl IntoResponse> {
    let summary = state.sessions.whoami(auth_user.user_id, &ctx).await?;
    Ok(Json(User::from(summary)))
}
