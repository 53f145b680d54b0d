//! HTTP handlers for the authentication endpoints

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use warp::http::header::SET_COOKIE;
use warp::reply::Response;
use warp::{Rejection, Reply};

use crate::auth::claims::AccessClaims;
use crate::auth::context::IdentityContext;
use crate::constants::{CONTEXT_ID_HEADER, REFRESH_COOKIE_NAME};
use crate::handlers::rejection::reject;
use crate::services::{
    AuthService, ChangePasswordRequest, LoginRequest, RefreshRequest, SendResetPasswordRequest,
    TokenPair, VerifyResetPasswordRequest,
};

/// Body returned by login and refresh
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub expires_at: i64,
    pub refresh_token: String,
    pub refresh_expires_at: i64,
}

impl From<&TokenPair> for TokenResponse {
    fn from(pair: &TokenPair) -> Self {
        Self {
            token: pair.access_token.clone(),
            expires_at: pair.access_expires_at.timestamp(),
            refresh_token: pair.refresh_token.clone(),
            refresh_expires_at: pair.refresh_expires_at.timestamp(),
        }
    }
}

#[derive(Debug, Serialize)]
struct StatusResponse<'a> {
    status: &'a str,
}

fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn refresh_cookie(token: &str, expires_at: DateTime<Utc>) -> String {
    format!(
        "{}={}; Expires={}; Path=/; HttpOnly; Secure; SameSite=Lax",
        REFRESH_COOKIE_NAME,
        token,
        http_date(expires_at)
    )
}

fn cleared_refresh_cookie() -> String {
    format!(
        "{}=; Max-Age=0; Path=/; HttpOnly; Secure; SameSite=Lax",
        REFRESH_COOKIE_NAME
    )
}

/// Attach the correlation id to a successful reply
pub fn with_context_id(reply: impl Reply, ctx: &IdentityContext) -> Response {
    warp::reply::with_header(reply, CONTEXT_ID_HEADER, ctx.correlation_id().to_string())
        .into_response()
}

fn token_reply(ctx: &IdentityContext, pair: &TokenPair) -> Response {
    let body = warp::reply::json(&TokenResponse::from(pair));
    let reply = warp::reply::with_header(
        body,
        SET_COOKIE,
        refresh_cookie(&pair.refresh_token, pair.refresh_expires_at),
    );
    with_context_id(reply, ctx)
}

/// POST /auth/login
pub async fn login(
    ctx: IdentityContext,
    request: LoginRequest,
    auth: Arc<AuthService>,
) -> Result<Response, Rejection> {
    match auth.login(request).await {
        Ok(pair) => Ok(token_reply(&ctx, &pair)),
        Err(e) => Err(reject(&ctx, e)),
    }
}

/// POST /auth/refresh
///
/// The token is taken from the JSON body, then the `refresh_token` query
/// parameter, then the refresh cookie.
pub async fn refresh(
    ctx: IdentityContext,
    body: RefreshRequest,
    query: HashMap<String, String>,
    cookie: Option<String>,
    auth: Arc<AuthService>,
) -> Result<Response, Rejection> {
    let refresh_token = [
        Some(body.refresh_token),
        query.get("refresh_token").cloned(),
        cookie,
    ]
    .into_iter()
    .flatten()
    .find(|t| !t.trim().is_empty())
    .unwrap_or_default();

    match auth.refresh(RefreshRequest { refresh_token }).await {
        Ok(pair) => Ok(token_reply(&ctx, &pair)),
        Err(e) => Err(reject(&ctx, e)),
    }
}

/// POST /auth/logout
pub async fn logout(
    ctx: IdentityContext,
    claims: AccessClaims,
    auth: Arc<AuthService>,
) -> Result<Response, Rejection> {
    auth.logout(&claims).await.map_err(|e| reject(&ctx, e))?;

    let reply = warp::reply::with_header(
        warp::reply::json(&StatusResponse { status: "logged out" }),
        SET_COOKIE,
        cleared_refresh_cookie(),
    );
    Ok(with_context_id(reply, &ctx))
}

/// GET /auth/context
pub async fn context(
    ctx: IdentityContext,
    _claims: Option<AccessClaims>,
) -> Result<Response, Rejection> {
    Ok(with_context_id(warp::reply::json(&ctx), &ctx))
}

/// POST /account/change-password
pub async fn change_password(
    ctx: IdentityContext,
    _claims: AccessClaims,
    request: ChangePasswordRequest,
    auth: Arc<AuthService>,
) -> Result<Response, Rejection> {
    auth.change_password(Some(&ctx), request)
        .await
        .map_err(|e| reject(&ctx, e))?;

    Ok(with_context_id(
        warp::reply::json(&StatusResponse { status: "password changed" }),
        &ctx,
    ))
}

/// POST /auth/reset-password
///
/// Answers the same way whether or not the address belongs to an account.
pub async fn send_reset_password(
    ctx: IdentityContext,
    request: SendResetPasswordRequest,
    auth: Arc<AuthService>,
) -> Result<Response, Rejection> {
    auth.send_reset_password(request)
        .await
        .map_err(|e| reject(&ctx, e))?;

    Ok(with_context_id(
        warp::reply::json(&StatusResponse { status: "reset link sent" }),
        &ctx,
    ))
}

/// POST /auth/reset-password/:id
pub async fn verify_reset_password(
    id: String,
    ctx: IdentityContext,
    mut request: VerifyResetPasswordRequest,
    auth: Arc<AuthService>,
) -> Result<Response, Rejection> {
    request.id = id;
    auth.verify_reset_password(request)
        .await
        .map_err(|e| reject(&ctx, e))?;

    Ok(with_context_id(
        warp::reply::json(&StatusResponse { status: "password changed" }),
        &ctx,
    ))
}

/// GET /admin/ping
pub async fn admin_ping(ctx: IdentityContext, claims: AccessClaims) -> Result<Response, Rejection> {
    log::debug!("Admin ping from {}", claims.sub);
    Ok(with_context_id(
        warp::reply::json(&serde_json::json!({
            "status": "ok",
            "userId": ctx.user_id(),
        })),
        &ctx,
    ))
}

/// GET /health
pub async fn health(ctx: IdentityContext, version: String) -> Result<Response, Rejection> {
    Ok(with_context_id(
        warp::reply::json(&serde_json::json!({
            "status": "ok",
            "version": version,
        })),
        &ctx,
    ))
}
