//! Per-request identity resolution
//!
//! Every request gets a fresh [`IdentityContext`]. When a bearer token is
//! present it is verified, checked against the revocation list, and only then
//! used to fill in the user id and role. Authorization filters run strictly
//! after this step.

use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, Rejection};

use crate::auth::authorize::{authorize, Requirement};
use crate::auth::claims::AccessClaims;
use crate::auth::context::IdentityContext;
use crate::auth::token::extract_bearer_token;
use crate::constants::MAX_BEARER_TOKEN_LEN;
use crate::error::{Result, TokenGateError};
use crate::handlers::rejection::reject;
use crate::services::TokenService;

const MALFORMED_JWT: &str = "Missing or malformed JWT";

/// Inject a clone of `value` into the filter chain
pub fn with_state<T>(value: T) -> impl Filter<Extract = (T,), Error = Infallible> + Clone
where
    T: Clone + Send,
{
    warp::any().map(move || value.clone())
}

/// A fresh, anonymous identity for the current request
pub fn with_context() -> impl Filter<Extract = (IdentityContext,), Error = Infallible> + Clone {
    warp::any().map(IdentityContext::new)
}

/// Fill `ctx` from an optional Authorization header value
pub async fn resolve_identity(
    ctx: IdentityContext,
    auth_header: Option<&str>,
    tokens: &TokenService,
) -> Result<(IdentityContext, Option<AccessClaims>)> {
    let header = match auth_header {
        Some(header) => header,
        None => return Ok((ctx, None)),
    };

    let token = extract_bearer_token(header)
        .filter(|t| t.len() <= MAX_BEARER_TOKEN_LEN && !t.chars().any(|c| c.is_control()))
        .ok_or_else(|| TokenGateError::bad_request(MALFORMED_JWT))?;

    let claims = tokens.authenticate(token).await?;
    log::debug!(
        "Resolved user {} for context {}",
        claims.sub,
        ctx.correlation_id()
    );
    Ok((ctx.resolve(&claims), Some(claims)))
}

/// Identity for routes that also serve anonymous callers
pub fn with_identity(
    tokens: Arc<TokenService>,
) -> impl Filter<Extract = (IdentityContext, Option<AccessClaims>), Error = Rejection> + Clone {
    with_context()
        .and(warp::header::optional::<String>("authorization"))
        .and(with_state(tokens))
        .and_then(
            |ctx: IdentityContext, header: Option<String>, tokens: Arc<TokenService>| async move {
                let fallback = ctx.clone();
                resolve_identity(ctx, header.as_deref(), &tokens)
                    .await
                    .map_err(|e| reject(&fallback, e))
            },
        )
        .untuple_one()
}

/// Identity for routes that need a verified caller
pub fn require_identity(
    tokens: Arc<TokenService>,
) -> impl Filter<Extract = (IdentityContext, AccessClaims), Error = Rejection> + Clone {
    with_identity(tokens)
        .and_then(|ctx: IdentityContext, claims: Option<AccessClaims>| async move {
            match claims {
                Some(claims) => Ok((ctx, claims)),
                None => Err(reject(&ctx, TokenGateError::bad_request(MALFORMED_JWT))),
            }
        })
        .untuple_one()
}

/// Verified caller that satisfies every requirement, checked in order
pub fn authorized(
    tokens: Arc<TokenService>,
    requirements: Vec<Requirement>,
) -> impl Filter<Extract = (IdentityContext, AccessClaims), Error = Rejection> + Clone {
    let requirements = Arc::new(requirements);
    require_identity(tokens)
        .and_then(move |ctx: IdentityContext, claims: AccessClaims| {
            let requirements = Arc::clone(&requirements);
            async move {
                match authorize(Some(&ctx), &requirements) {
                    Ok(()) => Ok((ctx, claims)),
                    Err(e) => Err(reject(&ctx, e)),
                }
            }
        })
        .untuple_one()
}
