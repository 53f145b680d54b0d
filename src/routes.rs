//! HTTP route table

use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, Reply};

use crate::auth::authorize::Requirement;
use crate::constants::{API_PREFIX, API_VERSION, REFRESH_COOKIE_NAME};
use crate::handlers::{
    self, authorized, handle_rejection, require_identity, with_context, with_identity, with_state,
};
use crate::services::{
    AuthService, RefreshRequest, SendResetPasswordRequest, VerifyResetPasswordRequest,
};

const MAX_BODY_BYTES: u64 = 16 * 1024;

/// JSON body, or the type's default when absent or unparsable
fn optional_json<T>() -> impl Filter<Extract = (T,), Error = Infallible> + Clone
where
    T: serde::de::DeserializeOwned + Default + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES)
        .and(warp::body::json::<T>())
        .or(warp::any().map(T::default))
        .unify()
}

/// Every endpoint under `/api/v1`, plus `/health`, with errors rendered as JSON
pub fn routes(
    auth: Arc<AuthService>,
    version: impl Into<String>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let tokens = Arc::clone(auth.tokens());
    let version = version.into();
    let api = warp::path(API_PREFIX).and(warp::path(API_VERSION));

    let health = warp::path!("health")
        .and(warp::get())
        .and(with_context())
        .and(with_state(version))
        .and_then(handlers::auth::health);

    let login = api
        .and(warp::path!("auth" / "login"))
        .and(warp::post())
        .and(with_context())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_state(Arc::clone(&auth)))
        .and_then(handlers::auth::login);

    let refresh = api
        .and(warp::path!("auth" / "refresh"))
        .and(warp::post())
        .and(with_context())
        .and(optional_json::<RefreshRequest>())
        .and(warp::query::<std::collections::HashMap<String, String>>())
        .and(warp::cookie::optional::<String>(REFRESH_COOKIE_NAME))
        .and(with_state(Arc::clone(&auth)))
        .and_then(handlers::auth::refresh);

    let logout = api
        .and(warp::path!("auth" / "logout"))
        .and(warp::post())
        .and(require_identity(Arc::clone(&tokens)))
        .and(with_state(Arc::clone(&auth)))
        .and_then(handlers::auth::logout);

    let context = api
        .and(warp::path!("auth" / "context"))
        .and(warp::get())
        .and(with_identity(Arc::clone(&tokens)))
        .and_then(handlers::auth::context);

    let change_password = api
        .and(warp::path!("account" / "change-password"))
        .and(warp::post())
        .and(require_identity(Arc::clone(&tokens)))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_state(Arc::clone(&auth)))
        .and_then(handlers::auth::change_password);

    let send_reset_password = api
        .and(warp::path!("auth" / "reset-password"))
        .and(warp::post())
        .and(with_context())
        .and(optional_json::<SendResetPasswordRequest>())
        .and(with_state(Arc::clone(&auth)))
        .and_then(handlers::auth::send_reset_password);

    let verify_reset_password = api
        .and(warp::path!("auth" / "reset-password" / String))
        .and(warp::post())
        .and(with_context())
        .and(optional_json::<VerifyResetPasswordRequest>())
        .and(with_state(Arc::clone(&auth)))
        .and_then(handlers::auth::verify_reset_password);

    let admin_ping = api
        .and(warp::path!("admin" / "ping"))
        .and(warp::get())
        .and(authorized(tokens, vec![Requirement::role("admin")]))
        .and_then(handlers::auth::admin_ping);

    health
        .or(login)
        .or(refresh)
        .or(logout)
        .or(context)
        .or(change_password)
        .or(send_reset_password)
        .or(verify_reset_password)
        .or(admin_ping)
        .recover(handle_rejection)
        .with(warp::log("tokengate::http"))
}
