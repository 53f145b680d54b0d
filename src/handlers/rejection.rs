//! Maps rejections to JSON error bodies

use std::convert::Infallible;
use warp::http::StatusCode;
use warp::{Rejection, Reply};

use crate::auth::context::IdentityContext;
use crate::constants::CONTEXT_ID_HEADER;
use crate::error::{Severity, TokenGateError};

/// A failure tied to the request that produced it
#[derive(Debug)]
pub struct Rejected {
    pub context_id: String,
    pub error: TokenGateError,
}

impl warp::reject::Reject for Rejected {}

/// Reject the current request with `error`, keeping its correlation id
pub fn reject(ctx: &IdentityContext, error: TokenGateError) -> Rejection {
    warp::reject::custom(Rejected {
        context_id: ctx.correlation_id().to_string(),
        error,
    })
}

fn classify(err: &Rejection) -> (TokenGateError, Option<String>) {
    if let Some(rejected) = err.find::<Rejected>() {
        return (rejected.error.clone(), Some(rejected.context_id.clone()));
    }
    if let Some(error) = err.find::<TokenGateError>() {
        return (error.clone(), None);
    }
    if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        return (TokenGateError::bad_request(e.to_string()), None);
    }
    if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        return (TokenGateError::bad_request("request body too large"), None);
    }
    if err.find::<warp::reject::LengthRequired>().is_some() {
        return (TokenGateError::bad_request("request body is required"), None);
    }
    if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        return (TokenGateError::bad_request("expected a JSON body"), None);
    }
    if err.find::<warp::reject::InvalidQuery>().is_some() {
        return (TokenGateError::bad_request("invalid query string"), None);
    }
    if let Some(e) = err.find::<warp::reject::InvalidHeader>() {
        return (TokenGateError::bad_request(e.to_string()), None);
    }
    if err.is_not_found() || err.find::<warp::reject::MethodNotAllowed>().is_some() {
        return (TokenGateError::not_found("Route not found"), None);
    }
    (TokenGateError::unexpected(format!("unhandled rejection: {:?}", err)), None)
}

/// Final `recover` step for every route
pub async fn handle_rejection(err: Rejection) -> Result<warp::reply::Response, Infallible> {
    let (error, context_id) = classify(&err);
    let context = context_id.as_deref().unwrap_or("-");

    match error.severity() {
        Severity::Error | Severity::Fatal => {
            log::error!("[{}] {} ({}): {}", context, error.status(), error.code(), error)
        }
        Severity::Warn => log::warn!("[{}] {} ({}): {}", context, error.status(), error.code(), error),
        Severity::Info | Severity::Debug => {
            log::debug!("[{}] {} ({}): {}", context, error.status(), error.code(), error)
        }
    }

    let status = StatusCode::from_u16(error.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let reply = warp::reply::with_status(warp::reply::json(&error.to_body()), status);

    Ok(match context_id {
        Some(id) => warp::reply::with_header(reply, CONTEXT_ID_HEADER, id).into_response(),
        None => reply.into_response(),
    })
}
