use axum::{
    extract::Request,
    http::{HeaderName, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::common::response::ApiError;

/// Identity header set by the gateway in front of the API.
pub static USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");

/// Authenticated caller, injected into request extensions.
#[derive(Debug, Clone)]
pub struct Caller(pub String);

pub async fn caller_middleware(mut req: Request, next: Next) -> Result<Response, ApiError> {
    let user_id = req
        .headers()
        .get(&USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned);

    let user_id = match user_id {
        Some(id) => id,
        None => return Err(ApiError("Unauthorized: Missing user identity".to_string(), StatusCode::UNAUTHORIZED)),
    };

    req.extensions_mut().insert(Caller(user_id));

    Ok(next.run(req).await)
}
