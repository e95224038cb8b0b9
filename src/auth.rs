use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::user;

/// Identity header set by the gateway after it verified the caller's token.
const IDENTITY_HEADER: &str = "x-user-sub";

pub async fn identity(mut request: Request, next: Next) -> crate::Result<Response> {
    let sub = request
        .headers()
        .get(IDENTITY_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(|value| user::Sub(value.to_owned()))
        .ok_or(crate::Error::Unauthorized)?;

    request.extensions_mut().insert(sub);

    let response = next.run(request).await;
    Ok(response)
}
