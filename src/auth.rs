use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::{errors::AppError, AppState};

/// Guards `/mcp` with the configured bearer token. When the server was
/// started without a token every request passes.
pub async fn require_bearer_token(
    State(state): State<AppState>,
    auth_header: Option<TypedHeader<Authorization<Bearer>>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(expected) = state.api_token.as_deref() {
        let TypedHeader(auth) = auth_header.ok_or_else(|| {
            AppError::unauthorized("missing_token", "missing authorization header")
        })?;

        if !tokens_match(auth.token(), expected) {
            return Err(AppError::unauthorized(
                "invalid_token",
                "invalid bearer token",
            ));
        }
    }

    Ok(next.run(request).await)
}

/// Compares without short-circuiting on the first differing byte.
fn tokens_match(presented: &str, expected: &str) -> bool {
    let (presented, expected) = (presented.as_bytes(), expected.as_bytes());
    if presented.len() != expected.len() {
        return false;
    }

    presented
        .iter()
        .zip(expected)
        .fold(0_u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}
