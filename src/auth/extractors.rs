use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;

use crate::{
    auth::repo_types::PublicUser,
    error::{AppError, AppResult},
    state::AppState,
};

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Authenticated user, attached to the request by [`require_session`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub PublicUser);

/// Access token from the `accessToken` cookie, else from `Authorization: Bearer`.
fn access_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(c) = jar.get(ACCESS_COOKIE).filter(|c| !c.value().is_empty()) {
        return Some(c.value().to_string());
    }
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Resolves a request to a live, sanitized user. A deleted user is reported
/// exactly like a bad token.
pub async fn resolve_session(st: &AppState, headers: &HeaderMap) -> AppResult<PublicUser> {
    let token = access_token(headers)
        .ok_or_else(|| AppError::unauthorized("Unauthorized request"))?;

    let claims = st.keys.verify_access(&token).map_err(|e| {
        warn!(error = %e, "invalid or expired access token");
        AppError::unauthorized("Invalid access token")
    })?;

    let user = st.users.find_by_id(claims.sub).await?.ok_or_else(|| {
        warn!(user_id = %claims.sub, "access token for missing user");
        AppError::unauthorized("Invalid access token")
    })?;

    Ok(user.into())
}

pub async fn require_session(
    State(st): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = resolve_session(&st, req.headers()).await?;
    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized("Unauthorized request"))
    }
}
