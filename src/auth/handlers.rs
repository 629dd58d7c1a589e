use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::{json, Value};
use tracing::instrument;

use crate::{
    auth::{
        dto::{CreditResponse, LoginRequest, LoginResponse, RefreshRequest, RegisterRequest, TokenPair},
        extractors::{require_session, CurrentUser, ACCESS_COOKIE, REFRESH_COOKIE},
        repo_types::PublicUser,
        services,
    },
    error::{AppError, AppResult},
    extract::AppJson,
    response::ApiResponse,
    state::AppState,
};

pub fn account_routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token));

    let protected = Router::new()
        .route("/logout", post(logout))
        .route("/current-user", get(current_user))
        .route("/credit", get(credit))
        .route_layer(middleware::from_fn_with_state(state, require_session));

    public.merge(protected)
}

fn session_cookie(name: &'static str, value: String, production: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(production)
        .same_site(if production { SameSite::None } else { SameSite::Lax })
        .build()
}

fn with_session(jar: CookieJar, pair: &TokenPair, production: bool) -> CookieJar {
    jar.add(session_cookie(ACCESS_COOKIE, pair.access_token.clone(), production))
        .add(session_cookie(REFRESH_COOKIE, pair.refresh_token.clone(), production))
}

fn without_session(jar: CookieJar, production: bool) -> CookieJar {
    jar.remove(session_cookie(ACCESS_COOKIE, String::new(), production))
        .remove(session_cookie(REFRESH_COOKIE, String::new(), production))
}

#[instrument(skip(st, payload))]
pub async fn register(
    State(st): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> AppResult<ApiResponse<PublicUser>> {
    let user = services::register(&st, payload).await?;
    Ok(ApiResponse::ok(user, "User registered successfully"))
}

#[instrument(skip(st, jar, payload))]
pub async fn login(
    State(st): State<AppState>,
    jar: CookieJar,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<(CookieJar, ApiResponse<LoginResponse>)> {
    let (user, pair) = services::login(&st, payload).await?;
    let jar = with_session(jar, &pair, st.config.production);
    Ok((
        jar,
        ApiResponse::ok(
            LoginResponse {
                user,
                access_token: pair.access_token,
                refresh_token: pair.refresh_token,
            },
            "User logged in successfully",
        ),
    ))
}

#[instrument(skip(st, jar, body))]
pub async fn refresh_token(
    State(st): State<AppState>,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> AppResult<(CookieJar, ApiResponse<TokenPair>)> {
    let presented = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| body.and_then(|Json(b)| b.refresh_token))
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::unauthorized("unauthorized request, refresh token missing"))?;

    let pair = services::refresh(&st, &presented).await?;
    let jar = with_session(jar, &pair, st.config.production);
    Ok((jar, ApiResponse::ok(pair, "Access token refreshed")))
}

/// Clears the stored refresh token and both cookies. A still-valid access token
/// keeps working until it expires.
#[instrument(skip(st, user, jar), fields(user_id = %user.id))]
pub async fn logout(
    State(st): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
) -> AppResult<(CookieJar, ApiResponse<Value>)> {
    services::logout(&st, user.id).await?;
    let jar = without_session(jar, st.config.production);
    Ok((jar, ApiResponse::ok(json!({}), "User logged out successfully")))
}

pub async fn current_user(CurrentUser(user): CurrentUser) -> ApiResponse<PublicUser> {
    ApiResponse::ok(user, "Current user fetched successfully")
}

#[instrument(skip(st, user), fields(user_id = %user.id))]
pub async fn credit(
    State(st): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<ApiResponse<CreditResponse>> {
    let credit = services::credit(&st, user.id).await?;
    Ok(ApiResponse::ok(credit, "User credit fetched successfully"))
}
