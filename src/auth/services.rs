use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{CreditResponse, LoginRequest, RegisterRequest, TokenPair},
        password::{hash_password, meets_policy, verify_password},
        repo_types::{CreateUserError, NewUser, PublicUser},
    },
    error::{AppError, AppResult},
    state::AppState,
};

const NAME_MIN_CHARS: usize = 2;
const NAME_MAX_CHARS: usize = 50;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn require(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::bad_request(format!("{field} is required")));
    }
    Ok(())
}

/// Normalizes the payload and reports every failed check at once.
fn validate_registration(payload: &mut RegisterRequest) -> AppResult<()> {
    payload.name = payload.name.trim().to_string();
    payload.email = payload.email.trim().to_lowercase();

    let mut errors = Vec::new();
    for (field, value) in [
        ("name", &payload.name),
        ("email", &payload.email),
        ("password", &payload.password),
    ] {
        if value.trim().is_empty() {
            errors.push(format!("{field} is required"));
        }
    }

    let name_len = payload.name.chars().count();
    if !payload.name.is_empty() && !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&name_len) {
        errors.push("name must be between 2 and 50 characters".to_string());
    }
    if !payload.email.is_empty() && !is_valid_email(&payload.email) {
        errors.push(format!("{} is not a valid email address!", payload.email));
    }
    if !payload.password.trim().is_empty() && !meets_policy(&payload.password) {
        errors.push(
            "Password must contain uppercase, lowercase, number and special character".to_string(),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::invalid(errors))
    }
}

#[instrument(skip(st, payload))]
pub async fn register(st: &AppState, mut payload: RegisterRequest) -> AppResult<PublicUser> {
    validate_registration(&mut payload)?;

    if st.users.find_by_email(&payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(AppError::bad_request("User already exists with this email"));
    }

    let password_hash = hash_password(&payload.password)?;
    let user = st
        .users
        .create(NewUser {
            name: payload.name,
            email: payload.email,
            password_hash,
        })
        .await
        .map_err(|e| match e {
            CreateUserError::EmailTaken => AppError::bad_request(e.to_string()),
            CreateUserError::Other(e) => {
                error!(error = %e, "create user failed");
                AppError::from(e)
            }
        })?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user.into())
}

#[instrument(skip(st, payload))]
pub async fn login(st: &AppState, payload: LoginRequest) -> AppResult<(PublicUser, TokenPair)> {
    require("email", &payload.email)?;
    require("password", &payload.password)?;
    let email = payload.email.trim().to_lowercase();

    let Some(user) = st.users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::unauthorized("Invalid credentials"));
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::unauthorized("Invalid credentials"));
    }

    let pair = issue_pair(st, user.id).await?;
    info!(user_id = %user.id, "user logged in");
    Ok((user.into(), pair))
}

/// Mints a fresh access/refresh pair and stores the refresh token on the user,
/// revoking whatever was stored before. Nothing is returned unless the store succeeds.
#[instrument(skip(st))]
pub async fn issue_pair(st: &AppState, user_id: Uuid) -> AppResult<TokenPair> {
    let user = st
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let access_token = st.keys.sign_access(&user)?;
    let refresh_token = st.keys.sign_refresh(user.id)?;

    if !st
        .users
        .set_refresh_token(user.id, Some(&refresh_token))
        .await?
    {
        return Err(AppError::not_found("User not found"));
    }

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Verifies a presented refresh token against the stored one and rotates the pair.
#[instrument(skip(st, presented))]
pub async fn refresh(st: &AppState, presented: &str) -> AppResult<TokenPair> {
    let claims = st.keys.verify_refresh(presented).map_err(|e| {
        warn!(error = %e, "invalid refresh token");
        AppError::unauthorized("Invalid or expired refresh token")
    })?;

    let user = st
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| AppError::not_found("Invalid token"))?;

    if user.refresh_token.as_deref() != Some(presented) {
        warn!(user_id = %user.id, "refresh token mismatch");
        return Err(AppError::unauthorized(
            "Token mismatch, unauthorized request",
        ));
    }

    issue_pair(st, user.id).await
}

#[instrument(skip(st))]
pub async fn logout(st: &AppState, user_id: Uuid) -> AppResult<()> {
    if !st.users.set_refresh_token(user_id, None).await? {
        return Err(AppError::not_found("User not found"));
    }
    info!(user_id = %user_id, "user logged out");
    Ok(())
}

#[instrument(skip(st))]
pub async fn credit(st: &AppState, user_id: Uuid) -> AppResult<CreditResponse> {
    let user = st
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(CreditResponse {
        name: user.name,
        credit: user.credit_balance,
    })
}
