//! Authentication HTTP surface.
//!
//! - GET  /auth/{provider}/login     redirect to the provider with CSRF state
//! - GET  /auth/{provider}/callback  complete the login, mint a token pair
//! - GET  /auth/profile              the admitted user's profile
//! - POST /auth/logout               revoke a token pair

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Redirect,
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use keygate_identity::{ProviderKind, User};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;

use super::AppState;
use super::middleware::RequireAuth;
use crate::error::ApiError;

/// Cookie carrying the CSRF state between login and callback.
const LOGIN_STATE_COOKIE: &str = "login_state";

/// How long a login attempt may take before its state cookie lapses.
const LOGIN_STATE_TTL: time::Duration = time::Duration::minutes(10);

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/auth/{provider}/login", get(login))
        .route("/auth/{provider}/callback", get(callback))
        .route("/auth/profile", get(profile))
        .route("/auth/logout", post(logout))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    #[serde(default)]
    code: String,
    #[serde(default)]
    state: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    access_token: String,
    refresh_token: String,
    access_expires_at: DateTime<Utc>,
    refresh_expires_at: DateTime<Utc>,
    user: User,
}

#[derive(Debug, Deserialize)]
struct LogoutRequest {
    #[serde(default)]
    refresh_token: String,
}

fn parse_provider(name: &str) -> Result<ProviderKind, ApiError> {
    ProviderKind::from_str(name).map_err(|_| ApiError::unknown_provider(name))
}

async fn login(
    Path(provider): Path<String>,
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), ApiError> {
    let kind = parse_provider(&provider)?;
    let adapter = state
        .flow
        .provider(kind)
        .ok_or_else(|| ApiError::unknown_provider(&provider))?;

    let (auth_url, login_state) = adapter.authorization_url();

    let cookie = Cookie::build((LOGIN_STATE_COOKIE, login_state.csrf_token))
        .path("/")
        .http_only(true)
        .secure(state.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(LOGIN_STATE_TTL)
        .build();

    Ok((jar.add(cookie), Redirect::temporary(&auth_url)))
}

async fn callback(
    Path(provider): Path<String>,
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let kind = parse_provider(&provider)?;

    let expected = jar
        .get(LOGIN_STATE_COOKIE)
        .ok_or_else(ApiError::missing_login_state)?;
    if query.state.is_empty() || query.state != expected.value() {
        return Err(ApiError::csrf_mismatch());
    }

    let outcome = state.flow.login(kind, &query.code).await?;

    // The state cookie is single-use.
    let removal = Cookie::build((LOGIN_STATE_COOKIE, ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .build();
    let jar = jar.remove(removal);

    Ok((
        jar,
        Json(LoginResponse {
            access_token: outcome.access_token,
            refresh_token: outcome.refresh_token,
            access_expires_at: outcome.access_expires_at,
            refresh_expires_at: outcome.refresh_expires_at,
            user: outcome.user,
        }),
    ))
}

async fn profile(RequireAuth(user): RequireAuth) -> Json<User> {
    Json(user)
}

async fn logout(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LogoutRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.flow.logout(&request.refresh_token).await?;
    Ok(Json(json!({
        "status": 200,
        "kind": "ok",
        "message": "logged out"
    })))
}
