//! Authentication endpoints (provider login round-trip).

use axum::{
    Router,
    extract::{Query, State},
    response::Redirect,
    routing::get,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use f4f_common::{AppError, AppResult};
use serde::Deserialize;
use url::Url;
use uuid::Uuid;

use crate::{extractors::AuthUser, middleware::AppState};

/// Cookie binding the browser to its pending authorization request.
const STATE_COOKIE: &str = "f4f_oauth_state";

fn cookie(state: &AppState, name: String, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.session.secure)
        .build()
}

/// Redirect the browser to the provider's authorization page.
async fn login(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    let (login_state, code_verifier) = state.sessions.begin_login().await;
    let authorize_url = state.identity.authorize_url(&login_state, &code_verifier);

    let jar = jar.add(cookie(&state, STATE_COOKIE.to_string(), login_state));
    (jar, Redirect::to(&authorize_url))
}

/// `{frontend_url}/profile?user={display_name}`, keeping any base path.
fn profile_redirect_url(frontend_url: &str, display_name: &str) -> AppResult<Url> {
    // A trailing slash makes `join` append instead of replacing the last segment.
    let base = format!("{}/", frontend_url.trim_end_matches('/'));
    let mut url = Url::parse(&base)
        .and_then(|base| base.join("profile"))
        .map_err(|e| AppError::Config(format!("Invalid frontend URL: {e}")))?;
    url.query_pairs_mut().append_pair("user", display_name);
    Ok(url)
}

/// Provider callback parameters.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Complete the login, open a session and send the browser to the frontend.
async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> AppResult<(CookieJar, Redirect)> {
    if let Some(error) = query.error {
        return Err(AppError::BadRequest(format!("Authorization denied: {error}")));
    }
    let code = query
        .code
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;
    let returned_state = query
        .state
        .ok_or_else(|| AppError::BadRequest("Missing state parameter".to_string()))?;

    if jar.get(STATE_COOKIE).map(Cookie::value) != Some(returned_state.as_str()) {
        return Err(AppError::BadRequest("OAuth state mismatch".to_string()));
    }
    let code_verifier = state
        .sessions
        .take_login(&returned_state)
        .await
        .ok_or_else(|| AppError::BadRequest("Login request expired".to_string()))?;

    let profile = state.identity.complete_login(&code, &code_verifier).await?;
    let user = state.user_service.upsert_from_login(&profile).await?;

    let cookie_name = state.config.session.cookie_name.clone();
    if let Some(previous) = jar
        .get(&cookie_name)
        .and_then(|c| Uuid::parse_str(c.value()).ok())
    {
        state.sessions.remove(previous).await;
    }
    let session_id = state.sessions.create(user.id, profile.credential).await;
    tracing::info!(user_id = user.id, screen_name = %user.display_name, "User logged in");

    let profile_url = profile_redirect_url(&state.config.server.frontend_url, &user.display_name)?;

    let jar = jar
        .remove(Cookie::build((STATE_COOKIE, "")).path("/"))
        .add(cookie(&state, cookie_name, session_id.to_string()));
    Ok((jar, Redirect::to(profile_url.as_str())))
}

/// Close the session and return to the frontend.
async fn logout(
    AuthUser(session): AuthUser,
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    state.sessions.remove(session.session_id).await;
    tracing::info!(user_id = session.user.id, "User logged out");

    let jar = jar.remove(Cookie::build((state.config.session.cookie_name.clone(), "")).path("/"));
    (jar, Redirect::to(&state.config.server.frontend_url))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login))
        .route("/callback", get(callback))
        .route("/logout", get(logout))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_redirect_keeps_base_path() {
        let url = profile_redirect_url("http://localhost:3000/app", "alice").unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/app/profile?user=alice");

        let url = profile_redirect_url("http://localhost:3000/app/", "alice").unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/app/profile?user=alice");
    }

    #[test]
    fn test_profile_redirect_bare_host_encodes_name() {
        let url = profile_redirect_url("http://localhost:3000", "a b&c").unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/profile?user=a+b%26c");
    }

    #[test]
    fn test_profile_redirect_rejects_invalid_base() {
        let err = profile_redirect_url("not a url", "alice").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
