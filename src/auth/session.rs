use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use time::Duration;
use tracing::debug;

use crate::db::User;
use crate::error::PollsError;
use crate::messages;
use crate::router::PollsState;

const SESSION_COOKIE: &str = "sessionid";
pub const LOGIN_PATH: &str = "/login/";

/// Attach a session for `user_id` to the jar.
pub fn start(jar: PrivateCookieJar, user_id: i64, secure: bool) -> PrivateCookieJar {
    jar.add(
        Cookie::build((SESSION_COOKIE, user_id.to_string()))
            .path("/")
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax)
            .max_age(Duration::weeks(2))
            .build(),
    )
}

pub fn end(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

/// Resolve the session cookie to a live user. Stale or tampered sessions count as anonymous.
pub async fn current_user(parts: &Parts, state: &PollsState) -> Result<Option<User>, PollsError> {
    let jar = PrivateCookieJar::from_headers(&parts.headers, state.cookie_key().clone());
    let Some(user_id) = jar
        .get(SESSION_COOKIE)
        .and_then(|c| c.value().parse::<i64>().ok())
    else {
        return Ok(None);
    };
    let user = state.users.get_by_id(user_id).await?;
    if user.is_none() {
        debug!(user_id, "session refers to a missing user");
    }
    Ok(user)
}

/// Only local absolute paths are followed after login.
///
/// Browsers drop tabs and newlines inside a `Location`, so `/\t/host` would
/// become `//host`; anything with control characters or whitespace is refused.
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| {
        !n.chars().any(|c| c.is_control() || c.is_whitespace())
            && n.starts_with('/')
            && !n.starts_with("//")
            && !n.contains('\\')
    })
}

/// `/login/?next=<next>` with `next` percent-encoded.
pub fn login_url(next: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{LOGIN_PATH}?next={encoded}")
}

fn login_redirect(next: &str) -> Response {
    Redirect::to(&login_url(next)).into_response()
}

/// 403 page. Pending flash messages are dropped with it, since nothing on the
/// error page displays them.
fn forbidden(parts: &Parts, state: &PollsState) -> Response {
    let jar = PrivateCookieJar::from_headers(&parts.headers, state.cookie_key().clone());
    let (jar, dropped) = messages::take(jar);
    if !dropped.is_empty() {
        debug!(count = dropped.len(), "discarding flash messages on 403");
    }
    (jar, PollsError::Forbidden).into_response()
}

/// The visitor, logged in or not.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<User>);

impl FromRequestParts<PollsState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &PollsState,
    ) -> Result<Self, Self::Rejection> {
        let user = current_user(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        Ok(Self(user))
    }
}

/// Logged-in user; anonymous visitors are sent to the login page with `?next=`.
#[derive(Debug, Clone)]
pub struct RequireLogin(pub User);

impl FromRequestParts<PollsState> for RequireLogin {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &PollsState,
    ) -> Result<Self, Self::Rejection> {
        match current_user(parts, state).await {
            Ok(Some(user)) => Ok(Self(user)),
            Ok(None) => Err(login_redirect(parts.uri.path())),
            Err(e) => Err(e.into_response()),
        }
    }
}

/// Logged-in user; anonymous visitors get 403.
#[derive(Debug, Clone)]
pub struct RequireAuth(pub User);

impl FromRequestParts<PollsState> for RequireAuth {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &PollsState,
    ) -> Result<Self, Self::Rejection> {
        match current_user(parts, state).await {
            Ok(Some(user)) => Ok(Self(user)),
            Ok(None) => Err(forbidden(parts, state)),
            Err(e) => Err(e.into_response()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_local_paths_are_safe() {
        assert_eq!(safe_next(Some("/3/")), Some("/3/"));
        assert_eq!(safe_next(Some("//evil.example/")), None);
        assert_eq!(safe_next(Some("https://evil.example/")), None);
        assert_eq!(safe_next(Some("/\\evil.example")), None);
        assert_eq!(safe_next(Some("/\t/evil.example/")), None);
        assert_eq!(safe_next(Some("/\nevil")), None);
        assert_eq!(safe_next(Some("/ /evil.example/")), None);
        assert_eq!(safe_next(Some("/\u{7f}")), None);
        assert_eq!(safe_next(None), None);
    }

    #[test]
    fn login_redirect_encodes_next() {
        let resp = login_redirect("/1/edit/");
        let location = resp.headers().get("location").unwrap().to_str().unwrap();
        assert_eq!(location, "/login/?next=%2F1%2Fedit%2F");
    }
}
