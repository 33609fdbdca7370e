use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::PrivateCookieJar;
use chrono::Utc;
use serde::Deserialize;
use tera::Context;
use tracing::{info, warn};

use crate::auth::{self, CurrentUser, hasher, session};
use crate::db::{NewUser, is_unique_violation};
use crate::error::PollsError;
use crate::forms::{LoginForm, RegisterForm};
use crate::handlers::{redirect_with, render_page};
use crate::messages::Level;
use crate::router::PollsState;

const BAD_CREDENTIALS: &str = "Invalid username or password.";
const REGISTER_PATH: &str = "/register/";

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

fn login_context(next: Option<&str>, username: &str, form_error: &str) -> Context {
    let mut ctx = Context::new();
    ctx.insert("next", next.unwrap_or_default());
    ctx.insert("username", username);
    ctx.insert("form_error", form_error);
    ctx
}

/// GET /login/
pub async fn login_form(
    State(state): State<PollsState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<NextQuery>,
    jar: PrivateCookieJar,
) -> Result<Response, PollsError> {
    let ctx = login_context(session::safe_next(query.next.as_deref()), "", "");
    render_page(&state, jar, user.as_ref(), "login.html", ctx)
}

/// POST /login/ -> start a session and continue to `next` or the index.
pub async fn login(
    State(state): State<PollsState>,
    Query(query): Query<NextQuery>,
    jar: PrivateCookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, PollsError> {
    let next = session::safe_next(query.next.as_deref());

    let user = match form.validate() {
        Ok(creds) => auth::authenticate(&state.users, &creds.username, &creds.password).await?,
        Err(_) => None,
    };

    let Some(user) = user else {
        let username = form.username.as_deref().unwrap_or_default().trim();
        warn!(username, "failed login");
        let ctx = login_context(next, username, BAD_CREDENTIALS);
        return render_page(&state, jar, None, "login.html", ctx);
    };

    state.users.touch_last_login(user.id, Utc::now()).await?;
    info!(user_id = user.id, username = %user.username, "logged in");
    let jar = session::start(jar, user.id, state.secure_cookies());
    Ok((jar, Redirect::to(next.unwrap_or("/"))).into_response())
}

/// GET /register/
pub async fn register_form(
    State(state): State<PollsState>,
    CurrentUser(user): CurrentUser,
    jar: PrivateCookieJar,
) -> Result<Response, PollsError> {
    render_page(&state, jar, user.as_ref(), "register.html", Context::new())
}

/// POST /register/
pub async fn register(
    State(state): State<PollsState>,
    jar: PrivateCookieJar,
    Form(form): Form<RegisterForm>,
) -> Result<Response, PollsError> {
    let reg = match form.validate() {
        Ok(reg) => reg,
        Err(errors) => {
            return Ok(redirect_with(
                &state,
                jar,
                Level::Error,
                format!("Form is not valid: {errors}"),
                REGISTER_PATH,
            ));
        }
    };

    if !reg.passwords_match() {
        return Ok(redirect_with(
            &state,
            jar,
            Level::Error,
            "Passwords are not the same.",
            REGISTER_PATH,
        ));
    }

    // Two independent lookups; when both are taken the email message wins.
    let mut conflict = None;
    if state.users.username_exists(&reg.username).await? {
        conflict = Some("User exist.");
    }
    if state.users.email_exists(&reg.email).await? {
        conflict = Some("Email exist.");
    }
    if let Some(message) = conflict {
        info!(username = %reg.username, reason = message, "registration conflict");
        return Ok(redirect_with(&state, jar, Level::Error, message, REGISTER_PATH));
    }

    let password_hash = hasher::hash_password_blocking(reg.password).await?;
    let created = state
        .users
        .create(NewUser {
            username: reg.username,
            email: reg.email,
            password_hash,
        })
        .await;

    match created {
        Ok(user) => {
            info!(user_id = user.id, username = %user.username, "user registered");
            Ok(redirect_with(
                &state,
                jar,
                Level::Success,
                "Your user was created.",
                session::LOGIN_PATH,
            ))
        }
        Err(e) if is_unique_violation(&e) => Ok(redirect_with(
            &state,
            jar,
            Level::Error,
            "User exist.",
            REGISTER_PATH,
        )),
        Err(e) => Err(e),
    }
}

/// GET|POST /logout/
pub async fn logout(jar: PrivateCookieJar) -> impl IntoResponse {
    (session::end(jar), Redirect::to(session::LOGIN_PATH))
}
