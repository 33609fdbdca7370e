pub mod accounts;
pub mod polls;

use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::PrivateCookieJar;
use tera::Context;

use crate::db::User;
use crate::error::PollsError;
use crate::messages::{self, Level};
use crate::router::PollsState;

/// Render `template` with the visitor and any pending flash messages.
pub(crate) fn render_page(
    state: &PollsState,
    jar: PrivateCookieJar,
    user: Option<&User>,
    template: &str,
    mut ctx: Context,
) -> Result<Response, PollsError> {
    let (jar, pending) = messages::take(jar);
    ctx.insert("messages", &pending);
    ctx.insert("user", &user);
    let html = state.templates.render(template, &ctx)?;
    Ok((jar, html).into_response())
}

/// Redirect after queueing a flash message.
pub(crate) fn redirect_with(
    state: &PollsState,
    jar: PrivateCookieJar,
    level: Level,
    text: impl Into<String>,
    to: &str,
) -> Response {
    let jar = messages::push(jar, state.secure_cookies(), level, text);
    (jar, Redirect::to(to)).into_response()
}
