//! One-shot flash messages carried across a redirect in an encrypted cookie.

use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use serde::{Deserialize, Serialize};
use tracing::warn;

const MESSAGES_COOKIE: &str = "messages";
/// Older messages are dropped past this many, keeping the cookie small.
const MAX_QUEUED: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub level: Level,
    pub text: String,
}

fn pending(jar: &PrivateCookieJar) -> Vec<Message> {
    jar.get(MESSAGES_COOKIE)
        .and_then(|c| serde_json::from_str(c.value()).ok())
        .unwrap_or_default()
}

/// Queue a message for the next rendered page. A repeat of the newest queued
/// message is not queued twice.
pub fn push(
    jar: PrivateCookieJar,
    secure: bool,
    level: Level,
    text: impl Into<String>,
) -> PrivateCookieJar {
    let mut queued = pending(&jar);
    let message = Message {
        level,
        text: text.into(),
    };
    if queued.last() == Some(&message) {
        return jar;
    }
    queued.push(message);
    if queued.len() > MAX_QUEUED {
        queued.drain(..queued.len() - MAX_QUEUED);
    }
    let value = match serde_json::to_string(&queued) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "failed to encode flash messages");
            return jar;
        }
    };
    jar.add(
        Cookie::build((MESSAGES_COOKIE, value))
            .path("/")
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax)
            .build(),
    )
}

/// Drain queued messages; the cookie is cleared in the returned jar.
pub fn take(jar: PrivateCookieJar) -> (PrivateCookieJar, Vec<Message>) {
    let queued = pending(&jar);
    if queued.is_empty() {
        return (jar, queued);
    }
    (jar.remove(Cookie::build(MESSAGES_COOKIE).path("/")), queued)
}
