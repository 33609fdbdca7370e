use axum::{
    Router,
    extract::FromRef,
    routing::{get, post},
};
use axum_extra::extract::cookie::Key;
use tower_http::trace::TraceLayer;

use crate::db::{PollStorage, SqlitePool, UserStorage};
use crate::handlers::{accounts, polls};
use crate::templates::Templates;

/// Everything a handler needs, handed in explicitly per request.
#[derive(Clone)]
pub struct PollsState {
    pub polls: PollStorage,
    pub users: UserStorage,
    pub templates: Templates,
    cookie_key: Key,
    secure_cookies: bool,
}

impl PollsState {
    pub fn new(pool: SqlitePool, templates: Templates, cookie_key: Key, secure_cookies: bool) -> Self {
        Self {
            polls: PollStorage::new(pool.clone()),
            users: UserStorage::new(pool),
            templates,
            cookie_key,
            secure_cookies,
        }
    }

    pub fn cookie_key(&self) -> &Key {
        &self.cookie_key
    }

    pub fn secure_cookies(&self) -> bool {
        self.secure_cookies
    }
}

impl FromRef<PollsState> for Key {
    fn from_ref(state: &PollsState) -> Self {
        state.cookie_key.clone()
    }
}

pub fn polls_router(state: PollsState) -> Router {
    Router::new()
        .route("/", get(polls::index).post(polls::create_question))
        .route("/{question_id}/", get(polls::detail))
        .route(
            "/{question_id}/edit/",
            get(polls::edit_question_form).post(polls::edit_question),
        )
        .route("/{question_id}/delete/", get(polls::delete_question))
        .route(
            "/{question_id}/add_choice/",
            get(polls::add_choice_form).post(polls::add_choice),
        )
        .route(
            "/{question_id}/{choice_id}/edit_choice/",
            get(polls::edit_choice_form).post(polls::edit_choice),
        )
        .route("/{question_id}/results/", get(polls::results))
        .route("/{question_id}/vote/", post(polls::vote))
        .route("/login/", get(accounts::login_form).post(accounts::login))
        .route(
            "/register/",
            get(accounts::register_form).post(accounts::register),
        )
        .route("/logout/", get(accounts::logout).post(accounts::logout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
