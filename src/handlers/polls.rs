use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::PrivateCookieJar;
use chrono::Utc;
use serde::Serialize;
use tera::Context;
use tracing::{debug, info, warn};

use crate::auth::{CurrentUser, RequireAuth, RequireLogin, session};
use crate::db::{Choice, Question};
use crate::error::PollsError;
use crate::forms::{self, ChoiceForm, MAX_TEXT_LENGTH, QuestionForm, VoteForm};
use crate::handlers::{redirect_with, render_page};
use crate::messages::Level;
use crate::router::PollsState;

const INVALID_FORM: &str = "Form is not valid";
const NO_CHOICE: &str = "You didn't select a choice.";

#[derive(Serialize)]
struct QuestionSummary {
    question: Question,
    recent: bool,
}

async fn question_or_404(state: &PollsState, question_id: i64) -> Result<Question, PollsError> {
    state
        .polls
        .get_question(question_id)
        .await?
        .ok_or(PollsError::NotFound)
}

async fn choice_or_404(
    state: &PollsState,
    question_id: i64,
    choice_id: i64,
) -> Result<Choice, PollsError> {
    state
        .polls
        .get_choice(question_id, choice_id)
        .await?
        .ok_or(PollsError::NotFound)
}

fn question_context(question: &Question) -> Context {
    let mut ctx = Context::new();
    ctx.insert("question", question);
    ctx.insert("max_text_length", &MAX_TEXT_LENGTH);
    ctx
}

/// GET / -> published questions, newest first, plus the create form.
pub async fn index(
    State(state): State<PollsState>,
    RequireLogin(user): RequireLogin,
    jar: PrivateCookieJar,
) -> Result<Response, PollsError> {
    let now = Utc::now();
    let latest_question_list: Vec<QuestionSummary> = state
        .polls
        .list_published(now)
        .await?
        .into_iter()
        .map(|question| QuestionSummary {
            recent: question.was_published_recently(now),
            question,
        })
        .collect();

    let mut ctx = Context::new();
    ctx.insert("latest_question_list", &latest_question_list);
    ctx.insert("max_text_length", &MAX_TEXT_LENGTH);
    ctx.insert("now_value", &forms::datetime_input_value(&now));
    render_page(&state, jar, Some(&user), "polls/index.html", ctx)
}

/// POST / -> create a question.
pub async fn create_question(
    State(state): State<PollsState>,
    RequireLogin(user): RequireLogin,
    jar: PrivateCookieJar,
    Form(form): Form<QuestionForm>,
) -> Result<Response, PollsError> {
    match form.validate() {
        Ok(input) => {
            let question = state
                .polls
                .create_question(&input.question_text, input.pub_date)
                .await?;
            info!(question_id = question.id, username = %user.username, "question created");
            Ok((jar, Redirect::to("/")).into_response())
        }
        Err(errors) => {
            debug!(%errors, "rejected question form");
            Ok(redirect_with(
                &state,
                jar,
                Level::Error,
                format!("{INVALID_FORM}: {errors}"),
                "/",
            ))
        }
    }
}

/// GET /{question_id}/
pub async fn detail(
    State(state): State<PollsState>,
    RequireAuth(user): RequireAuth,
    Path(question_id): Path<i64>,
    jar: PrivateCookieJar,
) -> Result<Response, PollsError> {
    let question = question_or_404(&state, question_id).await?;
    let choices = state.polls.choices_for(question_id).await?;

    let mut ctx = question_context(&question);
    ctx.insert("choices", &choices);
    render_page(&state, jar, Some(&user), "polls/detail.html", ctx)
}

/// GET /{question_id}/edit/
pub async fn edit_question_form(
    State(state): State<PollsState>,
    RequireAuth(user): RequireAuth,
    Path(question_id): Path<i64>,
    jar: PrivateCookieJar,
) -> Result<Response, PollsError> {
    let question = question_or_404(&state, question_id).await?;
    let mut ctx = question_context(&question);
    ctx.insert("pub_date_value", &forms::datetime_input_value(&question.pub_date));
    render_page(&state, jar, Some(&user), "polls/edit.html", ctx)
}

/// POST /{question_id}/edit/
pub async fn edit_question(
    State(state): State<PollsState>,
    RequireAuth(_user): RequireAuth,
    Path(question_id): Path<i64>,
    jar: PrivateCookieJar,
    Form(form): Form<QuestionForm>,
) -> Result<Response, PollsError> {
    question_or_404(&state, question_id).await?;
    match form.validate() {
        Ok(input) => {
            if !state
                .polls
                .update_question(question_id, &input.question_text, input.pub_date)
                .await?
            {
                return Err(PollsError::NotFound);
            }
            info!(question_id, "question updated");
            Ok((jar, Redirect::to(&format!("/{question_id}/"))).into_response())
        }
        Err(errors) => Ok(redirect_with(
            &state,
            jar,
            Level::Error,
            format!("{INVALID_FORM}: {errors}"),
            &format!("/{question_id}/edit/"),
        )),
    }
}

/// GET /{question_id}/delete/ -> delete the question and, by cascade, its choices.
pub async fn delete_question(
    State(state): State<PollsState>,
    Path(question_id): Path<i64>,
    jar: PrivateCookieJar,
) -> Result<Response, PollsError> {
    if !state.polls.delete_question(question_id).await? {
        return Err(PollsError::NotFound);
    }
    info!(question_id, "question deleted");
    Ok(redirect_with(
        &state,
        jar,
        Level::Info,
        format!("Question ID {question_id} deleted"),
        "/",
    ))
}

/// GET /{question_id}/add_choice/
pub async fn add_choice_form(
    State(state): State<PollsState>,
    CurrentUser(user): CurrentUser,
    Path(question_id): Path<i64>,
    jar: PrivateCookieJar,
) -> Result<Response, PollsError> {
    let question = question_or_404(&state, question_id).await?;
    let ctx = question_context(&question);
    render_page(&state, jar, user.as_ref(), "polls/add_choice.html", ctx)
}

/// POST /{question_id}/add_choice/
pub async fn add_choice(
    State(state): State<PollsState>,
    Path(question_id): Path<i64>,
    jar: PrivateCookieJar,
    Form(form): Form<ChoiceForm>,
) -> Result<Response, PollsError> {
    question_or_404(&state, question_id).await?;
    match form.validate() {
        Ok(input) => {
            let choice = state
                .polls
                .add_choice(question_id, &input.choice_text, input.votes.unwrap_or(0))
                .await?;
            info!(question_id, choice_id = choice.id, "choice added");
            Ok((jar, Redirect::to(&format!("/{question_id}/"))).into_response())
        }
        Err(errors) => Ok(redirect_with(
            &state,
            jar,
            Level::Error,
            format!("{INVALID_FORM}: {errors}"),
            &format!("/{question_id}/add_choice/"),
        )),
    }
}

/// GET /{question_id}/{choice_id}/edit_choice/
pub async fn edit_choice_form(
    State(state): State<PollsState>,
    CurrentUser(user): CurrentUser,
    Path((question_id, choice_id)): Path<(i64, i64)>,
    jar: PrivateCookieJar,
) -> Result<Response, PollsError> {
    let question = question_or_404(&state, question_id).await?;
    let choice = choice_or_404(&state, question_id, choice_id).await?;
    let mut ctx = question_context(&question);
    ctx.insert("choice", &choice);
    render_page(&state, jar, user.as_ref(), "polls/edit_choice.html", ctx)
}

/// POST /{question_id}/{choice_id}/edit_choice/
pub async fn edit_choice(
    State(state): State<PollsState>,
    Path((question_id, choice_id)): Path<(i64, i64)>,
    jar: PrivateCookieJar,
    Form(form): Form<ChoiceForm>,
) -> Result<Response, PollsError> {
    question_or_404(&state, question_id).await?;
    choice_or_404(&state, question_id, choice_id).await?;
    match form.validate() {
        Ok(input) => {
            if !state
                .polls
                .update_choice(question_id, choice_id, &input.choice_text, input.votes)
                .await?
            {
                return Err(PollsError::NotFound);
            }
            info!(question_id, choice_id, "choice updated");
            Ok((jar, Redirect::to(&format!("/{question_id}/"))).into_response())
        }
        Err(errors) => Ok(redirect_with(
            &state,
            jar,
            Level::Error,
            format!("{INVALID_FORM}: {errors}"),
            &format!("/{question_id}/{choice_id}/edit_choice/"),
        )),
    }
}

/// GET /{question_id}/results/
pub async fn results(
    State(state): State<PollsState>,
    CurrentUser(user): CurrentUser,
    Path(question_id): Path<i64>,
    jar: PrivateCookieJar,
) -> Result<Response, PollsError> {
    let question = question_or_404(&state, question_id).await?;
    let choices = state.polls.choices_for(question_id).await?;
    let total_votes = choices.iter().fold(0i64, |acc, c| acc.saturating_add(c.votes));

    let mut ctx = question_context(&question);
    ctx.insert("choices", &choices);
    ctx.insert("total_votes", &total_votes);
    render_page(&state, jar, user.as_ref(), "polls/results.html", ctx)
}

/// POST /{question_id}/vote/ -> add one vote to a choice of this question.
pub async fn vote(
    State(state): State<PollsState>,
    CurrentUser(user): CurrentUser,
    Path(question_id): Path<i64>,
    jar: PrivateCookieJar,
    Form(form): Form<VoteForm>,
) -> Result<Response, PollsError> {
    question_or_404(&state, question_id).await?;

    // anonymous visitors cannot open the detail page, so they retry after logging in
    let detail = format!("/{question_id}/");
    let back = match user {
        Some(_) => detail,
        None => session::login_url(&detail),
    };
    let Some(choice_id) = form.choice_id() else {
        debug!(question_id, "vote without a choice");
        return Ok(redirect_with(&state, jar, Level::Error, NO_CHOICE, &back));
    };

    match state.polls.record_vote(question_id, choice_id).await? {
        Some(votes) => {
            info!(question_id, choice_id, votes, "vote recorded");
            Ok((jar, Redirect::to(&format!("/{question_id}/results/"))).into_response())
        }
        None => {
            warn!(question_id, choice_id, "vote for a choice outside the question");
            Ok(redirect_with(&state, jar, Level::Error, NO_CHOICE, &back))
        }
    }
}
