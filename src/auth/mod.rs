//! Accounts: password hashing and cookie sessions.

pub mod hasher;
pub mod session;

pub use session::{CurrentUser, RequireAuth, RequireLogin};

use crate::db::{User, UserStorage};
use crate::error::PollsError;

/// Check a username/password pair. `None` covers both unknown user and wrong password.
pub async fn authenticate(
    users: &UserStorage,
    username: &str,
    password: &str,
) -> Result<Option<User>, PollsError> {
    let Some(user) = users.get_by_username(username).await? else {
        return Ok(None);
    };
    let ok =
        hasher::verify_password_blocking(password.to_string(), user.password_hash.clone()).await?;
    Ok(ok.then_some(user))
}
