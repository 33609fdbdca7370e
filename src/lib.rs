pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod forms;
pub mod handlers;
pub mod messages;
pub mod router;
pub mod templates;

pub use error::PollsError;
pub use router::{PollsState, polls_router};
