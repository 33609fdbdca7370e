//! Database module: models and schema for persistent storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `sqlite.rs`: pool setup plus `PollStorage` / `UserStorage`

pub mod models;
pub mod schema;
pub mod sqlite;

pub use models::{Choice, NewUser, Question, User};
pub use schema::SQLITE_INIT;
pub use sqlite::{PollStorage, SqlitePool, UserStorage, connect, is_unique_violation};
