//! SQL DDL for the poll and user tables.
//! SQLite-first design; can be adapted for other RDBMS.

/// SQLite schema with:
/// - `questions` owning `choices` (`ON DELETE CASCADE`, needs `foreign_keys=ON`)
/// - `choices.votes` an integer defaulting to 0 and never negative
/// - `users.username` and `users.email` UNIQUE
/// - timestamps as RFC3339 text (UTC, `Z` suffix, fixed precision)
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS questions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    question_text TEXT NOT NULL,
    pub_date TEXT NOT NULL -- RFC3339
);

CREATE INDEX IF NOT EXISTS idx_questions_pub_date ON questions(pub_date);

CREATE TABLE IF NOT EXISTS choices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    question_id INTEGER NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
    choice_text TEXT NOT NULL,
    votes INTEGER NOT NULL DEFAULT 0 CHECK (typeof(votes) = 'integer' AND votes >= 0)
);

CREATE INDEX IF NOT EXISTS idx_choices_question_id ON choices(question_id);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL, -- argon2 PHC string
    date_joined TEXT NOT NULL, -- RFC3339
    last_login TEXT NULL -- RFC3339
);
"#;
