use crate::db::models::{Choice, NewUser, Question, User};
use crate::db::schema::SQLITE_INIT;
use crate::error::PollsError;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;
use tracing::info;

pub type SqlitePool = Pool<Sqlite>;

/// Open (creating if missing) the database at `database_url` and apply the schema.
pub async fn connect(database_url: &str) -> Result<SqlitePool, PollsError> {
    let connect_opts = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal);
    let pool = SqlitePoolOptions::new().connect_with(connect_opts).await?;
    init_schema(&pool).await?;
    info!(database_url, "database ready");
    Ok(pool)
}

/// Initialize the schema by executing the bundled DDL.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), PollsError> {
    // sqlx::query runs a single statement at a time
    for stmt in SQLITE_INIT.split(';') {
        let s = stmt.trim();
        if s.is_empty() {
            continue;
        }
        sqlx::query(s).execute(pool).await?;
    }
    Ok(())
}

pub(crate) fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_ts(raw: &str) -> Result<DateTime<Utc>, PollsError> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
        .with_timezone(&Utc))
}

/// Questions and their choices.
#[derive(Clone)]
pub struct PollStorage {
    pool: SqlitePool,
}

impl PollStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Questions published at or before `now`, newest first.
    pub async fn list_published(&self, now: DateTime<Utc>) -> Result<Vec<Question>, PollsError> {
        let rows = sqlx::query(
            r#"SELECT id, question_text, pub_date FROM questions
               WHERE pub_date <= ? ORDER BY pub_date DESC, id DESC"#,
        )
        .bind(encode_ts(&now))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_question).collect()
    }

    pub async fn get_question(&self, id: i64) -> Result<Option<Question>, PollsError> {
        let row = sqlx::query("SELECT id, question_text, pub_date FROM questions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_question).transpose()
    }

    pub async fn create_question(
        &self,
        question_text: &str,
        pub_date: DateTime<Utc>,
    ) -> Result<Question, PollsError> {
        let rec: (i64,) =
            sqlx::query_as("INSERT INTO questions (question_text, pub_date) VALUES (?, ?) RETURNING id")
                .bind(question_text)
                .bind(encode_ts(&pub_date))
                .fetch_one(&self.pool)
                .await?;
        Ok(Question {
            id: rec.0,
            question_text: question_text.to_string(),
            pub_date,
        })
    }

    /// Returns false when no question has this id.
    pub async fn update_question(
        &self,
        id: i64,
        question_text: &str,
        pub_date: DateTime<Utc>,
    ) -> Result<bool, PollsError> {
        let res = sqlx::query("UPDATE questions SET question_text = ?, pub_date = ? WHERE id = ?")
            .bind(question_text)
            .bind(encode_ts(&pub_date))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Deletes the question; its choices go with it through the FK cascade.
    pub async fn delete_question(&self, id: i64) -> Result<bool, PollsError> {
        let res = sqlx::query("DELETE FROM questions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn choices_for(&self, question_id: i64) -> Result<Vec<Choice>, PollsError> {
        let rows = sqlx::query(
            r#"SELECT id, question_id, choice_text, votes FROM choices
               WHERE question_id = ? ORDER BY id"#,
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_choice).collect()
    }

    /// Look up a choice only if it belongs to `question_id`.
    pub async fn get_choice(
        &self,
        question_id: i64,
        choice_id: i64,
    ) -> Result<Option<Choice>, PollsError> {
        let row = sqlx::query(
            r#"SELECT id, question_id, choice_text, votes FROM choices
               WHERE id = ? AND question_id = ?"#,
        )
        .bind(choice_id)
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_choice).transpose()
    }

    pub async fn add_choice(
        &self,
        question_id: i64,
        choice_text: &str,
        votes: i64,
    ) -> Result<Choice, PollsError> {
        let rec: (i64,) = sqlx::query_as(
            "INSERT INTO choices (question_id, choice_text, votes) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(question_id)
        .bind(choice_text)
        .bind(votes)
        .fetch_one(&self.pool)
        .await?;
        Ok(Choice {
            id: rec.0,
            question_id,
            choice_text: choice_text.to_string(),
            votes,
        })
    }

    /// Update a choice scoped to its question. `votes: None` keeps the current tally.
    pub async fn update_choice(
        &self,
        question_id: i64,
        choice_id: i64,
        choice_text: &str,
        votes: Option<i64>,
    ) -> Result<bool, PollsError> {
        let res = sqlx::query(
            r#"UPDATE choices SET choice_text = ?, votes = COALESCE(?, votes)
               WHERE id = ? AND question_id = ?"#,
        )
        .bind(choice_text)
        .bind(votes)
        .bind(choice_id)
        .bind(question_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Add one vote in a single statement so concurrent votes cannot overwrite
    /// each other. The tally saturates at `i64::MAX`. Returns the new tally, or
    /// `None` when the choice does not belong to the question.
    pub async fn record_vote(
        &self,
        question_id: i64,
        choice_id: i64,
    ) -> Result<Option<i64>, PollsError> {
        let rec: Option<(i64,)> = sqlx::query_as(
            r#"UPDATE choices
               SET votes = CASE WHEN votes < 9223372036854775807 THEN votes + 1 ELSE votes END
               WHERE id = ? AND question_id = ? RETURNING votes"#,
        )
        .bind(choice_id)
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rec.map(|r| r.0))
    }

    fn row_to_question(row: SqliteRow) -> Result<Question, PollsError> {
        let pub_date: String = row.try_get("pub_date")?;
        Ok(Question {
            id: row.try_get("id")?,
            question_text: row.try_get("question_text")?,
            pub_date: decode_ts(&pub_date)?,
        })
    }

    fn row_to_choice(row: SqliteRow) -> Result<Choice, PollsError> {
        Ok(Choice {
            id: row.try_get("id")?,
            question_id: row.try_get("question_id")?,
            choice_text: row.try_get("choice_text")?,
            votes: row.try_get("votes")?,
        })
    }
}

/// Registered accounts.
#[derive(Clone)]
pub struct UserStorage {
    pool: SqlitePool,
}

impl UserStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool, PollsError> {
        let rec: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(rec.0 > 0)
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool, PollsError> {
        let rec: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(rec.0 > 0)
    }

    pub async fn count(&self) -> Result<i64, PollsError> {
        let rec: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(rec.0)
    }

    /// Insert a user. A UNIQUE violation surfaces as `sqlx::Error::Database`.
    pub async fn create(&self, new: NewUser) -> Result<User, PollsError> {
        // stored at microsecond precision
        let date_joined = Utc::now().trunc_subsecs(6);
        let rec: (i64,) = sqlx::query_as(
            r#"INSERT INTO users (username, email, password_hash, date_joined)
               VALUES (?, ?, ?, ?) RETURNING id"#,
        )
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(encode_ts(&date_joined))
        .fetch_one(&self.pool)
        .await?;
        Ok(User {
            id: rec.0,
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            date_joined,
            last_login: None,
        })
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, PollsError> {
        let row = sqlx::query(
            r#"SELECT id, username, email, password_hash, date_joined, last_login
               FROM users WHERE id = ?"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_model).transpose()
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, PollsError> {
        let row = sqlx::query(
            r#"SELECT id, username, email, password_hash, date_joined, last_login
               FROM users WHERE username = ?"#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_model).transpose()
    }

    pub async fn touch_last_login(&self, id: i64, at: DateTime<Utc>) -> Result<(), PollsError> {
        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(encode_ts(&at))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn row_to_model(row: SqliteRow) -> Result<User, PollsError> {
        let date_joined: String = row.try_get("date_joined")?;
        let last_login: Option<String> = row.try_get("last_login")?;
        Ok(User {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            date_joined: decode_ts(&date_joined)?,
            last_login: last_login.as_deref().map(decode_ts).transpose()?,
        })
    }
}

/// True when `err` is a UNIQUE constraint violation.
pub fn is_unique_violation(err: &PollsError) -> bool {
    match err {
        PollsError::DatabaseError(sqlx::Error::Database(db)) => db.is_unique_violation(),
        _ => false,
    }
}
