//! Submitted form payloads and their validation.
//!
//! Every field arrives as `Option<String>` so a malformed or partial submission
//! never fails extraction; `validate()` turns it into cleaned input or a list of
//! field errors the handler reports back to the user.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use std::fmt;
use thiserror::Error as ThisError;

pub const MAX_TEXT_LENGTH: usize = 200;
pub const MAX_USERNAME_LENGTH: usize = 150;
/// Largest tally a form may set; the column itself is a 64-bit integer.
pub const MAX_VOTES: i64 = i32::MAX as i64;

const DATETIME_INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum FieldError {
    #[error("{0}: this field is required")]
    Required(&'static str),

    #[error("{field}: ensure this value has at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("{0}: enter a valid date/time")]
    InvalidDateTime(&'static str),

    #[error("{0}: enter a whole number")]
    InvalidNumber(&'static str),

    #[error("{0}: ensure this value is greater than or equal to 0")]
    Negative(&'static str),

    #[error("{field}: ensure this value is less than or equal to {max}")]
    TooLarge { field: &'static str, max: i64 },

    #[error("{0}: enter a valid email address")]
    InvalidEmail(&'static str),
}

/// All field errors of one submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormErrors(pub Vec<FieldError>);

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn push(&mut self, err: FieldError) {
        self.0.push(err);
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, FormErrors> {
        if self.is_empty() { Ok(value()) } else { Err(self) }
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join("; "))
    }
}

fn clean_text(
    raw: Option<&str>,
    field: &'static str,
    max: usize,
    errors: &mut FormErrors,
) -> String {
    let value = raw.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        errors.push(FieldError::Required(field));
    } else if value.chars().count() > max {
        errors.push(FieldError::TooLong { field, max });
    }
    value.to_string()
}

/// Password fields are not trimmed.
fn clean_secret(raw: Option<&str>, field: &'static str, errors: &mut FormErrors) -> String {
    let value = raw.unwrap_or_default();
    if value.is_empty() {
        errors.push(FieldError::Required(field));
    }
    value.to_string()
}

/// Parse a submitted timestamp. Values without an offset are taken as UTC.
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    DATETIME_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

/// Value for an `<input type="datetime-local" step="1">`.
pub fn datetime_input_value(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[derive(Debug, Default, Deserialize)]
pub struct QuestionForm {
    pub question_text: Option<String>,
    pub pub_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionInput {
    pub question_text: String,
    pub pub_date: DateTime<Utc>,
}

impl QuestionForm {
    pub fn validate(&self) -> Result<QuestionInput, FormErrors> {
        let mut errors = FormErrors::default();
        let question_text = clean_text(
            self.question_text.as_deref(),
            "question_text",
            MAX_TEXT_LENGTH,
            &mut errors,
        );
        let pub_date = match self.pub_date.as_deref().map(str::trim) {
            None | Some("") => {
                errors.push(FieldError::Required("pub_date"));
                None
            }
            Some(raw) => {
                let parsed = parse_datetime(raw);
                if parsed.is_none() {
                    errors.push(FieldError::InvalidDateTime("pub_date"));
                }
                parsed
            }
        };
        match pub_date {
            Some(pub_date) => errors.into_result(|| QuestionInput {
                question_text,
                pub_date,
            }),
            None => Err(errors),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ChoiceForm {
    pub choice_text: Option<String>,
    pub votes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceInput {
    pub choice_text: String,
    /// `None` when the field was left empty.
    pub votes: Option<i64>,
}

impl ChoiceForm {
    pub fn validate(&self) -> Result<ChoiceInput, FormErrors> {
        let mut errors = FormErrors::default();
        let choice_text = clean_text(
            self.choice_text.as_deref(),
            "choice_text",
            MAX_TEXT_LENGTH,
            &mut errors,
        );
        let votes = match self.votes.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) if n < 0 => {
                    errors.push(FieldError::Negative("votes"));
                    None
                }
                Ok(n) if n > MAX_VOTES => {
                    errors.push(FieldError::TooLarge {
                        field: "votes",
                        max: MAX_VOTES,
                    });
                    None
                }
                Ok(n) => Some(n),
                Err(_) => {
                    errors.push(FieldError::InvalidNumber("votes"));
                    None
                }
            },
        };
        errors.into_result(|| ChoiceInput { choice_text, votes })
    }
}

/// The vote form carries a single radio value.
#[derive(Debug, Default, Deserialize)]
pub struct VoteForm {
    pub choice: Option<String>,
}

impl VoteForm {
    pub fn choice_id(&self) -> Option<i64> {
        self.choice.as_deref()?.trim().parse().ok()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<Credentials, FormErrors> {
        let mut errors = FormErrors::default();
        let username = clean_text(
            self.username.as_deref(),
            "username",
            MAX_USERNAME_LENGTH,
            &mut errors,
        );
        let password = clean_secret(self.password.as_deref(), "password", &mut errors);
        errors.into_result(|| Credentials { username, password })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterForm {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

impl Registration {
    pub fn passwords_match(&self) -> bool {
        self.password == self.password_confirmation
    }
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

impl RegisterForm {
    pub fn validate(&self) -> Result<Registration, FormErrors> {
        let mut errors = FormErrors::default();
        let username = clean_text(
            self.username.as_deref(),
            "username",
            MAX_USERNAME_LENGTH,
            &mut errors,
        );
        let email = clean_text(self.email.as_deref(), "email", MAX_TEXT_LENGTH, &mut errors);
        if !email.is_empty() && !looks_like_email(&email) {
            errors.push(FieldError::InvalidEmail("email"));
        }
        let password = clean_secret(self.password.as_deref(), "password", &mut errors);
        let password_confirmation = clean_secret(
            self.password_confirmation.as_deref(),
            "password_confirmation",
            &mut errors,
        );
        errors.into_result(|| Registration {
            username,
            email,
            password,
            password_confirmation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn question(text: &str, date: &str) -> QuestionForm {
        QuestionForm {
            question_text: Some(text.to_string()),
            pub_date: Some(date.to_string()),
        }
    }

    #[test]
    fn accepts_the_usual_datetime_shapes() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        for raw in [
            "2024-05-01 12:30",
            "2024-05-01 12:30:00",
            "2024-05-01T12:30",
            "2024-05-01T12:30:00",
            "2024-05-01T12:30:00Z",
            "2024-05-01T14:30:00+02:00",
        ] {
            assert_eq!(parse_datetime(raw), Some(expected), "{raw}");
        }
        assert_eq!(
            parse_datetime("2024-05-01"),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_datetime("yesterday"), None);
    }

    #[test]
    fn question_text_is_trimmed_and_bounded() {
        let ok = question("  Favorite color?  ", "2024-05-01 12:30").validate().unwrap();
        assert_eq!(ok.question_text, "Favorite color?");

        let exactly = "x".repeat(MAX_TEXT_LENGTH);
        assert!(question(&exactly, "2024-05-01").validate().is_ok());

        let too_long = "x".repeat(MAX_TEXT_LENGTH + 1);
        let errors = question(&too_long, "2024-05-01").validate().unwrap_err();
        assert_eq!(
            errors.0,
            vec![FieldError::TooLong {
                field: "question_text",
                max: MAX_TEXT_LENGTH
            }]
        );
    }

    #[test]
    fn missing_question_fields_are_all_reported() {
        let errors = QuestionForm::default().validate().unwrap_err();
        assert_eq!(
            errors.0,
            vec![
                FieldError::Required("question_text"),
                FieldError::Required("pub_date")
            ]
        );

        let errors = question("ok", "not a date").validate().unwrap_err();
        assert_eq!(errors.0, vec![FieldError::InvalidDateTime("pub_date")]);
    }

    #[test]
    fn choice_votes_are_optional_and_bounded() {
        let form = ChoiceForm {
            choice_text: Some("Red".into()),
            votes: Some("".into()),
        };
        assert_eq!(form.validate().unwrap().votes, None);

        let form = ChoiceForm {
            choice_text: Some("Red".into()),
            votes: Some("7".into()),
        };
        assert_eq!(form.validate().unwrap().votes, Some(7));

        let form = ChoiceForm {
            choice_text: Some("Red".into()),
            votes: Some("-1".into()),
        };
        assert_eq!(form.validate().unwrap_err().0, vec![FieldError::Negative("votes")]);

        let form = ChoiceForm {
            choice_text: Some("Red".into()),
            votes: Some("2147483647".into()),
        };
        assert_eq!(form.validate().unwrap().votes, Some(MAX_VOTES));

        for raw in ["2147483648", "9223372036854775807"] {
            let form = ChoiceForm {
                choice_text: Some("Red".into()),
                votes: Some(raw.into()),
            };
            assert_eq!(
                form.validate().unwrap_err().0,
                vec![FieldError::TooLarge {
                    field: "votes",
                    max: MAX_VOTES
                }]
            );
        }

        let form = ChoiceForm {
            choice_text: None,
            votes: Some("lots".into()),
        };
        assert_eq!(
            form.validate().unwrap_err().0,
            vec![
                FieldError::Required("choice_text"),
                FieldError::InvalidNumber("votes")
            ]
        );
    }

    #[test]
    fn vote_form_ignores_garbage() {
        assert_eq!(VoteForm { choice: Some("12".into()) }.choice_id(), Some(12));
        assert_eq!(VoteForm { choice: Some("twelve".into()) }.choice_id(), None);
        assert_eq!(VoteForm::default().choice_id(), None);
    }

    #[test]
    fn registration_checks_email_shape() {
        let mut form = RegisterForm {
            username: Some("bob".into()),
            email: Some("bob@example.com".into()),
            password: Some("hunter22".into()),
            password_confirmation: Some("hunter23".into()),
        };
        let reg = form.validate().unwrap();
        assert!(!reg.passwords_match());

        form.email = Some("bob-at-example".into());
        assert_eq!(form.validate().unwrap_err().0, vec![FieldError::InvalidEmail("email")]);
    }

    #[test]
    fn errors_render_as_one_line() {
        let errors = FormErrors(vec![
            FieldError::Required("username"),
            FieldError::Required("password"),
        ]);
        assert_eq!(
            errors.to_string(),
            "username: this field is required; password: this field is required"
        );
    }
}
