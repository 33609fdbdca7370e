#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use axum_extra::extract::cookie::Key;
use std::{
    collections::BTreeMap,
    fs,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};
use tower::ServiceExt;

use polls::templates::Templates;
use polls::{PollsState, polls_router};

pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

impl TestResponse {
    pub fn assert_redirect(&self, to: &str) {
        assert!(
            self.status.is_redirection(),
            "expected redirect to {to}, got {}",
            self.status
        );
        assert_eq!(self.location.as_deref(), Some(to));
    }
}

/// Router plus a hand-rolled cookie store, backed by a throwaway SQLite file.
pub struct TestApp {
    pub state: PollsState,
    router: Router,
    cookies: BTreeMap<String, String>,
    db_path: PathBuf,
}

impl TestApp {
    pub async fn spawn(tag: &str) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before UNIX_EPOCH")
            .as_nanos();

        let mut db_path = std::env::temp_dir();
        db_path.push(format!(
            "polls-{tag}-{}-{}.sqlite",
            std::process::id(),
            nanos
        ));

        let database_url = format!("sqlite:{}", db_path.display());
        let pool = polls::db::connect(&database_url)
            .await
            .expect("failed to open database");
        let templates = Templates::new().expect("templates failed to compile");
        let state = PollsState::new(pool, templates, Key::generate(), false);
        let router = polls_router(state.clone());

        Self {
            state,
            router,
            cookies: BTreeMap::new(),
            db_path,
        }
    }

    pub async fn get(&mut self, uri: &str) -> TestResponse {
        let req = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .expect("failed to build request");
        self.send(req).await
    }

    pub async fn post_form(&mut self, uri: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .expect("failed to build request");
        self.send(req).await
    }

    async fn send(&mut self, mut req: Request<Body>) -> TestResponse {
        if !self.cookies.is_empty() {
            let cookie_header = self
                .cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            req.headers_mut().insert(
                header::COOKIE,
                cookie_header.parse().expect("invalid cookie header"),
            );
        }

        let resp = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("request failed");

        for set_cookie in resp.headers().get_all(header::SET_COOKIE) {
            let raw = set_cookie.to_str().expect("set-cookie was not ascii");
            let pair = raw.split(';').next().unwrap_or_default();
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            if value.is_empty() {
                self.cookies.remove(name.trim());
            } else {
                self.cookies
                    .insert(name.trim().to_string(), value.trim().to_string());
            }
        }

        let status = resp.status();
        let location = resp
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().expect("location was not ascii").to_string());
        let body = to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("failed to read response body");
        let body = String::from_utf8(body.to_vec()).expect("response body was not utf-8");

        TestResponse {
            status,
            location,
            body,
        }
    }

    pub fn has_cookie(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    pub fn cookie_len(&self, name: &str) -> usize {
        self.cookies.get(name).map_or(0, String::len)
    }

    pub async fn register(&mut self, username: &str, password: &str) -> TestResponse {
        let email = format!("{username}@example.com");
        self.post_form(
            "/register/",
            &[
                ("username", username),
                ("email", &email),
                ("password", password),
                ("password_confirmation", password),
            ],
        )
        .await
    }

    /// Register and log in, leaving the session cookie in the store.
    pub async fn login_as(&mut self, username: &str) {
        self.register(username, "s3cret-pass")
            .await
            .assert_redirect("/login/");
        self.post_form(
            "/login/",
            &[("username", username), ("password", "s3cret-pass")],
        )
        .await
        .assert_redirect("/");
        // drain the registration flash message
        self.get("/").await;
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = fs::remove_file(format!("{}{suffix}", self.db_path.display()));
        }
    }
}
