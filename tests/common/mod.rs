#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use tempfile::TempDir;
use tower::ServiceExt;

use inkpost::config::Config;
use inkpost::db::{self, models::User, users};
use inkpost::flash::{self, Flash, FLASH_COOKIE};
use inkpost::mail::{Mailer, OutgoingEmail};
use inkpost::{build_router, AppState};

pub const PASSWORD: &str = "Secr3t!pw";

/// Captures mail instead of sending it.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutgoingEmail>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _email: OutgoingEmail) -> anyhow::Result<()> {
        anyhow::bail!("smtp relay unreachable")
    }
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub mailer: Arc<RecordingMailer>,
    _dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let mailer = Arc::new(RecordingMailer::default());
        Self::with_mailer(mailer.clone(), mailer)
    }

    /// An app whose reset mail goes to `active`; `recorder` is kept for assertions.
    pub fn with_mailer(active: Arc<dyn Mailer>, recorder: Arc<RecordingMailer>) -> Self {
        let dir = TempDir::new().unwrap();

        let mut config = Config::default();
        config.database.path = Some(dir.path().join("test.db"));
        config.storage.path = Some(dir.path().join("profile_pics"));
        config.auth.bcrypt_cost = 4;
        config.auth.secret_key = Some("integration-test-secret".to_string());
        config.server.public_url = Some("http://inkpost.test".to_string());

        let pool = db::create_pool(&config.db_path()).expect("Failed to create test database");
        db::run_migrations(&pool).expect("Failed to run migrations");

        let state = AppState::new(pool, config, active);
        state.pictures.ensure_default().unwrap();
        let router = build_router(state.clone());

        Self {
            state,
            router,
            mailer: recorder,
            _dir: dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(
        &self,
        path: &str,
        fields: &[(&str, &str)],
        cookie: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(form_body(fields))).unwrap())
            .await
    }

    /// Insert an account directly, bypassing the registration form.
    pub fn create_user(&self, username: &str, email: &str, password: &str) -> User {
        let hash = self.state.hasher.hash(password).unwrap();
        users::create_user(&self.state.db, username, email, &hash).unwrap()
    }

    /// Log in through the form and return the `Cookie` header value for the session.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .post_form("/login", &[("email", email), ("password", password)], None)
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "login should redirect");
        cookie_pair(&response, "inkpost_session").expect("login sets a session cookie")
    }

    /// Wait for detached mail tasks to deliver `count` messages.
    pub async fn wait_for_mail(&self, count: usize) -> Vec<OutgoingEmail> {
        for _ in 0..100 {
            {
                let sent = self.mailer.sent.lock().unwrap();
                if sent.len() >= count {
                    return sent.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.mailer.sent.lock().unwrap().clone()
    }
}

pub fn form_body(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// The full `Set-Cookie` value for cookie `name`, attributes included.
pub fn set_cookie(response: &Response<Body>, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    set_cookies(response)
        .into_iter()
        .find(|c| c.starts_with(&prefix))
}

/// `name=value` for cookie `name`, ready to send back in a `Cookie` header.
pub fn cookie_pair(response: &Response<Body>, name: &str) -> Option<String> {
    set_cookie(response, name).map(|c| c.split(';').next().unwrap_or_default().to_string())
}

/// Notices attached to a response through the flash cookie.
pub fn flashes(response: &Response<Body>) -> Vec<Flash> {
    cookie_pair(response, FLASH_COOKIE)
        .and_then(|pair| pair.split_once('=').map(|(_, v)| v.to_string()))
        .map(|v| flash::decode(&v))
        .unwrap_or_default()
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
