#![allow(dead_code)]

use anyhow::Result;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use sandglass_api::api::v1::users::create_user;
use sandglass_api::auth::{generate_jwt, Claims};
use sandglass_api::config::AppConfig;
use sandglass_api::database::Session;
use sandglass_api::{app, AppState};

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin-password";
pub const USER_EMAIL: &str = "user@example.com";
pub const USER_PASSWORD: &str = "user-password";

/// Application over a fresh in-memory database with one admin and one user
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub admin_id: i64,
    pub admin_token: String,
    pub user_id: i64,
    pub user_token: String,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestResponse {
    /// Error code of an error envelope
    pub fn code(&self) -> &str {
        self.body["error"]["code"].as_str().unwrap_or_default()
    }

    pub fn count(&self) -> i64 {
        self.body["info"]["count"].as_i64().unwrap_or(-1)
    }
}

pub async fn spawn_app() -> Result<TestApp> {
    let mut config = AppConfig::development();
    config.database.url = "sqlite::memory:".to_string();
    config.api.enable_request_logging = false;
    let state = AppState::new(config).await?;

    let mut session = Session::begin(state.db.pool()).await?;
    let admin_id = create_user(&mut session, ADMIN_EMAIL, ADMIN_PASSWORD, true).await?;
    let user_id = create_user(&mut session, USER_EMAIL, USER_PASSWORD, false).await?;
    session.commit().await?;

    let secret = &state.config.security.jwt_secret;
    let admin_token = generate_jwt(&Claims::new(admin_id, ADMIN_EMAIL.to_string(), true, 1), secret)?;
    let user_token = generate_jwt(&Claims::new(user_id, USER_EMAIL.to_string(), false, 1), secret)?;

    Ok(TestApp {
        router: app(state.clone()),
        state,
        admin_id,
        admin_token,
        user_id,
        user_token,
    })
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Result<TestResponse> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok(TestResponse { status, body })
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<TestResponse> {
        self.request(Method::GET, path, token, None, &[]).await
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> Result<TestResponse> {
        self.request(Method::POST, path, token, Some(body), &[]).await
    }

    /// POST in permissive collection mode
    pub async fn create(&self, path: &str, token: Option<&str>, body: Value) -> Result<TestResponse> {
        self.request(
            Method::POST,
            path,
            token,
            Some(body),
            &[("x-rest-collection-mode", "permissive")],
        )
        .await
    }

    pub async fn put(&self, path: &str, token: Option<&str>, body: Value) -> Result<TestResponse> {
        self.request(Method::PUT, path, token, Some(body), &[]).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>, body: Option<Value>) -> Result<TestResponse> {
        self.request(Method::DELETE, path, token, body, &[]).await
    }

    /// Sign up another regular user, giving back its id and token
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<(i64, String)> {
        let body = serde_json::json!({
            "email": email,
            "first_name": "Other",
            "last_name": "User",
            "password": password,
        });
        let response = self.post("/api/v1/users/@signup", None, body).await?;
        anyhow::ensure!(response.status == StatusCode::OK, "signup failed: {}", response.body);
        let id = response.body["user"]["id"].as_i64().unwrap_or_default();
        let token = response.body["token"].as_str().unwrap_or_default().to_string();
        Ok((id, token))
    }

    pub fn admin(&self) -> Option<&str> {
        Some(&self.admin_token)
    }

    pub fn user(&self) -> Option<&str> {
        Some(&self.user_token)
    }

    /// Run raw SQL against the database, for fixtures with fixed ids
    pub async fn execute(&self, sql: &str) -> Result<()> {
        sqlx::query(sql).execute(self.state.db.pool()).await?;
        Ok(())
    }
}
