mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{spawn_app, USER_EMAIL, USER_PASSWORD};

#[tokio::test]
async fn signin_returns_token_and_user() -> Result<()> {
    let app = spawn_app().await?;

    let response = app
        .post(
            "/api/v1/users/@signin",
            None,
            json!({"email": USER_EMAIL, "password": USER_PASSWORD}),
        )
        .await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["user"]["id"], json!(app.user_id));
    assert!(response.body["user"].get("password").is_none());

    let token = response.body["token"].as_str().unwrap_or_default().to_string();
    let me = app.get(&format!("/api/v1/users/{}/", app.user_id), Some(&token)).await?;
    assert_eq!(me.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn signin_rejects_wrong_password() -> Result<()> {
    let app = spawn_app().await?;

    let response = app
        .post("/api/v1/users/@signin", None, json!({"email": USER_EMAIL, "password": "wrong-one"}))
        .await?;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.code(), "INVALID_SIGNIN");

    let unknown = app
        .post("/api/v1/users/@signin", None, json!({"email": "nobody@example.com", "password": "whatever"}))
        .await?;
    assert_eq!(unknown.code(), "INVALID_SIGNIN");
    Ok(())
}

#[tokio::test]
async fn signup_creates_users_once() -> Result<()> {
    let app = spawn_app().await?;
    let body = json!({
        "email": "new@example.com",
        "first_name": "New",
        "last_name": "User",
        "password": "secret123",
    });

    let created = app.post("/api/v1/users/@signup", None, body.clone()).await?;
    assert_eq!(created.status, StatusCode::OK);
    assert_eq!(created.body["user"]["email"], "new@example.com");
    assert!(created.body["token"].is_string());

    let again = app.post("/api/v1/users/@signup", None, body).await?;
    assert_eq!(again.code(), "USER_EMAIL_EXISTS");

    let invalid = app
        .post("/api/v1/users/@signup", None, json!({"email": "not-an-email", "password": "x"}))
        .await?;
    assert_eq!(invalid.code(), "VALIDATION_ERROR");
    Ok(())
}

#[tokio::test]
async fn search_finds_users_by_email() -> Result<()> {
    let app = spawn_app().await?;

    let found = app
        .get(&format!("/api/v1/users/@search?email={}", USER_EMAIL), app.admin())
        .await?;
    assert_eq!(found.status, StatusCode::OK);
    assert_eq!(found.body["id"], json!(app.user_id));

    let missing = app.get("/api/v1/users/@search?email=nobody@example.com", app.admin()).await?;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let no_criteria = app.get("/api/v1/users/@search", app.admin()).await?;
    assert_eq!(no_criteria.code(), "VALIDATION_ERROR");
    Ok(())
}

#[tokio::test]
async fn anonymous_requests_are_unauthorized() -> Result<()> {
    let app = spawn_app().await?;

    for path in ["/api/v1/projects/", "/api/v1/users/1/", "/api/v1/@describe"] {
        let response = app.get(path, None).await?;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED, "{}", path);
        assert_eq!(response.code(), "UNAUTHORIZED");
    }
    Ok(())
}

#[tokio::test]
async fn invalid_tokens_are_rejected() -> Result<()> {
    let app = spawn_app().await?;

    let response = app.get("/api/v1/projects/", Some("not-a-jwt")).await?;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let basic = app
        .request(Method::GET, "/api/v1/projects/", None, None, &[("authorization", "Basic abc")])
        .await?;
    assert_eq!(basic.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn admin_only_permissions_are_forbidden_for_users() -> Result<()> {
    let app = spawn_app().await?;

    let search = app.get("/api/v1/users/@search?email=x@example.com", app.user()).await?;
    assert_eq!(search.status, StatusCode::FORBIDDEN);
    assert_eq!(search.code(), "FORBIDDEN");

    let public = app
        .create("/api/v1/projects/", app.user(), json!({"name": "Website", "is_public": true}))
        .await?;
    assert_eq!(public.status, StatusCode::BAD_REQUEST);
    assert!(public.body["error"]["fields"]["is_public"].is_string());

    let as_admin = app
        .create("/api/v1/projects/", app.admin(), json!({"name": "Website", "is_public": true}))
        .await?;
    assert_eq!(as_admin.status, StatusCode::OK);
    assert_eq!(as_admin.body["is_public"], true);
    Ok(())
}

#[tokio::test]
async fn updated_passwords_are_hashed() -> Result<()> {
    let app = spawn_app().await?;
    let path = format!("/api/v1/users/{}/", app.user_id);

    let updated = app.put(&path, app.user(), json!({"password": "changed-password"})).await?;
    assert_eq!(updated.status, StatusCode::OK, "{}", updated.body);
    assert!(updated.body.get("password").is_none());

    let stored: String = sqlx::query_scalar("SELECT password FROM time_user WHERE id = ?")
        .bind(app.user_id)
        .fetch_one(app.state.db.pool())
        .await?;
    assert_ne!(stored, "changed-password");

    let signin = app
        .post(
            "/api/v1/users/@signin",
            None,
            json!({"email": USER_EMAIL, "password": "changed-password"}),
        )
        .await?;
    assert_eq!(signin.status, StatusCode::OK);
    assert_eq!(signin.body["user"]["id"], json!(app.user_id));

    let old = app
        .post("/api/v1/users/@signin", None, json!({"email": USER_EMAIL, "password": USER_PASSWORD}))
        .await?;
    assert_eq!(old.code(), "INVALID_SIGNIN");
    Ok(())
}

#[tokio::test]
async fn collection_updates_hash_passwords() -> Result<()> {
    let app = spawn_app().await?;

    let updated = app
        .put(
            "/api/v1/users/",
            app.user(),
            json!([{"id": app.user_id, "password": "listed-password"}]),
        )
        .await?;
    assert_eq!(updated.count(), 1, "{}", updated.body);

    let signin = app
        .post(
            "/api/v1/users/@signin",
            None,
            json!({"email": USER_EMAIL, "password": "listed-password"}),
        )
        .await?;
    assert_eq!(signin.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn users_cannot_change_other_users() -> Result<()> {
    let app = spawn_app().await?;
    let (other_id, other_token) = app.sign_up("other@example.com", "other-password").await?;

    let member = app
        .put(
            &format!("/api/v1/users/{}/", app.user_id),
            Some(&other_token),
            json!({"first_name": "Mallory"}),
        )
        .await?;
    assert_eq!(member.status, StatusCode::NOT_FOUND);

    let listed = app
        .put(
            "/api/v1/users/",
            Some(&other_token),
            json!([{"id": app.user_id, "password": "taken-over"}]),
        )
        .await?;
    assert_eq!(listed.count(), 0);

    let deleted = app
        .delete(&format!("/api/v1/users/{}/", app.user_id), Some(&other_token), None)
        .await?;
    assert_eq!(deleted.status, StatusCode::NOT_FOUND);

    let signin = app
        .post("/api/v1/users/@signin", None, json!({"email": USER_EMAIL, "password": USER_PASSWORD}))
        .await?;
    assert_eq!(signin.status, StatusCode::OK);

    let readable = app.get(&format!("/api/v1/users/{}/", app.user_id), Some(&other_token)).await?;
    assert_eq!(readable.status, StatusCode::OK);

    let own = app
        .put(&format!("/api/v1/users/{}/", other_id), Some(&other_token), json!({"first_name": "Olive"}))
        .await?;
    assert_eq!(own.status, StatusCode::OK);
    assert_eq!(own.body["first_name"], "Olive");

    let as_admin = app
        .put(&format!("/api/v1/users/{}/", other_id), app.admin(), json!({"last_name": "Admin-set"}))
        .await?;
    assert_eq!(as_admin.status, StatusCode::OK);
    Ok(())
}
