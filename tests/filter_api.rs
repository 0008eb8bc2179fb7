mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{json, Value};

use common::spawn_app;

fn names(body: &Value, key: &str) -> Vec<String> {
    body.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item[key].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn search_rejects_unknown_fields() -> Result<()> {
    let app = spawn_app().await?;

    let unknown = app.get("/api/v1/users?unknownfield__eq=x", app.admin()).await?;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);
    assert_eq!(unknown.code(), "unknownfield__eq");

    let bad_op = app.get("/api/v1/users?email__between=x", app.admin()).await?;
    assert_eq!(bad_op.code(), "email__between");
    Ok(())
}

#[tokio::test]
async fn search_returns_matching_rows() -> Result<()> {
    let app = spawn_app().await?;
    app.post(
        "/api/v1/users/@signup",
        None,
        json!({"email": "tester@example.org", "first_name": "Tess", "last_name": "Ter", "password": "secret123"}),
    )
    .await?;

    let response = app.get("/api/v1/users?email__contains=test", app.admin()).await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(names(&response.body, "email"), vec!["tester@example.org"]);

    let everyone = app.get("/api/v1/users?email__ends=example.com", app.admin()).await?;
    assert_eq!(everyone.body.as_array().map(Vec::len), Some(2));
    Ok(())
}

#[tokio::test]
async fn search_checks_value_types() -> Result<()> {
    let app = spawn_app().await?;

    let response = app.get("/api/v1/projects?is_active__eq=maybe", app.user()).await?;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.code(), "is_active__eq");

    let ok = app.get("/api/v1/projects?is_active__eq=true&name__starts=A", app.user()).await?;
    assert_eq!(ok.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn collection_by_primary_key() -> Result<()> {
    let app = spawn_app().await?;
    let created = app
        .post(
            "/api/v1/clients",
            app.admin(),
            json!([{"name": "One"}, {"name": "Two"}, {"name": "Three"}]),
        )
        .await?;
    let first = created.body[0]["id"].as_i64().unwrap_or_default();
    let third = created.body[2]["id"].as_i64().unwrap_or_default();

    let response = app
        .get(&format!("/api/v1/clients?id={}&id={}", first, third), app.admin())
        .await?;
    assert_eq!(names(&response.body, "name"), vec!["One", "Three"]);

    let invalid = app.get("/api/v1/clients?id=abc", app.admin()).await?;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert_eq!(invalid.code(), "id");

    let many: Vec<String> = (1..=101).map(|i| format!("id={}", i)).collect();
    let too_many = app
        .get(&format!("/api/v1/clients?{}", many.join("&")), app.admin())
        .await?;
    assert_eq!(too_many.code(), "id");
    assert!(too_many.body["message"].as_str().unwrap_or_default().contains("100"));
    Ok(())
}

#[tokio::test]
async fn activities_by_date_range() -> Result<()> {
    let app = spawn_app().await?;
    app.post(
        "/api/v1/activities",
        app.user(),
        json!([
            {"description": "December", "start": "2013-12-30T09:00:00Z"},
            {"description": "January", "start": "2014-01-15T09:00:00Z"},
            {"description": "February", "start": "2014-02-03T09:00:00Z"},
        ]),
    )
    .await?;

    let january = app
        .get("/api/v1/activities?from=2014-01-01&to=2014-01-31T23:59:59", app.user())
        .await?;
    assert_eq!(january.status, StatusCode::OK);
    assert_eq!(names(&january.body, "description"), vec!["January"]);

    let since = app.get("/api/v1/activities?from=2014-01-01", app.user()).await?;
    assert_eq!(names(&since.body, "description"), vec!["January", "February"]);

    let invalid = app.get("/api/v1/activities?to=someday", app.user()).await?;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert_eq!(invalid.code(), "to");
    Ok(())
}

#[tokio::test]
async fn users_only_see_their_own_objects() -> Result<()> {
    let app = spawn_app().await?;
    let mine = app.create("/api/v1/tasks", app.user(), json!({"name": "Mine"})).await?;
    let theirs = app.create("/api/v1/tasks", app.admin(), json!({"name": "Theirs"})).await?;

    let listed = app.get("/api/v1/tasks", app.user()).await?;
    assert_eq!(names(&listed.body, "name"), vec!["Mine"]);

    let everything = app.get("/api/v1/tasks", app.admin()).await?;
    assert_eq!(names(&everything.body, "name"), vec!["Mine", "Theirs"]);

    let hidden = app
        .get(&format!("/api/v1/tasks/{}/", theirs.body["id"]), app.user())
        .await?;
    assert_eq!(hidden.status, StatusCode::NOT_FOUND);

    let deleted = app
        .delete("/api/v1/tasks", app.user(), Some(json!([mine.body["id"], theirs.body["id"]])))
        .await?;
    assert_eq!(deleted.count(), 1);
    Ok(())
}

#[tokio::test]
async fn anonymous_reads_need_authentication() -> Result<()> {
    let app = spawn_app().await?;

    let response = app.get("/api/v1/tasks", None).await?;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn pagination_windows_results() -> Result<()> {
    let app = spawn_app().await?;
    let items: Vec<Value> = (1..=5).map(|i| json!({"name": format!("Client {}", i)})).collect();
    app.post("/api/v1/clients", app.admin(), Value::Array(items)).await?;

    let page = app.get("/api/v1/clients?limit=2&offset=1", app.admin()).await?;
    assert_eq!(names(&page.body, "name"), vec!["Client 2", "Client 3"]);

    let tail = app.get("/api/v1/clients?offset=3", app.admin()).await?;
    assert_eq!(names(&tail.body, "name"), vec!["Client 4", "Client 5"]);

    let capped = app.get("/api/v1/clients?limit=100000", app.admin()).await?;
    assert_eq!(capped.body.as_array().map(Vec::len), Some(5));

    let invalid = app.get("/api/v1/clients?limit=-1", app.admin()).await?;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert_eq!(invalid.code(), "limit");
    Ok(())
}
