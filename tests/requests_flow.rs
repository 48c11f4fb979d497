mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, error_body, location, spawn_app};

#[tokio::test]
async fn anonymous_requesters_are_sent_to_login() {
    let app = spawn_app().await;

    let response = app.get("/request", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));

    let response = app
        .form(Method::POST, "/request", None, "title=Dune&letter=Please")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));
}

#[tokio::test]
async fn admin_decides_a_request_exactly_once() {
    let app = spawn_app().await;
    let alice = app.signed_in_user("alice").await;

    let response = app
        .form(Method::POST, "/request", Some(&alice), "title=Dune&letter=Please")
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let request = body_json(response).await;
    assert_eq!(request["status"], "pending");
    let id = request["id"].as_i64().unwrap();

    let response = app
        .form(
            Method::PUT,
            "/requests",
            Some(&alice),
            &format!("request_id={id}&status=approved"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let admin = app.login_admin().await;
    let response = app
        .form(
            Method::PUT,
            "/requests",
            Some(&admin),
            &format!("request_id={id}&status=approved"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "approved");

    let response = app
        .form(
            Method::PUT,
            "/requests",
            Some(&admin),
            &format!("request_id={id}&status=denied"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(error_body(response).await["code"], "invalid_transition");

    let own = body_json(app.get("/request", Some(&alice)).await).await;
    assert_eq!(own[0]["status"], "approved");
}

#[tokio::test]
async fn admins_filter_requests_by_status() {
    let app = spawn_app().await;
    let alice = app.signed_in_user("alice").await;
    for title in ["Dune", "Emma"] {
        app.form(
            Method::POST,
            "/request",
            Some(&alice),
            &format!("title={title}&letter=Please"),
        )
        .await;
    }
    let admin = app.login_admin().await;

    let all = body_json(app.get("/requests", Some(&admin)).await).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let id = all[0]["id"].as_i64().unwrap();
    app.form(
        Method::PUT,
        "/requests",
        Some(&admin),
        &format!("request_id={id}&status=denied"),
    )
    .await;

    let pending = body_json(app.get("/requests?status=pending", Some(&admin)).await).await;
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let response = app.get("/requests?status=shelved", Some(&admin)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn pending_is_not_a_decision() {
    let app = spawn_app().await;
    let alice = app.signed_in_user("alice").await;
    let request = body_json(
        app.form(Method::POST, "/request", Some(&alice), "title=Dune&letter=Please")
            .await,
    )
    .await;
    let id = request["id"].as_i64().unwrap();

    let admin = app.login_admin().await;
    let response = app
        .form(
            Method::PUT,
            "/requests",
            Some(&admin),
            &format!("request_id={id}&status=pending"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .form(
            Method::PUT,
            "/requests",
            Some(&admin),
            "request_id=999&status=approved",
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
