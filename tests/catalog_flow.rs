mod common;

use axum::http::{header, Method, StatusCode};
use common::{
    MultipartBody, body_bytes, body_json, error_body, location, spawn_app, spawn_app_with,
};

#[tokio::test]
async fn admin_publishes_and_anyone_reads() {
    let app = spawn_app().await;
    let admin = app.login_admin().await;
    app.publish_book(&admin, "978-0441013593", "Dune", "Frank Herbert")
        .await;

    let catalog = body_json(app.get("/", None).await).await;
    assert_eq!(catalog["identity"]["kind"], "anonymous");
    assert_eq!(catalog["books"][0]["isbn"], "9780441013593");

    let book = body_json(app.get("/book/9780441013593", None).await).await;
    assert_eq!(book["title"], "Dune");
    assert_eq!(book["release_date"], "1965-08-01");

    let response = app.get("/book/978-0441013593/reading", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/pdf"
    );
    assert_eq!(body_bytes(response).await, b"%PDF-1.7 body");
}

fn large_pdf(len: usize) -> Vec<u8> {
    let mut pdf = b"%PDF-1.7 ".to_vec();
    pdf.resize(len, b'x');
    pdf
}

#[tokio::test]
async fn publishes_books_larger_than_the_default_body_limit() {
    let app = spawn_app().await;
    let admin = app.login_admin().await;
    let pdf = large_pdf(3 * 1024 * 1024);

    let body = MultipartBody::new()
        .book_fields("9780441013593", "Dune", "Frank Herbert")
        .file("pdf", "book.pdf", &pdf)
        .file("image", "cover.png", b"png bytes")
        .finish();
    let response = app
        .multipart(Method::POST, "/addbook", Some(&admin), body)
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let stored = body_bytes(app.get("/book/9780441013593/reading", None).await).await;
    assert_eq!(stored.len(), pdf.len());

    let revised = large_pdf(4 * 1024 * 1024);
    let body = MultipartBody::new()
        .book_fields("9780441013593", "Dune (revised)", "Frank Herbert")
        .file("pdf", "book.pdf", &revised)
        .file("image", "cover.png", b"png bytes")
        .finish();
    let response = app
        .multipart(Method::PUT, "/updatebook/9780441013593", Some(&admin), body)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn uploads_over_the_configured_limit_are_too_large() {
    let app = spawn_app_with(|settings| settings.storage.max_upload_bytes = 1024 * 1024).await;
    let admin = app.login_admin().await;

    let body = MultipartBody::new()
        .book_fields("9780441013593", "Dune", "Frank Herbert")
        .file("pdf", "book.pdf", &large_pdf(3 * 1024 * 1024))
        .file("image", "cover.png", b"png bytes")
        .finish();
    let response = app
        .multipart(Method::POST, "/addbook", Some(&admin), body)
        .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(error_body(response).await["code"], "payload_too_large");

    assert_eq!(
        app.get("/book/9780441013593", None).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn only_admins_publish() {
    let app = spawn_app().await;
    let alice = app.signed_in_user("alice").await;

    let body = MultipartBody::new()
        .book_fields("9780441013593", "Dune", "Frank Herbert")
        .file("pdf", "book.pdf", b"%PDF")
        .file("image", "cover.png", b"png")
        .finish();
    let response = app
        .multipart(Method::POST, "/addbook", Some(&alice), body.clone())
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_body(response).await["code"], "not_admin");

    let response = app.multipart(Method::POST, "/addbook", None, body).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn update_without_both_assets_leaves_the_book_alone() {
    let app = spawn_app().await;
    let admin = app.login_admin().await;
    app.publish_book(&admin, "9780441013593", "Dune", "Frank Herbert")
        .await;

    let body = MultipartBody::new()
        .book_fields("9780441013593", "Dune Messiah", "Frank Herbert")
        .file("pdf", "book.pdf", b"%PDF-1.7 new")
        .file("image", "", b"")
        .finish();
    let response = app
        .multipart(Method::PUT, "/updatebook/9780441013593", Some(&admin), body)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_body(response).await["code"], "missing_asset");

    let book = body_json(app.get("/book/9780441013593", None).await).await;
    assert_eq!(book["title"], "Dune");
    let pdf = body_bytes(app.get("/book/9780441013593/reading", None).await).await;
    assert_eq!(pdf, b"%PDF-1.7 body");
}

#[tokio::test]
async fn update_replaces_record_and_assets() {
    let app = spawn_app().await;
    let admin = app.login_admin().await;
    app.publish_book(&admin, "9780441013593", "Dune", "Frank Herbert")
        .await;

    let body = MultipartBody::new()
        .book_fields("9780441013593", "Dune (revised)", "Frank Herbert")
        .file("pdf", "revised.pdf", b"%PDF-1.7 revised")
        .file("image", "cover.jpg", b"jpg bytes")
        .finish();
    let response = app
        .multipart(Method::PUT, "/updatebook/9780441013593", Some(&admin), body)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["title"], "Dune (revised)");

    let pdf = body_bytes(app.get("/book/9780441013593/reading", None).await).await;
    assert_eq!(pdf, b"%PDF-1.7 revised");
}

#[tokio::test]
async fn users_review_and_save_books() {
    let app = spawn_app().await;
    let admin = app.login_admin().await;
    app.publish_book(&admin, "9780441013593", "Dune", "Frank Herbert")
        .await;
    let alice = app.signed_in_user("alice").await;

    let response = app
        .form(
            Method::POST,
            "/book/9780441013593/reviews",
            Some(&alice),
            "comment=Spice&rating=5",
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .form(
            Method::POST,
            "/book/9780441013593/reviews",
            None,
            "comment=Spice&rating=5",
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));

    let reviews = body_json(app.get("/book/9780441013593/reviews", None).await).await;
    assert_eq!(reviews.as_array().unwrap().len(), 1);
    assert_eq!(reviews[0]["rating"], 5);

    let response = app
        .form(Method::POST, "/book/9780441013593/save", Some(&alice), "")
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let saved = body_json(app.get("/saved", Some(&alice)).await).await;
    assert_eq!(saved[0]["title"], "Dune");

    let response = app
        .form(Method::DELETE, "/book/9780441013593/save", Some(&alice), "")
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let saved = body_json(app.get("/saved", Some(&alice)).await).await;
    assert!(saved.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn saved_books_need_a_user_session() {
    let app = spawn_app().await;
    assert_eq!(app.get("/saved", None).await.status(), StatusCode::UNAUTHORIZED);

    let admin = app.login_admin().await;
    assert_eq!(
        app.get("/saved", Some(&admin)).await.status(),
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn removing_a_book_drops_it_from_the_catalog() {
    let app = spawn_app().await;
    let admin = app.login_admin().await;
    app.publish_book(&admin, "9780441013593", "Dune", "Frank Herbert")
        .await;

    let response = app
        .form(Method::DELETE, "/book/9780441013593", Some(&admin), "")
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        app.get("/book/9780441013593", None).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn advanced_search_narrows_with_every_field() {
    let app = spawn_app().await;
    let admin = app.login_admin().await;
    app.publish_book(&admin, "9780441013593", "Dune", "Frank Herbert")
        .await;
    app.publish_book(&admin, "9780441172719", "Dune Messiah", "Frank Herbert")
        .await;
    app.publish_book(&admin, "9780553293357", "Foundation", "Isaac Asimov")
        .await;

    let response = app
        .form(Method::POST, "/advancedsearch?author=Herbert", None, "")
        .await;
    let results = body_json(response).await;
    assert_eq!(results["books"].as_array().unwrap().len(), 2);

    let response = app
        .form(
            Method::POST,
            "/advancedsearch?author=Herbert&title=Messiah",
            None,
            "",
        )
        .await;
    let results = body_json(response).await;
    assert_eq!(results["books"].as_array().unwrap().len(), 1);
    assert_eq!(results["books"][0]["title"], "Dune Messiah");
}

#[tokio::test]
async fn advanced_search_without_criteria_is_rejected() {
    let app = spawn_app().await;

    let response = app
        .form(Method::POST, "/advancedsearch?title=&author=", None, "")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_body(response).await["code"], "empty_query");
}

#[tokio::test]
async fn term_search_matches_and_blank_terms_go_home() {
    let app = spawn_app().await;
    let admin = app.login_admin().await;
    app.publish_book(&admin, "9780441013593", "Dune", "Frank Herbert")
        .await;
    app.publish_book(&admin, "9780553293357", "Foundation", "Isaac Asimov")
        .await;

    let results = body_json(app.get("/search?term=asimov", None).await).await;
    assert_eq!(results["books"].as_array().unwrap().len(), 1);
    assert_eq!(results["books"][0]["title"], "Foundation");

    let response = app.get("/search?term=%20", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/"));
}
