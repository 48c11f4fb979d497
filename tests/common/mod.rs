#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, Response, StatusCode},
    Router,
};
use serde_json::Value;
use shelf_app::{build_app, modules::accounts::password::hash_password, AppState};
use shelf_kernel::settings::{AdminSeed, Settings};
use tower::ServiceExt;

pub const ADMIN_USERNAME: &str = "root";
pub const ADMIN_PASSWORD: &str = "rootpass";

const BOUNDARY: &str = "shelf-test-boundary";

pub struct TestApp {
    router: Router,
}

/// An in-memory application with one seeded administrator.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(configure: impl FnOnce(&mut Settings)) -> TestApp {
    let mut settings = Settings::default();
    settings.auth.admins.push(AdminSeed {
        username: ADMIN_USERNAME.to_string(),
        password_hash: hash_password(ADMIN_PASSWORD).unwrap(),
    });
    configure(&mut settings);

    let state = AppState::in_memory(&settings);
    let app = build_app(&settings, state).await.unwrap();
    TestApp { router: app.router }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        self.send(request(Method::GET, uri, cookie).body(Body::empty()).unwrap())
            .await
    }

    pub async fn form(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: &str,
    ) -> Response<Body> {
        self.send(
            request(method, uri, cookie)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn multipart(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Vec<u8>,
    ) -> Response<Body> {
        self.send(
            request(method, uri, cookie)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    pub async fn register(&self, username: &str, password: &str) -> Response<Body> {
        self.form(
            Method::POST,
            "/register",
            None,
            &format!("username={username}&password={password}&email={username}%40example.com"),
        )
        .await
    }

    /// Sign in and return the session cookie to send back.
    pub async fn login(&self, username: &str, password: &str) -> String {
        let response = self
            .form(
                Method::POST,
                "/login",
                None,
                &format!("username={username}&password={password}"),
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), Some("/"));
        session_cookie(&response).expect("login sets a session cookie")
    }

    pub async fn login_admin(&self) -> String {
        self.login(ADMIN_USERNAME, ADMIN_PASSWORD).await
    }

    /// Register `username` and sign in.
    pub async fn signed_in_user(&self, username: &str) -> String {
        let response = self.register(username, "secret1").await;
        assert_eq!(response.status(), StatusCode::CREATED);
        self.login(username, "secret1").await
    }

    /// Publish a book as the administrator.
    pub async fn publish_book(&self, admin_cookie: &str, isbn: &str, title: &str, author: &str) {
        let body = MultipartBody::new()
            .book_fields(isbn, title, author)
            .file("pdf", "book.pdf", b"%PDF-1.7 body")
            .file("image", "cover.png", b"png bytes")
            .finish();
        let response = self
            .multipart(Method::POST, "/addbook", Some(admin_cookie), body)
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}

fn request(method: Method, uri: &str, cookie: Option<&str>) -> axum::http::request::Builder {
    let builder = Request::builder().method(method).uri(uri);
    match cookie {
        Some(cookie) => builder.header(header::COOKIE, cookie),
        None => builder,
    }
}

pub fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
}

/// The `name=value` pair of the first `set-cookie` header.
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    let raw = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
    raw.split(';').next().map(str::to_string)
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// A `multipart/form-data` body using the shared test boundary.
#[derive(Default)]
pub struct MultipartBody {
    bytes: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content: &[u8]) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.bytes.extend_from_slice(content);
        self.bytes.extend_from_slice(b"\r\n");
        self
    }

    pub fn book_fields(self, isbn: &str, title: &str, author: &str) -> Self {
        self.text("isbn", isbn)
            .text("title", title)
            .text("author", author)
            .text("subject", "Fiction")
            .text("publisher", "Ace")
            .text("language", "English")
            .text("description", "A novel")
            .text("release_date", "1965-08-01")
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.bytes
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.bytes
    }
}

/// The `error` object of an error response.
pub async fn error_body(response: Response<Body>) -> Value {
    body_json(response).await["error"].clone()
}
