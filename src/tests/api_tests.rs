use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::support::*;
use crate::accounts::{self, NewUser};
use crate::middleware::csrf::{CSRF_EXPECTED_VALUE, CSRF_HEADER};
use crate::models::Role;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::MemoryStorage;

const ADMIN_PASSWORD: &str = "admin-password-1";
const BOUNDARY: &str = "biblioteca-test-boundary";

struct TestApp {
    router: Router,
    _db: TestDb,
    pool: sqlx::SqlitePool,
}

async fn test_app() -> TestApp {
    let db = test_db().await;
    let pool = db.pool.clone();
    let state = AppState::new(pool.clone(), test_config(), Arc::new(MemoryStorage::new("test-shelf")));
    TestApp { router: build_router(state), _db: db, pool }
}

impl TestApp {
    async fn send(&self, req: Request<Body>) -> (StatusCode, Value, axum::http::HeaderMap) {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body, headers)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let (status, body, _) = self.send(builder.body(Body::empty()).unwrap()).await;
        (status, body)
    }

    async fn json(&self, method: Method, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let (status, body, _) = self.send(builder.body(Body::from(body.to_string())).unwrap()).await;
        (status, body)
    }

    async fn login(&self, external_id: &str, password: &str) -> String {
        let (status, body) = self
            .json(Method::POST, "/api/auth/login", None, json!({ "external_id": external_id, "password": password }))
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }

    async fn admin_token(&self) -> String {
        accounts::create_user(
            &self.pool,
            NewUser {
                external_id: "ADMIN01".to_string(),
                full_name: "Library Admin".to_string(),
                password: ADMIN_PASSWORD.to_string(),
                role: Role::Admin,
            },
        )
        .await
        .unwrap();
        self.login("ADMIN01", ADMIN_PASSWORD).await
    }

    async fn register_student(&self, external_id: &str) -> (i64, String) {
        let (status, body) = self
            .json(
                Method::POST,
                "/api/auth/register",
                None,
                json!({ "external_id": external_id, "full_name": "Student One", "password": "student-pass-1" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert_eq!(body["role"], "STUDENT");
        let id = body["id"].as_i64().unwrap();
        (id, self.login(external_id, "student-pass-1").await)
    }

    async fn upload_book(&self, admin: &str, title: &str, category_id: i64) -> (StatusCode, Value) {
        let body = multipart_body(&[
            ("title", title),
            ("author", "Steve Klabnik"),
            ("description", "The book"),
            ("is_downloadable", "true"),
            ("category_id", &category_id.to_string()),
        ]);
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/admin/books")
            .header(header::AUTHORIZATION, format!("Bearer {}", admin))
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(body))
            .unwrap();
        let (status, body, _) = self.send(req).await;
        (status, body)
    }
}

fn multipart_body(fields: &[(&str, &str)]) -> String {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            BOUNDARY, name, value
        ));
    }
    body.push_str(&format!(
        "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"book.pdf\"\r\nContent-Type: application/pdf\r\n\r\n%PDF-1.4 fake\r\n",
        BOUNDARY
    ));
    body.push_str(&format!("--{}--\r\n", BOUNDARY));
    body
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = test_app().await;

    let (status, body) = app.get("/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".to_string()));

    let (status, body) = app.get("/readyz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert!(body["current_period"].is_null());

    create_period(&app.pool, "2025-1", true).await;
    let (_, body) = app.get("/readyz", None).await;
    assert_eq!(body["current_period"], "2025-1");

    let (status, body) = app.get("/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = app.get("/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "biblioteca");
    assert_eq!(body["storage_backend"], "memory");
    assert_eq!(body["reviews"]["max_depth"], 3);

    let (status, body) = app.get("/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reviews_created"], 0);

    let (status, body) = app.get("/metrics/prometheus", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_str().unwrap().contains("biblioteca_reviews_created 0"));
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = test_app().await;
    let (status, body) = app.get("/api/nothing-here", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_login_sets_session_cookie() {
    let app = test_app().await;
    accounts::create_user(
        &app.pool,
        NewUser {
            external_id: "ADMIN01".to_string(),
            full_name: "Library Admin".to_string(),
            password: ADMIN_PASSWORD.to_string(),
            role: Role::Admin,
        },
    )
    .await
    .unwrap();

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "external_id": "ADMIN01", "password": ADMIN_PASSWORD }).to_string()))
        .unwrap();
    let (status, body, headers) = app.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["user"]["role"], "ADMIN");
    assert!(body["user"].get("password_hash").is_none());

    let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with("access_token="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));

    let token = body["token"].as_str().unwrap();
    let (status, me) = app.get("/api/auth/me", Some(token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["external_id"], "ADMIN01");
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let app = test_app().await;
    app.admin_token().await;
    let (status, body) = app
        .json(Method::POST, "/api/auth/login", None, json!({ "external_id": "ADMIN01", "password": "nope" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (_, metrics) = app.get("/metrics", None).await;
    assert_eq!(metrics["failed_logins"], 1);
}

#[tokio::test]
async fn test_authentication_and_roles() {
    let app = test_app().await;

    let (status, _) = app.get("/api/auth/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/api/auth/me", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, student) = app.register_student("S100").await;
    let (status, body) = app.get("/api/admin/enrollments", Some(&student)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_deactivated_user_token_is_rejected() {
    let app = test_app().await;
    let admin = app.admin_token().await;
    let (student_id, student) = app.register_student("S101").await;

    let (status, _) = app
        .json(Method::PATCH, &format!("/api/admin/users/{}", student_id), Some(&admin), json!({ "is_active": false }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/api/auth/me", Some(&student)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cookie_session_requires_csrf_header() {
    let app = test_app().await;
    let admin = app.admin_token().await;
    let body = json!({ "name": "Databases" }).to_string();

    let without_header = Request::builder()
        .method(Method::POST)
        .uri("/api/admin/categories")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, format!("access_token={}", admin))
        .body(Body::from(body.clone()))
        .unwrap();
    let (status, _, _) = app.send(without_header).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let with_header = Request::builder()
        .method(Method::POST)
        .uri("/api/admin/categories")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, format!("access_token={}", admin))
        .header(CSRF_HEADER, CSRF_EXPECTED_VALUE)
        .body(Body::from(body))
        .unwrap();
    let (status, category, _) = app.send(with_header).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(category["slug"], "databases");

    // Reads over the cookie need no header
    let read = Request::builder()
        .uri("/api/auth/me")
        .header(header::COOKIE, format!("theme=dark; access_token={}", admin))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = app.send(read).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let app = test_app().await;
    let admin = app.admin_token().await;
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/logout")
        .header(header::AUTHORIZATION, format!("Bearer {}", admin))
        .body(Body::empty())
        .unwrap();
    let (status, _, headers) = app.send(req).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_no_current_period_is_404_on_public_lookup() {
    let app = test_app().await;
    let (status, body) = app.get("/api/periods/current", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, body) = app.get("/api/periods", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_catalog_listing_shape() {
    let app = test_app().await;
    let category = create_category(&app.pool, "Programming").await;
    for i in 0..3 {
        insert_book(&app.pool, &format!("Rust Vol {}", i), "Ferris", category.id, 1_700_000_000 + i).await;
    }

    let (status, body) = app.get("/api/books?q=rust&limit=2&page=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["page"], 1);
    assert_eq!(body["limit"], 2);
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["title"], "Rust Vol 2");
    assert_eq!(items[0]["category_slug"], "programming");
    assert!(items[0].get("storage_key").is_none());

    let (status, body) = app.get("/api/books?limit=500", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["limit"], 50);

    let (status, _) = app.get("/api/books/9999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get("/api/categories", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"][0]["name"], "Programming");
}

#[tokio::test]
async fn test_reading_is_gated_by_period_and_enrollment() {
    let app = test_app().await;
    let admin = app.admin_token().await;

    let (status, category) =
        app.json(Method::POST, "/api/admin/categories", Some(&admin), json!({ "name": "Programming" })).await;
    assert_eq!(status, StatusCode::CREATED);
    let category_id = category["id"].as_i64().unwrap();

    let (status, book) = app.upload_book(&admin, "The Rust Programming Language", category_id).await;
    assert_eq!(status, StatusCode::CREATED, "{}", book);
    assert_eq!(book["is_downloadable"], true);
    let book_id = book["id"].as_i64().unwrap();
    let read_uri = format!("/api/books/{}/read", book_id);

    let (student_id, student) = app.register_student("S200").await;

    let (status, body) = app.get(&read_uri, Some(&student)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "NO_CURRENT_PERIOD");

    let (status, period) = app
        .json(
            Method::POST,
            "/api/admin/periods",
            Some(&admin),
            json!({ "name": "2025-1", "start_date": "2025-02-01", "end_date": "2025-06-30", "make_current": true }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let period_id = period["id"].as_i64().unwrap();

    let (status, body) = app.get(&read_uri, Some(&student)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "NOT_ENROLLED");

    let (status, enrollment) = app
        .json(
            Method::POST,
            "/api/admin/enrollments",
            Some(&admin),
            json!({ "user_id": student_id, "period_id": period_id, "display_name": "Sam Student" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let enrollment_id = enrollment["id"].as_i64().unwrap();

    let (status, body) = app.get(&read_uri, Some(&student)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["url"].as_str().unwrap().starts_with("memory://test-shelf/books/"));
    assert_eq!(body["expires_in_seconds"], 900);

    let (status, _) = app
        .json(
            Method::PATCH,
            &format!("/api/admin/enrollments/{}", enrollment_id),
            Some(&admin),
            json!({ "can_access": false }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get(&read_uri, Some(&student)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "ACCESS_DENIED");

    let (_, metrics) = app.get("/metrics", None).await;
    assert_eq!(metrics["book_reads"], 1);
    assert_eq!(metrics["access_denied"], 3);
    assert_eq!(metrics["books_created"], 1);
}

#[tokio::test]
async fn test_upload_rejects_unknown_category() {
    let app = test_app().await;
    let admin = app.admin_token().await;
    let (status, body) = app.upload_book(&admin, "Orphan", 4242).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{}", body);
}

#[tokio::test]
async fn test_review_threads_over_http() {
    let app = test_app().await;
    let (student_id, student) = app.register_student("S300").await;
    let period = create_period(&app.pool, "2025-1", true).await;
    enroll(&app.pool, student_id, period.id, "Sam Student").await;
    let category = create_category(&app.pool, "Programming").await;
    let book_id = insert_book(&app.pool, "Intro to Rust", "Ferris", category.id, 1_700_000_000).await;
    let uri = format!("/api/books/{}/reviews", book_id);

    let (status, root) =
        app.json(Method::POST, &uri, Some(&student), json!({ "rating": 5, "comment": "Great book" })).await;
    assert_eq!(status, StatusCode::CREATED, "{}", root);
    assert_eq!(root["display_name"], "Sam Student");
    let root_id = root["id"].as_i64().unwrap();

    let (status, body) = app
        .json(Method::POST, &uri, Some(&student), json!({ "parent_id": root_id, "rating": 4, "comment": "Agreed" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");

    let mut parent = root_id;
    for depth in 2..=3 {
        let (status, reply) = app
            .json(
                Method::POST,
                &uri,
                Some(&student),
                json!({ "parent_id": parent, "comment": format!("reply at depth {}", depth) }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        parent = reply["id"].as_i64().unwrap();
    }

    let (status, body) =
        app.json(Method::POST, &uri, Some(&student), json!({ "parent_id": parent, "comment": "too deep" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "DEPTH_EXCEEDED");
    assert_eq!(body["error"]["details"]["max_depth"], 3);

    let (status, body) =
        app.json(Method::POST, &uri, Some(&student), json!({ "parent_id": -4, "comment": "negative" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");

    let (status, body) = app.get(&uri, Some(&student)).await;
    assert_eq!(status, StatusCode::OK);
    let roots = body["items"].as_array().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0]["rating"], 5);
    assert_eq!(roots[0]["children"][0]["comment"], "reply at depth 2");
    assert_eq!(roots[0]["children"][0]["children"][0]["comment"], "reply at depth 3");
    assert!(roots[0]["children"][0].get("rating").is_none());

    let (status, _) = app.get("/api/books/9999/reviews", Some(&student)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, metrics) = app.get("/metrics", None).await;
    assert_eq!(metrics["reviews_created"], 3);
    assert_eq!(metrics["reviews_rejected"], 2);
}

#[tokio::test]
async fn test_reviews_require_enrollment() {
    let app = test_app().await;
    let (_, student) = app.register_student("S400").await;
    create_period(&app.pool, "2025-1", true).await;
    let category = create_category(&app.pool, "Programming").await;
    let book_id = insert_book(&app.pool, "Intro to Rust", "Ferris", category.id, 1_700_000_000).await;

    let (status, body) = app
        .json(
            Method::POST,
            &format!("/api/books/{}/reviews", book_id),
            Some(&student),
            json!({ "rating": 3, "comment": "hello" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "NOT_ENROLLED");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews").fetch_one(&app.pool).await.unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_favorites_over_http() {
    let app = test_app().await;
    let (_, student) = app.register_student("S500").await;
    let category = create_category(&app.pool, "Programming").await;
    let book_id = insert_book(&app.pool, "Intro to Rust", "Ferris", category.id, 1_700_000_000).await;
    let uri = format!("/api/books/{}/favorite", book_id);

    let (status, _) = app.json(Method::POST, &uri, None, json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // no enrollment needed
    let (status, body) = app.json(Method::POST, &uri, Some(&student), json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["favorite"], true);
    let (status, _) = app.json(Method::POST, &uri, Some(&student), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get(&uri, Some(&student)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["favorite"], true);

    let (status, body) = app.get("/api/favorites?limit=500", Some(&student)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["limit"], 50);
    assert_eq!(body["items"][0]["title"], "Intro to Rust");

    let (status, _) = app.json(Method::POST, "/api/books/9999/favorite", Some(&student), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.json(Method::DELETE, &uri, Some(&student), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["favorite"], false);
    let (status, body) = app.json(Method::DELETE, &uri, Some(&student), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "book is not in favorites");
}

#[tokio::test]
async fn test_change_password_over_http() {
    let app = test_app().await;
    let (_, student) = app.register_student("S600").await;
    let uri = "/api/auth/change-password";

    let (status, body) = app
        .json(Method::POST, uri, Some(&student), json!({ "current_password": "wrong-pass", "new_password": "fresh-pass-2" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "current password is incorrect");

    let (status, body) = app
        .json(Method::POST, uri, Some(&student), json!({ "current_password": "student-pass-1", "new_password": "abc" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = app
        .json(
            Method::POST,
            uri,
            Some(&student),
            json!({ "current_password": "student-pass-1", "new_password": "fresh-pass-2" }),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .json(Method::POST, "/api/auth/login", None, json!({ "external_id": "S600", "password": "student-pass-1" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    app.login("S600", "fresh-pass-2").await;
}

#[tokio::test]
async fn test_downloads_and_admin_dashboard() {
    let app = test_app().await;
    let admin = app.admin_token().await;
    let (student_id, student) = app.register_student("S700").await;
    let period = create_period(&app.pool, "2025-1", true).await;
    enroll(&app.pool, student_id, period.id, "Sam Student").await;
    let category = create_category(&app.pool, "Programming").await;

    let (status, book) = app.upload_book(&admin, "The Rust Programming Language", category.id).await;
    assert_eq!(status, StatusCode::CREATED);
    let downloadable = book["id"].as_i64().unwrap();
    let read_only = insert_book(&app.pool, "Reference Only", "Ferris", category.id, 1_700_000_000).await;

    let (status, body) = app.get(&format!("/api/books/{}/download", downloadable), Some(&student)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["url"].as_str().unwrap().starts_with("memory://test-shelf/books/"));

    let (status, body) = app.get(&format!("/api/books/{}/download", read_only), Some(&student)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    for _ in 0..2 {
        let (status, _) = app.get(&format!("/api/books/{}/read", read_only), Some(&student)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, _) = app.get("/api/admin/dashboard", Some(&student)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.get("/api/admin/dashboard", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"], 2);
    assert_eq!(body["books"], 2);
    assert_eq!(body["enrollments"], 1);
    assert_eq!(body["active_enrollments"], 1);
    assert_eq!(body["current_period"]["name"], "2025-1");
    assert_eq!(body["reads"], 2);
    assert_eq!(body["downloads"], 1);
    assert_eq!(body["most_active_books"][0]["title"], "Reference Only");
    assert_eq!(body["most_active_books"][1]["downloads"], 1);

    let stored_ip: String = sqlx::query_scalar("SELECT client_ip FROM book_activity WHERE kind = 'DOWNLOAD'")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(stored_ip, "127.0.0.1");

    let (_, metrics) = app.get("/metrics", None).await;
    assert_eq!(metrics["book_downloads"], 1);
    assert_eq!(metrics["book_reads"], 2);
}

#[tokio::test]
async fn test_admin_user_listing() {
    let app = test_app().await;
    let admin = app.admin_token().await;
    app.register_student("S800").await;

    let (status, body) = app.get("/api/admin/users?page=1&limit=1", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert!(body["items"][0].get("password_hash").is_none());
}
