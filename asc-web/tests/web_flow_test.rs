//! End-to-end request flows through the full router

use asc_core::AscConfig;
use asc_web::{create_app, AppState, WebConfig};
use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn bootstrapped(settings: AscConfig) -> (AppState, Router) {
    let state = AppState::new(WebConfig::default(), settings).await.unwrap();
    state.run_bootstrap().await;
    let app = create_app(state.clone());
    (state, app)
}

async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn set_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .map(|value| value.to_str().unwrap().to_string())
}

/// `name=value` part of a Set-Cookie header
fn cookie_pair(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap().trim().to_string()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn login(app: &Router, email: &str, password: &str) -> Response<Body> {
    app.clone()
        .oneshot(post_json(
            "/api/account/login",
            json!({ "email": email, "password": password }),
            None,
        ))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let (_, app) = bootstrapped(AscConfig::default()).await;

    let response = app.oneshot(get("/api/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_startup_report_exposed() {
    let (_, app) = bootstrapped(AscConfig::default()).await;

    let response = app.oneshot(get("/api/startup", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let report = body_json(response).await;
    let steps = report["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0]["name"], "identity_seed");
    assert_eq!(steps[0]["state"], "succeeded");
    assert_eq!(steps[1]["name"], "navigation_cache");
    assert_eq!(steps[1]["state"], "succeeded");
}

#[tokio::test]
async fn test_startup_report_unavailable_before_bootstrap() {
    let state = AppState::new(WebConfig::default(), AscConfig::default())
        .await
        .unwrap();
    let app = create_app(state);

    let response = app
        .clone()
        .oneshot(get("/api/startup", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = app.oneshot(get("/api/navigation", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["error"], "navigation_unavailable");
}

#[tokio::test]
async fn test_anonymous_request_gets_no_cookie() {
    let (_, app) = bootstrapped(AscConfig::default()).await;

    let response = app.oneshot(get("/api/account/me", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookie(&response).is_none());
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let (_, app) = bootstrapped(AscConfig::default()).await;

    let response = login(&app, "admin@example.com", "wrong").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookie(&response).is_none());

    let response = login(&app, "nobody@example.com", "Admin@123").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = login(&app, "", "").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_session_flow() {
    let (_, app) = bootstrapped(AscConfig::default()).await;

    let response = login(&app, "admin@example.com", "Admin@123").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get_all(header::SET_COOKIE).iter().count(), 1);

    let header = set_cookie(&response).expect("session cookie issued");
    assert!(header.starts_with("asc.session="));
    assert!(header.contains("HttpOnly"));
    assert!(header.contains("SameSite=Lax"));
    assert!(header.contains("Path=/"));
    let cookie = cookie_pair(&header);

    let user = body_json(response).await;
    assert_eq!(user["email"], "admin@example.com");
    assert_eq!(user["roles"], json!(["Admin"]));

    // Subsequent requests reuse the session without reissuing the cookie
    let response = app
        .clone()
        .oneshot(get("/api/account/me", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response).is_none());
    assert_eq!(body_json(response).await["name"], "Admin");

    let response = app
        .clone()
        .oneshot(post_json("/api/account/logout", json!({}), Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get("/api/account/me", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_issues_fresh_session_id() {
    let (_, app) = bootstrapped(AscConfig::default()).await;

    let response = login(&app, "admin@example.com", "Admin@123").await;
    let first = cookie_pair(&set_cookie(&response).unwrap());

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/account/login",
            json!({ "email": "admin@example.com", "password": "Admin@123" }),
            Some(&first),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get_all(header::SET_COOKIE).iter().count(), 1);
    let second = cookie_pair(&set_cookie(&response).expect("rotated cookie"));
    assert_ne!(second, first);

    // The id held before sign-in no longer carries a user
    let response = app
        .clone()
        .oneshot(get("/api/account/me", Some(&first)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(get("/api/account/me", Some(&second)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_navigation_filtered_by_role() {
    let mut settings = AscConfig::default();
    settings.app.engineer_name = Some("Engineer".to_string());
    settings.app.engineer_email = Some("engineer@example.com".to_string());
    settings.app.engineer_password = Some("Engineer@123".to_string());
    let (_, app) = bootstrapped(settings).await;

    // Anonymous callers only see items without role restrictions
    let response = app
        .clone()
        .oneshot(get("/api/navigation", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["MenuItems"], json!([]));

    let response = login(&app, "engineer@example.com", "Engineer@123").await;
    let cookie = cookie_pair(&set_cookie(&response).unwrap());

    let response = app
        .oneshot(get("/api/navigation", Some(&cookie)))
        .await
        .unwrap();
    let menu = body_json(response).await;
    let names: Vec<&str> = menu["MenuItems"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["DisplayName"].as_str().unwrap())
        .collect();

    assert!(names.contains(&"Service Notifications"));
    assert!(!names.contains(&"User Administration"));
    assert!(!names.contains(&"Master Data"));
}

#[tokio::test]
async fn test_dashboard_requires_user() {
    let (_, app) = bootstrapped(AscConfig::default()).await;

    let response = app
        .clone()
        .oneshot(get("/ServiceRequests/Dashboard/Dashboard", None))
        .await
        .unwrap();
    assert!(response.status().is_redirection());
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");

    let response = login(&app, "admin@example.com", "Admin@123").await;
    let cookie = cookie_pair(&set_cookie(&response).unwrap());

    let response = app
        .oneshot(get("/ServiceRequests/Dashboard/Dashboard", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_text(response).await;
    assert!(html.contains("User Administration"));
    assert!(html.contains("admin@example.com"));
}

#[tokio::test]
async fn test_unknown_session_cookie_is_replaced() {
    let (_, app) = bootstrapped(AscConfig::default()).await;
    let forged = "asc.session=00000000000000000000000000000000";

    let response = app
        .clone()
        .oneshot(get("/api/account/me", Some(forged)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(post_json(
            "/api/account/login",
            json!({ "email": "admin@example.com", "password": "Admin@123" }),
            Some(forged),
        ))
        .await
        .unwrap();
    let cookie = cookie_pair(&set_cookie(&response).expect("fresh cookie"));
    assert_ne!(cookie, forged);
}

#[tokio::test]
async fn test_index_page() {
    let (_, app) = bootstrapped(AscConfig::default()).await;

    let response = app.oneshot(get("/", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response)
        .await
        .contains("Automobile Service Center"));
}
