//! End-to-end tests for the login flow and the follows page
//!
//! The router is driven in-process; wiremock stands in for the Twitch
//! token, users and follows endpoints.

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use multitwitch::{
    config::AppConfig,
    oauth2::types::{OAuthConfig, ProviderConfig, TWITCH},
    state::AppState,
};
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, header as header_eq, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to create a test app talking to `server`
fn test_app(server: &MockServer) -> Router {
    let mut config = AppConfig::default();
    config.oauth2 = OAuthConfig::empty().with_provider(
        TWITCH,
        ProviderConfig {
            client_id: "test-client-id".to_string(),
            client_secret: "test-client-secret".to_string(),
            redirect_uri: "http://localhost:8080/auth/twitch/callback".to_string(),
            token_url: format!("{}/oauth2/token", server.uri()),
            userinfo_url: format!("{}/helix/users", server.uri()),
            ..ProviderConfig::twitch()
        },
    );
    config.api.base_url = format!("{}/helix", server.uri());
    config.validate().unwrap();

    multitwitch::app(AppState::new(config).unwrap())
}

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("code=the-code"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "abc", "token_type": "bearer"})),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_user(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/helix/users"))
        .and(header_eq("Authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "id": "126178180",
                "login": "viewer",
                "display_name": "Viewer",
                "email": "viewer@example.com"
            }]
        })))
        .mount(server)
        .await;
}

async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Response<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

/// `name=value` part of the session cookie set on `response`
fn session_cookie(response: &Response<Body>) -> String {
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

fn state_param(location: &str) -> String {
    reqwest::Url::parse(location)
        .unwrap()
        .query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned())
        .unwrap()
}

async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Begin the flow and return (session cookie, CSRF state)
async fn begin(app: &Router) -> (String, String) {
    let response = get(app, "/auth/twitch", None).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let location = location(&response);
    assert!(location.starts_with("https://id.twitch.tv/oauth2/authorize"));
    (session_cookie(&response), state_param(&location))
}

#[tokio::test]
async fn test_full_login_and_display() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_user(&server).await;
    Mock::given(method("GET"))
        .and(path("/helix/users/follows"))
        .and(query_param("from_id", "126178180"))
        .and(header_eq("Authorization", "Bearer abc"))
        .and(header_eq("Client-Id", "test-client-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 1,
            "data": [{
                "from_id": "126178180", "from_login": "viewer", "from_name": "Viewer",
                "to_id": "2", "to_login": "streamer", "to_name": "Streamer",
                "followed_at": "2020-05-01T12:00:00Z"
            }],
            "pagination": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = test_app(&server);
    let (cookie, state) = begin(&app).await;

    let callback = format!("/auth/twitch/callback?code=the-code&state={state}");
    let response = get(&app, &callback, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("UserID: 126178180"));
    assert!(body.contains("NickName: Viewer"));
    assert!(!body.contains("abc</p>"));

    // Already authenticated: profile instead of a new redirect
    let response = get(&app, "/auth/twitch", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("UserID: 126178180"));

    let response = get(&app, "/display", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("Viewer follows 1 channel(s)."));
    assert!(body.contains("Add Streamer"));
}

#[tokio::test]
async fn test_repeated_callback_does_not_exchange_again() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_user(&server).await;

    let app = test_app(&server);
    let (cookie, state) = begin(&app).await;
    let callback = format!("/auth/twitch/callback?code=the-code&state={state}");

    let first = get(&app, &callback, Some(&cookie)).await;
    let second = get(&app, &callback, Some(&cookie)).await;

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(body_string(first).await, body_string(second).await);
}

#[tokio::test]
async fn test_concurrent_callbacks_exchange_once() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_user(&server).await;

    let app = test_app(&server);
    let (cookie, state) = begin(&app).await;
    let callback = format!("/auth/twitch/callback?code=the-code&state={state}");

    let (first, second) = tokio::join!(
        get(&app, &callback, Some(&cookie)),
        get(&app, &callback, Some(&cookie)),
    );

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_begin_twice_generates_new_state() {
    let server = MockServer::start().await;
    let app = test_app(&server);

    let (cookie, first_state) = begin(&app).await;
    let response = get(&app, "/auth/twitch", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert!(response.headers().get(header::SET_COOKIE).is_none());

    let second_state = state_param(&location(&response));
    assert_ne!(first_state, second_state);
}

#[tokio::test]
async fn test_state_mismatch_is_rejected_without_exchange() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_user(&server).await;

    let app = test_app(&server);
    let (cookie, state) = begin(&app).await;

    let response = get(
        &app,
        "/auth/twitch/callback?code=the-code&state=forged",
        Some(&cookie),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response).await.contains("state token mismatch"));

    // The pending authorization survives a forged callback
    let callback = format!("/auth/twitch/callback?code=the-code&state={state}");
    let response = get(&app, &callback, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_provider() {
    let server = MockServer::start().await;
    let app = test_app(&server);

    let response = get(&app, "/auth/myspace", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(&app, "/auth/myspace/callback?code=x&state=y", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_callback_without_begin() {
    let server = MockServer::start().await;
    mount_token(&server, 0).await;
    let app = test_app(&server);

    let response = get(&app, "/auth/twitch/callback?code=the-code&state=abc", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_provider_denied_callback() {
    let server = MockServer::start().await;
    mount_token(&server, 0).await;
    let app = test_app(&server);
    let (cookie, state) = begin(&app).await;

    let uri = format!(
        "/auth/twitch/callback?error=access_denied&error_description=The+user+denied+you+access&state={state}"
    );
    let response = get(&app, &uri, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response).await.contains("access_denied"));
}

#[tokio::test]
async fn test_token_endpoint_failure_is_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let app = test_app(&server);
    let (cookie, state) = begin(&app).await;

    let callback = format!("/auth/twitch/callback?code=the-code&state={state}");
    let response = get(&app, &callback, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_display_requires_login() {
    let server = MockServer::start().await;
    let app = test_app(&server);

    let response = get(&app, "/display", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_display_upstream_rejection() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_user(&server).await;
    Mock::given(method("GET"))
        .and(path("/helix/users/follows"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let app = test_app(&server);
    let (cookie, state) = begin(&app).await;
    let callback = format!("/auth/twitch/callback?code=the-code&state={state}");
    assert_eq!(get(&app, &callback, Some(&cookie)).await.status(), StatusCode::OK);

    let response = get(&app, "/display", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(body_string(response).await.contains("status 401"));

    // One failed request does not affect the next
    let response = get(&app, "/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_user(&server).await;

    let app = test_app(&server);

    // Without any session
    let response = get(&app, "/logout/twitch", None).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/");

    let (cookie, state) = begin(&app).await;
    let callback = format!("/auth/twitch/callback?code=the-code&state={state}");
    assert_eq!(get(&app, &callback, Some(&cookie)).await.status(), StatusCode::OK);

    for _ in 0..2 {
        let response = get(&app, "/logout/twitch", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), "/");
    }

    let response = get(&app, "/display", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Logged out: back to the provider
    let response = get(&app, "/auth/twitch", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
}

#[tokio::test]
async fn test_index_lists_twitch() {
    let server = MockServer::start().await;
    let app = test_app(&server);

    let response = get(&app, "/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_some());
    assert!(body_string(response)
        .await
        .contains(r#"<a href="/auth/twitch">Log in with Twitch</a>"#));
}
