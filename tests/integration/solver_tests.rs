//! Integration tests for the HTTP login solver client

use autologin_crawl::auth::{
    Credentials, HttpLoginSolver, LoginRequest, LoginSolver, SessionCookies, SolverError,
};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn login_request(cookies: SessionCookies) -> LoginRequest {
    LoginRequest {
        login_url: Url::parse("http://127.0.0.1:8000/login").unwrap(),
        credentials: Credentials::new("admin", "secret"),
        page: None,
        cookies,
    }
}

#[tokio::test]
async fn test_solved_reply_returns_cookies() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login-cookies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "solved",
            "cookies": [
                {"name": "_uctest_auth", "value": "s3ss10n", "domain": "127.0.0.1"},
                {"name": "theme", "value": "dark"},
            ],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let solver = HttpLoginSolver::new(&server.uri()).unwrap();
    let reply = solver
        .solve(&login_request(SessionCookies::default()))
        .await
        .expect("Solver request failed");

    assert!(reply.success);
    assert_eq!(
        reply.cookies,
        vec![
            ("_uctest_auth".to_string(), "s3ss10n".to_string()),
            ("theme".to_string(), "dark".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_request_body_carries_credentials_and_cookies() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login-cookies"))
        .and(body_json(json!({
            "url": "http://127.0.0.1:8000/login",
            "username": "admin",
            "password": "secret",
            "cookies": [{"name": "csrftoken", "value": "abc"}],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "solved",
            "cookies": [{"name": "_uctest_auth", "value": "s3ss10n"}],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cookies: SessionCookies = [("csrftoken".to_string(), "abc".to_string())]
        .into_iter()
        .collect();
    let reply = HttpLoginSolver::new(&server.uri())
        .unwrap()
        .solve(&login_request(cookies))
        .await
        .expect("Solver request failed");

    assert!(reply.success);
}

#[tokio::test]
async fn test_error_status_is_a_failed_login() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login-cookies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "error",
            "error": "Login form not found",
        })))
        .mount(&server)
        .await;

    let reply = HttpLoginSolver::new(&server.uri())
        .unwrap()
        .solve(&login_request(SessionCookies::default()))
        .await
        .expect("Solver request failed");

    assert!(!reply.success);
    assert!(reply.cookies.is_empty());
    assert_eq!(reply.error.as_deref(), Some("Login form not found"));
}

#[tokio::test]
async fn test_solved_without_cookies_is_a_failed_login() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login-cookies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "solved",
            "cookies": [],
        })))
        .mount(&server)
        .await;

    let reply = HttpLoginSolver::new(&server.uri())
        .unwrap()
        .solve(&login_request(SessionCookies::default()))
        .await
        .expect("Solver request failed");

    assert!(!reply.success);
    assert!(reply.error.unwrap().contains("solved"));
}

#[tokio::test]
async fn test_server_error_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login-cookies"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = HttpLoginSolver::new(&server.uri())
        .unwrap()
        .solve(&login_request(SessionCookies::default()))
        .await;

    assert!(matches!(result, Err(SolverError::Status { status: 500 })));
}

#[tokio::test]
async fn test_unreachable_solver_is_a_transport_error() {
    // Nothing listens once the listener is dropped
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let result = HttpLoginSolver::new(&format!("http://127.0.0.1:{}", port))
        .unwrap()
        .solve(&login_request(SessionCookies::default()))
        .await;

    assert!(matches!(result, Err(SolverError::Transport(_))));
}
