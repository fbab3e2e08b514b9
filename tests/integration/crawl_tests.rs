//! Integration tests for the crawler
//!
//! These tests use wiremock to stand up a site with a login wall and run the
//! full crawl against it, with a login solver that submits the site's form.

use async_trait::async_trait;
use autologin_crawl::auth::{LoginReply, LoginRequest, LoginSolver, SolverError};
use autologin_crawl::config::{AutologinConfig, Config, CrawlerConfig, UserAgentConfig};
use autologin_crawl::crawler::{run_crawl, solver_for};
use autologin_crawl::state::{AuthStatus, PageState};
use reqwest::redirect::Policy;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SESSION_COOKIE: &str = "_uctest_auth=s3ss10n";
const SESSION_SET_COOKIE: &str = "_uctest_auth=s3ss10n; Path=/";

/// Creates a test configuration for a crawl of the mock server
fn create_test_config(base_url: &str) -> Config {
    Config {
        crawler: CrawlerConfig {
            start_url: format!("{}/", base_url),
            max_depth: 3,
            max_concurrent_requests: 4,
            download_delay: 0,
            max_pages: None,
            same_site_only: true,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        autologin: AutologinConfig {
            enabled: true,
            login_url: "/login".to_string(),
            logout_url_marker: Some("action=l0gout".to_string()),
            username: "admin".to_string(),
            password: "secret".to_string(),
            max_login_attempts: 3,
            pending_queue_capacity: None,
            download_delay_during_auth: Some(10),
            login_form_signature: None,
            solver_url: None,
        },
    }
}

fn html(content: &str) -> String {
    format!("<html><head></head><body>{}</body></html>", content)
}

fn html_page(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html")
        .set_body_raw(html(content), "text/html")
}

fn to_login() -> ResponseTemplate {
    ResponseTemplate::new(302).insert_header("location", "/login")
}

fn paths(visited: &[String]) -> HashSet<&str> {
    visited.iter().map(String::as_str).collect()
}

/// Submits the site's login form directly, the way a solver service would
struct FormPostSolver {
    client: reqwest::Client,
}

impl FormPostSolver {
    fn new(user_agent: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .redirect(Policy::none())
            .build()
            .expect("Failed to build solver client");
        Self { client }
    }
}

#[async_trait]
impl LoginSolver for FormPostSolver {
    fn name(&self) -> &'static str {
        "form-post"
    }

    async fn solve(&self, request: &LoginRequest) -> Result<LoginReply, SolverError> {
        let response = self
            .client
            .post(request.login_url.clone())
            .form(&[
                ("login", request.credentials.username()),
                ("password", request.credentials.password()),
            ])
            .send()
            .await?;

        let cookies: Vec<(String, String)> = response
            .cookies()
            .filter(|cookie| !cookie.value().is_empty())
            .map(|cookie| (cookie.name().to_string(), cookie.value().to_string()))
            .collect();

        if cookies.is_empty() {
            Ok(LoginReply::failed("login form did not set a session cookie"))
        } else {
            Ok(LoginReply::solved(cookies))
        }
    }
}

/// Mounts the login form and the credential check on POST /login
async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_string_contains("login=admin"))
        .and(body_string_contains("password=secret"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", "/")
                .insert_header("set-cookie", SESSION_SET_COOKIE),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(html_page(
            r#"<form action="/login" method="POST"><input type="text" name="login"><input type="password" name="password"><input type="submit" value="Login"></form>"#,
        ))
        .mount(server)
        .await;
}

/// Mounts a page served only to requests carrying the session cookie
async fn mount_protected(server: &MockServer, page: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(page))
        .and(header("cookie", SESSION_COOKIE))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Mounts the basic site: an index, one protected page and a protected PDF
async fn mount_login_site(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(
            r#"<a href="/hidden">hidden</a> <a href="/file.pdf">file.pdf</a>"#,
        ))
        .mount(server)
        .await;

    mount_protected(server, "/hidden", html_page("hidden resource")).await;
    mount_protected(
        server,
        "/file.pdf",
        ResponseTemplate::new(200)
            .insert_header("content-type", "application/pdf")
            .set_body_bytes(b"data".to_vec()),
    )
    .await;
}

/// Anything not matched above bounces to the login page
async fn mount_login_wall(server: &MockServer) {
    Mock::given(method("GET"))
        .respond_with(to_login())
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_then_crawl_hidden_page() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_login_site(&server).await;
    mount_login_wall(&server).await;

    let config = create_test_config(&server.uri());
    let report = run_crawl(config, Arc::new(FormPostSolver::new("TestBot")))
        .await
        .expect("Crawl failed");

    let visited = report.visited_paths();
    assert_eq!(visited.len(), 2, "visited: {:?}", visited);
    assert_eq!(paths(&visited), HashSet::from(["/", "/hidden"]));

    let session = report.session.as_ref().expect("Session snapshot missing");
    assert_eq!(session.status, AuthStatus::Authenticated);
    assert_eq!(session.successful_logins, 1);
    assert_eq!(report.auth_failures(), 0);

    let pdf = Url::parse(&format!("{}/file.pdf", server.uri())).unwrap();
    assert_eq!(
        report.page(&pdf).map(|p| p.state),
        Some(PageState::ContentMismatch)
    );
}

#[tokio::test]
async fn test_logout_links_are_never_followed() {
    let server = MockServer::start().await;

    // Logout endpoints; hitting any of them fails the test on drop
    for logout in ["/l0gout1", "/l0gout2"] {
        Mock::given(method("GET"))
            .and(path(logout))
            .respond_with(
                html_page("you have been logged out").insert_header("set-cookie", "_uctest_auth="),
            )
            .expect(0)
            .mount(&server)
            .await;
    }
    for action in ["l0gout", "logout", "lo9out"] {
        Mock::given(method("GET"))
            .and(path("/one"))
            .and(query_param("action", action))
            .respond_with(html_page("you have been logged out"))
            .expect(0)
            .mount(&server)
            .await;
    }

    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(r#"<a href="/hidden">hidden</a>"#))
        .mount(&server)
        .await;

    mount_protected(
        &server,
        "/hidden",
        html_page(
            r#"<a href="/one">one</a> |
            <a href="/one?action=l0gout">one</a> |
            <a href="/one?action=logout">one</a> |
            <a href="/one?action=lo9out">Logout</a> |
            <a href="/l0gout1">l0gout1</a> |
            <a href="/two">two</a> |
            <a href="/l0gout2">l0gout2</a> |
            <a href="/three">three</a> |
            <a href="/slow">slow</a>"#,
        ),
    )
    .await;
    mount_protected(&server, "/one", html_page("1")).await;
    mount_protected(&server, "/two", html_page("2")).await;
    mount_protected(&server, "/three", html_page("3")).await;
    mount_protected(
        &server,
        "/slow",
        html_page("slow").set_delay(Duration::from_millis(300)),
    )
    .await;
    mount_login_wall(&server).await;

    let config = create_test_config(&server.uri());
    let report = run_crawl(config, Arc::new(FormPostSolver::new("TestBot")))
        .await
        .expect("Crawl failed");

    let visited = report.visited_paths();
    assert_eq!(
        paths(&visited),
        HashSet::from(["/", "/hidden", "/one", "/two", "/three", "/slow"])
    );

    let skipped: HashSet<String> = report
        .skipped_links()
        .iter()
        .map(|url| match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        })
        .collect();
    for logout in [
        "/one?action=l0gout",
        "/one?action=logout",
        "/one?action=lo9out",
        "/l0gout1",
        "/l0gout2",
    ] {
        assert!(skipped.contains(logout), "{} was not skipped", logout);
    }

    let session = report.session.as_ref().expect("Session snapshot missing");
    assert_eq!(session.successful_logins, 1);
    assert_eq!(session.status, AuthStatus::Authenticated);
}

#[tokio::test]
async fn test_small_pending_queue() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_login_site(&server).await;
    mount_login_wall(&server).await;

    let mut config = create_test_config(&server.uri());
    config.autologin.pending_queue_capacity = Some(3);

    let report = run_crawl(config, Arc::new(FormPostSolver::new("TestBot")))
        .await
        .expect("Crawl failed");

    let visited = report.visited_paths();
    assert_eq!(visited.len(), 2);
    assert_eq!(paths(&visited), HashSet::from(["/", "/hidden"]));
}

/// Login form that only accepts a specific user agent
async fn mount_user_agent_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(header("user-agent", "MyCustomAgent"))
        .and(body_string_contains("login=admin"))
        .and(body_string_contains("password=secret"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", "/")
                .insert_header("set-cookie", SESSION_SET_COOKIE),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(html_page("Invalid User-Agent"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_with_custom_user_agent() {
    let server = MockServer::start().await;
    mount_user_agent_login(&server).await;
    mount_login_site(&server).await;
    mount_login_wall(&server).await;

    let mut config = create_test_config(&server.uri());
    config.crawler.max_concurrent_requests = 1;

    let report = run_crawl(config, Arc::new(FormPostSolver::new("MyCustomAgent")))
        .await
        .expect("Crawl failed");

    let visited = report.visited_paths();
    assert_eq!(visited.len(), 2);
    assert_eq!(visited[1], "/hidden");
}

#[tokio::test]
async fn test_failed_logins_give_up_after_max_attempts() {
    let server = MockServer::start().await;
    mount_user_agent_login(&server).await;
    mount_login_site(&server).await;
    mount_login_wall(&server).await;

    let config = create_test_config(&server.uri());
    let report = run_crawl(config, Arc::new(FormPostSolver::new("WrongAgent")))
        .await
        .expect("Crawl failed");

    assert_eq!(report.visited_paths(), vec!["/"]);

    let session = report.session.as_ref().expect("Session snapshot missing");
    assert_eq!(session.status, AuthStatus::Failed);
    assert_eq!(session.total_attempts, 3);
    assert_eq!(session.successful_logins, 0);

    let hidden = Url::parse(&format!("{}/hidden", server.uri())).unwrap();
    assert_eq!(
        report.page(&hidden).map(|p| p.state),
        Some(PageState::AuthFailed)
    );
    assert!(report.auth_failures() >= 1);
}

#[tokio::test]
async fn test_disabled_autologin_never_logs_in() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    mount_login(&server).await;
    mount_login_site(&server).await;
    mount_login_wall(&server).await;

    let mut config = create_test_config(&server.uri());
    config.autologin.enabled = false;

    let report = run_crawl(config, Arc::new(FormPostSolver::new("TestBot")))
        .await
        .expect("Crawl failed");

    assert!(report.session.is_none());
    let hidden = Url::parse(&format!("{}/hidden", server.uri())).unwrap();
    assert_eq!(
        report.page(&hidden).map(|p| p.state),
        Some(PageState::Redirected)
    );
    assert!(!report.visited_paths().contains(&"/hidden".to_string()));
}

#[tokio::test]
async fn test_crawl_with_http_solver_service() {
    let site = MockServer::start().await;
    let solver = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login-cookies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "solved",
            "cookies": [{"name": "_uctest_auth", "value": "s3ss10n"}],
        })))
        .expect(1)
        .mount(&solver)
        .await;

    mount_login_site(&site).await;
    mount_login_wall(&site).await;

    let mut config = create_test_config(&site.uri());
    config.autologin.solver_url = Some(solver.uri());

    let solver_impl = solver_for(&config).expect("Failed to build solver");
    assert_eq!(solver_impl.name(), "http");

    let report = run_crawl(config, solver_impl).await.expect("Crawl failed");
    assert_eq!(
        paths(&report.visited_paths()),
        HashSet::from(["/", "/hidden"])
    );
}

#[tokio::test]
async fn test_valid_session_needs_no_login() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(r#"<a href="/hidden">hidden</a> <a href="/login">Login</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/hidden"))
        .respond_with(html_page("hidden resource"))
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri());
    let report = run_crawl(config, Arc::new(FormPostSolver::new("TestBot")))
        .await
        .expect("Crawl failed");

    assert_eq!(
        paths(&report.visited_paths()),
        HashSet::from(["/", "/hidden"])
    );
    let session = report.session.as_ref().expect("Session snapshot missing");
    assert_eq!(session.total_attempts, 0);
    assert_eq!(session.status, AuthStatus::Unknown);
    assert!(report
        .skipped_links()
        .iter()
        .any(|url| url.path() == "/login"));
}
