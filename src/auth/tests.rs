use super::*;
use axum::{
    http::{HeaderName, HeaderValue},
    middleware,
    routing::get,
    Router,
};
use axum_test::TestServer;

fn service(secret: &str) -> TokenService {
    TokenService::new(&AuthConfig {
        jwt_secret: secret.to_string(),
        token_ttl_secs: 3600,
    })
    .unwrap()
}

fn protected_server(tokens: Arc<TokenService>) -> TestServer {
    let app = Router::new()
        .route("/protected", get(|| async { "ok" }))
        .layer(middleware::from_fn_with_state(tokens, require_bearer));
    TestServer::new(app).unwrap()
}

fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    )
}

#[test]
fn test_issue_and_verify() {
    let tokens = service("secret");
    let issued = tokens.issue().unwrap();
    assert_eq!(issued.token_type, "bearer");
    assert_eq!(issued.expires_in, 3600);

    let claims = tokens.verify(&issued.access_token).unwrap();
    assert_eq!(claims.sub, "starwars_api_user");
    assert_eq!(claims.role, "user");
    assert_eq!(claims.exp - claims.iat, 3600);
}

#[test]
fn test_tokens_are_unique() {
    let tokens = service("secret");
    let a = tokens.issue().unwrap();
    let b = tokens.issue().unwrap();
    assert_ne!(a.access_token, b.access_token);
}

#[test]
fn test_wrong_secret_rejected() {
    let issued = service("secret").issue().unwrap();
    let err = service("other").verify(&issued.access_token).unwrap_err();
    assert!(matches!(err, GatewayError::Unauthorized(_)));
}

#[test]
fn test_expired_token_rejected() {
    let tokens = service("secret");
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: SUBJECT.to_string(),
        role: ROLE.to_string(),
        iat: now - 7200,
        exp: now - 3600,
        jti: "expired".to_string(),
    };
    let token = tokens.sign(&claims).unwrap();
    let err = tokens.verify(&token).unwrap_err();
    assert_eq!(err.to_string(), GatewayError::Unauthorized("Token has expired".to_string()).to_string());
}

#[test]
fn test_garbage_token_rejected() {
    assert!(service("secret").verify("not-a-token").is_err());
}

#[test]
fn test_empty_secret_is_config_error() {
    let result = TokenService::new(&AuthConfig {
        jwt_secret: String::new(),
        token_ttl_secs: 3600,
    });
    assert!(matches!(result, Err(GatewayError::ConfigError(_))));
}

#[test]
fn test_bearer_token_parsing() {
    assert_eq!(bearer_token("Bearer abc"), Some("abc"));
    assert_eq!(bearer_token("bearer abc"), Some("abc"));
    assert_eq!(bearer_token("Basic abc"), None);
    assert_eq!(bearer_token("Bearer "), None);
    assert_eq!(bearer_token("Bearer"), None);
}

#[tokio::test]
async fn test_middleware_rejects_missing_token() {
    let server = protected_server(Arc::new(service("secret")));
    let response = server.get("/protected").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.header(header::WWW_AUTHENTICATE), "Bearer");
    let body: ErrorResponse = response.json();
    assert_eq!(body.error, "unauthorized");
}

#[tokio::test]
async fn test_middleware_rejects_bad_token() {
    let server = protected_server(Arc::new(service("secret")));
    let (name, value) = bearer("forged");
    let response = server.get("/protected").add_header(name, value).await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_middleware_accepts_valid_token() {
    let tokens = Arc::new(service("secret"));
    let issued = tokens.issue().unwrap();
    let server = protected_server(tokens);
    let (name, value) = bearer(&issued.access_token);
    let response = server.get("/protected").add_header(name, value).await;
    response.assert_status_ok();
    response.assert_text("ok");
}
