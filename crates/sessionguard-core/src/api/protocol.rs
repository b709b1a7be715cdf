//! Auth endpoint exchanges: CSRF handshake, refresh, login, logout, me.
//!
//! None of these persist anything. Storing the credential they return is the
//! job of whoever called them (the executor or the session context).

use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ApiClient, ApiError, RequestOptions, Result};
use crate::models::{AccessCredential, CsrfToken, SessionUser};

// ============================================================================
// Constants
// ============================================================================

const CSRF_PATH: &str = "/api/auth/csrf/";
const LOGIN_PATH: &str = "/api/auth/login/";
const REFRESH_PATH: &str = "/api/auth/refresh/";
const LOGOUT_PATH: &str = "/api/auth/logout/";
const ME_PATH: &str = "/api/auth/me/";

/// Cookie the server sets in response to the CSRF handshake
pub const CSRF_COOKIE_NAME: &str = "csrftoken";

/// Header carrying the CSRF token on protected POSTs
pub const CSRF_HEADER_NAME: &str = "X-CSRFToken";

#[derive(Debug, Deserialize)]
struct AccessResponse {
    access: String,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

impl ApiClient {
    /// Fetch a fresh anti-forgery token.
    ///
    /// The response status is not inspected; only the cookie the server
    /// leaves in the jar matters. A missing cookie is fatal for the flow.
    pub async fn fetch_csrf_token(&self) -> Result<CsrfToken> {
        let url = self.resolve_url(CSRF_PATH)?;
        let response = self.http().get(url.clone()).send().await?;
        debug!(status = %response.status(), "CSRF handshake completed");

        self.cookie(&url, CSRF_COOKIE_NAME)
            .map(CsrfToken::new)
            .ok_or(ApiError::MissingCsrfToken(CSRF_COOKIE_NAME))
    }

    /// Exchange the session cookie for a new access credential.
    pub async fn refresh_access_token(&self, csrf: &CsrfToken) -> Result<AccessCredential> {
        let response = self
            .post_protected(REFRESH_PATH, csrf, &serde_json::json!({}))
            .await?;
        Self::read_access(response).await
    }

    /// CSRF handshake followed by a refresh.
    pub async fn renew_access(&self) -> Result<AccessCredential> {
        let csrf = self.fetch_csrf_token().await?;
        self.refresh_access_token(&csrf).await
    }

    /// Trade email and password for an access credential. The server also
    /// sets the long-lived session cookie, which stays in the jar.
    pub async fn login(&self, email: &str, password: &str) -> Result<AccessCredential> {
        let csrf = self.fetch_csrf_token().await?;
        let response = self
            .post_protected(LOGIN_PATH, &csrf, &LoginRequest { email, password })
            .await?;
        Self::read_access(response).await
    }

    /// Ask the server to invalidate the session. The response body is ignored.
    pub async fn logout(&self) -> Result<()> {
        let csrf = self.fetch_csrf_token().await?;
        let response = self
            .post_protected(LOGOUT_PATH, &csrf, &serde_json::json!({}))
            .await?;
        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Server rejected logout");
            return Err(ApiError::Status {
                status,
                detail: None,
            });
        }
        Ok(())
    }

    /// Fetch the current principal through the authenticated executor.
    pub async fn fetch_me(&self) -> Result<SessionUser> {
        self.execute_json(ME_PATH, RequestOptions::get()).await
    }

    async fn post_protected<B: Serialize + ?Sized>(
        &self,
        path: &str,
        csrf: &CsrfToken,
        body: &B,
    ) -> Result<Response> {
        let url = self.resolve_url(path)?;
        let response = self
            .http()
            .post(url)
            .header(CSRF_HEADER_NAME, csrf.as_str())
            .json(body)
            .send()
            .await?;
        Ok(response)
    }

    async fn read_access(response: Response) -> Result<AccessCredential> {
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            debug!(
                status = %status,
                body = %ApiError::truncate_body(&String::from_utf8_lossy(&body)),
                "Auth exchange rejected"
            );
            return Err(ApiError::auth_rejected(status, &body));
        }

        let parsed: AccessResponse = serde_json::from_slice(&body).map_err(|e| {
            ApiError::InvalidResponse(format!("Auth response has no access token: {}", e))
        })?;
        if parsed.access.is_empty() {
            return Err(ApiError::InvalidResponse(
                "Auth response has an empty access token".into(),
            ));
        }
        Ok(AccessCredential::from(parsed.access))
    }
}

/// Whether an error means the server no longer recognizes the session.
pub fn is_session_expired(err: &ApiError) -> bool {
    matches!(
        err,
        ApiError::AuthRejected { status, .. }
            if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CredentialStore;
    use crate::config::ClientConfig;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ApiClient {
        let config = ClientConfig::default().with_base_url(server.uri());
        ApiClient::new(&config, CredentialStore::in_memory()).unwrap()
    }

    async fn mount_csrf(server: &MockServer, token: &str) {
        Mock::given(method("GET"))
            .and(path(CSRF_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", format!("csrftoken={}; Path=/", token).as_str())
                    .set_body_json(serde_json::json!({"csrfToken": token})),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_fetch_csrf_token_reads_cookie() {
        let server = MockServer::start().await;
        mount_csrf(&server, "csrf-A").await;

        let client = client_for(&server);
        let token = client.fetch_csrf_token().await.unwrap();
        assert_eq!(token.as_str(), "csrf-A");
    }

    #[tokio::test]
    async fn test_fetch_csrf_token_without_cookie_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CSRF_PATH))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.fetch_csrf_token().await.unwrap_err();
        assert!(matches!(err, ApiError::MissingCsrfToken("csrftoken")));
    }

    #[tokio::test]
    async fn test_csrf_handshake_sends_no_bearer() {
        let server = MockServer::start().await;
        mount_csrf(&server, "csrf-A").await;

        let client = client_for(&server);
        client.credentials().set(&AccessCredential::from("T1")).unwrap();
        client.fetch_csrf_token().await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_refresh_returns_credential_without_storing_it() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(REFRESH_PATH))
            .and(header("x-csrftoken", "csrf-A"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"access": "T2"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let access = client
            .refresh_access_token(&CsrfToken::new("csrf-A"))
            .await
            .unwrap();
        assert_eq!(access.as_str(), "T2");
        assert!(client.credentials().get().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refresh_rejection_carries_status_and_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(REFRESH_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({"detail": "Missing refresh token"})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .refresh_access_token(&CsrfToken::new("csrf-A"))
            .await
            .unwrap_err();
        assert!(is_session_expired(&err));
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(err.detail(), Some("Missing refresh token"));
    }

    #[tokio::test]
    async fn test_refresh_rejection_with_html_body_has_no_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(REFRESH_PATH))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .refresh_access_token(&CsrfToken::new("csrf-A"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::AuthRejected { status, detail: None } if status == StatusCode::BAD_GATEWAY
        ));
        assert!(!is_session_expired(&err));
    }

    #[tokio::test]
    async fn test_refresh_success_without_access_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(REFRESH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "T2"})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .refresh_access_token(&CsrfToken::new("csrf-A"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_login_posts_credentials_with_csrf() {
        let server = MockServer::start().await;
        mount_csrf(&server, "csrf-L").await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .and(header("x-csrftoken", "csrf-L"))
            .and(body_json(serde_json::json!({"email": "a@b.com", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"access": "T3"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let access = client.login("a@b.com", "pw").await.unwrap();
        assert_eq!(access.as_str(), "T3");
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let server = MockServer::start().await;
        mount_csrf(&server, "csrf-L").await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({"detail": "Invalid credentials"})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.login("a@b.com", "wrong").await.unwrap_err();
        assert_eq!(err.detail(), Some("Invalid credentials"));
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn test_logout_reports_server_rejection() {
        let server = MockServer::start().await;
        mount_csrf(&server, "csrf-X").await;
        Mock::given(method("POST"))
            .and(path(LOGOUT_PATH))
            .and(header("x-csrftoken", "csrf-X"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.logout().await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }
}
