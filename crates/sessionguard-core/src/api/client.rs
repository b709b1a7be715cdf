//! Authenticated request executor.
//!
//! `ApiClient` attaches the current access credential to every request and
//! sends cookies through a shared jar. When the server answers 401 it runs the
//! CSRF handshake and refresh exchange once, stores the new credential, and
//! reissues the original request a single time.

use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use super::{ApiError, RequestOptions, Result};
use crate::auth::CredentialStore;
use crate::config::ClientConfig;

/// API client for the session-protected backend.
/// Clone is cheap - reqwest::Client, the cookie jar and the credential store
/// are all shared behind `Arc`s.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    jar: Arc<Jar>,
    base_url: String,
    credentials: CredentialStore,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(config: &ClientConfig, credentials: CredentialStore) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| {
            ApiError::InvalidRequest(format!("Invalid API base URL {}: {}", base_url, e))
        })?;

        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .timeout(config.request_timeout)
            .cookie_provider(Arc::clone(&jar))
            .build()?;

        Ok(Self {
            client,
            jar,
            base_url,
            credentials,
        })
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    /// Resolve a request path against the base origin.
    /// Absolute `http(s)://` URLs are used as-is.
    pub fn resolve_url(&self, path: &str) -> Result<Url> {
        let raw = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        };
        Url::parse(&raw).map_err(|e| ApiError::InvalidRequest(format!("Invalid URL {}: {}", raw, e)))
    }

    /// Read a cookie the jar would send to `url`.
    pub(crate) fn cookie(&self, url: &Url, name: &str) -> Option<String> {
        let header = self.jar.cookies(url)?;
        let header = header.to_str().ok()?;
        find_cookie(header, name)
    }

    /// Merge caller headers with the JSON content type and bearer credential.
    fn request_headers(&self, options: &RequestOptions) -> Result<HeaderMap> {
        let mut headers = options.headers.clone();
        if options.body.is_some() && !headers.contains_key(header::CONTENT_TYPE) {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }
        if let Some(access) = self.credentials.get()? {
            let value = HeaderValue::from_str(&access.bearer()).map_err(|_| {
                ApiError::InvalidRequest("Access credential is not a valid header value".into())
            })?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    async fn attempt(&self, url: &Url, options: &RequestOptions) -> Result<Response> {
        let mut request = self
            .client
            .request(options.method.clone(), url.clone())
            .headers(self.request_headers(options)?);
        if let Some(ref body) = options.body {
            request = request.body(body.clone());
        }
        Ok(request.send().await?)
    }

    /// Issue a request with the current credential, refreshing it once on 401.
    ///
    /// Any status other than 401 is returned untouched, error statuses
    /// included. The retried response is returned whatever its status; a
    /// second 401 is the caller's to handle.
    pub async fn execute(&self, path: &str, options: RequestOptions) -> Result<Response> {
        let url = self.resolve_url(path)?;
        debug!(method = %options.method, url = %url, "Sending request");

        let response = self.attempt(&url, &options).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        info!(url = %url, "Access credential rejected, refreshing");
        let access = self.renew_access().await?;
        self.credentials.set(&access)?;

        let retried = self.attempt(&url, &options).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            warn!(url = %url, "Request still unauthorized after refresh");
        }
        Ok(retried)
    }

    /// Same flow as [`execute`](Self::execute), decoding the body as JSON.
    ///
    /// An unreadable or non-JSON body decodes as `{}`. A non-success final
    /// status becomes [`ApiError::Status`] carrying the body's `detail`.
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let response = self.execute(path, options).await?;
        let status = response.status();
        let body = match response.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => {
                debug!(error = %e, "Failed to read response body");
                Vec::new()
            }
        };
        let data = serde_json::from_slice::<serde_json::Value>(&body)
            .unwrap_or_else(|_| serde_json::Value::Object(serde_json::Map::new()));

        if !status.is_success() {
            debug!(
                status = %status,
                body = %ApiError::truncate_body(&String::from_utf8_lossy(&body)),
                "Request failed"
            );
            return Err(ApiError::from_status(status, &data));
        }

        serde_json::from_value(data).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", path, e))
        })
    }

    // ===== Convenience wrappers for business calls =====

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.execute_json(path, RequestOptions::get()).await
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.execute_json(path, RequestOptions::post().json(body)?)
            .await
    }

    pub async fn patch_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.execute_json(path, RequestOptions::patch().json(body)?)
            .await
    }

    /// DELETE a resource. Empty success bodies decode as `{}`.
    pub async fn delete(&self, path: &str) -> Result<serde_json::Value> {
        self.execute_json(path, RequestOptions::delete()).await
    }
}

/// Find `name` in a `Cookie` header value (`a=1; b=2`).
fn find_cookie(header: &str, name: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}
