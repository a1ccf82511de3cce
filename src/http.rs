//! HTTP client wrapper for OSF API and WaterButler requests.

use crate::api::error::remote_error;
use crate::error::{OsfError, Result};
use reqwest::{Client, RequestBuilder, Response, redirect};
use serde_json::Value;

/// Maximum number of redirects followed for a single request.
pub const MAX_REDIRECTS: usize = 5;

/// HTTP client for making requests to OSF servers.
///
/// Every method takes the bearer token explicitly; the client itself holds no
/// credentials.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client.
    pub fn new() -> Result<Self> {
        Self::build(None)
    }

    /// Create a new HTTP client with a proxy.
    pub fn with_proxy(proxy: &str) -> Result<Self> {
        Self::build(Some(proxy))
    }

    fn build(proxy: Option<&str>) -> Result<Self> {
        let mut builder = Client::builder()
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(concat!("osf_explorer/", env!("CARGO_PKG_VERSION")));

        if let Some(proxy) = proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| OsfError::Custom(format!("Invalid proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| OsfError::Custom(format!("Failed to build client: {}", e)))?;

        Ok(Self { client })
    }

    /// GET a URL and return the raw response after status checking.
    pub async fn get(&self, url: &str, token: &str) -> Result<Response> {
        tracing::debug!(url, "GET");
        self.send(self.client.get(url).bearer_auth(token)).await
    }

    /// GET a URL and parse the body as JSON.
    pub async fn get_json(&self, url: &str, token: &str) -> Result<Value> {
        let response = self.get(url, token).await?;
        parse_json(&response.text().await?)
    }

    /// PUT a body to a URL and parse the JSON answer.
    ///
    /// WaterButler uses PUT both for uploads (with a body) and folder creation
    /// (without one).
    pub async fn put_json(&self, url: &str, token: &str, body: Vec<u8>) -> Result<Value> {
        tracing::debug!(url, bytes = body.len(), "PUT");
        let response = self
            .send(self.client.put(url).bearer_auth(token).body(body))
            .await?;
        parse_json(&response.text().await?)
    }

    /// DELETE a URL. The body of a successful answer is ignored.
    pub async fn delete(&self, url: &str, token: &str) -> Result<()> {
        tracing::debug!(url, "DELETE");
        self.send(self.client.delete(url).bearer_auth(token))
            .await?;
        Ok(())
    }

    /// POST an url-encoded form.
    ///
    /// # Returns
    /// Response body as string
    pub async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<String> {
        tracing::debug!(url, "POST");
        let response = self.send(self.client.post(url).form(form)).await?;
        Ok(response.text().await?)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(remote_error(status.as_u16(), &body));
        }

        Ok(response)
    }
}

fn parse_json(body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|e| OsfError::ParseError(e.to_string()))
}
