use std::time::Duration;

use log::{debug, warn};
use reqwest::multipart::{Form, Part};

use crate::error::{ClientError, Result};
use crate::transport::{Body, HttpRequest, HttpResponse, Method, Transport};

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const USER_AGENT: &str = concat!("flowgate/", env!("CARGO_PKG_VERSION"));

/// [`Transport`] backed by reqwest
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ClientError::Http(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.url.to_string();
        debug!("{} {}", request.method, url);

        let mut builder = match request.method {
            Method::Get => self.client.get(request.url),
            Method::Post => self.client.post(request.url),
        };
        if let Some(credentials) = &request.auth {
            builder = builder.basic_auth(&credentials.username, Some(&credentials.password));
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            Body::Empty => builder,
            Body::Json(json) => builder.json(&json),
            Body::Bytes(bytes) => builder
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(bytes),
            Body::Upload(upload) => {
                let mut form = Form::new();
                for (name, value) in upload.fields {
                    form = form.text(name, value);
                }
                let part = Part::bytes(upload.data).file_name(upload.file_name);
                builder.multipart(form.part(upload.file_field, part))
            }
        };

        let response = builder.send().await.map_err(|e| {
            warn!("{url} failed (timeout: {}, connect: {}): {e}", e.is_timeout(), e.is_connect());
            ClientError::Http(format!("Request to {url} failed: {e}"))
        })?;

        let status = response.status().as_u16();
        debug!("{url} returned HTTP {status}");
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::Http(format!("Failed to read response from {url}: {e}")))?
            .to_vec();

        Ok(HttpResponse { status, url, headers, body })
    }
}
