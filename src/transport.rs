//! Requests and responses exchanged with remote analysis servers
//!
//! The engine clients build [`HttpRequest`]s and hand them to a [`Transport`]. Production code
//! uses [`http::ReqwestTransport`]; tests script responses with a mock transport.

use std::fmt;
use std::future::Future;

use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::config::Credentials;
use crate::error::{ClientError, Result};

pub mod http;
#[cfg(test)]
pub mod mock;

/// Longest response body quoted in a status error
const MAX_ERROR_BODY: usize = 500;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

#[derive(Clone, Debug)]
pub enum Body {
    Empty,
    Json(Value),
    Bytes(Vec<u8>),
    Upload(Upload),
}

/// A multipart form with text fields and a single file part
#[derive(Clone, Debug)]
pub struct Upload {
    pub fields: Vec<(String, String)>,
    pub file_field: String,
    pub file_name: String,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub auth: Option<Credentials>,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl HttpRequest {
    pub fn get(url: Url) -> Self {
        HttpRequest {
            method: Method::Get,
            url,
            auth: None,
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    pub fn post(url: Url, body: Body) -> Self {
        HttpRequest {
            method: Method::Post,
            url,
            auth: None,
            headers: Vec::new(),
            body,
        }
    }

    pub fn basic_auth(mut self, credentials: &Credentials) -> Self {
        self.auth = Some(credentials.clone());
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Header lookup, names are case insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let mut body = String::from_utf8_lossy(&self.body).into_owned();
        if body.len() > MAX_ERROR_BODY {
            let mut end = MAX_ERROR_BODY;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            body.truncate(end);
        }
        Err(ClientError::Status {
            status: self.status,
            url: self.url,
            body,
        })
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| ClientError::InvalidResponse {
            url: self.url.clone(),
            reason: e.to_string(),
        })
    }
}

/// Sends requests to a remote server
pub trait Transport: Send + Sync {
    fn send(&self, request: HttpRequest) -> impl Future<Output = Result<HttpResponse>> + Send;
}

/// Resolve an API path against a server base URL
///
/// The base URL may point below the host root (e.g. `https://host/galaxy`), so it is treated
/// as a directory even without a trailing slash.
pub fn endpoint(base: &Url, path: &str) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let dir = format!("{}/", base.path());
        base.set_path(&dir);
    }
    Ok(base.join(path.trim_start_matches('/'))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_keeps_base_path() {
        let base = Url::parse("https://usegalaxy.example.org/galaxy").unwrap();
        let url = endpoint(&base, "/api/histories").unwrap();
        assert_eq!(url.as_str(), "https://usegalaxy.example.org/galaxy/api/histories");

        let base = Url::parse("https://gp.example.org/").unwrap();
        let url = endpoint(&base, "gp/rest/v1/jobs").unwrap();
        assert_eq!(url.as_str(), "https://gp.example.org/gp/rest/v1/jobs");
    }

    #[test]
    fn test_error_for_status() {
        let response = HttpResponse {
            status: 401,
            url: "https://gp.example.org/gp/rest/v1/jobs".to_string(),
            headers: vec![],
            body: b"Unauthorized".to_vec(),
        };
        match response.error_for_status() {
            Err(ClientError::Status { status, body, .. }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "Unauthorized");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_header_is_case_insensitive() {
        let response = HttpResponse {
            status: 201,
            url: String::new(),
            headers: vec![("location".to_string(), "https://gp/file".to_string())],
            body: vec![],
        };
        assert_eq!(response.header("Location"), Some("https://gp/file"));
        assert_eq!(response.header("Content-Type"), None);
    }
}
