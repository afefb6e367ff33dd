//! Scripted [`Transport`] for tests

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::Result;
use crate::transport::{HttpRequest, HttpResponse, Method, Transport};

struct Route {
    method: Method,
    path: String,
    responses: VecDeque<HttpResponse>,
}

/// Answers requests by method and URL path and records every request it sees
///
/// Responses queued on a route are returned in order; the last one repeats. Unknown routes get
/// a 404.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, method: Method, path: &str, status: u16, body: &str) -> Self {
        self.respond(method, path, status, Vec::new(), body)
    }

    pub fn on_with_header(
        self,
        method: Method,
        path: &str,
        status: u16,
        header: (&str, &str),
        body: &str,
    ) -> Self {
        let headers = vec![(header.0.to_string(), header.1.to_string())];
        self.respond(method, path, status, headers, body)
    }

    fn respond(
        self,
        method: Method,
        path: &str,
        status: u16,
        headers: Vec<(String, String)>,
        body: &str,
    ) -> Self {
        let response = HttpResponse {
            status,
            url: path.to_string(),
            headers,
            body: body.as_bytes().to_vec(),
        };
        {
            let mut routes = self.routes.lock().unwrap();
            match routes.iter_mut().find(|r| r.method == method && r.path == path) {
                Some(route) => route.responses.push_back(response),
                None => routes.push(Route {
                    method,
                    path: path.to_string(),
                    responses: VecDeque::from([response]),
                }),
            }
        }
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.path() == path)
            .collect()
    }
}

impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let path = request.url.path().to_string();
        let url = request.url.to_string();
        let method = request.method;
        self.requests.lock().unwrap().push(request);

        let mut routes = self.routes.lock().unwrap();
        let response = match routes.iter_mut().find(|r| r.method == method && r.path == path) {
            Some(route) if route.responses.len() > 1 => route.responses.pop_front(),
            Some(route) => route.responses.front().cloned(),
            None => None,
        };
        Ok(match response {
            Some(response) => HttpResponse { url, ..response },
            None => HttpResponse {
                status: 404,
                url,
                headers: Vec::new(),
                body: b"not found".to_vec(),
            },
        })
    }
}
