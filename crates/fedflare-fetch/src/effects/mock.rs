//! Scripted in-memory [`HttpClient`] for tests.
//!
//! Replies are registered per method and URL. A sequence is consumed one
//! reply per request and its last reply repeats once the rest are used up.
//! Unregistered URLs answer `404`.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use bytes::Bytes;

use crate::data::{Headers, Response};
use crate::effects::http::HttpClient;
use crate::error::{FetchError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Head,
    Get,
}

/// Transport failures a scripted reply can simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Connect,
    Timeout,
    /// A chunked transfer that broke off mid-body.
    Body,
    InvalidUrl,
}

#[derive(Debug, Clone)]
pub enum MockReply {
    Respond {
        status: u16,
        headers: Vec<(String, String)>,
        body: Bytes,
    },
    Fail(MockFailure),
}

impl MockReply {
    pub fn ok() -> Self {
        Self::status(200)
    }

    pub fn status(status: u16) -> Self {
        Self::Respond {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn fail(failure: MockFailure) -> Self {
        Self::Fail(failure)
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let Self::Respond { headers, .. } = &mut self {
            headers.push((name.to_owned(), value.to_owned()));
        }
        self
    }

    #[must_use]
    pub fn body(mut self, content: impl Into<Bytes>) -> Self {
        if let Self::Respond { body, .. } = &mut self {
            *body = content.into();
        }
        self
    }

    fn materialize(&self, url: &str) -> Result<Response> {
        let url = url.to_owned();
        match self {
            Self::Respond {
                status,
                headers,
                body,
            } => Ok(Response {
                status: *status,
                headers: headers.iter().map(|(k, v)| (k.as_str(), v.clone())).collect::<Headers>(),
                body: body.clone(),
                url,
            }),
            Self::Fail(MockFailure::Connect) => Err(FetchError::Connect {
                url,
                message: "connection refused".into(),
            }),
            Self::Fail(MockFailure::Timeout) => Err(FetchError::Timeout { url }),
            Self::Fail(MockFailure::Body) => Err(FetchError::Body {
                url,
                message: "error decoding response body: unexpected EOF during chunk size line"
                    .into(),
            }),
            Self::Fail(MockFailure::InvalidUrl) => Err(FetchError::InvalidUrl(url)),
        }
    }
}

/// A request as the mock saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

#[derive(Default)]
pub struct MockHttpClient {
    routes: Mutex<HashMap<(Method, String), VecDeque<MockReply>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_head(self, url: &str, reply: MockReply) -> Self {
        self.on_sequence(Method::Head, url, vec![reply])
    }

    #[must_use]
    pub fn on_get(self, url: &str, reply: MockReply) -> Self {
        self.on_sequence(Method::Get, url, vec![reply])
    }

    #[must_use]
    pub fn on_get_sequence(self, url: &str, replies: Vec<MockReply>) -> Self {
        self.on_sequence(Method::Get, url, replies)
    }

    #[must_use]
    pub fn on_sequence(self, method: Method, url: &str, replies: Vec<MockReply>) -> Self {
        self.set(method, url, replies);
        self
    }

    /// Replace the replies for a route after construction.
    pub fn set(&self, method: Method, url: &str, replies: Vec<MockReply>) {
        let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        routes.insert((method, url.to_owned()), replies.into());
    }

    /// Number of requests seen for a method and URL.
    pub fn calls(&self, method: Method, url: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.url == url)
            .count()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn reply(&self, method: Method, url: &str, headers: &[(String, String)]) -> Result<Response> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedRequest {
                method,
                url: url.to_owned(),
                headers: headers.to_vec(),
            });

        let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        let reply = match routes.get_mut(&(method, url.to_owned())) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        match reply {
            Some(reply) => reply.materialize(url),
            None => Ok(Response::new(url, 404)),
        }
    }
}

impl HttpClient for MockHttpClient {
    async fn head(&self, url: &str, headers: &[(String, String)]) -> Result<Response> {
        self.reply(Method::Head, url, headers)
    }

    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<Response> {
        self.reply(Method::Get, url, headers)
    }
}
