use std::future::Future;
use std::sync::Arc;

use crate::data::Response;
use crate::error::Result;

/// Asynchronous HTTP client abstraction.
///
/// Implementations return only after the whole response body has been read,
/// so a connection is never left half-consumed in the pool.
///
/// # Implementations
///
/// - [`ReqwestClient`]: Production implementation using `reqwest`
/// - [`RetryingClient`](crate::RetryingClient): Bounded retry around any client
/// - [`MockHttpClient`](crate::mock::MockHttpClient): Scripted responses for tests
pub trait HttpClient: Send + Sync {
    /// Issue a `HEAD` request.
    ///
    /// # Errors
    ///
    /// Returns an error if no response was received. HTTP error statuses are
    /// returned as a normal [`Response`].
    fn head(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = Result<Response>> + Send;

    /// Issue a `GET` request and drain its body.
    ///
    /// # Errors
    ///
    /// Returns an error if no response was received or the body transfer
    /// broke off. HTTP error statuses are returned as a normal [`Response`].
    fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = Result<Response>> + Send;
}

impl<C: HttpClient> HttpClient for Arc<C> {
    fn head(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = Result<Response>> + Send {
        (**self).head(url, headers)
    }

    fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = Result<Response>> + Send {
        (**self).get(url, headers)
    }
}

#[cfg(feature = "reqwest")]
mod reqwest_client {
    use super::*;
    use crate::data::{FetchOptions, Headers};
    use crate::error::FetchError;

    /// Production HTTP client implementation using reqwest.
    ///
    /// One instance owns one connection pool; clone the surrounding `Arc`
    /// rather than building a second client for the same hosts.
    pub struct ReqwestClient {
        client: reqwest::Client,
    }

    impl ReqwestClient {
        pub fn new(options: &FetchOptions) -> Result<Self> {
            let client = reqwest::Client::builder()
                .user_agent(options.user_agent.clone())
                .timeout(options.timeout)
                .build()
                .map_err(|e| FetchError::ClientBuild(e.to_string()))?;
            Ok(Self { client })
        }

        async fn send(
            &self,
            mut request: reqwest::RequestBuilder,
            url: &str,
            headers: &[(String, String)],
        ) -> Result<Response> {
            for (key, value) in headers {
                request = request.header(key.as_str(), value.as_str());
            }

            let response = request.send().await.map_err(|e| map_error(url, e))?;
            let status = response.status().as_u16();
            let headers: Headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value.to_str().ok().map(|v| (name.as_str(), v.to_owned()))
                })
                .collect();
            // Reading to the end hands the connection back to the pool.
            let body = response.bytes().await.map_err(|e| map_error(url, e))?;

            Ok(Response {
                url: url.to_owned(),
                status,
                headers,
                body,
            })
        }
    }

    impl HttpClient for ReqwestClient {
        async fn head(&self, url: &str, headers: &[(String, String)]) -> Result<Response> {
            self.send(self.client.head(url), url, headers).await
        }

        async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<Response> {
            self.send(self.client.get(url), url, headers).await
        }
    }

    fn map_error(url: &str, err: reqwest::Error) -> FetchError {
        let url = url.to_owned();
        if err.is_timeout() {
            FetchError::Timeout { url }
        } else if err.is_connect() || err.is_request() {
            FetchError::Connect {
                url,
                message: err.to_string(),
            }
        } else if err.is_body() || err.is_decode() {
            FetchError::Body {
                url,
                message: err.to_string(),
            }
        } else if err.is_builder() {
            FetchError::InvalidUrl(url)
        } else {
            FetchError::Request {
                url,
                message: err.to_string(),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn builds_with_default_options() {
            assert!(ReqwestClient::new(&FetchOptions::default()).is_ok());
        }

        #[tokio::test]
        async fn invalid_url_is_not_transient() {
            let client = ReqwestClient::new(&FetchOptions::default()).unwrap();
            let err = client.get("not a url", &[]).await.unwrap_err();
            assert!(!err.is_transient());
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_client::ReqwestClient;
