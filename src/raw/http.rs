// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use http::HeaderMap;
use http::Request;
use http::Response;

use crate::*;

/// BoxedFuture is the type alias of [`futures::future::BoxFuture`].
pub type BoxedFuture<'a, T> = futures::future::BoxFuture<'a, T>;

/// HttpFetch is the trait to fetch an http request and return a response.
///
/// The outbound probe implements this trait around any other implementor,
/// which is how instrumentation is inserted into a client's handler chain.
pub trait HttpFetch: Send + Sync + Unpin + 'static {
    /// Fetch a request in async way.
    fn fetch(
        &self,
        req: Request<Bytes>,
    ) -> impl Future<Output = Result<Response<Bytes>>> + Send;
}

/// HttpFetchDyn is the dyn version of [`HttpFetch`]
/// which make it possible to use as `Arc<dyn HttpFetchDyn>`.
/// User should never implement this trait, but use `HttpFetch` instead.
pub trait HttpFetchDyn: Send + Sync + Unpin + 'static {
    /// The dyn version of [`HttpFetch::fetch`].
    ///
    /// This function returns a boxed future to make it object safe.
    fn fetch_dyn(&self, req: Request<Bytes>) -> BoxedFuture<'_, Result<Response<Bytes>>>;
}

impl<T: HttpFetch + ?Sized> HttpFetchDyn for T {
    fn fetch_dyn(&self, req: Request<Bytes>) -> BoxedFuture<'_, Result<Response<Bytes>>> {
        Box::pin(self.fetch(req))
    }
}

impl<T: HttpFetchDyn + ?Sized> HttpFetch for Arc<T> {
    async fn fetch(&self, req: Request<Bytes>) -> Result<Response<Bytes>> {
        self.as_ref().fetch_dyn(req).await
    }
}

impl HttpFetch for reqwest::Client {
    async fn fetch(&self, req: Request<Bytes>) -> Result<Response<Bytes>> {
        let (parts, body) = req.into_parts();

        let url = reqwest::Url::parse(&parts.uri.to_string()).map_err(|err| {
            Error::new(ErrorKind::InvalidInput, "request uri is invalid")
                .with_operation("HttpFetch::fetch")
                .set_source(err)
        })?;

        let resp = self
            .request(parts.method, url)
            .headers(parts.headers)
            .body(body)
            .send()
            .await
            .map_err(new_reqwest_error)?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let bs = resp.bytes().await.map_err(new_reqwest_error)?;

        let mut response = Response::new(bs);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

fn new_reqwest_error(err: reqwest::Error) -> Error {
    let kind = if err.is_timeout() {
        ErrorKind::TimedOut
    } else if err.is_connect() {
        ErrorKind::ConnectionFailed
    } else {
        ErrorKind::Unexpected
    };

    Error::new(kind, "send http request")
        .with_operation("HttpFetch::fetch")
        .set_source(err)
}

/// HttpClient is a type erased client that can fetch http requests through
/// any [`HttpFetch`] implementation.
#[derive(Clone)]
pub struct HttpClient {
    fetcher: Arc<dyn HttpFetchDyn>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient").finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Create a new http client backed by reqwest.
    pub fn new() -> Result<Self> {
        let client = reqwest::ClientBuilder::new().build().map_err(|err| {
            Error::new(ErrorKind::Unexpected, "build http client")
                .with_operation("HttpClient::new")
                .set_source(err)
        })?;

        Ok(Self::with(client))
    }

    /// Build an http client with a given fetcher.
    pub fn with(fetcher: impl HttpFetch) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
        }
    }

    /// Send a request and wait for its fully buffered response.
    pub async fn send(&self, req: Request<Bytes>) -> Result<Response<Bytes>> {
        self.fetcher.fetch_dyn(req).await
    }
}

/// Parse Content-Length from a header map.
pub fn parse_content_length(headers: &HeaderMap) -> Result<Option<u64>> {
    match headers.get(CONTENT_LENGTH) {
        None => Ok(None),
        Some(v) => Ok(Some(
            v.to_str()
                .map_err(|e| {
                    Error::new(
                        ErrorKind::InvalidInput,
                        "header value has to be valid utf-8 string",
                    )
                    .with_operation("parse_content_length")
                    .set_source(e)
                })?
                .parse::<u64>()
                .map_err(|e| {
                    Error::new(ErrorKind::InvalidInput, "header value has to be valid integer")
                        .with_operation("parse_content_length")
                        .set_source(e)
                })?,
        )),
    }
}
