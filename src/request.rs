// Copyright 2026 The party-bench Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//	http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::net::SocketAddr;

use crate::{HTTPVersion, Header, Method};

/// Represents an HTTP request made by a client.
///
/// A `Request` is produced by the connection that read it and is handed by
/// reference to the registered [`Handler`](crate::Handler). The body has
/// already been read off the socket, so handlers never touch the stream.
#[derive(Debug)]
pub struct Request {
    method: Method,
    url: String,
    http_version: HTTPVersion,
    headers: Vec<Header>,
    remote_addr: Option<SocketAddr>,
    body: Vec<u8>,
}

pub(crate) fn new_request(
    method: Method,
    url: String,
    http_version: HTTPVersion,
    headers: Vec<Header>,
    remote_addr: Option<SocketAddr>,
    body: Vec<u8>,
) -> Request {
    Request {
        method,
        url,
        http_version,
        headers,
        remote_addr,
        body,
    }
}

impl Request {
    /// Returns the method requested by the client (eg. `GET`, `POST`, etc.).
    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the resource requested by the client.
    #[inline]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the path part of the url, without the query string.
    pub fn path(&self) -> &str {
        match self.url.find('?') {
            Some(idx) => &self.url[..idx],
            None => &self.url,
        }
    }

    /// Returns a list of all headers sent by the client.
    #[inline]
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// Returns the first header matching `field`, ignoring case.
    pub fn header(&self, field: &str) -> Option<&Header> {
        self.headers.iter().find(|h| h.field.equiv(field))
    }

    /// Returns the HTTP version of the request.
    #[inline]
    pub fn http_version(&self) -> HTTPVersion {
        self.http_version
    }

    /// Returns the address of the client that sent this request.
    #[inline]
    pub fn remote_addr(&self) -> Option<&SocketAddr> {
        self.remote_addr.as_ref()
    }

    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    #[inline]
    pub fn body_length(&self) -> usize {
        self.body.len()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Method, MockRequest, Request};

    #[test]
    fn path_strips_query_string() {
        let request: Request = MockRequest::new().with_path("/party?size=4").into();
        assert_eq!(request.url(), "/party?size=4");
        assert_eq!(request.path(), "/party");
        assert_eq!(request.method(), &Method::Get);
    }

    #[test]
    fn header_lookup_ignores_case() {
        let request: Request = MockRequest::new()
            .with_header("Connection: close".parse().unwrap())
            .into();
        let header = request.header("connection").unwrap();
        assert_eq!(header.value.as_str(), "close");
        assert!(request.header("upgrade").is_none());
    }
}
