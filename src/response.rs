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

use crate::common::{HTTPVersion, Header, StatusCode};
use ascii::AsciiString;
use std::io::{Result as IoResult, Write};
use std::time::SystemTime;

/// Object representing an HTTP response.
///
/// The body is held in memory: every response this crate produces is small
/// and fully known before it is written.
#[derive(Debug, Clone)]
pub struct Response {
    status_code: StatusCode,
    headers: Vec<Header>,
    data: Vec<u8>,
}

/// Builds the header that goes with `field`, which must be ASCII.
fn header(field: &'static str, value: &str) -> Option<Header> {
    Some(Header {
        field: field.parse().ok()?,
        value: AsciiString::from_ascii(value).ok()?,
    })
}

impl Response {
    /// Creates a new Response object.
    pub fn new(status_code: StatusCode, headers: Vec<Header>, data: Vec<u8>) -> Response {
        Response {
            status_code,
            headers,
            data,
        }
    }

    /// Builds a response with a `200` status code and `data` as body.
    pub fn from_data<D: Into<Vec<u8>>>(data: D) -> Response {
        Response::new(StatusCode(200), Vec::new(), data.into())
    }

    /// Builds a `text/plain` response with a `200` status code.
    pub fn from_string<S: Into<String>>(data: S) -> Response {
        let response = Response::from_data(data.into().into_bytes());
        match header("Content-Type", "text/plain; charset=UTF-8") {
            Some(h) => response.with_header(h),
            None => response,
        }
    }

    /// Builds an empty `Response` with the given status code.
    pub fn empty<S: Into<StatusCode>>(status_code: S) -> Response {
        Response::new(status_code.into(), Vec::new(), Vec::new())
    }

    /// Returns the same response, but with an additional header.
    pub fn with_header(mut self, header: Header) -> Response {
        self.headers.push(header);
        self
    }

    /// Returns the same response, but with a different status code.
    pub fn with_status_code<S: Into<StatusCode>>(mut self, code: S) -> Response {
        self.status_code = code.into();
        self
    }

    #[inline]
    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    #[inline]
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Cleans-up the headers so that they can be returned.
    ///
    /// Framing headers are owned by the server: anything the handler set for
    /// `Connection`, `Content-Length` or `Transfer-Encoding` is dropped.
    fn purify_headers(&mut self, keep_alive: bool) {
        self.headers.retain(|h| {
            !h.field.equiv("Connection")
                && !h.field.equiv("Content-Length")
                && !h.field.equiv("Transfer-Encoding")
        });

        let mut added = Vec::with_capacity(4);
        if !self.headers.iter().any(|h| h.field.equiv("Server")) {
            added.extend(header("Server", "party-bench (Rust)"));
        }
        if !self.headers.iter().any(|h| h.field.equiv("Date")) {
            added.extend(header("Date", &httpdate::fmt_http_date(SystemTime::now())));
        }
        added.extend(header("Content-Length", &self.data.len().to_string()));
        added.extend(header(
            "Connection",
            if keep_alive { "keep-alive" } else { "close" },
        ));

        self.headers.extend(added);
    }

    /// Prints the HTTP response to a writer.
    ///
    /// `http_version` is the version of the request being answered; the
    /// response never claims a newer one than the client spoke. When
    /// `do_not_send_body` is set (`HEAD` requests) only the headers go out.
    pub fn raw_print<W: Write>(
        mut self,
        mut writer: W,
        http_version: HTTPVersion,
        do_not_send_body: bool,
        keep_alive: bool,
    ) -> IoResult<()> {
        self.purify_headers(keep_alive);

        let version = std::cmp::min(http_version, HTTPVersion(1, 1));

        write!(
            writer,
            "HTTP/{} {} {}\r\n",
            version,
            self.status_code.as_u16(),
            self.status_code.default_reason_phrase()
        )?;

        for header in &self.headers {
            write!(writer, "{}\r\n", header)?;
        }

        // separator between header and data
        writer.write_all(b"\r\n")?;

        if !do_not_send_body {
            writer.write_all(&self.data)?;
        }

        writer.flush()
    }
}
