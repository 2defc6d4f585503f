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

use std::io::{self, BufRead, BufReader, BufWriter, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};

use crate::common::{HTTPVersion, Header, Method};
use crate::request::new_request;
use crate::{Request, Response};

/// Longest request line or header line accepted, CRLF included.
const MAX_LINE_LENGTH: u64 = 8 * 1024;
const MAX_HEADERS: usize = 100;
/// Bodies are read fully before the handler runs, so they are capped.
const MAX_BODY_LENGTH: usize = 1024 * 1024;

/// A ClientConnection is an object that will store a socket to a client
/// and return Request objects.
pub struct ClientConnection {
    // address of the client
    remote_addr: Option<SocketAddr>,

    // read half of the stream
    source: BufReader<TcpStream>,

    // write half of the stream; responses are written in request order since
    // a connection is served by a single thread
    sink: BufWriter<TcpStream>,

    // set to true if we know that the previous request is the last one
    no_more_requests: bool,
}

/// Error that can happen when reading a request.
#[derive(Debug)]
enum ReadError {
    WrongRequestLine,
    WrongHeader(HTTPVersion),

    /// the client sent an unrecognized `Expect` header
    ExpectationFailed(HTTPVersion),

    BodyTooLarge(HTTPVersion),

    /// a `Transfer-Encoding` other than `chunked`
    UnsupportedEncoding(HTTPVersion),

    ReadIoError(io::Error),
}

impl ClientConnection {
    /// Creates a new `ClientConnection` that takes ownership of the `TcpStream`.
    pub fn new(socket: TcpStream) -> io::Result<ClientConnection> {
        let remote_addr = socket.peer_addr().ok();
        let write_socket = socket.try_clone()?;

        Ok(ClientConnection {
            remote_addr,
            source: BufReader::with_capacity(1024, socket),
            sink: BufWriter::with_capacity(1024, write_socket),
            no_more_requests: false,
        })
    }

    /// Reads the next line from the source, without its line terminator.
    ///
    /// A bare `LF` is accepted as well as `CRLF`.
    fn read_next_line(&mut self) -> io::Result<String> {
        let mut buf = Vec::new();
        let read = (&mut self.source)
            .take(MAX_LINE_LENGTH)
            .read_until(b'\n', &mut buf)?;

        if read == 0 {
            return Err(io::Error::new(ErrorKind::UnexpectedEof, "connection closed"));
        }

        if buf.last() != Some(&b'\n') {
            return Err(if read as u64 >= MAX_LINE_LENGTH {
                io::Error::new(ErrorKind::InvalidData, "line too long")
            } else {
                io::Error::new(ErrorKind::UnexpectedEof, "connection closed mid-line")
            });
        }

        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }

        String::from_utf8(buf).map_err(|_| io::Error::new(ErrorKind::InvalidData, "non UTF-8 line"))
    }

    /// Reads a request from the stream.
    /// Blocks until the header and the body have been read.
    fn read(&mut self) -> Result<Request, ReadError> {
        let line = self.read_next_line().map_err(ReadError::ReadIoError)?;
        let (method, path, version) = parse_request_line(line.trim())?;

        // getting all headers
        let mut headers: Vec<Header> = Vec::new();
        loop {
            let line = self.read_next_line().map_err(ReadError::ReadIoError)?;

            if line.trim().is_empty() {
                break;
            }
            if headers.len() == MAX_HEADERS {
                return Err(ReadError::WrongHeader(version));
            }
            headers.push(
                line.parse()
                    .map_err(|_| ReadError::WrongHeader(version))?,
            );
        }

        // true if the client sent a `Expect: 100-continue` header
        match headers.iter().find(|h| h.field.equiv("Expect")) {
            None => {}
            Some(h) if h.value.as_str().eq_ignore_ascii_case("100-continue") => {
                self.sink
                    .write_all(b"HTTP/1.1 100 Continue\r\n\r\n")
                    .and_then(|_| self.sink.flush())
                    .map_err(ReadError::ReadIoError)?;
            }
            Some(_) => return Err(ReadError::ExpectationFailed(version)),
        }

        let body = self.read_body(&headers, version)?;

        Ok(new_request(
            method,
            path,
            version,
            headers,
            self.remote_addr,
            body,
        ))
    }

    fn read_body(&mut self, headers: &[Header], version: HTTPVersion) -> Result<Vec<u8>, ReadError> {
        // if transfer-encoding is specified, the Content-Length
        //  header must be ignored (RFC2616 #4.4)
        if let Some(encoding) = headers.iter().find(|h| h.field.equiv("Transfer-Encoding")) {
            if !encoding.value.as_str().eq_ignore_ascii_case("chunked") {
                return Err(ReadError::UnsupportedEncoding(version));
            }

            let mut body = Vec::new();
            chunked_transfer::Decoder::new(&mut self.source)
                .take(MAX_BODY_LENGTH as u64 + 1)
                .read_to_end(&mut body)
                .map_err(ReadError::ReadIoError)?;

            if body.len() > MAX_BODY_LENGTH {
                return Err(ReadError::BodyTooLarge(version));
            }
            return Ok(body);
        }

        let content_length = match headers.iter().find(|h| h.field.equiv("Content-Length")) {
            None => 0,
            Some(h) => h
                .value
                .as_str()
                .trim()
                .parse::<usize>()
                .map_err(|_| ReadError::WrongHeader(version))?,
        };

        if content_length > MAX_BODY_LENGTH {
            return Err(ReadError::BodyTooLarge(version));
        }

        let mut body = vec![0; content_length];
        self.source
            .read_exact(&mut body)
            .map_err(ReadError::ReadIoError)?;
        Ok(body)
    }

    /// Writes `response` as the answer to `request`.
    ///
    /// The `Connection` header reflects whether another request will be read
    /// from this connection.
    pub fn respond(&mut self, request: &Request, response: Response) -> io::Result<()> {
        let do_not_send_body = *request.method() == Method::Head;
        response.raw_print(
            &mut self.sink,
            request.http_version(),
            do_not_send_body,
            !self.no_more_requests,
        )
    }

    /// Answers a request that could not be read and marks the connection as
    /// finished, since we don't know where the next request would start.
    fn reject(&mut self, status: u16, version: HTTPVersion) {
        self.no_more_requests = true;
        Response::empty(status)
            .raw_print(&mut self.sink, version, false, false)
            .ok();
    }
}

impl Iterator for ClientConnection {
    type Item = Request;

    /// Blocks until the next Request is available.
    /// Returns None when no new Requests will come from the client.
    fn next(&mut self) -> Option<Request> {
        // the client sent a "connection: close" header in this previous request
        //  or is using HTTP 1.0, meaning that no new request will come
        if self.no_more_requests {
            return None;
        }

        loop {
            let rq = match self.read() {
                Err(ReadError::WrongRequestLine) => {
                    self.reject(400, HTTPVersion(1, 1));
                    return None;
                }

                Err(ReadError::WrongHeader(ver)) => {
                    self.reject(400, ver);
                    return None;
                }

                Err(ReadError::ExpectationFailed(ver)) => {
                    self.reject(417, ver);
                    return None;
                }

                Err(ReadError::BodyTooLarge(ver)) => {
                    self.reject(413, ver);
                    return None;
                }

                Err(ReadError::UnsupportedEncoding(ver)) => {
                    self.reject(501, ver);
                    return None;
                }

                Err(ReadError::ReadIoError(ref err))
                    if err.kind() == ErrorKind::TimedOut || err.kind() == ErrorKind::WouldBlock =>
                {
                    // request timeout
                    self.reject(408, HTTPVersion(1, 1));
                    return None;
                }

                Err(ReadError::ReadIoError(ref err)) if err.kind() == ErrorKind::InvalidData => {
                    self.reject(400, HTTPVersion(1, 1));
                    return None;
                }

                Err(ReadError::ReadIoError(_)) => return None,

                Ok(rq) => rq,
            };

            // checking HTTP version
            if rq.http_version() > HTTPVersion(1, 1) {
                let response =
                    Response::from_string("This server only supports HTTP versions 1.0 and 1.1")
                        .with_status_code(505);
                response
                    .raw_print(&mut self.sink, HTTPVersion(1, 1), false, false)
                    .ok();
                self.no_more_requests = true;
                return None;
            }

            // updating the status of the connection
            let tokens: Vec<String> = rq
                .header("Connection")
                .map(|h| {
                    h.value
                        .as_str()
                        .split(',')
                        .map(|t| t.trim().to_ascii_lowercase())
                        .collect()
                })
                .unwrap_or_default();
            let has = |token: &str| tokens.iter().any(|t| t == token);

            if has("close") || has("upgrade") {
                self.no_more_requests = true;
            } else if rq.http_version() == HTTPVersion(1, 0) && !has("keep-alive") {
                self.no_more_requests = true;
            }

            // returning the request
            return Some(rq);
        }
    }
}

impl Drop for ClientConnection {
    fn drop(&mut self) {
        // flushing and half-closing so the peer sees the end of the response
        self.sink.flush().ok();
        self.sink.get_ref().shutdown(Shutdown::Write).ok();
    }
}

/// Parses a "HTTP/1.1" string.
fn parse_http_version(version: &str) -> Result<HTTPVersion, ReadError> {
    let (major, minor) = match version {
        "HTTP/0.9" => (0, 9),
        "HTTP/1.0" => (1, 0),
        "HTTP/1.1" => (1, 1),
        "HTTP/2.0" => (2, 0),
        "HTTP/3.0" => (3, 0),
        _ => return Err(ReadError::WrongRequestLine),
    };

    Ok(HTTPVersion(major, minor))
}

/// Parses the request line of the request.
/// eg. GET / HTTP/1.1
fn parse_request_line(line: &str) -> Result<(Method, String, HTTPVersion), ReadError> {
    let mut parts = line.split_whitespace();

    let (method, path, version) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(p), Some(v), None) => (m, p, v),
        _ => return Err(ReadError::WrongRequestLine),
    };

    let method = method.parse().map_err(|_| ReadError::WrongRequestLine)?;
    let version = parse_http_version(version)?;

    Ok((method, path.to_owned(), version))
}

#[cfg(test)]
mod test {
    use crate::{HTTPVersion, Method};

    #[test]
    fn test_parse_request_line() {
        let (method, path, ver) = super::parse_request_line("GET /hello HTTP/1.1").unwrap();

        assert!(method == Method::Get);
        assert!(path == "/hello");
        assert!(ver == HTTPVersion(1, 1));

        assert!(super::parse_request_line("GET /hello").is_err());
        assert!(super::parse_request_line("qsd qsd qsd").is_err());
        assert!(super::parse_request_line("GET / HTTP/1.0 extra").is_err());
    }

    #[test]
    fn test_parse_minimal_request_line() {
        let (method, path, ver) = super::parse_request_line("GET / HTTP/1.0").unwrap();
        assert_eq!(method, Method::Get);
        assert_eq!(path, "/");
        assert_eq!(ver, HTTPVersion(1, 0));
    }
}
