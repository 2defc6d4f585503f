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

//! # party-bench
//!
//! A closed-loop throughput benchmark in two halves.
//!
//! The **load driver** ([`LoadDriver`]) runs a fixed number of threads, each
//! sending `GET / HTTP/1.0` to the server over a fresh connection, reading the
//! answer until the server closes, and starting over at once. Completed cycles
//! are counted in a shared [`RequestCounter`] and the average rate since start
//! is reported every second.
//!
//! The **barrier server** ([`party::serve`]) is a small blocking HTTP server
//! whose worker pool, connection limit and warm threads are all sized to the
//! same concurrency level `N`. Its only handler waits at an `N`-party
//! [`PartyBarrier`] before answering, so requests complete in lockstep batches
//! of `N`.
//!
//! ```no_run
//! use std::num::NonZeroUsize;
//! use party_bench::{party, Server, ServerConfig};
//!
//! let addr = "127.0.0.1:8080".parse().unwrap();
//! let n = NonZeroUsize::new(4).unwrap();
//! let listening = party::serve(Server::new(ServerConfig::new(addr)), addr, n).unwrap();
//! listening.join();
//! ```
//!
//! ```no_run
//! use std::num::NonZeroUsize;
//! use party_bench::{DriverConfig, LoadDriver};
//!
//! let config = DriverConfig::new(NonZeroUsize::new(4).unwrap());
//! LoadDriver::new(config).run(|rate| println!("{}", rate)).unwrap();
//! ```
#![forbid(unsafe_code)]

pub use crate::barrier::{BarrierWaitResult, PartyBarrier};
pub use crate::common::{HTTPVersion, Header, HeaderField, Method, StatusCode};
pub use crate::driver::{
    average_rate, exchange, DriverConfig, LoadDriver, RequestCounter, DEFAULT_PORT, REQUEST,
};
pub use crate::error::{Error, Result};
pub use crate::request::Request;
pub use crate::response::Response;
pub use crate::server::{Handler, HttpScaffold, Listening, Server, ServerConfig};
pub use crate::test::MockRequest;

mod barrier;
pub mod cli;
mod client;
mod common;
mod driver;
mod error;
mod log;
pub mod party;
mod request;
mod response;
mod server;
mod util;
