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

//! Command line arguments of the two binaries.

use std::net::{Ipv4Addr, SocketAddr};
use std::num::NonZeroUsize;

use clap::Parser;

use crate::driver::DEFAULT_PORT;
use crate::Error;

/// Parses a concurrency level: a strictly positive integer.
pub fn parse_concurrency(value: &str) -> Result<NonZeroUsize, Error> {
    value
        .trim()
        .parse::<NonZeroUsize>()
        .map_err(|_| Error::InvalidArgument(format!("expected a positive integer, got {:?}", value)))
}

#[derive(Parser, Debug)]
#[command(name = "party-client")]
#[command(about = "Runs CONCURRENCY request loops against the party server and prints requests/s every second")]
pub struct ClientArgs {
    /// Number of concurrent request loops
    #[arg(value_parser = parse_concurrency)]
    pub concurrency: NonZeroUsize,

    /// Server port on the loopback interface
    #[arg(long, env = "PARTY_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Stop each loop after this many requests instead of running forever
    #[arg(long)]
    pub requests: Option<u64>,
}

impl ClientArgs {
    pub fn target(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, self.port))
    }
}

#[derive(Parser, Debug)]
#[command(name = "party-server")]
#[command(about = "Answers requests in lockstep batches of CONCURRENCY")]
pub struct ServerArgs {
    /// Number of requests that must meet at the barrier
    #[arg(value_parser = parse_concurrency)]
    pub concurrency: NonZeroUsize,

    /// Port to listen on (loopback only)
    #[arg(long, env = "PARTY_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

impl ServerArgs {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, self.port))
    }
}
