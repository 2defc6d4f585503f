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

use std::io::{self, Write};

use anyhow::Result;
use clap::Parser;
use log::info;
use party_bench::cli::ClientArgs;
use party_bench::{DriverConfig, LoadDriver};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = ClientArgs::parse();
    info!("party client: {} loops against {}", args.concurrency, args.target());

    let config = DriverConfig::new(args.concurrency)
        .with_target(args.target())
        .with_requests_per_worker(args.requests);

    let stdout = io::stdout();
    LoadDriver::new(config).run(|rate| {
        let mut out = stdout.lock();
        writeln!(out, "{}", rate).and_then(|_| out.flush()).ok();
    })?;

    Ok(())
}
