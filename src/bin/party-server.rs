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

use anyhow::Result;
use clap::Parser;
use log::info;
use party_bench::cli::ServerArgs;
use party_bench::{party, Server, ServerConfig};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = ServerArgs::parse();
    let addr = args.addr();

    let listening = party::serve(Server::new(ServerConfig::new(addr)), addr, args.concurrency)?;
    info!("party server ready on {}", listening.server_addr());

    listening.join();
    Ok(())
}
