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

//! The barrier server: every batch of concurrently admitted requests has to
//! rendezvous before any of them is answered.

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::log::info;
use crate::{Error, Handler, HttpScaffold, PartyBarrier, Request, Response, ServerConfig};

/// Listen backlog, comfortably above any concurrency level we run with so
/// surplus connection attempts queue in the kernel rather than fail.
pub const BACKLOG: i32 = 1 << 14;

/// Acceptor threads; enough that accepting never becomes the bottleneck.
pub const ACCEPTOR_THREADS: usize = 4;

/// Sizes every concurrency knob of the server to `concurrency`.
pub fn server_config(addr: SocketAddr, concurrency: NonZeroUsize) -> ServerConfig {
    let n = concurrency.get();
    ServerConfig::new(addr)
        .with_max_workers(n)
        .with_max_connections(n)
        .with_min_spare_workers(n)
        .with_backlog(BACKLOG)
        .with_acceptor_threads(ACCEPTOR_THREADS)
}

/// Waits at `barrier`, then answers with an empty `200`.
pub fn barrier_handler(barrier: Arc<PartyBarrier>) -> impl Handler {
    move |_: &Request| {
        barrier.wait();
        Response::empty(200)
    }
}

/// Configures `scaffold` for `concurrency` parties, routes every path to the
/// barrier handler and starts it.
pub fn serve<S: HttpScaffold>(
    mut scaffold: S,
    addr: SocketAddr,
    concurrency: NonZeroUsize,
) -> Result<S::Running, Error> {
    let barrier = Arc::new(PartyBarrier::new(concurrency.get()));

    scaffold.configure(server_config(addr, concurrency));
    scaffold.register_handler("/", Arc::new(barrier_handler(barrier)));

    info!("party of {} on {}", concurrency, addr);
    scaffold.start()
}

#[cfg(test)]
mod tests {
    use super::{barrier_handler, serve, ACCEPTOR_THREADS, BACKLOG};
    use crate::{Error, Handler, HttpScaffold, MockRequest, PartyBarrier, Request, ServerConfig};
    use std::num::NonZeroUsize;
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingScaffold {
        config: Option<ServerConfig>,
        routes: Vec<(String, Arc<dyn Handler>)>,
    }

    impl HttpScaffold for RecordingScaffold {
        type Running = RecordingScaffold;

        fn configure(&mut self, config: ServerConfig) {
            self.config = Some(config);
        }

        fn register_handler(&mut self, path: &str, handler: Arc<dyn Handler>) {
            self.routes.push((path.to_owned(), handler));
        }

        fn start(self) -> Result<RecordingScaffold, Error> {
            Ok(self)
        }
    }

    #[test]
    fn knobs_are_sized_to_the_party() {
        let addr = "127.0.0.1:8080".parse().unwrap();
        let running = serve(RecordingScaffold::default(), addr, NonZeroUsize::new(7).unwrap())
            .unwrap();

        let config = running.config.unwrap();
        assert_eq!(config.addr, addr);
        assert_eq!(config.max_workers, 7);
        assert_eq!(config.max_connections, 7);
        assert_eq!(config.min_spare_workers, 7);
        assert_eq!(config.backlog, BACKLOG);
        assert_eq!(config.acceptor_threads, ACCEPTOR_THREADS);

        assert_eq!(running.routes.len(), 1);
        assert_eq!(running.routes[0].0, "/");
    }

    #[test]
    fn party_of_one_answers_immediately() {
        let addr = "127.0.0.1:8080".parse().unwrap();
        let running = serve(RecordingScaffold::default(), addr, NonZeroUsize::new(1).unwrap())
            .unwrap();

        let request: Request = MockRequest::new().into();
        let response = running.routes[0].1.handle(&request);
        assert_eq!(response.status_code().as_u16(), 200);
        assert!(response.data().is_empty());
    }

    #[test]
    fn handler_counts_generations() {
        let barrier = Arc::new(PartyBarrier::new(1));
        let handler = barrier_handler(barrier.clone());
        let request: Request = MockRequest::new().into();
        for _ in 0..3 {
            handler.handle(&request);
        }
        assert_eq!(barrier.generation(), 3);
    }
}
