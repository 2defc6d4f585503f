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

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use socket2::{Domain, Socket, Type};

use crate::client::ClientConnection;
use crate::log::{debug, error, info, warn};
use crate::util::{ConnectionLimit, ConnectionPermit, TaskPool};
use crate::{Error, Request, Response};

/// Pause after a failed `accept`, e.g. when out of file descriptors.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Something that answers requests.
///
/// Handlers run on the worker threads and may block; a blocked handler keeps
/// its worker and its connection slot busy.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, request: &Request) -> Response;
}

impl<F> Handler for F
where
    F: Fn(&Request) -> Response + Send + Sync + 'static,
{
    fn handle(&self, request: &Request) -> Response {
        self(request)
    }
}

/// Concurrency and socket settings of a [`Server`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to listen on.
    pub addr: SocketAddr,
    /// Ceiling on worker threads.
    pub max_workers: usize,
    /// Connections admitted at once; further clients wait in the backlog.
    pub max_connections: usize,
    /// Worker threads started up front and kept alive when idle.
    pub min_spare_workers: usize,
    /// Depth of the OS accept queue.
    pub backlog: i32,
    /// Threads calling `accept` in parallel.
    pub acceptor_threads: usize,
    /// Idle time after which a worker above `min_spare_workers` exits.
    pub worker_idle_timeout: Duration,
    /// Read timeout on client sockets; `None` waits forever.
    pub read_timeout: Option<Duration>,
}

impl ServerConfig {
    /// A configuration with general purpose defaults.
    pub fn new(addr: SocketAddr) -> ServerConfig {
        ServerConfig {
            addr,
            max_workers: 200,
            max_connections: 10_000,
            min_spare_workers: 10,
            backlog: 128,
            acceptor_threads: 1,
            worker_idle_timeout: Duration::from_secs(5),
            read_timeout: Some(Duration::from_secs(10)),
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_min_spare_workers(mut self, min_spare_workers: usize) -> Self {
        self.min_spare_workers = min_spare_workers;
        self
    }

    pub fn with_backlog(mut self, backlog: i32) -> Self {
        self.backlog = backlog;
        self
    }

    pub fn with_acceptor_threads(mut self, acceptor_threads: usize) -> Self {
        self.acceptor_threads = acceptor_threads;
        self
    }

    pub fn with_worker_idle_timeout(mut self, timeout: Duration) -> Self {
        self.worker_idle_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }
}

/// The capabilities the barrier server needs from an HTTP server.
pub trait HttpScaffold {
    /// Handle returned once the server runs.
    type Running;

    fn configure(&mut self, config: ServerConfig);

    /// Routes every path starting with `path` to `handler`.
    fn register_handler(&mut self, path: &str, handler: Arc<dyn Handler>);

    fn start(self) -> Result<Self::Running, Error>;
}

/// Path-prefix routing table; the longest matching prefix wins.
#[derive(Default, Clone)]
struct Router {
    routes: Vec<(String, Arc<dyn Handler>)>,
}

impl Router {
    fn insert(&mut self, path: &str, handler: Arc<dyn Handler>) {
        self.routes.retain(|(prefix, _)| prefix != path);
        self.routes.push((path.to_owned(), handler));
        self.routes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    fn dispatch(&self, request: &Request) -> Response {
        let path = request.path();
        match self.routes.iter().find(|(prefix, _)| path.starts_with(prefix.as_str())) {
            Some((_, handler)) => handler.handle(request),
            None => Response::empty(404),
        }
    }
}

/// A blocking HTTP/1.x server: acceptor threads feed a bounded pool of
/// worker threads, one connection per worker.
///
/// ```no_run
/// use party_bench::{Response, Server, ServerConfig};
///
/// let config = ServerConfig::new("127.0.0.1:8080".parse().unwrap());
/// let listening = Server::new(config)
///     .route("/", |_: &party_bench::Request| Response::from_string("hello world"))
///     .start()
///     .unwrap();
/// listening.join();
/// ```
pub struct Server {
    config: ServerConfig,
    router: Router,
}

impl Server {
    pub fn new(config: ServerConfig) -> Server {
        Server {
            config,
            router: Router::default(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Registers `handler` for every path starting with `path`.
    pub fn route<H: Handler>(mut self, path: &str, handler: H) -> Server {
        self.router.insert(path, Arc::new(handler));
        self
    }

    /// Binds the listening socket and starts the acceptor and worker threads.
    pub fn start(self) -> Result<Listening, Error> {
        let Server { config, router } = self;

        let listener = bind(config.addr, config.backlog)
            .map_err(|source| Error::Bind { addr: config.addr, source })?;
        let local_addr = listener.local_addr()?;

        let pool = Arc::new(TaskPool::new(
            config.min_spare_workers,
            config.max_workers,
            config.worker_idle_timeout,
        ));
        let limit = ConnectionLimit::new(config.max_connections);
        let router = Arc::new(router);

        let mut acceptors = Vec::with_capacity(config.acceptor_threads.max(1));
        for id in 0..config.acceptor_threads.max(1) {
            let acceptor = Acceptor {
                listener: listener.try_clone()?,
                pool: pool.clone(),
                limit: limit.clone(),
                router: router.clone(),
                read_timeout: config.read_timeout,
            };
            let handle = thread::Builder::new()
                .name(format!("party-http-acceptor-{}", id))
                .spawn(move || acceptor.run())?;
            acceptors.push(handle);
        }

        info!(
            "listening on {} (workers {}..={}, connections {}, backlog {}, acceptors {})",
            local_addr,
            config.min_spare_workers,
            config.max_workers,
            config.max_connections,
            config.backlog,
            acceptors.len()
        );

        Ok(Listening {
            addr: local_addr,
            acceptors,
            pool,
            limit,
        })
    }
}

impl HttpScaffold for Server {
    type Running = Listening;

    fn configure(&mut self, config: ServerConfig) {
        self.config = config;
    }

    fn register_handler(&mut self, path: &str, handler: Arc<dyn Handler>) {
        self.router.insert(path, handler);
    }

    fn start(self) -> Result<Listening, Error> {
        Server::start(self)
    }
}

/// A running [`Server`]. There is no shutdown: the threads live as long as
/// the process.
pub struct Listening {
    addr: SocketAddr,
    acceptors: Vec<JoinHandle<()>>,
    pool: Arc<TaskPool>,
    limit: Arc<ConnectionLimit>,
}

impl Listening {
    /// Returns the address the server is listening to.
    pub fn server_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the number of accepted connections still open. Slots reserved
    /// by acceptors waiting in `accept` are not counted.
    pub fn num_connections(&self) -> usize {
        self.limit.admitted()
    }

    /// Returns the number of worker threads alive.
    pub fn num_workers(&self) -> usize {
        self.pool.active_threads()
    }

    /// Blocks the calling thread for as long as the server runs.
    pub fn join(self) {
        for acceptor in self.acceptors {
            if acceptor.join().is_err() {
                error!("acceptor thread panicked");
            }
        }
    }
}

fn bind(addr: SocketAddr, backlog: i32) -> std::io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;
    Ok(socket.into())
}

struct Acceptor {
    listener: TcpListener,
    pool: Arc<TaskPool>,
    limit: Arc<ConnectionLimit>,
    router: Arc<Router>,
    read_timeout: Option<Duration>,
}

impl Acceptor {
    fn run(self) {
        loop {
            // taken before accepting: past the limit clients queue in the backlog
            let mut permit = self.limit.acquire();

            let (socket, peer) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!("accept failed: {}", err);
                    drop(permit);
                    thread::sleep(ACCEPT_ERROR_BACKOFF);
                    continue;
                }
            };
            permit.admit();
            debug!("accepted connection from {}", peer);

            let router = self.router.clone();
            let read_timeout = self.read_timeout;
            self.pool.spawn(Box::new(move || {
                serve_connection(socket, &router, read_timeout, permit)
            }));
        }
    }
}

fn serve_connection(
    socket: TcpStream,
    router: &Router,
    read_timeout: Option<Duration>,
    _permit: ConnectionPermit,
) {
    socket.set_nodelay(true).ok();
    if let Err(err) = socket.set_read_timeout(read_timeout) {
        warn!("could not set read timeout: {}", err);
    }

    let mut connection = match ClientConnection::new(socket) {
        Ok(connection) => connection,
        Err(err) => {
            warn!("dropping connection: {}", err);
            return;
        }
    };

    while let Some(request) = connection.next() {
        let response = router.dispatch(&request);
        if let Err(err) = connection.respond(&request, response) {
            debug!("error while sending response: {}", err);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Router, ServerConfig};
    use crate::{MockRequest, Request, Response};
    use std::sync::Arc;

    fn named(name: &'static str) -> Arc<dyn super::Handler> {
        Arc::new(move |_: &Request| Response::from_string(name))
    }

    #[test]
    fn longest_prefix_wins() {
        let mut router = Router::default();
        router.insert("/", named("root"));
        router.insert("/party", named("party"));

        let request: Request = MockRequest::new().with_path("/party/4").into();
        assert_eq!(router.dispatch(&request).data(), b"party");

        let request: Request = MockRequest::new().with_path("/other").into();
        assert_eq!(router.dispatch(&request).data(), b"root");
    }

    #[test]
    fn unrouted_paths_are_not_found() {
        let mut router = Router::default();
        router.insert("/party", named("party"));
        let request: Request = MockRequest::new().with_path("/").into();
        assert_eq!(router.dispatch(&request).status_code().as_u16(), 404);
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = ServerConfig::new("127.0.0.1:0".parse().unwrap())
            .with_max_workers(4)
            .with_backlog(1 << 14);
        assert_eq!(config.max_workers, 4);
        assert_eq!(config.backlog, 16384);
        assert_eq!(config.max_connections, 10_000);
    }
}
