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

//! The load driver: a fixed number of unthrottled request loops and a
//! running throughput report.

use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::log::{debug, error, info};
use crate::Error;

/// Port the server listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 8080;

/// The whole request: no headers, HTTP/1.0 so the server closes afterwards.
pub const REQUEST: &[u8] = b"GET / HTTP/1.0\r\n\r\n";

const BUFFER_SIZE: usize = 1 << 14;

/// Completed request cycles, shared by every worker.
#[derive(Debug, Default)]
pub struct RequestCounter(AtomicU64);

impl RequestCounter {
    pub fn new() -> RequestCounter {
        RequestCounter::default()
    }

    #[inline]
    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn snapshot(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Requests per second since the start, rounded to the nearest integer.
pub fn average_rate(count: u64, elapsed: Duration) -> u64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0;
    }
    (count as f64 / secs).round() as u64
}

/// One request cycle: connect, send [`REQUEST`], read until the server
/// closes. Returns the number of response bytes, which are discarded.
pub fn exchange(target: &SocketAddr, buffer: &mut [u8]) -> io::Result<u64> {
    let mut stream = TcpStream::connect(target)?;
    stream.set_nodelay(true)?;
    stream.write_all(REQUEST)?;

    let mut total = 0;
    loop {
        match stream.read(buffer) {
            Ok(0) => return Ok(total),
            Ok(n) => total += n as u64,
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
}

/// Settings of a [`LoadDriver`] run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    pub target: SocketAddr,
    pub concurrency: NonZeroUsize,
    /// How often the rate is reported.
    pub report_interval: Duration,
    /// Delay between starting two workers.
    pub stagger: Duration,
    /// Requests each worker sends before stopping; `None` runs forever.
    pub requests_per_worker: Option<u64>,
}

impl DriverConfig {
    pub fn new(concurrency: NonZeroUsize) -> DriverConfig {
        DriverConfig {
            target: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            concurrency,
            report_interval: Duration::from_secs(1),
            stagger: Duration::from_millis(1),
            requests_per_worker: None,
        }
    }

    pub fn with_target(mut self, target: SocketAddr) -> Self {
        self.target = target;
        self
    }

    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    pub fn with_requests_per_worker(mut self, requests: Option<u64>) -> Self {
        self.requests_per_worker = requests;
        self
    }
}

/// Drives `concurrency` request loops against one target and reports the
/// average rate since start on a fixed interval.
pub struct LoadDriver {
    config: DriverConfig,
    counter: Arc<RequestCounter>,
}

enum Event {
    Finished(usize, io::Result<()>),
    SpawnFailed(io::Error),
}

struct Worker {
    id: usize,
    target: SocketAddr,
    limit: Option<u64>,
    counter: Arc<RequestCounter>,
    stop: Arc<AtomicBool>,
}

impl Worker {
    fn run(self) -> io::Result<()> {
        let mut buffer = vec![0; BUFFER_SIZE];
        let mut done = 0;

        while !self.stop.load(Ordering::Relaxed) && self.limit.map_or(true, |limit| done < limit) {
            exchange(&self.target, &mut buffer)?;
            self.counter.increment();
            done += 1;
        }

        debug!("worker {} finished after {} requests", self.id, done);
        Ok(())
    }
}

impl LoadDriver {
    pub fn new(config: DriverConfig) -> LoadDriver {
        LoadDriver {
            config,
            counter: Arc::new(RequestCounter::new()),
        }
    }

    /// The counter the workers increment.
    pub fn counter(&self) -> Arc<RequestCounter> {
        self.counter.clone()
    }

    /// Runs the workers, calling `report` with the rounded average rate once
    /// per interval.
    ///
    /// Returns `Ok` once every worker has sent its capped number of requests;
    /// without a cap it only returns on failure. The first worker error stops
    /// the run: the other workers are told to stop and the error is returned
    /// right away, without waiting for workers stuck in blocking I/O.
    pub fn run<F: FnMut(u64)>(self, mut report: F) -> Result<(), Error> {
        let LoadDriver { config, counter } = self;
        let concurrency = config.concurrency.get();

        let start = Instant::now();
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel::<Event>();

        info!(
            "driving {} concurrent loops against {}",
            concurrency, config.target
        );

        // started off-thread: reports begin while workers are still staggered
        let launcher = {
            let target = config.target;
            let limit = config.requests_per_worker;
            let stagger = config.stagger;
            let counter = counter.clone();
            let stop = stop.clone();
            thread::Builder::new()
                .name("party-client-launcher".to_owned())
                .spawn(move || {
                    let mut handles = Vec::with_capacity(concurrency);
                    for id in 0..concurrency {
                        if stop.load(Ordering::Relaxed) {
                            break;
                        }
                        let worker = Worker {
                            id,
                            target,
                            limit,
                            counter: counter.clone(),
                            stop: stop.clone(),
                        };
                        let done = tx.clone();
                        let spawned = thread::Builder::new()
                            .name(format!("party-client-{}", id))
                            .spawn(move || {
                                let result = worker.run();
                                done.send(Event::Finished(id, result)).ok();
                            });
                        match spawned {
                            Ok(handle) => handles.push(handle),
                            Err(err) => {
                                tx.send(Event::SpawnFailed(err)).ok();
                                break;
                            }
                        }
                        thread::sleep(stagger);
                    }
                    handles
                })?
        };

        let mut finished = 0;
        let mut next_report = start + config.report_interval;
        loop {
            let timeout = next_report.saturating_duration_since(Instant::now());
            match rx.recv_timeout(timeout) {
                Ok(Event::Finished(_, Ok(()))) => {
                    finished += 1;
                    if finished == concurrency {
                        break;
                    }
                }
                Ok(Event::Finished(worker, Err(source))) => {
                    stop.store(true, Ordering::Relaxed);
                    error!("worker {} failed: {}", worker, source);
                    return Err(Error::Worker { worker, source });
                }
                Ok(Event::SpawnFailed(err)) => {
                    stop.store(true, Ordering::Relaxed);
                    error!("could not start a worker: {}", err);
                    return Err(err.into());
                }
                Err(RecvTimeoutError::Timeout) => {
                    report(average_rate(counter.snapshot(), start.elapsed()));
                    // a late tick is not made up for
                    let now = Instant::now();
                    next_report += config.report_interval;
                    if next_report <= now {
                        next_report = now + config.report_interval;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let handles = match launcher.join() {
            Ok(handles) => handles,
            Err(_) => {
                error!("launcher thread panicked");
                Vec::new()
            }
        };
        for handle in handles {
            handle.join().ok();
        }

        info!(
            "{} requests in {:.2}s",
            counter.snapshot(),
            start.elapsed().as_secs_f64()
        );
        Ok(())
    }
}
