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

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use crate::log::error;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Manages a collection of threads.
///
/// `min_threads` threads are started right away and never exit. A new thread
/// is created every time all the existing threads are busy, up to
/// `max_threads`; past the ceiling jobs wait in the queue. Threads above the
/// minimum exit after `idle_timeout` without work.
pub struct TaskPool {
    sharing: Arc<Sharing>,
}

struct Sharing {
    // list of the tasks to be done by worker threads, plus the number of
    // threads currently parked waiting for one
    todo: Mutex<Queue>,

    // condvar that will be notified whenever a task is added to `todo`
    condvar: Condvar,

    // number of total worker threads running
    active_tasks: AtomicUsize,

    min_threads: usize,
    max_threads: usize,
    idle_timeout: Duration,
}

struct Queue {
    jobs: VecDeque<Job>,
    idle: usize,
}

impl Sharing {
    fn lock(&self) -> MutexGuard<'_, Queue> {
        // jobs run outside the lock, so a poisoned queue is still consistent
        self.todo.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Registration {
    sharing: Arc<Sharing>,
    // set once the thread has given its slot back on its own
    retired: bool,
}

impl Registration {
    fn new(sharing: Arc<Sharing>) -> Registration {
        sharing.active_tasks.fetch_add(1, Ordering::AcqRel);
        Registration {
            sharing,
            retired: false,
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if !self.retired {
            self.sharing.active_tasks.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl TaskPool {
    pub fn new(min_threads: usize, max_threads: usize, idle_timeout: Duration) -> TaskPool {
        let max_threads = max_threads.max(1);
        let pool = TaskPool {
            sharing: Arc::new(Sharing {
                todo: Mutex::new(Queue {
                    jobs: VecDeque::new(),
                    idle: 0,
                }),
                condvar: Condvar::new(),
                active_tasks: AtomicUsize::new(0),
                min_threads: min_threads.min(max_threads),
                max_threads,
                idle_timeout,
            }),
        };

        for _ in 0..pool.sharing.min_threads {
            pool.add_thread();
        }

        pool
    }

    /// Executes a function in a thread.
    /// If no thread is available and the ceiling allows it, spawns a new one.
    pub fn spawn(&self, code: Job) {
        let mut queue = self.sharing.lock();
        queue.jobs.push_back(code);

        if queue.idle >= queue.jobs.len()
            || self.sharing.active_tasks.load(Ordering::Acquire) >= self.sharing.max_threads
        {
            self.sharing.condvar.notify_one();
            return;
        }

        // still holding the lock: concurrent callers can't overshoot the ceiling
        self.add_thread();
    }

    /// Number of worker threads currently alive.
    pub fn active_threads(&self) -> usize {
        self.sharing.active_tasks.load(Ordering::Acquire)
    }

    fn add_thread(&self) {
        // counted before the thread exists; a failed spawn drops the closure
        // and the registration with it
        let registration = Registration::new(self.sharing.clone());

        let spawned = thread::Builder::new()
            .name("party-http-worker".to_string())
            .spawn(move || {
                let mut registration = registration;
                worker_loop(&mut registration);
            });

        if let Err(err) = spawned {
            error!("failed to spawn worker thread: {}", err);
        }
    }
}

fn worker_loop(registration: &mut Registration) {
    let sharing = registration.sharing.clone();
    let min_threads = sharing.min_threads;

    loop {
        let task = {
            let mut queue = sharing.lock();

            loop {
                if let Some(task) = queue.jobs.pop_front() {
                    break Some(task);
                }

                queue.idle += 1;
                let (guard, timeout) = sharing
                    .condvar
                    .wait_timeout(queue, sharing.idle_timeout)
                    .unwrap_or_else(PoisonError::into_inner);
                queue = guard;
                queue.idle -= 1;

                if timeout.timed_out()
                    && queue.jobs.is_empty()
                    && sharing
                        .active_tasks
                        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                            if n > min_threads {
                                Some(n - 1)
                            } else {
                                None
                            }
                        })
                        .is_ok()
                {
                    break None;
                }
            }
        };

        match task {
            Some(task) => task(),
            None => {
                registration.retired = true;
                return;
            }
        }
    }
}
