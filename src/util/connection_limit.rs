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

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Caps the number of connections the server takes on at once.
///
/// Acceptors reserve a slot with [`ConnectionLimit::acquire`] before calling
/// `accept`, so once `max` slots are out further clients stay in the listen
/// backlog instead of being accepted and then starved of a worker. A slot
/// only counts as an open connection after [`ConnectionPermit::admit`].
pub struct ConnectionLimit {
    slots: Mutex<Slots>,
    condvar: Condvar,
    max: usize,
}

#[derive(Default)]
struct Slots {
    reserved: usize,
    admitted: usize,
}

/// A reserved slot. Dropping it frees the slot.
pub struct ConnectionPermit {
    limit: Arc<ConnectionLimit>,
    admitted: bool,
}

impl ConnectionLimit {
    pub fn new(max: usize) -> Arc<ConnectionLimit> {
        Arc::new(ConnectionLimit {
            slots: Mutex::new(Slots::default()),
            condvar: Condvar::new(),
            max: max.max(1),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserves a slot. Blocks until one is available.
    pub fn acquire(self: &Arc<Self>) -> ConnectionPermit {
        let mut slots = self.lock();

        while slots.reserved >= self.max {
            slots = self
                .condvar
                .wait(slots)
                .unwrap_or_else(PoisonError::into_inner);
        }

        slots.reserved += 1;
        ConnectionPermit {
            limit: self.clone(),
            admitted: false,
        }
    }

    /// Number of accepted connections holding a slot.
    pub fn admitted(&self) -> usize {
        self.lock().admitted
    }
}

impl ConnectionPermit {
    /// Marks the slot as used by an accepted connection.
    pub fn admit(&mut self) {
        if !self.admitted {
            self.limit.lock().admitted += 1;
            self.admitted = true;
        }
    }
}

impl Drop for ConnectionPermit {
    fn drop(&mut self) {
        let mut slots = self.limit.lock();
        slots.reserved -= 1;
        if self.admitted {
            slots.admitted -= 1;
        }
        self.limit.condvar.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::ConnectionLimit;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn blocks_at_the_limit() {
        let limit = ConnectionLimit::new(2);
        let first = limit.acquire();
        let _second = limit.acquire();

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let limit = limit.clone();
            thread::spawn(move || {
                let _third = limit.acquire();
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(first);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        waiter.join().unwrap();
    }

    #[test]
    fn reserved_slots_are_not_open_connections() {
        let limit = ConnectionLimit::new(3);
        let mut first = limit.acquire();
        let _idle = limit.acquire();
        assert_eq!(limit.admitted(), 0);

        first.admit();
        first.admit();
        assert_eq!(limit.admitted(), 1);

        drop(first);
        assert_eq!(limit.admitted(), 0);
    }

    #[test]
    fn zero_is_treated_as_one() {
        let limit = ConnectionLimit::new(0);
        let permit = limit.acquire();

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let limit = limit.clone();
            thread::spawn(move || {
                let _second = limit.acquire();
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(permit);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        waiter.join().unwrap();
    }
}
