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

//! A reusable rendezvous point for a fixed number of threads.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Blocks `parties` threads until all of them have arrived, then releases them
/// together and starts over.
///
/// Each full cycle is a *generation*. A thread that arrives after a
/// generation was released belongs to the next one, so a fast thread coming
/// back to the barrier can never slip through with the previous cohort.
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
/// use party_bench::PartyBarrier;
///
/// let barrier = Arc::new(PartyBarrier::new(3));
/// let handles: Vec<_> = (0..3)
///     .map(|_| {
///         let barrier = barrier.clone();
///         thread::spawn(move || barrier.wait().is_leader())
///     })
///     .collect();
/// let leaders = handles
///     .into_iter()
///     .map(|h| h.join().unwrap())
///     .filter(|&leader| leader)
///     .count();
/// assert_eq!(leaders, 1);
/// ```
#[derive(Debug)]
pub struct PartyBarrier {
    parties: usize,
    state: Mutex<State>,
    condvar: Condvar,
}

#[derive(Debug)]
struct State {
    // threads waiting in the current generation
    arrived: usize,
    generation: u64,
}

/// Returned by [`PartyBarrier::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierWaitResult {
    generation: u64,
    leader: bool,
}

impl BarrierWaitResult {
    /// True for exactly one thread per generation: the one whose arrival
    /// released the others.
    pub fn is_leader(&self) -> bool {
        self.leader
    }

    /// The generation this thread was released from.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl PartyBarrier {
    /// Creates a barrier for `parties` threads. Zero is treated as one, which
    /// makes `wait` return immediately.
    pub fn new(parties: usize) -> PartyBarrier {
        PartyBarrier {
            parties: parties.max(1),
            state: Mutex::new(State {
                arrived: 0,
                generation: 0,
            }),
            condvar: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // the state is only ever left consistent between statements
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until `parties` threads have called `wait` on the current
    /// generation, then releases all of them.
    ///
    /// Wakeups that don't come from a release are absorbed: the thread goes
    /// back to waiting until its generation actually completes. Nothing can
    /// cancel a waiting thread.
    pub fn wait(&self) -> BarrierWaitResult {
        let mut state = self.lock();
        let generation = state.generation;

        state.arrived += 1;
        if state.arrived == self.parties {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            drop(state);
            self.condvar.notify_all();
            return BarrierWaitResult {
                generation,
                leader: true,
            };
        }

        while state.generation == generation {
            state = self
                .condvar
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        BarrierWaitResult {
            generation,
            leader: false,
        }
    }

    /// Number of threads needed to release a generation.
    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Number of threads currently blocked in the open generation.
    pub fn waiting(&self) -> usize {
        self.lock().arrived
    }

    /// Number of generations released so far.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }
}
