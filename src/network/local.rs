/*
 * Copyright 2025 Vijaykumar Singh
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! In-process collective runtime
//!
//! Every worker runs on its own thread and owns a [`LocalCommunicator`]. Each
//! ordered pair of ranks is connected by a dedicated channel, so messages from
//! one peer always arrive in the order they were sent. Payloads are
//! `bincode`-encoded, which keeps workers strictly message-passing: nothing but
//! bytes crosses a thread boundary.
//!
//! Each collective carries an epoch number. A worker that receives a message
//! from a different epoch (a peer that skipped or repeated a collective)
//! reports a protocol error instead of decoding the wrong payload.

use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::Cell;
use std::time::Duration;
use tracing::{debug, trace};

use super::collective::Communicator;
use crate::core::{ClusteringError, Result};

#[derive(Debug)]
struct Envelope {
    epoch: u64,
    payload: Vec<u8>,
}

/// Communicator endpoint for one worker of a [`LocalCluster`]
#[derive(Debug)]
pub struct LocalCommunicator {
    rank: usize,
    size: usize,
    /// Indexed by destination rank; `None` for self
    outboxes: Vec<Option<Sender<Envelope>>>,
    /// Indexed by source rank; `None` for self
    inboxes: Vec<Option<Receiver<Envelope>>>,
    timeout: Option<Duration>,
    epoch: Cell<u64>,
}

impl LocalCommunicator {
    /// Number of collectives this endpoint has entered
    pub fn epoch(&self) -> u64 {
        self.epoch.get()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn next_epoch(&self) -> u64 {
        let epoch = self.epoch.get();
        self.epoch.set(epoch + 1);
        epoch
    }

    fn receive(&self, source: usize, inbox: &Receiver<Envelope>) -> Result<Envelope> {
        match self.timeout {
            Some(timeout) => inbox.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => ClusteringError::protocol(format!(
                    "rank {} timed out after {:?} waiting for rank {}",
                    self.rank, timeout, source
                )),
                RecvTimeoutError::Disconnected => self.disconnected(source),
            }),
            None => inbox.recv().map_err(|_| self.disconnected(source)),
        }
    }

    fn disconnected(&self, peer: usize) -> ClusteringError {
        ClusteringError::protocol(format!(
            "rank {} lost connection to rank {}",
            self.rank, peer
        ))
    }
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn all_gather<T>(&self, value: &T) -> Result<Vec<T>>
    where
        T: Serialize + DeserializeOwned + Clone,
    {
        let epoch = self.next_epoch();
        let payload = bincode::serialize(value).map_err(|e| {
            ClusteringError::protocol(format!("rank {} failed to encode payload: {}", self.rank, e))
        })?;
        trace!(rank = self.rank, epoch, bytes = payload.len(), "all_gather");

        for (destination, outbox) in self.outboxes.iter().enumerate() {
            if let Some(outbox) = outbox {
                outbox
                    .send(Envelope {
                        epoch,
                        payload: payload.clone(),
                    })
                    .map_err(|_| self.disconnected(destination))?;
            }
        }

        let mut gathered = Vec::with_capacity(self.size);
        for (source, inbox) in self.inboxes.iter().enumerate() {
            let inbox = match inbox {
                Some(inbox) => inbox,
                None => {
                    gathered.push(value.clone());
                    continue;
                }
            };

            let envelope = self.receive(source, inbox)?;
            if envelope.epoch != epoch {
                return Err(ClusteringError::protocol(format!(
                    "rank {} expected collective {} from rank {}, received {}",
                    self.rank, epoch, source, envelope.epoch
                )));
            }
            let decoded = bincode::deserialize(&envelope.payload).map_err(|e| {
                ClusteringError::protocol(format!(
                    "rank {} could not decode payload from rank {}: {}",
                    self.rank, source, e
                ))
            })?;
            gathered.push(decoded);
        }

        Ok(gathered)
    }
}

/// Builder and runner for a group of in-process workers
pub struct LocalCluster;

impl LocalCluster {
    /// Create `size` connected communicators, in rank order.
    ///
    /// `timeout` bounds every wait inside a collective; `None` blocks
    /// indefinitely, as a hung blocking collective would.
    pub fn build(size: usize, timeout: Option<Duration>) -> Result<Vec<LocalCommunicator>> {
        if size == 0 {
            return Err(ClusteringError::invalid_argument(
                "a process group needs at least one worker",
            ));
        }

        let mut outboxes: Vec<Vec<Option<Sender<Envelope>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        let mut inboxes: Vec<Vec<Option<Receiver<Envelope>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();

        for source in 0..size {
            for destination in 0..size {
                if source != destination {
                    let (sender, receiver) = unbounded();
                    outboxes[source][destination] = Some(sender);
                    inboxes[destination][source] = Some(receiver);
                }
            }
        }

        debug!(size, ?timeout, "built local process group");

        Ok(outboxes
            .into_iter()
            .zip(inboxes)
            .enumerate()
            .map(|(rank, (outboxes, inboxes))| LocalCommunicator {
                rank,
                size,
                outboxes,
                inboxes,
                timeout,
                epoch: Cell::new(0),
            })
            .collect())
    }

    /// Run `worker` once per rank, each on its own thread, and return the
    /// results in rank order.
    ///
    /// A worker that returns early drops its endpoint, so peers still waiting
    /// on it observe a protocol error rather than blocking forever.
    pub fn run<F, R>(size: usize, timeout: Option<Duration>, worker: F) -> Result<Vec<R>>
    where
        F: Fn(LocalCommunicator) -> R + Sync,
        R: Send,
    {
        let communicators = Self::build(size, timeout)?;
        let worker = &worker;

        crossbeam::thread::scope(|scope| {
            let handles: Vec<_> = communicators
                .into_iter()
                .map(|comm| scope.spawn(move |_| worker(comm)))
                .collect();

            handles
                .into_iter()
                .enumerate()
                .map(|(rank, handle)| {
                    handle
                        .join()
                        .map_err(|_| ClusteringError::protocol(format!("worker {} panicked", rank)))
                })
                .collect::<Result<Vec<R>>>()
        })
        .map_err(|_| ClusteringError::protocol("local process group panicked"))?
    }
}
