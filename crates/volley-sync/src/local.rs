//! Loopback aggregation service
//!
//! An in-process sum-reducing [`AggregationService`] for single-process
//! multi-worker setups and tests. Rounds are keyed by tensor name and
//! request version: a round completes once `worker_count` pushes for that
//! version arrive; pulls arriving earlier are parked and flushed when the
//! round completes. Version keying keeps overlapping rounds apart, so a
//! fast worker may push its next version before a slow worker pulled the
//! previous one without touching the settled accumulator. A round is
//! dropped once every worker pulled it. The real parameter server and its
//! wire protocol stay behind the trait.

use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, warn};
use volley_interfaces::{AggregationService, DoneCallback, PullCallback};
use volley_types::{DataType, Result, SyncError, TensorDescriptor, TensorName};

#[derive(Default)]
struct RoundState {
    /// Element-wise sum of the pushes received this round
    acc: Vec<f32>,
    pushes: usize,
    /// Aggregated bytes, set once all pushes arrived
    result: Option<Vec<u8>>,
    /// Failure poisoning this round, delivered to every pull
    failure: Option<String>,
    pulls_served: usize,
    /// Pulls that arrived before the round completed
    waiters: Vec<PullCallback>,
}

type RoundKey = (TensorName, u64);

/// In-process sum reducer
pub struct LoopbackAggregator {
    worker_count: usize,
    rounds: Mutex<HashMap<RoundKey, RoundState>>,
    registered: Mutex<HashMap<TensorName, (TensorDescriptor, usize)>>,
    fail_next_push: Mutex<Option<String>>,
}

impl LoopbackAggregator {
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count: worker_count.max(1),
            rounds: Mutex::new(HashMap::new()),
            registered: Mutex::new(HashMap::new()),
            fail_next_push: Mutex::new(None),
        }
    }

    /// How many times `register` was called for this tensor
    pub fn register_calls(&self, name: &TensorName) -> usize {
        self.registered
            .lock()
            .get(name)
            .map(|(_, calls)| *calls)
            .unwrap_or(0)
    }

    /// Make the next push fail with the given reason (test hook)
    pub fn fail_next_push(&self, reason: impl Into<String>) {
        *self.fail_next_push.lock() = Some(reason.into());
    }

    /// Drop a round once it settled and every worker pulled it
    fn remove_if_drained(&self, rounds: &mut HashMap<RoundKey, RoundState>, key: &RoundKey) {
        if let Some(round) = rounds.get(key) {
            let settled = round.result.is_some() || round.failure.is_some();
            if settled && round.pulls_served >= self.worker_count {
                rounds.remove(key);
            }
        }
    }
}

fn decode_f32(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(SyncError::service(format!(
            "payload of {}B is not a whole number of f32 elements",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn encode_f32(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

impl AggregationService for LoopbackAggregator {
    fn register(&self, name: &TensorName, descriptor: &TensorDescriptor, done: DoneCallback) {
        if descriptor.dtype != DataType::F32 {
            done(Err(SyncError::service(format!(
                "{}: loopback reduce supports f32 tensors, got {}",
                name, descriptor.dtype
            ))));
            return;
        }

        let mut registered = self.registered.lock();
        let entry = registered.entry(name.clone()).or_insert((*descriptor, 0));
        if entry.0 != *descriptor {
            done(Err(SyncError::service(format!(
                "{}: registered as {}, got {}",
                name, entry.0, descriptor
            ))));
            return;
        }
        entry.1 += 1;
        debug!("registered {} ({})", name, descriptor);
        drop(registered);
        done(Ok(()));
    }

    fn push(&self, name: &TensorName, data: Vec<u8>, version: u64, _priority: i32, done: DoneCallback) {
        let key = (name.clone(), version);
        if let Some(reason) = self.fail_next_push.lock().take() {
            warn!("{}: injected push failure: {}", name, reason);
            let mut rounds = self.rounds.lock();
            let round = rounds.entry(key.clone()).or_default();
            round.failure = Some(reason.clone());
            let waiters = std::mem::take(&mut round.waiters);
            round.pulls_served += waiters.len();
            self.remove_if_drained(&mut rounds, &key);
            drop(rounds);
            for waiter in waiters {
                waiter(Err(SyncError::service(reason.clone())));
            }
            done(Err(SyncError::service(reason)));
            return;
        }

        let values = match decode_f32(&data) {
            Ok(values) => values,
            Err(err) => {
                done(Err(err));
                return;
            }
        };

        let mut rounds = self.rounds.lock();
        let round = rounds.entry(key.clone()).or_default();
        if round.acc.is_empty() {
            round.acc = vec![0.0; values.len()];
        } else if round.acc.len() != values.len() {
            let expected = round.acc.len();
            drop(rounds);
            done(Err(SyncError::service(format!(
                "{}: push of {} elements into a round of {}",
                name,
                values.len(),
                expected
            ))));
            return;
        }
        for (slot, value) in round.acc.iter_mut().zip(values.iter()) {
            *slot += value;
        }
        round.pushes += 1;
        debug!("{}: push {}/{} (version {})", name, round.pushes, self.worker_count, version);

        let mut ready_waiters = Vec::new();
        let mut result_bytes = None;
        if round.pushes >= self.worker_count {
            let bytes = encode_f32(&round.acc);
            round.result = Some(bytes.clone());
            ready_waiters = std::mem::take(&mut round.waiters);
            round.pulls_served += ready_waiters.len();
            result_bytes = Some(bytes);
            self.remove_if_drained(&mut rounds, &key);
        }
        drop(rounds);

        // Receipt is acknowledged before parked pulls are flushed.
        done(Ok(()));
        if let Some(bytes) = result_bytes {
            for waiter in ready_waiters {
                waiter(Ok(bytes.clone()));
            }
        }
    }

    fn pull(&self, name: &TensorName, version: u64, _priority: i32, done: PullCallback) {
        let key = (name.clone(), version);
        let mut rounds = self.rounds.lock();
        let round = rounds.entry(key.clone()).or_default();

        if let Some(reason) = round.failure.clone() {
            round.pulls_served += 1;
            self.remove_if_drained(&mut rounds, &key);
            drop(rounds);
            done(Err(SyncError::service(reason)));
            return;
        }

        if let Some(bytes) = round.result.clone() {
            round.pulls_served += 1;
            debug!("{}: pull served (version {})", name, version);
            self.remove_if_drained(&mut rounds, &key);
            drop(rounds);
            done(Ok(bytes));
        } else {
            debug!("{}: pull parked until the round completes (version {})", name, version);
            round.waiters.push(done);
        }
    }
}
