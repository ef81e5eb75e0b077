//! Shared fixtures for pipeline integration tests

use parking_lot::Mutex;
use std::sync::Arc;
use volley_interfaces::{
    AggregationService, DoneCallback, PullCallback, TensorHandle,
};
use volley_types::{
    DataType, Device, Result, SyncError, TensorDescriptor, TensorName, VarId,
};

/// Route pipeline logs to the test harness; safe to call repeatedly
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// In-memory f32 tensor standing in for a framework tensor adapter
#[derive(Debug)]
pub struct TestTensor {
    device: Device,
    var: VarId,
    data: Mutex<Vec<f32>>,
}

impl TestTensor {
    pub fn new(values: &[f32], device: Device) -> Arc<Self> {
        Arc::new(Self {
            device,
            var: VarId::next(),
            data: Mutex::new(values.to_vec()),
        })
    }

    pub fn values(&self) -> Vec<f32> {
        self.data.lock().clone()
    }
}

impl TensorHandle for TestTensor {
    fn descriptor(&self) -> TensorDescriptor {
        TensorDescriptor::new(self.data.lock().len() * 4, self.device, DataType::F32)
    }

    fn var(&self) -> VarId {
        self.var
    }

    fn copy_to(&self, dst: &mut [u8]) -> Result<()> {
        let data = self.data.lock();
        if dst.len() != data.len() * 4 {
            return Err(SyncError::invariant("copy_to size mismatch"));
        }
        for (chunk, value) in dst.chunks_exact_mut(4).zip(data.iter()) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        Ok(())
    }

    fn copy_from(&self, src: &[u8]) -> Result<()> {
        let mut data = self.data.lock();
        if src.len() != data.len() * 4 {
            return Err(SyncError::invariant("copy_from size mismatch"));
        }
        for (chunk, value) in src.chunks_exact(4).zip(data.iter_mut()) {
            *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Ok(())
    }

    fn div_scalar(&self, divisor: f64) -> Result<()> {
        for value in self.data.lock().iter_mut() {
            *value = (*value as f64 / divisor) as f32;
        }
        Ok(())
    }
}

/// Service wrapper recording the order of exchange events
pub struct RecordingService {
    inner: Arc<dyn AggregationService>,
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingService {
    pub fn new(inner: Arc<dyn AggregationService>) -> Self {
        Self {
            inner,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    fn record(&self, event: &str) {
        self.events.lock().push(event.to_string());
    }
}

impl AggregationService for RecordingService {
    fn register(&self, name: &TensorName, descriptor: &TensorDescriptor, done: DoneCallback) {
        self.record("register:start");
        let events = Arc::clone(&self.events);
        self.inner.register(
            name,
            descriptor,
            Box::new(move |status| {
                events.lock().push("register:complete".to_string());
                done(status);
            }),
        );
    }

    fn push(&self, name: &TensorName, data: Vec<u8>, version: u64, priority: i32, done: DoneCallback) {
        self.record("push:start");
        let events = Arc::clone(&self.events);
        self.inner.push(
            name,
            data,
            version,
            priority,
            Box::new(move |status| {
                events.lock().push("push:complete".to_string());
                done(status);
            }),
        );
    }

    fn pull(&self, name: &TensorName, version: u64, priority: i32, done: PullCallback) {
        self.record("pull:start");
        let events = Arc::clone(&self.events);
        self.inner.pull(
            name,
            version,
            priority,
            Box::new(move |outcome| {
                events.lock().push("pull:complete".to_string());
                done(outcome);
            }),
        );
    }
}
