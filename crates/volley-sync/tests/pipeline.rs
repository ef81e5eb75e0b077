//! End-to-end pipeline tests

mod common;

use common::{init_tracing, RecordingService, TestTensor};
use std::sync::mpsc;
use std::sync::Arc;
use volley_interfaces::TensorHandle;
use volley_sched::{DepGraphScheduler, InlineScheduler};
use volley_sync::{stages, LoopbackAggregator, SyncRuntime};
use volley_types::{Device, SyncConfig, SyncError, TensorName};

fn single_worker_runtime() -> (Arc<InlineScheduler>, Arc<LoopbackAggregator>, SyncRuntime) {
    init_tracing();
    let scheduler = Arc::new(InlineScheduler::new());
    let service = Arc::new(LoopbackAggregator::new(1));
    let runtime = SyncRuntime::new(
        SyncConfig::new(1),
        scheduler.clone(),
        service.clone(),
    );
    runtime.start();
    (scheduler, service, runtime)
}

#[test]
fn test_end_to_end_single_worker() {
    let (scheduler, _service, runtime) = single_worker_runtime();
    let tensor = TestTensor::new(&[8.0, 4.0], Device::Cpu);

    let ticket = runtime
        .synchronize(tensor.clone(), Some("grad"), 0, 0)
        .unwrap();
    ticket.wait().unwrap();

    // A single worker's sum divided by one leaves the values unchanged.
    assert_eq!(tensor.values(), vec![8.0, 4.0]);

    let labels: Vec<_> = scheduler.records().into_iter().map(|r| r.label).collect();
    assert_eq!(labels, vec!["volley.init", "volley.push", "volley.pull"]);
    assert_eq!(runtime.metrics().pipelines, 1);
    assert_eq!(runtime.metrics().contexts, 1);
}

#[test]
fn test_synchronize_before_start_fails() {
    let scheduler = Arc::new(InlineScheduler::new());
    let service = Arc::new(LoopbackAggregator::new(1));
    let runtime = SyncRuntime::new(SyncConfig::new(1), scheduler, service);

    let tensor = TestTensor::new(&[1.0], Device::Cpu);
    let result = runtime.synchronize(tensor, Some("grad"), 0, 0);
    assert!(matches!(result, Err(SyncError::NotInitialized)));
}

#[test]
fn test_name_reuse_with_different_shape_fails_loudly() {
    let (_scheduler, _service, runtime) = single_worker_runtime();

    let tensor = TestTensor::new(&[1.0, 2.0], Device::Cpu);
    runtime
        .synchronize(tensor, Some("grad"), 0, 0)
        .unwrap()
        .wait()
        .unwrap();

    let other = TestTensor::new(&[1.0, 2.0, 3.0], Device::Cpu);
    let result = runtime.synchronize(other, Some("grad"), 1, 0);
    assert!(matches!(result, Err(SyncError::NameConflict { .. })));
}

#[test]
fn test_second_synchronize_skips_registration() {
    let (scheduler, service, runtime) = single_worker_runtime();
    let tensor = TestTensor::new(&[6.0], Device::Cpu);

    for version in 0..2 {
        runtime
            .synchronize(tensor.clone(), Some("grad"), version, 0)
            .unwrap()
            .wait()
            .unwrap();
    }

    assert_eq!(tensor.values(), vec![6.0]);
    assert_eq!(
        service.register_calls(&TensorName::new("volley.grad")),
        1,
        "a ready context must not re-register"
    );

    let labels: Vec<_> = scheduler.records().into_iter().map(|r| r.label).collect();
    assert_eq!(
        labels,
        vec![
            "volley.init",
            "volley.push",
            "volley.pull",
            "volley.push",
            "volley.pull"
        ]
    );
}

#[test]
fn test_push_failure_reaches_caller_and_leaves_tensor_untouched() {
    let (_scheduler, service, runtime) = single_worker_runtime();
    service.fail_next_push("server rejected push");

    let tensor = TestTensor::new(&[3.0, 9.0], Device::Cpu);
    let ticket = runtime
        .synchronize(tensor.clone(), Some("grad"), 0, 0)
        .unwrap();

    let err = ticket.wait().unwrap_err();
    assert_eq!(err.to_string(), "Aggregation service error: server rejected push");
    assert_eq!(tensor.values(), vec![3.0, 9.0]);
}

/// Delegates to a loopback reducer but refuses the first registration
struct FlakyRegisterService {
    inner: Arc<LoopbackAggregator>,
    refusals_left: parking_lot::Mutex<usize>,
}

impl volley_interfaces::AggregationService for FlakyRegisterService {
    fn register(
        &self,
        name: &TensorName,
        descriptor: &volley_types::TensorDescriptor,
        done: volley_interfaces::DoneCallback,
    ) {
        let mut refusals = self.refusals_left.lock();
        if *refusals > 0 {
            *refusals -= 1;
            done(Err(SyncError::service("registration refused")));
            return;
        }
        drop(refusals);
        self.inner.register(name, descriptor, done);
    }

    fn push(&self, name: &TensorName, data: Vec<u8>, version: u64, priority: i32, done: volley_interfaces::DoneCallback) {
        self.inner.push(name, data, version, priority, done);
    }

    fn pull(&self, name: &TensorName, version: u64, priority: i32, done: volley_interfaces::PullCallback) {
        self.inner.pull(name, version, priority, done);
    }
}

#[test]
fn test_failed_init_can_be_retried() {
    let scheduler = Arc::new(InlineScheduler::new());
    let service = Arc::new(FlakyRegisterService {
        inner: Arc::new(LoopbackAggregator::new(1)),
        refusals_left: parking_lot::Mutex::new(1),
    });
    let runtime = SyncRuntime::new(SyncConfig::new(1), scheduler, service);
    runtime.start();

    let tensor = TestTensor::new(&[4.0], Device::Cpu);
    let err = runtime
        .synchronize(tensor.clone(), Some("grad"), 0, 0)
        .unwrap()
        .wait()
        .unwrap_err();
    assert_eq!(err.to_string(), "Aggregation service error: registration refused");

    let context = runtime
        .registry()
        .try_get(&TensorName::new("volley.grad"))
        .unwrap();
    assert!(!context.is_ready(), "failed init must leave the context retryable");

    // The retry resubmits init and the exchange goes through.
    runtime
        .synchronize(tensor.clone(), Some("grad"), 1, 0)
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(tensor.values(), vec![4.0]);
}

#[test]
fn test_anonymous_tensors_are_distinct() {
    let (_scheduler, _service, runtime) = single_worker_runtime();

    let a = TestTensor::new(&[1.0], Device::Cpu);
    let b = TestTensor::new(&[2.0], Device::Cpu);
    runtime.synchronize(a, None, 0, 0).unwrap().wait().unwrap();
    runtime.synchronize(b, None, 0, 0).unwrap().wait().unwrap();

    assert_eq!(runtime.metrics().contexts, 2);
    assert!(runtime
        .registry()
        .try_get(&TensorName::new("volley.noname.0"))
        .is_some());
    assert!(runtime
        .registry()
        .try_get(&TensorName::new("volley.noname.1"))
        .is_some());
}

#[test]
fn test_off_host_tensor_stages_through_host_buffer() {
    let (_scheduler, _service, runtime) = single_worker_runtime();
    let tensor = TestTensor::new(&[2.0, 4.0, 6.0], Device::Cuda(0));

    runtime
        .synchronize(tensor.clone(), Some("gpu_grad"), 0, 0)
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(tensor.values(), vec![2.0, 4.0, 6.0]);
    let context = runtime
        .registry()
        .try_get(&TensorName::new("volley.gpu_grad"))
        .unwrap();
    assert!(context.has_staging(), "off-host tensors must own a staging buffer");
}

#[test]
fn test_push_on_unready_context_is_invariant_violation() {
    let service: Arc<LoopbackAggregator> = Arc::new(LoopbackAggregator::new(1));
    let registry = volley_sync::ContextRegistry::new();
    let tensor = TestTensor::new(&[1.0], Device::Cpu);
    let context = registry
        .get_or_create(&TensorName::new("volley.grad"), &tensor.descriptor())
        .unwrap();

    let (tx, rx) = mpsc::channel();
    stages::push(
        context,
        tensor,
        service,
        0,
        0,
        Box::new(move |status| tx.send(status).unwrap()),
    );
    let err = rx.recv().unwrap().unwrap_err();
    assert!(matches!(err, SyncError::InvariantViolation { .. }));
}

#[test]
fn test_pull_transfer_starts_only_after_push_completed() {
    init_tracing();
    let loopback = Arc::new(LoopbackAggregator::new(1));
    let recording = Arc::new(RecordingService::new(loopback));
    let scheduler = Arc::new(DepGraphScheduler::new(4));
    let runtime = SyncRuntime::new(SyncConfig::new(1), scheduler.clone(), recording.clone());
    runtime.start();

    let tensor = TestTensor::new(&[5.0], Device::Cpu);
    runtime
        .synchronize(tensor, Some("grad"), 0, 0)
        .unwrap()
        .wait()
        .unwrap();
    scheduler.wait_idle();

    let events = recording.events();
    let push_done = events.iter().position(|e| e == "push:complete").unwrap();
    let pull_start = events.iter().position(|e| e == "pull:start").unwrap();
    assert!(
        push_done < pull_start,
        "pull began before push completed: {:?}",
        events
    );
}

#[test]
fn test_four_workers_converge_on_the_average() {
    init_tracing();
    let service = Arc::new(LoopbackAggregator::new(4));

    let handles: Vec<_> = (1..=4)
        .map(|worker| {
            let service = service.clone();
            std::thread::spawn(move || {
                let scheduler = Arc::new(DepGraphScheduler::new(2));
                let runtime =
                    SyncRuntime::new(SyncConfig::new(4), scheduler, service);
                runtime.start();

                let tensor = TestTensor::new(&[worker as f32, 10.0 * worker as f32], Device::Cpu);
                runtime
                    .synchronize(tensor.clone(), Some("grad"), 0, 0)
                    .unwrap()
                    .wait()
                    .unwrap();
                tensor.values()
            })
        })
        .collect();

    for handle in handles {
        let values = handle.join().unwrap();
        // (1+2+3+4)/4 = 2.5 and (10+20+30+40)/4 = 25.0
        assert_eq!(values, vec![2.5, 25.0]);
    }
}
