//! Synchronization runtime and entry operation

use crate::bridge::{self, SyncTicket};
use crate::naming::NameGenerator;
use crate::registry::ContextRegistry;
use crate::stages;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use volley_interfaces::{AggregationService, HostScheduler, Task, TensorRef};
use volley_types::{Result, SyncConfig, SyncError};

/// Snapshot of runtime activity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncMetrics {
    /// Synchronization pipelines submitted
    pub pipelines: u64,
    /// Distinct tensor contexts registered
    pub contexts: usize,
}

/// The synchronization runtime for one training job.
///
/// Owns the context registry and name generator, and holds the injected
/// host scheduler and aggregation service. It owns no threads: all stage
/// work runs on the scheduler's workers, and all exchange completion
/// arrives through callbacks.
pub struct SyncRuntime {
    config: SyncConfig,
    registry: ContextRegistry,
    namer: NameGenerator,
    scheduler: Arc<dyn HostScheduler>,
    service: Arc<dyn AggregationService>,
    started: AtomicBool,
    pipelines: AtomicU64,
}

impl SyncRuntime {
    pub fn new(
        config: SyncConfig,
        scheduler: Arc<dyn HostScheduler>,
        service: Arc<dyn AggregationService>,
    ) -> Self {
        let namer = NameGenerator::new(config.scope.clone());
        Self {
            config,
            registry: ContextRegistry::new(),
            namer,
            scheduler,
            service,
            started: AtomicBool::new(false),
            pipelines: AtomicU64::new(0),
        }
    }

    /// Mark global setup as done. Synchronization requests fail with
    /// [`SyncError::NotInitialized`] until this is called. Idempotent.
    pub fn start(&self) {
        if !self.started.swap(true, Ordering::SeqCst) {
            info!(
                "synchronization runtime started (scope {}, {} workers)",
                self.config.scope, self.config.worker_count
            );
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    fn ensure_started(&self) -> Result<()> {
        if self.is_started() {
            Ok(())
        } else {
            Err(SyncError::NotInitialized)
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn registry(&self) -> &ContextRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> SyncMetrics {
        SyncMetrics {
            pipelines: self.pipelines.load(Ordering::Relaxed),
            contexts: self.registry.len(),
        }
    }

    /// Synchronize one tensor across all workers.
    ///
    /// Checks preconditions synchronously, then submits up to three tasks
    /// to the host scheduler: a one-time init task (writes the tensor's
    /// var), a push task (reads it), and a pull task (writes it). The
    /// returned [`SyncTicket`] observes all of them;
    /// [`SyncTicket::wait`] raises the first stage error or applies the
    /// worker-count average after a fully successful exchange.
    pub fn synchronize(
        &self,
        handle: TensorRef,
        name: Option<&str>,
        version: u64,
        priority: i32,
    ) -> Result<SyncTicket> {
        self.ensure_started()?;

        let name = self.namer.name_for(name);
        let descriptor = handle.descriptor();
        let var = handle.var();
        let ticket = SyncTicket::new(Arc::clone(&handle), self.config.worker_count);

        // Lazy, exactly-once initialization. A name conflict aborts here,
        // before anything is submitted.
        if !self.registry.is_initialized(&name, &descriptor)? {
            let context = self.registry.get_or_create(&name, &descriptor)?;
            debug!("submitting init for {}", name);
            let service = Arc::clone(&self.service);
            let observer = ticket.observer();
            self.scheduler.submit(
                Task::new("volley.init", move |done| {
                    stages::init(context, service, bridge::fanout(observer, done));
                })
                .with_writes(vec![var])
                .with_priority(priority),
            )?;
        }

        let context = self.registry.get_or_create(&name, &descriptor)?;

        let push_context = Arc::clone(&context);
        let push_handle = Arc::clone(&handle);
        let push_service = Arc::clone(&self.service);
        let observer = ticket.observer();
        self.scheduler.submit(
            Task::new("volley.push", move |done| {
                stages::push(
                    push_context,
                    push_handle,
                    push_service,
                    version,
                    priority,
                    bridge::fanout(observer, done),
                );
            })
            .with_reads(vec![var])
            .with_priority(priority),
        )?;

        let pull_handle = Arc::clone(&handle);
        let pull_service = Arc::clone(&self.service);
        let observer = ticket.observer();
        self.scheduler.submit(
            Task::new("volley.pull", move |done| {
                stages::pull(
                    context,
                    pull_handle,
                    pull_service,
                    version,
                    priority,
                    bridge::fanout(observer, done),
                );
            })
            .with_writes(vec![var])
            .with_priority(priority),
        )?;

        self.pipelines.fetch_add(1, Ordering::Relaxed);
        Ok(ticket)
    }
}
