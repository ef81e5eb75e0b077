//! Pipeline stages
//!
//! Free functions carrying one stage call each; the runtime wraps them in
//! scheduler tasks. Every outcome funnels through
//! [`bridge::invoke`](crate::bridge::invoke) so no stage can swallow a
//! non-`Ok` status.

use crate::bridge;
use crate::context::ContextRef;
use std::sync::Arc;
use tracing::debug;
use volley_interfaces::{AggregationService, DoneCallback, TensorRef};
use volley_types::SyncError;

/// First-use setup of a context: allocate the host staging buffer for
/// off-host tensors and register the tensor with the aggregation service.
///
/// Idempotent at the call site: invoking `init` on a context that is
/// already `Ready` completes immediately as a no-op success. On a
/// registration failure the context reverts to `Uninitialized` so a later
/// attempt may retry.
pub fn init(context: ContextRef, service: Arc<dyn AggregationService>, on_complete: DoneCallback) {
    if context.is_ready() {
        debug!("{} already initialized, skipping registration", context.name());
        bridge::invoke(on_complete, Ok(()));
        return;
    }

    let descriptor = *context.descriptor();
    if !descriptor.device.is_host() {
        context.ensure_staging(descriptor.size_bytes);
    }
    context.begin_initializing();
    debug!("registering {} ({}) with aggregation service", context.name(), descriptor);

    let ctx = Arc::clone(&context);
    service.register(
        context.name(),
        &descriptor,
        Box::new(move |status| {
            match &status {
                Ok(()) => ctx.mark_ready(),
                Err(_) => ctx.revert_uninitialized(),
            }
            bridge::invoke(on_complete, status);
        }),
    );
}

/// Hand the tensor's current contents to the aggregation service.
///
/// Returns immediately; `on_complete` fires once the service acknowledges
/// receipt, not once aggregation across all workers finishes. The tensor's
/// contents are not modified. An off-host tensor without a staging buffer
/// means the initializer was skipped: that is a stage-ordering bug, and it
/// surfaces as [`SyncError::InvariantViolation`].
pub fn push(
    context: ContextRef,
    handle: TensorRef,
    service: Arc<dyn AggregationService>,
    version: u64,
    priority: i32,
    on_complete: DoneCallback,
) {
    if !context.is_ready() {
        bridge::invoke(
            on_complete,
            Err(SyncError::invariant(format!(
                "{}: push on a context that is not ready",
                context.name()
            ))),
        );
        return;
    }

    let descriptor = *context.descriptor();
    let payload = if descriptor.device.is_host() {
        let mut payload = vec![0u8; descriptor.size_bytes];
        if let Err(err) = handle.copy_to(&mut payload) {
            bridge::invoke(on_complete, Err(err));
            return;
        }
        payload
    } else {
        // Stage through the context's host buffer, as the wire path cannot
        // read device memory directly.
        let staged = {
            let mut staging = context.staging();
            match staging.as_mut() {
                Some(buffer) => handle.copy_to(buffer).map(|_| buffer.clone()),
                None => Err(SyncError::invariant(format!(
                    "{}: staging buffer missing for off-host push",
                    context.name()
                ))),
            }
        };
        match staged {
            Ok(payload) => payload,
            Err(err) => {
                bridge::invoke(on_complete, Err(err));
                return;
            }
        }
    };

    debug!(
        "pushing {} ({}B, version {}, priority {})",
        context.name(),
        payload.len(),
        version,
        priority
    );
    service.push(
        context.name(),
        payload,
        version,
        priority,
        Box::new(move |status| bridge::invoke(on_complete, status)),
    );
}

/// Retrieve the aggregated result and write it back into the tensor.
///
/// `on_complete` fires only after the write-back completed. On a service
/// error the tensor's contents are left untouched; no partial write is
/// ever applied.
pub fn pull(
    context: ContextRef,
    handle: TensorRef,
    service: Arc<dyn AggregationService>,
    version: u64,
    priority: i32,
    on_complete: DoneCallback,
) {
    if !context.is_ready() {
        bridge::invoke(
            on_complete,
            Err(SyncError::invariant(format!(
                "{}: pull on a context that is not ready",
                context.name()
            ))),
        );
        return;
    }

    let descriptor = *context.descriptor();
    debug!(
        "pulling {} (version {}, priority {})",
        context.name(),
        version,
        priority
    );

    let ctx = Arc::clone(&context);
    service.pull(
        context.name(),
        version,
        priority,
        Box::new(move |outcome| {
            let status = outcome.and_then(|data| {
                if data.len() != descriptor.size_bytes {
                    return Err(SyncError::service(format!(
                        "{}: aggregated payload is {}B, expected {}B",
                        ctx.name(),
                        data.len(),
                        descriptor.size_bytes
                    )));
                }
                if descriptor.device.is_host() {
                    handle.copy_from(&data)
                } else {
                    let mut staging = ctx.staging();
                    match staging.as_mut() {
                        Some(buffer) => {
                            buffer.copy_from_slice(&data);
                            handle.copy_from(buffer)
                        }
                        None => Err(SyncError::invariant(format!(
                            "{}: staging buffer missing for off-host pull",
                            ctx.name()
                        ))),
                    }
                }
            });
            bridge::invoke(on_complete, status);
        }),
    );
}
