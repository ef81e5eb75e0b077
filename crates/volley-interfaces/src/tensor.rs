//! Tensor handle adapter
//!
//! Abstracts over the host framework's tensor representation. The pipeline
//! only needs size/device/dtype, a dependency variable, and raw buffer
//! access; the math kernels behind the handle are out of scope.

use std::sync::Arc;
use volley_types::{Result, TensorDescriptor, VarId};

/// Opaque handle over one tensor value owned by the host framework.
///
/// The handle is borrowed for the duration of a stage: the caller must not
/// mutate the tensor between submission and the stage's completion
/// callback. Ordering between concurrent stages on the same tensor is
/// expressed through [`var`](TensorHandle::var), never through locks inside
/// the adapter.
pub trait TensorHandle: Send + Sync + std::fmt::Debug {
    /// Size, device, and element type of the tensor
    fn descriptor(&self) -> TensorDescriptor;

    /// Dependency variable for this tensor, stable for the handle's
    /// lifetime. Tasks reading the tensor declare it in `reads`; tasks
    /// mutating it declare it in `writes`.
    fn var(&self) -> VarId;

    /// Copy the tensor's current contents into `dst`. `dst` must be exactly
    /// `descriptor().size_bytes` long.
    fn copy_to(&self, dst: &mut [u8]) -> Result<()>;

    /// Overwrite the tensor's contents from `src`. `src` must be exactly
    /// `descriptor().size_bytes` long.
    fn copy_from(&self, src: &[u8]) -> Result<()>;

    /// Divide every element in place. Used once per synchronization to
    /// average the aggregated sum over the worker count.
    fn div_scalar(&self, divisor: f64) -> Result<()>;
}

/// Reference-counted tensor handle shared between the caller and in-flight
/// stages
pub type TensorRef = Arc<dyn TensorHandle>;
