//! Device and tensor-shape types

use serde::{Deserialize, Serialize};

/// Device a tensor resides on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Device {
    /// Host (CPU) memory
    Cpu,
    /// NVIDIA CUDA device with device index
    Cuda(usize),
    /// AMD ROCm device with device index
    Rocm(usize),
}

impl Device {
    /// Check if the device is host-resident. Off-host tensors require a
    /// staging buffer before they can be pushed over the network.
    pub fn is_host(&self) -> bool {
        matches!(self, Device::Cpu)
    }

    /// Get device index for GPU devices
    pub fn index(&self) -> Option<usize> {
        match self {
            Device::Cuda(idx) | Device::Rocm(idx) => Some(*idx),
            Device::Cpu => None,
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(idx) => write!(f, "cuda:{}", idx),
            Device::Rocm(idx) => write!(f, "rocm:{}", idx),
        }
    }
}

/// Data type for tensor elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 32-bit floating point
    F32,
    /// 64-bit floating point
    F64,
    /// 16-bit floating point (IEEE 754)
    F16,
    /// 16-bit brain floating point
    BF16,
    /// 64-bit signed integer
    I64,
    /// 32-bit signed integer
    I32,
    /// 8-bit signed integer
    I8,
    /// 8-bit unsigned integer
    U8,
}

impl DataType {
    /// Get size in bytes for this data type
    pub fn size_bytes(&self) -> usize {
        match self {
            DataType::F64 | DataType::I64 => 8,
            DataType::F32 | DataType::I32 => 4,
            DataType::F16 | DataType::BF16 => 2,
            DataType::I8 | DataType::U8 => 1,
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DataType::F32 => "f32",
            DataType::F64 => "f64",
            DataType::F16 => "f16",
            DataType::BF16 => "bf16",
            DataType::I64 => "i64",
            DataType::I32 => "i32",
            DataType::I8 => "i8",
            DataType::U8 => "u8",
        };
        write!(f, "{}", name)
    }
}

/// Compatibility key for a registered tensor: a name may only ever be reused
/// for a tensor whose descriptor matches exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorDescriptor {
    /// Total size of the tensor contents in bytes
    pub size_bytes: usize,
    /// Device the tensor currently resides on
    pub device: Device,
    /// Element data type
    pub dtype: DataType,
}

impl TensorDescriptor {
    /// Create a new descriptor
    pub fn new(size_bytes: usize, device: Device, dtype: DataType) -> Self {
        Self {
            size_bytes,
            device,
            dtype,
        }
    }
}

impl std::fmt::Display for TensorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}B {} on {}",
            self.size_bytes, self.dtype, self.device
        )
    }
}
