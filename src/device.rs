//! Placement of tensors and model parameters.
use std::fmt;

/// Where a tensor or a model's parameters live.
///
/// Kernels in this crate run on the host; the tag records placement so that a
/// batch relocated to one device is never fed to a model sitting on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Device {
    #[default]
    Cpu,
    Cuda(usize),
}

impl Device {
    /// Picks the accelerator with the given ordinal when one is usable,
    /// falling back to the host. No accelerator backend is compiled in, so
    /// this always resolves to [`Device::Cpu`].
    pub fn cuda_if_available(_ordinal: usize) -> Self {
        Device::Cpu
    }

    pub fn is_cuda(&self) -> bool {
        matches!(self, Device::Cuda(_))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
        }
    }
}
