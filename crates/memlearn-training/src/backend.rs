//! Backend aliases and device selection.
//!
//! CPU training uses NdArray. Building with the `wgpu` feature switches the
//! backend to WGPU so `--gpu <id>` can pick a discrete adapter.

use crate::error::{TrainingError, TrainingResult};
use burn::backend::Autodiff;
use burn::tensor::backend::Backend;

#[cfg(feature = "wgpu")]
pub type TrainBackend = burn::backend::Wgpu;
#[cfg(not(feature = "wgpu"))]
pub type TrainBackend = burn::backend::NdArray<f32>;

/// Backend used for optimizer steps; `TrainBackend` is its inner (evaluation) backend.
pub type ADBackend = Autodiff<TrainBackend>;

pub type Device = <TrainBackend as Backend>::Device;

/// Map a `--gpu` id to a device. Negative ids select the CPU.
pub fn select_device(gpu: i32) -> TrainingResult<Device> {
    if gpu < 0 {
        return Ok(cpu_device());
    }
    gpu_device(gpu)
}

#[cfg(not(feature = "wgpu"))]
fn cpu_device() -> Device {
    burn::backend::ndarray::NdArrayDevice::Cpu
}

#[cfg(feature = "wgpu")]
fn cpu_device() -> Device {
    burn::backend::wgpu::WgpuDevice::Cpu
}

#[cfg(not(feature = "wgpu"))]
fn gpu_device(gpu: i32) -> TrainingResult<Device> {
    Err(TrainingError::Device(format!(
        "GPU {gpu} requested but this build has no GPU backend; rebuild with --features wgpu or pass --gpu -1"
    )))
}

#[cfg(feature = "wgpu")]
fn gpu_device(gpu: i32) -> TrainingResult<Device> {
    let id = usize::try_from(gpu).map_err(|_| TrainingError::Device(format!("invalid GPU id {gpu}")))?;
    Ok(burn::backend::wgpu::WgpuDevice::DiscreteGpu(id))
}

/// Seed weight initialization and dropout.
pub fn seed(seed: u64) {
    TrainBackend::seed(seed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_gpu_selects_cpu() {
        assert!(select_device(-1).is_ok());
    }

    #[cfg(not(feature = "wgpu"))]
    #[test]
    fn test_gpu_without_backend_is_device_error() {
        assert!(matches!(select_device(0), Err(TrainingError::Device(_))));
    }
}
