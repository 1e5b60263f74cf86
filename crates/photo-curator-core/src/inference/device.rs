//! Device selection for inference.

use candle_core::Device;
use tracing::{info, warn};

/// Returns the device to run inference on.
///
/// With `use_accelerator` set, CUDA and then Metal are tried; when neither
/// initializes (or the crate was built without the `cuda`/`metal` features)
/// the CPU is used. The choice is logged either way.
#[must_use]
pub fn select_device(use_accelerator: bool) -> Device {
    if !use_accelerator {
        info!("Using CPU for inference");
        return Device::Cpu;
    }

    #[cfg(feature = "cuda")]
    {
        match Device::new_cuda(0) {
            Ok(device) => {
                info!("Using CUDA device for inference");
                return device;
            }
            Err(e) => warn!("CUDA initialization failed: {e}"),
        }
    }

    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(device) => {
                info!("Using Metal device for inference");
                return device;
            }
            Err(e) => warn!("Metal initialization failed: {e}"),
        }
    }

    warn!("No accelerator available, falling back to CPU");
    Device::Cpu
}

/// Short name of the device backend, for logs and reports.
#[must_use]
pub const fn backend_name(device: &Device) -> &'static str {
    match device {
        Device::Cpu => "cpu",
        Device::Cuda(_) => "cuda",
        Device::Metal(_) => "metal",
    }
}
