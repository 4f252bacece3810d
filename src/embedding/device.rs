use candle_core::Device;
use tracing::{debug, warn};

#[cfg(any(feature = "metal", feature = "cuda"))]
use tracing::info;

use super::error::EmbeddingError;

/// Picks the compute device for the encoder.
///
/// With `prefer_gpu` the compiled GPU backends are tried in order (Metal, then
/// CUDA); any failure falls back to CPU. Without it the CPU is used directly,
/// which keeps embeddings bit-stable across hosts.
pub fn select_device(prefer_gpu: bool) -> Result<Device, EmbeddingError> {
    if !prefer_gpu {
        debug!("GPU not requested, encoder runs on CPU");
        return Ok(Device::Cpu);
    }

    let mut failures: Vec<String> = Vec::new();

    #[cfg(feature = "metal")]
    match Device::new_metal(0) {
        Ok(device) => {
            info!("Encoder using Metal GPU acceleration");
            return Ok(device);
        }
        Err(e) => {
            warn!(error = %e, "Metal device unavailable");
            failures.push(format!("metal failed: {e}"));
        }
    }

    #[cfg(feature = "cuda")]
    match Device::new_cuda(0) {
        Ok(device) => {
            info!("Encoder using CUDA GPU acceleration");
            return Ok(device);
        }
        Err(e) => {
            warn!(error = %e, "CUDA device unavailable");
            failures.push(format!("cuda failed: {e}"));
        }
    }

    if failures.is_empty() {
        failures.push("no GPU backend compiled".to_string());
    }

    warn!(reason = %failures.join("; "), "Falling back to CPU device");
    Ok(Device::Cpu)
}
