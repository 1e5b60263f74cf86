//! Weight loading from safetensors files.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use safetensors::SafeTensors;
use tracing::debug;

/// Loads a safetensors file into a `VarBuilder` on `device`.
///
/// Half-precision exports are widened to f32 so models can be built with a
/// single dtype.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid safetensors, or
/// holds a tensor of an unsupported dtype.
pub fn load_safetensors(path: impl AsRef<Path>, device: &Device) -> Result<VarBuilder<'static>> {
    let path = path.as_ref();
    debug!("Loading safetensors from {}", path.display());

    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read model file: {}", path.display()))?;
    let tensors = SafeTensors::deserialize(&data)
        .with_context(|| format!("Failed to parse safetensors: {}", path.display()))?;

    let mut tensor_map: HashMap<String, Tensor> = HashMap::with_capacity(tensors.len());
    for (name, view) in tensors.tensors() {
        let dtype = candle_dtype(view.dtype())
            .with_context(|| format!("Tensor '{name}' in {}", path.display()))?;
        let tensor = Tensor::from_raw_buffer(view.data(), dtype, view.shape(), device)
            .with_context(|| format!("Failed to create tensor '{name}'"))?;
        let tensor = match dtype {
            DType::F16 | DType::BF16 => tensor.to_dtype(DType::F32)?,
            _ => tensor,
        };
        tensor_map.insert(name, tensor);
    }
    debug!("Loaded {} tensors", tensor_map.len());

    Ok(VarBuilder::from_tensors(tensor_map, DType::F32, device))
}

fn candle_dtype(dtype: safetensors::Dtype) -> Result<DType> {
    use safetensors::Dtype as S;
    match dtype {
        S::F32 => Ok(DType::F32),
        S::F64 => Ok(DType::F64),
        S::F16 => Ok(DType::F16),
        S::BF16 => Ok(DType::BF16),
        S::I64 => Ok(DType::I64),
        S::U8 => Ok(DType::U8),
        S::U32 => Ok(DType::U32),
        other => anyhow::bail!("Unsupported dtype: {other:?}"),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_safetensors(name: &str, dtype: safetensors::Dtype, bytes: &[u8]) -> NamedTempFile {
        use safetensors::tensor::TensorView;

        let view = TensorView::new(dtype, vec![2, 2], bytes).expect("valid tensor view");
        let tensors = HashMap::from([(name.to_string(), view)]);
        let serialized = safetensors::serialize(&tensors, &None).expect("serialize");

        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(&serialized).expect("write");
        file
    }

    #[test]
    fn test_load_safetensors() {
        let data: Vec<f32> = vec![1.0, 2.0, 3.0, 4.0];
        let file = write_safetensors(
            "net.weight",
            safetensors::Dtype::F32,
            bytemuck::cast_slice(&data),
        );

        let vb = load_safetensors(file.path(), &Device::Cpu).unwrap();
        assert!(vb.contains_tensor("net.weight"));
        let tensor = vb.get((2, 2), "net.weight").unwrap();
        assert_eq!(tensor.to_vec2::<f32>().unwrap(), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn test_load_safetensors_missing_file() {
        let result = load_safetensors("/nonexistent/path.safetensors", &Device::Cpu);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_safetensors_rejects_garbage() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"not a safetensors file").unwrap();
        assert!(load_safetensors(file.path(), &Device::Cpu).is_err());
    }
}
