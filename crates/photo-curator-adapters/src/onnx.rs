//! ONNX attribute engine on tract.

use std::path::Path;

use anyhow::{Context, Result};
use photo_curator_core::{AttributeEngine, RawOutput};
use tracing::{debug, info, warn};
use tract_onnx::prelude::{
    tvec, DatumExt, Framework, Graph, InferenceModelExt, IntoTensor, SimplePlan, Tensor,
    TypedFact, TypedModel, TypedOp,
};

type RunnableModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Face attribute model loaded from an ONNX file.
///
/// The input is pinned to `(1, 3, S, S)` f32 so models exported with dynamic
/// axes can still be optimized.
pub struct TractAttributeEngine {
    runnable: RunnableModel,
    output_names: Vec<String>,
    name: String,
}

impl std::fmt::Debug for TractAttributeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TractAttributeEngine")
            .field("name", &self.name)
            .field("output_names", &self.output_names)
            .finish_non_exhaustive()
    }
}

impl TractAttributeEngine {
    /// Loads and prepares a model for `input_size`×`input_size` inputs.
    ///
    /// Falls back to the decluttered (unoptimized) graph when optimization
    /// fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or the graph cannot be made
    /// runnable.
    pub fn load(path: impl AsRef<Path>, input_size: u32) -> Result<Self> {
        let path = path.as_ref();
        anyhow::ensure!(path.exists(), "Model file not found: {}", path.display());

        let (runnable, output_names) = match load_runnable(path, input_size, true) {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(
                    "Attribute model {} failed optimized load ({e}); using decluttered graph",
                    path.display()
                );
                load_runnable(path, input_size, false).with_context(|| {
                    format!("Decluttered attribute graph failed after optimize error: {e}")
                })?
            }
        };

        let name = path
            .file_stem()
            .map_or_else(|| "onnx".to_string(), |s| s.to_string_lossy().into_owned());
        info!(
            "Loaded attribute model {} ({} outputs: {})",
            path.display(),
            output_names.len(),
            output_names.join(", ")
        );
        Ok(Self {
            runnable,
            output_names,
            name,
        })
    }

    /// Output names in model order.
    #[must_use]
    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }
}

fn load_runnable(
    path: &Path,
    input_size: u32,
    optimized: bool,
) -> Result<(RunnableModel, Vec<String>)> {
    let size = input_size as usize;
    let typed = tract_onnx::onnx()
        .model_for_path(path)
        .with_context(|| format!("Failed to parse ONNX graph from {}", path.display()))?
        .with_input_fact(0, f32::fact([1, 3, size, size]).into())
        .map_err(|e| anyhow::anyhow!("Unable to pin attribute model input: {e}"))?
        .into_typed()
        .map_err(|e| anyhow::anyhow!("Unable to type-check attribute model: {e}"))?;
    let names = output_names(&typed)?;

    let typed = if optimized {
        typed
            .into_optimized()
            .map_err(|e| anyhow::anyhow!("Unable to optimize attribute model: {e}"))?
    } else {
        typed
            .into_decluttered()
            .map_err(|e| anyhow::anyhow!("Unable to declutter attribute model: {e}"))?
    };
    let runnable = typed
        .into_runnable()
        .map_err(|e| anyhow::anyhow!("Unable to make attribute model runnable: {e}"))?;
    Ok((runnable, names))
}

fn output_names(model: &TypedModel) -> Result<Vec<String>> {
    Ok(model
        .output_outlets()?
        .iter()
        .map(|outlet| {
            model
                .outlet_label(*outlet)
                .map_or_else(|| model.node(outlet.node).name.clone(), str::to_string)
        })
        .collect())
}

impl AttributeEngine for TractAttributeEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn infer(&self, input: &candle_core::Tensor) -> Result<Vec<RawOutput>> {
        let dims = input.dims().to_vec();
        let data = input.flatten_all()?.to_vec1::<f32>()?;
        let tensor = Tensor::from_shape(&dims, &data)?;

        let outputs = self
            .runnable
            .run(tvec![tensor.into()])
            .context("Attribute model execution failed")?;

        outputs
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                let tensor = value.into_tensor();
                let shape = tensor.shape().to_vec();
                let data = tensor.cast_to::<f32>()?.as_slice::<f32>()?.to_vec();
                let name = self
                    .output_names
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("output_{i}"));
                debug!("{name}: shape {shape:?}");
                Ok(RawOutput::new(name, shape, data))
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_file() {
        let err = TractAttributeEngine::load("/nonexistent/attributes.onnx", 112).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_garbage_model_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attributes.onnx");
        std::fs::write(&path, b"definitely not protobuf").unwrap();
        assert!(TractAttributeEngine::load(&path, 112).is_err());
    }
}
