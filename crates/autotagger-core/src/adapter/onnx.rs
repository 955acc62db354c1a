//! ONNX Runtime session shared by both tagger families.

use std::path::Path;

use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;

use crate::error::PipelineError;

/// A loaded tagger graph taking `[N, H, W, 3]` and returning `[N, labels]`.
pub(crate) struct TaggerSession {
    model: String,
    session: Session,
    /// Name of the input tensor (detected from model metadata).
    input_name: String,
}

impl TaggerSession {
    pub fn load(model: &str, model_path: &Path) -> Result<Self, PipelineError> {
        let load_err = |message: String| PipelineError::ModelLoad {
            model: model.to_string(),
            message,
        };

        let session = Session::builder()
            .map_err(|e| load_err(format!("Failed to create ONNX session builder: {e}")))?
            .commit_from_file(model_path)
            .map_err(|e| load_err(format!("Failed to load {}: {e}", model_path.display())))?;

        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .unwrap_or_else(|| "input_1".to_string());

        tracing::debug!(
            "Loaded {} from {:?} (input: {:?}, outputs: {:?})",
            model,
            model_path,
            input_name,
            session
                .outputs()
                .iter()
                .map(|o| o.name())
                .collect::<Vec<_>>()
        );

        Ok(Self {
            model: model.to_string(),
            session,
            input_name,
        })
    }

    /// Run a stack of `[1, H, W, 3]` tensors in one call; one score row per tensor.
    pub fn predict(&mut self, tensors: &[Array4<f32>]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let batch_size = tensors.len();
        if batch_size == 0 {
            return Ok(vec![]);
        }

        let shape_0 = tensors[0].shape().to_vec();
        if let Some(bad) = tensors.iter().find(|t| t.shape() != shape_0.as_slice()) {
            return Err(self.err(format!(
                "Tensor shape mismatch in batch: expected {:?}, got {:?}",
                shape_0,
                bad.shape()
            )));
        }

        let mut flat_data = Vec::with_capacity(batch_size * tensors[0].len());
        for t in tensors {
            flat_data.extend(t.iter().copied());
        }
        let batch_shape: Vec<i64> = vec![
            batch_size as i64,
            shape_0[1] as i64,
            shape_0[2] as i64,
            shape_0[3] as i64,
        ];

        let input_value = Value::from_array((batch_shape, flat_data))
            .map_err(|e| self.err(format!("Failed to create input tensor: {e}")))?;
        let inputs = ort::inputs![self.input_name.as_str() => input_value];

        let model = self.model.clone();
        let infer_err = |message: String| PipelineError::Inference {
            model: model.clone(),
            message,
        };

        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| infer_err(format!("ONNX inference failed: {e}")))?;

        let (_, first) = outputs
            .iter()
            .next()
            .ok_or_else(|| infer_err("Model produced no outputs".to_string()))?;
        let (shape, data) = first
            .try_extract_tensor::<f32>()
            .map_err(|e| infer_err(format!("Failed to extract output tensor: {e}")))?;

        let labels = match shape.len() {
            1 => data.len() / batch_size,
            2 => shape[1] as usize,
            _ => return Err(infer_err(format!("Unexpected output shape: {:?}", shape))),
        };
        if labels == 0 || data.len() < labels * batch_size {
            return Err(infer_err(format!(
                "Output of {} values is too small for a batch of {}",
                data.len(),
                batch_size
            )));
        }

        Ok(data
            .chunks(labels)
            .take(batch_size)
            .map(<[f32]>::to_vec)
            .collect())
    }

    fn err(&self, message: String) -> PipelineError {
        PipelineError::Inference {
            model: self.model.clone(),
            message,
        }
    }
}
