use shared::ServiceKind;
use std::sync::Arc;

use crate::classifier::{ClassifierAdapter, Predictor};
use crate::config::{ClassifierSpec, ConfigError};

/// Loads the classifier described by `spec` once, at startup. Services that
/// are not exposed by this process get an unloaded adapter.
pub fn load_classifier(spec: &ClassifierSpec, enabled: bool) -> Result<ClassifierAdapter, ConfigError> {
    if !enabled {
        return Ok(ClassifierAdapter::unloaded(spec.input, spec.policy.clone()));
    }
    let predictor = load_predictor(spec)?;
    log::info!(
        "Loaded classifier {} ({}x{}, {:?}, {:?})",
        spec.model_path.display(),
        spec.input.width,
        spec.input.height,
        spec.input.channel_order,
        spec.input.layout
    );
    Ok(ClassifierAdapter::new(predictor, spec.input, spec.policy.clone()))
}

/// Loads the classifier behind `kind` for a process running `service`. A
/// single image service cannot start without its model runtime. The combined
/// process keeps `/chat` up and leaves the image routes unloaded, so they
/// answer with a classification failure.
pub fn load_for_service(
    spec: &ClassifierSpec,
    service: ServiceKind,
    kind: ServiceKind,
) -> Result<ClassifierAdapter, ConfigError> {
    match load_classifier(spec, service.serves(kind)) {
        Err(ConfigError::RuntimeUnavailable(path)) if service == ServiceKind::All => {
            log::error!(
                "{} classifier {} not loaded: no model runtime compiled in, {} reports will fail",
                kind,
                path.display(),
                kind
            );
            Ok(ClassifierAdapter::unloaded(spec.input, spec.policy.clone()))
        }
        other => other,
    }
}

#[cfg(feature = "torch")]
fn load_predictor(spec: &ClassifierSpec) -> Result<Arc<dyn Predictor>, ConfigError> {
    Ok(Arc::new(torch::TorchPredictor::load(spec)?))
}

#[cfg(not(feature = "torch"))]
fn load_predictor(spec: &ClassifierSpec) -> Result<Arc<dyn Predictor>, ConfigError> {
    Err(ConfigError::RuntimeUnavailable(spec.model_path.clone()))
}

#[cfg(feature = "torch")]
mod torch {
    use std::sync::Mutex;
    use tch::{CModule, Device, Kind, Tensor};

    use crate::classifier::{InferenceError, Predictor};
    use crate::config::{ClassifierSpec, ConfigError};
    use crate::normalizer::{NormalizedTensor, TensorLayout};

    /// TorchScript export of a classifier. `CModule` is `Send` but not `Sync`,
    /// so forward passes are serialized through the mutex.
    pub struct TorchPredictor {
        module: Mutex<CModule>,
        device: Device,
        layout: TensorLayout,
    }

    impl TorchPredictor {
        pub fn load(spec: &ClassifierSpec) -> Result<Self, ConfigError> {
            let device = Device::cuda_if_available();
            let module = CModule::load_on_device(&spec.model_path, device).map_err(|e| ConfigError::ModelLoad {
                path: spec.model_path.clone(),
                reason: e.to_string(),
            })?;
            Ok(Self {
                module: Mutex::new(module),
                device,
                layout: spec.input.layout,
            })
        }
    }

    impl Predictor for TorchPredictor {
        fn predict(&self, tensor: &NormalizedTensor) -> Result<Vec<f64>, InferenceError> {
            let [n, h, w, c] = tensor.shape().map(|d| d as i64);
            let nhwc = Tensor::from_slice(&tensor.to_vec()).view([n, h, w, c]);
            let input = match self.layout {
                TensorLayout::ChannelsLast => nhwc,
                TensorLayout::ChannelsFirst => nhwc.permute([0, 3, 1, 2]).contiguous(),
            }
            .to_device(self.device);

            let module = self
                .module
                .lock()
                .map_err(|_| InferenceError::Runtime("model lock poisoned".into()))?;
            let output = tch::no_grad(|| module.forward_ts(&[input]))
                .map_err(|e| InferenceError::Runtime(e.to_string()))?;

            let flat = output.to_kind(Kind::Double).to_device(Device::Cpu).view([-1]);
            Vec::<f64>::try_from(&flat).map_err(|e| InferenceError::Runtime(e.to_string()))
        }
    }
}
