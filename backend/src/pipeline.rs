use actix_web::web;

use crate::acquisition::{AcquisitionError, ImageAcquirer, ImageReference};
use crate::classifier::{ClassificationResult, ClassifierAdapter, InferenceError};
use crate::llm::{LlmResponse, ReportGenerator, UpstreamError};
use crate::normalizer::normalize;
use crate::prompt::{compile_report, compile_triage, parse_language, ReportFamily};

pub const REPORT_GENERATION_FAILED: &str = "Report generation failed";

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl PipelineError {
    /// Stable, non-leaky message for clients. Full detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            PipelineError::Acquisition(e) => e.to_string(),
            PipelineError::Inference(_) => "Image classification failed".to_string(),
            PipelineError::Upstream(_) => REPORT_GENERATION_FAILED.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticReport {
    pub classification: ClassificationResult,
    pub report: LlmResponse,
}

/// Image report flow for one modality:
/// acquire -> normalize -> classify -> compile -> generate.
#[derive(Clone)]
pub struct DiagnosticPipeline {
    family: ReportFamily,
    acquirer: ImageAcquirer,
    classifier: ClassifierAdapter,
}

impl DiagnosticPipeline {
    pub fn new(family: ReportFamily, acquirer: ImageAcquirer, classifier: ClassifierAdapter) -> Self {
        Self {
            family,
            acquirer,
            classifier,
        }
    }

    pub fn family(&self) -> ReportFamily {
        self.family
    }

    /// Whether a classifier is loaded behind this pipeline.
    pub fn is_ready(&self) -> bool {
        self.classifier.is_loaded()
    }

    pub async fn run(
        &self,
        reference: &ImageReference,
        generator: &dyn ReportGenerator,
    ) -> Result<DiagnosticReport, PipelineError> {
        let image = self.acquirer.acquire(reference).await?;

        let classifier = self.classifier.clone();
        let classification = web::block(move || {
            let tensor = normalize(&image, classifier.input());
            classifier.classify(&tensor)
        })
        .await
        .map_err(|e| InferenceError::Runtime(e.to_string()))??;

        log::info!(
            "{} classified as {} (score {:.4})",
            self.family.modality(),
            classification.label,
            classification.confidence
        );

        let prompt = compile_report(self.family, &classification, reference);
        let report = generator.generate(&prompt).await?;
        Ok(DiagnosticReport {
            classification,
            report,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TriageOutcome {
    Reply(LlmResponse),
    UnsupportedLanguage(String),
}

/// Symptom-advice flow. An unsupported language code short-circuits before
/// the generator is touched.
pub async fn triage(
    language: &str,
    user_data: &str,
    prompt: &str,
    generator: &dyn ReportGenerator,
) -> Result<TriageOutcome, UpstreamError> {
    let language = match parse_language(language) {
        Ok(language) => language,
        Err(unsupported) => return Ok(TriageOutcome::UnsupportedLanguage(unsupported.0)),
    };
    let compiled = compile_triage(language, user_data, prompt);
    let reply = generator.generate(&compiled).await?;
    Ok(TriageOutcome::Reply(reply))
}
