use actix_web::{web, HttpRequest, HttpResponse};
use log::{error, info, warn};
use shared::{ChatRequest, ChatResponse, HealthResponse, ReportRequest, ReportResponse, ServiceKind};
use std::sync::Arc;
use uuid::Uuid;

use crate::acquisition::{ImageAcquirer, ImageReference};
use crate::config::{AppConfig, ConfigError, ModelsConfig};
use crate::error::{ApiError, CHAT_INVALID_INPUT, REPORT_MISSING_PATH};
use crate::llm::{ChatCompletionClient, ReportGenerator};
use crate::model::load_for_service;
use crate::pipeline::{triage, DiagnosticPipeline, TriageOutcome};
use crate::prompt::{ReportFamily, UNSUPPORTED_LANGUAGE_REPLY};

/// Process-wide state handed to every handler. Everything in here is
/// read-only after startup.
pub struct AppState {
    pub service: ServiceKind,
    pub generator: Arc<dyn ReportGenerator>,
    pub ecg: DiagnosticPipeline,
    pub xray: DiagnosticPipeline,
}

impl AppState {
    /// Loads the classifiers this process serves and builds one shared HTTP
    /// client for image fetches and the chat-completion API.
    pub fn from_config(config: &AppConfig, models: &ModelsConfig) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("medinsight/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let generator: Arc<dyn ReportGenerator> = Arc::new(ChatCompletionClient::new(http.clone(), &config.llm)?);
        let acquirer = ImageAcquirer::new(http);

        let ecg = load_for_service(&models.ecg, config.service, ServiceKind::Ecg)?;
        let xray = load_for_service(&models.xray, config.service, ServiceKind::Xray)?;

        Ok(Self {
            service: config.service,
            generator,
            ecg: DiagnosticPipeline::new(ReportFamily::Ecg, acquirer.clone(), ecg),
            xray: DiagnosticPipeline::new(ReportFamily::Xray, acquirer, xray),
        })
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, service: ServiceKind) {
    cfg.service(web::resource("/health").route(web::get().to(health)));

    if service.serves(ServiceKind::Chat) {
        cfg.service(
            web::resource("/chat")
                .app_data(json_config(CHAT_INVALID_INPUT))
                .route(web::post().to(chat)),
        );
    }
    if service.serves(ServiceKind::Ecg) {
        cfg.service(
            web::resource("/ecg")
                .app_data(json_config(REPORT_MISSING_PATH))
                .route(web::post().to(ecg_report)),
        );
    }
    if service.serves(ServiceKind::Xray) {
        cfg.service(
            web::resource("/model")
                .app_data(json_config(REPORT_MISSING_PATH))
                .route(web::post().to(xray_report)),
        );
    }
}

/// Malformed or non-JSON bodies get the route's validation message instead
/// of actix's plain-text 400.
fn json_config(message: &'static str) -> web::JsonConfig {
    web::JsonConfig::default().error_handler(move |err, req: &HttpRequest| {
        warn!("Rejected body for {}: {}", req.path(), err);
        ApiError::Validation(message).into()
    })
}

async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".into(),
        service: state.service.to_string(),
    })
}

async fn chat(state: web::Data<AppState>, body: web::Json<ChatRequest>) -> Result<HttpResponse, ApiError> {
    let ChatRequest {
        prompt,
        user_data,
        language,
    } = body.into_inner();
    let (Some(prompt), Some(user_data), Some(language)) = (prompt, user_data, language) else {
        warn!("Rejected /chat request with missing keys");
        return Err(ApiError::Validation(CHAT_INVALID_INPUT));
    };

    let request_id = Uuid::new_v4();
    info!("[{}] /chat request, language={}", request_id, language);

    match triage(&language, &user_data, &prompt, state.generator.as_ref()).await {
        Ok(TriageOutcome::Reply(response)) => {
            info!("[{}] /chat response generated", request_id);
            Ok(HttpResponse::Ok().json(ChatResponse { response }))
        }
        Ok(TriageOutcome::UnsupportedLanguage(code)) => {
            warn!("[{}] /chat unsupported language: {}", request_id, code);
            Ok(HttpResponse::Ok().json(ChatResponse {
                response: UNSUPPORTED_LANGUAGE_REPLY.to_string(),
            }))
        }
        Err(e) => {
            error!("[{}] /chat generation failed: {:?}", request_id, e);
            Err(ApiError::Chat(e))
        }
    }
}

async fn ecg_report(state: web::Data<AppState>, body: web::Json<ReportRequest>) -> Result<HttpResponse, ApiError> {
    run_report(&state.ecg, state.generator.as_ref(), body.into_inner()).await
}

async fn xray_report(state: web::Data<AppState>, body: web::Json<ReportRequest>) -> Result<HttpResponse, ApiError> {
    run_report(&state.xray, state.generator.as_ref(), body.into_inner()).await
}

async fn run_report(
    pipeline: &DiagnosticPipeline,
    generator: &dyn ReportGenerator,
    request: ReportRequest,
) -> Result<HttpResponse, ApiError> {
    let raw = request
        .file_path
        .filter(|path| !path.trim().is_empty())
        .ok_or(ApiError::Validation(REPORT_MISSING_PATH))?;

    let request_id = Uuid::new_v4();
    let modality = pipeline.family().modality();
    info!("[{}] {} report requested", request_id, modality);

    let reference = ImageReference::parse(raw.trim());
    match pipeline.run(&reference, generator).await {
        Ok(report) => {
            info!(
                "[{}] {} report generated for label {}",
                request_id, modality, report.classification.label
            );
            Ok(HttpResponse::Ok().json(ReportResponse {
                prediction: report.report,
            }))
        }
        Err(e) => {
            error!("[{}] {} report failed: {:?}", request_id, modality, e);
            Err(ApiError::Report(e))
        }
    }
}
