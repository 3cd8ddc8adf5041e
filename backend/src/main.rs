use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use medinsight_backend::config::{AppConfig, ModelsConfig};
use medinsight_backend::routes::{configure_routes, AppState};
use std::env;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    }

    let config = AppConfig::from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, format!("Configuration failed: {}", e))
    })?;
    log::info!("Configuration loaded: {:?}", config);

    let models = ModelsConfig::load(&config.models_config).map_err(|e| {
        log::error!("Failed to load models config: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, format!("Models config failed: {}", e))
    })?;

    let state = AppState::from_config(&config, &models).map_err(|e| {
        log::error!("Failed to preload models at startup: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, format!("Model loading failed: {}", e))
    })?;
    let state = web::Data::new(state);

    let service = config.service;
    let bind_address = config.bind_address();
    log::info!("Starting {} service on {}", service, bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .wrap(Logger::new("%r %s %Dms"))
            .app_data(state.clone())
            .configure(|cfg| configure_routes(cfg, service))
    })
    .bind(&bind_address)?
    .run()
    .await
}
