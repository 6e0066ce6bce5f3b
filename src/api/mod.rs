use axum::http::Method;
use axum::{response::IntoResponse, routing::get, Extension, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::{Modify, OpenApi};
use utoipa_redoc::{Redoc, Servable};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::database::SqliteDatabase;
use crate::errors::{AppError, Result};
use crate::providers::{http_client, ProviderRegistry, RoutingTable};
use crate::services::auth::AuthService;
use crate::services::kyc_service::KycService;
use crate::services::notification_service::{LogNotifier, Notifier, SmtpNotifier};
use crate::services::package_service::PackageService;
use crate::services::risk_parameter_service::RiskParameterService;
use crate::services::storage::SupabaseStorage;
use crate::utils::middleware::{request_id_middleware, RateLimiter};

pub mod routes;
pub mod types;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::list_packages,
        routes::create_package,
        routes::get_package,
        routes::update_package,
        routes::delete_package,
        routes::create_submission,
        routes::list_package_submissions,
        routes::get_submission,
        routes::update_submission_status,
        routes::list_org_submissions,
        routes::list_risk_parameters,
        routes::create_risk_parameter,
        routes::get_risk_parameter,
        routes::update_risk_parameter,
        routes::delete_risk_parameter,
        routes::idenfy_callback,
        routes::onebrick_callback,
        routes::creditchek_callback,
        routes::okra_callback,
    ),
    components(
        schemas(
            types::CreateSubmissionRequest,
            types::UpdateStatusRequest,
            types::PackageRequest,
            types::RiskParameterRequest,
            types::MessageResponse,
            crate::models::kyc::KycSubmission,
            crate::models::kyc::SubmissionStatus,
            crate::models::kyc::RiskLevel,
            crate::models::kyc::UserInfo,
            crate::models::kyc::PassportInfo,
            crate::models::kyc::EmploymentInfo,
            crate::models::kyc::BankInfo,
            crate::models::kyc::AddressInfo,
            crate::models::package::Package,
            crate::models::risk_parameter::RiskParameter,
        )
    ),
    tags(
        (name = "Packages", description = "KYC packages an organization offers to applicants"),
        (name = "KYC", description = "Applicant submissions. Creation is public; everything else needs a bearer token."),
        (name = "Risk parameters", description = "Thresholds used to score provider results"),
        (name = "Webhooks", description = "Provider callbacks")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityRequirement, SecurityScheme};
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearerAuth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
            );
        }
        openapi.security = Some(vec![SecurityRequirement::new("bearerAuth", Vec::<String>::new())]);
    }
}

/// Everything a handler needs, shared through an `Extension`.
pub struct AppState {
    pub config: AppConfig,
    pub auth: AuthService,
    pub kyc: KycService,
    pub packages: PackageService,
    pub risk_parameters: RiskParameterService,
}

impl AppState {
    pub fn new(config: AppConfig, db: Arc<SqliteDatabase>, kyc: KycService) -> Self {
        Self {
            auth: AuthService::new(config.jwt_secret.clone()),
            packages: PackageService::new(db.clone(), db.clone(), db.clone()),
            risk_parameters: RiskParameterService::new(db.clone(), db),
            kyc,
            config,
        }
    }
}

/// Wires the production adapters, storage and notifier around `db`.
pub fn build_state(config: AppConfig, db: Arc<SqliteDatabase>) -> Result<AppState> {
    let client = http_client(config.http_timeout_secs)?;
    let storage = Arc::new(SupabaseStorage::new(client.clone(), config.storage.clone()));
    let providers = ProviderRegistry::from_config(&config, client, storage);

    let notifier: Arc<dyn Notifier> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpNotifier::new(
            smtp,
            &config.from_email,
            Duration::from_secs(config.http_timeout_secs),
        )?),
        None => {
            info!(action = "smtp_not_configured", notifier = "log");
            Arc::new(LogNotifier)
        }
    };

    let kyc = KycService::new(
        db.clone(),
        db.clone(),
        db.clone(),
        providers,
        RoutingTable::default(),
        notifier,
    )?;

    Ok(AppState::new(config, db, kyc))
}

pub fn router(state: Arc<AppState>) -> Router {
    let openapi = ApiDoc::openapi();
    let limiter = Arc::new(RateLimiter::new(state.config.rate_limit_per_sec, 1));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .nest("/packages", routes::package_router(limiter))
        .nest("/kyc-submissions", routes::submission_router())
        .nest("/risk-parameters", routes::risk_parameter_router())
        .merge(routes::callback_router())
        .route("/health", get(health_check))
        // Swagger UI
        .merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", openapi.clone()))
        // Redoc UI
        .merge(Redoc::with_url("/api/redoc", openapi))
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
}

/// Main entry point for the KYC API server.
pub async fn start_http_server(config: AppConfig) -> Result<()> {
    let db = Arc::new(SqliteDatabase::connect(&config.database_url).await?);
    let port = config.port;
    let state = Arc::new(build_state(config, db)?);
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::ConfigurationError(format!("Failed to bind {}: {}", addr, e)))?;

    info!(action = "server_started", addr = %addr, docs = "/api/docs");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|e| AppError::InternalError(format!("Server error: {}", e)))
}

async fn health_check() -> impl IntoResponse {
    "OK"
}
