use axum::{
    body::Bytes,
    extract::{FromRequestParts, Path},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::api::types::*;
use crate::api::AppState;
use crate::errors::{AppError, Result};
use crate::models::auth::AuthContext;
use crate::models::kyc::KycSubmission;
use crate::models::package::Package;
use crate::models::risk_parameter::RiskParameter;
use crate::providers::ProviderKind;
use crate::services::kyc_service::CreateSubmission;
use crate::utils::middleware::{rate_limiter_middleware, RateLimiter};

// JWT extractor for Authorization: Bearer ...
pub struct AuthBearer(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthBearer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        if let Some(auth) = parts.headers.get(AUTHORIZATION) {
            if let Ok(auth_str) = auth.to_str() {
                if let Some(token) = auth_str.strip_prefix("Bearer ") {
                    return Ok(AuthBearer(token.trim().to_string()));
                }
            }
        }
        Err(AppError::Unauthorized("Missing or invalid Authorization header".to_string()))
    }
}

fn auth_context(state: &AppState, token: &str) -> Result<AuthContext> {
    state.auth.validate_token(token)
}

/// Package and submission endpoints. Submission creation is public and
/// sits behind the per-IP rate limiter.
pub fn package_router(limiter: Arc<RateLimiter>) -> Router {
    let create = post(create_submission)
        .layer::<_, std::convert::Infallible>(middleware::from_fn(rate_limiter_middleware))
        .layer(Extension(limiter));

    Router::new()
        .route("/", get(list_packages).post(create_package))
        .route("/:package_id", get(get_package).put(update_package).delete(delete_package))
        .route("/:package_id/kyc-submissions", get(list_package_submissions).merge(create))
        .route(
            "/:package_id/kyc-submissions/:kyc_id",
            get(get_submission).put(update_submission_status),
        )
}

pub fn submission_router() -> Router {
    Router::new().route("/", get(list_org_submissions))
}

pub fn risk_parameter_router() -> Router {
    Router::new()
        .route("/", get(list_risk_parameters).post(create_risk_parameter))
        .route(
            "/:id",
            get(get_risk_parameter).put(update_risk_parameter).delete(delete_risk_parameter),
        )
}

pub fn callback_router() -> Router {
    Router::new()
        .route("/idenfy/callback", post(idenfy_callback))
        .route("/onebrick/callback", post(onebrick_callback))
        .route("/creditcheck/callback", post(creditchek_callback))
        .route("/okra/callback", post(okra_callback))
}

// ---- Packages ----

#[utoipa::path(get, path = "/packages", tag = "Packages",
    responses((status = 200, body = [Package]), (status = 401, body = MessageResponse)))]
pub async fn list_packages(
    Extension(state): Extension<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
) -> Result<Json<Vec<Package>>> {
    let auth = auth_context(&state, &token)?;
    Ok(Json(state.packages.list(&auth).await?))
}

#[utoipa::path(post, path = "/packages", tag = "Packages", request_body = PackageRequest,
    responses((status = 201, body = Package), (status = 400, body = MessageResponse), (status = 404, body = MessageResponse)))]
pub async fn create_package(
    Extension(state): Extension<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Json(req): Json<PackageRequest>,
) -> Result<(StatusCode, Json<Package>)> {
    let auth = auth_context(&state, &token)?;
    let package = state.packages.create(&auth, req.validate()?).await?;
    Ok((StatusCode::CREATED, Json(package)))
}

#[utoipa::path(get, path = "/packages/{package_id}", tag = "Packages",
    params(("package_id" = Uuid, Path, description = "Package id")),
    responses((status = 200, body = Package), (status = 404, body = MessageResponse)))]
pub async fn get_package(
    Extension(state): Extension<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Path(package_id): Path<Uuid>,
) -> Result<Json<Package>> {
    let auth = auth_context(&state, &token)?;
    Ok(Json(state.packages.get(&auth, &package_id).await?))
}

#[utoipa::path(put, path = "/packages/{package_id}", tag = "Packages", request_body = PackageRequest,
    params(("package_id" = Uuid, Path, description = "Package id")),
    responses((status = 200, body = Package), (status = 404, body = MessageResponse)))]
pub async fn update_package(
    Extension(state): Extension<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Path(package_id): Path<Uuid>,
    Json(req): Json<PackageRequest>,
) -> Result<Json<Package>> {
    let auth = auth_context(&state, &token)?;
    Ok(Json(state.packages.update(&auth, &package_id, req.validate()?).await?))
}

#[utoipa::path(delete, path = "/packages/{package_id}", tag = "Packages",
    params(("package_id" = Uuid, Path, description = "Package id")),
    responses((status = 200, body = MessageResponse), (status = 400, body = MessageResponse), (status = 404, body = MessageResponse)))]
pub async fn delete_package(
    Extension(state): Extension<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Path(package_id): Path<Uuid>,
) -> Result<Json<MessageResponse>> {
    let auth = auth_context(&state, &token)?;
    state.packages.delete(&auth, &package_id).await?;
    Ok(Json(MessageResponse::new("Package deleted")))
}

// ---- KYC submissions ----

#[utoipa::path(post, path = "/packages/{package_id}/kyc-submissions", tag = "KYC",
    request_body = CreateSubmissionRequest,
    params(("package_id" = Uuid, Path, description = "Package the applicant applies to")),
    security(()),
    responses(
        (status = 201, body = KycSubmission),
        (status = 400, body = MessageResponse),
        (status = 404, body = MessageResponse),
        (status = 409, body = MessageResponse),
        (status = 429, description = "Too many requests"),
        (status = 502, body = MessageResponse)
    ))]
pub async fn create_submission(
    Extension(state): Extension<Arc<AppState>>,
    Path(package_id): Path<Uuid>,
    Json(req): Json<CreateSubmissionRequest>,
) -> Result<(StatusCode, Json<KycSubmission>)> {
    req.validate()?;
    let submission = state
        .kyc
        .create(CreateSubmission {
            package_id,
            user_info: req.into_user_info(),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

#[utoipa::path(get, path = "/packages/{package_id}/kyc-submissions", tag = "KYC",
    params(("package_id" = Uuid, Path, description = "Package id")),
    responses((status = 200, body = [KycSubmission]), (status = 404, body = MessageResponse)))]
pub async fn list_package_submissions(
    Extension(state): Extension<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Path(package_id): Path<Uuid>,
) -> Result<Json<Vec<KycSubmission>>> {
    let auth = auth_context(&state, &token)?;
    Ok(Json(state.kyc.get_by_package(&auth, &package_id).await?))
}

#[utoipa::path(get, path = "/packages/{package_id}/kyc-submissions/{kyc_id}", tag = "KYC",
    params(
        ("package_id" = Uuid, Path, description = "Package id"),
        ("kyc_id" = Uuid, Path, description = "Submission id")
    ),
    responses((status = 200, body = KycSubmission), (status = 404, body = MessageResponse)))]
pub async fn get_submission(
    Extension(state): Extension<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Path((package_id, kyc_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<KycSubmission>> {
    let auth = auth_context(&state, &token)?;
    Ok(Json(state.kyc.get_by_id(&auth, &package_id, &kyc_id).await?))
}

#[utoipa::path(put, path = "/packages/{package_id}/kyc-submissions/{kyc_id}", tag = "KYC",
    request_body = UpdateStatusRequest,
    params(
        ("package_id" = Uuid, Path, description = "Package id"),
        ("kyc_id" = Uuid, Path, description = "Submission id")
    ),
    responses(
        (status = 200, body = KycSubmission),
        (status = 400, body = MessageResponse),
        (status = 404, body = MessageResponse),
        (status = 409, body = MessageResponse),
        (status = 502, description = "Status saved but the applicant e-mail failed", body = MessageResponse)
    ))]
pub async fn update_submission_status(
    Extension(state): Extension<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Path((package_id, kyc_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<KycSubmission>> {
    let auth = auth_context(&state, &token)?;
    let status = req.validate()?;
    let submission = state
        .kyc
        .update_status_by_id(&auth, &package_id, &kyc_id, status)
        .await?;
    Ok(Json(submission))
}

#[utoipa::path(get, path = "/kyc-submissions", tag = "KYC",
    responses((status = 200, body = [KycSubmission]), (status = 401, body = MessageResponse)))]
pub async fn list_org_submissions(
    Extension(state): Extension<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
) -> Result<Json<Vec<KycSubmission>>> {
    let auth = auth_context(&state, &token)?;
    Ok(Json(state.kyc.get_by_org(&auth).await?))
}

// ---- Risk parameters ----

#[utoipa::path(get, path = "/risk-parameters", tag = "Risk parameters",
    responses((status = 200, body = [RiskParameter])))]
pub async fn list_risk_parameters(
    Extension(state): Extension<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
) -> Result<Json<Vec<RiskParameter>>> {
    let auth = auth_context(&state, &token)?;
    Ok(Json(state.risk_parameters.list(&auth).await?))
}

#[utoipa::path(post, path = "/risk-parameters", tag = "Risk parameters", request_body = RiskParameterRequest,
    responses((status = 201, body = RiskParameter), (status = 400, body = MessageResponse)))]
pub async fn create_risk_parameter(
    Extension(state): Extension<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Json(req): Json<RiskParameterRequest>,
) -> Result<(StatusCode, Json<RiskParameter>)> {
    let auth = auth_context(&state, &token)?;
    let params = state.risk_parameters.create(&auth, req.validate()?).await?;
    Ok((StatusCode::CREATED, Json(params)))
}

#[utoipa::path(get, path = "/risk-parameters/{id}", tag = "Risk parameters",
    params(("id" = Uuid, Path, description = "Risk parameter id")),
    responses((status = 200, body = RiskParameter), (status = 404, body = MessageResponse)))]
pub async fn get_risk_parameter(
    Extension(state): Extension<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Path(id): Path<Uuid>,
) -> Result<Json<RiskParameter>> {
    let auth = auth_context(&state, &token)?;
    Ok(Json(state.risk_parameters.get(&auth, &id).await?))
}

#[utoipa::path(put, path = "/risk-parameters/{id}", tag = "Risk parameters", request_body = RiskParameterRequest,
    params(("id" = Uuid, Path, description = "Risk parameter id")),
    responses((status = 200, body = RiskParameter), (status = 404, body = MessageResponse)))]
pub async fn update_risk_parameter(
    Extension(state): Extension<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Path(id): Path<Uuid>,
    Json(req): Json<RiskParameterRequest>,
) -> Result<Json<RiskParameter>> {
    let auth = auth_context(&state, &token)?;
    Ok(Json(state.risk_parameters.update(&auth, &id, req.validate()?).await?))
}

#[utoipa::path(delete, path = "/risk-parameters/{id}", tag = "Risk parameters",
    params(("id" = Uuid, Path, description = "Risk parameter id")),
    responses((status = 200, body = MessageResponse), (status = 400, body = MessageResponse), (status = 404, body = MessageResponse)))]
pub async fn delete_risk_parameter(
    Extension(state): Extension<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>> {
    let auth = auth_context(&state, &token)?;
    state.risk_parameters.delete(&auth, &id).await?;
    Ok(Json(MessageResponse::new("Risk parameter deleted")))
}

// ---- Provider webhooks ----

async fn handle_callback(state: &AppState, kind: ProviderKind, body: &[u8]) -> Result<Json<MessageResponse>> {
    let provider = state.kyc.providers().get(kind)?;
    let callback = provider.parse_callback(body).await?;

    if callback.is_unrecognized() {
        info!(action = "kyc_callback_ignored", provider = %kind);
        return Ok(Json(MessageResponse::new("ignored")));
    }

    state.kyc.update_by_provider_info(callback).await?;
    Ok(Json(MessageResponse::new("ok")))
}

#[utoipa::path(post, path = "/idenfy/callback", tag = "Webhooks", security(()),
    responses((status = 200, body = MessageResponse), (status = 404, body = MessageResponse), (status = 502, body = MessageResponse)))]
pub async fn idenfy_callback(Extension(state): Extension<Arc<AppState>>, body: Bytes) -> Result<Json<MessageResponse>> {
    handle_callback(&state, ProviderKind::Idenfy, &body).await
}

#[utoipa::path(post, path = "/onebrick/callback", tag = "Webhooks", security(()),
    responses((status = 200, body = MessageResponse), (status = 404, body = MessageResponse), (status = 502, body = MessageResponse)))]
pub async fn onebrick_callback(Extension(state): Extension<Arc<AppState>>, body: Bytes) -> Result<Json<MessageResponse>> {
    handle_callback(&state, ProviderKind::OneBrick, &body).await
}

#[utoipa::path(post, path = "/creditcheck/callback", tag = "Webhooks", security(()),
    responses((status = 200, body = MessageResponse), (status = 404, body = MessageResponse), (status = 502, body = MessageResponse)))]
pub async fn creditchek_callback(Extension(state): Extension<Arc<AppState>>, body: Bytes) -> Result<Json<MessageResponse>> {
    handle_callback(&state, ProviderKind::CreditChek, &body).await
}

#[utoipa::path(post, path = "/okra/callback", tag = "Webhooks", security(()),
    responses((status = 200, body = MessageResponse), (status = 404, body = MessageResponse), (status = 502, body = MessageResponse)))]
pub async fn okra_callback(Extension(state): Extension<Arc<AppState>>, body: Bytes) -> Result<Json<MessageResponse>> {
    handle_callback(&state, ProviderKind::Okra, &body).await
}
