use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::kyc::{SubmissionStatus, UserInfo};
use crate::services::package_service::PackageInput;
use crate::services::risk_parameter_service::RiskParameterInput;
use crate::utils::validation::Validator;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSubmissionRequest {
    pub first_name: String,
    pub last_name: String,
    pub nationality: String,
    pub address: String,
    pub email: String,
    pub phone_number: String,
    /// Bank Verification Number; required for Nigerian applicants.
    #[serde(default, alias = "id_number")]
    pub bvn: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, alias = "signature_url")]
    pub signature_link: Option<String>,
}

impl CreateSubmissionRequest {
    pub fn validate(&self) -> Result<()> {
        Validator::validate_required("first_name", &self.first_name)?;
        Validator::validate_required("last_name", &self.last_name)?;
        Validator::validate_required("nationality", &self.nationality)?;
        Validator::validate_required("address", &self.address)?;
        Validator::validate_required("email", &self.email)?;
        Validator::validate_required("phone_number", &self.phone_number)?;
        Validator::validate_email(self.email.trim())?;
        Validator::validate_phone(&self.phone_number)?;
        Validator::validate_id_number(&self.nationality, self.bvn.as_deref())?;
        Ok(())
    }

    pub fn into_user_info(self) -> UserInfo {
        UserInfo {
            kyc_submission_id: Uuid::nil(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            nationality: self.nationality,
            address: self.address,
            email: self.email.trim().to_string(),
            phone_number: self.phone_number.trim().to_string(),
            id_number: self.bvn.map(|b| b.trim().to_string()).filter(|b| !b.is_empty()),
            image_url: self.image_url,
            signature_url: self.signature_link,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    /// `accepted` or `rejected`, any case.
    pub status: String,
}

impl UpdateStatusRequest {
    pub fn validate(&self) -> Result<SubmissionStatus> {
        Validator::validate_required("status", &self.status)?;
        let status: SubmissionStatus = self.status.parse()?;
        if !status.is_final() {
            return Err(AppError::ValidationError("status must be accepted or rejected".to_string()));
        }
        Ok(status)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PackageRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    pub risk_parameter_id: Uuid,
}

impl PackageRequest {
    pub fn validate(self) -> Result<PackageInput> {
        Validator::validate_required("name", &self.name)?;
        Ok(PackageInput {
            name: self.name.trim().to_string(),
            description: self.description,
            logo_url: self.logo_url.filter(|u| !u.trim().is_empty()),
            risk_parameter_id: self.risk_parameter_id,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RiskParameterRequest {
    pub name: String,
    pub account_balance: f64,
    pub average_salary: f64,
    #[serde(default)]
    pub employment_status: bool,
}

impl RiskParameterRequest {
    pub fn validate(self) -> Result<RiskParameterInput> {
        Validator::validate_required("name", &self.name)?;
        for (field, value) in [("account_balance", self.account_balance), ("average_salary", self.average_salary)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(AppError::ValidationError(format!("{} must be a positive number", field)));
            }
        }
        Ok(RiskParameterInput {
            name: self.name.trim().to_string(),
            account_balance: self.account_balance,
            average_salary: self.average_salary,
            employment_status: self.employment_status,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}
