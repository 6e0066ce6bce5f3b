use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

pub const PASSPORT_VERIFICATION_LINK: &str = "passport_verification_link";
pub const INCOME_VERIFICATION_LINK: &str = "income_verification_link";
pub const EMPLOYMENT_VERIFICATION_LINK: &str = "employment_verification_link";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Queued,
    Accepted,
    Rejected,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Queued => "queued",
            SubmissionStatus::Accepted => "accepted",
            SubmissionStatus::Rejected => "rejected",
        }
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, SubmissionStatus::Queued)
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "queued" => Ok(SubmissionStatus::Queued),
            "accepted" => Ok(SubmissionStatus::Accepted),
            "rejected" => Ok(SubmissionStatus::Rejected),
            other => Err(AppError::ValidationError(format!("Unknown submission status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum RiskLevel {
    #[serde(rename = "Low Risk")]
    Low,
    #[serde(rename = "High Risk")]
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low Risk",
            RiskLevel::High => "High Risk",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low Risk" => Ok(RiskLevel::Low),
            "High Risk" => Ok(RiskLevel::High),
            other => Err(AppError::StorageError(format!("Unknown risk level: {}", other))),
        }
    }
}

/// Applicant data captured when the submission is created. Never touched by callbacks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserInfo {
    pub kyc_submission_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub nationality: String,
    pub address: String,
    pub email: String,
    pub phone_number: String,
    pub id_number: Option<String>,
    pub image_url: Option<String>,
    pub signature_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PassportInfo {
    pub kyc_submission_id: Uuid,
    /// Overall verdict followed by detail codes, joined with `|`.
    pub status: String,
    pub document_number: Option<String>,
    pub full_name: Option<String>,
    pub sex: Option<String>,
    pub nationality: Option<String>,
    pub date_of_birth: Option<String>,
    pub date_of_issue: Option<String>,
    pub expiry_date: Option<String>,
    pub birth_place: Option<String>,
    pub authority: Option<String>,
    pub age_estimate: Option<String>,
    pub face_match: bool,
    pub front_image_url: Option<String>,
    pub face_image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EmploymentInfo {
    pub kyc_submission_id: Uuid,
    pub employer_name: Option<String>,
    pub average_salary: f64,
    pub employment_status: bool,
    pub average_salary_risk_level: Option<RiskLevel>,
    pub employment_risk_level: Option<RiskLevel>,
    #[schema(value_type = Object)]
    pub provider_response: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BankInfo {
    pub kyc_submission_id: Uuid,
    pub account_holder: Option<String>,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub balance: f64,
    pub account_balance_risk_level: Option<RiskLevel>,
    #[schema(value_type = Object)]
    pub provider_response: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AddressInfo {
    pub kyc_submission_id: Uuid,
    pub address: Option<String>,
    pub proof_of_address_url: Option<String>,
}

/// One applicant's verification case with every sub-record received so far.
///
/// Sub-records are kept in arrival order. A provider that delivers the same
/// kind twice produces two rows; readers wanting the current view take the last.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct KycSubmission {
    pub id: Uuid,
    pub package_id: Uuid,
    pub org_id: String,
    pub status: SubmissionStatus,
    pub checklist: BTreeMap<String, String>,
    pub user_info: UserInfo,
    pub passport_infos: Vec<PassportInfo>,
    pub employment_infos: Vec<EmploymentInfo>,
    pub bank_infos: Vec<BankInfo>,
    pub address_infos: Vec<AddressInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What the engine hands the repository on create; the organization id is
/// resolved from the package by the repository.
#[derive(Debug, Clone)]
pub struct NewKycSubmission {
    pub id: Uuid,
    pub package_id: Uuid,
    pub checklist: BTreeMap<String, String>,
    pub user_info: UserInfo,
    /// Set on guarded routes: no other queued submission may hold this ID number.
    pub exclusive_id_number: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubRecordKind {
    Passport,
    Employment,
    Bank,
    Address,
}

/// Normalized result of one provider webhook.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderCallback {
    pub submission_id: Option<Uuid>,
    pub id_number: Option<String>,
    pub passport_info: Option<PassportInfo>,
    pub address_info: Option<AddressInfo>,
    pub bank_info: Option<BankInfo>,
    pub employment_info: Option<EmploymentInfo>,
}

impl ProviderCallback {
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when the callback names no submission to reconcile against.
    pub fn is_unrecognized(&self) -> bool {
        self.submission_id.is_none()
            && self.id_number.as_deref().map_or(true, |n| n.trim().is_empty())
    }

    pub fn has_records(&self) -> bool {
        self.passport_info.is_some()
            || self.address_info.is_some()
            || self.bank_info.is_some()
            || self.employment_info.is_some()
    }

    pub fn kinds(&self) -> Vec<SubRecordKind> {
        let mut kinds = Vec::new();
        if self.passport_info.is_some() {
            kinds.push(SubRecordKind::Passport);
        }
        if self.address_info.is_some() {
            kinds.push(SubRecordKind::Address);
        }
        if self.bank_info.is_some() {
            kinds.push(SubRecordKind::Bank);
        }
        if self.employment_info.is_some() {
            kinds.push(SubRecordKind::Employment);
        }
        kinds
    }
}
