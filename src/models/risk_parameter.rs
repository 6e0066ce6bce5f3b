use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Thresholds an organization scores incoming financial data against.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RiskParameter {
    pub id: Uuid,
    pub org_id: String,
    pub name: String,
    /// Minimum balance for a `Low Risk` bank account.
    pub account_balance: f64,
    /// Minimum monthly salary for a `Low Risk` employment record.
    pub average_salary: f64,
    /// When set, an unemployed applicant is `High Risk`.
    pub employment_status: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
